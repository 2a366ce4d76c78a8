//! `MutationObserver` over the host DOM.
//!
//! Mutations are queued per observer and delivered in one microtask, the
//! way a browser batches records for a single task.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType};
use crate::runner::ds::operations::object::{create_array, create_object, get, has_property};
use crate::runner::ds::operations::type_conversion::to_boolean;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, call_function};
use crate::runner::eval::types::{EvalContext, Intrinsics};
use crate::runner::event_loop::EventLoop;
use crate::runner::std_lib::{define_global, BuiltInObject};

struct MutationRecord {
    target: JsObjectType,
    added: Vec<JsObjectType>,
    removed: Vec<JsObjectType>,
}

struct ObservedTarget {
    node: JsObjectType,
    subtree: bool,
}

pub struct ObserverData {
    callback: JsValue,
    object: RefCell<Weak<RefCell<JsObject>>>,
    targets: RefCell<Vec<ObservedTarget>>,
    records: RefCell<Vec<MutationRecord>>,
    scheduled: Cell<bool>,
}

impl ObserverData {
    pub fn is_observing(&self) -> bool {
        !self.targets.borrow().is_empty()
    }

    pub fn disconnect(&self) {
        self.targets.borrow_mut().clear();
        self.records.borrow_mut().clear();
    }

    fn matches(&self, chain: &[JsObjectType]) -> bool {
        self.targets.borrow().iter().any(|t| {
            chain
                .iter()
                .enumerate()
                .any(|(depth, node)| Rc::ptr_eq(node, &t.node) && (depth == 0 || t.subtree))
        })
    }
}

/// Every observer created in a realm.
pub struct ObserverRegistry {
    event_loop: Rc<EventLoop>,
    observers: RefCell<Vec<Weak<ObserverData>>>,
    prototype: RefCell<Option<JsObjectType>>,
}

impl ObserverRegistry {
    pub fn new(event_loop: Rc<EventLoop>) -> Self {
        ObserverRegistry {
            event_loop,
            observers: RefCell::new(vec![]),
            prototype: RefCell::new(None),
        }
    }

    /// Observers currently watching at least one node.
    pub fn active_count(&self) -> usize {
        self.observers
            .borrow()
            .iter()
            .filter_map(|w| w.upgrade())
            .filter(|o| o.is_observing())
            .count()
    }

    /// `new MutationObserver(callback)`.
    pub fn create_observer(
        &self,
        ctx: &mut EvalContext,
        callback: JsValue,
    ) -> Result<(JsObjectType, Rc<ObserverData>), JErrorType> {
        if !callback.is_callable() {
            return Err(JErrorType::TypeError(
                "Failed to construct 'MutationObserver': parameter 1 is not of type 'Function'."
                    .to_string(),
            ));
        }
        let data = Rc::new(ObserverData {
            callback,
            object: RefCell::new(Weak::new()),
            targets: RefCell::new(vec![]),
            records: RefCell::new(vec![]),
            scheduled: Cell::new(false),
        });
        let proto = self
            .prototype
            .borrow()
            .clone()
            .unwrap_or_else(|| ctx.intrinsics.object_prototype.clone());
        let object = JsObject::new(Some(proto))
            .class("MutationObserver")
            .host(data.clone())
            .into_ref();
        *data.object.borrow_mut() = Rc::downgrade(&object);
        let mut observers = self.observers.borrow_mut();
        observers.retain(|w| w.strong_count() > 0);
        observers.push(Rc::downgrade(&data));
        Ok((object, data))
    }

    /// Queues a child-list record for every observer watching `chain[0]`
    /// directly, or one of its ancestors (`chain[1..]`) with `subtree`.
    pub fn notify(&self, chain: &[JsObjectType], added: Vec<JsObjectType>, removed: Vec<JsObjectType>) {
        let observers: Vec<Rc<ObserverData>> = self
            .observers
            .borrow()
            .iter()
            .filter_map(|w| w.upgrade())
            .collect();
        let target = match chain.first() {
            Some(t) => t.clone(),
            None => return,
        };
        for observer in observers.into_iter().filter(|o| o.matches(chain)) {
            observer.records.borrow_mut().push(MutationRecord {
                target: target.clone(),
                added: added.clone(),
                removed: removed.clone(),
            });
            if !observer.scheduled.replace(true) {
                let observer = observer.clone();
                self.event_loop
                    .enqueue_microtask(Box::new(move |ctx: &mut EvalContext| deliver(ctx, &observer)));
            }
        }
    }
}

fn records_to_value(ctx: &mut EvalContext, records: Vec<MutationRecord>) -> JsValue {
    let values = records
        .into_iter()
        .map(|r| {
            let o = create_object(ctx);
            {
                let mut o = o.borrow_mut();
                o.insert("type", JsValue::from_str("childList"));
                o.insert("target", JsValue::Object(r.target));
            }
            let added = create_array(ctx, r.added.into_iter().map(JsValue::Object).collect());
            let removed = create_array(ctx, r.removed.into_iter().map(JsValue::Object).collect());
            o.borrow_mut().insert("addedNodes", JsValue::Object(added));
            o.borrow_mut().insert("removedNodes", JsValue::Object(removed));
            JsValue::Object(o)
        })
        .collect();
    JsValue::Object(create_array(ctx, values))
}

fn deliver(ctx: &mut EvalContext, observer: &Rc<ObserverData>) -> Result<(), JErrorType> {
    observer.scheduled.set(false);
    let records: Vec<MutationRecord> = observer.records.borrow_mut().drain(..).collect();
    if records.is_empty() {
        return Ok(());
    }
    let list = records_to_value(ctx, records);
    let this = match observer.object.borrow().upgrade() {
        Some(o) => JsValue::Object(o),
        None => JsValue::Undefined,
    };
    call_function(ctx, &observer.callback, this.clone(), vec![list, this])?;
    Ok(())
}

fn this_observer(this: &JsValue) -> Result<Rc<ObserverData>, JErrorType> {
    this.as_object()
        .and_then(|o| o.borrow().host_data::<ObserverData>())
        .ok_or_else(|| JErrorType::TypeError("Illegal invocation".to_string()))
}

/// Installs `MutationObserver` on `global`.
pub fn install(global: &JsObjectType, intrinsics: &Intrinsics, registry: &Rc<ObserverRegistry>) {
    let proto = BuiltInObject::new(intrinsics, "MutationObserver")
        .add_method("observe", 2, |ctx, this, args| {
            let observer = this_observer(&this)?;
            let node = match arg(&args, 0) {
                JsValue::Object(o) => o,
                _ => {
                    return Err(JErrorType::TypeError(
                        "Failed to execute 'observe' on 'MutationObserver': parameter 1 is not of type 'Node'."
                            .to_string(),
                    ))
                }
            };
            let subtree = match arg(&args, 1) {
                JsValue::Object(options) if has_property(ctx, &options, "subtree")? => {
                    to_boolean(&get(ctx, &options, "subtree")?)
                }
                _ => false,
            };
            let mut targets = observer.targets.borrow_mut();
            targets.retain(|t| !Rc::ptr_eq(&t.node, &node));
            targets.push(ObservedTarget { node, subtree });
            Ok(JsValue::Undefined)
        })
        .add_method("disconnect", 0, |_ctx, this, _args| {
            this_observer(&this)?.disconnect();
            Ok(JsValue::Undefined)
        })
        .add_method("takeRecords", 0, |ctx, this, _args| {
            let observer = this_observer(&this)?;
            let records: Vec<MutationRecord> = observer.records.borrow_mut().drain(..).collect();
            Ok(records_to_value(ctx, records))
        })
        .build();
    *registry.prototype.borrow_mut() = Some(proto.clone());

    let for_ctor = registry.clone();
    let ctor = BuiltInObject::constructor(intrinsics, "MutationObserver", 1, move |ctx, _this, args| {
        let (object, _) = for_ctor.create_observer(ctx, arg(&args, 0))?;
        Ok(JsValue::Object(object))
    })
    .build();
    ctor.borrow_mut()
        .insert_hidden("prototype", JsValue::Object(proto.clone()));
    proto
        .borrow_mut()
        .insert_hidden("constructor", JsValue::Object(ctor.clone()));
    define_global(global, "MutationObserver", JsValue::Object(ctor));
}
