//! Window-level event listeners and the event constructors.

use std::cell::RefCell;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::object::{get, get_v, has_property, set};
use crate::runner::ds::operations::type_conversion::{to_boolean, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, call_function, create_native_function};
use crate::runner::eval::types::{EvalContext, Intrinsics, ValueResult};
use crate::runner::std_lib::{define_global, BuiltInObject};

struct Listener {
    event_type: String,
    callback: JsValue,
}

/// Listeners registered on the real global.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RefCell<Vec<Listener>>,
}

impl ListenerRegistry {
    /// Registers a listener; re-adding the same pair is a no-op.
    pub fn add(&self, event_type: &str, callback: JsValue) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        if listeners
            .iter()
            .any(|l| l.event_type == event_type && l.callback == callback)
        {
            return false;
        }
        listeners.push(Listener {
            event_type: event_type.to_string(),
            callback,
        });
        true
    }

    pub fn remove(&self, event_type: &str, callback: &JsValue) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| !(l.event_type == event_type && &l.callback == callback));
        before != listeners.len()
    }

    pub fn count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn count_for(&self, event_type: &str) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|l| l.event_type == event_type)
            .count()
    }

    /// Calls every listener for `event.type`, in registration order.
    pub fn dispatch(&self, ctx: &mut EvalContext, event: &JsValue, this: &JsValue) -> Result<(), JErrorType> {
        let event_type = get_v(ctx, event, "type")?;
        let event_type = to_string(ctx, &event_type)?;
        let callbacks: Vec<JsValue> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event_type == event_type)
            .map(|l| l.callback.clone())
            .collect();
        for callback in callbacks {
            call_function(ctx, &callback, this.clone(), vec![event.clone()])?;
        }
        Ok(())
    }
}

/// Reads `init[name]`, or `default` when `init` is not an object or lacks it.
fn init_field(ctx: &mut EvalContext, init: &JsValue, name: &str, default: JsValue) -> ValueResult {
    match init {
        JsValue::Object(o) if has_property(ctx, o, name)? => get(ctx, o, name),
        _ => Ok(default),
    }
}

fn event_instance(this: &JsValue, class_name: &str) -> Result<JsObjectType, JErrorType> {
    match this {
        JsValue::Object(o) if !o.borrow().is_callable() => {
            o.borrow_mut().class_name = class_name.to_string();
            Ok(o.clone())
        }
        _ => Err(JErrorType::TypeError(format!(
            "Failed to construct '{}': Please use the 'new' operator, this DOM object constructor cannot be called as a function.",
            class_name
        ))),
    }
}

/// Fills an `Event` instance from `(type, init)`.
fn init_event(ctx: &mut EvalContext, this: &JsValue, class_name: &str, args: &[JsValue]) -> Result<JsObjectType, JErrorType> {
    let event = event_instance(this, class_name)?;
    let event_type = to_string(ctx, &arg(args, 0))?;
    let init = arg(args, 1);
    let bubbles = init_field(ctx, &init, "bubbles", JsValue::Boolean(false))?;
    set(ctx, &event, "type", JsValue::String(event_type))?;
    set(ctx, &event, "bubbles", JsValue::Boolean(to_boolean(&bubbles)))?;
    set(ctx, &event, "defaultPrevented", JsValue::Boolean(false))?;
    Ok(event)
}

/// Installs listener registration, `dispatchEvent` and the event constructors.
pub fn install(global: &JsObjectType, intrinsics: &Intrinsics, registry: &std::rc::Rc<ListenerRegistry>) {
    let add = registry.clone();
    let add_listener = create_native_function(intrinsics, "addEventListener", 2, move |ctx, _this, args| {
        let event_type = to_string(ctx, &arg(&args, 0))?;
        let callback = arg(&args, 1);
        if callback.is_callable() {
            add.add(&event_type, callback);
        }
        Ok(JsValue::Undefined)
    });
    define_global(global, "addEventListener", JsValue::Object(add_listener));

    let remove = registry.clone();
    let remove_listener =
        create_native_function(intrinsics, "removeEventListener", 2, move |ctx, _this, args| {
            let event_type = to_string(ctx, &arg(&args, 0))?;
            remove.remove(&event_type, &arg(&args, 1));
            Ok(JsValue::Undefined)
        });
    define_global(global, "removeEventListener", JsValue::Object(remove_listener));

    let dispatch = registry.clone();
    let dispatch_target = std::rc::Rc::downgrade(global);
    let dispatch_event = create_native_function(intrinsics, "dispatchEvent", 1, move |ctx, _this, args| {
        let target = dispatch_target
            .upgrade()
            .map(JsValue::Object)
            .unwrap_or(JsValue::Undefined);
        dispatch.dispatch(ctx, &arg(&args, 0), &target)?;
        Ok(JsValue::Boolean(true))
    });
    define_global(global, "dispatchEvent", JsValue::Object(dispatch_event));

    let event = BuiltInObject::constructor(intrinsics, "Event", 1, |ctx, this, args| {
        Ok(JsValue::Object(init_event(ctx, &this, "Event", &args)?))
    });
    let event_proto = event.prototype();
    if let Some(proto) = &event_proto {
        BuiltInObject::on(intrinsics, proto).add_method("preventDefault", 0, |ctx, this, _args| {
            if let JsValue::Object(o) = &this {
                set(ctx, o, "defaultPrevented", JsValue::Boolean(true))?;
            }
            Ok(JsValue::Undefined)
        });
    }
    define_global(global, "Event", JsValue::Object(event.build()));

    let custom_event = BuiltInObject::constructor(intrinsics, "CustomEvent", 1, |ctx, this, args| {
        let event = init_event(ctx, &this, "CustomEvent", &args)?;
        let detail = init_field(ctx, &arg(&args, 1), "detail", JsValue::Null)?;
        set(ctx, &event, "detail", detail)?;
        Ok(JsValue::Object(event))
    });
    inherit(&custom_event.prototype(), &event_proto);
    define_global(global, "CustomEvent", JsValue::Object(custom_event.build()));

    let mouse_event = BuiltInObject::constructor(intrinsics, "MouseEvent", 1, |ctx, this, args| {
        let event = init_event(ctx, &this, "MouseEvent", &args)?;
        let init = arg(&args, 1);
        let view = init_field(ctx, &init, "view", JsValue::Null)?;
        let client_x = init_field(ctx, &init, "clientX", JsValue::from_i64(0))?;
        let client_y = init_field(ctx, &init, "clientY", JsValue::from_i64(0))?;
        set(ctx, &event, "view", view)?;
        set(ctx, &event, "clientX", client_x)?;
        set(ctx, &event, "clientY", client_y)?;
        Ok(JsValue::Object(event))
    });
    inherit(&mouse_event.prototype(), &event_proto);
    define_global(global, "MouseEvent", JsValue::Object(mouse_event.build()));
}

fn inherit(child: &Option<JsObjectType>, parent: &Option<JsObjectType>) {
    if let (Some(child), Some(parent)) = (child, parent) {
        child.borrow_mut().prototype = Some(parent.clone());
    }
}
