//! A minimal element tree backing `document`.
//!
//! Elements are ordinary script objects carrying an [`ElementData`] in their
//! host slot. Tree edits go through [`Dom`] so that observers are notified
//! and append hooks see every node that becomes connected.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use uuid::Uuid;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType};
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::arg;
use crate::runner::eval::types::Intrinsics;
use crate::runner::std_lib::{define_global, BuiltInObject};

use super::observer::ObserverRegistry;

/// Called with every element that gets attached under the document root.
pub type AppendHook = Rc<dyn Fn(&JsObjectType)>;

pub struct ElementData {
    pub node_id: Uuid,
    pub tag: String,
    children: RefCell<Vec<JsObjectType>>,
    parent: RefCell<Weak<RefCell<JsObject>>>,
    /// Id of the sandbox whose document view created this element.
    owner: Cell<Option<u32>>,
    attributes: RefCell<IndexMap<String, String>>,
}

impl ElementData {
    pub fn owner(&self) -> Option<u32> {
        self.owner.get()
    }

    pub fn parent(&self) -> Option<JsObjectType> {
        self.parent.borrow().upgrade()
    }

    pub fn children(&self) -> Vec<JsObjectType> {
        self.children.borrow().clone()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }
}

pub fn element_data(o: &JsObjectType) -> Option<Rc<ElementData>> {
    o.borrow().host_data::<ElementData>()
}

/// Tree edit plumbing shared by the DOM methods.
pub struct DomHooks {
    append_hooks: RefCell<Vec<AppendHook>>,
    observers: Rc<ObserverRegistry>,
}

pub struct Dom {
    hooks: Rc<DomHooks>,
    element_prototype: JsObjectType,
    document: JsObjectType,
    root: JsObjectType,
    head: JsObjectType,
    body: JsObjectType,
}

fn new_element(prototype: &JsObjectType, tag: &str, owner: Option<u32>) -> JsObjectType {
    let tag = tag.to_ascii_lowercase();
    let class_name = match tag.as_str() {
        "style" => "HTMLStyleElement",
        "script" => "HTMLScriptElement",
        "div" => "HTMLDivElement",
        _ => "HTMLElement",
    };
    let data = ElementData {
        node_id: Uuid::new_v4(),
        tag: tag.clone(),
        children: RefCell::new(vec![]),
        parent: RefCell::new(Weak::new()),
        owner: Cell::new(owner),
        attributes: RefCell::new(IndexMap::new()),
    };
    let mut element = JsObject::new(Some(prototype.clone()))
        .class(class_name)
        .host(Rc::new(data));
    element.insert("tagName", JsValue::String(tag.to_ascii_uppercase()));
    element.into_ref()
}

fn require_element(v: &JsValue, method: &str) -> Result<(JsObjectType, Rc<ElementData>), JErrorType> {
    if let JsValue::Object(o) = v {
        if let Some(data) = element_data(o) {
            return Ok((o.clone(), data));
        }
    }
    Err(JErrorType::TypeError(format!(
        "Failed to execute '{}' on 'Node': parameter is not of type 'Node'.",
        method
    )))
}

impl DomHooks {
    /// Ancestor chain starting at `node` itself.
    fn chain(node: &JsObjectType) -> Vec<JsObjectType> {
        let mut chain = vec![node.clone()];
        let mut current = element_data(node).and_then(|d| d.parent());
        while let Some(p) = current {
            current = element_data(&p).and_then(|d| d.parent());
            chain.push(p);
        }
        chain
    }

    fn detach(&self, child: &JsObjectType) -> bool {
        let parent = match element_data(child).and_then(|d| d.parent()) {
            Some(p) => p,
            None => return false,
        };
        if let Some(pd) = element_data(&parent) {
            pd.children.borrow_mut().retain(|c| !Rc::ptr_eq(c, child));
        }
        if let Some(cd) = element_data(child) {
            *cd.parent.borrow_mut() = Weak::new();
        }
        self.observers
            .notify(&DomHooks::chain(&parent), vec![], vec![child.clone()]);
        true
    }

    fn append(&self, root: &JsObjectType, parent: &JsObjectType, child: &JsObjectType) -> Result<(), JErrorType> {
        if DomHooks::chain(parent).iter().any(|n| Rc::ptr_eq(n, child)) {
            return Err(JErrorType::TypeError(
                "Failed to execute 'appendChild' on 'Node': The new child element contains the parent."
                    .to_string(),
            ));
        }
        self.detach(child);
        let (pd, cd) = match (element_data(parent), element_data(child)) {
            (Some(pd), Some(cd)) => (pd, cd),
            _ => return Ok(()),
        };
        pd.children.borrow_mut().push(child.clone());
        *cd.parent.borrow_mut() = Rc::downgrade(parent);
        let chain = DomHooks::chain(parent);
        self.observers.notify(&chain, vec![child.clone()], vec![]);
        let connected = chain.last().map_or(false, |top| Rc::ptr_eq(top, root));
        if connected {
            let hooks = self.append_hooks.borrow().clone();
            for hook in hooks {
                hook(child);
            }
        }
        Ok(())
    }
}

impl Dom {
    pub fn element_prototype(&self) -> &JsObjectType {
        &self.element_prototype
    }

    pub fn document(&self) -> &JsObjectType {
        &self.document
    }

    pub fn head(&self) -> &JsObjectType {
        &self.head
    }

    pub fn body(&self) -> &JsObjectType {
        &self.body
    }

    pub fn create_element(&self, tag: &str, owner: Option<u32>) -> JsObjectType {
        new_element(&self.element_prototype, tag, owner)
    }

    pub fn append_child(&self, parent: &JsObjectType, child: &JsObjectType) -> Result<(), JErrorType> {
        self.hooks.append(&self.root, parent, child)
    }

    /// Removes `node` from wherever it is attached. `false` if it was detached already.
    pub fn detach(&self, node: &JsObjectType) -> bool {
        self.hooks.detach(node)
    }

    pub fn is_connected(&self, node: &JsObjectType) -> bool {
        DomHooks::chain(node)
            .last()
            .map_or(false, |top| Rc::ptr_eq(top, &self.root))
    }

    pub fn add_append_hook(&self, hook: AppendHook) {
        self.hooks.append_hooks.borrow_mut().push(hook);
    }

    pub fn find_by_id(&self, id: &str) -> Option<JsObjectType> {
        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            let matches = {
                let o = node.borrow();
                match o.get_own_value("id") {
                    Some(JsValue::String(s)) => s == id,
                    _ => false,
                }
            } || element_data(&node).and_then(|d| d.attribute("id")).as_deref() == Some(id);
            if matches {
                return Some(node);
            }
            if let Some(d) = element_data(&node) {
                stack.extend(d.children().into_iter().rev());
            }
        }
        None
    }
}

/// Builds the element tree and installs `document` on `global`.
pub fn install(global: &JsObjectType, intrinsics: &Intrinsics, observers: &Rc<ObserverRegistry>) -> Rc<Dom> {
    let hooks = Rc::new(DomHooks {
        append_hooks: RefCell::new(vec![]),
        observers: observers.clone(),
    });
    let element_prototype = BuiltInObject::new(intrinsics, "HTMLElement").build();
    let root = new_element(&element_prototype, "html", None);
    let head = new_element(&element_prototype, "head", None);
    let body = new_element(&element_prototype, "body", None);
    for child in [&head, &body].iter() {
        if let (Some(rd), Some(cd)) = (element_data(&root), element_data(child)) {
            rd.children.borrow_mut().push((*child).clone());
            *cd.parent.borrow_mut() = Rc::downgrade(&root);
        }
    }

    let append_hooks = hooks.clone();
    let append_root = root.clone();
    let remove_hooks = hooks.clone();
    let detach_hooks = hooks.clone();
    BuiltInObject::on(intrinsics, &element_prototype)
        .add_method("appendChild", 1, move |_ctx, this, args| {
            let (parent, _) = require_element(&this, "appendChild")?;
            let child = arg(&args, 0);
            let (node, _) = require_element(&child, "appendChild")?;
            append_hooks.append(&append_root, &parent, &node)?;
            Ok(child)
        })
        .add_method("removeChild", 1, move |_ctx, this, args| {
            let (parent, _) = require_element(&this, "removeChild")?;
            let child = arg(&args, 0);
            let (node, data) = require_element(&child, "removeChild")?;
            match data.parent() {
                Some(p) if Rc::ptr_eq(&p, &parent) => {
                    remove_hooks.detach(&node);
                    Ok(child)
                }
                _ => Err(JErrorType::TypeError(
                    "Failed to execute 'removeChild' on 'Node': The node to be removed is not a child of this node."
                        .to_string(),
                )),
            }
        })
        .add_method("remove", 0, move |_ctx, this, _args| {
            let (node, _) = require_element(&this, "remove")?;
            detach_hooks.detach(&node);
            Ok(JsValue::Undefined)
        })
        .add_method("setAttribute", 2, |ctx, this, args| {
            let (_, data) = require_element(&this, "setAttribute")?;
            let name = to_string(ctx, &arg(&args, 0))?;
            let value = to_string(ctx, &arg(&args, 1))?;
            data.set_attribute(&name, &value);
            Ok(JsValue::Undefined)
        })
        .add_method("getAttribute", 1, |ctx, this, args| {
            let (_, data) = require_element(&this, "getAttribute")?;
            let name = to_string(ctx, &arg(&args, 0))?;
            Ok(data
                .attribute(&name)
                .map(JsValue::String)
                .unwrap_or(JsValue::Null))
        })
        .add_method("hasChildNodes", 0, |_ctx, this, _args| {
            let (_, data) = require_element(&this, "hasChildNodes")?;
            let empty = data.children.borrow().is_empty();
            Ok(JsValue::Boolean(!empty))
        });

    let document = BuiltInObject::new(intrinsics, "HTMLDocument")
        .add_value("documentElement", JsValue::Object(root.clone()))
        .add_value("head", JsValue::Object(head.clone()))
        .add_value("body", JsValue::Object(body.clone()))
        .add_value("currentScript", JsValue::Null)
        .add_value("defaultView", JsValue::Object(global.clone()))
        .build();

    let dom = Rc::new(Dom {
        hooks,
        element_prototype,
        document: document.clone(),
        root,
        head,
        body,
    });

    let create_dom = Rc::downgrade(&dom);
    let lookup_dom = Rc::downgrade(&dom);
    BuiltInObject::on(intrinsics, &document)
        .add_method("createElement", 1, move |ctx, _this, args| {
            let tag = to_string(ctx, &arg(&args, 0))?;
            let dom = create_dom
                .upgrade()
                .ok_or_else(|| JErrorType::TypeError("document is gone".to_string()))?;
            Ok(JsValue::Object(dom.create_element(&tag, None)))
        })
        .add_method("getElementById", 1, move |ctx, _this, args| {
            let id = to_string(ctx, &arg(&args, 0))?;
            Ok(lookup_dom
                .upgrade()
                .and_then(|dom| dom.find_by_id(&id))
                .map(JsValue::Object)
                .unwrap_or(JsValue::Null))
        });
    define_global(global, "document", JsValue::Object(document));
    dom
}
