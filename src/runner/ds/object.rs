use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function::FunctionKind;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalContext;

pub type JsObjectType = Rc<RefCell<JsObject>>;

#[derive(Clone, Debug)]
pub struct Property {
    pub value: JsValue,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    pub fn data(value: JsValue) -> Self {
        Property {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable and configurable but skipped by key enumeration.
    pub fn hidden(value: JsValue) -> Self {
        Property {
            value,
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }
}

/// Partial property description as accepted by `defineProperty`.
#[derive(Clone, Debug, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn from_value(value: JsValue) -> Self {
        PropertyDescriptor {
            value: Some(value),
            writable: Some(true),
            enumerable: Some(true),
            configurable: Some(true),
        }
    }

    /// Builds a complete property, filling unspecified attributes with `false`.
    pub fn to_property(&self) -> Property {
        Property {
            value: self.value.clone().unwrap_or(JsValue::Undefined),
            writable: self.writable.unwrap_or(false),
            enumerable: self.enumerable.unwrap_or(false),
            configurable: self.configurable.unwrap_or(false),
        }
    }

    /// Overlays the specified attributes onto an existing property.
    pub fn merge_into(&self, existing: &mut Property) {
        if let Some(v) = &self.value {
            existing.value = v.clone();
        }
        if let Some(w) = self.writable {
            existing.writable = w;
        }
        if let Some(e) = self.enumerable {
            existing.enumerable = e;
        }
        if let Some(c) = self.configurable {
            existing.configurable = c;
        }
    }
}

impl From<&Property> for PropertyDescriptor {
    fn from(p: &Property) -> Self {
        PropertyDescriptor {
            value: Some(p.value.clone()),
            writable: Some(p.writable),
            enumerable: Some(p.enumerable),
            configurable: Some(p.configurable),
        }
    }
}

/// Hooks for objects whose property semantics are computed rather than stored.
///
/// Every property operation on an exotic object is routed through these traps,
/// including identifier resolution when the object backs an environment record.
pub trait PropertyTraps {
    fn get(&self, ctx: &mut EvalContext, key: &str) -> Result<JsValue, JErrorType>;

    fn set(&self, ctx: &mut EvalContext, key: &str, value: JsValue) -> Result<bool, JErrorType>;

    fn has(&self, ctx: &mut EvalContext, key: &str) -> Result<bool, JErrorType>;

    fn get_own_property(
        &self,
        ctx: &mut EvalContext,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>, JErrorType>;

    fn define_property(
        &self,
        ctx: &mut EvalContext,
        key: &str,
        desc: PropertyDescriptor,
    ) -> Result<bool, JErrorType>;

    fn delete_property(&self, ctx: &mut EvalContext, key: &str) -> Result<bool, JErrorType>;

    /// Enumerable own keys, in order.
    fn own_keys(&self, ctx: &mut EvalContext) -> Result<Vec<String>, JErrorType>;

    fn class_name(&self) -> String {
        "Object".to_string()
    }

    /// The real object this one stands in for, if it is a view over one.
    fn unwrap_target(&self) -> Option<JsObjectType> {
        None
    }
}

pub enum ObjectKind {
    Ordinary,
    Array(Vec<JsValue>),
    Function(FunctionKind),
    Exotic(Rc<dyn PropertyTraps>),
}

pub struct JsObject {
    pub kind: ObjectKind,
    pub properties: IndexMap<String, Property>,
    pub prototype: Option<JsObjectType>,
    pub class_name: String,
    pub extensible: bool,
    /// Opaque slot for host surfaces that attach native state to an object.
    pub host_data: Option<Rc<dyn Any>>,
}

impl JsObject {
    pub fn new(prototype: Option<JsObjectType>) -> Self {
        JsObject::with_kind(ObjectKind::Ordinary, prototype)
    }

    pub fn with_kind(kind: ObjectKind, prototype: Option<JsObjectType>) -> Self {
        let class_name = match &kind {
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            _ => "Object",
        };
        JsObject {
            kind,
            properties: IndexMap::new(),
            prototype,
            class_name: class_name.to_string(),
            extensible: true,
            host_data: None,
        }
    }

    pub fn exotic(traps: Rc<dyn PropertyTraps>, prototype: Option<JsObjectType>) -> Self {
        JsObject::with_kind(ObjectKind::Exotic(traps), prototype)
    }

    pub fn class(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    pub fn host(mut self, data: Rc<dyn Any>) -> Self {
        self.host_data = Some(data);
        self
    }

    pub fn into_ref(self) -> JsObjectType {
        Rc::new(RefCell::new(self))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    pub fn traps(&self) -> Option<Rc<dyn PropertyTraps>> {
        match &self.kind {
            ObjectKind::Exotic(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn get_class_name(&self) -> String {
        match &self.kind {
            ObjectKind::Exotic(t) => t.class_name(),
            _ => self.class_name.clone(),
        }
    }

    /// Downcasts the host slot.
    pub fn host_data<T: 'static>(&self) -> Option<Rc<T>> {
        self.host_data
            .as_ref()
            .and_then(|d| d.clone().downcast::<T>().ok())
    }

    /// Own stored property lookup. Exotic objects never answer here.
    pub fn get_own_property(&self, key: &str) -> Option<Property> {
        if let ObjectKind::Array(elements) = &self.kind {
            if key == "length" {
                return Some(Property {
                    value: JsValue::from_i64(elements.len() as i64),
                    writable: true,
                    enumerable: false,
                    configurable: false,
                });
            }
            if let Some(index) = array_index(key) {
                return elements.get(index).map(|v| Property::data(v.clone()));
            }
        }
        self.properties.get(key).cloned()
    }

    pub fn get_own_value(&self, key: &str) -> Option<JsValue> {
        self.get_own_property(key).map(|p| p.value)
    }

    /// Plain data write, bypassing attribute checks. Used while building objects.
    pub fn insert(&mut self, key: &str, value: JsValue) {
        self.properties.insert(key.to_string(), Property::data(value));
    }

    pub fn insert_hidden(&mut self, key: &str, value: JsValue) {
        self.properties
            .insert(key.to_string(), Property::hidden(value));
    }
}

/// Largest length an array's element vector may grow to.
pub const MAX_DENSE_LENGTH: usize = 1 << 24;

/// Canonical array index of `key`. Indices stop at 2^32 - 2; anything
/// larger is an ordinary property name.
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty()
        || (key.len() > 1 && key.starts_with('0'))
        || !key.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    match key.parse::<u32>() {
        Ok(index) if index < u32::MAX => Some(index as usize),
        _ => None,
    }
}
