use std::collections::HashSet;
use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType, PropertyDescriptor, PropertyTraps};
use crate::runner::ds::operations::object::{
    define_property, delete_property, get, get_own_property, has_property, own_keys, set,
};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalContext;

/// A per-sandbox stand-in for a host object. Reads fall back to the target;
/// writes stay on the view unless the name is listed as write-through.
pub struct ObjectView {
    target: JsObjectType,
    own: JsObjectType,
    write_through: HashSet<String>,
}

impl ObjectView {
    /// Builds the view. `shadowed` members live on the view from the start.
    pub fn create(
        target: &JsObjectType,
        write_through: &[&str],
        shadowed: Vec<(&str, JsValue)>,
    ) -> JsObjectType {
        let prototype = target.borrow().prototype.clone();
        let mut own = JsObject::new(None);
        for (name, value) in shadowed {
            own.insert_hidden(name, value);
        }
        let view = ObjectView {
            target: target.clone(),
            own: own.into_ref(),
            write_through: write_through.iter().map(|s| s.to_string()).collect(),
        };
        JsObject::exotic(Rc::new(view), prototype).into_ref()
    }
}

impl PropertyTraps for ObjectView {
    fn get(&self, ctx: &mut EvalContext, key: &str) -> Result<JsValue, JErrorType> {
        if let Some(v) = self.own.borrow().get_own_value(key) {
            return Ok(v);
        }
        get(ctx, &self.target, key)
    }

    fn set(&self, ctx: &mut EvalContext, key: &str, value: JsValue) -> Result<bool, JErrorType> {
        if self.write_through.contains(key) {
            return set(ctx, &self.target, key, value);
        }
        set(ctx, &self.own, key, value)
    }

    fn has(&self, ctx: &mut EvalContext, key: &str) -> Result<bool, JErrorType> {
        if self.own.borrow().get_own_property(key).is_some() {
            return Ok(true);
        }
        has_property(ctx, &self.target, key)
    }

    fn get_own_property(
        &self,
        ctx: &mut EvalContext,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>, JErrorType> {
        if let Some(p) = self.own.borrow().get_own_property(key) {
            return Ok(Some(PropertyDescriptor::from(&p)));
        }
        get_own_property(ctx, &self.target, key)
    }

    fn define_property(
        &self,
        ctx: &mut EvalContext,
        key: &str,
        desc: PropertyDescriptor,
    ) -> Result<bool, JErrorType> {
        if self.write_through.contains(key) {
            return define_property(ctx, &self.target, key, desc);
        }
        define_property(ctx, &self.own, key, desc)
    }

    fn delete_property(&self, ctx: &mut EvalContext, key: &str) -> Result<bool, JErrorType> {
        delete_property(ctx, &self.own, key)
    }

    fn own_keys(&self, ctx: &mut EvalContext) -> Result<Vec<String>, JErrorType> {
        let mut keys = own_keys(ctx, &self.own)?;
        for key in own_keys(ctx, &self.target)? {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn class_name(&self) -> String {
        self.target.borrow().get_class_name()
    }

    fn unwrap_target(&self) -> Option<JsObjectType> {
        Some(self.target.clone())
    }
}
