//! Standard library built-in objects.
//!
//! Each submodule exposes a `register` function that installs its globals on
//! a realm's global object. Prototypes that the evaluator itself needs live
//! in [`Intrinsics`] and are created first by [`core::create_intrinsics`].

pub mod array;
pub mod console;
pub mod core;
pub mod error;
pub mod object;
pub mod string;

use crate::runner::ds::object::{JsObject, JsObjectType};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{create_native_constructor, create_native_function};
use crate::runner::eval::types::{EvalContext, Intrinsics, ValueResult};

pub use self::core::{create_intrinsics, register_core_builtins};

/// Fluent helper for filling a built-in object with methods and values.
pub struct BuiltInObject<'a> {
    intrinsics: &'a Intrinsics,
    object: JsObjectType,
}

impl<'a> BuiltInObject<'a> {
    /// Starts a plain object inheriting from `Object.prototype`.
    pub fn new(intrinsics: &'a Intrinsics, class_name: &str) -> Self {
        let object = JsObject::new(Some(intrinsics.object_prototype.clone()))
            .class(class_name)
            .into_ref();
        BuiltInObject { intrinsics, object }
    }

    /// Continues filling an object that already exists (a prototype, a constructor).
    pub fn on(intrinsics: &'a Intrinsics, object: &JsObjectType) -> Self {
        BuiltInObject {
            intrinsics,
            object: object.clone(),
        }
    }

    /// Starts from a native constructor, which gets its own `prototype`.
    pub fn constructor<F>(intrinsics: &'a Intrinsics, name: &str, length: i64, func: F) -> Self
    where
        F: Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> ValueResult + 'static,
    {
        let object = create_native_constructor(intrinsics, name, length, func);
        BuiltInObject { intrinsics, object }
    }

    pub fn add_method<F>(self, name: &str, length: i64, func: F) -> Self
    where
        F: Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> ValueResult + 'static,
    {
        let f = create_native_function(self.intrinsics, name, length, func);
        self.object
            .borrow_mut()
            .insert_hidden(name, JsValue::Object(f));
        self
    }

    pub fn add_value(self, name: &str, value: JsValue) -> Self {
        self.object.borrow_mut().insert(name, value);
        self
    }

    pub fn add_hidden_value(self, name: &str, value: JsValue) -> Self {
        self.object.borrow_mut().insert_hidden(name, value);
        self
    }

    /// The `prototype` object of a constructor built with [`BuiltInObject::constructor`].
    pub fn prototype(&self) -> Option<JsObjectType> {
        match self.object.borrow().get_own_value("prototype") {
            Some(JsValue::Object(p)) => Some(p),
            _ => None,
        }
    }

    pub fn build(self) -> JsObjectType {
        self.object
    }
}

/// Installs `name` on `global` as a non-enumerable binding.
pub fn define_global(global: &JsObjectType, name: &str, value: JsValue) {
    global.borrow_mut().insert_hidden(name, value);
}
