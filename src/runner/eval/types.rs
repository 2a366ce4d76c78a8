//! Core types for the evaluation engine.

use std::rc::Rc;

use crate::runner::ds::env_record::{global_object, ScopeRef};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::object::{get_v, set};
use crate::runner::ds::value::JsValue;
use crate::runner::event_loop::EventLoop;

/// Nested calls allowed before a RangeError is raised.
pub const MAX_CALL_DEPTH: usize = 96;

/// Completion record.
/// Every statement evaluation returns one.
#[derive(Debug, Clone)]
pub enum Completion {
    /// Execution continues; carries the statement value if it produced one.
    Normal(Option<JsValue>),
    Return(JsValue),
    Break,
    Continue,
}

impl Completion {
    pub fn normal() -> Self {
        Completion::Normal(None)
    }

    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal(_))
    }
}

pub type EvalResult = Result<Completion, JErrorType>;
pub type ValueResult = Result<JsValue, JErrorType>;

/// Resolved target of an identifier or member expression.
pub enum Reference {
    /// A declarative binding in `scope`.
    Binding { scope: ScopeRef, name: String },
    /// A property of `base`. `with_base` is set when calls through the
    /// reference receive `base` as `this`.
    Property {
        base: JsValue,
        name: String,
        with_base: bool,
    },
    Unresolvable(String),
}

impl Reference {
    pub fn get_value(&self, ctx: &mut EvalContext) -> ValueResult {
        match self {
            Reference::Binding { scope, name } => scope.borrow().get_binding_value(name),
            Reference::Property { base, name, .. } => {
                get_v(ctx, base, name)
            }
            Reference::Unresolvable(name) => {
                Err(JErrorType::ReferenceError(format!("{} is not defined", name)))
            }
        }
    }

    /// Writes through the reference. Unresolvable names become properties of
    /// the global object of `current_scope`.
    pub fn put_value(
        &self,
        ctx: &mut EvalContext,
        current_scope: &ScopeRef,
        value: JsValue,
    ) -> Result<(), JErrorType> {
        match self {
            Reference::Binding { scope, name } => scope.borrow_mut().set_mutable_binding(name, value),
            Reference::Property { base, name, .. } => match base {
                JsValue::Object(o) => {
                    set(ctx, o, name, value)?;
                    Ok(())
                }
                JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
                    "Cannot set properties of {} (setting '{}')",
                    base, name
                ))),
                _ => Ok(()),
            },
            Reference::Unresolvable(name) => match global_object(current_scope) {
                Some(global) => {
                    set(ctx, &global, name, value)?;
                    Ok(())
                }
                None => Err(JErrorType::ReferenceError(format!("{} is not defined", name))),
            },
        }
    }

    /// `this` to use when the reference is called.
    pub fn this_value(&self) -> JsValue {
        match self {
            Reference::Property {
                base,
                with_base: true,
                ..
            } => base.clone(),
            _ => JsValue::Undefined,
        }
    }
}

/// Well-known prototypes shared by everything created in one realm.
pub struct Intrinsics {
    pub object_prototype: JsObjectType,
    pub function_prototype: JsObjectType,
    pub array_prototype: JsObjectType,
    pub string_prototype: JsObjectType,
    pub error_prototype: JsObjectType,
    pub type_error_prototype: JsObjectType,
    pub reference_error_prototype: JsObjectType,
    pub range_error_prototype: JsObjectType,
    pub syntax_error_prototype: JsObjectType,
}

impl Intrinsics {
    pub fn error_prototype_for(&self, err: &JErrorType) -> JsObjectType {
        match err {
            JErrorType::TypeError(_) => self.type_error_prototype.clone(),
            JErrorType::ReferenceError(_) => self.reference_error_prototype.clone(),
            JErrorType::RangeError(_) => self.range_error_prototype.clone(),
            JErrorType::SyntaxError(_) => self.syntax_error_prototype.clone(),
            JErrorType::Thrown(_) => self.error_prototype.clone(),
        }
    }
}

/// Per-call-stack evaluation state.
pub struct EvalContext {
    pub intrinsics: Rc<Intrinsics>,
    pub event_loop: Rc<EventLoop>,
    pub call_depth: usize,
}

impl EvalContext {
    pub fn new(intrinsics: Rc<Intrinsics>, event_loop: Rc<EventLoop>) -> Self {
        EvalContext {
            intrinsics,
            event_loop,
            call_depth: 0,
        }
    }
}
