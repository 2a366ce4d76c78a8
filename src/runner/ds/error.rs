use thiserror::Error;

use crate::runner::ds::value::JsValue;

/// Every abrupt completion the engine can produce.
///
/// Native failures carry a message; values thrown by guest code travel as
/// `Thrown` so they can be caught and re-raised unchanged.
#[derive(Debug, Clone, Error)]
pub enum JErrorType {
    #[error("ReferenceError: {0}")]
    ReferenceError(String),
    #[error("TypeError: {0}")]
    TypeError(String),
    #[error("RangeError: {0}")]
    RangeError(String),
    #[error("SyntaxError: {0}")]
    SyntaxError(String),
    #[error("Uncaught {0}")]
    Thrown(JsValue),
}

impl JErrorType {
    /// Constructor name of the native error kind.
    pub fn name(&self) -> &'static str {
        match self {
            JErrorType::ReferenceError(_) => "ReferenceError",
            JErrorType::TypeError(_) => "TypeError",
            JErrorType::RangeError(_) => "RangeError",
            JErrorType::SyntaxError(_) => "SyntaxError",
            JErrorType::Thrown(_) => "Error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            JErrorType::ReferenceError(m)
            | JErrorType::TypeError(m)
            | JErrorType::RangeError(m)
            | JErrorType::SyntaxError(m) => m.clone(),
            JErrorType::Thrown(v) => match v {
                JsValue::Object(o) => match o.borrow().get_own_value("message") {
                    Some(m) => m.to_string(),
                    None => v.to_string(),
                },
                _ => v.to_string(),
            },
        }
    }

    /// The guest-visible value, if this error already is one.
    pub fn thrown_value(&self) -> Option<&JsValue> {
        match self {
            JErrorType::Thrown(v) => Some(v),
            _ => None,
        }
    }
}
