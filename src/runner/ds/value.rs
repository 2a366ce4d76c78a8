use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::type_conversion::{
    number_to_string, TYPE_STR_NULL, TYPE_STR_UNDEFINED,
};

#[derive(Clone)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    String(String),
    Number(JsNumberType),
    Object(JsObjectType),
}

impl JsValue {
    pub fn from_str(s: &str) -> Self {
        JsValue::String(s.to_string())
    }

    pub fn from_i64(i: i64) -> Self {
        JsValue::Number(JsNumberType::Integer(i))
    }

    pub fn from_f64(f: f64) -> Self {
        JsValue::Number(JsNumberType::from_f64(f))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    pub fn as_object(&self) -> Option<&JsObjectType> {
        match self {
            JsValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(o) => o.borrow().is_callable(),
            _ => false,
        }
    }

    /// Identity comparison for objects, value comparison for the rest.
    pub fn same_object(&self, other: &JsObjectType) -> bool {
        match self {
            JsValue::Object(o) => Rc::ptr_eq(o, other),
            _ => false,
        }
    }
}

impl Display for JsValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "{}", TYPE_STR_UNDEFINED),
            JsValue::Null => write!(f, "{}", TYPE_STR_NULL),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::String(s) => write!(f, "{}", s),
            JsValue::Number(n) => write!(f, "{}", n),
            JsValue::Object(o) => {
                let o = match o.try_borrow() {
                    Ok(o) => o,
                    Err(_) => return write!(f, "[object Object]"),
                };
                if o.is_callable() {
                    let name = o.get_own_value("name").unwrap_or(JsValue::Undefined);
                    return write!(f, "function {}", name);
                }
                if o.class_name == "Error" {
                    let name = o
                        .get_own_value("name")
                        .or_else(|| {
                            o.prototype
                                .as_ref()
                                .and_then(|p| p.borrow().get_own_value("name"))
                        })
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "Error".to_string());
                    let message = o.get_own_value("message").unwrap_or(JsValue::Undefined);
                    return write!(f, "{}: {}", name, message);
                }
                write!(f, "[object {}]", o.get_class_name())
            }
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "JsValue::Undefined"),
            JsValue::Null => write!(f, "JsValue::Null"),
            JsValue::Boolean(b) => write!(f, "JsValue::Boolean({})", b),
            JsValue::String(s) => write!(f, "JsValue::String({:?})", s),
            JsValue::Number(n) => write!(f, "JsValue::Number({:?})", n),
            JsValue::Object(o) => match o.try_borrow() {
                Ok(o) => write!(f, "JsValue::Object({})", o.get_class_name()),
                Err(_) => write!(f, "JsValue::Object(..)"),
            },
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsNumberType {
    Integer(i64),
    Float(f64),
    NaN,
    PositiveInfinity,
    NegativeInfinity,
}

/// Largest magnitude that still round-trips through `i64` without loss.
const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

impl JsNumberType {
    /// Normalizes a float: integral values become `Integer`, specials get their own variants.
    pub fn from_f64(f: f64) -> Self {
        if f.is_nan() {
            JsNumberType::NaN
        } else if f.is_infinite() {
            if f > 0.0 {
                JsNumberType::PositiveInfinity
            } else {
                JsNumberType::NegativeInfinity
            }
        } else if f.fract() == 0.0
            && f.abs() <= MAX_SAFE_INTEGER
            && !(f == 0.0 && f.is_sign_negative())
        {
            JsNumberType::Integer(f as i64)
        } else {
            JsNumberType::Float(f)
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            JsNumberType::Integer(i) => *i as f64,
            JsNumberType::Float(f) => *f,
            JsNumberType::NaN => f64::NAN,
            JsNumberType::PositiveInfinity => f64::INFINITY,
            JsNumberType::NegativeInfinity => f64::NEG_INFINITY,
        }
    }
}

impl Display for JsNumberType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", number_to_string(self))
    }
}
