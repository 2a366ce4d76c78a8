use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::ObjectKind;
use crate::runner::ds::operations::object::get;
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::eval::function::call_function;
use crate::runner::eval::types::EvalContext;

pub const TYPE_STR_UNDEFINED: &str = "undefined";
pub const TYPE_STR_NULL: &str = "null";
pub const TYPE_STR_BOOLEAN: &str = "boolean";
pub const TYPE_STR_STRING: &str = "string";
pub const TYPE_STR_NUMBER: &str = "number";
pub const TYPE_STR_OBJECT: &str = "object";
pub const TYPE_STR_FUNCTION: &str = "function";

/// Result of the `typeof` operator.
pub fn get_type(a: &JsValue) -> &'static str {
    match a {
        JsValue::Undefined => TYPE_STR_UNDEFINED,
        JsValue::Null => TYPE_STR_OBJECT,
        JsValue::Boolean(_) => TYPE_STR_BOOLEAN,
        JsValue::String(_) => TYPE_STR_STRING,
        JsValue::Number(_) => TYPE_STR_NUMBER,
        JsValue::Object(o) => {
            if o.borrow().is_callable() {
                TYPE_STR_FUNCTION
            } else {
                TYPE_STR_OBJECT
            }
        }
    }
}

pub enum PreferredType {
    Default,
    String,
    Number,
}

pub fn to_boolean(v: &JsValue) -> bool {
    match v {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::String(s) => !s.is_empty(),
        JsValue::Number(n) => match n {
            JsNumberType::Integer(i) => *i != 0,
            JsNumberType::Float(f) => *f != 0.0,
            JsNumberType::NaN => false,
            _ => true,
        },
        JsValue::Object(_) => true,
    }
}

/// `OrdinaryToPrimitive`: tries `valueOf`/`toString` in hint order.
pub fn to_primitive(
    ctx: &mut EvalContext,
    v: &JsValue,
    preferred_type: PreferredType,
) -> Result<JsValue, JErrorType> {
    let o = match v {
        JsValue::Object(o) => o.clone(),
        _ => return Ok(v.clone()),
    };
    let method_names = match preferred_type {
        PreferredType::String => ["toString", "valueOf"],
        PreferredType::Default | PreferredType::Number => ["valueOf", "toString"],
    };
    for name in method_names.iter() {
        let method = get(ctx, &o, name)?;
        if method.is_callable() {
            let result = call_function(ctx, &method, v.clone(), vec![])?;
            if !matches!(result, JsValue::Object(_)) {
                return Ok(result);
            }
        }
    }
    Err(JErrorType::TypeError(
        "Cannot convert object to primitive value".to_string(),
    ))
}

pub fn to_number(ctx: &mut EvalContext, v: &JsValue) -> Result<JsNumberType, JErrorType> {
    Ok(match v {
        JsValue::Undefined => JsNumberType::NaN,
        JsValue::Null => JsNumberType::Integer(0),
        JsValue::Boolean(b) => JsNumberType::Integer(if *b { 1 } else { 0 }),
        JsValue::Number(n) => *n,
        JsValue::String(s) => string_to_number(s),
        JsValue::Object(_) => {
            let p = to_primitive(ctx, v, PreferredType::Number)?;
            return to_number(ctx, &p);
        }
    })
}

pub fn string_to_number(s: &str) -> JsNumberType {
    let t = s.trim();
    if t.is_empty() {
        return JsNumberType::Integer(0);
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return match i64::from_str_radix(hex, 16) {
            Ok(i) => JsNumberType::Integer(i),
            Err(_) => JsNumberType::NaN,
        };
    }
    match t {
        "Infinity" | "+Infinity" => return JsNumberType::PositiveInfinity,
        "-Infinity" => return JsNumberType::NegativeInfinity,
        _ => {}
    }
    // Rust accepts "inf"/"nan" spellings that are not numbers here.
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return JsNumberType::NaN;
    }
    match t.parse::<f64>() {
        Ok(f) => JsNumberType::from_f64(f),
        Err(_) => JsNumberType::NaN,
    }
}

pub fn number_to_string(n: &JsNumberType) -> String {
    match n {
        JsNumberType::Integer(i) => i.to_string(),
        JsNumberType::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e21 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        JsNumberType::NaN => "NaN".to_string(),
        JsNumberType::PositiveInfinity => "Infinity".to_string(),
        JsNumberType::NegativeInfinity => "-Infinity".to_string(),
    }
}

pub fn to_string(ctx: &mut EvalContext, v: &JsValue) -> Result<String, JErrorType> {
    Ok(match v {
        JsValue::Object(o) => {
            let is_array = matches!(o.borrow().kind, ObjectKind::Array(_));
            if is_array || o.borrow().traps().is_some() {
                // Arrays join through their own toString; exotic views may not have one.
                match to_primitive(ctx, v, PreferredType::String) {
                    Ok(p) => return to_string(ctx, &p),
                    Err(_) => v.to_string(),
                }
            } else {
                let p = to_primitive(ctx, v, PreferredType::String)?;
                return to_string(ctx, &p);
            }
        }
        _ => v.to_string(),
    })
}

pub fn to_property_key(ctx: &mut EvalContext, v: &JsValue) -> Result<String, JErrorType> {
    match v {
        JsValue::String(s) => Ok(s.clone()),
        _ => to_string(ctx, v),
    }
}

/// Clamps to an integer index, NaN becoming 0.
pub fn to_integer(ctx: &mut EvalContext, v: &JsValue) -> Result<i64, JErrorType> {
    Ok(match to_number(ctx, v)? {
        JsNumberType::Integer(i) => i,
        JsNumberType::Float(f) => f.trunc() as i64,
        JsNumberType::NaN => 0,
        JsNumberType::PositiveInfinity => i64::MAX,
        JsNumberType::NegativeInfinity => i64::MIN,
    })
}
