use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{to_number, to_primitive, PreferredType};
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::eval::types::EvalContext;

fn same_number(a: &JsNumberType, b: &JsNumberType, nan_equal: bool) -> bool {
    match (a, b) {
        (JsNumberType::NaN, JsNumberType::NaN) => nan_equal,
        (JsNumberType::NaN, _) | (_, JsNumberType::NaN) => false,
        _ => a.to_f64() == b.to_f64(),
    }
}

fn is_same_value(a: &JsValue, b: &JsValue, strict_mode: bool) -> bool {
    match (a, b) {
        (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
        (JsValue::Boolean(x), JsValue::Boolean(y)) => x == y,
        (JsValue::String(x), JsValue::String(y)) => x == y,
        (JsValue::Number(x), JsValue::Number(y)) => same_number(x, y, !strict_mode),
        (JsValue::Object(x), JsValue::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// `SameValue`: like `===` but NaN equals NaN.
pub fn same_value(a: &JsValue, b: &JsValue) -> bool {
    is_same_value(a, b, false)
}

pub fn strict_equality_comparison(a: &JsValue, b: &JsValue) -> bool {
    is_same_value(a, b, true)
}

pub fn abstract_equality_comparison(
    ctx: &mut EvalContext,
    a: &JsValue,
    b: &JsValue,
) -> Result<bool, JErrorType> {
    Ok(match (a, b) {
        (JsValue::Undefined, JsValue::Null) | (JsValue::Null, JsValue::Undefined) => true,
        (JsValue::Number(_), JsValue::String(_))
        | (JsValue::String(_), JsValue::Number(_))
        | (JsValue::Boolean(_), _)
        | (_, JsValue::Boolean(_))
            if !a.is_nullish() && !b.is_nullish() =>
        {
            let x = to_number(ctx, a)?;
            let y = to_number(ctx, b)?;
            same_number(&x, &y, false)
        }
        (JsValue::Object(_), JsValue::Object(_)) => strict_equality_comparison(a, b),
        (JsValue::Object(_), JsValue::Number(_)) | (JsValue::Object(_), JsValue::String(_)) => {
            let p = to_primitive(ctx, a, PreferredType::Default)?;
            abstract_equality_comparison(ctx, &p, b)?
        }
        (JsValue::Number(_), JsValue::Object(_)) | (JsValue::String(_), JsValue::Object(_)) => {
            let p = to_primitive(ctx, b, PreferredType::Default)?;
            abstract_equality_comparison(ctx, a, &p)?
        }
        _ => strict_equality_comparison(a, b),
    })
}
