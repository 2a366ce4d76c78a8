//! `Array` constructor and `Array.prototype`.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObjectType, ObjectKind};
use crate::runner::ds::operations::object::{array_elements, create_array};
use crate::runner::ds::operations::test_and_comparison::{same_value, strict_equality_comparison};
use crate::runner::ds::operations::type_conversion::{to_boolean, to_integer, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, call_function};
use crate::runner::eval::types::{EvalContext, Intrinsics};

use super::{define_global, BuiltInObject};

pub fn register(global: &JsObjectType, intrinsics: &Intrinsics) {
    BuiltInObject::on(intrinsics, &intrinsics.array_prototype)
        .add_method("push", 1, |_ctx, this, args| {
            let o = this_array(&this, "push")?;
            let mut obj = o.borrow_mut();
            match &mut obj.kind {
                ObjectKind::Array(elements) => {
                    elements.extend(args);
                    Ok(JsValue::from_i64(elements.len() as i64))
                }
                _ => Ok(JsValue::Undefined),
            }
        })
        .add_method("pop", 0, |_ctx, this, _args| {
            let o = this_array(&this, "pop")?;
            let mut obj = o.borrow_mut();
            match &mut obj.kind {
                ObjectKind::Array(elements) => Ok(elements.pop().unwrap_or(JsValue::Undefined)),
                _ => Ok(JsValue::Undefined),
            }
        })
        .add_method("indexOf", 1, |_ctx, this, args| {
            let elements = elements_of(&this, "indexOf")?;
            let needle = arg(&args, 0);
            Ok(JsValue::from_i64(
                elements
                    .iter()
                    .position(|e| strict_equality_comparison(e, &needle))
                    .map(|i| i as i64)
                    .unwrap_or(-1),
            ))
        })
        .add_method("includes", 1, |_ctx, this, args| {
            let elements = elements_of(&this, "includes")?;
            let needle = arg(&args, 0);
            Ok(JsValue::Boolean(
                elements.iter().any(|e| same_value(e, &needle)),
            ))
        })
        .add_method("join", 1, |ctx, this, args| {
            let elements = elements_of(&this, "join")?;
            let separator = match arg(&args, 0) {
                JsValue::Undefined => ",".to_string(),
                v => to_string(ctx, &v)?,
            };
            join(ctx, &elements, &separator)
        })
        .add_method("toString", 0, |ctx, this, _args| {
            let elements = elements_of(&this, "toString")?;
            join(ctx, &elements, ",")
        })
        .add_method("slice", 2, |ctx, this, args| {
            let elements = elements_of(&this, "slice")?;
            let len = elements.len() as i64;
            let clamp = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
            let start = clamp(to_integer(ctx, &arg(&args, 0))?);
            let end = match arg(&args, 1) {
                JsValue::Undefined => len,
                v => clamp(to_integer(ctx, &v)?),
            };
            let slice = if start < end {
                elements[start as usize..end as usize].to_vec()
            } else {
                vec![]
            };
            Ok(JsValue::Object(create_array(ctx, slice)))
        })
        .add_method("forEach", 1, |ctx, this, args| {
            let callback = arg(&args, 0);
            for (i, e) in elements_of(&this, "forEach")?.into_iter().enumerate() {
                call_function(
                    ctx,
                    &callback,
                    JsValue::Undefined,
                    vec![e, JsValue::from_i64(i as i64), this.clone()],
                )?;
            }
            Ok(JsValue::Undefined)
        })
        .add_method("map", 1, |ctx, this, args| {
            let callback = arg(&args, 0);
            let mut out = vec![];
            for (i, e) in elements_of(&this, "map")?.into_iter().enumerate() {
                out.push(call_function(
                    ctx,
                    &callback,
                    JsValue::Undefined,
                    vec![e, JsValue::from_i64(i as i64), this.clone()],
                )?);
            }
            Ok(JsValue::Object(create_array(ctx, out)))
        })
        .add_method("filter", 1, |ctx, this, args| {
            let callback = arg(&args, 0);
            let mut out = vec![];
            for (i, e) in elements_of(&this, "filter")?.into_iter().enumerate() {
                let keep = call_function(
                    ctx,
                    &callback,
                    JsValue::Undefined,
                    vec![e.clone(), JsValue::from_i64(i as i64), this.clone()],
                )?;
                if to_boolean(&keep) {
                    out.push(e);
                }
            }
            Ok(JsValue::Object(create_array(ctx, out)))
        });

    let ctor = BuiltInObject::constructor(intrinsics, "Array", 1, |ctx, _this, args| {
        Ok(JsValue::Object(create_array(ctx, args)))
    })
    .add_method("isArray", 1, |_ctx, _this, args| {
        Ok(JsValue::Boolean(array_elements(&arg(&args, 0)).is_some()))
    })
    .build();
    let proto = intrinsics.array_prototype.clone();
    ctor.borrow_mut()
        .insert_hidden("prototype", JsValue::Object(proto.clone()));
    proto
        .borrow_mut()
        .insert_hidden("constructor", JsValue::Object(ctor.clone()));
    define_global(global, "Array", JsValue::Object(ctor));
}

fn this_array(this: &JsValue, method: &str) -> Result<JsObjectType, JErrorType> {
    match this {
        JsValue::Object(o) if o.borrow().is_array() => Ok(o.clone()),
        _ => Err(JErrorType::TypeError(format!(
            "Array.prototype.{} called on non-array",
            method
        ))),
    }
}

fn elements_of(this: &JsValue, method: &str) -> Result<Vec<JsValue>, JErrorType> {
    array_elements(this).ok_or_else(|| {
        JErrorType::TypeError(format!(
            "Array.prototype.{} called on non-array",
            method
        ))
    })
}

fn join(ctx: &mut EvalContext, elements: &[JsValue], separator: &str) -> Result<JsValue, JErrorType> {
    let mut parts = Vec::with_capacity(elements.len());
    for e in elements {
        parts.push(if e.is_nullish() {
            String::new()
        } else {
            to_string(ctx, e)?
        });
    }
    Ok(JsValue::String(parts.join(separator)))
}
