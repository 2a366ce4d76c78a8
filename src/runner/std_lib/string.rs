//! `String.prototype` methods. Receivers are converted with `ToString`, so
//! the methods work on primitives through `GetV` boxing.

use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::object::create_array;
use crate::runner::ds::operations::type_conversion::{to_integer, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::arg;
use crate::runner::eval::types::Intrinsics;

use super::BuiltInObject;

pub fn register(_global: &JsObjectType, intrinsics: &Intrinsics) {
    BuiltInObject::on(intrinsics, &intrinsics.string_prototype)
        .add_method("toString", 0, |ctx, this, _args| {
            Ok(JsValue::String(to_string(ctx, &this)?))
        })
        .add_method("indexOf", 1, |ctx, this, args| {
            let s = to_string(ctx, &this)?;
            let needle = to_string(ctx, &arg(&args, 0))?;
            Ok(JsValue::from_i64(match s.find(&needle) {
                Some(byte) => s[..byte].chars().count() as i64,
                None => -1,
            }))
        })
        .add_method("includes", 1, |ctx, this, args| {
            let s = to_string(ctx, &this)?;
            let needle = to_string(ctx, &arg(&args, 0))?;
            Ok(JsValue::Boolean(s.contains(&needle)))
        })
        .add_method("startsWith", 1, |ctx, this, args| {
            let s = to_string(ctx, &this)?;
            let needle = to_string(ctx, &arg(&args, 0))?;
            Ok(JsValue::Boolean(s.starts_with(&needle)))
        })
        .add_method("endsWith", 1, |ctx, this, args| {
            let s = to_string(ctx, &this)?;
            let needle = to_string(ctx, &arg(&args, 0))?;
            Ok(JsValue::Boolean(s.ends_with(&needle)))
        })
        .add_method("slice", 2, |ctx, this, args| {
            let chars: Vec<char> = to_string(ctx, &this)?.chars().collect();
            let len = chars.len() as i64;
            let clamp = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
            let start = clamp(to_integer(ctx, &arg(&args, 0))?);
            let end = match arg(&args, 1) {
                JsValue::Undefined => len,
                v => clamp(to_integer(ctx, &v)?),
            };
            Ok(JsValue::String(if start < end {
                chars[start as usize..end as usize].iter().collect()
            } else {
                String::new()
            }))
        })
        .add_method("toUpperCase", 0, |ctx, this, _args| {
            Ok(JsValue::String(to_string(ctx, &this)?.to_uppercase()))
        })
        .add_method("toLowerCase", 0, |ctx, this, _args| {
            Ok(JsValue::String(to_string(ctx, &this)?.to_lowercase()))
        })
        .add_method("trim", 0, |ctx, this, _args| {
            Ok(JsValue::String(to_string(ctx, &this)?.trim().to_string()))
        })
        .add_method("split", 1, |ctx, this, args| {
            let s = to_string(ctx, &this)?;
            let parts: Vec<JsValue> = match arg(&args, 0) {
                JsValue::Undefined => vec![JsValue::String(s)],
                sep => {
                    let sep = to_string(ctx, &sep)?;
                    if sep.is_empty() {
                        s.chars().map(|c| JsValue::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(JsValue::from_str).collect()
                    }
                }
            };
            Ok(JsValue::Object(create_array(ctx, parts)))
        });
}
