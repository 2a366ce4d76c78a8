//! Error built-in objects.
//!
//! Provides Error, TypeError, ReferenceError, SyntaxError, RangeError constructors.
//! Calling a constructor with or without `new` yields a fresh error object.

use crate::runner::ds::object::{JsObject, JsObjectType};
use crate::runner::ds::operations::object::get;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, create_native_constructor};
use crate::runner::eval::types::{EvalContext, Intrinsics, ValueResult};

use super::{define_global, BuiltInObject};

/// Register all error types on `global`.
pub fn register(global: &JsObjectType, intrinsics: &Intrinsics) {
    BuiltInObject::on(intrinsics, &intrinsics.error_prototype)
        .add_hidden_value("message", JsValue::from_str(""))
        .add_method("toString", 0, |ctx, this, _args| {
            let o = match &this {
                JsValue::Object(o) => o.clone(),
                _ => return Ok(JsValue::from_str("Error")),
            };
            let name = get(ctx, &o, "name")?;
            let name = to_string(ctx, &name)?;
            let message = get(ctx, &o, "message")?;
            let message = to_string(ctx, &message)?;
            Ok(JsValue::String(if message.is_empty() {
                name
            } else {
                format!("{}: {}", name, message)
            }))
        });

    let kinds = [
        ("Error", &intrinsics.error_prototype),
        ("TypeError", &intrinsics.type_error_prototype),
        ("ReferenceError", &intrinsics.reference_error_prototype),
        ("RangeError", &intrinsics.range_error_prototype),
        ("SyntaxError", &intrinsics.syntax_error_prototype),
    ];
    for (name, proto) in kinds.iter() {
        let instance_proto = (*proto).clone();
        let ctor = create_native_constructor(intrinsics, name, 1, move |ctx, _this, args| {
            new_error(ctx, &instance_proto, &args)
        });
        ctor.borrow_mut()
            .insert_hidden("prototype", JsValue::Object((*proto).clone()));
        {
            let mut p = proto.borrow_mut();
            p.insert_hidden("constructor", JsValue::Object(ctor.clone()));
            p.insert_hidden("name", JsValue::from_str(name));
        }
        define_global(global, name, JsValue::Object(ctor));
    }
}

fn new_error(ctx: &mut EvalContext, proto: &JsObjectType, args: &[JsValue]) -> ValueResult {
    let mut error = JsObject::new(Some(proto.clone())).class("Error");
    match arg(args, 0) {
        JsValue::Undefined => {}
        message => {
            let message = to_string(ctx, &message)?;
            error.insert_hidden("message", JsValue::String(message));
        }
    }
    Ok(JsValue::Object(error.into_ref()))
}
