//! `Object` constructor and `Object.prototype`.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType, PropertyDescriptor};
use crate::runner::ds::operations::object::{
    create_array, create_object, define_property_or_throw, get, get_own_property, has_property,
    own_keys, set,
};
use crate::runner::ds::operations::type_conversion::{to_boolean, to_property_key};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::arg;
use crate::runner::eval::types::{EvalContext, Intrinsics};

use super::{define_global, BuiltInObject};

pub fn register(global: &JsObjectType, intrinsics: &Intrinsics) {
    BuiltInObject::on(intrinsics, &intrinsics.object_prototype)
        .add_method("hasOwnProperty", 1, |ctx, this, args| {
            let o = require_object(&this, "hasOwnProperty")?;
            let key = to_property_key(ctx, &arg(&args, 0))?;
            Ok(JsValue::Boolean(get_own_property(ctx, &o, &key)?.is_some()))
        })
        .add_method("toString", 0, |_ctx, this, _args| {
            Ok(JsValue::String(match &this {
                JsValue::Undefined => "[object Undefined]".to_string(),
                JsValue::Null => "[object Null]".to_string(),
                JsValue::Object(o) => format!("[object {}]", o.borrow().get_class_name()),
                _ => format!("[object {}]", type_tag(&this)),
            }))
        })
        .add_method("valueOf", 0, |_ctx, this, _args| Ok(this));

    let ctor = BuiltInObject::constructor(intrinsics, "Object", 1, |ctx, _this, args| {
        match arg(&args, 0) {
            v @ JsValue::Object(_) => Ok(v),
            _ => Ok(JsValue::Object(create_object(ctx))),
        }
    })
    .add_method("keys", 1, |ctx, _this, args| {
        let o = require_object(&arg(&args, 0), "keys")?;
        let keys = own_keys(ctx, &o)?
            .into_iter()
            .map(JsValue::String)
            .collect();
        Ok(JsValue::Object(create_array(ctx, keys)))
    })
    .add_method("getPrototypeOf", 1, |_ctx, _this, args| {
        let o = require_object(&arg(&args, 0), "getPrototypeOf")?;
        let proto = o.borrow().prototype.clone();
        Ok(proto.map(JsValue::Object).unwrap_or(JsValue::Null))
    })
    .add_method("create", 2, |_ctx, _this, args| {
        let proto = match arg(&args, 0) {
            JsValue::Object(p) => Some(p),
            JsValue::Null => None,
            v => {
                return Err(JErrorType::TypeError(format!(
                    "Object prototype may only be an Object or null: {}",
                    v
                )))
            }
        };
        Ok(JsValue::Object(JsObject::new(proto).into_ref()))
    })
    .add_method("defineProperty", 3, |ctx, _this, args| {
        let target = arg(&args, 0);
        let o = require_object(&target, "defineProperty")?;
        let key = to_property_key(ctx, &arg(&args, 1))?;
        let desc = to_property_descriptor(ctx, &arg(&args, 2))?;
        define_property_or_throw(ctx, &o, &key, desc)?;
        Ok(target)
    })
    .add_method("assign", 2, |ctx, _this, args| {
        let target = arg(&args, 0);
        let o = require_object(&target, "assign")?;
        for source in args.iter().skip(1) {
            if let JsValue::Object(s) = source {
                for key in own_keys(ctx, s)? {
                    let value = get(ctx, s, &key)?;
                    set(ctx, &o, &key, value)?;
                }
            }
        }
        Ok(target)
    });

    let proto = intrinsics.object_prototype.clone();
    let ctor = ctor.build();
    ctor.borrow_mut()
        .insert_hidden("prototype", JsValue::Object(proto.clone()));
    proto
        .borrow_mut()
        .insert_hidden("constructor", JsValue::Object(ctor.clone()));
    define_global(global, "Object", JsValue::Object(ctor));
}

fn type_tag(v: &JsValue) -> &'static str {
    match v {
        JsValue::Boolean(_) => "Boolean",
        JsValue::String(_) => "String",
        JsValue::Number(_) => "Number",
        _ => "Object",
    }
}

fn require_object(v: &JsValue, method: &str) -> Result<JsObjectType, JErrorType> {
    match v {
        JsValue::Object(o) => Ok(o.clone()),
        _ => Err(JErrorType::TypeError(format!(
            "Object.{} called on non-object",
            method
        ))),
    }
}

/// `ToPropertyDescriptor` for data descriptors.
fn to_property_descriptor(
    ctx: &mut EvalContext,
    v: &JsValue,
) -> Result<PropertyDescriptor, JErrorType> {
    let o = match v {
        JsValue::Object(o) => o.clone(),
        _ => {
            return Err(JErrorType::TypeError(format!(
                "Property description must be an object: {}",
                v
            )))
        }
    };
    let mut desc = PropertyDescriptor::default();
    if has_property(ctx, &o, "value")? {
        desc.value = Some(get(ctx, &o, "value")?);
    }
    desc.writable = read_flag(ctx, &o, "writable")?;
    desc.enumerable = read_flag(ctx, &o, "enumerable")?;
    desc.configurable = read_flag(ctx, &o, "configurable")?;
    Ok(desc)
}

fn read_flag(ctx: &mut EvalContext, o: &JsObjectType, name: &str) -> Result<Option<bool>, JErrorType> {
    if has_property(ctx, o, name)? {
        Ok(Some(to_boolean(&get(ctx, o, name)?)))
    } else {
        Ok(None)
    }
}
