use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{
    array_index, JsObject, JsObjectType, ObjectKind, Property, PropertyDescriptor, MAX_DENSE_LENGTH,
};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalContext;

/// `[[Get]]` along the prototype chain. Exotic objects answer for themselves.
pub fn get(ctx: &mut EvalContext, o: &JsObjectType, key: &str) -> Result<JsValue, JErrorType> {
    let mut current = o.clone();
    loop {
        let traps = current.borrow().traps();
        if let Some(traps) = traps {
            return traps.get(ctx, key);
        }
        let next = {
            let obj = current.borrow();
            if let Some(v) = obj.get_own_value(key) {
                return Ok(v);
            }
            obj.prototype.clone()
        };
        match next {
            Some(p) => current = p,
            None => return Ok(JsValue::Undefined),
        }
    }
}

/// `GetV`: property read on any value, boxing strings on the fly.
pub fn get_v(ctx: &mut EvalContext, v: &JsValue, key: &str) -> Result<JsValue, JErrorType> {
    match v {
        JsValue::Object(o) => get(ctx, o, key),
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
            "Cannot read properties of {} (reading '{}')",
            v, key
        ))),
        JsValue::String(s) => {
            if key == "length" {
                return Ok(JsValue::from_i64(s.chars().count() as i64));
            }
            if let Some(i) = array_index(key) {
                return Ok(s
                    .chars()
                    .nth(i)
                    .map(|c| JsValue::String(c.to_string()))
                    .unwrap_or(JsValue::Undefined));
            }
            let proto = ctx.intrinsics.string_prototype.clone();
            get(ctx, &proto, key)
        }
        _ => {
            let proto = ctx.intrinsics.object_prototype.clone();
            get(ctx, &proto, key)
        }
    }
}

/// `[[Set]]` for data properties. Returns `false` when the write is refused.
pub fn set(
    ctx: &mut EvalContext,
    o: &JsObjectType,
    key: &str,
    value: JsValue,
) -> Result<bool, JErrorType> {
    let traps = o.borrow().traps();
    if let Some(traps) = traps {
        return traps.set(ctx, key, value);
    }
    let mut obj = o.borrow_mut();
    if let ObjectKind::Array(elements) = &mut obj.kind {
        if key == "length" {
            if let JsValue::Number(n) = &value {
                let len = n.to_f64();
                if len < 0.0 || len.fract() != 0.0 || len > f64::from(u32::MAX) {
                    return Err(JErrorType::RangeError("Invalid array length".to_string()));
                }
                let len = len as usize;
                if len > MAX_DENSE_LENGTH {
                    return Err(too_long());
                }
                elements.resize(len, JsValue::Undefined);
                return Ok(true);
            }
        }
        if let Some(index) = array_index(key) {
            if index >= elements.len() {
                if index >= MAX_DENSE_LENGTH {
                    return Err(too_long());
                }
                elements.resize(index + 1, JsValue::Undefined);
            }
            elements[index] = value;
            return Ok(true);
        }
    }
    if let Some(existing) = obj.properties.get_mut(key) {
        if !existing.writable {
            return Ok(false);
        }
        existing.value = value;
        return Ok(true);
    }
    if !obj.extensible {
        return Ok(false);
    }
    obj.properties.insert(key.to_string(), Property::data(value));
    Ok(true)
}

fn too_long() -> JErrorType {
    JErrorType::RangeError(format!(
        "Array length exceeds the supported maximum of {}",
        MAX_DENSE_LENGTH
    ))
}

pub fn has_property(ctx: &mut EvalContext, o: &JsObjectType, key: &str) -> Result<bool, JErrorType> {
    let mut current = o.clone();
    loop {
        let traps = current.borrow().traps();
        if let Some(traps) = traps {
            return traps.has(ctx, key);
        }
        let next = {
            let obj = current.borrow();
            if obj.get_own_property(key).is_some() {
                return Ok(true);
            }
            obj.prototype.clone()
        };
        match next {
            Some(p) => current = p,
            None => return Ok(false),
        }
    }
}

pub fn get_own_property(
    ctx: &mut EvalContext,
    o: &JsObjectType,
    key: &str,
) -> Result<Option<PropertyDescriptor>, JErrorType> {
    let traps = o.borrow().traps();
    match traps {
        Some(traps) => traps.get_own_property(ctx, key),
        None => Ok(o
            .borrow()
            .get_own_property(key)
            .map(|p| PropertyDescriptor::from(&p))),
    }
}

pub fn has_own_property(
    ctx: &mut EvalContext,
    o: &JsObjectType,
    key: &str,
) -> Result<bool, JErrorType> {
    Ok(get_own_property(ctx, o, key)?.is_some())
}

pub fn define_property(
    ctx: &mut EvalContext,
    o: &JsObjectType,
    key: &str,
    desc: PropertyDescriptor,
) -> Result<bool, JErrorType> {
    let traps = o.borrow().traps();
    if let Some(traps) = traps {
        return traps.define_property(ctx, key, desc);
    }
    if o.borrow().is_array() && (key == "length" || array_index(key).is_some()) {
        return match desc.value {
            Some(v) => set(ctx, o, key, v),
            None => Ok(true),
        };
    }
    let mut obj = o.borrow_mut();
    if let Some(existing) = obj.properties.get_mut(key) {
        if !existing.configurable {
            // Only a value change on a writable property is allowed.
            let only_value = desc.enumerable.is_none()
                && desc.configurable.is_none()
                && desc.writable.map_or(true, |w| w == existing.writable);
            if !(existing.writable && only_value) {
                return Ok(false);
            }
        }
        desc.merge_into(existing);
        return Ok(true);
    }
    if !obj.extensible {
        return Ok(false);
    }
    obj.properties.insert(key.to_string(), desc.to_property());
    Ok(true)
}

/// `defineProperty` that turns refusal into a TypeError.
pub fn define_property_or_throw(
    ctx: &mut EvalContext,
    o: &JsObjectType,
    key: &str,
    desc: PropertyDescriptor,
) -> Result<(), JErrorType> {
    if define_property(ctx, o, key, desc)? {
        Ok(())
    } else {
        Err(JErrorType::TypeError(format!(
            "Cannot redefine property: {}",
            key
        )))
    }
}

pub fn delete_property(
    ctx: &mut EvalContext,
    o: &JsObjectType,
    key: &str,
) -> Result<bool, JErrorType> {
    let traps = o.borrow().traps();
    if let Some(traps) = traps {
        return traps.delete_property(ctx, key);
    }
    let mut obj = o.borrow_mut();
    if let ObjectKind::Array(elements) = &mut obj.kind {
        if key == "length" {
            return Ok(false);
        }
        if let Some(index) = array_index(key) {
            if index < elements.len() {
                elements[index] = JsValue::Undefined;
            }
            return Ok(true);
        }
    }
    let configurable = obj.properties.get(key).map(|p| p.configurable);
    match configurable {
        Some(false) => Ok(false),
        Some(true) => {
            obj.properties.shift_remove(key);
            Ok(true)
        }
        None => Ok(true),
    }
}

/// Enumerable own keys in insertion order, array indices first.
pub fn own_keys(ctx: &mut EvalContext, o: &JsObjectType) -> Result<Vec<String>, JErrorType> {
    let traps = o.borrow().traps();
    if let Some(traps) = traps {
        return traps.own_keys(ctx);
    }
    let obj = o.borrow();
    let mut keys = vec![];
    if let ObjectKind::Array(elements) = &obj.kind {
        keys.extend((0..elements.len()).map(|i| i.to_string()));
    }
    keys.extend(
        obj.properties
            .iter()
            .filter(|(_, p)| p.enumerable)
            .map(|(k, _)| k.clone()),
    );
    Ok(keys)
}

pub fn create_object(ctx: &EvalContext) -> JsObjectType {
    JsObject::new(Some(ctx.intrinsics.object_prototype.clone())).into_ref()
}

pub fn create_array(ctx: &EvalContext, elements: Vec<JsValue>) -> JsObjectType {
    JsObject::with_kind(
        ObjectKind::Array(elements),
        Some(ctx.intrinsics.array_prototype.clone()),
    )
    .into_ref()
}

/// Elements of an array object, or `None` for anything else.
pub fn array_elements(v: &JsValue) -> Option<Vec<JsValue>> {
    match v {
        JsValue::Object(o) => match &o.borrow().kind {
            ObjectKind::Array(elements) => Some(elements.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Walks `v`'s prototype chain looking for `proto`.
pub fn is_prototype_in_chain(v: &JsValue, proto: &JsObjectType) -> bool {
    let mut current = match v {
        JsValue::Object(o) => o.borrow().prototype.clone(),
        _ => None,
    };
    while let Some(p) = current {
        if std::rc::Rc::ptr_eq(&p, proto) {
            return true;
        }
        current = p.borrow().prototype.clone();
    }
    false
}
