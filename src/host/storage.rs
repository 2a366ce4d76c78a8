//! `localStorage` / `sessionStorage`.
//!
//! A [`StorageArea`] holds the items; scripts see it through a
//! [`StorageView`], an exotic object that maps property access onto items
//! and can confine itself to keys under a prefix.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType, PropertyDescriptor, PropertyTraps};
use crate::runner::ds::operations::type_conversion::{to_integer, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, create_native_function};
use crate::runner::eval::types::{EvalContext, Intrinsics};
use crate::runner::std_lib::define_global;

const METHODS: [&str; 5] = ["getItem", "setItem", "removeItem", "clear", "key"];

#[derive(Default)]
pub struct StorageArea {
    items: RefCell<IndexMap<String, String>>,
}

impl StorageArea {
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: &str) {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove_item(&self, key: &str) -> bool {
        self.items.borrow_mut().shift_remove(key).is_some()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

/// Script-facing view of a storage area, optionally confined to `prefix`.
pub struct StorageView {
    area: Rc<StorageArea>,
    prefix: String,
    methods: IndexMap<String, JsValue>,
}

impl StorageView {
    fn scoped_keys(area: &StorageArea, prefix: &str) -> Vec<String> {
        area.keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(prefix).map(|s| s.to_string()))
            .collect()
    }

    /// Builds the view object. The methods close over the area and prefix,
    /// so they keep working when called with a foreign `this`.
    pub fn create(intrinsics: &Intrinsics, area: &Rc<StorageArea>, prefix: &str) -> JsObjectType {
        let mut methods = IndexMap::new();
        for name in METHODS.iter() {
            let area = area.clone();
            let prefix = prefix.to_string();
            let method = *name;
            let f = create_native_function(intrinsics, name, 1, move |ctx, _this, args| {
                storage_method(ctx, &area, &prefix, method, &args)
            });
            methods.insert(name.to_string(), JsValue::Object(f));
        }
        let view = StorageView {
            area: area.clone(),
            prefix: prefix.to_string(),
            methods,
        };
        JsObject::exotic(Rc::new(view), Some(intrinsics.object_prototype.clone())).into_ref()
    }
}

fn storage_method(
    ctx: &mut EvalContext,
    area: &StorageArea,
    prefix: &str,
    method: &str,
    args: &[JsValue],
) -> Result<JsValue, JErrorType> {
    Ok(match method {
        "getItem" => {
            let key = to_string(ctx, &arg(args, 0))?;
            area.get_item(&format!("{}{}", prefix, key))
                .map(JsValue::String)
                .unwrap_or(JsValue::Null)
        }
        "setItem" => {
            let key = to_string(ctx, &arg(args, 0))?;
            let value = to_string(ctx, &arg(args, 1))?;
            area.set_item(&format!("{}{}", prefix, key), &value);
            JsValue::Undefined
        }
        "removeItem" => {
            let key = to_string(ctx, &arg(args, 0))?;
            area.remove_item(&format!("{}{}", prefix, key));
            JsValue::Undefined
        }
        "clear" => {
            for key in StorageView::scoped_keys(area, prefix) {
                area.remove_item(&format!("{}{}", prefix, key));
            }
            JsValue::Undefined
        }
        _ => {
            let index = to_integer(ctx, &arg(args, 0))?;
            let keys = StorageView::scoped_keys(area, prefix);
            if index < 0 {
                JsValue::Null
            } else {
                keys.get(index as usize)
                    .cloned()
                    .map(JsValue::String)
                    .unwrap_or(JsValue::Null)
            }
        }
    })
}

impl PropertyTraps for StorageView {
    fn get(&self, _ctx: &mut EvalContext, key: &str) -> Result<JsValue, JErrorType> {
        if let Some(m) = self.methods.get(key) {
            return Ok(m.clone());
        }
        if key == "length" {
            return Ok(JsValue::from_i64(
                StorageView::scoped_keys(&self.area, &self.prefix).len() as i64,
            ));
        }
        Ok(self
            .area
            .get_item(&format!("{}{}", self.prefix, key))
            .map(JsValue::String)
            .unwrap_or(JsValue::Undefined))
    }

    fn set(&self, ctx: &mut EvalContext, key: &str, value: JsValue) -> Result<bool, JErrorType> {
        if self.methods.contains_key(key) || key == "length" {
            return Ok(false);
        }
        let value = to_string(ctx, &value)?;
        self.area.set_item(&format!("{}{}", self.prefix, key), &value);
        Ok(true)
    }

    fn has(&self, _ctx: &mut EvalContext, key: &str) -> Result<bool, JErrorType> {
        Ok(self.methods.contains_key(key)
            || key == "length"
            || self
                .area
                .get_item(&format!("{}{}", self.prefix, key))
                .is_some())
    }

    fn get_own_property(
        &self,
        _ctx: &mut EvalContext,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>, JErrorType> {
        Ok(self
            .area
            .get_item(&format!("{}{}", self.prefix, key))
            .map(|v| PropertyDescriptor::from_value(JsValue::String(v))))
    }

    fn define_property(
        &self,
        ctx: &mut EvalContext,
        key: &str,
        desc: PropertyDescriptor,
    ) -> Result<bool, JErrorType> {
        match desc.value {
            Some(v) => self.set(ctx, key, v),
            None => Ok(true),
        }
    }

    fn delete_property(&self, _ctx: &mut EvalContext, key: &str) -> Result<bool, JErrorType> {
        self.area.remove_item(&format!("{}{}", self.prefix, key));
        Ok(true)
    }

    fn own_keys(&self, _ctx: &mut EvalContext) -> Result<Vec<String>, JErrorType> {
        Ok(StorageView::scoped_keys(&self.area, &self.prefix))
    }

    fn class_name(&self) -> String {
        "Storage".to_string()
    }
}

/// Installs both storage areas on `global` and returns them.
pub fn install(global: &JsObjectType, intrinsics: &Intrinsics) -> (Rc<StorageArea>, Rc<StorageArea>) {
    let local = Rc::new(StorageArea::default());
    let session = Rc::new(StorageArea::default());
    define_global(
        global,
        "localStorage",
        JsValue::Object(StorageView::create(intrinsics, &local, "")),
    );
    define_global(
        global,
        "sessionStorage",
        JsValue::Object(StorageView::create(intrinsics, &session, "")),
    );
    (local, session)
}
