//! The virtual global.
//!
//! A [`VirtualGlobal`] is a pair of exotic objects sharing one
//! [`GlobalState`]: the privileged view, which backs the object environment
//! guest code runs in, and the guest view handed out as `window`, `self` and
//! `globalThis`. Both route every property operation through the
//! classifier:
//!
//! * override names always come from the sandbox's backing store;
//! * protected names always go to the real global;
//! * insulated names never touch the real global, a first read defines an
//!   `undefined` placeholder in the store;
//! * anything else is read from the store when the sandbox has its own
//!   binding and from the real global otherwise, and is written to the store.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::runner::ds::env_record::{Scope, ScopeRef};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType, PropertyDescriptor, PropertyTraps};
use crate::runner::ds::operations::object::{
    define_property, delete_property, get, get_own_property, has_property, own_keys, set,
};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalContext;

use super::classifier::VariableClassifier;
use super::SandboxId;

pub const DEBUG_SANDBOX_KEY: &str = "__debug_sandbox__";

/// Self references put on every virtual global, all pointing at the guest view.
const SELF_NAMES: [&str; 5] = ["self", "window", "globalThis", "top", "parent"];

pub struct GlobalState {
    real: JsObjectType,
    store: JsObjectType,
    classifier: Rc<VariableClassifier>,
    override_names: HashSet<String>,
    /// Names the guest declared itself after start-up.
    external: RefCell<HashSet<String>>,
    init_complete: Cell<bool>,
    /// Names bound in the optimisation prelude.
    optimized: RefCell<Vec<String>>,
    prelude_scopes: RefCell<Vec<Weak<RefCell<Scope>>>>,
    sandbox_id: SandboxId,
}

impl GlobalState {
    fn store_has(&self, key: &str) -> bool {
        self.store.borrow().get_own_property(key).is_some()
    }

    fn store_value(&self, key: &str) -> JsValue {
        self.store
            .borrow()
            .get_own_value(key)
            .unwrap_or(JsValue::Undefined)
    }

    fn read(&self, ctx: &mut EvalContext, key: &str) -> Result<JsValue, JErrorType> {
        if self.override_names.contains(key) {
            return Ok(self.store_value(key));
        }
        if self.classifier.is_protected(key) {
            return get(ctx, &self.real, key);
        }
        if self.classifier.is_insulated(key) {
            if !self.store_has(key) {
                self.store.borrow_mut().insert(key, JsValue::Undefined);
            }
            return Ok(self.store_value(key));
        }
        if self.store_has(key) {
            return Ok(self.store_value(key));
        }
        get(ctx, &self.real, key)
    }

    fn note_declared(&self, key: &str) {
        if self.init_complete.get()
            && !self.override_names.contains(key)
            && !self.classifier.is_insulated(key)
        {
            self.external.borrow_mut().insert(key.to_string());
        }
    }

    fn write(&self, ctx: &mut EvalContext, key: &str, value: JsValue) -> Result<bool, JErrorType> {
        if self.classifier.is_protected(key) {
            return set(ctx, &self.real, key, value);
        }
        self.note_declared(key);
        let written = set(ctx, &self.store, key, value.clone())?;
        if written {
            self.refresh_prelude(key, &value);
        }
        Ok(written)
    }

    fn define(&self, ctx: &mut EvalContext, key: &str, desc: PropertyDescriptor) -> Result<bool, JErrorType> {
        if self.classifier.is_protected(key) {
            return define_property(ctx, &self.real, key, desc);
        }
        self.note_declared(key);
        let value = desc.value.clone();
        let defined = define_property(ctx, &self.store, key, desc)?;
        if let (true, Some(v)) = (defined, value) {
            self.refresh_prelude(key, &v);
        }
        Ok(defined)
    }

    fn delete(&self, ctx: &mut EvalContext, key: &str) -> Result<bool, JErrorType> {
        if self.classifier.is_protected(key) {
            return Ok(false);
        }
        self.external.borrow_mut().remove(key);
        delete_property(ctx, &self.store, key)
    }

    fn own_property(&self, ctx: &mut EvalContext, key: &str) -> Result<Option<PropertyDescriptor>, JErrorType> {
        if self.classifier.is_protected(key) {
            return get_own_property(ctx, &self.real, key);
        }
        if let Some(p) = self.store.borrow().get_own_property(key) {
            return Ok(Some(PropertyDescriptor::from(&p)));
        }
        if self.override_names.contains(key) || self.classifier.is_insulated(key) {
            return Ok(None);
        }
        get_own_property(ctx, &self.real, key)
    }

    fn keys(&self, ctx: &mut EvalContext) -> Result<Vec<String>, JErrorType> {
        let mut keys = own_keys(ctx, &self.store)?;
        for key in own_keys(ctx, &self.real)? {
            if !keys.contains(&key) && !self.classifier.is_insulated(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Pushes a new value of an optimised name into every live prelude.
    fn refresh_prelude(&self, key: &str, value: &JsValue) {
        if !self.optimized.borrow().iter().any(|n| n == key) {
            return;
        }
        let mut scopes = self.prelude_scopes.borrow_mut();
        scopes.retain(|w| w.strong_count() > 0);
        for scope in scopes.iter().filter_map(|w| w.upgrade()) {
            if let Ok(mut scope) = scope.try_borrow_mut() {
                if scope.has_own_binding(key) {
                    trace!(name = key, "prelude binding refreshed");
                    let _ = scope.set_mutable_binding(key, value.clone());
                }
            }
        }
    }
}

/// One view of the virtual global.
struct GlobalInterceptor {
    state: Rc<GlobalState>,
    privileged: bool,
}

impl PropertyTraps for GlobalInterceptor {
    fn get(&self, ctx: &mut EvalContext, key: &str) -> Result<JsValue, JErrorType> {
        if self.privileged && key == DEBUG_SANDBOX_KEY {
            return Ok(JsValue::from_i64(i64::from(self.state.sandbox_id)));
        }
        self.state.read(ctx, key)
    }

    fn set(&self, ctx: &mut EvalContext, key: &str, value: JsValue) -> Result<bool, JErrorType> {
        self.state.write(ctx, key, value)
    }

    fn has(&self, ctx: &mut EvalContext, key: &str) -> Result<bool, JErrorType> {
        let state = &self.state;
        if self.privileged {
            // Backs the guest's scope: everything but protected names is
            // answered here, so free variables never fall through to the host.
            if state.classifier.is_protected(key) {
                return has_property(ctx, &state.real, key);
            }
            return Ok(true);
        }
        // Insulated names always resolve, to a placeholder if nothing else.
        if state.store_has(key)
            || state.override_names.contains(key)
            || state.classifier.is_insulated(key)
        {
            return Ok(true);
        }
        has_property(ctx, &state.real, key)
    }

    fn get_own_property(
        &self,
        ctx: &mut EvalContext,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>, JErrorType> {
        self.state.own_property(ctx, key)
    }

    fn define_property(
        &self,
        ctx: &mut EvalContext,
        key: &str,
        desc: PropertyDescriptor,
    ) -> Result<bool, JErrorType> {
        self.state.define(ctx, key, desc)
    }

    fn delete_property(&self, ctx: &mut EvalContext, key: &str) -> Result<bool, JErrorType> {
        self.state.delete(ctx, key)
    }

    fn own_keys(&self, ctx: &mut EvalContext) -> Result<Vec<String>, JErrorType> {
        self.state.keys(ctx)
    }

    fn class_name(&self) -> String {
        "Window".to_string()
    }

    fn unwrap_target(&self) -> Option<JsObjectType> {
        Some(self.state.real.clone())
    }
}

pub struct VirtualGlobal {
    state: Rc<GlobalState>,
    privileged: JsObjectType,
    guest: JsObjectType,
}

impl VirtualGlobal {
    pub fn new(
        real: &JsObjectType,
        classifier: Rc<VariableClassifier>,
        override_names: HashSet<String>,
        sandbox_id: SandboxId,
    ) -> Self {
        let state = Rc::new(GlobalState {
            real: real.clone(),
            store: JsObject::new(None).into_ref(),
            classifier,
            override_names,
            external: RefCell::new(HashSet::new()),
            init_complete: Cell::new(false),
            optimized: RefCell::new(vec![]),
            prelude_scopes: RefCell::new(vec![]),
            sandbox_id,
        });
        let prototype = real.borrow().prototype.clone();
        let view = |privileged: bool| {
            JsObject::exotic(
                Rc::new(GlobalInterceptor {
                    state: state.clone(),
                    privileged,
                }),
                prototype.clone(),
            )
            .into_ref()
        };
        let privileged = view(true);
        let guest = view(false);
        {
            let mut store = state.store.borrow_mut();
            for name in SELF_NAMES.iter() {
                store.insert_hidden(name, JsValue::Object(guest.clone()));
            }
        }
        VirtualGlobal {
            state,
            privileged,
            guest,
        }
    }

    pub fn privileged(&self) -> &JsObjectType {
        &self.privileged
    }

    pub fn guest(&self) -> &JsObjectType {
        &self.guest
    }

    pub fn real(&self) -> &JsObjectType {
        &self.state.real
    }

    pub fn classifier(&self) -> &Rc<VariableClassifier> {
        &self.state.classifier
    }

    pub fn set_init_complete(&self, complete: bool) {
        self.state.init_complete.set(complete);
    }

    pub fn external_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.external.borrow().iter().cloned().collect();
        names.sort();
        names
    }

    /// Whether the sandbox holds its own binding for `name`.
    pub fn has_own_binding(&self, name: &str) -> bool {
        self.state.store_has(name)
    }

    /// Puts a module-provided value in the store, bypassing the classifier.
    pub fn install_override(&self, name: &str, value: JsValue) {
        self.state.store.borrow_mut().insert(name, value);
    }

    pub fn set_optimized(&self, names: Vec<String>) {
        *self.state.optimized.borrow_mut() = names;
    }

    pub fn optimized(&self) -> Vec<String> {
        self.state.optimized.borrow().clone()
    }

    pub fn register_prelude(&self, scope: &ScopeRef) {
        let mut scopes = self.state.prelude_scopes.borrow_mut();
        scopes.retain(|w| w.strong_count() > 0);
        scopes.push(Rc::downgrade(scope));
    }

    /// Breaks the reference cycle between the store and the guest view.
    pub fn dispose(&self) {
        self.state.store.borrow_mut().properties.clear();
        self.state.external.borrow_mut().clear();
        self.state.optimized.borrow_mut().clear();
        self.state.prelude_scopes.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::realm::Realm;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn virtual_global(realm: &Realm) -> VirtualGlobal {
        let classifier = Rc::new(VariableClassifier::new(names(&["shared"]), names(&["secret"])));
        let overrides: HashSet<String> = names(&["fetch"]).into_iter().collect();
        VirtualGlobal::new(&realm.global, classifier, overrides, 7)
    }

    #[test]
    fn test_routing() {
        let realm = Realm::new().unwrap();
        let mut ctx = realm.new_context();
        realm.set("shared", JsValue::from_i64(1)).unwrap();
        realm.set("secret", JsValue::from_str("host")).unwrap();
        let vg = virtual_global(&realm);
        let guest = vg.guest().clone();

        assert_eq!(get(&mut ctx, &guest, "secret").unwrap(), JsValue::Undefined);
        set(&mut ctx, &guest, "shared", JsValue::from_i64(2)).unwrap();
        assert_eq!(realm.get("shared").unwrap(), JsValue::from_i64(2));

        set(&mut ctx, &guest, "local", JsValue::from_i64(3)).unwrap();
        assert!(!realm.has_own("local"));
        assert_eq!(get(&mut ctx, &guest, "local").unwrap(), JsValue::from_i64(3));

        assert_eq!(get(&mut ctx, &guest, "fetch").unwrap(), JsValue::Undefined);
        assert!(get(&mut ctx, &guest, "setTimeout").unwrap().is_callable());
    }

    #[test]
    fn test_self_references_point_at_guest_view() {
        let realm = Realm::new().unwrap();
        let mut ctx = realm.new_context();
        let vg = virtual_global(&realm);
        let window = get(&mut ctx, vg.privileged(), "window").unwrap();
        assert!(window.same_object(vg.guest()));
        assert_eq!(
            get(&mut ctx, vg.privileged(), DEBUG_SANDBOX_KEY).unwrap(),
            JsValue::from_i64(7)
        );
        assert_eq!(
            get(&mut ctx, vg.guest(), DEBUG_SANDBOX_KEY).unwrap(),
            JsValue::Undefined
        );
        vg.dispose();
    }

    #[test]
    fn test_insulated_names_are_present_before_first_read() {
        let realm = Realm::new().unwrap();
        let mut ctx = realm.new_context();
        realm.set("secret", JsValue::from_i64(5)).unwrap();
        let vg = virtual_global(&realm);
        let guest = vg.guest().clone();
        assert!(has_property(&mut ctx, &guest, "secret").unwrap());
        assert_eq!(get(&mut ctx, &guest, "secret").unwrap(), JsValue::Undefined);
        assert!(has_property(&mut ctx, &guest, "secret").unwrap());
    }

    #[test]
    fn test_protected_names_cannot_be_deleted() {
        let realm = Realm::new().unwrap();
        let mut ctx = realm.new_context();
        realm.set("shared", JsValue::from_i64(1)).unwrap();
        let vg = virtual_global(&realm);
        assert!(!delete_property(&mut ctx, vg.guest(), "shared").unwrap());
        assert!(realm.has_own("shared"));
    }

    #[test]
    fn test_external_names_only_after_init() {
        let realm = Realm::new().unwrap();
        let mut ctx = realm.new_context();
        let vg = virtual_global(&realm);
        set(&mut ctx, vg.privileged(), "early", JsValue::Null).unwrap();
        vg.set_init_complete(true);
        set(&mut ctx, vg.guest(), "late", JsValue::Null).unwrap();
        set(&mut ctx, vg.guest(), "secret", JsValue::Null).unwrap();
        assert_eq!(vg.external_names(), names(&["late"]));
    }
}
