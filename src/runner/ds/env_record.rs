use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObjectType, PropertyDescriptor};
use crate::runner::ds::operations::object::{
    define_property, get, has_own_property, has_property, set,
};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalContext, Reference};

pub type ScopeRef = Rc<RefCell<Scope>>;

pub struct Binding {
    /// `None` while the binding is in its temporal dead zone.
    pub value: Option<JsValue>,
    pub mutable: bool,
}

#[derive(Default)]
pub struct DeclarativeEnvironmentRecord {
    pub bindings: HashMap<String, Binding>,
}

pub struct ObjectEnvironmentRecord {
    pub binding_object: JsObjectType,
    /// Calls through this record receive the binding object as `this`.
    pub provides_this: bool,
}

pub enum EnvironmentRecordType {
    Declarative(DeclarativeEnvironmentRecord),
    Object(ObjectEnvironmentRecord),
}

pub struct Scope {
    pub record: EnvironmentRecordType,
    pub outer: Option<ScopeRef>,
    pub this_value: Option<JsValue>,
    /// `var` and hoisted function declarations land in the nearest var scope.
    pub is_var_scope: bool,
}

impl Scope {
    pub fn new_declarative(outer: Option<ScopeRef>, is_var_scope: bool) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            record: EnvironmentRecordType::Declarative(DeclarativeEnvironmentRecord::default()),
            outer,
            this_value: None,
            is_var_scope,
        }))
    }

    pub fn new_object(
        binding_object: JsObjectType,
        outer: Option<ScopeRef>,
        is_var_scope: bool,
        provides_this: bool,
    ) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            record: EnvironmentRecordType::Object(ObjectEnvironmentRecord {
                binding_object,
                provides_this,
            }),
            outer,
            this_value: None,
            is_var_scope,
        }))
    }

    pub fn binding_object(&self) -> Option<JsObjectType> {
        match &self.record {
            EnvironmentRecordType::Object(o) => Some(o.binding_object.clone()),
            EnvironmentRecordType::Declarative(_) => None,
        }
    }

    pub fn has_own_binding(&self, name: &str) -> bool {
        match &self.record {
            EnvironmentRecordType::Declarative(d) => d.bindings.contains_key(name),
            EnvironmentRecordType::Object(_) => false,
        }
    }

    /// Creates (or replaces) a declarative binding; no-op on object records.
    pub fn create_binding(&mut self, name: &str, mutable: bool, value: Option<JsValue>) {
        if let EnvironmentRecordType::Declarative(d) = &mut self.record {
            d.bindings
                .insert(name.to_string(), Binding { value, mutable });
        }
    }

    pub fn initialize_binding(&mut self, name: &str, value: JsValue) {
        if let EnvironmentRecordType::Declarative(d) = &mut self.record {
            if let Some(b) = d.bindings.get_mut(name) {
                b.value = Some(value);
            }
        }
    }

    pub fn get_binding_value(&self, name: &str) -> Result<JsValue, JErrorType> {
        match &self.record {
            EnvironmentRecordType::Declarative(d) => match d.bindings.get(name) {
                Some(Binding { value: Some(v), .. }) => Ok(v.clone()),
                Some(Binding { value: None, .. }) => Err(JErrorType::ReferenceError(format!(
                    "Cannot access '{}' before initialization",
                    name
                ))),
                None => Err(JErrorType::ReferenceError(format!("{} is not defined", name))),
            },
            EnvironmentRecordType::Object(_) => Err(JErrorType::ReferenceError(format!(
                "{} is not a declarative binding",
                name
            ))),
        }
    }

    pub fn set_mutable_binding(&mut self, name: &str, value: JsValue) -> Result<(), JErrorType> {
        if let EnvironmentRecordType::Declarative(d) = &mut self.record {
            match d.bindings.get_mut(name) {
                Some(Binding { value: None, .. }) => {
                    return Err(JErrorType::ReferenceError(format!(
                        "Cannot access '{}' before initialization",
                        name
                    )))
                }
                Some(Binding { mutable: false, .. }) => {
                    return Err(JErrorType::TypeError(
                        "Assignment to constant variable.".to_string(),
                    ))
                }
                Some(b) => b.value = Some(value),
                None => {
                    d.bindings.insert(
                        name.to_string(),
                        Binding {
                            value: Some(value),
                            mutable: true,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

/// Walks the chain looking for `name`.
pub fn resolve_binding(
    ctx: &mut EvalContext,
    scope: &ScopeRef,
    name: &str,
) -> Result<Reference, JErrorType> {
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        let (object, provides_this, outer) = {
            let s_ref = s.borrow();
            if s_ref.has_own_binding(name) {
                return Ok(Reference::Binding {
                    scope: s.clone(),
                    name: name.to_string(),
                });
            }
            match &s_ref.record {
                EnvironmentRecordType::Object(o) => (
                    Some(o.binding_object.clone()),
                    o.provides_this,
                    s_ref.outer.clone(),
                ),
                EnvironmentRecordType::Declarative(_) => (None, false, s_ref.outer.clone()),
            }
        };
        if let Some(object) = object {
            if has_property(ctx, &object, name)? {
                return Ok(Reference::Property {
                    base: JsValue::Object(object),
                    name: name.to_string(),
                    with_base: provides_this,
                });
            }
        }
        current = outer;
    }
    Ok(Reference::Unresolvable(name.to_string()))
}

/// Value of `this` for code running directly in `scope`.
pub fn resolve_this(scope: &ScopeRef) -> JsValue {
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        let s_ref = s.borrow();
        if let Some(v) = &s_ref.this_value {
            return v.clone();
        }
        current = s_ref.outer.clone();
    }
    JsValue::Undefined
}

/// The outermost `this` on the chain: what a plain call defaults to.
pub fn script_this(scope: &ScopeRef) -> JsValue {
    let mut found = JsValue::Undefined;
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        let s_ref = s.borrow();
        if let Some(v) = &s_ref.this_value {
            found = v.clone();
        }
        current = s_ref.outer.clone();
    }
    found
}

pub fn var_scope(scope: &ScopeRef) -> ScopeRef {
    let mut current = scope.clone();
    loop {
        let next = {
            let s_ref = current.borrow();
            if s_ref.is_var_scope {
                None
            } else {
                s_ref.outer.clone()
            }
        };
        match next {
            Some(n) => current = n,
            None => return current,
        }
    }
}

/// The binding object of the outermost object record, i.e. the global object.
pub fn global_object(scope: &ScopeRef) -> Option<JsObjectType> {
    let mut found = None;
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        let s_ref = s.borrow();
        if let Some(o) = s_ref.binding_object() {
            found = Some(o);
        }
        current = s_ref.outer.clone();
    }
    found
}

/// Declares a `var`-style binding without clobbering an existing value.
pub fn declare_var(
    ctx: &mut EvalContext,
    scope: &ScopeRef,
    name: &str,
) -> Result<(), JErrorType> {
    let object = {
        let mut s = scope.borrow_mut();
        match s.binding_object() {
            Some(o) => o,
            None => {
                if !s.has_own_binding(name) {
                    s.create_binding(name, true, Some(JsValue::Undefined));
                }
                return Ok(());
            }
        }
    };
    if !has_own_property(ctx, &object, name)? {
        define_property(
            ctx,
            &object,
            name,
            PropertyDescriptor::from_value(JsValue::Undefined),
        )?;
    }
    Ok(())
}

/// Binds a hoisted function, overwriting any earlier value.
pub fn declare_function(
    ctx: &mut EvalContext,
    scope: &ScopeRef,
    name: &str,
    value: JsValue,
) -> Result<(), JErrorType> {
    let object = {
        let mut s = scope.borrow_mut();
        match s.binding_object() {
            Some(o) => o,
            None => {
                s.create_binding(name, true, Some(value));
                return Ok(());
            }
        }
    };
    set(ctx, &object, name, value)?;
    Ok(())
}

/// Reads a binding by walking the chain; unresolvable names are a ReferenceError.
pub fn get_identifier_value(
    ctx: &mut EvalContext,
    scope: &ScopeRef,
    name: &str,
) -> Result<JsValue, JErrorType> {
    match resolve_binding(ctx, scope, name)? {
        Reference::Binding { scope, name } => scope.borrow().get_binding_value(&name),
        Reference::Property { base, name, .. } => match base {
            JsValue::Object(o) => get(ctx, &o, &name),
            _ => Ok(JsValue::Undefined),
        },
        Reference::Unresolvable(name) => {
            Err(JErrorType::ReferenceError(format!("{} is not defined", name)))
        }
    }
}
