//! Capability modules.
//!
//! Each module contributes a slice of the virtual global: values placed on
//! it at start-up (`overrides`) and callbacks run once the global exists
//! (`created`), before every script (`prepare`) and on close (`recover`).
//! Modules are asked for a fresh [`ModuleResult`] on every `start`.

mod document;
mod history;
mod listener;
mod network;
mod object_view;
mod observer;
mod storage;
mod timer;
mod ui_event;

use std::rc::Rc;

use indexmap::IndexMap;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalContext;

use super::Sandbox;

pub use self::document::DocumentModule;
pub use self::history::HistoryModule;
pub use self::listener::ListenerModule;
pub use self::network::NetworkModule;
pub use self::object_view::ObjectView;
pub use self::observer::ObserverModule;
pub use self::storage::StorageModule;
pub use self::timer::{IntervalModule, TimeoutModule};
pub use self::ui_event::UiEventModule;

/// Receives the guest view of the freshly built virtual global.
pub type CreatedFn = Rc<dyn Fn(&mut EvalContext, &JsObjectType) -> Result<(), JErrorType>>;
pub type HookFn = Rc<dyn Fn(&mut EvalContext) -> Result<(), JErrorType>>;

#[derive(Default)]
pub struct ModuleResult {
    pub overrides: IndexMap<String, JsValue>,
    pub created: Option<CreatedFn>,
    pub prepare: Option<HookFn>,
    pub recover: Option<HookFn>,
}

impl ModuleResult {
    pub fn new() -> Self {
        ModuleResult::default()
    }

    pub fn with_override(mut self, name: &str, value: JsValue) -> Self {
        self.overrides.insert(name.to_string(), value);
        self
    }

    pub fn on_created<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut EvalContext, &JsObjectType) -> Result<(), JErrorType> + 'static,
    {
        self.created = Some(Rc::new(f));
        self
    }

    pub fn on_prepare<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut EvalContext) -> Result<(), JErrorType> + 'static,
    {
        self.prepare = Some(Rc::new(f));
        self
    }

    pub fn on_recover<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut EvalContext) -> Result<(), JErrorType> + 'static,
    {
        self.recover = Some(Rc::new(f));
        self
    }
}

pub trait CapabilityModule {
    fn name(&self) -> &str;

    /// Builds this module's contribution for one session of `sandbox`.
    fn setup(&self, sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType>;
}

/// A module defined by a closure.
pub struct ModuleFn<F> {
    name: String,
    setup: F,
}

impl<F> ModuleFn<F>
where
    F: Fn(&Sandbox, &mut EvalContext) -> Result<ModuleResult, JErrorType>,
{
    pub fn new(name: &str, setup: F) -> Self {
        ModuleFn {
            name: name.to_string(),
            setup,
        }
    }
}

impl<F> CapabilityModule for ModuleFn<F>
where
    F: Fn(&Sandbox, &mut EvalContext) -> Result<ModuleResult, JErrorType>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&self, sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        (self.setup)(sandbox, ctx)
    }
}

/// The built-in modules, in the order they are applied.
pub fn default_modules() -> Vec<Rc<dyn CapabilityModule>> {
    vec![
        Rc::new(NetworkModule),
        Rc::new(TimeoutModule),
        Rc::new(IntervalModule),
        Rc::new(HistoryModule),
        Rc::new(DocumentModule),
        Rc::new(ListenerModule),
        Rc::new(ObserverModule),
        Rc::new(UiEventModule),
        Rc::new(StorageModule),
    ]
}
