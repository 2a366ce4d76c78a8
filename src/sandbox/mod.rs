//! Guest sandboxes.
//!
//! A [`Sandbox`] owns one [`VirtualGlobal`] per session. `start` asks every
//! capability module for its overrides and callbacks, builds the virtual
//! global and announces it; `close` runs the modules' recover callbacks,
//! flushes the effect ledger and throws the virtual global away. A closed
//! sandbox can be started again, which is what [`Sandbox::reset`] does.

pub mod classifier;
pub mod effects;
pub mod error;
pub mod exec;
pub mod hooks;
pub mod interceptor;
pub mod modules;
pub mod options;
pub mod registry;

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::host::dom::element_data;
use crate::host::storage::{StorageArea, StorageView};
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::object::{get, set};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalContext;
use crate::runner::event_loop::EventLoop;
use crate::runner::realm::{compile, Realm};
use crate::runner::std_lib::create_intrinsics;

use self::classifier::VariableClassifier;
use self::effects::EffectLedger;
use self::hooks::SandboxLifecycle;
use self::interceptor::VirtualGlobal;
use self::modules::{default_modules, CreatedFn, HookFn};

pub use self::error::SandboxError;
pub use self::exec::ExecScriptOptions;
pub use self::options::SandboxOptions;

pub type SandboxId = u32;

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// What the capability modules contributed to the current session.
#[derive(Default)]
struct Session {
    overrides: IndexMap<String, JsValue>,
    created: Vec<(String, CreatedFn)>,
    prepare: Vec<(String, HookFn)>,
    recover: Vec<(String, HookFn)>,
}

pub struct Sandbox {
    id: SandboxId,
    realm: Rc<Realm>,
    options: SandboxOptions,
    pub hooks: SandboxLifecycle,
    closed: Cell<bool>,
    init_complete: Cell<bool>,
    global: RefCell<Option<VirtualGlobal>>,
    session: RefCell<Session>,
    ledger: EffectLedger,
    dynamic_styles: RefCell<Vec<JsObjectType>>,
}

impl Sandbox {
    /// Creates a sandbox over `realm`, starts it and registers it.
    pub fn new(realm: &Rc<Realm>, options: SandboxOptions) -> Rc<Sandbox> {
        let sandbox = Rc::new(Sandbox {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            realm: realm.clone(),
            options,
            hooks: SandboxLifecycle::new(),
            closed: Cell::new(true),
            init_complete: Cell::new(false),
            global: RefCell::new(None),
            session: RefCell::new(Session::default()),
            ledger: EffectLedger::new(),
            dynamic_styles: RefCell::new(vec![]),
        });
        registry::install_injector(realm);
        sandbox.start();
        registry::register(&sandbox);
        sandbox
    }

    /// Whether guest code can be isolated at all: the grammar must accept
    /// block-scoped declarations and exotic objects must see every property
    /// write.
    pub fn can_support() -> bool {
        let supported = compile("let a = 666;").is_ok() && traps_supported();
        if !supported {
            warn!("{}", SandboxError::Unsupported);
        }
        supported
    }

    pub fn ensure_supported() -> Result<(), SandboxError> {
        if Sandbox::can_support() {
            Ok(())
        } else {
            Err(SandboxError::Unsupported)
        }
    }

    /// Follows view wrappers down to the host object they stand in for.
    pub fn native_window(value: &JsValue) -> Option<JsObjectType> {
        let mut current = value.as_object()?.clone();
        loop {
            let traps = current.borrow().traps();
            match traps.and_then(|t| t.unwrap_target()) {
                Some(target) => current = target,
                None => return Some(current),
            }
        }
    }

    pub fn id(&self) -> SandboxId {
        self.id
    }

    pub fn realm(&self) -> &Rc<Realm> {
        &self.realm
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn is_init_complete(&self) -> bool {
        self.init_complete.get()
    }

    /// The privileged view of the virtual global, while started.
    pub fn global(&self) -> Option<JsObjectType> {
        self.global.borrow().as_ref().map(|vg| vg.privileged().clone())
    }

    /// The object guest code sees as `window`, while started.
    pub fn guest_global(&self) -> Option<JsObjectType> {
        self.global.borrow().as_ref().map(|vg| vg.guest().clone())
    }

    /// Names the guest declared on its global after start-up.
    pub fn external_names(&self) -> Vec<String> {
        self.global
            .borrow()
            .as_ref()
            .map(|vg| vg.external_names())
            .unwrap_or_default()
    }

    pub fn override_names(&self) -> Vec<String> {
        self.session.borrow().overrides.keys().cloned().collect()
    }

    /// Names bound in the prelude of every with-mode execution.
    pub fn optimized_names(&self) -> Vec<String> {
        self.global
            .borrow()
            .as_ref()
            .map(|vg| vg.optimized())
            .unwrap_or_default()
    }

    pub fn effects(&self) -> &EffectLedger {
        &self.ledger
    }

    pub fn dynamic_style_count(&self) -> usize {
        self.dynamic_styles.borrow().len()
    }

    /// Reads `name` the way guest code would.
    pub fn get(&self, name: &str) -> Result<JsValue, SandboxError> {
        let guest = self.guest_global().ok_or(SandboxError::Closed(self.id))?;
        let mut ctx = self.realm.new_context();
        Ok(get(&mut ctx, &guest, name)?)
    }

    /// Writes `name` the way guest code would.
    pub fn set(&self, name: &str, value: JsValue) -> Result<bool, SandboxError> {
        let guest = self.guest_global().ok_or(SandboxError::Closed(self.id))?;
        let mut ctx = self.realm.new_context();
        Ok(set(&mut ctx, &guest, name, value)?)
    }

    /// Opens a session. Starting a sandbox that is already started only
    /// logs a warning.
    pub fn start(&self) {
        if !self.closed.get() {
            warn!(sandbox = self.id, "sandbox is already started");
            return;
        }
        self.closed.set(false);
        let mut ctx = self.realm.new_context();
        let session = self.collect_modules(&mut ctx);

        let classifier = Rc::new(VariableClassifier::from_options(&self.options));
        let override_names: HashSet<String> = session.overrides.keys().cloned().collect();
        let vg = VirtualGlobal::new(&self.realm.global, classifier, override_names, self.id);
        for (name, value) in &session.overrides {
            vg.install_override(name, value.clone());
        }
        let privileged = vg.privileged().clone();
        let guest = vg.guest().clone();
        let created = session.created.clone();
        *self.session.borrow_mut() = session;
        *self.global.borrow_mut() = Some(vg);

        for (module, created) in created {
            if let Err(source) = created(&mut ctx, &guest) {
                let error = SandboxError::Module { module, source };
                warn!(%error, "created callback failed");
            }
        }

        if let Some(vg) = self.global.borrow().as_ref() {
            if !self.options.disable_with {
                vg.set_optimized(exec::optimizable_names(vg, &IndexMap::new()));
            }
            vg.set_init_complete(true);
        }
        self.init_complete.set(true);
        debug!(sandbox = self.id, namespace = %self.options.namespace, "sandbox started");
        self.hooks.started.emit(&privileged);
    }

    /// Ends the session and reverses everything it did to the host.
    /// Closing a closed sandbox does nothing.
    pub fn close(&self) {
        if self.closed.get() {
            return;
        }
        self.hooks.before_clear_effect.emit(&());
        let mut ctx = self.realm.new_context();
        let recover = self.session.borrow().recover.clone();
        for (module, recover) in recover {
            if let Err(source) = recover(&mut ctx) {
                let error = SandboxError::Teardown { module, source };
                warn!(%error, "recover callback failed");
            }
        }
        let failures = self.ledger.flush();
        self.hooks.after_clear_effect.emit(&());

        self.closed.set(true);
        let vg = self.global.borrow_mut().take();
        if let Some(vg) = vg {
            vg.dispose();
        }
        self.init_complete.set(false);
        *self.session.borrow_mut() = Session::default();
        self.dynamic_styles.borrow_mut().clear();
        debug!(sandbox = self.id, failures = failures.len(), "sandbox closed");
        self.hooks.closed.emit(&());
    }

    pub fn reset(&self) {
        self.close();
        self.start();
    }

    /// Closes the sandbox and removes it from the registry.
    pub fn dispose(&self) {
        self.close();
        registry::unregister(self.id);
    }

    /// Records an element appended on behalf of this sandbox so that close
    /// detaches it again. Style elements are detached last.
    pub(crate) fn record_dynamic_node(&self, element: &JsObjectType) {
        if self.closed.get() {
            return;
        }
        let is_style = element_data(element).map_or(false, |d| d.tag == "style");
        if is_style {
            self.dynamic_styles.borrow_mut().push(element.clone());
        }
        let dom = Rc::downgrade(&self.realm.host.dom);
        let node = element.clone();
        self.ledger.record(
            move || {
                if let Some(dom) = dom.upgrade() {
                    dom.detach(&node);
                }
                Ok(())
            },
            is_style,
        );
    }

    fn collect_modules(&self, ctx: &mut EvalContext) -> Session {
        let mut modules = if self.options.use_default_modules {
            default_modules()
        } else {
            vec![]
        };
        modules.extend(self.options.modules().iter().cloned());

        let mut session = Session::default();
        for module in modules {
            let name = module.name().to_string();
            let result = match module.setup(self, ctx) {
                Ok(result) => result,
                Err(source) => {
                    let error = SandboxError::Module { module: name, source };
                    warn!(%error, "capability module skipped");
                    continue;
                }
            };
            for (key, value) in result.overrides {
                if self.options.dev_warnings && session.overrides.contains_key(&key) {
                    warn!("\"{}\" global variables are overwritten.", key);
                }
                session.overrides.insert(key, value);
            }
            if let Some(f) = result.created {
                session.created.push((name.clone(), f));
            }
            if let Some(f) = result.prepare {
                session.prepare.push((name.clone(), f));
            }
            if let Some(f) = result.recover {
                session.recover.push((name, f));
            }
        }
        session
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if let Some(vg) = self.global.get_mut().take() {
            vg.dispose();
        }
        registry::unregister(self.id);
    }
}

/// Writes through a storage view and checks the write reached the area.
fn traps_supported() -> bool {
    let intrinsics = Rc::new(create_intrinsics());
    let area = Rc::new(StorageArea::default());
    let view = StorageView::create(&intrinsics, &area, "probe__");
    let mut ctx = EvalContext::new(intrinsics.clone(), Rc::new(EventLoop::new()));
    match set(&mut ctx, &view, "a", JsValue::from_i64(666)) {
        Ok(true) => area.get_item("probe__a").as_deref() == Some("666"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Rc<Sandbox> {
        let realm = Realm::new().unwrap();
        Sandbox::new(&realm, SandboxOptions::new().with_namespace("app"))
    }

    #[test]
    fn test_ids_are_unique() {
        let a = sandbox();
        let b = sandbox();
        assert_ne!(a.id(), b.id());
        assert!(registry::get(a.id()).is_some());
    }

    #[test]
    fn test_can_support() {
        assert!(Sandbox::can_support());
        assert!(Sandbox::ensure_supported().is_ok());
    }

    #[test]
    fn test_start_twice_is_a_no_op() {
        let sandbox = sandbox();
        let global = sandbox.global().unwrap();
        sandbox.start();
        assert!(Rc::ptr_eq(&global, &sandbox.global().unwrap()));
    }

    #[test]
    fn test_close_then_start_builds_a_new_global() {
        let sandbox = sandbox();
        let before = sandbox.global().unwrap();
        sandbox.close();
        assert!(sandbox.is_closed());
        assert!(sandbox.global().is_none());
        assert!(!sandbox.is_init_complete());
        sandbox.start();
        assert!(!Rc::ptr_eq(&before, &sandbox.global().unwrap()));
        assert!(sandbox.is_init_complete());
    }

    #[test]
    fn test_default_overrides() {
        let sandbox = sandbox();
        let names = sandbox.override_names();
        for name in ["fetch", "setTimeout", "document", "localStorage", "MouseEvent"].iter() {
            assert!(names.iter().any(|n| n == name), "missing override {}", name);
        }
    }

    #[test]
    fn test_native_window_unwraps_views() {
        let sandbox = sandbox();
        let guest = JsValue::Object(sandbox.guest_global().unwrap());
        let native = Sandbox::native_window(&guest).unwrap();
        assert!(Rc::ptr_eq(&native, &sandbox.realm().global));
        assert!(Sandbox::native_window(&JsValue::Null).is_none());
    }

    #[test]
    fn test_drop_unregisters() {
        let sandbox = sandbox();
        let id = sandbox.id();
        let before = registry::len();
        drop(sandbox);
        assert_eq!(registry::len(), before - 1);
        assert!(registry::get(id).is_none());
    }

    #[test]
    fn test_dispose_unregisters() {
        let sandbox = sandbox();
        let id = sandbox.id();
        sandbox.dispose();
        assert!(registry::get(id).is_none());
        assert!(sandbox.is_closed());
    }
}
