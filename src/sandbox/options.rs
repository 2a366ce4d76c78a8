//! Sandbox configuration.

use std::fmt;
use std::rc::Rc;

use super::modules::CapabilityModule;

/// Produces a list of variable names. Called again on every `start`, so the
/// source may be stateful.
pub type NameSource = Rc<dyn Fn() -> Vec<String>>;

/// Options fixed at sandbox construction.
#[derive(Clone)]
pub struct SandboxOptions {
    pub base_url: String,
    pub namespace: String,
    pub disable_with: bool,
    pub fix_base_url: bool,
    /// Emits override-collision warnings. On by default in debug builds.
    pub dev_warnings: bool,
    pub use_default_modules: bool,
    protect_variable: Option<NameSource>,
    insulation_variable: Option<NameSource>,
    modules: Vec<Rc<dyn CapabilityModule>>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        SandboxOptions {
            base_url: String::new(),
            namespace: String::new(),
            disable_with: false,
            fix_base_url: false,
            dev_warnings: cfg!(debug_assertions),
            use_default_modules: true,
            protect_variable: None,
            insulation_variable: None,
            modules: vec![],
        }
    }
}

impl SandboxOptions {
    pub fn new() -> Self {
        SandboxOptions::default()
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn with_disable_with(mut self, disable_with: bool) -> Self {
        self.disable_with = disable_with;
        self
    }

    pub fn with_fix_base_url(mut self, fix_base_url: bool) -> Self {
        self.fix_base_url = fix_base_url;
        self
    }

    pub fn with_dev_warnings(mut self, dev_warnings: bool) -> Self {
        self.dev_warnings = dev_warnings;
        self
    }

    pub fn with_default_modules(mut self, use_default_modules: bool) -> Self {
        self.use_default_modules = use_default_modules;
        self
    }

    pub fn with_protect_variable<F>(mut self, source: F) -> Self
    where
        F: Fn() -> Vec<String> + 'static,
    {
        self.protect_variable = Some(Rc::new(source));
        self
    }

    pub fn with_insulation_variable<F>(mut self, source: F) -> Self
    where
        F: Fn() -> Vec<String> + 'static,
    {
        self.insulation_variable = Some(Rc::new(source));
        self
    }

    /// Appends a module that runs after the defaults.
    pub fn with_module<M>(mut self, module: M) -> Self
    where
        M: CapabilityModule + 'static,
    {
        self.modules.push(Rc::new(module));
        self
    }

    pub fn protected_names(&self) -> Vec<String> {
        self.protect_variable.as_ref().map(|f| f()).unwrap_or_default()
    }

    pub fn insulated_names(&self) -> Vec<String> {
        self.insulation_variable
            .as_ref()
            .map(|f| f())
            .unwrap_or_default()
    }

    pub fn modules(&self) -> &[Rc<dyn CapabilityModule>] {
        &self.modules
    }
}

impl fmt::Debug for SandboxOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxOptions")
            .field("base_url", &self.base_url)
            .field("namespace", &self.namespace)
            .field("disable_with", &self.disable_with)
            .field("fix_base_url", &self.fix_base_url)
            .field("dev_warnings", &self.dev_warnings)
            .field("use_default_modules", &self.use_default_modules)
            .field("modules", &self.modules.len())
            .finish()
    }
}
