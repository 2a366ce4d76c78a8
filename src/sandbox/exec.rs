//! Running guest scripts.
//!
//! In the default mode a script runs in a chain of four scopes:
//!
//! ```text
//! prelude      let-bindings for frequently used globals and `env`, `this`
//! virtual      object scope over the privileged view, the var scope
//! parameters   `window` and every override
//! host         object scope over the real global
//! ```
//!
//! so that any name the virtual global claims is resolved there. With
//! `disable_with` the virtual scope is left out and guest code only sees
//! the parameters on top of the real global.

use std::cell::RefCell;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::host::dom::element_data;
use crate::runner::ds::env_record::{Scope, ScopeRef};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::object::{get, set};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{call_function, error_to_value};
use crate::runner::eval::statement::evaluate_script;
use crate::runner::eval::types::EvalContext;
use crate::runner::event_loop::Job;
use crate::runner::realm::compile;

use super::hooks::{InvokeContext, InvokeError};
use super::interceptor::VirtualGlobal;
use super::{Sandbox, SandboxError};

lazy_static! {
    /// Globals bound directly in the prelude when the sandbox has its own
    /// value for them.
    static ref OPTIMIZED_GLOBALS: Vec<&'static str> = vec![
        "window",
        "self",
        "globalThis",
        "document",
        "history",
        "History",
        "location",
        "setTimeout",
        "clearTimeout",
        "setInterval",
        "clearInterval",
        "addEventListener",
        "removeEventListener",
        "fetch",
        "localStorage",
        "sessionStorage",
        "MutationObserver",
        "MouseEvent",
    ];
}

#[derive(Clone, Debug, Default)]
pub struct ExecScriptOptions {
    pub is_async: bool,
    pub defer: bool,
}

/// Prelude candidates `vg` holds its own binding for, minus protected names
/// and names `env` supplies.
pub(crate) fn optimizable_names(vg: &VirtualGlobal, env: &IndexMap<String, JsValue>) -> Vec<String> {
    OPTIMIZED_GLOBALS
        .iter()
        .filter(|name| {
            !vg.classifier().is_protected(name) && !env.contains_key(**name) && vg.has_own_binding(name)
        })
        .map(|name| name.to_string())
        .collect()
}

impl Sandbox {
    /// Runs `code` with no extra bindings.
    pub fn execute(&self, code: &str) -> Result<JsValue, SandboxError> {
        self.exec_script(code, IndexMap::new(), "", ExecScriptOptions::default())
    }

    /// Runs `code` inside the sandbox. `env` entries are visible to the
    /// script as plain variables; `url`, when not empty, names the script in
    /// stack traces and in `window.onerror`.
    ///
    /// Script failures are reported to the `invoke_error` hook and to the
    /// guest's `window.onerror` before being returned.
    pub fn exec_script(
        &self,
        code: &str,
        env: IndexMap<String, JsValue>,
        url: &str,
        options: ExecScriptOptions,
    ) -> Result<JsValue, SandboxError> {
        if self.closed.get() {
            return Err(SandboxError::Closed(self.id));
        }
        let invoke = InvokeContext {
            code: RefCell::new(code.to_string()),
            url: url.to_string(),
            env,
            options,
        };
        self.hooks.before_invoke.emit(&invoke);

        let mut ctx = self.realm.new_context();
        let revert = self.set_current_script(&mut ctx, &invoke);
        let result = self.run(&mut ctx, &invoke);
        if let Some(revert) = revert {
            ctx.event_loop.enqueue_microtask(revert);
        }

        match result {
            Ok(value) => {
                trace!(sandbox = self.id, url, "script finished");
                self.hooks.after_invoke.emit(&invoke);
                Ok(value)
            }
            Err(RunError::Closed) => Err(SandboxError::Closed(self.id)),
            Err(RunError::Script(error)) => Err(self.report_error(&mut ctx, error, invoke)),
        }
    }

    fn run(&self, ctx: &mut EvalContext, invoke: &InvokeContext) -> Result<JsValue, RunError> {
        let scope = self.create_exec_scope(ctx, &invoke.env)?;
        if !invoke.url.is_empty() {
            invoke
                .code
                .borrow_mut()
                .push_str(&format!("\n//# sourceURL={}\n", invoke.url));
        }
        let program = compile(&invoke.code.borrow())?;
        debug!(sandbox = self.id, url = %invoke.url, "executing script");
        Ok(evaluate_script(ctx, &program, &scope)?)
    }

    fn create_exec_scope(
        &self,
        ctx: &mut EvalContext,
        env: &IndexMap<String, JsValue>,
    ) -> Result<ScopeRef, RunError> {
        let prepare = self.session.borrow().prepare.clone();
        for (module, prepare) in prepare {
            if let Err(source) = prepare(ctx) {
                let error = SandboxError::Module { module, source };
                warn!(%error, "prepare callback failed");
            }
        }

        let global = self.global.borrow();
        let vg = global.as_ref().ok_or(RunError::Closed)?;
        let guest = JsValue::Object(vg.guest().clone());
        let host = Scope::new_object(self.realm.global.clone(), None, true, false);

        let params = Scope::new_declarative(Some(host), self.options.disable_with);
        {
            let mut params = params.borrow_mut();
            params.create_binding("window", true, Some(guest.clone()));
            for (name, value) in &self.session.borrow().overrides {
                params.create_binding(name, true, Some(value.clone()));
            }
        }

        if self.options.disable_with {
            let mut scope = params.borrow_mut();
            scope.this_value = Some(guest);
            for (name, value) in env {
                scope.create_binding(name, true, Some(value.clone()));
            }
            drop(scope);
            return Ok(params);
        }

        let virtual_scope = Scope::new_object(vg.privileged().clone(), Some(params), true, false);
        let prelude = Scope::new_declarative(Some(virtual_scope), false);
        let names = if env.is_empty() {
            vg.optimized()
        } else {
            optimizable_names(vg, env)
        };
        let mut bindings = Vec::with_capacity(names.len() + env.len());
        for name in names {
            let value = get(ctx, vg.privileged(), &name)?;
            bindings.push((name, value));
        }
        {
            let mut scope = prelude.borrow_mut();
            scope.this_value = Some(guest);
            for (name, value) in bindings {
                scope.create_binding(&name, true, Some(value));
            }
            for (name, value) in env {
                scope.create_binding(name, true, Some(value.clone()));
            }
        }
        vg.register_prelude(&prelude);
        Ok(prelude)
    }

    /// Points the sandbox's `document.currentScript` at a script element for
    /// `invoke` and returns the job that restores the previous value.
    fn set_current_script(&self, ctx: &mut EvalContext, invoke: &InvokeContext) -> Option<Job> {
        let privileged = self.global()?;
        let document = match get(ctx, &privileged, "document") {
            Ok(JsValue::Object(document)) => document,
            _ => return None,
        };
        let script = self.realm.host.dom.create_element("script", Some(self.id));
        if let Some(data) = element_data(&script) {
            if !invoke.url.is_empty() {
                data.set_attribute("src", &invoke.url);
            }
            if invoke.options.is_async {
                data.set_attribute("async", "");
            }
            if invoke.options.defer {
                data.set_attribute("defer", "");
            }
        }
        let previous = get(ctx, &document, "currentScript").unwrap_or(JsValue::Null);
        if set(ctx, &document, "currentScript", JsValue::Object(script)).is_err() {
            return None;
        }
        Some(Box::new(move |ctx: &mut EvalContext| {
            set(ctx, &document, "currentScript", previous)?;
            Ok(())
        }))
    }

    fn report_error(&self, ctx: &mut EvalContext, error: JErrorType, invoke: InvokeContext) -> SandboxError {
        debug!(sandbox = self.id, url = %invoke.url, %error, "script failed");
        let InvokeContext { url, env, options, .. } = invoke;
        self.hooks.invoke_error.emit(&InvokeError {
            error: error.clone(),
            url: url.clone(),
            env,
            options,
        });

        if let Some(guest) = self.guest_global() {
            if let Err(e) = self.call_onerror(ctx, &guest, &error, &url) {
                warn!(error = %e, "window.onerror threw");
            }
        }
        SandboxError::Script(error)
    }

    fn call_onerror(
        &self,
        ctx: &mut EvalContext,
        guest: &JsObjectType,
        error: &JErrorType,
        url: &str,
    ) -> Result<(), JErrorType> {
        let onerror = get(ctx, guest, "onerror")?;
        if !onerror.is_callable() {
            return Ok(());
        }
        let source = if url.is_empty() {
            self.options.base_url.clone()
        } else {
            url.to_string()
        };
        let args = vec![
            JsValue::String(error.message()),
            JsValue::String(source),
            JsValue::Null,
            JsValue::Null,
            error_to_value(ctx, error),
        ];
        call_function(ctx, &onerror, JsValue::Object(guest.clone()), args)?;
        Ok(())
    }
}

enum RunError {
    Closed,
    Script(JErrorType),
}

impl From<JErrorType> for RunError {
    fn from(e: JErrorType) -> Self {
        RunError::Script(e)
    }
}
