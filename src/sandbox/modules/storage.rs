use crate::host::storage::StorageView;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalContext;
use crate::sandbox::Sandbox;

use super::{CapabilityModule, ModuleResult};

/// Namespaced `localStorage`/`sessionStorage`: keys are stored under
/// `<namespace>__` in the host areas and the views only see their own keys.
pub struct StorageModule;

pub fn storage_prefix(namespace: &str) -> String {
    format!("{}__", namespace)
}

impl CapabilityModule for StorageModule {
    fn name(&self) -> &str {
        "storage"
    }

    fn setup(&self, sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        let host = &sandbox.realm().host;
        let prefix = storage_prefix(&sandbox.options().namespace);
        let local = StorageView::create(&ctx.intrinsics, &host.local_storage, &prefix);
        let session = StorageView::create(&ctx.intrinsics, &host.session_storage, &prefix);
        Ok(ModuleResult::new()
            .with_override("localStorage", JsValue::Object(local))
            .with_override("sessionStorage", JsValue::Object(session)))
    }
}
