use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::object::get;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::create_native_constructor;
use crate::runner::eval::types::EvalContext;
use crate::sandbox::Sandbox;

use super::{CapabilityModule, ModuleResult, ObjectView};

/// Gives each sandbox its own `history` object. Navigation methods still
/// drive the host's session history; `scrollRestoration` is shared.
pub struct HistoryModule;

impl CapabilityModule for HistoryModule {
    fn name(&self) -> &str {
        "history"
    }

    fn setup(&self, sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        let real = sandbox.realm().host.history.history_object().clone();
        let view = ObjectView::create(&real, &["scrollRestoration"], vec![]);

        let ctor = create_native_constructor(&ctx.intrinsics, "History", 0, |_ctx, _this, _args| {
            Err(JErrorType::TypeError("Illegal constructor".to_string()))
        });
        let global = sandbox.realm().global.clone();
        if let JsValue::Object(real_ctor) = get(ctx, &global, "History")? {
            if let JsValue::Object(proto) = get(ctx, &real_ctor, "prototype")? {
                ctor.borrow_mut()
                    .insert_hidden("prototype", JsValue::Object(proto));
            }
        }

        Ok(ModuleResult::new()
            .with_override("history", JsValue::Object(view))
            .with_override("History", JsValue::Object(ctor)))
    }
}
