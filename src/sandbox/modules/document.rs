use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::object::set;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, create_native_function};
use crate::runner::eval::types::EvalContext;
use crate::sandbox::Sandbox;

use super::{CapabilityModule, ModuleResult, ObjectView};

/// Per-sandbox `document`. Elements it creates carry the sandbox id, which
/// is how appended nodes are traced back to the sandbox that owns them.
pub struct DocumentModule;

impl CapabilityModule for DocumentModule {
    fn name(&self) -> &str {
        "document"
    }

    fn setup(&self, sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        let dom = sandbox.realm().host.dom.clone();
        let owner = sandbox.id();
        let create_element = create_native_function(&ctx.intrinsics, "createElement", 1, move |ctx, _this, args| {
            let tag = to_string(ctx, &arg(&args, 0))?;
            Ok(JsValue::Object(dom.create_element(&tag, Some(owner))))
        });
        let view = ObjectView::create(
            sandbox.realm().host.dom.document(),
            &[],
            vec![
                ("createElement", JsValue::Object(create_element)),
                ("currentScript", JsValue::Null),
            ],
        );

        let created_view = view.clone();
        Ok(ModuleResult::new()
            .with_override("document", JsValue::Object(view))
            .on_created(move |ctx, global| {
                set(ctx, &created_view, "defaultView", JsValue::Object(global.clone()))?;
                Ok(())
            }))
    }
}
