use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::object::{get, set};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, construct, create_native_constructor};
use crate::runner::eval::types::EvalContext;
use crate::sandbox::Sandbox;

use super::{CapabilityModule, ModuleResult};

/// `new MouseEvent(type, { view: window })` inside a sandbox names the
/// virtual global; the host only accepts its real window there.
pub struct UiEventModule;

impl CapabilityModule for UiEventModule {
    fn name(&self) -> &str {
        "ui_event"
    }

    fn setup(&self, sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        let global = sandbox.realm().global.clone();
        let real_ctor = get(ctx, &global, "MouseEvent")?;
        let prototype = prototype_of(ctx, &real_ctor)?;

        let ctor = create_native_constructor(&ctx.intrinsics, "MouseEvent", 1, move |ctx, this, args| {
            if !matches!(this, JsValue::Object(_)) {
                return Err(JErrorType::TypeError(
                    "Failed to construct 'MouseEvent': Please use the 'new' operator, this DOM object constructor cannot be called as a function."
                        .to_string(),
                ));
            }
            if let JsValue::Object(init) = arg(&args, 1) {
                let view = get(ctx, &init, "view")?;
                let is_window = view
                    .as_object()
                    .map_or(false, |v| v.borrow().get_class_name() == "Window");
                if is_window {
                    if let Some(native) = Sandbox::native_window(&view) {
                        set(ctx, &init, "view", JsValue::Object(native))?;
                    }
                }
            }
            construct(ctx, &real_ctor, args)
        });
        if let Some(proto) = prototype {
            ctor.borrow_mut()
                .insert_hidden("prototype", JsValue::Object(proto));
        }

        Ok(ModuleResult::new().with_override("MouseEvent", JsValue::Object(ctor)))
    }
}

fn prototype_of(ctx: &mut EvalContext, ctor: &JsValue) -> Result<Option<JsObjectType>, JErrorType> {
    match ctor {
        JsValue::Object(o) => match get(ctx, o, "prototype")? {
            JsValue::Object(p) => Ok(Some(p)),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}
