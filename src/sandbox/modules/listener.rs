use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, create_native_function};
use crate::runner::eval::types::EvalContext;
use crate::sandbox::Sandbox;

use super::{CapabilityModule, ModuleResult};

/// Tracks window listeners added by the guest and removes the ones still
/// registered when the sandbox closes.
pub struct ListenerModule;

impl CapabilityModule for ListenerModule {
    fn name(&self) -> &str {
        "listener"
    }

    fn setup(&self, sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        let registry = sandbox.realm().host.listeners.clone();
        let added: Rc<RefCell<Vec<(String, JsValue)>>> = Rc::new(RefCell::new(vec![]));

        let add_registry = registry.clone();
        let add_tracked = added.clone();
        let add = create_native_function(&ctx.intrinsics, "addEventListener", 2, move |ctx, _this, args| {
            let event_type = to_string(ctx, &arg(&args, 0))?;
            let callback = arg(&args, 1);
            if callback.is_callable() && add_registry.add(&event_type, callback.clone()) {
                add_tracked.borrow_mut().push((event_type, callback));
            }
            Ok(JsValue::Undefined)
        });

        let remove_registry = registry.clone();
        let remove_tracked = added.clone();
        let remove = create_native_function(&ctx.intrinsics, "removeEventListener", 2, move |ctx, _this, args| {
            let event_type = to_string(ctx, &arg(&args, 0))?;
            let callback = arg(&args, 1);
            remove_registry.remove(&event_type, &callback);
            remove_tracked
                .borrow_mut()
                .retain(|(t, c)| !(t == &event_type && c == &callback));
            Ok(JsValue::Undefined)
        });

        Ok(ModuleResult::new()
            .with_override("addEventListener", JsValue::Object(add))
            .with_override("removeEventListener", JsValue::Object(remove))
            .on_recover(move |_ctx| {
                let leftovers: Vec<(String, JsValue)> = added.borrow_mut().drain(..).collect();
                debug!(count = leftovers.len(), "removing guest listeners");
                for (event_type, callback) in leftovers {
                    registry.remove(&event_type, &callback);
                }
                Ok(())
            }))
    }
}
