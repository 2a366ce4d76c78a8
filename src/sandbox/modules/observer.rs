use std::cell::RefCell;
use std::rc::Rc;

use crate::host::observer::ObserverData;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::object::get;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, create_native_constructor};
use crate::runner::eval::types::EvalContext;
use crate::sandbox::Sandbox;

use super::{CapabilityModule, ModuleResult};

/// Disconnects every `MutationObserver` the guest created when the sandbox closes.
pub struct ObserverModule;

impl CapabilityModule for ObserverModule {
    fn name(&self) -> &str {
        "observer"
    }

    fn setup(&self, sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        let registry = sandbox.realm().host.observers.clone();
        let created: Rc<RefCell<Vec<Rc<ObserverData>>>> = Rc::new(RefCell::new(vec![]));

        let tracked = created.clone();
        let ctor = create_native_constructor(&ctx.intrinsics, "MutationObserver", 1, move |ctx, _this, args| {
            let (object, data) = registry.create_observer(ctx, arg(&args, 0))?;
            tracked.borrow_mut().push(data);
            Ok(JsValue::Object(object))
        });
        let global = sandbox.realm().global.clone();
        if let JsValue::Object(real_ctor) = get(ctx, &global, "MutationObserver")? {
            if let JsValue::Object(proto) = get(ctx, &real_ctor, "prototype")? {
                ctor.borrow_mut()
                    .insert_hidden("prototype", JsValue::Object(proto));
            }
        }

        Ok(ModuleResult::new()
            .with_override("MutationObserver", JsValue::Object(ctor))
            .on_recover(move |_ctx| {
                for observer in created.borrow_mut().drain(..) {
                    observer.disconnect();
                }
                Ok(())
            }))
    }
}
