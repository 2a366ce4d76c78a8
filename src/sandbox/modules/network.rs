use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;
use url::Url;

use crate::host::network::{create_abort_controller, fetch, SignalData};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::object::{create_object, get, has_property, set};
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, create_native_function};
use crate::runner::eval::types::EvalContext;
use crate::sandbox::Sandbox;

use super::{CapabilityModule, ModuleResult};

/// Overrides `fetch`. Every request gets an abort signal so that requests
/// still in flight when the sandbox closes can be aborted.
pub struct NetworkModule;

fn resolve_url(base_url: &str, input: &str) -> String {
    match Url::parse(base_url).and_then(|base| base.join(input)) {
        Ok(url) => url.to_string(),
        Err(_) => input.to_string(),
    }
}

impl CapabilityModule for NetworkModule {
    fn name(&self) -> &str {
        "network"
    }

    fn setup(&self, sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        let network = sandbox.realm().host.network.clone();
        let signals: Rc<RefCell<Vec<Rc<SignalData>>>> = Rc::new(RefCell::new(vec![]));
        let base_url = if sandbox.options().fix_base_url {
            Some(sandbox.options().base_url.clone())
        } else {
            None
        };

        let fetch_network = network.clone();
        let fetch_signals = signals.clone();
        let fetch_fn = create_native_function(&ctx.intrinsics, "fetch", 2, move |ctx, _this, args| {
            let mut input = arg(&args, 0);
            if let Some(base) = &base_url {
                let raw = to_string(ctx, &input)?;
                input = JsValue::String(resolve_url(base, &raw));
            }
            let init = arg(&args, 1);
            let request_init = create_object(ctx);
            let mut has_signal = false;
            if let JsValue::Object(o) = &init {
                for key in ["method", "signal"].iter() {
                    if has_property(ctx, o, key)? {
                        let value = get(ctx, o, key)?;
                        has_signal |= *key == "signal" && !value.is_nullish();
                        set(ctx, &request_init, key, value)?;
                    }
                }
            }
            if !has_signal {
                let (controller, data) = create_abort_controller(&ctx.intrinsics, &fetch_network);
                let signal = get(ctx, &controller, "signal")?;
                set(ctx, &request_init, "signal", signal)?;
                fetch_signals.borrow_mut().push(data);
            }
            fetch(ctx, &fetch_network, &input, &JsValue::Object(request_init))
        });

        Ok(ModuleResult::new()
            .with_override("fetch", JsValue::Object(fetch_fn))
            .on_recover(move |_ctx| {
                let aborted: usize = signals
                    .borrow_mut()
                    .drain(..)
                    .map(|s| network.abort_signal(&s))
                    .sum();
                debug!(aborted, "pending requests aborted");
                Ok(())
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_url;

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("http://app.test/sub/", "api/data"),
            "http://app.test/sub/api/data"
        );
        assert_eq!(
            resolve_url("http://app.test/sub/", "http://other.test/x"),
            "http://other.test/x"
        );
        assert_eq!(resolve_url("", "api/data"), "api/data");
    }
}
