//! Console built-in object.
//!
//! Guest output goes to `tracing` under the `guestvm::console` target, at the
//! level matching the console method.

use tracing::{debug, error, info, warn};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalContext, Intrinsics};

use super::{define_global, BuiltInObject};

/// Register the console object on `global`.
pub fn register(global: &JsObjectType, intrinsics: &Intrinsics) {
    let console = BuiltInObject::new(intrinsics, "console")
        .add_method("log", 0, |ctx, _this, args| {
            let line = format_args(ctx, &args);
            info!(target: "guestvm::console", "{}", line);
            Ok(JsValue::Undefined)
        })
        .add_method("info", 0, |ctx, _this, args| {
            let line = format_args(ctx, &args);
            info!(target: "guestvm::console", "{}", line);
            Ok(JsValue::Undefined)
        })
        .add_method("debug", 0, |ctx, _this, args| {
            let line = format_args(ctx, &args);
            debug!(target: "guestvm::console", "{}", line);
            Ok(JsValue::Undefined)
        })
        .add_method("warn", 0, |ctx, _this, args| {
            let line = format_args(ctx, &args);
            warn!(target: "guestvm::console", "{}", line);
            Ok(JsValue::Undefined)
        })
        .add_method("error", 0, |ctx, _this, args| {
            let line = format_args(ctx, &args);
            error!(target: "guestvm::console", "{}", line);
            Ok(JsValue::Undefined)
        })
        .build();
    define_global(global, "console", JsValue::Object(console));
}

/// Joins the arguments with spaces. Values whose conversion throws fall
/// back to their debug rendering rather than failing the call.
fn format_args(ctx: &mut EvalContext, args: &[JsValue]) -> String {
    args.iter()
        .map(|v| match v {
            JsValue::String(s) => s.clone(),
            _ => to_string(ctx, v).unwrap_or_else(|_: JErrorType| v.to_string()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
