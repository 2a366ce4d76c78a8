//! `setTimeout` and friends on top of the realm's [`EventLoop`].

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::type_conversion::to_integer;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, create_native_function};
use crate::runner::eval::types::{EvalContext, Intrinsics};
use crate::runner::event_loop::TimerId;
use crate::runner::std_lib::define_global;

/// Schedules `args[0]` with the delay in `args[1]` and the remaining
/// arguments forwarded to the callback.
pub fn schedule(ctx: &mut EvalContext, args: &[JsValue], repeat: bool) -> Result<TimerId, JErrorType> {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(JErrorType::TypeError(format!(
            "Failed to execute '{}': parameter 1 is not a function.",
            if repeat { "setInterval" } else { "setTimeout" }
        )));
    }
    let delay = match arg(args, 1) {
        JsValue::Undefined => 0,
        v => to_integer(ctx, &v)?.max(0) as u64,
    };
    let rest = args.iter().skip(2).cloned().collect();
    Ok(ctx.event_loop.set_timer(callback, rest, delay, repeat))
}

/// Cancels the timer named by `args[0]`. Unknown ids are ignored.
pub fn clear(ctx: &mut EvalContext, args: &[JsValue]) -> Result<Option<TimerId>, JErrorType> {
    let id = match arg(args, 0) {
        JsValue::Undefined | JsValue::Null => return Ok(None),
        v => to_integer(ctx, &v)?,
    };
    if id <= 0 || id > i64::from(TimerId::max_value()) {
        return Ok(None);
    }
    let id = id as TimerId;
    ctx.event_loop.clear_timer(id);
    Ok(Some(id))
}

pub fn install(global: &JsObjectType, intrinsics: &Intrinsics) {
    let set_timeout = create_native_function(intrinsics, "setTimeout", 2, |ctx, _this, args| {
        Ok(JsValue::from_i64(i64::from(schedule(ctx, &args, false)?)))
    });
    let set_interval = create_native_function(intrinsics, "setInterval", 2, |ctx, _this, args| {
        Ok(JsValue::from_i64(i64::from(schedule(ctx, &args, true)?)))
    });
    let clear_timeout = create_native_function(intrinsics, "clearTimeout", 1, |ctx, _this, args| {
        clear(ctx, &args)?;
        Ok(JsValue::Undefined)
    });
    let clear_interval = create_native_function(intrinsics, "clearInterval", 1, |ctx, _this, args| {
        clear(ctx, &args)?;
        Ok(JsValue::Undefined)
    });
    define_global(global, "setTimeout", JsValue::Object(set_timeout));
    define_global(global, "setInterval", JsValue::Object(set_interval));
    define_global(global, "clearTimeout", JsValue::Object(clear_timeout));
    define_global(global, "clearInterval", JsValue::Object(clear_interval));
}
