use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use crate::host::timers::{clear, schedule};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{call_function, create_native_function};
use crate::runner::eval::types::EvalContext;
use crate::runner::event_loop::TimerId;
use crate::sandbox::Sandbox;

use super::{CapabilityModule, ModuleResult};

type TimerSet = Rc<RefCell<HashSet<TimerId>>>;

fn clear_all(ctx: &mut EvalContext, timers: &TimerSet) {
    for id in timers.borrow_mut().drain() {
        ctx.event_loop.clear_timer(id);
    }
}

/// Overrides `setTimeout`/`clearTimeout` and clears pending timeouts on close.
pub struct TimeoutModule;

impl CapabilityModule for TimeoutModule {
    fn name(&self) -> &str {
        "timeout"
    }

    fn setup(&self, _sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        let timers: TimerSet = Rc::new(RefCell::new(HashSet::new()));

        let pending = timers.clone();
        let set_timeout = create_native_function(&ctx.intrinsics, "setTimeout", 2, move |ctx, _this, args| {
            let mut args = args;
            let callback = args.first().cloned().unwrap_or(JsValue::Undefined);
            let id_cell = Rc::new(Cell::new(0));
            if callback.is_callable() {
                // Forget the id once the timeout has fired.
                let fired = pending.clone();
                let fired_id = id_cell.clone();
                let wrapper = create_native_function(&ctx.intrinsics, "", 0, move |ctx, this, args| {
                    fired.borrow_mut().remove(&fired_id.get());
                    call_function(ctx, &callback, this, args)
                });
                args[0] = JsValue::Object(wrapper);
            }
            let id = schedule(ctx, &args, false)?;
            id_cell.set(id);
            pending.borrow_mut().insert(id);
            Ok(JsValue::from_i64(i64::from(id)))
        });

        let cleared = timers.clone();
        let clear_timeout = create_native_function(&ctx.intrinsics, "clearTimeout", 1, move |ctx, _this, args| {
            if let Some(id) = clear(ctx, &args)? {
                cleared.borrow_mut().remove(&id);
            }
            Ok(JsValue::Undefined)
        });

        Ok(ModuleResult::new()
            .with_override("setTimeout", JsValue::Object(set_timeout))
            .with_override("clearTimeout", JsValue::Object(clear_timeout))
            .on_recover(move |ctx| {
                clear_all(ctx, &timers);
                Ok(())
            }))
    }
}

/// Overrides `setInterval`/`clearInterval` and clears every interval on close.
pub struct IntervalModule;

impl CapabilityModule for IntervalModule {
    fn name(&self) -> &str {
        "interval"
    }

    fn setup(&self, _sandbox: &Sandbox, ctx: &mut EvalContext) -> Result<ModuleResult, JErrorType> {
        let timers: TimerSet = Rc::new(RefCell::new(HashSet::new()));

        let active = timers.clone();
        let set_interval = create_native_function(&ctx.intrinsics, "setInterval", 2, move |ctx, _this, args| {
            let id = schedule(ctx, &args, true)?;
            active.borrow_mut().insert(id);
            Ok(JsValue::from_i64(i64::from(id)))
        });

        let cleared = timers.clone();
        let clear_interval = create_native_function(&ctx.intrinsics, "clearInterval", 1, move |ctx, _this, args| {
            if let Some(id) = clear(ctx, &args)? {
                cleared.borrow_mut().remove(&id);
            }
            Ok(JsValue::Undefined)
        });

        Ok(ModuleResult::new()
            .with_override("setInterval", JsValue::Object(set_interval))
            .with_override("clearInterval", JsValue::Object(clear_interval))
            .on_recover(move |ctx| {
                clear_all(ctx, &timers);
                Ok(())
            }))
    }
}
