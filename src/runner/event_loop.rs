//! Single-threaded task scheduling: a microtask queue and timers on a
//! virtual clock. Nothing runs until the embedder drains the queue or
//! advances the clock, so every job runs to completion on the caller's
//! stack.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_function;
use crate::runner::eval::types::EvalContext;

pub type Job = Box<dyn FnOnce(&mut EvalContext) -> Result<(), JErrorType>>;

pub type TimerId = u32;

struct TimerEntry {
    id: TimerId,
    due: u64,
    interval: Option<u64>,
    callback: JsValue,
    args: Vec<JsValue>,
    seq: u64,
}

#[derive(Default)]
pub struct EventLoop {
    microtasks: RefCell<VecDeque<Job>>,
    timers: RefCell<Vec<TimerEntry>>,
    now: Cell<u64>,
    next_timer_id: Cell<TimerId>,
    seq: Cell<u64>,
}

impl EventLoop {
    pub fn new() -> Self {
        EventLoop::default()
    }

    pub fn enqueue_microtask(&self, job: Job) {
        self.microtasks.borrow_mut().push_back(job);
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    fn next_seq(&self) -> u64 {
        let seq = self.seq.get() + 1;
        self.seq.set(seq);
        seq
    }

    /// Schedules `callback` after `delay` virtual milliseconds, repeating
    /// when `repeat` is set. Returns the timer id (never 0).
    pub fn set_timer(
        &self,
        callback: JsValue,
        args: Vec<JsValue>,
        delay: u64,
        repeat: bool,
    ) -> TimerId {
        let id = self.next_timer_id.get() + 1;
        self.next_timer_id.set(id);
        let seq = self.next_seq();
        self.timers.borrow_mut().push(TimerEntry {
            id,
            due: self.now.get() + delay,
            interval: if repeat { Some(delay.max(1)) } else { None },
            callback,
            args,
            seq,
        });
        trace!(id, delay, repeat, "timer scheduled");
        id
    }

    pub fn clear_timer(&self, id: TimerId) -> bool {
        let mut timers = self.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| t.id != id);
        before != timers.len()
    }

    pub fn has_timer(&self, id: TimerId) -> bool {
        self.timers.borrow().iter().any(|t| t.id == id)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Drains the microtask queue, including jobs queued while draining.
    /// A failing job is logged and does not stop the rest.
    pub fn run_microtasks(&self, ctx: &mut EvalContext) {
        loop {
            let job = self.microtasks.borrow_mut().pop_front();
            match job {
                Some(job) => {
                    if let Err(e) = job(ctx) {
                        warn!(error = %e, "uncaught error in microtask");
                    }
                }
                None => break,
            }
        }
    }

    fn take_due_timer(&self, until: u64) -> Option<(JsValue, Vec<JsValue>)> {
        let mut timers = self.timers.borrow_mut();
        let index = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        let due = timers[index].due;
        self.now.set(due);
        match timers[index].interval {
            Some(interval) => {
                let seq = self.next_seq();
                let t = &mut timers[index];
                t.due = due + interval;
                t.seq = seq;
                Some((t.callback.clone(), t.args.clone()))
            }
            None => {
                let t = timers.remove(index);
                Some((t.callback, t.args))
            }
        }
    }

    /// Moves the clock forward by `ms`, firing every timer that falls due in
    /// order. Microtasks are drained after each timer callback.
    pub fn advance(&self, ctx: &mut EvalContext, ms: u64) {
        let until = self.now.get() + ms;
        self.run_microtasks(ctx);
        while let Some((callback, args)) = self.take_due_timer(until) {
            if let Err(e) = call_function(ctx, &callback, JsValue::Undefined, args) {
                warn!(error = %e, "uncaught error in timer callback");
            }
            self.run_microtasks(ctx);
        }
        self.now.set(until);
    }
}
