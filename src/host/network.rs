//! `fetch` and `AbortController`.
//!
//! Requests never leave the process: they are recorded in a [`NetworkLog`]
//! and settled by the embedder with [`NetworkLog::respond`] or by an abort
//! signal. Settlement callbacks run as microtasks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType};
use crate::runner::ds::operations::object::{create_object, get, has_property};
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, call_function, create_native_function};
use crate::runner::eval::types::{EvalContext, Intrinsics};
use crate::runner::event_loop::EventLoop;
use crate::runner::std_lib::{define_global, BuiltInObject};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestStatus {
    Pending,
    Completed(u16),
    Aborted,
}

#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub id: u32,
    pub url: String,
    pub method: String,
    pub status: RequestStatus,
}

/// State behind an `AbortSignal`.
#[derive(Default)]
pub struct SignalData {
    aborted: Cell<bool>,
}

impl SignalData {
    pub fn is_aborted(&self) -> bool {
        self.aborted.get()
    }
}

struct Request {
    record: RequestRecord,
    signal: Option<Rc<SignalData>>,
    on_fulfilled: Vec<JsValue>,
    on_rejected: Vec<JsValue>,
}

enum Settlement {
    Fulfilled { status: u16, body: String, url: String },
    Aborted,
}

pub struct NetworkLog {
    event_loop: Rc<EventLoop>,
    requests: RefCell<Vec<Request>>,
    next_id: Cell<u32>,
}

impl NetworkLog {
    pub fn new(event_loop: Rc<EventLoop>) -> Self {
        NetworkLog {
            event_loop,
            requests: RefCell::new(vec![]),
            next_id: Cell::new(0),
        }
    }

    pub fn requests(&self) -> Vec<RequestRecord> {
        self.requests
            .borrow()
            .iter()
            .map(|r| r.record.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.record.status == RequestStatus::Pending)
            .count()
    }

    fn start(&self, url: String, method: String, signal: Option<Rc<SignalData>>) -> u32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        debug!(id, url = %url, method = %method, "fetch started");
        self.requests.borrow_mut().push(Request {
            record: RequestRecord {
                id,
                url,
                method,
                status: RequestStatus::Pending,
            },
            signal,
            on_fulfilled: vec![],
            on_rejected: vec![],
        });
        id
    }

    fn subscribe(&self, id: u32, on_fulfilled: JsValue, on_rejected: JsValue) {
        if let Some(r) = self
            .requests
            .borrow_mut()
            .iter_mut()
            .find(|r| r.record.id == id)
        {
            if on_fulfilled.is_callable() {
                r.on_fulfilled.push(on_fulfilled);
            }
            if on_rejected.is_callable() {
                r.on_rejected.push(on_rejected);
            }
        }
    }

    fn settle(&self, id: u32, settlement: Settlement) -> bool {
        let callbacks = {
            let mut requests = self.requests.borrow_mut();
            let r = match requests
                .iter_mut()
                .find(|r| r.record.id == id && r.record.status == RequestStatus::Pending)
            {
                Some(r) => r,
                None => return false,
            };
            match &settlement {
                Settlement::Fulfilled { status, .. } => {
                    r.record.status = RequestStatus::Completed(*status);
                    std::mem::take(&mut r.on_fulfilled)
                }
                Settlement::Aborted => {
                    r.record.status = RequestStatus::Aborted;
                    std::mem::take(&mut r.on_rejected)
                }
            }
        };
        self.event_loop
            .enqueue_microtask(Box::new(move |ctx: &mut EvalContext| {
                let value = settlement_value(ctx, &settlement);
                for callback in callbacks {
                    call_function(ctx, &callback, JsValue::Undefined, vec![value.clone()])?;
                }
                Ok(())
            }));
        true
    }

    /// Completes a pending request. `false` if it was not pending.
    pub fn respond(&self, id: u32, status: u16, body: &str) -> bool {
        let url = self
            .requests
            .borrow()
            .iter()
            .find(|r| r.record.id == id)
            .map(|r| r.record.url.clone())
            .unwrap_or_default();
        self.settle(
            id,
            Settlement::Fulfilled {
                status,
                body: body.to_string(),
                url,
            },
        )
    }

    pub fn abort(&self, id: u32) -> bool {
        self.settle(id, Settlement::Aborted)
    }

    /// Aborts every pending request bound to `signal`.
    pub fn abort_signal(&self, signal: &Rc<SignalData>) -> usize {
        signal.aborted.set(true);
        let ids: Vec<u32> = self
            .requests
            .borrow()
            .iter()
            .filter(|r| {
                r.record.status == RequestStatus::Pending
                    && r.signal.as_ref().map_or(false, |s| Rc::ptr_eq(s, signal))
            })
            .map(|r| r.record.id)
            .collect();
        ids.into_iter().filter(|id| self.abort(*id)).count()
    }
}

fn settlement_value(ctx: &mut EvalContext, settlement: &Settlement) -> JsValue {
    let o = create_object(ctx);
    {
        let mut o = o.borrow_mut();
        match settlement {
            Settlement::Fulfilled { status, body, url } => {
                o.class_name = "Response".to_string();
                o.insert("status", JsValue::from_i64(i64::from(*status)));
                o.insert("ok", JsValue::Boolean((200..300).contains(status)));
                o.insert("url", JsValue::String(url.clone()));
                o.insert("body", JsValue::String(body.clone()));
            }
            Settlement::Aborted => {
                o.class_name = "Error".to_string();
                o.insert("name", JsValue::from_str("AbortError"));
                o.insert("message", JsValue::from_str("The user aborted a request."));
            }
        }
    }
    JsValue::Object(o)
}

/// `fetch(input, init)`. Returns a thenable handle for the request.
pub fn fetch(
    ctx: &mut EvalContext,
    network: &Rc<NetworkLog>,
    input: &JsValue,
    init: &JsValue,
) -> Result<JsValue, JErrorType> {
    let url = to_string(ctx, input)?;
    let (method, signal) = match init {
        JsValue::Object(o) => {
            let method = if has_property(ctx, o, "method")? {
                let method = get(ctx, o, "method")?;
                to_string(ctx, &method)?.to_ascii_uppercase()
            } else {
                "GET".to_string()
            };
            let signal = match get(ctx, o, "signal")? {
                JsValue::Object(s) => s.borrow().host_data::<SignalData>(),
                _ => None,
            };
            (method, signal)
        }
        _ => ("GET".to_string(), None),
    };
    let already_aborted = signal.as_ref().map_or(false, |s| s.is_aborted());
    let id = network.start(url, method, signal);
    if already_aborted {
        network.abort(id);
    }

    let then_log = network.clone();
    let catch_log = network.clone();
    let handle = BuiltInObject::new(&ctx.intrinsics, "Promise")
        .add_hidden_value("requestId", JsValue::from_i64(i64::from(id)))
        .add_method("then", 2, move |_ctx, this, args| {
            then_log.subscribe(id, arg(&args, 0), arg(&args, 1));
            Ok(this)
        })
        .add_method("catch", 1, move |_ctx, this, args| {
            catch_log.subscribe(id, JsValue::Undefined, arg(&args, 0));
            Ok(this)
        })
        .build();
    Ok(JsValue::Object(handle))
}

/// `new AbortController()`: returns the controller and its signal state.
pub fn create_abort_controller(
    intrinsics: &Intrinsics,
    network: &Rc<NetworkLog>,
) -> (JsObjectType, Rc<SignalData>) {
    let data = Rc::new(SignalData::default());
    let mut signal = JsObject::new(Some(intrinsics.object_prototype.clone()))
        .class("AbortSignal")
        .host(data.clone());
    signal.insert("aborted", JsValue::Boolean(false));
    let signal = signal.into_ref();

    let abort_log = network.clone();
    let abort_data = data.clone();
    let abort_signal = Rc::downgrade(&signal);
    let abort = create_native_function(intrinsics, "abort", 0, move |_ctx, _this, _args| {
        if let Some(s) = abort_signal.upgrade() {
            s.borrow_mut().insert("aborted", JsValue::Boolean(true));
        }
        abort_log.abort_signal(&abort_data);
        Ok(JsValue::Undefined)
    });
    let controller = BuiltInObject::new(intrinsics, "AbortController")
        .add_value("signal", JsValue::Object(signal))
        .add_hidden_value("abort", JsValue::Object(abort))
        .build();
    (controller, data)
}

/// Installs `fetch` and `AbortController` on `global`.
pub fn install(global: &JsObjectType, intrinsics: &Intrinsics, network: &Rc<NetworkLog>) {
    let fetch_log = network.clone();
    let fetch_fn = create_native_function(intrinsics, "fetch", 2, move |ctx, _this, args| {
        fetch(ctx, &fetch_log, &arg(&args, 0), &arg(&args, 1))
    });
    define_global(global, "fetch", JsValue::Object(fetch_fn));

    let ctor_log = network.clone();
    let controller = BuiltInObject::constructor(intrinsics, "AbortController", 0, move |ctx, _this, _args| {
        let (controller, _) = create_abort_controller(&ctx.intrinsics, &ctor_log);
        Ok(JsValue::Object(controller))
    })
    .build();
    define_global(global, "AbortController", JsValue::Object(controller));
}
