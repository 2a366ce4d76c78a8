//! Session history and `location`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;
use url::Url;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::type_conversion::{to_integer, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{arg, create_native_constructor};
use crate::runner::eval::types::{EvalContext, Intrinsics};
use crate::runner::std_lib::{define_global, BuiltInObject};

pub const INITIAL_URL: &str = "http://localhost/";

struct HistoryEntry {
    state: JsValue,
    url: Url,
}

pub struct HistoryState {
    entries: RefCell<Vec<HistoryEntry>>,
    index: Cell<usize>,
    history: JsObjectType,
    location: JsObjectType,
}

impl HistoryState {
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn current_url(&self) -> String {
        self.entries.borrow()[self.index.get()].url.to_string()
    }

    pub fn history_object(&self) -> &JsObjectType {
        &self.history
    }

    fn resolve(&self, url: &JsValue, ctx: &mut EvalContext) -> Result<Url, JErrorType> {
        let current = self.entries.borrow()[self.index.get()].url.clone();
        match url {
            JsValue::Undefined | JsValue::Null => Ok(current),
            v => {
                let raw = to_string(ctx, v)?;
                current.join(&raw).map_err(|e| {
                    JErrorType::TypeError(format!(
                        "Failed to execute 'pushState' on 'History': '{}' cannot be resolved: {}",
                        raw, e
                    ))
                })
            }
        }
    }

    fn push(&self, state: JsValue, url: Url) {
        let index = self.index.get();
        let mut entries = self.entries.borrow_mut();
        entries.truncate(index + 1);
        entries.push(HistoryEntry { state, url });
        self.index.set(entries.len() - 1);
        drop(entries);
        self.sync();
    }

    fn replace(&self, state: JsValue, url: Url) {
        let index = self.index.get();
        self.entries.borrow_mut()[index] = HistoryEntry { state, url };
        self.sync();
    }

    fn go(&self, delta: i64) {
        let target = self.index.get() as i64 + delta;
        if target >= 0 && (target as usize) < self.len() {
            self.index.set(target as usize);
            self.sync();
        }
    }

    /// Mirrors the current entry onto the `history` and `location` objects.
    fn sync(&self) {
        let entries = self.entries.borrow();
        let entry = &entries[self.index.get()];
        {
            let mut h = self.history.borrow_mut();
            h.insert("length", JsValue::from_i64(entries.len() as i64));
            h.insert("state", entry.state.clone());
        }
        write_location(&self.location, &entry.url);
        debug!(url = %entry.url, "history entry changed");
    }
}

fn write_location(location: &JsObjectType, url: &Url) {
    let mut l = location.borrow_mut();
    let host = match (url.host_str(), url.port()) {
        (Some(h), Some(p)) => format!("{}:{}", h, p),
        (Some(h), None) => h.to_string(),
        _ => String::new(),
    };
    l.insert("href", JsValue::String(url.to_string()));
    l.insert("origin", JsValue::String(url.origin().ascii_serialization()));
    l.insert("protocol", JsValue::String(format!("{}:", url.scheme())));
    l.insert("host", JsValue::String(host));
    l.insert("pathname", JsValue::from_str(url.path()));
    l.insert(
        "search",
        JsValue::String(url.query().map(|q| format!("?{}", q)).unwrap_or_default()),
    );
    l.insert(
        "hash",
        JsValue::String(url.fragment().map(|f| format!("#{}", f)).unwrap_or_default()),
    );
}

/// Installs `history`, `History` and `location` on `global`.
pub fn install(
    global: &JsObjectType,
    intrinsics: &Intrinsics,
    initial_url: &str,
) -> Result<Rc<HistoryState>, JErrorType> {
    let initial = Url::parse(initial_url)
        .map_err(|e| JErrorType::TypeError(format!("Invalid URL '{}': {}", initial_url, e)))?;
    let history = BuiltInObject::new(intrinsics, "History")
        .add_value("scrollRestoration", JsValue::from_str("auto"))
        .build();
    let location = BuiltInObject::new(intrinsics, "Location").build();
    let state = Rc::new(HistoryState {
        entries: RefCell::new(vec![HistoryEntry {
            state: JsValue::Null,
            url: initial,
        }]),
        index: Cell::new(0),
        history: history.clone(),
        location: location.clone(),
    });
    state.sync();

    let push = Rc::downgrade(&state);
    let replace = Rc::downgrade(&state);
    let back = Rc::downgrade(&state);
    let forward = Rc::downgrade(&state);
    let go = Rc::downgrade(&state);
    BuiltInObject::on(intrinsics, &history)
        .add_method("pushState", 3, move |ctx, _this, args| {
            if let Some(s) = push.upgrade() {
                let url = s.resolve(&arg(&args, 2), ctx)?;
                s.push(arg(&args, 0), url);
            }
            Ok(JsValue::Undefined)
        })
        .add_method("replaceState", 3, move |ctx, _this, args| {
            if let Some(s) = replace.upgrade() {
                let url = s.resolve(&arg(&args, 2), ctx)?;
                s.replace(arg(&args, 0), url);
            }
            Ok(JsValue::Undefined)
        })
        .add_method("back", 0, move |_ctx, _this, _args| {
            if let Some(s) = back.upgrade() {
                s.go(-1);
            }
            Ok(JsValue::Undefined)
        })
        .add_method("forward", 0, move |_ctx, _this, _args| {
            if let Some(s) = forward.upgrade() {
                s.go(1);
            }
            Ok(JsValue::Undefined)
        })
        .add_method("go", 1, move |ctx, _this, args| {
            let delta = to_integer(ctx, &arg(&args, 0))?;
            if let Some(s) = go.upgrade() {
                s.go(delta);
            }
            Ok(JsValue::Undefined)
        });

    let history_ctor = create_native_constructor(intrinsics, "History", 0, |_ctx, _this, _args| {
        Err(JErrorType::TypeError("Illegal constructor".to_string()))
    });
    history.borrow_mut().prototype = match history_ctor.borrow().get_own_value("prototype") {
        Some(JsValue::Object(p)) => Some(p),
        _ => Some(intrinsics.object_prototype.clone()),
    };

    define_global(global, "history", JsValue::Object(history));
    define_global(global, "History", JsValue::Object(history_ctor));
    define_global(global, "location", JsValue::Object(location));
    Ok(state)
}
