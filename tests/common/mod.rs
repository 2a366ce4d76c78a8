//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use guestvm::runner::ds::value::JsValue;
use guestvm::runner::realm::Realm;
use guestvm::sandbox::{Sandbox, SandboxOptions};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

pub fn realm() -> Rc<Realm> {
    Realm::new().expect("realm")
}

pub fn sandbox(realm: &Rc<Realm>, namespace: &str) -> Rc<Sandbox> {
    Sandbox::new(realm, SandboxOptions::new().with_namespace(namespace))
}

pub fn num(n: i64) -> JsValue {
    JsValue::from_i64(n)
}

pub fn s(v: &str) -> JsValue {
    JsValue::from_str(v)
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
}

/// Collects WARN events, message and fields flattened into one line.
#[derive(Clone, Default)]
pub struct WarningCollector {
    lines: Arc<Mutex<Vec<String>>>,
}

impl WarningCollector {
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

#[derive(Default)]
struct LineVisitor {
    line: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if !self.line.is_empty() {
            self.line.push(' ');
        }
        if field.name() == "message" {
            self.line.push_str(&format!("{:?}", value));
        } else {
            self.line.push_str(&format!("{}={:?}", field.name(), value));
        }
    }
}

impl<S> Layer<S> for WarningCollector
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(visitor.line);
        }
    }
}

/// Runs `f` with a subscriber that records warnings, and returns them.
pub fn capture_warnings<F, R>(f: F) -> (R, WarningCollector)
where
    F: FnOnce() -> R,
{
    let collector = WarningCollector::default();
    let subscriber = tracing_subscriber::registry().with(collector.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, collector)
}
