//! Lifecycle notifications.
//!
//! A [`SyncHook`] is a list of listeners called in registration order.
//! Listeners observe; they cannot veto anything the sandbox does.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::value::JsValue;

use super::exec::ExecScriptOptions;

pub type HookId = u64;

struct Listener<T: ?Sized> {
    id: HookId,
    once: bool,
    callback: Rc<dyn Fn(&T)>,
}

pub struct SyncHook<T: ?Sized> {
    name: &'static str,
    listeners: RefCell<Vec<Listener<T>>>,
    next_id: Cell<HookId>,
}

impl<T: ?Sized> SyncHook<T> {
    pub fn new(name: &'static str) -> Self {
        SyncHook {
            name,
            listeners: RefCell::new(vec![]),
            next_id: Cell::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn add(&self, callback: Rc<dyn Fn(&T)>, once: bool) -> HookId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.listeners.borrow_mut().push(Listener { id, once, callback });
        id
    }

    pub fn tap<F>(&self, callback: F) -> HookId
    where
        F: Fn(&T) + 'static,
    {
        self.add(Rc::new(callback), false)
    }

    /// Like [`SyncHook::tap`], removed after its first call.
    pub fn once<F>(&self, callback: F) -> HookId
    where
        F: Fn(&T) + 'static,
    {
        self.add(Rc::new(callback), true)
    }

    pub fn untap(&self, id: HookId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        before != listeners.len()
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    pub fn emit(&self, value: &T) {
        let callbacks: Vec<Rc<dyn Fn(&T)>> = {
            let mut listeners = self.listeners.borrow_mut();
            let callbacks = listeners.iter().map(|l| l.callback.clone()).collect();
            listeners.retain(|l| !l.once);
            callbacks
        };
        for callback in callbacks {
            callback(value);
        }
    }
}

/// What `before_invoke` and `after_invoke` listeners see. `code` may be
/// rewritten by `before_invoke` listeners before it runs.
pub struct InvokeContext {
    pub code: RefCell<String>,
    pub url: String,
    pub env: IndexMap<String, JsValue>,
    pub options: ExecScriptOptions,
}

pub struct InvokeError {
    pub error: JErrorType,
    pub url: String,
    pub env: IndexMap<String, JsValue>,
    pub options: ExecScriptOptions,
}

pub struct SandboxLifecycle {
    /// Receives the privileged view of the new virtual global.
    pub started: SyncHook<JsObjectType>,
    pub closed: SyncHook<()>,
    pub before_clear_effect: SyncHook<()>,
    pub after_clear_effect: SyncHook<()>,
    pub before_invoke: SyncHook<InvokeContext>,
    pub after_invoke: SyncHook<InvokeContext>,
    pub invoke_error: SyncHook<InvokeError>,
}

impl SandboxLifecycle {
    pub fn new() -> Self {
        SandboxLifecycle {
            started: SyncHook::new("started"),
            closed: SyncHook::new("closed"),
            before_clear_effect: SyncHook::new("beforeClearEffect"),
            after_clear_effect: SyncHook::new("afterClearEffect"),
            before_invoke: SyncHook::new("beforeInvoke"),
            after_invoke: SyncHook::new("afterInvoke"),
            invoke_error: SyncHook::new("invokeError"),
        }
    }
}

impl Default for SandboxLifecycle {
    fn default() -> Self {
        SandboxLifecycle::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_registration_order() {
        let hook: SyncHook<i32> = SyncHook::new("test");
        let seen = Rc::new(RefCell::new(vec![]));
        let s = seen.clone();
        hook.tap(move |v| s.borrow_mut().push(("a", *v)));
        let s = seen.clone();
        hook.tap(move |v| s.borrow_mut().push(("b", *v)));
        hook.emit(&1);
        assert_eq!(*seen.borrow(), vec![("a", 1), ("b", 1)]);
    }

    #[test]
    fn test_once_and_untap() {
        let hook: SyncHook<()> = SyncHook::new("test");
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        hook.once(move |_| c.set(c.get() + 1));
        let c = count.clone();
        let id = hook.tap(move |_| c.set(c.get() + 10));
        hook.emit(&());
        assert_eq!(count.get(), 11);
        assert_eq!(hook.len(), 1);
        assert!(hook.untap(id));
        hook.emit(&());
        assert_eq!(count.get(), 11);
        assert!(hook.is_empty());
    }

    #[test]
    fn test_listener_may_tap_while_emitting() {
        let hook: Rc<SyncHook<()>> = Rc::new(SyncHook::new("test"));
        let inner = hook.clone();
        hook.once(move |_| {
            inner.tap(|_| {});
        });
        hook.emit(&());
        assert_eq!(hook.len(), 1);
    }
}
