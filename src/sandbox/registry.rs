//! Live sandboxes by id, and the element injector that routes appended
//! guest nodes to their sandbox's effect ledger.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::trace;

use crate::host::dom::element_data;
use crate::runner::ds::object::JsObjectType;
use crate::runner::realm::Realm;

use super::{Sandbox, SandboxId};

thread_local! {
    static SANDBOXES: RefCell<IndexMap<SandboxId, Weak<Sandbox>>> = RefCell::new(IndexMap::new());
    static INJECTED_REALMS: RefCell<Vec<Weak<Realm>>> = RefCell::new(vec![]);
}

pub fn register(sandbox: &Rc<Sandbox>) {
    SANDBOXES.with(|s| {
        let mut s = s.borrow_mut();
        s.retain(|_, w| w.strong_count() > 0);
        s.insert(sandbox.id(), Rc::downgrade(sandbox));
    });
}

/// Safe to call from `Drop`: a table that is gone or busy is left alone.
pub fn unregister(id: SandboxId) -> bool {
    SANDBOXES
        .try_with(|s| match s.try_borrow_mut() {
            Ok(mut s) => s.shift_remove(&id).is_some(),
            Err(_) => false,
        })
        .unwrap_or(false)
}

/// Number of entries in the table, dead ones included.
pub fn len() -> usize {
    SANDBOXES.with(|s| s.borrow().len())
}

pub fn get(id: SandboxId) -> Option<Rc<Sandbox>> {
    SANDBOXES.with(|s| s.borrow().get(&id).and_then(|w| w.upgrade()))
}

/// Ids of the sandboxes still alive, in creation order.
pub fn live_ids() -> Vec<SandboxId> {
    SANDBOXES.with(|s| {
        s.borrow()
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect()
    })
}

/// The sandbox whose document created `element`.
pub fn for_element(element: &JsObjectType) -> Option<Rc<Sandbox>> {
    element_data(element)
        .and_then(|d| d.owner())
        .and_then(get)
}

/// Installs the append hook on `realm`'s DOM, once per realm.
pub fn install_injector(realm: &Rc<Realm>) {
    let fresh = INJECTED_REALMS.with(|r| {
        let mut r = r.borrow_mut();
        r.retain(|w| w.strong_count() > 0);
        let this = Rc::downgrade(realm);
        if r.iter().any(|w| Weak::ptr_eq(w, &this)) {
            false
        } else {
            r.push(this);
            true
        }
    });
    if !fresh {
        return;
    }
    trace!("element injector installed");
    realm.host.dom.add_append_hook(Rc::new(|element: &JsObjectType| {
        if let Some(sandbox) = for_element(element) {
            sandbox.record_dynamic_node(element);
        }
    }));
}
