//! Browser-like host surfaces installed on a realm's real global.
//!
//! Each submodule installs its globals and hands back the Rust-side state
//! behind them, so the embedder (and the sandbox capability modules) can
//! reach the same DOM, listeners, storage and request log the scripts see.

pub mod dom;
pub mod events;
pub mod history;
pub mod network;
pub mod observer;
pub mod storage;
pub mod timers;

use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::eval::types::Intrinsics;
use crate::runner::event_loop::EventLoop;

use self::dom::Dom;
use self::events::ListenerRegistry;
use self::history::HistoryState;
use self::network::NetworkLog;
use self::observer::ObserverRegistry;
use self::storage::StorageArea;

pub struct HostEnv {
    pub dom: Rc<Dom>,
    pub listeners: Rc<ListenerRegistry>,
    pub history: Rc<HistoryState>,
    pub local_storage: Rc<StorageArea>,
    pub session_storage: Rc<StorageArea>,
    pub network: Rc<NetworkLog>,
    pub observers: Rc<ObserverRegistry>,
}

/// Installs every host surface on `global`. Fails only when `url` does not parse.
pub fn install(
    global: &JsObjectType,
    intrinsics: &Intrinsics,
    event_loop: &Rc<EventLoop>,
    url: &str,
) -> Result<HostEnv, JErrorType> {
    let observers = Rc::new(ObserverRegistry::new(event_loop.clone()));
    observer::install(global, intrinsics, &observers);
    let dom = dom::install(global, intrinsics, &observers);
    let listeners = Rc::new(ListenerRegistry::default());
    events::install(global, intrinsics, &listeners);
    let history = history::install(global, intrinsics, url)?;
    let (local_storage, session_storage) = storage::install(global, intrinsics);
    let network = Rc::new(NetworkLog::new(event_loop.clone()));
    network::install(global, intrinsics, &network);
    timers::install(global, intrinsics);
    Ok(HostEnv {
        dom,
        listeners,
        history,
        local_storage,
        session_storage,
        network,
        observers,
    })
}
