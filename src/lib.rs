//! # guestvm - sandboxed guest scripts on an embedded interpreter
//!
//! Several guest applications can share one host page. Each guest runs in
//! a [`sandbox::Sandbox`] that hands it its own virtual global: a proxy-like
//! object in front of the real global that decides, name by name, whether a
//! read or write reaches the host.
//!
//! * **Protected** names always go to the real global, so guests can share
//!   selected state with the host.
//! * **Insulated** names never touch the real global.
//! * Everything else is read through to the host until the guest writes it;
//!   writes stay in the sandbox.
//!
//! Host capabilities that keep running after a script returns (timers,
//! listeners, requests, observers, appended elements) are wrapped by
//! capability modules which undo them when the sandbox closes.
//!
//! ## Quick Start
//!
//! ```
//! use guestvm::runner::realm::Realm;
//! use guestvm::sandbox::{Sandbox, SandboxOptions};
//!
//! let realm = Realm::new().unwrap();
//! let sandbox = Sandbox::new(&realm, SandboxOptions::new().with_namespace("app"));
//!
//! sandbox.execute("window.answer = 42; var greeting = 'hi';").unwrap();
//! assert!(!realm.has_own("answer"));
//! assert!(!realm.has_own("greeting"));
//!
//! sandbox.close();
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - PEG parser and AST types
//! - **[`runner`]** - Tree-walking interpreter, realms and the event loop
//! - **[`host`]** - The simulated browser surfaces a realm exposes
//! - **[`sandbox`]** - Virtual globals, capability modules and the sandbox
//!   lifecycle

#[macro_use]
extern crate lazy_static;

pub mod host;
pub mod parser;
pub mod runner;
pub mod sandbox;
