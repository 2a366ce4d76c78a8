pub mod ds;
pub mod eval;
pub mod event_loop;
pub mod realm;
pub mod std_lib;
