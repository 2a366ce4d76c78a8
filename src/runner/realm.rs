//! A realm: the real global object, its intrinsics, event loop and host
//! surfaces, plus the scope chain top-level scripts run in.

use std::rc::Rc;

use tracing::debug;

use crate::host::{self, HostEnv};
use crate::parser::ast::ProgramData;
use crate::parser::GuestParser;
use crate::runner::ds::env_record::{Scope, ScopeRef};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType};
use crate::runner::ds::operations::object::{get, set};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::statement::evaluate_script;
use crate::runner::eval::types::{EvalContext, Intrinsics, ValueResult};
use crate::runner::event_loop::EventLoop;
use crate::runner::std_lib::{create_intrinsics, define_global, register_core_builtins};

/// Parses `code`, reporting grammar failures as a `SyntaxError`.
pub fn compile(code: &str) -> Result<ProgramData, JErrorType> {
    GuestParser::parse_to_ast_from_str(code).map_err(|e| JErrorType::SyntaxError(e.to_string()))
}

pub struct Realm {
    pub global: JsObjectType,
    pub intrinsics: Rc<Intrinsics>,
    pub event_loop: Rc<EventLoop>,
    pub host: HostEnv,
    /// Declarative scope holding top-level `let`/`const` across scripts.
    lexical_scope: ScopeRef,
}

impl Realm {
    pub fn new() -> Result<Rc<Realm>, JErrorType> {
        Realm::with_url(host::history::INITIAL_URL)
    }

    /// A realm whose `location` starts at `url`.
    pub fn with_url(url: &str) -> Result<Rc<Realm>, JErrorType> {
        let intrinsics = Rc::new(create_intrinsics());
        let event_loop = Rc::new(EventLoop::new());
        let global = JsObject::new(Some(intrinsics.object_prototype.clone()))
            .class("Window")
            .into_ref();
        register_core_builtins(&global, &intrinsics);
        let host = host::install(&global, &intrinsics, &event_loop, url)?;
        for name in ["globalThis", "window", "self", "top", "parent"].iter() {
            define_global(&global, name, JsValue::Object(global.clone()));
        }

        let global_scope = Scope::new_object(global.clone(), None, true, false);
        global_scope.borrow_mut().this_value = Some(JsValue::Object(global.clone()));
        let lexical_scope = Scope::new_declarative(Some(global_scope), false);
        debug!(url, "realm created");
        Ok(Rc::new(Realm {
            global,
            intrinsics,
            event_loop,
            host,
            lexical_scope,
        }))
    }

    pub fn new_context(&self) -> EvalContext {
        EvalContext::new(self.intrinsics.clone(), self.event_loop.clone())
    }

    /// Runs `code` as a top-level script against the real global.
    pub fn eval(&self, code: &str) -> ValueResult {
        let program = compile(code)?;
        let mut ctx = self.new_context();
        evaluate_script(&mut ctx, &program, &self.lexical_scope)
    }

    pub fn run_microtasks(&self) {
        let mut ctx = self.new_context();
        self.event_loop.run_microtasks(&mut ctx);
    }

    /// Advances the virtual clock, firing due timers and draining microtasks.
    pub fn advance_time(&self, ms: u64) {
        let mut ctx = self.new_context();
        self.event_loop.advance(&mut ctx, ms);
    }

    pub fn get(&self, name: &str) -> ValueResult {
        let mut ctx = self.new_context();
        get(&mut ctx, &self.global, name)
    }

    pub fn set(&self, name: &str, value: JsValue) -> Result<(), JErrorType> {
        let mut ctx = self.new_context();
        set(&mut ctx, &self.global, name, value)?;
        Ok(())
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.global.borrow().get_own_property(name).is_some()
    }

    /// Every own property name of the real global, hidden ones included.
    pub fn global_keys(&self) -> Vec<String> {
        self.global.borrow().properties.keys().cloned().collect()
    }
}

impl Drop for Realm {
    fn drop(&mut self) {
        // The global refers to itself through `window` and friends.
        if let Ok(mut global) = self.global.try_borrow_mut() {
            global.properties.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_var_lands_on_global() {
        let realm = Realm::new().unwrap();
        realm.eval("var answer = 42; function twice(x) { return x * 2; }").unwrap();
        assert!(realm.has_own("answer"));
        assert!(realm.has_own("twice"));
        assert_eq!(realm.eval("twice(answer)").unwrap(), JsValue::from_i64(84));
    }

    #[test]
    fn test_top_level_let_stays_off_global() {
        let realm = Realm::new().unwrap();
        realm.eval("let hidden = 1;").unwrap();
        assert!(!realm.has_own("hidden"));
        assert_eq!(realm.eval("hidden + 1").unwrap(), JsValue::from_i64(2));
    }

    #[test]
    fn test_window_aliases_are_the_global() {
        let realm = Realm::new().unwrap();
        assert_eq!(
            realm.eval("window === globalThis && self === window && top === window").unwrap(),
            JsValue::Boolean(true)
        );
        assert_eq!(realm.eval("this === window").unwrap(), JsValue::Boolean(true));
    }

    #[test]
    fn test_parse_failure_is_syntax_error() {
        let realm = Realm::new().unwrap();
        match realm.eval("var x = ;") {
            Err(JErrorType::SyntaxError(_)) => {}
            other => panic!("expected SyntaxError, got {:?}", other),
        }
    }

    #[test]
    fn test_timers_fire_on_advance() {
        let realm = Realm::new().unwrap();
        realm
            .eval("var hits = 0; setTimeout(function () { hits = hits + 1; }, 50);")
            .unwrap();
        realm.advance_time(49);
        assert_eq!(realm.get("hits").unwrap(), JsValue::from_i64(0));
        realm.advance_time(1);
        assert_eq!(realm.get("hits").unwrap(), JsValue::from_i64(1));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(Realm::with_url("not a url").is_err());
    }
}
