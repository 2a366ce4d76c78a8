//! Script execution: scopes, env bindings, error reporting and the
//! invoke hooks.

extern crate guestvm;

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use guestvm::runner::ds::error::JErrorType;
use guestvm::runner::ds::operations::object::get;
use guestvm::runner::ds::value::JsValue;
use guestvm::sandbox::{ExecScriptOptions, Sandbox, SandboxError, SandboxOptions};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use common::{capture_warnings, num, realm, s, sandbox};

fn env(pairs: &[(&str, JsValue)]) -> IndexMap<String, JsValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

mod errors {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_onerror_called_once_and_error_still_returned() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute(
                "var calls = [];
                 window.onerror = function (message, source, line, column, error) {
                     calls.push([message, source, error]);
                 };",
            )
            .unwrap();

        let err = sandbox
            .exec_script(
                "throw new Error('boom');",
                IndexMap::new(),
                "http://app.test/main.js",
                ExecScriptOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.script_error().unwrap().message(), "boom");

        assert_eq!(sandbox.execute("calls.length").unwrap(), num(1));
        assert_eq!(sandbox.execute("calls[0][0]").unwrap(), s("boom"));
        assert_eq!(sandbox.execute("calls[0][1]").unwrap(), s("http://app.test/main.js"));
        assert_eq!(sandbox.execute("calls[0][2] !== null").unwrap(), JsValue::Boolean(true));
        assert_eq!(sandbox.execute("calls[0][2].message").unwrap(), s("boom"));
    }

    #[test]
    fn test_onerror_source_falls_back_to_base_url() {
        let realm = realm();
        let sandbox = Sandbox::new(&realm, SandboxOptions::new().with_base_url("http://app.test/"));
        sandbox
            .execute("var source = null; onerror = function (m, s) { source = s; };")
            .unwrap();
        assert!(sandbox.execute("missing.property").is_err());
        assert_eq!(sandbox.execute("source").unwrap(), s("http://app.test/"));
    }

    #[test]
    fn test_native_errors_reach_onerror_as_error_objects() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute("var seen = null; onerror = function (m, s, l, c, e) { seen = e; };")
            .unwrap();
        let err = sandbox.execute("null.x").unwrap_err();
        match err.script_error() {
            Some(JErrorType::TypeError(_)) => {}
            other => panic!("expected a TypeError, got {:?}", other),
        }
        assert_eq!(sandbox.execute("seen instanceof TypeError").unwrap(), JsValue::Boolean(true));
    }

    #[test]
    fn test_throwing_onerror_is_swallowed() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute("onerror = function () { throw new Error('handler'); };")
            .unwrap();
        let (result, warnings) = capture_warnings(|| sandbox.execute("throw 'original';"));
        let err = result.unwrap_err();
        assert_eq!(err.script_error().unwrap().message(), "original");
        assert!(warnings.contains("window.onerror threw"));
    }

    #[test]
    fn test_oversized_arrays_fail_as_range_errors() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        for code in ["var a = []; a.length = 1e18;", "var b = []; b[1e9] = 1;"].iter() {
            match sandbox.execute(code) {
                Err(SandboxError::Script(JErrorType::RangeError(_))) => {}
                other => panic!("expected a RangeError from {}, got {:?}", code, other.map(|_| ())),
            }
        }
        assert_eq!(
            sandbox.execute("var c = []; c['18446744073709551615'] = 1; c.length").unwrap(),
            num(0)
        );
    }

    #[test]
    fn test_syntax_errors_are_script_errors() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        match sandbox.execute("var = ;") {
            Err(SandboxError::Script(JErrorType::SyntaxError(_))) => {}
            other => panic!("expected a SyntaxError, got {:?}", other.map(|_| ())),
        }
    }
}

mod hooks {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invoke_hooks() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let log = Rc::new(RefCell::new(vec![]));

        let before = log.clone();
        sandbox.hooks.before_invoke.tap(move |invoke| {
            before.borrow_mut().push(format!("before {}", invoke.url));
        });
        let after = log.clone();
        sandbox.hooks.after_invoke.tap(move |invoke| {
            after.borrow_mut().push(format!("after {}", invoke.url));
        });
        let failed = log.clone();
        sandbox.hooks.invoke_error.tap(move |error| {
            failed
                .borrow_mut()
                .push(format!("error {} {}", error.url, error.error.message()));
        });

        sandbox
            .exec_script("1", IndexMap::new(), "a.js", ExecScriptOptions::default())
            .unwrap();
        sandbox
            .exec_script("throw 'x'", IndexMap::new(), "b.js", ExecScriptOptions::default())
            .unwrap_err();

        assert_eq!(
            *log.borrow(),
            vec!["before a.js", "after a.js", "before b.js", "error b.js x"]
        );
    }

    #[test]
    fn test_source_url_is_appended() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let code = Rc::new(RefCell::new(String::new()));
        let seen = code.clone();
        sandbox
            .hooks
            .after_invoke
            .tap(move |invoke| *seen.borrow_mut() = invoke.code.borrow().clone());

        sandbox
            .exec_script("var x = 1;", IndexMap::new(), "http://app.test/x.js", ExecScriptOptions::default())
            .unwrap();
        assert_eq!(*code.borrow(), "var x = 1;\n//# sourceURL=http://app.test/x.js\n");

        sandbox.execute("var y = 2;").unwrap();
        assert_eq!(*code.borrow(), "var y = 2;");
    }

    #[test]
    fn test_closed_sandbox_emits_nothing() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        sandbox
            .hooks
            .before_invoke
            .tap(move |_| counter.set(counter.get() + 1));
        sandbox.close();
        assert!(matches!(sandbox.execute("1"), Err(SandboxError::Closed(_))));
        assert_eq!(count.get(), 0);
    }
}

mod env_bindings {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_env_bindings_are_visible() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let value = sandbox
            .exec_script(
                "appName + ':' + version",
                env(&[("appName", s("shop")), ("version", num(3))]),
                "",
                ExecScriptOptions::default(),
            )
            .unwrap();
        assert_eq!(value, s("shop:3"));
        assert_eq!(sandbox.execute("typeof appName").unwrap(), s("undefined"));
    }

    #[test]
    fn test_env_shadows_globals() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let value = sandbox
            .exec_script(
                "typeof fetch",
                env(&[("fetch", s("shadowed"))]),
                "",
                ExecScriptOptions::default(),
            )
            .unwrap();
        assert_eq!(value, s("string"));
    }
}

mod scopes {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_let_is_per_script() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox.execute("let scoped = 1; var global = 2;").unwrap();
        assert_eq!(sandbox.execute("typeof scoped").unwrap(), s("undefined"));
        assert_eq!(sandbox.execute("global").unwrap(), num(2));
    }

    #[test]
    fn test_optimized_names_follow_the_store() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let names = sandbox.optimized_names();
        for name in ["window", "document", "setTimeout", "fetch"].iter() {
            assert!(names.iter().any(|n| n == name), "{} not optimized", name);
        }
        assert!(!names.iter().any(|n| n == "location"));
    }

    #[test]
    fn test_current_script_is_reverted_after_the_turn() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let script = sandbox
            .exec_script(
                "document.currentScript",
                IndexMap::new(),
                "http://app.test/main.js",
                ExecScriptOptions::default(),
            )
            .unwrap();
        let script = script.as_object().unwrap().clone();
        assert_eq!(script.borrow().get_class_name(), "HTMLScriptElement");

        assert!(realm.event_loop.pending_microtasks() > 0);
        realm.run_microtasks();
        assert_eq!(realm.event_loop.pending_microtasks(), 0);
        let document = sandbox.get("document").unwrap();
        let mut ctx = realm.new_context();
        let current = get(&mut ctx, document.as_object().unwrap(), "currentScript").unwrap();
        assert_eq!(current, JsValue::Null);
    }

    #[test]
    fn test_disable_with() {
        let realm = realm();
        let sandbox = Sandbox::new(&realm, SandboxOptions::new().with_disable_with(true));
        assert_eq!(sandbox.execute("typeof setTimeout").unwrap(), s("function"));
        assert!(sandbox.execute("this === window").unwrap() == JsValue::Boolean(true));
        assert!(sandbox.optimized_names().is_empty());

        sandbox.execute("var local = 1; window.viaWindow = 2;").unwrap();
        assert!(!realm.has_own("local"));
        assert!(!realm.has_own("viaWindow"));
        assert_eq!(sandbox.get("viaWindow").unwrap(), num(2));
    }
}
