//! Isolation and lifecycle tests for the sandbox controller.

extern crate guestvm;

mod common;

use std::cell::Cell;
use std::rc::Rc;

use guestvm::runner::ds::error::JErrorType;
use guestvm::runner::ds::object::JsObjectType;
use guestvm::runner::ds::operations::object::set;
use guestvm::runner::ds::value::JsValue;
use guestvm::runner::eval::function::create_native_function;
use guestvm::runner::eval::types::EvalContext;
use guestvm::sandbox::modules::{ModuleFn, ModuleResult};
use guestvm::sandbox::{registry, Sandbox, SandboxError, SandboxOptions};
use pretty_assertions::assert_eq;

use common::{capture_warnings, names, num, realm, s, sandbox};

fn classified_options(namespace: &str) -> SandboxOptions {
    SandboxOptions::new()
        .with_namespace(namespace)
        .with_protect_variable(|| names(&["theme"]))
        .with_insulation_variable(|| names(&["counter"]))
}

mod isolation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_protected_and_insulated_names() {
        let realm = realm();
        realm.set("theme", s("light")).unwrap();
        let a = Sandbox::new(&realm, classified_options("a"));
        let b = Sandbox::new(&realm, classified_options("b"));

        a.execute("counter = 1;").unwrap();
        assert_eq!(b.execute("counter").unwrap(), JsValue::Undefined);
        assert_eq!(a.execute("counter").unwrap(), num(1));
        assert!(!realm.has_own("counter"));

        a.execute("theme = 'dark';").unwrap();
        assert_eq!(b.execute("theme").unwrap(), s("dark"));
        assert_eq!(realm.get("theme").unwrap(), s("dark"));

        b.execute("window.theme = 'blue';").unwrap();
        assert_eq!(a.execute("window.theme").unwrap(), s("blue"));
    }

    #[test]
    fn test_insulated_names_are_in_window_before_any_read() {
        let realm = realm();
        realm.set("counter", num(5)).unwrap();
        let sandbox = Sandbox::new(&realm, classified_options("app"));
        assert_eq!(sandbox.execute("'counter' in window").unwrap(), JsValue::Boolean(true));
        assert_eq!(sandbox.execute("counter").unwrap(), JsValue::Undefined);
        assert_eq!(sandbox.execute("'counter' in window").unwrap(), JsValue::Boolean(true));
    }

    #[test]
    fn test_plain_names_stay_in_the_sandbox() {
        let realm = realm();
        let a = sandbox(&realm, "a");
        let b = sandbox(&realm, "b");

        a.execute("var declared = 'a'; window.assigned = 'a'; implicit = 'a';")
            .unwrap();
        for name in ["declared", "assigned", "implicit"].iter() {
            assert!(!realm.has_own(name), "{} leaked to the host", name);
            assert_eq!(a.get(name).unwrap(), s("a"));
        }
        assert_eq!(b.execute("typeof declared").unwrap(), s("undefined"));
    }

    #[test]
    fn test_host_values_are_read_through() {
        let realm = realm();
        realm.set("hostValue", num(7)).unwrap();
        let sandbox = sandbox(&realm, "app");
        assert_eq!(sandbox.execute("hostValue").unwrap(), num(7));

        sandbox.execute("hostValue = 8;").unwrap();
        assert_eq!(sandbox.execute("hostValue").unwrap(), num(8));
        assert_eq!(realm.get("hostValue").unwrap(), num(7));
    }

    #[test]
    fn test_window_this_and_self_are_the_guest_view() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let guest = sandbox.guest_global().unwrap();
        for code in ["window", "this", "self", "globalThis", "window.window"].iter() {
            let value = sandbox.execute(code).unwrap();
            assert!(value.same_object(&guest), "{} is not the guest view", code);
        }
        assert_eq!(sandbox.execute("this === window").unwrap(), JsValue::Boolean(true));
    }

    #[test]
    fn test_functions_see_the_virtual_global() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute("var total = 1; function bump() { total = total + 1; return total; }")
            .unwrap();
        assert_eq!(sandbox.execute("bump(); bump()").unwrap(), num(3));
        assert!(!realm.has_own("total"));
        assert!(!realm.has_own("bump"));
    }
}

mod overrides {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stub_module(
        name: &'static str,
        key: &'static str,
        value: &'static str,
    ) -> ModuleFn<impl Fn(&Sandbox, &mut EvalContext) -> Result<ModuleResult, JErrorType>> {
        ModuleFn::new(name, move |_sandbox: &Sandbox, _ctx: &mut EvalContext| {
            Ok(ModuleResult::new().with_override(key, JsValue::from_str(value)))
        })
    }

    #[test]
    fn test_override_resolves_without_declaration() {
        let realm = realm();
        let module = ModuleFn::new("stub", |_sandbox: &Sandbox, ctx: &mut EvalContext| {
            let stub = create_native_function(&ctx.intrinsics, "fetchOverride", 0, |_ctx, _this, _args| {
                Ok(JsValue::from_str("stubbed"))
            });
            Ok(ModuleResult::new().with_override("fetchOverride", JsValue::Object(stub)))
        });
        let sandbox = Sandbox::new(&realm, SandboxOptions::new().with_module(module));
        assert_eq!(sandbox.execute("fetchOverride()").unwrap(), s("stubbed"));
        assert!(!realm.has_own("fetchOverride"));
    }

    #[test]
    fn test_later_module_wins_and_warns_once() {
        let realm = realm();
        let options = SandboxOptions::new()
            .with_dev_warnings(true)
            .with_module(stub_module("first", "timerId", "first"))
            .with_module(stub_module("second", "timerId", "second"));
        let (sandbox, warnings) = capture_warnings(|| Sandbox::new(&realm, options));

        assert_eq!(sandbox.execute("timerId").unwrap(), s("second"));
        let overwritten: Vec<String> = warnings
            .lines()
            .into_iter()
            .filter(|l| l.contains("\"timerId\" global variables are overwritten."))
            .collect();
        assert_eq!(overwritten.len(), 1);
    }

    #[test]
    fn test_no_warning_without_dev_warnings() {
        let realm = realm();
        let options = SandboxOptions::new()
            .with_dev_warnings(false)
            .with_module(stub_module("first", "timerId", "first"))
            .with_module(stub_module("second", "timerId", "second"));
        let (_sandbox, warnings) = capture_warnings(|| Sandbox::new(&realm, options));
        assert!(!warnings.contains("overwritten"));
    }

    #[test]
    fn test_override_beats_host_value() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let host_fetch = realm.get("fetch").unwrap();
        let guest_fetch = sandbox.execute("fetch").unwrap();
        assert!(guest_fetch.is_callable());
        assert!(guest_fetch != host_fetch);
    }

    #[test]
    fn test_guest_can_replace_an_override() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox.execute("window.setTimeout = 5;").unwrap();
        assert_eq!(sandbox.execute("setTimeout").unwrap(), num(5));
        assert!(realm.get("setTimeout").unwrap().is_callable());
    }

    #[test]
    fn test_failing_module_is_skipped() {
        let realm = realm();
        let failing = ModuleFn::new("broken", |_sandbox: &Sandbox, _ctx: &mut EvalContext| -> Result<ModuleResult, JErrorType> {
            Err(JErrorType::TypeError("nope".to_string()))
        });
        let options = SandboxOptions::new()
            .with_module(failing)
            .with_module(stub_module("ok", "answer", "42"));
        let (sandbox, warnings) = capture_warnings(|| Sandbox::new(&realm, options));
        assert!(!sandbox.is_closed());
        assert_eq!(sandbox.execute("answer").unwrap(), s("42"));
        assert!(warnings.contains("capability module 'broken' failed"));
    }

    fn throwing_module(name: &'static str) -> ModuleFn<impl Fn(&Sandbox, &mut EvalContext) -> Result<ModuleResult, JErrorType>> {
        ModuleFn::new(name, move |_sandbox: &Sandbox, _ctx: &mut EvalContext| {
            Ok(ModuleResult::new()
                .on_created(move |_ctx: &mut EvalContext, _global: &JsObjectType| {
                    Err(JErrorType::TypeError(format!("{} created", name)))
                })
                .on_prepare(move |_ctx: &mut EvalContext| {
                    Err(JErrorType::TypeError(format!("{} prepare", name)))
                })
                .on_recover(move |_ctx: &mut EvalContext| {
                    Err(JErrorType::TypeError(format!("{} recover", name)))
                }))
        })
    }

    #[test]
    fn test_throwing_callbacks_do_not_stop_the_others() {
        let realm = realm();
        let stages = Rc::new(std::cell::RefCell::new(vec![]));
        let log = stages.clone();
        let healthy = ModuleFn::new("healthy", move |_sandbox: &Sandbox, _ctx: &mut EvalContext| {
            let (c, p, r) = (log.clone(), log.clone(), log.clone());
            Ok(ModuleResult::new()
                .on_created(move |_ctx: &mut EvalContext, _global: &JsObjectType| {
                    c.borrow_mut().push("created");
                    Ok(())
                })
                .on_prepare(move |_ctx: &mut EvalContext| {
                    p.borrow_mut().push("prepare");
                    Ok(())
                })
                .on_recover(move |_ctx: &mut EvalContext| {
                    r.borrow_mut().push("recover");
                    Ok(())
                }))
        });
        let options = SandboxOptions::new()
            .with_default_modules(false)
            .with_module(throwing_module("first"))
            .with_module(throwing_module("second"))
            .with_module(healthy);

        let (sandbox, warnings) = capture_warnings(|| {
            let sandbox = Sandbox::new(&realm, options);
            assert_eq!(sandbox.execute("1 + 1").unwrap(), num(2));
            sandbox.close();
            sandbox
        });

        assert!(sandbox.is_closed());
        assert_eq!(*stages.borrow(), vec!["created", "prepare", "recover"]);
        for stage in ["created", "prepare", "recover"].iter() {
            let failed = format!("{} callback failed", stage);
            let count = warnings.lines().iter().filter(|l| l.contains(&failed)).count();
            assert_eq!(count, 2, "{}", failed);
        }
        assert!(warnings.contains("recovering capability module 'second' failed"));
    }

    #[test]
    fn test_without_default_modules_host_values_show_through() {
        let realm = realm();
        let sandbox = Sandbox::new(&realm, SandboxOptions::new().with_default_modules(false));
        assert!(sandbox.override_names().is_empty());
        assert_eq!(sandbox.execute("fetch").unwrap(), realm.get("fetch").unwrap());
    }

    #[test]
    fn test_module_callbacks_run_at_each_stage() {
        let realm = realm();
        let prepared = Rc::new(Cell::new(0));
        let recovered = Rc::new(Cell::new(0));
        let (p, r) = (prepared.clone(), recovered.clone());
        let module = ModuleFn::new("counting", move |_sandbox: &Sandbox, _ctx: &mut EvalContext| {
            let (p, r) = (p.clone(), r.clone());
            Ok(ModuleResult::new()
                .on_created(|ctx: &mut EvalContext, global: &JsObjectType| {
                    set(ctx, global, "createdMark", JsValue::from_str("yes")).map(|_| ())
                })
                .on_prepare(move |_ctx: &mut EvalContext| {
                    p.set(p.get() + 1);
                    Ok(())
                })
                .on_recover(move |_ctx: &mut EvalContext| {
                    r.set(r.get() + 1);
                    Ok(())
                }))
        });
        let sandbox = Sandbox::new(&realm, SandboxOptions::new().with_module(module));
        assert_eq!(sandbox.execute("createdMark").unwrap(), s("yes"));
        sandbox.execute("1").unwrap();
        assert_eq!(prepared.get(), 2);
        assert_eq!(recovered.get(), 0);

        sandbox.reset();
        assert_eq!(recovered.get(), 1);
        assert_eq!(sandbox.execute("createdMark").unwrap(), s("yes"));
        assert!(!realm.has_own("createdMark"));
    }
}

mod lifecycle {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_close_is_idempotent() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let closed = Rc::new(Cell::new(0));
        let counter = closed.clone();
        sandbox.hooks.closed.tap(move |_| counter.set(counter.get() + 1));

        sandbox.close();
        let keys = realm.global_keys();
        sandbox.close();
        assert!(sandbox.is_closed());
        assert_eq!(closed.get(), 1);
        assert_eq!(realm.global_keys(), keys);
    }

    #[test]
    fn test_reset_leaves_no_residue_on_the_host() {
        let realm = realm();
        let before = realm.global_keys();
        let sandbox = Sandbox::new(&realm, classified_options("app"));
        sandbox
            .execute("var a = 1; window.b = 2; c = 3; function d() {} counter = 4;")
            .unwrap();
        sandbox.reset();
        assert_eq!(realm.global_keys(), before);
        sandbox.close();
        assert_eq!(realm.global_keys(), before);
    }

    #[test]
    fn test_reset_clears_insulated_names() {
        let realm = realm();
        let sandbox = Sandbox::new(&realm, classified_options("app"));
        sandbox.execute("counter = 1; other = 2;").unwrap();
        sandbox.reset();
        assert_eq!(sandbox.execute("counter").unwrap(), JsValue::Undefined);
        assert_eq!(sandbox.execute("typeof other").unwrap(), s("undefined"));
    }

    #[test]
    fn test_protected_names_survive_reset() {
        let realm = realm();
        realm.set("theme", s("light")).unwrap();
        let a = Sandbox::new(&realm, classified_options("a"));
        let b = Sandbox::new(&realm, classified_options("b"));
        for round in 0..3 {
            let value = format!("round-{}", round);
            a.execute(&format!("theme = '{}';", value)).unwrap();
            a.reset();
            assert_eq!(a.execute("theme").unwrap(), s(&value));
            assert_eq!(b.execute("theme").unwrap(), s(&value));
        }
    }

    #[test]
    fn test_hooks_fire_in_order() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let log = Rc::new(std::cell::RefCell::new(vec![]));
        let push = |name: &'static str| {
            let log = log.clone();
            move |_: &()| log.borrow_mut().push(name)
        };
        sandbox.hooks.before_clear_effect.tap(push("before_clear_effect"));
        sandbox.hooks.after_clear_effect.tap(push("after_clear_effect"));
        sandbox.hooks.closed.tap(push("closed"));
        let started = log.clone();
        sandbox
            .hooks
            .started
            .tap(move |_| started.borrow_mut().push("started"));

        sandbox.reset();
        assert_eq!(
            *log.borrow(),
            vec!["before_clear_effect", "after_clear_effect", "closed", "started"]
        );
    }

    #[test]
    fn test_started_receives_the_global() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let seen = Rc::new(Cell::new(false));
        let flag = seen.clone();
        sandbox.hooks.started.tap(move |global| {
            flag.set(global.borrow().get_class_name() == "Window");
        });
        sandbox.reset();
        assert!(seen.get());
    }

    #[test]
    fn test_execute_after_close_fails() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox.close();
        match sandbox.execute("1") {
            Err(SandboxError::Closed(id)) => assert_eq!(id, sandbox.id()),
            other => panic!("expected Closed, got {:?}", other.map(|_| ())),
        }
        assert!(sandbox.get("window").is_err());
    }

    #[test]
    fn test_external_names() {
        let realm = realm();
        let sandbox = Sandbox::new(&realm, classified_options("app"));
        sandbox
            .execute("var late = 1; window.alsoLate = 2; counter = 3;")
            .unwrap();
        assert_eq!(sandbox.external_names(), names(&["alsoLate", "late"]));
        sandbox.reset();
        assert!(sandbox.external_names().is_empty());
    }

    #[test]
    fn test_registry_tracks_live_sandboxes() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let id = sandbox.id();
        assert!(registry::live_ids().contains(&id));
        assert!(Rc::ptr_eq(&registry::get(id).unwrap(), &sandbox));
        sandbox.dispose();
        assert!(registry::get(id).is_none());
    }
}
