//! The built-in capability modules: what the guest sees, and what closing
//! the sandbox takes back.

extern crate guestvm;

mod common;

use guestvm::host::network::RequestStatus;
use guestvm::runner::ds::value::JsValue;
use guestvm::sandbox::{Sandbox, SandboxOptions};
use pretty_assertions::assert_eq;

use common::{num, realm, s, sandbox};

mod timers {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_timeout_fires_inside_the_sandbox() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute("var fired = false; setTimeout(function () { fired = true; }, 10);")
            .unwrap();
        realm.advance_time(20);
        assert_eq!(sandbox.get("fired").unwrap(), JsValue::Boolean(true));
        assert!(!realm.has_own("fired"));
    }

    #[test]
    fn test_close_clears_pending_timers() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute(
                "setTimeout(function () { window.late = 1; }, 50);
                 setInterval(function () { window.ticks = 1; }, 10);",
            )
            .unwrap();
        assert_eq!(realm.event_loop.pending_timers(), 2);
        sandbox.close();
        assert_eq!(realm.event_loop.pending_timers(), 0);
        realm.advance_time(100);
        assert!(!realm.has_own("late"));
        assert!(!realm.has_own("ticks"));
    }

    #[test]
    fn test_host_timers_survive_close() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        realm.eval("setTimeout(function () {}, 50);").unwrap();
        sandbox.execute("setTimeout(function () {}, 50);").unwrap();
        sandbox.close();
        assert_eq!(realm.event_loop.pending_timers(), 1);
    }

    #[test]
    fn test_cleared_timeout_is_forgotten() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let id = sandbox
            .execute("var id = setTimeout(function () {}, 50); id")
            .unwrap();
        let id: u32 = id.to_string().parse().unwrap();
        assert!(realm.event_loop.has_timer(id));
        sandbox.execute("clearTimeout(id);").unwrap();
        assert!(!realm.event_loop.has_timer(id));
        assert_eq!(realm.event_loop.pending_timers(), 0);
    }

    #[test]
    fn test_set_timeout_requires_a_callback() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        assert!(sandbox.execute("setTimeout('nope', 10)").is_err());
    }
}

mod listeners {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_close_removes_guest_listeners_only() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        realm
            .eval("addEventListener('resize', function () {});")
            .unwrap();
        sandbox
            .execute(
                "addEventListener('resize', function () {});
                 window.addEventListener('scroll', function () {});",
            )
            .unwrap();
        assert_eq!(realm.host.listeners.count_for("resize"), 2);
        assert_eq!(realm.host.listeners.count_for("scroll"), 1);

        sandbox.close();
        assert_eq!(realm.host.listeners.count_for("resize"), 1);
        assert_eq!(realm.host.listeners.count_for("scroll"), 0);
    }

    #[test]
    fn test_removed_listener_is_not_removed_twice() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute(
                "function onResize() {}
                 addEventListener('resize', onResize);
                 removeEventListener('resize', onResize);",
            )
            .unwrap();
        assert_eq!(realm.host.listeners.count(), 0);
        sandbox.close();
        assert_eq!(realm.host.listeners.count(), 0);
    }
}

mod network {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fetch_resolves_through_the_sandbox() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute("fetch('http://api.test/data').then(function (r) { status = r.status; });")
            .unwrap();
        let requests = realm.host.network.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://api.test/data");

        assert!(realm.host.network.respond(requests[0].id, 200, "{}"));
        realm.run_microtasks();
        assert_eq!(sandbox.get("status").unwrap(), num(200));
    }

    #[test]
    fn test_close_aborts_pending_requests() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute(
                "var failed = null;
                 fetch('http://api.test/slow').catch(function (e) { window.failed = e.name; });",
            )
            .unwrap();
        assert_eq!(realm.host.network.pending_count(), 1);
        sandbox.close();
        let requests = realm.host.network.requests();
        assert_eq!(requests[0].status, RequestStatus::Aborted);
        assert_eq!(realm.host.network.pending_count(), 0);
    }

    #[test]
    fn test_requests_with_their_own_signal_keep_it() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute(
                "var controller = new AbortController();
                 fetch('http://api.test/a', { method: 'POST', signal: controller.signal });
                 controller.abort();",
            )
            .unwrap();
        let requests = realm.host.network.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].status, RequestStatus::Aborted);
    }

    #[test]
    fn test_fix_base_url_resolves_relative_requests() {
        let realm = realm();
        let options = SandboxOptions::new()
            .with_base_url("http://app.test/sub/")
            .with_fix_base_url(true);
        let sandbox = Sandbox::new(&realm, options);
        sandbox.execute("fetch('api/data');").unwrap();
        assert_eq!(realm.host.network.requests()[0].url, "http://app.test/sub/api/data");
    }
}

mod document {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_appended_elements_are_removed_on_close() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute(
                "var style = document.createElement('style');
                 document.head.appendChild(style);
                 var div = document.createElement('div');
                 div.setAttribute('id', 'guest-root');
                 document.body.appendChild(div);",
            )
            .unwrap();
        let div = realm.host.dom.find_by_id("guest-root").unwrap();
        assert!(realm.host.dom.is_connected(&div));
        assert_eq!(sandbox.dynamic_style_count(), 1);
        assert_eq!(sandbox.effects().len(), 2);

        sandbox.close();
        assert!(!realm.host.dom.is_connected(&div));
        assert!(realm.host.dom.find_by_id("guest-root").is_none());
        assert_eq!(sandbox.dynamic_style_count(), 0);
        assert!(sandbox.effects().is_empty());
    }

    #[test]
    fn test_guest_elements_appended_by_the_host_are_tracked() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let element = sandbox.execute("document.createElement('p')").unwrap();
        let element = element.as_object().unwrap().clone();
        realm.host.dom.append_child(realm.host.dom.body(), &element).unwrap();
        assert_eq!(sandbox.effects().len(), 1);

        sandbox.close();
        assert!(!realm.host.dom.is_connected(&element));
    }

    #[test]
    fn test_host_elements_stay() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        realm
            .eval(
                "var hostDiv = document.createElement('div');
                 hostDiv.setAttribute('id', 'host-root');
                 document.body.appendChild(hostDiv);",
            )
            .unwrap();
        sandbox.close();
        assert!(realm.host.dom.find_by_id("host-root").is_some());
    }

    #[test]
    fn test_default_view_and_create_element() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        assert_eq!(
            sandbox.execute("document.defaultView === window").unwrap(),
            JsValue::Boolean(true)
        );
        assert!(sandbox.execute("document.createElement").unwrap().is_callable());
    }

    #[test]
    fn test_documents_are_per_sandbox() {
        let realm = realm();
        let a = sandbox(&realm, "a");
        let b = sandbox(&realm, "b");
        a.execute("document.title = 'guest a';").unwrap();
        assert_eq!(b.execute("document.title").unwrap(), JsValue::Undefined);
        assert_eq!(realm.eval("document.title").unwrap(), JsValue::Undefined);
    }
}

mod history {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_history_navigates_the_host() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute("history.pushState(null, '', '/guest/page');")
            .unwrap();
        assert!(realm.host.history.current_url().ends_with("/guest/page"));
        assert_eq!(realm.host.history.len(), 2);
    }

    #[test]
    fn test_history_constructor_is_illegal() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let err = sandbox.execute("new History()").unwrap_err();
        assert_eq!(err.script_error().unwrap().message(), "Illegal constructor");
        assert_eq!(
            sandbox.execute("history instanceof History").unwrap(),
            JsValue::Boolean(true)
        );
    }
}

mod storage {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_storage_is_namespaced() {
        let realm = realm();
        let a = sandbox(&realm, "a");
        let b = sandbox(&realm, "b");
        a.execute("localStorage.setItem('token', 'x'); sessionStorage.setItem('tab', '1');")
            .unwrap();
        assert_eq!(realm.host.local_storage.get_item("a__token"), Some("x".to_string()));
        assert_eq!(realm.host.session_storage.get_item("a__tab"), Some("1".to_string()));
        assert_eq!(b.execute("localStorage.getItem('token')").unwrap(), JsValue::Null);
        assert_eq!(a.execute("localStorage.getItem('token')").unwrap(), s("x"));
    }
}

mod observers {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_close_disconnects_guest_observers() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        sandbox
            .execute(
                "var observer = new MutationObserver(function () {});
                 observer.observe(document.body, { childList: true });",
            )
            .unwrap();
        assert_eq!(realm.host.observers.active_count(), 1);
        sandbox.close();
        assert_eq!(realm.host.observers.active_count(), 0);
    }

    #[test]
    fn test_observer_constructor_requires_a_callback() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        assert!(sandbox.execute("new MutationObserver(1)").is_err());
    }
}

mod ui_events {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mouse_event_view_is_the_host_window() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        let view = sandbox
            .execute("var e = new MouseEvent('click', { view: window }); e.view")
            .unwrap();
        assert!(view.same_object(&realm.global));
    }

    #[test]
    fn test_mouse_event_needs_new() {
        let realm = realm();
        let sandbox = sandbox(&realm, "app");
        assert!(sandbox.execute("MouseEvent('click')").is_err());
    }
}
