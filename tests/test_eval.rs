//! Tests for the interpreter the sandboxes run on.
//!
//! These run whole scripts against a plain realm, without any sandbox.

extern crate guestvm;

mod common;

use std::thread;

use guestvm::runner::ds::error::JErrorType;
use guestvm::runner::ds::value::JsValue;
use pretty_assertions::assert_eq;

use common::{num, realm, s};

fn eval(code: &str) -> JsValue {
    realm().eval(code).unwrap()
}

#[test]
fn test_arithmetic_and_strings() {
    assert_eq!(eval("1 + 2 * 3"), num(7));
    assert_eq!(eval("'a' + 1"), s("a1"));
    assert_eq!(eval("10 % 4"), num(2));
    assert_eq!(eval("typeof 'x'"), s("string"));
}

#[test]
fn test_closures_capture_bindings() {
    let code = "
        function counter() {
            var n = 0;
            return function () { n = n + 1; return n; };
        }
        var next = counter();
        next();
        next()";
    assert_eq!(eval(code), num(2));
}

#[test]
fn test_try_catch_sees_thrown_values() {
    assert_eq!(eval("var r; try { throw 'oops'; } catch (e) { r = e; } r"), s("oops"));
    assert_eq!(
        eval("var r; try { null.x; } catch (e) { r = e instanceof TypeError; } r"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_loops() {
    let code = "
        var total = 0;
        for (var i = 0; i < 5; i = i + 1) { total = total + i; }
        var j = 0;
        while (j < 3) { j = j + 1; }
        total + j";
    assert_eq!(eval(code), num(13));
}

#[test]
fn test_objects_and_arrays() {
    assert_eq!(eval("var o = { a: 1 }; o.b = 2; Object.keys(o).join(',')"), s("a,b"));
    assert_eq!(eval("[1, 2, 3].map(function (x) { return x * 2; }).join('-')"), s("2-4-6"));
}

#[test]
fn test_unbounded_recursion_is_a_range_error() {
    let handle = thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .spawn(|| {
            let realm = realm();
            match realm.eval("function f() { return f(); } f()") {
                Err(JErrorType::RangeError(m)) => m,
                other => panic!("expected a RangeError, got {:?}", other),
            }
        })
        .unwrap();
    assert_eq!(handle.join().unwrap(), "Maximum call stack size exceeded");
}

fn range_error(code: &str) -> String {
    match realm().eval(code) {
        Err(JErrorType::RangeError(m)) => m,
        other => panic!("expected a RangeError from {:?}, got {:?}", code, other),
    }
}

#[test]
fn test_huge_keys_are_plain_array_properties() {
    let code = "
        var a = [];
        a['18446744073709551615'] = 1;
        a['4294967295'] = 2;
        a['+3'] = 3;
        [a.length, a['18446744073709551615'], a['4294967295'], a['+3']].join(',')";
    assert_eq!(eval(code), s("0,1,2,3"));
}

#[test]
fn test_array_length_out_of_range() {
    assert_eq!(range_error("var a = []; a.length = 1e18;"), "Invalid array length");
    assert_eq!(range_error("var a = []; a.length = -1;"), "Invalid array length");
    assert_eq!(eval("var a = [1, 2, 3]; a.length = 1; a.join(',')"), s("1"));
}

#[test]
fn test_sparse_growth_is_refused() {
    assert!(range_error("var a = []; a[1e9] = 1;").starts_with("Array length exceeds"));
    assert!(range_error("var a = []; a.length = 1e9;").starts_with("Array length exceeds"));
    assert_eq!(eval("var a = []; try { a[1e9] = 1; } catch (e) {} a.length"), num(0));
}
