//! Intrinsic prototypes and the small global functions that do not warrant
//! a module of their own.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType};
use crate::runner::ds::operations::object::array_elements;
use crate::runner::ds::operations::type_conversion::{to_number, to_string};
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::eval::function::{arg, call_function, create_native_function};
use crate::runner::eval::types::{EvalContext, Intrinsics};

use super::{array, console, define_global, error, object, string, BuiltInObject};

/// Builds the prototype objects every realm starts from.
pub fn create_intrinsics() -> Intrinsics {
    let object_prototype = JsObject::new(None).into_ref();
    let derive = |parent: &JsObjectType, class_name: &str| {
        JsObject::new(Some(parent.clone()))
            .class(class_name)
            .into_ref()
    };
    let function_prototype = derive(&object_prototype, "Function");
    let array_prototype = derive(&object_prototype, "Array");
    let string_prototype = derive(&object_prototype, "String");
    let error_prototype = derive(&object_prototype, "Error");
    let type_error_prototype = derive(&error_prototype, "Error");
    let reference_error_prototype = derive(&error_prototype, "Error");
    let range_error_prototype = derive(&error_prototype, "Error");
    let syntax_error_prototype = derive(&error_prototype, "Error");
    Intrinsics {
        object_prototype,
        function_prototype,
        array_prototype,
        string_prototype,
        error_prototype,
        type_error_prototype,
        reference_error_prototype,
        range_error_prototype,
        syntax_error_prototype,
    }
}

/// Register all core built-in objects on `global`.
pub fn register_core_builtins(global: &JsObjectType, intrinsics: &Intrinsics) {
    // Object first: the others reach for Object.prototype methods.
    object::register(global, intrinsics);
    register_function_prototype(intrinsics);
    array::register(global, intrinsics);
    string::register(global, intrinsics);
    error::register(global, intrinsics);
    console::register(global, intrinsics);
    register_globals(global, intrinsics);
}

fn register_function_prototype(intrinsics: &Intrinsics) {
    BuiltInObject::on(intrinsics, &intrinsics.function_prototype)
        .add_method("call", 1, |ctx, this, args| {
            let mut args = args.into_iter();
            let this_arg = args.next().unwrap_or(JsValue::Undefined);
            call_function(ctx, &this, this_arg, args.collect())
        })
        .add_method("apply", 2, |ctx, this, args| {
            let this_arg = arg(&args, 0);
            let list = match arg(&args, 1) {
                JsValue::Undefined | JsValue::Null => vec![],
                v => array_elements(&v).ok_or_else(|| {
                    JErrorType::TypeError(
                        "CreateListFromArrayLike called on non-object".to_string(),
                    )
                })?,
            };
            call_function(ctx, &this, this_arg, list)
        })
        .add_method("toString", 0, |_ctx, this, _args| {
            Ok(JsValue::String(format!("{} {{ [native code] }}", this)))
        });
}

fn register_globals(global: &JsObjectType, intrinsics: &Intrinsics) {
    define_global(global, "undefined", JsValue::Undefined);
    define_global(global, "NaN", JsValue::Number(JsNumberType::NaN));
    define_global(
        global,
        "Infinity",
        JsValue::Number(JsNumberType::PositiveInfinity),
    );

    let string_ctor = create_native_function(intrinsics, "String", 1, |ctx, _this, args| {
        match args.first() {
            Some(v) => Ok(JsValue::String(to_string(ctx, v)?)),
            None => Ok(JsValue::from_str("")),
        }
    });
    string_ctor.borrow_mut().insert_hidden(
        "prototype",
        JsValue::Object(intrinsics.string_prototype.clone()),
    );
    define_global(global, "String", JsValue::Object(string_ctor));

    let number_ctor = create_native_function(intrinsics, "Number", 1, |ctx, _this, args| {
        match args.first() {
            Some(v) => Ok(JsValue::Number(to_number(ctx, v)?)),
            None => Ok(JsValue::from_i64(0)),
        }
    });
    define_global(global, "Number", JsValue::Object(number_ctor));

    let is_nan = create_native_function(intrinsics, "isNaN", 1, |ctx, _this, args| {
        let n = to_number(ctx, &arg(&args, 0))?;
        Ok(JsValue::Boolean(n == JsNumberType::NaN))
    });
    define_global(global, "isNaN", JsValue::Object(is_nan));

    let parse_int = create_native_function(intrinsics, "parseInt", 2, |ctx, _this, args| {
        let s = to_string(ctx, &arg(&args, 0))?;
        let digits: String = s
            .trim_start()
            .chars()
            .enumerate()
            .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
            .map(|(_, c)| c)
            .collect();
        Ok(match digits.parse::<i64>() {
            Ok(i) => JsValue::from_i64(i),
            Err(_) => JsValue::Number(JsNumberType::NaN),
        })
    });
    define_global(global, "parseInt", JsValue::Object(parse_int));

    let queue_microtask =
        create_native_function(intrinsics, "queueMicrotask", 1, |ctx, _this, args| {
            let callback = arg(&args, 0);
            if !callback.is_callable() {
                return Err(JErrorType::TypeError(
                    "Failed to execute 'queueMicrotask': parameter 1 is not of type 'Function'."
                        .to_string(),
                ));
            }
            ctx.event_loop.enqueue_microtask(Box::new(move |ctx: &mut EvalContext| {
                call_function(ctx, &callback, JsValue::Undefined, vec![]).map(|_| ())
            }));
            Ok(JsValue::Undefined)
        });
    define_global(global, "queueMicrotask", JsValue::Object(queue_microtask));
}
