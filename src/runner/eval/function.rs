//! Function objects: creation, calls and construction.

use std::rc::Rc;

use crate::parser::ast::{FunctionBodyType, FunctionData};
use crate::runner::ds::env_record::{resolve_this, script_this, Scope, ScopeRef};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function::{FunctionKind, NativeFn};
use crate::runner::ds::object::{JsObject, JsObjectType, ObjectKind};
use crate::runner::ds::operations::object::{create_array, get};
use crate::runner::ds::value::JsValue;

use super::expression::evaluate_expression;
use super::statement::{execute_function_body, instantiate_declarations};
use super::types::{Completion, EvalContext, Intrinsics, ValueResult, MAX_CALL_DEPTH};

enum Callee {
    Native(NativeFn),
    Script {
        data: Rc<FunctionData>,
        scope: ScopeRef,
        lexical_this: Option<JsValue>,
    },
}

fn callee_of(f: &JsValue) -> Result<Callee, JErrorType> {
    if let JsValue::Object(o) = f {
        if let ObjectKind::Function(kind) = &o.borrow().kind {
            return Ok(match kind {
                FunctionKind::Native { func, .. } => Callee::Native(func.clone()),
                FunctionKind::Script {
                    data,
                    scope,
                    lexical_this,
                } => Callee::Script {
                    data: data.clone(),
                    scope: scope.clone(),
                    lexical_this: lexical_this.clone(),
                },
            });
        }
    }
    Err(JErrorType::TypeError(format!("{} is not a function", f)))
}

/// Calls `f` with `this` and `args`.
pub fn call_function(
    ctx: &mut EvalContext,
    f: &JsValue,
    this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let callee = callee_of(f)?;
    if ctx.call_depth >= MAX_CALL_DEPTH {
        return Err(JErrorType::RangeError(
            "Maximum call stack size exceeded".to_string(),
        ));
    }
    ctx.call_depth += 1;
    let result = match callee {
        Callee::Native(func) => func(ctx, this, args),
        Callee::Script {
            data,
            scope,
            lexical_this,
        } => call_script_function(ctx, &data, &scope, lexical_this, this, args),
    };
    ctx.call_depth -= 1;
    result
}

fn call_script_function(
    ctx: &mut EvalContext,
    data: &Rc<FunctionData>,
    closure: &ScopeRef,
    lexical_this: Option<JsValue>,
    this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let func_scope = Scope::new_declarative(Some(closure.clone()), true);
    {
        let mut s = func_scope.borrow_mut();
        s.this_value = Some(match lexical_this {
            Some(t) => t,
            None if this.is_nullish() => script_this(closure),
            None => this,
        });
        if !data.is_arrow {
            s.create_binding(
                "arguments",
                true,
                Some(JsValue::Object(create_array(ctx, args.clone()))),
            );
        }
        for (i, param) in data.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(JsValue::Undefined);
            s.create_binding(&param.name, true, Some(value));
        }
    }
    match &data.body {
        FunctionBodyType::Expression(e) => evaluate_expression(ctx, e, &func_scope),
        FunctionBodyType::Block(statements) => {
            instantiate_declarations(ctx, statements, &func_scope, true)?;
            match execute_function_body(ctx, statements, &func_scope)? {
                Completion::Return(v) => Ok(v),
                _ => Ok(JsValue::Undefined),
            }
        }
    }
}

/// `new f(...args)`.
pub fn construct(ctx: &mut EvalContext, f: &JsValue, args: Vec<JsValue>) -> ValueResult {
    let is_constructor = match f {
        JsValue::Object(o) => match &o.borrow().kind {
            ObjectKind::Function(kind) => kind.is_constructor(),
            _ => false,
        },
        _ => false,
    };
    let f_obj = match f {
        JsValue::Object(o) if is_constructor => o.clone(),
        _ => {
            return Err(JErrorType::TypeError(format!(
                "{} is not a constructor",
                f
            )))
        }
    };
    let proto = match get(ctx, &f_obj, "prototype")? {
        JsValue::Object(p) => p,
        _ => ctx.intrinsics.object_prototype.clone(),
    };
    let instance = JsValue::Object(JsObject::new(Some(proto)).into_ref());
    match call_function(ctx, f, instance.clone(), args)? {
        result @ JsValue::Object(_) => Ok(result),
        _ => Ok(instance),
    }
}

/// Instantiates a function expression or declaration as a closure over `scope`.
pub fn create_function_object(
    ctx: &mut EvalContext,
    data: &Rc<FunctionData>,
    scope: &ScopeRef,
) -> JsValue {
    let lexical_this = if data.is_arrow {
        Some(resolve_this(scope))
    } else {
        None
    };
    let mut f = JsObject::with_kind(
        ObjectKind::Function(FunctionKind::Script {
            data: data.clone(),
            scope: scope.clone(),
            lexical_this,
        }),
        Some(ctx.intrinsics.function_prototype.clone()),
    );
    f.insert_hidden("name", JsValue::from_str(data.name()));
    f.insert_hidden("length", JsValue::from_i64(data.params.len() as i64));
    let f = f.into_ref();
    if !data.is_arrow {
        let mut proto = JsObject::new(Some(ctx.intrinsics.object_prototype.clone()));
        proto.insert_hidden("constructor", JsValue::Object(f.clone()));
        f.borrow_mut()
            .insert_hidden("prototype", JsValue::Object(proto.into_ref()));
    }
    JsValue::Object(f)
}

/// Wraps a Rust closure as a callable object.
pub fn create_native_function<F>(
    intrinsics: &Intrinsics,
    name: &str,
    length: i64,
    func: F,
) -> JsObjectType
where
    F: Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> ValueResult + 'static,
{
    build_native(intrinsics, name, length, Rc::new(func), false)
}

/// Like [`create_native_function`], but usable with `new` and given a fresh
/// `prototype` object.
pub fn create_native_constructor<F>(
    intrinsics: &Intrinsics,
    name: &str,
    length: i64,
    func: F,
) -> JsObjectType
where
    F: Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> ValueResult + 'static,
{
    let ctor = build_native(intrinsics, name, length, Rc::new(func), true);
    let mut proto = JsObject::new(Some(intrinsics.object_prototype.clone()));
    proto.insert_hidden("constructor", JsValue::Object(ctor.clone()));
    ctor.borrow_mut()
        .insert_hidden("prototype", JsValue::Object(proto.into_ref()));
    ctor
}

fn build_native(
    intrinsics: &Intrinsics,
    name: &str,
    length: i64,
    func: NativeFn,
    is_constructor: bool,
) -> JsObjectType {
    let mut f = JsObject::with_kind(
        ObjectKind::Function(FunctionKind::Native {
            name: name.to_string(),
            func,
            is_constructor,
        }),
        Some(intrinsics.function_prototype.clone()),
    );
    f.insert_hidden("name", JsValue::from_str(name));
    f.insert_hidden("length", JsValue::from_i64(length));
    f.into_ref()
}

/// First argument, or `undefined`.
pub fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or(JsValue::Undefined)
}

/// Materializes an engine error as the value a `catch` clause sees.
pub fn error_to_value(ctx: &mut EvalContext, err: &JErrorType) -> JsValue {
    if let Some(v) = err.thrown_value() {
        return v.clone();
    }
    let mut error = JsObject::new(Some(ctx.intrinsics.error_prototype_for(err))).class("Error");
    error.insert_hidden("message", JsValue::String(err.message()));
    JsValue::Object(error.into_ref())
}
