//! Expression evaluation.

use crate::parser::ast::{
    AssignmentOperator, BinaryOperator, ExpressionType, LiteralType, LogicalOperator,
    MemberExpressionData, MemberPropertyType, NumberLiteralType, UnaryOperator,
};
use crate::runner::ds::env_record::{get_identifier_value, resolve_binding, resolve_this, ScopeRef};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::PropertyDescriptor;
use crate::runner::ds::operations::object::{
    create_array, create_object, define_property, delete_property, get, get_v, has_property,
    is_prototype_in_chain,
};
use crate::runner::ds::operations::test_and_comparison::{
    abstract_equality_comparison, strict_equality_comparison,
};
use crate::runner::ds::operations::type_conversion::{
    get_type, to_boolean, to_number, to_primitive, to_property_key, to_string, PreferredType,
    TYPE_STR_UNDEFINED,
};
use crate::runner::ds::value::{JsNumberType, JsValue};

use super::function::{call_function, construct, create_function_object};
use super::types::{EvalContext, Reference, ValueResult};

pub fn evaluate_expression(
    ctx: &mut EvalContext,
    expr: &ExpressionType,
    scope: &ScopeRef,
) -> ValueResult {
    match expr {
        ExpressionType::Literal { value, .. } => Ok(evaluate_literal(value)),
        ExpressionType::Identifier(id) => get_identifier_value(ctx, scope, &id.name),
        ExpressionType::ThisExpression { .. } => Ok(resolve_this(scope)),
        ExpressionType::ArrayExpression { elements, .. } => {
            let values = evaluate_list(ctx, elements, scope)?;
            Ok(JsValue::Object(create_array(ctx, values)))
        }
        ExpressionType::ObjectExpression { properties, .. } => {
            let o = create_object(ctx);
            for p in properties {
                let value = evaluate_expression(ctx, &p.value, scope)?;
                define_property(ctx, &o, &p.key, PropertyDescriptor::from_value(value))?;
            }
            Ok(JsValue::Object(o))
        }
        ExpressionType::FunctionExpression(data) => Ok(create_function_object(ctx, data, scope)),
        ExpressionType::UnaryExpression {
            operator, argument, ..
        } => evaluate_unary_expression(ctx, *operator, argument, scope),
        ExpressionType::BinaryExpression {
            operator,
            left,
            right,
            ..
        } => {
            let l = evaluate_expression(ctx, left, scope)?;
            let r = evaluate_expression(ctx, right, scope)?;
            apply_binary_operator(ctx, *operator, &l, &r)
        }
        ExpressionType::LogicalExpression {
            operator,
            left,
            right,
            ..
        } => {
            let l = evaluate_expression(ctx, left, scope)?;
            if short_circuits(*operator, &l) {
                Ok(l)
            } else {
                evaluate_expression(ctx, right, scope)
            }
        }
        ExpressionType::AssignmentExpression {
            operator,
            left,
            right,
            ..
        } => evaluate_assignment_expression(ctx, *operator, left, right, scope),
        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } => {
            let t = evaluate_expression(ctx, test, scope)?;
            if to_boolean(&t) {
                evaluate_expression(ctx, consequent, scope)
            } else {
                evaluate_expression(ctx, alternate, scope)
            }
        }
        ExpressionType::CallExpression {
            callee, arguments, ..
        } => evaluate_call_expression(ctx, callee, arguments, scope),
        ExpressionType::NewExpression {
            callee, arguments, ..
        } => {
            let f = evaluate_expression(ctx, callee, scope)?;
            let args = evaluate_list(ctx, arguments, scope)?;
            construct(ctx, &f, args)
        }
        ExpressionType::MemberExpression(member) => {
            let (base, key) = evaluate_member(ctx, member, scope)?;
            get_v(ctx, &base, &key)
        }
        ExpressionType::SequenceExpression { expressions, .. } => {
            let mut last = JsValue::Undefined;
            for e in expressions {
                last = evaluate_expression(ctx, e, scope)?;
            }
            Ok(last)
        }
    }
}

fn evaluate_literal(value: &LiteralType) -> JsValue {
    match value {
        LiteralType::NullLiteral => JsValue::Null,
        LiteralType::BooleanLiteral(b) => JsValue::Boolean(*b),
        LiteralType::StringLiteral(s) => JsValue::String(s.clone()),
        LiteralType::NumberLiteral(NumberLiteralType::IntegerLiteral(i)) => JsValue::from_i64(*i),
        LiteralType::NumberLiteral(NumberLiteralType::FloatLiteral(f)) => JsValue::from_f64(*f),
    }
}

fn evaluate_list(
    ctx: &mut EvalContext,
    list: &[ExpressionType],
    scope: &ScopeRef,
) -> Result<Vec<JsValue>, JErrorType> {
    let mut values = Vec::with_capacity(list.len());
    for e in list {
        values.push(evaluate_expression(ctx, e, scope)?);
    }
    Ok(values)
}

fn evaluate_member(
    ctx: &mut EvalContext,
    member: &MemberExpressionData,
    scope: &ScopeRef,
) -> Result<(JsValue, String), JErrorType> {
    let base = evaluate_expression(ctx, &member.object, scope)?;
    let key = match &member.property {
        MemberPropertyType::Static(name) => name.clone(),
        MemberPropertyType::Computed(e) => {
            let k = evaluate_expression(ctx, e, scope)?;
            to_property_key(ctx, &k)?
        }
    };
    Ok((base, key))
}

/// Resolves an assignment target without reading it.
pub fn evaluate_reference(
    ctx: &mut EvalContext,
    expr: &ExpressionType,
    scope: &ScopeRef,
) -> Result<Reference, JErrorType> {
    match expr {
        ExpressionType::Identifier(id) => resolve_binding(ctx, scope, &id.name),
        ExpressionType::MemberExpression(member) => {
            let (base, name) = evaluate_member(ctx, member, scope)?;
            Ok(Reference::Property {
                base,
                name,
                with_base: true,
            })
        }
        _ => Err(JErrorType::SyntaxError(
            "Invalid left-hand side in assignment".to_string(),
        )),
    }
}

fn evaluate_unary_expression(
    ctx: &mut EvalContext,
    operator: UnaryOperator,
    argument: &ExpressionType,
    scope: &ScopeRef,
) -> ValueResult {
    match operator {
        UnaryOperator::TypeOf => {
            if let ExpressionType::Identifier(id) = argument {
                // typeof never throws on an undeclared name.
                let reference = resolve_binding(ctx, scope, &id.name)?;
                if let Reference::Unresolvable(_) = reference {
                    return Ok(JsValue::from_str(TYPE_STR_UNDEFINED));
                }
                let v = reference.get_value(ctx)?;
                return Ok(JsValue::from_str(get_type(&v)));
            }
            let v = evaluate_expression(ctx, argument, scope)?;
            Ok(JsValue::from_str(get_type(&v)))
        }
        UnaryOperator::Delete => {
            let reference = match argument {
                ExpressionType::Identifier(_) | ExpressionType::MemberExpression(_) => {
                    evaluate_reference(ctx, argument, scope)?
                }
                _ => {
                    evaluate_expression(ctx, argument, scope)?;
                    return Ok(JsValue::Boolean(true));
                }
            };
            match reference {
                Reference::Property {
                    base: JsValue::Object(o),
                    name,
                    ..
                } => Ok(JsValue::Boolean(delete_property(ctx, &o, &name)?)),
                Reference::Property { base, name, .. } if base.is_nullish() => {
                    Err(JErrorType::TypeError(format!(
                        "Cannot convert undefined or null to object (deleting '{}')",
                        name
                    )))
                }
                Reference::Binding { .. } => Ok(JsValue::Boolean(false)),
                _ => Ok(JsValue::Boolean(true)),
            }
        }
        _ => {
            let v = evaluate_expression(ctx, argument, scope)?;
            Ok(match operator {
                UnaryOperator::LogicalNot => JsValue::Boolean(!to_boolean(&v)),
                UnaryOperator::Void => JsValue::Undefined,
                UnaryOperator::Plus => JsValue::Number(to_number(ctx, &v)?),
                UnaryOperator::Minus => match to_number(ctx, &v)? {
                    JsNumberType::Integer(0) => JsValue::from_f64(-0.0),
                    JsNumberType::Integer(i) => JsValue::from_i64(-i),
                    n => JsValue::from_f64(-n.to_f64()),
                },
                UnaryOperator::TypeOf | UnaryOperator::Delete => JsValue::Undefined,
            })
        }
    }
}

fn short_circuits(operator: LogicalOperator, left: &JsValue) -> bool {
    match operator {
        LogicalOperator::Or => to_boolean(left),
        LogicalOperator::And => !to_boolean(left),
        LogicalOperator::NullishCoalescing => !left.is_nullish(),
    }
}

fn evaluate_assignment_expression(
    ctx: &mut EvalContext,
    operator: AssignmentOperator,
    left: &ExpressionType,
    right: &ExpressionType,
    scope: &ScopeRef,
) -> ValueResult {
    let reference = evaluate_reference(ctx, left, scope)?;
    let value = match operator {
        AssignmentOperator::Equals => evaluate_expression(ctx, right, scope)?,
        AssignmentOperator::OrEquals
        | AssignmentOperator::AndEquals
        | AssignmentOperator::NullishEquals => {
            let logical = match operator {
                AssignmentOperator::OrEquals => LogicalOperator::Or,
                AssignmentOperator::AndEquals => LogicalOperator::And,
                _ => LogicalOperator::NullishCoalescing,
            };
            let current = reference.get_value(ctx)?;
            if short_circuits(logical, &current) {
                return Ok(current);
            }
            evaluate_expression(ctx, right, scope)?
        }
        _ => {
            let binary = match operator {
                AssignmentOperator::AddEquals => BinaryOperator::Add,
                AssignmentOperator::SubtractEquals => BinaryOperator::Subtract,
                AssignmentOperator::MultiplyEquals => BinaryOperator::Multiply,
                AssignmentOperator::DivideEquals => BinaryOperator::Divide,
                _ => BinaryOperator::Modulo,
            };
            let current = reference.get_value(ctx)?;
            let r = evaluate_expression(ctx, right, scope)?;
            apply_binary_operator(ctx, binary, &current, &r)?
        }
    };
    reference.put_value(ctx, scope, value.clone())?;
    Ok(value)
}

fn evaluate_call_expression(
    ctx: &mut EvalContext,
    callee: &ExpressionType,
    arguments: &[ExpressionType],
    scope: &ScopeRef,
) -> ValueResult {
    let (f, this, description) = match callee {
        ExpressionType::MemberExpression(member) => {
            let (base, key) = evaluate_member(ctx, member, scope)?;
            let f = get_v(ctx, &base, &key)?;
            (f, base, key)
        }
        ExpressionType::Identifier(id) => {
            let reference = resolve_binding(ctx, scope, &id.name)?;
            let f = reference.get_value(ctx)?;
            (f, reference.this_value(), id.name.clone())
        }
        _ => {
            let f = evaluate_expression(ctx, callee, scope)?;
            let description = f.to_string();
            (f, JsValue::Undefined, description)
        }
    };
    let args = evaluate_list(ctx, arguments, scope)?;
    if !f.is_callable() {
        return Err(JErrorType::TypeError(format!(
            "{} is not a function",
            description
        )));
    }
    call_function(ctx, &f, this, args)
}

fn arithmetic(op: BinaryOperator, a: JsNumberType, b: JsNumberType) -> JsValue {
    if let (JsNumberType::Integer(x), JsNumberType::Integer(y)) = (a, b) {
        let exact = match op {
            BinaryOperator::Add => x.checked_add(y),
            BinaryOperator::Subtract => x.checked_sub(y),
            BinaryOperator::Multiply if x != 0 && y != 0 => x.checked_mul(y),
            _ => None,
        };
        if let Some(r) = exact {
            return JsValue::from_i64(r);
        }
    }
    let (x, y) = (a.to_f64(), b.to_f64());
    JsValue::from_f64(match op {
        BinaryOperator::Add => x + y,
        BinaryOperator::Subtract => x - y,
        BinaryOperator::Multiply => x * y,
        BinaryOperator::Divide => x / y,
        _ => x % y,
    })
}

/// `IsLessThan`: `None` when either side is NaN.
fn less_than(ctx: &mut EvalContext, a: &JsValue, b: &JsValue) -> Result<Option<bool>, JErrorType> {
    let pa = to_primitive(ctx, a, PreferredType::Number)?;
    let pb = to_primitive(ctx, b, PreferredType::Number)?;
    if let (JsValue::String(x), JsValue::String(y)) = (&pa, &pb) {
        return Ok(Some(x < y));
    }
    let x = to_number(ctx, &pa)?.to_f64();
    let y = to_number(ctx, &pb)?.to_f64();
    if x.is_nan() || y.is_nan() {
        Ok(None)
    } else {
        Ok(Some(x < y))
    }
}

pub fn apply_binary_operator(
    ctx: &mut EvalContext,
    operator: BinaryOperator,
    l: &JsValue,
    r: &JsValue,
) -> ValueResult {
    Ok(match operator {
        BinaryOperator::Add => {
            let lp = to_primitive(ctx, l, PreferredType::Default)?;
            let rp = to_primitive(ctx, r, PreferredType::Default)?;
            if matches!(lp, JsValue::String(_)) || matches!(rp, JsValue::String(_)) {
                let mut s = to_string(ctx, &lp)?;
                s.push_str(&to_string(ctx, &rp)?);
                JsValue::String(s)
            } else {
                let a = to_number(ctx, &lp)?;
                let b = to_number(ctx, &rp)?;
                arithmetic(operator, a, b)
            }
        }
        BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => {
            let a = to_number(ctx, l)?;
            let b = to_number(ctx, r)?;
            arithmetic(operator, a, b)
        }
        BinaryOperator::StrictlyEqual => JsValue::Boolean(strict_equality_comparison(l, r)),
        BinaryOperator::StrictlyUnequal => JsValue::Boolean(!strict_equality_comparison(l, r)),
        BinaryOperator::LooselyEqual => JsValue::Boolean(abstract_equality_comparison(ctx, l, r)?),
        BinaryOperator::LooselyUnequal => {
            JsValue::Boolean(!abstract_equality_comparison(ctx, l, r)?)
        }
        BinaryOperator::LessThan => JsValue::Boolean(less_than(ctx, l, r)? == Some(true)),
        BinaryOperator::GreaterThan => JsValue::Boolean(less_than(ctx, r, l)? == Some(true)),
        BinaryOperator::LessThanEqual => JsValue::Boolean(less_than(ctx, r, l)? == Some(false)),
        BinaryOperator::GreaterThanEqual => {
            JsValue::Boolean(less_than(ctx, l, r)? == Some(false))
        }
        BinaryOperator::InstanceOf => {
            let f = match r {
                JsValue::Object(o) if r.is_callable() => o.clone(),
                _ => {
                    return Err(JErrorType::TypeError(
                        "Right-hand side of 'instanceof' is not callable".to_string(),
                    ))
                }
            };
            match get(ctx, &f, "prototype")? {
                JsValue::Object(proto) => JsValue::Boolean(is_prototype_in_chain(l, &proto)),
                _ => JsValue::Boolean(false),
            }
        }
        BinaryOperator::In => {
            let o = match r {
                JsValue::Object(o) => o.clone(),
                _ => {
                    return Err(JErrorType::TypeError(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        l, r
                    )))
                }
            };
            let key = to_property_key(ctx, l)?;
            JsValue::Boolean(has_property(ctx, &o, &key)?)
        }
    })
}
