use super::api::GuestParser;
use super::api::Rule;
use super::ast::*;

use pest::{consumes_to, parses_to};
use pest::Parser;

fn parse_single_expression(code: &str) -> ExpressionType {
    let mut program = GuestParser::parse_to_ast_from_str(code).unwrap();
    assert_eq!(program.body.len(), 1, "expected one statement in {:?}", code);
    match program.body.remove(0) {
        StatementType::ExpressionStatement { expression, .. } => *expression,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_integer_literal() {
    parses_to! {
        parser: GuestParser,
        input: "10",
        rule: Rule::numeric_literal,
        tokens: [numeric_literal(0, 2)]
    };
}

#[test]
fn test_float_literal_with_exponent() {
    parses_to! {
        parser: GuestParser,
        input: "1.123e10",
        rule: Rule::numeric_literal,
        tokens: [numeric_literal(0, 8)]
    };
}

#[test]
fn test_double_quoted_string() {
    parses_to! {
        parser: GuestParser,
        input: "\"abc\"",
        rule: Rule::string_literal,
        tokens: [string_literal(0, 5, [double_string_chars(1, 4)])]
    };
}

#[test]
fn test_identifier_may_start_with_keyword() {
    assert!(GuestParser::parse(Rule::identifier, "variable").is_ok());
    assert!(GuestParser::parse(Rule::identifier, "index").is_ok());
    assert!(GuestParser::parse(Rule::identifier, "var").is_err());
    assert!(GuestParser::parse(Rule::identifier, "in").is_err());
}

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    match parse_single_expression("1 + 2 * 3") {
        ExpressionType::BinaryExpression {
            operator: BinaryOperator::Add,
            right,
            ..
        } => match *right {
            ExpressionType::BinaryExpression {
                operator: BinaryOperator::Multiply,
                ..
            } => {}
            other => panic!("unexpected right operand {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_assignment_is_right_associative() {
    match parse_single_expression("a = b = 1") {
        ExpressionType::AssignmentExpression { left, right, .. } => {
            assert!(matches!(*left, ExpressionType::Identifier(ref id) if id.name == "a"));
            assert!(matches!(*right, ExpressionType::AssignmentExpression { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_invalid_assignment_target_is_rejected() {
    let err = GuestParser::parse_to_ast_from_str("1 = 2;").unwrap_err();
    assert!(err.to_string().contains("Invalid left-hand side"));
}

#[test]
fn test_arrow_function_with_expression_body() {
    match parse_single_expression("x => x + 1") {
        ExpressionType::FunctionExpression(f) => {
            assert!(f.is_arrow);
            assert_eq!(f.params.len(), 1);
            assert!(matches!(f.body, FunctionBodyType::Expression(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parenthesized_expression_is_not_arrow() {
    assert!(matches!(
        parse_single_expression("(a)"),
        ExpressionType::Identifier(_)
    ));
}

#[test]
fn test_new_with_member_target_then_member_access() {
    match parse_single_expression("new Foo.Bar(1).baz") {
        ExpressionType::MemberExpression(m) => {
            assert!(matches!(m.property, MemberPropertyType::Static(ref p) if p == "baz"));
            match *m.object {
                ExpressionType::NewExpression {
                    callee, arguments, ..
                } => {
                    assert_eq!(arguments.len(), 1);
                    assert!(matches!(*callee, ExpressionType::MemberExpression(_)));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_logical_operators_produce_logical_nodes() {
    match parse_single_expression("a ?? b || c") {
        ExpressionType::LogicalExpression {
            operator: LogicalOperator::NullishCoalescing,
            right,
            ..
        } => assert!(matches!(
            *right,
            ExpressionType::LogicalExpression {
                operator: LogicalOperator::Or,
                ..
            }
        )),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_unary_operators_nest_from_the_right() {
    match parse_single_expression("!typeof x") {
        ExpressionType::UnaryExpression {
            operator: UnaryOperator::LogicalNot,
            argument,
            ..
        } => assert!(matches!(
            *argument,
            ExpressionType::UnaryExpression {
                operator: UnaryOperator::TypeOf,
                ..
            }
        )),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_statements_and_comments() {
    let code = r#"
        // leading comment
        var a = 1, b;
        let c = { x: 1, 'y': 2, a };
        function f(p, q) { return p + q; }
        if (a) { b = 2; } else b = 3;
        for (let i = 0; i < 3; i = i + 1) { continue; }
        while (false) break;
        try { throw new Error('x'); } catch (e) { } finally { }
        /* block comment */
    "#;
    let program = GuestParser::parse_to_ast_from_str(code).unwrap();
    assert_eq!(program.body.len(), 7);
    assert!(matches!(
        program.body[0],
        StatementType::VariableDeclaration(VariableDeclarationData {
            kind: VariableDeclarationKind::Var,
            ..
        })
    ));
    assert!(matches!(program.body[2], StatementType::FunctionDeclaration(_)));
    assert!(matches!(program.body[6], StatementType::TryStatement { .. }));
}

#[test]
fn test_string_escapes_are_decoded() {
    match parse_single_expression(r#"'a\'b\nA'"#) {
        ExpressionType::Literal {
            value: LiteralType::StringLiteral(s),
            ..
        } => assert_eq!(s, "a'b\nA"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_try_without_handler_fails() {
    assert!(GuestParser::parse_to_ast_from_str("try { }").is_err());
}

#[test]
fn test_token_tree_lists_rules_with_spans() {
    let tree = GuestParser::parse_to_token_tree("x = 1;").unwrap();
    assert!(tree.starts_with("script => (0,6)"), "{}", tree);
    assert!(tree.contains("numeric_literal => (4,5) #\"1\""), "{}", tree);
}
