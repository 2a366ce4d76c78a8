use std::rc::Rc;

use pest::error::{Error, ErrorVariant};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::{Parser, Position, Span};
use pest_derive::Parser;

use super::ast::*;

#[derive(Parser)]
#[grammar = "parser/guest_grammar.pest"] // relative to src
pub struct GuestParser;

lazy_static! {
    // Lowest binding power first.
    static ref PRATT_PARSER: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::op_coalesce, Assoc::Left))
        .op(Op::infix(Rule::op_or, Assoc::Left))
        .op(Op::infix(Rule::op_and, Assoc::Left))
        .op(Op::infix(Rule::op_equality, Assoc::Left))
        .op(Op::infix(Rule::op_relational, Assoc::Left))
        .op(Op::infix(Rule::op_additive, Assoc::Left))
        .op(Op::infix(Rule::op_multiplicative, Assoc::Left));
}

type ParseResult<T> = Result<T, Error<Rule>>;

impl GuestParser {
    /// Parses a whole guest script into its program node.
    pub fn parse_to_ast_from_str(script: &str) -> ParseResult<ProgramData> {
        let mut pairs = GuestParser::parse(Rule::script, script)?;
        let script_pair = match pairs.next() {
            Some(p) => p,
            None => {
                return Err(Error::new_from_pos(
                    ErrorVariant::CustomError {
                        message: "Empty parse tree".to_string(),
                    },
                    Position::from_start(script),
                ))
            }
        };
        let meta = get_meta(&script_pair);
        let mut body = vec![];
        for pair in script_pair.into_inner() {
            if pair.as_rule() == Rule::EOI {
                continue;
            }
            body.push(build_ast_from_statement(pair)?);
        }
        Ok(ProgramData { meta, body })
    }

    /// Renders the raw pair tree; handy when debugging the grammar.
    pub fn parse_to_token_tree(script: &str) -> ParseResult<String> {
        let pairs = GuestParser::parse(Rule::script, script)?;
        let mut tree = vec![];
        for pair in pairs {
            tree.push(pair_to_string(pair, 0).join("\n"));
        }
        Ok(tree.join("\n"))
    }
}

fn pair_to_string(pair: Pair<Rule>, level: usize) -> Vec<String> {
    let span = pair.as_span();
    let mut tree = vec![format!(
        "{}{:?} => ({},{}) #{:?}",
        "  ".repeat(level),
        pair.as_rule(),
        span.start(),
        span.end(),
        span.as_str()
    )];
    for child_pair in pair.into_inner() {
        tree.append(pair_to_string(child_pair, level + 1).as_mut());
    }
    tree
}

fn get_meta(pair: &Pair<Rule>) -> Meta {
    let span = pair.as_span();
    Meta {
        start_index: span.start(),
        end_index: span.end(),
    }
}

fn get_unexpected_error(id: i32, pair: &Pair<Rule>) -> Error<Rule> {
    let message = format!("Unexpected state reached [{:?}] - {}", pair.as_rule(), id);
    Error::new_from_span(ErrorVariant::CustomError { message }, pair.as_span())
}

fn custom_error(message: &str, span: Span) -> Error<Rule> {
    Error::new_from_span(
        ErrorVariant::CustomError {
            message: message.to_string(),
        },
        span,
    )
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_function
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_while
            | Rule::kw_for
            | Rule::kw_return
            | Rule::kw_throw
            | Rule::kw_try
            | Rule::kw_catch
            | Rule::kw_finally
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_new
    )
}

/// Inner pairs with keyword tokens dropped.
fn children(pair: Pair<Rule>) -> std::vec::IntoIter<Pair<Rule>> {
    pair.into_inner()
        .filter(|p| !is_keyword(p.as_rule()))
        .collect::<Vec<_>>()
        .into_iter()
}

fn next_inner<'i, I: Iterator<Item = Pair<'i, Rule>>>(
    inner: &mut I,
    span: Span<'i>,
) -> ParseResult<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| custom_error("Unexpected end of construct", span))
}

fn build_ast_from_statement(pair: Pair<Rule>) -> ParseResult<StatementType> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    Ok(match pair.as_rule() {
        Rule::block_statement => StatementType::BlockStatement(build_ast_from_block(pair)?),
        Rule::empty_statement => StatementType::EmptyStatement { meta },
        Rule::variable_statement => {
            let decl = next_inner(&mut children(pair), span)?;
            StatementType::VariableDeclaration(build_ast_from_variable_declaration(decl)?)
        }
        Rule::function_declaration => {
            StatementType::FunctionDeclaration(Rc::new(build_ast_from_function(pair)?))
        }
        Rule::if_statement => {
            let mut inner = children(pair);
            let test = build_ast_from_expression(next_inner(&mut inner, span)?)?;
            let consequent = build_ast_from_statement(next_inner(&mut inner, span)?)?;
            let alternate = match inner.next() {
                Some(p) => Some(Box::new(build_ast_from_statement(p)?)),
                None => None,
            };
            StatementType::IfStatement {
                meta,
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate,
            }
        }
        Rule::while_statement => {
            let mut inner = children(pair);
            let test = build_ast_from_expression(next_inner(&mut inner, span)?)?;
            let body = build_ast_from_statement(next_inner(&mut inner, span)?)?;
            StatementType::WhileStatement {
                meta,
                test: Box::new(test),
                body: Box::new(body),
            }
        }
        Rule::for_statement => build_ast_from_for_statement(pair)?,
        Rule::return_statement => {
            let argument = match children(pair).next() {
                Some(p) => Some(Box::new(build_ast_from_expression(p)?)),
                None => None,
            };
            StatementType::ReturnStatement { meta, argument }
        }
        Rule::throw_statement => {
            let argument = build_ast_from_expression(next_inner(&mut children(pair), span)?)?;
            StatementType::ThrowStatement {
                meta,
                argument: Box::new(argument),
            }
        }
        Rule::try_statement => build_ast_from_try_statement(pair)?,
        Rule::break_statement => StatementType::BreakStatement { meta },
        Rule::continue_statement => StatementType::ContinueStatement { meta },
        Rule::expression_statement => {
            let expression = build_ast_from_expression(next_inner(&mut children(pair), span)?)?;
            StatementType::ExpressionStatement {
                meta,
                expression: Box::new(expression),
            }
        }
        _ => return Err(get_unexpected_error(1, &pair)),
    })
}

fn build_ast_from_block(pair: Pair<Rule>) -> ParseResult<BlockStatementData> {
    let meta = get_meta(&pair);
    let mut body = vec![];
    for inner_pair in pair.into_inner() {
        body.push(build_ast_from_statement(inner_pair)?);
    }
    Ok(BlockStatementData { meta, body })
}

fn build_ast_from_variable_declaration(pair: Pair<Rule>) -> ParseResult<VariableDeclarationData> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let kind_pair = next_inner(&mut inner, span)?;
    let kind = match kind_pair.as_str() {
        "var" => VariableDeclarationKind::Var,
        "let" => VariableDeclarationKind::Let,
        "const" => VariableDeclarationKind::Const,
        _ => return Err(get_unexpected_error(2, &kind_pair)),
    };
    let mut declarations = vec![];
    for declarator_pair in inner {
        let d_meta = get_meta(&declarator_pair);
        let d_span = declarator_pair.as_span();
        let mut d_inner = declarator_pair.into_inner();
        let id = build_ast_from_identifier(next_inner(&mut d_inner, d_span)?);
        let init = match d_inner.next() {
            Some(p) => Some(Box::new(build_ast_from_assignment_expression(p)?)),
            None => None,
        };
        declarations.push(VariableDeclaratorData {
            meta: d_meta,
            id,
            init,
        });
    }
    Ok(VariableDeclarationData {
        meta,
        declarations,
        kind,
    })
}

fn build_ast_from_for_statement(pair: Pair<Rule>) -> ParseResult<StatementType> {
    let meta = get_meta(&pair);
    let for_span = pair.as_span();
    let mut init = None;
    let mut test = None;
    let mut update = None;
    let mut body = None;
    for inner_pair in children(pair) {
        match inner_pair.as_rule() {
            Rule::for_init => {
                let span = inner_pair.as_span();
                let p = next_inner(&mut inner_pair.into_inner(), span)?;
                init = Some(if p.as_rule() == Rule::variable_declaration {
                    ForInitType::VariableDeclaration(build_ast_from_variable_declaration(p)?)
                } else {
                    ForInitType::Expression(Box::new(build_ast_from_expression(p)?))
                });
            }
            Rule::for_test => {
                let span = inner_pair.as_span();
                let p = next_inner(&mut inner_pair.into_inner(), span)?;
                test = Some(Box::new(build_ast_from_expression(p)?));
            }
            Rule::for_update => {
                let span = inner_pair.as_span();
                let p = next_inner(&mut inner_pair.into_inner(), span)?;
                update = Some(Box::new(build_ast_from_expression(p)?));
            }
            _ => body = Some(Box::new(build_ast_from_statement(inner_pair)?)),
        }
    }
    let body = match body {
        Some(b) => b,
        None => return Err(custom_error("Missing loop body", for_span)),
    };
    Ok(StatementType::ForStatement {
        meta,
        init,
        test,
        update,
        body,
    })
}

fn build_ast_from_try_statement(pair: Pair<Rule>) -> ParseResult<StatementType> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = children(pair);
    let block = build_ast_from_block(next_inner(&mut inner, span)?)?;
    let mut handler = None;
    let mut finalizer = None;
    for clause in inner {
        match clause.as_rule() {
            Rule::catch_clause => {
                let c_meta = get_meta(&clause);
                let mut param = None;
                let mut body = None;
                for p in children(clause) {
                    match p.as_rule() {
                        Rule::identifier => param = Some(build_ast_from_identifier(p)),
                        _ => body = Some(build_ast_from_block(p)?),
                    }
                }
                match body {
                    Some(body) => {
                        handler = Some(CatchClauseData {
                            meta: c_meta,
                            param,
                            body,
                        })
                    }
                    None => return Err(custom_error("Missing catch block", span)),
                }
            }
            Rule::finally_clause => {
                let f_span = clause.as_span();
                finalizer = Some(build_ast_from_block(next_inner(
                    &mut children(clause),
                    f_span,
                )?)?);
            }
            _ => return Err(get_unexpected_error(3, &clause)),
        }
    }
    if handler.is_none() && finalizer.is_none() {
        return Err(custom_error("Missing catch or finally after try", span));
    }
    Ok(StatementType::TryStatement {
        meta,
        block,
        handler,
        finalizer,
    })
}

fn build_ast_from_identifier(pair: Pair<Rule>) -> IdentifierData {
    IdentifierData {
        name: pair.as_str().to_string(),
        meta: get_meta(&pair),
    }
}

fn build_ast_from_formal_parameters(pair: Pair<Rule>) -> Vec<IdentifierData> {
    pair.into_inner().map(build_ast_from_identifier).collect()
}

fn build_ast_from_function_body(pair: Pair<Rule>) -> ParseResult<Vec<StatementType>> {
    let mut body = vec![];
    for inner_pair in pair.into_inner() {
        body.push(build_ast_from_statement(inner_pair)?);
    }
    Ok(body)
}

fn build_ast_from_function(pair: Pair<Rule>) -> ParseResult<FunctionData> {
    let meta = get_meta(&pair);
    let mut id = None;
    let mut params = vec![];
    let mut body = vec![];
    for inner_pair in children(pair) {
        match inner_pair.as_rule() {
            Rule::identifier => id = Some(build_ast_from_identifier(inner_pair)),
            Rule::formal_parameters => params = build_ast_from_formal_parameters(inner_pair),
            Rule::function_body => body = build_ast_from_function_body(inner_pair)?,
            _ => return Err(get_unexpected_error(4, &inner_pair)),
        }
    }
    Ok(FunctionData {
        meta,
        id,
        params,
        body: FunctionBodyType::Block(body),
        is_arrow: false,
    })
}

fn build_ast_from_arrow_function(pair: Pair<Rule>) -> ParseResult<FunctionData> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let params_pair = next_inner(&mut inner, span)?;
    let params = match params_pair.into_inner().next() {
        Some(p) if p.as_rule() == Rule::identifier => vec![build_ast_from_identifier(p)],
        Some(p) => build_ast_from_formal_parameters(p),
        None => vec![],
    };
    let body_pair = next_inner(&mut inner, span)?;
    let body = if body_pair.as_rule() == Rule::function_body {
        FunctionBodyType::Block(build_ast_from_function_body(body_pair)?)
    } else {
        FunctionBodyType::Expression(Box::new(build_ast_from_assignment_expression(body_pair)?))
    };
    Ok(FunctionData {
        meta,
        id: None,
        params,
        body,
        is_arrow: true,
    })
}

fn build_ast_from_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let meta = get_meta(&pair);
    let mut expressions = vec![];
    for inner_pair in pair.into_inner() {
        expressions.push(build_ast_from_assignment_expression(inner_pair)?);
    }
    if expressions.len() == 1 {
        if let Some(e) = expressions.pop() {
            return Ok(e);
        }
    }
    Ok(ExpressionType::SequenceExpression { meta, expressions })
}

fn build_ast_from_assignment_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let first = next_inner(&mut inner, span)?;
    if first.as_rule() == Rule::arrow_function {
        return Ok(ExpressionType::FunctionExpression(Rc::new(
            build_ast_from_arrow_function(first)?,
        )));
    }
    let left_span = first.as_span();
    let left = build_ast_from_conditional_expression(first)?;
    let op_pair = match inner.next() {
        Some(p) => p,
        None => return Ok(left),
    };
    match &left {
        ExpressionType::Identifier(_) | ExpressionType::MemberExpression(_) => {}
        _ => return Err(custom_error("Invalid left-hand side in assignment", left_span)),
    }
    let operator = match op_pair.as_str() {
        "=" => AssignmentOperator::Equals,
        "+=" => AssignmentOperator::AddEquals,
        "-=" => AssignmentOperator::SubtractEquals,
        "*=" => AssignmentOperator::MultiplyEquals,
        "/=" => AssignmentOperator::DivideEquals,
        "%=" => AssignmentOperator::ModuloEquals,
        "||=" => AssignmentOperator::OrEquals,
        "&&=" => AssignmentOperator::AndEquals,
        "??=" => AssignmentOperator::NullishEquals,
        _ => return Err(get_unexpected_error(5, &op_pair)),
    };
    let right = build_ast_from_assignment_expression(next_inner(&mut inner, span)?)?;
    Ok(ExpressionType::AssignmentExpression {
        meta,
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn build_ast_from_conditional_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let test = build_ast_from_binary_expression(next_inner(&mut inner, span)?)?;
    match inner.next() {
        None => Ok(test),
        Some(consequent_pair) => {
            let consequent = build_ast_from_assignment_expression(consequent_pair)?;
            let alternate = build_ast_from_assignment_expression(next_inner(&mut inner, span)?)?;
            Ok(ExpressionType::ConditionalExpression {
                meta,
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            })
        }
    }
}

fn build_ast_from_binary_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    build_ast_from_operator_pairs(pair.into_inner())
}

fn build_ast_from_operator_pairs(pairs: Pairs<Rule>) -> ParseResult<ExpressionType> {
    PRATT_PARSER
        .map_primary(build_ast_from_unary_expression)
        .map_infix(|left, op, right| {
            let left = left?;
            let right = right?;
            let meta = Meta {
                start_index: left.get_meta().start_index,
                end_index: right.get_meta().end_index,
            };
            let left = Box::new(left);
            let right = Box::new(right);
            let logical = match op.as_rule() {
                Rule::op_coalesce => Some(LogicalOperator::NullishCoalescing),
                Rule::op_or => Some(LogicalOperator::Or),
                Rule::op_and => Some(LogicalOperator::And),
                _ => None,
            };
            if let Some(operator) = logical {
                return Ok(ExpressionType::LogicalExpression {
                    meta,
                    operator,
                    left,
                    right,
                });
            }
            let operator = match op.as_str() {
                "===" => BinaryOperator::StrictlyEqual,
                "!==" => BinaryOperator::StrictlyUnequal,
                "==" => BinaryOperator::LooselyEqual,
                "!=" => BinaryOperator::LooselyUnequal,
                "<" => BinaryOperator::LessThan,
                ">" => BinaryOperator::GreaterThan,
                "<=" => BinaryOperator::LessThanEqual,
                ">=" => BinaryOperator::GreaterThanEqual,
                "+" => BinaryOperator::Add,
                "-" => BinaryOperator::Subtract,
                "*" => BinaryOperator::Multiply,
                "/" => BinaryOperator::Divide,
                "%" => BinaryOperator::Modulo,
                "instanceof" => BinaryOperator::InstanceOf,
                "in" => BinaryOperator::In,
                _ => return Err(get_unexpected_error(6, &op)),
            };
            Ok(ExpressionType::BinaryExpression {
                meta,
                operator,
                left,
                right,
            })
        })
        .parse(pairs)
}

fn build_ast_from_unary_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let span = pair.as_span();
    let end_index = span.end();
    let mut operators = vec![];
    let mut operand = None;
    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::unary_operator => {
                let operator = match inner_pair.as_str() {
                    "!" => UnaryOperator::LogicalNot,
                    "-" => UnaryOperator::Minus,
                    "+" => UnaryOperator::Plus,
                    "typeof" => UnaryOperator::TypeOf,
                    "void" => UnaryOperator::Void,
                    "delete" => UnaryOperator::Delete,
                    _ => return Err(get_unexpected_error(7, &inner_pair)),
                };
                operators.push((operator, inner_pair.as_span().start()));
            }
            _ => operand = Some(build_ast_from_postfix_expression(inner_pair)?),
        }
    }
    let mut expression = match operand {
        Some(e) => e,
        None => return Err(custom_error("Missing operand", span)),
    };
    while let Some((operator, start_index)) = operators.pop() {
        expression = ExpressionType::UnaryExpression {
            meta: Meta {
                start_index,
                end_index,
            },
            operator,
            argument: Box::new(expression),
        };
    }
    Ok(expression)
}

fn build_ast_from_arguments(pair: Pair<Rule>) -> ParseResult<Vec<ExpressionType>> {
    let mut arguments = vec![];
    for inner_pair in pair.into_inner() {
        arguments.push(build_ast_from_assignment_expression(inner_pair)?);
    }
    Ok(arguments)
}

fn build_member(object: ExpressionType, pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let start_index = object.get_meta().start_index;
    let end_index = pair.as_span().end();
    let span = pair.as_span();
    let property = match pair.as_rule() {
        Rule::member_dot => {
            MemberPropertyType::Static(next_inner(&mut pair.into_inner(), span)?.as_str().to_string())
        }
        Rule::member_index => MemberPropertyType::Computed(Box::new(build_ast_from_expression(
            next_inner(&mut pair.into_inner(), span)?,
        )?)),
        _ => return Err(get_unexpected_error(8, &pair)),
    };
    Ok(ExpressionType::MemberExpression(MemberExpressionData {
        meta: Meta {
            start_index,
            end_index,
        },
        object: Box::new(object),
        property,
    }))
}

fn build_ast_from_postfix_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let head = next_inner(&mut inner, span)?;
    let mut expression = if head.as_rule() == Rule::new_expression {
        build_ast_from_new_expression(head)?
    } else {
        build_ast_from_primary_expression(head)?
    };
    for op in inner {
        expression = match op.as_rule() {
            Rule::call_arguments => {
                let meta = Meta {
                    start_index: expression.get_meta().start_index,
                    end_index: op.as_span().end(),
                };
                ExpressionType::CallExpression {
                    meta,
                    callee: Box::new(expression),
                    arguments: build_ast_from_arguments(op)?,
                }
            }
            _ => build_member(expression, op)?,
        };
    }
    Ok(expression)
}

fn build_ast_from_new_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = children(pair);
    let target = next_inner(&mut inner, span)?;
    let target_span = target.as_span();
    let mut target_inner = target.into_inner();
    let mut callee = build_ast_from_primary_expression(next_inner(&mut target_inner, target_span)?)?;
    for member in target_inner {
        callee = build_member(callee, member)?;
    }
    let arguments = match inner.next() {
        Some(p) => build_ast_from_arguments(p)?,
        None => vec![],
    };
    Ok(ExpressionType::NewExpression {
        meta,
        callee: Box::new(callee),
        arguments,
    })
}

fn build_ast_from_primary_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    Ok(match pair.as_rule() {
        Rule::parenthesized_expression => {
            build_ast_from_expression(next_inner(&mut pair.into_inner(), span)?)?
        }
        Rule::function_expression => {
            ExpressionType::FunctionExpression(Rc::new(build_ast_from_function(pair)?))
        }
        Rule::array_literal => {
            let mut elements = vec![];
            for inner_pair in pair.into_inner() {
                elements.push(build_ast_from_assignment_expression(inner_pair)?);
            }
            ExpressionType::ArrayExpression { meta, elements }
        }
        Rule::object_literal => {
            let mut properties = vec![];
            for prop_pair in pair.into_inner() {
                properties.push(build_ast_from_property_definition(prop_pair)?);
            }
            ExpressionType::ObjectExpression { meta, properties }
        }
        Rule::this_expression => ExpressionType::ThisExpression { meta },
        Rule::null_literal => ExpressionType::Literal {
            meta,
            value: LiteralType::NullLiteral,
        },
        Rule::boolean_literal => ExpressionType::Literal {
            meta,
            value: LiteralType::BooleanLiteral(pair.as_str() == "true"),
        },
        Rule::numeric_literal => ExpressionType::Literal {
            meta,
            value: LiteralType::NumberLiteral(parse_numeric_literal(&pair)?),
        },
        Rule::string_literal => ExpressionType::Literal {
            meta,
            value: LiteralType::StringLiteral(build_string_value(pair)?),
        },
        Rule::identifier => ExpressionType::Identifier(build_ast_from_identifier(pair)),
        _ => return Err(get_unexpected_error(9, &pair)),
    })
}

fn build_ast_from_property_definition(pair: Pair<Rule>) -> ParseResult<PropertyData> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let first = next_inner(&mut inner, span)?;
    if first.as_rule() == Rule::identifier {
        let id = build_ast_from_identifier(first);
        return Ok(PropertyData {
            meta,
            key: id.name.clone(),
            value: Box::new(ExpressionType::Identifier(id)),
        });
    }
    let key_span = first.as_span();
    let key_pair = next_inner(&mut first.into_inner(), key_span)?;
    let key = match key_pair.as_rule() {
        Rule::string_literal => build_string_value(key_pair)?,
        Rule::numeric_literal => match parse_numeric_literal(&key_pair)? {
            NumberLiteralType::IntegerLiteral(i) => i.to_string(),
            NumberLiteralType::FloatLiteral(f) => f.to_string(),
        },
        _ => key_pair.as_str().to_string(),
    };
    let value = build_ast_from_assignment_expression(next_inner(&mut inner, span)?)?;
    Ok(PropertyData {
        meta,
        key,
        value: Box::new(value),
    })
}

fn parse_numeric_literal(pair: &Pair<Rule>) -> ParseResult<NumberLiteralType> {
    let text = pair.as_str();
    let invalid = || custom_error("Invalid numeric literal", pair.as_span());
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16)
            .map(NumberLiteralType::IntegerLiteral)
            .map_err(|_| invalid());
    }
    if !text.contains(|c: char| c == '.' || c == 'e' || c == 'E') {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(NumberLiteralType::IntegerLiteral(i));
        }
    }
    text.parse::<f64>()
        .map(NumberLiteralType::FloatLiteral)
        .map_err(|_| invalid())
}

fn build_string_value(pair: Pair<Rule>) -> ParseResult<String> {
    let span = pair.as_span();
    let chars = next_inner(&mut pair.into_inner(), span)?;
    Ok(unescape(chars.as_str()))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('x') => push_code_unit(&mut out, &mut chars, 2, 'x'),
            Some('u') => push_code_unit(&mut out, &mut chars, 4, 'u'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn push_code_unit<I: Iterator<Item = char>>(
    out: &mut String,
    chars: &mut std::iter::Peekable<I>,
    width: usize,
    marker: char,
) {
    let mut digits = String::with_capacity(width);
    while digits.len() < width {
        match chars.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                digits.push(*c);
                chars.next();
            }
            _ => break,
        }
    }
    match u32::from_str_radix(&digits, 16).ok().and_then(std::char::from_u32) {
        Some(c) if digits.len() == width => out.push(c),
        _ => {
            out.push(marker);
            out.push_str(&digits);
        }
    }
}
