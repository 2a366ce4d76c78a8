//! Statement execution.
//!
//! Declarations are instantiated before a statement list runs: `var` names
//! and function declarations are hoisted to the nearest var scope, `let` and
//! `const` start out in their temporal dead zone in the enclosing block.

use crate::parser::ast::{
    BlockStatementData, CatchClauseData, ExpressionType, ForInitType, ProgramData, StatementType,
    VariableDeclarationData, VariableDeclarationKind,
};
use crate::runner::ds::env_record::{declare_function, declare_var, resolve_binding, var_scope, Scope, ScopeRef};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::to_boolean;
use crate::runner::ds::value::JsValue;

use super::expression::evaluate_expression;
use super::function::{create_function_object, error_to_value};
use super::types::{Completion, EvalContext, EvalResult, ValueResult};

/// Runs a whole program in `scope` and returns the value of the last
/// value-producing statement.
pub fn evaluate_script(
    ctx: &mut EvalContext,
    program: &ProgramData,
    scope: &ScopeRef,
) -> ValueResult {
    instantiate_declarations(ctx, &program.body, scope, true)?;
    match execute_statements(ctx, &program.body, scope)? {
        Completion::Normal(Some(v)) | Completion::Return(v) => Ok(v),
        _ => Ok(JsValue::Undefined),
    }
}

/// Hoists declarations of `statements` into `scope`.
///
/// `top_level` is set for script and function bodies; only those collect
/// `var` names (from nested blocks too) and bind function declarations in
/// the var scope instead of the block.
pub fn instantiate_declarations(
    ctx: &mut EvalContext,
    statements: &[StatementType],
    scope: &ScopeRef,
    top_level: bool,
) -> Result<(), JErrorType> {
    if top_level {
        let mut names = vec![];
        collect_var_names(statements, &mut names);
        let target = var_scope(scope);
        for name in names.iter() {
            declare_var(ctx, &target, name)?;
        }
    }
    for stmt in statements {
        match stmt {
            StatementType::VariableDeclaration(decl) if decl.kind != VariableDeclarationKind::Var => {
                declare_lexical(decl, scope);
            }
            StatementType::FunctionDeclaration(data) => {
                let f = create_function_object(ctx, data, scope);
                let target = if top_level {
                    var_scope(scope)
                } else {
                    scope.clone()
                };
                declare_function(ctx, &target, data.name(), f)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn declare_lexical(decl: &VariableDeclarationData, scope: &ScopeRef) {
    let mut s = scope.borrow_mut();
    for d in decl.declarations.iter() {
        s.create_binding(&d.id.name, decl.kind == VariableDeclarationKind::Let, None);
    }
}

fn collect_var_names(statements: &[StatementType], names: &mut Vec<String>) {
    for stmt in statements {
        collect_var_names_in(stmt, names);
    }
}

fn collect_var_names_in(stmt: &StatementType, names: &mut Vec<String>) {
    match stmt {
        StatementType::VariableDeclaration(decl) => push_var_names(decl, names),
        StatementType::BlockStatement(block) => collect_var_names(&block.body, names),
        StatementType::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            collect_var_names_in(consequent, names);
            if let Some(alt) = alternate {
                collect_var_names_in(alt, names);
            }
        }
        StatementType::WhileStatement { body, .. } => collect_var_names_in(body, names),
        StatementType::ForStatement { init, body, .. } => {
            if let Some(ForInitType::VariableDeclaration(decl)) = init {
                push_var_names(decl, names);
            }
            collect_var_names_in(body, names);
        }
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => {
            collect_var_names(&block.body, names);
            if let Some(h) = handler {
                collect_var_names(&h.body.body, names);
            }
            if let Some(f) = finalizer {
                collect_var_names(&f.body, names);
            }
        }
        _ => {}
    }
}

fn push_var_names(decl: &VariableDeclarationData, names: &mut Vec<String>) {
    if decl.kind == VariableDeclarationKind::Var {
        for d in decl.declarations.iter() {
            if !names.contains(&d.id.name) {
                names.push(d.id.name.clone());
            }
        }
    }
}

/// Runs statements in order, stopping at the first abrupt completion.
pub fn execute_statements(
    ctx: &mut EvalContext,
    statements: &[StatementType],
    scope: &ScopeRef,
) -> EvalResult {
    let mut last = None;
    for stmt in statements {
        match execute_statement(ctx, stmt, scope)? {
            Completion::Normal(Some(v)) => last = Some(v),
            Completion::Normal(None) => {}
            abrupt => return Ok(abrupt),
        }
    }
    Ok(Completion::Normal(last))
}

/// Body of a script function, after its declarations were instantiated.
pub fn execute_function_body(
    ctx: &mut EvalContext,
    statements: &[StatementType],
    scope: &ScopeRef,
) -> EvalResult {
    execute_statements(ctx, statements, scope)
}

pub fn execute_statement(ctx: &mut EvalContext, stmt: &StatementType, scope: &ScopeRef) -> EvalResult {
    match stmt {
        StatementType::EmptyStatement { .. } | StatementType::FunctionDeclaration(_) => {
            Ok(Completion::normal())
        }
        StatementType::ExpressionStatement { expression, .. } => {
            let value = evaluate_expression(ctx, expression, scope)?;
            Ok(Completion::Normal(Some(value)))
        }
        StatementType::BlockStatement(block) => execute_block(ctx, block, scope),
        StatementType::VariableDeclaration(decl) => {
            execute_variable_declaration(ctx, decl, scope)?;
            Ok(Completion::normal())
        }
        StatementType::IfStatement {
            test,
            consequent,
            alternate,
            ..
        } => {
            let test = evaluate_expression(ctx, test, scope)?;
            if to_boolean(&test) {
                execute_statement(ctx, consequent, scope)
            } else if let Some(alt) = alternate {
                execute_statement(ctx, alt, scope)
            } else {
                Ok(Completion::normal())
            }
        }
        StatementType::WhileStatement { test, body, .. } => {
            execute_loop(ctx, Some(&**test), None, body, scope)
        }
        StatementType::ForStatement {
            init,
            test,
            update,
            body,
            ..
        } => {
            let loop_scope = Scope::new_declarative(Some(scope.clone()), false);
            match init {
                Some(ForInitType::VariableDeclaration(decl)) => {
                    if decl.kind != VariableDeclarationKind::Var {
                        declare_lexical(decl, &loop_scope);
                    }
                    execute_variable_declaration(ctx, decl, &loop_scope)?;
                }
                Some(ForInitType::Expression(e)) => {
                    evaluate_expression(ctx, e, &loop_scope)?;
                }
                None => {}
            }
            execute_loop(
                ctx,
                test.as_deref(),
                update.as_deref(),
                body,
                &loop_scope,
            )
        }
        StatementType::ReturnStatement { argument, .. } => {
            let value = match argument {
                Some(e) => evaluate_expression(ctx, e, scope)?,
                None => JsValue::Undefined,
            };
            Ok(Completion::Return(value))
        }
        StatementType::ThrowStatement { argument, .. } => {
            let value = evaluate_expression(ctx, argument, scope)?;
            Err(JErrorType::Thrown(value))
        }
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => execute_try(ctx, block, handler.as_ref(), finalizer.as_ref(), scope),
        StatementType::BreakStatement { .. } => Ok(Completion::Break),
        StatementType::ContinueStatement { .. } => Ok(Completion::Continue),
    }
}

fn execute_block(ctx: &mut EvalContext, block: &BlockStatementData, scope: &ScopeRef) -> EvalResult {
    let block_scope = Scope::new_declarative(Some(scope.clone()), false);
    instantiate_declarations(ctx, &block.body, &block_scope, false)?;
    execute_statements(ctx, &block.body, &block_scope)
}

fn execute_variable_declaration(
    ctx: &mut EvalContext,
    decl: &VariableDeclarationData,
    scope: &ScopeRef,
) -> Result<(), JErrorType> {
    for d in decl.declarations.iter() {
        let name = d.id.name.as_str();
        match decl.kind {
            VariableDeclarationKind::Var => {
                if let Some(init) = &d.init {
                    let value = evaluate_expression(ctx, init, scope)?;
                    let reference = resolve_binding(ctx, scope, name)?;
                    reference.put_value(ctx, scope, value)?;
                }
            }
            VariableDeclarationKind::Let | VariableDeclarationKind::Const => {
                let value = match &d.init {
                    Some(init) => evaluate_expression(ctx, init, scope)?,
                    None => JsValue::Undefined,
                };
                scope.borrow_mut().initialize_binding(name, value);
            }
        }
    }
    Ok(())
}

fn execute_loop(
    ctx: &mut EvalContext,
    test: Option<&ExpressionType>,
    update: Option<&ExpressionType>,
    body: &StatementType,
    scope: &ScopeRef,
) -> EvalResult {
    let mut last = None;
    loop {
        if let Some(test) = test {
            let t = evaluate_expression(ctx, test, scope)?;
            if !to_boolean(&t) {
                break;
            }
        }
        match execute_statement(ctx, body, scope)? {
            Completion::Break => break,
            Completion::Return(v) => return Ok(Completion::Return(v)),
            Completion::Normal(Some(v)) => last = Some(v),
            Completion::Normal(None) | Completion::Continue => {}
        }
        if let Some(update) = update {
            evaluate_expression(ctx, update, scope)?;
        }
    }
    Ok(Completion::Normal(last))
}

fn execute_try(
    ctx: &mut EvalContext,
    block: &BlockStatementData,
    handler: Option<&CatchClauseData>,
    finalizer: Option<&BlockStatementData>,
    scope: &ScopeRef,
) -> EvalResult {
    let mut result = execute_block(ctx, block, scope);
    let caught = match (&result, handler) {
        (Err(err), Some(handler)) => Some((error_to_value(ctx, err), handler)),
        _ => None,
    };
    if let Some((thrown, handler)) = caught {
        let catch_scope = Scope::new_declarative(Some(scope.clone()), false);
        if let Some(param) = &handler.param {
            catch_scope
                .borrow_mut()
                .create_binding(&param.name, true, Some(thrown));
        }
        result = execute_block(ctx, &handler.body, &catch_scope);
    }
    if let Some(finalizer) = finalizer {
        let completion = execute_block(ctx, finalizer, scope)?;
        if completion.is_abrupt() {
            return Ok(completion);
        }
    }
    result
}
