use std::rc::Rc;

use crate::parser::ast::FunctionData;
use crate::runner::ds::env_record::ScopeRef;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalContext;

/// Signature of every built-in: context, `this`, arguments.
pub type NativeFn = Rc<dyn Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType>>;

pub enum FunctionKind {
    Native {
        name: String,
        func: NativeFn,
        is_constructor: bool,
    },
    Script {
        data: Rc<FunctionData>,
        scope: ScopeRef,
        /// Captured `this` of an arrow function.
        lexical_this: Option<JsValue>,
    },
}

impl FunctionKind {
    pub fn name(&self) -> &str {
        match self {
            FunctionKind::Native { name, .. } => name.as_str(),
            FunctionKind::Script { data, .. } => data.name(),
        }
    }

    pub fn is_constructor(&self) -> bool {
        match self {
            FunctionKind::Native { is_constructor, .. } => *is_constructor,
            FunctionKind::Script { data, .. } => !data.is_arrow,
        }
    }
}
