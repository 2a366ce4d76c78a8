//! Tree-walking evaluator.
//!
//! Statements and expressions are evaluated directly over the AST against a
//! chain of environment records. Object records defer to the object model,
//! so an exotic binding object sees every identifier lookup made through it.

pub mod expression;
pub mod function;
pub mod statement;
pub mod types;

pub use types::{Completion, EvalContext, Intrinsics, Reference};
