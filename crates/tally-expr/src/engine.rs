//! Pluggable expression engines
//!
//! The batch layer only talks to [`ExpressionEngine`]; [`NativeEngine`] is the
//! built-in tree-walking implementation.

use crate::ast::Expr;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::{evaluate, EvaluationContext, Variables};
use crate::functions::registry;
use crate::parser::parse_expression;
use log::trace;
use std::collections::HashMap;
use tally_core::Value;

/// Value bound to every declared name during a syntax-only dry run
pub const SYNTAX_PLACEHOLDER: f64 = 1.0;

/// An expression evaluator that can be shared across worker threads
pub trait ExpressionEngine: Send + Sync {
    /// Compiled form of one expression
    type Program: Send + Sync;

    /// Compile expression text, surfacing syntax-class errors
    fn compile(&self, text: &str) -> ExprResult<Self::Program>;

    /// Run a compiled program against a set of variables
    fn run(&self, program: &Self::Program, variables: &dyn Variables) -> ExprResult<Value>;

    /// Compile and run in one step
    fn evaluate(&self, text: &str, variables: &dyn Variables) -> ExprResult<Value> {
        let program = self.compile(text)?;
        self.run(&program, variables)
    }

    /// Dry-run an expression with every name bound to [`SYNTAX_PLACEHOLDER`]
    fn check_syntax(&self, text: &str, names: &[&str]) -> ExprResult<()> {
        let placeholders: HashMap<String, Value> = names
            .iter()
            .map(|name| (name.to_string(), Value::Number(SYNTAX_PLACEHOLDER)))
            .collect();
        self.evaluate(text, &placeholders).map(|_| ())
    }
}

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    ast: Expr,
}

impl Program {
    /// The original expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed syntax tree
    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Variables referenced by the expression
    pub fn variables(&self) -> Vec<&str> {
        self.ast.variables()
    }
}

/// Built-in engine: recursive descent parser plus tree-walking evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl NativeEngine {
    /// Create the built-in engine
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEngine for NativeEngine {
    type Program = Program;

    fn compile(&self, text: &str) -> ExprResult<Program> {
        let ast = parse_expression(text)?;
        check_functions(&ast)?;
        trace!("compiled expression '{}'", text);
        Ok(Program {
            source: text.to_string(),
            ast,
        })
    }

    fn run(&self, program: &Program, variables: &dyn Variables) -> ExprResult<Value> {
        let ctx = EvaluationContext::new(variables);
        evaluate(&program.ast, &ctx)
    }
}

/// Resolve every function call and check its arity
fn check_functions(expr: &Expr) -> ExprResult<()> {
    match expr {
        Expr::Function { name, args } => {
            let func = registry()
                .get(name)
                .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
            func.check_arity(args.len())?;
            args.iter().try_for_each(check_functions)
        }
        Expr::BinaryOp { left, right, .. } => {
            check_functions(left)?;
            check_functions(right)
        }
        Expr::UnaryOp { operand, .. } => check_functions(operand),
        Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) | Expr::Variable(_) => Ok(()),
    }
}
