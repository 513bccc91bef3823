//! # tally-expr
//!
//! Expression parser and evaluator for tally.
//!
//! This crate provides:
//! - Expression parsing (text → AST)
//! - Expression evaluation (AST → value)
//! - Built-in numeric and conditional functions
//! - The [`ExpressionEngine`] trait and its [`NativeEngine`] implementation
//!
//! ## Example
//!
//! ```rust
//! use tally_core::{Record, Value};
//! use tally_expr::{ExpressionEngine, NativeEngine};
//!
//! let record = Record::from([("fieldA", 10)]);
//! let result = NativeEngine.evaluate("fieldA + 10", &record).unwrap();
//! assert_eq!(result, Value::Number(20.0));
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;

pub use ast::{BinaryOperator, Expr, UnaryOperator};
pub use engine::{ExpressionEngine, NativeEngine, Program, SYNTAX_PLACEHOLDER};
pub use error::{ExprError, ExprErrorKind, ExprResult};
pub use evaluator::{evaluate, EvaluationContext, Variables};
pub use parser::{parse_expression, MAX_DEPTH};
