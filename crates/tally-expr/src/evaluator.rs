//! Expression evaluator
//!
//! Evaluates expression ASTs against a set of named variables.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{ExprError, ExprResult};
use crate::functions::registry;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::BuildHasher;
use tally_core::{Record, Value};

/// Named variables visible to an expression
pub trait Variables {
    /// Look up a variable by name
    fn get_var(&self, name: &str) -> Option<&Value>;
}

impl<S: BuildHasher> Variables for HashMap<String, Value, S> {
    fn get_var(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Variables for Record {
    fn get_var(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Context for expression evaluation
pub struct EvaluationContext<'a> {
    variables: &'a dyn Variables,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context over the given variables
    pub fn new(variables: &'a dyn Variables) -> Self {
        Self { variables }
    }

    /// Resolve a variable, failing if it is not bound
    pub fn resolve(&self, name: &str) -> ExprResult<Value> {
        self.variables
            .get_var(name)
            .cloned()
            .ok_or_else(|| ExprError::UnboundVariable(name.to_string()))
    }
}

/// Evaluate an expression
///
/// Recurses once per tree level; trees from [`parse_expression`](crate::parse_expression)
/// are at most [`MAX_DEPTH`](crate::MAX_DEPTH) deep.
pub fn evaluate(expr: &Expr, ctx: &EvaluationContext) -> ExprResult<Value> {
    match expr {
        // === Literals ===
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),

        // === References ===
        Expr::Variable(name) => ctx.resolve(name),

        // === Operators ===
        Expr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        Expr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        Expr::Function { name, args } => evaluate_function(name, args, ctx),
    }
}

/// Numeric view of a value for arithmetic (booleans count as 1/0)
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Boolean(true) => Some(1.0),
        Value::Boolean(false) => Some(0.0),
        _ => None,
    }
}

fn operand_error(op: BinaryOperator, left: &Value, right: &Value) -> ExprError {
    ExprError::Evaluation(format!(
        "unsupported operand types for {}: {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    ctx: &EvaluationContext,
) -> ExprResult<Value> {
    // Evaluate operands first
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    match op {
        // Arithmetic operators
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo
        | BinaryOperator::Power => arithmetic(op, &left_val, &right_val),

        // Comparison operators
        BinaryOperator::Equal => Ok(Value::Boolean(
            compare_values(&left_val, &right_val) == Some(Ordering::Equal),
        )),
        BinaryOperator::NotEqual => Ok(Value::Boolean(
            compare_values(&left_val, &right_val) != Some(Ordering::Equal),
        )),
        BinaryOperator::LessThan
        | BinaryOperator::LessEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterEqual => {
            if !comparable(&left_val, &right_val) {
                return Err(ExprError::Evaluation(format!(
                    "'{}' not supported between {} and {}",
                    op.symbol(),
                    left_val.type_name(),
                    right_val.type_name()
                )));
            }
            // NaN orders with nothing
            let result = match compare_values(&left_val, &right_val) {
                Some(ord) => match op {
                    BinaryOperator::LessThan => ord == Ordering::Less,
                    BinaryOperator::LessEqual => ord != Ordering::Greater,
                    BinaryOperator::GreaterThan => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                },
                None => false,
            };
            Ok(Value::Boolean(result))
        }

        // Logical operators
        BinaryOperator::And | BinaryOperator::Or => {
            let (l, r) = match (logical(&left_val), logical(&right_val)) {
                (Some(l), Some(r)) => (l, r),
                _ => return Err(operand_error(op, &left_val, &right_val)),
            };
            let result = if op == BinaryOperator::And {
                l && r
            } else {
                l || r
            };
            Ok(Value::Boolean(result))
        }
    }
}

fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> ExprResult<Value> {
    // Difference between two timestamps, in days
    if let (BinaryOperator::Subtract, Value::DateTime(l), Value::DateTime(r)) = (op, left, right)
    {
        let millis = (*l - *r).num_milliseconds() as f64;
        return Ok(Value::Number(millis / 86_400_000.0));
    }

    let (l, r) = match (numeric(left), numeric(right)) {
        (Some(l), Some(r)) => (l, r),
        _ => return Err(operand_error(op, left, right)),
    };

    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => l / r,
        BinaryOperator::Modulo => floored_mod(l, r),
        BinaryOperator::Power => l.powf(r),
        _ => return Err(operand_error(op, left, right)),
    };

    Ok(Value::Number(result))
}

/// Modulo whose result takes the sign of the divisor
fn floored_mod(l: f64, r: f64) -> f64 {
    let rem = l % r;
    if rem != 0.0 && (rem < 0.0) != (r < 0.0) {
        rem + r
    } else {
        rem
    }
}

fn logical(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::Number(n) => Some(*n != 0.0),
        _ => None,
    }
}

/// Whether two values may be ordered against each other
fn comparable(left: &Value, right: &Value) -> bool {
    matches!(
        (left, right),
        (Value::Number(_) | Value::Boolean(_), Value::Number(_) | Value::Boolean(_))
            | (Value::String(_), Value::String(_))
            | (Value::DateTime(_), Value::DateTime(_))
    )
}

/// Compare two values; `None` for values of different kinds or NaN
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::DateTime(l), Value::DateTime(r)) => Some(l.cmp(r)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => {
            if !comparable(left, right) {
                return None;
            }
            let l = numeric(left)?;
            let r = numeric(right)?;
            l.partial_cmp(&r)
        }
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &Expr,
    ctx: &EvaluationContext,
) -> ExprResult<Value> {
    let val = evaluate(operand, ctx)?;

    match op {
        UnaryOperator::Negate => numeric(&val).map(|n| Value::Number(-n)).ok_or_else(|| {
            ExprError::Evaluation(format!("bad operand type for unary -: {}", val.type_name()))
        }),
        UnaryOperator::Not => logical(&val).map(|b| Value::Boolean(!b)).ok_or_else(|| {
            ExprError::Evaluation(format!("bad operand type for not: {}", val.type_name()))
        }),
    }
}

/// Evaluate a function call
fn evaluate_function(name: &str, args: &[Expr], ctx: &EvaluationContext) -> ExprResult<Value> {
    let func = registry()
        .get(name)
        .ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;

    // Check argument count
    func.check_arity(args.len())?;

    // Evaluate arguments
    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate(arg, ctx)?);
    }

    // Call the function
    (func.implementation)(&evaluated_args)
}
