//! Logical functions

use crate::error::{ExprError, ExprResult};
use tally_core::Value;

/// WHERE function: `where(condition, if_true, if_false)`
///
/// The condition is taken by truthiness. Both branches are already evaluated.
pub fn fn_where(args: &[Value]) -> ExprResult<Value> {
    match args {
        [condition, if_true, if_false] => {
            if condition.is_truthy() {
                Ok(if_true.clone())
            } else {
                Ok(if_false.clone())
            }
        }
        _ => Err(ExprError::Evaluation(format!(
            "where() requires 3 arguments, got {}",
            args.len()
        ))),
    }
}
