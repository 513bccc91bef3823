//! # tally
//!
//! Batch evaluation of chained formulas over tabular records.
//!
//! A batch is a list of records plus an ordered list of formulas. Each formula
//! computes one output column from an expression over declared, typed inputs.
//! Inputs may be record fields or outputs of earlier formulas in the list.
//!
//! The batch is validated once up front, then every record is evaluated
//! independently. The first failure aborts the whole batch.
//!
//! ## Example
//!
//! ```rust
//! use tally::prelude::*;
//!
//! let request = FormulaRequest::new(
//!     vec![
//!         Record::from([("id", Value::from(1)), ("price", Value::from("$1,200")), ("qty", Value::from(2))]),
//!         Record::from([("id", Value::from(2)), ("price", Value::from("USD 80")), ("qty", Value::from(5))]),
//!     ],
//!     vec![
//!         Formula::new("subtotal", "price * qty")
//!             .input("price", TypeTag::Currency)
//!             .input("qty", TypeTag::Number),
//!         Formula::new("discounted", "where(subtotal > 1000, subtotal * 0.9, subtotal)")
//!             .input("subtotal", TypeTag::Number),
//!     ],
//! );
//!
//! let response = run_batch(&request).unwrap();
//! assert_eq!(
//!     response.results.get("discounted").unwrap(),
//!     &[Value::Number(2160.0), Value::Number(400.0)]
//! );
//! ```

pub mod error;
pub mod execution;
pub mod formula;
pub mod prelude;
pub mod report;
pub mod validation;

use log::{info, warn};
use std::time::Instant;
use tally_expr::{ExpressionEngine, NativeEngine};

pub use error::{BatchError, BatchResult, ErrorKind};
pub use execution::{ExecutionEngine, ExecutionOptions, ResultSet, ScopeSnapshot};
pub use formula::{Formula, FormulaRequest, InputRef};
pub use report::{BatchResponse, ErrorReport, RecordRef, Status, SUCCESS_MESSAGE};
pub use validation::FormulaValidator;

// Re-export the lower layers
pub use tally_core::{coerce, coerce_as, CoercionError, Record, TypeTag, Value};
pub use tally_expr::{ExprError, ExprErrorKind};

/// Validate and execute a batch with the built-in engine and default options
pub fn run_batch(request: &FormulaRequest) -> BatchResult<BatchResponse> {
    run_batch_with(&NativeEngine, request, &ExecutionOptions::default())
}

/// Validate and execute a batch with a chosen engine and options
pub fn run_batch_with<E: ExpressionEngine>(
    engine: &E,
    request: &FormulaRequest,
    options: &ExecutionOptions,
) -> BatchResult<BatchResponse> {
    let start = Instant::now();

    let outcome = FormulaValidator::new(engine)
        .validate_batch(&request.data, &request.formulas)
        .and_then(|()| {
            ExecutionEngine::with_options(engine, options.clone())
                .execute(&request.data, &request.formulas)
        });

    match outcome {
        Ok(results) => {
            info!(
                "executed {} formulas over {} records in {:?}",
                request.formulas.len(),
                request.data.len(),
                start.elapsed()
            );
            Ok(BatchResponse::success(results))
        }
        Err(err) => {
            warn!("batch rejected ({}): {}", err.kind(), err);
            Err(err)
        }
    }
}
