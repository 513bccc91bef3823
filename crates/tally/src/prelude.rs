//! Prelude module - common imports for tally users
//!
//! ```rust
//! use tally::prelude::*;
//! ```

pub use crate::{
    // Entry points
    run_batch,
    run_batch_with,
    // Error types
    BatchError,
    BatchResponse,
    BatchResult,
    ErrorKind,
    ErrorReport,
    // Execution
    ExecutionEngine,
    ExecutionOptions,
    // Declarations
    Formula,
    FormulaRequest,
    FormulaValidator,
    InputRef,
    // Data
    Record,
    ResultSet,
    TypeTag,
    Value,
};

pub use tally_expr::{ExpressionEngine, NativeEngine};
