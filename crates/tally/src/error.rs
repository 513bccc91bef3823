//! Batch error types

use serde::{Deserialize, Serialize};
use std::fmt;
use tally_core::{CoercionError, Value};
use tally_expr::ExprError;
use thiserror::Error;

/// Result type for batch operations
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Errors that abort a batch
///
/// Validation errors are raised before any record is evaluated; the rest are
/// raised at the first failing record and formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    /// The batch has no records
    #[error("Empty data")]
    EmptyData,

    /// The batch has no formulas
    #[error("Empty formulas")]
    EmptyFormulas,

    /// An input is neither a field of the sample record nor an earlier output
    #[error(
        "Variable '{variable}' used in formula '{formula}' is not available in data or prior formulas."
    )]
    UnresolvedVariable { variable: String, formula: String },

    /// A formula lists its own output among its inputs
    #[error("Formula '{formula}' cannot reference itself in its inputs.")]
    SelfReference { formula: String },

    /// The expression failed its dry run
    #[error("Error evaluating expression: syntax error in formula '{formula}' with expression '{expression}': {source}")]
    FormulaSyntax {
        formula: String,
        expression: String,
        #[source]
        source: ExprError,
    },

    /// A declared type tag is not supported
    #[error("Unsupported variable type '{var_type}' for variable '{variable}' in formula '{formula}'")]
    UnsupportedType {
        var_type: String,
        variable: String,
        formula: String,
    },

    /// A record lacks a field some formula needs
    #[error("Variable '{variable}' not found in data item with id {}", id_label(.record_id))]
    MissingField {
        variable: String,
        formula: String,
        record_index: usize,
        record_id: Option<Value>,
    },

    /// A value could not be coerced to its declared type
    #[error("Error while converting variable: {source}")]
    Conversion {
        variable: String,
        formula: String,
        record_index: usize,
        record_id: Option<Value>,
        #[source]
        source: CoercionError,
    },

    /// Evaluation failed for a record
    #[error("Error evaluating expression '{expression}': {source}")]
    Evaluation {
        formula: String,
        expression: String,
        record_index: usize,
        record_id: Option<Value>,
        #[source]
        source: ExprError,
    },
}

fn id_label(id: &Option<Value>) -> String {
    match id {
        Some(value) => value.to_string(),
        None => "unknown".to_string(),
    }
}

/// Stable error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "EmptyInputError")]
    EmptyInput,
    #[serde(rename = "UnresolvedVariableError")]
    UnresolvedVariable,
    #[serde(rename = "SelfReferenceError")]
    SelfReference,
    #[serde(rename = "FormulaSyntaxError")]
    FormulaSyntax,
    #[serde(rename = "MissingFieldError")]
    MissingField,
    #[serde(rename = "ConversionError")]
    Conversion,
    #[serde(rename = "EvaluationError")]
    Evaluation,
    #[serde(rename = "UnsupportedTypeError")]
    UnsupportedType,
}

impl ErrorKind {
    /// Taxonomy name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EmptyInput => "EmptyInputError",
            ErrorKind::UnresolvedVariable => "UnresolvedVariableError",
            ErrorKind::SelfReference => "SelfReferenceError",
            ErrorKind::FormulaSyntax => "FormulaSyntaxError",
            ErrorKind::MissingField => "MissingFieldError",
            ErrorKind::Conversion => "ConversionError",
            ErrorKind::Evaluation => "EvaluationError",
            ErrorKind::UnsupportedType => "UnsupportedTypeError",
        }
    }

    /// Whether errors of this kind are raised before any record is evaluated
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            ErrorKind::MissingField | ErrorKind::Conversion | ErrorKind::Evaluation
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BatchError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BatchError::EmptyData | BatchError::EmptyFormulas => ErrorKind::EmptyInput,
            BatchError::UnresolvedVariable { .. } => ErrorKind::UnresolvedVariable,
            BatchError::SelfReference { .. } => ErrorKind::SelfReference,
            BatchError::FormulaSyntax { .. } => ErrorKind::FormulaSyntax,
            BatchError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            BatchError::MissingField { .. } => ErrorKind::MissingField,
            BatchError::Conversion { .. } => ErrorKind::Conversion,
            BatchError::Evaluation { .. } => ErrorKind::Evaluation,
        }
    }

    /// The offending formula's output name, if any
    pub fn formula(&self) -> Option<&str> {
        match self {
            BatchError::EmptyData | BatchError::EmptyFormulas => None,
            BatchError::UnresolvedVariable { formula, .. }
            | BatchError::SelfReference { formula }
            | BatchError::FormulaSyntax { formula, .. }
            | BatchError::UnsupportedType { formula, .. }
            | BatchError::MissingField { formula, .. }
            | BatchError::Conversion { formula, .. }
            | BatchError::Evaluation { formula, .. } => Some(formula),
        }
    }

    /// The offending variable, if any
    pub fn variable(&self) -> Option<&str> {
        match self {
            BatchError::UnresolvedVariable { variable, .. }
            | BatchError::UnsupportedType { variable, .. }
            | BatchError::MissingField { variable, .. }
            | BatchError::Conversion { variable, .. } => Some(variable),
            _ => None,
        }
    }

    /// Position of the failing record in the batch, for execution errors
    pub fn record_index(&self) -> Option<usize> {
        match self {
            BatchError::MissingField { record_index, .. }
            | BatchError::Conversion { record_index, .. }
            | BatchError::Evaluation { record_index, .. } => Some(*record_index),
            _ => None,
        }
    }

    /// The failing record's `id` field, if it has one
    pub fn record_id(&self) -> Option<&Value> {
        match self {
            BatchError::MissingField { record_id, .. }
            | BatchError::Conversion { record_id, .. }
            | BatchError::Evaluation { record_id, .. } => record_id.as_ref(),
            _ => None,
        }
    }
}
