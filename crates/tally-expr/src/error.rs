//! Expression error types

use thiserror::Error;

/// Result type for expression operations
pub type ExprResult<T> = std::result::Result<T, ExprError>;

/// Errors that can occur during expression parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// Expression parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Name not bound in the evaluation scope
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    /// Operator or function applied to an incompatible value
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

/// Broad class of an [`ExprError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprErrorKind {
    /// Malformed expression, detected before any value is looked at
    Syntax,
    /// Failure while evaluating against concrete values
    Runtime,
}

impl ExprError {
    /// Classify the error
    pub fn kind(&self) -> ExprErrorKind {
        match self {
            ExprError::Parse(_) | ExprError::UnknownFunction(_) | ExprError::ArgumentCount { .. } => {
                ExprErrorKind::Syntax
            }
            ExprError::UnboundVariable(_) | ExprError::Evaluation(_) => ExprErrorKind::Runtime,
        }
    }

    /// Whether this is a syntax-class error
    pub fn is_syntax(&self) -> bool {
        self.kind() == ExprErrorKind::Syntax
    }
}
