//! Success and error responses

use crate::error::{BatchError, ErrorKind};
use crate::execution::ResultSet;
use serde::Serialize;
use tally_core::Value;

/// Message attached to every successful batch
pub const SUCCESS_MESSAGE: &str =
    "The formulas were executed successfully with variable-based chaining.";

/// Outcome marker shared by both response shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Response for a batch that completed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub results: ResultSet,
    pub status: Status,
    pub message: String,
}

impl BatchResponse {
    pub fn success(results: ResultSet) -> Self {
        Self {
            results,
            status: Status::Success,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }
}

/// Identifies the record an execution error occurred in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRef {
    /// Position in the batch
    pub index: usize,
    /// The record's `id` field, if it has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

/// User-facing description of a failed batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub status: Status,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordRef>,
}

impl From<&BatchError> for ErrorReport {
    fn from(err: &BatchError) -> Self {
        Self {
            status: Status::Error,
            kind: err.kind(),
            message: err.to_string(),
            formula: err.formula().map(str::to_string),
            variable: err.variable().map(str::to_string),
            record: err.record_index().map(|index| RecordRef {
                index,
                id: err.record_id().cloned(),
            }),
        }
    }
}

impl From<BatchError> for ErrorReport {
    fn from(err: BatchError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_success_response_json() {
        let response = BatchResponse::success(ResultSet::default());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "results": {},
                "status": "success",
                "message": "The formulas were executed successfully with variable-based chaining."
            })
        );
    }

    #[test]
    fn test_validation_error_report() {
        let err = BatchError::UnresolvedVariable {
            variable: "b".into(),
            formula: "c".into(),
        };
        let report = ErrorReport::from(&err);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "status": "error",
                "kind": "UnresolvedVariableError",
                "message": "Variable 'b' used in formula 'c' is not available in data or prior formulas.",
                "formula": "c",
                "variable": "b"
            })
        );
    }

    #[test]
    fn test_execution_error_report() {
        let err = BatchError::MissingField {
            variable: "fieldA".into(),
            formula: "result".into(),
            record_index: 1,
            record_id: Some(Value::Number(2.0)),
        };
        let report = ErrorReport::from(err);
        assert_eq!(report.kind, ErrorKind::MissingField);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "status": "error",
                "kind": "MissingFieldError",
                "message": "Variable 'fieldA' not found in data item with id 2",
                "formula": "result",
                "variable": "fieldA",
                "record": {"index": 1, "id": 2.0}
            })
        );
    }

    #[test]
    fn test_empty_input_report() {
        let report = ErrorReport::from(&BatchError::EmptyData);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"status": "error", "kind": "EmptyInputError", "message": "Empty data"})
        );
    }
}
