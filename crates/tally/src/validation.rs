//! Up-front validation of a formula set
//!
//! Runs once per batch, before any record is evaluated. Variable availability
//! is checked against the field names of a single sample record; records with
//! a different shape are only caught during execution.

use crate::error::{BatchError, BatchResult};
use crate::formula::Formula;
use log::{debug, warn};
use std::collections::HashSet;
use tally_core::Record;
use tally_expr::ExpressionEngine;

/// Validator for an ordered formula list
pub struct FormulaValidator<'e, E: ExpressionEngine> {
    engine: &'e E,
}

impl<'e, E: ExpressionEngine> FormulaValidator<'e, E> {
    /// Create a validator that dry-runs expressions on the given engine
    pub fn new(engine: &'e E) -> Self {
        Self { engine }
    }

    /// Validate a whole batch, using the first record as the sample
    pub fn validate_batch(&self, records: &[Record], formulas: &[Formula]) -> BatchResult<()> {
        let sample = records.first().ok_or(BatchError::EmptyData)?;
        if formulas.is_empty() {
            return Err(BatchError::EmptyFormulas);
        }
        self.validate(sample.keys(), formulas)
    }

    /// Validate formulas against the field names of a sample record
    ///
    /// For each formula in order: every input must be a sample field or an
    /// earlier output with a supported type tag, the formula must not list its
    /// own output as an input, and the expression must survive a dry run with
    /// its inputs bound to placeholders.
    pub fn validate<'k, I>(&self, sample_keys: I, formulas: &[Formula]) -> BatchResult<()>
    where
        I: IntoIterator<Item = &'k str>,
    {
        if formulas.is_empty() {
            return Err(BatchError::EmptyFormulas);
        }

        let available: HashSet<&str> = sample_keys.into_iter().collect();
        let mut evaluated: HashSet<&str> = HashSet::with_capacity(formulas.len());

        for formula in formulas {
            let result = self.validate_formula(formula, &available, &evaluated);
            if let Err(err) = result {
                warn!("formula '{}' rejected: {}", formula.output_var, err);
                return Err(err);
            }
            evaluated.insert(formula.output_var.as_str());
        }

        debug!(
            "validated {} formulas against {} sample fields",
            formulas.len(),
            available.len()
        );
        Ok(())
    }

    fn validate_formula(
        &self,
        formula: &Formula,
        available: &HashSet<&str>,
        evaluated: &HashSet<&str>,
    ) -> BatchResult<()> {
        for input in &formula.inputs {
            let name = input.var_name.as_str();
            if !available.contains(name) && !evaluated.contains(name) {
                return Err(BatchError::UnresolvedVariable {
                    variable: input.var_name.clone(),
                    formula: formula.output_var.clone(),
                });
            }

            if input.type_tag().is_err() {
                return Err(BatchError::UnsupportedType {
                    var_type: input.var_type.clone(),
                    variable: input.var_name.clone(),
                    formula: formula.output_var.clone(),
                });
            }
        }

        if formula.references_itself() {
            return Err(BatchError::SelfReference {
                formula: formula.output_var.clone(),
            });
        }

        self.engine
            .check_syntax(&formula.expression, &formula.input_names())
            .map_err(|source| BatchError::FormulaSyntax {
                formula: formula.output_var.clone(),
                expression: formula.expression.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use tally_core::{TypeTag, Value};
    use tally_expr::{ExprError, NativeEngine};

    fn validate(records: &[Record], formulas: &[Formula]) -> BatchResult<()> {
        FormulaValidator::new(&NativeEngine).validate_batch(records, formulas)
    }

    fn sample() -> Vec<Record> {
        vec![Record::from([
            ("id", Value::from(1)),
            ("a", Value::from(1)),
            ("b", Value::from(2)),
        ])]
    }

    #[test]
    fn test_valid_chain() {
        let formulas = vec![
            Formula::new("c", "a + b")
                .input("a", TypeTag::Number)
                .input("b", TypeTag::Number),
            Formula::new("d", "c * 2").input("c", TypeTag::Number),
        ];
        assert_eq!(validate(&sample(), &formulas), Ok(()));
    }

    #[test]
    fn test_empty_records_checked_first() {
        assert_eq!(validate(&[], &[]), Err(BatchError::EmptyData));
        assert_eq!(validate(&sample(), &[]), Err(BatchError::EmptyFormulas));
    }

    #[test]
    fn test_unresolved_variable() {
        let formulas = vec![Formula::new("c", "a + z")
            .input("a", TypeTag::Number)
            .input("z", TypeTag::Number)];
        assert_eq!(
            validate(&sample(), &formulas),
            Err(BatchError::UnresolvedVariable {
                variable: "z".into(),
                formula: "c".into(),
            })
        );
    }

    #[test]
    fn test_later_output_is_not_available_earlier() {
        let formulas = vec![
            Formula::new("c", "d + 1").input("d", TypeTag::Number),
            Formula::new("d", "a * 2").input("a", TypeTag::Number),
        ];
        let err = validate(&sample(), &formulas).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedVariable);
        assert_eq!(err.variable(), Some("d"));
    }

    #[test]
    fn test_self_reference() {
        // Field exists in the data, still a self-reference
        let formulas = vec![Formula::new("a", "a + 1").input("a", TypeTag::Number)];
        assert_eq!(
            validate(&sample(), &formulas),
            Err(BatchError::SelfReference {
                formula: "a".into()
            })
        );

        // Inputs are resolved before the self-reference check
        let formulas = vec![Formula::new("x", "x + 1").input("x", TypeTag::Number)];
        assert_eq!(
            validate(&sample(), &formulas),
            Err(BatchError::UnresolvedVariable {
                variable: "x".into(),
                formula: "x".into(),
            })
        );

        let formulas = vec![Formula::new("a", "z + a")
            .input("z", TypeTag::Number)
            .input("a", TypeTag::Number)];
        assert_eq!(
            validate(&sample(), &formulas),
            Err(BatchError::UnresolvedVariable {
                variable: "z".into(),
                formula: "a".into(),
            })
        );
    }

    #[test]
    fn test_unsupported_type() {
        let formulas = vec![Formula::new("c", "a * 2").raw_input("a", "complex")];
        assert_eq!(
            validate(&sample(), &formulas),
            Err(BatchError::UnsupportedType {
                var_type: "complex".into(),
                variable: "a".into(),
                formula: "c".into(),
            })
        );
    }

    #[test]
    fn test_syntax_error() {
        let formulas = vec![Formula::new("c", "a +").input("a", TypeTag::Number)];
        let err = validate(&sample(), &formulas).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormulaSyntax);
        assert!(err
            .to_string()
            .starts_with("Error evaluating expression: syntax error in formula 'c' with expression 'a +': "));
    }

    #[test]
    fn test_undeclared_name_fails_dry_run() {
        // b is a field but not a declared input
        let formulas = vec![Formula::new("c", "a + b").input("a", TypeTag::Number)];
        match validate(&sample(), &formulas) {
            Err(BatchError::FormulaSyntax { source, .. }) => {
                assert_eq!(source, ExprError::UnboundVariable("b".into()));
            }
            other => panic!("Expected FormulaSyntax, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_against_explicit_keys() {
        let validator = FormulaValidator::new(&NativeEngine);
        let formulas = vec![Formula::new("y", "x * 2").input("x", TypeTag::Number)];
        assert!(validator.validate(["x"], &formulas).is_ok());
        assert!(validator.validate(["w"], &formulas).is_err());
    }
}
