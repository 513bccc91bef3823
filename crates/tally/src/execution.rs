//! Per-record execution of a validated formula list
//!
//! Records are independent of each other. Within a record, formulas run in
//! declaration order and each output is written back into the record's scope
//! so later formulas can read it.

use crate::error::{BatchError, BatchResult};
use crate::formula::{Formula, InputRef};
use log::{debug, trace};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tally_core::{coerce, FieldMap, Record, TypeTag, Value};
use tally_expr::ExpressionEngine;

/// Options for batch execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Evaluate records on the rayon thread pool (requires the `parallel` feature)
    pub parallel: bool,
    /// Smallest batch that is worth spreading across threads (default: 1024)
    pub min_parallel_records: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallel: cfg!(feature = "parallel"),
            min_parallel_records: 1024,
        }
    }
}

impl ExecutionOptions {
    /// Options that always evaluate records on the calling thread
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Set whether large batches may be evaluated in parallel
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the smallest batch evaluated in parallel
    pub fn with_min_parallel_records(mut self, min_parallel_records: usize) -> Self {
        self.min_parallel_records = min_parallel_records;
        self
    }

    fn use_parallel(&self, record_count: usize) -> bool {
        cfg!(feature = "parallel") && self.parallel && record_count >= self.min_parallel_records
    }
}

/// Variable bindings of one record while its formulas run
///
/// Computed outputs are layered over the borrowed record and shadow fields of
/// the same name.
#[derive(Debug, Clone)]
pub struct ScopeSnapshot<'r> {
    record: &'r Record,
    outputs: FieldMap,
}

impl<'r> ScopeSnapshot<'r> {
    pub fn new(record: &'r Record) -> Self {
        Self {
            record,
            outputs: FieldMap::default(),
        }
    }

    /// Look up a name, preferring computed outputs over record fields
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name).or_else(|| self.record.get(name))
    }

    /// Record a computed output
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.outputs.insert(name.into(), value);
    }

    /// Outputs computed so far
    pub fn outputs(&self) -> &FieldMap {
        &self.outputs
    }
}

/// Output columns of a batch, one value per record in input order
///
/// Columns appear in the order their output names were first declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<(String, Vec<Value>)>,
}

impl ResultSet {
    /// Values of one output column
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Output names in column order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate over (name, values) columns
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> + '_ {
        self.columns
            .iter()
            .map(|(n, values)| (n.as_str(), values.as_slice()))
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of records each column holds
    pub fn record_count(&self) -> usize {
        self.columns.first().map_or(0, |(_, values)| values.len())
    }

    fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut columns: Vec<(String, Vec<Value>)> = names
            .into_iter()
            .map(|name| (name, Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            for (column, value) in columns.iter_mut().zip(row) {
                column.1.push(value);
            }
        }

        Self { columns }
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, values) in &self.columns {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

/// One compiled formula with its parsed input types and target column
struct Step<'f, P> {
    formula: &'f Formula,
    program: P,
    inputs: Vec<(&'f InputRef, TypeTag)>,
    column: usize,
}

/// Runs formulas over every record of a batch
pub struct ExecutionEngine<'e, E: ExpressionEngine> {
    engine: &'e E,
    options: ExecutionOptions,
}

impl<'e, E: ExpressionEngine> ExecutionEngine<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self::with_options(engine, ExecutionOptions::default())
    }

    pub fn with_options(engine: &'e E, options: ExecutionOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Evaluate every formula for every record
    ///
    /// Aborts at the first failure; no partial results are returned.
    pub fn execute(&self, records: &[Record], formulas: &[Formula]) -> BatchResult<ResultSet> {
        let (names, steps) = self.plan(formulas)?;
        debug!(
            "compiled {} formulas into {} columns",
            steps.len(),
            names.len()
        );

        let rows = if self.options.use_parallel(records.len()) {
            self.execute_parallel(records, &steps, names.len())?
        } else {
            records
                .iter()
                .enumerate()
                .map(|(index, record)| self.execute_record(index, record, &steps, names.len()))
                .collect::<BatchResult<Vec<_>>>()?
        };

        Ok(ResultSet::from_rows(names, rows))
    }

    /// Compile each formula once and assign it a column
    fn plan<'f>(
        &self,
        formulas: &'f [Formula],
    ) -> BatchResult<(Vec<String>, Vec<Step<'f, E::Program>>)> {
        let mut names: Vec<String> = Vec::new();
        let mut steps = Vec::with_capacity(formulas.len());

        for formula in formulas {
            let program =
                self.engine
                    .compile(&formula.expression)
                    .map_err(|source| BatchError::FormulaSyntax {
                        formula: formula.output_var.clone(),
                        expression: formula.expression.clone(),
                        source,
                    })?;

            let inputs = formula
                .inputs
                .iter()
                .map(|input| {
                    input
                        .type_tag()
                        .map(|tag| (input, tag))
                        .map_err(|_| BatchError::UnsupportedType {
                            var_type: input.var_type.clone(),
                            variable: input.var_name.clone(),
                            formula: formula.output_var.clone(),
                        })
                })
                .collect::<BatchResult<Vec<_>>>()?;

            // A redeclared output reuses its first column
            let column = match names.iter().position(|n| *n == formula.output_var) {
                Some(column) => column,
                None => {
                    names.push(formula.output_var.clone());
                    names.len() - 1
                }
            };

            steps.push(Step {
                formula,
                program,
                inputs,
                column,
            });
        }

        Ok((names, steps))
    }

    fn execute_record(
        &self,
        index: usize,
        record: &Record,
        steps: &[Step<'_, E::Program>],
        width: usize,
    ) -> BatchResult<Vec<Value>> {
        trace!("evaluating record {}", index);

        let mut scope = ScopeSnapshot::new(record);
        let mut row = vec![Value::Null; width];

        for step in steps {
            let formula = step.formula;

            let mut variables = FieldMap::default();
            for (input, tag) in &step.inputs {
                let raw = scope
                    .get(&input.var_name)
                    .ok_or_else(|| BatchError::MissingField {
                        variable: input.var_name.clone(),
                        formula: formula.output_var.clone(),
                        record_index: index,
                        record_id: record.id().cloned(),
                    })?;

                let value = coerce(raw, *tag).map_err(|source| {
                    if source.is_unsupported_type() {
                        BatchError::UnsupportedType {
                            var_type: input.var_type.clone(),
                            variable: input.var_name.clone(),
                            formula: formula.output_var.clone(),
                        }
                    } else {
                        BatchError::Conversion {
                            variable: input.var_name.clone(),
                            formula: formula.output_var.clone(),
                            record_index: index,
                            record_id: record.id().cloned(),
                            source,
                        }
                    }
                })?;

                variables.insert(input.var_name.clone(), value);
            }

            let result = self
                .engine
                .run(&step.program, &variables)
                .map_err(|source| BatchError::Evaluation {
                    formula: formula.output_var.clone(),
                    expression: formula.expression.clone(),
                    record_index: index,
                    record_id: record.id().cloned(),
                    source,
                })?;

            trace!("record {}: {} = {}", index, formula.output_var, result);
            row[step.column] = result.clone();
            scope.set(formula.output_var.as_str(), result);
        }

        Ok(row)
    }

    #[cfg(feature = "parallel")]
    fn execute_parallel(
        &self,
        records: &[Record],
        steps: &[Step<'_, E::Program>],
        width: usize,
    ) -> BatchResult<Vec<Vec<Value>>> {
        use rayon::prelude::*;
        use std::sync::atomic::{AtomicUsize, Ordering};

        debug!("evaluating {} records in parallel", records.len());

        // Lowest record index that has failed so far
        let first_failure = AtomicUsize::new(usize::MAX);

        let rows: Vec<Option<BatchResult<Vec<Value>>>> = records
            .par_iter()
            .enumerate()
            .map(|(index, record)| {
                if index > first_failure.load(Ordering::Relaxed) {
                    return None;
                }
                let row = self.execute_record(index, record, steps, width);
                if row.is_err() {
                    first_failure.fetch_min(index, Ordering::Relaxed);
                }
                Some(row)
            })
            .collect();

        // A skipped row always follows a failed one, so the first error in
        // record order is reached before any gap.
        let mut out = Vec::with_capacity(rows.len());
        for row in rows.into_iter().flatten() {
            out.push(row?);
        }
        Ok(out)
    }

    #[cfg(not(feature = "parallel"))]
    fn execute_parallel(
        &self,
        records: &[Record],
        steps: &[Step<'_, E::Program>],
        width: usize,
    ) -> BatchResult<Vec<Vec<Value>>> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| self.execute_record(index, record, steps, width))
            .collect()
    }
}
