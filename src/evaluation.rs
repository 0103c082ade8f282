//! The [`Evaluation`]: results of one execution of a test suite.

use std::iter::Sum;
use std::ops::Add;

use crate::error::{PipelineError, PipelineResult};
use crate::processing::Processor;
use crate::types::{DataType, Field, Schema, Table, Value};

/// An immutable table of test results, one row per test run and one column per metric,
/// tagged with the id of the execution that produced it.
///
/// Processors never mutate an evaluation; they return a new one. [`Evaluation::to_table`]
/// hands out a deep copy so callers cannot alias the evaluation's storage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    table: Table,
    eval_id: Option<i64>,
}

impl Evaluation {
    pub fn new(table: Table, eval_id: Option<i64>) -> Self {
        Self { table, eval_id }
    }

    /// Build an evaluation from a schema and row-major values.
    ///
    /// Fails with [`PipelineError::Schema`] when the rows are not rectangular.
    pub fn from_rows(schema: Schema, rows: Vec<Vec<Value>>, eval_id: Option<i64>) -> PipelineResult<Self> {
        Ok(Self::new(Table::new(schema, rows)?, eval_id))
    }

    /// Build an evaluation from flat JSON records (column name → scalar).
    ///
    /// Column order follows the first record and column types are inferred. Every record
    /// must carry exactly the same set of keys, otherwise this fails with
    /// [`PipelineError::Schema`].
    pub fn from_records(
        records: &[serde_json::Map<String, serde_json::Value>],
        eval_id: Option<i64>,
    ) -> PipelineResult<Self> {
        let names: Vec<String> = records
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(records.len());
        for (row_num, record) in records.iter().enumerate() {
            if record.len() != names.len() {
                return Err(PipelineError::schema(format!(
                    "record {row_num} has {} fields but record 0 has {}",
                    record.len(),
                    names.len()
                )));
            }
            let mut row = Vec::with_capacity(names.len());
            for name in &names {
                let raw = record.get(name).ok_or_else(|| {
                    PipelineError::schema(format!("record {row_num} is missing field '{name}'"))
                })?;
                let value = Value::from_json(raw).ok_or_else(|| {
                    PipelineError::schema(format!(
                        "record {row_num} field '{name}' is not a scalar: {raw}"
                    ))
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        let fields = names
            .iter()
            .enumerate()
            .map(|(c, name)| Field::new(name.clone(), DataType::infer(rows.iter().map(|r| &r[c]))))
            .collect();
        Self::from_rows(Schema::new(fields), rows, eval_id)
    }

    /// Shared read-only view of the underlying table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Deep copy of the underlying table. Changes to the copy never reach this evaluation.
    pub fn to_table(&self) -> Table {
        self.table.clone()
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn eval_id(&self) -> Option<i64> {
        self.eval_id
    }

    /// Copy of this evaluation carrying `eval_id`.
    pub fn with_eval_id(&self, eval_id: Option<i64>) -> Self {
        Self::new(self.table.clone(), eval_id)
    }

    /// A new evaluation over `table` that keeps this evaluation's id.
    pub(crate) fn derive(&self, table: Table) -> Self {
        Self::new(table, self.eval_id)
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.table.column_names().collect()
    }

    /// Run each processor in order, feeding every stage the output of the previous one.
    ///
    /// Stops at the first failing processor and returns its error; later processors are
    /// not run. An empty pipeline returns a copy of `self`.
    pub fn apply_pipeline(&self, pipeline: &[Box<dyn Processor>]) -> PipelineResult<Self> {
        pipeline
            .iter()
            .try_fold(self.clone(), |current, processor| processor.process(&current))
    }

    /// Concatenate evaluations row-wise.
    ///
    /// Columns are the union of all inputs in first-appearance order; cells missing from an
    /// input are `Null` and column types are unified. The result uses the positional index
    /// and carries no evaluation id.
    pub fn concat(evaluations: &[Evaluation]) -> Self {
        let mut fields: Vec<Field> = Vec::new();
        for eval in evaluations {
            for field in &eval.table.schema().fields {
                match fields.iter_mut().find(|f| f.name == field.name) {
                    Some(existing) => existing.data_type = existing.data_type.unify(field.data_type),
                    None => fields.push(field.clone()),
                }
            }
        }

        let mut rows = Vec::new();
        for eval in evaluations {
            let positions: Vec<Option<usize>> = fields
                .iter()
                .map(|f| eval.table.column_index(&f.name))
                .collect();
            for row in eval.table.rows() {
                rows.push(
                    positions
                        .iter()
                        .zip(&fields)
                        .map(|(p, field)| match p {
                            // Unified types only widen, so the cast cannot fail.
                            Some(p) => row[*p].cast(field.data_type).unwrap_or_else(|_| row[*p].clone()),
                            None => Value::Null,
                        })
                        .collect(),
                );
            }
        }

        Self::new(Table::from_parts(Schema::new(fields), rows, Vec::new()), None)
    }
}

impl Add for &Evaluation {
    type Output = Evaluation;

    fn add(self, other: &Evaluation) -> Evaluation {
        Evaluation::concat(&[self.clone(), other.clone()])
    }
}

impl Sum for Evaluation {
    fn sum<I: Iterator<Item = Evaluation>>(iter: I) -> Self {
        let all: Vec<Evaluation> = iter.collect();
        match all.len() {
            // A single evaluation keeps its id, like adding it to an empty start value.
            1 => all.into_iter().next().unwrap_or_default(),
            _ => Evaluation::concat(&all),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Evaluation;
    use crate::error::PipelineError;
    use crate::processing::{MinusOne, Processor, StandardizeTypes};
    use crate::types::{DataType, Field, Schema, Value};

    fn records(json: &str) -> Vec<serde_json::Map<String, serde_json::Value>> {
        serde_json::from_str(json).unwrap()
    }

    fn sample() -> Evaluation {
        Evaluation::from_records(&records(r#"[{"a": 1, "b": 2}, {"a": 3, "b": 4}]"#), Some(1000)).unwrap()
    }

    #[test]
    fn from_records_infers_types_and_keeps_key_order() {
        let eval = Evaluation::from_records(
            &records(r#"[{"z": "x", "a": 1, "f": 1.5}, {"z": "y", "a": 2, "f": 2}]"#),
            None,
        )
        .unwrap();
        assert_eq!(eval.column_names(), vec!["z", "a", "f"]);
        let types: Vec<DataType> = eval.table().schema().fields.iter().map(|f| f.data_type).collect();
        assert_eq!(types, vec![DataType::Utf8, DataType::Int64, DataType::Float64]);
    }

    #[test]
    fn from_records_rejects_non_rectangular_input() {
        let err = Evaluation::from_records(&records(r#"[{"a": 1}, {"b": 2}]"#), None).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));

        let err = Evaluation::from_records(&records(r#"[{"a": 1}, {"a": 2, "b": 2}]"#), None).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }

    #[test]
    fn to_table_returns_an_independent_copy() {
        let eval = sample();
        let copy = eval.to_table();
        let (schema, mut rows, _) = copy.into_parts();
        rows[0][0] = Value::Int64(5);
        assert_ne!(rows, eval.table().rows());
        assert_eq!(eval.table().rows()[0][0], Value::Int64(1));
        assert_eq!(schema, *eval.table().schema());
    }

    #[test]
    fn eval_id_is_kept() {
        assert_eq!(sample().eval_id(), Some(1000));
        assert_eq!(sample().with_eval_id(Some(0)).eval_id(), Some(0));
    }

    #[test]
    fn empty_pipeline_returns_equal_copy() {
        let eval = sample();
        assert_eq!(eval.apply_pipeline(&[]).unwrap(), eval);
    }

    #[test]
    fn pipeline_applies_processors_in_order() {
        let eval = sample();
        let pipeline: Vec<Box<dyn Processor>> = vec![
            Box::new(MinusOne::all_numeric()),
            Box::new(StandardizeTypes::new([("a", DataType::Float64)])),
            Box::new(MinusOne::all_numeric()),
        ];
        let out = eval.apply_pipeline(&pipeline).unwrap();
        assert_eq!(out.table().rows()[0], vec![Value::Float64(-1.0), Value::Int64(0)]);
        assert_eq!(out.eval_id(), Some(1000));
        // Source untouched.
        assert_eq!(eval.table().rows()[0], vec![Value::Int64(1), Value::Int64(2)]);
    }

    #[test]
    fn pipeline_stops_at_first_failure() {
        let eval = sample();
        let pipeline: Vec<Box<dyn Processor>> = vec![
            Box::new(StandardizeTypes::new([("missing", DataType::Float64)])),
            Box::new(MinusOne::all_numeric()),
        ];
        let err = eval.apply_pipeline(&pipeline).unwrap_err();
        assert!(matches!(err, PipelineError::Column { .. }));
    }

    #[test]
    fn pipeline_on_evaluation_matches_pipeline_on_extracted_table() {
        let eval = sample();
        let pipeline: Vec<Box<dyn Processor>> = vec![Box::new(MinusOne::all_numeric())];
        let direct = eval.apply_pipeline(&pipeline).unwrap();
        let rebuilt = Evaluation::new(eval.to_table(), eval.eval_id())
            .apply_pipeline(&pipeline)
            .unwrap();
        assert_eq!(direct, rebuilt);
    }

    #[test]
    fn add_and_sum_concatenate_rows() {
        let a = sample();
        let b = Evaluation::from_rows(
            Schema::new(vec![Field::new("a", DataType::Float64), Field::new("c", DataType::Utf8)]),
            vec![vec![Value::Float64(9.5), Value::from("x")]],
            Some(7),
        )
        .unwrap();

        let sum = &a + &b;
        assert_eq!(sum.row_count(), 3);
        assert_eq!(sum.column_names(), vec!["a", "b", "c"]);
        assert_eq!(sum.table().schema().fields[0].data_type, DataType::Float64);
        assert_eq!(sum.table().rows()[2], vec![Value::Float64(9.5), Value::Null, Value::from("x")]);
        assert_eq!(sum.eval_id(), None);

        let total: Evaluation = vec![a.clone(), b.clone(), a.clone()].into_iter().sum();
        assert_eq!(total.row_count(), 5);

        let single: Evaluation = vec![a.clone()].into_iter().sum();
        assert_eq!(single, a);
    }
}
