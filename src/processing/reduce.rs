//! Column reductions and the [`Aggregate`] processor built on them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::{DataType, Field, Schema, Table, Value};

use super::{into_strings, resolve_columns, Processor};

/// Built-in reduction operations over a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceOp {
    /// Count non-null values.
    Count,
    /// Sum numeric values, ignoring nulls.
    Sum,
    /// Arithmetic mean.
    Mean,
    /// Minimum numeric value, ignoring nulls.
    Min,
    /// Maximum numeric value, ignoring nulls.
    Max,
    /// Geometric mean; defined only for strictly positive values.
    Geomean,
}

/// A reduction applied to one column: a built-in op or a closure over the non-null values.
#[derive(Clone)]
pub enum Reduction {
    Op(ReduceOp),
    Custom {
        name: String,
        func: Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>,
    },
}

impl Reduction {
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    fn output_type(&self, input: DataType) -> DataType {
        match self {
            Self::Op(ReduceOp::Count) => DataType::Int64,
            Self::Op(ReduceOp::Sum | ReduceOp::Min | ReduceOp::Max) => input,
            Self::Op(ReduceOp::Mean | ReduceOp::Geomean) | Self::Custom { .. } => DataType::Float64,
        }
    }

    fn needs_numeric(&self) -> bool {
        !matches!(self, Self::Op(ReduceOp::Count))
    }
}

impl From<ReduceOp> for Reduction {
    fn from(op: ReduceOp) -> Self {
        Self::Op(op)
    }
}

impl fmt::Debug for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Op(op) => f.debug_tuple("Op").field(op).finish(),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish_non_exhaustive(),
        }
    }
}

/// Reduce one column of `table` using a built-in [`ReduceOp`].
///
/// - Fails with [`PipelineError::Column`] if `column` does not exist, or is not numeric for
///   anything but `Count`.
/// - Returns `Value::Null` if there are no non-null values (`Count` returns `0`).
/// - `Geomean` fails with [`PipelineError::Domain`] on any value `<= 0`.
pub fn reduce(table: &Table, column: &str, op: ReduceOp) -> PipelineResult<Value> {
    let reduction = Reduction::Op(op);
    let idx = if reduction.needs_numeric() {
        table.require_numeric(column)?
    } else {
        table.require_column(column)?
    };
    let rows: Vec<usize> = (0..table.row_count()).collect();
    reduce_rows(table, idx, &rows, &reduction)
}

fn reduce_rows(table: &Table, col: usize, rows: &[usize], reduction: &Reduction) -> PipelineResult<Value> {
    let field = &table.schema().fields[col];
    let cells: Vec<&Value> = rows
        .iter()
        .map(|&r| &table.rows()[r][col])
        .filter(|v| !v.is_null())
        .collect();

    let op = match reduction {
        Reduction::Op(ReduceOp::Count) => return Ok(Value::Int64(cells.len() as i64)),
        Reduction::Op(op) => *op,
        Reduction::Custom { func, .. } => {
            let values: Vec<f64> = cells.iter().filter_map(|v| v.as_f64()).collect();
            return Ok(if values.is_empty() {
                Value::Null
            } else {
                Value::Float64(func(&values))
            });
        }
    };
    if cells.is_empty() {
        return Ok(Value::Null);
    }

    if field.data_type == DataType::Int64 && matches!(op, ReduceOp::Sum | ReduceOp::Min | ReduceOp::Max) {
        let mut ints = cells.iter().filter_map(|v| match v {
            Value::Int64(i) => Some(*i),
            _ => None,
        });
        let reduced = match op {
            ReduceOp::Sum => ints.try_fold(0_i64, i64::checked_add).ok_or_else(|| PipelineError::Domain {
                column: field.name.clone(),
                message: "sum overflows int64".to_string(),
            })?,
            ReduceOp::Min => ints.min().unwrap_or_default(),
            _ => ints.max().unwrap_or_default(),
        };
        return Ok(Value::Int64(reduced));
    }

    let values: Vec<f64> = cells.iter().filter_map(|v| v.as_f64()).collect();
    let n = values.len() as f64;
    let reduced = match op {
        ReduceOp::Sum => values.iter().sum::<f64>(),
        ReduceOp::Mean => values.iter().sum::<f64>() / n,
        ReduceOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        ReduceOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ReduceOp::Geomean => {
            if let Some(bad) = values.iter().find(|v| **v <= 0.0) {
                return Err(PipelineError::Domain {
                    column: field.name.clone(),
                    message: format!("geometric mean needs strictly positive values, found {bad}"),
                });
            }
            (values.iter().map(|v| v.ln()).sum::<f64>() / n).exp()
        }
        ReduceOp::Count => n,
    };
    Ok(Value::Float64(reduced))
}

#[derive(Debug, Clone)]
enum Reductions {
    /// The same reduction over every numeric data column.
    All(Reduction),
    PerColumn(Vec<(String, Reduction)>),
}

/// Collapses groups of rows into one row each.
///
/// The output holds the grouping columns (which become the index) followed by the reduced
/// columns; every other column is dropped. Groups appear in ascending key order, and an
/// ungrouped aggregate yields exactly one row.
#[derive(Debug, Clone)]
pub struct Aggregate {
    reductions: Reductions,
    group_by: Vec<String>,
}

impl Aggregate {
    /// Apply `reduction` to every numeric column that is neither index nor grouping column.
    pub fn new(reduction: impl Into<Reduction>) -> Self {
        Self {
            reductions: Reductions::All(reduction.into()),
            group_by: Vec::new(),
        }
    }

    /// Apply a closure over each column's non-null values.
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::new(Reduction::custom(name, func))
    }

    /// Reduce only the named columns, each with its own reduction.
    pub fn per_column<I, S, R>(reductions: I) -> Self
    where
        I: IntoIterator<Item = (S, R)>,
        S: Into<String>,
        R: Into<Reduction>,
    {
        Self {
            reductions: Reductions::PerColumn(
                reductions.into_iter().map(|(c, r)| (c.into(), r.into())).collect(),
            ),
            group_by: Vec::new(),
        }
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = into_strings(columns);
        self
    }

    fn targets(&self, table: &Table, group_cols: &[usize]) -> PipelineResult<Vec<(usize, Reduction)>> {
        match &self.reductions {
            Reductions::All(reduction) => Ok(table
                .numeric_data_columns()
                .into_iter()
                .filter(|c| !group_cols.contains(c))
                .map(|c| (c, reduction.clone()))
                .collect()),
            Reductions::PerColumn(list) => {
                let mut targets: Vec<(usize, Reduction)> = Vec::with_capacity(list.len());
                for (name, reduction) in list {
                    let col = if reduction.needs_numeric() {
                        table.require_numeric(name)?
                    } else {
                        table.require_column(name)?
                    };
                    // Each output column is named after its source.
                    if group_cols.contains(&col) {
                        return Err(PipelineError::column(name, "is both a group and a reduction target"));
                    }
                    if targets.iter().any(|(c, _)| *c == col) {
                        return Err(PipelineError::column(name, "has more than one reduction"));
                    }
                    targets.push((col, reduction.clone()));
                }
                Ok(targets)
            }
        }
    }
}

impl Processor for Aggregate {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let table = input.table();
        let group_cols = resolve_columns(table, &self.group_by)?;
        if let Some((i, _)) = group_cols.iter().enumerate().find(|(i, c)| group_cols[..*i].contains(c)) {
            return Err(PipelineError::column(&self.group_by[i], "listed twice in group_by"));
        }
        let targets = self.targets(table, &group_cols)?;

        let groups: Vec<Vec<usize>> = if group_cols.is_empty() {
            vec![(0..table.row_count()).collect()]
        } else {
            table.group_rows(&group_cols).into_values().collect()
        };

        let fields = table.schema().fields.as_slice();
        let schema = Schema::new(
            group_cols
                .iter()
                .map(|&c| fields[c].clone())
                .chain(
                    targets
                        .iter()
                        .map(|(c, r)| Field::new(fields[*c].name.clone(), r.output_type(fields[*c].data_type))),
                )
                .collect(),
        );

        let mut rows = Vec::with_capacity(groups.len());
        for members in &groups {
            let mut row: Vec<Value> = group_cols
                .iter()
                .map(|&c| table.rows()[members[0]][c].clone())
                .collect();
            for (col, reduction) in &targets {
                row.push(reduce_rows(table, *col, members, reduction)?);
            }
            rows.push(row);
        }

        Ok(input.derive(Table::from_parts(schema, rows, self.group_by.clone())))
    }
}

/// An [`Aggregate`] computing the geometric mean of every numeric metric.
#[derive(Debug, Clone)]
pub struct GeomeanAggregate {
    inner: Aggregate,
}

impl GeomeanAggregate {
    pub fn new() -> Self {
        Self {
            inner: Aggregate::new(ReduceOp::Geomean),
        }
    }

    pub fn group_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: self.inner.group_by(columns),
        }
    }
}

impl Default for GeomeanAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for GeomeanAggregate {
    fn name(&self) -> &'static str {
        "geomean_aggregate"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        self.inner.process(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_table_with_nulls() -> Table {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("score", DataType::Float64),
        ]);
        let rows = vec![
            vec![Value::Int64(1), Value::Float64(10.0)],
            vec![Value::Int64(2), Value::Null],
            vec![Value::Int64(3), Value::Float64(5.5)],
        ];
        Table::new(schema, rows).unwrap()
    }

    fn runs() -> Evaluation {
        let records: Vec<_> = serde_json::from_str(
            r#"[
                {"toolchain": "vpr", "project": "a", "freq": 2.0, "lut": 3},
                {"toolchain": "vpr", "project": "b", "freq": 8.0, "lut": 5},
                {"toolchain": "nextpnr", "project": "a", "freq": 1.0, "lut": null}
            ]"#,
        )
        .unwrap();
        Evaluation::from_records(&records, Some(4)).unwrap()
    }

    fn assert_float(value: &Value, expected: f64) {
        let actual = value.as_f64().unwrap();
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn reduce_count_skips_nulls() {
        let t = numeric_table_with_nulls();
        assert_eq!(reduce(&t, "score", ReduceOp::Count).unwrap(), Value::Int64(2));
        assert_eq!(reduce(&t, "id", ReduceOp::Count).unwrap(), Value::Int64(3));
    }

    #[test]
    fn reduce_sum_ignores_nulls_and_preserves_type() {
        let t = numeric_table_with_nulls();
        assert_eq!(reduce(&t, "score", ReduceOp::Sum).unwrap(), Value::Float64(15.5));
        assert_eq!(reduce(&t, "id", ReduceOp::Sum).unwrap(), Value::Int64(6));
        assert_eq!(reduce(&t, "id", ReduceOp::Mean).unwrap(), Value::Float64(2.0));
    }

    #[test]
    fn reduce_min_max_ignore_nulls() {
        let t = numeric_table_with_nulls();
        assert_eq!(reduce(&t, "score", ReduceOp::Min).unwrap(), Value::Float64(5.5));
        assert_eq!(reduce(&t, "score", ReduceOp::Max).unwrap(), Value::Float64(10.0));
        assert_eq!(reduce(&t, "id", ReduceOp::Min).unwrap(), Value::Int64(1));
        assert_eq!(reduce(&t, "id", ReduceOp::Max).unwrap(), Value::Int64(3));
    }

    #[test]
    fn reduce_rejects_missing_column() {
        let t = numeric_table_with_nulls();
        assert!(matches!(reduce(&t, "missing", ReduceOp::Count), Err(PipelineError::Column { .. })));
        assert!(matches!(reduce(&t, "missing", ReduceOp::Sum), Err(PipelineError::Column { .. })));
    }

    #[test]
    fn reduce_returns_null_if_all_values_null() {
        let schema = Schema::new(vec![Field::new("score", DataType::Float64)]);
        let t = Table::new(schema, vec![vec![Value::Null], vec![Value::Null]]).unwrap();
        for op in [ReduceOp::Sum, ReduceOp::Min, ReduceOp::Max, ReduceOp::Geomean] {
            assert_eq!(reduce(&t, "score", op).unwrap(), Value::Null);
        }
    }

    #[test]
    fn geomean_aggregate_reduces_every_numeric_column() {
        let out = GeomeanAggregate::new().process(&runs()).unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.column_names(), vec!["freq", "lut"]);
        assert_float(&out.table().rows()[0][0], 16.0_f64.cbrt());
        assert_float(&out.table().rows()[0][1], 15.0_f64.sqrt());
        assert_eq!(out.eval_id(), Some(4));
    }

    #[test]
    fn geomean_rejects_non_positive_values() {
        let schema = Schema::new(vec![Field::new("freq", DataType::Float64)]);
        for bad in [0.0, -3.0] {
            let eval = Evaluation::from_rows(
                schema.clone(),
                vec![vec![Value::Float64(2.0)], vec![Value::Float64(bad)]],
                None,
            )
            .unwrap();
            let err = GeomeanAggregate::new().process(&eval).unwrap_err();
            assert!(matches!(err, PipelineError::Domain { ref column, .. } if column == "freq"));
        }
    }

    #[test]
    fn grouped_aggregate_indexes_by_group_in_key_order() {
        let out = GeomeanAggregate::new().group_by(["toolchain"]).process(&runs()).unwrap();
        assert_eq!(out.table().index(), ["toolchain".to_string()]);
        let rows = out.table().rows();
        assert_eq!(rows[0][0], Value::from("nextpnr"));
        assert_eq!(rows[0][2], Value::Null);
        assert_eq!(rows[1][0], Value::from("vpr"));
        assert_float(&rows[1][1], 4.0);
    }

    #[test]
    fn per_column_and_custom_reductions() {
        let out = Aggregate::per_column([("lut", ReduceOp::Sum), ("project", ReduceOp::Count)])
            .group_by(["toolchain"])
            .process(&runs())
            .unwrap();
        assert_eq!(out.column_names(), vec!["toolchain", "lut", "project"]);
        assert_eq!(out.table().rows()[1], vec![Value::from("vpr"), Value::Int64(8), Value::Int64(2)]);

        let range = Aggregate::custom("range", |v| {
            let max = v.iter().copied().fold(f64::MIN, f64::max);
            let min = v.iter().copied().fold(f64::MAX, f64::min);
            max - min
        });
        let out = range.process(&runs()).unwrap();
        assert_eq!(out.table().rows()[0], vec![Value::Float64(7.0), Value::Float64(2.0)]);
    }

    #[test]
    fn non_numeric_reduction_target_is_rejected() {
        let err = Aggregate::per_column([("project", ReduceOp::Mean)]).process(&runs()).unwrap_err();
        assert!(matches!(err, PipelineError::Column { .. }));
    }

    #[test]
    fn output_columns_must_not_collide() {
        let repeated = Aggregate::per_column([("lut", ReduceOp::Sum), ("lut", ReduceOp::Max)])
            .group_by(["toolchain"])
            .process(&runs())
            .unwrap_err();
        assert!(matches!(repeated, PipelineError::Column { ref column, .. } if column == "lut"));

        let grouped = Aggregate::per_column([("toolchain", ReduceOp::Count)])
            .group_by(["toolchain"])
            .process(&runs())
            .unwrap_err();
        assert!(matches!(grouped, PipelineError::Column { ref column, .. } if column == "toolchain"));

        let twice = Aggregate::new(ReduceOp::Sum)
            .group_by(["toolchain", "toolchain"])
            .process(&runs())
            .unwrap_err();
        assert!(matches!(twice, PipelineError::Column { ref column, .. } if column == "toolchain"));
    }
}
