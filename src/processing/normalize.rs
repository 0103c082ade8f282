//! Numeric rescaling processors.

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::{DataType, Direction, Field, Table, Value};

use super::{into_strings, resolve_columns, Processor};

fn into_directions<I, S>(directions: I) -> Vec<(String, Direction)>
where
    I: IntoIterator<Item = (S, Direction)>,
    S: Into<String>,
{
    directions.into_iter().map(|(c, d)| (c.into(), d)).collect()
}

/// Row groups of `table` by `group_by`; a single group holding every row when empty.
/// Groups are never empty, so an empty table has no groups.
fn row_groups(table: &Table, group_by: &[String]) -> PipelineResult<Vec<Vec<usize>>> {
    if group_by.is_empty() {
        if table.row_count() == 0 {
            return Ok(Vec::new());
        }
        return Ok(vec![(0..table.row_count()).collect()]);
    }
    let cols = resolve_columns(table, group_by)?;
    Ok(table.group_rows(&cols).into_values().collect())
}

/// Numeric value of a cell; NaN and infinities count as missing.
fn finite(v: &Value) -> Option<f64> {
    v.as_f64().filter(|x| x.is_finite())
}

/// Min/max over the finite numeric values of column `col` in `rows`.
fn finite_range(table: &Table, rows: &[usize], col: usize) -> Option<(f64, f64)> {
    rows.iter()
        .filter_map(|&r| finite(&table.rows()[r][col]))
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Divides every value of a numeric column by its group maximum (or minimum) and appends
/// the ratio as a new `Float64` column.
///
/// With [`Direction::Maximize`] the best row of each group gets `1.0`; with
/// [`Direction::Minimize`] values are divided by the group minimum instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddNormalizedColumn {
    group_by: Vec<String>,
    input: String,
    output: String,
    direction: Direction,
}

impl AddNormalizedColumn {
    pub fn new<I, S>(group_by: I, input: impl Into<String>, output: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_by: into_strings(group_by),
            input: input.into(),
            output: output.into(),
            direction: Direction::Maximize,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

impl Processor for AddNormalizedColumn {
    fn name(&self) -> &'static str {
        "add_normalized_column"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let table = input.table();
        let src = table.require_numeric(&self.input)?;
        if table.column_index(&self.output).is_some() {
            return Err(PipelineError::column(&self.output, "already exists"));
        }

        let mut values = vec![Value::Null; table.row_count()];
        for rows in row_groups(table, &self.group_by)? {
            let Some((lo, hi)) = finite_range(table, &rows, src) else {
                continue;
            };
            let divisor = match self.direction {
                Direction::Maximize => hi,
                Direction::Minimize => lo,
            };
            for r in rows {
                if let Some(x) = finite(&table.rows()[r][src]) {
                    values[r] = Value::Float64(x / divisor);
                }
            }
        }

        let field = Field::new(self.output.clone(), DataType::Float64);
        Ok(input.derive(table.with_appended_columns(vec![(field, values)])))
    }
}

/// Min-max rescales tagged columns to `[0, 1]`, where 1 is always the best value.
///
/// [`Direction::Minimize`] columns are inverted. A group whose values are all equal maps
/// to `0.0`. Without `group_by` the whole table is one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalize {
    directions: Vec<(String, Direction)>,
    group_by: Vec<String>,
}

impl Normalize {
    pub fn new<I, S>(directions: I) -> Self
    where
        I: IntoIterator<Item = (S, Direction)>,
        S: Into<String>,
    {
        Self {
            directions: into_directions(directions),
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
}

impl Processor for Normalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let mut table = input.to_table();
        let groups = row_groups(&table, &self.group_by)?;
        for (column, direction) in &self.directions {
            let col = table.require_numeric(column)?;
            let mut values = vec![Value::Null; table.row_count()];
            for rows in &groups {
                let spread = finite_range(&table, rows, col).filter(|(lo, hi)| hi > lo);
                for &r in rows {
                    let Some(x) = finite(&table.rows()[r][col]) else {
                        continue;
                    };
                    let scaled = match (spread, direction) {
                        (None, _) => 0.0,
                        (Some((lo, hi)), Direction::Maximize) => (x - lo) / (hi - lo),
                        (Some((lo, hi)), Direction::Minimize) => (hi - x) / (hi - lo),
                    };
                    values[r] = Value::Float64(scaled);
                }
            }
            table = table.with_column_values(col, DataType::Float64, values)?;
        }
        Ok(input.derive(table))
    }
}

/// Rescales tagged columns around a baseline row of each group.
///
/// Each value becomes `sign * (x - base) / max|x - base|`, so the baseline is `0`, better
/// rows are positive and worse rows negative. With [`NormalizeAround::unit_range`] the
/// result is shifted to `[0, 1]` with the baseline at `0.5`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeAround {
    directions: Vec<(String, Direction)>,
    group_by: Vec<String>,
    baseline_column: String,
    baseline_value: Value,
    unit_range: bool,
}

impl NormalizeAround {
    pub fn new<I, S, G, T>(
        directions: I,
        group_by: G,
        baseline_column: impl Into<String>,
        baseline_value: impl Into<Value>,
    ) -> Self
    where
        I: IntoIterator<Item = (S, Direction)>,
        S: Into<String>,
        G: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            directions: into_directions(directions),
            group_by: into_strings(group_by),
            baseline_column: baseline_column.into(),
            baseline_value: baseline_value.into(),
            unit_range: false,
        }
    }

    pub fn unit_range(mut self) -> Self {
        self.unit_range = true;
        self
    }
}

impl Processor for NormalizeAround {
    fn name(&self) -> &'static str {
        "normalize_around"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let table = input.table();
        let groups = row_groups(table, &self.group_by)?;
        let baseline = Baseline {
            column: table.require_column(&self.baseline_column)?,
            value: &self.baseline_value,
        };
        let out = normalize_around(table, &self.directions, &groups, &baseline, self.unit_range)?;
        Ok(input.derive(out))
    }
}

/// Identifies the baseline row of a group: the first row whose `column` equals `value`.
pub(crate) struct Baseline<'a> {
    pub(crate) column: usize,
    pub(crate) value: &'a Value,
}

pub(crate) fn normalize_around(
    table: &Table,
    directions: &[(String, Direction)],
    groups: &[Vec<usize>],
    baseline: &Baseline<'_>,
    unit_range: bool,
) -> PipelineResult<Table> {
    let groups: Vec<&Vec<usize>> = groups.iter().filter(|rows| !rows.is_empty()).collect();
    let mut bases = Vec::with_capacity(groups.len());
    for rows in &groups {
        let base_row = rows
            .iter()
            .copied()
            .find(|&r| {
                table.rows()[r][baseline.column].total_cmp(baseline.value) == std::cmp::Ordering::Equal
            })
            .ok_or_else(|| {
                let key: Vec<String> = table.index_key(rows[0]).iter().map(|k| k.0.to_string()).collect();
                PipelineError::lookup(format!(
                    "no row with {} = {} in the group of index key {key:?}",
                    table.schema().fields[baseline.column].name,
                    baseline.value
                ))
            })?;
        bases.push(base_row);
    }

    let mut out = table.clone();
    for (column, direction) in directions {
        let col = out.require_numeric(column)?;
        let mut values = vec![Value::Null; out.row_count()];
        for (rows, &base_row) in groups.iter().zip(&bases) {
            let Some(base) = finite(&out.rows()[base_row][col]) else {
                continue;
            };
            let max_dev = rows
                .iter()
                .filter_map(|&r| finite(&out.rows()[r][col]))
                .map(|x| (x - base).abs())
                .fold(0.0_f64, f64::max);
            for &r in rows.iter() {
                let Some(x) = finite(&out.rows()[r][col]) else {
                    continue;
                };
                let d = if max_dev > 0.0 {
                    direction.sign() * (x - base) / max_dev
                } else {
                    0.0
                };
                values[r] = Value::Float64(if unit_range { d / 2.0 + 0.5 } else { d });
            }
        }
        out = out.with_column_values(col, DataType::Float64, values)?;
    }
    Ok(out)
}

/// Subtracts one from every cell of the named numeric columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinusOne {
    columns: Option<Vec<String>>,
}

impl MinusOne {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(into_strings(columns)),
        }
    }

    /// Target every numeric non-index column.
    pub fn all_numeric() -> Self {
        Self { columns: None }
    }
}

impl Processor for MinusOne {
    fn name(&self) -> &'static str {
        "minus_one"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let mut table = input.to_table();
        let targets = match &self.columns {
            Some(names) => names
                .iter()
                .map(|n| table.require_numeric(n))
                .collect::<PipelineResult<Vec<_>>>()?,
            None => table.numeric_data_columns(),
        };
        for col in targets {
            let data_type = table.schema().fields[col].data_type;
            let values = table
                .rows()
                .iter()
                .map(|row| match &row[col] {
                    Value::Int64(v) => Value::Int64(v.saturating_sub(1)),
                    Value::Float64(v) => Value::Float64(v - 1.0),
                    other => other.clone(),
                })
                .collect();
            table = table.with_column_values(col, data_type, values)?;
        }
        Ok(input.derive(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{FilterByIndex, Reindex};

    fn results() -> Evaluation {
        let records: Vec<_> = serde_json::from_str(
            r#"[
                {"project": "A", "toolchain": "vpr", "freq": 120.0, "lut": 10},
                {"project": "A", "toolchain": "vivado", "freq": 90.0, "lut": 20},
                {"project": "B", "toolchain": "vpr", "freq": 50.0, "lut": 5},
                {"project": "B", "toolchain": "vivado", "freq": 100.0, "lut": null}
            ]"#,
        )
        .unwrap();
        Evaluation::from_records(&records, Some(9)).unwrap()
    }

    fn floats(eval: &Evaluation, column: &str) -> Vec<Option<f64>> {
        eval.table().column(column).unwrap().map(Value::as_f64).collect()
    }

    fn assert_close(actual: Vec<Option<f64>>, expected: Vec<Option<f64>>) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(&expected) {
            match (a, e) {
                (Some(a), Some(e)) => assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}"),
                _ => assert_eq!(a, e),
            }
        }
    }

    #[test]
    fn add_normalized_column_divides_by_group_max() {
        let out = AddNormalizedColumn::new(["project"], "freq", "norm")
            .process(&results())
            .unwrap();
        assert_eq!(out.column_names().last(), Some(&"norm"));
        assert_eq!(floats(&out, "norm"), vec![Some(1.0), Some(0.75), Some(0.5), Some(1.0)]);
        assert_eq!(out.eval_id(), Some(9));
    }

    #[test]
    fn add_normalized_column_minimize_divides_by_group_min() {
        let out = AddNormalizedColumn::new(["project"], "lut", "norm")
            .direction(Direction::Minimize)
            .process(&results())
            .unwrap();
        assert_eq!(floats(&out, "norm"), vec![Some(1.0), Some(2.0), Some(1.0), None]);
    }

    #[test]
    fn add_normalized_column_validates_columns() {
        let err = AddNormalizedColumn::new(["project"], "toolchain", "norm")
            .process(&results())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Column { .. }));
        let err = AddNormalizedColumn::new(["project"], "freq", "lut")
            .process(&results())
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn normalize_rescales_and_inverts_minimized_columns() {
        let out = Normalize::new([("freq", Direction::Maximize), ("lut", Direction::Minimize)])
            .process(&results())
            .unwrap();
        assert_close(floats(&out, "freq"), vec![Some(1.0), Some(40.0 / 70.0), Some(0.0), Some(50.0 / 70.0)]);
        assert_close(floats(&out, "lut"), vec![Some(2.0 / 3.0), Some(0.0), Some(1.0), None]);
        assert_eq!(out.table().schema().fields[3].data_type, DataType::Float64);
    }

    #[test]
    fn normalize_constant_group_maps_to_zero() {
        let out = Normalize::new([("lut", Direction::Minimize)])
            .group_by(["project"])
            .process(&results())
            .unwrap();
        assert_eq!(floats(&out, "lut"), vec![Some(1.0), Some(0.0), Some(0.0), None]);
    }

    #[test]
    fn normalize_around_maps_baseline_to_zero() {
        let eval = Reindex::new(["project", "toolchain"]).unwrap().process(&results()).unwrap();
        let out = NormalizeAround::new(
            [("freq", Direction::Maximize), ("lut", Direction::Minimize)],
            ["project"],
            "toolchain",
            "vivado",
        )
        .process(&eval)
        .unwrap();
        assert_eq!(floats(&out, "freq"), vec![Some(1.0), Some(0.0), Some(-1.0), Some(0.0)]);
        assert_eq!(floats(&out, "lut"), vec![Some(1.0), Some(0.0), None, None]);
    }

    #[test]
    fn normalize_around_unit_range_centers_on_half() {
        let out = NormalizeAround::new([("freq", Direction::Maximize)], ["project"], "toolchain", "vivado")
            .unit_range()
            .process(&results())
            .unwrap();
        assert_eq!(floats(&out, "freq"), vec![Some(1.0), Some(0.5), Some(0.0), Some(0.5)]);
    }

    #[test]
    fn normalize_around_requires_a_baseline_in_every_group() {
        let err = NormalizeAround::new([("freq", Direction::Maximize)], ["project"], "toolchain", "yosys")
            .process(&results())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Lookup { .. }));
    }

    #[test]
    fn minus_one_preserves_types() {
        let out = MinusOne::new(["lut"]).process(&results()).unwrap();
        let luts: Vec<Value> = out.table().column("lut").unwrap().cloned().collect();
        assert_eq!(luts, vec![Value::Int64(9), Value::Int64(19), Value::Int64(4), Value::Null]);

        let out = MinusOne::all_numeric().process(&results()).unwrap();
        assert_eq!(floats(&out, "freq")[0], Some(119.0));
        assert_eq!(out.table().schema(), results().table().schema());
    }

    #[test]
    fn normalize_around_on_an_empty_table_yields_an_empty_table() {
        let indexed = Reindex::new(["toolchain", "project"]).unwrap().process(&results()).unwrap();
        let empty = FilterByIndex::equals("toolchain", "none").process(&indexed).unwrap();
        assert_eq!(empty.row_count(), 0);

        let ungrouped = NormalizeAround::new([("freq", Direction::Maximize)], Vec::<String>::new(), "toolchain", "vpr");
        let out = ungrouped.process(&empty).unwrap();
        assert_eq!(out.row_count(), 0);
        assert_eq!(out.table().schema().fields[2].data_type, DataType::Float64);

        let out = Normalize::new([("freq", Direction::Maximize)]).process(&empty).unwrap();
        assert_eq!(out.row_count(), 0);
    }

    #[test]
    fn non_finite_values_are_treated_as_missing() {
        let eval = Evaluation::from_rows(
            crate::types::Schema::new(vec![Field::new("freq", DataType::Float64)]),
            vec![
                vec![Value::Float64(10.0)],
                vec![Value::Float64(f64::NAN)],
                vec![Value::Float64(20.0)],
            ],
            None,
        )
        .unwrap();
        let out = Normalize::new([("freq", Direction::Maximize)]).process(&eval).unwrap();
        assert_eq!(floats(&out, "freq"), vec![Some(0.0), None, Some(1.0)]);

        let out = AddNormalizedColumn::new(Vec::<String>::new(), "freq", "norm").process(&eval).unwrap();
        assert_eq!(floats(&out, "norm"), vec![Some(0.5), None, Some(1.0)]);
    }

    #[test]
    fn rescaling_an_index_column_cannot_repeat_keys() {
        let eval = Evaluation::from_rows(
            crate::types::Schema::new(vec![
                Field::new("g", DataType::Utf8),
                Field::new("k", DataType::Int64),
            ]),
            vec![
                vec![Value::Utf8("A".into()), Value::Int64(10)],
                vec![Value::Utf8("A".into()), Value::Int64(20)],
                vec![Value::Utf8("B".into()), Value::Int64(30)],
                vec![Value::Utf8("B".into()), Value::Int64(40)],
            ],
            None,
        )
        .unwrap();
        let indexed = Reindex::new(["k"]).unwrap().process(&eval).unwrap();
        // Both groups rescale onto 0.0 and 1.0.
        let err = Normalize::new([("k", Direction::Maximize)])
            .group_by(["g"])
            .process(&indexed)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }
}
