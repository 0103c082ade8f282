//! Processors comparing one evaluation against others.

use std::collections::BTreeMap;

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::{DataType, Direction, Field, RowKey, Schema, Table, Value};

use super::normalize::{normalize_around, Baseline};
use super::{into_strings, resolve_columns, Processor};

/// Relative difference `(b - a) / a` of the processed evaluation `b` against a reference
/// evaluation `a`, matched row by row on the index key.
///
/// The output keeps the index columns and one `Float64` column per compared metric; every
/// other column is dropped. Both tables must share the index definition and key set.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeDiff {
    reference: Evaluation,
    columns: Option<Vec<String>>,
}

impl RelativeDiff {
    pub fn new(reference: Evaluation) -> Self {
        Self {
            reference,
            columns: None,
        }
    }

    /// Compare only these columns instead of every shared numeric column.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(into_strings(columns));
        self
    }

    fn compared_columns(&self, a: &Table, b: &Table) -> PipelineResult<Vec<(usize, usize)>> {
        match &self.columns {
            Some(names) => names
                .iter()
                .map(|n| Ok((b.require_numeric(n)?, a.require_numeric(n)?)))
                .collect(),
            None => Ok(b
                .numeric_data_columns()
                .into_iter()
                .filter_map(|bc| {
                    let name = &b.schema().fields[bc].name;
                    a.require_numeric(name).ok().map(|ac| (bc, ac))
                })
                .collect()),
        }
    }
}

impl Processor for RelativeDiff {
    fn name(&self) -> &'static str {
        "relative_diff"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let (a, b) = (self.reference.table(), input.table());
        if a.index() != b.index() {
            return Err(PipelineError::alignment(format!(
                "index {:?} does not match reference index {:?}",
                b.index(),
                a.index()
            )));
        }
        let reference_rows: BTreeMap<RowKey, usize> =
            (0..a.row_count()).map(|r| (a.index_key(r), r)).collect();
        if reference_rows.len() != b.row_count() {
            return Err(PipelineError::alignment(format!(
                "{} rows cannot be matched against {} reference rows",
                b.row_count(),
                a.row_count()
            )));
        }

        let columns = self.compared_columns(a, b)?;
        let index_cols = resolve_columns(b, b.index())?;

        let mut fields: Vec<Field> = index_cols.iter().map(|&c| b.schema().fields[c].clone()).collect();
        fields.extend(
            columns
                .iter()
                .map(|&(bc, _)| Field::new(b.schema().fields[bc].name.clone(), DataType::Float64)),
        );

        let mut rows = Vec::with_capacity(b.row_count());
        for (r, row) in b.rows().iter().enumerate() {
            let key = b.index_key(r);
            let &ar = reference_rows.get(&key).ok_or_else(|| {
                let shown: Vec<&Value> = key.iter().map(|k| &k.0).collect();
                PipelineError::alignment(format!("index key {shown:?} is missing from the reference"))
            })?;
            let mut out: Vec<Value> = index_cols.iter().map(|&c| row[c].clone()).collect();
            for &(bc, ac) in &columns {
                out.push(match (row[bc].as_f64(), a.rows()[ar][ac].as_f64()) {
                    (Some(y), Some(x)) => Value::Float64((y - x) / x),
                    _ => Value::Null,
                });
            }
            rows.push(out);
        }

        Ok(input.derive(Table::from_parts(Schema::new(fields), rows, b.index().to_vec())))
    }
}

/// Compares several evaluations against the first one.
///
/// [`CompareToFirst::combined`] stacks the evaluations into a single table with a label
/// column holding each row's position in the list. Processing that combined table rescales
/// every tagged metric around the first evaluation's row with the same original index key,
/// which makes it a natural last step of a style pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareToFirst {
    evaluations: Vec<Evaluation>,
    directions: Vec<(String, Direction)>,
    index: Vec<String>,
    label_column: String,
    unit_range: bool,
}

impl CompareToFirst {
    /// Fails with [`PipelineError::Alignment`] if `evaluations` is empty or the evaluations
    /// do not all share the same non-positional index.
    pub fn new<I, S>(evaluations: Vec<Evaluation>, directions: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = (S, Direction)>,
        S: Into<String>,
    {
        let first = evaluations
            .first()
            .ok_or_else(|| PipelineError::alignment("at least one evaluation is required"))?;
        let index = first.table().index().to_vec();
        if index.is_empty() {
            return Err(PipelineError::alignment("evaluations must be reindexed before comparing"));
        }
        if let Some((pos, other)) = evaluations
            .iter()
            .enumerate()
            .find(|(_, e)| e.table().index() != index.as_slice())
        {
            return Err(PipelineError::alignment(format!(
                "evaluation {pos} is indexed by {:?}, expected {index:?}",
                other.table().index()
            )));
        }
        Ok(Self {
            evaluations,
            directions: directions.into_iter().map(|(c, d)| (c.into(), d)).collect(),
            index,
            label_column: "evaluation".to_string(),
            unit_range: false,
        })
    }

    pub fn label_column(mut self, name: impl Into<String>) -> Self {
        self.label_column = name.into();
        self
    }

    /// Shift the output to `[0, 1]` with the first evaluation at `0.5`.
    pub fn unit_range(mut self) -> Self {
        self.unit_range = true;
        self
    }

    /// All evaluations stacked row-wise, indexed by the original index plus the label column.
    pub fn combined(&self) -> PipelineResult<Evaluation> {
        let mut labelled = Vec::with_capacity(self.evaluations.len());
        for (pos, eval) in self.evaluations.iter().enumerate() {
            let table = eval.table();
            if table.column_index(&self.label_column).is_some() {
                return Err(PipelineError::column(&self.label_column, "already exists"));
            }
            let field = Field::new(self.label_column.clone(), DataType::Int64);
            let labels = vec![Value::Int64(pos as i64); table.row_count()];
            labelled.push(eval.derive(table.with_appended_columns(vec![(field, labels)])));
        }
        let mut index = self.index.clone();
        index.push(self.label_column.clone());
        let table = Evaluation::concat(&labelled).into_table().with_index(index.as_slice())?;
        Ok(Evaluation::new(table, None))
    }
}

impl Processor for CompareToFirst {
    fn name(&self) -> &'static str {
        "compare_to_first"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let table = input.table();
        let label = table.require_column(&self.label_column)?;
        let expected: Vec<&str> = self
            .index
            .iter()
            .chain(std::iter::once(&self.label_column))
            .map(String::as_str)
            .collect();
        if !table.index().iter().map(String::as_str).eq(expected.iter().copied()) {
            return Err(PipelineError::alignment(format!(
                "index {:?} does not match {expected:?}",
                table.index()
            )));
        }

        let group_cols = resolve_columns(table, &self.index)?;
        let groups: Vec<Vec<usize>> = table.group_rows(&group_cols).into_values().collect();
        let first = Value::Int64(0);
        let baseline = Baseline {
            column: label,
            value: &first,
        };
        let out = normalize_around(table, &self.directions, &groups, &baseline, self.unit_range)?;
        Ok(input.derive(out))
    }
}
