//! Row index assignment and ordering.

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;

use super::{check_key_columns, into_strings, sorted_positions, Processor, SortKey, SortOrder};

/// Makes the named columns the table's composite row index.
///
/// Index columns move to the front of the table, which groups related results when the
/// table is displayed. The combined key must be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reindex {
    columns: Vec<String>,
}

impl Reindex {
    /// Fails with [`PipelineError::Schema`] if `columns` is empty or repeats a column.
    pub fn new<I, S>(columns: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = into_strings(columns);
        check_key_columns(&columns, "index")?;
        Ok(Self { columns })
    }
}

impl Processor for Reindex {
    fn name(&self) -> &'static str {
        "reindex"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        Ok(input.derive(input.table().with_index(self.columns.as_slice())?))
    }
}

/// Orders rows by index columns.
///
/// Rows are sorted by the given index columns first and then by the remaining index
/// columns in ascending order. The sort is stable and leaves columns and index untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortIndex {
    keys: Vec<SortKey>,
}

impl SortIndex {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<SortKey>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Sort by every index column, outermost first.
    pub fn all() -> Self {
        Self::default()
    }
}

impl Processor for SortIndex {
    fn name(&self) -> &'static str {
        "sort_index"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let table = input.table();
        let mut keys = Vec::with_capacity(table.index().len());
        for key in &self.keys {
            if !table.is_index_column(&key.column) {
                return Err(PipelineError::column(&key.column, "is not an index column"));
            }
            keys.push((table.require_column(&key.column)?, key.order));
        }
        for name in table.index() {
            if !self.keys.iter().any(|k| &k.column == name) {
                keys.push((table.require_column(name)?, SortOrder::Ascending));
            }
        }

        let order = sorted_positions(table, &keys);
        Ok(input.derive(table.select_rows(&order)))
    }
}
