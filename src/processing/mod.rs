//! Table processors.
//!
//! A [`Processor`] takes an [`Evaluation`] and returns a new one; it never mutates its input.
//! Processors are configured at construction and hold no state between calls, so the same
//! instance can run in any number of pipelines.
//!
//! Structural processors:
//!
//! - [`StandardizeTypes`]: cast columns to declared types
//! - [`CleanDuplicates`]: keep one row per duplicate key
//! - [`ExpandColumn`]: map one column onto two new columns
//! - [`Reindex`], [`SortIndex`], [`FilterByIndex`]: set, order and filter by the row index
//!
//! Numeric processors:
//!
//! - [`AddNormalizedColumn`], [`Normalize`], [`NormalizeAround`], [`MinusOne`]
//! - [`RelativeDiff`], [`CompareToFirst`]: compare against other evaluations
//! - [`Aggregate`], [`GeomeanAggregate`]: reduce groups of rows
//!
//! ## Example: deduplicate → normalize
//!
//! ```rust
//! use perf_pipeline::evaluation::Evaluation;
//! use perf_pipeline::processing::{AddNormalizedColumn, CleanDuplicates, Keep, Processor};
//!
//! let records: Vec<_> = serde_json::from_str(r#"[
//!     {"project": "A", "toolchain": "vpr", "freq": 100.0},
//!     {"project": "A", "toolchain": "vpr", "freq": 120.0},
//!     {"project": "A", "toolchain": "vivado", "freq": 90.0}
//! ]"#).unwrap();
//! let eval = Evaluation::from_records(&records, Some(1)).unwrap();
//!
//! let pipeline: Vec<Box<dyn Processor>> = vec![
//!     Box::new(CleanDuplicates::new(["project", "toolchain"]).unwrap().sort_by(["freq"]).keep(Keep::Last)),
//!     Box::new(AddNormalizedColumn::new(["project"], "freq", "normalized_max_freq")),
//! ];
//! let out = eval.apply_pipeline(&pipeline).unwrap();
//! assert_eq!(out.row_count(), 2);
//! ```

use std::cmp::Ordering;

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::{Table, Value};

pub mod compare;
pub mod duplicates;
pub mod expand;
pub mod filter;
pub mod index;
pub mod normalize;
pub mod reduce;
pub mod standardize;

pub use compare::{CompareToFirst, RelativeDiff};
pub use duplicates::{CleanDuplicates, Keep, SortKey, SortOrder};
pub use expand::ExpandColumn;
pub use filter::{FilterByIndex, IndexPredicate};
pub use index::{Reindex, SortIndex};
pub use normalize::{AddNormalizedColumn, MinusOne, Normalize, NormalizeAround};
pub use reduce::{reduce, Aggregate, GeomeanAggregate, ReduceOp, Reduction};
pub use standardize::StandardizeTypes;

/// A configured, stateless table-to-table transformation.
pub trait Processor {
    /// Short stable name used in observer callbacks and error reports.
    fn name(&self) -> &'static str;

    /// Produce a new evaluation from `input`.
    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation>;
}

/// Resolve column names to positions, failing on the first unknown column.
pub(crate) fn resolve_columns(table: &Table, names: &[String]) -> PipelineResult<Vec<usize>> {
    names.iter().map(|n| table.require_column(n)).collect()
}

pub(crate) fn into_strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Rejects an empty column list or one that names a column twice.
pub(crate) fn check_key_columns(columns: &[String], what: &str) -> PipelineResult<()> {
    if columns.is_empty() {
        return Err(PipelineError::schema(format!("{what} needs at least one column")));
    }
    if let Some((i, name)) = columns.iter().enumerate().find(|(i, c)| columns[..*i].contains(c)) {
        return Err(PipelineError::schema(format!("{what} lists column '{name}' twice (position {i})")));
    }
    Ok(())
}

/// Lexicographic row comparison over `(column, order)` keys.
pub(crate) fn compare_rows(a: &[Value], b: &[Value], keys: &[(usize, SortOrder)]) -> Ordering {
    for &(col, order) in keys {
        // Nulls go last in both directions.
        let ord = match (a[col].is_null(), b[col].is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match order {
                SortOrder::Ascending => a[col].total_cmp(&b[col]),
                SortOrder::Descending => b[col].total_cmp(&a[col]),
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Row positions of `table` stably sorted by `keys`.
pub(crate) fn sorted_positions(table: &Table, keys: &[(usize, SortOrder)]) -> Vec<usize> {
    let rows = table.rows();
    let mut positions: Vec<usize> = (0..rows.len()).collect();
    positions.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], keys));
    positions
}
