//! Fetchers: turn external test results into an initial [`Evaluation`].
//!
//! - [`json`]: flat JSON records (array or NDJSON), plus the JSON interchange format
//! - [`csv`]: headed CSV files
//! - [`hydra`]: nested per-build metadata, flattened into one row per successful build
//!
//! Every fetcher implements [`Fetcher`]. Flat fetchers share [`FlatOptions`], which can keep
//! and rename a subset of the loaded columns.

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::{Field, Schema, Table};

pub mod csv;
pub mod hydra;
pub mod json;

pub use self::csv::CsvFetcher;
pub use self::hydra::{BuildResult, HydraFetcher, HydraOptions};
pub use self::json::{from_json_records, to_json_records, JsonFetcher};

/// A source of test results.
pub trait Fetcher {
    fn fetch(&self) -> PipelineResult<Evaluation>;
}

/// Options shared by the flat (JSON/CSV) fetchers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatOptions {
    /// Keep only these `(source, output)` columns, renamed and in this order.
    ///
    /// If `None`, every loaded column is kept under its original name.
    pub mapping: Option<Vec<(String, String)>>,
    /// Evaluation id attached to the fetched result.
    pub eval_id: Option<i64>,
}

impl FlatOptions {
    pub fn with_mapping<I, A, B>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        self.mapping = Some(mapping.into_iter().map(|(a, b)| (a.into(), b.into())).collect());
        self
    }

    pub fn with_eval_id(mut self, eval_id: i64) -> Self {
        self.eval_id = Some(eval_id);
        self
    }

    pub(crate) fn finish(&self, loaded: Evaluation) -> PipelineResult<Evaluation> {
        let table = match &self.mapping {
            Some(mapping) => select_renamed(loaded.table(), mapping)?,
            None => loaded.into_table(),
        };
        Ok(Evaluation::new(table, self.eval_id))
    }
}

/// Build a table holding the `source` columns of `table` renamed to `output`, in mapping
/// order. A missing source column fails with [`PipelineError::Column`].
pub(crate) fn select_renamed(table: &Table, mapping: &[(String, String)]) -> PipelineResult<Table> {
    let mut positions = Vec::with_capacity(mapping.len());
    let mut fields = Vec::with_capacity(mapping.len());
    for (source, output) in mapping {
        let pos = table
            .require_column(source)
            .map_err(|_| PipelineError::column(source, "mapped column does not exist in the input"))?;
        positions.push(pos);
        fields.push(Field::new(output.clone(), table.schema().fields[pos].data_type));
    }
    let rows = table
        .rows()
        .iter()
        .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
        .collect();
    Table::new(Schema::new(fields), rows)
}
