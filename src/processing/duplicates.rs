//! Duplicate removal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::evaluation::Evaluation;
use crate::types::{KeyValue, RowKey};

use super::{check_key_columns, into_strings, resolve_columns, sorted_positions, Processor};

/// Sort direction for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A column plus the direction to sort it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortKey {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Descending,
        }
    }
}

impl From<&str> for SortKey {
    fn from(column: &str) -> Self {
        Self::ascending(column)
    }
}

impl From<String> for SortKey {
    fn from(column: String) -> Self {
        Self::ascending(column)
    }
}

/// Which ranked row of a duplicate group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keep {
    #[default]
    First,
    Last,
}

/// Removes rows whose values in the key columns repeat.
///
/// Rows are ranked by a stable sort on the sort keys (without sort keys, table order is the
/// ranking) and the first or last ranked row of every duplicate group is kept. Kept rows
/// retain their original relative order, so applying this twice changes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanDuplicates {
    key: Vec<String>,
    sort: Vec<SortKey>,
    keep: Keep,
}

impl CleanDuplicates {
    /// Fails with [`crate::PipelineError::Schema`] if `key` is empty or repeats a column.
    pub fn new<I, S>(key: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = into_strings(key);
        check_key_columns(&key, "duplicate key")?;
        Ok(Self {
            key,
            sort: Vec::new(),
            keep: Keep::First,
        })
    }

    /// Rank duplicates by these keys before choosing one.
    pub fn sort_by<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<SortKey>,
    {
        self.sort = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn keep(mut self, keep: Keep) -> Self {
        self.keep = keep;
        self
    }
}

impl Processor for CleanDuplicates {
    fn name(&self) -> &'static str {
        "clean_duplicates"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let table = input.table();
        let key_cols = resolve_columns(table, &self.key)?;
        let sort_keys = self
            .sort
            .iter()
            .map(|k| Ok((table.require_column(&k.column)?, k.order)))
            .collect::<PipelineResult<Vec<_>>>()?;

        // Rows missing a sort value never outrank measured rows, whichever end is kept.
        let (missing, measured): (Vec<usize>, Vec<usize>) = sorted_positions(table, &sort_keys)
            .into_iter()
            .partition(|&p| sort_keys.iter().any(|&(c, _)| table.rows()[p][c].is_null()));
        let ranked: Vec<usize> = match self.keep {
            Keep::First => measured.into_iter().chain(missing).collect(),
            Keep::Last => missing.into_iter().chain(measured).collect(),
        };

        let mut chosen: BTreeMap<RowKey, usize> = BTreeMap::new();
        for pos in ranked {
            let row = &table.rows()[pos];
            let key: RowKey = key_cols.iter().map(|&c| KeyValue(row[c].clone())).collect();
            match self.keep {
                Keep::First => {
                    chosen.entry(key).or_insert(pos);
                }
                Keep::Last => {
                    chosen.insert(key, pos);
                }
            }
        }

        let mut kept: Vec<usize> = chosen.into_values().collect();
        kept.sort_unstable();
        Ok(input.derive(table.select_rows(&kept)))
    }
}
