//! Row filtering by index value.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::Value;

use super::Processor;

/// A test over the value of one index column.
#[derive(Clone)]
pub enum IndexPredicate {
    /// Value equals the given one (numbers compare across int/float).
    Equals(Value),
    /// Value is one of the given values.
    In(Vec<Value>),
    /// Value lies within the inclusive bounds; a missing bound is unbounded. Nulls never match.
    Range { min: Option<Value>, max: Option<Value> },
    /// Arbitrary test.
    Custom(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl IndexPredicate {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Equals(v) => value.total_cmp(v) == Ordering::Equal,
            Self::In(vs) => vs.iter().any(|v| value.total_cmp(v) == Ordering::Equal),
            Self::Range { min, max } => {
                !value.is_null()
                    && min.as_ref().is_none_or(|m| value.total_cmp(m) != Ordering::Less)
                    && max.as_ref().is_none_or(|m| value.total_cmp(m) != Ordering::Greater)
            }
            Self::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for IndexPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            Self::In(vs) => f.debug_tuple("In").field(vs).finish(),
            Self::Range { min, max } => f.debug_struct("Range").field("min", min).field("max", max).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Keeps only rows whose value in an index column satisfies a predicate.
///
/// Best used after [`super::Reindex`]. Columns and index definition are unchanged.
#[derive(Debug, Clone)]
pub struct FilterByIndex {
    column: String,
    predicate: IndexPredicate,
}

impl FilterByIndex {
    pub fn new(column: impl Into<String>, predicate: IndexPredicate) -> Self {
        Self {
            column: column.into(),
            predicate,
        }
    }

    /// Shorthand for an [`IndexPredicate::Equals`] filter.
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, IndexPredicate::Equals(value.into()))
    }
}

impl Processor for FilterByIndex {
    fn name(&self) -> &'static str {
        "filter_by_index"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let table = input.table();
        if !table.is_index_column(&self.column) {
            return Err(PipelineError::column(&self.column, "is not an index column"));
        }
        let idx = table.require_column(&self.column)?;
        Ok(input.derive(table.filter_rows(|row| self.predicate.matches(&row[idx]))))
    }
}
