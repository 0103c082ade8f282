//! Declarative pipelines.
//!
//! A [`PipelineConfig`] is a JSON document listing processor stages, each tagged by `op`:
//!
//! ```json
//! {
//!   "name": "freq",
//!   "stages": [
//!     {"op": "standardize_types", "types": {"freq": "float64"}},
//!     {"op": "clean_duplicates", "key": ["project", "toolchain"],
//!      "sort_by": [{"column": "freq"}], "keep": "last"},
//!     {"op": "add_normalized_column", "group_by": ["project"],
//!      "input": "freq", "output": "normalized_max_freq"}
//!   ]
//! }
//! ```
//!
//! Processors that need other evaluations ([`crate::processing::RelativeDiff`],
//! [`crate::processing::CompareToFirst`]) or closures cannot be described here and are
//! built in code.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::Pipeline;
use crate::processing::{
    AddNormalizedColumn, Aggregate, CleanDuplicates, ExpandColumn, FilterByIndex, GeomeanAggregate, IndexPredicate,
    Keep, MinusOne, Normalize, NormalizeAround, Processor, ReduceOp, Reindex, SortIndex, SortKey, StandardizeTypes,
};
use crate::style::{ColorMapStyle, LinearSegmentedColorMap, Rgb};
use crate::types::{DataType, Direction, Value};

/// Index predicate as written in configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateConfig {
    Equals(serde_json::Value),
    In(Vec<serde_json::Value>),
    Range {
        #[serde(default)]
        min: Option<serde_json::Value>,
        #[serde(default)]
        max: Option<serde_json::Value>,
    },
}

/// Lookup table of an `expand_column` stage.
///
/// JSON object keys are always strings, so an object only matches `Utf8` source values.
/// The entry-list form keeps the key's JSON type and can expand numeric or boolean columns:
/// `[[1, ["yosys", "vpr"]], [2, ["vivado", "vivado"]]]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExpandMapping {
    Object(BTreeMap<String, (serde_json::Value, serde_json::Value)>),
    Entries(Vec<(serde_json::Value, (serde_json::Value, serde_json::Value))>),
}

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProcessorConfig {
    StandardizeTypes {
        types: BTreeMap<String, DataType>,
    },
    CleanDuplicates {
        key: Vec<String>,
        #[serde(default)]
        sort_by: Vec<SortKey>,
        #[serde(default)]
        keep: Keep,
    },
    AddNormalizedColumn {
        #[serde(default)]
        group_by: Vec<String>,
        input: String,
        output: String,
        #[serde(default)]
        direction: Option<Direction>,
    },
    ExpandColumn {
        input: String,
        outputs: (String, String),
        mapping: ExpandMapping,
    },
    Reindex {
        columns: Vec<String>,
    },
    SortIndex {
        #[serde(default)]
        keys: Vec<SortKey>,
    },
    FilterByIndex {
        column: String,
        predicate: PredicateConfig,
    },
    Normalize {
        directions: BTreeMap<String, Direction>,
        #[serde(default)]
        group_by: Vec<String>,
    },
    NormalizeAround {
        directions: BTreeMap<String, Direction>,
        #[serde(default)]
        group_by: Vec<String>,
        baseline_column: String,
        baseline_value: serde_json::Value,
        #[serde(default)]
        unit_range: bool,
    },
    MinusOne {
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
    Aggregate {
        #[serde(default)]
        reduce: Option<ReduceOp>,
        #[serde(default)]
        per_column: Option<BTreeMap<String, ReduceOp>>,
        #[serde(default)]
        group_by: Vec<String>,
    },
    GeomeanAggregate {
        #[serde(default)]
        group_by: Vec<String>,
    },
    /// Evenly spaced `#rrggbb` colors, worst first.
    ColorMapStyle {
        colors: Vec<String>,
    },
}

fn scalar(v: &serde_json::Value) -> PipelineResult<Value> {
    Value::from_json(v).ok_or_else(|| PipelineError::Value {
        message: format!("expected a scalar, found {v}"),
    })
}

impl ProcessorConfig {
    /// Build the configured processor.
    ///
    /// Fails with [`PipelineError::Value`] on unusable parameter values (non-scalar
    /// constants, bad colors, an aggregate without reductions). Invalid key lists fail the
    /// way the processor constructors do.
    pub fn build(&self) -> PipelineResult<Box<dyn Processor>> {
        Ok(match self {
            Self::StandardizeTypes { types } => Box::new(StandardizeTypes::new(types.clone())),
            Self::CleanDuplicates { key, sort_by, keep } => Box::new(
                CleanDuplicates::new(key.clone())?
                    .sort_by(sort_by.clone())
                    .keep(*keep),
            ),
            Self::AddNormalizedColumn {
                group_by,
                input,
                output,
                direction,
            } => Box::new(
                AddNormalizedColumn::new(group_by.clone(), input.clone(), output.clone())
                    .direction(direction.unwrap_or(Direction::Maximize)),
            ),
            Self::ExpandColumn {
                input,
                outputs,
                mapping,
            } => {
                let mut pairs = Vec::new();
                match mapping {
                    ExpandMapping::Object(entries) => {
                        for (k, (a, b)) in entries {
                            pairs.push((Value::from(k.as_str()), (scalar(a)?, scalar(b)?)));
                        }
                    }
                    ExpandMapping::Entries(entries) => {
                        for (k, (a, b)) in entries {
                            pairs.push((scalar(k)?, (scalar(a)?, scalar(b)?)));
                        }
                    }
                }
                Box::new(ExpandColumn::new(input.clone(), outputs.clone(), pairs)?)
            }
            Self::Reindex { columns } => Box::new(Reindex::new(columns.clone())?),
            Self::SortIndex { keys } => Box::new(SortIndex::new(keys.clone())),
            Self::FilterByIndex { column, predicate } => {
                let predicate = match predicate {
                    PredicateConfig::Equals(v) => IndexPredicate::Equals(scalar(v)?),
                    PredicateConfig::In(vs) => IndexPredicate::In(vs.iter().map(scalar).collect::<PipelineResult<_>>()?),
                    PredicateConfig::Range { min, max } => IndexPredicate::Range {
                        min: min.as_ref().map(scalar).transpose()?,
                        max: max.as_ref().map(scalar).transpose()?,
                    },
                };
                Box::new(FilterByIndex::new(column.clone(), predicate))
            }
            Self::Normalize { directions, group_by } => {
                Box::new(Normalize::new(directions.clone()).group_by(group_by.clone()))
            }
            Self::NormalizeAround {
                directions,
                group_by,
                baseline_column,
                baseline_value,
                unit_range,
            } => {
                let p = NormalizeAround::new(
                    directions.clone(),
                    group_by.clone(),
                    baseline_column.clone(),
                    scalar(baseline_value)?,
                );
                Box::new(if *unit_range { p.unit_range() } else { p })
            }
            Self::MinusOne { columns } => Box::new(match columns {
                Some(columns) => MinusOne::new(columns.clone()),
                None => MinusOne::all_numeric(),
            }),
            Self::Aggregate {
                reduce,
                per_column,
                group_by,
            } => {
                let aggregate = match (per_column, reduce) {
                    (Some(per_column), _) => Aggregate::per_column(per_column.clone()),
                    (None, Some(op)) => Aggregate::new(*op),
                    (None, None) => {
                        return Err(PipelineError::Value {
                            message: "aggregate needs `reduce` or `per_column`".to_string(),
                        });
                    }
                };
                Box::new(aggregate.group_by(group_by.clone()))
            }
            Self::GeomeanAggregate { group_by } => Box::new(GeomeanAggregate::new().group_by(group_by.clone())),
            Self::ColorMapStyle { colors } => {
                let colors = colors.iter().map(|c| Rgb::from_hex(c)).collect::<PipelineResult<Vec<_>>>()?;
                Box::new(ColorMapStyle::new(LinearSegmentedColorMap::evenly_spaced(&colors)?))
            }
        })
    }
}

/// A named list of stages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub stages: Vec<ProcessorConfig>,
}

impl PipelineConfig {
    pub fn from_json_str(input: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Build a [`Pipeline`] running the stages in order.
    pub fn build(&self) -> PipelineResult<Pipeline> {
        let mut pipeline = match &self.name {
            Some(name) => Pipeline::named(name.clone()),
            None => Pipeline::new(),
        };
        for stage in &self.stages {
            pipeline.push(stage.build()?);
        }
        Ok(pipeline)
    }
}
