//! `perf-pipeline` turns raw performance-test results into display-ready tables.
//!
//! Results enter as an [`evaluation::Evaluation`]: an immutable table with one row per test
//! run and one column per metric, tagged with the id of the execution that produced it.
//! [`processing::Processor`]s reshape, deduplicate, normalize, aggregate and compare rows;
//! each returns a new evaluation and never touches its input. A parallel *style* pipeline
//! ending in [`style::ColorMapStyle`] produces per-cell presentation strings that a
//! [`visualize::Visualizer`] renders alongside the data.
//!
//! ## Where data comes from
//!
//! - [`ingestion::json`]: flat JSON records (array, single object or NDJSON)
//! - [`ingestion::csv`]: headed CSV files, types inferred per column
//! - [`ingestion::hydra`]: nested per-build metadata, flattened to dotted column names
//!
//! ## Quick example: deduplicate and normalize
//!
//! ```rust
//! use perf_pipeline::ingestion::json::from_json_records;
//! use perf_pipeline::processing::{AddNormalizedColumn, CleanDuplicates, Keep, Processor, StandardizeTypes};
//! use perf_pipeline::types::{DataType, Value};
//!
//! # fn main() -> Result<(), perf_pipeline::PipelineError> {
//! let eval = from_json_records(
//!     r#"[{"project": "A", "toolchain": "vpr", "freq": 100},
//!         {"project": "A", "toolchain": "vpr", "freq": 120},
//!         {"project": "A", "toolchain": "vivado", "freq": 90}]"#,
//!     Some(1),
//! )?;
//!
//! let pipeline: Vec<Box<dyn Processor>> = vec![
//!     Box::new(StandardizeTypes::new([("freq", DataType::Float64)])),
//!     Box::new(CleanDuplicates::new(["project", "toolchain"]).unwrap().sort_by(["freq"]).keep(Keep::Last)),
//!     Box::new(AddNormalizedColumn::new(["project"], "freq", "normalized_max_freq")),
//! ];
//! let out = eval.apply_pipeline(&pipeline)?;
//!
//! assert_eq!(out.row_count(), 2);
//! assert_eq!(out.table().get(1, "normalized_max_freq"), Some(&Value::Float64(0.75)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: values, schemas and the indexed [`types::Table`]
//! - [`evaluation`]: the [`evaluation::Evaluation`] record table
//! - [`processing`]: the [`processing::Processor`] trait and every operator
//! - [`style`]: color maps and the style processor
//! - [`pipeline`]: observed pipelines with logging and alert hooks
//! - [`config`]: pipelines described as JSON
//! - [`ingestion`]: fetchers
//! - [`visualize`]: data/style pairing and a plain-text renderer
//! - [`error`]: the crate-wide error type

pub mod config;
pub mod error;
pub mod evaluation;
pub mod ingestion;
pub mod pipeline;
pub mod processing;
pub mod style;
pub mod types;
pub mod visualize;

pub use error::{PipelineError, PipelineResult};
