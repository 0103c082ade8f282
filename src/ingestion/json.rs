//! JSON ingestion and the JSON interchange format.
//!
//! Supported inputs:
//! - A JSON array of flat objects: `[{"a":1}, {"a":2}]`
//! - A single flat object
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Every object must carry the same keys; the first object fixes the column order.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;

use super::{Fetcher, FlatOptions};

type Record = serde_json::Map<String, serde_json::Value>;

/// Parse JSON text into flat records.
pub fn parse_records(input: &str) -> PipelineResult<Vec<Record>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Value {
            message: "json input is empty".to_string(),
        });
    }

    // First try parsing as a single JSON value (array or object).
    let values = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(v @ serde_json::Value::Object(_)) => vec![v],
        Ok(_) => {
            return Err(PipelineError::Value {
                message: "json must be an object, an array of objects, or NDJSON".to_string(),
            });
        }
        Err(_) => {
            let mut values = Vec::new();
            for (i, line) in trimmed.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| PipelineError::Value {
                    message: format!("invalid ndjson at line {}: {e}", i + 1),
                })?;
                values.push(v);
            }
            values
        }
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(PipelineError::Value {
                message: format!("row {} is not a json object: {other}", i + 1),
            }),
        })
        .collect()
}

/// Load an evaluation from JSON records. Column types are inferred.
pub fn from_json_records(input: &str, eval_id: Option<i64>) -> PipelineResult<Evaluation> {
    Evaluation::from_records(&parse_records(input)?, eval_id)
}

/// Serialize an evaluation as an array of flat row objects in column order.
///
/// Non-finite floats become `null`. The evaluation id and index are not part of the format.
pub fn to_json_records(eval: &Evaluation) -> PipelineResult<String> {
    let table = eval.table();
    let names: Vec<&str> = table.column_names().collect();
    let records: Vec<Record> = table
        .rows()
        .iter()
        .map(|row| {
            names
                .iter()
                .zip(row)
                .map(|(name, v)| ((*name).to_string(), v.to_json()))
                .collect()
        })
        .collect();
    Ok(serde_json::to_string(&records)?)
}

/// Load a JSON file into an evaluation, applying `options`.
pub fn read_json_path(path: impl AsRef<Path>, options: &FlatOptions) -> PipelineResult<Evaluation> {
    let text = fs::read_to_string(path)?;
    read_json_str(&text, options)
}

pub fn read_json_str(input: &str, options: &FlatOptions) -> PipelineResult<Evaluation> {
    options.finish(from_json_records(input, None)?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Path(PathBuf),
    Text(String),
}

/// Fetches a flat JSON file (or in-memory JSON text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFetcher {
    source: Source,
    options: FlatOptions,
}

impl JsonFetcher {
    pub fn from_path(path: impl Into<PathBuf>, options: FlatOptions) -> Self {
        Self {
            source: Source::Path(path.into()),
            options,
        }
    }

    pub fn from_text(text: impl Into<String>, options: FlatOptions) -> Self {
        Self {
            source: Source::Text(text.into()),
            options,
        }
    }
}

impl Fetcher for JsonFetcher {
    fn fetch(&self) -> PipelineResult<Evaluation> {
        match &self.source {
            Source::Path(path) => read_json_path(path, &self.options),
            Source::Text(text) => read_json_str(text, &self.options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Value};

    #[test]
    fn parses_array_object_and_ndjson() {
        assert_eq!(parse_records(r#"[{"a": 1}, {"a": 2}]"#).unwrap().len(), 2);
        assert_eq!(parse_records(r#"{"a": 1}"#).unwrap().len(), 1);
        assert_eq!(parse_records("{\"a\": 1}\n\n{\"a\": 2}\n").unwrap().len(), 2);
    }

    #[test]
    fn rejects_non_objects_and_bad_ndjson() {
        assert!(matches!(parse_records("[1, 2]"), Err(PipelineError::Value { .. })));
        assert!(matches!(parse_records("   "), Err(PipelineError::Value { .. })));
        let err = parse_records("{\"a\": 1}\n{oops}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn interchange_round_trip_keeps_columns_rows_and_values() {
        let eval = from_json_records(
            r#"[{"b": "x", "a": 1, "f": 0.5, "n": null}, {"b": "y", "a": 2, "f": 1.5, "n": null}]"#,
            Some(4),
        )
        .unwrap();
        let text = to_json_records(&eval).unwrap();
        let back = from_json_records(&text, Some(4)).unwrap();
        assert_eq!(back, eval);
        assert_eq!(back.column_names(), vec!["b", "a", "f", "n"]);
        assert_eq!(back.table().schema().fields[2].data_type, DataType::Float64);
    }

    #[test]
    fn non_finite_floats_serialize_as_null() {
        let eval = from_json_records(r#"[{"f": 1.0}]"#, None).unwrap();
        let (schema, mut rows, _) = eval.to_table().into_parts();
        rows[0][0] = Value::Float64(f64::NAN);
        let nan = Evaluation::from_rows(schema, rows, None).unwrap();
        assert_eq!(to_json_records(&nan).unwrap(), r#"[{"f":null}]"#);
    }

    #[test]
    fn fetcher_applies_options() {
        let fetcher = JsonFetcher::from_text(
            r#"[{"proj": "a", "max": 10}]"#,
            FlatOptions::default().with_mapping([("proj", "project")]).with_eval_id(8),
        );
        let eval = fetcher.fetch().unwrap();
        assert_eq!(eval.column_names(), vec!["project"]);
        assert_eq!(eval.eval_id(), Some(8));
    }
}
