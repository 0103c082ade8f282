//! Nested build-metadata ingestion.
//!
//! Each CI build of a test suite produces a metadata object (`meta.json`) with nested
//! sections such as `max_freq.<clock>.actual`, `resources.*` or `versions.*`. This fetcher
//! takes already-downloaded [`BuildResult`]s and flattens them into one row per successful
//! build.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::{DataType, Field, Schema, Table, Value};

use super::Fetcher;

type Record = serde_json::Map<String, serde_json::Value>;

const ONE_MHZ: f64 = 1_000_000.0;
/// Icebreaker results recorded before this date report frequencies in MHz.
const LEGACY_ICEBREAKER_CUTOFF: &str = "2020-07-31T00:00:00";

/// One build of an evaluation, as returned by the CI server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub build_id: i64,
    /// Non-zero means the build failed.
    pub status: i64,
    /// Decoded `meta.json`, if the build produced one.
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

/// Options for [`HydraFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydraOptions {
    /// Evaluation id attached to the result.
    pub eval_id: Option<i64>,
    /// Keep only these `(flattened key, output)` columns. `versions.*` and `freq` are always
    /// added.
    pub mapping: Option<Vec<(String, String)>>,
    /// Clock names tried in order when picking the `max_freq.<clock>.actual` frequency.
    pub clock_names: Vec<String>,
}

impl Default for HydraOptions {
    fn default() -> Self {
        Self {
            eval_id: None,
            mapping: None,
            clock_names: ["clk", "sys_clk", "clk_i"].map(String::from).to_vec(),
        }
    }
}

impl HydraOptions {
    pub fn with_mapping<I, A, B>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        self.mapping = Some(mapping.into_iter().map(|(a, b)| (a.into(), b.into())).collect());
        self
    }
}

/// Fetches an evaluation from a list of build results.
#[derive(Debug, Clone, PartialEq)]
pub struct HydraFetcher {
    builds: Vec<BuildResult>,
    options: HydraOptions,
}

impl HydraFetcher {
    pub fn new(builds: Vec<BuildResult>, options: HydraOptions) -> Self {
        Self { builds, options }
    }

    /// Parse a JSON array of [`BuildResult`]s.
    pub fn from_json_str(input: &str, options: HydraOptions) -> PipelineResult<Self> {
        Ok(Self::new(serde_json::from_str(input)?, options))
    }

    pub fn from_path(path: impl AsRef<Path>, options: HydraOptions) -> PipelineResult<Self> {
        Self::from_json_str(&fs::read_to_string(path)?, options)
    }

    fn process_build(&self, flat: &Record) -> PipelineResult<Record> {
        let mut row = match &self.options.mapping {
            None => flat.clone(),
            Some(mapping) => {
                let mut row = Record::new();
                for (source, output) in mapping {
                    let v = flat.get(source).ok_or_else(|| {
                        PipelineError::column(source, "mapped key does not exist in build metadata")
                    })?;
                    row.insert(output.clone(), v.clone());
                }
                row
            }
        };

        let freq = actual_freq(flat, &self.options.clock_names).ok_or_else(|| PipelineError::Value {
            message: "build metadata has no max_freq entry".to_string(),
        })?;
        let mhz = if is_legacy_icebreaker(flat) { freq } else { freq / ONE_MHZ };
        row.insert("freq".to_string(), serde_json::Value::from(mhz));

        for (k, v) in flat.iter().filter(|(k, _)| k.starts_with("versions.")) {
            row.insert(k.clone(), v.clone());
        }
        Ok(row)
    }
}

impl Fetcher for HydraFetcher {
    fn fetch(&self) -> PipelineResult<Evaluation> {
        let mut rows = Vec::new();
        for build in &self.builds {
            if build.status != 0 {
                log::warn!("build {} failed with status {}, skipping", build.build_id, build.status);
                continue;
            }
            let Some(meta) = build.meta.as_ref().and_then(|m| m.as_object()) else {
                log::warn!("build {} has no meta.json object, skipping", build.build_id);
                continue;
            };
            rows.push(self.process_build(&flatten(meta))?);
        }
        if rows.is_empty() {
            return Err(PipelineError::Value {
                message: format!("no successful builds among {} build results", self.builds.len()),
            });
        }
        records_to_table(&rows).map(|t| Evaluation::new(t, self.options.eval_id))
    }
}

/// Flatten nested objects into dotted keys: `{"a": {"b": 1}}` becomes `{"a.b": 1}`.
pub fn flatten(input: &Record) -> Record {
    let mut out = Record::new();
    flatten_into(&mut out, None, input);
    out
}

fn flatten_into(out: &mut Record, prefix: Option<&str>, input: &Record) {
    for (k, v) in input {
        let key = match prefix {
            Some(p) => format!("{p}.{k}"),
            None => k.clone(),
        };
        match v {
            serde_json::Value::Object(inner) => flatten_into(out, Some(&key), inner),
            other => {
                out.insert(key, other.clone());
            }
        }
    }
}

/// Frequency of a flattened build, as recorded (Hz, or MHz for legacy results).
///
/// Picks the unnested `max_freq`, else `max_freq.<clock>.actual` for the first clock in
/// `clock_names`, else the shortest `max_freq.*.actual` key.
pub fn actual_freq(flat: &Record, clock_names: &[String]) -> Option<f64> {
    if let Some(v) = flat.get("max_freq") {
        return v.as_f64();
    }
    clock_names
        .iter()
        .find_map(|clock| flat.get(&format!("max_freq.{clock}.actual")))
        .or_else(|| {
            flat.iter()
                .filter(|(k, _)| k.starts_with("max_freq.") && k.ends_with(".actual"))
                .min_by_key(|(k, _)| k.len())
                .map(|(_, v)| v)
        })
        .and_then(serde_json::Value::as_f64)
}

fn is_legacy_icebreaker(flat: &Record) -> bool {
    match (
        flat.get("board").and_then(|v| v.as_str()),
        flat.get("date").and_then(|v| v.as_str()),
    ) {
        (Some(board), Some(date)) => board == "icebreaker" && date < LEGACY_ICEBREAKER_CUTOFF,
        _ => {
            log::warn!("build metadata lacks date or board; assuming frequency in Hz");
            false
        }
    }
}

/// Build a table from records with possibly differing keys.
///
/// Columns are the union of keys in first-appearance order, missing cells are `Null`, and
/// columns that are null in every row are dropped.
fn records_to_table(records: &[Record]) -> PipelineResult<Table> {
    let mut names: Vec<&str> = Vec::new();
    let mut seen = BTreeSet::new();
    for record in records {
        for k in record.keys() {
            if seen.insert(k.as_str()) {
                names.push(k.as_str());
            }
        }
    }

    let mut columns: Vec<(String, Vec<Value>)> = Vec::with_capacity(names.len());
    for name in names {
        let values: Vec<Value> = records
            .iter()
            .map(|r| r.get(name).map(scalar).unwrap_or(Value::Null))
            .collect();
        if values.iter().any(|v| !v.is_null()) {
            columns.push((name.to_string(), values));
        }
    }

    let fields = columns
        .iter()
        .map(|(name, values)| Field::new(name.clone(), DataType::infer(values)))
        .collect();
    let rows = (0..records.len())
        .map(|r| columns.iter().map(|(_, values)| values[r].clone()).collect())
        .collect();
    Table::new(Schema::new(fields), rows)
}

/// Arrays have no scalar form and are kept as their JSON text.
fn scalar(v: &serde_json::Value) -> Value {
    Value::from_json(v).unwrap_or_else(|| Value::Utf8(v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(id: i64, meta: serde_json::Value) -> BuildResult {
        BuildResult {
            build_id: id,
            status: 0,
            meta: Some(meta),
        }
    }

    fn record(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn flatten_uses_dotted_paths() {
        let flat = flatten(&record(serde_json::json!({"a": {"b": {"c": 1}, "d": 2}, "e": [1, 2]})));
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a.b.c", "a.d", "e"]);
    }

    #[test]
    fn frequency_selection_order() {
        let clocks = HydraOptions::default().clock_names;
        let unnested = record(serde_json::json!({"max_freq": 5.0, "max_freq.clk.actual": 1.0}));
        assert_eq!(actual_freq(&unnested, &clocks), Some(5.0));

        let by_clock = record(serde_json::json!({"max_freq.other.actual": 1.0, "max_freq.sys_clk.actual": 2.0}));
        assert_eq!(actual_freq(&by_clock, &clocks), Some(2.0));

        let shortest = record(serde_json::json!({"max_freq.long_name.actual": 1.0, "max_freq.io.actual": 3.0}));
        assert_eq!(actual_freq(&shortest, &clocks), Some(3.0));

        assert_eq!(actual_freq(&record(serde_json::json!({"lut": 1})), &clocks), None);
    }

    #[test]
    fn fetch_skips_failed_builds_and_converts_to_mhz() {
        let builds = vec![
            build(
                1,
                serde_json::json!({
                    "project": "blink", "board": "arty", "date": "2021-01-01T00:00:00",
                    "max_freq": {"clk": {"actual": 120_000_000.0}},
                    "versions": {"vpr": "8.0"}, "unused": null
                }),
            ),
            BuildResult {
                build_id: 2,
                status: 1,
                meta: None,
            },
            build(
                3,
                serde_json::json!({
                    "project": "blink", "board": "icebreaker", "date": "2020-07-17T22:12:41",
                    "max_freq": {"clk": {"actual": 48.5}}, "unused": null
                }),
            ),
        ];
        let options = HydraOptions {
            eval_id: Some(77),
            ..HydraOptions::default()
        };
        let eval = HydraFetcher::new(builds, options).fetch().unwrap();
        assert_eq!(eval.row_count(), 2);
        assert_eq!(eval.eval_id(), Some(77));
        let freqs: Vec<Option<f64>> = eval.table().column("freq").unwrap().map(Value::as_f64).collect();
        assert_eq!(freqs, vec![Some(120.0), Some(48.5)]);
        assert!(eval.table().column_index("unused").is_none());
        assert_eq!(eval.table().get(1, "versions.vpr"), Some(&Value::Null));
    }

    #[test]
    fn mapping_keeps_renamed_keys_plus_freq_and_versions() {
        let builds = vec![build(
            1,
            serde_json::json!({"project": "p", "resources": {"LUT": 12}, "max_freq": 2_000_000.0, "versions": {"yosys": "0.9"}}),
        )];
        let options = HydraOptions::default().with_mapping([("project", "project"), ("resources.LUT", "lut")]);
        let eval = HydraFetcher::new(builds, options).fetch().unwrap();
        assert_eq!(eval.column_names(), vec!["project", "lut", "freq", "versions.yosys"]);
        assert_eq!(eval.table().schema().fields[1].data_type, DataType::Int64);

        let builds = vec![build(1, serde_json::json!({"max_freq": 1.0}))];
        let options = HydraOptions::default().with_mapping([("missing", "m")]);
        let err = HydraFetcher::new(builds, options).fetch().unwrap_err();
        assert!(matches!(err, PipelineError::Column { .. }));
    }

    #[test]
    fn no_successful_builds_is_a_value_error() {
        let builds = vec![BuildResult {
            build_id: 1,
            status: 3,
            meta: Some(serde_json::json!({"max_freq": 1.0})),
        }];
        let err = HydraFetcher::new(builds, HydraOptions::default()).fetch().unwrap_err();
        assert!(matches!(err, PipelineError::Value { .. }));
    }

    #[test]
    fn builds_parse_from_json() {
        let fetcher = HydraFetcher::from_json_str(
            r#"[{"build_id": 5, "status": 0, "meta": {"max_freq": 1000000}}, {"build_id": 6, "status": 1}]"#,
            HydraOptions::default(),
        )
        .unwrap();
        let eval = fetcher.fetch().unwrap();
        assert_eq!(eval.table().get(0, "freq"), Some(&Value::Float64(1.0)));
    }
}
