//! CSV ingestion with per-column type inference.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::PipelineResult;
use crate::evaluation::Evaluation;
use crate::types::{DataType, Field, Schema, Table, Value};

use super::{Fetcher, FlatOptions};

/// Load a headed CSV file.
///
/// Rules:
///
/// - The first record is the header and gives the column names, in order.
/// - Empty cells are `Null`.
/// - A column whose non-empty cells all parse as integers is `Int64`; otherwise as numbers,
///   `Float64`; otherwise as `true`/`false`, `Bool`; otherwise `Utf8`.
pub fn read_csv_path(path: impl AsRef<Path>, options: &FlatOptions) -> PipelineResult<Evaluation> {
    let mut rdr = ::csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    options.finish(read_csv_reader(&mut rdr)?)
}

/// Load CSV text held in memory.
pub fn read_csv_str(input: &str, options: &FlatOptions) -> PipelineResult<Evaluation> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());
    options.finish(read_csv_reader(&mut rdr)?)
}

/// Load CSV data from an existing reader.
pub fn read_csv_reader<R: Read>(rdr: &mut ::csv::Reader<R>) -> PipelineResult<Evaluation> {
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_owned).collect();

    let mut raw: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        raw.push(
            (0..headers.len())
                .map(|i| record.get(i).unwrap_or("").trim().to_owned())
                .collect(),
        );
    }

    let types: Vec<DataType> = (0..headers.len())
        .map(|c| infer_column(raw.iter().map(|r| r[c].as_str())))
        .collect();
    let rows = raw
        .iter()
        .map(|r| r.iter().zip(&types).map(|(cell, t)| parse_cell(cell, *t)).collect())
        .collect();
    let fields = headers
        .into_iter()
        .zip(&types)
        .map(|(name, t)| Field::new(name, *t))
        .collect();

    Ok(Evaluation::new(Table::new(Schema::new(fields), rows)?, None))
}

fn is_bool(cell: &str) -> bool {
    cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false")
}

fn infer_column<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> DataType {
    let mut present = cells.filter(|c| !c.is_empty());
    if present.clone().next().is_none() {
        DataType::Any
    } else if present.clone().all(|c| c.parse::<i64>().is_ok()) {
        DataType::Int64
    } else if present.clone().all(|c| c.parse::<f64>().is_ok()) {
        DataType::Float64
    } else if present.all(is_bool) {
        DataType::Bool
    } else {
        DataType::Utf8
    }
}

// Cells were already checked against `data_type` by `infer_column`.
fn parse_cell(cell: &str, data_type: DataType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match data_type {
        DataType::Int64 => cell.parse().map(Value::Int64).unwrap_or(Value::Null),
        DataType::Float64 => cell.parse().map(Value::Float64).unwrap_or(Value::Null),
        DataType::Bool => Value::Bool(cell.eq_ignore_ascii_case("true")),
        DataType::Utf8 | DataType::Any => Value::Utf8(cell.to_owned()),
    }
}

/// Fetches a headed CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFetcher {
    path: PathBuf,
    options: FlatOptions,
}

impl CsvFetcher {
    pub fn new(path: impl Into<PathBuf>, options: FlatOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

impl Fetcher for CsvFetcher {
    fn fetch(&self) -> PipelineResult<Evaluation> {
        read_csv_path(&self.path, &self.options)
    }
}
