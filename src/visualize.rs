//! Consumers of finished tables.
//!
//! A [`StyledTable`] pairs a data evaluation with an optional style evaluation (see
//! [`crate::style`]) after checking they line up cell for cell. A [`Visualizer`] renders a
//! styled table; [`DebugVisualizer`] produces aligned plain text.

use std::fmt::Write as _;

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::Value;

/// Metric columns shown by default, in display order.
pub const DEFAULT_COLUMN_ORDER: &[&str] = &[
    "device",
    "bram",
    "carry",
    "dff",
    "iob",
    "lut",
    "pll",
    "synthesis",
    "pack",
    "place",
    "route",
    "fasm",
    "bitstream",
    "total",
    "freq",
    "normalized_max_freq",
];

/// Tool version columns added when version info is requested.
pub const VERSION_COLUMNS: &[&str] = &[
    "versions.vivado",
    "versions.vpr",
    "versions.yosys",
    "versions.nextpnr-xilinx",
    "versions.nextpnr-ice40",
];

/// A data table and its index-aligned style table.
#[derive(Debug, Clone)]
pub struct StyledTable<'a> {
    data: &'a Evaluation,
    style: Option<&'a Evaluation>,
    column_order: Vec<String>,
}

impl<'a> StyledTable<'a> {
    /// Pair `data` with `style`.
    ///
    /// Fails with [`PipelineError::Alignment`] unless `style` has the same columns, index
    /// definition and index keys (row for row) as `data`.
    pub fn new(data: &'a Evaluation, style: Option<&'a Evaluation>, version_info: bool) -> PipelineResult<Self> {
        if let Some(style) = style {
            check_aligned(data, style)?;
        }
        let wanted = DEFAULT_COLUMN_ORDER
            .iter()
            .chain(if version_info { VERSION_COLUMNS } else { &[] });
        let column_order = wanted
            .filter(|c| data.table().column_index(c).is_some())
            .map(|c| (*c).to_string())
            .collect();
        Ok(Self {
            data,
            style,
            column_order,
        })
    }

    /// Show exactly these data columns, in this order.
    pub fn with_column_order<I, S>(mut self, columns: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for c in &columns {
            self.data.table().require_column(c)?;
        }
        self.column_order = columns;
        Ok(self)
    }

    pub fn data(&self) -> &Evaluation {
        self.data
    }

    pub fn style(&self) -> Option<&Evaluation> {
        self.style
    }

    pub fn column_order(&self) -> &[String] {
        &self.column_order
    }

    /// Index values of row `row`, outermost first.
    pub fn row_labels(&self, row: usize) -> Vec<&Value> {
        let table = self.data.table();
        table
            .index()
            .iter()
            .filter_map(|name| table.get(row, name))
            .collect()
    }

    /// `(column, value, style)` for the displayed columns of row `row`.
    pub fn row_cells(&self, row: usize) -> Vec<(&str, &Value, Option<&str>)> {
        self.column_order
            .iter()
            .filter_map(|name| {
                let value = self.data.table().get(row, name)?;
                let style = self
                    .style
                    .and_then(|s| s.table().get(row, name))
                    .and_then(Value::as_str);
                Some((name.as_str(), value, style))
            })
            .collect()
    }
}

fn check_aligned(data: &Evaluation, style: &Evaluation) -> PipelineResult<()> {
    let (d, s) = (data.table(), style.table());
    let mut data_columns: Vec<&str> = d.column_names().collect();
    let mut style_columns: Vec<&str> = s.column_names().collect();
    data_columns.sort_unstable();
    style_columns.sort_unstable();
    if data_columns != style_columns {
        return Err(PipelineError::alignment(format!(
            "style columns {style_columns:?} differ from data columns {data_columns:?}"
        )));
    }
    if d.index() != s.index() {
        return Err(PipelineError::alignment(format!(
            "style index {:?} differs from data index {:?}",
            s.index(),
            d.index()
        )));
    }
    if d.row_count() != s.row_count() {
        return Err(PipelineError::alignment(format!(
            "style has {} rows, data has {}",
            s.row_count(),
            d.row_count()
        )));
    }
    if let Some(row) = (0..d.row_count()).find(|&r| d.index_key(r) != s.index_key(r)) {
        return Err(PipelineError::alignment(format!("index keys differ at row {row}")));
    }
    Ok(())
}

/// Renders a [`StyledTable`].
pub trait Visualizer {
    type Output;

    fn render(&self, table: &StyledTable<'_>) -> Self::Output;
}

/// Plain-text table for terminals and test output.
///
/// Nulls print as `-` and floats with two decimals. Styles are not rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugVisualizer;

fn cell_text(v: &Value) -> String {
    match v {
        Value::Null => "-".to_string(),
        Value::Float64(f) => format!("{f:.2}"),
        other => other.to_string(),
    }
}

impl Visualizer for DebugVisualizer {
    type Output = String;

    fn render(&self, table: &StyledTable<'_>) -> String {
        let data = table.data().table();
        let header: Vec<String> = data
            .index()
            .iter()
            .chain(table.column_order())
            .cloned()
            .collect();
        let body: Vec<Vec<String>> = (0..data.row_count())
            .map(|r| {
                table
                    .row_labels(r)
                    .into_iter()
                    .map(cell_text)
                    .chain(table.row_cells(r).into_iter().map(|(_, v, _)| cell_text(v)))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = (0..header.len())
            .map(|c| {
                body.iter()
                    .filter_map(|row| row.get(c))
                    .chain(std::iter::once(&header[c]))
                    .map(|s| s.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        for line in std::iter::once(&header).chain(&body) {
            let cells: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{cell:<w$}", w = *w))
                .collect();
            let _ = writeln!(out, "{}", cells.join(" | ").trim_end());
        }
        out
    }
}
