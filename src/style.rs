//! Style processors: turn a table of normalized scores into CSS cell styles.
//!
//! The output of [`ColorMapStyle`] is a *style table*: same index and columns as its input,
//! with every data cell replaced by a presentation string. Pair it with the data table in
//! [`crate::visualize::StyledTable`].

use std::fmt;

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::processing::Processor;
use crate::types::{DataType, Field, Schema, Table, Value};

/// An RGB color with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`.
    pub fn from_hex(hex: &str) -> PipelineResult<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let invalid = || PipelineError::Value {
            message: format!("'{hex}' is not a #rrggbb color"),
        };
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map(|c| f64::from(c) / 255.0)
                .map_err(|_| invalid())
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// `#rrggbb` with each channel truncated to `0..=255`.
    pub fn to_hex(self) -> String {
        let byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).trunc() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }

    fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A continuous color function over `[0, 1]`.
///
/// Closures `Fn(f64) -> Rgb` are color maps too.
pub trait ColorMap {
    fn color_at(&self, t: f64) -> Rgb;
}

impl<F> ColorMap for F
where
    F: Fn(f64) -> Rgb,
{
    fn color_at(&self, t: f64) -> Rgb {
        self(t)
    }
}

/// Piecewise-linear interpolation between color stops.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSegmentedColorMap {
    stops: Vec<(f64, Rgb)>,
}

impl LinearSegmentedColorMap {
    /// Stops must start at `0.0`, end at `1.0`, increase strictly, and use channels in `[0, 1]`.
    pub fn new(stops: Vec<(f64, Rgb)>) -> PipelineResult<Self> {
        let invalid = |message: String| PipelineError::Value { message };
        match (stops.first(), stops.last()) {
            (Some((first, _)), Some((last, _))) if stops.len() >= 2 && *first == 0.0 && *last == 1.0 => {}
            _ => return Err(invalid("color stops must span 0.0 to 1.0 with at least two stops".into())),
        }
        if stops.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(invalid("color stop positions must increase strictly".into()));
        }
        if let Some((pos, c)) = stops
            .iter()
            .find(|(_, c)| [c.r, c.g, c.b].iter().any(|ch| !(0.0..=1.0).contains(ch)))
        {
            return Err(invalid(format!("color at stop {pos} has a channel outside [0, 1]: {c:?}")));
        }
        Ok(Self { stops })
    }

    /// Evenly spaced stops through `colors` (at least two).
    pub fn evenly_spaced(colors: &[Rgb]) -> PipelineResult<Self> {
        let last = colors.len().saturating_sub(1).max(1) as f64;
        Self::new(
            colors
                .iter()
                .enumerate()
                .map(|(i, c)| (i as f64 / last, *c))
                .collect(),
        )
    }

    pub fn two_color(low: Rgb, high: Rgb) -> Self {
        Self {
            stops: vec![(0.0, low), (1.0, high)],
        }
    }

    /// Low → mid at `0.5` → high.
    pub fn diverging(low: Rgb, mid: Rgb, high: Rgb) -> Self {
        Self {
            stops: vec![(0.0, low), (0.5, mid), (1.0, high)],
        }
    }
}

impl Default for LinearSegmentedColorMap {
    /// Red (worst) through white to green (best).
    fn default() -> Self {
        Self::diverging(
            Rgb::new(0.97, 0.56, 0.56),
            Rgb::new(1.0, 1.0, 1.0),
            Rgb::new(0.56, 0.87, 0.56),
        )
    }
}

impl ColorMap for LinearSegmentedColorMap {
    fn color_at(&self, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        for w in self.stops.windows(2) {
            let ((p0, c0), (p1, c1)) = (w[0], w[1]);
            if t <= p1 {
                return c0.lerp(c1, (t - p0) / (p1 - p0));
            }
        }
        self.stops.last().map(|(_, c)| *c).unwrap_or(Rgb::new(1.0, 1.0, 1.0))
    }
}

/// Maps every numeric data cell through a [`ColorMap`] into `"background-color: #rrggbb"`.
///
/// Values are clamped to `[0, 1]`; non-numeric, null and NaN cells become `""`. Index
/// columns are copied so the style table lines up with the data it decorates.
#[derive(Debug, Clone)]
pub struct ColorMapStyle<C> {
    color_map: C,
}

impl<C: ColorMap> ColorMapStyle<C> {
    pub fn new(color_map: C) -> Self {
        Self { color_map }
    }

    fn style(&self, value: &Value) -> Value {
        match value.as_f64() {
            Some(x) if !x.is_nan() => {
                Value::Utf8(format!("background-color: {}", self.color_map.color_at(x.clamp(0.0, 1.0))))
            }
            _ => Value::Utf8(String::new()),
        }
    }
}

impl<C: ColorMap> Processor for ColorMapStyle<C> {
    fn name(&self) -> &'static str {
        "color_map_style"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let table = input.table();
        let passthrough: Vec<bool> = table.column_names().map(|n| table.is_index_column(n)).collect();
        let fields = table
            .schema()
            .fields
            .iter()
            .zip(&passthrough)
            .map(|(f, &keep)| if keep { f.clone() } else { Field::new(f.name.clone(), DataType::Utf8) })
            .collect();
        let rows = table
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&passthrough)
                    .map(|(v, &keep)| if keep { v.clone() } else { self.style(v) })
                    .collect()
            })
            .collect();
        Ok(input.derive(Table::from_parts(Schema::new(fields), rows, table.index().to_vec())))
    }
}
