//! Core data model types.
//!
//! A [`Table`] is row-major storage described by a [`Schema`] (a list of typed [`Field`]s),
//! plus a composite row index: an ordered list of column names whose combined values
//! identify a row. Index columns stay ordinary columns and always lead the schema.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
    /// Opaque column holding scalars of mixed kinds.
    Any,
}

impl DataType {
    /// `true` for [`DataType::Int64`] and [`DataType::Float64`].
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }

    /// Whether a cell value may be stored in a column of this type. `Null` fits everywhere.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (Self::Any, _) => true,
            (Self::Int64, Value::Int64(_))
            | (Self::Float64, Value::Float64(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::Utf8, Value::Utf8(_)) => true,
            _ => false,
        }
    }

    /// Smallest type able to hold values of both `self` and `other`.
    pub(crate) fn unify(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int64, Self::Float64) | (Self::Float64, Self::Int64) => Self::Float64,
            _ => Self::Any,
        }
    }

    /// Infer a column type from its values. Nulls are ignored; an all-null column is `Any`.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        values
            .into_iter()
            .filter_map(Value::data_type)
            .reduce(Self::unify)
            .unwrap_or(Self::Any)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Utf8 => "utf8",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the shape of a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single typed value in a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// The type of a non-null value.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Int64(_) => Some(DataType::Int64),
            Self::Float64(_) => Some(DataType::Float64),
            Self::Bool(_) => Some(DataType::Bool),
            Self::Utf8(_) => Some(DataType::Utf8),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of `Int64`/`Float64` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(s) => Some(s),
            _ => None,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int64(_) | Self::Float64(_) => 1,
            Self::Utf8(_) => 2,
            Self::Null => 3,
        }
    }

    /// Total order used for sorting and grouping.
    ///
    /// Numbers compare numerically across `Int64`/`Float64` (NaN after every number),
    /// `Null` sorts after every non-null value, and mixed kinds order bool < number < string.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Utf8(a), Self::Utf8(b)) => a.cmp(b),
            (a, b) if a.kind_rank() == 1 && b.kind_rank() == 1 => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y)
                    .unwrap_or_else(|| x.is_nan().cmp(&y.is_nan()))
            }
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }

    /// Convert this value into `target`, returning a human-readable reason on failure.
    pub fn cast(&self, target: DataType) -> Result<Value, String> {
        match (target, self) {
            (_, Self::Null) | (DataType::Any, _) => Ok(self.clone()),
            (DataType::Utf8, v) => Ok(Self::Utf8(v.to_string())),
            (DataType::Float64, Self::Int64(v)) => Ok(Self::Float64(*v as f64)),
            (DataType::Float64, Self::Float64(v)) => Ok(Self::Float64(*v)),
            (DataType::Float64, Self::Bool(b)) => Ok(Self::Float64(if *b { 1.0 } else { 0.0 })),
            (DataType::Float64, Self::Utf8(s)) => s
                .trim()
                .parse::<f64>()
                .map(Self::Float64)
                .map_err(|e| e.to_string()),
            (DataType::Int64, Self::Int64(v)) => Ok(Self::Int64(*v)),
            (DataType::Int64, Self::Float64(v)) => float_to_int(*v).map(Self::Int64),
            (DataType::Int64, Self::Bool(b)) => Ok(Self::Int64(i64::from(*b))),
            (DataType::Int64, Self::Utf8(s)) => {
                let trimmed = s.trim();
                match trimmed.parse::<i64>() {
                    Ok(v) => Ok(Self::Int64(v)),
                    // "6.0" style integers go through float first.
                    Err(_) => trimmed
                        .parse::<f64>()
                        .map_err(|e| e.to_string())
                        .and_then(float_to_int)
                        .map(Self::Int64),
                }
            }
            (DataType::Bool, Self::Bool(b)) => Ok(Self::Bool(*b)),
            (DataType::Bool, Self::Int64(v)) => Ok(Self::Bool(*v != 0)),
            (DataType::Bool, Self::Float64(v)) => Ok(Self::Bool(*v != 0.0)),
            (DataType::Bool, Self::Utf8(s)) => parse_bool(s.trim()).map(Self::Bool),
        }
    }

    /// Convert a JSON scalar into a value. Arrays and objects are not scalars and yield `None`.
    pub fn from_json(v: &serde_json::Value) -> Option<Value> {
        match v {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Int64(i)),
                None => n.as_f64().map(Self::Float64),
            },
            serde_json::Value::String(s) => Some(Self::Utf8(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Convert into a JSON scalar. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Int64(v) => serde_json::Value::from(*v),
            Self::Float64(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Utf8(s) => serde_json::Value::String(s.clone()),
        }
    }
}

fn float_to_int(v: f64) -> Result<i64, String> {
    if v.is_finite() && v.abs() < i64::MAX as f64 {
        Ok(v.trunc() as i64)
    } else {
        Err(format!("{v} is out of range for int64"))
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Utf8(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Utf8(v)
    }
}

/// A [`Value`] with [`Value::total_cmp`] as its `Eq`/`Ord`, usable as a map key.
#[derive(Debug, Clone)]
pub(crate) struct KeyValue(pub(crate) Value);

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Composite key built from several cells of one row.
pub(crate) type RowKey = Vec<KeyValue>;

/// The sense in which a metric is "better".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Larger values are better.
    Maximize,
    /// Smaller values are better.
    Minimize,
}

impl Direction {
    /// `+1.0` for [`Direction::Maximize`], `-1.0` for [`Direction::Minimize`].
    pub fn sign(self) -> f64 {
        match self {
            Self::Maximize => 1.0,
            Self::Minimize => -1.0,
        }
    }
}

/// In-memory tabular data with a composite row index.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields. Every
/// non-null cell matches its column type, column names are unique, and index columns lead
/// the schema. An empty index means rows are identified by position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
    index: Vec<String>,
}

impl Table {
    /// Create a table from a schema and rows, using the positional index.
    ///
    /// Fails with [`PipelineError::Schema`] if a row length differs from the schema, a cell
    /// does not fit its column type, or a column name repeats.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> PipelineResult<Self> {
        let mut seen = HashSet::new();
        for name in schema.field_names() {
            if !seen.insert(name) {
                return Err(PipelineError::schema(format!("duplicate column '{name}'")));
            }
        }
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != schema.fields.len() {
                return Err(PipelineError::schema(format!(
                    "row {row_idx} has {} values but the schema has {} columns",
                    row.len(),
                    schema.fields.len()
                )));
            }
            for (field, value) in schema.fields.iter().zip(row) {
                if !field.data_type.accepts(value) {
                    return Err(PipelineError::schema(format!(
                        "row {row_idx} column '{}' holds {value:?}, expected {}",
                        field.name, field.data_type
                    )));
                }
            }
        }
        Ok(Self {
            schema,
            rows,
            index: Vec::new(),
        })
    }

    /// Build a table whose invariants the caller already guarantees.
    pub(crate) fn from_parts(schema: Schema, rows: Vec<Vec<Value>>, index: Vec<String>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == schema.fields.len()));
        Self {
            schema,
            rows,
            index,
        }
    }

    /// Return a copy of this table indexed by `columns`.
    ///
    /// Index columns move to the front in the given order. Fails with
    /// [`PipelineError::Schema`] if `columns` is empty, names an absent column, or the
    /// combined key is not unique.
    pub fn with_index<S: AsRef<str>>(&self, columns: &[S]) -> PipelineResult<Self> {
        if columns.is_empty() {
            return Err(PipelineError::schema("index needs at least one column"));
        }
        let mut positions = Vec::with_capacity(columns.len());
        for name in columns {
            let name = name.as_ref();
            let pos = self
                .schema
                .index_of(name)
                .ok_or_else(|| PipelineError::schema(format!("index column '{name}' does not exist")))?;
            if positions.contains(&pos) {
                return Err(PipelineError::schema(format!("index column '{name}' listed twice")));
            }
            positions.push(pos);
        }

        let names: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
        self.ensure_unique_keys(&positions, &names)?;

        let order: Vec<usize> = positions
            .iter()
            .copied()
            .chain((0..self.schema.fields.len()).filter(|p| !positions.contains(p)))
            .collect();
        let fields = order.iter().map(|&p| self.schema.fields[p].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| order.iter().map(|&p| row[p].clone()).collect())
            .collect();
        let index = columns.iter().map(|c| c.as_ref().to_string()).collect();
        Ok(Self::from_parts(Schema::new(fields), rows, index))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Names of the index columns, outermost first. Empty for the positional index.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.schema.field_names()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    /// Like [`Table::column_index`] but fails with [`PipelineError::Column`].
    pub(crate) fn require_column(&self, name: &str) -> PipelineResult<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::missing_column(name))
    }

    /// Position of a numeric column, failing with [`PipelineError::Column`] otherwise.
    pub(crate) fn require_numeric(&self, name: &str) -> PipelineResult<usize> {
        let idx = self.require_column(name)?;
        let data_type = self.schema.fields[idx].data_type;
        if !data_type.is_numeric() {
            return Err(PipelineError::column(
                name,
                format!("expected a numeric column, found {data_type}"),
            ));
        }
        Ok(idx)
    }

    /// Value at `row` in column `column`, if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Iterate the values of one column, if it exists.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    pub fn is_index_column(&self, name: &str) -> bool {
        self.index.iter().any(|c| c == name)
    }

    /// Positions of numeric columns that are not part of the index.
    pub(crate) fn numeric_data_columns(&self) -> Vec<usize> {
        self.schema
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.data_type.is_numeric() && !self.is_index_column(&f.name))
            .map(|(i, _)| i)
            .collect()
    }

    /// Index key of a row; the row position when the index is positional.
    pub(crate) fn index_key(&self, row: usize) -> RowKey {
        if self.index.is_empty() {
            return vec![KeyValue(Value::Int64(row as i64))];
        }
        self.index
            .iter()
            .filter_map(|name| self.schema.index_of(name))
            .map(|p| KeyValue(self.rows[row][p].clone()))
            .collect()
    }

    /// Group row positions by the values in `columns`, in ascending key order. Rows inside a
    /// group keep their table order.
    pub(crate) fn group_rows(&self, columns: &[usize]) -> BTreeMap<RowKey, Vec<usize>> {
        let mut groups: BTreeMap<RowKey, Vec<usize>> = BTreeMap::new();
        for (i, row) in self.rows.iter().enumerate() {
            let key = columns.iter().map(|&c| KeyValue(row[c].clone())).collect();
            groups.entry(key).or_default().push(i);
        }
        groups
    }

    fn ensure_unique_keys(&self, positions: &[usize], names: &[&str]) -> PipelineResult<()> {
        let mut seen = BTreeSet::new();
        for row in &self.rows {
            let key: RowKey = positions.iter().map(|&p| KeyValue(row[p].clone())).collect();
            if !seen.insert(key.clone()) {
                let shown: Vec<&Value> = key.iter().map(|k| &k.0).collect();
                return Err(PipelineError::schema(format!(
                    "index {names:?} is not unique: key {shown:?} repeats"
                )));
            }
        }
        Ok(())
    }

    /// Copy of this table with column `idx` replaced by `values` of type `data_type`.
    ///
    /// Rewriting an index column fails with [`PipelineError::Schema`] if the new values
    /// make the index keys repeat.
    pub(crate) fn with_column_values(
        &self,
        idx: usize,
        data_type: DataType,
        values: Vec<Value>,
    ) -> PipelineResult<Self> {
        let mut schema = self.schema.clone();
        schema.fields[idx].data_type = data_type;
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| {
                let mut out = row.clone();
                out[idx] = value;
                out
            })
            .collect();
        let table = Self::from_parts(schema, rows, self.index.clone());
        if table.is_index_column(&table.schema.fields[idx].name) {
            let positions: Vec<usize> = table.index.iter().filter_map(|n| table.schema.index_of(n)).collect();
            let names: Vec<&str> = table.index.iter().map(String::as_str).collect();
            table.ensure_unique_keys(&positions, &names)?;
        }
        Ok(table)
    }

    /// Copy of this table with `columns` appended after the existing ones. Each column holds
    /// one value per row.
    pub(crate) fn with_appended_columns(&self, columns: Vec<(Field, Vec<Value>)>) -> Self {
        let mut schema = self.schema.clone();
        let mut rows = self.rows.clone();
        for (field, values) in columns {
            schema.fields.push(field);
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Self::from_parts(schema, rows, self.index.clone())
    }

    /// Create a new table containing only rows that match `predicate`.
    ///
    /// The returned table preserves the schema and index.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self::from_parts(self.schema.clone(), rows, self.index.clone())
    }

    /// Create a new table with the rows at `positions`, in that order.
    pub(crate) fn select_rows(&self, positions: &[usize]) -> Self {
        let rows = positions.iter().map(|&i| self.rows[i].clone()).collect();
        Self::from_parts(self.schema.clone(), rows, self.index.clone())
    }

    pub(crate) fn into_parts(self) -> (Schema, Vec<Vec<Value>>, Vec<String>) {
        (self.schema, self.rows, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("name", DataType::Utf8),
            Field::new("score", DataType::Float64),
        ]);
        Table::new(
            schema,
            vec![
                vec![Value::Int64(2), Value::from("b"), Value::Float64(1.5)],
                vec![Value::Int64(1), Value::from("a"), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn schema_index_of_works() {
        let t = sample_table();
        assert_eq!(t.schema().index_of("id"), Some(0));
        assert_eq!(t.schema().index_of("score"), Some(2));
        assert_eq!(t.schema().index_of("missing"), None);
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let schema = Schema::new(vec![Field::new("a", DataType::Int64), Field::new("b", DataType::Int64)]);
        let err = Table::new(schema, vec![vec![Value::Int64(1)]]).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }

    #[test]
    fn new_rejects_mistyped_cell() {
        let schema = Schema::new(vec![Field::new("a", DataType::Int64)]);
        let err = Table::new(schema, vec![vec![Value::from("x")]]).unwrap_err();
        assert!(err.to_string().contains("column 'a'"));
    }

    #[test]
    fn with_index_moves_columns_to_front() {
        let t = sample_table().with_index(&["name"]).unwrap();
        assert_eq!(t.index(), ["name".to_string()]);
        assert_eq!(t.column_names().collect::<Vec<_>>(), vec!["name", "id", "score"]);
        assert_eq!(t.rows()[0][0], Value::from("b"));
    }

    #[test]
    fn with_index_rejects_duplicate_keys() {
        let schema = Schema::new(vec![Field::new("k", DataType::Utf8)]);
        let t = Table::new(schema, vec![vec![Value::from("x")], vec![Value::from("x")]]).unwrap();
        let err = t.with_index(&["k"]).unwrap_err();
        assert!(err.to_string().contains("not unique"));
    }

    #[test]
    fn total_cmp_orders_numbers_across_types_and_nulls_last() {
        assert_eq!(Value::Int64(1).total_cmp(&Value::Float64(1.0)), Ordering::Equal);
        assert_eq!(Value::Int64(2).total_cmp(&Value::Float64(1.5)), Ordering::Greater);
        assert_eq!(Value::Null.total_cmp(&Value::Int64(i64::MAX)), Ordering::Greater);
        assert_eq!(Value::from("a").total_cmp(&Value::from("b")), Ordering::Less);
    }

    #[test]
    fn cast_follows_scalar_rules() {
        assert_eq!(Value::from("6.0").cast(DataType::Int64), Ok(Value::Int64(6)));
        assert_eq!(Value::Float64(2.9).cast(DataType::Int64), Ok(Value::Int64(2)));
        assert_eq!(Value::Int64(3).cast(DataType::Float64), Ok(Value::Float64(3.0)));
        assert_eq!(Value::Float64(5.0).cast(DataType::Utf8), Ok(Value::from("5.0")));
        assert_eq!(Value::from("yes").cast(DataType::Bool), Ok(Value::Bool(true)));
        assert_eq!(Value::Null.cast(DataType::Int64), Ok(Value::Null));
        assert!(Value::from("fast").cast(DataType::Float64).is_err());
    }

    #[test]
    fn infer_widens_ints_to_floats_and_falls_back_to_any() {
        let ints = [Value::Int64(1), Value::Null, Value::Int64(2)];
        assert_eq!(DataType::infer(&ints), DataType::Int64);
        let mixed = [Value::Int64(1), Value::Float64(2.5)];
        assert_eq!(DataType::infer(&mixed), DataType::Float64);
        let odd = [Value::Int64(1), Value::from("x")];
        assert_eq!(DataType::infer(&odd), DataType::Any);
        assert_eq!(DataType::infer(&[Value::Null]), DataType::Any);
    }

    #[test]
    fn group_rows_orders_keys() {
        let t = sample_table();
        let groups = t.group_rows(&[0]);
        let firsts: Vec<usize> = groups.values().map(|rows| rows[0]).collect();
        assert_eq!(firsts, vec![1, 0]);
    }
}
