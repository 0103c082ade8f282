//! Column type casting.

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::DataType;

use super::Processor;

/// Casts named columns to declared types.
///
/// Types are inferred when data is fetched; this processor pins them down. Columns not
/// mentioned are left untouched and the row order and index are preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizeTypes {
    types: Vec<(String, DataType)>,
}

impl StandardizeTypes {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(|(name, t)| (name.into(), t)).collect(),
        }
    }
}

impl Processor for StandardizeTypes {
    fn name(&self) -> &'static str {
        "standardize_types"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let mut table = input.to_table();
        for (column, target) in &self.types {
            let idx = table.require_column(column)?;
            let mut values = Vec::with_capacity(table.row_count());
            for (row, cells) in table.rows().iter().enumerate() {
                let raw = &cells[idx];
                let cast = raw.cast(*target).map_err(|message| PipelineError::TypeCast {
                    row,
                    column: column.clone(),
                    raw: raw.to_string(),
                    message,
                })?;
                values.push(cast);
            }
            table = table.with_column_values(idx, *target, values)?;
        }
        Ok(input.derive(table))
    }
}

#[cfg(test)]
mod tests {
    use super::StandardizeTypes;
    use crate::error::PipelineError;
    use crate::evaluation::Evaluation;
    use crate::processing::{Processor, Reindex};
    use crate::types::{DataType, Field, Schema, Value};

    fn mixed() -> Evaluation {
        Evaluation::from_rows(
            Schema::new(vec![
                Field::new("a", DataType::Int64),
                Field::new("b", DataType::Utf8),
                Field::new("c", DataType::Utf8),
            ]),
            vec![
                vec![Value::Int64(1), Value::from("6.0"), Value::from("x")],
                vec![Value::Int64(2), Value::from(" 7 "), Value::Null],
            ],
            Some(10),
        )
        .unwrap()
    }

    #[test]
    fn casts_named_columns_only() {
        let out = StandardizeTypes::new([("a", DataType::Float64), ("b", DataType::Int64)])
            .process(&mixed())
            .unwrap();

        let types: Vec<DataType> = out.table().schema().fields.iter().map(|f| f.data_type).collect();
        assert_eq!(types, vec![DataType::Float64, DataType::Int64, DataType::Utf8]);
        assert_eq!(
            out.table().rows()[1],
            vec![Value::Float64(2.0), Value::Int64(7), Value::Null]
        );
        assert_eq!(out.eval_id(), Some(10));
    }

    #[test]
    fn reports_offending_cell() {
        let err = StandardizeTypes::new([("c", DataType::Float64)])
            .process(&mixed())
            .unwrap_err();
        match err {
            PipelineError::TypeCast { row, column, raw, .. } => {
                assert_eq!(row, 0);
                assert_eq!(column, "c");
                assert_eq!(raw, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_column_is_a_column_error() {
        let err = StandardizeTypes::new([("nope", DataType::Utf8)])
            .process(&mixed())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Column { .. }));
    }

    #[test]
    fn casting_an_index_column_keeps_keys_unique() {
        let eval = Evaluation::from_rows(
            Schema::new(vec![Field::new("k", DataType::Float64), Field::new("v", DataType::Int64)]),
            vec![
                vec![Value::Float64(1.2), Value::Int64(1)],
                vec![Value::Float64(1.7), Value::Int64(2)],
            ],
            None,
        )
        .unwrap();
        let indexed = Reindex::new(["k"]).unwrap().process(&eval).unwrap();

        let err = StandardizeTypes::new([("k", DataType::Int64)])
            .process(&indexed)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));

        let out = StandardizeTypes::new([("k", DataType::Utf8)]).process(&indexed).unwrap();
        assert_eq!(out.table().index(), ["k".to_string()]);
    }
}
