//! Column expansion through a lookup table.

use std::collections::BTreeMap;

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::types::{DataType, Field, KeyValue, Value};

use super::Processor;

/// Maps every value of one column onto a pair of values written into two new columns.
///
/// Typical use is splitting a combined toolchain name into its synthesis and
/// place-and-route tools. A source value without a mapping entry fails the whole step with
/// [`PipelineError::Lookup`]; rows are never dropped.
#[derive(Debug, Clone)]
pub struct ExpandColumn {
    input: String,
    outputs: [String; 2],
    mapping: BTreeMap<KeyValue, [Value; 2]>,
}

impl ExpandColumn {
    /// Fails with [`PipelineError::Column`] if both outputs share a name.
    pub fn new<I, K, A, B>(
        input: impl Into<String>,
        outputs: (impl Into<String>, impl Into<String>),
        mapping: I,
    ) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = (K, (A, B))>,
        K: Into<Value>,
        A: Into<Value>,
        B: Into<Value>,
    {
        let outputs: [String; 2] = [outputs.0.into(), outputs.1.into()];
        if outputs[0] == outputs[1] {
            return Err(PipelineError::column(&outputs[0], "listed twice as an output column"));
        }
        Ok(Self {
            input: input.into(),
            outputs,
            mapping: mapping
                .into_iter()
                .map(|(k, (a, b))| (KeyValue(k.into()), [a.into(), b.into()]))
                .collect(),
        })
    }
}

impl Processor for ExpandColumn {
    fn name(&self) -> &'static str {
        "expand_column"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let table = input.table();
        let src = table.require_column(&self.input)?;
        for out in &self.outputs {
            if table.column_index(out).is_some() {
                return Err(PipelineError::column(out, "already exists"));
            }
        }

        let mut first = Vec::with_capacity(table.row_count());
        let mut second = Vec::with_capacity(table.row_count());
        for row in table.rows() {
            let key = KeyValue(row[src].clone());
            let [a, b] = self.mapping.get(&key).ok_or_else(|| {
                PipelineError::lookup(format!(
                    "value {:?} of column '{}' has no entry in the mapping",
                    row[src], self.input
                ))
            })?;
            first.push(a.clone());
            second.push(b.clone());
        }

        let columns = vec![
            (Field::new(self.outputs[0].clone(), DataType::infer(&first)), first),
            (Field::new(self.outputs[1].clone(), DataType::infer(&second)), second),
        ];
        Ok(input.derive(table.with_appended_columns(columns)))
    }
}
