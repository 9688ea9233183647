//! Scan result decoding
//!
//! Reads column-major batches back into `(series labels, exemplar)` pairs.
//! String label columns must arrive dictionary encoded; any other physical
//! shape for a label column is a [`Error::Decoding`].

use crate::model::{Exemplar, Label, Labels};
use crate::schema::{
    ColumnRole, Schema, COLUMN_EXEMPLAR_LABELS, COLUMN_LABELS, COLUMN_TIMESTAMP, COLUMN_VALUE,
};
use crate::{Error, Result};

use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int64Type};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_schema::DataType;

/// Which label set a column feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Series,
    Exemplar,
}

/// Supported physical shapes of a label column's dictionary values
#[derive(Clone, Copy)]
enum DictionaryValues<'a> {
    Utf8(&'a arrow_array::StringArray),
    LargeUtf8(&'a arrow_array::LargeStringArray),
    Binary(&'a arrow_array::BinaryArray),
}

impl<'a> DictionaryValues<'a> {
    fn get(self, index: usize) -> Result<Option<&'a str>> {
        let value = match self {
            DictionaryValues::Utf8(values) => {
                if values.is_null(index) {
                    None
                } else {
                    Some(values.value(index))
                }
            }
            DictionaryValues::LargeUtf8(values) => {
                if values.is_null(index) {
                    None
                } else {
                    Some(values.value(index))
                }
            }
            DictionaryValues::Binary(values) => {
                if values.is_null(index) {
                    None
                } else {
                    Some(std::str::from_utf8(values.value(index)).map_err(|e| {
                        Error::Decoding(format!("label value is not valid UTF-8: {}", e))
                    })?)
                }
            }
        };
        Ok(value)
    }
}

/// A label column ready for row access
struct LabelColumn<'a> {
    name: &'a str,
    target: Target,
    keys: Vec<usize>,
    validity: &'a dyn Array,
    values: DictionaryValues<'a>,
}

impl<'a> LabelColumn<'a> {
    fn new(name: &'a str, target: Target, array: &'a ArrayRef) -> Result<Self> {
        let dictionary = array.as_any_dictionary_opt().ok_or_else(|| {
            Error::Decoding(format!(
                "label column '{}' is {} instead of dictionary encoded",
                name,
                array.data_type()
            ))
        })?;
        let values = dictionary.values();
        let values = match values.data_type() {
            DataType::Utf8 => DictionaryValues::Utf8(values.as_string::<i32>()),
            DataType::LargeUtf8 => DictionaryValues::LargeUtf8(values.as_string::<i64>()),
            DataType::Binary => DictionaryValues::Binary(values.as_binary::<i32>()),
            other => {
                return Err(Error::Decoding(format!(
                    "unsupported dictionary value type {} in column '{}'",
                    other, name
                )))
            }
        };
        Ok(Self {
            name,
            target,
            keys: dictionary.normalized_keys(),
            validity: array.as_ref(),
            values,
        })
    }

    /// The row's label value; null and empty mean the label is absent
    fn value(&self, row: usize) -> Result<Option<&'a str>> {
        if self.validity.is_null(row) {
            return Ok(None);
        }
        let value = self.values.get(self.keys[row])?;
        Ok(value.filter(|v| !v.is_empty()))
    }
}

/// Decode every row of `batch`.
///
/// Columns are classified against `schema`: dynamic sub-columns of the
/// series-label and exemplar-label groups become labels, `timestamp` and
/// `value` are read as scalars. Unknown columns are ignored.
pub fn decode(batch: &RecordBatch, schema: &Schema) -> Result<Vec<(Labels, Exemplar)>> {
    let batch_schema = batch.schema();
    let mut label_columns = Vec::new();
    let mut timestamps = None;
    let mut values = None;

    for (field, array) in batch_schema.fields().iter().zip(batch.columns()) {
        match schema.classify(field.name()) {
            Some(ColumnRole::Dynamic { group, label }) => {
                let target = match group.name.as_str() {
                    COLUMN_LABELS => Target::Series,
                    COLUMN_EXEMPLAR_LABELS => Target::Exemplar,
                    _ => continue,
                };
                label_columns.push(LabelColumn::new(label, target, array)?);
            }
            Some(ColumnRole::Static(column)) if column.name == COLUMN_TIMESTAMP => {
                timestamps = Some(array.as_primitive_opt::<Int64Type>().ok_or_else(|| {
                    Error::Decoding(format!("timestamp column is {}", array.data_type()))
                })?);
            }
            Some(ColumnRole::Static(column)) if column.name == COLUMN_VALUE => {
                values = Some(array.as_primitive_opt::<Float64Type>().ok_or_else(|| {
                    Error::Decoding(format!("value column is {}", array.data_type()))
                })?);
            }
            _ => {}
        }
    }

    let timestamps = timestamps
        .ok_or_else(|| Error::Decoding("scan result has no timestamp column".to_string()))?;
    let values =
        values.ok_or_else(|| Error::Decoding("scan result has no value column".to_string()))?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut series = Vec::new();
        let mut exemplar_labels = Vec::new();
        for column in &label_columns {
            if let Some(value) = column.value(row)? {
                let label = Label::new(column.name, value);
                match column.target {
                    Target::Series => series.push(label),
                    Target::Exemplar => exemplar_labels.push(label),
                }
            }
        }
        rows.push((
            Labels::new(series),
            Exemplar::new(
                Labels::new(exemplar_labels),
                timestamps.value(row),
                values.value(row),
            ),
        ));
    }
    Ok(rows)
}
