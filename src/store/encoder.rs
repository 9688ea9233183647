//! Row encoding
//!
//! One exemplar becomes a one-row [`RecordBatch`] whose column set is the
//! schema resolved against the label names of this write only.

use crate::model::{Exemplar, Labels};
use crate::schema::{
    ColumnRole, ColumnType, DynamicColumns, Schema, COLUMN_EXEMPLAR_LABELS, COLUMN_LABELS,
    COLUMN_TIMESTAMP, COLUMN_VALUE,
};
use crate::{Error, Result};

use arrow_array::types::Int32Type;
use arrow_array::{ArrayRef, DictionaryArray, Float64Array, Int64Array, RecordBatch};
use std::sync::Arc;

/// Encode a single exemplar of `series` into a row.
///
/// Fails with [`Error::Encoding`] on duplicate or malformed label names and
/// when the resulting columns do not form a valid batch.
pub fn encode_row(schema: &Schema, series: &Labels, exemplar: &Exemplar) -> Result<RecordBatch> {
    let groups = [(COLUMN_LABELS, series), (COLUMN_EXEMPLAR_LABELS, &exemplar.labels)];

    let mut dynamic = DynamicColumns::new();
    for (group, labels) in groups {
        if let Some(name) = labels.duplicate_name() {
            return Err(Error::Encoding(format!(
                "duplicate label '{}' in {}",
                name, group
            )));
        }
        if !labels.is_empty() {
            dynamic.insert(group.to_string(), labels.names().map(String::from).collect());
        }
    }

    let resolved = schema.resolve(&dynamic).map_err(|e| match e {
        Error::Encoding(msg) => Error::Encoding(msg),
        other => Error::Encoding(other.to_string()),
    })?;

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(resolved.fields().len());
    for field in resolved.fields() {
        let column: ArrayRef = match schema.classify(field.name()) {
            Some(ColumnRole::Dynamic { group, label }) => {
                let labels = if group.name == COLUMN_LABELS {
                    series
                } else {
                    &exemplar.labels
                };
                let value = labels.get(label).ok_or_else(|| {
                    Error::Encoding(format!("no value for column '{}'", field.name()))
                })?;
                let array: DictionaryArray<Int32Type> = vec![value].into_iter().collect();
                Arc::new(array)
            }
            Some(ColumnRole::Static(column)) => {
                match (column.name.as_str(), column.layout.column_type) {
                    (COLUMN_TIMESTAMP, ColumnType::Int64) => {
                        Arc::new(Int64Array::from(vec![exemplar.timestamp]))
                    }
                    (COLUMN_VALUE, ColumnType::Double) => {
                        Arc::new(Float64Array::from(vec![exemplar.value]))
                    }
                    (name, _) => {
                        return Err(Error::Encoding(format!(
                            "no source for static column '{}'",
                            name
                        )))
                    }
                }
            }
            None => {
                return Err(Error::Encoding(format!(
                    "resolved column '{}' is not declared",
                    field.name()
                )))
            }
        };
        columns.push(column);
    }

    RecordBatch::try_new(resolved, columns).map_err(|e| Error::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::exemplar_schema;
    use arrow_array::cast::AsArray;
    use arrow_array::types::Float64Type;
    use arrow_array::Array;

    fn names(batch: &RecordBatch) -> Vec<String> {
        batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    #[test]
    fn test_row_columns_follow_sorted_schema() {
        let schema = exemplar_schema().unwrap();
        let series = Labels::from_pairs([("job", "a"), ("instance", "x")]);
        let exemplar = Exemplar::new(Labels::from_pairs([("trace_id", "t1")]), 1000, 3.5);

        let batch = encode_row(&schema, &series, &exemplar).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(
            names(&batch),
            vec![
                "exemplar_labels.trace_id",
                "labels.instance",
                "labels.job",
                "timestamp",
                "value"
            ]
        );

        let job = batch
            .column_by_name("labels.job")
            .unwrap()
            .as_dictionary::<Int32Type>();
        let values = job.values().as_string::<i32>();
        assert_eq!(values.value(job.keys().value(0) as usize), "a");
        let value = batch
            .column_by_name("value")
            .unwrap()
            .as_primitive::<Float64Type>();
        assert_eq!(value.value(0), 3.5);
    }

    #[test]
    fn test_only_this_writes_labels_become_columns() {
        let schema = exemplar_schema().unwrap();
        let batch = encode_row(
            &schema,
            &Labels::from_pairs([("job", "b")]),
            &Exemplar::new(Labels::empty(), 5, 1.0),
        )
        .unwrap();
        assert_eq!(names(&batch), vec!["labels.job", "timestamp", "value"]);
    }

    #[test]
    fn test_empty_value_is_stored_as_is() {
        let schema = exemplar_schema().unwrap();
        let batch = encode_row(
            &schema,
            &Labels::from_pairs([("job", "a"), ("env", "")]),
            &Exemplar::new(Labels::empty(), 5, 1.0),
        )
        .unwrap();
        let env = batch.column_by_name("labels.env").unwrap();
        assert_eq!(env.null_count(), 0);
    }

    #[test]
    fn test_malformed_label_name_is_encoding_error() {
        let schema = exemplar_schema().unwrap();
        let err = encode_row(
            &schema,
            &Labels::from_pairs([("bad-name", "a")]),
            &Exemplar::new(Labels::empty(), 5, 1.0),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_duplicate_label_name_is_encoding_error() {
        let schema = exemplar_schema().unwrap();
        let exemplar = Exemplar::new(
            Labels::new(vec![
                crate::model::Label::new("trace_id", "a"),
                crate::model::Label::new("trace_id", "b"),
            ]),
            5,
            1.0,
        );
        let err = encode_row(&schema, &Labels::from_pairs([("job", "a")]), &exemplar).unwrap_err();
        assert!(err.to_string().contains("duplicate label"));
    }
}
