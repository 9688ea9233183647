//! Exemplar table schema
//!
//! Column groups are declared once in a [`SchemaDefinition`]. A validated
//! [`Schema`] keeps its columns sorted by name; that order is the index space
//! rows are written in and scan results are read from. Dynamic columns are
//! resolved per write against the label names actually present.

use crate::{Error, Result};

use arrow_schema::{DataType, Field, Schema as ArrowSchema, SchemaRef};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Series-label column group
pub const COLUMN_LABELS: &str = "labels";
/// Exemplar-label column group
pub const COLUMN_EXEMPLAR_LABELS: &str = "exemplar_labels";
/// Exemplar timestamp in milliseconds
pub const COLUMN_TIMESTAMP: &str = "timestamp";
/// Exemplar value
pub const COLUMN_VALUE: &str = "value";

pub const EXEMPLAR_SCHEMA_NAME: &str = "exemplars_schema";

/// Separates a dynamic group name from its label name
pub const DYNAMIC_SEPARATOR: char = '.';

/// Label names per dynamic group, used to resolve a concrete column set
pub type DynamicColumns = BTreeMap<String, BTreeSet<String>>;

/// Logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Int64,
    Double,
}

/// Physical encoding of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnEncoding {
    Plain,
    /// Distinct values stored once, rows hold indices
    RleDictionary,
}

/// Storage characteristics of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLayout {
    pub column_type: ColumnType,
    pub encoding: ColumnEncoding,
    pub nullable: bool,
}

impl StorageLayout {
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            encoding: ColumnEncoding::Plain,
            nullable: false,
        }
    }

    pub fn encoding(mut self, encoding: ColumnEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Arrow type of a column with this layout
    pub fn data_type(&self) -> DataType {
        match (self.column_type, self.encoding) {
            (ColumnType::String, ColumnEncoding::RleDictionary) => {
                DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
            }
            (ColumnType::String, ColumnEncoding::Plain) => DataType::Utf8,
            (ColumnType::Int64, _) => DataType::Int64,
            (ColumnType::Double, _) => DataType::Float64,
        }
    }
}

/// Column declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub layout: StorageLayout,
    /// One sub-column per distinct label name written
    pub dynamic: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, layout: StorageLayout) -> Self {
        Self {
            name: name.into(),
            layout,
            dynamic: false,
        }
    }

    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort key component of the physical storage order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortingColumn {
    pub name: String,
    pub direction: SortDirection,
    pub nulls_first: bool,
}

impl SortingColumn {
    pub fn ascending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: SortDirection::Ascending,
            nulls_first: true,
        }
    }
}

/// Declarative schema, validated by [`Schema::from_definition`]
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub sorting_columns: Vec<SortingColumn>,
}

impl SchemaDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn sorted_by(mut self, column: SortingColumn) -> Self {
        self.sorting_columns.push(column);
        self
    }
}

/// How a physical column relates to the declared schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnRole<'a> {
    Static(&'a ColumnDefinition),
    Dynamic {
        group: &'a ColumnDefinition,
        label: &'a str,
    },
}

/// Validated, immutable table schema
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    /// Sorted by name
    columns: Vec<ColumnDefinition>,
    sorting_columns: Vec<SortingColumn>,
}

impl Schema {
    /// Validate a definition.
    ///
    /// Fails with [`Error::Schema`] on duplicate or malformed column names,
    /// dynamic columns that are not nullable strings, and sorting columns
    /// that reference undeclared columns.
    pub fn from_definition(definition: SchemaDefinition) -> Result<Self> {
        if definition.name.trim().is_empty() {
            return Err(Error::Schema("schema name cannot be empty".to_string()));
        }
        if definition.columns.is_empty() {
            return Err(Error::Schema(format!(
                "schema '{}' declares no columns",
                definition.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &definition.columns {
            if column.name.is_empty() || column.name.contains(DYNAMIC_SEPARATOR) {
                return Err(Error::Schema(format!(
                    "invalid column name '{}'",
                    column.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(Error::Schema(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
            if column.dynamic && column.layout.column_type != ColumnType::String {
                return Err(Error::Schema(format!(
                    "dynamic column '{}' must be string typed",
                    column.name
                )));
            }
            if column.dynamic && !column.layout.nullable {
                return Err(Error::Schema(format!(
                    "dynamic column '{}' must be nullable",
                    column.name
                )));
            }
            if column.layout.encoding == ColumnEncoding::RleDictionary
                && column.layout.column_type != ColumnType::String
            {
                return Err(Error::Schema(format!(
                    "dictionary encoding is only supported for string column '{}'",
                    column.name
                )));
            }
        }

        let mut sort_seen = HashSet::new();
        for sorting in &definition.sorting_columns {
            if !seen.contains(sorting.name.as_str()) {
                return Err(Error::Schema(format!(
                    "sorting column '{}' is not declared",
                    sorting.name
                )));
            }
            if !sort_seen.insert(sorting.name.as_str()) {
                return Err(Error::Schema(format!(
                    "sorting column '{}' listed twice",
                    sorting.name
                )));
            }
        }

        let mut columns = definition.columns;
        columns.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            name: definition.name,
            columns,
            sorting_columns: definition.sorting_columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All declared columns, sorted by name
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn sorting_columns(&self) -> &[SortingColumn] {
        &self.sorting_columns
    }

    /// Classify a physical column name against the declared columns
    pub fn classify<'a>(&'a self, physical: &'a str) -> Option<ColumnRole<'a>> {
        if let Some((group, label)) = physical.split_once(DYNAMIC_SEPARATOR) {
            return self
                .column(group)
                .filter(|column| column.dynamic)
                .map(|group| ColumnRole::Dynamic { group, label });
        }
        self.column(physical)
            .filter(|column| !column.dynamic)
            .map(ColumnRole::Static)
    }

    /// Resolve the concrete Arrow schema for the given dynamic label names.
    ///
    /// Fields follow the sorted column order; sub-columns of a dynamic group
    /// are ordered by label name. Groups absent from `dynamic` contribute no
    /// fields.
    pub fn resolve(&self, dynamic: &DynamicColumns) -> Result<SchemaRef> {
        for group in dynamic.keys() {
            match self.column(group) {
                Some(column) if column.dynamic => {}
                _ => {
                    return Err(Error::Schema(format!(
                        "'{}' is not a dynamic column of schema '{}'",
                        group, self.name
                    )))
                }
            }
        }

        let mut fields = Vec::new();
        for column in &self.columns {
            if column.dynamic {
                let Some(labels) = dynamic.get(&column.name) else {
                    continue;
                };
                for label in labels {
                    validate_label_name(label)?;
                    fields.push(Field::new(
                        physical_column_name(&column.name, label),
                        column.layout.data_type(),
                        true,
                    ));
                }
            } else {
                fields.push(Field::new(
                    &column.name,
                    column.layout.data_type(),
                    column.layout.nullable,
                ));
            }
        }

        Ok(Arc::new(ArrowSchema::new(fields)))
    }
}

/// Physical name of a dynamic sub-column
pub fn physical_column_name(group: &str, label: &str) -> String {
    format!("{}{}{}", group, DYNAMIC_SEPARATOR, label)
}

/// Check that a label name can become a sub-column name.
///
/// Accepts `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn validate_label_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Encoding(format!("invalid label name '{}'", name)))
    }
}

/// The exemplar table schema
pub fn exemplar_schema() -> Result<Schema> {
    let label_layout = StorageLayout::new(ColumnType::String)
        .encoding(ColumnEncoding::RleDictionary)
        .nullable(true);

    Schema::from_definition(
        SchemaDefinition::new(EXEMPLAR_SCHEMA_NAME)
            .with_column(ColumnDefinition::new(COLUMN_LABELS, label_layout).dynamic(true))
            .with_column(
                ColumnDefinition::new(COLUMN_EXEMPLAR_LABELS, label_layout).dynamic(true),
            )
            .with_column(ColumnDefinition::new(
                COLUMN_TIMESTAMP,
                StorageLayout::new(ColumnType::Int64),
            ))
            .with_column(ColumnDefinition::new(
                COLUMN_VALUE,
                StorageLayout::new(ColumnType::Double),
            ))
            .sorted_by(SortingColumn::ascending(COLUMN_LABELS))
            .sorted_by(SortingColumn::ascending(COLUMN_EXEMPLAR_LABELS))
            .sorted_by(SortingColumn::ascending(COLUMN_TIMESTAMP)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic(entries: &[(&str, &[&str])]) -> DynamicColumns {
        entries
            .iter()
            .map(|(group, labels)| {
                (
                    group.to_string(),
                    labels.iter().map(|l| l.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_exemplar_schema_columns_are_sorted() {
        let schema = exemplar_schema().unwrap();
        let names: Vec<_> = schema.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![COLUMN_EXEMPLAR_LABELS, COLUMN_LABELS, COLUMN_TIMESTAMP, COLUMN_VALUE]
        );
        let sort: Vec<_> = schema
            .sorting_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(sort, vec![COLUMN_LABELS, COLUMN_EXEMPLAR_LABELS, COLUMN_TIMESTAMP]);
    }

    #[test]
    fn test_resolve_orders_fields_by_group_then_label() {
        let schema = exemplar_schema().unwrap();
        let resolved = schema
            .resolve(&dynamic(&[
                (COLUMN_LABELS, &["job", "instance"]),
                (COLUMN_EXEMPLAR_LABELS, &["trace_id"]),
            ]))
            .unwrap();

        let names: Vec<_> = resolved.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec![
                "exemplar_labels.trace_id",
                "labels.instance",
                "labels.job",
                "timestamp",
                "value"
            ]
        );
        let job = resolved.field_with_name("labels.job").unwrap();
        assert!(matches!(job.data_type(), DataType::Dictionary(_, _)));
        assert!(job.is_nullable());
        assert_eq!(
            resolved.field_with_name(COLUMN_TIMESTAMP).unwrap().data_type(),
            &DataType::Int64
        );
    }

    #[test]
    fn test_resolve_rejects_malformed_label_name() {
        let schema = exemplar_schema().unwrap();
        let err = schema
            .resolve(&dynamic(&[(COLUMN_LABELS, &["bad-name"])]))
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_resolve_rejects_static_column_as_group() {
        let schema = exemplar_schema().unwrap();
        let err = schema
            .resolve(&dynamic(&[(COLUMN_TIMESTAMP, &["x"])]))
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_duplicate_columns_are_rejected() {
        let layout = StorageLayout::new(ColumnType::Int64);
        let err = Schema::from_definition(
            SchemaDefinition::new("dup")
                .with_column(ColumnDefinition::new("a", layout))
                .with_column(ColumnDefinition::new("a", layout)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_dynamic_column_must_be_nullable_string() {
        let err = Schema::from_definition(SchemaDefinition::new("bad").with_column(
            ColumnDefinition::new("labels", StorageLayout::new(ColumnType::Int64)).dynamic(true),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("string typed"));
    }

    #[test]
    fn test_unknown_sorting_column_is_rejected() {
        let err = Schema::from_definition(
            SchemaDefinition::new("bad")
                .with_column(ColumnDefinition::new(
                    "timestamp",
                    StorageLayout::new(ColumnType::Int64),
                ))
                .sorted_by(SortingColumn::ascending("missing")),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_classify_physical_columns() {
        let schema = exemplar_schema().unwrap();
        match schema.classify("labels.job") {
            Some(ColumnRole::Dynamic { group, label }) => {
                assert_eq!(group.name, COLUMN_LABELS);
                assert_eq!(label, "job");
            }
            other => panic!("unexpected role {:?}", other),
        }
        assert!(matches!(
            schema.classify(COLUMN_VALUE),
            Some(ColumnRole::Static(_))
        ));
        assert!(schema.classify("labels").is_none());
        assert!(schema.classify("timestamp.x").is_none());
        assert!(schema.classify("unknown").is_none());
    }

    #[test]
    fn test_label_name_validation() {
        assert!(validate_label_name("trace_id").is_ok());
        assert!(validate_label_name("_private").is_ok());
        assert!(validate_label_name("").is_err());
        assert!(validate_label_name("1abc").is_err());
        assert!(validate_label_name("a.b").is_err());
    }
}
