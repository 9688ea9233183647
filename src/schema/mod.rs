//! Schema definitions for exemplar storage
//!
//! The exemplar table has two dynamic column groups, one for series labels and
//! one for exemplar labels, plus static timestamp and value columns. Every
//! distinct label name written into a dynamic group becomes its own
//! dictionary-encoded sub-column named `<group>.<label>`.

mod exemplars;

pub use exemplars::{
    exemplar_schema,
    physical_column_name,
    validate_label_name,
    ColumnDefinition,
    ColumnEncoding,
    ColumnRole,
    ColumnType,
    DynamicColumns,
    Schema,
    SchemaDefinition,
    SortDirection,
    SortingColumn,
    StorageLayout,
    COLUMN_EXEMPLAR_LABELS,
    COLUMN_LABELS,
    COLUMN_TIMESTAMP,
    COLUMN_VALUE,
    DYNAMIC_SEPARATOR,
    EXEMPLAR_SCHEMA_NAME,
};
