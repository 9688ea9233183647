//! In-memory columnar engine powered by DataFusion
//!
//! Each table keeps its inserted record batches plus a grow-only registry of
//! the dynamic sub-columns seen so far. A scan aligns every batch to the union
//! of known sub-columns (missing cells become null), then filters, sorts by
//! the schema's sorting columns and projects with DataFusion.

use super::{ColumnarEngine, EngineConfig, Projection, ScanRequest};
use crate::schema::{validate_label_name, ColumnRole, DynamicColumns, Schema, SortDirection};
use crate::{Error, Result};

use arrow::array::new_null_array;
use arrow::compute::concat_batches;
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use async_trait::async_trait;
use datafusion::prelude::*;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rows of one table
#[derive(Debug)]
struct MemoryTable {
    schema: Schema,
    /// Every dynamic sub-column ever written, never shrinks
    dynamic: DynamicColumns,
    batches: Vec<RecordBatch>,
    row_count: usize,
    size_bytes: usize,
}

impl MemoryTable {
    fn new(schema: Schema) -> Self {
        Self {
            schema,
            dynamic: DynamicColumns::new(),
            batches: Vec::new(),
            row_count: 0,
            size_bytes: 0,
        }
    }

    /// Check a batch against the declared columns and register its
    /// dynamic sub-columns.
    fn append(&mut self, batch: RecordBatch) -> Result<()> {
        let batch_schema = batch.schema();
        let mut new_columns: Vec<(String, String)> = Vec::new();

        for field in batch_schema.fields() {
            let expected = match self.schema.classify(field.name()) {
                Some(ColumnRole::Static(column)) => column.layout.data_type(),
                Some(ColumnRole::Dynamic { group, label }) => {
                    check_sub_column(field.name(), label)?;
                    new_columns.push((group.name.clone(), label.to_string()));
                    group.layout.data_type()
                }
                None => {
                    return Err(Error::Engine(format!(
                        "column '{}' is not part of schema '{}'",
                        field.name(),
                        self.schema.name()
                    )))
                }
            };
            if field.data_type() != &expected {
                return Err(Error::Engine(format!(
                    "column '{}' has type {}, expected {}",
                    field.name(),
                    field.data_type(),
                    expected
                )));
            }
        }

        for column in self.schema.columns().iter().filter(|c| !c.dynamic) {
            if batch_schema.field_with_name(&column.name).is_err() {
                return Err(Error::Engine(format!(
                    "missing required column '{}'",
                    column.name
                )));
            }
        }

        for (group, label) in new_columns {
            self.dynamic.entry(group).or_default().insert(label);
        }
        self.row_count += batch.num_rows();
        self.size_bytes += batch.get_array_memory_size();
        self.batches.push(batch);
        Ok(())
    }

    /// Merge buffered batches into a single batch over the current columns
    fn consolidate(&mut self) -> Result<()> {
        if self.batches.len() < 2 {
            return Ok(());
        }
        let resolved = self.schema.resolve(&self.dynamic)?;
        let merged = align_and_concat(&resolved, &self.batches)?;
        self.size_bytes = merged.get_array_memory_size();
        self.batches = vec![merged];
        Ok(())
    }
}

/// DataFusion-backed engine holding all tables in memory
#[derive(Debug)]
pub struct MemoryEngine {
    config: EngineConfig,
    tables: RwLock<HashMap<String, Arc<RwLock<MemoryTable>>>>,
}

impl MemoryEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(HashMap::new()),
        }
    }

    fn table(&self, name: &str) -> Result<Arc<RwLock<MemoryTable>>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Engine(format!("table '{}' not found", name)))
    }

    /// Number of rows stored in a table
    pub fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.table(table)?.read().row_count)
    }

    /// Approximate memory held by a table
    pub fn size_bytes(&self, table: &str) -> Result<usize> {
        Ok(self.table(table)?.read().size_bytes)
    }

    fn session(&self) -> SessionContext {
        let config = SessionConfig::new()
            .with_batch_size(self.config.batch_size)
            .with_target_partitions(self.config.target_partitions.max(1));
        SessionContext::new_with_config(config)
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[async_trait]
impl ColumnarEngine for MemoryEngine {
    async fn create_table(&self, name: &str, schema: Schema) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(name) {
            let existing = existing.read();
            if existing.schema.name() != schema.name() {
                return Err(Error::Engine(format!(
                    "table '{}' already exists with schema '{}'",
                    name,
                    existing.schema.name()
                )));
            }
            return Ok(());
        }
        debug!(table = name, schema = schema.name(), "Creating table");
        tables.insert(name.to_string(), Arc::new(RwLock::new(MemoryTable::new(schema))));
        Ok(())
    }

    async fn insert(&self, table: &str, batch: RecordBatch) -> Result<()> {
        if batch.num_rows() == 0 {
            return Ok(());
        }
        let table = self.table(table)?;
        let mut table = table.write();
        table.append(batch)?;
        if table.batches.len() >= self.config.consolidate_threshold.max(2) {
            // The row is stored either way; buffered batches stay as they are.
            if let Err(e) = table.consolidate() {
                warn!(table = %table.schema.name(), error = %e, "Consolidation failed");
            }
        }
        Ok(())
    }

    async fn scan(
        &self,
        request: ScanRequest,
        sink: &mut (dyn FnMut(RecordBatch) -> Result<()> + Send),
    ) -> Result<()> {
        let table = self.table(&request.table)?;

        // Snapshot under the lock; no await while it is held.
        let (schema, resolved, data) = {
            let table = table.read();
            let mut dynamic = table.dynamic.clone();
            if let Some(filter) = &request.filter {
                for column in filter.columns() {
                    match table.schema.classify(column) {
                        Some(ColumnRole::Dynamic { group, label }) => {
                            check_sub_column(column, label)?;
                            dynamic
                                .entry(group.name.clone())
                                .or_default()
                                .insert(label.to_string());
                        }
                        Some(ColumnRole::Static(_)) => {}
                        None => {
                            return Err(Error::Engine(format!(
                                "filter references unknown column '{}'",
                                column
                            )))
                        }
                    }
                }
            }
            let resolved = table.schema.resolve(&dynamic)?;
            let data = align_and_concat(&resolved, &table.batches)?;
            (table.schema.clone(), resolved, data)
        };

        let ctx = self.session();
        let mut df = ctx.read_batch(data)?;

        if let Some(filter) = &request.filter {
            df = df.filter(filter.to_expr())?;
        }

        let sort = sort_exprs(&schema, &resolved);
        if !sort.is_empty() {
            df = df.sort(sort)?;
        }

        let projected = projected_columns(&schema, &resolved, &request.projection)?;
        if !projected.is_empty() {
            df = df.select(projected.iter().map(|name| ident(name)).collect())?;
        }

        let mut stream = df.execute_stream().await?;
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                sink(batch)?;
            }
        }
        Ok(())
    }
}

/// Sub-column labels must be valid label names, or no later scan could
/// resolve the table
fn check_sub_column(column: &str, label: &str) -> Result<()> {
    validate_label_name(label)
        .map_err(|_| Error::Engine(format!("invalid sub-column name '{}'", column)))
}

/// Re-shape batches onto `resolved`, filling missing sub-columns with nulls
fn align_and_concat(resolved: &SchemaRef, batches: &[RecordBatch]) -> Result<RecordBatch> {
    let aligned = batches
        .iter()
        .map(|batch| {
            let columns = resolved
                .fields()
                .iter()
                .map(|field| {
                    batch
                        .column_by_name(field.name())
                        .cloned()
                        .unwrap_or_else(|| new_null_array(field.data_type(), batch.num_rows()))
                })
                .collect();
            RecordBatch::try_new(resolved.clone(), columns)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if aligned.is_empty() {
        return Ok(RecordBatch::new_empty(resolved.clone()));
    }
    Ok(concat_batches(resolved, &aligned)?)
}

/// Sort keys in storage order; a dynamic sorting column expands to its
/// sub-columns in name order
fn sort_exprs(schema: &Schema, resolved: &SchemaRef) -> Vec<Expr> {
    let mut exprs = Vec::new();
    for sorting in schema.sorting_columns() {
        let asc = sorting.direction == SortDirection::Ascending;
        let Some(column) = schema.column(&sorting.name) else {
            continue;
        };
        if column.dynamic {
            for field in resolved.fields() {
                if matches!(
                    schema.classify(field.name()),
                    Some(ColumnRole::Dynamic { group, .. }) if group.name == column.name
                ) {
                    exprs.push(ident(field.name()).sort(asc, sorting.nulls_first));
                }
            }
        } else if resolved.field_with_name(&column.name).is_ok() {
            exprs.push(ident(&column.name).sort(asc, sorting.nulls_first));
        }
    }
    exprs
}

fn projected_columns(
    schema: &Schema,
    resolved: &SchemaRef,
    projection: &[Projection],
) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for item in projection {
        match item {
            Projection::Column(name) => {
                if resolved.field_with_name(name).is_err() {
                    return Err(Error::Engine(format!(
                        "projected column '{}' does not exist",
                        name
                    )));
                }
                names.push(name.clone());
            }
            Projection::Dynamic(group) => {
                for field in resolved.fields() {
                    if matches!(
                        schema.classify(field.name()),
                        Some(ColumnRole::Dynamic { group: g, .. }) if &g.name == group
                    ) {
                        names.push(field.name().clone());
                    }
                }
            }
        }
    }
    Ok(names)
}
