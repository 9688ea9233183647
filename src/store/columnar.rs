//! Columnar exemplar store
//!
//! Append encodes one row per exemplar and inserts it. Select translates
//! every matcher group first, then runs one scan per group and merges the
//! decoded rows by series.

use super::telemetry;
use super::{decoder, encoder, grouper::SeriesGrouper, translate, ExemplarStore};
use crate::engine::{ColumnarEngine, Projection, ScanRequest};
use crate::model::{Exemplar, Labels, Matcher, QueryResult};
use crate::schema::{
    exemplar_schema, Schema, COLUMN_EXEMPLAR_LABELS, COLUMN_LABELS, COLUMN_TIMESTAMP,
    COLUMN_VALUE,
};
use crate::{Error, Result};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

pub struct ColumnarExemplarStore {
    engine: Arc<dyn ColumnarEngine>,
    schema: Schema,
    table: String,
}

impl ColumnarExemplarStore {
    /// Create the exemplar table on `engine` (or open it) and return the store
    pub async fn open(engine: Arc<dyn ColumnarEngine>, table: &str) -> Result<Self> {
        let schema = exemplar_schema()?;
        engine.create_table(table, schema.clone()).await?;
        Ok(Self {
            engine,
            schema,
            table: table.to_string(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn projection() -> Vec<Projection> {
        vec![
            Projection::Dynamic(COLUMN_LABELS.to_string()),
            Projection::Dynamic(COLUMN_EXEMPLAR_LABELS.to_string()),
            Projection::Column(COLUMN_TIMESTAMP.to_string()),
            Projection::Column(COLUMN_VALUE.to_string()),
        ]
    }

    async fn select_groups(
        &self,
        start: i64,
        end: i64,
        matchers: &[Vec<Matcher>],
    ) -> Result<SeriesGrouper> {
        // Reject bad matchers before anything is scanned.
        let filters = matchers
            .iter()
            .map(|group| translate(group, start, end))
            .collect::<Result<Vec<_>>>()?;

        let mut grouper = SeriesGrouper::new();
        for (index, filter) in filters.into_iter().enumerate() {
            let Some(filter) = filter else {
                debug!(group = index, "Skipping empty matcher group");
                continue;
            };

            let mut rows = Vec::new();
            let schema = &self.schema;
            let scan = ScanRequest::table(&self.table)
                .filter(filter)
                .project(Self::projection())
                .execute(self.engine.as_ref(), |batch| {
                    rows.extend(decoder::decode(&batch, schema)?);
                    Ok(())
                })
                .await;

            match scan {
                Ok(()) => {
                    grouper.start_scan();
                    grouper.extend(rows);
                }
                Err(error @ Error::Decoding(_)) => {
                    warn!(group = index, error = %error, "Dropping matcher group with undecodable scan result");
                    telemetry::record_group_failure(error.class());
                }
                Err(error) => return Err(error),
            }
        }
        Ok(grouper)
    }
}

#[async_trait]
impl ExemplarStore for ColumnarExemplarStore {
    async fn append(&self, series: &Labels, exemplar: &Exemplar) -> Result<()> {
        let started = Instant::now();
        let result = async {
            let row = encoder::encode_row(&self.schema, series, exemplar)?;
            self.engine.insert(&self.table, row).await
        }
        .await;

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(()) => telemetry::record_append("success", None, elapsed),
            Err(error) => telemetry::record_append("error", Some(error.class()), elapsed),
        }
        result
    }

    async fn select(
        &self,
        start: i64,
        end: i64,
        matchers: &[Vec<Matcher>],
    ) -> Result<Vec<QueryResult>> {
        let started = Instant::now();
        let run_id = std::env::var(crate::telemetry::ENV_TELEMETRY_RUN_ID)
            .ok()
            .filter(|value| !value.trim().is_empty());
        let span = info_span!(
            "store.select",
            table = %self.table,
            start,
            end,
            groups = matchers.len(),
            run_id = run_id.as_deref().unwrap_or("none")
        );

        let result = self
            .select_groups(start, end, matchers)
            .instrument(span)
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(grouper) => {
                telemetry::record_select(telemetry::SelectMetrics {
                    outcome: "success",
                    error_class: None,
                    duration_seconds: elapsed,
                    series_returned: grouper.series_count() as u64,
                    exemplars_returned: grouper.exemplar_count() as u64,
                });
                Ok(grouper.finish())
            }
            Err(error) => {
                telemetry::record_select(telemetry::SelectMetrics {
                    outcome: "error",
                    error_class: Some(error.class()),
                    duration_seconds: elapsed,
                    series_returned: 0,
                    exemplars_returned: 0,
                });
                Err(error)
            }
        }
    }
}
