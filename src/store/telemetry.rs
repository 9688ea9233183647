//! Store telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct StoreInstruments {
    append_requests: Counter<u64>,
    append_duration_seconds: Histogram<f64>,
    select_requests: Counter<u64>,
    select_duration_seconds: Histogram<f64>,
    select_series_returned: Histogram<u64>,
    select_exemplars_returned: Histogram<u64>,
    select_group_failures: Counter<u64>,
}

fn instruments() -> &'static StoreInstruments {
    static INSTRUMENTS: OnceLock<StoreInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("exemplars.store");
        StoreInstruments {
            append_requests: meter
                .u64_counter("exemplars.store.append.requests")
                .with_description("Exemplar appends by outcome")
                .init(),
            append_duration_seconds: meter
                .f64_histogram("exemplars.store.append.duration")
                .with_description("Encode and insert latency per exemplar")
                .with_unit("s")
                .init(),
            select_requests: meter
                .u64_counter("exemplars.store.select.requests")
                .with_description("Select calls by outcome")
                .init(),
            select_duration_seconds: meter
                .f64_histogram("exemplars.store.select.duration")
                .with_description("Select end-to-end latency")
                .with_unit("s")
                .init(),
            select_series_returned: meter
                .u64_histogram("exemplars.store.select.series_returned")
                .with_description("Series returned per select")
                .init(),
            select_exemplars_returned: meter
                .u64_histogram("exemplars.store.select.exemplars_returned")
                .with_description("Exemplars returned per select")
                .init(),
            select_group_failures: meter
                .u64_counter("exemplars.store.select.group_failures")
                .with_description("Selector groups dropped because their scan result could not be decoded")
                .init(),
        }
    })
}

pub fn record_append(outcome: &'static str, error_class: Option<&'static str>, duration_seconds: f64) {
    let i = instruments();
    let mut attrs = vec![KeyValue::new("outcome", outcome)];
    if let Some(error_class) = error_class {
        attrs.push(KeyValue::new("error.class", error_class));
    }
    i.append_requests.add(1, &attrs);
    i.append_duration_seconds.record(duration_seconds, &attrs);
}

pub struct SelectMetrics {
    pub outcome: &'static str,
    pub error_class: Option<&'static str>,
    pub duration_seconds: f64,
    pub series_returned: u64,
    pub exemplars_returned: u64,
}

pub fn record_select(metrics: SelectMetrics) {
    let i = instruments();
    let mut attrs = vec![KeyValue::new("outcome", metrics.outcome)];
    if let Some(error_class) = metrics.error_class {
        attrs.push(KeyValue::new("error.class", error_class));
    }

    i.select_requests.add(1, &attrs);
    i.select_duration_seconds.record(metrics.duration_seconds, &attrs);
    i.select_series_returned.record(metrics.series_returned, &attrs);
    i.select_exemplars_returned
        .record(metrics.exemplars_returned, &attrs);
}

pub fn record_group_failure(error_class: &'static str) {
    instruments()
        .select_group_failures
        .add(1, &[KeyValue::new("error.class", error_class)]);
}
