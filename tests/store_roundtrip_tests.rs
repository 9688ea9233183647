//! End-to-end tests for the columnar exemplar store
//!
//! These tests drive `ExemplarStore` on top of the in-memory engine:
//! - Append/select round trips, including heterogeneous label sets
//! - Open time range boundaries
//! - Absent labels matching the empty string
//! - Merging of overlapping matcher groups
//! - Validation failures before any scan

use exemplars_storage::engine::MemoryEngine;
use exemplars_storage::model::{Exemplar, Labels, Matcher, QueryResult};
use exemplars_storage::store::{ColumnarExemplarStore, ExemplarStore};
use exemplars_storage::Error;

use std::sync::Arc;

async fn new_store() -> (Arc<MemoryEngine>, ColumnarExemplarStore) {
    let engine = Arc::new(MemoryEngine::default());
    let store = ColumnarExemplarStore::open(engine.clone(), "exemplars")
        .await
        .unwrap();
    (engine, store)
}

fn labels(pairs: &[(&str, &str)]) -> Labels {
    Labels::from_pairs(pairs.iter().copied())
}

fn trace(id: &str, ts: i64, value: f64) -> Exemplar {
    Exemplar::new(labels(&[("trace_id", id)]), ts, value)
}

fn find<'a>(results: &'a [QueryResult], series: &Labels) -> &'a QueryResult {
    results
        .iter()
        .find(|r| &r.series_labels == series)
        .unwrap_or_else(|| panic!("no result for series {}", series))
}

// =========================================================================
// Round trips
// =========================================================================

#[tokio::test]
async fn test_two_series_only_matching_one_returned() {
    let (_, store) = new_store().await;
    let series_a = labels(&[("job", "a"), ("instance", "x")]);
    let series_b = labels(&[("job", "b")]);

    store.append(&series_a, &trace("t1", 1000, 3.5)).await.unwrap();
    store.append(&series_b, &trace("t2", 2000, 1.0)).await.unwrap();

    let results = store
        .select(0, 1500, &[vec![Matcher::equal("job", "a")]])
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].series_labels, series_a);
    assert_eq!(results[0].exemplars, vec![trace("t1", 1000, 3.5)]);
}

#[tokio::test]
async fn test_heterogeneous_label_sets_round_trip() {
    let (engine, store) = new_store().await;
    let web = labels(&[("job", "web"), ("env", "prod")]);
    let db = labels(&[("job", "db"), ("shard", "7"), ("region", "eu")]);

    store.append(&web, &trace("w1", 10, 1.0)).await.unwrap();
    store
        .append(
            &db,
            &Exemplar::new(labels(&[("span_id", "s9"), ("trace_id", "d1")]), 20, 2.0),
        )
        .await
        .unwrap();
    store
        .append(&web, &Exemplar::new(Labels::empty(), 30, 3.0))
        .await
        .unwrap();

    assert_eq!(engine.row_count("exemplars").unwrap(), 3);

    let results = store
        .select(0, 100, &[vec![Matcher::regex("job", "web|db")]])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);

    // Labels another row introduced are not attached to rows without them.
    // Missing exemplar labels sort first.
    let web_result = find(&results, &web);
    assert_eq!(
        web_result.exemplars,
        vec![Exemplar::new(Labels::empty(), 30, 3.0), trace("w1", 10, 1.0)]
    );
    let db_result = find(&results, &db);
    assert_eq!(db_result.exemplars.len(), 1);
    assert_eq!(db_result.exemplars[0].labels.get("span_id"), Some("s9"));
    assert_eq!(db_result.exemplars[0].labels.get("trace_id"), Some("d1"));
}

#[tokio::test]
async fn test_identical_appends_are_both_kept() {
    let (_, store) = new_store().await;
    let series = labels(&[("job", "a")]);

    store.append(&series, &trace("t1", 5, 1.0)).await.unwrap();
    store.append(&series, &trace("t1", 5, 1.0)).await.unwrap();

    let results = store
        .select(0, 10, &[vec![Matcher::equal("job", "a")]])
        .await
        .unwrap();
    assert_eq!(results[0].exemplars.len(), 2);
}

#[tokio::test]
async fn test_empty_label_value_is_stored_as_absent() {
    let (_, store) = new_store().await;
    let written = labels(&[("job", "a"), ("team", "")]);

    store.append(&written, &trace("t1", 5, 1.0)).await.unwrap();

    let results = store
        .select(0, 10, &[vec![Matcher::equal("job", "a")]])
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].series_labels, labels(&[("job", "a")]));
    assert_eq!(results[0].series_labels.get("team"), None);
}

// =========================================================================
// Time range boundaries
// =========================================================================

#[tokio::test]
async fn test_time_range_excludes_both_bounds() {
    let (_, store) = new_store().await;
    let series = labels(&[("job", "a")]);
    for ts in [100, 101, 199, 200] {
        store.append(&series, &trace("t", ts, 1.0)).await.unwrap();
    }

    let results = store
        .select(100, 200, &[vec![Matcher::equal("job", "a")]])
        .await
        .unwrap();
    let timestamps: Vec<i64> = results[0].exemplars.iter().map(|e| e.timestamp).collect();
    assert_eq!(timestamps, vec![101, 199]);
}

#[tokio::test]
async fn test_empty_range_returns_nothing() {
    let (_, store) = new_store().await;
    store
        .append(&labels(&[("job", "a")]), &trace("t", 100, 1.0))
        .await
        .unwrap();

    let results = store
        .select(100, 100, &[vec![Matcher::equal("job", "a")]])
        .await
        .unwrap();
    assert!(results.is_empty());
}

// =========================================================================
// Matcher semantics
// =========================================================================

#[tokio::test]
async fn test_absent_label_matches_empty_string() {
    let (_, store) = new_store().await;
    let plain = labels(&[("job", "a")]);
    let canary = labels(&[("job", "a"), ("canary", "true")]);
    store.append(&plain, &trace("p", 1, 1.0)).await.unwrap();
    store.append(&canary, &trace("c", 2, 1.0)).await.unwrap();

    let results = store
        .select(0, 10, &[vec![Matcher::equal("canary", "")]])
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].series_labels, plain);

    let results = store
        .select(0, 10, &[vec![Matcher::not_equal("canary", "")]])
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].series_labels, canary);

    // A label no row has ever carried behaves the same way.
    let results = store
        .select(0, 10, &[vec![Matcher::regex("never_written", "")]])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_regex_is_fully_anchored() {
    let (_, store) = new_store().await;
    store
        .append(&labels(&[("job", "api-server")]), &trace("t1", 1, 1.0))
        .await
        .unwrap();
    store
        .append(&labels(&[("job", "api")]), &trace("t2", 2, 1.0))
        .await
        .unwrap();

    let results = store
        .select(0, 10, &[vec![Matcher::regex("job", "api")]])
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].series_labels.get("job"), Some("api"));

    let results = store
        .select(0, 10, &[vec![Matcher::not_regex("job", "api.*")]])
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_no_match_is_empty_not_error() {
    let (_, store) = new_store().await;
    store
        .append(&labels(&[("job", "a")]), &trace("t1", 1, 1.0))
        .await
        .unwrap();

    let results = store
        .select(0, 10, &[vec![Matcher::equal("job", "missing")]])
        .await
        .unwrap();
    assert!(results.is_empty());
}

// =========================================================================
// Matcher groups
// =========================================================================

#[tokio::test]
async fn test_overlapping_groups_merge_into_one_result() {
    let (_, store) = new_store().await;
    let series = labels(&[("job", "a"), ("instance", "x")]);
    store.append(&series, &trace("t1", 10, 1.0)).await.unwrap();
    store.append(&series, &trace("t2", 20, 2.0)).await.unwrap();

    let results = store
        .select(
            0,
            100,
            &[
                vec![Matcher::equal("job", "a")],
                vec![Matcher::equal("instance", "x")],
            ],
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].series_labels, series);
    assert_eq!(
        results[0].exemplars,
        vec![trace("t1", 10, 1.0), trace("t2", 20, 2.0)]
    );
}

#[tokio::test]
async fn test_disjoint_groups_return_each_series_once() {
    let (_, store) = new_store().await;
    let a = labels(&[("job", "a")]);
    let b = labels(&[("job", "b")]);
    store.append(&a, &trace("t1", 10, 1.0)).await.unwrap();
    store.append(&b, &trace("t2", 20, 2.0)).await.unwrap();

    let results = store
        .select(
            0,
            100,
            &[
                vec![Matcher::equal("job", "a")],
                vec![Matcher::equal("job", "b")],
            ],
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(find(&results, &a).exemplars.len(), 1);
    assert_eq!(find(&results, &b).exemplars.len(), 1);
}

#[tokio::test]
async fn test_empty_matcher_group_scans_nothing() {
    let (_, store) = new_store().await;
    store
        .append(&labels(&[("job", "a")]), &trace("t1", 1, 1.0))
        .await
        .unwrap();

    let results = store.select(0, 10, &[Vec::new()]).await.unwrap();
    assert!(results.is_empty());
    let results = store.select(0, 10, &[]).await.unwrap();
    assert!(results.is_empty());
}

// =========================================================================
// Error paths
// =========================================================================

#[tokio::test]
async fn test_invalid_regex_fails_whole_select() {
    let (_, store) = new_store().await;
    store
        .append(&labels(&[("job", "a")]), &trace("t1", 1, 1.0))
        .await
        .unwrap();

    let result = store
        .select(
            0,
            10,
            &[
                vec![Matcher::equal("job", "a")],
                vec![Matcher::regex("job", "(unclosed")],
            ],
        )
        .await;
    assert!(matches!(result, Err(Error::QueryTranslation(_))));
}

#[tokio::test]
async fn test_invalid_label_name_rejected_on_append() {
    let (engine, store) = new_store().await;
    let result = store
        .append(&labels(&[("not a name", "v")]), &trace("t1", 1, 1.0))
        .await;
    assert!(matches!(result, Err(Error::Encoding(_))));
    assert_eq!(engine.row_count("exemplars").unwrap(), 0);
}
