//! Comparator scenarios over profiles built by the real pipeline.

mod common;

use term_profile::drift::{ComparatorConfig, Priority, ProfileComparator, ValueStatus};
use term_profile::profile::{DatasetProfiler, Profile};

async fn profile(name: &str, batch: arrow::record_batch::RecordBatch) -> Profile {
    let session = common::session(name, batch);
    DatasetProfiler::default().profile(&session).await.unwrap()
}

#[tokio::test]
async fn test_identity_law() {
    let orders = profile("orders", common::orders(250)).await;
    let diff = ProfileComparator::default().compare(&orders, &orders);

    assert_eq!(diff.row_count_change.absolute_change, 0);
    assert!(!diff.schema_changes.has_changes());
    assert_eq!(diff.column_diffs.len(), orders.columns.len());
    for column in &diff.column_diffs {
        assert_eq!(column.psi.unwrap_or(0.0), 0.0, "{}", column.column);
        assert_eq!(column.ks_statistic.unwrap_or(0.0), 0.0, "{}", column.column);
        assert_eq!(column.js_divergence.unwrap_or(0.0), 0.0, "{}", column.column);
    }
    assert!(!diff.is_significant);
    assert_eq!(diff.drift_score, 0.0);
}

#[tokio::test]
async fn test_stable_numeric_distribution_does_not_drift() {
    let baseline = profile("before", common::normal_values(5000, 10.0, 2.0, 1)).await;
    let current = profile("after", common::normal_values(5000, 10.0, 2.0, 2)).await;
    let diff = ProfileComparator::default().compare(&baseline, &current);

    let value = diff.column("value").unwrap();
    assert!(value.psi.unwrap() < 0.02);
    assert!(value.ks_statistic.unwrap() < 0.1);
    assert!(!diff.is_significant);
    assert!(diff.drifted_columns(0.25).is_empty());
}

#[tokio::test]
async fn test_categorical_shift_is_significant() {
    let baseline = profile("before", common::categories("segment", &[("A", 900), ("B", 100)])).await;
    let current = profile("after", common::categories("segment", &[("A", 400), ("B", 600)])).await;
    let diff = ProfileComparator::default().compare(&baseline, &current);

    let segment = diff.column("segment").unwrap();
    assert!(segment.js_divergence.unwrap() > 0.3);
    assert!(diff.is_significant);

    let b = segment
        .value_changes
        .iter()
        .find(|v| v.value == "B")
        .unwrap();
    assert_eq!(b.status, ValueStatus::Changed);
    assert!((b.change_pp - 50.0).abs() < 1e-9);
    assert!(b.flagged);
    assert!(diff
        .recommendations
        .iter()
        .any(|r| r.priority == Priority::Warning && r.column.as_deref() == Some("segment")));
}

#[tokio::test]
async fn test_schema_and_row_changes() {
    let baseline = profile("before", common::orders(200)).await;
    let mut current = profile("after", common::orders(80)).await;
    current.columns.retain(|c| c.name != "is_paid");

    let diff = ProfileComparator::new(ComparatorConfig::default()).compare(&baseline, &current);
    assert_eq!(diff.schema_changes.removed_columns, ["is_paid"]);
    assert_eq!(diff.row_count_change.absolute_change, -120);
    assert!(diff.row_count_change.is_significant);
    assert_eq!(diff.recommendations[0].priority, Priority::Critical);
    assert!(diff.is_significant);
    assert!(diff.to_json().unwrap().contains("\"removed_columns\""));
}
