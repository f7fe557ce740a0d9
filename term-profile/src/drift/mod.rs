//! Drift detection between two profiles of the same dataset.
//!
//! [`ProfileComparator::compare`] is a pure function of a baseline and a
//! current [`Profile`]: it diffs the schema, the row count and every shared
//! column, scores the overall drift, and derives a summary and prioritized
//! recommendations. Comparing a profile with itself yields no changes and
//! zero divergence on every column.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use term_profile::drift::ProfileComparator;
//! use term_profile::profile::Profile;
//!
//! let profile = Profile {
//!     source: "orders".into(),
//!     row_count: 100,
//!     columns: Vec::new(),
//!     correlations: Vec::new(),
//!     conditionals: Vec::new(),
//!     alerts: Vec::new(),
//!     target: None,
//!     profiled_at: Utc::now(),
//! };
//! let diff = ProfileComparator::default().compare(&profile, &profile);
//! assert_eq!(diff.row_count_change.absolute_change, 0);
//! assert!(!diff.is_significant);
//! ```

pub mod metrics;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::Result;
use crate::profile::statistics::clamp01;
use crate::profile::types::{ColumnProfile, Profile, SemanticType};
use crate::security::InputValidator;

pub use metrics::{categorical_psi, js_divergence, ks_approximation, numeric_psi, Quartiles};
pub use types::{
    ColumnDiff, NumericDeltas, Priority, ProfileDiffResult, Recommendation, RowCountChange,
    SchemaChanges, TypeChange, ValueChange, ValueStatus,
};

/// Thresholds of the comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Overall drift score above which drift is significant
    pub drift_threshold: f64,
    /// Row count change, in percent, above which it is significant
    pub row_count_significance_pct: f64,
    /// Per-value share change, in percentage points, that is flagged
    pub value_change_pp: f64,
    /// Column PSI from which a warning is recommended
    pub psi_warning: f64,
    /// Null rate rise, in percentage points, that is recommended on
    pub null_rise_pp: f64,
    /// Row count swing, in percent, that is recommended on
    pub major_row_swing_pct: f64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.2,
            row_count_significance_pct: 10.0,
            value_change_pp: 5.0,
            psi_warning: 0.25,
            null_rise_pp: 10.0,
            major_row_swing_pct: 50.0,
        }
    }
}

impl ComparatorConfig {
    pub fn validate(&self) -> Result<()> {
        InputValidator::validate_threshold(self.drift_threshold, "drift_threshold")?;
        InputValidator::validate_threshold(self.psi_warning, "psi_warning")?;
        Ok(())
    }

    pub fn with_drift_threshold(mut self, threshold: f64) -> Self {
        self.drift_threshold = threshold;
        self
    }

    pub fn with_psi_warning(mut self, psi: f64) -> Self {
        self.psi_warning = psi;
        self
    }
}

/// Compares two profiles.
#[derive(Debug, Clone, Default)]
pub struct ProfileComparator {
    config: ComparatorConfig,
}

impl ProfileComparator {
    pub fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Compares `current` against `baseline`.
    #[instrument(skip_all, fields(baseline = %baseline.source, current = %current.source))]
    pub fn compare(&self, baseline: &Profile, current: &Profile) -> ProfileDiffResult {
        let schema_changes = schema_changes(baseline, current);
        let row_count_change = self.row_count_change(baseline.row_count, current.row_count);

        let current_columns: BTreeMap<&str, &ColumnProfile> = current
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c))
            .collect();
        let column_diffs: Vec<ColumnDiff> = baseline
            .columns
            .iter()
            .filter_map(|base| {
                let cur = current_columns.get(base.name.as_str())?;
                Some(self.column_diff(base, cur))
            })
            .collect();

        let schema_penalty = (0.25 * schema_changes.change_count() as f64).min(1.0);
        let row_penalty = (row_count_change.percent_change.abs() / 100.0).min(1.0);
        let mut components = vec![schema_penalty, row_penalty];
        components.extend(column_diffs.iter().filter_map(|d| d.psi));
        let mean = components.iter().sum::<f64>() / components.len() as f64;
        let drift_score =
            clamp01(mean + 0.1 * schema_changes.removed_columns.len() as f64);
        let is_significant = drift_score > self.config.drift_threshold;

        let recommendations =
            self.recommendations(&schema_changes, &row_count_change, &column_diffs);
        let summary = self.summary(
            drift_score,
            is_significant,
            &schema_changes,
            &row_count_change,
            &column_diffs,
        );

        info!(
            drift_score,
            is_significant,
            schema_changes = schema_changes.change_count(),
            columns = column_diffs.len(),
            "Profile comparison complete"
        );

        ProfileDiffResult {
            baseline_source: baseline.source.clone(),
            current_source: current.source.clone(),
            schema_changes,
            row_count_change,
            column_diffs,
            drift_score,
            is_significant,
            summary,
            recommendations,
        }
    }

    fn row_count_change(&self, baseline: u64, current: u64) -> RowCountChange {
        let absolute_change = current as i64 - baseline as i64;
        let percent_change = if baseline == 0 {
            if current == 0 {
                0.0
            } else {
                100.0
            }
        } else {
            absolute_change as f64 / baseline as f64 * 100.0
        };
        RowCountChange {
            baseline,
            current,
            absolute_change,
            percent_change,
            is_significant: percent_change.abs() > self.config.row_count_significance_pct,
        }
    }

    fn column_diff(&self, base: &ColumnProfile, cur: &ColumnProfile) -> ColumnDiff {
        let mut diff = ColumnDiff {
            column: base.name.clone(),
            semantic_type: cur.semantic_type,
            null_percent_delta: cur.null_percent - base.null_percent,
            unique_percent_delta: cur.unique_percent() - base.unique_percent(),
            numeric: None,
            value_changes: Vec::new(),
            psi: None,
            ks_statistic: None,
            js_divergence: None,
        };
        if base.semantic_type != cur.semantic_type {
            return diff;
        }

        if base.semantic_type == SemanticType::Numeric {
            let delta = |a: Option<f64>, b: Option<f64>| Some(b? - a?);
            diff.numeric = Some(NumericDeltas {
                mean: delta(base.mean, cur.mean),
                median: delta(base.median, cur.median),
                std_dev: delta(base.std_dev, cur.std_dev),
                min: delta(base.min_f64(), cur.min_f64()),
                max: delta(base.max_f64(), cur.max_f64()),
                skewness: delta(base.skewness, cur.skewness),
            });
            if let (Some(bm), Some(bs), Some(cm), Some(cs)) =
                (base.mean, base.std_dev, cur.mean, cur.std_dev)
            {
                diff.psi = Some(numeric_psi(bm, bs, cm, cs));
            }
            if let (Some(bq), Some(cq)) = (Quartiles::of(base), Quartiles::of(cur)) {
                diff.ks_statistic = Some(ks_approximation(bq, cq));
            }
        } else if let (Some(bd), Some(cd)) = (
            metrics::categorical_distribution(base),
            metrics::categorical_distribution(cur),
        ) {
            diff.psi = Some(categorical_psi(&bd, &cd));
            diff.js_divergence = Some(js_divergence(&bd, &cd));
            diff.value_changes = self.value_changes(&bd, &cd);
        }
        diff
    }

    fn value_changes(
        &self,
        base: &BTreeMap<String, f64>,
        cur: &BTreeMap<String, f64>,
    ) -> Vec<ValueChange> {
        let keys: BTreeSet<&String> = base
            .keys()
            .chain(cur.keys())
            .filter(|k| k.as_str() != metrics::OTHER_BUCKET)
            .collect();
        let mut changes: Vec<ValueChange> = keys
            .into_iter()
            .map(|value| {
                let b = base.get(value).map(|s| s * 100.0);
                let c = cur.get(value).map(|s| s * 100.0);
                let baseline_percent = b.unwrap_or(0.0);
                let current_percent = c.unwrap_or(0.0);
                let change_pp = current_percent - baseline_percent;
                let status = match (b, c) {
                    (None, Some(_)) => ValueStatus::New,
                    (Some(_), None) => ValueStatus::Removed,
                    _ if change_pp.abs() >= self.config.value_change_pp => ValueStatus::Changed,
                    _ => ValueStatus::Stable,
                };
                ValueChange {
                    value: value.clone(),
                    baseline_percent,
                    current_percent,
                    change_pp,
                    flagged: status != ValueStatus::Stable,
                    status,
                }
            })
            .collect();
        changes.sort_by(|a, b| {
            b.change_pp
                .abs()
                .total_cmp(&a.change_pp.abs())
                .then_with(|| a.value.cmp(&b.value))
        });
        changes
    }

    fn recommendations(
        &self,
        schema: &SchemaChanges,
        rows: &RowCountChange,
        diffs: &[ColumnDiff],
    ) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for column in &schema.removed_columns {
            out.push(Recommendation {
                priority: Priority::Critical,
                column: Some(column.clone()),
                message: format!(
                    "Column '{column}' was removed; update every consumer that reads it"
                ),
            });
        }
        for change in &schema.type_changes {
            out.push(Recommendation {
                priority: Priority::Warning,
                column: Some(change.column.clone()),
                message: format!(
                    "Column '{}' changed type from {} to {}; check parsers and casts",
                    change.column, change.baseline, change.current
                ),
            });
        }
        if rows.percent_change.abs() > self.config.major_row_swing_pct {
            out.push(Recommendation {
                priority: Priority::Warning,
                column: None,
                message: format!(
                    "Row count changed by {:+.1}% ({} to {}); confirm the load is complete",
                    rows.percent_change, rows.baseline, rows.current
                ),
            });
        }
        for diff in diffs {
            if let Some(psi) = diff.psi.filter(|psi| *psi >= self.config.psi_warning) {
                out.push(Recommendation {
                    priority: Priority::Warning,
                    column: Some(diff.column.clone()),
                    message: format!(
                        "Distribution of '{}' shifted (PSI {psi:.3}); retrain or recalibrate dependent models",
                        diff.column
                    ),
                });
            }
            if diff.null_percent_delta > self.config.null_rise_pp {
                out.push(Recommendation {
                    priority: Priority::Warning,
                    column: Some(diff.column.clone()),
                    message: format!(
                        "Null rate of '{}' rose by {:.1} points; check the upstream source",
                        diff.column, diff.null_percent_delta
                    ),
                });
            }
        }
        for column in &schema.added_columns {
            out.push(Recommendation {
                priority: Priority::Info,
                column: Some(column.clone()),
                message: format!("Column '{column}' is new; add it to validation rules"),
            });
        }
        if out.is_empty() {
            out.push(Recommendation {
                priority: Priority::Info,
                column: None,
                message: "No significant drift detected".to_string(),
            });
        }
        out.sort_by(|a, b| b.priority.cmp(&a.priority));
        out
    }

    fn summary(
        &self,
        score: f64,
        significant: bool,
        schema: &SchemaChanges,
        rows: &RowCountChange,
        diffs: &[ColumnDiff],
    ) -> String {
        let drifted = diffs
            .iter()
            .filter(|d| d.psi.is_some_and(|psi| psi >= self.config.psi_warning))
            .count();
        let mut summary = format!(
            "Drift score {score:.3} ({}). Schema: {} added, {} removed, {} type changes. \
             Rows: {} to {} ({:+.1}%). {drifted} of {} shared columns with PSI >= {:.2}.",
            if significant { "significant" } else { "not significant" },
            schema.added_columns.len(),
            schema.removed_columns.len(),
            schema.type_changes.len(),
            rows.baseline,
            rows.current,
            rows.percent_change,
            diffs.len(),
            self.config.psi_warning,
        );
        let widest = diffs
            .iter()
            .map(|d| (d, d.max_divergence()))
            .filter(|(_, divergence)| *divergence > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((diff, divergence)) = widest {
            summary.push_str(&format!(
                " Largest divergence: '{}' at {divergence:.3}.",
                diff.column
            ));
        }
        summary
    }
}

fn schema_changes(baseline: &Profile, current: &Profile) -> SchemaChanges {
    let base: BTreeMap<&str, SemanticType> = baseline
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.semantic_type))
        .collect();
    let cur: BTreeMap<&str, SemanticType> = current
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.semantic_type))
        .collect();

    SchemaChanges {
        added_columns: cur
            .keys()
            .filter(|k| !base.contains_key(*k))
            .map(|k| k.to_string())
            .collect(),
        removed_columns: base
            .keys()
            .filter(|k| !cur.contains_key(*k))
            .map(|k| k.to_string())
            .collect(),
        type_changes: base
            .iter()
            .filter_map(|(name, bt)| {
                let ct = cur.get(name)?;
                (bt != ct).then(|| TypeChange {
                    column: name.to_string(),
                    baseline: *bt,
                    current: *ct,
                })
            })
            .collect(),
    }
}
