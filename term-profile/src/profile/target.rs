//! Binary target analysis.
//!
//! A nominated target column is reduced to a positive/negative encoding and
//! every other eligible column is scored by how strongly it separates the two
//! groups: Cohen's d for numeric features, the largest per-category deviation
//! from the base rate for categorical ones.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::engine::{AggregateQuery, CellValue, ProfileSession};
use crate::error::{ProfileError, Result};
use crate::profile::relationships::PairFailure;
use crate::profile::statistics::cohens_d;
use crate::profile::types::{ColumnProfile, EffectMetric, FeatureEffect, SemanticType, TargetProfile};

/// Class labels that name the positive outcome, compared case-insensitively.
const POSITIVE_HINTS: &[&str] = &[
    "1", "true", "yes", "y", "churn", "churned", "fraud", "positive", "default", "spam",
];

/// Minimum rows in each target group before Cohen's d is computed.
pub const MIN_GROUP_ROWS: u64 = 5;

/// Minimum rows in a category before its target rate is considered.
pub const MIN_CATEGORY_ROWS: u64 = 10;

/// Output of the target phase.
#[derive(Debug, Clone)]
pub struct TargetAnalysis {
    pub profile: TargetProfile,
    pub failures: Vec<PairFailure>,
}

/// Scores features against a binary target.
#[derive(Debug, Clone)]
pub struct TargetAnalyzer {
    max_concurrency: usize,
}

impl TargetAnalyzer {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Analyzes `target` against every other column.
    ///
    /// Returns [`ProfileError::UnsupportedTargetEncoding`] when the target
    /// does not have exactly two classes.
    #[instrument(skip(self, session, target, columns, cancel), fields(target_column = %target))]
    pub async fn analyze(
        &self,
        session: &ProfileSession,
        target: &str,
        columns: &[ColumnProfile],
        cancel: &CancellationToken,
    ) -> Result<TargetAnalysis> {
        if !columns.iter().any(|c| c.name == target) {
            return Err(ProfileError::unsupported_target(target, "column not found"));
        }

        let classes = class_counts(session, target).await?;
        let positive = choose_positive_class(target, &classes)?;
        let total: u64 = classes.iter().map(|(_, n)| n).sum();
        let class_distribution: BTreeMap<String, f64> = classes
            .iter()
            .map(|(label, n)| (label.clone(), *n as f64 / total as f64))
            .collect();
        let base_rate = class_distribution.get(&positive).copied().unwrap_or(0.0);

        let features: Vec<&ColumnProfile> = columns
            .iter()
            .filter(|c| c.name != target)
            .filter(|c| {
                matches!(
                    c.semantic_type,
                    SemanticType::Numeric
                        | SemanticType::Categorical
                        | SemanticType::Text
                        | SemanticType::Boolean
                )
            })
            .collect();

        let results: Vec<_> = stream::iter(features)
            .map(|feature| {
                let session = session.clone();
                let cancel = cancel.clone();
                let positive = positive.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (feature.name.clone(), Err(ProfileError::Cancelled));
                    }
                    let effect = if feature.semantic_type == SemanticType::Numeric {
                        numeric_effect(&session, target, &positive, &feature.name, total).await
                    } else {
                        categorical_effect(&session, target, &positive, &feature.name, total, base_rate)
                            .await
                    };
                    (feature.name.clone(), effect)
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut effects = Vec::new();
        let mut failures = Vec::new();
        for (feature, result) in results {
            match result {
                Ok(Some(effect)) => effects.push(effect),
                Ok(None) => {}
                Err(ProfileError::Cancelled) => return Err(ProfileError::Cancelled),
                Err(e) => {
                    warn!(target_column = %target, feature = %feature, error = %e, "Feature effect skipped");
                    failures.push(PairFailure {
                        columns: (target.to_string(), feature),
                        statistic: "feature_effect",
                        message: e.to_string(),
                    });
                }
            }
        }
        effects.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| a.feature.cmp(&b.feature))
        });

        info!(
            target_column = %target,
            positive_class = %positive,
            base_rate,
            effects = effects.len(),
            "Target analysis complete"
        );
        Ok(TargetAnalysis {
            profile: TargetProfile {
                column: target.to_string(),
                is_binary: true,
                positive_class: positive,
                class_distribution,
                effects,
            },
            failures,
        })
    }
}

async fn class_counts(session: &ProfileSession, target: &str) -> Result<Vec<(String, u64)>> {
    let rows = session
        .rows(&AggregateQuery::TargetClasses {
            target: target.to_string(),
        })
        .await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let label = row.first()?.to_string();
            let n = row.get(1)?.as_i64()?.max(0) as u64;
            Some((label, n))
        })
        .collect())
}

/// Picks the positive label of a two-class target.
///
/// A label matching a positive-intent hint wins; otherwise the larger of two
/// numeric labels; otherwise the less frequent label. `classes` is ordered
/// most frequent first.
pub fn choose_positive_class(target: &str, classes: &[(String, u64)]) -> Result<String> {
    if classes.len() != 2 {
        return Err(ProfileError::unsupported_target(
            target,
            format!("expected exactly 2 classes, found {}", classes.len()),
        ));
    }

    for hint in POSITIVE_HINTS {
        if let Some((label, _)) = classes
            .iter()
            .find(|(label, _)| label.trim().eq_ignore_ascii_case(hint))
        {
            return Ok(label.clone());
        }
    }

    let numeric: Option<Vec<f64>> = classes
        .iter()
        .map(|(label, _)| label.trim().parse::<f64>().ok())
        .collect();
    if let Some(values) = numeric {
        let idx = if values[1] > values[0] { 1 } else { 0 };
        return Ok(classes[idx].0.clone());
    }

    Ok(classes[1].0.clone())
}

async fn numeric_effect(
    session: &ProfileSession,
    target: &str,
    positive: &str,
    feature: &str,
    total: u64,
) -> Result<Option<FeatureEffect>> {
    let rows = session
        .rows(&AggregateQuery::GroupMoments {
            target: target.to_string(),
            positive: positive.to_string(),
            feature: feature.to_string(),
        })
        .await?;

    let mut groups: [Option<(f64, f64, f64)>; 2] = [None, None];
    for row in &rows {
        let (Some(flag), Some(n), Some(mean)) = (
            row.first().and_then(CellValue::as_i64),
            row.get(1).and_then(CellValue::as_f64),
            row.get(2).and_then(CellValue::as_f64),
        ) else {
            continue;
        };
        let variance = row.get(3).and_then(CellValue::as_f64).unwrap_or(0.0);
        groups[usize::from(flag == 1)] = Some((n, mean, variance));
    }

    let [Some((n_neg, mean_neg, var_neg)), Some((n_pos, mean_pos, var_pos))] = groups else {
        return Ok(None);
    };
    if n_neg < MIN_GROUP_ROWS as f64 || n_pos < MIN_GROUP_ROWS as f64 {
        return Ok(None);
    }
    let Some(d) = cohens_d(n_pos, mean_pos, var_pos, n_neg, mean_neg, var_neg) else {
        return Ok(None);
    };

    Ok(Some(FeatureEffect {
        feature: feature.to_string(),
        metric: EffectMetric::CohensD,
        magnitude: d.abs(),
        support: ((n_pos + n_neg) / total.max(1) as f64).min(1.0),
        summary: format!(
            "mean {feature} is {mean_pos:.2} when {target} = {positive} vs {mean_neg:.2} otherwise (d = {d:.2})"
        ),
    }))
}

async fn categorical_effect(
    session: &ProfileSession,
    target: &str,
    positive: &str,
    feature: &str,
    total: u64,
    base_rate: f64,
) -> Result<Option<FeatureEffect>> {
    let rows = session
        .rows(&AggregateQuery::GroupRates {
            target: target.to_string(),
            positive: positive.to_string(),
            feature: feature.to_string(),
            min_rows: MIN_CATEGORY_ROWS,
        })
        .await?;

    let best = rows
        .iter()
        .filter_map(|row| {
            let value = row.first()?.to_string();
            let count = row.get(1)?.as_i64()?.max(0) as u64;
            let rate = row.get(2)?.as_f64()?;
            Some((value, count, rate))
        })
        .filter(|(_, count, _)| *count >= MIN_CATEGORY_ROWS)
        .max_by(|a, b| {
            (a.2 - base_rate)
                .abs()
                .total_cmp(&(b.2 - base_rate).abs())
                .then_with(|| b.0.cmp(&a.0))
        });

    Ok(best.map(|(value, count, rate)| FeatureEffect {
        feature: feature.to_string(),
        metric: EffectMetric::RateDeviation,
        magnitude: (rate - base_rate).abs(),
        support: (count as f64 / total.max(1) as f64).min(1.0),
        summary: format!(
            "{target} = {positive} rate is {:.1}% when {feature} = {value} vs {:.1}% overall",
            rate * 100.0,
            base_rate * 100.0
        ),
    }))
}
