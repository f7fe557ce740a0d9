//! Per-column statistical enrichment.
//!
//! [`ColumnEnricher::enrich`] turns one engine summary into a full
//! [`ColumnProfile`]. Each statistic is an independent aggregate query: when
//! one fails, the failure is recorded on the profile as an
//! [`UnavailableStatistic`](crate::profile::types::UnavailableStatistic) and
//! the remaining statistics are still computed.

use std::future::Future;

use tracing::{debug, instrument, warn};

use crate::engine::{AggregateQuery, CellValue, ColumnSummary, DeclaredKind, ProfileSession};
use crate::error::Result;
use crate::profile::inference::{infer_semantic_type, is_person_name, is_pii_name};
use crate::profile::patterns::{detect_patterns, MIN_PATTERN_RATE};
use crate::profile::pipeline::ProfilerConfig;
use crate::profile::statistics::{
    detect_distribution, detect_temporal, equal_width_edges, median_absolute_deviation,
    sample_moments, shannon_entropy, standardized_moments, tukey_fences,
};
use crate::profile::types::{
    ColumnProfile, Histogram, SemanticType, SynthesisPolicy, TextStats, TopValue, TopValues,
};

/// Distinct ratio above which names and free text count as highly unique.
const HIGH_UNIQUENESS: f64 = 0.5;

/// Categorical columns up to this many distinct values may be copied.
const COPY_SAFE_MAX_DISTINCT: u64 = 50;

/// Computes per-column statistics beyond the engine summary.
#[derive(Debug, Clone)]
pub struct ColumnEnricher {
    config: ProfilerConfig,
}

impl ColumnEnricher {
    pub fn new(config: ProfilerConfig) -> Self {
        Self { config }
    }

    /// Builds the full profile of one column.
    ///
    /// Never fails: statistics that cannot be computed are left absent and
    /// listed in [`ColumnProfile::unavailable`].
    #[instrument(skip(self, session, summary), fields(column = %summary.name))]
    pub async fn enrich(&self, session: &ProfileSession, summary: &ColumnSummary) -> ColumnProfile {
        let semantic_type = infer_semantic_type(summary);
        let mut profile = ColumnProfile::from_summary(summary, semantic_type);

        if profile.non_null_count() > 0 {
            if self.wants_top_values(&profile) {
                self.top_values(session, &mut profile).await;
            }
            match semantic_type {
                SemanticType::Numeric => self.numeric(session, &mut profile).await,
                SemanticType::DateTime => self.temporal(session, &mut profile).await,
                SemanticType::Text => self.text_lengths(session, &mut profile).await,
                _ => {}
            }
            if summary.declared_kind == DeclaredKind::Text
                && matches!(
                    semantic_type,
                    SemanticType::Text | SemanticType::Categorical | SemanticType::Id
                )
            {
                self.patterns(session, &mut profile).await;
            }
        }

        profile.synthesis_policy = assign_synthesis_policy(&profile);
        debug!(
            semantic_type = %profile.semantic_type,
            policy = ?profile.synthesis_policy,
            unavailable = profile.unavailable.len(),
            "Column enriched"
        );
        profile
    }

    fn wants_top_values(&self, profile: &ColumnProfile) -> bool {
        matches!(
            profile.semantic_type,
            SemanticType::Categorical | SemanticType::Boolean
        ) || profile.distinct_count <= self.config.categorical_topk_cardinality
    }

    async fn top_values(&self, session: &ProfileSession, profile: &mut ColumnProfile) {
        let query = AggregateQuery::TopValues {
            column: profile.name.clone(),
            limit: self.config.top_k,
        };
        let Some(rows) = attempt(profile, "top_values", session.rows(&query)).await else {
            return;
        };

        let total = profile.count.max(1) as f64;
        let values: Vec<TopValue> = rows
            .iter()
            .filter_map(|row| {
                let value = row.first()?.to_string();
                let count = row.get(1)?.as_i64()?.max(0) as u64;
                Some(TopValue {
                    value,
                    count,
                    percent: count as f64 / total * 100.0,
                })
            })
            .collect();
        if values.is_empty() {
            return;
        }

        let non_null = profile.non_null_count();
        let listed: u64 = values.iter().map(|v| v.count).sum();
        let other_count = non_null.saturating_sub(listed);
        let shares: Vec<f64> = values.iter().map(|v| v.count as f64).collect();
        let top_share = values[0].count as f64 / non_null.max(1) as f64;
        let expected_share = 1.0 / profile.distinct_count.max(1) as f64;

        if profile.semantic_type == SemanticType::Boolean && non_null > 0 {
            let trues = values
                .iter()
                .find(|v| v.value.eq_ignore_ascii_case("true"))
                .map_or(0, |v| v.count);
            profile.true_rate = Some(trues as f64 / non_null as f64);
        }

        profile.top_values = Some(TopValues {
            mode: Some(values[0].value.clone()),
            entropy: shannon_entropy(&shares),
            imbalance_ratio: top_share / expected_share,
            other_count,
            other_percent: other_count as f64 / total * 100.0,
            values,
        });
    }

    async fn numeric(&self, session: &ProfileSession, profile: &mut ColumnProfile) {
        let (Some(min), Some(max)) = (profile.min_f64(), profile.max_f64()) else {
            return;
        };
        if max <= min || profile.std_dev.unwrap_or(0.0) <= 0.0 {
            return;
        }
        let column = profile.name.clone();

        let sample_query = AggregateQuery::NumericSample {
            column: column.clone(),
            limit: self.config.sample_size,
        };
        let sample = attempt(profile, "sample", session.float_column(&sample_query))
            .await
            .unwrap_or_default();

        let mut moments = None;
        if let Some(mean) = profile.mean {
            match engine_moments(session, &column, mean).await {
                Ok(m) => moments = m,
                Err(e) => debug!(column = %column, error = %e, "Engine moments failed, using sample"),
            }
        }
        match moments.or_else(|| sample_moments(&sample)) {
            Some((skewness, kurtosis)) => {
                profile.skewness = Some(skewness);
                profile.kurtosis = Some(kurtosis);
            }
            None => profile.mark_unavailable("moments", "moments unavailable from engine and sample"),
        }

        profile.mad = median_absolute_deviation(&sample);

        if let (Some(q25), Some(q75)) = (profile.q25, profile.q75) {
            let (lower, upper) = tukey_fences(q25, q75);
            let query = AggregateQuery::OutlierCount {
                column: column.clone(),
                lower,
                upper,
            };
            if let Some(row) = attempt(profile, "outliers", session.first_row(&query)).await {
                profile.outlier_count = row.first().and_then(CellValue::as_i64).map(|n| n as u64);
                profile.outlier_bounds = Some((lower, upper));
            }
        }

        let query = AggregateQuery::ZeroCount {
            column: column.clone(),
        };
        if let Some(row) = attempt(profile, "zero_count", session.first_row(&query)).await {
            profile.zero_count = row.first().and_then(CellValue::as_i64).map(|n| n as u64);
        }

        if let Some(edges) = equal_width_edges(min, max, self.config.histogram_bins) {
            let query = AggregateQuery::Histogram {
                column: column.clone(),
                edges: edges.clone(),
            };
            if let Some(row) = attempt(profile, "histogram", session.first_row(&query)).await {
                let counts: Vec<u64> = (0..edges.len() - 1)
                    .map(|i| {
                        row.get(i)
                            .and_then(CellValue::as_i64)
                            .map_or(0, |n| n.max(0) as u64)
                    })
                    .collect();
                profile.histogram = Some(Histogram { edges, counts });
            }
        }

        profile.distribution = Some(detect_distribution(
            profile.skewness,
            profile.kurtosis,
            profile.histogram.as_ref(),
            Some(min),
        ));
    }

    async fn temporal(&self, session: &ProfileSession, profile: &mut ColumnProfile) {
        let query = AggregateQuery::TemporalSample {
            column: profile.name.clone(),
            limit: self.config.sample_size,
        };
        let Some(rows) = attempt(profile, "temporal", session.rows(&query)).await else {
            return;
        };
        let mut stamps: Vec<_> = rows
            .iter()
            .filter_map(|row| row.first().and_then(CellValue::as_timestamp))
            .collect();
        stamps.sort();
        stamps.dedup();
        profile.temporal = Some(detect_temporal(&stamps));
    }

    async fn text_lengths(&self, session: &ProfileSession, profile: &mut ColumnProfile) {
        let query = AggregateQuery::TextLengths {
            column: profile.name.clone(),
        };
        let Some(row) = attempt(profile, "text_lengths", session.first_row(&query)).await else {
            return;
        };
        let cell = |i: usize| row.get(i).cloned().unwrap_or(CellValue::Null);
        if let Some(avg_length) = cell(0).as_f64() {
            profile.text_stats = Some(TextStats {
                avg_length,
                min_length: cell(1).as_i64().map_or(0, |n| n.max(0) as u64),
                max_length: cell(2).as_i64().map_or(0, |n| n.max(0) as u64),
                empty_count: cell(3).as_i64().map_or(0, |n| n.max(0) as u64),
            });
        }
    }

    async fn patterns(&self, session: &ProfileSession, profile: &mut ColumnProfile) {
        let query = AggregateQuery::PatternSample {
            column: profile.name.clone(),
            limit: self.config.sample_size,
        };
        let Some(rows) = attempt(profile, "patterns", session.rows(&query)).await else {
            return;
        };
        let values: Vec<String> = rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|cell| !cell.is_null())
            .map(|cell| cell.to_string())
            .collect();
        profile.patterns = detect_patterns(&values, MIN_PATTERN_RATE);
    }
}

/// Skewness and excess kurtosis from the engine's central moment query.
async fn engine_moments(
    session: &ProfileSession,
    column: &str,
    mean: f64,
) -> Result<Option<(f64, f64)>> {
    let row = session
        .first_row(&AggregateQuery::Moments {
            column: column.to_string(),
            mean,
        })
        .await?;
    let get = |i: usize| row.get(i).and_then(CellValue::as_f64);
    Ok(match (get(0), get(1), get(2)) {
        (Some(m2), Some(m3), Some(m4)) => standardized_moments(m2, m3, m4),
        _ => None,
    })
}

/// Awaits one statistic, recording a failure on the profile instead of
/// propagating it.
async fn attempt<T>(
    profile: &mut ColumnProfile,
    statistic: &str,
    fut: impl Future<Output = Result<T>>,
) -> Option<T> {
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            let e = e.for_statistic(&profile.name, statistic);
            warn!(column = %profile.name, statistic, error = %e, "Statistic unavailable");
            profile.mark_unavailable(statistic, e.to_string());
            None
        }
    }
}

/// Assigns the synthesis policy by a fixed decision order.
pub fn assign_synthesis_policy(profile: &ColumnProfile) -> SynthesisPolicy {
    let distinct_ratio = profile.unique_percent() / 100.0;
    if profile.patterns.iter().any(|p| p.pattern.is_pii()) || is_pii_name(&profile.name) {
        SynthesisPolicy::Mask
    } else if is_person_name(&profile.name) && distinct_ratio > HIGH_UNIQUENESS {
        SynthesisPolicy::FakerPattern
    } else if profile.semantic_type == SemanticType::Id {
        SynthesisPolicy::SequentialId
    } else if profile.semantic_type == SemanticType::Text && distinct_ratio > HIGH_UNIQUENESS {
        SynthesisPolicy::Exclude
    } else if profile.semantic_type == SemanticType::Categorical
        && profile.distinct_count <= COPY_SAFE_MAX_DISTINCT
    {
        SynthesisPolicy::CopySafe
    } else {
        SynthesisPolicy::Synthetic
    }
}
