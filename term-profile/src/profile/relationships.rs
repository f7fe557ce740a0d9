//! Pairwise relationships between columns.
//!
//! Numeric pairs get Pearson's r from one sufficient-statistics query each.
//! Categorical pairs get a contingency table, chi-square and Cramer's V; a
//! single contingency query serves both orderings of a pair, so marginals are
//! computed once per unordered pair.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::engine::{AggregateQuery, CellValue, ProfileSession};
use crate::error::{ProfileError, Result};
use crate::log_pair;
use crate::profile::pipeline::ProfilerConfig;
use crate::profile::statistics::{cramers_v, pearson_from_sums};
use crate::profile::types::{
    ColumnCorrelation, ColumnProfile, ConditionalTable, CorrelationStrength, SemanticType,
};

/// Correlations weaker than this are not reported.
pub const MIN_CORRELATION: f64 = 0.3;

/// Associations weaker than this are not reported.
pub const MIN_CRAMERS_V: f64 = 0.2;

/// Conditional probabilities below this are dropped from tables.
pub const MIN_CONDITIONAL_PROBABILITY: f64 = 0.01;

/// Categorical columns need a distinct count in this range to be paired.
const ASSOCIATION_DISTINCT_RANGE: std::ops::RangeInclusive<u64> = 2..=50;

/// A pair whose relationship could not be computed.
#[derive(Debug, Clone, PartialEq)]
pub struct PairFailure {
    pub columns: (String, String),
    pub statistic: &'static str,
    pub message: String,
}

/// Output of the relationship phase.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    pub correlations: Vec<ColumnCorrelation>,
    pub conditionals: Vec<ConditionalTable>,
    pub failures: Vec<PairFailure>,
}

/// Computes numeric correlations and categorical associations.
#[derive(Debug, Clone)]
pub struct RelationshipAnalyzer {
    config: ProfilerConfig,
}

impl RelationshipAnalyzer {
    pub fn new(config: ProfilerConfig) -> Self {
        Self { config }
    }

    /// Analyzes every eligible pair within the configured budgets.
    ///
    /// Individual pair failures are collected in [`Relationships::failures`];
    /// only cancellation aborts the phase.
    #[instrument(skip(self, session, columns, cancel), fields(columns = columns.len()))]
    pub async fn analyze(
        &self,
        session: &ProfileSession,
        columns: &[ColumnProfile],
        cancel: &CancellationToken,
    ) -> Result<Relationships> {
        let mut out = Relationships::default();
        self.correlations(session, columns, cancel, &mut out).await?;
        self.associations(session, columns, cancel, &mut out).await?;
        info!(
            correlations = out.correlations.len(),
            conditionals = out.conditionals.len(),
            failures = out.failures.len(),
            "Relationship analysis complete"
        );
        Ok(out)
    }

    async fn correlations(
        &self,
        session: &ProfileSession,
        columns: &[ColumnProfile],
        cancel: &CancellationToken,
        out: &mut Relationships,
    ) -> Result<()> {
        let numeric: Vec<&str> = columns
            .iter()
            .filter(|c| c.semantic_type == SemanticType::Numeric)
            .map(|c| c.name.as_str())
            .collect();
        let pairs: Vec<(String, String)> = unordered_pairs(&numeric)
            .take(self.config.correlation_pair_budget)
            .collect();

        let results: Vec<_> = stream::iter(pairs)
            .map(|(x, y)| {
                let session = session.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (x, y, Err(ProfileError::Cancelled));
                    }
                    let r = pearson(&session, &x, &y).await;
                    (x, y, r)
                }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for (x, y, result) in results {
            match result {
                Ok(Some(r)) => {
                    log_pair!(self.config.log, column_a = %x, column_b = %y, r, "Pearson pair");
                    if r.abs() >= MIN_CORRELATION {
                        out.correlations.push(ColumnCorrelation {
                            strength: CorrelationStrength::from_coefficient(r),
                            column_a: x,
                            column_b: y,
                            coefficient: r,
                        });
                    }
                }
                Ok(None) => {}
                Err(ProfileError::Cancelled) => return Err(ProfileError::Cancelled),
                Err(e) => {
                    warn!(column_a = %x, column_b = %y, error = %e, "Correlation pair skipped");
                    out.failures.push(PairFailure {
                        columns: (x, y),
                        statistic: "pearson",
                        message: e.to_string(),
                    });
                }
            }
        }

        out.correlations.sort_by(|a, b| {
            b.coefficient
                .abs()
                .total_cmp(&a.coefficient.abs())
                .then_with(|| a.column_a.cmp(&b.column_a))
                .then_with(|| a.column_b.cmp(&b.column_b))
        });
        Ok(())
    }

    async fn associations(
        &self,
        session: &ProfileSession,
        columns: &[ColumnProfile],
        cancel: &CancellationToken,
        out: &mut Relationships,
    ) -> Result<()> {
        let categorical: Vec<&str> = columns
            .iter()
            .filter(|c| {
                c.semantic_type == SemanticType::Categorical
                    && ASSOCIATION_DISTINCT_RANGE.contains(&c.distinct_count)
            })
            .map(|c| c.name.as_str())
            .collect();
        // The budget counts ordered pairs; each unordered pair yields two.
        let unordered_budget = self.config.association_pair_budget.div_ceil(2);
        let pairs: Vec<(String, String)> = unordered_pairs(&categorical)
            .take(unordered_budget)
            .collect();

        let results: Vec<_> = stream::iter(pairs)
            .map(|(a, b)| {
                let session = session.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (a, b, Err(ProfileError::Cancelled));
                    }
                    let table = contingency(&session, &a, &b).await;
                    (a, b, table)
                }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for (a, b, result) in results {
            match result {
                Ok(table) => {
                    let Some((_, v)) = cramers_v(&table.counts) else {
                        continue;
                    };
                    log_pair!(self.config.log, parent = %a, child = %b, cramers_v = v, "Association pair");
                    if v >= MIN_CRAMERS_V {
                        out.conditionals.push(table.conditional(&a, &b, v, false));
                        out.conditionals.push(table.conditional(&b, &a, v, true));
                    }
                }
                Err(ProfileError::Cancelled) => return Err(ProfileError::Cancelled),
                Err(e) => {
                    warn!(parent = %a, child = %b, error = %e, "Association pair skipped");
                    out.failures.push(PairFailure {
                        columns: (a, b),
                        statistic: "contingency",
                        message: e.to_string(),
                    });
                }
            }
        }

        out.conditionals.sort_by(|x, y| {
            y.cramers_v
                .total_cmp(&x.cramers_v)
                .then_with(|| x.parent.cmp(&y.parent))
                .then_with(|| x.child.cmp(&y.child))
        });
        Ok(())
    }
}

/// Every unordered pair `(names[i], names[j])` with `i < j`, in order.
fn unordered_pairs<'a>(names: &'a [&'a str]) -> impl Iterator<Item = (String, String)> + 'a {
    names.iter().enumerate().flat_map(move |(i, a)| {
        names[i + 1..]
            .iter()
            .map(move |b| (a.to_string(), b.to_string()))
    })
}

async fn pearson(session: &ProfileSession, x: &str, y: &str) -> Result<Option<f64>> {
    let row = session
        .first_row(&AggregateQuery::PearsonSums {
            x: x.to_string(),
            y: y.to_string(),
        })
        .await?;
    let get = |i: usize| row.get(i).and_then(CellValue::as_f64);
    Ok(match (get(0), get(1), get(2), get(3), get(4), get(5)) {
        (Some(n), Some(sx), Some(sy), Some(sxx), Some(syy), Some(sxy)) => {
            pearson_from_sums(n, sx, sy, sxx, syy, sxy)
        }
        _ => None,
    })
}

/// Joint counts of two categorical columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Contingency {
    pub row_values: Vec<String>,
    pub col_values: Vec<String>,
    /// `counts[i][j]` for `row_values[i]` and `col_values[j]`.
    pub counts: Vec<Vec<u64>>,
}

impl Contingency {
    /// Builds the table from `(row value, column value, count)` triples.
    pub fn from_triples(triples: &[(String, String, u64)]) -> Self {
        let mut row_index: BTreeMap<&str, usize> = BTreeMap::new();
        let mut col_index: BTreeMap<&str, usize> = BTreeMap::new();
        for (r, c, _) in triples {
            row_index.entry(r.as_str()).or_insert(0);
            col_index.entry(c.as_str()).or_insert(0);
        }
        for (i, slot) in row_index.values_mut().enumerate() {
            *slot = i;
        }
        for (j, slot) in col_index.values_mut().enumerate() {
            *slot = j;
        }
        let mut counts = vec![vec![0u64; col_index.len()]; row_index.len()];
        for (r, c, n) in triples {
            counts[row_index[r.as_str()]][col_index[c.as_str()]] += n;
        }
        Self {
            row_values: row_index.keys().map(|k| k.to_string()).collect(),
            col_values: col_index.keys().map(|k| k.to_string()).collect(),
            counts,
        }
    }

    /// P(child | parent) with entries under 1% dropped.
    ///
    /// With `transposed` the table's columns are the parent.
    pub fn conditional(&self, parent: &str, child: &str, v: f64, transposed: bool) -> ConditionalTable {
        let (parents, children) = if transposed {
            (&self.col_values, &self.row_values)
        } else {
            (&self.row_values, &self.col_values)
        };
        let cell = |p: usize, c: usize| {
            if transposed {
                self.counts[c][p]
            } else {
                self.counts[p][c]
            }
        };

        let mut distribution = BTreeMap::new();
        for (p, parent_value) in parents.iter().enumerate() {
            let total: u64 = (0..children.len()).map(|c| cell(p, c)).sum();
            if total == 0 {
                continue;
            }
            let row: BTreeMap<String, f64> = children
                .iter()
                .enumerate()
                .map(|(c, child_value)| (child_value.clone(), cell(p, c) as f64 / total as f64))
                .filter(|(_, prob)| *prob >= MIN_CONDITIONAL_PROBABILITY)
                .collect();
            distribution.insert(parent_value.clone(), row);
        }

        ConditionalTable {
            parent: parent.to_string(),
            child: child.to_string(),
            cramers_v: v,
            distribution,
        }
    }
}

async fn contingency(session: &ProfileSession, parent: &str, child: &str) -> Result<Contingency> {
    let rows = session
        .rows(&AggregateQuery::Contingency {
            parent: parent.to_string(),
            child: child.to_string(),
        })
        .await?;
    let triples: Vec<(String, String, u64)> = rows
        .iter()
        .filter_map(|row| {
            let p = row.first()?.to_string();
            let c = row.get(1)?.to_string();
            let n = row.get(2)?.as_i64()?.max(0) as u64;
            Some((p, c, n))
        })
        .collect();
    Ok(Contingency::from_triples(&triples))
}
