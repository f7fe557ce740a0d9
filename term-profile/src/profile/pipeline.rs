//! The profiling pipeline.
//!
//! A run proceeds in three phases:
//!
//! 1. row count and one engine summary per column (fatal on failure);
//! 2. type inference and enrichment, one task per column, bounded by a
//!    semaphore;
//! 3. relationship analysis, column alerts and target analysis, concurrently.
//!
//! When phase 1 fails on malformed rows and the session carries an
//! error-tolerant read expression, the run is repeated against it and a
//! `RowsSkipped` alert is recorded.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use arrow::array::{ArrayRef, Float64Array, StringArray};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use datafusion::datasource::MemTable;
//! use datafusion::prelude::SessionContext;
//! use term_profile::engine::ProfileSession;
//! use term_profile::profile::DatasetProfiler;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let schema = Arc::new(Schema::new(vec![
//!     Field::new("price", DataType::Float64, true),
//!     Field::new("color", DataType::Utf8, true),
//! ]));
//! let batch = RecordBatch::try_new(
//!     schema.clone(),
//!     vec![
//!         Arc::new(Float64Array::from(vec![1.5, 2.0, 9.0, 4.25])) as ArrayRef,
//!         Arc::new(StringArray::from(vec!["red", "blue", "red", "red"])) as ArrayRef,
//!     ],
//! )
//! .unwrap();
//! let ctx = SessionContext::new();
//! ctx.register_table("items", Arc::new(MemTable::try_new(schema, vec![vec![batch]]).unwrap()))
//!     .unwrap();
//!
//! let session = ProfileSession::new(ctx, "items").unwrap();
//! let profile = DatasetProfiler::builder().top_k(5).build().profile(&session).await.unwrap();
//!
//! assert_eq!(profile.row_count, 4);
//! assert_eq!(profile.columns.len(), 2);
//! # })
//! ```

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::engine::{ColumnSummary, ProfileSession, DEFAULT_EXACT_QUANTILE_LIMIT};
use crate::error::{ProfileError, Result};
use crate::log_timing;
use crate::logging::LogConfig;
use crate::profile::alerts::{dataset_alerts, AlertDetector, DatasetFacts};
use crate::profile::enrichment::ColumnEnricher;
use crate::profile::inference::infer_semantic_type;
use crate::profile::relationships::{RelationshipAnalyzer, Relationships};
use crate::profile::target::{TargetAnalysis, TargetAnalyzer};
use crate::profile::types::{AlertSeverity, AlertType, ColumnProfile, DataAlert, Profile};
use crate::security::{InputValidator, SqlSecurity};

/// Tunables of a profiling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Number of most frequent values kept per column
    pub top_k: usize,
    /// Columns with at most this many distinct values get top values
    pub categorical_topk_cardinality: u64,
    /// Equal-width histogram bins for numeric columns
    pub histogram_bins: usize,
    /// Rows sampled for moments fallback, MAD and pattern detection
    pub sample_size: usize,
    /// Maximum numeric pairs evaluated for correlation
    pub correlation_pair_budget: usize,
    /// Maximum ordered categorical pairs evaluated for association
    pub association_pair_budget: usize,
    /// Upper bound on concurrently running column tasks
    pub max_concurrency: usize,
    /// Non-null count above which quartiles are approximate
    pub exact_quantile_limit: u64,
    /// Optional binary target column
    pub target_column: Option<String>,
    #[serde(skip)]
    pub log: LogConfig,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            categorical_topk_cardinality: 20,
            histogram_bins: 20,
            sample_size: 5000,
            correlation_pair_budget: 100,
            association_pair_budget: 100,
            max_concurrency: num_cpus::get().max(1),
            exact_quantile_limit: DEFAULT_EXACT_QUANTILE_LIMIT,
            target_column: None,
            log: LogConfig::default(),
        }
    }
}

impl ProfilerConfig {
    pub fn builder() -> ProfilerConfigBuilder {
        ProfilerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Rejects settings no run can honor.
    pub fn validate(&self) -> Result<()> {
        InputValidator::validate_positive(self.top_k, "top_k")?;
        InputValidator::validate_positive(self.histogram_bins, "histogram_bins")?;
        InputValidator::validate_positive(self.sample_size, "sample_size")?;
        InputValidator::validate_positive(self.max_concurrency, "max_concurrency")?;
        if let Some(target) = &self.target_column {
            SqlSecurity::validate_identifier(target)?;
        }
        Ok(())
    }
}

/// Builder for [`ProfilerConfig`].
#[derive(Debug, Clone)]
pub struct ProfilerConfigBuilder {
    config: ProfilerConfig,
}

impl ProfilerConfigBuilder {
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn categorical_topk_cardinality(mut self, cardinality: u64) -> Self {
        self.config.categorical_topk_cardinality = cardinality;
        self
    }

    pub fn histogram_bins(mut self, bins: usize) -> Self {
        self.config.histogram_bins = bins;
        self
    }

    pub fn sample_size(mut self, size: usize) -> Self {
        self.config.sample_size = size;
        self
    }

    pub fn correlation_pair_budget(mut self, budget: usize) -> Self {
        self.config.correlation_pair_budget = budget;
        self
    }

    pub fn association_pair_budget(mut self, budget: usize) -> Self {
        self.config.association_pair_budget = budget;
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n;
        self
    }

    pub fn exact_quantile_limit(mut self, limit: u64) -> Self {
        self.config.exact_quantile_limit = limit;
        self
    }

    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.config.target_column = Some(column.into());
        self
    }

    pub fn log_config(mut self, log: LogConfig) -> Self {
        self.config.log = log;
        self
    }

    pub fn build(self) -> ProfilerConfig {
        self.config
    }
}

/// Phase of a profiling run reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilePhase {
    Summaries,
    Enrichment,
    Relationships,
    Complete,
}

/// Progress information during profiling.
#[derive(Debug, Clone)]
pub struct ProfileProgress {
    pub phase: ProfilePhase,
    pub column: Option<String>,
    pub completed: usize,
    pub total: usize,
}

/// Progress callback for profiling runs.
pub type ProgressCallback = Arc<dyn Fn(ProfileProgress) + Send + Sync>;

/// Builder for [`DatasetProfiler`].
pub struct DatasetProfilerBuilder {
    config: ProfilerConfig,
    detector: Option<AlertDetector>,
    progress_callback: Option<ProgressCallback>,
}

impl DatasetProfilerBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: ProfilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.config.target_column = Some(column.into());
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n;
        self
    }

    /// Uses a custom rule set instead of the built-in rules.
    pub fn alert_detector(mut self, detector: AlertDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProfileProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> DatasetProfiler {
        DatasetProfiler {
            config: self.config,
            detector: Arc::new(self.detector.unwrap_or_default()),
            progress_callback: self.progress_callback,
        }
    }
}

/// Builds a [`Profile`] from a [`ProfileSession`].
#[derive(Clone)]
pub struct DatasetProfiler {
    config: ProfilerConfig,
    detector: Arc<AlertDetector>,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for DatasetProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetProfiler")
            .field("config", &self.config)
            .field("detector", &self.detector)
            .finish()
    }
}

impl Default for DatasetProfiler {
    fn default() -> Self {
        Self::new(ProfilerConfig::default())
    }
}

impl DatasetProfiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            detector: Arc::new(AlertDetector::default()),
            progress_callback: None,
        }
    }

    pub fn builder() -> DatasetProfilerBuilder {
        DatasetProfilerBuilder {
            config: ProfilerConfig::default(),
            detector: None,
            progress_callback: None,
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Profiles the session's source.
    pub async fn profile(&self, session: &ProfileSession) -> Result<Profile> {
        self.profile_with_cancel(session, &CancellationToken::new())
            .await
    }

    /// Profiles the session's source, checking `cancel` between columns and
    /// pairs.
    #[instrument(skip(self, session, cancel), fields(source = %session.source()))]
    pub async fn profile_with_cancel(
        &self,
        session: &ProfileSession,
        cancel: &CancellationToken,
    ) -> Result<Profile> {
        self.config.validate()?;
        match self.run(session, cancel, None).await {
            Err(e) if e.is_retryable() => {
                let Some((tolerant, skipped)) = session.tolerant() else {
                    return Err(ProfileError::MalformedSource(e.to_string()));
                };
                warn!(
                    error = %self.config.log.field(&e.to_string()),
                    tolerant_source = %tolerant.source(),
                    "Malformed rows in source, retrying in error-tolerant mode"
                );
                self.run(&tolerant, cancel, Some(skipped)).await
            }
            other => other,
        }
    }

    async fn run(
        &self,
        session: &ProfileSession,
        cancel: &CancellationToken,
        rows_skipped: Option<Option<u64>>,
    ) -> Result<Profile> {
        let started = Instant::now();
        let session = session
            .clone()
            .with_exact_quantile_limit(self.config.exact_quantile_limit);

        let (row_count, summaries) = self.summaries(&session, cancel).await?;
        log_timing!(
            self.config.log,
            elapsed_ms = started.elapsed().as_millis() as u64,
            columns = summaries.len(),
            "Summaries complete"
        );

        let columns = self.enrich_columns(&session, summaries, cancel).await?;
        log_timing!(
            self.config.log,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Enrichment complete"
        );
        self.report(ProfilePhase::Relationships, None, 0, 1);

        let relationships = RelationshipAnalyzer::new(self.config.clone());
        let targets = TargetAnalyzer::new(self.config.max_concurrency);
        let detector = Arc::clone(&self.detector);
        let (relationships, column_alerts, target) = tokio::join!(
            relationships.analyze(&session, &columns, cancel),
            async { detector.detect(&columns) },
            async {
                match &self.config.target_column {
                    Some(target) => Some(targets.analyze(&session, target, &columns, cancel).await),
                    None => None,
                }
            },
        );
        let relationships: Relationships = relationships?;

        let mut skipped_target = None;
        let target: Option<TargetAnalysis> = match target {
            None => None,
            Some(Ok(analysis)) => Some(analysis),
            Some(Err(ProfileError::Cancelled)) => return Err(ProfileError::Cancelled),
            Some(Err(e)) => {
                warn!(error = %self.config.log.field(&e.to_string()), "Target analysis skipped");
                skipped_target = Some(e);
                None
            }
        };

        let mut pair_failures = relationships.failures.clone();
        if let Some(analysis) = &target {
            pair_failures.extend(analysis.failures.iter().cloned());
        }

        let mut alerts = column_alerts;
        alerts.extend(dataset_alerts(&DatasetFacts {
            target: target.as_ref().map(|t| &t.profile),
            rows_skipped,
            columns: &columns,
            pair_failures: &pair_failures,
        }));
        if let (Some(e), Some(column)) = (skipped_target, &self.config.target_column) {
            alerts.push(DataAlert::new(
                AlertSeverity::Info,
                AlertType::StatisticUnavailable,
                Some(column),
                format!("Target analysis skipped: {e}"),
            ));
        }
        alerts.sort_by(|a, b| b.severity.cmp(&a.severity));

        self.report(ProfilePhase::Complete, None, columns.len(), columns.len());
        info!(
            rows = row_count,
            columns = columns.len(),
            correlations = relationships.correlations.len(),
            conditionals = relationships.conditionals.len(),
            alerts = alerts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Profile complete"
        );

        Ok(Profile {
            source: session.source().to_string(),
            row_count,
            columns,
            correlations: relationships.correlations,
            conditionals: relationships.conditionals,
            alerts,
            target: target.map(|t| t.profile),
            profiled_at: Utc::now(),
        })
    }

    /// Row count and per-column summaries; any failure here ends the run.
    async fn summaries(
        &self,
        session: &ProfileSession,
        cancel: &CancellationToken,
    ) -> Result<(u64, Vec<ColumnSummary>)> {
        let fatal = |e: ProfileError| {
            if e.is_retryable() || e.is_fatal() {
                e
            } else {
                ProfileError::source_unreadable(session.source(), e.to_string())
            }
        };

        let row_count = session.row_count().await.map_err(fatal)?;
        let schema = session.schema().await.map_err(fatal)?;
        let total = schema.len();
        let mut summaries = Vec::with_capacity(total);
        for (i, (name, data_type)) in schema.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ProfileError::Cancelled);
            }
            self.report(ProfilePhase::Summaries, Some(&name), i, total);
            let summary = session
                .summarize_column(&name, &data_type, row_count)
                .await
                .map_err(fatal)?;
            summaries.push(summary);
        }
        Ok((row_count, summaries))
    }

    /// Enriches every column in its own task, preserving schema order.
    #[instrument(skip_all, fields(columns = summaries.len()))]
    async fn enrich_columns(
        &self,
        session: &ProfileSession,
        summaries: Vec<ColumnSummary>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ColumnProfile>> {
        let total = summaries.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let enricher = ColumnEnricher::new(self.config.clone());
        let mut tasks = JoinSet::new();

        for (idx, summary) in summaries.iter().cloned().enumerate() {
            let session = session.clone();
            let enricher = enricher.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| ProfileError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(ProfileError::Cancelled);
                }
                Ok((idx, enricher.enrich(&session, &summary).await))
            });
        }

        let mut profiles: Vec<Option<ColumnProfile>> = vec![None; total];
        let mut completed = 0;
        loop {
            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(ProfileError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };
            match joined {
                Ok(Ok((idx, profile))) => {
                    completed += 1;
                    self.report(ProfilePhase::Enrichment, Some(&profile.name), completed, total);
                    profiles[idx] = Some(profile);
                }
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => warn!(error = %e, "Column enrichment task failed"),
            }
        }

        Ok(summaries
            .iter()
            .zip(profiles)
            .map(|(summary, profile)| {
                profile.unwrap_or_else(|| {
                    let mut fallback =
                        ColumnProfile::from_summary(summary, infer_semantic_type(summary));
                    fallback.mark_unavailable("enrichment", "column task did not complete");
                    fallback
                })
            })
            .collect())
    }

    fn report(&self, phase: ProfilePhase, column: Option<&str>, completed: usize, total: usize) {
        if let Some(callback) = &self.progress_callback {
            callback(ProfileProgress {
                phase,
                column: column.map(str::to_string),
                completed,
                total,
            });
        }
    }
}
