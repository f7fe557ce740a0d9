//! Dataset profiling.
//!
//! [`DatasetProfiler`] turns a [`ProfileSession`](crate::engine::ProfileSession)
//! into a [`Profile`]: semantic types, per-column statistics, pairwise
//! relationships, alerts and an optional binary target analysis.

pub mod alerts;
pub mod enrichment;
pub mod inference;
pub mod patterns;
pub mod pipeline;
pub mod relationships;
pub mod statistics;
pub mod target;
pub mod types;

pub use alerts::{AlertDetector, AlertRule};
pub use enrichment::{assign_synthesis_policy, ColumnEnricher};
pub use inference::infer_semantic_type;
pub use pipeline::{
    DatasetProfiler, DatasetProfilerBuilder, ProfilePhase, ProfileProgress, ProfilerConfig,
    ProfilerConfigBuilder,
};
pub use relationships::RelationshipAnalyzer;
pub use target::TargetAnalyzer;
pub use types::{
    AlertSeverity, AlertType, ColumnCorrelation, ColumnProfile, ConditionalTable,
    CorrelationStrength, DataAlert, DistributionFamily, EffectMetric, FeatureEffect, Histogram,
    PatternMatch, Profile, SemanticType, SynthesisPolicy, TargetProfile, TemporalStats,
    TextPattern, TextStats, TimeGranularity, TopValue, TopValues,
};
