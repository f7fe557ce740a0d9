//! The profile data model.
//!
//! A [`Profile`] is built once by the pipeline and never mutated afterwards.
//! Everything here is plain data with serde derives so that external
//! collaborators can persist or render it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{CellValue, ColumnSummary};
use crate::error::Result;

/// Inferred semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticType {
    Id,
    Boolean,
    DateTime,
    Numeric,
    Categorical,
    Text,
    Unknown,
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Id => "Id",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
            Self::Numeric => "Numeric",
            Self::Categorical => "Categorical",
            Self::Text => "Text",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// How a column may be reproduced in synthetic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SynthesisPolicy {
    /// Personally identifying data, always regenerated.
    Mask,
    /// Person names, regenerated from name-shaped fakes.
    FakerPattern,
    SequentialId,
    /// Near-unique free text, omitted from synthetic output.
    Exclude,
    /// Low-cardinality values that may be copied when k-anonymous.
    CopySafe,
    Synthetic,
}

/// Text shapes recognized in string columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TextPattern {
    Email,
    Url,
    Phone,
    Uuid,
    IpAddress,
    CreditCard,
    PostalCode,
    Date,
    Currency,
    Percentage,
}

impl TextPattern {
    pub const ALL: [TextPattern; 10] = [
        Self::Email,
        Self::Url,
        Self::Phone,
        Self::Uuid,
        Self::IpAddress,
        Self::CreditCard,
        Self::PostalCode,
        Self::Date,
        Self::Currency,
        Self::Percentage,
    ];

    /// True for patterns that identify a person or account.
    pub fn is_pii(&self) -> bool {
        matches!(
            self,
            Self::Email | Self::Phone | Self::CreditCard | Self::IpAddress
        )
    }
}

/// One detected text pattern with the share of sampled values it matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern: TextPattern,
    pub match_rate: f64,
}

/// Shape of a numeric distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionFamily {
    Normal,
    Uniform,
    Exponential,
    Skewed,
    Bimodal,
    PowerLaw,
    Unknown,
}

/// Regular spacing of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeGranularity {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Irregular,
}

/// Temporal facts about a DateTime column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalStats {
    pub granularity: TimeGranularity,
    /// Most common gap between consecutive distinct values, when dominant.
    pub dominant_gap_seconds: Option<i64>,
}

/// Length statistics of a text column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    pub avg_length: f64,
    pub min_length: u64,
    pub max_length: u64,
    pub empty_count: u64,
}

/// One entry of a top-K list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopValue {
    pub value: String,
    pub count: u64,
    /// Share of all rows, in percent.
    pub percent: f64,
}

/// The top-K list of a low-cardinality column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopValues {
    pub values: Vec<TopValue>,
    pub mode: Option<String>,
    /// Shannon entropy (bits) over the top-K shares.
    pub entropy: f64,
    /// Top share divided by the uniform expected share.
    pub imbalance_ratio: f64,
    /// Non-null rows not covered by the listed values.
    pub other_count: u64,
    pub other_percent: f64,
}

/// An equal-width histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `counts.len() + 1` strictly increasing edges.
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }
}

/// A statistic that could not be computed for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailableStatistic {
    pub statistic: String,
    pub message: String,
}

/// Everything known about one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub declared_type: String,
    pub semantic_type: SemanticType,
    /// Total rows, nulls included.
    pub count: u64,
    pub null_count: u64,
    pub null_percent: f64,
    pub distinct_count: u64,
    pub min: Option<CellValue>,
    pub max: Option<CellValue>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    pub q25: Option<f64>,
    pub q75: Option<f64>,
    pub skewness: Option<f64>,
    /// Excess kurtosis.
    pub kurtosis: Option<f64>,
    /// Median absolute deviation from the median.
    pub mad: Option<f64>,
    pub outlier_count: Option<u64>,
    /// Tukey fences `(lower, upper)`.
    pub outlier_bounds: Option<(f64, f64)>,
    pub zero_count: Option<u64>,
    pub top_values: Option<TopValues>,
    pub histogram: Option<Histogram>,
    pub distribution: Option<DistributionFamily>,
    pub text_stats: Option<TextStats>,
    pub patterns: Vec<PatternMatch>,
    pub temporal: Option<TemporalStats>,
    /// Share of `true` among non-null booleans.
    pub true_rate: Option<f64>,
    pub synthesis_policy: SynthesisPolicy,
    pub unavailable: Vec<UnavailableStatistic>,
}

impl ColumnProfile {
    /// Starts a profile from the engine summary and the inferred type.
    pub fn from_summary(summary: &ColumnSummary, semantic_type: SemanticType) -> Self {
        let null_count = summary.null_count();
        let null_percent = if summary.row_count == 0 {
            0.0
        } else {
            null_count as f64 / summary.row_count as f64 * 100.0
        };
        Self {
            name: summary.name.clone(),
            declared_type: summary.declared_type.clone(),
            semantic_type,
            count: summary.row_count,
            null_count,
            null_percent,
            distinct_count: summary.distinct_count.min(summary.row_count),
            min: summary.min.clone(),
            max: summary.max.clone(),
            mean: summary.mean,
            median: summary.median,
            std_dev: summary.std_dev,
            q25: summary.q25,
            q75: summary.q75,
            skewness: None,
            kurtosis: None,
            mad: None,
            outlier_count: None,
            outlier_bounds: None,
            zero_count: None,
            top_values: None,
            histogram: None,
            distribution: None,
            text_stats: None,
            patterns: Vec::new(),
            temporal: None,
            true_rate: None,
            synthesis_policy: SynthesisPolicy::Synthetic,
            unavailable: Vec::new(),
        }
    }

    pub fn non_null_count(&self) -> u64 {
        self.count.saturating_sub(self.null_count)
    }

    /// Distinct values as a percentage of all rows.
    pub fn unique_percent(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.distinct_count as f64 / self.count as f64 * 100.0
        }
    }

    pub fn null_rate(&self) -> f64 {
        self.null_percent / 100.0
    }

    pub fn min_f64(&self) -> Option<f64> {
        self.min.as_ref().and_then(CellValue::as_f64)
    }

    pub fn max_f64(&self) -> Option<f64> {
        self.max.as_ref().and_then(CellValue::as_f64)
    }

    pub fn iqr(&self) -> Option<f64> {
        Some(self.q75? - self.q25?)
    }

    /// The pattern with the highest match rate.
    pub fn dominant_pattern(&self) -> Option<&PatternMatch> {
        self.patterns
            .iter()
            .max_by(|a, b| a.match_rate.total_cmp(&b.match_rate))
    }

    pub fn has_pattern(&self, pattern: TextPattern) -> bool {
        self.patterns.iter().any(|p| p.pattern == pattern)
    }

    /// Records a statistic that could not be computed.
    pub fn mark_unavailable(&mut self, statistic: &str, message: impl Into<String>) {
        self.unavailable.push(UnavailableStatistic {
            statistic: statistic.to_string(),
            message: message.into(),
        });
    }
}

/// Qualitative strength of a Pearson coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrelationStrength {
    StrongPositive,
    ModeratePositive,
    WeakPositive,
    WeakNegative,
    ModerateNegative,
    StrongNegative,
}

impl CorrelationStrength {
    pub fn from_coefficient(r: f64) -> Self {
        let magnitude = r.abs();
        match (r >= 0.0, magnitude) {
            (true, m) if m >= 0.7 => Self::StrongPositive,
            (true, m) if m >= 0.5 => Self::ModeratePositive,
            (true, _) => Self::WeakPositive,
            (false, m) if m >= 0.7 => Self::StrongNegative,
            (false, m) if m >= 0.5 => Self::ModerateNegative,
            (false, _) => Self::WeakNegative,
        }
    }
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::StrongPositive => "strong positive",
            Self::ModeratePositive => "moderate positive",
            Self::WeakPositive => "weak positive",
            Self::WeakNegative => "weak negative",
            Self::ModerateNegative => "moderate negative",
            Self::StrongNegative => "strong negative",
        };
        f.write_str(label)
    }
}

/// Pearson correlation between two numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCorrelation {
    pub column_a: String,
    pub column_b: String,
    pub coefficient: f64,
    pub strength: CorrelationStrength,
}

impl ColumnCorrelation {
    /// True when this correlation relates `a` and `b`, in either order.
    pub fn involves(&self, a: &str, b: &str) -> bool {
        (self.column_a == a && self.column_b == b) || (self.column_a == b && self.column_b == a)
    }
}

/// Association between two categorical columns with P(child | parent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalTable {
    pub parent: String,
    pub child: String,
    pub cramers_v: f64,
    pub distribution: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Effect size metric of a feature on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectMetric {
    CohensD,
    RateDeviation,
}

impl fmt::Display for EffectMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CohensD => f.write_str("cohens_d"),
            Self::RateDeviation => f.write_str("rate_deviation"),
        }
    }
}

/// How strongly one feature separates the target classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEffect {
    pub feature: String,
    pub metric: EffectMetric,
    /// Absolute effect size.
    pub magnitude: f64,
    /// Fraction of rows the effect is measured on, in [0, 1].
    pub support: f64,
    pub summary: String,
}

impl FeatureEffect {
    pub fn score(&self) -> f64 {
        self.magnitude * self.support
    }
}

/// Binary target analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub column: String,
    pub is_binary: bool,
    pub positive_class: String,
    /// Class label to share of non-null rows; shares sum to 1.
    pub class_distribution: BTreeMap<String, f64>,
    pub effects: Vec<FeatureEffect>,
}

impl TargetProfile {
    pub fn positive_rate(&self) -> f64 {
        self.class_distribution
            .get(&self.positive_class)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn minority_share(&self) -> f64 {
        self.class_distribution
            .values()
            .copied()
            .fold(f64::INFINITY, f64::min)
            .min(1.0)
    }
}

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("INFO"),
            Self::Warning => f.write_str("WARNING"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// Alert type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    HighNulls,
    Constant,
    HighCardinality,
    HighSkewness,
    Outliers,
    Imbalanced,
    PotentialLeakage,
    OrdinalAsCategory,
    ZeroInflated,
    TargetImbalance,
    RowsSkipped,
    StatisticUnavailable,
}

/// An advisory finding about the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAlert {
    pub severity: AlertSeverity,
    pub alert_type: AlertType,
    pub column: Option<String>,
    pub message: String,
}

impl DataAlert {
    pub fn new(
        severity: AlertSeverity,
        alert_type: AlertType,
        column: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            alert_type,
            column: column.map(str::to_string),
            message: message.into(),
        }
    }
}

/// The structured statistical description of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub source: String,
    pub row_count: u64,
    pub columns: Vec<ColumnProfile>,
    pub correlations: Vec<ColumnCorrelation>,
    pub conditionals: Vec<ConditionalTable>,
    pub alerts: Vec<DataAlert>,
    pub target: Option<TargetProfile>,
    pub profiled_at: DateTime<Utc>,
}

impl Profile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn alerts_for<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a DataAlert> + 'a {
        self.alerts
            .iter()
            .filter(move |a| a.column.as_deref() == Some(column))
    }

    pub fn has_alert(&self, column: &str, alert_type: AlertType) -> bool {
        self.alerts_for(column).any(|a| a.alert_type == alert_type)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
