//! Rule-based data quality alerts.
//!
//! Column rules implement [`AlertRule`] and are evaluated by an
//! [`AlertDetector`] over enriched columns. Dataset-level alerts (target
//! imbalance, skipped rows, unavailable statistics) are raised from facts
//! gathered during the run.

use tracing::{debug, instrument};

use crate::profile::relationships::PairFailure;
use crate::profile::types::{
    AlertSeverity, AlertType, ColumnProfile, DataAlert, SemanticType, TargetProfile,
};

/// Average text length from which a column counts as long free text.
pub const LONG_TEXT_AVG_LENGTH: f64 = 50.0;

/// A stateless check over one enriched column.
pub trait AlertRule: Send + Sync {
    /// Evaluates the rule against one column.
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Evaluates a set of alert rules.
pub struct AlertDetector {
    rules: Vec<Box<dyn AlertRule>>,
}

impl std::fmt::Debug for AlertDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDetector")
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AlertDetector {
    /// A detector with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// A detector with every built-in column rule at default thresholds.
    pub fn with_default_rules() -> Self {
        Self::new()
            .add_rule(Box::new(HighNullsRule::default()))
            .add_rule(Box::new(ConstantRule))
            .add_rule(Box::new(HighCardinalityRule::default()))
            .add_rule(Box::new(HighSkewnessRule::default()))
            .add_rule(Box::new(OutliersRule::default()))
            .add_rule(Box::new(ImbalancedRule::default()))
            .add_rule(Box::new(PotentialLeakageRule::default()))
            .add_rule(Box::new(OrdinalAsCategoryRule::default()))
            .add_rule(Box::new(ZeroInflatedRule::default()))
    }

    pub fn add_rule(mut self, rule: Box<dyn AlertRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Column alerts for every column, in column order.
    #[instrument(skip(self, columns), fields(columns = columns.len()))]
    pub fn detect(&self, columns: &[ColumnProfile]) -> Vec<DataAlert> {
        let mut alerts = Vec::new();
        for column in columns {
            for rule in &self.rules {
                if let Some(alert) = rule.check(column) {
                    debug!(column = %column.name, rule = rule.name(), "Alert raised");
                    alerts.push(alert);
                }
            }
        }
        alerts
    }
}

impl Default for AlertDetector {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

/// Facts about a run that produce dataset-level alerts.
#[derive(Debug, Default)]
pub struct DatasetFacts<'a> {
    pub target: Option<&'a TargetProfile>,
    /// Set when the source was re-read in error-tolerant mode; carries the
    /// skipped row count when known.
    pub rows_skipped: Option<Option<u64>>,
    pub columns: &'a [ColumnProfile],
    pub pair_failures: &'a [PairFailure],
}

/// Dataset-level alerts derived from `facts`.
pub fn dataset_alerts(facts: &DatasetFacts<'_>) -> Vec<DataAlert> {
    let mut alerts = Vec::new();

    if let Some(target) = facts.target {
        let minority = target.minority_share();
        let severity = if minority < 0.05 {
            Some(AlertSeverity::Error)
        } else if minority < 0.20 {
            Some(AlertSeverity::Warning)
        } else {
            None
        };
        if let Some(severity) = severity {
            alerts.push(DataAlert::new(
                severity,
                AlertType::TargetImbalance,
                Some(&target.column),
                format!(
                    "Minority class holds {:.1}% of rows; consider resampling or class weights",
                    minority * 100.0
                ),
            ));
        }
    }

    if let Some(skipped) = facts.rows_skipped {
        let message = match skipped {
            Some(n) => format!("{n} malformed rows were skipped while reading the source"),
            None => "Malformed rows were skipped while reading the source".to_string(),
        };
        alerts.push(DataAlert::new(
            AlertSeverity::Warning,
            AlertType::RowsSkipped,
            None,
            message,
        ));
    }

    for column in facts.columns {
        for missing in &column.unavailable {
            alerts.push(DataAlert::new(
                AlertSeverity::Info,
                AlertType::StatisticUnavailable,
                Some(&column.name),
                format!("{} could not be computed: {}", missing.statistic, missing.message),
            ));
        }
    }

    for failure in facts.pair_failures {
        alerts.push(DataAlert::new(
            AlertSeverity::Info,
            AlertType::StatisticUnavailable,
            None,
            format!(
                "{} for ({}, {}) could not be computed: {}",
                failure.statistic, failure.columns.0, failure.columns.1, failure.message
            ),
        ));
    }

    alerts
}

fn is_long_text(column: &ColumnProfile) -> bool {
    column.semantic_type == SemanticType::Text
        && column
            .text_stats
            .as_ref()
            .is_some_and(|t| t.avg_length >= LONG_TEXT_AVG_LENGTH)
}

/// Null share above `warning_percent`, escalated above `error_percent`.
#[derive(Debug, Clone)]
pub struct HighNullsRule {
    pub warning_percent: f64,
    pub error_percent: f64,
}

impl Default for HighNullsRule {
    fn default() -> Self {
        Self {
            warning_percent: 10.0,
            error_percent: 50.0,
        }
    }
}

impl AlertRule for HighNullsRule {
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert> {
        let severity = if column.null_percent > self.error_percent {
            AlertSeverity::Error
        } else if column.null_percent > self.warning_percent {
            AlertSeverity::Warning
        } else {
            return None;
        };
        Some(DataAlert::new(
            severity,
            AlertType::HighNulls,
            Some(&column.name),
            format!(
                "{:.1}% of values are null ({} of {})",
                column.null_percent, column.null_count, column.count
            ),
        ))
    }

    fn name(&self) -> &str {
        "high_nulls"
    }
}

/// A single distinct non-null value.
#[derive(Debug, Clone, Copy)]
pub struct ConstantRule;

impl AlertRule for ConstantRule {
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert> {
        if column.distinct_count != 1 || column.non_null_count() == 0 {
            return None;
        }
        let value = column
            .top_values
            .as_ref()
            .and_then(|t| t.mode.clone())
            .or_else(|| column.min.as_ref().map(ToString::to_string));
        let message = match value {
            Some(v) => format!("Column has a single value ({v}) and carries no information"),
            None => "Column has a single value and carries no information".to_string(),
        };
        Some(DataAlert::new(
            AlertSeverity::Warning,
            AlertType::Constant,
            Some(&column.name),
            message,
        ))
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// Nearly every value unique in a column that should repeat.
#[derive(Debug, Clone)]
pub struct HighCardinalityRule {
    pub unique_percent: f64,
}

impl Default for HighCardinalityRule {
    fn default() -> Self {
        Self {
            unique_percent: 95.0,
        }
    }
}

impl AlertRule for HighCardinalityRule {
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert> {
        if matches!(
            column.semantic_type,
            SemanticType::Numeric | SemanticType::Id | SemanticType::DateTime
        ) || is_long_text(column)
            || column.unique_percent() <= self.unique_percent
        {
            return None;
        }
        Some(DataAlert::new(
            AlertSeverity::Info,
            AlertType::HighCardinality,
            Some(&column.name),
            format!(
                "{:.1}% of values are unique ({} distinct)",
                column.unique_percent(),
                column.distinct_count
            ),
        ))
    }

    fn name(&self) -> &str {
        "high_cardinality"
    }
}

/// Absolute skewness above a threshold.
#[derive(Debug, Clone)]
pub struct HighSkewnessRule {
    pub threshold: f64,
}

impl Default for HighSkewnessRule {
    fn default() -> Self {
        Self { threshold: 2.0 }
    }
}

impl AlertRule for HighSkewnessRule {
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert> {
        let skew = column.skewness?;
        if skew.abs() <= self.threshold {
            return None;
        }
        let side = if skew > 0.0 { "right" } else { "left" };
        Some(DataAlert::new(
            AlertSeverity::Info,
            AlertType::HighSkewness,
            Some(&column.name),
            format!("Distribution is heavily {side}-skewed (skewness {skew:.2})"),
        ))
    }

    fn name(&self) -> &str {
        "high_skewness"
    }
}

/// Values outside the Tukey fences, escalated above a share of rows.
#[derive(Debug, Clone)]
pub struct OutliersRule {
    pub warning_percent: f64,
}

impl Default for OutliersRule {
    fn default() -> Self {
        Self {
            warning_percent: 5.0,
        }
    }
}

impl AlertRule for OutliersRule {
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert> {
        let count = column.outlier_count.filter(|n| *n > 0)?;
        let (lower, upper) = column.outlier_bounds?;
        let percent = count as f64 / column.count.max(1) as f64 * 100.0;
        let severity = if percent > self.warning_percent {
            AlertSeverity::Warning
        } else {
            AlertSeverity::Info
        };
        Some(DataAlert::new(
            severity,
            AlertType::Outliers,
            Some(&column.name),
            format!(
                "{count} values ({percent:.1}%) fall outside [{lower:.4}, {upper:.4}]"
            ),
        ))
    }

    fn name(&self) -> &str {
        "outliers"
    }
}

/// Top category far above its uniform-expected share.
#[derive(Debug, Clone)]
pub struct ImbalancedRule {
    pub ratio: f64,
}

impl Default for ImbalancedRule {
    fn default() -> Self {
        Self { ratio: 5.0 }
    }
}

impl AlertRule for ImbalancedRule {
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert> {
        let top = column.top_values.as_ref()?;
        if top.imbalance_ratio <= self.ratio {
            return None;
        }
        let mode = top.mode.as_deref().unwrap_or("?");
        Some(DataAlert::new(
            AlertSeverity::Warning,
            AlertType::Imbalanced,
            Some(&column.name),
            format!(
                "'{mode}' dominates at {:.1}x its expected share",
                top.imbalance_ratio
            ),
        ))
    }

    fn name(&self) -> &str {
        "imbalanced"
    }
}

/// Near-unique values that could identify rows or encode the outcome.
#[derive(Debug, Clone)]
pub struct PotentialLeakageRule {
    pub unique_percent: f64,
    pub min_distinct: u64,
}

impl Default for PotentialLeakageRule {
    fn default() -> Self {
        Self {
            unique_percent: 90.0,
            min_distinct: 100,
        }
    }
}

impl AlertRule for PotentialLeakageRule {
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert> {
        if matches!(
            column.semantic_type,
            SemanticType::Id | SemanticType::DateTime
        ) || is_long_text(column)
            || column.unique_percent() <= self.unique_percent
            || column.distinct_count <= self.min_distinct
        {
            return None;
        }
        Some(DataAlert::new(
            AlertSeverity::Warning,
            AlertType::PotentialLeakage,
            Some(&column.name),
            format!(
                "{:.1}% unique values across {} distinct; a near-unique feature can act as a \
                 row identifier and leak the outcome into a model",
                column.unique_percent(),
                column.distinct_count
            ),
        ))
    }

    fn name(&self) -> &str {
        "potential_leakage"
    }
}

/// Categorical values that are all small integers.
#[derive(Debug, Clone)]
pub struct OrdinalAsCategoryRule {
    pub max_abs_value: i64,
}

impl Default for OrdinalAsCategoryRule {
    fn default() -> Self {
        Self { max_abs_value: 100 }
    }
}

impl AlertRule for OrdinalAsCategoryRule {
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert> {
        if column.semantic_type != SemanticType::Categorical {
            return None;
        }
        let top = column.top_values.as_ref()?;
        if top.values.is_empty() {
            return None;
        }
        let all_small = top.values.iter().all(|v| {
            v.value
                .trim()
                .parse::<i64>()
                .is_ok_and(|n| n.abs() <= self.max_abs_value)
        });
        if !all_small {
            return None;
        }
        Some(DataAlert::new(
            AlertSeverity::Info,
            AlertType::OrdinalAsCategory,
            Some(&column.name),
            "Values are small integers; the column may be ordinal rather than nominal",
        ))
    }

    fn name(&self) -> &str {
        "ordinal_as_category"
    }
}

/// Exact zeros above a share of non-null values.
#[derive(Debug, Clone)]
pub struct ZeroInflatedRule {
    pub zero_share: f64,
}

impl Default for ZeroInflatedRule {
    fn default() -> Self {
        Self { zero_share: 0.3 }
    }
}

impl AlertRule for ZeroInflatedRule {
    fn check(&self, column: &ColumnProfile) -> Option<DataAlert> {
        let zeros = column.zero_count?;
        let non_null = column.non_null_count();
        if non_null == 0 {
            return None;
        }
        let share = zeros as f64 / non_null as f64;
        if share <= self.zero_share {
            return None;
        }
        Some(DataAlert::new(
            AlertSeverity::Info,
            AlertType::ZeroInflated,
            Some(&column.name),
            format!("{:.1}% of values are exactly zero", share * 100.0),
        ))
    }

    fn name(&self) -> &str {
        "zero_inflated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CellValue, ColumnSummary, DeclaredKind};
    use crate::profile::types::{TextStats, TopValue, TopValues};
    use std::collections::BTreeMap;

    fn column(name: &str, semantic: SemanticType, rows: u64, nulls: u64, distinct: u64) -> ColumnProfile {
        let summary = ColumnSummary {
            name: name.to_string(),
            declared_type: "Utf8".to_string(),
            declared_kind: DeclaredKind::Text,
            row_count: rows,
            non_null_count: rows - nulls,
            distinct_count: distinct,
            min: None,
            max: None,
            mean: None,
            std_dev: None,
            q25: None,
            median: None,
            q75: None,
            null_fraction: nulls as f64 / rows as f64,
        };
        ColumnProfile::from_summary(&summary, semantic)
    }

    fn top(values: &[(&str, u64)], imbalance_ratio: f64) -> TopValues {
        TopValues {
            values: values
                .iter()
                .map(|(v, n)| TopValue {
                    value: v.to_string(),
                    count: *n,
                    percent: 0.0,
                })
                .collect(),
            mode: values.first().map(|(v, _)| v.to_string()),
            entropy: 0.0,
            imbalance_ratio,
            other_count: 0,
            other_percent: 0.0,
        }
    }

    fn kinds(alerts: &[DataAlert]) -> Vec<AlertType> {
        alerts.iter().map(|a| a.alert_type).collect()
    }

    #[test]
    fn test_high_nulls_escalation() {
        let rule = HighNullsRule::default();
        assert!(rule.check(&column("a", SemanticType::Text, 100, 5, 50)).is_none());
        let warn = rule.check(&column("a", SemanticType::Text, 100, 20, 50)).unwrap();
        assert_eq!(warn.severity, AlertSeverity::Warning);
        let err = rule.check(&column("a", SemanticType::Text, 100, 60, 20)).unwrap();
        assert_eq!(err.severity, AlertSeverity::Error);
        assert_eq!(err.column.as_deref(), Some("a"));
    }

    #[test]
    fn test_constant_and_cardinality() {
        let mut constant = column("flag", SemanticType::Categorical, 100, 0, 1);
        constant.min = Some(CellValue::Text("x".into()));
        let alert = ConstantRule.check(&constant).unwrap();
        assert!(alert.message.contains("(x)"));

        let codes = column("code", SemanticType::Text, 1000, 0, 990);
        assert!(HighCardinalityRule::default().check(&codes).is_some());
        let numeric = column("amount", SemanticType::Numeric, 1000, 0, 990);
        assert!(HighCardinalityRule::default().check(&numeric).is_none());

        let mut essay = column("essay", SemanticType::Text, 1000, 0, 990);
        essay.text_stats = Some(TextStats {
            avg_length: 400.0,
            min_length: 10,
            max_length: 2000,
            empty_count: 0,
        });
        assert!(HighCardinalityRule::default().check(&essay).is_none());
        assert!(PotentialLeakageRule::default().check(&essay).is_none());
    }

    #[test]
    fn test_leakage_needs_enough_distinct_values() {
        let small = column("code", SemanticType::Text, 50, 0, 50);
        assert!(PotentialLeakageRule::default().check(&small).is_none());
        let large = column("code", SemanticType::Text, 500, 0, 480);
        let alert = PotentialLeakageRule::default().check(&large).unwrap();
        assert!(alert.message.contains("leak"));
        let id = column("code", SemanticType::Id, 500, 0, 500);
        assert!(PotentialLeakageRule::default().check(&id).is_none());
    }

    #[test]
    fn test_numeric_rules() {
        let mut c = column("amount", SemanticType::Numeric, 100, 0, 80);
        c.skewness = Some(-3.1);
        c.outlier_count = Some(8);
        c.outlier_bounds = Some((-1.0, 7.0));
        c.zero_count = Some(40);

        let alerts = AlertDetector::with_default_rules().detect(&[c]);
        let types = kinds(&alerts);
        assert!(types.contains(&AlertType::HighSkewness));
        assert!(types.contains(&AlertType::ZeroInflated));
        let outliers = alerts
            .iter()
            .find(|a| a.alert_type == AlertType::Outliers)
            .unwrap();
        assert_eq!(outliers.severity, AlertSeverity::Warning);
        assert!(outliers.message.contains("7.0000"));
        assert!(alerts
            .iter()
            .find(|a| a.alert_type == AlertType::HighSkewness)
            .unwrap()
            .message
            .contains("left"));
    }

    #[test]
    fn test_categorical_rules() {
        let mut rating = column("rating", SemanticType::Categorical, 500, 0, 5);
        rating.top_values = Some(top(&[("5", 300), ("4", 100), ("1", 100)], 3.0));
        let types = kinds(&AlertDetector::default().detect(&[rating.clone()]));
        assert!(types.contains(&AlertType::OrdinalAsCategory));
        assert!(!types.contains(&AlertType::Imbalanced));

        rating.top_values = Some(top(&[("a", 480), ("b", 20)], 9.6));
        let types = kinds(&AlertDetector::default().detect(&[rating]));
        assert!(types.contains(&AlertType::Imbalanced));
        assert!(!types.contains(&AlertType::OrdinalAsCategory));
    }

    #[test]
    fn test_dataset_alerts() {
        let target = TargetProfile {
            column: "fraud".into(),
            is_binary: true,
            positive_class: "1".into(),
            class_distribution: BTreeMap::from([("0".into(), 0.97), ("1".into(), 0.03)]),
            effects: Vec::new(),
        };
        let mut col = column("amount", SemanticType::Numeric, 10, 0, 10);
        col.mark_unavailable("histogram", "division by zero");
        let failures = vec![PairFailure {
            columns: ("a".into(), "b".into()),
            statistic: "pearson",
            message: "boom".into(),
        }];
        let columns = [col];
        let alerts = dataset_alerts(&DatasetFacts {
            target: Some(&target),
            rows_skipped: Some(Some(3)),
            columns: &columns,
            pair_failures: &failures,
        });

        assert_eq!(alerts[0].alert_type, AlertType::TargetImbalance);
        assert_eq!(alerts[0].severity, AlertSeverity::Error);
        assert!(alerts[1].message.starts_with("3 malformed rows"));
        assert_eq!(
            alerts
                .iter()
                .filter(|a| a.alert_type == AlertType::StatisticUnavailable)
                .count(),
            2
        );
    }

    #[test]
    fn test_balanced_target_raises_nothing() {
        let target = TargetProfile {
            column: "y".into(),
            is_binary: true,
            positive_class: "1".into(),
            class_distribution: BTreeMap::from([("0".into(), 0.6), ("1".into(), 0.4)]),
            effects: Vec::new(),
        };
        let alerts = dataset_alerts(&DatasetFacts {
            target: Some(&target),
            ..Default::default()
        });
        assert!(alerts.is_empty());
    }
}
