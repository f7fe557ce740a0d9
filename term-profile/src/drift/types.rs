//! Result types of a profile comparison.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::profile::types::SemanticType;

/// Column set differences between two profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaChanges {
    pub added_columns: Vec<String>,
    pub removed_columns: Vec<String>,
    pub type_changes: Vec<TypeChange>,
}

impl SchemaChanges {
    pub fn change_count(&self) -> usize {
        self.added_columns.len() + self.removed_columns.len() + self.type_changes.len()
    }

    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }
}

/// A shared column whose inferred semantic type differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChange {
    pub column: String,
    pub baseline: SemanticType,
    pub current: SemanticType,
}

/// Row count movement between the two profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCountChange {
    pub baseline: u64,
    pub current: u64,
    pub absolute_change: i64,
    pub percent_change: f64,
    pub is_significant: bool,
}

/// Per-value movement of a categorical column, in percentage points of
/// non-null rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub value: String,
    pub baseline_percent: f64,
    pub current_percent: f64,
    pub change_pp: f64,
    pub status: ValueStatus,
    pub flagged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueStatus {
    New,
    Removed,
    Changed,
    Stable,
}

/// Deltas of numeric statistics, current minus baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericDeltas {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub skewness: Option<f64>,
}

/// Comparison of one column present in both profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDiff {
    pub column: String,
    pub semantic_type: SemanticType,
    pub null_percent_delta: f64,
    pub unique_percent_delta: f64,
    pub numeric: Option<NumericDeltas>,
    pub value_changes: Vec<ValueChange>,
    pub psi: Option<f64>,
    pub ks_statistic: Option<f64>,
    pub js_divergence: Option<f64>,
}

impl ColumnDiff {
    /// Largest of the column's divergence metrics.
    pub fn max_divergence(&self) -> f64 {
        [self.psi, self.ks_statistic, self.js_divergence]
            .into_iter()
            .flatten()
            .fold(0.0, f64::max)
    }
}

/// Priority of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("INFO"),
            Self::Warning => f.write_str("WARNING"),
            Self::Critical => f.write_str("CRITICAL"),
        }
    }
}

/// An action suggested by the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub column: Option<String>,
    pub message: String,
}

/// Full outcome of comparing a baseline profile with a current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDiffResult {
    pub baseline_source: String,
    pub current_source: String,
    pub schema_changes: SchemaChanges,
    pub row_count_change: RowCountChange,
    pub column_diffs: Vec<ColumnDiff>,
    pub drift_score: f64,
    pub is_significant: bool,
    pub summary: String,
    pub recommendations: Vec<Recommendation>,
}

impl ProfileDiffResult {
    pub fn column(&self, name: &str) -> Option<&ColumnDiff> {
        self.column_diffs.iter().find(|d| d.column == name)
    }

    /// Columns whose PSI reaches `threshold`.
    pub fn drifted_columns(&self, threshold: f64) -> Vec<&str> {
        self.column_diffs
            .iter()
            .filter(|d| d.psi.is_some_and(|psi| psi >= threshold))
            .map(|d| d.column.as_str())
            .collect()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
