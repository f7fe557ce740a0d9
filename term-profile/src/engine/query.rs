//! Closed set of ad hoc aggregate queries issued against a read expression.
//!
//! Every statistic the profiler needs beyond the column summary is one
//! [`AggregateQuery`] variant. Rendering validates and quotes identifiers and
//! literals through [`SqlSecurity`], so callers never build SQL by hand.

use crate::error::Result;
use crate::security::SqlSecurity;

/// An aggregate query with typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateQuery {
    /// `COUNT(*)` over the whole source.
    RowCount,
    /// Non-null count, exact distinct count, and optionally min/max and
    /// mean/stddev for one column.
    ColumnSummary {
        column: String,
        with_min_max: bool,
        with_moments: bool,
    },
    /// Up to `limit` sorted non-null values starting at `offset`.
    OrderedValues {
        column: String,
        offset: u64,
        limit: u64,
    },
    /// `approx_percentile_cont` for one percentile.
    Quantile { column: String, percentile: f64 },
    /// Most frequent values with their counts, most frequent first.
    TopValues { column: String, limit: usize },
    /// Central moments around a known mean: second, third and fourth.
    Moments { column: String, mean: f64 },
    /// Random sample of non-null values cast to double.
    NumericSample { column: String, limit: usize },
    /// Leading sorted distinct non-null values in their native type.
    TemporalSample { column: String, limit: usize },
    /// Random sample of non-null values rendered as text.
    PatternSample { column: String, limit: usize },
    /// Rows strictly outside `[lower, upper]`.
    OutlierCount {
        column: String,
        lower: f64,
        upper: f64,
    },
    /// Rows exactly equal to zero.
    ZeroCount { column: String },
    /// Counts per equal-width bin via conditional aggregation.
    ///
    /// `edges` has `bins + 1` strictly increasing entries; the last bin is
    /// closed on the right so the maximum lands in it.
    Histogram { column: String, edges: Vec<f64> },
    /// Average, minimum and maximum character length plus empty-string count.
    TextLengths { column: String },
    /// Sufficient statistics for Pearson's r over rows where both are non-null.
    PearsonSums { x: String, y: String },
    /// Joint counts of two columns rendered as text.
    Contingency { parent: String, child: String },
    /// Distinct values of the target with their counts.
    TargetClasses { target: String },
    /// Count, mean and sample variance of `feature` per binary target group.
    GroupMoments {
        target: String,
        positive: String,
        feature: String,
    },
    /// Positive-class rate per value of `feature`, for values with at least
    /// `min_rows` rows.
    GroupRates {
        target: String,
        positive: String,
        feature: String,
        min_rows: u64,
    },
}

impl AggregateQuery {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RowCount => "row_count",
            Self::ColumnSummary { .. } => "column_summary",
            Self::OrderedValues { .. } => "ordered_values",
            Self::Quantile { .. } => "quantile",
            Self::TopValues { .. } => "top_values",
            Self::Moments { .. } => "moments",
            Self::NumericSample { .. } => "numeric_sample",
            Self::TemporalSample { .. } => "temporal_sample",
            Self::PatternSample { .. } => "pattern_sample",
            Self::OutlierCount { .. } => "outlier_count",
            Self::ZeroCount { .. } => "zero_count",
            Self::Histogram { .. } => "histogram",
            Self::TextLengths { .. } => "text_lengths",
            Self::PearsonSums { .. } => "pearson_sums",
            Self::Contingency { .. } => "contingency",
            Self::TargetClasses { .. } => "target_classes",
            Self::GroupMoments { .. } => "group_moments",
            Self::GroupRates { .. } => "group_rates",
        }
    }

    /// Renders the query as SQL against an already escaped table reference.
    pub fn to_sql(&self, table: &str) -> Result<String> {
        let sql = match self {
            Self::RowCount => format!("SELECT COUNT(*) AS row_count FROM {table}"),
            Self::ColumnSummary {
                column,
                with_min_max,
                with_moments,
            } => {
                let c = SqlSecurity::escape_identifier(column)?;
                let mut select = vec![
                    format!("COUNT({c}) AS non_null_count"),
                    format!("COUNT(DISTINCT {c}) AS distinct_count"),
                ];
                if *with_min_max {
                    select.push(format!("MIN({c}) AS min_value"));
                    select.push(format!("MAX({c}) AS max_value"));
                }
                if *with_moments {
                    select.push(format!("AVG(CAST({c} AS DOUBLE)) AS mean"));
                    select.push(format!("STDDEV(CAST({c} AS DOUBLE)) AS std_dev"));
                }
                format!("SELECT {} FROM {table}", select.join(", "))
            }
            Self::OrderedValues {
                column,
                offset,
                limit,
            } => {
                let c = SqlSecurity::escape_identifier(column)?;
                format!(
                    "SELECT CAST({c} AS DOUBLE) AS v FROM {table} WHERE {c} IS NOT NULL \
                     ORDER BY v ASC LIMIT {limit} OFFSET {offset}"
                )
            }
            Self::Quantile { column, percentile } => {
                let c = SqlSecurity::escape_identifier(column)?;
                format!(
                    "SELECT approx_percentile_cont(CAST({c} AS DOUBLE), {percentile:?}) AS v \
                     FROM {table} WHERE {c} IS NOT NULL"
                )
            }
            Self::TopValues { column, limit } => {
                let c = SqlSecurity::escape_identifier(column)?;
                format!(
                    "SELECT CAST({c} AS VARCHAR) AS top_value, COUNT(*) AS cnt FROM {table} \
                     WHERE {c} IS NOT NULL GROUP BY CAST({c} AS VARCHAR) \
                     ORDER BY cnt DESC, top_value ASC LIMIT {limit}"
                )
            }
            Self::Moments { column, mean } => {
                let c = SqlSecurity::escape_identifier(column)?;
                let m = SqlSecurity::float_literal(*mean)?;
                let d = format!("(CAST({c} AS DOUBLE) - {m})");
                format!(
                    "SELECT AVG({d} * {d}) AS m2, AVG({d} * {d} * {d}) AS m3, \
                     AVG({d} * {d} * {d} * {d}) AS m4 FROM {table} WHERE {c} IS NOT NULL"
                )
            }
            Self::NumericSample { column, limit } => {
                let c = SqlSecurity::escape_identifier(column)?;
                format!(
                    "SELECT CAST({c} AS DOUBLE) AS v FROM {table} WHERE {c} IS NOT NULL \
                     ORDER BY random() LIMIT {limit}"
                )
            }
            Self::TemporalSample { column, limit } => {
                let c = SqlSecurity::escape_identifier(column)?;
                format!(
                    "SELECT DISTINCT {c} AS v FROM {table} WHERE {c} IS NOT NULL \
                     ORDER BY v ASC LIMIT {limit}"
                )
            }
            Self::PatternSample { column, limit } => {
                let c = SqlSecurity::escape_identifier(column)?;
                format!(
                    "SELECT CAST({c} AS VARCHAR) AS v FROM {table} WHERE {c} IS NOT NULL \
                     ORDER BY random() LIMIT {limit}"
                )
            }
            Self::OutlierCount {
                column,
                lower,
                upper,
            } => {
                let c = SqlSecurity::escape_identifier(column)?;
                let lo = SqlSecurity::float_literal(*lower)?;
                let hi = SqlSecurity::float_literal(*upper)?;
                format!(
                    "SELECT COUNT(*) AS outliers FROM {table} WHERE {c} IS NOT NULL \
                     AND (CAST({c} AS DOUBLE) < {lo} OR CAST({c} AS DOUBLE) > {hi})"
                )
            }
            Self::ZeroCount { column } => {
                let c = SqlSecurity::escape_identifier(column)?;
                format!(
                    "SELECT COUNT(*) AS zeros FROM {table} WHERE CAST({c} AS DOUBLE) = 0.0"
                )
            }
            Self::Histogram { column, edges } => {
                let c = SqlSecurity::escape_identifier(column)?;
                let v = format!("CAST({c} AS DOUBLE)");
                let last = edges.len().saturating_sub(2);
                let mut select = Vec::with_capacity(edges.len().saturating_sub(1));
                for (i, window) in edges.windows(2).enumerate() {
                    let lo = SqlSecurity::float_literal(window[0])?;
                    let hi = SqlSecurity::float_literal(window[1])?;
                    let upper_op = if i == last { "<=" } else { "<" };
                    select.push(format!(
                        "SUM(CASE WHEN {v} >= {lo} AND {v} {upper_op} {hi} THEN 1 ELSE 0 END) AS b{i}"
                    ));
                }
                format!(
                    "SELECT {} FROM {table} WHERE {c} IS NOT NULL",
                    select.join(", ")
                )
            }
            Self::TextLengths { column } => {
                let c = SqlSecurity::escape_identifier(column)?;
                let len = format!("character_length(CAST({c} AS VARCHAR))");
                format!(
                    "SELECT AVG(CAST({len} AS DOUBLE)) AS avg_len, MIN({len}) AS min_len, \
                     MAX({len}) AS max_len, \
                     SUM(CASE WHEN {len} = 0 THEN 1 ELSE 0 END) AS empty_count \
                     FROM {table} WHERE {c} IS NOT NULL"
                )
            }
            Self::PearsonSums { x, y } => {
                let cx = SqlSecurity::escape_identifier(x)?;
                let cy = SqlSecurity::escape_identifier(y)?;
                let vx = format!("CAST({cx} AS DOUBLE)");
                let vy = format!("CAST({cy} AS DOUBLE)");
                format!(
                    "SELECT COUNT(*) AS n, SUM({vx}) AS sum_x, SUM({vy}) AS sum_y, \
                     SUM({vx} * {vx}) AS sum_x2, SUM({vy} * {vy}) AS sum_y2, \
                     SUM({vx} * {vy}) AS sum_xy FROM {table} \
                     WHERE {cx} IS NOT NULL AND {cy} IS NOT NULL"
                )
            }
            Self::Contingency { parent, child } => {
                let p = SqlSecurity::escape_identifier(parent)?;
                let ch = SqlSecurity::escape_identifier(child)?;
                format!(
                    "SELECT CAST({p} AS VARCHAR) AS parent_value, \
                     CAST({ch} AS VARCHAR) AS child_value, COUNT(*) AS cnt FROM {table} \
                     WHERE {p} IS NOT NULL AND {ch} IS NOT NULL \
                     GROUP BY CAST({p} AS VARCHAR), CAST({ch} AS VARCHAR)"
                )
            }
            Self::TargetClasses { target } => {
                let t = SqlSecurity::escape_identifier(target)?;
                format!(
                    "SELECT CAST({t} AS VARCHAR) AS class_value, COUNT(*) AS cnt FROM {table} \
                     WHERE {t} IS NOT NULL GROUP BY CAST({t} AS VARCHAR) \
                     ORDER BY cnt DESC, class_value ASC"
                )
            }
            Self::GroupMoments {
                target,
                positive,
                feature,
            } => {
                let t = SqlSecurity::escape_identifier(target)?;
                let f = SqlSecurity::escape_identifier(feature)?;
                let pos = SqlSecurity::escape_literal(positive)?;
                let group = format!("CASE WHEN CAST({t} AS VARCHAR) = {pos} THEN 1 ELSE 0 END");
                format!(
                    "SELECT {group} AS is_positive, COUNT(*) AS n, \
                     AVG(CAST({f} AS DOUBLE)) AS mean, VAR_SAMP(CAST({f} AS DOUBLE)) AS variance \
                     FROM {table} WHERE {t} IS NOT NULL AND {f} IS NOT NULL GROUP BY {group}"
                )
            }
            Self::GroupRates {
                target,
                positive,
                feature,
                min_rows,
            } => {
                let t = SqlSecurity::escape_identifier(target)?;
                let f = SqlSecurity::escape_identifier(feature)?;
                let pos = SqlSecurity::escape_literal(positive)?;
                format!(
                    "SELECT CAST({f} AS VARCHAR) AS feature_value, COUNT(*) AS cnt, \
                     AVG(CASE WHEN CAST({t} AS VARCHAR) = {pos} THEN 1.0 ELSE 0.0 END) AS rate \
                     FROM {table} WHERE {t} IS NOT NULL AND {f} IS NOT NULL \
                     GROUP BY CAST({f} AS VARCHAR) HAVING COUNT(*) >= {min_rows}"
                )
            }
        };
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_sql() {
        let sql = AggregateQuery::RowCount.to_sql("\"t\"").unwrap();
        assert_eq!(sql, "SELECT COUNT(*) AS row_count FROM \"t\"");
    }

    #[test]
    fn test_histogram_sql_closes_last_bin() {
        let query = AggregateQuery::Histogram {
            column: "x".to_string(),
            edges: vec![0.0, 1.0, 2.0],
        };
        let sql = query.to_sql("\"t\"").unwrap();
        assert!(sql.contains("< CAST(1.0 AS DOUBLE) THEN 1 ELSE 0 END) AS b0"));
        assert!(sql.contains("<= CAST(2.0 AS DOUBLE) THEN 1 ELSE 0 END) AS b1"));
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let query = AggregateQuery::TopValues {
            column: "bad\"name".to_string(),
            limit: 10,
        };
        let sql = query.to_sql("\"t\"").unwrap();
        assert!(sql.contains("\"bad\"\"name\""));
    }

    #[test]
    fn test_target_literal_is_escaped() {
        let query = AggregateQuery::GroupRates {
            target: "label".to_string(),
            positive: "it's".to_string(),
            feature: "plan".to_string(),
            min_rows: 10,
        };
        let sql = query.to_sql("\"t\"").unwrap();
        assert!(sql.contains("'it''s'"));
        assert!(sql.contains("HAVING COUNT(*) >= 10"));
    }

    #[test]
    fn test_non_finite_parameters_rejected() {
        let query = AggregateQuery::OutlierCount {
            column: "x".to_string(),
            lower: f64::NEG_INFINITY,
            upper: 1.0,
        };
        assert!(query.to_sql("\"t\"").is_err());
    }

    #[test]
    fn test_query_names() {
        assert_eq!(AggregateQuery::RowCount.name(), "row_count");
        assert_eq!(
            AggregateQuery::ZeroCount {
                column: "x".into()
            }
            .name(),
            "zero_count"
        );
    }
}
