//! The analytical query engine boundary.
//!
//! A [`ProfileSession`] wraps a DataFusion [`SessionContext`] and the name of a
//! registered read expression. The profiler only ever asks it for three
//! things: a row count, one [`ColumnSummary`] per field, and the results of
//! [`AggregateQuery`] values. Sessions are cheap to clone; every parallel task
//! takes its own clone and builds its own DataFrames.

pub mod cell;
pub mod query;

use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use datafusion::prelude::SessionContext;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{ProfileError, Result};
use crate::logging::truncate_field;
use crate::security::SqlSecurity;

pub use cell::{column_values, CellValue};
pub use query::AggregateQuery;

/// Default non-null count up to which quartiles are computed exactly.
pub const DEFAULT_EXACT_QUANTILE_LIMIT: u64 = 100_000;

/// Longest SQL text written to debug logs.
const MAX_LOGGED_SQL: usize = 512;

/// Coarse family of an engine-declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaredKind {
    Integer,
    Float,
    Boolean,
    Temporal,
    Text,
    Other,
}

impl DeclaredKind {
    /// Classifies an Arrow data type.
    pub fn from_data_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Self::Integer,
            DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _) => Self::Float,
            DataType::Boolean => Self::Boolean,
            DataType::Date32
            | DataType::Date64
            | DataType::Timestamp(_, _)
            | DataType::Time32(_)
            | DataType::Time64(_) => Self::Temporal,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Self::Text,
            _ => Self::Other,
        }
    }

    /// Classifies a free-form type name such as `BIGINT`, `varchar(32)` or
    /// `Timestamp(Microsecond, None)`.
    pub fn from_type_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("interval") || lower.contains("duration") {
            Self::Other
        } else if lower.contains("bool") {
            Self::Boolean
        } else if lower.contains("date") || lower.contains("time") {
            Self::Temporal
        } else if ["float", "double", "decimal", "real", "numeric"]
            .iter()
            .any(|m| lower.contains(m))
        {
            Self::Float
        } else if lower.contains("int") {
            Self::Integer
        } else if ["utf8", "string", "char", "text"]
            .iter()
            .any(|m| lower.contains(m))
        {
            Self::Text
        } else {
            Self::Other
        }
    }

    /// True for integer and floating-point kinds.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// The engine's per-column summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    /// Engine type rendered as text.
    pub declared_type: String,
    pub declared_kind: DeclaredKind,
    pub row_count: u64,
    pub non_null_count: u64,
    pub distinct_count: u64,
    pub min: Option<CellValue>,
    pub max: Option<CellValue>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    /// Fraction of rows that are null, in [0, 1].
    pub null_fraction: f64,
}

impl ColumnSummary {
    /// Number of null rows.
    pub fn null_count(&self) -> u64 {
        self.row_count.saturating_sub(self.non_null_count)
    }

    /// Distinct values as a fraction of all rows.
    pub fn distinct_ratio(&self) -> f64 {
        if self.row_count == 0 {
            0.0
        } else {
            self.distinct_count as f64 / self.row_count as f64
        }
    }
}

/// A cursor over one registered read expression.
#[derive(Clone)]
pub struct ProfileSession {
    ctx: SessionContext,
    source: String,
    table_sql: String,
    tolerant: Option<TolerantSource>,
    exact_quantile_limit: u64,
}

#[derive(Clone, Debug)]
struct TolerantSource {
    name: String,
    skipped_rows: Option<u64>,
}

impl std::fmt::Debug for ProfileSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileSession")
            .field("source", &self.source)
            .field("tolerant", &self.tolerant)
            .field("exact_quantile_limit", &self.exact_quantile_limit)
            .finish()
    }
}

impl ProfileSession {
    /// Creates a session over a table already registered in `ctx`.
    pub fn new(ctx: SessionContext, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let table_sql = SqlSecurity::escape_table_reference(&source)?;
        Ok(Self {
            ctx,
            source,
            table_sql,
            tolerant: None,
            exact_quantile_limit: DEFAULT_EXACT_QUANTILE_LIMIT,
        })
    }

    /// Attaches a second read expression registered in error-tolerant mode.
    ///
    /// `skipped_rows` is the number of rows the tolerant reader dropped, when
    /// the ingestion side knows it.
    pub fn with_tolerant_source(
        mut self,
        source: impl Into<String>,
        skipped_rows: Option<u64>,
    ) -> Result<Self> {
        let name = source.into();
        SqlSecurity::escape_table_reference(&name)?;
        self.tolerant = Some(TolerantSource { name, skipped_rows });
        Ok(self)
    }

    /// Sets the non-null count above which quartiles become approximate.
    pub fn with_exact_quantile_limit(mut self, limit: u64) -> Self {
        self.exact_quantile_limit = limit;
        self
    }

    /// Name of the read expression.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The underlying DataFusion context.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// A session over the tolerant read expression, with the number of rows it
    /// skipped when known.
    pub fn tolerant(&self) -> Option<(Self, Option<u64>)> {
        let tolerant = self.tolerant.as_ref()?;
        let table_sql = SqlSecurity::escape_table_reference(&tolerant.name).ok()?;
        Some((
            Self {
                ctx: self.ctx.clone(),
                source: tolerant.name.clone(),
                table_sql,
                tolerant: None,
                exact_quantile_limit: self.exact_quantile_limit,
            },
            tolerant.skipped_rows,
        ))
    }

    /// Executes one aggregate query and collects its batches.
    #[instrument(skip(self, query), fields(source = %self.source, query = query.name()))]
    pub async fn run(&self, query: &AggregateQuery) -> Result<Vec<RecordBatch>> {
        let sql = query.to_sql(&self.table_sql)?;
        debug!(sql = %truncate_field(&sql, MAX_LOGGED_SQL), "Executing aggregate query");
        let df = self.ctx.sql(&sql).await?;
        Ok(df.collect().await?)
    }

    /// Executes a query and decodes every result row into cells.
    pub async fn rows(&self, query: &AggregateQuery) -> Result<Vec<Vec<CellValue>>> {
        let batches = self.run(query).await?;
        let mut rows = Vec::new();
        for batch in &batches {
            let columns = batch
                .columns()
                .iter()
                .map(column_values)
                .collect::<Result<Vec<_>>>()?;
            for row in 0..batch.num_rows() {
                rows.push(columns.iter().map(|c| c[row].clone()).collect());
            }
        }
        Ok(rows)
    }

    /// Executes a query and returns its first row, or an empty row.
    pub async fn first_row(&self, query: &AggregateQuery) -> Result<Vec<CellValue>> {
        Ok(self.rows(query).await?.into_iter().next().unwrap_or_default())
    }

    /// Executes a query and returns its first column as floats, skipping nulls.
    pub async fn float_column(&self, query: &AggregateQuery) -> Result<Vec<f64>> {
        Ok(self
            .rows(query)
            .await?
            .into_iter()
            .filter_map(|row| row.first().and_then(CellValue::as_f64))
            .filter(|v| v.is_finite())
            .collect())
    }

    /// Total number of rows in the source.
    #[instrument(skip(self), fields(source = %self.source))]
    pub async fn row_count(&self) -> Result<u64> {
        let row = self.first_row(&AggregateQuery::RowCount).await?;
        row.first()
            .and_then(CellValue::as_i64)
            .map(|n| n.max(0) as u64)
            .ok_or_else(|| ProfileError::invalid_data("row count query returned no value"))
    }

    /// Field names and Arrow types of the source, in schema order.
    pub async fn schema(&self) -> Result<Vec<(String, DataType)>> {
        let df = self.ctx.table(self.source.as_str()).await?;
        Ok(df
            .schema()
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone()))
            .collect())
    }

    /// One summary row per schema field, in schema order.
    #[instrument(skip(self), fields(source = %self.source))]
    pub async fn column_summaries(&self) -> Result<Vec<ColumnSummary>> {
        let row_count = self.row_count().await?;
        let mut summaries = Vec::new();
        for (name, data_type) in self.schema().await? {
            summaries.push(self.summarize_column(&name, &data_type, row_count).await?);
        }
        Ok(summaries)
    }

    /// Builds the summary row of one column.
    #[instrument(skip(self, data_type), fields(source = %self.source))]
    pub async fn summarize_column(
        &self,
        name: &str,
        data_type: &DataType,
        row_count: u64,
    ) -> Result<ColumnSummary> {
        let kind = DeclaredKind::from_data_type(data_type);
        let with_min_max = matches!(
            kind,
            DeclaredKind::Integer | DeclaredKind::Float | DeclaredKind::Temporal | DeclaredKind::Text
        );
        let with_moments = kind.is_numeric();
        let row = self
            .first_row(&AggregateQuery::ColumnSummary {
                column: name.to_string(),
                with_min_max,
                with_moments,
            })
            .await?;

        let cell = |i: usize| row.get(i).cloned().unwrap_or(CellValue::Null);
        let count = |i: usize| cell(i).as_i64().map(|n| n.max(0) as u64).unwrap_or(0);

        let non_null_count = count(0);
        let distinct_count = count(1).min(non_null_count);
        let mut idx = 2;
        let (min, max) = if with_min_max {
            idx += 2;
            (non_null(cell(2)), non_null(cell(3)))
        } else {
            (None, None)
        };
        let (mean, std_dev) = if with_moments {
            (cell(idx).as_f64(), cell(idx + 1).as_f64())
        } else {
            (None, None)
        };

        let (mut q25, mut median, mut q75) = (None, None, None);
        if with_moments && non_null_count > 0 {
            for (p, slot) in [(0.25, &mut q25), (0.5, &mut median), (0.75, &mut q75)] {
                match self.quantile(name, p, non_null_count).await {
                    Ok(v) => *slot = v,
                    Err(e) => warn!(column = name, percentile = p, error = %e, "Quantile unavailable"),
                }
            }
        }

        let null_fraction = if row_count == 0 {
            0.0
        } else {
            row_count.saturating_sub(non_null_count) as f64 / row_count as f64
        };

        Ok(ColumnSummary {
            name: name.to_string(),
            declared_type: data_type.to_string(),
            declared_kind: kind,
            row_count,
            non_null_count,
            distinct_count,
            min,
            max,
            mean,
            std_dev,
            q25,
            median,
            q75,
            null_fraction,
        })
    }

    /// A percentile of a numeric column.
    ///
    /// Exact with linear interpolation at `p * (n - 1)` when the non-null count
    /// is within the exact limit, approximate above it.
    pub async fn quantile(&self, column: &str, p: f64, non_null: u64) -> Result<Option<f64>> {
        if non_null == 0 {
            return Ok(None);
        }
        if non_null > self.exact_quantile_limit {
            let approx = self
                .first_row(&AggregateQuery::Quantile {
                    column: column.to_string(),
                    percentile: p,
                })
                .await;
            match approx {
                Ok(row) => {
                    if let Some(v) = row.first().and_then(CellValue::as_f64) {
                        return Ok(Some(v));
                    }
                }
                Err(e) => {
                    debug!(column, error = %e, "approx_percentile_cont failed, using exact quantile")
                }
            }
        }
        self.exact_quantile(column, p, non_null).await
    }

    async fn exact_quantile(&self, column: &str, p: f64, non_null: u64) -> Result<Option<f64>> {
        let position = p.clamp(0.0, 1.0) * (non_null - 1) as f64;
        let lower = position.floor();
        let fraction = position - lower;
        let values = self
            .float_column(&AggregateQuery::OrderedValues {
                column: column.to_string(),
                offset: lower as u64,
                limit: if fraction > 0.0 { 2 } else { 1 },
            })
            .await?;
        Ok(match values.as_slice() {
            [] => None,
            [only] => Some(*only),
            [lo, hi, ..] => Some(lo + fraction * (hi - lo)),
        })
    }
}

fn non_null(cell: CellValue) -> Option<CellValue> {
    if cell.is_null() {
        None
    } else {
        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{register_batch, sample_orders_batch};
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    async fn session_with(values: Vec<Option<i64>>) -> ProfileSession {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap();
        let ctx = SessionContext::new();
        register_batch(&ctx, "t", batch).unwrap();
        ProfileSession::new(ctx, "t").unwrap()
    }

    #[test]
    fn test_declared_kind_from_names() {
        assert_eq!(DeclaredKind::from_type_name("BIGINT"), DeclaredKind::Integer);
        assert_eq!(DeclaredKind::from_type_name("Float64"), DeclaredKind::Float);
        assert_eq!(DeclaredKind::from_type_name("DECIMAL(10,2)"), DeclaredKind::Float);
        assert_eq!(DeclaredKind::from_type_name("Boolean"), DeclaredKind::Boolean);
        assert_eq!(
            DeclaredKind::from_type_name("Timestamp(Microsecond, None)"),
            DeclaredKind::Temporal
        );
        assert_eq!(DeclaredKind::from_type_name("varchar(32)"), DeclaredKind::Text);
        assert_eq!(DeclaredKind::from_type_name("Interval(DayTime)"), DeclaredKind::Other);
    }

    #[tokio::test]
    async fn test_row_count_and_summary() {
        let session = session_with(vec![Some(1), Some(2), None, Some(4), Some(4)]).await;
        assert_eq!(session.row_count().await.unwrap(), 5);

        let summaries = session.column_summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.name, "x");
        assert_eq!(s.declared_kind, DeclaredKind::Integer);
        assert_eq!(s.non_null_count, 4);
        assert_eq!(s.distinct_count, 3);
        assert_eq!(s.null_count(), 1);
        assert!((s.null_fraction - 0.2).abs() < 1e-9);
        assert_eq!(s.min, Some(CellValue::Integer(1)));
        assert_eq!(s.max, Some(CellValue::Integer(4)));
        assert!((s.mean.unwrap() - 2.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_exact_quartiles_interpolate() {
        let session = session_with(vec![Some(1), Some(2), Some(3), Some(4), Some(100)]).await;
        let s = &session.column_summaries().await.unwrap()[0];
        assert_eq!(s.q25, Some(2.0));
        assert_eq!(s.median, Some(3.0));
        assert_eq!(s.q75, Some(4.0));

        let q = session.quantile("x", 0.1, 5).await.unwrap().unwrap();
        assert!((q - 1.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_approximate_quantile_above_limit() {
        let session = session_with((1..=200).map(Some).collect())
            .await
            .with_exact_quantile_limit(10);
        let median = session.quantile("x", 0.5, 200).await.unwrap().unwrap();
        assert!((median - 100.5).abs() < 5.0);
    }

    #[tokio::test]
    async fn test_float_column_and_rows() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Float64, true)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(Float64Array::from(vec![Some(1.5), None, Some(2.5)]))],
        )
        .unwrap();
        let ctx = SessionContext::new();
        register_batch(&ctx, "f", batch).unwrap();
        let session = ProfileSession::new(ctx, "f").unwrap();

        let values = session
            .float_column(&AggregateQuery::OrderedValues {
                column: "v".into(),
                offset: 0,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(values, vec![1.5, 2.5]);
    }

    #[tokio::test]
    async fn test_summaries_cover_every_field() {
        let ctx = SessionContext::new();
        register_batch(&ctx, "orders", sample_orders_batch()).unwrap();
        let session = ProfileSession::new(ctx, "orders").unwrap();
        let summaries = session.column_summaries().await.unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["order_id", "amount", "status", "is_paid", "created_at"]);
        for s in &summaries {
            assert!(s.distinct_count <= s.row_count);
            assert!((0.0..=1.0).contains(&s.null_fraction));
        }
    }

    #[tokio::test]
    async fn test_unknown_source_fails() {
        let session = ProfileSession::new(SessionContext::new(), "missing").unwrap();
        assert!(session.row_count().await.is_err());
    }

    #[test]
    fn test_tolerant_session() {
        let session = ProfileSession::new(SessionContext::new(), "strict")
            .unwrap()
            .with_tolerant_source("lenient", Some(3))
            .unwrap();
        let (tolerant, skipped) = session.tolerant().unwrap();
        assert_eq!(tolerant.source(), "lenient");
        assert_eq!(skipped, Some(3));
        assert!(tolerant.tolerant().is_none());
    }
}
