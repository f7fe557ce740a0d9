//! In-memory datasets for profiling tests and benchmarks.
//!
//! Every fixture is deterministic: the same call always produces the same
//! batch, so assertions on counts and statistics are stable.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::{CellValue, ColumnSummary, DeclaredKind, ProfileSession};
use crate::error::Result;
use crate::profile::statistics::shannon_entropy;
use crate::profile::types::{
    ColumnProfile, DistributionFamily, Profile, SemanticType, SynthesisPolicy, TopValue, TopValues,
};
use crate::synth::samplers::standard_normal;

/// Microseconds in one day.
const DAY_MICROS: i64 = 86_400_000_000;

/// 2024-01-01T00:00:00Z in microseconds.
const EPOCH_2024_MICROS: i64 = 1_704_067_200_000_000;

/// Registers a single batch as an in-memory table.
pub fn register_batch(ctx: &SessionContext, name: &str, batch: RecordBatch) -> Result<()> {
    let table = MemTable::try_new(batch.schema(), vec![vec![batch]])?;
    ctx.register_table(name, Arc::new(table))?;
    Ok(())
}

/// Registers `batch` under `name` in a fresh context and opens a session on it.
pub fn session_for(name: &str, batch: RecordBatch) -> Result<ProfileSession> {
    let ctx = SessionContext::new();
    register_batch(&ctx, name, batch)?;
    ProfileSession::new(ctx, name)
}

/// 200 orders: sequential id, amount, status, payment flag and a daily timestamp.
pub fn sample_orders_batch() -> RecordBatch {
    let n = 200i64;
    let statuses = ["shipped", "pending", "delivered", "cancelled"];
    let schema = Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Int64, false),
        Field::new("amount", DataType::Float64, true),
        Field::new("status", DataType::Utf8, true),
        Field::new("is_paid", DataType::Boolean, true),
        Field::new(
            "created_at",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            true,
        ),
    ]));

    let ids: Vec<i64> = (1..=n).collect();
    let amounts: Vec<Option<f64>> = (0..n)
        .map(|i| {
            if i % 25 == 0 {
                None
            } else {
                Some(20.0 + ((i * 37) % 180) as f64 + (i % 7) as f64 * 0.25)
            }
        })
        .collect();
    let status: Vec<Option<&str>> = (0..n)
        .map(|i| {
            // Skewed toward "shipped" so the column has a clear mode.
            let idx = match i % 10 {
                0..=5 => 0,
                6 | 7 => 1,
                8 => 2,
                _ => 3,
            };
            Some(statuses[idx])
        })
        .collect();
    let paid: Vec<Option<bool>> = (0..n).map(|i| Some(i % 4 != 0)).collect();
    let created: Vec<Option<i64>> = (0..n)
        .map(|i| Some(EPOCH_2024_MICROS + i * DAY_MICROS))
        .collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(ids)),
        Arc::new(Float64Array::from(amounts)),
        Arc::new(StringArray::from(status)),
        Arc::new(BooleanArray::from(paid)),
        Arc::new(TimestampMicrosecondArray::from(created)),
    ];
    RecordBatch::try_new(schema, columns).unwrap_or_else(|e| panic!("orders fixture: {e}"))
}

/// A single numeric column with the given values.
pub fn numeric_batch(name: &str, values: &[f64]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Float64, true)]));
    RecordBatch::try_new(
        schema,
        vec![Arc::new(Float64Array::from(values.to_vec())) as ArrayRef],
    )
    .unwrap_or_else(|e| panic!("numeric fixture: {e}"))
}

/// Two standard-normal-ish columns `x` and `y` with population correlation `r`.
pub fn correlated_batch(rows: usize, r: f64, seed: u64) -> RecordBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut xs = Vec::with_capacity(rows);
    let mut ys = Vec::with_capacity(rows);
    let residual = (1.0 - r * r).max(0.0).sqrt();
    for _ in 0..rows {
        let z1 = standard_normal(&mut rng);
        let z2 = standard_normal(&mut rng);
        xs.push(50.0 + 10.0 * z1);
        ys.push(100.0 + 20.0 * (r * z1 + residual * z2));
    }
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::Float64, false),
        Field::new("y", DataType::Float64, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Float64Array::from(xs)) as ArrayRef,
            Arc::new(Float64Array::from(ys)) as ArrayRef,
        ],
    )
    .unwrap_or_else(|e| panic!("correlated fixture: {e}"))
}

/// 400 customers with a binary `churned` label.
///
/// Churners have shorter tenure and concentrate on the `basic` plan; region
/// is independent of churn but fully determines `region_code`.
pub fn churn_batch() -> RecordBatch {
    let n = 400usize;
    let mut rng = StdRng::seed_from_u64(7);
    let regions = ["north", "south", "east", "west"];
    let codes = ["N", "S", "E", "W"];

    let mut ids = Vec::with_capacity(n);
    let mut tenure = Vec::with_capacity(n);
    let mut plan = Vec::with_capacity(n);
    let mut region = Vec::with_capacity(n);
    let mut region_code = Vec::with_capacity(n);
    let mut email = Vec::with_capacity(n);
    let mut churned = Vec::with_capacity(n);

    for i in 0..n {
        let churn = i % 4 == 0;
        ids.push(format!("{:08x}-0000-4000-8000-{:012x}", i * 7919, i));
        let base = if churn { 6.0 } else { 30.0 };
        tenure.push((base + 4.0 * standard_normal(&mut rng)).max(0.0).round());
        plan.push(if churn {
            if i % 8 == 0 {
                "premium"
            } else {
                "basic"
            }
        } else if i % 3 == 0 {
            "basic"
        } else {
            "premium"
        });
        let r = rng.random_range(0..regions.len());
        region.push(regions[r]);
        region_code.push(codes[r]);
        email.push(format!("user{i}@example.com"));
        churned.push(if churn { "yes" } else { "no" });
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("customer_uuid", DataType::Utf8, false),
        Field::new("tenure_months", DataType::Float64, false),
        Field::new("plan", DataType::Utf8, false),
        Field::new("region", DataType::Utf8, false),
        Field::new("region_code", DataType::Utf8, false),
        Field::new("email", DataType::Utf8, false),
        Field::new("churned", DataType::Utf8, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(Float64Array::from(tenure)),
        Arc::new(StringArray::from(plan)),
        Arc::new(StringArray::from(region)),
        Arc::new(StringArray::from(region_code)),
        Arc::new(StringArray::from(email)),
        Arc::new(StringArray::from(churned)),
    ];
    RecordBatch::try_new(schema, columns).unwrap_or_else(|e| panic!("churn fixture: {e}"))
}

/// A categorical column with `a` rows of "A" followed by `b` rows of "B".
pub fn two_category_batch(name: &str, a: usize, b: usize) -> RecordBatch {
    let values: Vec<&str> = std::iter::repeat("A")
        .take(a)
        .chain(std::iter::repeat("B").take(b))
        .collect();
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Utf8, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(values)) as ArrayRef])
        .unwrap_or_else(|e| panic!("category fixture: {e}"))
}

fn summary(name: &str, kind: DeclaredKind, rows: u64, distinct: u64) -> ColumnSummary {
    ColumnSummary {
        name: name.to_string(),
        declared_type: format!("{kind:?}"),
        declared_kind: kind,
        row_count: rows,
        non_null_count: rows,
        distinct_count: distinct,
        min: None,
        max: None,
        mean: None,
        std_dev: None,
        q25: None,
        median: None,
        q75: None,
        null_fraction: 0.0,
    }
}

/// A normally distributed numeric column profile with no nulls.
///
/// Quartiles sit at `mean ± 0.6745·std` and the range at `mean ± 3·std`.
pub fn numeric_column(name: &str, rows: u64, mean: f64, std_dev: f64) -> ColumnProfile {
    let mut profile = ColumnProfile::from_summary(
        &summary(name, DeclaredKind::Float, rows, rows),
        SemanticType::Numeric,
    );
    profile.min = Some(CellValue::Float(mean - 3.0 * std_dev));
    profile.max = Some(CellValue::Float(mean + 3.0 * std_dev));
    profile.mean = Some(mean);
    profile.std_dev = Some(std_dev);
    profile.median = Some(mean);
    profile.q25 = Some(mean - 0.6745 * std_dev);
    profile.q75 = Some(mean + 0.6745 * std_dev);
    profile.skewness = Some(0.0);
    profile.kurtosis = Some(0.0);
    profile.zero_count = Some(0);
    profile.distribution = Some(DistributionFamily::Normal);
    profile
}

/// A categorical column profile with exactly the given value counts.
pub fn categorical_column(name: &str, counts: &[(&str, u64)]) -> ColumnProfile {
    let rows: u64 = counts.iter().map(|(_, n)| n).sum();
    let mut profile = ColumnProfile::from_summary(
        &summary(name, DeclaredKind::Text, rows, counts.len() as u64),
        SemanticType::Categorical,
    );
    let mut sorted = counts.to_vec();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let values: Vec<TopValue> = sorted
        .iter()
        .map(|(v, n)| TopValue {
            value: v.to_string(),
            count: *n,
            percent: *n as f64 / rows.max(1) as f64 * 100.0,
        })
        .collect();
    let shares: Vec<f64> = sorted.iter().map(|(_, n)| *n as f64).collect();
    let top_share = sorted.first().map_or(0.0, |(_, n)| *n as f64 / rows.max(1) as f64);
    profile.top_values = Some(TopValues {
        mode: sorted.first().map(|(v, _)| v.to_string()),
        entropy: shannon_entropy(&shares),
        imbalance_ratio: top_share * counts.len().max(1) as f64,
        other_count: 0,
        other_percent: 0.0,
        values,
    });
    profile.synthesis_policy = SynthesisPolicy::CopySafe;
    profile
}

/// Assembles a profile around the given columns.
pub fn profile_of(source: &str, row_count: u64, columns: Vec<ColumnProfile>) -> Profile {
    Profile {
        source: source.to_string(),
        row_count,
        columns,
        correlations: Vec::new(),
        conditionals: Vec::new(),
        alerts: Vec::new(),
        target: None,
        profiled_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_deterministic() {
        assert_eq!(correlated_batch(50, 0.8, 1), correlated_batch(50, 0.8, 1));
        assert_eq!(churn_batch(), churn_batch());
        assert_eq!(sample_orders_batch().num_rows(), 200);
    }

    #[tokio::test]
    async fn test_register_batch() {
        let ctx = SessionContext::new();
        register_batch(&ctx, "values", numeric_batch("v", &[1.0, 2.0])).unwrap();
        let batches = ctx
            .sql("SELECT COUNT(*) FROM \"values\"")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(batches[0].num_rows(), 1);
    }
}
