//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use rand::rngs::StdRng;
use rand::SeedableRng;
use term_profile::engine::ProfileSession;
use term_profile::synth::samplers::standard_normal;

const DAY_MICROS: i64 = 86_400_000_000;
const EPOCH_2024_MICROS: i64 = 1_704_067_200_000_000;

pub fn register(ctx: &SessionContext, name: &str, batch: RecordBatch) {
    let table = MemTable::try_new(batch.schema(), vec![vec![batch]]).unwrap();
    ctx.register_table(name, Arc::new(table)).unwrap();
}

pub fn session(name: &str, batch: RecordBatch) -> ProfileSession {
    let ctx = SessionContext::new();
    register(&ctx, name, batch);
    ProfileSession::new(ctx, name).unwrap()
}

/// `n` orders: id, amount with every 25th null, skewed status, paid flag and
/// one timestamp per day.
pub fn orders(n: i64) -> RecordBatch {
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
    let amounts: Vec<Option<f64>> = (0..n)
        .map(|i| (i % 25 != 0).then(|| 20.0 + ((i * 37) % 180) as f64))
        .collect();
    let status: Vec<&str> = (0..n)
        .map(|i| match i % 10 {
            0..=5 => statuses[0],
            6 | 7 => statuses[1],
            8 => statuses[2],
            _ => statuses[3],
        })
        .collect();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from((1..=n).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(amounts)),
        Arc::new(StringArray::from(status)),
        Arc::new(BooleanArray::from(
            (0..n).map(|i| Some(i % 4 != 0)).collect::<Vec<_>>(),
        )),
        Arc::new(TimestampMicrosecondArray::from(
            (0..n)
                .map(|i| EPOCH_2024_MICROS + i * DAY_MICROS)
                .collect::<Vec<_>>(),
        )),
    ];
    RecordBatch::try_new(schema, columns).unwrap()
}

/// Two normal columns `x ~ N(50, 10)` and `y ~ N(100, 20)` correlated at `r`.
pub fn correlated(rows: usize, r: f64, seed: u64) -> RecordBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let residual = (1.0 - r * r).sqrt();
    let (xs, ys): (Vec<f64>, Vec<f64>) = (0..rows)
        .map(|_| {
            let z1 = standard_normal(&mut rng);
            let z2 = standard_normal(&mut rng);
            (50.0 + 10.0 * z1, 100.0 + 20.0 * (r * z1 + residual * z2))
        })
        .unzip();
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
    .unwrap()
}

/// One text column holding each `(value, count)` run in order.
pub fn categories(name: &str, runs: &[(&str, usize)]) -> RecordBatch {
    let values: Vec<&str> = runs
        .iter()
        .flat_map(|(v, n)| std::iter::repeat(*v).take(*n))
        .collect();
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Utf8, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(values)) as ArrayRef]).unwrap()
}

/// `rows` draws of `N(mean, std)` in a column called `value`.
pub fn normal_values(rows: usize, mean: f64, std: f64, seed: u64) -> RecordBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..rows)
        .map(|_| mean + std * standard_normal(&mut rng))
        .collect();
    let schema = Arc::new(Schema::new(vec![Field::new("value", DataType::Float64, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(values)) as ArrayRef]).unwrap()
}
