//! Correlation-preserving synthetic data.
//!
//! A [`SyntheticDataGenerator`] is planned once from a completed [`Profile`]
//! and then yields rows from a seeded [`StdRng`], so the same profile, config
//! and seed always produce the same rows. Numeric columns that take part in
//! reported correlations share one standard-normal draw per row, transformed
//! by the Cholesky factor of their correlation matrix.
//!
//! No profiled record is ever reproduced: categorical values are only copied
//! when they reach the k-anonymity threshold, masked columns are always
//! regenerated and near-unique text columns are left out.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use term_profile::profile::Profile;
//! use term_profile::synth::{SynthesisConfig, SyntheticDataGenerator};
//!
//! # fn main() -> term_profile::error::Result<()> {
//! let profile = Profile {
//!     source: "empty".into(),
//!     row_count: 0,
//!     columns: Vec::new(),
//!     correlations: Vec::new(),
//!     conditionals: Vec::new(),
//!     alerts: Vec::new(),
//!     target: None,
//!     profiled_at: Utc::now(),
//! };
//! let mut generator = SyntheticDataGenerator::new(&profile, SynthesisConfig::default(), 42)?;
//! let batch = generator.generate(10).to_record_batch()?;
//! assert_eq!(batch.num_rows(), 10);
//! # Ok(())
//! # }
//! ```

pub mod cholesky;
pub mod fakes;
pub mod samplers;

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::{DateTime, Duration, Utc};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::engine::{CellValue, DeclaredKind};
use crate::error::{ProfileError, Result};
use crate::profile::types::{
    ColumnProfile, DistributionFamily, PatternMatch, Profile, SemanticType, SynthesisPolicy,
    TextPattern, TimeGranularity,
};
use crate::security::InputValidator;

use cholesky::{apply_lower, cholesky, correlation_matrix};
use fakes::{fake_for_hint, fake_for_pattern, fake_uuid, pseudo_text, NameHint};
use samplers::{snap_to_gap, standard_normal, truncate_to, FamilySampler, HistogramSampler};

/// Emitted when a pooled rare categorical value is drawn and the column name
/// suggests no generator.
pub const FALLBACK_CATEGORY: &str = "other";

/// Text length assumed when a column carries no length statistics.
const DEFAULT_TEXT_LENGTH: f64 = 12.0;

/// Draws of a hinted fake before falling back to truncation.
const HINT_DRAWS: usize = 8;

/// Knobs of the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Minimum count before a categorical value may be reproduced verbatim
    pub k_anonymity: u64,
    /// Inject nulls at each column's profiled null rate
    pub inject_nulls: bool,
    /// Largest correlation matrix that is factorized
    pub max_correlated_columns: usize,
    /// Zero share above which a numeric column is zero-inflated
    pub zero_inflation_threshold: f64,
    /// Relative spread of generated text lengths around the profiled average
    pub text_length_jitter: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            k_anonymity: 5,
            inject_nulls: true,
            max_correlated_columns: 10,
            zero_inflation_threshold: 0.3,
            text_length_jitter: 0.4,
        }
    }
}

impl SynthesisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k_anonymity == 0 {
            return Err(ProfileError::invalid_config(
                "k_anonymity must be at least 1",
            ));
        }
        InputValidator::validate_threshold(
            self.zero_inflation_threshold,
            "zero_inflation_threshold",
        )?;
        InputValidator::validate_threshold(self.text_length_jitter, "text_length_jitter")?;
        Ok(())
    }

    pub fn with_k_anonymity(mut self, k: u64) -> Self {
        self.k_anonymity = k;
        self
    }

    pub fn with_nulls(mut self, inject: bool) -> Self {
        self.inject_nulls = inject;
        self
    }

    pub fn with_max_correlated_columns(mut self, max: usize) -> Self {
        self.max_correlated_columns = max;
        self
    }
}

/// Name and Arrow type of one output column.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticColumn {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone)]
struct NumericPlan {
    bounds: (Option<f64>, Option<f64>),
    integer: bool,
    mean: f64,
    std_dev: f64,
    /// Position in the correlated block, when the column takes part.
    slot: Option<usize>,
    zero_rate: Option<f64>,
    histogram: Option<HistogramSampler>,
    family: Option<FamilySampler>,
}

impl NumericPlan {
    fn sample(&self, rng: &mut StdRng, correlated: &[f64]) -> CellValue {
        let raw = if let Some(slot) = self.slot {
            self.mean + self.std_dev * correlated[slot]
        } else if self.zero_rate.is_some_and(|rate| rng.random_bool(rate)) {
            0.0
        } else if let Some(histogram) = &self.histogram {
            histogram.sample(rng)
        } else if let Some(family) = &self.family {
            family.sample(rng)
        } else {
            self.mean
        };

        let clamped = match self.bounds {
            (Some(min), Some(max)) if min <= max => raw.clamp(min, max),
            (Some(min), None) => raw.max(min),
            (None, Some(max)) => raw.min(max),
            _ => raw,
        };
        if self.integer {
            CellValue::Integer(clamped.round() as i64)
        } else {
            CellValue::Float(clamped)
        }
    }
}

#[derive(Debug, Clone)]
struct CategoricalPlan {
    values: Vec<String>,
    /// Weights of `values` followed by the pooled weight, when positive.
    index: Option<WeightedIndex<u64>>,
    fallback: Option<NameHint>,
}

impl CategoricalPlan {
    fn sample(&self, rng: &mut StdRng) -> CellValue {
        let drawn = self.index.as_ref().map(|index| index.sample(rng));
        match drawn.and_then(|i| self.values.get(i)) {
            Some(value) => CellValue::Text(value.clone()),
            None => CellValue::Text(match self.fallback {
                Some(hint) => fake_for_hint(rng, hint),
                None => FALLBACK_CATEGORY.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
struct TextPlan {
    pattern: Option<PatternMatch>,
    hint: Option<NameHint>,
    avg_length: f64,
    length_bounds: (usize, usize),
    jitter: f64,
}

impl TextPlan {
    fn sample(&self, rng: &mut StdRng) -> CellValue {
        if let Some(found) = &self.pattern {
            if rng.random_bool(found.match_rate.clamp(0.0, 1.0)) {
                return CellValue::Text(fake_for_pattern(rng, found.pattern));
            }
        }
        let (lo, hi) = self.length_window();
        if let Some(value) = self.hint.and_then(|hint| hinted(rng, hint, lo, hi)) {
            return CellValue::Text(value);
        }
        let factor = 1.0 + self.jitter * (2.0 * rng.random::<f64>() - 1.0);
        let len = ((self.avg_length * factor).round().max(0.0) as usize).clamp(lo, hi);
        CellValue::Text(pseudo_text(rng, len))
    }

    /// Profiled length bounds narrowed to the average plus or minus the jitter.
    fn length_window(&self) -> (usize, usize) {
        let (lo, hi) = self.length_bounds;
        let lo = lo.max((self.avg_length * (1.0 - self.jitter)).floor().max(0.0) as usize);
        let hi = hi
            .min((self.avg_length * (1.0 + self.jitter)).ceil().max(0.0) as usize)
            .max(lo);
        (lo, hi)
    }
}

/// A value of the family `hint` whose length falls in `lo..=hi`.
///
/// Redraws a few times, then truncates an overlong draw. `None` when every
/// draw was too short.
fn hinted(rng: &mut StdRng, hint: NameHint, lo: usize, hi: usize) -> Option<String> {
    let mut overlong = None;
    for _ in 0..HINT_DRAWS {
        let value = fake_for_hint(rng, hint);
        let len = value.chars().count();
        if (lo..=hi).contains(&len) {
            return Some(value);
        }
        if len > hi {
            overlong = Some(value);
        }
    }
    let truncated: String = overlong?.chars().take(hi).collect();
    let truncated = truncated.trim_end();
    (truncated.chars().count() >= lo).then(|| truncated.to_string())
}

#[derive(Debug, Clone)]
enum ColumnGenerator {
    Sequential { start: i64, as_text: bool },
    Uuid,
    Numeric(NumericPlan),
    Temporal {
        min: DateTime<Utc>,
        max: DateTime<Utc>,
        granularity: Option<TimeGranularity>,
        gap_seconds: Option<i64>,
    },
    Boolean { true_rate: f64 },
    Categorical(CategoricalPlan),
    Text(TextPlan),
    /// Always shaped like one PII pattern.
    Pattern(TextPattern),
    Hinted(NameHint),
    Empty,
}

#[derive(Debug, Clone)]
struct PlannedColumn {
    output: SyntheticColumn,
    null_rate: f64,
    generator: ColumnGenerator,
}

/// Generates synthetic rows from a profile.
#[derive(Debug, Clone)]
pub struct SyntheticDataGenerator {
    config: SynthesisConfig,
    columns: Vec<PlannedColumn>,
    correlated: Vec<String>,
    factor: Option<Vec<Vec<f64>>>,
    rng: StdRng,
    row_index: u64,
}

impl SyntheticDataGenerator {
    /// Plans every column of `profile` and seeds the random stream.
    #[instrument(skip_all, fields(source = %profile.source, seed = seed))]
    pub fn new(profile: &Profile, config: SynthesisConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut columns: Vec<PlannedColumn> = profile
            .columns
            .iter()
            .filter_map(|column| plan_column(column, &config))
            .collect();

        let (correlated, factor) = correlated_block(profile, &mut columns, &config);
        info!(
            columns = columns.len(),
            omitted = profile.columns.len() - columns.len(),
            correlated = correlated.len(),
            "Planned synthetic columns"
        );

        Ok(Self {
            config,
            columns,
            correlated,
            factor,
            rng: StdRng::seed_from_u64(seed),
            row_index: 0,
        })
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn columns(&self) -> Vec<SyntheticColumn> {
        self.columns.iter().map(|c| c.output.clone()).collect()
    }

    /// Columns sampled jointly through the Cholesky factor.
    pub fn correlated_columns(&self) -> &[String] {
        &self.correlated
    }

    /// Generates the next row.
    pub fn next_row(&mut self) -> Vec<CellValue> {
        let z: Vec<f64> = (0..self.correlated.len())
            .map(|_| standard_normal(&mut self.rng))
            .collect();
        let correlated = match &self.factor {
            Some(lower) => apply_lower(lower, &z),
            None => Vec::new(),
        };

        let index = self.row_index;
        self.row_index += 1;
        let rng = &mut self.rng;
        let inject_nulls = self.config.inject_nulls;
        self.columns
            .iter()
            .map(|column| {
                if inject_nulls && column.null_rate > 0.0 && rng.random_bool(column.null_rate) {
                    CellValue::Null
                } else {
                    sample_cell(&column.generator, rng, index, &correlated)
                }
            })
            .collect()
    }

    /// Lazily yields `n` rows.
    pub fn rows(&mut self, n: usize) -> SyntheticRows<'_> {
        SyntheticRows {
            generator: self,
            remaining: n,
        }
    }

    /// Collects `n` rows.
    pub fn generate(&mut self, n: usize) -> SyntheticDataset {
        let rows: Vec<Vec<CellValue>> = self.rows(n).collect();
        debug!(rows = rows.len(), "Generated synthetic rows");
        SyntheticDataset {
            columns: self.columns(),
            rows,
        }
    }
}

/// Generates `row_count` rows from `profile` with the default configuration.
pub fn generate(profile: &Profile, row_count: usize, seed: u64) -> Result<SyntheticDataset> {
    let mut generator = SyntheticDataGenerator::new(profile, SynthesisConfig::default(), seed)?;
    Ok(generator.generate(row_count))
}

/// Iterator returned by [`SyntheticDataGenerator::rows`].
#[derive(Debug)]
pub struct SyntheticRows<'a> {
    generator: &'a mut SyntheticDataGenerator,
    remaining: usize,
}

impl Iterator for SyntheticRows<'_> {
    type Item = Vec<CellValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.generator.next_row())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for SyntheticRows<'_> {}

/// Generated rows with their header.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticDataset {
    pub columns: Vec<SyntheticColumn>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SyntheticDataset {
    pub fn schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(|c| Field::new(&c.name, c.data_type.clone(), true))
                .collect::<Vec<_>>(),
        ))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Every value of one column, in row order.
    pub fn values(&self, name: &str) -> Option<Vec<&CellValue>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Converts the rows into an Arrow batch. Zero rows give an empty batch
    /// that still carries the header.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let cells = self.rows.iter().map(move |row| &row[i]);
                build_array(&column.data_type, cells)
            })
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows.len()));
        Ok(RecordBatch::try_new_with_options(
            self.schema(),
            arrays,
            &options,
        )?)
    }
}

fn build_array<'a>(data_type: &DataType, cells: impl Iterator<Item = &'a CellValue>) -> ArrayRef {
    match data_type {
        DataType::Int64 => Arc::new(cells.map(CellValue::as_i64).collect::<Int64Array>()),
        DataType::Float64 => Arc::new(cells.map(CellValue::as_f64).collect::<Float64Array>()),
        DataType::Boolean => Arc::new(
            cells
                .map(|c| match c {
                    CellValue::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        DataType::Timestamp(TimeUnit::Microsecond, _) => Arc::new(
            cells
                .map(|c| c.as_timestamp().map(|ts| ts.timestamp_micros()))
                .collect::<TimestampMicrosecondArray>(),
        ),
        _ => Arc::new(
            cells
                .map(|c| (!c.is_null()).then(|| c.to_string()))
                .collect::<StringArray>(),
        ),
    }
}

fn sample_cell(
    generator: &ColumnGenerator,
    rng: &mut StdRng,
    row_index: u64,
    correlated: &[f64],
) -> CellValue {
    match generator {
        ColumnGenerator::Sequential { start, as_text } => {
            let id = start.saturating_add(row_index as i64);
            if *as_text {
                CellValue::Text(id.to_string())
            } else {
                CellValue::Integer(id)
            }
        }
        ColumnGenerator::Uuid => CellValue::Text(fake_uuid(rng).to_string()),
        ColumnGenerator::Numeric(plan) => plan.sample(rng, correlated),
        ColumnGenerator::Temporal {
            min,
            max,
            granularity,
            gap_seconds,
        } => {
            let span = (*max - *min).num_microseconds().unwrap_or(0).max(0);
            let offset = if span > 0 { rng.random_range(0..=span) } else { 0 };
            let mut ts = *min + Duration::microseconds(offset);
            if let Some(gap) = gap_seconds {
                ts = snap_to_gap(ts, *min, *gap);
            } else if let Some(granularity) = granularity {
                ts = truncate_to(ts, *granularity).max(*min);
            }
            CellValue::Timestamp(ts)
        }
        ColumnGenerator::Boolean { true_rate } => CellValue::Boolean(rng.random_bool(*true_rate)),
        ColumnGenerator::Categorical(plan) => plan.sample(rng),
        ColumnGenerator::Text(plan) => plan.sample(rng),
        ColumnGenerator::Pattern(pattern) => CellValue::Text(fake_for_pattern(rng, *pattern)),
        ColumnGenerator::Hinted(hint) => CellValue::Text(fake_for_hint(rng, *hint)),
        ColumnGenerator::Empty => CellValue::Null,
    }
}

fn declared_kind(column: &ColumnProfile) -> DeclaredKind {
    DeclaredKind::from_type_name(&column.declared_type)
}

/// Plans one column; `None` for columns left out of the output.
fn plan_column(column: &ColumnProfile, config: &SynthesisConfig) -> Option<PlannedColumn> {
    let (generator, data_type) = match (column.synthesis_policy, column.semantic_type) {
        (SynthesisPolicy::Exclude, _) => {
            debug!(column = %column.name, "Excluded from synthetic output");
            return None;
        }
        (
            SynthesisPolicy::Mask,
            SemanticType::Categorical
            | SemanticType::Text
            | SemanticType::Id
            | SemanticType::Unknown,
        ) => (masked_generator(column, config), DataType::Utf8),
        (SynthesisPolicy::FakerPattern, _) => {
            (ColumnGenerator::Hinted(NameHint::PersonName), DataType::Utf8)
        }
        (SynthesisPolicy::SequentialId, _) | (_, SemanticType::Id) => id_generator(column),
        (_, SemanticType::Numeric) => numeric_generator(column, config),
        (_, SemanticType::DateTime) => temporal_generator(column),
        (_, SemanticType::Boolean) => (
            ColumnGenerator::Boolean {
                true_rate: column.true_rate.unwrap_or(0.5).clamp(0.0, 1.0),
            },
            DataType::Boolean,
        ),
        (_, SemanticType::Categorical) => (
            ColumnGenerator::Categorical(categorical_plan(column, config)),
            DataType::Utf8,
        ),
        (_, SemanticType::Text) => (
            ColumnGenerator::Text(text_plan(column, config, column.dominant_pattern().cloned())),
            DataType::Utf8,
        ),
        (_, SemanticType::Unknown) => (ColumnGenerator::Empty, DataType::Utf8),
    };

    Some(PlannedColumn {
        output: SyntheticColumn {
            name: column.name.clone(),
            data_type,
        },
        null_rate: column.null_rate().clamp(0.0, 1.0),
        generator,
    })
}

fn masked_generator(column: &ColumnProfile, config: &SynthesisConfig) -> ColumnGenerator {
    let pii = column
        .patterns
        .iter()
        .filter(|p| p.pattern.is_pii())
        .max_by(|a, b| a.match_rate.total_cmp(&b.match_rate));
    if let Some(found) = pii {
        return ColumnGenerator::Pattern(found.pattern);
    }
    match NameHint::from_column(&column.name) {
        Some(hint) => ColumnGenerator::Hinted(hint),
        None => ColumnGenerator::Text(text_plan(column, config, None)),
    }
}

fn id_generator(column: &ColumnProfile) -> (ColumnGenerator, DataType) {
    if column.has_pattern(TextPattern::Uuid) {
        return (ColumnGenerator::Uuid, DataType::Utf8);
    }
    let integer = declared_kind(column) == DeclaredKind::Integer;
    let start = column
        .min
        .as_ref()
        .and_then(CellValue::as_i64)
        .unwrap_or(1);
    (
        ColumnGenerator::Sequential {
            start,
            as_text: !integer,
        },
        if integer { DataType::Int64 } else { DataType::Utf8 },
    )
}

fn numeric_generator(
    column: &ColumnProfile,
    config: &SynthesisConfig,
) -> (ColumnGenerator, DataType) {
    let integer = declared_kind(column) == DeclaredKind::Integer;
    let (min, max) = (column.min_f64(), column.max_f64());
    let non_null = column.non_null_count();
    let zero_rate = column
        .zero_count
        .filter(|_| non_null > 0)
        .map(|zeros| zeros as f64 / non_null as f64)
        .filter(|rate| *rate > config.zero_inflation_threshold);

    let family = FamilySampler::fit(
        column.distribution.unwrap_or(DistributionFamily::Unknown),
        column.mean,
        column.std_dev,
        min,
        max,
        column.median,
        column.skewness,
    );
    let plan = NumericPlan {
        bounds: (min, max),
        integer,
        mean: column.mean.or(column.median).or(min).unwrap_or(0.0),
        std_dev: column.std_dev.unwrap_or(0.0),
        slot: None,
        zero_rate,
        histogram: column.histogram.as_ref().and_then(HistogramSampler::new),
        family,
    };
    (
        ColumnGenerator::Numeric(plan),
        if integer { DataType::Int64 } else { DataType::Float64 },
    )
}

fn temporal_generator(column: &ColumnProfile) -> (ColumnGenerator, DataType) {
    let data_type = DataType::Timestamp(TimeUnit::Microsecond, None);
    let min = column.min.as_ref().and_then(CellValue::as_timestamp);
    let max = column.max.as_ref().and_then(CellValue::as_timestamp);
    let generator = match (min, max) {
        (Some(min), Some(max)) if min <= max => {
            let temporal = column.temporal.as_ref();
            ColumnGenerator::Temporal {
                min,
                max,
                granularity: temporal
                    .map(|t| t.granularity)
                    .filter(|g| *g != TimeGranularity::Irregular),
                gap_seconds: temporal.and_then(|t| t.dominant_gap_seconds).filter(|g| *g > 0),
            }
        }
        _ => ColumnGenerator::Empty,
    };
    (generator, data_type)
}

fn categorical_plan(column: &ColumnProfile, config: &SynthesisConfig) -> CategoricalPlan {
    let mut values = Vec::new();
    let mut weights = Vec::new();
    let mut pooled = 0u64;
    if let Some(top) = &column.top_values {
        for entry in &top.values {
            if entry.count >= config.k_anonymity {
                values.push(entry.value.clone());
                weights.push(entry.count);
            } else {
                pooled += entry.count;
            }
        }
        pooled += top.other_count;
    }
    if pooled > 0 {
        weights.push(pooled);
    }
    debug!(
        column = %column.name,
        kept = values.len(),
        pooled,
        "Categorical values after k-anonymity"
    );
    CategoricalPlan {
        values,
        index: WeightedIndex::new(weights).ok(),
        fallback: NameHint::from_column(&column.name),
    }
}

fn text_plan(
    column: &ColumnProfile,
    config: &SynthesisConfig,
    pattern: Option<PatternMatch>,
) -> TextPlan {
    let (avg_length, length_bounds) = match &column.text_stats {
        Some(stats) => (
            stats.avg_length,
            (stats.min_length as usize, stats.max_length as usize),
        ),
        None => (DEFAULT_TEXT_LENGTH, (1, 4 * DEFAULT_TEXT_LENGTH as usize)),
    };
    let hint = NameHint::from_column(&column.name)
        .filter(|hint| !matches!(hint, NameHint::Identifier))
        .or_else(|| {
            (column.synthesis_policy == SynthesisPolicy::FakerPattern)
                .then_some(NameHint::PersonName)
        });
    TextPlan {
        pattern,
        hint,
        avg_length,
        length_bounds,
        jitter: config.text_length_jitter,
    }
}

/// Picks the correlated numeric columns, factorizes their matrix and assigns
/// each its slot. Falls back to independent sampling when the matrix is not
/// positive definite.
fn correlated_block(
    profile: &Profile,
    columns: &mut [PlannedColumn],
    config: &SynthesisConfig,
) -> (Vec<String>, Option<Vec<Vec<f64>>>) {
    let spread = |c: &PlannedColumn| match &c.generator {
        ColumnGenerator::Numeric(plan) => plan.std_dev > 0.0,
        _ => false,
    };
    let eligible: Vec<String> = columns
        .iter()
        .filter(|c| spread(c))
        .map(|c| c.output.name.clone())
        .collect();
    let names: Vec<String> = eligible
        .iter()
        .filter(|name| {
            profile.correlations.iter().any(|corr| {
                (corr.column_a == **name && eligible.contains(&corr.column_b))
                    || (corr.column_b == **name && eligible.contains(&corr.column_a))
            })
        })
        .take(config.max_correlated_columns)
        .cloned()
        .collect();
    if names.len() < 2 {
        return (Vec::new(), None);
    }

    let matrix = correlation_matrix(&names, &profile.correlations);
    let lower = match cholesky(&matrix) {
        Ok(lower) => lower,
        Err(e) => {
            warn!(error = %e, columns = ?names, "Sampling correlated columns independently");
            return (Vec::new(), None);
        }
    };

    for column in columns.iter_mut() {
        if let ColumnGenerator::Numeric(plan) = &mut column.generator {
            plan.slot = names.iter().position(|n| *n == column.output.name);
        }
    }
    (names, Some(lower))
}
