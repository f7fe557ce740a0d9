//! # Term Profile - Statistical Dataset Profiling for Rust
//!
//! Term Profile describes a tabular dataset statistically, streaming it
//! through DataFusion instead of loading it into memory, and then puts that
//! description to work: comparing two profiles for drift, and generating
//! synthetic rows that keep the original's distributions and correlations
//! without copying its records.
//!
//! ## Quick Start
//!
//! ```rust
//! use term_profile::prelude::*;
//! use datafusion::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let ctx = SessionContext::new();
//! ctx.register_csv("orders", "data/orders.csv", CsvReadOptions::new()).await?;
//!
//! let session = ProfileSession::new(ctx, "orders")?;
//! let profiler = DatasetProfiler::builder()
//!     .target_column("churned")
//!     .build();
//! let profile = profiler.profile(&session).await?;
//!
//! for alert in &profile.alerts {
//!     println!("[{}] {}", alert.severity, alert.message);
//! }
//!
//! // Drift against an earlier run
//! let baseline = Profile::from_json(&std::fs::read_to_string("baseline.json")?)?;
//! let diff = ProfileComparator::default().compare(&baseline, &profile);
//! println!("{}", diff.summary);
//!
//! // Synthetic rows with the same shape
//! let mut generator = SyntheticDataGenerator::new(&profile, SynthesisConfig::default(), 42)?;
//! let batch = generator.generate(1_000).to_record_batch()?;
//! println!("{} synthetic rows", batch.num_rows());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`engine`**: the DataFusion boundary. A `ProfileSession` answers row
//!   counts, per-column summaries and ad hoc aggregate queries.
//! - **`profile`**: type inference, parallel per-column enrichment,
//!   relationships (Pearson, Cramer's V), rule-based alerts and binary target
//!   analysis, assembled by `DatasetProfiler`.
//! - **`drift`**: `ProfileComparator`, a pure function of two profiles giving
//!   schema changes, PSI/KS/JS metrics, a drift score and recommendations.
//! - **`synth`**: `SyntheticDataGenerator`, a seeded row stream that shares one
//!   Cholesky-transformed normal draw per row across correlated columns.
//! - **`logging`**: `tracing` configuration and performance-aware macros.
//! - **`security`**: identifier escaping and input validation for the SQL the
//!   profiler issues.

pub mod drift;
pub mod engine;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod profile;
pub mod security;
pub mod synth;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
