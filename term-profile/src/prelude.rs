//! Prelude for commonly used types and traits in term-profile.

pub use crate::drift::{ComparatorConfig, ProfileComparator, ProfileDiffResult};
pub use crate::engine::{CellValue, ProfileSession};
pub use crate::error::{ProfileError, Result};
pub use crate::logging::LogConfig;
pub use crate::profile::{
    AlertDetector, AlertRule, AlertSeverity, AlertType, ColumnProfile, DataAlert,
    DatasetProfiler, Profile, ProfilerConfig, SemanticType, SynthesisPolicy,
};
pub use crate::synth::{SynthesisConfig, SyntheticDataGenerator, SyntheticDataset};
