//! Logging utilities and configuration for the profiler.
//!
//! Profiling a wide table issues hundreds of small aggregate queries, so the
//! per-pair and timing log lines are gated behind [`LogConfig`] flags and
//! the macros below. Phase boundaries are always logged at `info`.

/// Which of the chatty profiler log lines are emitted.
///
/// Attached to a run through `ProfilerConfig::log`. It never changes what is
/// computed, only what is logged while computing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// One `debug` line per evaluated correlation or association pair
    pub log_pair_details: bool,
    /// One `info` line per finished phase with its elapsed time
    pub log_timings: bool,
    /// Longest error text or identifier written into a log field
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

impl LogConfig {
    /// Everything on, long fields kept.
    pub fn verbose() -> Self {
        Self {
            log_pair_details: true,
            log_timings: true,
            max_field_length: 1024,
        }
    }

    /// Phase boundaries and warnings only.
    pub fn production() -> Self {
        Self {
            log_pair_details: false,
            log_timings: false,
            max_field_length: 128,
        }
    }

    /// Timings without per-pair detail.
    pub fn balanced() -> Self {
        Self {
            log_pair_details: false,
            log_timings: true,
            max_field_length: 256,
        }
    }

    /// Shortens `value` to this config's field limit.
    pub fn field(&self, value: &str) -> String {
        truncate_field(value, self.max_field_length)
    }
}

/// Logs one relationship pair when pair details are enabled.
#[macro_export]
macro_rules! log_pair {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_pair_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Logs a phase timing when timings are enabled.
#[macro_export]
macro_rules! log_timing {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_timings {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` bytes on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber setup for binaries and tests that embed the profiler.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global tracing subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for everything outside the profiler
        pub level: Level,
        /// Log level for `term_profile` targets
        pub profile_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                profile_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                profile_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                profile_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the log level for everything outside the profiler.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the log level for profiler components.
        pub fn with_profile_level(mut self, level: Level) -> Self {
            self.profile_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},term_profile={}",
                    self.level.as_str().to_lowercase(),
                    self.profile_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs a global `tracing` subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_profile::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_presets() {
        assert_eq!(LogConfig::default(), LogConfig::balanced());
        assert!(LogConfig::default().log_timings);
        assert!(LogConfig::verbose().log_pair_details);

        let production = LogConfig::production();
        assert!(!production.log_timings);
        assert_eq!(production.field(&"x".repeat(200)).len(), 128 + "...(truncated)".len());
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("this is a very long text", 10),
            "this is a ...(truncated)"
        );
        // Multi-byte characters are never split.
        assert_eq!(truncate_field("ééé", 3), "é...(truncated)");
    }

    #[test]
    fn test_env_filter_string() {
        let config = LoggingConfig::default();
        assert_eq!(config.env_filter(), "info,term_profile=debug");
        let custom = LoggingConfig::production().with_env_filter("warn");
        assert_eq!(custom.env_filter(), "warn");
    }
}
