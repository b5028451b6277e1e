/*!
# Config Module

Configuration for a [`BoundedDispatcher`](crate::dispatcher::BoundedDispatcher).

Settings are layered with the `config` crate, lowest priority first:
- Built-in defaults
- An optional configuration file (TOML, YAML, JSON, ...)
- Environment variables prefixed with `FLOWGATE_`, e.g.
  `FLOWGATE_MAX_CONCURRENCY=8` or `FLOWGATE_POLL_INTERVAL_MS=250`
*/

use crate::error::{FlowGateError, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "FLOWGATE";

/// Configuration for the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of tasks executing at the same time
    pub max_concurrency: usize,

    /// How often the scheduler re-checks the queue without a wake signal (in milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            poll_interval_ms: 1000,
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).try_parsing(true)
}

impl DispatcherConfig {
    /// Create a configuration with the given concurrency and the default poll interval
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            ..Self::default()
        }
    }

    /// Set the poll interval.
    ///
    /// The interval has millisecond granularity; a non-zero interval below
    /// one millisecond is rounded up to one.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        let millis = interval.as_millis() as u64;
        self.poll_interval_ms = if millis == 0 && !interval.is_zero() {
            1
        } else {
            millis
        };
        self
    }

    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// A file passed explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(environment());

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let defaults = Self::default();
        let config: Self = builder
            .set_default("max_concurrency", defaults.max_concurrency as i64)?
            .set_default("poll_interval_ms", defaults.poll_interval_ms as i64)?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a usable dispatcher
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(FlowGateError::InvalidConcurrency(self.max_concurrency));
        }
        if self.poll_interval_ms == 0 {
            return Err(FlowGateError::InvalidPollInterval);
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(source: &str) -> Result<DispatcherConfig> {
        DispatcherConfig::from_builder(
            Config::builder().add_source(File::from_str(source, FileFormat::Toml)),
        )
    }

    #[test]
    fn defaults_are_valid() {
        let config = DispatcherConfig::default();
        assert!(config.max_concurrency >= 1);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let config = from_toml("max_concurrency = 3").unwrap();
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.poll_interval_ms, 1000);

        let config = from_toml("max_concurrency = 2\npoll_interval_ms = 50").unwrap();
        assert_eq!(config, DispatcherConfig::new(2).with_poll_interval(Duration::from_millis(50)));
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(matches!(
            from_toml("max_concurrency = 0"),
            Err(FlowGateError::InvalidConcurrency(0))
        ));
        assert!(matches!(
            from_toml("poll_interval_ms = 0"),
            Err(FlowGateError::InvalidPollInterval)
        ));
    }

    #[test]
    fn malformed_values_surface_as_config_errors() {
        assert!(matches!(
            from_toml("max_concurrency = \"many\""),
            Err(FlowGateError::Config(_))
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = DispatcherConfig::load(Some(Path::new("does/not/exist/flowgate.toml")));
        assert!(matches!(result, Err(FlowGateError::Config(_))));
    }

    #[test]
    fn environment_overrides_file_and_defaults() {
        let vars = config::Map::from([
            ("FLOWGATE_POLL_INTERVAL_MS".to_string(), "250".to_string()),
            ("FLOWGATE_MAX_CONCURRENCY".to_string(), "6".to_string()),
            ("OTHER_MAX_CONCURRENCY".to_string(), "9".to_string()),
        ]);
        let builder = Config::builder()
            .add_source(File::from_str("max_concurrency = 2", FileFormat::Toml))
            .add_source(environment().source(Some(vars)));

        let config = DispatcherConfig::from_builder(builder).unwrap();
        assert_eq!(config.max_concurrency, 6);
        assert_eq!(config.poll_interval_ms, 250);
    }

    #[test]
    fn sub_millisecond_poll_interval_rounds_up() {
        let config = DispatcherConfig::new(1).with_poll_interval(Duration::from_micros(250));
        assert_eq!(config.poll_interval_ms, 1);
        assert!(config.validate().is_ok());

        let config = DispatcherConfig::new(1).with_poll_interval(Duration::from_micros(2_500));
        assert_eq!(config.poll_interval_ms, 2);

        let config = DispatcherConfig::new(1).with_poll_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(FlowGateError::InvalidPollInterval)
        ));
    }
}
