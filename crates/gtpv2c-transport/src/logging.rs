//! Logging setup for processes hosting a GTPv2-C endpoint
//!
//! The `[logging]` section of the endpoint TOML selects the level of the
//! `epcgw_gtpv2c_*` targets and the output format. A `RUST_LOG` variable, when
//! set, replaces the configured directives entirely.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Targets the configured level applies to
const TARGETS: [&str; 2] = ["epcgw_gtpv2c_core", "epcgw_gtpv2c_transport"];

/// `[logging]` section of the endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level of the GTPv2-C targets, e.g. `"debug"`
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
    /// Include source file and line
    pub source_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            source_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        parse_log_level(&self.level).map(|_| ())
    }

    /// Filter directives derived from the configured level
    pub fn directives(&self) -> Result<String> {
        let level = parse_log_level(&self.level)?;
        let directives: Vec<String> = TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level.as_str().to_ascii_lowercase()))
            .collect();
        Ok(directives.join(","))
    }

    fn filter(&self) -> Result<EnvFilter> {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return EnvFilter::try_from_default_env().map_err(|e| Error::Config(format!("RUST_LOG: {}", e)));
        }
        EnvFilter::try_new(self.directives()?).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Install the global subscriber.
///
/// Only one subscriber can be installed per process; later calls fail with
/// [`Error::Logging`].
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(config.filter()?)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let installed = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), level = %config.level, "GTPv2-C logging initialized");
    Ok(())
}

/// Parse a log level such as `"debug"` or `"WARN"`
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Config(format!("Invalid log level: {}", level)))
}
