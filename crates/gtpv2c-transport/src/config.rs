//! Endpoint configuration

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use epcgw_gtpv2c_core::{TransactionConfig, GTPV2C_UDP_PORT};

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;

/// Default capacity of the command and transport channels
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Configuration of one GTPv2-C endpoint
///
/// ```rust
/// use epcgw_gtpv2c_transport::EndpointConfig;
///
/// let config = EndpointConfig::from_toml_str(
///     r#"
///     local_addr = "127.0.0.1:2123"
///
///     [gtpv2c]
///     t3_response_ms = 2000
///     n3_requests = 2
///
///     [logging]
///     level = "debug"
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.transaction.n3_requests, 2);
/// assert_eq!(config.logging.level, "debug");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Address the UDP socket binds to
    pub local_addr: SocketAddr,

    /// Retransmission and cleanup timing
    #[serde(default, rename = "gtpv2c")]
    pub transaction: TransactionConfig,

    /// Capacity of the command and transport channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Log level and format
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl EndpointConfig {
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            transaction: TransactionConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            logging: LoggingConfig::default(),
        }
    }

    pub fn with_transaction(mut self, transaction: TransactionConfig) -> Self {
        self.transaction = transaction;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be greater than zero".to_string()));
        }
        self.transaction.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], GTPV2C_UDP_PORT)))
    }
}
