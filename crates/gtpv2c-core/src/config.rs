//! Transaction engine configuration
//!
//! The engine consumes exactly three values: the retry interval (T3), the
//! maximum number of retransmissions (N3) and the cleanup interval. An
//! optional capacity bounds the procedure table.
//!
//! ```rust
//! use std::time::Duration;
//! use epcgw_gtpv2c_core::TransactionConfig;
//!
//! let config = TransactionConfig::from_toml_str(
//!     r#"
//!     [gtpv2c]
//!     t3_response_ms = 500
//!     n3_requests = 5
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.t3_response, Duration::from_millis(500));
//! // The cleanup interval defaults to T3 * (N3 + 1) plus a one second margin
//! assert_eq!(config.proc_cleanup, Duration::from_millis(4000));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default T3 retry interval
pub const DEFAULT_T3_RESPONSE: Duration = Duration::from_millis(1000);

/// Default N3 maximum retransmission count
pub const DEFAULT_N3_REQUESTS: u8 = 3;

/// Margin added on top of `T3 * (N3 + 1)` for the derived cleanup interval
pub const CLEANUP_MARGIN: Duration = Duration::from_millis(1000);

/// Timing and sizing of the transaction engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTransactionConfig", into = "RawTransactionConfig")]
pub struct TransactionConfig {
    /// Retransmission interval (T3)
    pub t3_response: Duration,
    /// Retransmissions before the peer is declared unresponsive (N3)
    pub n3_requests: u8,
    /// Lifetime bound of every procedure
    pub proc_cleanup: Duration,
    /// Maximum number of concurrent procedures, unbounded when `None`
    pub max_procedures: Option<usize>,
}

impl TransactionConfig {
    /// Configuration for the given T3/N3 with the derived cleanup interval
    pub fn new(t3_response: Duration, n3_requests: u8) -> Self {
        Self {
            t3_response,
            n3_requests,
            proc_cleanup: derived_cleanup(t3_response, n3_requests),
            max_procedures: None,
        }
    }

    pub fn with_t3_response(mut self, t3_response: Duration) -> Self {
        self.t3_response = t3_response;
        self
    }

    pub fn with_n3_requests(mut self, n3_requests: u8) -> Self {
        self.n3_requests = n3_requests;
        self
    }

    pub fn with_proc_cleanup(mut self, proc_cleanup: Duration) -> Self {
        self.proc_cleanup = proc_cleanup;
        self
    }

    pub fn with_max_procedures(mut self, max_procedures: usize) -> Self {
        self.max_procedures = Some(max_procedures);
        self
    }

    /// Time an outbound procedure may spend retransmitting: `T3 * (N3 + 1)`
    pub fn retry_window(&self) -> Duration {
        self.t3_response * (u32::from(self.n3_requests) + 1)
    }

    /// Check the timing constraints.
    ///
    /// The cleanup interval must outlast the whole retry window, otherwise a
    /// procedure could be collected before its retries are exhausted.
    pub fn validate(&self) -> Result<()> {
        if self.t3_response.is_zero() {
            return Err(Error::Config("t3_response must be greater than zero".to_string()));
        }
        if self.proc_cleanup <= self.retry_window() {
            return Err(Error::Config(format!(
                "proc_cleanup ({:?}) must exceed T3 * (N3 + 1) ({:?})",
                self.proc_cleanup,
                self.retry_window()
            )));
        }
        if self.max_procedures == Some(0) {
            return Err(Error::Config("max_procedures must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Parse a TOML document carrying a `[gtpv2c]` table
    pub fn from_toml_str(input: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Document {
            gtpv2c: TransactionConfig,
        }

        toml::from_str::<Document>(input)
            .map(|document| document.gtpv2c)
            .map_err(|e| Error::Config(e.to_string()))
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_T3_RESPONSE, DEFAULT_N3_REQUESTS)
    }
}

fn derived_cleanup(t3_response: Duration, n3_requests: u8) -> Duration {
    t3_response * (u32::from(n3_requests) + 1) + CLEANUP_MARGIN
}

/// Wire form: durations in milliseconds, every field optional
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawTransactionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    t3_response_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n3_requests: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proc_cleanup_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_procedures: Option<usize>,
}

impl TryFrom<RawTransactionConfig> for TransactionConfig {
    type Error = Error;

    fn try_from(raw: RawTransactionConfig) -> Result<Self> {
        let t3_response = raw
            .t3_response_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_T3_RESPONSE);
        let n3_requests = raw.n3_requests.unwrap_or(DEFAULT_N3_REQUESTS);

        let mut config = TransactionConfig::new(t3_response, n3_requests);
        if let Some(ms) = raw.proc_cleanup_ms {
            config.proc_cleanup = Duration::from_millis(ms);
        }
        config.max_procedures = raw.max_procedures;

        config.validate()?;
        Ok(config)
    }
}

impl From<TransactionConfig> for RawTransactionConfig {
    fn from(config: TransactionConfig) -> Self {
        Self {
            t3_response_ms: Some(config.t3_response.as_millis() as u64),
            n3_requests: Some(config.n3_requests),
            proc_cleanup_ms: Some(config.proc_cleanup.as_millis() as u64),
            max_procedures: config.max_procedures,
        }
    }
}
