//! Error types for the GTPv2-C runtime

use thiserror::Error;

/// Result type alias for the runtime crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the endpoint, its transport and its setup helpers
#[derive(Error, Debug)]
pub enum Error {
    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by the transaction engine
    #[error(transparent)]
    Engine(#[from] epcgw_gtpv2c_core::Error),

    /// The endpoint task is gone
    #[error("Endpoint channel closed")]
    ChannelClosed,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl Error {
    /// Whether the endpoint can no longer serve requests
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ChannelClosed | Error::Io(_))
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for Error {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Error::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_are_transparent() {
        let err: Error = epcgw_gtpv2c_core::Error::TableFull { capacity: 8 }.into();
        assert_eq!(err.to_string(), "Procedure table full (8 procedures)");
        assert!(!err.is_fatal());
        assert!(Error::ChannelClosed.is_fatal());
    }
}
