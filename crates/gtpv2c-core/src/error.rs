//! Error types for the GTPv2-C transaction engine
//!
//! Protocol anomalies (unclassifiable or duplicated datagrams) are normally
//! reported as [`crate::ReceiveOutcome::Discarded`] rather than as errors; the
//! matching variants exist so callers that want a hard error can convert a
//! discard into one. Resource-level anomalies (sequence reuse, double-armed
//! timers) are internal invariant violations.

use std::net::SocketAddr;

use thiserror::Error;

use crate::procedure::{CorrelationId, Teid};
use crate::timer::TimerKind;

/// Result type alias for the transaction engine
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the transaction engine and its building blocks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A procedure is already pending under this sequence number
    #[error("Duplicate sequence number {sequence_number}: a procedure is already pending")]
    DuplicateSequence { sequence_number: u32 },

    /// No live procedure is registered under this correlation id
    #[error("No procedure found for correlation id {0}")]
    CorrelationNotFound(CorrelationId),

    /// Incoming message type cannot open a procedure
    #[error("Unclassifiable initial message type {message_type}, seq {sequence_number}")]
    UnclassifiableInitial { message_type: u8, sequence_number: u32 },

    /// Incoming message type does not answer the pending procedure
    #[error("Message type {triggered} is not a valid triggered type for initial type {initial}")]
    InvalidTriggered { initial: u8, triggered: u8 },

    /// The peer never answered after N3 retransmissions
    #[error("Retry exhausted for procedure {correlation_id} towards {remote_endpoint}")]
    RetryExhausted {
        correlation_id: CorrelationId,
        remote_endpoint: SocketAddr,
        caller_tag: Option<Teid>,
    },

    /// A timer of this kind is already armed for the procedure
    #[error("{kind} timer already armed for seq {sequence_number}")]
    DoubleArmTimer { kind: TimerKind, sequence_number: u32 },

    /// The procedure table reached its configured capacity
    #[error("Procedure table full ({capacity} procedures)")]
    TableFull { capacity: usize },

    /// Buffer too short for the operation
    #[error("Buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Header carries a version other than 2
    #[error("Invalid GTP version: {0}")]
    InvalidVersion(u8),

    /// Header length field disagrees with the datagram size
    #[error("Length mismatch: header announces {announced} bytes, datagram carries {actual}")]
    LengthMismatch { announced: usize, actual: usize },

    /// The message does not fit the 16-bit length field
    #[error("Message too large: length {length} exceeds {max}")]
    MessageTooLarge { length: usize, max: usize },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is a protocol-level anomaly that should never
    /// escalate above a log line.
    pub fn is_protocol_anomaly(&self) -> bool {
        matches!(
            self,
            Error::UnclassifiableInitial { .. }
                | Error::InvalidTriggered { .. }
                | Error::BufferTooShort { .. }
                | Error::InvalidVersion(_)
                | Error::LengthMismatch { .. }
        )
    }
}
