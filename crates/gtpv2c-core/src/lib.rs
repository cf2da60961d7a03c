//! GTPv2-C reliable transaction engine
//!
//! This crate turns an unreliable UDP datagram channel into the request/response
//! discipline 3GPP TS 29.274 Section 7.6 asks of a GTPv2-C entity: every initial
//! message is stamped with a fresh sequence number, retransmitted every T3 until
//! a triggered message arrives or N3 retransmissions were spent, and every
//! procedure is garbage collected by a backstop cleanup timer.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────────────────┐
//!  upper layer ──────▶│    TransactionEngine     │──────▶ DatagramTransport
//!  (send_initial,     │  ┌─────────┐ ┌─────────┐ │
//!   send_triggered)   │  │Sequence │ │Procedure│ │──────▶ TimerService
//!                     │  │Generator│ │ Table + │ │
//!  transport ────────▶│  └─────────┘ │ Index   │ │──────▶ NotificationSink
//!  (on_receive)       │  ┌─────────┐ └─────────┘ │
//!  timer service ────▶│  │Classifier│ ┌────────┐ │
//!  (on_timeout)       │  └─────────┘ │ Timers │ │
//!                     │              └────────┘ │
//!                     └──────────────────────────┘
//! ```
//!
//! The engine is synchronous and never blocks. It expects a single owner per
//! protocol endpoint: one task or event loop delivers datagrams, timer expiries
//! and upper-layer requests to it one at a time. Only the [`SequenceGenerator`]
//! is internally synchronized and may be shared between engines.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use epcgw_gtpv2c_core::prelude::*;
//!
//! # fn example() -> epcgw_gtpv2c_core::Result<()> {
//! let transport = Arc::new(RecordingTransport::default());
//! let mut engine = TransactionEngine::new(
//!     TransactionConfig::default(),
//!     transport.clone(),
//!     Box::new(DeadlineTimerService::new()),
//! )?;
//!
//! let peer = "127.0.0.1:2123".parse().unwrap();
//! let echo = Gtpv2cMessage::new_no_teid(MessageType::EchoRequest, Bytes::new());
//! let (sequence_number, correlation_id) = engine.send_initial(echo, peer, None)?;
//!
//! assert_eq!(transport.sent().len(), 1);
//! assert!(engine.procedure(correlation_id).is_some());
//! assert!(engine.procedure_by_sequence(sequence_number).is_some());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod message;
pub mod procedure;
pub mod sequence;
pub mod table;
pub mod timer;
pub mod transport;

pub use config::TransactionConfig;
pub use engine::TransactionEngine;
pub use error::{Error, Result};
pub use events::{DiscardReason, NotificationSink, ReceiveOutcome, TimeoutOutcome};
pub use message::{GtpMessage, Gtpv2cHeader, Gtpv2cMessage, MessageType};
pub use procedure::{CorrelationId, Procedure, ProcedureState, Teid};
pub use sequence::SequenceGenerator;
pub use table::{CorrelationIdGenerator, ProcedureTable};
pub use timer::{DeadlineTimerService, TimerHandle, TimerKind, TimerService};
pub use transport::{DatagramTransport, RecordingTransport};

/// GTPv2-C UDP port (2123)
pub const GTPV2C_UDP_PORT: u16 = 2123;

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        CorrelationId, DatagramTransport, DeadlineTimerService, DiscardReason, Error, GtpMessage,
        Gtpv2cHeader, Gtpv2cMessage, MessageType, NotificationSink, Procedure, ProcedureState,
        ProcedureTable, ReceiveOutcome, RecordingTransport, Result, SequenceGenerator, Teid,
        TimeoutOutcome, TimerHandle, TimerKind, TimerService, TransactionConfig,
        TransactionEngine,
    };
}
