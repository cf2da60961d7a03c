//! Outcomes reported by the engine and the upper-layer notification sink

use std::fmt;
use std::net::SocketAddr;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::procedure::{CorrelationId, Teid};

/// Why an incoming message was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    /// No pending procedure and the type cannot open one
    UnclassifiableInitial,
    /// The type does not answer the pending procedure
    InvalidTriggered,
    /// The procedure already received its triggered message
    AlreadyAnswered,
    /// The peer retransmitted the initial message of an inbound procedure
    RetransmittedRequest,
    /// A new procedure would exceed the table capacity
    TableFull,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DiscardReason::UnclassifiableInitial => "unclassifiable initial",
            DiscardReason::InvalidTriggered => "not a valid triggered type",
            DiscardReason::AlreadyAnswered => "procedure already answered",
            DiscardReason::RetransmittedRequest => "retransmitted request",
            DiscardReason::TableFull => "procedure table full",
        };
        f.write_str(reason)
    }
}

/// Result of classifying an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// A peer-initiated procedure was opened
    NewProcedure(CorrelationId),
    /// The message answered a procedure this endpoint initiated
    MatchedProcedure(CorrelationId),
    /// The message was dropped at the protocol level
    Discarded(DiscardReason),
}

impl ReceiveOutcome {
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            ReceiveOutcome::NewProcedure(id) | ReceiveOutcome::MatchedProcedure(id) => Some(*id),
            ReceiveOutcome::Discarded(_) => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, ReceiveOutcome::Discarded(_))
    }
}

/// Result of delivering a fired timer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// The initial message was retransmitted and the retry timer rearmed
    RetryScheduled {
        correlation_id: CorrelationId,
        retry_count: u8,
    },
    /// N3 retransmissions went unanswered; the procedure was removed
    ProcedureAbortedRetryExhausted {
        correlation_id: CorrelationId,
        caller_tag: Option<Teid>,
        remote_endpoint: SocketAddr,
    },
    /// The cleanup timer removed a procedure that never completed
    ProcedureAbortedCleanup { correlation_id: CorrelationId },
    /// The retry timer could not be rearmed; the procedure was removed
    ProcedureAbortedTimerFault { correlation_id: CorrelationId },
    /// The cleanup timer removed a completed procedure
    ProcedureReleased { correlation_id: CorrelationId },
    /// The handle is unknown or was cancelled before its expiry was delivered
    Ignored,
}

impl TimeoutOutcome {
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            TimeoutOutcome::RetryScheduled { correlation_id, .. }
            | TimeoutOutcome::ProcedureAbortedRetryExhausted { correlation_id, .. }
            | TimeoutOutcome::ProcedureAbortedCleanup { correlation_id }
            | TimeoutOutcome::ProcedureAbortedTimerFault { correlation_id }
            | TimeoutOutcome::ProcedureReleased { correlation_id } => Some(*correlation_id),
            TimeoutOutcome::Ignored => None,
        }
    }

    /// Turn retry exhaustion into [`Error::RetryExhausted`] for callers that
    /// propagate delivery failures with `?`
    pub fn into_result(self) -> Result<TimeoutOutcome> {
        match self {
            TimeoutOutcome::ProcedureAbortedRetryExhausted {
                correlation_id,
                caller_tag,
                remote_endpoint,
            } => Err(Error::RetryExhausted {
                correlation_id,
                remote_endpoint,
                caller_tag,
            }),
            outcome => Ok(outcome),
        }
    }

    /// Whether the procedure left the table
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TimeoutOutcome::ProcedureAbortedRetryExhausted { .. }
                | TimeoutOutcome::ProcedureAbortedCleanup { .. }
                | TimeoutOutcome::ProcedureAbortedTimerFault { .. }
                | TimeoutOutcome::ProcedureReleased { .. }
        )
    }
}

/// Upper-layer delivery failure signal
pub trait NotificationSink: Send + Sync {
    /// The peer did not answer an initial message after N3 retransmissions
    fn notify_peer_unresponsive(
        &self,
        remote_endpoint: SocketAddr,
        caller_tag: Option<Teid>,
        correlation_id: CorrelationId,
    );
}

/// Sink that drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify_peer_unresponsive(&self, _: SocketAddr, _: Option<Teid>, _: CorrelationId) {}
}

/// A recorded "peer not responding" notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerUnresponsive {
    pub remote_endpoint: SocketAddr,
    pub caller_tag: Option<Teid>,
    pub correlation_id: CorrelationId,
}

/// Sink that keeps every notification for inspection
#[derive(Debug, Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<PeerUnresponsive>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<PeerUnresponsive> {
        self.notifications.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify_peer_unresponsive(
        &self,
        remote_endpoint: SocketAddr,
        caller_tag: Option<Teid>,
        correlation_id: CorrelationId,
    ) {
        self.notifications.lock().push(PeerUnresponsive {
            remote_endpoint,
            caller_tag,
            correlation_id,
        });
    }
}
