//! In-flight procedure state
//!
//! A procedure is one request/response exchange identified on the wire by its
//! sequence number and, towards upper layers, by a [`CorrelationId`].

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::timer::TimerHandle;

/// Tunnel Endpoint Identifier
pub type Teid = u32;

/// Opaque, process-unique identifier of a procedure.
///
/// Upper layers hold correlation ids instead of wire sequence numbers so that
/// they never depend on protocol-specific numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Placeholder carried by a procedure that has not entered a table yet
    pub const UNASSIGNED: CorrelationId = CorrelationId(0);

    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proc-{:#x}", self.0)
    }
}

/// Procedure lifecycle states.
///
/// Outbound: `InitialSent` → `WaitingTriggered` (after the first
/// retransmission) → `Completed`. Inbound: `InitialReceived` →
/// `TriggeredSent`. Retry exhaustion and cleanup expiry remove the procedure,
/// so they have no state of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcedureState {
    /// Initial message transmitted once, waiting for the triggered message
    InitialSent,
    /// Initial message retransmitted at least once
    WaitingTriggered,
    /// Triggered message received for an outbound procedure
    Completed,
    /// Initial message received from the peer
    InitialReceived,
    /// Triggered message sent for an inbound procedure without closing it
    TriggeredSent,
}

impl ProcedureState {
    /// Whether the exchange has been answered in either direction
    pub fn is_answered(&self) -> bool {
        matches!(self, ProcedureState::Completed | ProcedureState::TriggeredSent)
    }
}

impl fmt::Display for ProcedureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcedureState::InitialSent => "InitialSent",
            ProcedureState::WaitingTriggered => "WaitingTriggered",
            ProcedureState::Completed => "Completed",
            ProcedureState::InitialReceived => "InitialReceived",
            ProcedureState::TriggeredSent => "TriggeredSent",
        };
        f.write_str(name)
    }
}

/// One in-flight request/response exchange
#[derive(Debug, Clone)]
pub struct Procedure {
    pub(crate) sequence_number: u32,
    pub(crate) correlation_id: CorrelationId,
    pub(crate) initial_message_type: u8,
    pub(crate) triggered_message_type: Option<u8>,
    pub(crate) retry_count: u8,
    pub(crate) retry_timer: Option<TimerHandle>,
    pub(crate) cleanup_timer: Option<TimerHandle>,
    /// Present only for procedures this endpoint initiated
    pub(crate) retransmit_payload: Option<Bytes>,
    pub(crate) remote_endpoint: SocketAddr,
    pub(crate) local_correlation_context: Option<Teid>,
    pub(crate) state: ProcedureState,
}

impl Procedure {
    /// Procedure for an initial message this endpoint sends
    pub fn outbound(
        sequence_number: u32,
        initial_message_type: u8,
        retransmit_payload: Bytes,
        remote_endpoint: SocketAddr,
        local_correlation_context: Option<Teid>,
    ) -> Self {
        Self {
            sequence_number,
            correlation_id: CorrelationId::UNASSIGNED,
            initial_message_type,
            triggered_message_type: None,
            retry_count: 0,
            retry_timer: None,
            cleanup_timer: None,
            retransmit_payload: Some(retransmit_payload),
            remote_endpoint,
            local_correlation_context,
            state: ProcedureState::InitialSent,
        }
    }

    /// Procedure for an initial message received from a peer
    pub fn inbound(sequence_number: u32, initial_message_type: u8, remote_endpoint: SocketAddr) -> Self {
        Self {
            sequence_number,
            correlation_id: CorrelationId::UNASSIGNED,
            initial_message_type,
            triggered_message_type: None,
            retry_count: 0,
            retry_timer: None,
            cleanup_timer: None,
            retransmit_payload: None,
            remote_endpoint,
            local_correlation_context: None,
            state: ProcedureState::InitialReceived,
        }
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Correlation id, assigned when the procedure enters a table
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn initial_message_type(&self) -> u8 {
        self.initial_message_type
    }

    pub fn triggered_message_type(&self) -> Option<u8> {
        self.triggered_message_type
    }

    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub fn retry_timer(&self) -> Option<TimerHandle> {
        self.retry_timer
    }

    pub fn cleanup_timer(&self) -> Option<TimerHandle> {
        self.cleanup_timer
    }

    pub fn retransmit_payload(&self) -> Option<&Bytes> {
        self.retransmit_payload.as_ref()
    }

    pub fn remote_endpoint(&self) -> SocketAddr {
        self.remote_endpoint
    }

    /// Caller-supplied tag forwarded to failure notifications
    pub fn local_correlation_context(&self) -> Option<Teid> {
        self.local_correlation_context
    }

    pub fn state(&self) -> ProcedureState {
        self.state
    }

    /// Whether this endpoint sent the initial message
    pub fn is_outbound(&self) -> bool {
        self.retransmit_payload.is_some()
    }

    /// Record the first structurally valid triggered message
    pub(crate) fn stamp_triggered(&mut self, message_type: u8) {
        debug_assert!(self.triggered_message_type.is_none());
        self.triggered_message_type = Some(message_type);
        if self.is_outbound() {
            self.state = ProcedureState::Completed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "10.0.0.1:2123".parse().unwrap()
    }

    #[test]
    fn test_outbound_procedure_owns_retransmission() {
        let proc = Procedure::outbound(5, 32, Bytes::from_static(b"csr"), peer(), Some(0xAB));
        assert!(proc.is_outbound());
        assert_eq!(proc.state(), ProcedureState::InitialSent);
        assert_eq!(proc.retransmit_payload().map(|b| b.as_ref()), Some(&b"csr"[..]));
        assert_eq!(proc.local_correlation_context(), Some(0xAB));
        assert_eq!(proc.correlation_id(), CorrelationId::UNASSIGNED);
    }

    #[test]
    fn test_inbound_procedure_never_retransmits() {
        let proc = Procedure::inbound(7, 1, peer());
        assert!(!proc.is_outbound());
        assert!(proc.retransmit_payload().is_none());
        assert_eq!(proc.state(), ProcedureState::InitialReceived);
    }

    #[test]
    fn test_stamp_triggered_completes_outbound() {
        let mut proc = Procedure::outbound(5, 1, Bytes::new(), peer(), None);
        proc.stamp_triggered(2);
        assert_eq!(proc.triggered_message_type(), Some(2));
        assert_eq!(proc.state(), ProcedureState::Completed);
        assert!(proc.state().is_answered());
    }

    #[test]
    fn test_correlation_id_display() {
        assert_eq!(CorrelationId::new(255).to_string(), "proc-0xff");
    }
}
