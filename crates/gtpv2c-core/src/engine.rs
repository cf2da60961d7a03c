//! Transaction engine façade
//!
//! [`TransactionEngine`] composes the sequence generator, the procedure
//! table, the classifier and the timer subsystem into the four operations a
//! GTPv2-C entity drives: `send_initial`, `send_triggered`, `on_receive` and
//! `on_timeout`.
//!
//! # Procedure lifecycle
//!
//! ```text
//! outbound:  send_initial ─▶ InitialSent ─(T3)─▶ WaitingTriggered ─(T3 x N3)─▶ RetryExhausted
//!                                 │                     │
//!                                 └──── triggered ──────┴─▶ Completed ─(cleanup)─▶ released
//!
//! inbound:   on_receive(initial) ─▶ InitialReceived ─ send_triggered ─▶ TriggeredSent
//!                                         │                                  │
//!                                         └─(cleanup)─▶ aborted   released ◀─┘ (cleanup or close)
//! ```
//!
//! Every removal cancels the timers the procedure still holds, so a fire
//! notification that was already in flight resolves to
//! [`TimeoutOutcome::Ignored`].

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::classifier::{is_initial_type, is_valid_triggered};
use crate::config::TransactionConfig;
use crate::error::{Error, Result};
use crate::events::{DiscardReason, NotificationSink, NullSink, ReceiveOutcome, TimeoutOutcome};
use crate::message::GtpMessage;
use crate::procedure::{CorrelationId, Procedure, ProcedureState, Teid};
use crate::sequence::SequenceGenerator;
use crate::table::{CorrelationIdGenerator, ProcedureTable};
use crate::timer::{ProcedureTimers, TimerHandle, TimerKind, TimerService};
use crate::transport::DatagramTransport;

/// Reliable request/response engine for one GTPv2-C endpoint.
///
/// The engine is not internally synchronized: one owner drives every
/// operation, and fired timer handles must be delivered through
/// [`TransactionEngine::on_timeout`] by that same owner.
pub struct TransactionEngine {
    config: TransactionConfig,
    sequence: Arc<SequenceGenerator>,
    table: ProcedureTable,
    timers: ProcedureTimers,
    transport: Arc<dyn DatagramTransport>,
    sink: Arc<dyn NotificationSink>,
}

impl TransactionEngine {
    /// Create an engine after validating `config`.
    ///
    /// Peer-unresponsive notifications are dropped until a sink is attached
    /// with [`TransactionEngine::with_notification_sink`].
    pub fn new(
        config: TransactionConfig,
        transport: Arc<dyn DatagramTransport>,
        timers: Box<dyn TimerService>,
    ) -> Result<Self> {
        config.validate()?;

        let table = match config.max_procedures {
            Some(capacity) => ProcedureTable::with_capacity_limit(capacity),
            None => ProcedureTable::new(),
        };

        debug!(
            t3_response = ?config.t3_response,
            n3_requests = config.n3_requests,
            proc_cleanup = ?config.proc_cleanup,
            max_procedures = ?config.max_procedures,
            "Transaction engine created"
        );

        Ok(Self {
            config,
            sequence: Arc::new(SequenceGenerator::new()),
            table,
            timers: ProcedureTimers::new(timers),
            transport,
            sink: Arc::new(NullSink),
        })
    }

    /// Attach the upper-layer sink notified on retry exhaustion
    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share a correlation id generator with other engines feeding the same
    /// upper layer
    pub fn with_correlation_ids(mut self, ids: Arc<CorrelationIdGenerator>) -> Self {
        self.table = std::mem::take(&mut self.table).with_id_generator(ids);
        self
    }

    /// Share a sequence generator with other engines
    pub fn with_sequence_generator(mut self, sequence: Arc<SequenceGenerator>) -> Self {
        self.sequence = sequence;
        self
    }

    /// Send an initial message and take ownership of its retransmission.
    ///
    /// The message is stamped with a fresh sequence number; the procedure is
    /// keyed by the number as read back from the message, which is what the
    /// peer will echo. Both timers are armed before the first transmission.
    pub fn send_initial<M: GtpMessage>(
        &mut self,
        mut message: M,
        destination: SocketAddr,
        caller_tag: Option<Teid>,
    ) -> Result<(u32, CorrelationId)> {
        message.set_sequence_number(self.sequence.next());
        let sequence_number = message.sequence_number();
        let message_type = message.message_type();

        if self.table.contains(sequence_number) {
            error!(sequence_number, message_type, "Sequence number reused while a procedure is pending");
            return Err(Error::DuplicateSequence { sequence_number });
        }
        if let Some(capacity) = self.table.capacity() {
            if self.table.len() >= capacity {
                warn!(capacity, message_type, "Procedure table full, refusing initial message");
                return Err(Error::TableFull { capacity });
            }
        }
        if !is_initial_type(message_type) {
            debug!(message_type, "Sending a message type that is not a catalogued initial type");
        }

        let payload = message.to_bytes()?;
        let mut procedure = Procedure::outbound(sequence_number, message_type, payload.clone(), destination, caller_tag);

        if let Err(e) = self.arm_initial_timers(&mut procedure) {
            self.timers.cancel_all(&mut procedure);
            return Err(e);
        }
        let correlation_id = match self.table.insert(sequence_number, procedure.clone()) {
            Ok(id) => id,
            Err(e) => {
                self.timers.cancel_all(&mut procedure);
                return Err(e);
            }
        };

        info!(sequence_number, %correlation_id, message_type, %destination, "Initial message sent");
        self.transport.send_datagram(payload, destination);
        Ok((sequence_number, correlation_id))
    }

    fn arm_initial_timers(&mut self, procedure: &mut Procedure) -> Result<()> {
        self.timers.arm(procedure, TimerKind::Retry, self.config.t3_response)?;
        self.timers.arm(procedure, TimerKind::Cleanup, self.config.proc_cleanup)?;
        Ok(())
    }

    /// Send the triggered message answering procedure `correlation_id`.
    ///
    /// The message is transmitted once with the procedure's sequence number
    /// and is never retransmitted by the engine. With `close` the procedure
    /// is removed and its timers cancelled.
    pub fn send_triggered<M: GtpMessage>(
        &mut self,
        mut message: M,
        correlation_id: CorrelationId,
        close: bool,
    ) -> Result<u32> {
        let Some(procedure) = self.table.get_by_correlation_mut(correlation_id) else {
            debug!(%correlation_id, "No live procedure for triggered message, dropping it");
            return Err(Error::CorrelationNotFound(correlation_id));
        };

        let sequence_number = procedure.sequence_number;
        let destination = procedure.remote_endpoint;
        message.set_sequence_number(sequence_number);
        let message_type = message.message_type();
        let datagram = message.to_bytes()?;

        if !procedure.is_outbound() {
            if procedure.triggered_message_type.is_none() {
                procedure.triggered_message_type = Some(message_type);
            }
            procedure.state = ProcedureState::TriggeredSent;
        }

        debug!(sequence_number, %correlation_id, message_type, %destination, close, "Triggered message sent");
        self.transport.send_datagram(datagram, destination);

        if close {
            self.release(sequence_number);
        }
        Ok(sequence_number)
    }

    /// Classify an incoming message against the pending procedures.
    ///
    /// Protocol anomalies are reported as [`ReceiveOutcome::Discarded`] and
    /// never change any state.
    pub fn on_receive<M: GtpMessage>(&mut self, message: &M, source: SocketAddr) -> ReceiveOutcome {
        let sequence_number = message.sequence_number();
        let message_type = message.message_type();
        trace!(sequence_number, message_type, %source, "Classifying incoming message");

        let Some(procedure) = self.table.get_by_sequence_mut(sequence_number) else {
            return self.open_inbound(sequence_number, message_type, source);
        };
        let correlation_id = procedure.correlation_id;

        if !procedure.is_outbound() && message_type == procedure.initial_message_type {
            debug!(sequence_number, %correlation_id, message_type, "Peer retransmitted its initial message");
            return ReceiveOutcome::Discarded(DiscardReason::RetransmittedRequest);
        }
        if procedure.triggered_message_type.is_some() {
            debug!(sequence_number, %correlation_id, message_type, "Duplicate for an answered procedure");
            return ReceiveOutcome::Discarded(DiscardReason::AlreadyAnswered);
        }
        if !is_valid_triggered(procedure.initial_message_type, message_type) {
            let anomaly = Error::InvalidTriggered {
                initial: procedure.initial_message_type,
                triggered: message_type,
            };
            debug!(sequence_number, %correlation_id, %source, "Discarding: {}", anomaly);
            return ReceiveOutcome::Discarded(DiscardReason::InvalidTriggered);
        }

        if source != procedure.remote_endpoint {
            debug!(sequence_number, %source, expected = %procedure.remote_endpoint, "Triggered message from another address");
        }
        procedure.stamp_triggered(message_type);
        self.timers.cancel(procedure, TimerKind::Retry);

        debug!(sequence_number, %correlation_id, message_type, retries = procedure.retry_count, "Procedure matched");
        ReceiveOutcome::MatchedProcedure(correlation_id)
    }

    fn open_inbound(&mut self, sequence_number: u32, message_type: u8, source: SocketAddr) -> ReceiveOutcome {
        if !is_initial_type(message_type) {
            let anomaly = Error::UnclassifiableInitial {
                message_type,
                sequence_number,
            };
            debug!(%source, "Discarding: {}", anomaly);
            return ReceiveOutcome::Discarded(DiscardReason::UnclassifiableInitial);
        }
        if let Some(capacity) = self.table.capacity() {
            if self.table.len() >= capacity {
                warn!(capacity, sequence_number, message_type, %source, "Procedure table full, dropping request");
                return ReceiveOutcome::Discarded(DiscardReason::TableFull);
            }
        }

        let mut procedure = Procedure::inbound(sequence_number, message_type, source);
        if let Err(e) = self.timers.arm(&mut procedure, TimerKind::Cleanup, self.config.proc_cleanup) {
            error!(sequence_number, error = %e, "Failed to arm cleanup timer for inbound procedure");
            self.timers.cancel_all(&mut procedure);
            return ReceiveOutcome::Discarded(DiscardReason::TableFull);
        }

        match self.table.insert(sequence_number, procedure.clone()) {
            Ok(correlation_id) => {
                info!(sequence_number, %correlation_id, message_type, %source, "Inbound procedure opened");
                ReceiveOutcome::NewProcedure(correlation_id)
            }
            Err(e) => {
                warn!(sequence_number, error = %e, "Inbound procedure not inserted");
                self.timers.cancel_all(&mut procedure);
                ReceiveOutcome::Discarded(DiscardReason::TableFull)
            }
        }
    }

    /// Deliver a fired timer handle.
    ///
    /// Handles that were cancelled, already delivered or never issued by this
    /// engine are ignored.
    pub fn on_timeout(&mut self, handle: TimerHandle) -> TimeoutOutcome {
        let Some((sequence_number, kind)) = self.timers.take_fired(handle) else {
            trace!(%handle, "Ignoring stale timer expiry");
            return TimeoutOutcome::Ignored;
        };
        let Some(procedure) = self.table.get_by_sequence_mut(sequence_number) else {
            error!(%handle, sequence_number, %kind, "Timer bound to a procedure that no longer exists");
            return TimeoutOutcome::Ignored;
        };
        self.timers.clear_fired(procedure, kind, handle);

        match kind {
            TimerKind::Retry => self.retry_expired(sequence_number),
            TimerKind::Cleanup => self.cleanup_expired(sequence_number),
        }
    }

    fn retry_expired(&mut self, sequence_number: u32) -> TimeoutOutcome {
        let Some(procedure) = self.table.get_by_sequence_mut(sequence_number) else {
            return TimeoutOutcome::Ignored;
        };
        let correlation_id = procedure.correlation_id;

        if procedure.retry_count < self.config.n3_requests {
            if let Err(e) = self.timers.arm(procedure, TimerKind::Retry, self.config.t3_response) {
                error!(sequence_number, %correlation_id, error = %e, "Failed to rearm retry timer, aborting procedure");
                self.release(sequence_number);
                return TimeoutOutcome::ProcedureAbortedTimerFault { correlation_id };
            }
            procedure.retry_count += 1;
            procedure.state = ProcedureState::WaitingTriggered;

            let retry_count = procedure.retry_count;
            if let Some(payload) = procedure.retransmit_payload.clone() {
                debug!(sequence_number, %correlation_id, retry_count, "Retransmitting initial message");
                self.transport.send_datagram(payload, procedure.remote_endpoint);
            }
            return TimeoutOutcome::RetryScheduled { correlation_id, retry_count };
        }

        let Some(procedure) = self.release(sequence_number) else {
            return TimeoutOutcome::Ignored;
        };
        let outcome = TimeoutOutcome::ProcedureAbortedRetryExhausted {
            correlation_id,
            caller_tag: procedure.local_correlation_context,
            remote_endpoint: procedure.remote_endpoint,
        };
        if let Err(e) = outcome.into_result() {
            warn!(sequence_number, retries = procedure.retry_count, "{}", e);
        }
        self.sink
            .notify_peer_unresponsive(procedure.remote_endpoint, procedure.local_correlation_context, correlation_id);

        outcome
    }

    fn cleanup_expired(&mut self, sequence_number: u32) -> TimeoutOutcome {
        let Some(procedure) = self.release(sequence_number) else {
            return TimeoutOutcome::Ignored;
        };
        let correlation_id = procedure.correlation_id;

        if procedure.state.is_answered() {
            debug!(sequence_number, %correlation_id, state = %procedure.state, "Procedure released");
            TimeoutOutcome::ProcedureReleased { correlation_id }
        } else {
            debug!(sequence_number, %correlation_id, state = %procedure.state, "Cleanup timer expired before completion");
            TimeoutOutcome::ProcedureAbortedCleanup { correlation_id }
        }
    }

    /// Remove a procedure and cancel whatever timers it still holds
    fn release(&mut self, sequence_number: u32) -> Option<Procedure> {
        let mut procedure = self.table.remove_by_sequence(sequence_number)?;
        self.timers.cancel_all(&mut procedure);
        Some(procedure)
    }

    /// Remove every procedure, cancelling all timers
    pub fn clear(&mut self) {
        let sequence_numbers: Vec<u32> = self.table.iter().map(|p| p.sequence_number).collect();
        for sequence_number in sequence_numbers {
            self.release(sequence_number);
        }
        debug!("All procedures released");
    }

    /// Number of live procedures
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn procedure(&self, correlation_id: CorrelationId) -> Option<&Procedure> {
        self.table.get_by_correlation(correlation_id)
    }

    pub fn procedure_by_sequence(&self, sequence_number: u32) -> Option<&Procedure> {
        self.table.get_by_sequence(sequence_number)
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Number of timers currently armed on behalf of procedures
    pub fn armed_timers(&self) -> usize {
        self.timers.armed()
    }

    pub fn sequence_generator(&self) -> &Arc<SequenceGenerator> {
        &self.sequence
    }
}

impl std::fmt::Debug for TransactionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("config", &self.config)
            .field("procedures", &self.table.len())
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}
