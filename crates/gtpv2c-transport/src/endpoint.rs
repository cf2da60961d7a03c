//! GTPv2-C endpoint task
//!
//! One task owns the [`TransactionEngine`] and serializes every input it
//! reacts to: upper-layer commands, received datagrams and timer expiries.
//! Events go out on an unbounded channel so the task never waits on the
//! upper layer.
//!
//! ```text
//!   EndpointHandle ──commands──▶ ┌───────────────────┐ ──events──▶ upper layer
//!   UdpTransport ───datagrams──▶ │  endpoint task    │
//!   TokioTimerService ─fired───▶ │ (TransactionEngine)│ ──datagrams──▶ UdpTransport
//!                                └───────────────────┘
//! ```

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use epcgw_gtpv2c_core::{
    CorrelationId, Gtpv2cMessage, ReceiveOutcome, Teid, TimeoutOutcome, TimerHandle, TransactionEngine,
};

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::timer::TokioTimerService;
use crate::udp::{TransportEvent, UdpTransport};

/// Events delivered to the upper layer
#[derive(Debug, Clone)]
pub enum EndpointEvent {
    /// A peer opened a procedure; answer it with [`EndpointHandle::send_triggered`]
    InitialReceived {
        correlation_id: CorrelationId,
        message: Gtpv2cMessage,
        source: SocketAddr,
    },
    /// A peer answered a procedure this endpoint initiated
    TriggeredReceived {
        correlation_id: CorrelationId,
        message: Gtpv2cMessage,
        source: SocketAddr,
    },
    /// An initial message went unanswered after N3 retransmissions
    PeerNotResponding {
        correlation_id: CorrelationId,
        remote_endpoint: SocketAddr,
        caller_tag: Option<Teid>,
    },
    /// A procedure was removed before completing, by its cleanup timer or
    /// because its retry timer could not be rearmed
    ProcedureExpired { correlation_id: CorrelationId },
    /// The socket reported an error
    TransportError { error: String },
    /// The endpoint task stopped
    Closed,
}

enum Command {
    SendInitial {
        message: Gtpv2cMessage,
        destination: SocketAddr,
        caller_tag: Option<Teid>,
        reply: oneshot::Sender<Result<(u32, CorrelationId)>>,
    },
    SendTriggered {
        message: Gtpv2cMessage,
        correlation_id: CorrelationId,
        close: bool,
        reply: oneshot::Sender<Result<u32>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running endpoint
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    commands: mpsc::Sender<Command>,
    local_addr: SocketAddr,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::SendInitial { destination, .. } => write!(f, "SendInitial({})", destination),
            Command::SendTriggered { correlation_id, .. } => write!(f, "SendTriggered({})", correlation_id),
            Command::Shutdown { .. } => f.write_str("Shutdown"),
        }
    }
}

impl EndpointHandle {
    /// Address the endpoint socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send an initial message; the endpoint owns its retransmission
    pub async fn send_initial(
        &self,
        message: Gtpv2cMessage,
        destination: SocketAddr,
        caller_tag: Option<Teid>,
    ) -> Result<(u32, CorrelationId)> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::SendInitial {
                message,
                destination,
                caller_tag,
                reply,
            })
            .await?;
        response.await?
    }

    /// Answer procedure `correlation_id`, optionally closing it
    pub async fn send_triggered(
        &self,
        message: Gtpv2cMessage,
        correlation_id: CorrelationId,
        close: bool,
    ) -> Result<u32> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::SendTriggered {
                message,
                correlation_id,
                close,
                reply,
            })
            .await?;
        response.await?
    }

    /// Stop the endpoint, cancelling every pending procedure
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Shutdown { reply }).await?;
        response.await?;
        Ok(())
    }
}

/// Entry point binding an endpoint
pub struct Gtpv2cEndpoint;

impl Gtpv2cEndpoint {
    /// Bind the socket, start the endpoint task and return its handle with
    /// the upper-layer event stream.
    ///
    /// Retry exhaustion is reported as [`EndpointEvent::PeerNotResponding`]
    /// on the stream.
    pub async fn bind(config: EndpointConfig) -> Result<(EndpointHandle, mpsc::UnboundedReceiver<EndpointEvent>)> {
        config.validate()?;

        let (transport, transport_rx) = UdpTransport::bind(config.local_addr, config.channel_capacity).await?;
        let (timers, fired_rx) = TokioTimerService::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::channel(config.channel_capacity);

        let engine = TransactionEngine::new(config.transaction.clone(), Arc::new(transport.clone()), Box::new(timers))?;

        let local_addr = transport.local_addr();
        info!(%local_addr, "GTPv2-C endpoint started");

        let runner = EndpointRunner {
            engine,
            transport,
            events_tx,
        };
        tokio::spawn(runner.run(commands_rx, transport_rx, fired_rx));

        let handle = EndpointHandle {
            commands: commands_tx,
            local_addr,
        };
        Ok((handle, events_rx))
    }
}

struct EndpointRunner {
    engine: TransactionEngine,
    transport: UdpTransport,
    events_tx: mpsc::UnboundedSender<EndpointEvent>,
}

impl EndpointRunner {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut transport_events: mpsc::Receiver<TransportEvent>,
        mut fired: mpsc::UnboundedReceiver<TimerHandle>,
    ) {
        let mut shutdown_reply = None;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(reply) = self.handle_command(command) {
                            shutdown_reply = Some(reply);
                            break;
                        }
                    }
                    None => {
                        debug!("All endpoint handles dropped");
                        break;
                    }
                },
                event = transport_events.recv() => match event {
                    Some(TransportEvent::DatagramReceived { datagram, source }) => {
                        self.handle_datagram(datagram, source);
                    }
                    Some(TransportEvent::SendFailed { destination, error }) => {
                        self.emit(EndpointEvent::TransportError {
                            error: format!("send to {} failed: {}", destination, error),
                        });
                    }
                    Some(TransportEvent::ReceiveFailed { error }) => {
                        self.emit(EndpointEvent::TransportError { error });
                    }
                    Some(TransportEvent::Closed) | None => {
                        warn!("Transport closed underneath the endpoint");
                        break;
                    }
                },
                Some(handle) = fired.recv() => {
                    self.handle_timeout(handle);
                }
            }
        }

        let pending = self.engine.len();
        self.engine.clear();
        self.transport.close();
        info!(local_addr = %self.transport.local_addr(), pending, "GTPv2-C endpoint stopped");
        if self.events_tx.send(EndpointEvent::Closed).is_err() {
            debug!("Closed event not delivered");
        }

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    /// Serve one command; `Break` carries the reply of a shutdown request
    fn handle_command(&mut self, command: Command) -> ControlFlow<oneshot::Sender<()>> {
        trace!(?command, "Endpoint command");
        match command {
            Command::SendInitial {
                message,
                destination,
                caller_tag,
                reply,
            } => {
                let result = self.engine.send_initial(message, destination, caller_tag).map_err(Error::from);
                let _ = reply.send(result);
            }
            Command::SendTriggered {
                message,
                correlation_id,
                close,
                reply,
            } => {
                let result = self.engine.send_triggered(message, correlation_id, close).map_err(Error::from);
                let _ = reply.send(result);
            }
            Command::Shutdown { reply } => return ControlFlow::Break(reply),
        }
        ControlFlow::Continue(())
    }

    fn handle_datagram(&mut self, datagram: bytes::Bytes, source: SocketAddr) {
        let message = match Gtpv2cMessage::decode(datagram) {
            Ok(message) => message,
            Err(e) => {
                debug!(%source, error = %e, "Dropping undecodable datagram");
                return;
            }
        };

        match self.engine.on_receive(&message, source) {
            ReceiveOutcome::NewProcedure(correlation_id) => {
                self.emit(EndpointEvent::InitialReceived {
                    correlation_id,
                    message,
                    source,
                });
            }
            ReceiveOutcome::MatchedProcedure(correlation_id) => {
                self.emit(EndpointEvent::TriggeredReceived {
                    correlation_id,
                    message,
                    source,
                });
            }
            ReceiveOutcome::Discarded(reason) => {
                debug!(%source, kind = %message.kind(), %reason, "Message discarded");
            }
        }
    }

    fn handle_timeout(&mut self, handle: TimerHandle) {
        match self.engine.on_timeout(handle) {
            TimeoutOutcome::ProcedureAbortedRetryExhausted {
                correlation_id,
                caller_tag,
                remote_endpoint,
            } => {
                self.emit(EndpointEvent::PeerNotResponding {
                    correlation_id,
                    remote_endpoint,
                    caller_tag,
                });
            }
            TimeoutOutcome::ProcedureAbortedCleanup { correlation_id }
            | TimeoutOutcome::ProcedureAbortedTimerFault { correlation_id } => {
                warn!(%correlation_id, "Procedure expired before completion");
                self.emit(EndpointEvent::ProcedureExpired { correlation_id });
            }
            outcome => trace!(?outcome, "Timer handled"),
        }
    }

    fn emit(&self, event: EndpointEvent) {
        if self.events_tx.send(event).is_err() {
            error!("Endpoint event receiver dropped");
        }
    }
}
