//! UDP datagram transport
//!
//! Sends are queued to a writer task so [`DatagramTransport::send_datagram`]
//! never blocks the engine; send failures come back as
//! [`TransportEvent::SendFailed`] on the event channel together with the
//! received datagrams.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, trace, warn};

use epcgw_gtpv2c_core::DatagramTransport;

use crate::error::Result;

/// Largest datagram the receive loop accepts
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Events produced by the transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A datagram arrived
    DatagramReceived { datagram: Bytes, source: SocketAddr },
    /// A queued datagram could not be sent
    SendFailed { destination: SocketAddr, error: String },
    /// Receiving failed; the loop keeps running
    ReceiveFailed { error: String },
    /// The receive loop stopped
    Closed,
}

/// UDP transport sharing one socket between a receive loop and a writer task
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpTransportInner>,
}

struct UdpTransportInner {
    local_addr: SocketAddr,
    outbound: mpsc::UnboundedSender<(Bytes, SocketAddr)>,
    receive_task: AbortHandle,
    writer_task: AbortHandle,
    closed: AtomicBool,
    events_tx: mpsc::Sender<TransportEvent>,
}

impl UdpTransport {
    /// Bind the socket and start the receive loop and the writer task
    pub async fn bind(addr: SocketAddr, channel_capacity: usize) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let (events_tx, events_rx) = mpsc::channel(channel_capacity);

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let local_addr = socket.local_addr()?;
        info!("GTPv2-C UDP transport bound to {}", local_addr);

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_loop(socket.clone(), outbound_rx, events_tx.clone())).abort_handle();
        let receive_task = tokio::spawn(receive_loop(socket, events_tx.clone())).abort_handle();

        let transport = UdpTransport {
            inner: Arc::new(UdpTransportInner {
                local_addr,
                outbound,
                receive_task,
                writer_task,
                closed: AtomicBool::new(false),
                events_tx,
            }),
        };
        Ok((transport, events_rx))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Stop both tasks; queued datagrams that were not written are dropped
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.receive_task.abort();
        self.inner.writer_task.abort();
        let _ = self.inner.events_tx.try_send(TransportEvent::Closed);
        info!("GTPv2-C UDP transport on {} closed", self.inner.local_addr);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl DatagramTransport for UdpTransport {
    fn send_datagram(&self, datagram: Bytes, destination: SocketAddr) {
        if self.is_closed() {
            debug!(%destination, "Transport closed, dropping datagram");
            return;
        }
        trace!(%destination, len = datagram.len(), "Queueing datagram");
        if self.inner.outbound.send((datagram, destination)).is_err() {
            warn!(%destination, "Writer task gone, dropping datagram");
        }
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UdpTransport({})", self.inner.local_addr)
    }
}

async fn write_loop(
    socket: Arc<UdpSocket>,
    mut outbound: mpsc::UnboundedReceiver<(Bytes, SocketAddr)>,
    events_tx: mpsc::Sender<TransportEvent>,
) {
    while let Some((datagram, destination)) = outbound.recv().await {
        match socket.send_to(&datagram, destination).await {
            Ok(sent) => trace!(%destination, sent, "Datagram sent"),
            Err(e) => {
                warn!(%destination, error = %e, "Failed to send datagram");
                let event = TransportEvent::SendFailed {
                    destination,
                    error: e.to_string(),
                };
                if events_tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("UDP writer task terminated");
}

async fn receive_loop(socket: Arc<UdpSocket>, events_tx: mpsc::Sender<TransportEvent>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let event = match socket.recv_from(&mut buf).await {
            Ok((len, source)) => {
                trace!(%source, len, "Datagram received");
                TransportEvent::DatagramReceived {
                    datagram: Bytes::copy_from_slice(&buf[..len]),
                    source,
                }
            }
            Err(e) => {
                error!("Error receiving UDP datagram: {}", e);
                TransportEvent::ReceiveFailed { error: e.to_string() }
            }
        };

        if events_tx.send(event).await.is_err() {
            break;
        }
    }
    let _ = events_tx.send(TransportEvent::Closed).await;
    info!("UDP receive loop terminated");
}
