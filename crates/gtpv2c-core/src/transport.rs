//! Datagram transport contract

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

/// Fire-and-forget datagram sender.
///
/// No delivery or ordering guarantee is expected. Implementations must not
/// block; failures are reported out of band.
pub trait DatagramTransport: Send + Sync + fmt::Debug {
    fn send_datagram(&self, datagram: Bytes, destination: SocketAddr);
}

impl<T: DatagramTransport + ?Sized> DatagramTransport for Arc<T> {
    fn send_datagram(&self, datagram: Bytes, destination: SocketAddr) {
        (**self).send_datagram(datagram, destination)
    }
}

/// Transport that records every datagram instead of sending it
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Bytes, SocketAddr)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Datagrams sent so far, oldest first
    pub fn sent(&self) -> Vec<(Bytes, SocketAddr)> {
        self.sent.lock().clone()
    }

    /// Take the recorded datagrams, leaving the record empty
    pub fn take(&self) -> Vec<(Bytes, SocketAddr)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl DatagramTransport for RecordingTransport {
    fn send_datagram(&self, datagram: Bytes, destination: SocketAddr) {
        self.sent.lock().push((datagram, destination));
    }
}
