//! Tokio runtime for the GTPv2-C transaction engine
//!
//! This crate supplies the collaborators the synchronous engine in
//! `epcgw-gtpv2c-core` is written against and wires them into one task per
//! endpoint:
//!
//! - [`UdpTransport`] - datagram transport over a tokio UDP socket
//! - [`TokioTimerService`] - one sleeping task per armed timer
//! - [`Gtpv2cEndpoint`] - binds everything and hands out an
//!   [`EndpointHandle`] plus a stream of [`EndpointEvent`]s
//! - [`setup_logging`] - installs the subscriber described by the
//!   `[logging]` section of [`EndpointConfig`]
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use epcgw_gtpv2c_core::{Gtpv2cMessage, MessageType};
//! use epcgw_gtpv2c_transport::{setup_logging, EndpointConfig, EndpointEvent, Gtpv2cEndpoint};
//!
//! # async fn example() -> epcgw_gtpv2c_transport::Result<()> {
//! let config = EndpointConfig::new("0.0.0.0:2123".parse().unwrap());
//! setup_logging(&config.logging)?;
//! let (endpoint, mut events) = Gtpv2cEndpoint::bind(config).await?;
//!
//! let echo = Gtpv2cMessage::new_no_teid(MessageType::EchoRequest, Bytes::new());
//! let (_, echo_id) = endpoint.send_initial(echo, "192.0.2.1:2123".parse().unwrap(), None).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         EndpointEvent::TriggeredReceived { correlation_id, .. } if correlation_id == echo_id => break,
//!         EndpointEvent::PeerNotResponding { .. } => break,
//!         _ => {}
//!     }
//! }
//! endpoint.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod timer;
pub mod udp;

pub use config::EndpointConfig;
pub use endpoint::{EndpointEvent, EndpointHandle, Gtpv2cEndpoint};
pub use error::{Error, Result};
pub use logging::{parse_log_level, setup_logging, LoggingConfig};
pub use timer::TokioTimerService;
pub use udp::{TransportEvent, UdpTransport};
