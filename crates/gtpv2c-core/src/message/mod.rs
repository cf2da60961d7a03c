//! GTPv2-C message representation
//!
//! - `types` - the 3GPP TS 29.274 message type catalog
//! - `header` - header codec, the opaque [`Gtpv2cMessage`] container and the
//!   [`GtpMessage`] accessor trait the engine is written against

pub mod header;
pub mod types;

pub use header::{
    GtpMessage, Gtpv2cHeader, Gtpv2cMessage, GTPV2C_HEADER_LEN, GTPV2C_HEADER_LEN_NO_TEID,
    MAX_LENGTH_FIELD, SEQUENCE_NUMBER_MASK,
};
pub use types::MessageType;
