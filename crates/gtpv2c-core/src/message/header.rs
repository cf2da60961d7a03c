//! GTPv2-C header and opaque message container
//!
//! The engine only ever reads the message type and reads or writes the
//! sequence number. Information elements travel as an opaque body that the
//! codec layer above this crate builds and parses.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::message::types::MessageType;

/// GTPv2-C header length (with TEID)
pub const GTPV2C_HEADER_LEN: usize = 12;

/// GTPv2-C header length (without TEID)
pub const GTPV2C_HEADER_LEN_NO_TEID: usize = 8;

/// Octets preceding the length field's coverage (flags, type, length)
const MANDATORY_PREFIX_LEN: usize = 4;

/// Largest value the 16-bit length field can announce
pub const MAX_LENGTH_FIELD: usize = u16::MAX as usize;

/// The wire carries 24 bits of sequence number
pub const SEQUENCE_NUMBER_MASK: u32 = 0x00FF_FFFF;

/// GTP version carried by every GTPv2-C header
pub const GTPV2C_VERSION: u8 = 2;

/// Accessors the transaction engine needs from a message.
///
/// Any codec can be plugged into the engine by implementing this trait; the
/// engine never looks past these four operations.
pub trait GtpMessage {
    /// Sequence number as carried on the wire
    fn sequence_number(&self) -> u32;

    /// Stamp a sequence number; implementations truncate to what the wire carries
    fn set_sequence_number(&mut self, sequence_number: u32);

    /// Message type code
    fn message_type(&self) -> u8;

    /// Serialized datagram; fails when the message cannot be represented
    /// on the wire
    fn to_bytes(&self) -> Result<Bytes>;
}

/// GTPv2-C Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtpv2cHeader {
    /// Piggybacked flag
    pub piggybacked: bool,
    /// Message type
    pub message_type: MessageType,
    /// Tunnel Endpoint Identifier, present when the T flag is set
    pub teid: Option<u32>,
    /// Sequence number (24 bits)
    sequence_number: u32,
}

impl Gtpv2cHeader {
    /// Create a header carrying a TEID
    pub fn new(message_type: MessageType, teid: u32, sequence_number: u32) -> Self {
        Self {
            piggybacked: false,
            message_type,
            teid: Some(teid),
            sequence_number: sequence_number & SEQUENCE_NUMBER_MASK,
        }
    }

    /// Create a header without TEID (path management messages)
    pub fn new_no_teid(message_type: MessageType, sequence_number: u32) -> Self {
        Self {
            piggybacked: false,
            message_type,
            teid: None,
            sequence_number: sequence_number & SEQUENCE_NUMBER_MASK,
        }
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    pub fn set_sequence_number(&mut self, sequence_number: u32) {
        self.sequence_number = sequence_number & SEQUENCE_NUMBER_MASK;
    }

    /// Flags octet: version, P and T bits
    pub fn flags(&self) -> u8 {
        let mut flags = (GTPV2C_VERSION & 0x07) << 5;
        if self.piggybacked {
            flags |= 0x10;
        }
        if self.teid.is_some() {
            flags |= 0x08;
        }
        flags
    }

    /// Header length on the wire
    pub fn header_len(&self) -> usize {
        if self.teid.is_some() {
            GTPV2C_HEADER_LEN
        } else {
            GTPV2C_HEADER_LEN_NO_TEID
        }
    }

    /// Encode the header; `body_len` is the number of IE octets that follow.
    ///
    /// Nothing is written when the length does not fit the length field.
    pub fn encode(&self, body_len: usize, buf: &mut BytesMut) -> Result<()> {
        let length = self.header_len() - MANDATORY_PREFIX_LEN + body_len;
        let Ok(length_field) = u16::try_from(length) else {
            return Err(Error::MessageTooLarge {
                length,
                max: MAX_LENGTH_FIELD,
            });
        };
        buf.put_u8(self.flags());
        buf.put_u8(self.message_type.code());
        buf.put_u16(length_field);
        if let Some(teid) = self.teid {
            buf.put_u32(teid);
        }
        // Sequence number (24 bits) + spare (8 bits)
        buf.put_u32(self.sequence_number << 8);
        Ok(())
    }

    /// Decode a header, returning it with the value of its length field
    pub fn decode(buf: &mut Bytes) -> Result<(Self, usize)> {
        if buf.remaining() < MANDATORY_PREFIX_LEN {
            return Err(Error::BufferTooShort {
                needed: MANDATORY_PREFIX_LEN,
                available: buf.remaining(),
            });
        }

        let flags = buf.get_u8();
        let version = (flags >> 5) & 0x07;
        if version != GTPV2C_VERSION {
            return Err(Error::InvalidVersion(version));
        }
        let piggybacked = flags & 0x10 != 0;
        let teid_present = flags & 0x08 != 0;

        let message_type = MessageType::from(buf.get_u8());
        let length = buf.get_u16() as usize;

        let needed = if teid_present { 8 } else { 4 };
        if buf.remaining() < needed {
            return Err(Error::BufferTooShort {
                needed,
                available: buf.remaining(),
            });
        }

        let teid = if teid_present { Some(buf.get_u32()) } else { None };
        let sequence_number = buf.get_u32() >> 8;

        Ok((
            Self {
                piggybacked,
                message_type,
                teid,
                sequence_number,
            },
            length,
        ))
    }
}

/// A GTPv2-C message: decoded header plus opaque information elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtpv2cMessage {
    pub header: Gtpv2cHeader,
    pub body: Bytes,
}

impl Gtpv2cMessage {
    /// Message with a TEID; the sequence number is stamped later by the engine
    pub fn new(message_type: MessageType, teid: u32, body: Bytes) -> Self {
        Self {
            header: Gtpv2cHeader::new(message_type, teid, 0),
            body,
        }
    }

    /// Message without TEID (Echo, Version Not Supported)
    pub fn new_no_teid(message_type: MessageType, body: Bytes) -> Self {
        Self {
            header: Gtpv2cHeader::new_no_teid(message_type, 0),
            body,
        }
    }

    pub fn kind(&self) -> MessageType {
        self.header.message_type
    }

    pub fn teid(&self) -> Option<u32> {
        self.header.teid
    }

    /// Encode header and body into one datagram
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.header.header_len() + self.body.len());
        self.header.encode(self.body.len(), &mut buf)?;
        buf.put_slice(&self.body);
        Ok(buf.freeze())
    }

    /// Decode one datagram.
    ///
    /// Trailing octets are only tolerated when the piggybacked flag announces
    /// a second message.
    pub fn decode(datagram: Bytes) -> Result<Self> {
        let total = datagram.len();
        let mut buf = datagram.clone();
        let (header, length) = Gtpv2cHeader::decode(&mut buf)?;

        let announced = MANDATORY_PREFIX_LEN + length;
        if announced < header.header_len() {
            return Err(Error::LengthMismatch { announced, actual: total });
        }
        if announced > total {
            return Err(Error::BufferTooShort {
                needed: announced,
                available: total,
            });
        }
        if announced < total && !header.piggybacked {
            return Err(Error::LengthMismatch { announced, actual: total });
        }

        let body = datagram.slice(header.header_len()..announced);
        Ok(Self { header, body })
    }
}

impl GtpMessage for Gtpv2cMessage {
    fn sequence_number(&self) -> u32 {
        self.header.sequence_number()
    }

    fn set_sequence_number(&mut self, sequence_number: u32) {
        self.header.set_sequence_number(sequence_number);
    }

    fn message_type(&self) -> u8 {
        self.header.message_type.code()
    }

    fn to_bytes(&self) -> Result<Bytes> {
        self.encode()
    }
}
