// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! STUN Attributes
//!
//! The attribute section of a message is a sequence of type-length-value
//! records following the fixed header.  Values are stored raw; no
//! attribute-specific interpretation happens at this layer.  Each record's
//! value is padded with zeros to the next 4 byte boundary on the wire; the
//! declared length excludes the padding, the header's length field includes
//! it.
//!
//! # Examples
//!
//! ```
//! use stun_wire::attribute::{AttributeTable, AttributeType};
//!
//! let mut table = AttributeTable::new();
//! table.insert(AttributeType::Username, b"someuser".to_vec()).unwrap();
//! let attribute_data = [
//!     0x00, 0x06, 0x00, 0x08, // attribute type (0x0006) and length (0x0008)
//!     0x73, 0x6F, 0x6D, 0x65, // s o m e
//!     0x75, 0x73, 0x65, 0x72, // u s e r
//! ];
//! assert_eq!(table.to_bytes(), attribute_data);
//! ```

use byteorder::{BigEndian, ByteOrder};
use smallvec::SmallVec;
use tracing::warn;

use crate::message::{MessageHeader, StunError};

/// The type of an attribute record.
///
/// This is a closed set: a type value outside it is a hard parse error, not
/// a record to be skipped.  Every listed value has its top two bits clear,
/// mirroring the reserved-bit rule of the message header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AttributeType {
    /// MAPPED-ADDRESS, the reflexive transport address.
    MappedAddress = 0x0001,
    /// RESPONSE-ADDRESS, where to send the response (legacy).
    ResponseAddress = 0x0002,
    /// CHANGE-REQUEST, ask the server to vary its source address (legacy).
    ChangeRequest = 0x0003,
    /// SOURCE-ADDRESS, the address the response was sent from (legacy).
    SourceAddress = 0x0004,
    /// CHANGED-ADDRESS, the server's alternate address (legacy).
    ChangedAddress = 0x0005,
    /// USERNAME, the credential identifier.
    Username = 0x0006,
    /// PASSWORD, the credential secret (legacy).
    Password = 0x0007,
    /// MESSAGE-INTEGRITY, an HMAC over the message.  Stored raw; this layer
    /// performs no verification.
    MessageIntegrity = 0x0008,
    /// ERROR-CODE, the numeric error and reason phrase.
    ErrorCode = 0x0009,
    /// UNKNOWN-ATTRIBUTES, types a server did not comprehend.
    UnknownAttributes = 0x000A,
    /// REFLECTED-FROM, the address a relayed request came from (legacy).
    ReflectedFrom = 0x000B,
    /// REALM, the authentication realm.
    Realm = 0x0014,
    /// NONCE, the replay-protection token.
    Nonce = 0x0015,
    /// XOR-MAPPED-ADDRESS, the reflexive address obfuscated with the magic
    /// cookie.
    XorMappedAddress = 0x0020,
}

impl AttributeType {
    /// The integer value of this type as encoded on the wire.
    pub fn value(self) -> u16 {
        self as u16
    }

    /// Map a wire value to an [`AttributeType`].
    ///
    /// # Examples
    /// ```
    /// # use stun_wire::attribute::AttributeType;
    /// assert_eq!(
    ///     AttributeType::from_value(0x0020).unwrap(),
    ///     AttributeType::XorMappedAddress
    /// );
    /// assert!(AttributeType::from_value(0x000C).is_err());
    /// ```
    pub fn from_value(value: u16) -> Result<Self, StunError> {
        match value {
            0x0001 => Ok(AttributeType::MappedAddress),
            0x0002 => Ok(AttributeType::ResponseAddress),
            0x0003 => Ok(AttributeType::ChangeRequest),
            0x0004 => Ok(AttributeType::SourceAddress),
            0x0005 => Ok(AttributeType::ChangedAddress),
            0x0006 => Ok(AttributeType::Username),
            0x0007 => Ok(AttributeType::Password),
            0x0008 => Ok(AttributeType::MessageIntegrity),
            0x0009 => Ok(AttributeType::ErrorCode),
            0x000A => Ok(AttributeType::UnknownAttributes),
            0x000B => Ok(AttributeType::ReflectedFrom),
            0x0014 => Ok(AttributeType::Realm),
            0x0015 => Ok(AttributeType::Nonce),
            0x0020 => Ok(AttributeType::XorMappedAddress),
            other => {
                warn!("unrecognized attribute type {other:#06x}");
                Err(StunError::MalformedAttribute("unrecognized attribute type"))
            }
        }
    }

    /// A human readable name of this type.
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::MappedAddress => "MAPPED-ADDRESS",
            AttributeType::ResponseAddress => "RESPONSE-ADDRESS",
            AttributeType::ChangeRequest => "CHANGE-REQUEST",
            AttributeType::SourceAddress => "SOURCE-ADDRESS",
            AttributeType::ChangedAddress => "CHANGED-ADDRESS",
            AttributeType::Username => "USERNAME",
            AttributeType::Password => "PASSWORD",
            AttributeType::MessageIntegrity => "MESSAGE-INTEGRITY",
            AttributeType::ErrorCode => "ERROR-CODE",
            AttributeType::UnknownAttributes => "UNKNOWN-ATTRIBUTES",
            AttributeType::ReflectedFrom => "REFLECTED-FROM",
            AttributeType::Realm => "REALM",
            AttributeType::Nonce => "NONCE",
            AttributeType::XorMappedAddress => "XOR-MAPPED-ADDRESS",
        }
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#06x})", self.name(), self.value())
    }
}

fn padded_attr_len(len: usize) -> usize {
    if len % 4 == 0 {
        len
    } else {
        len + 4 - len % 4
    }
}

/// The ordered table of attribute records of one [`Message`].
///
/// Insertion order follows wire order.  A type may legally repeat on the
/// wire; this table keeps the last value under the type's first position
/// (keep-last policy).
///
/// [`Message`]: crate::message::Message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeTable {
    entries: SmallVec<[(AttributeType, Vec<u8>); 8]>,
}

impl AttributeTable {
    /// Construct an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the attribute section of `data`, a cursor from byte 20 bounded
    /// by the header's length field.
    ///
    /// Each record is a 2 byte type (top two bits zero and within the
    /// recognized set), a 2 byte declared length, that many value bytes and
    /// zero padding up to the next 4 byte boundary.  A record whose padded
    /// extent passes the section end is a bounds error; decoding is
    /// all-or-nothing.
    pub fn from_bytes(data: &[u8], header: &MessageHeader) -> Result<Self, StunError> {
        let end = MessageHeader::LENGTH + header.data_length() as usize;
        if end > data.len() {
            warn!(
                "advertised message size {} exceeds data size {}",
                end,
                data.len()
            );
            return Err(StunError::MalformedAttribute(
                "attribute section extends past the end of the buffer",
            ));
        }
        let mut table = AttributeTable::new();
        let mut cursor = MessageHeader::LENGTH;
        while cursor < end {
            if cursor + 4 > end {
                return Err(StunError::MalformedAttribute("truncated record header"));
            }
            let raw_type = BigEndian::read_u16(&data[cursor..cursor + 2]);
            if raw_type & 0xc000 != 0 {
                return Err(StunError::MalformedAttribute(
                    "top two bits of the type must be zero",
                ));
            }
            let atype = AttributeType::from_value(raw_type)?;
            let length = BigEndian::read_u16(&data[cursor + 2..cursor + 4]) as usize;
            if cursor + 4 + padded_attr_len(length) > end {
                warn!("attribute {atype} extends past the end of the section");
                return Err(StunError::MalformedAttribute(
                    "value extends past the end of the section",
                ));
            }
            table.insert(atype, data[cursor + 4..cursor + 4 + length].to_vec())?;
            cursor += 4 + padded_attr_len(length);
        }
        Ok(table)
    }

    /// Serialize the table: per entry in insertion order, the 2 byte type,
    /// 2 byte length, the value and zero padding to the 4 byte boundary.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        for (atype, value) in self.iter() {
            let mut header = [0; 4];
            BigEndian::write_u16(&mut header[0..2], atype.value());
            BigEndian::write_u16(&mut header[2..4], value.len() as u16);
            out.extend_from_slice(&header);
            out.extend_from_slice(value);
            out.resize(out.len() + padded_attr_len(value.len()) - value.len(), 0);
        }
        out
    }

    /// The total encoded size of the table in bytes, padding included.
    pub fn encoded_len(&self) -> usize {
        self.entries
            .iter()
            .map(|(_atype, value)| 4 + padded_attr_len(value.len()))
            .sum()
    }

    /// Store a value, overwriting in place any existing value of the same
    /// type.
    ///
    /// The declared length of a record and the header's length field are
    /// both 16 bits wide; a value that would overflow either is rejected
    /// with [`StunError::TooLarge`].
    pub fn insert(&mut self, atype: AttributeType, value: Vec<u8>) -> Result<(), StunError> {
        if value.len() > u16::MAX as usize {
            return Err(StunError::TooLarge {
                expected: u16::MAX as usize,
                actual: value.len(),
            });
        }
        let without_existing = self.encoded_len()
            - self
                .get(atype)
                .map_or(0, |existing| 4 + padded_attr_len(existing.len()));
        let total = without_existing + 4 + padded_attr_len(value.len());
        if total > u16::MAX as usize {
            return Err(StunError::TooLarge {
                expected: u16::MAX as usize,
                actual: total,
            });
        }
        match self.entries.iter_mut().find(|(t, _value)| *t == atype) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((atype, value)),
        }
        Ok(())
    }

    /// The value stored under `atype`, if any.
    ///
    /// # Examples
    /// ```
    /// # use stun_wire::attribute::{AttributeTable, AttributeType};
    /// let mut table = AttributeTable::new();
    /// table.insert(AttributeType::Realm, b"example.org".to_vec()).unwrap();
    /// assert_eq!(table.get(AttributeType::Realm), Some(b"example.org".as_slice()));
    /// assert_eq!(table.get(AttributeType::Nonce), None);
    /// ```
    pub fn get(&self, atype: AttributeType) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(t, _value)| *t == atype)
            .map(|(_t, value)| value.as_slice())
    }

    /// Iterate the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (AttributeType, &[u8])> {
        self.entries
            .iter()
            .map(|(atype, value)| (*atype, value.as_slice()))
    }

    /// The number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
