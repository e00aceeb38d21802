// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! STUN Messages
//!
//! Provides types for generating, parsing, and manipulating STUN messages.
//!
//! A message is a fixed 20 byte header followed by a table of
//! type-length-value attribute records.  The header carries the message
//! class, the method, the byte count of the attribute section, and the
//! transaction identifier.  Two header layouts exist on the wire: the
//! current one with a fixed magic cookie before a 12 byte identifier, and
//! the legacy one where the identifier occupies all 16 bytes after the
//! length field.  [`MessageHeader::from_bytes`] accepts both, resolving the
//! layout by comparing bytes 4..8 against [`MAGIC_COOKIE`].
//!
//! ## Examples
//!
//! ### Parse a STUN [`Message`]
//!
//! ```
//! use stun_wire::attribute::AttributeType;
//! use stun_wire::message::{Message, MessageClass, Method};
//!
//! let msg_data = [
//!     0x00, 0x01, 0x00, 0x08, // class, method and length
//!     0x21, 0x12, 0xA4, 0x42, // fixed STUN magic bytes
//!     0x00, 0x00, 0x00, 0x00, // \
//!     0x00, 0x00, 0x00, 0x00, // } transaction ID
//!     0x00, 0x00, 0x73, 0x92, // /
//!     0x00, 0x06, 0x00, 0x04, // USERNAME attribute header (type and length)
//!     0x75, 0x73, 0x65, 0x72, // u s e r
//! ];
//! let msg = Message::from_bytes(&msg_data).unwrap();
//! assert_eq!(msg.class(), MessageClass::Request);
//! assert_eq!(msg.method(), Method::Binding);
//! assert_eq!(msg.attributes().get(AttributeType::Username), Some(b"user".as_slice()));
//! ```
//!
//! ### Generate a [`Message`]
//!
//! ```
//! use stun_wire::attribute::AttributeType;
//! use stun_wire::message::{Message, MessageClass, Method};
//!
//! // Automatically generates a transaction ID.
//! let mut msg = Message::new(MessageClass::Request, Method::Binding);
//! msg.add_attribute(AttributeType::Username, b"user".to_vec()).unwrap();
//!
//! let data = msg.to_bytes();
//! assert_eq!(data.len(), 28);
//! // the header's length field covers the attribute section
//! assert_eq!(data[2..4], [0x00, 0x08]);
//! ```

use byteorder::{BigEndian, ByteOrder};
use tracing::{trace, warn};

use crate::attribute::{AttributeTable, AttributeType};
use crate::transaction::TransactionId;

/// The value of the magic cookie (in network byte order) of the current wire
/// layout.
pub const MAGIC_COOKIE: u32 = 0x2112A442;

/// Possible errors when parsing or constructing a STUN message.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StunError {
    /// A zero-length buffer was provided.
    #[error("STUN message buffer can't be empty")]
    EmptyBuffer,
    /// The fixed header is absent or violates a header invariant.
    #[error("malformed STUN header: {0}")]
    MalformedHeader(&'static str),
    /// The class bits do not name a known message class.
    #[error("unrecognized message class bits {0:#06b}")]
    InvalidClass(u8),
    /// The method byte does not name a known method.
    #[error("unrecognized method {0:#04x}")]
    InvalidMethod(u8),
    /// An attribute record is unparseable.
    #[error("malformed STUN attribute: {0}")]
    MalformedAttribute(&'static str),
    /// Too many bytes for a 16-bit length field.
    #[error("too many bytes for this data, expected at most {}, actual {}", .expected, .actual)]
    TooLarge {
        /// The maximum number of bytes.
        expected: usize,
        /// The encountered number of bytes.
        actual: usize,
    },
    /// A transaction identifier was constructed with a length that is
    /// neither 12 nor 16 bytes.
    #[error("transaction identifier must be 12 or 16 bytes, got {0}")]
    InvalidIdentifierLength(usize),
}

/// The class of a [`Message`].
///
/// There are four classes of [`Message`]s within the STUN protocol:
///
///  - A [Request][`MessageClass::Request`] expects a response of either
///    Success or Error.
///  - An [Indication][`MessageClass::Indication`] is fire and forget; no
///    response is expected.
///  - [Success][`MessageClass::Success`] indicates that a Request was
///    handled and the
///  - [Error][`MessageClass::Error`] class indicates that an error was
///    produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageClass {
    /// A request that is expecting a response of either Success, or Error.
    Request,
    /// A request that does not expect a response.
    Indication,
    /// A success response to a previous Request.
    Success,
    /// An error response to a previous Request.
    Error,
}

impl MessageClass {
    /// Returns whether this [`MessageClass`] is of a response type, i.e. is
    /// either [`MessageClass::Success`] or [`MessageClass::Error`].
    pub fn is_response(self) -> bool {
        matches!(self, MessageClass::Success | MessageClass::Error)
    }

    /// The low nibble of the first header byte encoding this class.
    pub fn to_bits(self) -> u8 {
        match self {
            MessageClass::Request => 0b0000,
            MessageClass::Indication => 0b0100,
            MessageClass::Success => 0b1000,
            MessageClass::Error => 0b1100,
        }
    }

    /// Parse a class from the low nibble of the first header byte.
    ///
    /// # Examples
    /// ```
    /// # use stun_wire::message::{MessageClass, StunError};
    /// assert_eq!(MessageClass::from_bits(0b1000).unwrap(), MessageClass::Success);
    /// assert!(matches!(
    ///     MessageClass::from_bits(0b0010),
    ///     Err(StunError::InvalidClass(0b0010))
    /// ));
    /// ```
    pub fn from_bits(bits: u8) -> Result<Self, StunError> {
        match bits {
            0b0000 => Ok(MessageClass::Request),
            0b0100 => Ok(MessageClass::Indication),
            0b1000 => Ok(MessageClass::Success),
            0b1100 => Ok(MessageClass::Error),
            other => Err(StunError::InvalidClass(other)),
        }
    }
}

/// The method of a [`Message`].  Binding is the only method this codec
/// speaks; the single byte reserved for it in the header limits future
/// methods to 8 bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Method {
    /// The binding method, usable in any message class.
    Binding = 0x01,
}

impl Method {
    /// The second header byte encoding this method.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Parse a method from the second header byte.
    pub fn from_byte(byte: u8) -> Result<Self, StunError> {
        match byte {
            0x01 => Ok(Method::Binding),
            other => Err(StunError::InvalidMethod(other)),
        }
    }

    /// A human readable name of this [`Method`].
    pub fn name(self) -> &'static str {
        match self {
            Method::Binding => "BINDING",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#04x})", self.name(), self.to_byte())
    }
}

/// The fixed length header of a STUN message.
///
/// The current/legacy layout duality lives in the [`TransactionId`] variant
/// the header carries; [`MessageHeader::magic_cookie`] reports
/// [`MAGIC_COOKIE`] for a current-format identifier and `0` for a legacy
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    class: MessageClass,
    method: Method,
    length: u16,
    transaction_id: TransactionId,
}

impl MessageHeader {
    /// The length of the STUN message header.
    pub const LENGTH: usize = 20;

    /// Construct a fresh header with a newly generated transaction
    /// identifier and a zero length field.
    pub fn new(class: MessageClass, method: Method) -> Self {
        Self::with_transaction_id(class, method, TransactionId::generate())
    }

    /// Construct a header around the provided transaction identifier.
    pub fn with_transaction_id(
        class: MessageClass,
        method: Method,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            class,
            method,
            length: 0,
            transaction_id,
        }
    }

    /// Deserialize a [`MessageHeader`].
    ///
    /// When bytes 4..8 equal [`MAGIC_COOKIE`] the transaction identifier is
    /// the 12 bytes at offset 8; any other value there means the legacy
    /// layout, whose identifier is the 16 bytes at offset 4.  A cookie
    /// mismatch is a recognized alternate format, not an error.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_wire::message::{MessageHeader, MessageClass, Method, MAGIC_COOKIE};
    /// let data = [0, 1, 0, 8, 33, 18, 164, 66, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 232];
    /// let header = MessageHeader::from_bytes(&data).unwrap();
    /// assert_eq!(header.class(), MessageClass::Request);
    /// assert_eq!(header.method(), Method::Binding);
    /// assert_eq!(header.data_length(), 8);
    /// assert_eq!(header.magic_cookie(), MAGIC_COOKIE);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self, StunError> {
        if data.len() < Self::LENGTH {
            warn!("{} bytes is too short for a message header", data.len());
            return Err(StunError::MalformedHeader("must be 20 bytes"));
        }
        if data[0] & 0xc0 != 0 {
            return Err(StunError::MalformedHeader("top two bits must be zero"));
        }
        let class = MessageClass::from_bits(data[0] & 0x0f)?;
        let method = Method::from_byte(data[1])?;
        let length = BigEndian::read_u16(&data[2..4]);
        let cookie = BigEndian::read_u32(&data[4..8]);
        let transaction_id = if cookie == MAGIC_COOKIE {
            let mut id = [0; 12];
            id.copy_from_slice(&data[8..20]);
            TransactionId::Current(id)
        } else {
            trace!(
                "cookie bytes {:#010x} are not {:#010x}, decoding the legacy layout",
                cookie,
                MAGIC_COOKIE
            );
            let mut id = [0; 16];
            id.copy_from_slice(&data[4..20]);
            TransactionId::Legacy(id)
        };
        Ok(Self {
            class,
            method,
            length,
            transaction_id,
        })
    }

    /// Serialize this header into its 20 byte wire form, big-endian
    /// throughout.
    pub fn encode(&self) -> [u8; Self::LENGTH] {
        let mut out = [0; Self::LENGTH];
        out[0] = self.class.to_bits();
        out[1] = self.method.to_byte();
        BigEndian::write_u16(&mut out[2..4], self.length);
        match &self.transaction_id {
            TransactionId::Current(id) => {
                BigEndian::write_u32(&mut out[4..8], MAGIC_COOKIE);
                out[8..20].copy_from_slice(id);
            }
            TransactionId::Legacy(id) => out[4..20].copy_from_slice(id),
        }
        out
    }

    /// The class of this header.
    pub fn class(&self) -> MessageClass {
        self.class
    }

    /// The method of this header.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The number of bytes of attribute data following this header.  Adding
    /// [`MessageHeader::LENGTH`] gives the size of the complete message.
    pub fn data_length(&self) -> u16 {
        self.length
    }

    /// Set the byte count of the attribute section that follows.
    pub fn set_data_length(&mut self, length: u16) {
        self.length = length;
    }

    /// The cookie value this header decodes to: [`MAGIC_COOKIE`] for the
    /// current layout, `0` for the legacy one.  A mismatched cookie on the
    /// wire is not preserved; the mismatch itself is the legacy signal.
    pub fn magic_cookie(&self) -> u32 {
        match self.transaction_id {
            TransactionId::Current(_) => MAGIC_COOKIE,
            TransactionId::Legacy(_) => 0,
        }
    }

    /// The [`TransactionId`] of this header.
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }
}

impl std::fmt::Display for MessageHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MessageHeader(class: {:?}, method: {}, length: {}, transaction: {})",
            self.class, self.method, self.length, self.transaction_id
        )
    }
}

/// The structure that encapsulates the entirety of a STUN message.
///
/// Composes exactly one [`MessageHeader`] and one [`AttributeTable`]
/// (possibly empty); both are exclusively owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: MessageHeader,
    attributes: AttributeTable,
}

impl Message {
    /// Create a new [`Message`] of the provided class and method with a
    /// freshly generated transaction identifier and no attributes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_wire::message::{Message, MessageClass, Method};
    /// let msg = Message::new(MessageClass::Indication, Method::Binding);
    /// assert_eq!(msg.class(), MessageClass::Indication);
    /// assert!(msg.attributes().is_empty());
    /// ```
    pub fn new(class: MessageClass, method: Method) -> Self {
        Self {
            header: MessageHeader::new(class, method),
            attributes: AttributeTable::new(),
        }
    }

    /// Create a new [`Message`] around the provided transaction identifier.
    pub fn with_transaction_id(
        class: MessageClass,
        method: Method,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            header: MessageHeader::with_transaction_id(class, method, transaction_id),
            attributes: AttributeTable::new(),
        }
    }

    /// Deserialize a [`Message`]: the header first, then the attribute
    /// section bounded by the header's length field.  Decoding is
    /// all-or-nothing; no partial message is produced on error.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_wire::message::{Message, StunError};
    /// assert!(matches!(Message::from_bytes(&[]), Err(StunError::EmptyBuffer)));
    /// ```
    #[tracing::instrument(
        name = "message_from_bytes",
        level = "trace",
        skip(data),
        fields(
            data.len = data.len()
        )
    )]
    pub fn from_bytes(data: &[u8]) -> Result<Self, StunError> {
        if data.is_empty() {
            return Err(StunError::EmptyBuffer);
        }
        let header = MessageHeader::from_bytes(data)?;
        let attributes = AttributeTable::from_bytes(data, &header)?;
        Ok(Self { header, attributes })
    }

    /// Serialize this [`Message`].  The attribute table is encoded first and
    /// the header's length field set to its byte count before the header is
    /// written.
    pub fn to_bytes(&self) -> Vec<u8> {
        let attrs = self.attributes.to_bytes();
        let mut header = self.header.clone();
        header.set_data_length(attrs.len() as u16);
        let mut out = Vec::with_capacity(MessageHeader::LENGTH + attrs.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&attrs);
        out
    }

    /// The header of this message.
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// The attribute table of this message.
    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    /// Store an attribute value, overwriting any existing value of the same
    /// type.  The header's length field tracks the encoded size of the
    /// table.
    ///
    /// # Errors
    ///
    /// Returns [`StunError::TooLarge`] when the value, or the resulting
    /// attribute section, would not fit the 16-bit header length field.
    pub fn add_attribute(&mut self, atype: AttributeType, value: Vec<u8>) -> Result<(), StunError> {
        self.attributes.insert(atype, value)?;
        self.header
            .set_data_length(self.attributes.encoded_len() as u16);
        Ok(())
    }

    /// The [`MessageClass`] of this message.
    pub fn class(&self) -> MessageClass {
        self.header.class()
    }

    /// The [`Method`] of this message.
    pub fn method(&self) -> Method {
        self.header.method()
    }

    /// The [`TransactionId`] of this message.
    pub fn transaction_id(&self) -> TransactionId {
        self.header.transaction_id()
    }

    /// Returns whether the message is a response, i.e. has a class of
    /// either Success or Error.
    pub fn is_response(&self) -> bool {
        self.class().is_response()
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Message(class: {:?}, method: {}, transaction: {}, attributes: [",
            self.class(),
            self.method(),
            self.transaction_id()
        )?;
        for (i, (atype, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {} bytes", atype, value.len())?;
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeType;

    #[test]
    fn class_bits_roundtrip() {
        let _log = crate::tests::test_init_log();
        for class in [
            MessageClass::Request,
            MessageClass::Indication,
            MessageClass::Success,
            MessageClass::Error,
        ] {
            assert_eq!(MessageClass::from_bits(class.to_bits()).unwrap(), class);
        }
    }

    #[test]
    fn class_unknown_bits() {
        let _log = crate::tests::test_init_log();
        for bits in [0b0001, 0b0010, 0b0011, 0b0101, 0b1111] {
            assert!(matches!(
                MessageClass::from_bits(bits),
                Err(StunError::InvalidClass(b)) if b == bits
            ));
        }
    }

    #[test]
    fn class_response() {
        let _log = crate::tests::test_init_log();
        assert!(!MessageClass::Request.is_response());
        assert!(!MessageClass::Indication.is_response());
        assert!(MessageClass::Success.is_response());
        assert!(MessageClass::Error.is_response());
    }

    #[test]
    fn method_unknown_byte() {
        let _log = crate::tests::test_init_log();
        assert!(matches!(
            Method::from_byte(0x02),
            Err(StunError::InvalidMethod(0x02))
        ));
    }

    #[test]
    fn header_roundtrip() {
        let _log = crate::tests::test_init_log();
        for class in [
            MessageClass::Request,
            MessageClass::Indication,
            MessageClass::Success,
            MessageClass::Error,
        ] {
            let mut header = MessageHeader::new(class, Method::Binding);
            header.set_data_length(44);
            let parsed = MessageHeader::from_bytes(&header.encode()).unwrap();
            assert_eq!(parsed, header);
        }
    }

    #[test]
    fn header_too_short() {
        let _log = crate::tests::test_init_log();
        for len in 0..MessageHeader::LENGTH {
            assert!(matches!(
                MessageHeader::from_bytes(&vec![0; len]),
                Err(StunError::MalformedHeader("must be 20 bytes"))
            ));
        }
    }

    #[test]
    fn header_reserved_bits() {
        let _log = crate::tests::test_init_log();
        for first in [0x40, 0x80, 0xc0] {
            let mut data = [0; 20];
            data[0] = first;
            data[1] = 0x01;
            assert!(matches!(
                MessageHeader::from_bytes(&data),
                Err(StunError::MalformedHeader("top two bits must be zero"))
            ));
        }
    }

    #[test]
    fn header_current_format_example() {
        let _log = crate::tests::test_init_log();
        let data = [
            0x00, 0x01, 0x00, 0x08, 0x21, 0x12, 0xA4, 0x42, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
            0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
        ];
        let header = MessageHeader::from_bytes(&data).unwrap();
        assert_eq!(header.class(), MessageClass::Request);
        assert_eq!(header.method(), Method::Binding);
        assert_eq!(header.data_length(), 8);
        assert_eq!(header.magic_cookie(), MAGIC_COOKIE);
        assert_eq!(header.transaction_id().to_hex(), "0102030405060708090a0b0c");
    }

    #[test]
    fn header_legacy_format_example() {
        let _log = crate::tests::test_init_log();
        let data = [
            0x00, 0x01, 0x00, 0x00, 0x0D, 0x0E, 0x0F, 0x10, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
            0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
        ];
        let header = MessageHeader::from_bytes(&data).unwrap();
        // the mismatched cookie is the legacy signal, not preserved data
        assert_eq!(header.magic_cookie(), 0);
        assert!(header.transaction_id().is_legacy());
        assert_eq!(
            header.transaction_id().to_hex(),
            "0d0e0f100102030405060708090a0b0c"
        );
    }

    #[test]
    fn header_legacy_roundtrip() {
        let _log = crate::tests::test_init_log();
        let id = TransactionId::from_bytes(&[0x42; 16]).unwrap();
        let header = MessageHeader::with_transaction_id(MessageClass::Request, Method::Binding, id);
        let encoded = header.encode();
        // no cookie slot in the legacy layout
        assert_eq!(&encoded[4..20], &[0x42; 16]);
        let parsed = MessageHeader::from_bytes(&encoded).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn message_empty_buffer() {
        let _log = crate::tests::test_init_log();
        let err = Message::from_bytes(&[]).unwrap_err();
        assert!(matches!(err, StunError::EmptyBuffer));
        assert_eq!(err.to_string(), "STUN message buffer can't be empty");
    }

    #[test]
    fn message_roundtrip_with_attributes() {
        let _log = crate::tests::test_init_log();
        let mut msg = Message::new(MessageClass::Request, Method::Binding);
        msg.add_attribute(AttributeType::Username, b"someuser".to_vec())
            .unwrap();
        // 6 byte value forces 2 bytes of padding
        msg.add_attribute(AttributeType::Password, b"secret".to_vec())
            .unwrap();
        let data = msg.to_bytes();
        assert_eq!(data.len() % 4, 0);
        let parsed = Message::from_bytes(&data).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(
            parsed.attributes().get(AttributeType::Password),
            Some(b"secret".as_slice())
        );
    }

    #[test]
    fn message_header_only() {
        let _log = crate::tests::test_init_log();
        let msg = Message::new(MessageClass::Indication, Method::Binding);
        let data = msg.to_bytes();
        assert_eq!(data.len(), MessageHeader::LENGTH);
        let parsed = Message::from_bytes(&data).unwrap();
        assert!(parsed.attributes().is_empty());
        assert_eq!(parsed.transaction_id(), msg.transaction_id());
    }

    #[test]
    fn message_truncated_attribute_section() {
        let _log = crate::tests::test_init_log();
        let mut msg = Message::new(MessageClass::Request, Method::Binding);
        msg.add_attribute(AttributeType::Username, b"user".to_vec())
            .unwrap();
        let mut data = msg.to_bytes();
        data.truncate(data.len() - 1);
        assert!(matches!(
            Message::from_bytes(&data),
            Err(StunError::MalformedAttribute(_))
        ));
    }

    #[test]
    fn message_display() {
        let _log = crate::tests::test_init_log();
        let id = TransactionId::from_bytes(&[0xab; 12]).unwrap();
        let mut msg = Message::with_transaction_id(MessageClass::Request, Method::Binding, id);
        msg.add_attribute(AttributeType::Username, b"user".to_vec())
            .unwrap();
        let rendered = format!("{msg}");
        assert!(rendered.contains("Request"));
        assert!(rendered.contains("BINDING"));
        assert!(rendered.contains("abababababababababababab"));
        assert!(rendered.contains("USERNAME"));
    }

    #[test]
    fn message_add_attribute_too_large() {
        let _log = crate::tests::test_init_log();
        let mut msg = Message::new(MessageClass::Request, Method::Binding);
        assert!(matches!(
            msg.add_attribute(AttributeType::Username, vec![0; u16::MAX as usize + 1]),
            Err(StunError::TooLarge { .. })
        ));
        // A rejected attribute leaves the message untouched.
        assert!(msg.attributes().is_empty());
        assert_eq!(msg.to_bytes()[2..4], [0x00, 0x00]);
    }
}
