// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! STUN transaction identifiers
//!
//! A transaction identifier is an opaque random token correlating a request
//! with its (possible) response.  The current wire layout uses a 12 byte
//! identifier following the magic cookie; the legacy layout used the full 16
//! bytes of the field with no cookie.  Both lengths are representable so
//! messages in either layout can be decoded.

use std::fmt::Write as _;

use rand::Rng;

use crate::message::StunError;

/// A source of randomness for generating transaction identifiers.
///
/// The process-wide implementation is [`SystemRandom`]; tests can substitute
/// a deterministic source.
pub trait RandomSource {
    /// Produce 96 random bits in the low bits of the returned value.  The
    /// top 32 bits are ignored.
    fn random_u96(&mut self) -> u128;
}

/// The [`RandomSource`] backed by [`rand::rng`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn random_u96(&mut self) -> u128 {
        rand::rng().random::<u128>()
    }
}

/// A unique transaction identifier for each message and its (possible)
/// response.
///
/// The variant is the format tag resolved by the message header's
/// magic-cookie heuristic: a 12 byte identifier belongs to the current wire
/// layout, a 16 byte identifier to the legacy one.  Identifiers of different
/// lengths never compare equal.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum TransactionId {
    /// The current 12 byte form.
    Current([u8; 12]),
    /// The legacy 16 byte form, kept for backward compatible decoding only.
    Legacy([u8; 16]),
}

#[allow(clippy::len_without_is_empty)]
impl TransactionId {
    /// Generate a new transaction identifier from the process-wide random
    /// source.
    ///
    /// # Examples
    /// ```
    /// # use stun_wire::transaction::TransactionId;
    /// let id = TransactionId::generate();
    /// assert_eq!(id.as_bytes().len(), 12);
    /// assert_ne!(id, TransactionId::generate());
    /// ```
    pub fn generate() -> TransactionId {
        Self::generate_with(&mut SystemRandom)
    }

    /// Generate a new transaction identifier from the provided source.  The
    /// random value is stored in network byte order.
    ///
    /// # Examples
    /// ```
    /// # use stun_wire::transaction::{RandomSource, TransactionId};
    /// struct Fixed(u128);
    /// impl RandomSource for Fixed {
    ///     fn random_u96(&mut self) -> u128 {
    ///         self.0
    ///     }
    /// }
    /// let id = TransactionId::generate_with(&mut Fixed(0x0102));
    /// assert_eq!(id.as_bytes(), [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2]);
    /// ```
    pub fn generate_with(source: &mut impl RandomSource) -> TransactionId {
        let value = source.random_u96();
        let mut id = [0; 12];
        id.copy_from_slice(&value.to_be_bytes()[4..]);
        TransactionId::Current(id)
    }

    /// Construct a transaction identifier by copying the provided bytes.
    /// Exactly 12 or exactly 16 bytes are accepted; any other length is an
    /// [`StunError::InvalidIdentifierLength`].
    ///
    /// # Examples
    /// ```
    /// # use stun_wire::transaction::TransactionId;
    /// assert!(TransactionId::from_bytes(&[0; 12]).is_ok());
    /// assert!(TransactionId::from_bytes(&[0; 16]).is_ok());
    /// assert!(TransactionId::from_bytes(&[0; 13]).is_err());
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<TransactionId, StunError> {
        match data.len() {
            12 => {
                let mut id = [0; 12];
                id.copy_from_slice(data);
                Ok(TransactionId::Current(id))
            }
            16 => {
                let mut id = [0; 16];
                id.copy_from_slice(data);
                Ok(TransactionId::Legacy(id))
            }
            other => Err(StunError::InvalidIdentifierLength(other)),
        }
    }

    /// The stored bytes, unchanged.  The identifier is opaque; only its
    /// length carries meaning.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TransactionId::Current(id) => id,
            TransactionId::Legacy(id) => id,
        }
    }

    /// The length of the identifier in bytes, 12 or 16.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether this identifier uses the legacy 16 byte form.
    pub fn is_legacy(&self) -> bool {
        matches!(self, TransactionId::Legacy(_))
    }

    /// Lowercase hex rendering of the identifier, 24 or 32 characters.
    ///
    /// # Examples
    /// ```
    /// # use stun_wire::transaction::TransactionId;
    /// let id = TransactionId::from_bytes(&[0xab; 12]).unwrap();
    /// assert_eq!(id.to_hex(), "abababababababababababab");
    /// ```
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(2 * self.len());
        for byte in self.as_bytes() {
            // infallible for String
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u128);

    impl RandomSource for Fixed {
        fn random_u96(&mut self) -> u128 {
            self.0
        }
    }

    #[test]
    fn generate_is_current_format() {
        let _log = crate::tests::test_init_log();
        let id = TransactionId::generate();
        assert_eq!(id.len(), 12);
        assert!(!id.is_legacy());
    }

    #[test]
    fn generate_twice_differs() {
        let _log = crate::tests::test_init_log();
        assert_ne!(TransactionId::generate(), TransactionId::generate());
    }

    #[test]
    fn generate_stores_network_byte_order() {
        let _log = crate::tests::test_init_log();
        let id = TransactionId::generate_with(&mut Fixed(0x0102_0304_0506_0708_090a_0b0c));
        assert_eq!(
            id.as_bytes(),
            [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12].as_slice()
        );
    }

    #[test]
    fn generate_ignores_top_32_bits() {
        let _log = crate::tests::test_init_log();
        let a = TransactionId::generate_with(&mut Fixed(0x1234));
        let b = TransactionId::generate_with(&mut Fixed(0xdead_beef_0000_0000_0000_0000_0000_1234));
        assert_eq!(a, b);
    }

    #[test]
    fn from_bytes_lengths() {
        let _log = crate::tests::test_init_log();
        assert!(!TransactionId::from_bytes(&[0; 12]).unwrap().is_legacy());
        assert!(TransactionId::from_bytes(&[0; 16]).unwrap().is_legacy());
        assert!(matches!(
            TransactionId::from_bytes(&[0; 11]),
            Err(StunError::InvalidIdentifierLength(11))
        ));
        assert!(matches!(
            TransactionId::from_bytes(&[0; 13]),
            Err(StunError::InvalidIdentifierLength(13))
        ));
        assert!(matches!(
            TransactionId::from_bytes(&[]),
            Err(StunError::InvalidIdentifierLength(0))
        ));
    }

    #[test]
    fn different_lengths_never_equal() {
        let _log = crate::tests::test_init_log();
        let short = TransactionId::from_bytes(&[0; 12]).unwrap();
        let long = TransactionId::from_bytes(&[0; 16]).unwrap();
        assert_ne!(short, long);
    }

    #[test]
    fn hex_rendering() {
        let _log = crate::tests::test_init_log();
        let id =
            TransactionId::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]).unwrap();
        assert_eq!(id.to_hex(), "0102030405060708090a0b0c");
        assert_eq!(id.to_hex().len(), 24);
        let id = TransactionId::from_bytes(&[0xff; 16]).unwrap();
        assert_eq!(id.to_hex().len(), 32);
        assert_eq!(format!("{id}"), id.to_hex());
    }
}
