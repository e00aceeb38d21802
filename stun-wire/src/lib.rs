// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! STUN message parsing and writing.
//!
//! Provides types for generating, parsing, and manipulating STUN messages in
//! either of the two historical wire layouts: the current ([RFC5389]) layout
//! with a fixed magic cookie and a 96-bit transaction identifier, and the
//! legacy ([RFC3489]) layout with a 128-bit identifier and no cookie.  A
//! single decoder accepts both; the distinction is resolved by the cookie
//! heuristic in [`message::MessageHeader::from_bytes`].
//!
//! [RFC5389]: https://tools.ietf.org/html/rfc5389
//! [RFC3489]: https://tools.ietf.org/html/rfc3489

pub mod attribute;
pub mod message;
pub mod transaction;

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static TRACING: Once = Once::new();

    pub fn test_init_log() {
        TRACING.call_once(|| {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
        });
    }
}
