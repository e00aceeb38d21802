// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Blocking UDP transport for STUN messages.
//!
//! The codec in [`stun_wire`] is purely functional over byte buffers; this
//! crate is the thin collaborator that moves those buffers over a datagram
//! socket.  [`Server`] blocks on one datagram at a time, decodes it and logs
//! the result, dropping malformed datagrams rather than terminating.
//! [`Client`] builds a request with a freshly generated transaction
//! identifier and sends its encoding; no response handling, retransmission
//! or timers exist at this layer.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::{debug, info, warn};

use stun_wire::message::{Message, MessageClass, Method, StunError};
use stun_wire::transaction::TransactionId;

/// The largest datagram the server will accept.
const MAX_DATAGRAM: usize = 1500;

/// Errors produced while moving STUN messages over a socket.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A received datagram was not a decodable STUN message.
    #[error("parse error: {0}")]
    Parse(#[from] StunError),
}

/// A single-threaded STUN receiver: block on a datagram, decode it, log it.
/// Nothing is sent back.
#[derive(Debug)]
pub struct Server {
    socket: UdpSocket,
}

impl Server {
    /// Bind to the provided local endpoint.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> std::io::Result<Server> {
        let socket = UdpSocket::bind(addr)?;
        info!("listening on {}", socket.local_addr()?);
        Ok(Server { socket })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive and decode a single datagram.
    pub fn recv_once(&self) -> Result<(Message, SocketAddr), TransportError> {
        let mut buf = [0; MAX_DATAGRAM];
        let (len, from) = self.socket.recv_from(&mut buf)?;
        debug!("received {len} bytes from {from}");
        let msg = Message::from_bytes(&buf[..len])?;
        Ok((msg, from))
    }

    /// Run the receive loop forever.  A datagram that fails to decode is
    /// logged and skipped; only a socket error terminates the loop.
    pub fn run(&self) -> std::io::Result<()> {
        loop {
            match self.recv_once() {
                Ok((msg, from)) => info!("received from {from}: {msg}"),
                Err(TransportError::Parse(e)) => warn!("dropping malformed datagram: {e}"),
                Err(TransportError::Io(e)) => return Err(e),
            }
        }
    }
}

/// A fire-and-forget STUN sender bound to an ephemeral local port.
#[derive(Debug)]
pub struct Client {
    socket: UdpSocket,
    server: SocketAddr,
}

impl Client {
    /// Create a client that sends to the provided server endpoint.
    pub fn new(server: SocketAddr) -> std::io::Result<Client> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Client { socket, server })
    }

    /// Send a prebuilt message.
    pub fn send(&self, msg: &Message) -> Result<(), TransportError> {
        let data = msg.to_bytes();
        debug!("sending {} bytes to {}", data.len(), self.server);
        self.socket.send_to(&data, self.server)?;
        Ok(())
    }

    /// Build a request of the provided method with a freshly generated
    /// transaction identifier, send it, and return the identifier for
    /// correlating any response.
    pub fn send_request(&self, method: Method) -> Result<TransactionId, TransportError> {
        let msg = Message::new(MessageClass::Request, method);
        info!("sending to {}: {}", self.server, msg);
        self.send(&msg)?;
        Ok(msg.transaction_id())
    }
}
