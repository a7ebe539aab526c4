//! Shared helpers for the integration tests.
//!
//! Connections run over an in-memory duplex pipe, so every test exercises the
//! full engine without sockets or a handshake.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;

use tokio::io::{DuplexStream, duplex};
use tokio_util::sync::CancellationToken;
use wsengine::{Config, MaskSource, MessageType, Resources, Result, Role, WebSocket};

pub type Socket = WebSocket<DuplexStream>;

/// Capacity of each direction of the in-memory pipe.
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Masking keys from a fixed pattern, for byte-exact assertions.
pub struct FixedMask(pub [u8; 4]);

impl MaskSource for FixedMask {
    fn fill(&self, buf: &mut [u8]) -> io::Result<()> {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.0[i % 4];
        }
        Ok(())
    }
}

/// A connected client/server pair with default configuration.
pub fn pair() -> (Socket, Socket) {
    pair_with(Config::client(), Config::server())
}

/// A connected client/server pair.
pub fn pair_with(client: Config, server: Config) -> (Socket, Socket) {
    let (a, b) = duplex(PIPE_CAPACITY);
    (
        WebSocket::new(a, Role::Client, client),
        WebSocket::new(b, Role::Server, server),
    )
}

/// A client engine plus the raw server end of its pipe.
pub fn raw_client(config: Config, key: [u8; 4]) -> (Socket, DuplexStream) {
    let (a, b) = duplex(PIPE_CAPACITY);
    let resources = Resources::new().with_mask_source(Arc::new(FixedMask(key)));
    (
        WebSocket::with_resources(a, Role::Client, config, resources),
        b,
    )
}

/// A server engine plus the raw client end of its pipe.
pub fn raw_server(config: Config) -> (Socket, DuplexStream) {
    let (a, b) = duplex(PIPE_CAPACITY);
    (WebSocket::new(a, Role::Server, config), b)
}

/// Encode a server-to-client frame (never masked).
pub fn server_frame(first_byte: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![first_byte];
    push_length(&mut frame, 0, payload.len());
    frame.extend_from_slice(payload);
    frame
}

/// Encode a client-to-server frame masked with `key`.
pub fn client_frame(first_byte: u8, payload: &[u8], key: [u8; 4]) -> Vec<u8> {
    let mut frame = vec![first_byte];
    push_length(&mut frame, 0x80, payload.len());
    frame.extend_from_slice(&key);
    frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
    frame
}

fn push_length(frame: &mut Vec<u8>, mask_bit: u8, len: usize) {
    if len <= 125 {
        frame.push(mask_bit | len as u8);
    } else if len <= 0xFFFF {
        frame.push(mask_bit | 126);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(mask_bit | 127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

/// Receive until `end_of_message`, concatenating the pieces.
///
/// Uses a `chunk`-byte buffer so large messages arrive in several calls.
pub async fn receive_message(ws: &Socket, chunk: usize) -> Result<(MessageType, Vec<u8>)> {
    let cancel = CancellationToken::new();
    let mut buf = vec![0u8; chunk];
    let mut message = Vec::new();
    loop {
        let result = ws.receive(&mut buf, &cancel).await?;
        message.extend_from_slice(&buf[..result.count]);
        if result.end_of_message {
            return Ok((result.message_type, message));
        }
    }
}
