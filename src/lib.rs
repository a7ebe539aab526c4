//! # wsengine - RFC 6455 WebSocket frame engine
//!
//! `wsengine` runs the WebSocket protocol over a byte stream on which the
//! HTTP upgrade has already happened. It owns everything after the
//! handshake: framing, masking, fragmentation, UTF-8 validation of text,
//! Ping/Pong and the close handshake.
//!
//! ## Features
//!
//! - **Streaming receive** - payloads are copied straight from the read
//!   buffer into the caller's buffer, one piece at a time
//! - **Full-duplex** - one send and one receive may run concurrently
//! - **Strict validation** - every protocol violation closes with the right
//!   status code and aborts
//! - **Cancellation** - every operation takes a `CancellationToken`
//! - **Keep-alive** - optional periodic Pings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use wsengine::{CloseCode, Config, MessageType, Role, WebSocket};
//!
//! # async fn run(upgraded: tokio::net::TcpStream) -> wsengine::Result<()> {
//! let ws = WebSocket::new(upgraded, Role::Server, Config::server());
//! let cancel = CancellationToken::new();
//!
//! let mut buf = vec![0u8; 4096];
//! loop {
//!     let result = ws.receive(&mut buf, &cancel).await?;
//!     if result.message_type == MessageType::Close {
//!         break;
//!     }
//!     ws.send(&buf[..result.count], result.message_type, result.end_of_message, &cancel)
//!         .await?;
//! }
//! ws.close(CloseCode::Normal, "", &cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod pool;
pub mod protocol;
pub mod random;

pub use config::{Config, Resources};
pub use connection::{ConnectionState, Role, WebSocket};
pub use error::{Error, ErrorKind, Result};
pub use message::{CloseCode, MessageType, ReceiveResult};
pub use pool::{BufferPool, SharedBufferPool};
pub use protocol::OpCode;
pub use random::{MaskSource, OsMaskSource};
