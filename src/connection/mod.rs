//! The frame engine and its lifecycle state machine.
//!
//! [`WebSocket`] drives an upgraded stream: it frames outgoing data, parses
//! and validates incoming frames, answers Pings and runs the close handshake.
//!
//! ## Connection Lifecycle
//!
//! 1. **Open** - data flows both ways
//! 2. **CloseSent** / **CloseReceived** - one side has sent its Close frame
//! 3. **Closed** - both Close frames exchanged
//! 4. **Aborted** - torn down by a failure, a cancellation or `abort()`

#[allow(clippy::module_inception)]
mod connection;
mod keepalive;
mod role;
mod state;

pub use connection::WebSocket;
pub use role::Role;
pub use state::ConnectionState;
