//! Error types for the WebSocket frame engine.
//!
//! Every failure the engine can report is a variant of [`Error`]. Variants fall
//! into four groups, see [`ErrorKind`]: API misuse, peer protocol violations,
//! transport failures and cancellation.

use thiserror::Error;

use crate::connection::ConnectionState;
use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller violated the API contract.
    Usage,
    /// The peer sent something RFC 6455 forbids.
    Protocol,
    /// The underlying stream failed or ended early.
    Io,
    /// The operation was cancelled or the connection aborted underneath it.
    Cancelled,
}

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Operation not permitted in the current connection state.
    #[error("Cannot {operation} while connection is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State observed when the call was made.
        state: ConnectionState,
    },

    /// A second `send` was issued while one was still in flight.
    #[error("A send operation is already in progress")]
    ConcurrentSend,

    /// A second `receive` was issued while one was still in flight.
    #[error("A receive operation is already in progress")]
    ConcurrentReceive,

    /// `send` was asked to transmit a Close message.
    #[error("Close messages must be sent with close or close_output")]
    InvalidMessageType,

    /// Close code that must not be sent in a Close frame.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Close reason does not fit in a control frame.
    #[error("Close reason too long: {0} bytes (max: 123)")]
    CloseReasonTooLong(usize),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(u64),

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// 64-bit payload length with the most significant bit set.
    #[error("Invalid payload length: {0}")]
    InvalidPayloadLength(u64),

    /// Frame sequencing or payload structure violation.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text message.
    #[error("Invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Peer sent a Close frame carrying an illegal status code.
    #[error("Peer sent invalid close code: {0}")]
    ReceivedInvalidCloseCode(u16),

    /// Incomplete frame data. Used internally while buffering headers.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// The stream failed or reached end of file before the close handshake finished.
    #[error("Connection closed prematurely: {0}")]
    ConnectionClosedPrematurely(String),

    /// The masking key source failed.
    #[error("Random source failure: {0}")]
    RandomSource(String),

    /// The operation was cancelled, or the connection was aborted while it ran.
    #[error("Operation cancelled; connection aborted")]
    Cancelled,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidState { .. }
            | Error::ConcurrentSend
            | Error::ConcurrentReceive
            | Error::InvalidMessageType
            | Error::InvalidCloseCode(_)
            | Error::CloseReasonTooLong(_) => ErrorKind::Usage,
            Error::ReservedOpcode(_)
            | Error::ReservedBitsSet
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::UnmaskedClientFrame
            | Error::MaskedServerFrame
            | Error::InvalidPayloadLength(_)
            | Error::ProtocolViolation(_)
            | Error::InvalidUtf8
            | Error::ReceivedInvalidCloseCode(_)
            | Error::IncompleteFrame { .. } => ErrorKind::Protocol,
            Error::ConnectionClosedPrematurely(_) | Error::RandomSource(_) => ErrorKind::Io,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns `true` if the peer violated the protocol.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self.kind(), ErrorKind::Protocol)
    }

    /// Status code to put in the Close frame sent in response to this error.
    ///
    /// Returns `None` for errors that are not the peer's fault.
    #[must_use]
    pub const fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::InvalidUtf8 => Some(CloseCode::InvalidPayload),
            _ if self.is_protocol() => Some(CloseCode::ProtocolError),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ConnectionClosedPrematurely(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ControlFrameTooLarge(200);
        assert_eq!(
            err.to_string(),
            "Control frame payload too large: 200 bytes (max: 125)"
        );

        let err = Error::InvalidState {
            operation: "send",
            state: ConnectionState::CloseSent,
        };
        assert_eq!(err.to_string(), "Cannot send while connection is CloseSent");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let ws_err: Error = io_err.into();
        assert!(matches!(ws_err, Error::ConnectionClosedPrematurely(ref m) if m == "pipe broken"));
        assert_eq!(ws_err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::ConcurrentReceive.kind(), ErrorKind::Usage);
        assert_eq!(Error::CloseReasonTooLong(200).kind(), ErrorKind::Usage);
        assert_eq!(Error::ReservedOpcode(0xB).kind(), ErrorKind::Protocol);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_close_code_mapping() {
        assert_eq!(
            Error::ReservedOpcode(0xB).close_code(),
            Some(CloseCode::ProtocolError)
        );
        assert_eq!(
            Error::InvalidUtf8.close_code(),
            Some(CloseCode::InvalidPayload)
        );
        assert_eq!(Error::ConcurrentSend.close_code(), None);
        assert_eq!(Error::Cancelled.close_code(), None);
    }

    #[test]
    fn test_error_clone() {
        let err = Error::InvalidUtf8;
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
