//! Incoming frame header validation (RFC 6455 Sections 5.1-5.5).
//!
//! Checks everything that can be decided from a header alone, before any
//! payload byte is consumed:
//! - masking rules for the local role
//! - RSV bits (no extensions are negotiated at this layer)
//! - control frame size and fragmentation
//! - data frame sequencing against the message currently in progress

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::message::MessageType;
use crate::protocol::OpCode;
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Frame validator for incoming WebSocket frames.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    role: Role,
    accept_unmasked_frames: bool,
}

impl FrameValidator {
    /// Create a validator for the given local role.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            accept_unmasked_frames: false,
        }
    }

    /// Accept unmasked frames on the server side (non-RFC compliant).
    #[must_use]
    pub fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Validate a freshly parsed header.
    ///
    /// `in_progress` is the type of the fragmented message still awaiting its
    /// final frame, if any.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` - RSV bits set
    /// - `Error::UnmaskedClientFrame` / `Error::MaskedServerFrame` - masking rule broken
    /// - `Error::FragmentedControlFrame` - control frame with FIN=0
    /// - `Error::ControlFrameTooLarge` - control payload over 125 bytes
    /// - `Error::ProtocolViolation` - continuation with no message, or a new
    ///   message started before the previous one finished
    pub fn validate(&self, header: &FrameHeader, in_progress: Option<MessageType>) -> Result<()> {
        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        self.validate_masking(header.mask.is_some())?;

        if header.opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(header.payload_len));
            }
            return Ok(());
        }

        match (header.opcode, in_progress) {
            (OpCode::Continuation, None) => Err(Error::ProtocolViolation(
                "continuation frame without a message in progress".into(),
            )),
            (OpCode::Text | OpCode::Binary, Some(kind)) => Err(Error::ProtocolViolation(
                format!(
                    "{} frame received while a {kind:?} message is still in progress",
                    header.opcode
                ),
            )),
            _ => Ok(()),
        }
    }

    fn validate_masking(&self, masked: bool) -> Result<()> {
        match self.role {
            Role::Server if !masked && !self.accept_unmasked_frames => {
                Err(Error::UnmaskedClientFrame)
            }
            Role::Client if masked => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }
}
