//! Message kinds, receive results and close codes as defined in RFC 6455.

use crate::protocol::OpCode;

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away (e.g., server shutdown, browser navigating away).
    GoingAway,
    /// Protocol error (1002). Endpoint received a malformed frame or protocol violation.
    ProtocolError,
    /// Unsupported data (1003). Endpoint received data type it cannot handle.
    UnsupportedData,
    /// Invalid payload (1007). Endpoint received a message with invalid data (e.g., non-UTF-8 in text).
    InvalidPayload,
    /// Policy violation (1008). Endpoint received a message that violates its policy.
    PolicyViolation,
    /// Message too big (1009). Endpoint received a message too large to process.
    MessageTooBig,
    /// Mandatory extension (1010). Client expected server to negotiate an extension.
    MandatoryExtension,
    /// Internal error (1011). Server encountered an unexpected condition.
    InternalError,
    /// Custom close code (3000-4999 for applications, 1012-1014 for registered codes).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code may be sent in a Close frame.
    ///
    /// Valid codes:
    /// - 1000-1003, 1007-1011: codes defined by RFC 6455
    /// - 1012-1014: ServiceRestart, TryAgainLater, BadGateway (IANA registered)
    /// - 3000-4999: Reserved for libraries/frameworks and applications
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Check if this close code is acceptable in a Close frame received from the peer.
    ///
    /// Stricter than [`is_valid`](Self::is_valid): only the codes RFC 6455 itself
    /// defines in the 1000 range are accepted, plus the open 3000-4999 range.
    #[must_use]
    pub const fn is_valid_received(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1011 | 3000..=4999)
    }

    /// Check if this close code is reserved and MUST NOT be sent in a Close frame.
    ///
    /// Reserved codes per RFC 6455 Section 7.4.1:
    /// - 1004: Reserved
    /// - 1005: No Status Received (MUST NOT be set by endpoint)
    /// - 1006: Abnormal Closure (MUST NOT be set by endpoint)
    /// - 1015: TLS Handshake (MUST NOT be set by endpoint)
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1004..=1006 | 1015)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Kind of application message carried by a receive result or a send call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// UTF-8 text.
    Text,
    /// Arbitrary bytes.
    Binary,
    /// The peer's Close frame. Only produced by `receive`.
    Close,
}

impl MessageType {
    /// Opcode of the first frame of a message of this kind.
    #[must_use]
    pub const fn opcode(self) -> OpCode {
        match self {
            MessageType::Text => OpCode::Text,
            MessageType::Binary => OpCode::Binary,
            MessageType::Close => OpCode::Close,
        }
    }

    pub(crate) const fn from_data_opcode(opcode: OpCode) -> Option<Self> {
        match opcode {
            OpCode::Text => Some(MessageType::Text),
            OpCode::Binary => Some(MessageType::Binary),
            _ => None,
        }
    }
}

/// Outcome of one `receive` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveResult {
    /// Number of payload bytes written into the caller's buffer.
    pub count: usize,
    /// Kind of message the bytes belong to.
    pub message_type: MessageType,
    /// `true` when this call delivered the last bytes of the message.
    pub end_of_message: bool,
    /// Status from the peer's Close frame, if this is a Close result carrying one.
    pub close_status: Option<CloseCode>,
    /// Reason from the peer's Close frame, if this is a Close result.
    pub close_reason: Option<String>,
}

impl ReceiveResult {
    pub(crate) fn data(count: usize, message_type: MessageType, end_of_message: bool) -> Self {
        Self {
            count,
            message_type,
            end_of_message,
            close_status: None,
            close_reason: None,
        }
    }

    pub(crate) fn close(status: Option<CloseCode>, reason: String) -> Self {
        Self {
            count: 0,
            message_type: MessageType::Close,
            end_of_message: true,
            close_status: status,
            close_reason: Some(reason),
        }
    }

    /// Returns `true` if this result reports the peer's Close frame.
    #[must_use]
    pub fn is_close(&self) -> bool {
        self.message_type == MessageType::Close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_code_from_u16() {
        assert_eq!(CloseCode::from_u16(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from_u16(1001), CloseCode::GoingAway);
        assert_eq!(CloseCode::from_u16(1002), CloseCode::ProtocolError);
        assert_eq!(CloseCode::from_u16(1003), CloseCode::UnsupportedData);
        assert_eq!(CloseCode::from_u16(1007), CloseCode::InvalidPayload);
        assert_eq!(CloseCode::from_u16(1008), CloseCode::PolicyViolation);
        assert_eq!(CloseCode::from_u16(1009), CloseCode::MessageTooBig);
        assert_eq!(CloseCode::from_u16(1010), CloseCode::MandatoryExtension);
        assert_eq!(CloseCode::from_u16(1011), CloseCode::InternalError);
        assert_eq!(CloseCode::from_u16(3000), CloseCode::Other(3000));
        assert_eq!(CloseCode::from_u16(4999), CloseCode::Other(4999));
    }

    #[test]
    fn test_close_code_as_u16() {
        assert_eq!(CloseCode::Normal.as_u16(), 1000);
        assert_eq!(CloseCode::GoingAway.as_u16(), 1001);
        assert_eq!(CloseCode::ProtocolError.as_u16(), 1002);
        assert_eq!(CloseCode::Other(3500).as_u16(), 3500);
    }

    #[test]
    fn test_close_code_validity() {
        assert!(CloseCode::Normal.is_valid());
        assert!(CloseCode::InternalError.is_valid());
        assert!(CloseCode::Other(1012).is_valid());
        assert!(CloseCode::Other(1014).is_valid());
        assert!(CloseCode::Other(3000).is_valid());
        assert!(CloseCode::Other(4999).is_valid());

        assert!(!CloseCode::Other(0).is_valid());
        assert!(!CloseCode::Other(999).is_valid());
        assert!(!CloseCode::Other(1004).is_valid());
        assert!(!CloseCode::Other(1005).is_valid());
        assert!(!CloseCode::Other(1006).is_valid());
        assert!(!CloseCode::Other(1015).is_valid());
        assert!(!CloseCode::Other(2999).is_valid());
        assert!(!CloseCode::Other(5000).is_valid());
    }

    #[test]
    fn test_close_code_received_validity() {
        for code in [1000, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 3000, 4999] {
            assert!(CloseCode::from_u16(code).is_valid_received(), "{code}");
        }
        for code in [0, 999, 1004, 1005, 1006, 1012, 1013, 1014, 1015, 1016, 2000, 2999, 5000] {
            assert!(!CloseCode::from_u16(code).is_valid_received(), "{code}");
        }
    }

    #[test]
    fn test_close_code_reserved() {
        assert!(CloseCode::Other(1004).is_reserved());
        assert!(CloseCode::Other(1005).is_reserved());
        assert!(CloseCode::Other(1006).is_reserved());
        assert!(CloseCode::Other(1015).is_reserved());

        assert!(!CloseCode::Normal.is_reserved());
        assert!(!CloseCode::Other(1012).is_reserved());
        assert!(!CloseCode::Other(3000).is_reserved());
    }

    #[test]
    fn test_message_type_opcode() {
        assert_eq!(MessageType::Text.opcode(), OpCode::Text);
        assert_eq!(MessageType::Binary.opcode(), OpCode::Binary);
        assert_eq!(
            MessageType::from_data_opcode(OpCode::Binary),
            Some(MessageType::Binary)
        );
        assert_eq!(MessageType::from_data_opcode(OpCode::Continuation), None);
        assert_eq!(MessageType::from_data_opcode(OpCode::Ping), None);
    }

    #[test]
    fn test_receive_result_constructors() {
        let data = ReceiveResult::data(2, MessageType::Text, true);
        assert!(!data.is_close());
        assert!(data.close_status.is_none());

        let close = ReceiveResult::close(Some(CloseCode::GoingAway), "bye".into());
        assert!(close.is_close());
        assert!(close.end_of_message);
        assert_eq!(close.count, 0);
        assert_eq!(close.close_reason.as_deref(), Some("bye"));
    }
}
