//! Connection lifecycle states.

/// WebSocket connection state.
///
/// ```text
///            +--------> CloseSent ---------+
///            |                             v
///  Open -----+                           Closed
///            |                             ^
///            +--------> CloseReceived -----+
///
///  any state except Closed ------------> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Data may flow in both directions.
    #[default]
    Open,
    /// We sent a Close frame and are waiting for the peer's.
    CloseSent,
    /// The peer sent a Close frame; we have not answered yet.
    CloseReceived,
    /// Both Close frames were exchanged.
    Closed,
    /// Torn down without a clean close handshake.
    Aborted,
}

impl ConnectionState {
    /// Sending data frames is allowed in `Open` and `CloseReceived`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::CloseReceived)
    }

    /// Receiving is allowed in `Open` and `CloseSent`.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::CloseSent)
    }

    /// `Closed` and `Aborted` never change again.
    #[must_use]
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Aborted)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Open => "Open",
            ConnectionState::CloseSent => "CloseSent",
            ConnectionState::CloseReceived => "CloseReceived",
            ConnectionState::Closed => "Closed",
            ConnectionState::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Open);
    }

    #[test]
    fn test_can_send_in_each_state() {
        assert!(ConnectionState::Open.can_send());
        assert!(!ConnectionState::CloseSent.can_send());
        assert!(ConnectionState::CloseReceived.can_send());
        assert!(!ConnectionState::Closed.can_send());
        assert!(!ConnectionState::Aborted.can_send());
    }

    #[test]
    fn test_can_receive_in_each_state() {
        assert!(ConnectionState::Open.can_receive());
        assert!(ConnectionState::CloseSent.can_receive());
        assert!(!ConnectionState::CloseReceived.can_receive());
        assert!(!ConnectionState::Closed.can_receive());
        assert!(!ConnectionState::Aborted.can_receive());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ConnectionState::Open.is_terminal());
        assert!(!ConnectionState::CloseSent.is_terminal());
        assert!(!ConnectionState::CloseReceived.is_terminal());
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Aborted.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::CloseSent.to_string(), "CloseSent");
        assert_eq!(ConnectionState::Aborted.to_string(), "Aborted");
    }
}
