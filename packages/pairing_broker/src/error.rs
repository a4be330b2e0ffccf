use crate::connection::ConnectionId;

/// Errors returned by broker operations.
///
/// None of these are fatal: each concerns a single connection and the broker
/// state is left consistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// The identifier is already registered; the original entry is kept
    #[error("connection already registered: {0}")]
    DuplicateConnection(ConnectionId),

    /// The identifier is unknown (never registered or already gone)
    #[error("connection not found: {0}")]
    NotFound(ConnectionId),

    /// The sender is not paired, so there is nobody to relay to
    #[error("no active pairing for connection {0}")]
    NoActivePairing(ConnectionId),

    #[error("message content is empty")]
    EmptyMessage,

    /// The peer's transport closed before its disconnect was processed
    #[error("peer {0} is no longer reachable")]
    PeerUnavailable(ConnectionId),

    /// The broker has shut down and accepts no new connections
    #[error("broker is shut down")]
    ShutDown,
}

impl BrokerError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::DuplicateConnection(_) => "duplicate_connection",
            Self::NotFound(_) => "not_found",
            Self::NoActivePairing(_) => "no_active_pairing",
            Self::EmptyMessage => "empty_message",
            Self::PeerUnavailable(_) => "peer_unavailable",
            Self::ShutDown => "shut_down",
        }
    }

    /// Whether a message was dropped as a result of this error
    pub fn is_dropped_message(&self) -> bool {
        matches!(
            self,
            Self::NoActivePairing(_) | Self::EmptyMessage | Self::PeerUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let id = ConnectionId::from("c1");
        assert_eq!(
            BrokerError::DuplicateConnection(id.clone()).error_code(),
            "duplicate_connection"
        );
        assert_eq!(BrokerError::NotFound(id.clone()).error_code(), "not_found");
        assert_eq!(
            BrokerError::NoActivePairing(id.clone()).error_code(),
            "no_active_pairing"
        );
        assert_eq!(BrokerError::EmptyMessage.error_code(), "empty_message");
        assert_eq!(
            BrokerError::PeerUnavailable(id).error_code(),
            "peer_unavailable"
        );
        assert_eq!(BrokerError::ShutDown.error_code(), "shut_down");
    }

    #[test]
    fn test_display_includes_identifier() {
        let err = BrokerError::NoActivePairing(ConnectionId::from("exec-1"));
        assert_eq!(err.to_string(), "no active pairing for connection exec-1");
    }

    #[test]
    fn test_dropped_message_classification() {
        let id = ConnectionId::from("x");
        assert!(BrokerError::NoActivePairing(id.clone()).is_dropped_message());
        assert!(BrokerError::EmptyMessage.is_dropped_message());
        assert!(!BrokerError::NotFound(id.clone()).is_dropped_message());
        assert!(!BrokerError::DuplicateConnection(id).is_dropped_message());
        assert!(!BrokerError::ShutDown.is_dropped_message());
    }
}
