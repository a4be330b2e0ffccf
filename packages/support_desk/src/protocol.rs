//! WebSocket Protocol Types
//!
//! Every frame is a JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`; `data` is absent for events that
//! carry nothing.

use pairing_broker::{ConnectionId, Notification, RelayedMessage, Role};
use serde::{Deserialize, Serialize};

/// Events sent FROM a dashboard or customer widget TO the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Register this connection as a support executive
    RegisterExecutive,
    /// Register this connection as a client
    RegisterClient,
    /// Relay request. `role` is accepted for compatibility and ignored: the
    /// relayed copy carries the sender's registered role.
    Message(OutgoingMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub content: String,
}

impl ClientEvent {
    pub fn register_role(&self) -> Option<Role> {
        match self {
            ClientEvent::RegisterExecutive => Some(Role::Executive),
            ClientEvent::RegisterClient => Some(Role::Client),
            ClientEvent::Message(_) => None,
        }
    }
}

/// Events sent FROM the server TO a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// To an executive: the client it now serves
    ClientAssigned(ConnectionId),
    /// To a client: the executive now serving it
    ExecutiveAssigned(ConnectionId),
    /// A message relayed from the peer
    Message(RelayedMessage),
    /// The peer (whichever role) disconnected
    ClientDisconnected(ConnectionId),
}

impl From<Notification> for ServerEvent {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::Assigned {
                peer,
                peer_role: Role::Client,
            } => ServerEvent::ClientAssigned(peer),
            Notification::Assigned {
                peer,
                peer_role: Role::Executive,
            } => ServerEvent::ExecutiveAssigned(peer),
            Notification::Message(message) => ServerEvent::Message(message),
            Notification::PeerDisconnected { peer } => ServerEvent::ClientDisconnected(peer),
        }
    }
}
