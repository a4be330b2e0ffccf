use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique, opaque identifier for a live connection
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Assign a fresh identifier (done once, at transport connect time)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared role of a connection
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Executive,
    Client,
}

impl Role {
    /// The role a connection of this role is paired with
    pub fn counterpart(self) -> Role {
        match self {
            Role::Executive => Role::Client,
            Role::Client => Role::Executive,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Executive => "executive",
            Role::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Unassigned,
    Paired,
}

/// A message on its way to the peer, tagged with the sender's role
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RelayedMessage {
    pub role: Role,
    pub content: String,
}

/// Events pushed to a connection's outbox
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification {
    /// A pairing was formed with `peer`
    Assigned { peer: ConnectionId, peer_role: Role },
    /// A message relayed from the peer
    Message(RelayedMessage),
    /// The peer went away; the receiver is unassigned again
    PeerDisconnected { peer: ConnectionId },
}

/// Handle used to route notifications back to a connection's transport
pub type Outbox = mpsc::UnboundedSender<Notification>;

/// Read-only view of a registered connection
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub role: Role,
    pub state: LifecycleState,
    pub peer: Option<ConnectionId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_role_counterpart() {
        assert_eq!(Role::Executive.counterpart(), Role::Client);
        assert_eq!(Role::Client.counterpart(), Role::Executive);
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Executive).unwrap(), "\"executive\"");
        let role: Role = serde_json::from_str("\"client\"").unwrap();
        assert_eq!(role, Role::Client);
    }

    #[test]
    fn test_connection_id_serializes_as_plain_string() {
        let id = ConnectionId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        assert_eq!(id.to_string(), "abc");
    }
}
