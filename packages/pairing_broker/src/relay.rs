//! Relay Router
//!
//! Forwards a message from one side of a pairing to the other side only.

use tracing::debug;

use crate::connection::{ConnectionId, Notification, RelayedMessage};
use crate::error::BrokerError;
use crate::registry::ConnectionRegistry;

/// Forward `content` from `sender` to its peer, verbatim and exactly once.
///
/// The message is tagged with the sender's registered role. Returns the peer
/// the message was delivered to. Nothing is queued for later: a message that
/// cannot be delivered now is dropped.
pub fn relay(
    registry: &ConnectionRegistry,
    sender: &ConnectionId,
    content: String,
) -> Result<ConnectionId, BrokerError> {
    let role = registry
        .role(sender)
        .ok_or_else(|| BrokerError::NotFound(sender.clone()))?;

    if content.is_empty() {
        return Err(BrokerError::EmptyMessage);
    }

    let peer = registry
        .peer_of(sender)
        .cloned()
        .ok_or_else(|| BrokerError::NoActivePairing(sender.clone()))?;

    let delivered = registry.notify(
        &peer,
        Notification::Message(RelayedMessage { role, content }),
    );
    if !delivered {
        return Err(BrokerError::PeerUnavailable(peer));
    }

    debug!(from = %sender, to = %peer, %role, "relayed message");
    Ok(peer)
}
