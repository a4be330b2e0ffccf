//! Disconnection Handler
//!
//! Tears down whatever a dropped connection was part of. The surviving peer
//! is told who left, returned to `unassigned` at the back of its queue, and
//! immediately offered to the allocator again.

use tracing::{info, warn};

use crate::allocator::{Pairing, PairingAllocator};
use crate::connection::{ConnectionId, Notification, Role};
use crate::error::BrokerError;
use crate::registry::ConnectionRegistry;

/// Outcome of a processed disconnect
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Teardown {
    pub role: Role,
    /// Former peer, now unassigned (or already re-paired, see `repaired`)
    pub released_peer: Option<ConnectionId>,
    /// Pairings formed by the assignment pass that follows the teardown
    pub repaired: Vec<Pairing>,
}

pub fn handle_disconnect(
    registry: &mut ConnectionRegistry,
    allocator: &mut PairingAllocator,
    id: &ConnectionId,
) -> Result<Teardown, BrokerError> {
    let info = registry.lookup(id)?;

    if let Some(peer) = &info.peer {
        if !registry.notify(peer, Notification::PeerDisconnected { peer: id.clone() }) {
            warn!(conn_id = %peer, "peer outbox closed before disconnect notice");
        }
        let ticket = allocator.issue_ticket();
        if let Some(role) = registry.release(peer, ticket) {
            allocator.enqueue(role, ticket, peer.clone());
        }
        info!(conn_id = %id, peer = %peer, "pairing torn down");
    }

    if registry.unregister(id).is_none() {
        return Err(BrokerError::NotFound(id.clone()));
    }
    if info.peer.is_none() {
        allocator.forget(info.role, registry);
    }

    let repaired = allocator.try_assign(registry);

    Ok(Teardown {
        role: info.role,
        released_peer: info.peer,
        repaired,
    })
}
