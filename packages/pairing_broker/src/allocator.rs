//! Pairing Allocator
//!
//! Matches waiting clients with waiting executives, one-to-one. Each role has
//! a FIFO queue ordered by the time a connection entered `unassigned`, so the
//! longest-waiting counterpart is always at the front.
//!
//! Queue entries are `(ticket, id)`. A connection that leaves while waiting
//! leaves its entry behind; such entries are skipped when they reach the
//! front and compacted away once they outnumber the live ones.

use std::collections::VecDeque;
use tracing::{info, warn};

use crate::connection::{ConnectionId, Notification, Role};
use crate::registry::ConnectionRegistry;

/// Minimum queue length before compaction is considered
const COMPACT_THRESHOLD: usize = 32;

/// A newly formed pairing
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pairing {
    pub executive: ConnectionId,
    pub client: ConnectionId,
}

#[derive(Debug, Default)]
struct RoleQueue {
    entries: VecDeque<(u64, ConnectionId)>,
    stale: usize,
}

impl RoleQueue {
    /// Drop stale entries at the front and return the first live one
    fn front_valid(&mut self, registry: &ConnectionRegistry) -> Option<ConnectionId> {
        while let Some((ticket, id)) = self.entries.front() {
            if registry.is_waiting(id, *ticket) {
                return Some(id.clone());
            }
            self.entries.pop_front();
            self.stale = self.stale.saturating_sub(1);
        }
        None
    }

    fn compact(&mut self, registry: &ConnectionRegistry) {
        if self.entries.len() < COMPACT_THRESHOLD || self.stale * 2 <= self.entries.len() {
            return;
        }
        self.entries
            .retain(|(ticket, id)| registry.is_waiting(id, *ticket));
        self.stale = 0;
    }
}

#[derive(Debug, Default)]
pub struct PairingAllocator {
    next_ticket: u64,
    executives: RoleQueue,
    clients: RoleQueue,
}

impl PairingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_mut(&mut self, role: Role) -> &mut RoleQueue {
        match role {
            Role::Executive => &mut self.executives,
            Role::Client => &mut self.clients,
        }
    }

    /// Hand out the ticket for the next queue entry
    pub fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Put a waiting connection at the back of its role's queue
    pub fn enqueue(&mut self, role: Role, ticket: u64, id: ConnectionId) {
        self.queue_mut(role).entries.push_back((ticket, id));
    }

    /// Record that a waiting connection of `role` left the registry
    pub fn forget(&mut self, role: Role, registry: &ConnectionRegistry) {
        let queue = self.queue_mut(role);
        queue.stale += 1;
        queue.compact(registry);
    }

    /// Pair queue heads for as long as both roles have someone waiting.
    ///
    /// Both sides of each new pairing are notified of the other's identifier.
    /// Returns the pairings formed; an empty result is the normal outcome
    /// when no counterpart is present.
    pub fn try_assign(&mut self, registry: &mut ConnectionRegistry) -> Vec<Pairing> {
        let mut formed = Vec::new();

        loop {
            let Some(executive) = self.executives.front_valid(registry) else {
                break;
            };
            let Some(client) = self.clients.front_valid(registry) else {
                break;
            };
            self.executives.entries.pop_front();
            self.clients.entries.pop_front();

            registry.pair(&executive, &client);
            info!(executive = %executive, client = %client, "pairing formed");

            if !registry.notify(
                &executive,
                Notification::Assigned {
                    peer: client.clone(),
                    peer_role: Role::Client,
                },
            ) {
                warn!(conn_id = %executive, "executive outbox closed before assignment");
            }
            if !registry.notify(
                &client,
                Notification::Assigned {
                    peer: executive.clone(),
                    peer_role: Role::Executive,
                },
            ) {
                warn!(conn_id = %client, "client outbox closed before assignment");
            }

            formed.push(Pairing { executive, client });
        }

        formed
    }

    /// Number of entries currently queued for `role`, stale ones included
    pub fn queued(&self, role: Role) -> usize {
        match role {
            Role::Executive => self.executives.entries.len(),
            Role::Client => self.clients.entries.len(),
        }
    }
}
