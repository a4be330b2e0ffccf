//! Connection Registry
//!
//! Owns every live connection: its declared role, its pairing slot and the
//! outbox used to reach its transport. Other components only hold
//! identifiers and go through this map for everything else.

use std::collections::HashMap;
use tracing::{debug, trace};

use crate::connection::{
    ConnectionId, ConnectionInfo, LifecycleState, Notification, Outbox, Role,
};
use crate::error::BrokerError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Waiting for a counterpart; `ticket` names the current queue entry
    Waiting { ticket: u64 },
    Paired { peer: ConnectionId },
}

#[derive(Debug)]
struct Entry {
    role: Role,
    slot: Slot,
    outbox: Outbox,
}

/// What `unregister` removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistered {
    pub role: Role,
    /// The connection it was paired with, if it held an active pairing
    pub peer: Option<ConnectionId>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Entry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection in the `unassigned` state.
    ///
    /// `ticket` identifies the allocator queue entry the caller is about to
    /// push for this connection.
    pub fn register(
        &mut self,
        id: ConnectionId,
        role: Role,
        ticket: u64,
        outbox: Outbox,
    ) -> Result<(), BrokerError> {
        if self.connections.contains_key(&id) {
            return Err(BrokerError::DuplicateConnection(id));
        }
        debug!(conn_id = %id, %role, "registered connection");
        self.connections.insert(
            id,
            Entry {
                role,
                slot: Slot::Waiting { ticket },
                outbox,
            },
        );
        Ok(())
    }

    /// Remove a connection. Unknown identifiers return `None`.
    ///
    /// Does not touch the peer; the disconnection handler releases it.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Unregistered> {
        let entry = self.connections.remove(id)?;
        let peer = match entry.slot {
            Slot::Paired { peer } => Some(peer),
            Slot::Waiting { .. } => None,
        };
        debug!(conn_id = %id, role = %entry.role, paired = peer.is_some(), "unregistered connection");
        Some(Unregistered {
            role: entry.role,
            peer,
        })
    }

    pub fn lookup(&self, id: &ConnectionId) -> Result<ConnectionInfo, BrokerError> {
        let entry = self
            .connections
            .get(id)
            .ok_or_else(|| BrokerError::NotFound(id.clone()))?;
        let (state, peer) = match &entry.slot {
            Slot::Waiting { .. } => (LifecycleState::Unassigned, None),
            Slot::Paired { peer } => (LifecycleState::Paired, Some(peer.clone())),
        };
        Ok(ConnectionInfo {
            id: id.clone(),
            role: entry.role,
            state,
            peer,
        })
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn role(&self, id: &ConnectionId) -> Option<Role> {
        self.connections.get(id).map(|e| e.role)
    }

    pub fn peer_of(&self, id: &ConnectionId) -> Option<&ConnectionId> {
        match &self.connections.get(id)?.slot {
            Slot::Paired { peer } => Some(peer),
            Slot::Waiting { .. } => None,
        }
    }

    /// True when `id` is unassigned and its current queue entry is `ticket`
    pub fn is_waiting(&self, id: &ConnectionId, ticket: u64) -> bool {
        matches!(
            self.connections.get(id).map(|e| &e.slot),
            Some(Slot::Waiting { ticket: t }) if *t == ticket
        )
    }

    /// Point both connections at each other.
    ///
    /// Callers must have checked that both are registered and waiting.
    pub(crate) fn pair(&mut self, a: &ConnectionId, b: &ConnectionId) {
        debug_assert!(self.contains(a) && self.contains(b));
        debug_assert_ne!(self.role(a), self.role(b));
        if let Some(entry) = self.connections.get_mut(a) {
            entry.slot = Slot::Paired { peer: b.clone() };
        }
        if let Some(entry) = self.connections.get_mut(b) {
            entry.slot = Slot::Paired { peer: a.clone() };
        }
    }

    /// Return a connection to `unassigned` under a new queue ticket
    pub(crate) fn release(&mut self, id: &ConnectionId, ticket: u64) -> Option<Role> {
        let entry = self.connections.get_mut(id)?;
        entry.slot = Slot::Waiting { ticket };
        Some(entry.role)
    }

    /// Push a notification into a connection's outbox without blocking.
    ///
    /// Returns false when the connection is unknown or its transport has
    /// already dropped the receiving end.
    pub(crate) fn notify(&self, id: &ConnectionId, notification: Notification) -> bool {
        let Some(entry) = self.connections.get(id) else {
            return false;
        };
        trace!(conn_id = %id, ?notification, "notify");
        entry.outbox.send(notification).is_ok()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn count(&self, role: Role, state: LifecycleState) -> usize {
        self.connections
            .values()
            .filter(|e| e.role == role)
            .filter(|e| match state {
                LifecycleState::Unassigned => matches!(e.slot, Slot::Waiting { .. }),
                LifecycleState::Paired => matches!(e.slot, Slot::Paired { .. }),
            })
            .count()
    }

    /// Active pairings as `(executive, client)`
    pub fn pairings(&self) -> Vec<(ConnectionId, ConnectionId)> {
        self.connections
            .iter()
            .filter(|(_, e)| e.role == Role::Executive)
            .filter_map(|(id, e)| match &e.slot {
                Slot::Paired { peer } => Some((id.clone(), peer.clone())),
                Slot::Waiting { .. } => None,
            })
            .collect()
    }

    /// Drop every connection (and with it every outbox handle)
    pub fn clear(&mut self) -> usize {
        let n = self.connections.len();
        self.connections.clear();
        n
    }
}
