use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::allocator::{Pairing, PairingAllocator};
use crate::connection::{ConnectionId, ConnectionInfo, LifecycleState, Outbox, Role};
use crate::disconnect::{Teardown, handle_disconnect};
use crate::error::BrokerError;
use crate::registry::ConnectionRegistry;
use crate::relay::relay;

/// Point-in-time view of the broker, for stats endpoints and logs
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    pub connections: usize,
    pub waiting_executives: usize,
    pub waiting_clients: usize,
    pub active_pairings: usize,
    pub pairings_formed: u64,
    pub messages_relayed: u64,
    pub messages_dropped: u64,
}

/// Registry, allocator and counters: the whole shared state of the broker.
///
/// Every method takes `&mut self`; serialization is the caller's job (see
/// [`BrokerHandle`]).
#[derive(Debug, Default)]
pub struct Broker {
    registry: ConnectionRegistry,
    allocator: PairingAllocator,
    pairings_formed: u64,
    messages_relayed: u64,
    messages_dropped: u64,
    shut_down: bool,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and run an assignment pass
    pub fn connect(
        &mut self,
        id: ConnectionId,
        role: Role,
        outbox: Outbox,
    ) -> Result<Vec<Pairing>, BrokerError> {
        if self.shut_down {
            return Err(BrokerError::ShutDown);
        }
        let ticket = self.allocator.issue_ticket();
        self.registry.register(id.clone(), role, ticket, outbox)?;
        self.allocator.enqueue(role, ticket, id);

        let formed = self.allocator.try_assign(&mut self.registry);
        self.pairings_formed += formed.len() as u64;
        Ok(formed)
    }

    /// Relay a message to the sender's peer; returns the peer
    pub fn relay(
        &mut self,
        sender: &ConnectionId,
        content: String,
    ) -> Result<ConnectionId, BrokerError> {
        match relay(&self.registry, sender, content) {
            Ok(peer) => {
                self.messages_relayed += 1;
                Ok(peer)
            }
            Err(e) => {
                if e.is_dropped_message() {
                    self.messages_dropped += 1;
                }
                Err(e)
            }
        }
    }

    /// Process a transport disconnect
    pub fn disconnect(&mut self, id: &ConnectionId) -> Result<Teardown, BrokerError> {
        let teardown = handle_disconnect(&mut self.registry, &mut self.allocator, id)?;
        self.pairings_formed += teardown.repaired.len() as u64;
        Ok(teardown)
    }

    pub fn lookup(&self, id: &ConnectionId) -> Result<ConnectionInfo, BrokerError> {
        self.registry.lookup(id)
    }

    /// Active pairings as `(executive, client)`
    pub fn pairings(&self) -> Vec<(ConnectionId, ConnectionId)> {
        self.registry.pairings()
    }

    pub fn snapshot(&self) -> BrokerSnapshot {
        BrokerSnapshot {
            connections: self.registry.len(),
            waiting_executives: self
                .registry
                .count(Role::Executive, LifecycleState::Unassigned),
            waiting_clients: self
                .registry
                .count(Role::Client, LifecycleState::Unassigned),
            active_pairings: self
                .registry
                .count(Role::Executive, LifecycleState::Paired),
            pairings_formed: self.pairings_formed,
            messages_relayed: self.messages_relayed,
            messages_dropped: self.messages_dropped,
        }
    }

    /// Drop every connection, clear both queues and refuse further
    /// registrations.
    ///
    /// Dropping the registry entries closes every outbox, which ends the
    /// transports' writer loops. Returns the number of connections dropped.
    pub fn shutdown(&mut self) -> usize {
        self.shut_down = true;
        let dropped = self.registry.clear();
        self.allocator = PairingAllocator::new();
        dropped
    }
}

/// Cloneable handle to a [`Broker`] behind one async mutex.
///
/// All registry and pairing mutations, and relay lookups, go through this
/// single lock. Nothing inside it awaits, so it is held only briefly.
#[derive(Clone, Debug, Default)]
pub struct BrokerHandle {
    inner: Arc<Mutex<Broker>>,
}

impl BrokerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(
        &self,
        id: ConnectionId,
        role: Role,
        outbox: Outbox,
    ) -> Result<Vec<Pairing>, BrokerError> {
        self.inner.lock().await.connect(id, role, outbox)
    }

    pub async fn relay(
        &self,
        sender: &ConnectionId,
        content: String,
    ) -> Result<ConnectionId, BrokerError> {
        self.inner.lock().await.relay(sender, content)
    }

    pub async fn disconnect(&self, id: &ConnectionId) -> Result<Teardown, BrokerError> {
        self.inner.lock().await.disconnect(id)
    }

    pub async fn lookup(&self, id: &ConnectionId) -> Result<ConnectionInfo, BrokerError> {
        self.inner.lock().await.lookup(id)
    }

    pub async fn snapshot(&self) -> BrokerSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn shutdown(&self) -> usize {
        let dropped = self.inner.lock().await.shutdown();
        info!(dropped, "broker shut down");
        dropped
    }
}
