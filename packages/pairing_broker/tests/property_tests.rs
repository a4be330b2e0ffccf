use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

use pairing_broker::{
    Broker, BrokerError, ConnectionId, LifecycleState, Notification, RelayedMessage, Role,
};

#[derive(Debug, Clone)]
enum Op {
    Register(Role),
    /// Index into the live connections (modulo their count)
    Disconnect(usize),
    Relay(usize),
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Executive), Just(Role::Client)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => arb_role().prop_map(Op::Register),
        2 => any::<usize>().prop_map(Op::Disconnect),
        2 => any::<usize>().prop_map(Op::Relay),
    ]
}

struct Harness {
    broker: Broker,
    live: Vec<ConnectionId>,
    inboxes: HashMap<ConnectionId, mpsc::UnboundedReceiver<Notification>>,
    next: usize,
}

impl Harness {
    fn new() -> Self {
        Self {
            broker: Broker::new(),
            live: Vec::new(),
            inboxes: HashMap::new(),
            next: 0,
        }
    }

    fn drain_all(&mut self) {
        for rx in self.inboxes.values_mut() {
            while rx.try_recv().is_ok() {}
        }
    }

    fn check_invariants(&self) -> Result<(), TestCaseError> {
        let mut seen = HashSet::new();
        for (executive, client) in self.broker.pairings() {
            // No identifier in more than one pairing
            prop_assert!(seen.insert(executive.clone()));
            prop_assert!(seen.insert(client.clone()));

            // One executive, one client
            prop_assert_eq!(self.broker.lookup(&executive).unwrap().role, Role::Executive);
            prop_assert_eq!(self.broker.lookup(&client).unwrap().role, Role::Client);
        }

        let mut waiting = HashMap::new();
        for id in &self.live {
            let info = self.broker.lookup(id).unwrap();
            match info.peer {
                Some(peer) => {
                    // Symmetry: the peer is live and points back
                    let peer_info = self.broker.lookup(&peer).unwrap();
                    prop_assert_eq!(peer_info.peer.as_ref(), Some(id));
                    prop_assert_eq!(info.state, LifecycleState::Paired);
                }
                None => {
                    prop_assert_eq!(info.state, LifecycleState::Unassigned);
                    *waiting.entry(info.role).or_insert(0usize) += 1;
                }
            }
        }

        // Assignment is eager: never a waiting executive and a waiting client at once
        prop_assert!(
            waiting.get(&Role::Executive).copied().unwrap_or(0) == 0
                || waiting.get(&Role::Client).copied().unwrap_or(0) == 0
        );

        let snap = self.broker.snapshot();
        prop_assert_eq!(snap.connections, self.live.len());
        prop_assert_eq!(snap.active_pairings, self.broker.pairings().len());
        Ok(())
    }

    fn apply(&mut self, op: Op) -> Result<(), TestCaseError> {
        match op {
            Op::Register(role) => {
                let id = ConnectionId::from(format!("conn-{}", self.next));
                self.next += 1;
                let (tx, rx) = mpsc::unbounded_channel();
                self.broker.connect(id.clone(), role, tx).unwrap();
                self.live.push(id.clone());
                self.inboxes.insert(id, rx);
            }
            Op::Disconnect(i) => {
                if self.live.is_empty() {
                    return Ok(());
                }
                let id = self.live.remove(i % self.live.len());
                let peer = self.broker.lookup(&id).unwrap().peer;
                self.drain_all();
                self.broker.disconnect(&id).unwrap();
                self.inboxes.remove(&id);

                if let Some(peer) = peer {
                    let rx = self.inboxes.get_mut(&peer).unwrap();
                    prop_assert_eq!(
                        rx.try_recv().unwrap(),
                        Notification::PeerDisconnected { peer: id.clone() }
                    );
                }
                prop_assert!(matches!(
                    self.broker.lookup(&id),
                    Err(BrokerError::NotFound(_))
                ));
            }
            Op::Relay(i) => {
                if self.live.is_empty() {
                    return Ok(());
                }
                let sender = self.live[i % self.live.len()].clone();
                let info = self.broker.lookup(&sender).unwrap();
                self.drain_all();

                let content = format!("from {sender}");
                let result = self.broker.relay(&sender, content.clone());

                for (id, rx) in self.inboxes.iter_mut() {
                    let got = rx.try_recv().ok();
                    if Some(id) == info.peer.as_ref() {
                        prop_assert_eq!(
                            got,
                            Some(Notification::Message(RelayedMessage {
                                role: info.role,
                                content: content.clone(),
                            }))
                        );
                    } else {
                        prop_assert_eq!(got, None);
                    }
                }

                match info.peer {
                    Some(peer) => prop_assert_eq!(result, Ok(peer)),
                    None => prop_assert_eq!(result, Err(BrokerError::NoActivePairing(sender))),
                }
            }
        }
        self.check_invariants()
    }
}

proptest! {
    #[test]
    fn invariants_hold_for_any_sequence(ops in proptest::collection::vec(arb_op(), 1..80)) {
        let mut harness = Harness::new();
        for op in ops {
            harness.apply(op)?;
        }
    }

    #[test]
    fn clients_are_served_in_arrival_order(n_clients in 1usize..12, n_execs in 1usize..12) {
        let mut broker = Broker::new();
        let mut keep = Vec::new();

        let clients: Vec<ConnectionId> = (0..n_clients)
            .map(|i| ConnectionId::from(format!("c{i}")))
            .collect();
        for id in &clients {
            let (tx, rx) = mpsc::unbounded_channel();
            broker.connect(id.clone(), Role::Client, tx).unwrap();
            keep.push(rx);
        }

        let mut served = Vec::new();
        for i in 0..n_execs {
            let (tx, rx) = mpsc::unbounded_channel();
            let formed = broker
                .connect(ConnectionId::from(format!("e{i}")), Role::Executive, tx)
                .unwrap();
            keep.push(rx);
            served.extend(formed.into_iter().map(|p| p.client));
        }

        let expected: Vec<ConnectionId> =
            clients.iter().take(n_execs.min(n_clients)).cloned().collect();
        prop_assert_eq!(served, expected);
    }
}
