//! Pairing Broker - one-to-one executive/client pairing and message relay
//!
//! This crate holds the in-memory core of a support chat broker. It has no
//! HTTP or WebSocket dependencies: a transport layer registers connections,
//! feeds their messages in, and drains each connection's outbox.
//!
//! # Example
//!
//! ```no_run
//! use pairing_broker::{BrokerHandle, ConnectionId, Notification, Role};
//!
//! #[tokio::main]
//! async fn main() {
//!     let broker = BrokerHandle::new();
//!
//!     let executive = ConnectionId::new();
//!     let (exec_tx, mut exec_rx) = tokio::sync::mpsc::unbounded_channel();
//!     broker.connect(executive.clone(), Role::Executive, exec_tx).await.unwrap();
//!
//!     let client = ConnectionId::new();
//!     let (client_tx, _client_rx) = tokio::sync::mpsc::unbounded_channel();
//!     broker.connect(client.clone(), Role::Client, client_tx).await.unwrap();
//!
//!     // The executive is told which client it was assigned
//!     if let Some(Notification::Assigned { peer, .. }) = exec_rx.recv().await {
//!         println!("assigned client {}", peer);
//!     }
//!
//!     broker.relay(&executive, "hello".to_string()).await.unwrap();
//!     broker.disconnect(&client).await.unwrap();
//! }
//! ```

pub mod allocator;
mod broker;
mod connection;
pub mod disconnect;
mod error;
pub mod registry;
pub mod relay;

pub use broker::{Broker, BrokerHandle, BrokerSnapshot};
pub use connection::{
    ConnectionId, ConnectionInfo, LifecycleState, Notification, Outbox, RelayedMessage, Role,
};
pub use error::BrokerError;
