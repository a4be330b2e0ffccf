//! Server metrics for observability
//!
//! Transport-side counters. Pairing and relay counts live in the broker's
//! own snapshot; both are served together by `/api/stats`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Message metrics
    /// Text frames received from clients
    pub frames_received: AtomicU64,
    /// Events written to clients
    pub events_sent: AtomicU64,
    /// Frames that did not parse as a known event
    pub malformed_frames: AtomicU64,
    /// Register events refused (connection already registered)
    pub registrations_rejected: AtomicU64,
    /// Relay requests that delivered nothing
    pub relays_dropped: AtomicU64,

    // Error metrics
    pub websocket_errors: AtomicU64,
    /// Sockets closed because the peer stopped answering pings
    pub liveness_timeouts: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_sent(&self) {
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn registration_rejected(&self) {
        self.registrations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn relay_dropped(&self) {
        self.relays_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking
    pub fn websocket_error(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn liveness_timeout(&self) {
        self.liveness_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                frames_received: self.frames_received.load(Ordering::Relaxed),
                events_sent: self.events_sent.load(Ordering::Relaxed),
                malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
                registrations_rejected: self.registrations_rejected.load(Ordering::Relaxed),
                relays_dropped: self.relays_dropped.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                websocket: self.websocket_errors.load(Ordering::Relaxed),
                liveness_timeouts: self.liveness_timeouts.load(Ordering::Relaxed),
            },
        }
    }
}

/// Snapshot of server metrics (for serialization)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub frames_received: u64,
    pub events_sent: u64,
    pub malformed_frames: u64,
    pub registrations_rejected: u64,
    pub relays_dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub websocket: u64,
    pub liveness_timeouts: u64,
}
