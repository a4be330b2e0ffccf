//! WebSocket connection handler
//!
//! One task per socket. The reader turns inbound frames into broker calls;
//! the writer drains the connection's outbox onto the socket, sends
//! keep-alive pings and closes the socket on server shutdown or when the peer
//! goes silent. When either side finishes, the connection is handed to the
//! broker's disconnection handler.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use pairing_broker::{BrokerError, ConnectionId, Notification, Outbox};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, interval_at};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::protocol::{ClientEvent, ServerEvent};

/// Ping intervals a peer may stay silent before it is disconnected
const MISSED_PINGS: u32 = 2;

/// Handle a single WebSocket connection until it closes
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = ConnectionId::new();
    let metrics = state.metrics.clone();
    metrics.connection_opened();
    info!(conn_id = %conn_id, "websocket connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The registry takes ownership of the sending half on registration.
    // Until then the reader keeps it, so the writer does not see a closed
    // outbox before the connection ever registered.
    let (outbox, mut inbox) = mpsc::unbounded_channel::<Notification>();

    // Any inbound frame (pongs included) proves the peer is still there
    let (seen_tx, seen_rx) = watch::channel(Instant::now());

    let writer_metrics = metrics.clone();
    let writer_conn = conn_id.clone();
    let cancel = state.shutdown.clone();
    let ping_interval = state.config.websocket.ping_interval;
    let mut pings = ping_ticker(ping_interval);
    let writer = async move {
        loop {
            tokio::select! {
                notification = inbox.recv() => {
                    let Some(notification) = notification else {
                        debug!(conn_id = %writer_conn, "outbox closed, closing socket");
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    };
                    let event = ServerEvent::from(notification);
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(conn_id = %writer_conn, "Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                    writer_metrics.event_sent();
                }
                _ = cancel.cancelled() => {
                    debug!(conn_id = %writer_conn, "server shutting down, closing socket");
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
                _ = next_ping(&mut pings) => {
                    if let Some(period) = ping_interval {
                        let last_seen = *seen_rx.borrow();
                        if peer_timed_out(last_seen, Instant::now(), period) {
                            writer_metrics.liveness_timeout();
                            warn!(conn_id = %writer_conn, "no frames from peer in {:?}, closing socket", period * MISSED_PINGS);
                            let _ = ws_sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    if ws_sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    };

    let reader_state = state.clone();
    let reader_conn = conn_id.clone();
    let reader = async move {
        let mut outbox = Some(outbox);
        while let Some(frame) = ws_receiver.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(e) => {
                    debug!(conn_id = %reader_conn, "WebSocket receive error: {}", e);
                    reader_state.metrics.websocket_error();
                    break;
                }
            };
            seen_tx.send_replace(Instant::now());
            match msg {
                Message::Text(text) => {
                    reader_state.metrics.frame_received();
                    match serde_json::from_str::<ClientEvent>(text.as_str()) {
                        Ok(event) => {
                            handle_event(event, &reader_conn, &mut outbox, &reader_state).await
                        }
                        Err(e) => {
                            reader_state.metrics.malformed_frame();
                            debug!(conn_id = %reader_conn, "Ignoring malformed frame: {}", e);
                        }
                    }
                }
                Message::Binary(_) => {
                    debug!(conn_id = %reader_conn, "Binary frames not supported");
                }
                Message::Close(_) => {
                    debug!(conn_id = %reader_conn, "close frame received");
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = writer => {
            debug!(conn_id = %conn_id, "writer task ended");
        }
        _ = reader => {
            debug!(conn_id = %conn_id, "reader task ended");
        }
    }

    match state.broker.disconnect(&conn_id).await {
        Ok(teardown) => {
            info!(
                conn_id = %conn_id,
                role = %teardown.role,
                released_peer = ?teardown.released_peer,
                "connection removed"
            );
        }
        Err(BrokerError::NotFound(_)) => {
            // Never registered, or already dropped by a broker shutdown
            debug!(conn_id = %conn_id, "disconnect for unregistered connection");
        }
        Err(e) => {
            warn!(conn_id = %conn_id, "Disconnect failed: {}", e);
        }
    }
    metrics.connection_closed();
    info!(conn_id = %conn_id, "websocket disconnected");
}

async fn handle_event(
    event: ClientEvent,
    conn_id: &ConnectionId,
    outbox: &mut Option<Outbox>,
    state: &AppState,
) {
    if let Some(role) = event.register_role() {
        let Some(tx) = outbox.take() else {
            state.metrics.registration_rejected();
            warn!(conn_id = %conn_id, %role, "connection already registered, ignoring");
            return;
        };
        match state.broker.connect(conn_id.clone(), role, tx).await {
            Ok(formed) => {
                info!(conn_id = %conn_id, %role, paired = !formed.is_empty(), "registered");
            }
            Err(e) => {
                state.metrics.registration_rejected();
                warn!(conn_id = %conn_id, "Registration rejected: {}", e);
            }
        }
        return;
    }

    let ClientEvent::Message(message) = event else {
        return;
    };
    match state.broker.relay(conn_id, message.content).await {
        Ok(peer) => {
            debug!(conn_id = %conn_id, peer = %peer, "message relayed");
        }
        Err(e @ BrokerError::PeerUnavailable(_)) => {
            state.metrics.relay_dropped();
            warn!(conn_id = %conn_id, "Message dropped: {}", e);
        }
        Err(e) if e.is_dropped_message() => {
            state.metrics.relay_dropped();
            debug!(conn_id = %conn_id, code = e.error_code(), "Message dropped: {}", e);
        }
        Err(e) => {
            // Sender never registered; not a relay the broker counts either
            debug!(conn_id = %conn_id, code = e.error_code(), "Message ignored: {}", e);
        }
    }
}

/// True once nothing has arrived from the peer for `MISSED_PINGS` periods
fn peer_timed_out(last_seen: Instant, now: Instant, period: Duration) -> bool {
    now.saturating_duration_since(last_seen) > period * MISSED_PINGS
}

fn ping_ticker(period: Option<Duration>) -> Option<Interval> {
    period.map(|d| interval_at(Instant::now() + d, d))
}

/// Resolves on the next ping tick, or never when pings are disabled
async fn next_ping(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
