use axum::{
    Json,
    extract::{State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use pairing_broker::BrokerSnapshot;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::metrics::MetricsSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub server: MetricsSnapshot,
    pub broker: BrokerSnapshot,
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        server: state.metrics.snapshot(),
        broker: state.broker.snapshot().await,
    })
}

pub async fn websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let max_message_bytes = state.config.websocket.max_message_bytes;
    ws.max_message_size(max_message_bytes)
        .on_upgrade(move |socket| crate::ws::handle_socket(socket, state))
}
