use axum::{extract::State, response::IntoResponse, Json};
use kao_proto::{Channel, Expression};
use serde::Serialize;
use std::collections::HashMap;
use time::OffsetDateTime;

use crate::state::AppState;

/// `GET /status` — one-shot snapshot of the whole pipeline.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.scheduler.snapshot();
    let channels = state.hub.channel_stats().await;

    Json(StatusResponse {
        expression: snapshot.expression,
        playing: snapshot.playing,
        queue_length: snapshot.queue_len,
        connected_clients: state.hub.client_count().await,
        channels,
        vmc: state.vmc.as_ref().map(|vmc| {
            let status = vmc.status();
            VmcStatusResponse {
                connected: status.connected,
                host: status.host.to_string(),
                port: status.port,
                last_telemetry: status.last_telemetry,
            }
        }),
        timestamp: OffsetDateTime::now_utc(),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    expression: Expression,
    playing: bool,
    queue_length: usize,
    connected_clients: usize,
    channels: HashMap<Channel, usize>,
    /// Absent when the VMC peer is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    vmc: Option<VmcStatusResponse>,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

#[derive(Serialize)]
struct VmcStatusResponse {
    connected: bool,
    host: String,
    port: u16,
    #[serde(with = "time::serde::rfc3339::option")]
    last_telemetry: Option<OffsetDateTime>,
}
