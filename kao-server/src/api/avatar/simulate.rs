use axum::{extract::State, response::IntoResponse, Json};
use kao_core::mapper::{self, EventCategory};
use kao_proto::messages::EventMetadata;
use serde::Deserialize;
use serde_json::json;

use super::AvatarApiError;
use crate::reactions::trigger_reaction;
use crate::state::AppState;

#[derive(Deserialize)]
pub(crate) struct SimulateRequest {
    /// Source-control event name, e.g. `pr_merged`.
    event: String,
    #[serde(default = "default_repo")]
    repo: String,
    #[serde(default = "default_message")]
    message: String,
}

fn default_repo() -> String {
    "test-repo".to_owned()
}

fn default_message() -> String {
    "Test trigger".to_owned()
}

/// `POST /simulate` — inject a source-control event without a webhook,
/// for exercising the reaction pipeline end to end.
pub async fn simulate(
    State(state): State<AppState>,
    Json(request): Json<SimulateRequest>,
) -> Result<impl IntoResponse, AvatarApiError> {
    if !mapper::source_control_events().contains(&request.event.as_str()) {
        return Err(AvatarApiError::UnknownName {
            field: "event",
            value: request.event,
            valid: mapper::source_control_events().to_vec(),
        });
    }

    let outcome = trigger_reaction(
        &state,
        EventCategory::SourceControl,
        &request.event,
        EventMetadata {
            repo: Some(request.repo),
            message: Some(request.message),
        },
    )
    .await;

    tracing::info!(event = request.event, "event simulated");

    Ok(Json(match outcome {
        Some(outcome) => json!({
            "success": true,
            "event": request.event,
            "expression": outcome.expression,
            "duration": outcome.duration_ms,
            "sent_to": outcome.delivered,
        }),
        None => json!({ "success": false, "event": request.event }),
    }))
}
