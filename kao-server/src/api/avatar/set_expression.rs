use axum::{extract::State, response::IntoResponse, Json};
use kao_proto::messages::ExpressionEvent;
use kao_proto::{Channel, Expression, WireBody, WireMessage};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::AvatarApiError;
use crate::state::AppState;

const DEFAULT_DURATION_MS: u64 = 2000;

#[derive(Deserialize)]
pub(crate) struct SetExpressionRequest {
    /// Expression name; validated against the known set.
    expression: String,
    /// Display duration in milliseconds.
    duration: Option<u64>,
    /// Origin label for the broadcast frame.
    trigger: Option<String>,
}

/// `POST /expression` — force an expression immediately.
///
/// Preempts whatever is playing and clears the queue, same as any
/// high-priority interrupt.
pub async fn set_expression(
    State(state): State<AppState>,
    Json(request): Json<SetExpressionRequest>,
) -> Result<impl IntoResponse, AvatarApiError> {
    let expression: Expression =
        request
            .expression
            .parse()
            .map_err(|_| AvatarApiError::UnknownName {
                field: "expression",
                value: request.expression.clone(),
                valid: Expression::ALL.iter().map(|e| e.as_str()).collect(),
            })?;
    let duration_ms = request.duration.unwrap_or(DEFAULT_DURATION_MS);

    state
        .scheduler
        .set(expression, Duration::from_millis(duration_ms))
        .await
        .map_err(|e| AvatarApiError::InvalidTask(e.to_string()))?;

    let message = WireMessage::new(WireBody::Expression(ExpressionEvent {
        expression,
        duration: duration_ms,
        trigger: Some(request.trigger.unwrap_or_else(|| "manual".to_owned())),
        metadata: None,
    }));
    let sent_to = state.hub.broadcast(Channel::Avatar, message).await;

    tracing::info!(%expression, duration_ms, sent_to, "expression set manually");

    Ok(Json(json!({
        "success": true,
        "expression": expression,
        "duration": duration_ms,
        "sent_to": sent_to,
    })))
}
