//! Avatar control API handlers.
//!
//! These endpoints drive the avatar directly, bypassing the webhook
//! ingress. They are meant for the overlay dashboard and for local
//! testing of the reaction pipeline.
//!
//! # Endpoints
//!
//! - `GET  /status`     – scheduler, hub, and VMC state snapshot
//! - `GET  /triggers`   – recognized event names and expressions
//! - `POST /expression` – force an expression, preempting the queue
//! - `POST /simulate`   – inject a source-control event by name

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::state::AppState;

mod set_expression;
mod simulate;
mod status;
mod triggers;

/// Build the avatar control router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status::status))
        .route("/triggers", get(triggers::triggers))
        .route("/expression", post(set_expression::set_expression))
        .route("/simulate", post(simulate::simulate))
}

/// Errors that can occur in avatar control handlers.
#[derive(Debug)]
pub(crate) enum AvatarApiError {
    /// The request named something outside a known vocabulary; carries
    /// the offending value and the accepted set.
    UnknownName {
        field: &'static str,
        value: String,
        valid: Vec<&'static str>,
    },
    /// The scheduler rejected the request (zero duration).
    InvalidTask(String),
}

impl IntoResponse for AvatarApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AvatarApiError::UnknownName {
                field,
                value,
                valid,
            } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": format!("unknown {field}: {value}"),
                    "valid": valid,
                })),
            )
                .into_response(),
            AvatarApiError::InvalidTask(reason) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": reason })),
            )
                .into_response(),
        }
    }
}
