use axum::{response::IntoResponse, Json};
use kao_core::mapper;
use kao_proto::Expression;
use serde::Serialize;

/// `GET /triggers` — the vocabularies the pipeline understands, so the
/// dashboard can build its buttons without hardcoding them.
pub async fn triggers() -> impl IntoResponse {
    Json(TriggersResponse {
        source_control: mapper::source_control_events(),
        chat: mapper::chat_sentiments(),
        expressions: Expression::ALL.iter().map(|e| e.as_str()).collect(),
    })
}

#[derive(Serialize)]
struct TriggersResponse {
    source_control: &'static [&'static str],
    chat: &'static [&'static str],
    expressions: Vec<&'static str>,
}
