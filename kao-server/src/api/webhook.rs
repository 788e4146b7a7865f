//! `POST /webhook/github` — signed event ingress.
//!
//! Verifies the delivery signature against the raw body when a secret
//! is configured, then translates recognized event categories into
//! broadcasts and avatar reactions. Unrecognized categories are
//! accepted and ignored; a recognized category with an unparsable body
//! is a 500 with a generic error body.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kao_core::mapper::EventCategory;
use kao_proto::github::{
    repo_name, CheckRunPayload, PullRequestPayload, PushPayload,
};
use kao_proto::messages::{CheckEvent, CommitEvent, EventMetadata, PullRequestEvent};
use kao_proto::signature::{self, SIGNATURE_HEADER};
use kao_proto::{Channel, WireBody, WireMessage};
use serde_json::json;
use tracing::{info, warn};

use crate::reactions::trigger_reaction;
use crate::state::AppState;

/// GitHub's event-name header.
const EVENT_HEADER: &str = "X-GitHub-Event";

pub async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        let verified = match header {
            Some(header) => signature::verify(secret.as_bytes(), &body, header),
            None => Err(signature::SignatureError::MissingHeader),
        };
        if let Err(e) = verified {
            warn!(error = %e, "webhook delivery rejected");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid signature" })),
            )
                .into_response();
        }
    }

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_owned();

    let handled = match event.as_str() {
        "push" => handle_push(&state, &body).await,
        "pull_request" => handle_pull_request(&state, &body).await,
        "check_run" => handle_check_run(&state, &body).await,
        "ping" => {
            info!("webhook ping received");
            Ok(())
        }
        other => {
            info!(event = other, "unhandled webhook event");
            Ok(())
        }
    };

    match handled {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "event": event })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(event, error = %e, "failed to parse webhook body");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal server error" })),
            )
                .into_response()
        }
    }
}

/// Every commit in a push batch triggers its own broadcast and its own
/// reaction — no coalescing.
async fn handle_push(state: &AppState, body: &[u8]) -> Result<(), serde_json::Error> {
    let payload: PushPayload = serde_json::from_slice(body)?;
    let repo = repo_name(payload.repository.as_ref()).to_owned();

    for commit in &payload.commits {
        let message = WireMessage::new(WireBody::Commit(CommitEvent {
            repo: repo.clone(),
            message: commit.first_line().to_owned(),
            author: commit.author_name().to_owned(),
            sha: commit.short_sha().to_owned(),
            url: commit.url.clone(),
        }));
        state.hub.broadcast(Channel::Scm, message).await;

        trigger_reaction(
            state,
            EventCategory::SourceControl,
            "commit",
            EventMetadata {
                repo: Some(repo.clone()),
                message: Some(commit.first_line().to_owned()),
            },
        )
        .await;

        info!(repo, sha = commit.short_sha(), "commit received");
    }
    Ok(())
}

async fn handle_pull_request(state: &AppState, body: &[u8]) -> Result<(), serde_json::Error> {
    let payload: PullRequestPayload = serde_json::from_slice(body)?;
    let repo = repo_name(payload.repository.as_ref()).to_owned();
    let action = payload.resolved_action().to_owned();

    let message = WireMessage::new(WireBody::PullRequest(PullRequestEvent {
        repo: repo.clone(),
        title: payload.pull_request.title.clone(),
        action: action.clone(),
        number: payload.pull_request.number,
        author: payload.author_login().to_owned(),
        url: payload.pull_request.html_url.clone(),
    }));
    state.hub.broadcast(Channel::Scm, message).await;

    // Only state changes with a mapped emotional beat produce a
    // reaction; reopened/synchronized and friends fall through.
    let event = match action.as_str() {
        "merged" => Some("pr_merged"),
        "opened" => Some("pr_opened"),
        "closed" => Some("pr_closed"),
        _ => None,
    };
    if let Some(event) = event {
        trigger_reaction(
            state,
            EventCategory::SourceControl,
            event,
            EventMetadata {
                repo: Some(repo.clone()),
                message: Some(payload.pull_request.title.clone()),
            },
        )
        .await;
    }

    info!(repo, number = payload.pull_request.number, action, "pull request received");
    Ok(())
}

async fn handle_check_run(state: &AppState, body: &[u8]) -> Result<(), serde_json::Error> {
    let payload: CheckRunPayload = serde_json::from_slice(body)?;
    let repo = repo_name(payload.repository.as_ref()).to_owned();
    let check = &payload.check_run;

    let message = WireMessage::new(WireBody::Check(CheckEvent {
        repo: repo.clone(),
        name: check.name.clone(),
        status: check.status.clone(),
        conclusion: check.conclusion.clone(),
        url: check.html_url.clone(),
    }));
    state.hub.broadcast(Channel::Scm, message).await;

    if check.status == "completed" {
        let event = match check.conclusion.as_deref() {
            Some("success") => Some("test_passed"),
            Some("failure") => Some("test_failed"),
            _ => None,
        };
        if let Some(event) = event {
            trigger_reaction(
                state,
                EventCategory::SourceControl,
                event,
                EventMetadata {
                    repo: Some(repo.clone()),
                    message: Some(check.name.clone()),
                },
            )
            .await;
        }
    }

    info!(
        repo,
        name = check.name,
        status = check.status,
        conclusion = check.conclusion.as_deref().unwrap_or("pending"),
        "check run received"
    );
    Ok(())
}
