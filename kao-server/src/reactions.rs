//! Glue between event sources and the avatar pipeline.
//!
//! `trigger_reaction` is the single path every ingress (webhook, control
//! API, future chat bridge) uses: map the event, queue the resulting
//! tasks, and announce the leading task on the avatar channel. The
//! scheduler's own change stream is forwarded separately by
//! [`spawn_change_forwarder`] so overlay clients also see playback
//! transitions and returns to idle.

use crate::state::AppState;
use kao_core::mapper::{self, EventCategory};
use kao_core::vmc;
use kao_proto::messages::{EventMetadata, ExpressionEvent};
use kao_proto::{Channel, Expression, WireBody, WireMessage};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a triggered reaction resolved to.
pub struct ReactionOutcome {
    pub expression: Expression,
    pub duration_ms: u64,
    /// Clients the announcement reached.
    pub delivered: usize,
}

/// Map `event` and feed the pipeline.
///
/// Returns `None` only when the mapping normalizes to an empty task
/// list, which the static tables never produce.
pub async fn trigger_reaction(
    state: &AppState,
    category: EventCategory,
    event: &str,
    metadata: EventMetadata,
) -> Option<ReactionOutcome> {
    let mapping = mapper::map_event(category, event);
    let tasks = mapper::into_tasks(mapping);
    let lead = tasks
        .first()
        .map(|t| (t.expression, t.duration.as_millis() as u64, t.trigger.clone()))?;

    for task in tasks {
        state.scheduler.queue(task).await;
    }

    let (expression, duration_ms, trigger) = lead;
    let message = WireMessage::new(WireBody::Expression(ExpressionEvent {
        expression,
        duration: duration_ms,
        trigger,
        metadata: Some(metadata),
    }));
    let delivered = state.hub.broadcast(Channel::Avatar, message).await;
    info!(event, %expression, delivered, "reaction triggered");

    Some(ReactionOutcome {
        expression,
        duration_ms,
        delivered,
    })
}

/// Forward scheduler transitions to the overlay channel and the VMC
/// peer. Runs until shutdown; the change stream outliving the forwarder
/// is fine, lagged messages are just skipped.
pub fn spawn_change_forwarder(
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut changes = state.scheduler.subscribe_changes();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("change forwarder shutting down");
                        break;
                    }
                }

                result = changes.recv() => match result {
                    Ok(change) => {
                        if let Some(vmc) = &state.vmc {
                            vmc.send_expression(vmc::blend_shape(change.expression), 1.0);
                        }
                        let message = WireMessage::new(WireBody::Expression(ExpressionEvent {
                            expression: change.expression,
                            duration: change.duration_ms,
                            trigger: change.trigger,
                            metadata: None,
                        }));
                        state.hub.broadcast(Channel::Avatar, message).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "expression change stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    })
}
