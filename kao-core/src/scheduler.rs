//! The expression scheduler.
//!
//! Owns the single "current expression" state machine and the priority
//! queue of pending tasks. Runs as an actor: commands arrive over an
//! mpsc channel, the current state is published through a `watch`
//! channel (synchronously queryable), and transitions fan out on a
//! `broadcast` channel so any number of subscribers — the WebSocket hub,
//! the VMC client — can follow along.
//!
//! Playback is strictly serial: a queued task never interrupts the task
//! currently playing, no matter its priority; priority only decides
//! ordering among *pending* tasks. [`SchedulerHandle::set`] is the
//! explicit preemptive escape hatch.
//!
//! The duration timer is an explicit deadline raced inside the select
//! loop rather than a chained callback, so cancellation is a field
//! assignment and the whole machine runs against tokio's virtual clock
//! in tests.

use crate::task::{ExpressionTask, TaskError};
use crate::DEFAULT_CHANNEL_BUFFER;
use kao_proto::Expression;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A transition of the current expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionChange {
    pub expression: Expression,
    /// How long the expression will hold, in milliseconds. Zero marks a
    /// pure return-to-idle transition, not a timed task.
    pub duration_ms: u64,
    pub trigger: Option<String>,
}

/// Synchronously queryable view of the scheduler state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub expression: Expression,
    pub playing: bool,
    pub queue_len: usize,
}

impl Default for SchedulerSnapshot {
    fn default() -> Self {
        Self {
            expression: Expression::Neutral,
            playing: false,
            queue_len: 0,
        }
    }
}

enum Command {
    /// Preemptive override: clear the queue and play immediately.
    Set {
        expression: Expression,
        duration: Duration,
    },
    /// Cooperative enqueue, sorted by (priority desc, enqueue time asc).
    Queue(ExpressionTask),
}

/// Cloneable handle to a running scheduler actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SchedulerSnapshot>,
    change_tx: broadcast::Sender<ExpressionChange>,
}

impl SchedulerHandle {
    /// Preemptively set the current expression.
    ///
    /// Discards every pending task and any armed revert timer, plays
    /// `expression` immediately, and reverts to neutral after `duration`.
    pub async fn set(&self, expression: Expression, duration: Duration) -> Result<(), TaskError> {
        if duration.is_zero() {
            return Err(TaskError::ZeroDuration);
        }
        self.send(Command::Set {
            expression,
            duration,
        })
        .await;
        Ok(())
    }

    /// Enqueue a task; plays immediately if nothing is playing.
    pub async fn queue(&self, task: ExpressionTask) {
        self.send(Command::Queue(task)).await;
    }

    /// Current expression, playing flag, and queue length.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to expression transitions.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ExpressionChange> {
        self.change_tx.subscribe()
    }

    async fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).await.is_err() {
            warn!("expression scheduler is stopped, command dropped");
        }
    }
}

/// Spawn the scheduler actor and return its handle.
///
/// The actor runs until `shutdown_rx` flips to `true` or every handle is
/// dropped.
pub fn spawn(shutdown_rx: watch::Receiver<bool>) -> SchedulerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
    let (state_tx, state_rx) = watch::channel(SchedulerSnapshot::default());
    let (change_tx, _) = broadcast::channel(DEFAULT_CHANNEL_BUFFER);

    let scheduler = Scheduler {
        current: Expression::Neutral,
        playing: false,
        queue: Vec::new(),
        deadline: None,
        state_tx,
        change_tx: change_tx.clone(),
    };
    tokio::spawn(scheduler.run(shutdown_rx, cmd_rx));

    SchedulerHandle {
        cmd_tx,
        state_rx,
        change_tx,
    }
}

struct Scheduler {
    current: Expression,
    playing: bool,
    /// Pending tasks, kept sorted by (priority desc, queued_at asc).
    queue: Vec<ExpressionTask>,
    /// When the currently playing task expires; `None` means no timer armed.
    deadline: Option<Instant>,
    state_tx: watch::Sender<SchedulerSnapshot>,
    change_tx: broadcast::Sender<ExpressionChange>,
}

/// Sleep until `deadline`, or forever when no timer is armed.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl Scheduler {
    async fn run(
        mut self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut cmd_rx: mpsc::Receiver<Command>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("expression scheduler received shutdown signal");
                        break;
                    }
                }

                _ = sleep_until_deadline(self.deadline) => {
                    self.play_next();
                }

                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Set { expression, duration }) => self.set(expression, duration),
                    Some(Command::Queue(task)) => self.enqueue(task),
                    None => {
                        debug!("all scheduler handles dropped");
                        break;
                    }
                }
            }
        }
    }

    fn set(&mut self, expression: Expression, duration: Duration) {
        let discarded = self.queue.len();
        self.queue.clear();
        self.current = expression;
        self.playing = true;
        self.deadline = Some(Instant::now() + duration);
        debug!(%expression, ?duration, discarded, "expression set, queue cleared");
        self.notify(expression, duration.as_millis() as u64, None);
        self.publish_state();
    }

    fn enqueue(&mut self, task: ExpressionTask) {
        // Insert before the first strictly lower-priority task; equal
        // priorities stay FIFO because queued_at is monotonic.
        let at = self
            .queue
            .iter()
            .position(|pending| task.priority > pending.priority)
            .unwrap_or(self.queue.len());
        self.queue.insert(at, task);
        debug!(queue_len = self.queue.len(), "expression task queued");

        if self.playing {
            self.publish_state();
        } else {
            self.play_next();
        }
    }

    fn play_next(&mut self) {
        if self.queue.is_empty() {
            self.current = Expression::Neutral;
            self.playing = false;
            self.deadline = None;
            debug!("queue empty, returning to neutral");
            self.notify(Expression::Neutral, 0, None);
        } else {
            let task = self.queue.remove(0);
            self.current = task.expression;
            self.playing = true;
            self.deadline = Some(Instant::now() + task.duration);
            debug!(
                expression = %task.expression,
                duration_ms = task.duration.as_millis() as u64,
                trigger = task.trigger.as_deref().unwrap_or("unknown"),
                "playing expression"
            );
            self.notify(
                task.expression,
                task.duration.as_millis() as u64,
                task.trigger,
            );
        }
        self.publish_state();
    }

    fn notify(&self, expression: Expression, duration_ms: u64, trigger: Option<String>) {
        // Err just means nobody is subscribed right now.
        let _ = self.change_tx.send(ExpressionChange {
            expression,
            duration_ms,
            trigger,
        });
    }

    fn publish_state(&self) {
        let _ = self.state_tx.send(SchedulerSnapshot {
            expression: self.current,
            playing: self.playing,
            queue_len: self.queue.len(),
        });
    }
}
