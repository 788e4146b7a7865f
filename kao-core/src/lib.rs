//! Core of the Kao avatar relay.
//!
//! External events (source-control activity, chat sentiment, manual
//! triggers) become timed facial-expression tasks, which the scheduler
//! plays back one at a time on the single "current expression" state.
//! Transitions fan out to whoever subscribes — the WebSocket hub and the
//! VMC motion-capture client in the server binary.
//!
//! # Flow
//!
//! 1. [`mapper`] translates an event identifier into expression tasks
//! 2. [`scheduler`] orders and plays them, emitting [`scheduler::ExpressionChange`]
//! 3. [`vmc`] mirrors changes to the motion-capture peer over UDP

pub mod mapper;
pub mod scheduler;
pub mod task;
pub mod vmc;

pub use task::{ExpressionTask, TaskError};

/// Default buffer size for command and notification channels.
///
/// Enough to absorb webhook bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;
