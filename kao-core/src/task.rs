//! Scheduled units of avatar output.

use kao_proto::{Expression, Priority};
use std::time::Duration;
use tokio::time::Instant;

/// Errors raised when constructing an [`ExpressionTask`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Durations must be positive; clamping a zero duration would corrupt
    /// the ordering guarantees callers rely on, so it is rejected outright.
    #[error("expression duration must be greater than zero")]
    ZeroDuration,
}

/// One scheduled unit of avatar output: an expression, how long to hold
/// it, how urgently it should play, and where it came from.
///
/// Tasks are immutable after construction and consumed exactly once by
/// the scheduler.
#[derive(Debug, Clone)]
pub struct ExpressionTask {
    pub expression: Expression,
    pub duration: Duration,
    pub priority: Priority,
    /// Enqueue timestamp; tie-breaker for FIFO ordering within a priority.
    pub queued_at: Instant,
    /// Free-form label identifying the origin (`commit`, `chat_positive`, ...).
    pub trigger: Option<String>,
}

impl ExpressionTask {
    /// Create a task, rejecting non-positive durations.
    pub fn new(
        expression: Expression,
        duration: Duration,
        priority: Priority,
        trigger: Option<String>,
    ) -> Result<Self, TaskError> {
        if duration.is_zero() {
            return Err(TaskError::ZeroDuration);
        }
        Ok(Self {
            expression,
            duration,
            priority,
            queued_at: Instant::now(),
            trigger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_is_rejected() {
        let result = ExpressionTask::new(
            Expression::Happy,
            Duration::ZERO,
            Priority::Medium,
            None,
        );
        assert_eq!(result.unwrap_err(), TaskError::ZeroDuration);
    }

    #[test]
    fn positive_duration_is_accepted() {
        let task = ExpressionTask::new(
            Expression::Focused,
            Duration::from_millis(1),
            Priority::Low,
            Some("commit".into()),
        )
        .unwrap();
        assert_eq!(task.expression, Expression::Focused);
        assert_eq!(task.trigger.as_deref(), Some("commit"));
    }
}
