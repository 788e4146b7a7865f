//! Static event-to-expression mapping tables.
//!
//! Two independent tables exist: one for source-control event
//! identifiers and one for chat-sentiment identifiers. A lookup miss is
//! not an error — it logs a diagnostic and degrades to a short neutral
//! task tagged with the unrecognized identifier, so an unexpected event
//! never breaks the pipeline.

use crate::task::ExpressionTask;
use kao_proto::{Expression, Priority};
use std::borrow::Cow;
use std::time::Duration;
use tracing::warn;

/// Which lookup table an event identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    SourceControl,
    Chat,
}

/// Blueprint for one expression task, before an enqueue timestamp exists.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub expression: Expression,
    pub duration_ms: u64,
    pub priority: Priority,
    pub trigger: Cow<'static, str>,
}

impl TaskSpec {
    const fn new(
        expression: Expression,
        duration_ms: u64,
        priority: Priority,
        trigger: &'static str,
    ) -> Self {
        Self {
            expression,
            duration_ms,
            priority,
            trigger: Cow::Borrowed(trigger),
        }
    }
}

/// Result of a mapping lookup: a single task or a short ordered sequence
/// for events that play a two-beat emotional arc.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactionMapping {
    Single(TaskSpec),
    Sequence(Vec<TaskSpec>),
}

/// Source-control event identifiers recognized by [`map_event`].
pub const SOURCE_CONTROL_EVENTS: [&str; 8] = [
    "commit",
    "pr_opened",
    "pr_merged",
    "pr_closed",
    "test_passed",
    "test_failed",
    "issue_opened",
    "issue_closed",
];

/// Chat-sentiment identifiers recognized by [`map_event`].
pub const CHAT_SENTIMENTS: [&str; 5] = ["positive", "excited", "curious", "neutral", "negative"];

fn source_control_mapping(event: &str) -> Option<ReactionMapping> {
    use Expression::*;
    use Priority::*;
    let mapping = match event {
        "commit" => ReactionMapping::Single(TaskSpec::new(Happy, 2000, Medium, "commit")),
        "pr_opened" => ReactionMapping::Single(TaskSpec::new(Neutral, 2000, Low, "pr_opened")),
        // A merged PR is a happy surprise; the single highest-energy beat.
        "pr_merged" => ReactionMapping::Single(TaskSpec::new(Surprised, 3000, High, "pr_merged")),
        "pr_closed" => ReactionMapping::Single(TaskSpec::new(Neutral, 2000, Low, "pr_closed")),
        // Passing tests play focus-then-joy as a two-beat arc.
        "test_passed" => ReactionMapping::Sequence(vec![
            TaskSpec::new(Focused, 1000, High, "test_passed"),
            TaskSpec::new(Happy, 2000, High, "test_passed"),
        ]),
        "test_failed" => ReactionMapping::Single(TaskSpec::new(Sorrow, 3000, Medium, "test_failed")),
        "issue_opened" => ReactionMapping::Single(TaskSpec::new(Neutral, 2000, Low, "issue_opened")),
        "issue_closed" => ReactionMapping::Single(TaskSpec::new(Neutral, 2000, Low, "issue_closed")),
        _ => return None,
    };
    Some(mapping)
}

fn chat_mapping(sentiment: &str) -> Option<ReactionMapping> {
    use Expression::*;
    use Priority::*;
    let mapping = match sentiment {
        "positive" => ReactionMapping::Single(TaskSpec::new(Happy, 2000, Medium, "chat_positive")),
        "excited" => ReactionMapping::Single(TaskSpec::new(Happy, 2000, Medium, "chat_excited")),
        "curious" => {
            ReactionMapping::Single(TaskSpec::new(Surprised, 2000, Medium, "chat_curious"))
        }
        "neutral" => ReactionMapping::Single(TaskSpec::new(Neutral, 1000, Low, "chat_neutral")),
        "negative" => ReactionMapping::Single(TaskSpec::new(Sorrow, 2000, Medium, "chat_negative")),
        _ => return None,
    };
    Some(mapping)
}

/// Map an event identifier to its expression reaction.
///
/// Unknown identifiers degrade gracefully: a low-priority neutral beat
/// tagged with the original identifier (chat misses keep the `chat_`
/// prefix the recognized sentiments use).
pub fn map_event(category: EventCategory, event: &str) -> ReactionMapping {
    let hit = match category {
        EventCategory::SourceControl => source_control_mapping(event),
        EventCategory::Chat => chat_mapping(event),
    };
    hit.unwrap_or_else(|| {
        warn!(?category, event, "unrecognized event identifier, using neutral");
        let trigger = match category {
            EventCategory::SourceControl => Cow::Owned(event.to_owned()),
            EventCategory::Chat => Cow::Owned(format!("chat_{event}")),
        };
        ReactionMapping::Single(TaskSpec {
            expression: Expression::Neutral,
            duration_ms: 1000,
            priority: Priority::Low,
            trigger,
        })
    })
}

/// Normalize a mapping into the ordered task list the scheduler consumes.
pub fn into_tasks(mapping: ReactionMapping) -> Vec<ExpressionTask> {
    let specs = match mapping {
        ReactionMapping::Single(spec) => vec![spec],
        ReactionMapping::Sequence(specs) => specs,
    };
    specs
        .into_iter()
        .filter_map(|spec| {
            ExpressionTask::new(
                spec.expression,
                Duration::from_millis(spec.duration_ms),
                spec.priority,
                Some(spec.trigger.into_owned()),
            )
            .ok()
        })
        .collect()
}

/// Source-control identifiers, for the control API's introspection route.
pub fn source_control_events() -> &'static [&'static str] {
    &SOURCE_CONTROL_EVENTS
}

/// Chat-sentiment identifiers, for the control API's introspection route.
pub fn chat_sentiments() -> &'static [&'static str] {
    &CHAT_SENTIMENTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_merged_maps_to_high_priority_surprise() {
        let mapping = map_event(EventCategory::SourceControl, "pr_merged");
        assert_eq!(
            mapping,
            ReactionMapping::Single(TaskSpec::new(
                Expression::Surprised,
                3000,
                Priority::High,
                "pr_merged"
            ))
        );
    }

    #[test]
    fn test_passed_maps_to_focus_then_joy_sequence() {
        let mapping = map_event(EventCategory::SourceControl, "test_passed");
        let tasks = into_tasks(mapping);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].expression, Expression::Focused);
        assert_eq!(tasks[0].duration, Duration::from_millis(1000));
        assert_eq!(tasks[1].expression, Expression::Happy);
        assert_eq!(tasks[1].duration, Duration::from_millis(2000));
        assert!(tasks.iter().all(|t| t.priority == Priority::High));
    }

    #[test]
    fn unknown_event_degrades_to_neutral_with_original_trigger() {
        let mapping = map_event(EventCategory::SourceControl, "release_published");
        let tasks = into_tasks(mapping);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].expression, Expression::Neutral);
        assert_eq!(tasks[0].priority, Priority::Low);
        assert_eq!(tasks[0].trigger.as_deref(), Some("release_published"));
    }

    #[test]
    fn unknown_sentiment_keeps_chat_prefix() {
        let mapping = map_event(EventCategory::Chat, "confused");
        let tasks = into_tasks(mapping);
        assert_eq!(tasks[0].trigger.as_deref(), Some("chat_confused"));
    }

    #[test]
    fn every_listed_identifier_resolves_without_fallback() {
        for event in SOURCE_CONTROL_EVENTS {
            assert!(source_control_mapping(event).is_some(), "missing: {event}");
        }
        for sentiment in CHAT_SENTIMENTS {
            assert!(chat_mapping(sentiment).is_some(), "missing: {sentiment}");
        }
    }

    #[test]
    fn single_mapping_normalizes_to_one_task() {
        let tasks = into_tasks(map_event(EventCategory::Chat, "curious"));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].trigger.as_deref(), Some("chat_curious"));
    }
}
