//! The avatar expression vocabulary.
//!
//! The set of expressions is closed and never extended at runtime; every
//! other part of the system (mapper tables, scheduler, wire messages)
//! speaks in terms of these five states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A facial expression the avatar can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Happy,
    Surprised,
    #[default]
    Neutral,
    Focused,
    Sorrow,
}

impl Expression {
    /// Every expression, in declaration order. Used by the control API to
    /// enumerate the valid set in 400 responses.
    pub const ALL: [Expression; 5] = [
        Expression::Happy,
        Expression::Surprised,
        Expression::Neutral,
        Expression::Focused,
        Expression::Sorrow,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Expression::Happy => "happy",
            Expression::Surprised => "surprised",
            Expression::Neutral => "neutral",
            Expression::Focused => "focused",
            Expression::Sorrow => "sorrow",
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an expression name that is not in the
/// vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown expression: {0}")]
pub struct UnknownExpression(pub String);

impl FromStr for Expression {
    type Err = UnknownExpression;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownExpression(s.to_owned()))
    }
}

/// Playback priority for a scheduled expression.
///
/// Totally ordered: `High > Medium > Low`. The derived `Ord` on the enum
/// declaration order would invert this, so ordering goes through
/// [`rank`](Priority::rank) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Numeric ordinal, higher means more urgent.
    pub const fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}
