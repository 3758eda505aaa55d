use std::fmt;

use crate::types::MatchupId;

/// Errors raised by the bracket engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Round sizes, positions or slot mapping cannot form a single-elimination tree.
    MalformedBracket(String),
    /// A matchup whose scores or completion state contradict each other.
    CorruptMatchup { matchup_id: MatchupId, reason: String },
    /// A trial budget of zero or less.
    InvalidTrialCount(i64),
    /// A requested trial budget above the configured ceiling.
    TrialCountAboveLimit { requested: i64, limit: usize },
}

impl EngineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        EngineError::MalformedBracket(msg.into())
    }

    pub fn corrupt(matchup_id: MatchupId, reason: impl Into<String>) -> Self {
        EngineError::CorruptMatchup {
            matchup_id,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MalformedBracket(msg) => write!(f, "Malformed bracket: {}", msg),
            EngineError::CorruptMatchup { matchup_id, reason } => {
                write!(f, "Corrupt matchup {}: {}", matchup_id, reason)
            }
            EngineError::InvalidTrialCount(count) => {
                write!(f, "Trial count must be positive, got {}", count)
            }
            EngineError::TrialCountAboveLimit { requested, limit } => {
                write!(f, "Trial count {} exceeds the limit of {}", requested, limit)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<EngineError> for String {
    fn from(err: EngineError) -> Self {
        err.to_string()
    }
}
