//! Evaluation verdict: buy with the triggering rule, no buy, or too little history.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of evaluating a rule set against one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// A rule triggered; carries that rule's identifier.
    Buy { reason: String },
    NoBuy,
    /// The series is shorter than the longest rule lookback.
    Insufficient { required: usize },
}

impl Verdict {
    pub fn buy(reason: impl Into<String>) -> Self {
        Verdict::Buy {
            reason: reason.into(),
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Verdict::Buy { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Buy { reason } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Buy { reason } => write!(f, "buy ({reason})"),
            Verdict::NoBuy => f.write_str("no buy"),
            Verdict::Insufficient { required } => {
                write!(f, "insufficient history ({required} sessions required)")
            }
        }
    }
}
