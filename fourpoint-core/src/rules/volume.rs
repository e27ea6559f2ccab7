//! Single-session volume/price rules.
//!
//! Both compare the last session with the one before it, so both need
//! exactly two points.

use super::config::{check_fraction, check_ratio, RuleConfigError};
use super::{Rule, Trigger, Window};
use serde::{Deserialize, Serialize};

// ─── Volume expansion on an up close ─────────────────────────────────

/// Volume grew over the previous session and the session closed above its open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeExpansionUpClose {
    pub volume_ratio: f64,
    /// Minimum close/open - 1.
    pub min_body: f64,
}

impl Default for VolumeExpansionUpClose {
    fn default() -> Self {
        Self {
            volume_ratio: 1.0,
            min_body: 0.0,
        }
    }
}

impl VolumeExpansionUpClose {
    pub const ID: &'static str = "volume-expansion up-close";

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        check_ratio(Self::ID, "volume_ratio", self.volume_ratio)?;
        check_ratio(Self::ID, "min_body", self.min_body)
    }
}

impl Rule for VolumeExpansionUpClose {
    fn id(&self) -> &str {
        Self::ID
    }

    fn lookback(&self) -> usize {
        2
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<Trigger> {
        let [prev, last] = window.tail(2)? else {
            return None;
        };
        let volume = last.volume() as f64;
        let prev_volume = prev.volume() as f64;
        if volume <= self.volume_ratio * prev_volume {
            return None;
        }
        if last.close() <= last.open() * (1.0 + self.min_body) {
            return None;
        }
        Some(
            Trigger::new(Self::ID)
                .with("volume", volume)
                .with("previous_volume", prev_volume)
                .with("body", last.close() - last.open()),
        )
    }
}

// ─── Volume contraction with the price holding ───────────────────────

/// Volume shrank while the close still rose over the previous close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeContractionPriceHold {
    /// Volume must fall below `(1 - min_contraction)` × previous volume.
    pub min_contraction: f64,
    /// Close must exceed `(1 + min_change)` × previous close.
    pub min_change: f64,
}

impl Default for VolumeContractionPriceHold {
    fn default() -> Self {
        Self {
            min_contraction: 0.0,
            min_change: 0.0,
        }
    }
}

impl VolumeContractionPriceHold {
    pub const ID: &'static str = "volume-contraction price-hold";

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        check_fraction(Self::ID, "min_contraction", self.min_contraction)?;
        check_ratio(Self::ID, "min_change", self.min_change)
    }
}

impl Rule for VolumeContractionPriceHold {
    fn id(&self) -> &str {
        Self::ID
    }

    fn lookback(&self) -> usize {
        2
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<Trigger> {
        let [prev, last] = window.tail(2)? else {
            return None;
        };
        let volume = last.volume() as f64;
        let prev_volume = prev.volume() as f64;
        if volume >= prev_volume * (1.0 - self.min_contraction) {
            return None;
        }
        if last.close() <= prev.close() * (1.0 + self.min_change) {
            return None;
        }
        Some(
            Trigger::new(Self::ID)
                .with("volume", volume)
                .with("previous_volume", prev_volume)
                .with("change", last.close() - prev.close()),
        )
    }
}
