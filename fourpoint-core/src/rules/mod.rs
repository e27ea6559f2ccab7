//! Rule-based signal evaluation ("four-point" strategy).
//!
//! A rule is a named predicate over a trailing window of a series. Rules are
//! pure: the same window always gives the same answer, and nothing reads the
//! wall clock. The evaluator runs rules in declaration order and the first one
//! that triggers names the verdict.

pub mod breakout;
pub mod config;
pub mod divergence;
pub mod evaluator;
pub mod gate;
pub mod moving_average;
pub mod volume;

pub use breakout::VolumeConfirmedBreakout;
pub use config::{RuleConfigError, RuleKind, RuleSpec};
pub use divergence::PriceVolumeDivergence;
pub use evaluator::{RuleOutcome, SignalEvaluator};
pub use gate::{BiasPivot, Gated, PivotHit};
pub use moving_average::{ShortMaAboveLongMa, ShortMaTurningUp};
pub use volume::{VolumeContractionPriceHold, VolumeExpansionUpClose};

use crate::domain::PricePoint;
use serde::Serialize;
use std::collections::BTreeMap;

/// Read-only view of the most recent points of a series, oldest first.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    points: &'a [PricePoint],
}

impl<'a> Window<'a> {
    pub fn new(points: &'a [PricePoint]) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &'a [PricePoint] {
        self.points
    }

    /// The last `n` points, or `None` if the window is shorter than `n`.
    pub fn tail(&self, n: usize) -> Option<&'a [PricePoint]> {
        let start = self.points.len().checked_sub(n)?;
        Some(&self.points[start..])
    }

    pub fn last(&self) -> Option<&'a PricePoint> {
        self.points.last()
    }
}

/// A rule firing, with the statistics that made it fire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub rule: String,
    pub metrics: BTreeMap<String, f64>,
}

impl Trigger {
    pub fn new(rule: &str) -> Self {
        Self {
            rule: rule.to_string(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }
}

/// A pluggable predicate over a trailing window.
///
/// Implementations must return `None` rather than panic when the window is
/// shorter than `lookback()`, and must not read anything but the window.
pub trait Rule: Send + Sync {
    /// Declared identifier; becomes the verdict reason.
    fn id(&self) -> &str;

    /// Points needed for a meaningful answer.
    fn lookback(&self) -> usize;

    fn evaluate(&self, window: &Window<'_>) -> Option<Trigger>;
}
