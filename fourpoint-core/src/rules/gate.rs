//! MA-bias pivot gate.
//!
//! The bias is SMA(fast) − SMA(slow). Over the last `sample` sessions its
//! minimum must be below `-min_depth`, and that minimum must lie between one
//! and `within - 1` sessions back: the short average dipped under the long
//! one and has already started to recover.

use super::config::{check_periods, check_positive, check_ratio, RuleConfigError};
use super::{Rule, Trigger, Window};
use crate::indicators::{Indicator, MaBias};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasPivot {
    pub fast: usize,
    pub slow: usize,
    pub sample: usize,
    pub within: usize,
    pub min_depth: f64,
}

impl Default for BiasPivot {
    fn default() -> Self {
        Self {
            fast: 3,
            slow: 6,
            sample: 5,
            within: 3,
            min_depth: 0.0,
        }
    }
}

/// Where the bias bottomed out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotHit {
    pub depth: f64,
    pub sessions_ago: usize,
}

impl BiasPivot {
    pub const ID: &'static str = "ma-bias pivot";

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        check_periods(Self::ID, self.fast, self.slow)?;
        check_positive(Self::ID, "sample", self.sample)?;
        check_ratio(Self::ID, "min_depth", self.min_depth)?;
        if self.within < 2 || self.within > self.sample {
            return Err(RuleConfigError::OutOfRange {
                rule: Self::ID,
                field: "within",
                value: self.within as f64,
                expected: "2 ..= sample",
            });
        }
        Ok(())
    }

    pub fn lookback(&self) -> usize {
        self.slow + self.sample - 1
    }

    pub fn check(&self, window: &Window<'_>) -> Option<PivotHit> {
        let points = window.tail(self.lookback())?;
        let bias = MaBias::new(self.fast, self.slow).compute(points);
        let sample = &bias[bias.len() - self.sample..];

        // First occurrence of the minimum.
        let (index, depth) = sample
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
                Some((_, b)) if b <= v => best,
                _ => Some((i, v)),
            })?;

        let sessions_ago = self.sample - 1 - index;
        if depth < -self.min_depth && sessions_ago >= 1 && sessions_ago < self.within {
            Some(PivotHit {
                depth,
                sessions_ago,
            })
        } else {
            None
        }
    }
}

/// A rule that only fires when the bias pivot also holds.
///
/// Keeps the inner rule's id so the verdict names the underlying condition.
pub struct Gated {
    inner: Box<dyn Rule>,
    gate: BiasPivot,
}

impl Gated {
    pub fn new(inner: Box<dyn Rule>, gate: BiasPivot) -> Self {
        Self { inner, gate }
    }

    pub fn gate(&self) -> &BiasPivot {
        &self.gate
    }
}

impl fmt::Debug for Gated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gated")
            .field("inner", &self.inner.id())
            .field("gate", &self.gate)
            .finish()
    }
}

impl Rule for Gated {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn lookback(&self) -> usize {
        self.inner.lookback().max(self.gate.lookback())
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<Trigger> {
        let hit = self.gate.check(window)?;
        let trigger = self.inner.evaluate(window)?;
        Some(
            trigger
                .with("pivot_depth", hit.depth)
                .with("pivot_sessions_ago", hit.sessions_ago as f64),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_points;
    use crate::rules::ShortMaTurningUp;

    // Flat, a sharp two-day drop, then a rebound. Bias by session 5..=9:
    // 0, -0.33, -1.33, -2.0, -1.5 so the bottom is one session back.
    fn dip_and_recover() -> Vec<f64> {
        vec![20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 18.0, 14.0, 16.0, 19.0]
    }

    #[test]
    fn pivot_found_inside_window() {
        let points = make_points(&dip_and_recover(), &[]);
        let hit = BiasPivot::default().check(&Window::new(&points)).unwrap();
        assert!((hit.depth + 2.0).abs() < 1e-9);
        assert_eq!(hit.sessions_ago, 1);
    }

    #[test]
    fn minimum_on_last_session_is_not_a_pivot() {
        // Accelerating decline keeps pushing the bias lower.
        let closes: Vec<f64> = (0..10).map(|i| 100.0 - (i * i) as f64).collect();
        let points = make_points(&closes, &[]);
        assert!(BiasPivot::default().check(&Window::new(&points)).is_none());
    }

    #[test]
    fn rising_series_has_no_negative_bias() {
        let closes: Vec<f64> = (0..10).map(|i| 10.0 + i as f64).collect();
        let points = make_points(&closes, &[]);
        assert!(BiasPivot::default().check(&Window::new(&points)).is_none());
    }

    #[test]
    fn gated_rule_keeps_inner_id_and_adds_metrics() {
        let points = make_points(&dip_and_recover(), &[]);
        let gated = Gated::new(Box::new(ShortMaTurningUp::default()), BiasPivot::default());
        assert_eq!(gated.lookback(), 10);
        let trigger = gated.evaluate(&Window::new(&points)).unwrap();
        assert_eq!(trigger.rule, ShortMaTurningUp::ID);
        assert_eq!(trigger.metrics["pivot_sessions_ago"], 1.0);
    }

    #[test]
    fn gate_blocks_inner_trigger() {
        // Turning up without a preceding dip in the bias.
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 16.0, 15.0, 17.0];
        let points = make_points(&closes, &[]);
        let inner = ShortMaTurningUp::default();
        assert!(inner.evaluate(&Window::new(&points)).is_some());
        let gated = Gated::new(Box::new(inner), BiasPivot::default());
        assert!(gated.evaluate(&Window::new(&points)).is_none());
    }

    #[test]
    fn within_must_fit_sample() {
        let gate = BiasPivot {
            within: 6,
            ..Default::default()
        };
        assert!(gate.validate().is_err());
    }
}
