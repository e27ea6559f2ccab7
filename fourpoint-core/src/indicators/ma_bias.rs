//! Moving-average bias: SMA(fast) − SMA(slow) of closes.
//!
//! Negative while the short average sits under the long one. Lookback:
//! slow - 1.

use super::{rolling_mean, Indicator};
use crate::domain::PricePoint;

#[derive(Debug, Clone)]
pub struct MaBias {
    fast: usize,
    slow: usize,
    name: String,
}

impl MaBias {
    pub fn new(fast: usize, slow: usize) -> Self {
        assert!(fast >= 1, "fast period must be >= 1");
        assert!(slow > fast, "slow period must be > fast period");
        Self {
            fast,
            slow,
            name: format!("ma_bias_{fast}_{slow}"),
        }
    }
}

impl Indicator for MaBias {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow - 1
    }

    fn compute(&self, points: &[PricePoint]) -> Vec<f64> {
        let closes: Vec<f64> = points.iter().map(PricePoint::close).collect();
        let fast = rolling_mean(&closes, self.fast);
        let slow = rolling_mean(&closes, self.slow);
        fast.iter().zip(&slow).map(|(f, s)| f - s).collect()
    }
}
