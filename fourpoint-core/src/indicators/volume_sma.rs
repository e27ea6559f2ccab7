//! Moving average of traded volume.

use super::{rolling_mean, Indicator};
use crate::domain::PricePoint;

#[derive(Debug, Clone)]
pub struct VolumeSma {
    period: usize,
    name: String,
}

impl VolumeSma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "volume SMA period must be >= 1");
        Self {
            period,
            name: format!("volume_sma_{period}"),
        }
    }
}

impl Indicator for VolumeSma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, points: &[PricePoint]) -> Vec<f64> {
        let volumes: Vec<f64> = points.iter().map(|p| p.volume() as f64).collect();
        rolling_mean(&volumes, self.period)
    }
}
