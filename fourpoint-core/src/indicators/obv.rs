//! On-balance volume.
//!
//! obv[0] = 0; each later point adds its volume on an up close, subtracts it
//! on a down close, and carries the previous value on an unchanged close.

use super::Indicator;
use crate::domain::PricePoint;

#[derive(Debug, Clone, Default)]
pub struct Obv;

impl Indicator for Obv {
    fn name(&self) -> &str {
        "obv"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, points: &[PricePoint]) -> Vec<f64> {
        let mut out = Vec::with_capacity(points.len());
        let mut running = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                let prev = points[i - 1].close();
                let v = p.volume() as f64;
                if p.close() > prev {
                    running += v;
                } else if p.close() < prev {
                    running -= v;
                }
            }
            out.push(running);
        }
        out
    }
}
