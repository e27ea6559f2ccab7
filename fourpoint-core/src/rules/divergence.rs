//! Price/volume divergence: the close fell while on-balance volume rose.
//!
//! The OBV rise is normalized by the volume traded over the window, so
//! `min_obv_rise` reads as a fraction (0.2 = net buying of at least 20% of
//! the window's volume).

use super::config::{check_positive, check_ratio, RuleConfigError};
use super::{Rule, Trigger, Window};
use crate::indicators::{Indicator, Obv};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceVolumeDivergence {
    /// Sessions between the reference close and the last close.
    pub lookback: usize,
    pub min_obv_rise: f64,
}

impl Default for PriceVolumeDivergence {
    fn default() -> Self {
        Self {
            lookback: 5,
            min_obv_rise: 0.0,
        }
    }
}

impl PriceVolumeDivergence {
    pub const ID: &'static str = "price-volume divergence";

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        check_positive(Self::ID, "lookback", self.lookback)?;
        check_ratio(Self::ID, "min_obv_rise", self.min_obv_rise)
    }
}

impl Rule for PriceVolumeDivergence {
    fn id(&self) -> &str {
        Self::ID
    }

    fn lookback(&self) -> usize {
        self.lookback + 1
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<Trigger> {
        let points = window.tail(Rule::lookback(self))?;
        let (first, last) = (points.first()?, points.last()?);
        if last.close() >= first.close() {
            return None;
        }

        let traded: u64 = points[1..].iter().map(|p| p.volume()).sum();
        if traded == 0 {
            return None;
        }
        let obv = Obv.compute(points);
        let rise = obv.last()? - obv.first()?;
        let ratio = rise / traded as f64;
        if ratio <= self.min_obv_rise {
            return None;
        }

        Some(
            Trigger::new(Self::ID)
                .with("price_change", last.close() - first.close())
                .with("obv_rise", rise)
                .with("obv_rise_ratio", ratio),
        )
    }
}
