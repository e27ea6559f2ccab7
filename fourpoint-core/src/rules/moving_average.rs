//! Moving-average trend rules on closes.

use super::config::{check_periods, check_positive, check_ratio, RuleConfigError};
use super::{Rule, Trigger, Window};
use crate::indicators::{Indicator, Sma};
use serde::{Deserialize, Serialize};

/// The short average rose on the last session after not rising on the one before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortMaTurningUp {
    pub period: usize,
    /// Minimum rise of the average on the last session.
    pub min_rise: f64,
}

impl Default for ShortMaTurningUp {
    fn default() -> Self {
        Self {
            period: 3,
            min_rise: 0.0,
        }
    }
}

impl ShortMaTurningUp {
    pub const ID: &'static str = "short-ma turning up";

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        check_positive(Self::ID, "period", self.period)?;
        check_ratio(Self::ID, "min_rise", self.min_rise)
    }
}

impl Rule for ShortMaTurningUp {
    fn id(&self) -> &str {
        Self::ID
    }

    fn lookback(&self) -> usize {
        self.period + 2
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<Trigger> {
        let points = window.tail(self.lookback())?;
        let ma = Sma::new(self.period).compute(points);
        let &[before, prev, last] = &ma[ma.len() - 3..] else {
            return None;
        };
        let rise = last - prev;
        let prior = prev - before;
        if rise > self.min_rise && prior <= 0.0 {
            Some(
                Trigger::new(Self::ID)
                    .with("ma", last)
                    .with("rise", rise)
                    .with("prior_change", prior),
            )
        } else {
            None
        }
    }
}

/// The short average sits above the long average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortMaAboveLongMa {
    pub fast: usize,
    pub slow: usize,
    /// Fast must exceed `(1 + min_spread)` × slow.
    pub min_spread: f64,
}

impl Default for ShortMaAboveLongMa {
    fn default() -> Self {
        Self {
            fast: 3,
            slow: 6,
            min_spread: 0.0,
        }
    }
}

impl ShortMaAboveLongMa {
    pub const ID: &'static str = "short-ma above long-ma";

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        check_periods(Self::ID, self.fast, self.slow)?;
        check_ratio(Self::ID, "min_spread", self.min_spread)
    }
}

impl Rule for ShortMaAboveLongMa {
    fn id(&self) -> &str {
        Self::ID
    }

    fn lookback(&self) -> usize {
        self.slow
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<Trigger> {
        let points = window.tail(self.lookback())?;
        let fast = *Sma::new(self.fast).compute(points).last()?;
        let slow = *Sma::new(self.slow).compute(points).last()?;
        if fast > slow * (1.0 + self.min_spread) {
            Some(
                Trigger::new(Self::ID)
                    .with("fast_ma", fast)
                    .with("slow_ma", slow),
            )
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_points;

    #[test]
    fn turning_up_after_decline() {
        // sma3: 9.0, 8.0, 8.33
        let points = make_points(&[10.0, 9.0, 8.0, 7.0, 10.0], &[]);
        let trigger = ShortMaTurningUp::default()
            .evaluate(&Window::new(&points))
            .unwrap();
        assert!(trigger.metrics["rise"] > 0.0);
        assert!(trigger.metrics["prior_change"] < 0.0);
    }

    #[test]
    fn steady_rise_is_not_a_turn() {
        let points = make_points(&[1.0, 2.0, 3.0, 4.0, 5.0], &[]);
        assert!(ShortMaTurningUp::default()
            .evaluate(&Window::new(&points))
            .is_none());
    }

    #[test]
    fn flat_then_up_counts_as_turn() {
        let points = make_points(&[5.0, 5.0, 5.0, 5.0, 6.0], &[]);
        assert!(ShortMaTurningUp::default()
            .evaluate(&Window::new(&points))
            .is_some());
    }

    #[test]
    fn fast_above_slow() {
        let rising = make_points(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[]);
        let trigger = ShortMaAboveLongMa::default()
            .evaluate(&Window::new(&rising))
            .unwrap();
        assert_eq!(trigger.metrics["fast_ma"], 5.0);
        assert_eq!(trigger.metrics["slow_ma"], 3.5);

        let falling = make_points(&[6.0, 5.0, 4.0, 3.0, 2.0, 1.0], &[]);
        assert!(ShortMaAboveLongMa::default()
            .evaluate(&Window::new(&falling))
            .is_none());
    }

    #[test]
    fn short_window_is_none() {
        let points = make_points(&[1.0, 2.0, 3.0, 4.0, 5.0], &[]);
        assert!(ShortMaAboveLongMa::default()
            .evaluate(&Window::new(&points))
            .is_none());
        assert!(ShortMaTurningUp::default()
            .evaluate(&Window::new(&points[..4]))
            .is_none());
    }

    #[test]
    fn inverted_periods_are_rejected() {
        let rule = ShortMaAboveLongMa {
            fast: 6,
            slow: 3,
            min_spread: 0.0,
        };
        assert!(rule.validate().is_err());
    }
}
