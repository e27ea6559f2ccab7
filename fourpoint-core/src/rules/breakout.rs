//! Volume-confirmed breakout: a run of rising closes finished on above-average volume.

use super::config::{check_positive, check_ratio, RuleConfigError};
use super::{Rule, Trigger, Window};
use crate::domain::PricePoint;
use crate::indicators::{Indicator, VolumeSma};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfirmedBreakout {
    /// Consecutive rising closes required, ending on the last session.
    pub rising_closes: usize,
    /// Sessions before the last one averaged for the volume baseline.
    pub volume_window: usize,
    /// Last volume must exceed `volume_ratio` × baseline.
    pub volume_ratio: f64,
}

impl Default for VolumeConfirmedBreakout {
    fn default() -> Self {
        Self {
            rising_closes: 5,
            volume_window: 5,
            volume_ratio: 1.0,
        }
    }
}

impl VolumeConfirmedBreakout {
    pub const ID: &'static str = "volume-confirmed breakout";

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        check_positive(Self::ID, "rising_closes", self.rising_closes)?;
        check_positive(Self::ID, "volume_window", self.volume_window)?;
        check_ratio(Self::ID, "volume_ratio", self.volume_ratio)
    }
}

fn rising_streak(points: &[PricePoint]) -> usize {
    points
        .windows(2)
        .rev()
        .take_while(|w| w[1].close() > w[0].close())
        .count()
}

impl Rule for VolumeConfirmedBreakout {
    fn id(&self) -> &str {
        Self::ID
    }

    fn lookback(&self) -> usize {
        self.rising_closes.max(self.volume_window) + 1
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<Trigger> {
        let points = window.tail(self.lookback())?;
        let (last, before) = points.split_last()?;

        let streak = rising_streak(&points[points.len() - self.rising_closes - 1..]);
        if streak < self.rising_closes {
            return None;
        }

        let baseline_points = &before[before.len() - self.volume_window..];
        let baseline = *VolumeSma::new(self.volume_window)
            .compute(baseline_points)
            .last()?;
        let volume = last.volume() as f64;
        if volume <= self.volume_ratio * baseline {
            return None;
        }

        Some(
            Trigger::new(Self::ID)
                .with("rising_closes", streak as f64)
                .with("volume", volume)
                .with("baseline_volume", baseline),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_points;

    fn closes() -> Vec<f64> {
        vec![100.0, 99.0, 98.0, 97.0, 96.0, 97.0, 98.0, 99.0, 100.0, 101.0]
    }

    fn volumes(last: u64) -> Vec<u64> {
        let mut v = vec![1000; 9];
        v.push(last);
        v
    }

    #[test]
    fn fires_on_rising_run_with_volume() {
        let points = make_points(&closes(), &volumes(2000));
        let trigger = VolumeConfirmedBreakout::default()
            .evaluate(&Window::new(&points))
            .unwrap();
        assert_eq!(trigger.rule, VolumeConfirmedBreakout::ID);
        assert_eq!(trigger.metrics["rising_closes"], 5.0);
        assert_eq!(trigger.metrics["baseline_volume"], 1000.0);
    }

    #[test]
    fn average_volume_is_not_enough() {
        let points = make_points(&closes(), &volumes(1000));
        assert!(VolumeConfirmedBreakout::default()
            .evaluate(&Window::new(&points))
            .is_none());
    }

    #[test]
    fn broken_run_does_not_fire() {
        let mut c = closes();
        c[7] = 97.5;
        let points = make_points(&c, &volumes(5000));
        assert!(VolumeConfirmedBreakout::default()
            .evaluate(&Window::new(&points))
            .is_none());
    }

    #[test]
    fn short_window_is_none() {
        let points = make_points(&[1.0, 2.0, 3.0], &[1, 2, 3]);
        assert!(VolumeConfirmedBreakout::default()
            .evaluate(&Window::new(&points))
            .is_none());
    }

    #[test]
    fn rejects_zero_run() {
        let rule = VolumeConfirmedBreakout {
            rising_closes: 0,
            ..Default::default()
        };
        assert!(rule.validate().is_err());
    }
}
