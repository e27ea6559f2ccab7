//! Indicators over a price history.
//!
//! Indicators are pure functions: points in, one value per point out. The
//! first `lookback()` values are `f64::NAN` (warmup). No value at index `t`
//! depends on points after `t`.

pub mod ma_bias;
pub mod obv;
pub mod sma;
pub mod volume_sma;

pub use ma_bias::MaBias;
pub use obv::Obv;
pub use sma::Sma;
pub use volume_sma::VolumeSma;

use crate::domain::PricePoint;

pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_3", "ma_bias_3_6").
    fn name(&self) -> &str;

    /// Number of points before the first valid value.
    fn lookback(&self) -> usize;

    /// Same length as `points`; the first `lookback()` values are NaN.
    fn compute(&self, points: &[PricePoint]) -> Vec<f64>;
}

/// Mean of `values[i + 1 - period..=i]` for every `i`, NaN during warmup.
///
/// Each window is summed from scratch so equal inputs give bit-identical
/// outputs regardless of what came before them.
pub(crate) fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        out[i] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Synthetic points from closes and volumes for tests.
///
/// open = previous close (or close for the first point), high/low pad the
/// body by 1.0.
#[cfg(test)]
pub fn make_points(closes: &[f64], volumes: &[u64]) -> Vec<PricePoint> {
    use crate::domain::{Activity, Ohlc};
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PricePoint::new(
                base + chrono::Duration::days(i as i64),
                Ohlc {
                    open,
                    high: open.max(close) + 1.0,
                    low: (open.min(close) - 1.0).max(0.0),
                    close,
                },
                Activity {
                    volume: volumes.get(i).copied().unwrap_or(1000),
                    turnover: 0,
                    transaction_count: 0,
                },
                0.0,
            )
            .unwrap()
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
