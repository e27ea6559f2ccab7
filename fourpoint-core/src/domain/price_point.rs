//! PricePoint — one finalized (or synthetic live) trading session for a symbol.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Session prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Session activity: shares traded, value traded and number of trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Activity {
    pub volume: u64,
    pub turnover: u64,
    pub transaction_count: u64,
}

/// A validated OHLCV point.
///
/// Fields are private: the only way to obtain a `PricePoint` is through
/// [`PricePoint::new`], which enforces
/// `high >= max(open, close)`, `low <= min(open, close)` and `low >= 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
    turnover: u64,
    transaction_count: u64,
    change: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricePointError {
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("high {high} is below max(open, close) = {body_high}")]
    HighBelowBody { high: f64, body_high: f64 },

    #[error("low {low} is above min(open, close) = {body_low}")]
    LowAboveBody { low: f64, body_low: f64 },

    #[error("low {0} is negative")]
    NegativeLow(f64),
}

impl PricePoint {
    pub fn new(
        date: NaiveDate,
        prices: Ohlc,
        activity: Activity,
        change: f64,
    ) -> Result<Self, PricePointError> {
        for (field, value) in [
            ("open", prices.open),
            ("high", prices.high),
            ("low", prices.low),
            ("close", prices.close),
            ("change", change),
        ] {
            if !value.is_finite() {
                return Err(PricePointError::NonFinite { field });
            }
        }

        let body_high = prices.open.max(prices.close);
        let body_low = prices.open.min(prices.close);
        if prices.high < body_high {
            return Err(PricePointError::HighBelowBody {
                high: prices.high,
                body_high,
            });
        }
        if prices.low > body_low {
            return Err(PricePointError::LowAboveBody {
                low: prices.low,
                body_low,
            });
        }
        if prices.low < 0.0 {
            return Err(PricePointError::NegativeLow(prices.low));
        }

        Ok(Self {
            date,
            open: prices.open,
            high: prices.high,
            low: prices.low,
            close: prices.close,
            volume: activity.volume,
            turnover: activity.turnover,
            transaction_count: activity.transaction_count,
            change,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> u64 {
        self.volume
    }

    pub fn turnover(&self) -> u64 {
        self.turnover
    }

    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }

    /// Signed change against the previous session's close.
    pub fn change(&self) -> f64 {
        self.change
    }

    pub fn prices(&self) -> Ohlc {
        Ohlc {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }

    pub fn activity(&self) -> Activity {
        Activity {
            volume: self.volume,
            turnover: self.turnover,
            transaction_count: self.transaction_count,
        }
    }
}
