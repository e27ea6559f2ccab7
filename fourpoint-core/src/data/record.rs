//! Canonical record: the fixed-field-order row every adapter emits.

use crate::domain::{Ohlc, Symbol, Venue};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One symbol-session row before it is merged into a series.
///
/// Numeric fields are `None` where the source cell was blank or a placeholder.
/// Field order here is the flat-file column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
    pub turnover: Option<u64>,
    pub transaction_count: Option<u64>,
    pub change: Option<f64>,
}

impl CanonicalRecord {
    pub const HEADER: [&'static str; 10] = [
        "symbol",
        "date",
        "open",
        "high",
        "low",
        "close",
        "volume",
        "turnover",
        "transaction_count",
        "change",
    ];

    /// All four prices, or `None` if the symbol did not trade.
    pub fn prices(&self) -> Option<Ohlc> {
        Some(Ohlc {
            open: self.open?,
            high: self.high?,
            low: self.low?,
            close: self.close?,
        })
    }
}

/// Market-wide report for one venue and one trading date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub venue: Venue,
    pub records: Vec<CanonicalRecord>,
}

impl DailyReport {
    pub fn empty(date: NaiveDate, venue: Venue) -> Self {
        Self {
            date,
            venue,
            records: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
