//! Realtime quote for one symbol.

use super::symbol::Symbol;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

/// One rung of a bid or ask ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Level {
    pub price: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub name: String,
    pub full_name: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub session_date: NaiveDate,
    /// Latest trade price. `None` when nothing has traded yet this session.
    pub latest_trade_price: Option<f64>,
    pub trade_volume: Option<u64>,
    pub accumulated_volume: Option<u64>,
    /// Best bid first, up to five levels.
    pub bids: Vec<Level>,
    /// Best ask first, up to five levels.
    pub asks: Vec<Level>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub previous_close: Option<f64>,
}

impl Quote {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Price used as the session close: the latest trade, else the best bid.
    pub fn live_price(&self) -> Option<f64> {
        self.latest_trade_price.or_else(|| self.best_bid())
    }
}
