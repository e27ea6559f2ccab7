//! SymbolSeries — a strictly date-ordered, append-only price history.
//!
//! At most one synthetic "current session" point may sit at the tail. It is
//! replaced by the next overlay and discarded as soon as a finalized point for
//! the same (or a later) session is appended.

use super::price_point::PricePoint;
use super::symbol::Symbol;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("{symbol}: point dated {date} does not follow last date {last}")]
    OutOfOrder {
        symbol: Symbol,
        date: NaiveDate,
        last: NaiveDate,
    },

    #[error("{symbol}: session {date} is already finalized")]
    SessionAlreadyFinalized { symbol: Symbol, date: NaiveDate },

    #[error("{symbol}: no finalized history to overlay onto")]
    NoHistory { symbol: Symbol },
}

#[derive(Debug, Clone)]
pub struct SymbolSeries {
    symbol: Symbol,
    points: Vec<PricePoint>,
    has_live: bool,
}

impl SymbolSeries {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            points: Vec::new(),
            has_live: false,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// All points, oldest first, including the live point if present.
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// The newest point that came from an official report.
    pub fn last_finalized(&self) -> Option<&PricePoint> {
        let finalized = self.finalized_len();
        finalized.checked_sub(1).map(|i| &self.points[i])
    }

    pub fn has_live_point(&self) -> bool {
        self.has_live
    }

    /// The most recent `n` points (fewer if the series is shorter).
    pub fn trailing(&self, n: usize) -> &[PricePoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }

    fn finalized_len(&self) -> usize {
        self.points.len() - usize::from(self.has_live)
    }

    /// Append a finalized point.
    ///
    /// The date must strictly exceed the current last date. A live point
    /// dated on or before the incoming session is superseded and dropped.
    /// On error the series is left untouched.
    pub fn append(&mut self, point: PricePoint) -> Result<(), SeriesError> {
        if let Some(last) = self.last_finalized() {
            if point.date() <= last.date() {
                return Err(SeriesError::OutOfOrder {
                    symbol: self.symbol.clone(),
                    date: point.date(),
                    last: last.date(),
                });
            }
        }

        if self.has_live {
            if let Some(live) = self.points.last() {
                if point.date() < live.date() {
                    return Err(SeriesError::OutOfOrder {
                        symbol: self.symbol.clone(),
                        date: point.date(),
                        last: live.date(),
                    });
                }
            }
            self.points.pop();
            self.has_live = false;
        }

        self.points.push(point);
        Ok(())
    }

    /// Place (or replace) the synthetic current-session point.
    pub fn overlay_live(&mut self, point: PricePoint) -> Result<(), SeriesError> {
        let Some(last) = self.last_finalized() else {
            return Err(SeriesError::NoHistory {
                symbol: self.symbol.clone(),
            });
        };

        if point.date() <= last.date() {
            return Err(SeriesError::SessionAlreadyFinalized {
                symbol: self.symbol.clone(),
                date: point.date(),
            });
        }

        if self.has_live {
            if let Some(live) = self.points.last() {
                if point.date() < live.date() {
                    return Err(SeriesError::OutOfOrder {
                        symbol: self.symbol.clone(),
                        date: point.date(),
                        last: live.date(),
                    });
                }
            }
            self.points.pop();
        }

        self.points.push(point);
        self.has_live = true;
        Ok(())
    }

    /// Drop the synthetic point, if any.
    pub fn clear_live(&mut self) {
        if self.has_live {
            self.points.pop();
            self.has_live = false;
        }
    }
}
