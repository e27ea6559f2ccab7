//! Canonical series assembler.
//!
//! Merges adapter output into per-symbol histories and fundamentals
//! snapshots. Runs single-threaded after collection; every record that does
//! not make it into a series is counted or reported, never dropped silently.

use crate::data::{CanonicalRecord, DailyReport};
use crate::domain::{
    Activity, FundamentalsSnapshot, Ohlc, PricePoint, PricePointError, Quote, SeriesError, Symbol,
    SymbolSeries,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The series refused the point (date not after its last date).
    Ordering(SeriesError),
    /// Prices violated a PricePoint invariant.
    Invalid(PricePointError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub appended: usize,
    /// Records missing any of open/high/low/close (no trades that session).
    pub skipped_no_trade: usize,
    pub rejected: Vec<Rejection>,
}

impl IngestReport {
    pub fn absorb(&mut self, other: IngestReport) {
        self.appended += other.appended;
        self.skipped_no_trade += other.skipped_no_trade;
        self.rejected.extend(other.rejected);
    }

    pub fn total(&self) -> usize {
        self.appended + self.skipped_no_trade + self.rejected.len()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OverlayError {
    #[error("{0}: no finalized history to overlay onto")]
    NoHistory(Symbol),

    #[error("{0}: quote has neither a trade price nor a bid")]
    NoPrice(Symbol),

    #[error("{symbol}: synthetic point is invalid: {source}")]
    Invalid {
        symbol: Symbol,
        source: PricePointError,
    },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

#[derive(Debug, Clone, Default)]
pub struct SeriesAssembler {
    series: BTreeMap<Symbol, SymbolSeries>,
    fundamentals: BTreeMap<Symbol, FundamentalsSnapshot>,
}

impl SeriesAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge records in the order given.
    pub fn ingest(&mut self, records: impl IntoIterator<Item = CanonicalRecord>) -> IngestReport {
        let mut report = IngestReport::default();
        for record in records {
            self.ingest_one(&record, &mut report);
        }
        if !report.rejected.is_empty() {
            warn!(rejected = report.rejected.len(), "records rejected during ingest");
        }
        report
    }

    /// Like [`ingest`](Self::ingest), also handing back the records that
    /// were appended, in order. No-trade and rejected records are left out.
    pub fn ingest_accepted(
        &mut self,
        records: impl IntoIterator<Item = CanonicalRecord>,
    ) -> (IngestReport, Vec<CanonicalRecord>) {
        let mut report = IngestReport::default();
        let mut accepted = Vec::new();
        for record in records {
            if self.ingest_one(&record, &mut report) {
                accepted.push(record);
            }
        }
        if !report.rejected.is_empty() {
            debug!(rejected = report.rejected.len(), "records not appended");
        }
        (report, accepted)
    }

    pub fn ingest_report(&mut self, daily: DailyReport) -> IngestReport {
        debug!(date = %daily.date, venue = ?daily.venue, records = daily.len(), "ingesting daily report");
        self.ingest(daily.records)
    }

    /// True when the record was appended.
    fn ingest_one(&mut self, record: &CanonicalRecord, report: &mut IngestReport) -> bool {
        let Some(prices) = record.prices() else {
            report.skipped_no_trade += 1;
            return false;
        };

        let series = self
            .series
            .entry(record.symbol.clone())
            .or_insert_with(|| SymbolSeries::new(record.symbol.clone()));

        let change = record.change.unwrap_or_else(|| {
            series
                .last_finalized()
                .map_or(0.0, |prev| prices.close - prev.close())
        });
        let activity = Activity {
            volume: record.volume.unwrap_or(0),
            turnover: record.turnover.unwrap_or(0),
            transaction_count: record.transaction_count.unwrap_or(0),
        };

        let reject = |reason| Rejection {
            symbol: record.symbol.clone(),
            date: record.date,
            reason,
        };

        let point = match PricePoint::new(record.date, prices, activity, change) {
            Ok(p) => p,
            Err(e) => {
                warn!(symbol = %record.symbol, date = %record.date, error = %e, "invalid record");
                report.rejected.push(reject(RejectReason::Invalid(e)));
                return false;
            }
        };

        match series.append(point) {
            Ok(()) => {
                report.appended += 1;
                true
            }
            Err(e) => {
                debug!(error = %e, "out-of-order record");
                report.rejected.push(reject(RejectReason::Ordering(e)));
                false
            }
        }
    }

    /// Newer values win; fields the newer snapshot lacks keep their old value.
    pub fn merge_fundamentals(&mut self, mut snapshot: FundamentalsSnapshot) {
        if let Some(old) = self.fundamentals.get(&snapshot.symbol) {
            snapshot.fill_missing_from(old);
        }
        self.fundamentals.insert(snapshot.symbol.clone(), snapshot);
    }

    /// Place a synthetic current-session point built from a live quote.
    ///
    /// Volume, turnover and transaction count are carried forward from the
    /// last finalized point; OHLC come from the quote, with close = latest
    /// trade (else best bid) and high/low widened to contain open and close.
    pub fn overlay_quote(&mut self, quote: &Quote) -> Result<(), OverlayError> {
        let symbol = &quote.symbol;
        let series = self
            .series
            .get_mut(symbol)
            .ok_or_else(|| OverlayError::NoHistory(symbol.clone()))?;
        let last = series
            .last_finalized()
            .ok_or_else(|| OverlayError::NoHistory(symbol.clone()))?;

        let close = quote
            .live_price()
            .ok_or_else(|| OverlayError::NoPrice(symbol.clone()))?;
        let open = quote.open.unwrap_or(close);
        let prices = Ohlc {
            open,
            high: quote.high.unwrap_or(close).max(open).max(close),
            low: quote.low.unwrap_or(close).min(open).min(close),
            close,
        };
        let change = close - quote.previous_close.unwrap_or_else(|| last.close());

        let point = PricePoint::new(quote.session_date, prices, last.activity(), change).map_err(
            |source| OverlayError::Invalid {
                symbol: symbol.clone(),
                source,
            },
        )?;
        series.overlay_live(point)?;
        Ok(())
    }

    /// Overlay every quote; failures are returned, not fatal.
    pub fn overlay_quotes<'a>(
        &mut self,
        quotes: impl IntoIterator<Item = &'a Quote>,
    ) -> Vec<OverlayError> {
        let mut failures = Vec::new();
        for quote in quotes {
            if let Err(e) = self.overlay_quote(quote) {
                warn!(error = %e, "realtime overlay skipped");
                failures.push(e);
            }
        }
        failures
    }

    pub fn series(&self, symbol: &Symbol) -> Option<&SymbolSeries> {
        self.series.get(symbol)
    }

    pub fn all_series(&self) -> impl Iterator<Item = &SymbolSeries> {
        self.series.values()
    }

    pub fn fundamentals(&self, symbol: &Symbol) -> Option<&FundamentalsSnapshot> {
        self.fundamentals.get(symbol)
    }

    pub fn all_fundamentals(&self) -> impl Iterator<Item = &FundamentalsSnapshot> {
        self.fundamentals.values()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.series.keys()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Hand the finished histories over for read-only use.
    pub fn into_parts(
        self,
    ) -> (
        BTreeMap<Symbol, SymbolSeries>,
        BTreeMap<Symbol, FundamentalsSnapshot>,
    ) {
        (self.series, self.fundamentals)
    }
}
