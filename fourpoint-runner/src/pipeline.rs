//! Pipeline batches: the fetch and evaluation steps the CLI strings together.
//!
//! Market-wide daily reports are single synchronous calls per date.
//! Per-symbol sources (fundamentals, realtime batches) go through the
//! [`Orchestrator`]. Assembly and evaluation always happen on the caller's
//! thread after collection.

use crate::orchestrator::{BatchProgress, BatchReport, Orchestrator};
use crate::store::{self, StoreError};
use chrono::{Datelike, NaiveDate, Weekday};
use fourpoint_core::assemble::{IngestReport, SeriesAssembler};
use fourpoint_core::data::{
    CanonicalRecord, DailyReport, FetchError, FetchResult, FundamentalsScraper, HttpSession,
    HttpTransport, RealtimeResponse, RealtimeSession, SessionConfig, SourceAdapter,
    TpexDailyReport, TwseDailyReport,
};
use fourpoint_core::domain::{FundamentalsSnapshot, Quote, Symbol, Verdict};
use fourpoint_core::rules::SignalEvaluator;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ─── Sessions ────────────────────────────────────────────────────────

/// One HTTP session per source, so each has its own circuit breaker.
#[derive(Debug, Clone)]
pub struct Sessions {
    pub twse: Arc<HttpSession>,
    pub tpex: Arc<HttpSession>,
    pub yahoo: Arc<HttpSession>,
    pub mis: Arc<HttpSession>,
}

impl Sessions {
    pub fn connect(config: &SessionConfig) -> FetchResult<Self> {
        let open = |name: &str| HttpSession::connect(name, config).map(Arc::new);
        Ok(Self {
            twse: open("twse")?,
            tpex: open("tpex")?,
            yahoo: open("yahoo")?,
            mis: open("mis")?,
        })
    }

    /// Every source over the same transport. Breakers stay separate.
    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: &SessionConfig) -> Self {
        let open = |name: &str| Arc::new(HttpSession::new(name, Arc::clone(&transport), config));
        Self {
            twse: open("twse"),
            tpex: open("tpex"),
            yahoo: open("yahoo"),
            mis: open("mis"),
        }
    }
}

// ─── Daily reports ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub date: NaiveDate,
    pub error: FetchError,
}

/// Both market reports for one date.
#[derive(Debug, Clone, Default)]
pub struct DailyFetch {
    pub reports: Vec<DailyReport>,
    pub failures: Vec<SourceFailure>,
}

impl DailyFetch {
    pub fn record_count(&self) -> usize {
        self.reports.iter().map(DailyReport::len).sum()
    }
}

fn fetch_report<A>(adapter: &A, date: NaiveDate, out: &mut DailyFetch)
where
    A: SourceAdapter<Key = NaiveDate, Payload = DailyReport>,
{
    match adapter.fetch(&date) {
        Ok(report) => out.reports.push(report),
        Err(error) => {
            warn!(source = adapter.name(), %date, %error, "daily report failed");
            out.failures.push(SourceFailure {
                source: adapter.name().to_string(),
                date,
                error,
            });
        }
    }
}

/// Listed then OTC report for `date`, one after the other.
pub fn fetch_daily(sessions: &Sessions, date: NaiveDate) -> DailyFetch {
    let mut out = DailyFetch::default();
    fetch_report(&TwseDailyReport::new(Arc::clone(&sessions.twse)), date, &mut out);
    fetch_report(&TpexDailyReport::new(Arc::clone(&sessions.tpex)), date, &mut out);
    info!(
        %date,
        records = out.record_count(),
        failures = out.failures.len(),
        "daily reports fetched"
    );
    out
}

#[derive(Debug, Clone, Default)]
pub struct HistoryReport {
    /// Records the assembler appended, in date order.
    pub records: Vec<CanonicalRecord>,
    pub ingest: IngestReport,
    /// Dates with at least one non-empty report.
    pub trading_days: usize,
    pub failures: Vec<SourceFailure>,
}

/// Daily reports over `dates` in ascending order, fed into `assembler`.
///
/// A failed date is reported and skipped; later dates still load.
pub fn fetch_history(
    sessions: &Sessions,
    dates: &[NaiveDate],
    assembler: &mut SeriesAssembler,
) -> HistoryReport {
    let mut dates = dates.to_vec();
    dates.sort_unstable();
    dates.dedup();

    let mut history = HistoryReport::default();
    for date in dates {
        let daily = fetch_daily(sessions, date);
        if daily.reports.iter().any(|r| !r.is_empty()) {
            history.trading_days += 1;
        }
        for report in daily.reports {
            debug!(%date, venue = ?report.venue, records = report.len(), "ingesting daily report");
            let (ingest, accepted) = assembler.ingest_accepted(report.records);
            history.records.extend(accepted);
            history.ingest.absorb(ingest);
        }
        history.failures.extend(daily.failures);
    }
    info!(
        trading_days = history.trading_days,
        appended = history.ingest.appended,
        rejected = history.ingest.rejected.len(),
        failures = history.failures.len(),
        "history loaded"
    );
    history
}

/// Fetch `dates` and append what is new to the record store at `path`.
///
/// The assembler is seeded from the store first, so sessions already stored
/// come back as ordering rejections and are not written again. A missing
/// store starts empty.
pub fn update_store(
    sessions: &Sessions,
    dates: &[NaiveDate],
    path: &Path,
) -> Result<HistoryReport, StoreError> {
    let mut assembler = if path.exists() {
        let (assembler, loaded) = store::load_assembler(path)?;
        if !loaded.rejected.is_empty() {
            warn!(
                path = %path.display(),
                rejected = loaded.rejected.len(),
                "stored records rejected on load"
            );
        }
        assembler
    } else {
        SeriesAssembler::new()
    };

    let history = fetch_history(sessions, dates, &mut assembler);
    store::append_records(path, &history.records)?;
    info!(
        path = %path.display(),
        written = history.records.len(),
        not_written = history.ingest.rejected.len(),
        "record store updated"
    );
    Ok(history)
}

/// The `count` weekdays ending at `end` (inclusive), oldest first.
///
/// Exchange holidays are not known here; their reports come back empty.
/// Stops early at the first representable date.
pub fn weekdays_ending(end: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut next = Some(end);
    while days.len() < count {
        let Some(day) = next else { break };
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        next = day.pred_opt();
    }
    days.reverse();
    days
}

// ─── Per-symbol batches ──────────────────────────────────────────────

/// Concurrent fundamentals scrape, one job per symbol.
pub fn fetch_fundamentals(
    orchestrator: &Orchestrator,
    sessions: &Sessions,
    symbols: Vec<Symbol>,
    progress: &dyn BatchProgress,
) -> BatchReport<Symbol, FundamentalsSnapshot> {
    let scraper = FundamentalsScraper::new(Arc::clone(&sessions.yahoo));
    orchestrator.run_batch_weighted(
        "fundamentals",
        symbols,
        FundamentalsScraper::REQUESTS_PER_SYMBOL,
        move |symbol| scraper.fetch(symbol),
        progress,
    )
}

/// Symbols sent in one realtime request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolBatch(pub Vec<Symbol>);

impl fmt::Display for SymbolBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "[]"),
            [only] => write!(f, "[{only}]"),
            [first, .., last] => write!(f, "[{first}..{last}, {} symbols]", self.0.len()),
        }
    }
}

/// Outcome of [`fetch_realtime`]. Each answered batch keeps its
/// [`RealtimeResponse`], so an empty query stays distinct from a reply.
#[derive(Debug)]
pub struct RealtimeFetch {
    pub report: BatchReport<SymbolBatch, RealtimeResponse>,
}

impl RealtimeFetch {
    /// Every quote received, in batch order.
    pub fn quotes(&self) -> impl Iterator<Item = &Quote> {
        self.report.successes.iter().flat_map(|(_, r)| r.quotes())
    }

    /// Batches the service answered with an empty query.
    pub fn empty_batches(&self) -> impl Iterator<Item = &SymbolBatch> {
        self.report
            .successes
            .iter()
            .filter(|(_, r)| r.is_empty_query())
            .map(|(batch, _)| batch)
    }

    /// True when every batch was answered and every answer was empty.
    pub fn is_empty_query(&self) -> bool {
        !self.report.successes.is_empty()
            && self.report.all_succeeded()
            && self.report.successes.iter().all(|(_, r)| r.is_empty_query())
    }

    /// Symbols of answered batches that got no quote back.
    pub fn missing(&self) -> Vec<&Symbol> {
        self.report
            .successes
            .iter()
            .flat_map(|(batch, r)| r.missing(&batch.0))
            .collect()
    }
}

/// Realtime quotes in chunks of `batch_size` symbols.
///
/// One realtime session is established for this call and shared by its
/// chunks; a later call establishes a fresh one.
pub fn fetch_realtime(
    orchestrator: &Orchestrator,
    sessions: &Sessions,
    symbols: &[Symbol],
    batch_size: usize,
    progress: &dyn BatchProgress,
) -> FetchResult<RealtimeFetch> {
    let batches: Vec<SymbolBatch> = symbols
        .chunks(batch_size.max(1))
        .map(|chunk| SymbolBatch(chunk.to_vec()))
        .collect();
    let session = Arc::new(RealtimeSession::establish(Arc::clone(&sessions.mis))?);
    let fetch = RealtimeFetch {
        report: orchestrator.run_batch(
            "realtime",
            batches,
            move |batch| session.quotes(&batch.0),
            progress,
        ),
    };
    info!(
        quotes = fetch.quotes().count(),
        empty_batches = fetch.empty_batches().count(),
        missing = fetch.missing().len(),
        failed = fetch.report.failures.len(),
        "realtime fetch finished"
    );
    Ok(fetch)
}

/// Overlay every quote onto `assembler`; returns how many were applied.
pub fn overlay_realtime(assembler: &mut SeriesAssembler, quotes: &[Quote]) -> usize {
    let errors = assembler.overlay_quotes(quotes);
    for error in &errors {
        warn!(%error, "quote not overlaid");
    }
    quotes.len() - errors.len()
}

// ─── Evaluation ──────────────────────────────────────────────────────

/// Verdict for every symbol the assembler holds.
pub fn evaluate_all(
    evaluator: &SignalEvaluator,
    assembler: &SeriesAssembler,
) -> BTreeMap<Symbol, Verdict> {
    let verdicts: BTreeMap<Symbol, Verdict> = assembler
        .all_series()
        .map(|series| (series.symbol().clone(), evaluator.evaluate(series)))
        .collect();
    let buys = verdicts.values().filter(|v| v.is_buy()).count();
    let insufficient = verdicts
        .values()
        .filter(|v| matches!(v, Verdict::Insufficient { .. }))
        .count();
    info!(symbols = verdicts.len(), buys, insufficient, "evaluation finished");
    verdicts
}
