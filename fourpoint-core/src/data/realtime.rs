//! TWSE market-information realtime quotes (MIS `getStockInfo.jsp`).
//!
//! A priming GET of the index page establishes session cookies; the batched
//! quote request then names every symbol as `tse_2330.tw|otc_6488.tw`. The
//! service answers with compact single-letter keys and underscore-joined
//! five-level ladders (`"1045.0000_1040.0000_…_"`).

use super::calendar::parse_compact_date;
use super::normalize::{parse_count, parse_decimal};
use super::provider::{FailureKind, FetchError, FetchResult, HttpSession, SourceAdapter};
use crate::domain::{Level, Quote, Symbol, Venue};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const SESSION_URL: &str = "http://mis.twse.com.tw/stock/index.jsp";
pub const QUOTE_URL: &str = "http://mis.twse.com.tw/stock/api/getStockInfo.jsp";

/// Exchange local time (UTC+8).
const TAIPEI_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "msgArray", default)]
    msg_array: Vec<RawQuote>,
    #[serde(default)]
    rtcode: Option<String>,
    #[serde(default)]
    rtmessage: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuote {
    c: String,
    ex: Option<String>,
    n: Option<String>,
    nf: Option<String>,
    tlong: Option<String>,
    d: Option<String>,
    z: Option<String>,
    tv: Option<String>,
    v: Option<String>,
    b: Option<String>,
    g: Option<String>,
    a: Option<String>,
    f: Option<String>,
    o: Option<String>,
    h: Option<String>,
    l: Option<String>,
    y: Option<String>,
}

/// Outcome of a realtime query.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeResponse {
    Quotes(Vec<Quote>),
    /// The service answered but returned no quotes (market closed, unknown codes).
    EmptyQuery,
}

impl RealtimeResponse {
    pub fn is_empty_query(&self) -> bool {
        matches!(self, RealtimeResponse::EmptyQuery)
    }

    /// Requested symbols the reply carries no quote for.
    pub fn missing<'a>(&self, requested: &'a [Symbol]) -> Vec<&'a Symbol> {
        match self {
            RealtimeResponse::EmptyQuery => requested.iter().collect(),
            RealtimeResponse::Quotes(quotes) => requested
                .iter()
                .filter(|s| !quotes.iter().any(|q| &q.symbol == *s))
                .collect(),
        }
    }

    pub fn quotes(&self) -> &[Quote] {
        match self {
            RealtimeResponse::Quotes(q) => q,
            RealtimeResponse::EmptyQuery => &[],
        }
    }

    /// Drops the empty-query distinction; check it before calling this.
    pub fn into_quotes(self) -> Vec<Quote> {
        match self {
            RealtimeResponse::Quotes(q) => q,
            RealtimeResponse::EmptyQuery => Vec::new(),
        }
    }
}

/// `ex_ch` value for a symbol batch.
pub fn channel_query(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(Symbol::channel_key)
        .collect::<Vec<_>>()
        .join("|")
}

pub fn quote_url(symbols: &[Symbol], cache_buster_millis: i64) -> String {
    format!(
        "{QUOTE_URL}?ex_ch={}&_={cache_buster_millis}",
        channel_query(symbols)
    )
}

fn opt_decimal(v: &Option<String>) -> Option<f64> {
    v.as_deref().and_then(parse_decimal)
}

fn opt_count(v: &Option<String>) -> Option<u64> {
    v.as_deref().and_then(parse_count)
}

/// Zip an underscore-joined price ladder with its volume ladder.
fn ladder(prices: &Option<String>, volumes: &Option<String>) -> Vec<Level> {
    let Some(prices) = prices.as_deref() else {
        return Vec::new();
    };
    let mut vols = volumes
        .as_deref()
        .unwrap_or("")
        .trim_matches('_')
        .split('_');
    prices
        .trim_matches('_')
        .split('_')
        .filter_map(|p| {
            let volume = vols.next().and_then(parse_count).unwrap_or(0);
            parse_decimal(p).map(|price| Level { price, volume })
        })
        .collect()
}

fn taipei() -> FetchResult<FixedOffset> {
    FixedOffset::east_opt(TAIPEI_OFFSET_SECS)
        .ok_or_else(|| FetchError::parse("invalid exchange offset"))
}

fn convert(raw: RawQuote, requested: &[Symbol]) -> FetchResult<Quote> {
    let code = raw.c.trim();
    if code.is_empty() {
        return Err(FetchError::parse("quote without code"));
    }
    let venue = raw
        .ex
        .as_deref()
        .and_then(Venue::from_market_label)
        .or_else(|| requested.iter().find(|s| s.code() == code).map(Symbol::venue))
        .ok_or_else(|| FetchError::parse(format!("cannot tell venue of '{code}'")))?;

    let timestamp = match raw.tlong.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(ms) => {
            let bad = || FetchError::parse(format!("bad tlong '{ms}'"));
            let ms: i64 = ms.parse().map_err(|_| bad())?;
            let utc = DateTime::from_timestamp_millis(ms).ok_or_else(bad)?;
            Some(utc.with_timezone(&taipei()?))
        }
        None => None,
    };

    let session_date: NaiveDate = match raw.d.as_deref() {
        Some(d) if !d.trim().is_empty() => {
            parse_compact_date(d).map_err(|e| FetchError::parse(e.to_string()))?
        }
        _ => timestamp
            .map(|t| t.date_naive())
            .ok_or_else(|| FetchError::parse(format!("quote for '{code}' has no session date")))?,
    };

    Ok(Quote {
        symbol: Symbol::new(code, venue),
        name: raw.n.clone().unwrap_or_default(),
        full_name: raw.nf.clone().unwrap_or_default(),
        timestamp,
        session_date,
        latest_trade_price: opt_decimal(&raw.z),
        trade_volume: opt_count(&raw.tv),
        accumulated_volume: opt_count(&raw.v),
        bids: ladder(&raw.b, &raw.g),
        asks: ladder(&raw.a, &raw.f),
        open: opt_decimal(&raw.o),
        high: opt_decimal(&raw.h),
        low: opt_decimal(&raw.l),
        previous_close: opt_decimal(&raw.y),
    })
}

/// Parse a quote payload. `requested` resolves venues the payload omits.
pub fn parse_payload(body: &[u8], requested: &[Symbol]) -> FetchResult<RealtimeResponse> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| FetchError::parse(format!("realtime JSON: {e}")))?;

    if envelope.msg_array.is_empty() {
        debug!(
            rtcode = envelope.rtcode.as_deref().unwrap_or(""),
            rtmessage = envelope.rtmessage.as_deref().unwrap_or(""),
            "empty realtime query"
        );
        return Ok(RealtimeResponse::EmptyQuery);
    }

    let quotes = envelope
        .msg_array
        .into_iter()
        .map(|raw| convert(raw, requested))
        .collect::<FetchResult<Vec<_>>>()?;
    Ok(RealtimeResponse::Quotes(quotes))
}

/// A primed realtime session. Establish one per batch; do not reuse.
#[derive(Debug)]
pub struct RealtimeSession {
    http: Arc<HttpSession>,
}

impl RealtimeSession {
    pub fn establish(http: Arc<HttpSession>) -> FetchResult<Self> {
        http.get_bytes(SESSION_URL)?;
        debug!("realtime session established");
        Ok(Self { http })
    }

    /// One batched quote request. Transport failures and malformed payloads
    /// are retried up to the session's retry bound.
    pub fn quotes(&self, symbols: &[Symbol]) -> FetchResult<RealtimeResponse> {
        if symbols.is_empty() {
            return Ok(RealtimeResponse::EmptyQuery);
        }
        let retryable = |e: &FetchError| e.is_transport() || e.kind() == FailureKind::Parse;
        self.http.retry_policy().run(retryable, |_| {
            let url = quote_url(symbols, chrono::Utc::now().timestamp_millis());
            let body = self.http.get_once(&url)?;
            parse_payload(&body, symbols)
        })
    }
}

/// Realtime adapter. Key: a batch of symbols.
#[derive(Debug, Clone)]
pub struct RealtimeQuotes {
    http: Arc<HttpSession>,
}

impl RealtimeQuotes {
    pub fn new(http: Arc<HttpSession>) -> Self {
        Self { http }
    }
}

impl SourceAdapter for RealtimeQuotes {
    type Key = Vec<Symbol>;
    type Payload = RealtimeResponse;

    fn name(&self) -> &str {
        "mis-realtime"
    }

    fn fetch(&self, symbols: &Vec<Symbol>) -> FetchResult<RealtimeResponse> {
        let session = RealtimeSession::establish(Arc::clone(&self.http))?;
        let response = session.quotes(symbols)?;
        if let RealtimeResponse::Quotes(q) = &response {
            info!(requested = symbols.len(), received = q.len(), "realtime quotes");
        }
        Ok(response)
    }
}
