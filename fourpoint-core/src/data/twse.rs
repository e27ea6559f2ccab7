//! Listed-market daily report (TWSE `MI_INDEX`, CSV).
//!
//! The body is MS950 text with several tables stacked one after another. The
//! per-security table starts at the row whose first cell is `證券代號` and ends
//! at the first row whose width differs from that header. Cells arrive as
//! spreadsheet escapes (`="0050"`) that are not valid CSV until unwrapped.

use super::normalize::{clean_cell, parse_count, parse_decimal, parse_signed_change};
use super::provider::{FetchError, FetchResult, HttpSession, SourceAdapter};
use super::record::{CanonicalRecord, DailyReport};
use crate::data::calendar::compact;
use crate::domain::{Symbol, Venue};
use chrono::NaiveDate;
use csv::StringRecord;
use std::sync::Arc;
use tracing::{debug, info};

pub const HEADER_SENTINEL: &str = "證券代號";

pub fn report_url(date: NaiveDate) -> String {
    format!(
        "https://www.twse.com.tw/exchangeReport/MI_INDEX?response=csv&date={}&type=ALL",
        compact(date)
    )
}

/// Positions of the columns we read, located by header name.
///
/// Trailing display-only columns (last bid/ask, PE, the empty column left by
/// the trailing comma) are never looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwseColumns {
    pub code: usize,
    pub volume: usize,
    pub transactions: usize,
    pub turnover: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub sign: usize,
    pub change: usize,
}

impl TwseColumns {
    pub fn locate(header: &StringRecord) -> FetchResult<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| clean_cell(h) == name)
                .ok_or_else(|| FetchError::parse(format!("TWSE header missing column '{name}'")))
        };
        Ok(Self {
            code: find(HEADER_SENTINEL)?,
            volume: find("成交股數")?,
            transactions: find("成交筆數")?,
            turnover: find("成交金額")?,
            open: find("開盤價")?,
            high: find("最高價")?,
            low: find("最低價")?,
            close: find("收盤價")?,
            sign: find("漲跌(+/-)")?,
            change: find("漲跌價差")?,
        })
    }

    fn record(&self, row: &StringRecord, date: NaiveDate) -> Option<CanonicalRecord> {
        let cell = |i: usize| row.get(i).unwrap_or("");
        let code = clean_cell(cell(self.code));
        if code.is_empty() {
            return None;
        }
        Some(CanonicalRecord {
            symbol: Symbol::listed(code),
            date,
            open: parse_decimal(cell(self.open)),
            high: parse_decimal(cell(self.high)),
            low: parse_decimal(cell(self.low)),
            close: parse_decimal(cell(self.close)),
            volume: parse_count(cell(self.volume)),
            turnover: parse_count(cell(self.turnover)),
            transaction_count: parse_count(cell(self.transactions)),
            change: parse_signed_change(cell(self.sign), cell(self.change)),
        })
    }
}

/// Parse a raw (MS950) report body. A blank body is a non-trading day.
pub fn parse_report(body: &[u8], date: NaiveDate) -> FetchResult<DailyReport> {
    let (text, _, had_errors) = encoding_rs::BIG5.decode(body);
    if had_errors {
        debug!(%date, "TWSE body contained undecodable bytes");
    }
    parse_text(&text, date)
}

/// Parse an already-decoded report.
pub fn parse_text(text: &str, date: NaiveDate) -> FetchResult<DailyReport> {
    if text.trim().is_empty() {
        return Ok(DailyReport::empty(date, Venue::Listed));
    }

    let unescaped = text.replace("=\"", "\"");
    let start = find_table_start(&unescaped).ok_or_else(|| {
        FetchError::parse(format!("TWSE report for {date} has no '{HEADER_SENTINEL}' header"))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(unescaped[start..].as_bytes());

    let mut rows = reader.records();
    let header = match rows.next() {
        Some(Ok(h)) => h,
        Some(Err(e)) => return Err(FetchError::parse(format!("TWSE header: {e}"))),
        None => return Err(FetchError::parse("TWSE header row vanished")),
    };
    let columns = TwseColumns::locate(&header)?;

    let mut records = Vec::new();
    for row in rows {
        let row = row.map_err(|e| FetchError::parse(format!("TWSE row: {e}")))?;
        if row.len() != header.len() {
            break;
        }
        if let Some(record) = columns.record(&row, date) {
            records.push(record);
        }
    }

    Ok(DailyReport {
        date,
        venue: Venue::Listed,
        records,
    })
}

fn find_table_start(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let first = line.split(',').next().unwrap_or("");
        if clean_cell(first) == HEADER_SENTINEL {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Adapter for the listed-market daily report. Key: trading date.
#[derive(Debug, Clone)]
pub struct TwseDailyReport {
    session: Arc<HttpSession>,
}

impl TwseDailyReport {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

impl SourceAdapter for TwseDailyReport {
    type Key = NaiveDate;
    type Payload = DailyReport;

    fn name(&self) -> &str {
        "twse-daily"
    }

    fn fetch(&self, date: &NaiveDate) -> FetchResult<DailyReport> {
        let body = self.session.get_bytes(&report_url(*date))?;
        let report = parse_report(&body, *date)?;
        info!(%date, records = report.len(), "TWSE daily report parsed");
        Ok(report)
    }
}
