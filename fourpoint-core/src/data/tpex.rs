//! OTC-market daily report (TPEx `stk_wn1430`, HTML).
//!
//! The quote table carries a two-level header: a title row (with the ROC data
//! date) spanning the table, then the real column names. Dates leave this
//! module as Gregorian.

use super::calendar::{gregorian_to_roc, roc_to_gregorian};
use super::normalize::{parse_count, parse_decimal, strip_markup};
use super::provider::{FetchError, FetchResult, HttpSession, SourceAdapter};
use super::record::{CanonicalRecord, DailyReport};
use crate::domain::{Symbol, Venue};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};

const DATE_MARKER: &str = "資料日期";

pub fn report_url(date: NaiveDate) -> FetchResult<String> {
    let roc = gregorian_to_roc(date).map_err(|e| FetchError::parse(e.to_string()))?;
    Ok(format!(
        "https://www.tpex.org.tw/web/stock/aftertrading/otc_quotes_no1430/stk_wn1430_result.php?l=zh-tw&o=htm&d={roc}&se=AL&s=0,asc,0"
    ))
}

pub(crate) fn selector(css: &str) -> FetchResult<Selector> {
    Selector::parse(css).map_err(|e| FetchError::parse(format!("selector '{css}': {e}")))
}

pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Header label without whitespace or the parenthesised unit (`成交金額(元)` → `成交金額`).
fn base_label(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(['(', '（'])
        .next()
        .unwrap_or("")
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpexColumns {
    pub code: usize,
    pub close: usize,
    pub change: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub volume: usize,
    pub turnover: usize,
    pub transactions: usize,
}

impl TpexColumns {
    pub fn locate(header: &[String]) -> FetchResult<Self> {
        let labels: Vec<String> = header.iter().map(|h| base_label(h)).collect();
        let find = |name: &str| {
            labels
                .iter()
                .position(|l| l == name)
                .ok_or_else(|| FetchError::parse(format!("TPEx header missing column '{name}'")))
        };
        Ok(Self {
            code: find("代號")?,
            close: find("收盤")?,
            change: find("漲跌")?,
            open: find("開盤")?,
            high: find("最高")?,
            low: find("最低")?,
            volume: find("成交股數")?,
            turnover: find("成交金額")?,
            transactions: find("成交筆數")?,
        })
    }

    fn record(&self, cells: &[String], date: NaiveDate) -> Option<CanonicalRecord> {
        let cell = |i: usize| cells.get(i).map(String::as_str).unwrap_or("");
        let code = cell(self.code).trim();
        if code.is_empty() {
            return None;
        }
        Some(CanonicalRecord {
            symbol: Symbol::otc(code),
            date,
            open: parse_decimal(cell(self.open)),
            high: parse_decimal(cell(self.high)),
            low: parse_decimal(cell(self.low)),
            close: parse_decimal(cell(self.close)),
            volume: parse_count(cell(self.volume)),
            turnover: parse_count(cell(self.turnover)),
            transaction_count: parse_count(cell(self.transactions)),
            change: parse_decimal(&strip_markup(cell(self.change))),
        })
    }
}

/// `"…資料日期:113/10/11…"` → `"113/10/11"`.
fn find_roc_date(text: &str) -> Option<&str> {
    let at = text.find(DATE_MARKER)? + DATE_MARKER.len();
    let rest = text[at..].trim_start_matches([':', '：', ' ']);
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '/'))
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

/// Parse the report page. `requested` is used when the page carries no date.
pub fn parse_report(html: &str, requested: NaiveDate) -> FetchResult<DailyReport> {
    if html.trim().is_empty() {
        return Ok(DailyReport::empty(requested, Venue::Otc));
    }

    let doc = Html::parse_document(html);
    let table = doc
        .select(&selector("table")?)
        .next()
        .ok_or_else(|| FetchError::parse("TPEx page has no quote table"))?;

    let row_sel = selector("tr")?;
    let th_sel = selector("th")?;
    let td_sel = selector("td")?;

    let mut header_rows: Vec<Vec<String>> = Vec::new();
    let mut data_rows: Vec<Vec<String>> = Vec::new();
    for row in table.select(&row_sel) {
        let heads: Vec<String> = row.select(&th_sel).map(text_of).collect();
        if !heads.is_empty() {
            header_rows.push(heads);
            continue;
        }
        data_rows.push(row.select(&td_sel).map(text_of).collect());
    }

    let header = header_rows
        .last()
        .ok_or_else(|| FetchError::parse("TPEx table has no header row"))?;
    let columns = TpexColumns::locate(header)?;

    let date = match header_rows.first().and_then(|r| r.iter().find_map(|c| find_roc_date(c))) {
        Some(roc) => {
            let parsed = roc_to_gregorian(roc).map_err(|e| FetchError::parse(e.to_string()))?;
            if parsed != requested {
                debug!(%requested, %parsed, "TPEx report dated differently from request");
            }
            parsed
        }
        None => requested,
    };

    let mut records = Vec::new();
    for cells in &data_rows {
        if cells.len() != header.len() {
            break;
        }
        if let Some(record) = columns.record(cells, date) {
            records.push(record);
        }
    }

    Ok(DailyReport {
        date,
        venue: Venue::Otc,
        records,
    })
}

/// Adapter for the OTC daily report. Key: trading date (Gregorian).
#[derive(Debug, Clone)]
pub struct TpexDailyReport {
    session: Arc<HttpSession>,
}

impl TpexDailyReport {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

impl SourceAdapter for TpexDailyReport {
    type Key = NaiveDate;
    type Payload = DailyReport;

    fn name(&self) -> &str {
        "tpex-daily"
    }

    fn fetch(&self, date: &NaiveDate) -> FetchResult<DailyReport> {
        let html = self.session.get_text(&report_url(*date)?)?;
        let report = parse_report(&html, *date)?;
        info!(%date, records = report.len(), "TPEx daily report parsed");
        Ok(report)
    }
}
