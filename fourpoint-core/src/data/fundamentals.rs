//! Yahoo Taiwan fundamentals scrape.
//!
//! Two documents per symbol over one shared session:
//! - `/quote/{code}/eps`: quarterly EPS table plus the quote header (PE, volume)
//! - `/quote/{code}/revenue`: monthly revenue table
//!
//! Values are found by structural position. A missing container means the
//! page has no data for that symbol, which is not an error.

use super::normalize::{parse_count, parse_decimal};
use super::provider::{FetchResult, HttpSession, SourceAdapter};
use super::tpex::{selector, text_of};
use crate::domain::{FundamentalsSnapshot, Symbol};
use scraper::{ElementRef, Html};
use std::sync::Arc;
use tracing::debug;

pub const EPS_SECTION: &str = "section#qsp-eps-table";
pub const REVENUE_SECTION: &str = "section#qsp-revenue-table";
pub const QUOTE_HEADER: &str = "div#main-0-QuoteHeader-Proxy";
pub const PE_BLOCK_CLASS: &str =
    "D(f) Fld(c) Ai(c) Fw(b) Px(8px) Bdendc($bd-primary-divider) Bdends(s) Bdendw(1px)";
pub const VOLUME_BLOCK_CLASS: &str =
    "D(f) Fld(c) Ai(c) Fw(b) Pend(8px) Bdendc($bd-primary-divider) Bdends(s) Bdendw(1px)";
pub const HEADER_VALUE_CLASS: &str = "Fz(16px) C($c-link-text) Mb(4px)";

/// Unclassed span positions inside the EPS table.
pub const EPS_NEWEST_SPAN: usize = 1;
pub const EPS_PREVIOUS_SPAN: usize = 3;
/// Unclassed span positions inside the revenue table.
pub const REVENUE_NEWEST_SPAN: usize = 0;
pub const REVENUE_PREVIOUS_SPAN: usize = 4;

pub fn eps_url(symbol: &Symbol) -> String {
    format!("https://tw.stock.yahoo.com/quote/{}/eps", symbol.code())
}

pub fn revenue_url(symbol: &Symbol) -> String {
    format!("https://tw.stock.yahoo.com/quote/{}/revenue", symbol.code())
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpsPage {
    pub eps_newest_quarter: Option<f64>,
    pub eps_previous_quarter: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevenuePage {
    pub revenue_newest_month: Option<u64>,
    pub revenue_previous_month: Option<u64>,
}

fn has_no_class(el: &ElementRef<'_>) -> bool {
    el.value().attr("class").map_or(true, |c| c.trim().is_empty())
}

fn has_class(el: &ElementRef<'_>, class: &str) -> bool {
    el.value().attr("class") == Some(class)
}

/// Text of every unclassed `<span>` under the first element matching `section`.
fn unclassed_spans(doc: &Html, section: &str) -> FetchResult<Option<Vec<String>>> {
    let Some(root) = doc.select(&selector(section)?).next() else {
        return Ok(None);
    };
    let span = selector("span")?;
    Ok(Some(
        root.select(&span)
            .filter(has_no_class)
            .map(text_of)
            .collect(),
    ))
}

/// First value span of the quote-header block whose class is exactly `block_class`.
fn header_value(doc: &Html, block_class: &str) -> FetchResult<Option<String>> {
    let Some(header) = doc.select(&selector(QUOTE_HEADER)?).next() else {
        return Ok(None);
    };
    let div = selector("div")?;
    let span = selector("span")?;
    let value = header
        .select(&div)
        .find(|d| has_class(d, block_class))
        .and_then(|block| block.select(&span).find(|s| has_class(s, HEADER_VALUE_CLASS)))
        .map(text_of);
    Ok(value)
}

pub fn parse_eps_page(html: &str) -> FetchResult<EpsPage> {
    let doc = Html::parse_document(html);
    let Some(spans) = unclassed_spans(&doc, EPS_SECTION)? else {
        debug!("no EPS section");
        return Ok(EpsPage::default());
    };

    let at = |i: usize| spans.get(i).and_then(|s| parse_decimal(s));
    let pe_ratio = header_value(&doc, PE_BLOCK_CLASS)?
        .and_then(|s| s.split_whitespace().next().and_then(parse_decimal));
    let volume = header_value(&doc, VOLUME_BLOCK_CLASS)?
        .and_then(|s| s.split_whitespace().next().and_then(parse_count));

    Ok(EpsPage {
        eps_newest_quarter: at(EPS_NEWEST_SPAN),
        eps_previous_quarter: at(EPS_PREVIOUS_SPAN),
        pe_ratio,
        volume,
    })
}

pub fn parse_revenue_page(html: &str) -> FetchResult<RevenuePage> {
    let doc = Html::parse_document(html);
    let Some(spans) = unclassed_spans(&doc, REVENUE_SECTION)? else {
        debug!("no revenue section");
        return Ok(RevenuePage::default());
    };
    let at = |i: usize| spans.get(i).and_then(|s| parse_count(s));
    Ok(RevenuePage {
        revenue_newest_month: at(REVENUE_NEWEST_SPAN),
        revenue_previous_month: at(REVENUE_PREVIOUS_SPAN),
    })
}

pub fn snapshot(symbol: Symbol, eps: EpsPage, revenue: RevenuePage) -> FundamentalsSnapshot {
    FundamentalsSnapshot {
        symbol,
        eps_previous_quarter: eps.eps_previous_quarter,
        eps_newest_quarter: eps.eps_newest_quarter,
        pe_ratio: eps.pe_ratio,
        volume_at_capture: eps.volume,
        revenue_previous_month: revenue.revenue_previous_month,
        revenue_newest_month: revenue.revenue_newest_month,
    }
}

/// Per-symbol fundamentals adapter.
#[derive(Debug, Clone)]
pub struct FundamentalsScraper {
    session: Arc<HttpSession>,
}

impl FundamentalsScraper {
    /// Documents fetched per symbol: the EPS page and the revenue page.
    pub const REQUESTS_PER_SYMBOL: u32 = 2;

    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

impl SourceAdapter for FundamentalsScraper {
    type Key = Symbol;
    type Payload = FundamentalsSnapshot;

    fn name(&self) -> &str {
        "yahoo-fundamentals"
    }

    fn fetch(&self, symbol: &Symbol) -> FetchResult<FundamentalsSnapshot> {
        let eps = parse_eps_page(&self.session.get_text(&eps_url(symbol))?)?;
        let revenue = parse_revenue_page(&self.session.get_text(&revenue_url(symbol))?)?;
        let snap = snapshot(symbol.clone(), eps, revenue);
        debug!(%symbol, empty = snap.is_empty(), "fundamentals scraped");
        Ok(snap)
    }
}
