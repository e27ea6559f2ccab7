//! Fundamentals snapshot captured at scrape time.

use super::symbol::Symbol;
use serde::{Deserialize, Serialize};

/// Per-symbol fundamentals. Every value is optional: public pages omit whole
/// sections for symbols without history (recent listings, for example).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub symbol: Symbol,
    pub eps_previous_quarter: Option<f64>,
    pub eps_newest_quarter: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub volume_at_capture: Option<u64>,
    pub revenue_previous_month: Option<u64>,
    pub revenue_newest_month: Option<u64>,
}

impl FundamentalsSnapshot {
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            eps_previous_quarter: None,
            eps_newest_quarter: None,
            pe_ratio: None,
            volume_at_capture: None,
            revenue_previous_month: None,
            revenue_newest_month: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.eps_previous_quarter.is_none()
            && self.eps_newest_quarter.is_none()
            && self.pe_ratio.is_none()
            && self.volume_at_capture.is_none()
            && self.revenue_previous_month.is_none()
            && self.revenue_newest_month.is_none()
    }

    /// Fill every field still missing here from `other`.
    pub fn fill_missing_from(&mut self, other: &FundamentalsSnapshot) {
        self.eps_previous_quarter = self.eps_previous_quarter.or(other.eps_previous_quarter);
        self.eps_newest_quarter = self.eps_newest_quarter.or(other.eps_newest_quarter);
        self.pe_ratio = self.pe_ratio.or(other.pe_ratio);
        self.volume_at_capture = self.volume_at_capture.or(other.volume_at_capture);
        self.revenue_previous_month = self.revenue_previous_month.or(other.revenue_previous_month);
        self.revenue_newest_month = self.revenue_newest_month.or(other.revenue_newest_month);
    }

    /// The scraped PE ratio, or `price / newest EPS` when the page had none.
    pub fn pe_ratio_at(&self, price: f64) -> Option<f64> {
        self.pe_ratio.or_else(|| {
            self.eps_newest_quarter
                .filter(|eps| *eps != 0.0)
                .map(|eps| price / eps)
        })
    }
}
