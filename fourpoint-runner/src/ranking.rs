//! Ranking of buy verdicts by fundamentals.
//!
//! Pure functions: a symbol with a buy verdict becomes a [`Pick`] when its
//! fundamentals snapshot clears every threshold in [`RankingConfig`]. Picks
//! are then ordered by volume, cut to the top N, and re-ordered by PE.

use crate::config::ConfigError;
use chrono::NaiveDate;
use fourpoint_core::assemble::SeriesAssembler;
use fourpoint_core::data::Universe;
use fourpoint_core::domain::{FundamentalsSnapshot, Symbol, Verdict};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Volume at capture must exceed this.
    pub min_volume: u64,
    /// PE must be below this.
    pub max_pe: f64,
    /// Newest EPS must exceed `eps_growth` × previous EPS.
    pub eps_growth: f64,
    /// Newest plus previous EPS must exceed this, unless the newest alone
    /// clears `eps_newest_floor`.
    pub eps_pair_sum: f64,
    pub eps_newest_floor: f64,
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_volume: 100,
            max_pe: 30.0,
            eps_growth: 1.2,
            eps_pair_sum: 1.2,
            eps_newest_floor: 0.75,
            top_n: 20,
        }
    }
}

impl RankingConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::Zero {
                section: "ranking",
                field: "top_n",
            });
        }
        for (field, value) in [
            ("max_pe", self.max_pe),
            ("eps_growth", self.eps_growth),
            ("eps_pair_sum", self.eps_pair_sum),
            ("eps_newest_floor", self.eps_newest_floor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Threshold { field, value });
            }
        }
        Ok(())
    }
}

// ─── Filters ─────────────────────────────────────────────────────────

/// First threshold a snapshot failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMiss {
    /// A field the filters need was not scraped.
    Missing(&'static str),
    Volume,
    PeRatio,
    Revenue,
    PreviousEps,
    EpsGrowth,
    EpsLevel,
}

/// Apply every threshold; on success return the PE the pick is ranked by.
///
/// PE is the scraped ratio, or `price / newest EPS` when none was scraped.
pub fn check(
    snapshot: &FundamentalsSnapshot,
    price: f64,
    config: &RankingConfig,
) -> Result<f64, FilterMiss> {
    let volume = snapshot
        .volume_at_capture
        .ok_or(FilterMiss::Missing("volume"))?;
    let pe = snapshot
        .pe_ratio_at(price)
        .ok_or(FilterMiss::Missing("pe_ratio"))?;
    let rev_new = snapshot
        .revenue_newest_month
        .ok_or(FilterMiss::Missing("revenue_newest_month"))?;
    let rev_prev = snapshot
        .revenue_previous_month
        .ok_or(FilterMiss::Missing("revenue_previous_month"))?;
    let eps_new = snapshot
        .eps_newest_quarter
        .ok_or(FilterMiss::Missing("eps_newest_quarter"))?;
    let eps_prev = snapshot
        .eps_previous_quarter
        .ok_or(FilterMiss::Missing("eps_previous_quarter"))?;

    if volume <= config.min_volume {
        return Err(FilterMiss::Volume);
    }
    if !(pe < config.max_pe) {
        return Err(FilterMiss::PeRatio);
    }
    if rev_new <= rev_prev {
        return Err(FilterMiss::Revenue);
    }
    if eps_prev <= 0.0 {
        return Err(FilterMiss::PreviousEps);
    }
    if eps_new <= config.eps_growth * eps_prev {
        return Err(FilterMiss::EpsGrowth);
    }
    if !(eps_new + eps_prev > config.eps_pair_sum || eps_new > config.eps_newest_floor) {
        return Err(FilterMiss::EpsLevel);
    }
    Ok(pe)
}

pub fn passes_filters(snapshot: &FundamentalsSnapshot, price: f64, config: &RankingConfig) -> bool {
    check(snapshot, price, config).is_ok()
}

// ─── Picks ───────────────────────────────────────────────────────────

/// One ranked row of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub symbol: Symbol,
    pub name: String,
    pub price: f64,
    pub date: NaiveDate,
    pub reason: String,
    pub volume: u64,
    pub eps: f64,
    pub pe_ratio: f64,
}

/// Picks for every buy verdict whose symbol has history and passes the
/// filters. Names come from `universe` when given.
pub fn select_picks(
    verdicts: &BTreeMap<Symbol, Verdict>,
    assembler: &SeriesAssembler,
    universe: Option<&Universe>,
    config: &RankingConfig,
) -> Vec<Pick> {
    let mut picks = Vec::new();
    for (symbol, verdict) in verdicts {
        let Some(reason) = verdict.reason() else {
            continue;
        };
        let Some(last) = assembler.series(symbol).and_then(|s| s.last()) else {
            continue;
        };
        let Some(snapshot) = assembler.fundamentals(symbol) else {
            debug!(%symbol, "buy verdict without fundamentals, skipped");
            continue;
        };
        match check(snapshot, last.close(), config) {
            Ok(pe_ratio) => picks.push(Pick {
                symbol: symbol.clone(),
                name: universe
                    .and_then(|u| u.name_of(symbol))
                    .unwrap_or_default()
                    .to_string(),
                price: last.close(),
                date: last.date(),
                reason: reason.to_string(),
                volume: snapshot.volume_at_capture.unwrap_or_default(),
                eps: snapshot.eps_newest_quarter.unwrap_or_default(),
                pe_ratio,
            }),
            Err(miss) => debug!(%symbol, ?miss, "filtered out"),
        }
    }
    info!(
        buys = verdicts.values().filter(|v| v.is_buy()).count(),
        picks = picks.len(),
        "filters applied"
    );
    picks
}

/// Volume descending, keep `top_n`, then PE ascending.
pub fn rank(mut picks: Vec<Pick>, top_n: usize) -> Vec<Pick> {
    picks.sort_by(|a, b| {
        b.volume
            .cmp(&a.volume)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    picks.truncate(top_n);
    picks.sort_by(|a, b| {
        a.pe_ratio
            .partial_cmp(&b.pe_ratio)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    picks
}
