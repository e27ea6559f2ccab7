//! Serde configuration for rule sets.
//!
//! A rule set is an ordered list of [`RuleSpec`]s. Each spec names a rule
//! kind (internally tagged by `type`), its thresholds, and an optional bias
//! pivot gate:
//!
//! ```toml
//! [[rules]]
//! type = "volume_confirmed_breakout"
//! rising_closes = 5
//!
//! [[rules]]
//! type = "short_ma_above_long_ma"
//! gate = { sample = 5, within = 3 }
//! ```

use super::{
    BiasPivot, Gated, PriceVolumeDivergence, Rule, ShortMaAboveLongMa, ShortMaTurningUp,
    VolumeConfirmedBreakout, VolumeContractionPriceHold, VolumeExpansionUpClose,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleConfigError {
    #[error("{rule}: {field} must be at least 1")]
    ZeroWindow {
        rule: &'static str,
        field: &'static str,
    },

    #[error("{rule}: {field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        rule: &'static str,
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("{rule}: fast period {fast} must be at least 1 and shorter than slow period {slow}")]
    MaPeriods {
        rule: &'static str,
        fast: usize,
        slow: usize,
    },

    #[error("rule set is empty")]
    EmptyRuleSet,
}

// ─── Validation helpers ──────────────────────────────────────────────

pub(crate) fn check_positive(
    rule: &'static str,
    field: &'static str,
    value: usize,
) -> Result<(), RuleConfigError> {
    if value == 0 {
        return Err(RuleConfigError::ZeroWindow { rule, field });
    }
    Ok(())
}

/// Finite and non-negative.
pub(crate) fn check_ratio(
    rule: &'static str,
    field: &'static str,
    value: f64,
) -> Result<(), RuleConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(RuleConfigError::OutOfRange {
            rule,
            field,
            value,
            expected: ">= 0",
        });
    }
    Ok(())
}

/// In `[0, 1)`.
pub(crate) fn check_fraction(
    rule: &'static str,
    field: &'static str,
    value: f64,
) -> Result<(), RuleConfigError> {
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        return Err(RuleConfigError::OutOfRange {
            rule,
            field,
            value,
            expected: "0 <= x < 1",
        });
    }
    Ok(())
}

pub(crate) fn check_periods(
    rule: &'static str,
    fast: usize,
    slow: usize,
) -> Result<(), RuleConfigError> {
    if fast == 0 || slow <= fast {
        return Err(RuleConfigError::MaPeriods { rule, fast, slow });
    }
    Ok(())
}

// ─── Specs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    VolumeConfirmedBreakout(VolumeConfirmedBreakout),
    VolumeExpansionUpClose(VolumeExpansionUpClose),
    VolumeContractionPriceHold(VolumeContractionPriceHold),
    ShortMaTurningUp(ShortMaTurningUp),
    ShortMaAboveLongMa(ShortMaAboveLongMa),
    PriceVolumeDivergence(PriceVolumeDivergence),
}

impl RuleKind {
    pub fn id(&self) -> &'static str {
        match self {
            RuleKind::VolumeConfirmedBreakout(_) => VolumeConfirmedBreakout::ID,
            RuleKind::VolumeExpansionUpClose(_) => VolumeExpansionUpClose::ID,
            RuleKind::VolumeContractionPriceHold(_) => VolumeContractionPriceHold::ID,
            RuleKind::ShortMaTurningUp(_) => ShortMaTurningUp::ID,
            RuleKind::ShortMaAboveLongMa(_) => ShortMaAboveLongMa::ID,
            RuleKind::PriceVolumeDivergence(_) => PriceVolumeDivergence::ID,
        }
    }

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        match self {
            RuleKind::VolumeConfirmedBreakout(r) => r.validate(),
            RuleKind::VolumeExpansionUpClose(r) => r.validate(),
            RuleKind::VolumeContractionPriceHold(r) => r.validate(),
            RuleKind::ShortMaTurningUp(r) => r.validate(),
            RuleKind::ShortMaAboveLongMa(r) => r.validate(),
            RuleKind::PriceVolumeDivergence(r) => r.validate(),
        }
    }

    fn boxed(&self) -> Box<dyn Rule> {
        match self {
            RuleKind::VolumeConfirmedBreakout(r) => Box::new(r.clone()),
            RuleKind::VolumeExpansionUpClose(r) => Box::new(r.clone()),
            RuleKind::VolumeContractionPriceHold(r) => Box::new(r.clone()),
            RuleKind::ShortMaTurningUp(r) => Box::new(r.clone()),
            RuleKind::ShortMaAboveLongMa(r) => Box::new(r.clone()),
            RuleKind::PriceVolumeDivergence(r) => Box::new(r.clone()),
        }
    }
}

/// One entry of an ordered rule list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<BiasPivot>,
}

impl RuleSpec {
    pub fn new(kind: RuleKind) -> Self {
        Self { kind, gate: None }
    }

    pub fn gated(mut self, gate: BiasPivot) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        self.kind.validate()?;
        if let Some(gate) = &self.gate {
            gate.validate()?;
        }
        Ok(())
    }

    /// Validate and construct the runtime rule.
    pub fn build(&self) -> Result<Box<dyn Rule>, RuleConfigError> {
        self.validate()?;
        let rule = self.kind.boxed();
        Ok(match &self.gate {
            Some(gate) => Box::new(Gated::new(rule, gate.clone())),
            None => rule,
        })
    }

    /// Breakout first, the four gated classic points, then divergence.
    pub fn default_set() -> Vec<RuleSpec> {
        let gate = BiasPivot::default();
        vec![
            RuleSpec::new(RuleKind::VolumeConfirmedBreakout(Default::default())),
            RuleSpec::new(RuleKind::VolumeExpansionUpClose(Default::default())).gated(gate.clone()),
            RuleSpec::new(RuleKind::VolumeContractionPriceHold(Default::default()))
                .gated(gate.clone()),
            RuleSpec::new(RuleKind::ShortMaTurningUp(Default::default())).gated(gate.clone()),
            RuleSpec::new(RuleKind::ShortMaAboveLongMa(Default::default())).gated(gate),
            RuleSpec::new(RuleKind::PriceVolumeDivergence(Default::default())),
        ]
    }
}
