//! Ordered rule evaluation producing a [`Verdict`].

use super::config::{RuleConfigError, RuleSpec};
use super::{
    BiasPivot, Gated, PriceVolumeDivergence, Rule, ShortMaAboveLongMa, ShortMaTurningUp, Trigger,
    VolumeConfirmedBreakout, VolumeContractionPriceHold, VolumeExpansionUpClose, Window,
};
use crate::domain::{PricePoint, SymbolSeries, Verdict};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// One rule's answer, as reported by [`SignalEvaluator::explain`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub lookback: usize,
    pub trigger: Option<Trigger>,
}

/// Runs rules in declaration order; the first trigger names the verdict.
pub struct SignalEvaluator {
    rules: Vec<Box<dyn Rule>>,
}

impl SignalEvaluator {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// The default four-point rule set.
    pub fn four_point() -> Self {
        let gate = BiasPivot::default();
        let gated = |rule: Box<dyn Rule>| -> Box<dyn Rule> { Box::new(Gated::new(rule, gate.clone())) };
        Self::new(vec![
            Box::new(VolumeConfirmedBreakout::default()),
            gated(Box::new(VolumeExpansionUpClose::default())),
            gated(Box::new(VolumeContractionPriceHold::default())),
            gated(Box::new(ShortMaTurningUp::default())),
            gated(Box::new(ShortMaAboveLongMa::default())),
            Box::new(PriceVolumeDivergence::default()),
        ])
    }

    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, RuleConfigError> {
        if specs.is_empty() {
            return Err(RuleConfigError::EmptyRuleSet);
        }
        let rules = specs
            .iter()
            .map(RuleSpec::build)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Largest lookback among the rules.
    pub fn required_history(&self) -> usize {
        self.rules.iter().map(|r| r.lookback()).max().unwrap_or(0)
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    pub fn evaluate(&self, series: &SymbolSeries) -> Verdict {
        let verdict = self.evaluate_points(series.points());
        debug!(symbol = %series.symbol(), %verdict, "evaluated");
        verdict
    }

    pub fn evaluate_points(&self, points: &[PricePoint]) -> Verdict {
        let required = self.required_history();
        if points.len() < required {
            return Verdict::Insufficient { required };
        }
        let window = Window::new(points);
        self.rules
            .iter()
            .find_map(|rule| rule.evaluate(&window).map(|_| Verdict::buy(rule.id())))
            .unwrap_or(Verdict::NoBuy)
    }

    /// Every rule's outcome, without short-circuiting.
    pub fn explain(&self, points: &[PricePoint]) -> Vec<RuleOutcome> {
        let window = Window::new(points);
        self.rules
            .iter()
            .map(|rule| RuleOutcome {
                rule: rule.id().to_string(),
                lookback: rule.lookback(),
                trigger: rule.evaluate(&window),
            })
            .collect()
    }
}

impl Default for SignalEvaluator {
    fn default() -> Self {
        Self::four_point()
    }
}

impl fmt::Debug for SignalEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalEvaluator")
            .field("rules", &self.rule_ids())
            .field("required_history", &self.required_history())
            .finish()
    }
}
