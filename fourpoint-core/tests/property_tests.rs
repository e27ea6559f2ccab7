//! Property tests for core invariants.
//!
//! Uses proptest to verify:
//! 1. PricePoint invariants — construction succeeds exactly when they hold
//! 2. Series ordering — dates strictly increase, rejected appends change nothing
//! 3. Evaluator safety — short series are `Insufficient`, results are deterministic
//! 4. Threshold monotonicity — raising a threshold never adds a trigger
//! 5. Normalization — formatted counts and ROC dates round-trip

use chrono::{Duration, NaiveDate};
use fourpoint_core::data::normalize::parse_count;
use fourpoint_core::data::{gregorian_to_roc, roc_to_gregorian};
use fourpoint_core::domain::{Activity, Ohlc, PricePoint, Symbol, SymbolSeries, Verdict};
use fourpoint_core::rules::{
    BiasPivot, PriceVolumeDivergence, Rule, ShortMaAboveLongMa, ShortMaTurningUp,
    SignalEvaluator, VolumeConfirmedBreakout, VolumeContractionPriceHold, VolumeExpansionUpClose,
    Window,
};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

/// Valid points from (close, volume) pairs; open is the previous close.
fn build_points(steps: &[(f64, u64)]) -> Vec<PricePoint> {
    steps
        .iter()
        .enumerate()
        .map(|(i, &(close, volume))| {
            let open = if i == 0 { close } else { steps[i - 1].0 };
            PricePoint::new(
                base_date() + Duration::days(i as i64),
                Ohlc {
                    open,
                    high: open.max(close) + 0.5,
                    low: (open.min(close) - 0.5).max(0.0),
                    close,
                },
                Activity {
                    volume,
                    turnover: 0,
                    transaction_count: 0,
                },
                0.0,
            )
            .unwrap()
        })
        .collect()
}

fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (0.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_steps(max_len: usize) -> impl Strategy<Value = Vec<(f64, u64)>> {
    prop::collection::vec((1.0..200.0_f64, 0u64..10_000), 0..max_len)
}

fn arb_threshold_pair() -> impl Strategy<Value = (f64, f64)> {
    (0.0..2.0_f64, 0.0..2.0_f64).prop_map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
}

// ── 1. PricePoint invariants ─────────────────────────────────────────

proptest! {
    /// Construction succeeds iff high >= max(open, close), low <= min(open, close), low >= 0.
    #[test]
    fn price_point_accepts_exactly_valid_bars(
        open in arb_price(),
        high in arb_price(),
        low in arb_price(),
        close in arb_price(),
    ) {
        let valid = high >= open.max(close) && low <= open.min(close) && low >= 0.0;
        let result = PricePoint::new(
            base_date(),
            Ohlc { open, high, low, close },
            Activity::default(),
            0.0,
        );
        prop_assert_eq!(result.is_ok(), valid);
        if let Ok(p) = result {
            prop_assert!(p.high() >= p.open().max(p.close()));
            prop_assert!(p.low() <= p.open().min(p.close()));
            prop_assert!(p.low() >= 0.0);
        }
    }
}

// ── 2. Series ordering ───────────────────────────────────────────────

proptest! {
    /// Whatever order dates arrive in, the stored dates strictly increase and
    /// every rejected append leaves the series untouched.
    #[test]
    fn series_dates_strictly_increase(offsets in prop::collection::vec(0i64..40, 1..40)) {
        let mut series = SymbolSeries::new(Symbol::listed("2330"));
        for offset in offsets {
            let point = PricePoint::new(
                base_date() + Duration::days(offset),
                Ohlc { open: 10.0, high: 11.0, low: 9.0, close: 10.5 },
                Activity::default(),
                0.0,
            )
            .unwrap();
            let before = series.points().to_vec();
            let accepted = series.last().map_or(true, |last| point.date() > last.date());
            let result = series.append(point);
            prop_assert_eq!(result.is_ok(), accepted);
            if !accepted {
                prop_assert_eq!(series.points(), &before[..]);
            }
        }
        for pair in series.points().windows(2) {
            prop_assert!(pair[0].date() < pair[1].date());
        }
    }
}

// ── 3. Evaluator safety ──────────────────────────────────────────────

proptest! {
    /// Series shorter than the required history are `Insufficient`.
    #[test]
    fn short_series_is_insufficient(steps in arb_steps(10)) {
        let evaluator = SignalEvaluator::four_point();
        let points = build_points(&steps);
        prop_assume!(points.len() < evaluator.required_history());
        prop_assert_eq!(
            evaluator.evaluate_points(&points),
            Verdict::Insufficient { required: evaluator.required_history() }
        );
    }

    /// Same input, same verdict, and only the verdicts the evaluator can name.
    #[test]
    fn evaluation_is_deterministic(steps in arb_steps(40)) {
        let evaluator = SignalEvaluator::four_point();
        let points = build_points(&steps);
        let first = evaluator.evaluate_points(&points);
        let second = evaluator.evaluate_points(&points);
        prop_assert_eq!(&first, &second);
        if let Verdict::Buy { reason } = &first {
            prop_assert!(evaluator.rule_ids().contains(&reason.as_str()));
        }
    }
}

// ── 4. Threshold monotonicity ────────────────────────────────────────

/// If the stricter rule fires, the looser one must fire too.
fn monotone(loose: &dyn Rule, strict: &dyn Rule, points: &[PricePoint]) -> bool {
    let window = Window::new(points);
    strict.evaluate(&window).is_none() || loose.evaluate(&window).is_some()
}

proptest! {
    #[test]
    fn breakout_volume_ratio_is_monotone(steps in arb_steps(20), (lo, hi) in arb_threshold_pair()) {
        let points = build_points(&steps);
        let rule = |volume_ratio| VolumeConfirmedBreakout { volume_ratio, ..Default::default() };
        prop_assert!(monotone(&rule(lo), &rule(hi), &points));
    }

    #[test]
    fn expansion_thresholds_are_monotone(steps in arb_steps(8), (lo, hi) in arb_threshold_pair()) {
        let points = build_points(&steps);
        let by_ratio = |volume_ratio| VolumeExpansionUpClose { volume_ratio, ..Default::default() };
        let by_body = |min_body| VolumeExpansionUpClose { min_body, ..Default::default() };
        prop_assert!(monotone(&by_ratio(lo), &by_ratio(hi), &points));
        prop_assert!(monotone(&by_body(lo), &by_body(hi), &points));
    }

    #[test]
    fn contraction_thresholds_are_monotone(steps in arb_steps(8), (lo, hi) in arb_threshold_pair()) {
        let points = build_points(&steps);
        let by_contraction = |min_contraction: f64| VolumeContractionPriceHold {
            min_contraction: min_contraction / 2.0,
            ..Default::default()
        };
        let by_change = |min_change| VolumeContractionPriceHold { min_change, ..Default::default() };
        prop_assert!(monotone(&by_contraction(lo), &by_contraction(hi), &points));
        prop_assert!(monotone(&by_change(lo), &by_change(hi), &points));
    }

    #[test]
    fn moving_average_thresholds_are_monotone(steps in arb_steps(12), (lo, hi) in arb_threshold_pair()) {
        let points = build_points(&steps);
        let turn = |min_rise| ShortMaTurningUp { min_rise, ..Default::default() };
        let above = |min_spread| ShortMaAboveLongMa { min_spread, ..Default::default() };
        prop_assert!(monotone(&turn(lo), &turn(hi), &points));
        prop_assert!(monotone(&above(lo), &above(hi), &points));
    }

    #[test]
    fn divergence_threshold_is_monotone(steps in arb_steps(12), (lo, hi) in arb_threshold_pair()) {
        let points = build_points(&steps);
        let rule = |min_obv_rise| PriceVolumeDivergence { min_obv_rise, ..Default::default() };
        prop_assert!(monotone(&rule(lo), &rule(hi), &points));
    }

    #[test]
    fn pivot_depth_is_monotone(steps in arb_steps(16), (lo, hi) in arb_threshold_pair()) {
        let points = build_points(&steps);
        let window = Window::new(&points);
        let gate = |min_depth| BiasPivot { min_depth, ..Default::default() };
        let strict = gate(hi).check(&window);
        prop_assert!(strict.is_none() || gate(lo).check(&window).is_some());
    }
}

// ── 5. Normalization ─────────────────────────────────────────────────

proptest! {
    /// Thousands-separated counts parse back to the number.
    #[test]
    fn formatted_counts_parse(n in any::<u64>()) {
        prop_assert_eq!(parse_count(&with_thousands(n)), Some(n));
    }

    /// Every Gregorian date inside the ROC era survives a round trip.
    #[test]
    fn roc_dates_round_trip(days in 0i64..80_000) {
        let date = NaiveDate::from_ymd_opt(1912, 1, 1).unwrap() + Duration::days(days);
        let roc = gregorian_to_roc(date).unwrap();
        prop_assert_eq!(roc_to_gregorian(&roc).unwrap(), date);
    }
}

#[test]
fn thousands_helper_formats_like_the_exchanges() {
    assert_eq!(with_thousands(1234), "1,234");
    assert_eq!(with_thousands(12_345_678), "12,345,678");
    assert_eq!(with_thousands(999), "999");
    assert_eq!(parse_count("1,234"), Some(1234));
    assert_eq!(
        roc_to_gregorian("113/10/11").unwrap(),
        NaiveDate::from_ymd_opt(2024, 10, 11).unwrap()
    );
}
