//! End-to-end: canonical records → assembler → evaluator → verdict.

use chrono::{Duration, NaiveDate};
use fourpoint_core::assemble::SeriesAssembler;
use fourpoint_core::data::CanonicalRecord;
use fourpoint_core::domain::{Symbol, Verdict};
use fourpoint_core::rules::{RuleSpec, SignalEvaluator, VolumeConfirmedBreakout};
use serde::Deserialize;

fn records(symbol: &Symbol, closes: &[f64], volumes: &[u64]) -> Vec<CanonicalRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| CanonicalRecord {
            symbol: symbol.clone(),
            date: start + Duration::days(i as i64),
            open: Some(close),
            high: Some(close + 0.5),
            low: Some(close - 0.5),
            close: Some(close),
            volume: Some(volume),
            turnover: None,
            transaction_count: None,
            change: None,
        })
        .collect()
}

fn breakout_fixture() -> (Vec<f64>, Vec<u64>) {
    let closes = vec![100.0, 99.0, 98.0, 97.0, 96.0, 97.0, 98.0, 99.0, 100.0, 101.0];
    let mut volumes = vec![1000; 9];
    volumes.push(2000);
    (closes, volumes)
}

#[test]
fn ten_sessions_with_volume_confirmed_breakout() {
    let symbol = Symbol::listed("2330");
    let (closes, volumes) = breakout_fixture();

    let mut assembler = SeriesAssembler::new();
    let report = assembler.ingest(records(&symbol, &closes, &volumes));
    assert_eq!(report.appended, 10);

    let series = assembler.series(&symbol).unwrap();
    // Missing change is derived from the previous close.
    assert_eq!(series.last().unwrap().change(), 1.0);

    let verdict = SignalEvaluator::four_point().evaluate(series);
    assert_eq!(verdict, Verdict::buy("volume-confirmed breakout"));
    assert_eq!(verdict.reason(), Some(VolumeConfirmedBreakout::ID));
}

#[test]
fn nine_sessions_are_insufficient() {
    let symbol = Symbol::otc("6488");
    let (closes, volumes) = breakout_fixture();

    let mut assembler = SeriesAssembler::new();
    assembler.ingest(records(&symbol, &closes[1..], &volumes[1..]));
    let verdict = SignalEvaluator::four_point().evaluate(assembler.series(&symbol).unwrap());
    assert_eq!(verdict, Verdict::Insufficient { required: 10 });
}

#[test]
fn configured_rule_set_changes_the_outcome() {
    #[derive(Deserialize)]
    struct RuleFile {
        rules: Vec<RuleSpec>,
    }

    let text = r#"
        [[rules]]
        type = "volume_confirmed_breakout"
        volume_ratio = 3.0
    "#;
    let file: RuleFile = toml::from_str(text).unwrap();
    let evaluator = SignalEvaluator::from_specs(&file.rules).unwrap();
    assert_eq!(evaluator.required_history(), 6);

    let symbol = Symbol::listed("2330");
    let (closes, volumes) = breakout_fixture();
    let mut assembler = SeriesAssembler::new();
    assembler.ingest(records(&symbol, &closes, &volumes));

    // 2000 is not three times the 1000 baseline.
    assert_eq!(
        evaluator.evaluate(assembler.series(&symbol).unwrap()),
        Verdict::NoBuy
    );
}

#[test]
fn explain_reports_every_rule() {
    let symbol = Symbol::listed("2330");
    let (closes, volumes) = breakout_fixture();
    let mut assembler = SeriesAssembler::new();
    assembler.ingest(records(&symbol, &closes, &volumes));

    let evaluator = SignalEvaluator::four_point();
    let outcomes = evaluator.explain(assembler.series(&symbol).unwrap().points());
    assert_eq!(outcomes.len(), 6);
    assert_eq!(outcomes[0].rule, VolumeConfirmedBreakout::ID);
    let trigger = outcomes[0].trigger.as_ref().unwrap();
    assert_eq!(trigger.metrics["volume"], 2000.0);
}
