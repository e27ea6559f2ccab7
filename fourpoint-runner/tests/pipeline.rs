//! Integration tests for the pipeline batches.
//!
//! Every source is served by a routed in-memory transport, so the full path
//! from HTTP body to ranked pick runs without a network.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fourpoint_core::assemble::SeriesAssembler;
use fourpoint_core::data::{
    FailureKind, FetchError, FetchResult, HttpResponse, HttpTransport, RetryPolicy, SessionConfig,
};
use fourpoint_core::domain::{Symbol, Verdict};
use fourpoint_core::rules::SignalEvaluator;
use fourpoint_runner::orchestrator::{Orchestrator, OrchestratorConfig, SilentProgress};
use fourpoint_runner::pipeline::{
    evaluate_all, fetch_daily, fetch_fundamentals, fetch_history, fetch_realtime,
    overlay_realtime, update_store, Sessions,
};
use fourpoint_runner::ranking::{rank, select_picks, RankingConfig};
use fourpoint_runner::store;
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────

/// First matching URL substring wins; unknown URLs get a network error.
#[derive(Default)]
struct RoutedTransport {
    routes: Mutex<Vec<(String, HttpResponse)>>,
    calls: AtomicUsize,
}

impl RoutedTransport {
    fn route(&self, needle: &str, response: HttpResponse) {
        self.routes
            .lock()
            .unwrap()
            .push((needle.to_string(), response));
    }

    fn ok(&self, needle: &str, body: impl Into<Vec<u8>>) {
        self.route(needle, HttpResponse::ok(body));
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpTransport for RoutedTransport {
    fn get(&self, url: &str) -> FetchResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.routes
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, resp)| resp.clone())
            .ok_or_else(|| FetchError::Network(format!("no route for {url}")))
    }
}

fn sessions(transport: Arc<RoutedTransport>) -> Sessions {
    sessions_with_retry(transport, RetryPolicy::new(1, Duration::from_millis(1)))
}

fn sessions_with_retry(transport: Arc<RoutedTransport>, retry: RetryPolicy) -> Sessions {
    let config = SessionConfig {
        retry,
        ..SessionConfig::default()
    };
    Sessions::with_transport(transport, &config)
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(OrchestratorConfig {
        workers: 3,
        per_call_timeout: Duration::from_secs(2),
        retry: RetryPolicy::new(1, Duration::from_millis(1)),
        progress_every: 1,
    })
    .unwrap()
}

fn server_error() -> HttpResponse {
    HttpResponse {
        status: 500,
        body: Vec::new(),
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
}

const TWSE_HEADER: &str = "\"證券代號\",\"證券名稱\",\"成交股數\",\"成交筆數\",\"成交金額\",\"開盤價\",\"最高價\",\"最低價\",\"收盤價\",\"漲跌(+/-)\",\"漲跌價差\",";

/// Listed-market report body (MS950), one row per (code, close, volume).
fn twse_body(rows: &[(&str, f64, u64)]) -> Vec<u8> {
    let mut text = String::from("\"113年10月 每日收盤行情(全部)\"\n");
    text.push_str(TWSE_HEADER);
    text.push('\n');
    for (code, close, volume) in rows {
        text.push_str(&format!(
            "=\"{code}\",\"名稱\",\"{volume}\",\"10\",\"0\",\"{close:.2}\",\"{:.2}\",\"{:.2}\",\"{close:.2}\",\" \",\"0.00\",\n",
            close + 0.5,
            close - 0.5,
        ));
    }
    let (encoded, _, _) = encoding_rs::BIG5.encode(&text);
    encoded.into_owned()
}

fn eps_page(newest: f64, previous: f64, pe: f64, volume: u64) -> String {
    format!(
        r#"<html><body>
<div id="main-0-QuoteHeader-Proxy">
  <div class="D(f) Fld(c) Ai(c) Fw(b) Pend(8px) Bdendc($bd-primary-divider) Bdends(s) Bdendw(1px)">
    <span class="Fz(16px) C($c-link-text) Mb(4px)">{volume}</span><span class="C(#6e7780)">成交量</span>
  </div>
  <div class="D(f) Fld(c) Ai(c) Fw(b) Px(8px) Bdendc($bd-primary-divider) Bdends(s) Bdendw(1px)">
    <span class="Fz(16px) C($c-link-text) Mb(4px)">{pe}</span><span class="C(#6e7780)">本益比</span>
  </div>
</div>
<section id="qsp-eps-table">
  <div><span class="Fw(b)">年度/季別</span><span class="Fw(b)">每股盈餘</span></div>
  <div><span>2024 Q2</span><span>{newest}</span></div>
  <div><span>2024 Q1</span><span>{previous}</span></div>
</section>
</body></html>"#
    )
}

fn revenue_page(newest: u64, previous: u64) -> String {
    format!(
        r#"<html><body>
<section id="qsp-revenue-table">
  <div><span class="Fw(b)">2024/09</span><span>{newest}</span><span>0.4%</span><span>1</span><span>39.6%</span></div>
  <div><span class="Fw(b)">2024/08</span><span>{previous}</span><span>7.0%</span></div>
</section>
</body></html>"#
    )
}

/// Ten listed sessions where 2330 breaks out on volume and 2317 drifts.
fn route_breakout_history(transport: &RoutedTransport) -> Vec<NaiveDate> {
    let closes = [100.0, 99.0, 98.0, 97.0, 96.0, 97.0, 98.0, 99.0, 100.0, 101.0];
    let dates: Vec<NaiveDate> = (1..=10).map(day).collect();
    for (i, date) in dates.iter().enumerate() {
        let volume = if i == 9 { 2000 } else { 1000 };
        let body = twse_body(&[("2330", closes[i], volume), ("2317", 50.0, 1000)]);
        transport.ok(&format!("date={}", date.format("%Y%m%d")), body);
    }
    transport.ok("tpex.org.tw", "");
    dates
}

// ── Daily reports ────────────────────────────────────────────────────

#[test]
fn daily_fetch_reports_each_market_separately() {
    let transport = Arc::new(RoutedTransport::default());
    transport.ok("date=20241007", twse_body(&[("2330", 1000.0, 500)]));
    // No TPEx route: the OTC side fails, the listed side still lands.
    let daily = fetch_daily(&sessions(transport), day(7));

    assert_eq!(daily.reports.len(), 1);
    assert_eq!(daily.record_count(), 1);
    assert_eq!(daily.failures.len(), 1);
    assert_eq!(daily.failures[0].source, "tpex-daily");
    assert_eq!(daily.failures[0].error.kind(), FailureKind::Network);
}

#[test]
fn history_skips_failed_dates_and_keeps_order() {
    let transport = Arc::new(RoutedTransport::default());
    transport.ok("date=20241007", twse_body(&[("2330", 1000.0, 500)]));
    transport.route("date=20241008", server_error());
    transport.ok("date=20241009", twse_body(&[("2330", 1020.0, 700)]));
    transport.ok("tpex.org.tw", "");

    let mut assembler = SeriesAssembler::new();
    // Out of order and repeated on purpose.
    let history = fetch_history(
        &sessions(transport),
        &[day(9), day(7), day(8), day(9)],
        &mut assembler,
    );

    assert_eq!(history.trading_days, 2);
    assert_eq!(history.ingest.appended, 2);
    assert!(history.ingest.rejected.is_empty());
    assert_eq!(history.records.len(), 2);
    assert_eq!(history.failures.len(), 1);
    assert_eq!(history.failures[0].date, day(8));

    let series = assembler.series(&Symbol::listed("2330")).unwrap();
    let dates: Vec<NaiveDate> = series.points().iter().map(|p| p.date()).collect();
    assert_eq!(dates, vec![day(7), day(9)]);
}

#[test]
fn overlapping_store_updates_write_each_session_once() {
    let transport = Arc::new(RoutedTransport::default());
    for (d, close) in [(7, 100.0), (8, 101.0), (9, 102.0), (10, 103.0)] {
        transport.ok(
            &format!("date=202410{d:02}"),
            twse_body(&[("2330", close, 1000)]),
        );
    }
    transport.ok("tpex.org.tw", "");
    let sessions = sessions(transport);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.csv");

    let first = update_store(&sessions, &[day(7), day(8), day(9)], &path).unwrap();
    assert_eq!(first.records.len(), 3);

    // A rerun that overlaps the stored days only adds the new one.
    let second = update_store(&sessions, &[day(8), day(9), day(10)], &path).unwrap();
    assert_eq!(second.records.len(), 1);
    assert_eq!(second.records[0].date, day(10));
    assert_eq!(second.ingest.rejected.len(), 2);

    assert_eq!(store::read_records(&path).unwrap().len(), 4);
    let (assembler, loaded) = store::load_assembler(&path).unwrap();
    assert!(loaded.rejected.is_empty());
    assert_eq!(assembler.series(&Symbol::listed("2330")).unwrap().len(), 4);
}

// ── Fundamentals ─────────────────────────────────────────────────────

#[test]
fn fundamentals_batch_isolates_failures() {
    let transport = Arc::new(RoutedTransport::default());
    transport.ok("/quote/2330/eps", eps_page(9.56, 7.0, 20.5, 42_848));
    transport.ok("/quote/2330/revenue", revenue_page(251_872_717, 250_866_040));
    transport.ok("/quote/2317/eps", eps_page(2.0, 1.5, 12.0, 30_000));
    transport.ok("/quote/2317/revenue", revenue_page(600, 500));
    transport.ok("/quote/6488/eps", "<html><body></body></html>");
    transport.ok("/quote/6488/revenue", "<html><body></body></html>");
    // 1101 has no route at all.

    let symbols = vec![
        Symbol::listed("2330"),
        Symbol::listed("2317"),
        Symbol::otc("6488"),
        Symbol::listed("1101"),
    ];
    let report = fetch_fundamentals(&orchestrator(), &sessions(transport), symbols, &SilentProgress);

    assert_eq!(report.successes.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, Symbol::listed("1101"));
    assert_eq!(report.failures[0].kind, FailureKind::Network);

    let (symbol, tsmc) = &report.successes[0];
    assert_eq!(symbol, &Symbol::listed("2330"));
    assert_eq!(tsmc.eps_newest_quarter, Some(9.56));
    assert_eq!(tsmc.revenue_previous_month, Some(250_866_040));
    // A page without data is an empty snapshot, not a failure.
    assert!(report.successes[2].1.is_empty());
}

#[test]
fn one_failing_symbol_leaves_the_source_usable() {
    let transport = Arc::new(RoutedTransport::default());
    transport.route("/quote/1101/", server_error());
    for code in ["2330", "2317", "2454"] {
        transport.ok(&format!("/quote/{code}/eps"), eps_page(2.0, 1.5, 12.0, 30_000));
        transport.ok(&format!("/quote/{code}/revenue"), revenue_page(600, 500));
    }
    // Full retry count on one worker: 1101 exhausts its retries first.
    let sessions = sessions_with_retry(transport, RetryPolicy::new(3, Duration::from_millis(1)));
    let orch = Orchestrator::new(OrchestratorConfig {
        workers: 1,
        per_call_timeout: Duration::from_secs(2),
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
        progress_every: 1,
    })
    .unwrap();

    let symbols: Vec<Symbol> = ["1101", "2330", "2317", "2454"]
        .into_iter()
        .map(Symbol::listed)
        .collect();
    let report = fetch_fundamentals(&orch, &sessions, symbols, &SilentProgress);

    assert_eq!(report.successes.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, Symbol::listed("1101"));
    assert_eq!(report.failures[0].kind, FailureKind::Network);
    assert_eq!(report.failures_of(FailureKind::CircuitOpen), 0);
    assert!(sessions.yahoo.is_available());
}

// ── Realtime ─────────────────────────────────────────────────────────

#[test]
fn realtime_batches_share_one_handshake() {
    let transport = Arc::new(RoutedTransport::default());
    transport.ok("index.jsp", "<html></html>");
    transport.ok(
        "getStockInfo.jsp",
        r#"{"msgArray":[{"c":"2330","ex":"tse","d":"20241011","z":"1035.0000","o":"1025.0000","h":"1040.0000","l":"1022.0000","y":"1020.0000","v":"12000"}],"rtcode":"0000"}"#,
    );
    let symbols: Vec<Symbol> = ["2330", "2317", "2454", "1101", "2412"]
        .into_iter()
        .map(Symbol::listed)
        .collect();

    let fetch = fetch_realtime(
        &orchestrator(),
        &sessions(transport.clone()),
        &symbols,
        2,
        &SilentProgress,
    )
    .unwrap();

    // Five symbols in chunks of two: three quote requests plus one handshake.
    let report = &fetch.report;
    assert_eq!(report.successes.len(), 3);
    assert!(report.all_succeeded());
    assert_eq!(transport.calls(), 4);
    assert_eq!(report.successes[0].0 .0.len(), 2);
    assert_eq!(report.successes[2].0 .0.len(), 1);

    // Only 2330 is ever quoted back; the rest are reported, not dropped.
    assert!(!fetch.is_empty_query());
    assert_eq!(fetch.quotes().count(), 3);
    let missing: Vec<String> = fetch.missing().iter().map(|s| s.to_string()).collect();
    assert_eq!(missing, vec!["2317.TW", "2454.TW", "1101.TW", "2412.TW"]);
}

#[test]
fn empty_market_stays_an_empty_query() {
    let transport = Arc::new(RoutedTransport::default());
    transport.ok("index.jsp", "<html></html>");
    transport.ok(
        "getStockInfo.jsp",
        r#"{"msgArray":[],"rtcode":"0000","rtmessage":"OK"}"#,
    );
    let symbols = vec![Symbol::listed("2330"), Symbol::otc("6488")];

    let fetch = fetch_realtime(
        &orchestrator(),
        &sessions(transport),
        &symbols,
        50,
        &SilentProgress,
    )
    .unwrap();

    assert!(fetch.report.all_succeeded());
    assert!(fetch.is_empty_query());
    assert_eq!(fetch.empty_batches().count(), 1);
    assert_eq!(fetch.quotes().count(), 0);
    assert_eq!(fetch.missing().len(), 2);
}

#[test]
fn failed_handshake_fails_the_call() {
    let transport = Arc::new(RoutedTransport::default());
    transport.route(
        "index.jsp",
        HttpResponse {
            status: 403,
            body: Vec::new(),
        },
    );
    let err = fetch_realtime(
        &orchestrator(),
        &sessions(transport),
        &[Symbol::listed("2330")],
        50,
        &SilentProgress,
    )
    .unwrap_err();
    assert!(matches!(err, FetchError::CircuitOpen { .. }));
}

// ── End to end ───────────────────────────────────────────────────────

#[test]
fn history_fundamentals_and_ranking_produce_a_pick() {
    let transport = Arc::new(RoutedTransport::default());
    let dates = route_breakout_history(&transport);
    transport.ok("/quote/2330/eps", eps_page(9.56, 7.0, 20.5, 42_848));
    transport.ok("/quote/2330/revenue", revenue_page(300, 250));
    transport.ok("/quote/2317/eps", eps_page(2.0, 1.5, 12.0, 30_000));
    transport.ok("/quote/2317/revenue", revenue_page(600, 500));
    let sessions = sessions(transport);

    let mut assembler = SeriesAssembler::new();
    let history = fetch_history(&sessions, &dates, &mut assembler);
    assert_eq!(history.trading_days, 10);

    let symbols: Vec<Symbol> = assembler.symbols().cloned().collect();
    let fundamentals = fetch_fundamentals(&orchestrator(), &sessions, symbols, &SilentProgress);
    for snapshot in fundamentals.into_payloads() {
        assembler.merge_fundamentals(snapshot);
    }

    let verdicts = evaluate_all(&SignalEvaluator::four_point(), &assembler);
    assert_eq!(
        verdicts[&Symbol::listed("2330")],
        Verdict::buy("volume-confirmed breakout")
    );
    assert!(!verdicts[&Symbol::listed("2317")].is_buy());

    let config = RankingConfig::default();
    let picks = rank(select_picks(&verdicts, &assembler, None, &config), config.top_n);
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].symbol, Symbol::listed("2330"));
    assert_eq!(picks[0].price, 101.0);
    assert_eq!(picks[0].date, day(10));
    assert_eq!(picks[0].pe_ratio, 20.5);
}

#[test]
fn realtime_overlay_feeds_evaluation() {
    let transport = Arc::new(RoutedTransport::default());
    let dates = route_breakout_history(&transport);
    let sessions = sessions(transport.clone());
    let mut assembler = SeriesAssembler::new();
    // Nine finalized sessions; the tenth arrives as a live quote.
    fetch_history(&sessions, &dates[..9], &mut assembler);
    assert_eq!(
        evaluate_all(&SignalEvaluator::four_point(), &assembler)[&Symbol::listed("2330")],
        Verdict::Insufficient { required: 10 }
    );

    transport.ok("index.jsp", "<html></html>");
    transport.ok(
        "getStockInfo.jsp",
        r#"{"msgArray":[{"c":"2330","ex":"tse","d":"20241011","z":"101.0000","o":"100.0000","h":"101.5000","l":"99.5000","y":"100.0000","v":"2"}],"rtcode":"0000"}"#,
    );
    let fetch = fetch_realtime(
        &orchestrator(),
        &sessions,
        &[Symbol::listed("2330")],
        50,
        &SilentProgress,
    )
    .unwrap();
    let quotes: Vec<_> = fetch.quotes().cloned().collect();
    assert_eq!(overlay_realtime(&mut assembler, &quotes), 1);

    let series = assembler.series(&Symbol::listed("2330")).unwrap();
    assert_eq!(series.len(), 10);
    assert!(series.has_live_point());
    // The live point completes the history the rules need.
    let verdict = evaluate_all(&SignalEvaluator::four_point(), &assembler);
    assert!(!matches!(
        verdict[&Symbol::listed("2330")],
        Verdict::Insufficient { .. }
    ));
}
