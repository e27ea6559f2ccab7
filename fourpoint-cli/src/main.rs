//! FourPoint CLI — fetch, evaluate and rank Taiwan equities.
//!
//! Commands:
//! - `daily` — fetch listed and OTC daily reports and append them to the store
//! - `fundamentals` — scrape fundamentals snapshots for a universe
//! - `evaluate` — run the rule set over every stored series
//! - `rank` — evaluate, filter by fundamentals and rank the buys
//! - `quote` — print realtime quotes

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use fourpoint_core::assemble::SeriesAssembler;
use fourpoint_core::data::Universe;
use fourpoint_core::domain::{Quote, Symbol, Verdict};
use fourpoint_runner::orchestrator::{Orchestrator, TracingProgress};
use fourpoint_runner::pipeline::{self, Sessions};
use fourpoint_runner::ranking::{self, Pick};
use fourpoint_runner::{store, AppConfig};

#[derive(Parser)]
#[command(
    name = "fourpoint",
    about = "FourPoint — Taiwan equity daily data and four-point buy signals"
)]
struct Cli {
    /// Path to a TOML config file. Missing file means defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG still wins when set).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch daily reports and append normalized records to the store.
    Daily {
        /// Last trading date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,

        /// Number of weekdays to fetch, ending at --date.
        #[arg(long, default_value_t = 1)]
        days: usize,

        /// Record store (CSV).
        #[arg(long, default_value = "data/records.csv")]
        store: PathBuf,
    },
    /// Scrape fundamentals snapshots for every common stock in a universe.
    Fundamentals {
        /// Equities list CSV (type,code,name,market,...).
        #[arg(long)]
        universe: PathBuf,

        /// Output snapshot CSV.
        #[arg(long, default_value = "data/fundamentals.csv")]
        out: PathBuf,
    },
    /// Evaluate the rule set over every stored series.
    Evaluate {
        /// Record store (CSV).
        #[arg(long, default_value = "data/records.csv")]
        store: PathBuf,

        /// Overlay realtime quotes as the current session first.
        #[arg(long, default_value_t = false)]
        realtime: bool,

        /// Print every verdict as JSON lines instead of the buy list.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Evaluate, filter buys by fundamentals and write the ranked picks.
    Rank {
        /// Record store (CSV).
        #[arg(long, default_value = "data/records.csv")]
        store: PathBuf,

        /// Snapshot CSV written by `fundamentals`.
        #[arg(long, default_value = "data/fundamentals.csv")]
        fundamentals: PathBuf,

        /// Equities list CSV, for names.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Overlay realtime quotes before evaluating.
        #[arg(long, default_value_t = false)]
        realtime: bool,

        /// Output picks CSV.
        #[arg(long, default_value = "data/picks.csv")]
        out: PathBuf,
    },
    /// Print realtime quotes (e.g. 2330.TW 6488.TWO).
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load_or_default(cli.config.as_deref())
        .context("loading configuration")?;

    match cli.command {
        Commands::Daily { date, days, store } => run_daily(&config, date, days, &store),
        Commands::Fundamentals { universe, out } => run_fundamentals(&config, &universe, &out),
        Commands::Evaluate {
            store,
            realtime,
            json,
        } => run_evaluate(&config, &store, realtime, json),
        Commands::Rank {
            store,
            fundamentals,
            universe,
            realtime,
            out,
        } => run_rank(
            &config,
            &store,
            &fundamentals,
            universe.as_deref(),
            realtime,
            &out,
        ),
        Commands::Quote { symbols } => run_quote(&config, &symbols),
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn parse_date(raw: Option<&str>) -> Result<NaiveDate> {
    Ok(raw
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("dates are YYYY-MM-DD")?
        .unwrap_or_else(|| chrono::Local::now().date_naive()))
}

fn connect(config: &AppConfig) -> Result<Sessions> {
    Sessions::connect(&config.fetch.session_config()).context("building HTTP sessions")
}

fn orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    Orchestrator::new(config.fetch.orchestrator_config()).context("building worker pool")
}

/// Fetch quotes for every stored symbol and overlay them.
fn overlay_live(config: &AppConfig, assembler: &mut SeriesAssembler) -> Result<()> {
    let sessions = connect(config)?;
    let symbols: Vec<Symbol> = assembler.symbols().cloned().collect();
    let fetch = pipeline::fetch_realtime(
        &orchestrator(config)?,
        &sessions,
        &symbols,
        config.fetch.realtime_batch,
        &TracingProgress,
    )
    .context("establishing realtime session")?;

    if fetch.is_empty_query() {
        warn!("realtime service returned an empty query, evaluating finalized history only");
        return Ok(());
    }
    for symbol in fetch.missing() {
        debug!(%symbol, "no realtime quote");
    }
    let quotes: Vec<Quote> = fetch.quotes().cloned().collect();
    let applied = pipeline::overlay_realtime(assembler, &quotes);
    info!(
        quotes = quotes.len(),
        applied,
        missing = fetch.missing().len(),
        "realtime overlay"
    );
    Ok(())
}

fn load_store(path: &Path) -> Result<SeriesAssembler> {
    let (assembler, report) =
        store::load_assembler(path).with_context(|| format!("loading {}", path.display()))?;
    for rejection in &report.rejected {
        warn!(
            symbol = %rejection.symbol,
            date = %rejection.date,
            reason = ?rejection.reason,
            "stored record rejected"
        );
    }
    Ok(assembler)
}

// ── Commands ─────────────────────────────────────────────────────────

fn run_daily(
    config: &AppConfig,
    date: Option<String>,
    days: usize,
    store_path: &Path,
) -> Result<()> {
    if days == 0 {
        bail!("--days must be at least 1");
    }
    let end = parse_date(date.as_deref())?;
    let dates = pipeline::weekdays_ending(end, days);
    let sessions = connect(config)?;

    let history = pipeline::update_store(&sessions, &dates, store_path)
        .with_context(|| format!("updating {}", store_path.display()))?;

    println!(
        "{} new records from {} trading day(s) appended to {} ({} already stored or rejected, {} without trades)",
        history.records.len(),
        history.trading_days,
        store_path.display(),
        history.ingest.rejected.len(),
        history.ingest.skipped_no_trade,
    );
    for failure in &history.failures {
        eprintln!("{} {}: {}", failure.source, failure.date, failure.error);
    }
    if history.failures.len() == dates.len() * 2 {
        bail!("every daily report failed");
    }
    Ok(())
}

fn run_fundamentals(config: &AppConfig, universe_path: &Path, out: &Path) -> Result<()> {
    let universe = Universe::from_file(universe_path)
        .with_context(|| format!("reading {}", universe_path.display()))?;
    let sessions = connect(config)?;
    let report = pipeline::fetch_fundamentals(
        &orchestrator(config)?,
        &sessions,
        universe.symbols(),
        &TracingProgress,
    );

    for failure in &report.failures {
        eprintln!("{}: {:?}: {}", failure.key, failure.kind, failure.message);
    }
    let failed = report.failures.len();
    let snapshots = report.into_payloads();
    store::write_snapshots(out, &snapshots)
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "{} snapshots written to {} ({failed} failed)",
        snapshots.len(),
        out.display()
    );
    Ok(())
}

fn verdicts_for(
    config: &AppConfig,
    assembler: &mut SeriesAssembler,
    realtime: bool,
) -> Result<BTreeMap<Symbol, Verdict>> {
    if realtime {
        overlay_live(config, assembler)?;
    }
    let evaluator = config.evaluator()?;
    Ok(pipeline::evaluate_all(&evaluator, assembler))
}

fn run_evaluate(config: &AppConfig, store_path: &Path, realtime: bool, json: bool) -> Result<()> {
    let mut assembler = load_store(store_path)?;
    let verdicts = verdicts_for(config, &mut assembler, realtime)?;

    if json {
        for (symbol, verdict) in &verdicts {
            let line = serde_json::json!({ "symbol": symbol, "verdict": verdict });
            println!("{line}");
        }
        return Ok(());
    }

    for (symbol, verdict) in verdicts.iter().filter(|(_, v)| v.is_buy()) {
        println!("{:<10} {verdict}", symbol.to_string());
    }
    let buys = verdicts.values().filter(|v| v.is_buy()).count();
    println!("{buys} buy(s) across {} symbols", verdicts.len());
    Ok(())
}

fn run_rank(
    config: &AppConfig,
    store_path: &Path,
    fundamentals: &Path,
    universe: Option<&Path>,
    realtime: bool,
    out: &Path,
) -> Result<()> {
    let mut assembler = load_store(store_path)?;
    let snapshots = store::read_snapshots(fundamentals)
        .with_context(|| format!("reading {}", fundamentals.display()))?;
    for snapshot in snapshots {
        assembler.merge_fundamentals(snapshot);
    }
    let universe = universe
        .map(|p| Universe::from_file(p).with_context(|| format!("reading {}", p.display())))
        .transpose()?;

    let verdicts = verdicts_for(config, &mut assembler, realtime)?;
    let picks = ranking::select_picks(&verdicts, &assembler, universe.as_ref(), &config.ranking);
    let picks = ranking::rank(picks, config.ranking.top_n);

    store::write_picks(out, &picks).with_context(|| format!("writing {}", out.display()))?;
    print_picks(&picks);
    println!("{} pick(s) written to {}", picks.len(), out.display());
    Ok(())
}

fn print_picks(picks: &[Pick]) {
    println!(
        "{:<10} {:<12} {:>10} {:>10} {:>8} {:>8}  reason",
        "symbol", "name", "price", "volume", "eps", "pe"
    );
    for p in picks {
        println!(
            "{:<10} {:<12} {:>10.2} {:>10} {:>8.2} {:>8.2}  {}",
            p.symbol.to_string(),
            p.name,
            p.price,
            p.volume,
            p.eps,
            p.pe_ratio,
            p.reason
        );
    }
}

fn run_quote(config: &AppConfig, raw: &[String]) -> Result<()> {
    let symbols = raw
        .iter()
        .map(|s| s.parse::<Symbol>())
        .collect::<Result<Vec<_>, _>>()?;
    let sessions = connect(config)?;
    let fetch = pipeline::fetch_realtime(
        &orchestrator(config)?,
        &sessions,
        &symbols,
        config.fetch.realtime_batch,
        &TracingProgress,
    )?;

    if fetch.is_empty_query() {
        bail!("empty query: the service returned no quotes (market closed or unknown codes)");
    }
    for failure in &fetch.report.failures {
        eprintln!("{}: {}", failure.key, failure.message);
    }
    for symbol in fetch.missing() {
        eprintln!("{symbol}: no quote in reply");
    }
    for quote in fetch.quotes() {
        println!("{}", serde_json::to_string_pretty(quote)?);
    }
    if !fetch.report.all_succeeded() {
        bail!("some quote requests failed");
    }
    Ok(())
}
