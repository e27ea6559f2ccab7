//! FourPoint Runner — fetch orchestration, pipeline batches, store and ranking.
//!
//! This crate builds on `fourpoint-core` to provide:
//! - A bounded worker pool with per-job failure isolation and batch deadlines
//! - Pipeline batches for daily reports, fundamentals and realtime quotes
//! - The flat CSV store for canonical records, snapshots and picks
//! - TOML application configuration
//! - Fundamentals-based ranking of buy verdicts

pub mod config;
pub mod orchestrator;
pub mod pipeline;
pub mod ranking;
pub mod store;

pub use config::{AppConfig, ConfigError, FetchConfig};
pub use orchestrator::{
    BatchProgress, BatchReport, JobFailure, JobHandle, Orchestrator, OrchestratorConfig,
    OrchestratorError, SilentProgress, TracingProgress,
};
pub use pipeline::{
    evaluate_all, fetch_daily, fetch_fundamentals, fetch_history, fetch_realtime,
    overlay_realtime, update_store, weekdays_ending, DailyFetch, HistoryReport, RealtimeFetch,
    Sessions, SourceFailure, SymbolBatch,
};
pub use ranking::{check, passes_filters, rank, select_picks, FilterMiss, Pick, RankingConfig};
pub use store::StoreError;
