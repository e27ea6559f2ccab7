//! Source adapters and the normalization they share.
//!
//! Each adapter turns one external format into canonical records, snapshots
//! or quotes. Parsing is exposed as pure `parse_*` functions so it can be
//! tested without a network.

pub mod calendar;
pub mod circuit_breaker;
pub mod fundamentals;
pub mod normalize;
pub mod provider;
pub mod realtime;
pub mod record;
pub mod retry;
pub mod tpex;
pub mod twse;
pub mod universe;

pub use calendar::{gregorian_to_roc, roc_to_gregorian, CalendarError};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use fundamentals::FundamentalsScraper;
pub use provider::{
    FailureKind, FetchError, FetchResult, HttpResponse, HttpSession, HttpTransport,
    ReqwestTransport, SessionConfig, SourceAdapter,
};
pub use realtime::{RealtimeQuotes, RealtimeResponse, RealtimeSession};
pub use record::{CanonicalRecord, DailyReport};
pub use retry::RetryPolicy;
pub use tpex::TpexDailyReport;
pub use twse::TwseDailyReport;
pub use universe::{Universe, UniverseError};
