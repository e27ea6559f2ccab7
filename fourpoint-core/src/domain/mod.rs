//! Domain types: symbols, price points, series, fundamentals, quotes, verdicts.

pub mod fundamentals;
pub mod price_point;
pub mod quote;
pub mod series;
pub mod symbol;
pub mod verdict;

pub use fundamentals::FundamentalsSnapshot;
pub use price_point::{Activity, Ohlc, PricePoint, PricePointError};
pub use quote::{Level, Quote};
pub use series::{SeriesError, SymbolSeries};
pub use symbol::{Symbol, SymbolParseError, Venue};
pub use verdict::Verdict;
