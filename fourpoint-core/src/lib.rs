//! FourPoint Core — Taiwan equity data model, source adapters, assembly and rule evaluation.
//!
//! This crate contains everything that does not need a thread pool:
//! - Domain types (symbols, price points, series, quotes, fundamentals, verdicts)
//! - Source adapters for the TWSE and TPEx daily reports, Yahoo fundamentals
//!   pages and the MIS realtime feed, behind a shared `HttpSession`
//! - The series assembler that turns raw records and quotes into ordered series
//! - Indicators and the ordered "four-point" rule evaluator

pub mod assemble;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod rules;
