//! Calendar conversions.
//!
//! The OTC market publishes dates in the ROC (Minguo) calendar, where
//! year = Gregorian year − 1911. Nothing outside the adapters sees ROC dates.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

pub const ROC_YEAR_OFFSET: i32 = 1911;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("malformed date '{0}'")]
    Malformed(String),

    #[error("date '{0}' is not a valid calendar day")]
    Invalid(String),

    #[error("{0} predates the ROC calendar")]
    BeforeRocEra(NaiveDate),
}

/// `"113/10/11"` → 2024-10-11.
pub fn roc_to_gregorian(raw: &str) -> Result<NaiveDate, CalendarError> {
    let s = raw.trim();
    let malformed = || CalendarError::Malformed(s.to_string());

    let mut parts = s.split('/');
    let (Some(y), Some(m), Some(d), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let year: i32 = y.trim().parse().map_err(|_| malformed())?;
    let month: u32 = m.trim().parse().map_err(|_| malformed())?;
    let day: u32 = d.trim().parse().map_err(|_| malformed())?;
    if year < 1 {
        return Err(malformed());
    }

    NaiveDate::from_ymd_opt(year + ROC_YEAR_OFFSET, month, day)
        .ok_or_else(|| CalendarError::Invalid(s.to_string()))
}

/// 2024-10-11 → `"113/10/11"`.
pub fn gregorian_to_roc(date: NaiveDate) -> Result<String, CalendarError> {
    let year = date.year() - ROC_YEAR_OFFSET;
    if year < 1 {
        return Err(CalendarError::BeforeRocEra(date));
    }
    Ok(format!("{year}/{:02}/{:02}", date.month(), date.day()))
}

/// `"20241011"` → 2024-10-11.
pub fn parse_compact_date(raw: &str) -> Result<NaiveDate, CalendarError> {
    let s = raw.trim();
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CalendarError::Malformed(s.to_string()));
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| CalendarError::Invalid(s.to_string()))
}

/// 2024-10-11 → `"20241011"`.
pub fn compact(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn roc_to_gregorian_basic() {
        assert_eq!(roc_to_gregorian("113/10/11").unwrap(), d(2024, 10, 11));
        assert_eq!(roc_to_gregorian(" 99/1/5 ").unwrap(), d(2010, 1, 5));
    }

    #[test]
    fn roc_rejects_garbage() {
        assert!(matches!(roc_to_gregorian("113-10-11"), Err(CalendarError::Malformed(_))));
        assert!(matches!(roc_to_gregorian("113/10"), Err(CalendarError::Malformed(_))));
        assert!(matches!(roc_to_gregorian("113/10/11/1"), Err(CalendarError::Malformed(_))));
        assert!(matches!(roc_to_gregorian("0/10/11"), Err(CalendarError::Malformed(_))));
        assert!(matches!(roc_to_gregorian("113/02/30"), Err(CalendarError::Invalid(_))));
    }

    #[test]
    fn gregorian_to_roc_pads() {
        assert_eq!(gregorian_to_roc(d(2024, 1, 5)).unwrap(), "113/01/05");
        assert!(gregorian_to_roc(d(1900, 1, 1)).is_err());
    }

    #[test]
    fn roc_round_trip_for_a_leap_day() {
        let leap = d(2024, 2, 29);
        assert_eq!(roc_to_gregorian(&gregorian_to_roc(leap).unwrap()).unwrap(), leap);
    }

    #[test]
    fn compact_dates() {
        assert_eq!(parse_compact_date("20241011").unwrap(), d(2024, 10, 11));
        assert_eq!(compact(d(2024, 10, 11)), "20241011");
        assert!(parse_compact_date("2024-10-11").is_err());
        assert!(parse_compact_date("20241341").is_err());
    }
}
