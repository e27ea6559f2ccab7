//! Symbol — exchange code plus venue, the identity key for every other entity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Market a symbol trades on. Decides which daily-report adapter and which
/// calendar convention apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Venue {
    /// Taiwan Stock Exchange (上市).
    Listed,
    /// Taipei Exchange over-the-counter market (上櫃).
    Otc,
}

impl Venue {
    /// Prefix used by the realtime quote service (`tse_2330.tw`).
    pub fn channel_prefix(self) -> &'static str {
        match self {
            Venue::Listed => "tse",
            Venue::Otc => "otc",
        }
    }

    /// Suffix used in the display form (`2330.TW`, `6488.TWO`).
    pub fn suffix(self) -> &'static str {
        match self {
            Venue::Listed => "TW",
            Venue::Otc => "TWO",
        }
    }

    /// Map the market label used in the public equities list.
    pub fn from_market_label(label: &str) -> Option<Self> {
        match label.trim() {
            "上市" | "tse" | "TW" => Some(Venue::Listed),
            "上櫃" | "otc" | "TWO" => Some(Venue::Otc),
            _ => None,
        }
    }
}

/// Exchange code + venue.
///
/// Serialized in its display form (`2330.TW`) so flat records stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Symbol {
    code: String,
    venue: Venue,
}

impl Symbol {
    pub fn new(code: impl Into<String>, venue: Venue) -> Self {
        Self {
            code: code.into().trim().to_string(),
            venue,
        }
    }

    pub fn listed(code: impl Into<String>) -> Self {
        Self::new(code, Venue::Listed)
    }

    pub fn otc(code: impl Into<String>) -> Self {
        Self::new(code, Venue::Otc)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    /// Venue-qualified identifier for the realtime quote service.
    pub fn channel_key(&self) -> String {
        format!("{}_{}.tw", self.venue.channel_prefix(), self.code)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.code, self.venue.suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid symbol '{0}': expected CODE.TW, CODE.TWO or tse_CODE.tw")]
pub struct SymbolParseError(pub String);

impl FromStr for Symbol {
    type Err = SymbolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || SymbolParseError(s.to_string());

        // Realtime channel form: tse_2330.tw
        if let Some((prefix, rest)) = s.split_once('_') {
            let code = rest.strip_suffix(".tw").ok_or_else(bad)?;
            let venue = Venue::from_market_label(prefix).ok_or_else(bad)?;
            if code.is_empty() {
                return Err(bad());
            }
            return Ok(Symbol::new(code, venue));
        }

        let (code, suffix) = s.rsplit_once('.').ok_or_else(bad)?;
        if code.is_empty() {
            return Err(bad());
        }
        let venue = match suffix.to_ascii_uppercase().as_str() {
            "TW" => Venue::Listed,
            "TWO" => Venue::Otc,
            _ => return Err(bad()),
        };
        Ok(Symbol::new(code, venue))
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_key_is_venue_qualified() {
        assert_eq!(Symbol::listed("2330").channel_key(), "tse_2330.tw");
        assert_eq!(Symbol::otc("6488").channel_key(), "otc_6488.tw");
    }

    #[test]
    fn display_and_parse_agree() {
        for sym in [Symbol::listed("2330"), Symbol::otc("6488")] {
            let parsed: Symbol = sym.to_string().parse().unwrap();
            assert_eq!(parsed, sym);
        }
    }

    #[test]
    fn parses_channel_form() {
        let sym: Symbol = "otc_6488.tw".parse().unwrap();
        assert_eq!(sym, Symbol::otc("6488"));
    }

    #[test]
    fn rejects_unknown_suffix() {
        assert!("2330.HK".parse::<Symbol>().is_err());
        assert!("2330".parse::<Symbol>().is_err());
        assert!(".TW".parse::<Symbol>().is_err());
    }

    #[test]
    fn market_labels_map_to_venues() {
        assert_eq!(Venue::from_market_label("上市"), Some(Venue::Listed));
        assert_eq!(Venue::from_market_label("上櫃"), Some(Venue::Otc));
        assert_eq!(Venue::from_market_label("興櫃"), None);
    }

    #[test]
    fn serializes_as_display_string() {
        let json = serde_json::to_string(&Symbol::listed("2330")).unwrap();
        assert_eq!(json, "\"2330.TW\"");
    }
}
