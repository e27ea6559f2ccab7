//! Universe — the common stocks eligible for scraping and evaluation.
//!
//! Loaded from the public equities list CSV (`type,code,name,…,market,…`).
//! Only rows of type `股票` on a recognised market are kept; other columns
//! are ignored.

use crate::domain::{Symbol, Venue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

pub const COMMON_STOCK: &str = "股票";

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(rename = "type")]
    kind: String,
    code: String,
    name: String,
    market: String,
}

/// Symbols with their display names, ordered by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Universe {
    names: BTreeMap<Symbol, String>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let file = std::fs::File::open(path).map_err(|source| UniverseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, UniverseError> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut names = BTreeMap::new();
        for row in csv.deserialize::<Row>() {
            let row = row?;
            if row.kind != COMMON_STOCK {
                continue;
            }
            let Some(venue) = Venue::from_market_label(&row.market) else {
                continue;
            };
            names.insert(Symbol::new(row.code, venue), row.name);
        }
        Ok(Self { names })
    }

    pub fn from_symbols(symbols: impl IntoIterator<Item = (Symbol, String)>) -> Self {
        Self {
            names: symbols.into_iter().collect(),
        }
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.names.keys().cloned().collect()
    }

    pub fn name_of(&self, symbol: &Symbol) -> Option<&str> {
        self.names.get(symbol).map(String::as_str)
    }

    pub fn venue_count(&self, venue: Venue) -> usize {
        self.names.keys().filter(|s| s.venue() == venue).count()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
type,code,name,ISIN,start,market,group,CFI
股票,2330,台積電,TW0002330008,1994/09/05,上市,半導體業,ESVUFR
ETF,0050,元大台灣50,TW0000050004,2003/06/30,上市,,CEOGEU
股票,6488,環球晶,TW0006488000,2008/09/24,上櫃,半導體業,ESVUFR
股票,7777,興櫃股,TW0007777000,2020/01/02,興櫃,其他,ESVUFR
";

    #[test]
    fn keeps_common_stocks_on_known_markets() {
        let u = Universe::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(u.len(), 2);
        assert_eq!(u.symbols(), vec![Symbol::listed("2330"), Symbol::otc("6488")]);
        assert_eq!(u.name_of(&Symbol::otc("6488")), Some("環球晶"));
        assert_eq!(u.venue_count(Venue::Listed), 1);
    }

    #[test]
    fn missing_column_is_error() {
        let bad = "code,name\n2330,台積電\n";
        assert!(matches!(Universe::from_reader(bad.as_bytes()), Err(UniverseError::Csv(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Universe::from_file(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, UniverseError::Io { .. }));
    }
}
