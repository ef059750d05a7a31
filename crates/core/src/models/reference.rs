use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use super::price::PriceSeries;

/// Immutable reference data, loaded once and handed to the engine:
/// the set of tradable symbols and the bundled historical series
/// (usable only up to `cutoff`).
#[derive(Debug, Clone)]
pub struct ReferenceData {
    valid_symbols: HashSet<String>,
    bundled: HashMap<String, PriceSeries>,
    cutoff: NaiveDate,
}

impl ReferenceData {
    /// No symbol restrictions and no bundled series.
    pub fn new(cutoff: NaiveDate) -> Self {
        Self {
            valid_symbols: HashSet::new(),
            bundled: HashMap::new(),
            cutoff,
        }
    }

    pub fn with_valid_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_symbols
            .extend(symbols.into_iter().map(|s| s.into().trim().to_uppercase()));
        self
    }

    pub fn with_bundled_series(mut self, symbol: &str, series: PriceSeries) -> Self {
        self.bundled.insert(symbol.to_uppercase(), series);
        self
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    /// An empty symbol list means "accept anything".
    pub fn is_valid_symbol(&self, symbol: &str) -> bool {
        self.valid_symbols.is_empty() || self.valid_symbols.contains(&symbol.to_uppercase())
    }

    pub fn valid_symbol_count(&self) -> usize {
        self.valid_symbols.len()
    }

    /// Whether the bundled series is authoritative for `symbol` on `date`.
    /// Within that window a missing date is a non-trading day, not a cache miss.
    pub fn covers(&self, symbol: &str, date: NaiveDate) -> bool {
        date <= self.cutoff && self.bundled.contains_key(&symbol.to_uppercase())
    }

    /// Bundled close on `date`, only for dates up to the cutoff.
    pub fn bundled_price(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        if date > self.cutoff {
            return None;
        }
        self.bundled
            .get(&symbol.to_uppercase())
            .and_then(|series| series.get_price(date))
    }

    pub fn bundled_symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.bundled.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }
}
