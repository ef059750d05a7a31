use chrono::NaiveDate;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::errors::CoreError;
use crate::models::price::{PriceSeries, PriceTier, ResolveMode, ResolvedPrice};
use crate::models::reference::ReferenceData;
use crate::providers::registry::QuoteSourceRegistry;
use crate::storage::traits::PriceCacheStore;

/// Resolves (symbol, date) to a closing price through three tiers.
///
/// 1. **Reference**: bundled series, authoritative for dates up to the cutoff.
///    A date missing there is a non-trading day; no network call is made.
/// 2. **Cache**: the per-symbol cache file, loaded once and kept in memory.
/// 3. **Remote**: on a cache miss the full series is fetched from the quote
///    sources and *replaces* the cache for that symbol.
///
/// The remote tier is asked at most once per symbol per day, and never for
/// dates after today.
pub struct PriceResolver {
    reference: Arc<ReferenceData>,
    registry: QuoteSourceRegistry,
    cache: Arc<dyn PriceCacheStore>,
    clock: Arc<dyn Clock>,
    max_scan_days: i64,
    loaded: HashMap<String, PriceSeries>,
    refreshed: HashMap<String, NaiveDate>,
}

impl PriceResolver {
    pub fn new(
        reference: Arc<ReferenceData>,
        registry: QuoteSourceRegistry,
        cache: Arc<dyn PriceCacheStore>,
        clock: Arc<dyn Clock>,
        max_scan_days: i64,
    ) -> Self {
        Self {
            reference,
            registry,
            cache,
            clock,
            max_scan_days: max_scan_days.max(0),
            loaded: HashMap::new(),
            refreshed: HashMap::new(),
        }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Resolve a price according to `mode`.
    ///
    /// - `Exact`: only `date`.
    /// - `NearestForward`: `date`, then each following day up to today.
    /// - `NearestBackward`: `date`, then each preceding day, at most
    ///   `max_scan_days` steps.
    ///
    /// A missing date keeps the scan going; a quote-source failure or an
    /// unknown symbol stops it and is returned as-is.
    pub async fn resolve(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        mode: ResolveMode,
    ) -> Result<ResolvedPrice, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        if !self.reference.is_valid_symbol(&symbol) {
            return Err(CoreError::UnknownSymbol {
                provider: "reference".into(),
                symbol,
            });
        }

        match mode {
            ResolveMode::Exact => {
                if let Some(found) = self.lookup_exact(&symbol, date).await? {
                    return Ok(Self::resolved(&symbol, date, date, found));
                }
            }
            ResolveMode::NearestForward => {
                let today = self.clock.today();
                let mut day = date;
                while day <= today {
                    if let Some(found) = self.lookup_exact(&symbol, day).await? {
                        return Ok(Self::resolved(&symbol, date, day, found));
                    }
                    match day.succ_opt() {
                        Some(next) => day = next,
                        None => break,
                    }
                }
            }
            ResolveMode::NearestBackward => {
                let mut day = date;
                for _ in 0..=self.max_scan_days {
                    if let Some(found) = self.lookup_exact(&symbol, day).await? {
                        return Ok(Self::resolved(&symbol, date, day, found));
                    }
                    match day.pred_opt() {
                        Some(prev) => day = prev,
                        None => break,
                    }
                }
            }
        }

        Err(CoreError::price_unavailable(&symbol, date))
    }

    /// Most recent close on or before today.
    pub async fn last_traded_price(&mut self, symbol: &str) -> Result<ResolvedPrice, CoreError> {
        let today = self.clock.today();
        self.resolve(symbol, today, ResolveMode::NearestBackward).await
    }

    fn resolved(
        symbol: &str,
        requested: NaiveDate,
        date: NaiveDate,
        (price, tier): (f64, PriceTier),
    ) -> ResolvedPrice {
        ResolvedPrice {
            symbol: symbol.to_string(),
            requested,
            date,
            price,
            tier,
        }
    }

    /// One date, no scanning. `Ok(None)` means "no close on that day".
    async fn lookup_exact(
        &mut self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<(f64, PriceTier)>, CoreError> {
        if self.reference.covers(symbol, date) {
            return Ok(self
                .reference
                .bundled_price(symbol, date)
                .map(|p| (p, PriceTier::Reference)));
        }

        let cached = self.cached_series(symbol)?.get_price(date);
        if let Some(price) = cached {
            return Ok(Some((price, PriceTier::Cache)));
        }

        let today = self.clock.today();
        if date > today
            || self.registry.is_empty()
            || self.refreshed.get(symbol) == Some(&today)
        {
            return Ok(None);
        }

        let series = self.refresh(symbol, today).await?;
        Ok(series.get_price(date).map(|p| (p, PriceTier::Remote)))
    }

    fn cached_series(&mut self, symbol: &str) -> Result<&PriceSeries, CoreError> {
        if !self.loaded.contains_key(symbol) {
            let series = self.cache.load(symbol)?.unwrap_or_default();
            debug!("Loaded {} cached closes for {symbol}", series.len());
            self.loaded.insert(symbol.to_string(), series);
        }
        Ok(self.loaded.entry(symbol.to_string()).or_default())
    }

    /// Fetch the full remote series and make it the cached copy.
    async fn refresh(&mut self, symbol: &str, today: NaiveDate) -> Result<&PriceSeries, CoreError> {
        debug!("Cache miss for {symbol}; fetching remote series");
        let points = self.registry.fetch_daily_series(symbol).await?;
        let series = PriceSeries::from_points(points);
        self.cache.replace(symbol, &series)?;
        self.refreshed.insert(symbol.to_string(), today);
        self.loaded.insert(symbol.to_string(), series);
        Ok(self.loaded.entry(symbol.to_string()).or_default())
    }
}

impl std::fmt::Debug for PriceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceResolver")
            .field("registry", &self.registry)
            .field("max_scan_days", &self.max_scan_days)
            .field("loaded_symbols", &self.loaded.len())
            .finish()
    }
}
