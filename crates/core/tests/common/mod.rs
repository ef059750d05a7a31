#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stockfolio_core::clock::FixedClock;
use stockfolio_core::errors::CoreError;
use stockfolio_core::models::price::{PricePoint, PriceSeries};
use stockfolio_core::models::reference::ReferenceData;
use stockfolio_core::providers::registry::QuoteSourceRegistry;
use stockfolio_core::providers::retry::RetryPolicy;
use stockfolio_core::providers::traits::QuoteSource;
use stockfolio_core::storage::memory::{MemoryCheckpointStore, MemoryLedgerStore, MemoryPriceCache};
use stockfolio_core::{EngineParts, PortfolioEngine};

pub const EPS: f64 = 1e-6;

pub fn make_date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn reference_cutoff() -> NaiveDate {
    make_date(2022, 10, 31)
}

/// Weekday closes from `from` through `to`, priced by `price`.
pub fn weekday_series(
    from: NaiveDate,
    to: NaiveDate,
    price: impl Fn(NaiveDate) -> f64,
) -> Vec<PricePoint> {
    let mut points = Vec::new();
    let mut day = from;
    while day <= to {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            points.push(PricePoint::new(day, price(day)));
        }
        day = day.succ_opt().unwrap();
    }
    points
}

/// Reference data with bundled series for X (94.66 on the cutoff, 90.0
/// before it) and Y (50.0 flat), both up to the cutoff.
pub fn sample_reference() -> ReferenceData {
    let x = weekday_series(make_date(2021, 1, 1), reference_cutoff(), |d| {
        if d == make_date(2022, 10, 31) {
            94.66
        } else {
            90.0
        }
    });
    let y = weekday_series(make_date(2021, 1, 1), reference_cutoff(), |_| 50.0);
    ReferenceData::new(reference_cutoff())
        .with_valid_symbols(["X", "Y", "Z", "NEW"])
        .with_bundled_series("X", PriceSeries::from_points(x))
        .with_bundled_series("Y", PriceSeries::from_points(y))
}

// ═══════════════════════════════════════════════════════════════════
// Mock quote sources
// ═══════════════════════════════════════════════════════════════════

/// Serves fixed series; unknown symbols fail with `UnknownSymbol`.
pub struct MockQuoteSource {
    name: String,
    series: HashMap<String, Vec<PricePoint>>,
    calls: Arc<AtomicUsize>,
}

impl MockQuoteSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            series: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_series(mut self, symbol: &str, points: Vec<PricePoint>) -> Self {
        self.series.insert(symbol.to_uppercase(), points);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<PricePoint>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.series
            .get(&symbol.to_uppercase())
            .cloned()
            .ok_or_else(|| CoreError::UnknownSymbol {
                provider: self.name.clone(),
                symbol: symbol.to_uppercase(),
            })
    }
}

/// Always fails with a retryable network error.
pub struct FailingQuoteSource {
    calls: Arc<AtomicUsize>,
}

impl FailingQuoteSource {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl QuoteSource for FailingQuoteSource {
    fn name(&self) -> &str {
        "Failing"
    }

    async fn fetch_daily_series(&self, _symbol: &str) -> Result<Vec<PricePoint>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CoreError::QuoteSource {
            provider: "Failing".into(),
            message: "connection refused".into(),
        })
    }
}

pub fn boxed<S: QuoteSource + 'static>(source: S) -> Box<dyn QuoteSource> {
    Box::new(source)
}

pub fn registry_with(sources: Vec<Box<dyn QuoteSource>>) -> QuoteSourceRegistry {
    let mut registry = QuoteSourceRegistry::new().with_retry(RetryPolicy::no_retry());
    for source in sources {
        registry.register(source);
    }
    registry
}

// ═══════════════════════════════════════════════════════════════════
// Engine on in-memory stores
// ═══════════════════════════════════════════════════════════════════

pub struct TestEngine {
    pub engine: PortfolioEngine,
    pub clock: Arc<FixedClock>,
    pub ledgers: Arc<MemoryLedgerStore>,
    pub cache: Arc<MemoryPriceCache>,
    pub checkpoints: Arc<MemoryCheckpointStore>,
}

pub fn build_engine(
    today: NaiveDate,
    reference: ReferenceData,
    registry: QuoteSourceRegistry,
    cache: MemoryPriceCache,
) -> TestEngine {
    let clock = Arc::new(FixedClock::new(today));
    let ledgers = Arc::new(MemoryLedgerStore::new());
    let cache = Arc::new(cache);
    let checkpoints = Arc::new(MemoryCheckpointStore::new());

    let engine = PortfolioEngine::from_parts(EngineParts {
        reference,
        registry,
        ledgers: ledgers.clone(),
        price_cache: cache.clone(),
        checkpoints: checkpoints.clone(),
        clock: clock.clone(),
        max_scan_days: 366,
    });

    TestEngine {
        engine,
        clock,
        ledgers,
        cache,
        checkpoints,
    }
}

/// Engine with the sample reference data and no quote sources.
pub fn offline_engine(today: NaiveDate) -> TestEngine {
    build_engine(
        today,
        sample_reference(),
        registry_with(Vec::new()),
        MemoryPriceCache::new(),
    )
}
