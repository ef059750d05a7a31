use log::{debug, warn};

use super::alphavantage::AlphaVantageSource;
use super::retry::RetryPolicy;
use super::traits::QuoteSource;
#[cfg(not(target_arch = "wasm32"))]
use super::yahoo_finance::YahooFinanceSource;
use crate::config::EngineConfig;
use crate::errors::CoreError;
use crate::models::price::PricePoint;

/// Ordered list of quote sources.
///
/// A fetch tries each source in registration order (with retries) and
/// returns the first success. An unknown-symbol answer from one source does
/// not stop the next one from being asked.
pub struct QuoteSourceRegistry {
    sources: Vec<Box<dyn QuoteSource>>,
    retry: RetryPolicy,
}

impl QuoteSourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Registry with the default sources for `config`.
    pub fn new_with_defaults(config: &EngineConfig) -> Self {
        let mut registry = Self::new().with_retry(config.retry_policy());

        // Alpha Vantage first when a key is configured
        if let Some(key) = config.api_keys.get("alphavantage") {
            match AlphaVantageSource::new(key.clone(), config.request_timeout()) {
                Ok(alpha) => registry.register(Box::new(alpha)),
                Err(e) => warn!("Alpha Vantage unavailable: {e}"),
            }
        }

        // Yahoo Finance needs no key; not available on WASM
        #[cfg(not(target_arch = "wasm32"))]
        {
            match YahooFinanceSource::new(config.request_timeout()) {
                Ok(yahoo) => registry.register(Box::new(yahoo)),
                Err(e) => warn!("Yahoo Finance unavailable: {e}"),
            }
        }

        registry
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn register(&mut self, source: Box<dyn QuoteSource>) {
        self.sources.push(source);
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Fetch the full daily series for `symbol`.
    ///
    /// Returns the last error when every source fails. With no sources
    /// registered the call fails with `QuoteSource`.
    pub async fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<PricePoint>, CoreError> {
        let mut last_error = None;

        for source in &self.sources {
            let label = format!("{} {symbol}", source.name());
            match self
                .retry
                .run(&label, || source.fetch_daily_series(symbol))
                .await
            {
                Ok(points) => {
                    debug!("{label}: fetched {} points", points.len());
                    return Ok(points);
                }
                Err(e) => {
                    warn!("{label} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::QuoteSource {
            provider: "registry".into(),
            message: format!("No quote source configured for {symbol}"),
        }))
    }
}

impl Default for QuoteSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QuoteSourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteSourceRegistry")
            .field("sources", &self.names())
            .field("retry", &self.retry)
            .finish()
    }
}
