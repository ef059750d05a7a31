use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::price::PricePoint;

/// A remote source of daily closing prices.
///
/// Implementations return the full history they know for a symbol; the
/// resolver replaces its cached copy with whatever comes back.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait QuoteSource: Send + Sync {
    /// Human-readable name of this source (for logs/errors).
    fn name(&self) -> &str;

    /// Every daily close available for `symbol`, sorted by date.
    ///
    /// Fails with [`CoreError::UnknownSymbol`] when the source does not
    /// recognise the symbol, and [`CoreError::QuoteSource`] on network,
    /// rate-limit or format problems.
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<PricePoint>, CoreError>;
}
