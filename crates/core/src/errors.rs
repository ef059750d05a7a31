use thiserror::Error;

/// Unified error type for the entire stockfolio-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Prices ──────────────────────────────────────────────────────
    #[error("Price not available for {symbol} on {date}")]
    PriceUnavailable { symbol: String, date: String },

    #[error("Unknown symbol {symbol} ({provider})")]
    UnknownSymbol { provider: String, symbol: String },

    // ── Quote source / Network ──────────────────────────────────────
    #[error("Quote source error ({provider}): {message}")]
    QuoteSource { provider: String, message: String },

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Invalid date range: start {start} must be before finish {finish}")]
    InvalidDateRange { start: String, finish: String },

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(String),

    #[error("Portfolio already exists: {0}")]
    PortfolioExists(String),

    // ── Storage ─────────────────────────────────────────────────────
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl CoreError {
    /// Shorthand for a missing price on a concrete date.
    pub fn price_unavailable(symbol: &str, date: chrono::NaiveDate) -> Self {
        CoreError::PriceUnavailable {
            symbol: symbol.to_string(),
            date: date.to_string(),
        }
    }

    /// Whether retrying the same request may succeed.
    /// Only quote-source (network/API) failures qualify.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::QuoteSource { .. })
    }

    /// True for "no price within the scan bounds". The performance sampler
    /// and strategy catch-up recover from this one by moving the date.
    #[must_use]
    pub fn is_price_unavailable(&self) -> bool {
        matches!(self, CoreError::PriceUnavailable { .. })
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL, including the apikey query parameter.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::QuoteSource {
            provider: "http".into(),
            message: sanitized,
        }
    }
}
