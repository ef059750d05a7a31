use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::traits::QuoteSource;
use crate::errors::CoreError;
use crate::models::price::PricePoint;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

/// Alpha Vantage daily equity closes.
///
/// - **Free tier**: 25 requests/day, 5 per minute.
/// - **Requires**: API key (config key "alphavantage").
/// - **Endpoint**: `TIME_SERIES_DAILY`, `outputsize=full`, `datatype=csv`.
///
/// The CSV body is `timestamp,open,high,low,close,volume`, newest first.
/// Failures come back as a small JSON object instead of CSV.
pub struct AlphaVantageSource {
    client: Client,
    api_key: String,
}

impl AlphaVantageSource {
    /// Fails when the HTTP client cannot be built with `timeout`.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, CoreError> {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(timeout);
        #[cfg(target_arch = "wasm32")]
        let _ = timeout;
        let client = builder.build().map_err(|e| CoreError::QuoteSource {
            provider: PROVIDER.into(),
            message: format!("Failed to build HTTP client: {e}"),
        })?;
        Ok(Self { client, api_key })
    }

    async fn fetch_csv(&self, symbol: &str) -> Result<String, CoreError> {
        let symbol = symbol.to_uppercase();
        debug!(
            "{PROVIDER} request: TIME_SERIES_DAILY {symbol} (apikey {})",
            mask_key(&self.api_key)
        );

        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol.as_str()),
                ("outputsize", "full"),
                ("datatype", "csv"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::QuoteSource {
                provider: PROVIDER.into(),
                message: format!("HTTP {status} for {symbol}"),
            });
        }
        Ok(response.text().await?)
    }
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(2).collect();
    format!("{visible}***")
}

// ── Error envelope ──────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct ErrorEnvelope {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

fn check_envelope(symbol: &str, body: &str) -> Result<(), CoreError> {
    if !body.trim_start().starts_with('{') {
        return Ok(());
    }
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();

    if let Some(msg) = envelope.error_message {
        if msg.contains("Invalid API call") || msg.contains("not found") {
            return Err(CoreError::UnknownSymbol {
                provider: PROVIDER.into(),
                symbol: symbol.to_uppercase(),
            });
        }
        return Err(CoreError::QuoteSource {
            provider: PROVIDER.into(),
            message: msg,
        });
    }

    // Rate limiting shows up as "Note" or "Information".
    let message = envelope
        .note
        .or(envelope.information)
        .unwrap_or_else(|| "unexpected JSON response".to_string());
    Err(CoreError::QuoteSource {
        provider: PROVIDER.into(),
        message,
    })
}

/// Parse a `TIME_SERIES_DAILY` CSV body into points sorted by date.
/// The close is the fifth column; rows that do not parse are skipped.
pub fn parse_daily_csv(symbol: &str, body: &str) -> Result<Vec<PricePoint>, CoreError> {
    check_envelope(symbol, body)?;

    let mut points = Vec::new();
    for (i, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || (i == 0 && line.starts_with("timestamp")) {
            continue;
        }
        let cols: Vec<&str> = line.split(',').collect();
        let parsed = cols.get(4).and_then(|close| {
            let date = NaiveDate::parse_from_str(cols[0].trim(), "%Y-%m-%d").ok()?;
            let price: f64 = close.trim().parse().ok()?;
            Some(PricePoint::new(date, price))
        });
        match parsed {
            Some(point) => points.push(point),
            None => warn!("{PROVIDER}: skipping unparseable row for {symbol}: '{line}'"),
        }
    }

    if points.is_empty() {
        return Err(CoreError::QuoteSource {
            provider: PROVIDER.into(),
            message: format!("No daily rows for {symbol}"),
        });
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl QuoteSource for AlphaVantageSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<PricePoint>, CoreError> {
        let body = self.fetch_csv(symbol).await?;
        let points = parse_daily_csv(symbol, &body)?;
        debug!("{PROVIDER}: {} daily closes for {symbol}", points.len());
        Ok(points)
    }
}
