use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use log::debug;
use std::time::Duration;
use time::OffsetDateTime;

use super::traits::QuoteSource;
use crate::errors::CoreError;
use crate::models::price::PricePoint;

const PROVIDER: &str = "Yahoo Finance";

/// Daily closes from Yahoo Finance's public chart endpoint.
///
/// No API key required. Not WASM-compatible (native reqwest/tokio).
pub struct YahooFinanceSource {
    connector: yahoo_finance_api::YahooConnector,
    history_start: NaiveDate,
}

impl YahooFinanceSource {
    /// `timeout` bounds every request made through the connector.
    pub fn new(timeout: Duration) -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| source_error(format!("Failed to create connector: {e}")))?;
        Ok(Self {
            connector,
            history_start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
        })
    }

    fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, CoreError> {
        let month = time::Month::try_from(date.month() as u8)
            .map_err(|e| source_error(format!("Invalid month in {date}: {e}")))?;
        let odt = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
            .map_err(|e| source_error(format!("Invalid date {date}: {e}")))?
            .midnight()
            .assume_utc();
        Ok(odt)
    }

    fn timestamp_to_naive_date(ts: i64) -> Option<NaiveDate> {
        chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
    }
}

fn source_error(message: String) -> CoreError {
    CoreError::QuoteSource {
        provider: PROVIDER.into(),
        message,
    }
}

#[async_trait]
impl QuoteSource for YahooFinanceSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<PricePoint>, CoreError> {
        let symbol = symbol.to_uppercase();
        let start = Self::to_offset_datetime(self.history_start)?;
        let tomorrow = chrono::Utc::now().date_naive() + chrono::Duration::days(1);
        let end = Self::to_offset_datetime(tomorrow)?;

        let resp = self
            .connector
            .get_quote_history(&symbol, start, end)
            .await
            .map_err(|e| {
                let message = e.to_string();
                if message.contains("Not Found") || message.contains("No data found") {
                    CoreError::UnknownSymbol {
                        provider: PROVIDER.into(),
                        symbol: symbol.clone(),
                    }
                } else {
                    source_error(format!("Failed to fetch history for {symbol}: {message}"))
                }
            })?;

        let quotes = resp
            .quotes()
            .map_err(|e| source_error(format!("Failed to parse quotes for {symbol}: {e}")))?;

        let mut points: Vec<PricePoint> = quotes
            .iter()
            .filter(|q| q.close.is_finite() && q.close >= 0.0)
            .filter_map(|q| {
                let date = Self::timestamp_to_naive_date(q.timestamp)?;
                Some(PricePoint::new(date, q.close))
            })
            .collect();
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);

        debug!("{PROVIDER}: {} daily closes for {symbol}", points.len());
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_builds_with_timeout() {
        let source = YahooFinanceSource::new(Duration::from_secs(5)).unwrap();
        assert_eq!(source.name(), "Yahoo Finance");
    }

    #[test]
    fn test_timestamp_to_date() {
        // 2022-10-31T13:30:00Z
        assert_eq!(
            YahooFinanceSource::timestamp_to_naive_date(1_667_223_000),
            NaiveDate::from_ymd_opt(2022, 10, 31)
        );
    }
}
