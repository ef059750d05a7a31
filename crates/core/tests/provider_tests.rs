// ═══════════════════════════════════════════════════════════════════
// Provider Tests: quote source registry, fallback order, retries,
// Alpha Vantage CSV parsing
// ═══════════════════════════════════════════════════════════════════

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{boxed, make_date, registry_with, weekday_series, FailingQuoteSource, MockQuoteSource};
use stockfolio_core::config::EngineConfig;
use stockfolio_core::errors::CoreError;
use stockfolio_core::providers::alphavantage::parse_daily_csv;
use stockfolio_core::providers::registry::QuoteSourceRegistry;
use stockfolio_core::providers::retry::RetryPolicy;

mod registry {
    use super::*;

    #[tokio::test]
    async fn empty_registry_is_a_quote_source_error() {
        let registry = QuoteSourceRegistry::new();
        assert!(registry.is_empty());
        let err = registry.fetch_daily_series("AAPL").await.unwrap_err();
        assert!(matches!(err, CoreError::QuoteSource { .. }));
    }

    #[tokio::test]
    async fn falls_back_to_next_source() {
        let failing = FailingQuoteSource::new();
        let failing_calls = failing.calls();
        let points = weekday_series(make_date(2022, 10, 3), make_date(2022, 10, 7), |_| 10.0);
        let mock = MockQuoteSource::new("Mock").with_series("AAPL", points.clone());

        let registry = registry_with(vec![boxed(failing), boxed(mock)]);
        assert_eq!(registry.names(), vec!["Failing", "Mock"]);

        let fetched = registry.fetch_daily_series("aapl").await.unwrap();
        assert_eq!(fetched, points);
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_symbol_still_asks_next_source() {
        let first = MockQuoteSource::new("First");
        let first_calls = first.calls();
        let second = MockQuoteSource::new("Second").with_series(
            "NEW",
            weekday_series(make_date(2022, 10, 3), make_date(2022, 10, 4), |_| 1.0),
        );

        let registry = registry_with(vec![boxed(first), boxed(second)]);
        assert_eq!(registry.fetch_daily_series("NEW").await.unwrap().len(), 2);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn last_error_is_returned_when_all_fail() {
        let registry = registry_with(vec![
            boxed(FailingQuoteSource::new()),
            boxed(MockQuoteSource::new("Mock")),
        ]);
        let err = registry.fetch_daily_series("ZZZ").await.unwrap_err();
        assert!(matches!(err, CoreError::UnknownSymbol { .. }));
    }

    #[tokio::test]
    async fn retries_transient_failures_per_source() {
        let failing = FailingQuoteSource::new();
        let calls = failing.calls();
        let mut registry =
            QuoteSourceRegistry::new().with_retry(RetryPolicy::new(2, Duration::ZERO));
        registry.register(Box::new(failing));

        let err = registry.fetch_daily_series("AAPL").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_retried() {
        let mock = MockQuoteSource::new("Mock");
        let calls = mock.calls();
        let mut registry =
            QuoteSourceRegistry::new().with_retry(RetryPolicy::new(3, Duration::ZERO));
        registry.register(Box::new(mock));

        assert!(registry.fetch_daily_series("ZZZ").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn defaults_put_alpha_vantage_first_when_keyed() {
        let mut config = EngineConfig::default();
        config
            .api_keys
            .insert("alphavantage".into(), "demo".into());
        let registry = QuoteSourceRegistry::new_with_defaults(&config);
        assert_eq!(registry.names().first().copied(), Some("Alpha Vantage"));
    }
}

mod alpha_vantage_csv {
    use super::*;

    #[test]
    fn close_column_is_used() {
        let body = "timestamp,open,high,low,close,volume\n\
                    2022-10-31,1.0,2.0,0.5,94.66,100\n";
        let points = parse_daily_csv("X", body).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].date, make_date(2022, 10, 31));
        assert_eq!(points[0].price, 94.66);
    }

    #[test]
    fn information_message_is_a_quote_source_error() {
        let body = r#"{"Information": "Please consider a premium plan."}"#;
        assert!(matches!(
            parse_daily_csv("X", body),
            Err(CoreError::QuoteSource { .. })
        ));
    }

    #[test]
    fn header_only_body_is_an_error() {
        let body = "timestamp,open,high,low,close,volume\n";
        assert!(parse_daily_csv("X", body).is_err());
    }
}
