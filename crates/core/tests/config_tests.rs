// ═══════════════════════════════════════════════════════════════════
// Config & Error Tests
// ═══════════════════════════════════════════════════════════════════

mod common;

use std::time::Duration;

use common::make_date;
use stockfolio_core::config::{default_reference_cutoff, EngineConfig};
use stockfolio_core::errors::CoreError;

mod engine_config {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.reference_cutoff, make_date(2022, 10, 31));
        assert_eq!(config.reference_cutoff, default_reference_cutoff());
        assert_eq!(config.max_scan_days, 366);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.api_keys.is_empty());
        assert!(config.reference_dir.is_none());

        let retry = config.retry_policy();
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.backoff, Duration::from_millis(250));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(
            &path,
            r#"{
                "data_dir": "/srv/stockfolio",
                "reference_cutoff": "2023-06-30",
                "api_keys": { "alphavantage": "secret" },
                "max_retries": 0
            }"#,
        )
        .unwrap();

        let config = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.data_dir, std::path::PathBuf::from("/srv/stockfolio"));
        assert_eq!(config.reference_cutoff, make_date(2023, 6, 30));
        assert_eq!(config.api_keys.get("alphavantage").map(String::as_str), Some("secret"));
        assert_eq!(config.retry_policy().max_retries, 0);
        assert_eq!(config.max_scan_days, 366);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn missing_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load_from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CoreError::Persistence(_)));
    }

    #[test]
    fn malformed_file_is_a_deserialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "{ \"max_scan_days\": \"many\" }").unwrap();
        assert!(matches!(
            EngineConfig::load_from_file(&path),
            Err(CoreError::Deserialization(_))
        ));
    }
}

mod core_error {
    use super::*;

    #[test]
    fn only_quote_source_failures_are_retryable() {
        let network = CoreError::QuoteSource {
            provider: "Yahoo Finance".into(),
            message: "timeout".into(),
        };
        assert!(network.is_retryable());
        assert!(!CoreError::UnknownSymbol {
            provider: "Yahoo Finance".into(),
            symbol: "ZZZ".into()
        }
        .is_retryable());
        assert!(!CoreError::price_unavailable("X", make_date(2022, 11, 5)).is_retryable());
    }

    #[test]
    fn price_unavailable_message() {
        let err = CoreError::price_unavailable("X", make_date(2022, 11, 5));
        assert!(err.is_price_unavailable());
        assert_eq!(err.to_string(), "Price not available for X on 2022-11-05");
    }

    #[test]
    fn io_errors_become_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(CoreError::from(io), CoreError::Persistence(_)));
    }
}
