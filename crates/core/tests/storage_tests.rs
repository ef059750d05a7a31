// ═══════════════════════════════════════════════════════════════════
// Storage Tests: file-backed ledgers, price cache, checkpoints,
// reference data and the in-memory doubles
// ═══════════════════════════════════════════════════════════════════

mod common;

use common::{make_date, reference_cutoff};
use stockfolio_core::errors::CoreError;
use stockfolio_core::models::portfolio::{Ledger, PortfolioKey, PortfolioKind};
use stockfolio_core::models::price::{PricePoint, PriceSeries};
use stockfolio_core::models::strategy::{StrategyAllocation, StrategyCheckpoint, StrategyPlan};
use stockfolio_core::models::transaction::TransactionRecord;
use stockfolio_core::storage::file_store::{
    load_reference_data, write_atomic, FileCheckpointStore, FileLedgerStore, FilePriceCache,
};
use stockfolio_core::storage::format;
use stockfolio_core::storage::memory::{MemoryCheckpointStore, MemoryLedgerStore};
use stockfolio_core::storage::traits::{CheckpointStore, LedgerStore, PriceCacheStore};

fn sample_plan() -> StrategyPlan {
    StrategyPlan::dollar_cost_averaging(
        vec![
            StrategyAllocation::new("AAPL", 60.0, 2.0),
            StrategyAllocation::new("MSFT", 40.0, 1.5),
        ],
        1000.0,
        30,
    )
    .unwrap()
}

mod ledger_store {
    use super::*;

    #[test]
    fn save_load_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path());
        let key = PortfolioKey::flexible("ann", "growth");
        let ledger = Ledger::from_records(vec![
            TransactionRecord::buy("AAPL", make_date(2022, 10, 3), 2.0, 140.0, 1.0),
            TransactionRecord::sell("AAPL", make_date(2022, 10, 10), 1.0, 145.0, 1.0),
        ]);

        assert!(store.load(&key).unwrap().is_none());
        store.save(&key, &ledger).unwrap();
        assert_eq!(store.load(&key).unwrap(), Some(ledger));

        store
            .save(&PortfolioKey::flexible("ann", "income"), &Ledger::new())
            .unwrap();
        store
            .save(&PortfolioKey::inflexible("ann", "legacy"), &Ledger::new())
            .unwrap();

        assert_eq!(
            store.list("ann", PortfolioKind::Flexible).unwrap(),
            vec!["growth".to_string(), "income".to_string()]
        );
        assert_eq!(
            store.list("ann", PortfolioKind::Inflexible).unwrap(),
            vec!["legacy".to_string()]
        );
        assert!(store.list("bob", PortfolioKind::Flexible).unwrap().is_empty());
    }

    #[test]
    fn path_follows_user_and_kind() {
        let store = FileLedgerStore::new("/data");
        let path = store.path_for(&PortfolioKey::inflexible("ann", "legacy"));
        assert!(path.ends_with("users/ann/inflexible/legacy.json"));
    }

    #[test]
    fn corrupt_ledger_is_a_deserialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path());
        let key = PortfolioKey::flexible("ann", "broken");
        write_atomic(&store.path_for(&key), b"{ not json").unwrap();
        assert!(matches!(store.load(&key), Err(CoreError::Deserialization(_))));
    }
}

mod price_cache {
    use super::*;

    #[test]
    fn replace_overwrites_whole_series() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FilePriceCache::new(dir.path());
        let first = PriceSeries::from_points(vec![
            PricePoint::new(make_date(2022, 10, 3), 10.0),
            PricePoint::new(make_date(2022, 10, 4), 11.0),
        ]);
        cache.replace("abc", &first).unwrap();

        let second = PriceSeries::from_points(vec![PricePoint::new(make_date(2022, 10, 5), 12.5)]);
        cache.replace("ABC", &second).unwrap();

        let loaded = cache.load("ABC").unwrap().unwrap();
        assert_eq!(loaded, second);
        assert_eq!(loaded.get_price(make_date(2022, 10, 3)), None);

        let text = std::fs::read_to_string(cache.path_for("ABC")).unwrap();
        assert_eq!(text, "2022-10-05,12.5;");
        assert!(cache.path_for("abc").ends_with("stock_data/ABC.cache"));
    }

    #[test]
    fn missing_cache_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FilePriceCache::new(dir.path());
        assert!(cache.load("NONE").unwrap().is_none());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let series = format::read_price_series("2022-10-03,10.5;garbage;2022-10-04,abc;\n2022-10-05,11;");
        assert_eq!(series.len(), 2);
        assert_eq!(series.get_price(make_date(2022, 10, 5)), Some(11.0));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.cache");
        write_atomic(&path, b"2022-10-03,1;").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2022-10-03,1;");
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }
}

mod checkpoints {
    use super::*;

    #[test]
    fn line_layout() {
        let checkpoint = StrategyCheckpoint::new("ann", "growth", sample_plan(), make_date(2022, 11, 2));
        let line = format::write_checkpoint_line(&checkpoint);
        assert_eq!(
            line,
            "growth;DOLLAR COST AVERAGING;ann;30;2022-11-02;1000.0;[AAPL, MSFT];[60.0, 40.0];[2.0, 1.5]"
        );
        assert_eq!(format::read_checkpoint_line(&line).unwrap(), checkpoint);
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(matches!(
            format::read_checkpoint_line("growth;DOLLAR COST AVERAGING;ann"),
            Err(CoreError::Deserialization(_))
        ));
        assert!(format::read_checkpoint_line(
            "growth;VALUE AVERAGING;ann;30;2022-11-02;1000.0;[A];[100.0];[0.0]"
        )
        .is_err());
    }

    #[test]
    fn save_replaces_own_line_and_keeps_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let plan = sample_plan();

        store
            .save(&StrategyCheckpoint::new("ann", "growth", plan.clone(), make_date(2022, 10, 3)))
            .unwrap();
        store
            .save(&StrategyCheckpoint::new("ann", "income", plan.clone(), make_date(2022, 10, 5)))
            .unwrap();
        store
            .save(&StrategyCheckpoint::new("ann", "growth", plan, make_date(2022, 11, 2)))
            .unwrap();

        let text = std::fs::read_to_string(store.path_for("ann")).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(store
            .path_for("ann")
            .ends_with("users/ann/flexible/ongoing_strategies.csv"));

        let growth = store.load("ann", "growth").unwrap().unwrap();
        assert_eq!(growth.last_processed, make_date(2022, 11, 2));
        let income = store.load("ann", "income").unwrap().unwrap();
        assert_eq!(income.last_processed, make_date(2022, 10, 5));
        assert!(store.load("ann", "other").unwrap().is_none());
        assert!(store.load("bob", "growth").unwrap().is_none());
    }
}

mod reference_loading {
    use super::*;

    #[test]
    fn loads_symbol_lists_and_bundled_series() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("valid_symbols.csv"), "AAPL,MSFT,\nGOOG").unwrap();
        std::fs::write(dir.path().join("csv_symbols.csv"), "AAPL,MSFT").unwrap();
        std::fs::create_dir_all(dir.path().join("stock_data")).unwrap();
        std::fs::write(
            dir.path().join("stock_data").join("AAPL.csv"),
            "2022-10-28,155.74;2022-10-31,153.34;2022-11-01,150.65;",
        )
        .unwrap();

        let reference = load_reference_data(dir.path(), reference_cutoff()).unwrap();
        assert_eq!(reference.valid_symbol_count(), 3);
        assert!(reference.is_valid_symbol("goog"));
        assert!(!reference.is_valid_symbol("TSLA"));
        assert_eq!(reference.bundled_symbols(), vec!["AAPL"]);
        assert_eq!(reference.bundled_price("AAPL", make_date(2022, 10, 31)), Some(153.34));
        assert_eq!(reference.bundled_price("AAPL", make_date(2022, 11, 1)), None);
    }

    #[test]
    fn missing_directory_contents_give_open_reference() {
        let dir = tempfile::tempdir().unwrap();
        let reference = load_reference_data(dir.path(), reference_cutoff()).unwrap();
        assert_eq!(reference.valid_symbol_count(), 0);
        assert!(reference.is_valid_symbol("ANY"));
    }
}

mod memory_stores {
    use super::*;

    #[test]
    fn ledger_store_counts_saves() {
        let store = MemoryLedgerStore::new();
        let key = PortfolioKey::flexible("ann", "growth");
        store.save(&key, &Ledger::new()).unwrap();
        store.save(&key, &Ledger::new()).unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.list("ann", PortfolioKind::Flexible).unwrap(), vec!["growth"]);
    }

    #[test]
    fn checkpoint_store_overwrites() {
        let store = MemoryCheckpointStore::new();
        let checkpoint = StrategyCheckpoint::new("ann", "growth", sample_plan(), make_date(2022, 10, 3));
        store.save(&checkpoint).unwrap();
        store.save(&checkpoint.advanced_to(make_date(2022, 11, 2))).unwrap();
        let loaded = store.load("ann", "growth").unwrap().unwrap();
        assert_eq!(loaded.last_processed, make_date(2022, 11, 2));
    }
}
