pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::NaiveDate;
use clock::{Clock, SystemClock};
use config::EngineConfig;
use log::info;
use models::{
    composition::CompositionEntry,
    performance::PerformanceSeries,
    portfolio::{Ledger, PortfolioKey, PortfolioKind},
    price::{ResolveMode, ResolvedPrice},
    reference::ReferenceData,
    strategy::{StrategyCheckpoint, StrategyRun, StrategySchedule},
    transaction::{TradeOrder, TransactionKind, TransactionRecord},
};
use providers::registry::QuoteSourceRegistry;
use services::{
    ledger_service::LedgerService,
    performance_service::PerformanceService,
    price_resolver::PriceResolver,
    strategy_service::{MissingPrice, StrategyService},
    valuation_service::ValuationService,
};
use std::sync::Arc;
use storage::{
    file_store::{self, FileCheckpointStore, FileLedgerStore, FilePriceCache},
    traits::{CheckpointStore, LedgerStore, PriceCacheStore},
};

use errors::CoreError;

/// Everything the engine is built from. Lets callers (and tests) swap in
/// in-memory stores, a fixed clock or mock quote sources.
pub struct EngineParts {
    pub reference: ReferenceData,
    pub registry: QuoteSourceRegistry,
    pub ledgers: Arc<dyn LedgerStore>,
    pub price_cache: Arc<dyn PriceCacheStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub clock: Arc<dyn Clock>,
    pub max_scan_days: i64,
}

/// Main entry point of the valuation and strategy engine.
///
/// Every query on a flexible portfolio first runs strategy catch-up, so
/// open-ended strategies are always current when the ledger is read.
#[must_use]
pub struct PortfolioEngine {
    reference: Arc<ReferenceData>,
    resolver: PriceResolver,
    ledgers: Arc<dyn LedgerStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    clock: Arc<dyn Clock>,
    ledger_service: LedgerService,
    valuation_service: ValuationService,
    performance_service: PerformanceService,
    strategy_service: StrategyService,
}

impl std::fmt::Debug for PortfolioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioEngine")
            .field("today", &self.clock.today())
            .field("reference_cutoff", &self.reference.cutoff())
            .field("valid_symbols", &self.reference.valid_symbol_count())
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl PortfolioEngine {
    /// File-backed engine rooted at `config.data_dir`, using the system clock
    /// and the default quote sources.
    pub fn open(config: &EngineConfig) -> Result<Self, CoreError> {
        let reference = match &config.reference_dir {
            Some(dir) => file_store::load_reference_data(dir, config.reference_cutoff)?,
            None => ReferenceData::new(config.reference_cutoff),
        };
        info!(
            "Opening engine at {} ({} valid symbols)",
            config.data_dir.display(),
            reference.valid_symbol_count()
        );

        Ok(Self::from_parts(EngineParts {
            reference,
            registry: QuoteSourceRegistry::new_with_defaults(config),
            ledgers: Arc::new(FileLedgerStore::new(&config.data_dir)),
            price_cache: Arc::new(FilePriceCache::new(&config.data_dir)),
            checkpoints: Arc::new(FileCheckpointStore::new(&config.data_dir)),
            clock: Arc::new(SystemClock),
            max_scan_days: config.max_scan_days,
        }))
    }

    pub fn from_parts(parts: EngineParts) -> Self {
        Self::build(parts)
    }

    #[must_use]
    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // ── Portfolios ──────────────────────────────────────────────────

    /// Declare a portfolio.
    ///
    /// An inflexible portfolio is created from `lots` (LOT orders, each
    /// priced at its trade date) and can never be amended afterwards.
    /// A flexible portfolio starts empty; `lots` must be empty.
    pub async fn create_portfolio(
        &mut self,
        user: &str,
        name: &str,
        kind: PortfolioKind,
        lots: Vec<TradeOrder>,
    ) -> Result<Ledger, CoreError> {
        let key = PortfolioKey::new(user, name, kind);
        if self.ledgers.load(&key)?.is_some() {
            return Err(CoreError::PortfolioExists(key.to_string()));
        }
        if kind == PortfolioKind::Flexible && !lots.is_empty() {
            return Err(CoreError::InvalidTransaction(
                "A flexible portfolio starts empty; add BUY/SELL records instead".into(),
            ));
        }

        let mut ledger = Ledger::new();
        for order in lots {
            let record = self.price_order(order).await?;
            self.ledger_service.append(kind, &mut ledger, record)?;
        }
        self.ledgers.save(&key, &ledger)?;
        info!("Created portfolio {key} with {} records", ledger.len());
        Ok(ledger)
    }

    pub fn portfolio_exists(&self, key: &PortfolioKey) -> Result<bool, CoreError> {
        Ok(self.ledgers.load(key)?.is_some())
    }

    pub fn list_portfolios(&self, user: &str, kind: PortfolioKind) -> Result<Vec<String>, CoreError> {
        self.ledgers.list(user, kind)
    }

    /// The full ledger, after catch-up for flexible portfolios.
    pub async fn ledger(&mut self, key: &PortfolioKey) -> Result<Ledger, CoreError> {
        self.load_current(key).await
    }

    // ── Prices ──────────────────────────────────────────────────────

    pub async fn resolve_price(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        mode: ResolveMode,
    ) -> Result<ResolvedPrice, CoreError> {
        self.resolver.resolve(symbol, date, mode).await
    }

    /// Most recent close on or before today.
    pub async fn last_traded_price(&mut self, symbol: &str) -> Result<ResolvedPrice, CoreError> {
        self.resolver.last_traded_price(symbol).await
    }

    // ── Transactions ────────────────────────────────────────────────

    /// Append a manual BUY or SELL to a flexible portfolio.
    ///
    /// The order is validated (symbol, date, quantity, commission), priced
    /// once at its trade date, checked against holdings and persisted.
    pub async fn append_transaction(
        &mut self,
        user: &str,
        portfolio: &str,
        order: TradeOrder,
    ) -> Result<TransactionRecord, CoreError> {
        let key = PortfolioKey::flexible(user, portfolio);
        let mut ledger = self.load_current(&key).await?;
        if order.kind == TransactionKind::Lot {
            return Err(CoreError::InvalidTransaction(
                "LOT records belong to inflexible portfolios".into(),
            ));
        }

        let record = self.price_order(order).await?;
        self.ledger_service
            .append(PortfolioKind::Flexible, &mut ledger, record.clone())?;
        self.ledgers.save(&key, &ledger)?;
        info!(
            "{key}: {} {} {} on {}",
            record.kind, record.quantity, record.symbol, record.date
        );
        Ok(record)
    }

    // ── Holdings & Value ────────────────────────────────────────────

    pub async fn composition(
        &mut self,
        key: &PortfolioKey,
        as_of: NaiveDate,
    ) -> Result<Vec<CompositionEntry>, CoreError> {
        let ledger = self.load_current(key).await?;
        Ok(self.ledger_service.composition(&ledger, as_of))
    }

    /// Symbols a flexible portfolio could sell on `as_of`.
    pub async fn sellable_symbols(
        &mut self,
        user: &str,
        portfolio: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<String>, CoreError> {
        let ledger = self.load_current(&PortfolioKey::flexible(user, portfolio)).await?;
        Ok(self.ledger_service.sellable_symbols(&ledger, as_of))
    }

    pub async fn total_value(&mut self, key: &PortfolioKey, as_of: NaiveDate) -> Result<f64, CoreError> {
        let ledger = self.load_current(key).await?;
        self.valuation_service
            .total_value(&mut self.resolver, &ledger, as_of)
            .await
    }

    pub async fn cost_basis(&mut self, key: &PortfolioKey, as_of: NaiveDate) -> Result<f64, CoreError> {
        let ledger = self.load_current(key).await?;
        Ok(self.valuation_service.cost_basis(&ledger, as_of))
    }

    pub async fn performance_series(
        &mut self,
        key: &PortfolioKey,
        start: NaiveDate,
        finish: NaiveDate,
    ) -> Result<PerformanceSeries, CoreError> {
        let ledger = self.load_current(key).await?;
        self.performance_service
            .performance_series(&mut self.resolver, &ledger, start, finish)
            .await
    }

    // ── Strategies ──────────────────────────────────────────────────

    /// Run a dollar-cost-averaging schedule on a flexible portfolio,
    /// creating the portfolio if needed.
    ///
    /// A closed schedule runs once and leaves no trace besides its records.
    /// An open-ended one runs up to today and stores a checkpoint; later
    /// accesses catch it up. Only one open-ended strategy per portfolio.
    pub async fn run_strategy(
        &mut self,
        user: &str,
        portfolio: &str,
        schedule: StrategySchedule,
    ) -> Result<StrategyRun, CoreError> {
        let today = self.clock.today();
        self.strategy_service.validate_schedule(&schedule, today)?;

        let key = PortfolioKey::flexible(user, portfolio);
        if schedule.is_open_ended() && self.checkpoints.load(user, portfolio)?.is_some() {
            return Err(CoreError::InvalidStrategy(format!(
                "{key} already has an ongoing strategy"
            )));
        }

        // Pending cycles of an ongoing strategy land before this run's records
        self.catch_up_strategy(user, portfolio).await?;
        let mut ledger = match self.ledgers.load(&key)? {
            Some(ledger) => ledger,
            None => {
                info!("Creating portfolio {key} for strategy");
                self.ledgers.save(&key, &Ledger::new())?;
                Ledger::new()
            }
        };

        let (end, missing_price) = match schedule.end {
            Some(end) => (end, MissingPrice::Fail),
            None => (today, MissingPrice::Defer),
        };
        let run = self
            .strategy_service
            .execute(
                &mut self.resolver,
                &mut ledger,
                &schedule.plan,
                schedule.start,
                end,
                missing_price,
                None,
            )
            .await?;

        if !run.appended.is_empty() {
            self.ledgers.save(&key, &ledger)?;
        }
        if schedule.is_open_ended() {
            let checkpoint = StrategyCheckpoint::new(user, portfolio, schedule.plan, run.next_date);
            self.checkpoints.save(&checkpoint)?;
            info!("{key}: open-ended strategy resumes on {}", run.next_date);
        }
        Ok(run)
    }

    /// Execute every cycle of an open-ended strategy between its checkpoint
    /// and today. `Ok(None)` when the portfolio has no ongoing strategy.
    ///
    /// The ledger is saved before the checkpoint. If the checkpoint write is
    /// lost, the next catch-up revisits the same cycles and skips the BUYs
    /// already recorded on or after the checkpoint date.
    pub async fn catch_up_strategy(
        &mut self,
        user: &str,
        portfolio: &str,
    ) -> Result<Option<StrategyRun>, CoreError> {
        let Some(checkpoint) = self.checkpoints.load(user, portfolio)? else {
            return Ok(None);
        };
        let key = PortfolioKey::flexible(user, portfolio);
        let today = self.clock.today();
        let mut ledger = self.ledgers.load(&key)?.unwrap_or_default();

        let run = self
            .strategy_service
            .execute(
                &mut self.resolver,
                &mut ledger,
                &checkpoint.plan,
                checkpoint.last_processed,
                today,
                MissingPrice::Defer,
                Some(checkpoint.last_processed),
            )
            .await?;

        if !run.appended.is_empty() {
            self.ledgers.save(&key, &ledger)?;
        }
        if run.next_date != checkpoint.last_processed {
            self.checkpoints.save(&checkpoint.advanced_to(run.next_date))?;
            info!(
                "{key}: caught up {} cycles, next {}",
                run.cycles, run.next_date
            );
        }
        Ok(Some(run))
    }

    // ── Internal ────────────────────────────────────────────────────

    fn build(parts: EngineParts) -> Self {
        let reference = Arc::new(parts.reference);
        let resolver = PriceResolver::new(
            Arc::clone(&reference),
            parts.registry,
            parts.price_cache,
            Arc::clone(&parts.clock),
            parts.max_scan_days,
        );

        Self {
            reference,
            resolver,
            ledgers: parts.ledgers,
            checkpoints: parts.checkpoints,
            clock: parts.clock,
            ledger_service: LedgerService::new(),
            valuation_service: ValuationService::new(),
            performance_service: PerformanceService::new(parts.max_scan_days),
            strategy_service: StrategyService::new(),
        }
    }

    /// Load a ledger, catching up any open-ended strategy first.
    async fn load_current(&mut self, key: &PortfolioKey) -> Result<Ledger, CoreError> {
        if key.kind == PortfolioKind::Flexible {
            self.catch_up_strategy(&key.user, &key.name).await?;
        }
        self.ledgers
            .load(key)?
            .ok_or_else(|| CoreError::PortfolioNotFound(key.to_string()))
    }

    /// Validate a manual order and freeze its execution price.
    async fn price_order(&mut self, order: TradeOrder) -> Result<TransactionRecord, CoreError> {
        let today = self.clock.today();
        self.ledger_service
            .validate_order(&self.reference, today, &order)?;
        let resolved = self
            .resolver
            .resolve(&order.symbol, order.date, ResolveMode::NearestForward)
            .await?;
        Ok(order.into_record(resolved.price))
    }
}
