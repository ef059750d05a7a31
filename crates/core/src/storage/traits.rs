use crate::errors::CoreError;
use crate::models::portfolio::{Ledger, PortfolioKey, PortfolioKind};
use crate::models::price::PriceSeries;
use crate::models::strategy::StrategyCheckpoint;

/// Load/save of whole ledgers. Each ledger has a single writer.
pub trait LedgerStore: Send + Sync {
    /// `Ok(None)` when the portfolio was never declared.
    fn load(&self, key: &PortfolioKey) -> Result<Option<Ledger>, CoreError>;

    /// Replace the stored ledger with `ledger`.
    fn save(&self, key: &PortfolioKey, ledger: &Ledger) -> Result<(), CoreError>;

    /// Portfolio names of `kind` owned by `user`, sorted.
    fn list(&self, user: &str, kind: PortfolioKind) -> Result<Vec<String>, CoreError>;
}

/// The local (tier 2) price cache: one series per symbol.
pub trait PriceCacheStore: Send + Sync {
    fn load(&self, symbol: &str) -> Result<Option<PriceSeries>, CoreError>;

    /// Atomically replace everything cached for `symbol`.
    fn replace(&self, symbol: &str, series: &PriceSeries) -> Result<(), CoreError>;
}

/// Checkpoints of open-ended strategies, one per (user, portfolio).
pub trait CheckpointStore: Send + Sync {
    fn load(&self, user: &str, portfolio: &str) -> Result<Option<StrategyCheckpoint>, CoreError>;

    /// Insert or overwrite the checkpoint for its (user, portfolio).
    fn save(&self, checkpoint: &StrategyCheckpoint) -> Result<(), CoreError>;
}
