use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::traits::{CheckpointStore, LedgerStore, PriceCacheStore};
use crate::errors::CoreError;
use crate::models::portfolio::{Ledger, PortfolioKey, PortfolioKind};
use crate::models::price::PriceSeries;
use crate::models::strategy::StrategyCheckpoint;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, CoreError> {
    mutex
        .lock()
        .map_err(|_| CoreError::Persistence("in-memory store lock poisoned".into()))
}

/// In-memory ledger store. Counts saves so tests can assert write behaviour.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledgers: Mutex<HashMap<PortfolioKey, Ledger>>,
    saves: Mutex<usize>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self, key: &PortfolioKey) -> Result<Option<Ledger>, CoreError> {
        Ok(lock(&self.ledgers)?.get(key).cloned())
    }

    fn save(&self, key: &PortfolioKey, ledger: &Ledger) -> Result<(), CoreError> {
        lock(&self.ledgers)?.insert(key.clone(), ledger.clone());
        *lock(&self.saves)? += 1;
        Ok(())
    }

    fn list(&self, user: &str, kind: PortfolioKind) -> Result<Vec<String>, CoreError> {
        let mut names: Vec<String> = lock(&self.ledgers)?
            .keys()
            .filter(|k| k.user == user && k.kind == kind)
            .map(|k| k.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// In-memory tier-2 price cache.
#[derive(Debug, Default)]
pub struct MemoryPriceCache {
    series: Mutex<HashMap<String, PriceSeries>>,
}

impl MemoryPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache (bypasses the remote tier entirely).
    pub fn with_series(self, symbol: &str, series: PriceSeries) -> Self {
        if let Ok(mut map) = self.series.lock() {
            map.insert(symbol.to_uppercase(), series);
        }
        self
    }

    pub fn get(&self, symbol: &str) -> Option<PriceSeries> {
        self.series
            .lock()
            .ok()
            .and_then(|map| map.get(&symbol.to_uppercase()).cloned())
    }
}

impl PriceCacheStore for MemoryPriceCache {
    fn load(&self, symbol: &str) -> Result<Option<PriceSeries>, CoreError> {
        Ok(lock(&self.series)?.get(&symbol.to_uppercase()).cloned())
    }

    fn replace(&self, symbol: &str, series: &PriceSeries) -> Result<(), CoreError> {
        lock(&self.series)?.insert(symbol.to_uppercase(), series.clone());
        Ok(())
    }
}

/// In-memory checkpoint store.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<(String, String), StrategyCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, user: &str, portfolio: &str) -> Result<Option<StrategyCheckpoint>, CoreError> {
        let key = (user.to_string(), portfolio.to_string());
        Ok(lock(&self.checkpoints)?.get(&key).cloned())
    }

    fn save(&self, checkpoint: &StrategyCheckpoint) -> Result<(), CoreError> {
        let key = (checkpoint.user.clone(), checkpoint.portfolio.clone());
        lock(&self.checkpoints)?.insert(key, checkpoint.clone());
        Ok(())
    }
}
