use chrono::NaiveDate;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::format::{self, CACHE_EXTENSION};
use super::traits::{CheckpointStore, LedgerStore, PriceCacheStore};
use crate::errors::CoreError;
use crate::models::portfolio::{Ledger, PortfolioKey, PortfolioKind};
use crate::models::price::PriceSeries;
use crate::models::reference::ReferenceData;
use crate::models::strategy::StrategyCheckpoint;

const USERS_DIR: &str = "users";
const STOCK_DATA_DIR: &str = "stock_data";
const CHECKPOINT_FILE: &str = "ongoing_strategies.csv";
const LEDGER_EXTENSION: &str = "json";

/// Write `bytes` to `path` through a sibling temp file and a rename, so a
/// reader never sees a half-written file. Parent directories are created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>, CoreError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Ledgers ─────────────────────────────────────────────────────────

/// Ledgers as JSON arrays under `<root>/users/<user>/<kind>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    root: PathBuf,
}

impl FileLedgerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn kind_dir(&self, user: &str, kind: PortfolioKind) -> PathBuf {
        self.root.join(USERS_DIR).join(user).join(kind.dir_name())
    }

    pub fn path_for(&self, key: &PortfolioKey) -> PathBuf {
        self.kind_dir(&key.user, key.kind)
            .join(format!("{}.{LEDGER_EXTENSION}", key.name))
    }
}

impl LedgerStore for FileLedgerStore {
    fn load(&self, key: &PortfolioKey) -> Result<Option<Ledger>, CoreError> {
        let Some(text) = read_optional(&self.path_for(key))? else {
            return Ok(None);
        };
        let ledger: Ledger = serde_json::from_str(&text).map_err(|e| {
            CoreError::Deserialization(format!("Failed to read ledger {key}: {e}"))
        })?;
        Ok(Some(ledger))
    }

    fn save(&self, key: &PortfolioKey, ledger: &Ledger) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(ledger)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize ledger {key}: {e}")))?;
        write_atomic(&self.path_for(key), json.as_bytes())
    }

    fn list(&self, user: &str, kind: PortfolioKind) -> Result<Vec<String>, CoreError> {
        let dir = self.kind_dir(user, kind);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LEDGER_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// ── Price cache ─────────────────────────────────────────────────────

/// Tier-2 cache: `<root>/stock_data/<SYMBOL>.cache`, one file per symbol.
#[derive(Debug, Clone)]
pub struct FilePriceCache {
    dir: PathBuf,
}

impl FilePriceCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            dir: root.into().join(STOCK_DATA_DIR),
        }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{CACHE_EXTENSION}", symbol.to_uppercase()))
    }
}

impl PriceCacheStore for FilePriceCache {
    fn load(&self, symbol: &str) -> Result<Option<PriceSeries>, CoreError> {
        Ok(read_optional(&self.path_for(symbol))?.map(|text| format::read_price_series(&text)))
    }

    fn replace(&self, symbol: &str, series: &PriceSeries) -> Result<(), CoreError> {
        let path = self.path_for(symbol);
        debug!("Rewriting price cache {} ({} points)", path.display(), series.len());
        write_atomic(&path, format::write_price_series(series).as_bytes())
    }
}

// ── Strategy checkpoints ────────────────────────────────────────────

/// One line per open-ended strategy in
/// `<root>/users/<user>/flexible/ongoing_strategies.csv`.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, user: &str) -> PathBuf {
        self.root
            .join(USERS_DIR)
            .join(user)
            .join(PortfolioKind::Flexible.dir_name())
            .join(CHECKPOINT_FILE)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, user: &str, portfolio: &str) -> Result<Option<StrategyCheckpoint>, CoreError> {
        let Some(text) = read_optional(&self.path_for(user))? else {
            return Ok(None);
        };
        text.lines()
            .find(|line| format::checkpoint_matches(line, user, portfolio))
            .map(format::read_checkpoint_line)
            .transpose()
    }

    fn save(&self, checkpoint: &StrategyCheckpoint) -> Result<(), CoreError> {
        let path = self.path_for(&checkpoint.user);
        let existing = read_optional(&path)?.unwrap_or_default();
        let line = format::write_checkpoint_line(checkpoint);

        // Lines of other portfolios are carried over verbatim.
        let mut replaced = false;
        let mut out = String::with_capacity(existing.len() + line.len() + 1);
        for current in existing.lines().filter(|l| !l.trim().is_empty()) {
            if format::checkpoint_matches(current, &checkpoint.user, &checkpoint.portfolio) {
                out.push_str(&line);
                replaced = true;
            } else {
                out.push_str(current);
            }
            out.push('\n');
        }
        if !replaced {
            out.push_str(&line);
            out.push('\n');
        }
        write_atomic(&path, out.as_bytes())
    }
}

// ── Reference data ──────────────────────────────────────────────────

/// Load bundled reference data from `dir`:
/// `valid_symbols.csv`, `csv_symbols.csv` and `stock_data/<SYMBOL>.csv`.
/// Missing list files leave the corresponding set empty.
pub fn load_reference_data(dir: &Path, cutoff: NaiveDate) -> Result<ReferenceData, CoreError> {
    let valid = match read_optional(&dir.join("valid_symbols.csv"))? {
        Some(text) => format::read_symbol_list(&text),
        None => {
            warn!("No valid_symbols.csv in {}; symbol checks disabled", dir.display());
            Vec::new()
        }
    };
    let mut reference = ReferenceData::new(cutoff).with_valid_symbols(valid);

    let bundled = read_optional(&dir.join("csv_symbols.csv"))?
        .map(|text| format::read_symbol_list(&text))
        .unwrap_or_default();
    for symbol in bundled {
        let path = dir.join(STOCK_DATA_DIR).join(format!("{symbol}.csv"));
        match read_optional(&path)? {
            Some(text) => {
                reference = reference.with_bundled_series(&symbol, format::read_price_series(&text));
            }
            None => warn!("Bundled series for {symbol} missing at {}", path.display()),
        }
    }
    Ok(reference)
}
