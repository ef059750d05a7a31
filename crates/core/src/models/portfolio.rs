use serde::{Deserialize, Serialize};

use super::transaction::{TransactionKind, TransactionRecord};

/// Which transaction policy a portfolio follows. Chosen when the
/// portfolio is declared and carried in its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortfolioKind {
    /// Created once from a list of lots; never amended afterwards.
    Inflexible,
    /// Starts empty and grows through BUY/SELL entries and strategies.
    Flexible,
}

impl PortfolioKind {
    /// Directory name under `users/<user>/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            PortfolioKind::Inflexible => "inflexible",
            PortfolioKind::Flexible => "flexible",
        }
    }

    /// Whether a record of `kind` may live in a portfolio of this kind.
    pub fn accepts(self, kind: TransactionKind) -> bool {
        match self {
            PortfolioKind::Inflexible => kind == TransactionKind::Lot,
            PortfolioKind::Flexible => kind != TransactionKind::Lot,
        }
    }
}

impl std::fmt::Display for PortfolioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Identifies one ledger: (user, portfolio name) plus its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortfolioKey {
    pub user: String,
    pub name: String,
    pub kind: PortfolioKind,
}

impl PortfolioKey {
    pub fn new(user: impl Into<String>, name: impl Into<String>, kind: PortfolioKind) -> Self {
        Self {
            user: user.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn inflexible(user: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(user, name, PortfolioKind::Inflexible)
    }

    pub fn flexible(user: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(user, name, PortfolioKind::Flexible)
    }
}

impl std::fmt::Display for PortfolioKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.user, self.kind, self.name)
    }
}

/// Append-only, ordered list of transaction records for one portfolio.
/// Insertion order is kept as-is; it does not have to follow date order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    records: Vec<TransactionRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<TransactionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct symbols in first-seen order.
    pub fn symbols(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.symbol.as_str()))
            .map(|r| r.symbol.as_str())
            .collect()
    }

    /// Only the ledger service appends, after validation.
    pub(crate) fn push(&mut self, record: TransactionRecord) {
        self.records.push(record);
    }
}
