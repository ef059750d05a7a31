use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Intent of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// One-time, non-amendable purchase in an inflexible portfolio.
    #[serde(rename = "LOT", alias = "PORTFOLIO")]
    Lot,
    /// Purchase in a flexible portfolio (manual or strategy-generated).
    #[serde(rename = "BUY")]
    Buy,
    /// Sale in a flexible portfolio.
    #[serde(rename = "SELL")]
    Sell,
}

impl TransactionKind {
    /// +1 for acquisitions, -1 for sales.
    pub fn sign(self) -> f64 {
        match self {
            TransactionKind::Sell => -1.0,
            TransactionKind::Lot | TransactionKind::Buy => 1.0,
        }
    }

    pub fn is_acquisition(self) -> bool {
        !matches!(self, TransactionKind::Sell)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Lot => write!(f, "LOT"),
            TransactionKind::Buy => write!(f, "BUY"),
            TransactionKind::Sell => write!(f, "SELL"),
        }
    }
}

fn uppercase_symbol<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let symbol = String::deserialize(deserializer)?;
    Ok(symbol.trim().to_uppercase())
}

/// A single, immutable ledger entry.
///
/// The execution price is resolved once when the record is created and
/// frozen here; the ledger store serializes records as flat objects
/// (`operation`, `stock_name`, `transaction_date`, `quantity`, `price`,
/// optional `commission`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "operation")]
    pub kind: TransactionKind,

    /// Ticker symbol, uppercased (also when read from a stored ledger).
    #[serde(rename = "stock_name", deserialize_with = "uppercase_symbol")]
    pub symbol: String,

    /// Trade date (daily granularity).
    #[serde(rename = "transaction_date")]
    pub date: NaiveDate,

    /// Units traded (always positive, cent precision).
    pub quantity: f64,

    /// Unit price at execution.
    pub price: f64,

    /// Present for BUY/SELL, absent for LOT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission: Option<f64>,
}

impl TransactionRecord {
    pub fn lot(symbol: impl Into<String>, date: NaiveDate, quantity: f64, price: f64) -> Self {
        Self {
            kind: TransactionKind::Lot,
            symbol: symbol.into().to_uppercase(),
            date,
            quantity,
            price,
            commission: None,
        }
    }

    pub fn buy(
        symbol: impl Into<String>,
        date: NaiveDate,
        quantity: f64,
        price: f64,
        commission: f64,
    ) -> Self {
        Self {
            kind: TransactionKind::Buy,
            symbol: symbol.into().to_uppercase(),
            date,
            quantity,
            price,
            commission: Some(commission),
        }
    }

    pub fn sell(
        symbol: impl Into<String>,
        date: NaiveDate,
        quantity: f64,
        price: f64,
        commission: f64,
    ) -> Self {
        Self {
            kind: TransactionKind::Sell,
            symbol: symbol.into().to_uppercase(),
            date,
            quantity,
            price,
            commission: Some(commission),
        }
    }

    pub fn commission_or_zero(&self) -> f64 {
        self.commission.unwrap_or(0.0)
    }
}

/// A trade as entered by a user, before its execution price is known.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    pub kind: TransactionKind,
    pub symbol: String,
    pub date: NaiveDate,
    pub quantity: f64,
    pub commission: Option<f64>,
}

impl TradeOrder {
    pub fn lot(symbol: impl Into<String>, date: NaiveDate, quantity: f64) -> Self {
        Self {
            kind: TransactionKind::Lot,
            symbol: symbol.into().to_uppercase(),
            date,
            quantity,
            commission: None,
        }
    }

    pub fn buy(symbol: impl Into<String>, date: NaiveDate, quantity: f64, commission: f64) -> Self {
        Self {
            kind: TransactionKind::Buy,
            symbol: symbol.into().to_uppercase(),
            date,
            quantity,
            commission: Some(commission),
        }
    }

    pub fn sell(symbol: impl Into<String>, date: NaiveDate, quantity: f64, commission: f64) -> Self {
        Self {
            kind: TransactionKind::Sell,
            symbol: symbol.into().to_uppercase(),
            date,
            quantity,
            commission: Some(commission),
        }
    }

    /// Freeze the order at its execution price.
    pub fn into_record(self, price: f64) -> TransactionRecord {
        TransactionRecord {
            kind: self.kind,
            symbol: self.symbol,
            date: self.date,
            quantity: self.quantity,
            price,
            commission: self.commission,
        }
    }
}
