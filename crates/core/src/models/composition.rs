use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// As-of-date holding of one symbol, derived from the ledger on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionEntry {
    pub symbol: String,

    /// Units held (cent precision, always > 0).
    pub quantity: f64,

    /// Weighted-average acquisition price; sales leave it unchanged.
    pub average_price: f64,

    /// Earliest transaction date for this symbol up to the as-of date.
    pub first_date: NaiveDate,

    /// Latest transaction date for this symbol up to the as-of date.
    pub last_date: NaiveDate,

    /// Commission of the first record seen for this symbol (not a sum).
    pub anchor_commission: Option<f64>,

    /// Sum of commissions over every record of this symbol up to the as-of date.
    pub total_commission: f64,
}
