use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::composition::CompositionEntry;
use crate::models::portfolio::{Ledger, PortfolioKind};
use crate::models::reference::ReferenceData;
use crate::models::round2;
use crate::models::transaction::{TradeOrder, TransactionKind, TransactionRecord};

/// Slack when comparing rounded quantities.
const QUANTITY_EPSILON: f64 = 1e-9;

/// Running state of one symbol while folding over a ledger.
#[derive(Debug, Clone)]
struct Running {
    quantity: f64,
    average_price: f64,
    first_date: NaiveDate,
    last_date: NaiveDate,
    anchor_commission: Option<f64>,
    total_commission: f64,
}

impl Running {
    fn start(record: &TransactionRecord) -> Self {
        Self {
            quantity: 0.0,
            average_price: 0.0,
            first_date: record.date,
            last_date: record.date,
            anchor_commission: record.commission,
            total_commission: 0.0,
        }
    }

    fn apply(&mut self, record: &TransactionRecord) {
        if record.kind.is_acquisition() {
            let quantity = self.quantity + record.quantity;
            if quantity > 0.0 {
                self.average_price = round2(
                    (self.average_price * self.quantity + record.price * record.quantity) / quantity,
                );
            }
            self.quantity = round2(quantity);
        } else {
            self.quantity = round2(self.quantity - record.quantity);
        }
        self.first_date = self.first_date.min(record.date);
        self.last_date = self.last_date.max(record.date);
        self.total_commission += record.commission_or_zero();
    }

    fn into_entry(self, symbol: &str) -> CompositionEntry {
        CompositionEntry {
            symbol: symbol.to_string(),
            quantity: self.quantity,
            average_price: self.average_price,
            first_date: self.first_date,
            last_date: self.last_date,
            anchor_commission: self.anchor_commission,
            total_commission: round2(self.total_commission),
        }
    }
}

/// Validates ledger appends and derives as-of-date holdings.
///
/// Pure business logic: no I/O, no prices. Easy to test.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        Self
    }

    // ── Composition ─────────────────────────────────────────────────

    /// Per-symbol holdings as of `as_of`, in first-seen ledger order.
    ///
    /// Records dated after `as_of` are ignored; the rest are folded in
    /// ledger order. Quantity and average price are rounded to cents after
    /// every step. Symbols whose quantity is no longer positive are omitted.
    pub fn composition(&self, ledger: &Ledger, as_of: NaiveDate) -> Vec<CompositionEntry> {
        let mut order: Vec<&str> = Vec::new();
        let mut running: HashMap<&str, Running> = HashMap::new();

        for record in ledger.iter().filter(|r| r.date <= as_of) {
            let state = running.entry(record.symbol.as_str()).or_insert_with(|| {
                order.push(record.symbol.as_str());
                Running::start(record)
            });
            state.apply(record);
        }

        order
            .into_iter()
            .filter_map(|symbol| {
                let state = running.remove(symbol)?;
                (state.quantity > QUANTITY_EPSILON).then(|| state.into_entry(symbol))
            })
            .collect()
    }

    /// Net quantity of `symbol` held through `date` (inclusive).
    /// May be zero or, for an inconsistent ledger, negative.
    pub fn holding_through(&self, ledger: &Ledger, symbol: &str, date: NaiveDate) -> f64 {
        let symbol = symbol.to_uppercase();
        let mut state: Option<Running> = None;
        for record in ledger
            .iter()
            .filter(|r| r.date <= date && r.symbol == symbol)
        {
            state
                .get_or_insert_with(|| Running::start(record))
                .apply(record);
        }
        state.map(|s| s.quantity).unwrap_or(0.0)
    }

    /// Symbols with a positive holding as of `as_of`.
    pub fn sellable_symbols(&self, ledger: &Ledger, as_of: NaiveDate) -> Vec<String> {
        self.composition(ledger, as_of)
            .into_iter()
            .map(|e| e.symbol)
            .collect()
    }

    // ── Validation & append ─────────────────────────────────────────

    /// Checks on a manually entered trade, before its price is resolved.
    ///
    /// Rules:
    /// - Symbol must be in the reference list (if one is loaded)
    /// - Date must not be in the future, nor on a weekend
    /// - Quantity must be positive, commission non-negative
    pub fn validate_order(
        &self,
        reference: &ReferenceData,
        today: NaiveDate,
        order: &TradeOrder,
    ) -> Result<(), CoreError> {
        if !reference.is_valid_symbol(&order.symbol) {
            return Err(CoreError::InvalidTransaction(format!(
                "Unknown symbol {}",
                order.symbol
            )));
        }
        if order.date > today {
            return Err(CoreError::InvalidTransaction(format!(
                "Trade date {} is in the future",
                order.date
            )));
        }
        if matches!(order.date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(CoreError::InvalidTransaction(format!(
                "Trade date {} falls on a weekend",
                order.date
            )));
        }
        Self::check_quantity(order.quantity)?;
        if let Some(commission) = order.commission {
            Self::check_commission(commission)?;
        }
        Ok(())
    }

    /// Validate `record` against `ledger` and append it.
    ///
    /// A SELL must be covered by the holding through its date, and must not
    /// leave any later SELL of the same symbol uncovered. Nothing is
    /// appended when a check fails.
    pub fn append(
        &self,
        kind: PortfolioKind,
        ledger: &mut Ledger,
        record: TransactionRecord,
    ) -> Result<(), CoreError> {
        self.validate_record(kind, ledger, &record)?;
        ledger.push(record);
        Ok(())
    }

    pub fn validate_record(
        &self,
        kind: PortfolioKind,
        ledger: &Ledger,
        record: &TransactionRecord,
    ) -> Result<(), CoreError> {
        if !kind.accepts(record.kind) {
            return Err(CoreError::InvalidTransaction(format!(
                "{} records are not allowed in a {kind} portfolio",
                record.kind
            )));
        }
        Self::check_quantity(record.quantity)?;
        if !record.price.is_finite() || record.price < 0.0 {
            return Err(CoreError::InvalidTransaction(format!(
                "Price {} must be a non-negative number",
                record.price
            )));
        }
        if let Some(commission) = record.commission {
            Self::check_commission(commission)?;
        }

        if record.kind == TransactionKind::Sell {
            let held = self.holding_through(ledger, &record.symbol, record.date);
            if held + QUANTITY_EPSILON < record.quantity {
                return Err(CoreError::InvalidTransaction(format!(
                    "Cannot sell {} {}: only {} held on {}",
                    record.quantity, record.symbol, held, record.date
                )));
            }
            self.validate_later_sells(ledger, record)?;
        }
        Ok(())
    }

    /// With `record` in place, every SELL of its symbol dated after it must
    /// still be covered.
    fn validate_later_sells(
        &self,
        ledger: &Ledger,
        record: &TransactionRecord,
    ) -> Result<(), CoreError> {
        let mut later: Vec<NaiveDate> = ledger
            .iter()
            .filter(|r| {
                r.kind == TransactionKind::Sell && r.symbol == record.symbol && r.date > record.date
            })
            .map(|r| r.date)
            .collect();
        if later.is_empty() {
            return Ok(());
        }
        later.sort();
        later.dedup();

        let mut tentative = ledger.clone();
        tentative.push(record.clone());
        for date in later {
            let held = self.holding_through(&tentative, &record.symbol, date);
            if held < -QUANTITY_EPSILON {
                return Err(CoreError::InvalidTransaction(format!(
                    "Selling {} {} on {} would leave the sale on {} uncovered",
                    record.quantity, record.symbol, record.date, date
                )));
            }
        }
        Ok(())
    }

    fn check_quantity(quantity: f64) -> Result<(), CoreError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(CoreError::InvalidTransaction(format!(
                "Quantity {quantity} must be positive"
            )));
        }
        Ok(())
    }

    fn check_commission(commission: f64) -> Result<(), CoreError> {
        if !commission.is_finite() || commission < 0.0 {
            return Err(CoreError::InvalidTransaction(format!(
                "Commission {commission} must not be negative"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weighted_average_rounds_each_step() {
        let ledger = Ledger::from_records(vec![
            TransactionRecord::buy("ABC", d(2022, 1, 3), 3.0, 10.0, 1.0),
            TransactionRecord::buy("ABC", d(2022, 1, 4), 1.0, 11.0, 2.0),
        ]);
        let comp = LedgerService::new().composition(&ledger, d(2022, 1, 31));
        assert_eq!(comp.len(), 1);
        assert!((comp[0].quantity - 4.0).abs() < 1e-9);
        assert!((comp[0].average_price - 10.25).abs() < 1e-9);
        assert_eq!(comp[0].anchor_commission, Some(1.0));
        assert!((comp[0].total_commission - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_fully_sold_symbol_is_omitted() {
        let ledger = Ledger::from_records(vec![
            TransactionRecord::buy("ABC", d(2022, 1, 3), 5.0, 10.0, 0.0),
            TransactionRecord::sell("ABC", d(2022, 1, 5), 5.0, 12.0, 0.0),
        ]);
        let service = LedgerService::new();
        assert!(service.composition(&ledger, d(2022, 1, 6)).is_empty());
        assert_eq!(service.composition(&ledger, d(2022, 1, 4)).len(), 1);
    }

    #[test]
    fn test_backdated_sell_cannot_uncover_later_sell() {
        let mut ledger = Ledger::from_records(vec![
            TransactionRecord::buy("ABC", d(2022, 1, 3), 10.0, 10.0, 0.0),
            TransactionRecord::sell("ABC", d(2022, 1, 10), 8.0, 10.0, 0.0),
        ]);
        let service = LedgerService::new();
        let err = service
            .append(
                PortfolioKind::Flexible,
                &mut ledger,
                TransactionRecord::sell("ABC", d(2022, 1, 5), 5.0, 10.0, 0.0),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransaction(_)));
        assert_eq!(ledger.len(), 2);
    }
}
