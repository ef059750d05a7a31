use chrono::NaiveDate;
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::portfolio::Ledger;
use crate::models::price::ResolveMode;
use crate::models::round2;
use crate::services::price_resolver::PriceResolver;

/// Market value and cost basis of a ledger as of a date.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Sum of `± price(symbol, as_of) × quantity` over every record dated
    /// on or before `as_of` (SELL counts negative).
    ///
    /// Every record is re-priced at `as_of` (nearest trading day forward),
    /// not at its execution price. Fails closed: if one symbol cannot be
    /// priced the whole valuation fails; a partial sum is never returned.
    pub async fn total_value(
        &self,
        resolver: &mut PriceResolver,
        ledger: &Ledger,
        as_of: NaiveDate,
    ) -> Result<f64, CoreError> {
        let mut prices: HashMap<&str, f64> = HashMap::new();
        let mut total = 0.0;

        for record in ledger.iter().filter(|r| r.date <= as_of) {
            let price = match prices.get(record.symbol.as_str()) {
                Some(price) => *price,
                None => {
                    let resolved = resolver
                        .resolve(&record.symbol, as_of, ResolveMode::NearestForward)
                        .await?;
                    prices.insert(record.symbol.as_str(), resolved.price);
                    resolved.price
                }
            };
            total += record.kind.sign() * price * record.quantity;
        }

        Ok(round2(total))
    }

    /// Money committed through `as_of`: `commission + price × quantity` for
    /// LOT/BUY and the commission alone for SELL. Sale proceeds are never
    /// netted out.
    pub fn cost_basis(&self, ledger: &Ledger, as_of: NaiveDate) -> f64 {
        let total: f64 = ledger
            .iter()
            .filter(|r| r.date <= as_of)
            .map(|r| {
                if r.kind.is_acquisition() {
                    r.commission_or_zero() + r.price * r.quantity
                } else {
                    r.commission_or_zero()
                }
            })
            .sum();
        round2(total)
    }
}
