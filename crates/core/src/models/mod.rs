pub mod composition;
pub mod performance;
pub mod portfolio;
pub mod price;
pub mod reference;
pub mod strategy;
pub mod transaction;

/// Round to 2 decimal places (half away from zero), as every quantity
/// and average price in the ledger is kept at cent precision.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round2(10.004), 10.0);
        assert_eq!(round2(10.006), 10.01);
        assert_eq!(round2(-3.337), -3.34);
        assert_eq!(round2(5.274_99), 5.27);
        assert_eq!(round2(0.0), 0.0);
    }
}
