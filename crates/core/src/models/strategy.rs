use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::transaction::TransactionRecord;
use crate::errors::CoreError;

/// Name under which recurring weighted investment is persisted.
pub const DOLLAR_COST_AVERAGING: &str = "DOLLAR COST AVERAGING";

/// Tolerance when comparing weight sums against 100.
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// One symbol's share of each investment cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAllocation {
    pub symbol: String,
    /// Percentage of the cycle amount (0–100).
    pub weight: f64,
    /// Commission charged on every BUY of this symbol.
    pub commission: f64,
}

impl StrategyAllocation {
    pub fn new(symbol: impl Into<String>, weight: f64, commission: f64) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            weight,
            commission,
        }
    }
}

/// Collects allocations one at a time, rejecting a weight as soon as the
/// running total would pass 100.
#[derive(Debug, Clone, Default)]
pub struct AllocationBuilder {
    allocations: Vec<StrategyAllocation>,
}

impl AllocationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of the weights accepted so far.
    pub fn committed_weight(&self) -> f64 {
        self.allocations.iter().map(|a| a.weight).sum()
    }

    /// Would `weight` fit on top of what is already committed?
    pub fn check_weight(&self, weight: f64) -> Result<(), CoreError> {
        if !weight.is_finite() || !(0.0..=100.0).contains(&weight) {
            return Err(CoreError::InvalidStrategy(format!(
                "Weight {weight} must be between 0 and 100"
            )));
        }
        let total = self.committed_weight() + weight;
        if total > 100.0 + WEIGHT_TOLERANCE {
            return Err(CoreError::InvalidStrategy(format!(
                "Weight {weight} would bring the total to {total}, above 100"
            )));
        }
        Ok(())
    }

    pub fn add(
        &mut self,
        symbol: impl Into<String>,
        weight: f64,
        commission: f64,
    ) -> Result<&mut Self, CoreError> {
        self.check_weight(weight)?;
        if !commission.is_finite() || commission < 0.0 {
            return Err(CoreError::InvalidStrategy(format!(
                "Commission {commission} must be non-negative"
            )));
        }
        let allocation = StrategyAllocation::new(symbol, weight, commission);
        if self.allocations.iter().any(|a| a.symbol == allocation.symbol) {
            return Err(CoreError::InvalidStrategy(format!(
                "Symbol {} is listed twice",
                allocation.symbol
            )));
        }
        self.allocations.push(allocation);
        Ok(self)
    }

    pub fn allocations(&self) -> &[StrategyAllocation] {
        &self.allocations
    }

    pub fn into_allocations(self) -> Vec<StrategyAllocation> {
        self.allocations
    }
}

/// Validated, normalized parameters of a recurring weighted investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPlan {
    allocations: Vec<StrategyAllocation>,
    amount: f64,
    interval_days: u32,
}

impl StrategyPlan {
    /// Validate and normalize a dollar-cost-averaging plan.
    ///
    /// Weights are checked prefix by prefix (no partial sum may pass 100);
    /// a total under 100 is then scaled up so the weights sum to exactly 100.
    pub fn dollar_cost_averaging(
        allocations: Vec<StrategyAllocation>,
        amount: f64,
        interval_days: u32,
    ) -> Result<Self, CoreError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CoreError::InvalidStrategy(format!(
                "Investment amount {amount} must be positive"
            )));
        }
        if interval_days < 1 {
            return Err(CoreError::InvalidStrategy(
                "Interval must be at least 1 day".into(),
            ));
        }
        if allocations.is_empty() {
            return Err(CoreError::InvalidStrategy(
                "At least one symbol is required".into(),
            ));
        }

        let mut builder = AllocationBuilder::new();
        for a in allocations {
            builder.add(a.symbol, a.weight, a.commission)?;
        }

        let total = builder.committed_weight();
        if total <= 0.0 {
            return Err(CoreError::InvalidStrategy(
                "Weights must not all be zero".into(),
            ));
        }

        let mut allocations = builder.into_allocations();
        if total < 100.0 - WEIGHT_TOLERANCE {
            let factor = 100.0 / total;
            for a in &mut allocations {
                a.weight *= factor;
            }
        }

        Ok(Self {
            allocations,
            amount,
            interval_days,
        })
    }

    pub fn allocations(&self) -> &[StrategyAllocation] {
        &self.allocations
    }

    /// Money invested per cycle, before commissions.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn interval_days(&self) -> u32 {
        self.interval_days
    }

    pub fn total_weight(&self) -> f64 {
        self.allocations.iter().map(|a| a.weight).sum()
    }
}

/// A plan plus the window it runs over. No end date means open-ended:
/// the plan runs up to today and then keeps catching up.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySchedule {
    pub plan: StrategyPlan,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl StrategySchedule {
    pub fn closed(plan: StrategyPlan, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            plan,
            start,
            end: Some(end),
        }
    }

    pub fn open_ended(plan: StrategyPlan, start: NaiveDate) -> Self {
        Self {
            plan,
            start,
            end: None,
        }
    }

    pub fn is_open_ended(&self) -> bool {
        self.end.is_none()
    }
}

/// Resumption state of an open-ended strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyCheckpoint {
    pub user: String,
    pub portfolio: String,
    pub plan: StrategyPlan,
    /// First date not yet executed; catch-up resumes here.
    pub last_processed: NaiveDate,
}

impl StrategyCheckpoint {
    pub fn new(
        user: impl Into<String>,
        portfolio: impl Into<String>,
        plan: StrategyPlan,
        last_processed: NaiveDate,
    ) -> Self {
        Self {
            user: user.into(),
            portfolio: portfolio.into(),
            plan,
            last_processed,
        }
    }

    pub fn advanced_to(&self, date: NaiveDate) -> Self {
        Self {
            last_processed: date,
            ..self.clone()
        }
    }
}

/// What one scheduler pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRun {
    /// Records appended to the ledger, in cycle order.
    pub appended: Vec<TransactionRecord>,

    /// Investment dates visited.
    pub cycles: usize,

    /// Records not appended because an identical BUY was already in the ledger.
    pub skipped_duplicates: usize,

    /// Records not appended because commission ate the whole allocation.
    pub skipped_empty: usize,

    /// Date at loop exit; stored as the checkpoint for open-ended plans.
    pub next_date: NaiveDate,

    /// The run stopped at `next_date` because no price was published yet.
    pub deferred: bool,
}
