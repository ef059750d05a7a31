use chrono::{Datelike, Duration, NaiveDate, Weekday};
use log::{info, warn};

use crate::errors::CoreError;
use crate::models::portfolio::{Ledger, PortfolioKind};
use crate::models::price::ResolveMode;
use crate::models::round2;
use crate::models::strategy::{StrategyPlan, StrategyRun, StrategySchedule};
use crate::models::transaction::{TransactionKind, TransactionRecord};
use crate::services::ledger_service::LedgerService;
use crate::services::price_resolver::PriceResolver;

/// What to do when a cycle date has no price yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPrice {
    /// Return the error; nothing from the run is kept.
    Fail,
    /// Stop before that cycle and report it as `next_date`, so a later
    /// catch-up picks it up again.
    Defer,
}

/// Executes dollar-cost-averaging plans against a ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyService {
    ledger_service: LedgerService,
}

impl StrategyService {
    pub fn new() -> Self {
        Self {
            ledger_service: LedgerService::new(),
        }
    }

    /// A closed schedule must end no later than today and not before it starts.
    pub fn validate_schedule(
        &self,
        schedule: &StrategySchedule,
        today: NaiveDate,
    ) -> Result<(), CoreError> {
        if let Some(end) = schedule.end {
            if schedule.start > end {
                return Err(CoreError::InvalidStrategy(format!(
                    "Start {} is after end {end}",
                    schedule.start
                )));
            }
            if end > today {
                return Err(CoreError::InvalidStrategy(format!(
                    "End {end} is in the future"
                )));
            }
        }
        Ok(())
    }

    /// Run `plan` for every cycle date in `[start, end]`, appending BUY
    /// records to `ledger`.
    ///
    /// Each cycle invests `amount × weight / 100 − commission` per symbol at
    /// the nearest forward close. A cycle is appended as a whole or not at
    /// all.
    ///
    /// `replay_from` is set when resuming from a checkpoint: a BUY identical
    /// to one already in the ledger (symbol, date, quantity) and dated on or
    /// after it was written by an earlier run whose checkpoint was lost, and
    /// is skipped. Without it every generated BUY is appended.
    pub async fn execute(
        &self,
        resolver: &mut PriceResolver,
        ledger: &mut Ledger,
        plan: &StrategyPlan,
        start: NaiveDate,
        end: NaiveDate,
        missing_price: MissingPrice,
        replay_from: Option<NaiveDate>,
    ) -> Result<StrategyRun, CoreError> {
        let (dates, exit_date) = cycle_dates(start, end, plan.interval_days());
        let mut run = StrategyRun {
            appended: Vec::new(),
            cycles: 0,
            skipped_duplicates: 0,
            skipped_empty: 0,
            next_date: exit_date,
            deferred: false,
        };

        for date in dates {
            let records = match self.cycle_records(resolver, plan, date).await {
                Ok(records) => records,
                Err(e) if e.is_price_unavailable() && missing_price == MissingPrice::Defer => {
                    info!("Deferring cycle {date}: {e}");
                    run.next_date = date;
                    run.deferred = true;
                    break;
                }
                Err(e) => return Err(e),
            };

            run.cycles += 1;
            for record in records {
                if record.quantity <= 0.0 || !record.quantity.is_finite() {
                    warn!(
                        "Skipping {} on {date}: commission leaves nothing to invest",
                        record.symbol
                    );
                    run.skipped_empty += 1;
                    continue;
                }
                if replay_from.is_some_and(|from| Self::already_recorded(ledger, &record, from)) {
                    warn!(
                        "Skipping duplicate BUY of {} {} on {date}",
                        record.quantity, record.symbol
                    );
                    run.skipped_duplicates += 1;
                    continue;
                }
                self.ledger_service
                    .append(PortfolioKind::Flexible, ledger, record.clone())?;
                run.appended.push(record);
            }
        }

        info!(
            "Strategy run {start}..{end}: {} cycles, {} records appended, next {}",
            run.cycles,
            run.appended.len(),
            run.next_date
        );
        Ok(run)
    }

    /// Price every allocation for one cycle before anything is appended.
    async fn cycle_records(
        &self,
        resolver: &mut PriceResolver,
        plan: &StrategyPlan,
        date: NaiveDate,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        let mut records = Vec::with_capacity(plan.allocations().len());
        for allocation in plan.allocations() {
            let price = resolver
                .resolve(&allocation.symbol, date, ResolveMode::NearestForward)
                .await?
                .price;
            let invest = plan.amount() * allocation.weight / 100.0 - allocation.commission;
            let quantity = if price > 0.0 { round2(invest / price) } else { 0.0 };
            records.push(TransactionRecord::buy(
                allocation.symbol.clone(),
                date,
                quantity,
                price,
                allocation.commission,
            ));
        }
        Ok(records)
    }

    fn already_recorded(ledger: &Ledger, record: &TransactionRecord, from: NaiveDate) -> bool {
        ledger.iter().any(|r| {
            r.kind == TransactionKind::Buy
                && r.date >= from
                && r.symbol == record.symbol
                && r.date == record.date
                && (r.quantity - record.quantity).abs() < 1e-9
        })
    }
}

/// Cycle dates from `start` through `end`, every `interval_days`.
///
/// A date on Saturday moves to Monday, Sunday to Monday; if that passes
/// `end` the schedule stops. Returns the dates and the date at loop exit
/// (always after `end`), which is where a later catch-up resumes.
pub fn cycle_dates(
    start: NaiveDate,
    end: NaiveDate,
    interval_days: u32,
) -> (Vec<NaiveDate>, NaiveDate) {
    let step = Duration::days(i64::from(interval_days.max(1)));
    let mut dates = Vec::new();
    let mut date = start;

    while date <= end {
        match date.weekday() {
            Weekday::Sat => date += Duration::days(2),
            Weekday::Sun => date += Duration::days(1),
            _ => {}
        }
        if date > end {
            break;
        }
        dates.push(date);
        date += step;
    }
    (dates, date)
}
