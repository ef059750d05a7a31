use chrono::{Datelike, Duration, NaiveDate, Weekday};
use log::debug;

use crate::errors::CoreError;
use crate::models::performance::{display_scale, Bucket, PerformanceSample, PerformanceSeries};
use crate::models::portfolio::Ledger;
use crate::services::price_resolver::PriceResolver;
use crate::services::valuation_service::ValuationService;

/// Samples portfolio value over a date range, bucketed by the range length.
///
/// | span (days) | bucket  | sample dates                                  |
/// |-------------|---------|-----------------------------------------------|
/// | ≤ 30        | daily   | every day, start through finish               |
/// | 31–200      | weekly  | first Friday on/after start, then every 7 days |
/// | 201–1600    | monthly | last day of each month touched by the range   |
/// | > 1600      | yearly  | start, Dec 31 of each full year, finish       |
#[derive(Debug, Clone, Copy)]
pub struct PerformanceService {
    valuation: ValuationService,
    max_scan_days: i64,
}

impl PerformanceService {
    pub fn new(max_scan_days: i64) -> Self {
        Self {
            valuation: ValuationService::new(),
            max_scan_days: max_scan_days.max(0),
        }
    }

    /// Build the series for `[start, finish]`.
    ///
    /// When a bucket date cannot be valued (no price yet, e.g. it is past
    /// today) the date is stepped back a day at a time. The first weekly
    /// date steps forward instead, up to today, and then back. Errors other
    /// than a missing price stop the whole series.
    pub async fn performance_series(
        &self,
        resolver: &mut PriceResolver,
        ledger: &Ledger,
        start: NaiveDate,
        finish: NaiveDate,
    ) -> Result<PerformanceSeries, CoreError> {
        if start >= finish {
            return Err(CoreError::InvalidDateRange {
                start: start.to_string(),
                finish: finish.to_string(),
            });
        }

        let bucket = Bucket::for_span((finish - start).num_days());
        let dates = bucket_dates(bucket, start, finish);
        debug!(
            "Performance {start}..{finish}: {} {:?} samples",
            dates.len(),
            bucket
        );

        let mut samples = Vec::with_capacity(dates.len());
        for (i, date) in dates.into_iter().enumerate() {
            let forward_first = bucket == Bucket::Weekly && i == 0;
            let (valued_on, value) = self
                .value_near(resolver, ledger, date, finish, forward_first)
                .await?;
            samples.push(PerformanceSample {
                label: bucket.label(date),
                date,
                valued_on,
                value,
            });
        }

        let max = samples.iter().map(|s| s.value).fold(0.0, f64::max);
        Ok(PerformanceSeries {
            bucket,
            samples,
            scale: display_scale(max),
        })
    }

    /// Value the ledger on `date` or the nearest day that can be valued.
    ///
    /// With `forward_first` the search moves forward while the day is not
    /// past today or `finish`, then falls back to moving backward from
    /// `date`. At most `max_scan_days` extra days are tried.
    async fn value_near(
        &self,
        resolver: &mut PriceResolver,
        ledger: &Ledger,
        date: NaiveDate,
        finish: NaiveDate,
        forward_first: bool,
    ) -> Result<(NaiveDate, f64), CoreError> {
        let limit = resolver.today().min(finish);
        let mut forward = forward_first && date <= limit;
        let mut day = date;
        let mut attempts = 0;
        loop {
            match self.valuation.total_value(resolver, ledger, day).await {
                Ok(value) => return Ok((day, value)),
                Err(e) if e.is_price_unavailable() && attempts < self.max_scan_days => {
                    attempts += 1;
                    if forward && day + Duration::days(1) <= limit {
                        day += Duration::days(1);
                    } else if forward {
                        forward = false;
                        day = date - Duration::days(1);
                    } else {
                        day -= Duration::days(1);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for PerformanceService {
    fn default() -> Self {
        Self::new(366)
    }
}

/// Sample dates for `bucket` over `[start, finish]`.
pub fn bucket_dates(bucket: Bucket, start: NaiveDate, finish: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    match bucket {
        Bucket::Daily => {
            let mut day = start;
            while day <= finish {
                dates.push(day);
                day += Duration::days(1);
            }
        }
        Bucket::Weekly => {
            let mut day = first_friday_on_or_after(start);
            while day <= finish {
                dates.push(day);
                day += Duration::days(7);
            }
        }
        Bucket::Monthly => {
            let (mut year, mut month) = (start.year(), start.month());
            while (year, month) <= (finish.year(), finish.month()) {
                if let Some(end) = month_end(year, month) {
                    dates.push(end);
                }
                if month == 12 {
                    year += 1;
                    month = 1;
                } else {
                    month += 1;
                }
            }
        }
        Bucket::Yearly => {
            dates.push(start);
            for year in (start.year() + 1)..finish.year() {
                if let Some(dec31) = NaiveDate::from_ymd_opt(year, 12, 31) {
                    dates.push(dec31);
                }
            }
            dates.push(finish);
        }
    }
    dates
}

fn first_friday_on_or_after(date: NaiveDate) -> NaiveDate {
    let offset = (7 + Weekday::Fri.num_days_from_monday() as i64
        - date.weekday().num_days_from_monday() as i64)
        % 7;
    date + Duration::days(offset)
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}
