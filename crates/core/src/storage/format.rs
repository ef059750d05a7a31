use chrono::NaiveDate;
use log::warn;

use crate::errors::CoreError;
use crate::models::price::PriceSeries;
use crate::models::strategy::{
    StrategyAllocation, StrategyCheckpoint, StrategyPlan, DOLLAR_COST_AVERAGING,
};

/// Extension of per-symbol cache files.
pub const CACHE_EXTENSION: &str = "cache";

/// Separator between records in price files.
pub const PRICE_RECORD_SEPARATOR: char = ';';

/// Separator between fields of a checkpoint line.
pub const CHECKPOINT_FIELD_SEPARATOR: &str = ";";

const DATE_FORMAT: &str = "%Y-%m-%d";

// ── Price series: `date,price;date,price;...` ───────────────────────

/// Encode a series as semicolon-separated `date,price` pairs.
///
/// Layout:
/// ```text
/// 2022-10-28,92.1;2022-10-31,94.66;
/// ```
pub fn write_price_series(series: &PriceSeries) -> String {
    let mut out = String::with_capacity(series.len() * 20);
    for point in series.points() {
        out.push_str(&point.date.format(DATE_FORMAT).to_string());
        out.push(',');
        out.push_str(&point.price.to_string());
        out.push(PRICE_RECORD_SEPARATOR);
    }
    out
}

/// Decode a price file. Line breaks are ignored; malformed records are
/// skipped with a warning so that one bad row never hides the rest.
pub fn read_price_series(text: &str) -> PriceSeries {
    let joined: String = text.lines().collect();
    let mut series = PriceSeries::new();
    for record in joined.split(PRICE_RECORD_SEPARATOR) {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }
        match parse_price_record(record) {
            Some((date, price)) => series.set_price(date, price),
            None => warn!("Skipping malformed price record '{record}'"),
        }
    }
    series
}

fn parse_price_record(record: &str) -> Option<(NaiveDate, f64)> {
    let (date, price) = record.split_once(',')?;
    let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
    let price: f64 = price.trim().parse().ok()?;
    if !price.is_finite() || price < 0.0 {
        return None;
    }
    Some((date, price))
}

/// Parse a comma-separated symbol list (lines are joined first).
pub fn read_symbol_list(text: &str) -> Vec<String> {
    let joined: String = text.lines().collect();
    joined
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── Strategy checkpoints ────────────────────────────────────────────

/// Encode one checkpoint as a single line (no trailing newline):
///
/// ```text
/// portfolio;DOLLAR COST AVERAGING;user;interval;lastDate;amount;[S1, S2];[w1, w2];[c1, c2]
/// ```
pub fn write_checkpoint_line(checkpoint: &StrategyCheckpoint) -> String {
    let plan = &checkpoint.plan;
    let symbols: Vec<String> = plan.allocations().iter().map(|a| a.symbol.clone()).collect();
    let weights: Vec<String> = plan.allocations().iter().map(|a| format!("{:?}", a.weight)).collect();
    let commissions: Vec<String> = plan
        .allocations()
        .iter()
        .map(|a| format!("{:?}", a.commission))
        .collect();

    [
        checkpoint.portfolio.clone(),
        DOLLAR_COST_AVERAGING.to_string(),
        checkpoint.user.clone(),
        plan.interval_days().to_string(),
        checkpoint.last_processed.format(DATE_FORMAT).to_string(),
        format!("{:?}", plan.amount()),
        format!("[{}]", symbols.join(", ")),
        format!("[{}]", weights.join(", ")),
        format!("[{}]", commissions.join(", ")),
    ]
    .join(CHECKPOINT_FIELD_SEPARATOR)
}

/// Does `line` hold the checkpoint for (`user`, `portfolio`)?
pub fn checkpoint_matches(line: &str, user: &str, portfolio: &str) -> bool {
    let fields: Vec<&str> = line.split(CHECKPOINT_FIELD_SEPARATOR).collect();
    fields.len() > 2 && fields[0] == portfolio && fields[2] == user
}

/// Decode one checkpoint line.
pub fn read_checkpoint_line(line: &str) -> Result<StrategyCheckpoint, CoreError> {
    let fields: Vec<&str> = line.trim_end().split(CHECKPOINT_FIELD_SEPARATOR).collect();
    if fields.len() != 9 {
        return Err(CoreError::Deserialization(format!(
            "Checkpoint line has {} fields, expected 9",
            fields.len()
        )));
    }
    if fields[1] != DOLLAR_COST_AVERAGING {
        return Err(CoreError::Deserialization(format!(
            "Unknown strategy '{}'",
            fields[1]
        )));
    }

    let interval: u32 = fields[3]
        .trim()
        .parse()
        .map_err(|e| CoreError::Deserialization(format!("Bad interval '{}': {e}", fields[3])))?;
    let last_processed = NaiveDate::parse_from_str(fields[4].trim(), DATE_FORMAT)
        .map_err(|e| CoreError::Deserialization(format!("Bad date '{}': {e}", fields[4])))?;
    let amount = parse_number(fields[5])?;

    let symbols = parse_list(fields[6]);
    let weights = parse_list(fields[7])
        .iter()
        .map(|w| parse_number(w))
        .collect::<Result<Vec<f64>, CoreError>>()?;
    let commissions = parse_list(fields[8])
        .iter()
        .map(|c| parse_number(c))
        .collect::<Result<Vec<f64>, CoreError>>()?;

    if symbols.len() != weights.len() || symbols.len() != commissions.len() {
        return Err(CoreError::Deserialization(format!(
            "Checkpoint lists differ in length: {} symbols, {} weights, {} commissions",
            symbols.len(),
            weights.len(),
            commissions.len()
        )));
    }

    let allocations = symbols
        .into_iter()
        .zip(weights)
        .zip(commissions)
        .map(|((symbol, weight), commission)| StrategyAllocation::new(symbol, weight, commission))
        .collect();
    let plan = StrategyPlan::dollar_cost_averaging(allocations, amount, interval)
        .map_err(|e| CoreError::Deserialization(format!("Stored strategy is invalid: {e}")))?;

    Ok(StrategyCheckpoint::new(fields[2], fields[0], plan, last_processed))
}

fn parse_list(field: &str) -> Vec<String> {
    let inner = field
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    inner
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number(s: &str) -> Result<f64, CoreError> {
    s.trim()
        .parse()
        .map_err(|e| CoreError::Deserialization(format!("Bad number '{s}': {e}")))
}
