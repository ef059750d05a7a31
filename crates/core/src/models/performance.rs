use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of display units the largest sample should roughly fill.
pub const DISPLAY_WIDTH: f64 = 50.0;

/// Time bucket chosen from the length of the requested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    /// Every calendar day (span ≤ 30 days).
    Daily,
    /// Fridays (span 31–200 days).
    Weekly,
    /// Month ends (span 201–1600 days).
    Monthly,
    /// Year ends (span > 1600 days).
    Yearly,
}

impl Bucket {
    /// Bucket for a span of `days` between start and finish.
    pub fn for_span(days: i64) -> Self {
        match days {
            d if d <= 30 => Bucket::Daily,
            d if d <= 200 => Bucket::Weekly,
            d if d <= 1600 => Bucket::Monthly,
            _ => Bucket::Yearly,
        }
    }

    /// Display label for a sample dated `date`.
    pub fn label(self, date: NaiveDate) -> String {
        match self {
            Bucket::Daily | Bucket::Weekly => date.format("%d %b %Y").to_string(),
            Bucket::Monthly => date.format("%b %Y").to_string(),
            Bucket::Yearly => date.format("%Y").to_string(),
        }
    }
}

/// One point of a performance series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub label: String,

    /// The bucket date this sample stands for.
    pub date: NaiveDate,

    /// The date actually valued (differs from `date` on non-trading days).
    pub valued_on: NaiveDate,

    pub value: f64,
}

/// Bucketed portfolio value over a date range, with a display scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSeries {
    pub bucket: Bucket,
    pub samples: Vec<PerformanceSample>,

    /// Value of one display unit; the largest sample maps to ~50 units.
    pub scale: f64,
}

impl PerformanceSeries {
    pub fn max_value(&self) -> f64 {
        self.samples.iter().map(|s| s.value).fold(0.0, f64::max)
    }

    /// Display units for `value` at this series' scale.
    pub fn units(&self, value: f64) -> usize {
        if self.scale <= 0.0 || value <= 0.0 {
            return 0;
        }
        (value / self.scale).round() as usize
    }
}

/// "Nice" unit such that `max` spans about [`DISPLAY_WIDTH`] units:
/// `m = max / 50`, rounded up at its leading decimal digit.
pub fn display_scale(max: f64) -> f64 {
    let m = max / DISPLAY_WIDTH;
    if !m.is_finite() || m <= 0.0 {
        return 0.0;
    }
    let k = -(m.log10().floor() as i32);
    if k >= 0 {
        let factor = 10f64.powi(k);
        (m * factor).ceil() / factor
    } else {
        // Dividing by a whole power of ten keeps large scales exact.
        let factor = 10f64.powi(-k);
        (m / factor).ceil() * factor
    }
}
