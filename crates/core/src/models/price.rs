use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single price data point (date → closing price).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// How a missing date is handled when resolving a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Only the requested date.
    Exact,
    /// Step forward a day at a time, never past today (weekends/holidays).
    NearestForward,
    /// Step backward a day at a time ("last traded price").
    NearestBackward,
}

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTier {
    /// Bundled reference series (dates up to the reference cutoff).
    Reference,
    /// Local per-symbol cache file.
    Cache,
    /// Freshly fetched from a quote source (and written to the cache).
    Remote,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrice {
    pub symbol: String,
    /// Date that was asked for.
    pub requested: NaiveDate,
    /// Date whose close was used (differs from `requested` after a scan).
    pub date: NaiveDate,
    pub price: f64,
    pub tier: PriceTier,
}

/// Daily close series for one symbol, kept sorted by date.
///
/// Lookups use binary search (O(log n)). A series is always replaced
/// wholesale when refreshed from a quote source, never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from points in any order. On duplicate dates the last one wins.
    pub fn from_points(points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut series = Self::new();
        for point in points {
            series.set_price(point.date, point.price);
        }
        series
    }

    /// Price on exactly `date`, if present.
    pub fn get_price(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| self.points[idx].price)
    }

    /// Insert or update a point, keeping date order.
    pub fn set_price(&mut self, date: NaiveDate, price: f64) {
        match self.points.binary_search_by_key(&date, |p| p.date) {
            Ok(idx) => self.points[idx].price = price,
            Err(idx) => self.points.insert(idx, PricePoint { date, price }),
        }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}
