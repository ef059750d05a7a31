use chrono::NaiveDate;
use std::sync::RwLock;

/// Source of "today" for every date-bounded computation
/// (forward price scans, open-ended strategies, catch-up, future-date checks).
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock date in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock pinned to a date. It can be moved with [`FixedClock::set`],
/// which is how catch-up behaviour is exercised across "days".
#[derive(Debug)]
pub struct FixedClock {
    today: RwLock<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: RwLock::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        match self.today.write() {
            Ok(mut guard) => *guard = today,
            Err(poisoned) => *poisoned.into_inner() = today,
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        match self.today.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
