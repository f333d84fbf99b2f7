//! Calendar access for daily missions.
use chrono::{Days, Local, NaiveDate};
use std::cell::Cell;
use std::rc::Rc;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Source of "today" as a calendar date.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// The host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock whose date only moves when told to. Used by simulations and tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    today: Cell<NaiveDate>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(today: NaiveDate) -> Self {
        Self {
            today: Cell::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        self.today.set(today);
    }

    /// Move the date forward, saturating at the calendar's end.
    pub fn advance_days(&self, days: u64) {
        let current = self.today.get();
        self.today
            .set(current.checked_add_days(Days::new(days)).unwrap_or(current));
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        self.today.get()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

/// Storage form of a date (`YYYY-MM-DD`).
#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

#[must_use]
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_shares() {
        let start = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let clock = Rc::new(ManualClock::new(start));
        let shared = Rc::clone(&clock);
        clock.advance_days(1);
        assert_eq!(
            shared.today(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }

    #[test]
    fn date_keys_are_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(date_key(date), "2025-03-07");
        assert_eq!(parse_date_key("2025-03-07"), Some(date));
        assert_eq!(parse_date_key("07.03.2025"), None);
    }
}
