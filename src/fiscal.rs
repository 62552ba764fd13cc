//! Calendar-aligned fiscal quarter arithmetic.

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

/// One 3-month fiscal quarter, both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuarterWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl QuarterWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Returns the most recently *completed* quarter relative to `reference`.
///
/// Quarters are Jan–Mar, Apr–Jun, Jul–Sep, Oct–Dec. A reference date in
/// January–March therefore maps to Q4 of the previous year. The end bound is
/// computed as the first day of the following month minus one day, which
/// handles month lengths and leap years without a lookup table.
pub fn last_completed_quarter(reference: NaiveDate) -> QuarterWindow {
    let (year, start_month) = if reference.month() <= 3 {
        (reference.year() - 1, 10)
    } else {
        let previous_quarter = (reference.month() - 1) / 3; // 1-based, strictly before current
        (reference.year(), (previous_quarter - 1) * 3 + 1)
    };

    let start = NaiveDate::from_ymd_opt(year, start_month, 1)
        .expect("quarter start is always a valid date");
    let (end_year, end_month) = if start_month + 3 > 12 {
        (year + 1, start_month + 3 - 12)
    } else {
        (year, start_month + 3)
    };
    let end = NaiveDate::from_ymd_opt(end_year, end_month, 1)
        .expect("month after quarter is always a valid date")
        .checked_sub_days(Days::new(1))
        .expect("quarter end never underflows");

    QuarterWindow { start, end }
}
