//! Strategy-cascade date resolution for columns with no declared format.
//!
//! Each strategy is a pure per-value parse applied independently to the whole
//! column — strategies are never composed. The resolver walks the cascade in
//! order and accepts the first strategy whose non-null output covers at least
//! half the rows; when none does, it still returns the best-scoring output
//! flagged as low-confidence. Whether low confidence fails the request is the
//! caller's policy, not the resolver's.

use chrono::NaiveDate;
use log::debug;

use crate::data::Cell;

/// Share of rows a strategy must parse before the cascade stops.
const ACCEPT_THRESHOLD: f64 = 0.5;

/// Canonical column plus validity bookkeeping for one resolution run.
#[derive(Debug, Clone)]
pub struct DateParseOutcome {
    pub dates: Vec<Option<NaiveDate>>,
    pub valid: usize,
    pub invalid: usize,
    pub strategy: &'static str,
    pub low_confidence: bool,
}

struct Strategy {
    name: &'static str,
    parse: fn(&str) -> Option<NaiveDate>,
}

/// Month-first / ISO oriented formats, including datetime carriers. This is
/// the tolerant first pass; day-first interpretation gets its own strategy so
/// DD/MM data with unambiguous days is not silently mis-read here.
const FLEXIBLE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%Y %H:%M:%S",
    "%d %b %Y",
    "%b %d, %Y",
];

const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%Y %H:%M:%S"];

const CASCADE: &[Strategy] = &[
    Strategy {
        name: "flexible",
        parse: parse_flexible,
    },
    Strategy {
        name: "day-first",
        parse: parse_day_first,
    },
    Strategy {
        name: "dd/mm/yyyy",
        parse: |v| parse_single(v, "%d/%m/%Y"),
    },
    Strategy {
        name: "mm/dd/yyyy",
        parse: |v| parse_single(v, "%m/%d/%Y"),
    },
    Strategy {
        name: "yyyy-mm-dd",
        parse: |v| parse_single(v, "%Y-%m-%d"),
    },
    Strategy {
        name: "dd-mm-yyyy",
        parse: |v| parse_single(v, "%d-%m-%Y"),
    },
    Strategy {
        name: "yyyy/mm/dd",
        parse: |v| parse_single(v, "%Y/%m/%d"),
    },
];

/// Resolves a column of heterogeneous date-like cells into canonical dates.
///
/// Cells already carrying a date (spreadsheet inputs) count as valid without
/// reparsing. Absent cells stay absent and are excluded from the invalid
/// count; they still weigh against the acceptance threshold, which is
/// measured over total rows.
pub fn resolve_dates(cells: &[Option<Cell>]) -> DateParseOutcome {
    let total = cells.len();
    let mut best: Option<DateParseOutcome> = None;

    for strategy in CASCADE {
        let outcome = apply(cells, strategy);
        debug!(
            "date strategy '{}': {} valid / {} invalid of {} row(s)",
            strategy.name, outcome.valid, outcome.invalid, total
        );
        if total > 0 && (outcome.valid as f64) / (total as f64) >= ACCEPT_THRESHOLD {
            return outcome;
        }
        if best.as_ref().is_none_or(|b| outcome.valid > b.valid) {
            best = Some(outcome);
        }
    }

    let mut fallback = best.unwrap_or(DateParseOutcome {
        dates: Vec::new(),
        valid: 0,
        invalid: 0,
        strategy: "flexible",
        low_confidence: true,
    });
    fallback.low_confidence = true;
    fallback
}

/// Raw display values of cells that were present but failed to parse,
/// capped at `limit`. Used to populate diagnostic samples on failure.
pub fn invalid_samples(
    cells: &[Option<Cell>],
    dates: &[Option<NaiveDate>],
    limit: usize,
) -> Vec<String> {
    cells
        .iter()
        .zip(dates)
        .filter_map(|(cell, date)| match (cell, date) {
            (Some(cell), None) => Some(cell.as_display()),
            _ => None,
        })
        .take(limit)
        .collect()
}

fn apply(cells: &[Option<Cell>], strategy: &Strategy) -> DateParseOutcome {
    let mut dates = Vec::with_capacity(cells.len());
    let mut valid = 0usize;
    let mut invalid = 0usize;
    for cell in cells {
        let parsed = match cell {
            None => None,
            Some(Cell::Date(d)) => Some(*d),
            Some(Cell::Text(s)) => (strategy.parse)(s.trim()),
            // Bare numbers are not treated as date serials.
            Some(Cell::Number(_)) => None,
        };
        match (&cell, parsed) {
            (Some(_), Some(_)) => valid += 1,
            (Some(_), None) => invalid += 1,
            (None, _) => {}
        }
        dates.push(parsed);
    }
    DateParseOutcome {
        dates,
        valid,
        invalid,
        strategy: strategy.name,
        low_confidence: false,
    }
}

fn parse_flexible(value: &str) -> Option<NaiveDate> {
    parse_any(value, FLEXIBLE_FORMATS)
}

fn parse_day_first(value: &str) -> Option<NaiveDate> {
    parse_any(value, DAY_FIRST_FORMATS)
}

fn parse_any(value: &str, formats: &[&str]) -> Option<NaiveDate> {
    for fmt in formats {
        if fmt.contains("%H") {
            if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(value, fmt) {
                return Some(parsed.date());
            }
        } else if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    None
}

fn parse_single(value: &str, fmt: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, fmt).ok()
}
