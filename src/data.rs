use std::fmt;

use chrono::NaiveDate;

/// A single typed cell. Absent values are modeled as `Option<Cell>::None`
/// so they never masquerade as an empty string or zero during grouping.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    /// Types a raw field from a delimited file. Empty or whitespace-only
    /// fields are absent; numeric-looking fields become numbers; everything
    /// else stays text. Date strings stay text here — the date resolver owns
    /// string-to-date interpretation.
    pub fn from_raw(raw: &str) -> Option<Cell> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(parsed) = trimmed.parse::<f64>()
            && parsed.is_finite()
        {
            return Some(Cell::Number(parsed));
        }
        Some(Cell::Text(trimmed.to_string()))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Cell::Date(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}
