//! Best-effort header-row detection for files with noisy leading rows.
//!
//! Report exports routinely carry titles, timestamps, or blank padding above
//! the real header. The locator previews a bounded slice of the file,
//! classifies each candidate header row's cells, and accepts the shallowest
//! offset that looks like column names rather than data. This is a
//! heuristic: callers can always override it with an explicit offset.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::{
    error::QueryError,
    table::{self, FileKind},
};

/// How many leading rows the scan is willing to skip.
pub const MAX_LOOKAHEAD: usize = 5;
/// Data rows inspected below each candidate header.
const PREVIEW_DATA_ROWS: usize = 3;
/// Minimum column count before acceptance is considered at all.
const MIN_COLUMNS: usize = 4;

/// Result of a header scan. `columns` is `None` when no offset was accepted
/// and the caller should proceed with native parsing from row zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderScan {
    pub skip_rows: usize,
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameClass {
    Empty,
    Synthetic,
    Numeric,
    Text,
}

/// Finds the row offset that most plausibly holds column names.
///
/// A candidate offset is accepted when genuine-text names exceed half the
/// columns, synthetic plus purely numeric names stay under 30%, and the row
/// is wider than three columns. Offsets are tried shallowest-first; the
/// first acceptance wins.
pub fn locate_header(bytes: &[u8], kind: FileKind) -> Result<HeaderScan, QueryError> {
    let preview = table::read_rows(bytes, kind, Some(MAX_LOOKAHEAD + 1 + PREVIEW_DATA_ROWS))?;

    for offset in 0..=MAX_LOOKAHEAD {
        let Some(row) = preview.get(offset) else {
            break;
        };
        let names: Vec<String> = row
            .iter()
            .map(|cell| {
                cell.as_ref()
                    .map(|c| c.as_display().trim().to_string())
                    .unwrap_or_default()
            })
            .collect();
        if accept(&names) {
            debug!("header detected at offset {offset}: {names:?}");
            return Ok(HeaderScan {
                skip_rows: offset,
                columns: Some(names),
            });
        }
    }

    debug!("no header offset accepted within lookahead {MAX_LOOKAHEAD}; falling back to 0");
    Ok(HeaderScan {
        skip_rows: 0,
        columns: None,
    })
}

fn accept(names: &[String]) -> bool {
    if names.len() < MIN_COLUMNS {
        return false;
    }
    let total = names.len() as f64;
    let mut text = 0usize;
    let mut suspect = 0usize;
    for name in names {
        match classify(name) {
            NameClass::Text => text += 1,
            NameClass::Synthetic | NameClass::Numeric => suspect += 1,
            NameClass::Empty => {}
        }
    }
    (text as f64) / total > 0.5 && (suspect as f64) / total < 0.3
}

fn classify(name: &str) -> NameClass {
    if name.is_empty() {
        return NameClass::Empty;
    }
    if synthetic_pattern().is_match(name) {
        return NameClass::Synthetic;
    }
    if name.parse::<f64>().is_ok() {
        return NameClass::Numeric;
    }
    NameClass::Text
}

fn synthetic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(unnamed(:\s*\d+)?|column_?\d+|field_?\d+)$").expect("valid regex")
    })
}
