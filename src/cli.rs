use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::query::{ClassifyRule, RowFilter};

#[derive(Debug, Parser)]
#[command(author, version, about = "Aggregate queries over messy tabular exports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a fiscal-window aggregate query against a tabular file
    Query(QueryArgs),
    /// Preview the first few rows of a file in a formatted table
    Preview(PreviewArgs),
    /// Report where the header row was detected and which columns it yields
    Detect(DetectArgs),
    /// List the files a store directory can serve
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Input file (.csv, .tsv, .xlsx)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Column holding the date used for fiscal-window filtering
    #[arg(short = 'd', long = "date-column")]
    pub date_column: String,
    /// Attribute columns to group by (comma-separated or repeated)
    #[arg(short = 'g', long = "group-by", required = true, value_delimiter = ',')]
    pub group_by: Vec<String>,
    /// Ordered category column (delivery-period style buckets)
    #[arg(short = 'c', long = "category-column")]
    pub category_column: String,
    /// Numeric metric column to sum per group
    #[arg(short = 'm', long = "metric-column")]
    pub metric_column: String,
    /// Explicit header row offset; disables auto-detection
    #[arg(long = "skip-rows")]
    pub skip_rows: Option<usize>,
    /// Disable header auto-detection (header assumed at row 0)
    #[arg(long = "no-header-detect")]
    pub no_header_detect: bool,
    /// Keep only the N highest-total groups within each category bucket
    #[arg(long = "top-n")]
    pub top_n: Option<usize>,
    /// Priority labels pinned to the front of the category order
    #[arg(long = "priority-label", action = clap::ArgAction::Append)]
    pub priority_labels: Vec<String>,
    /// Reference date for the fiscal window (YYYY-MM-DD, defaults to today)
    #[arg(long = "as-of", value_parser = parse_iso_date)]
    pub as_of: Option<NaiveDate>,
    /// Value remappings of the form `COLUMN:FROM=TO` (repeatable)
    #[arg(long = "remap", value_parser = parse_remap, action = clap::ArgAction::Append)]
    pub remaps: Vec<RemapSpec>,
    /// Derived label column: `TARGET=SOURCE/NEEDLE/MATCH/ELSE`
    #[arg(long = "classify", value_parser = parse_classify)]
    pub classify: Option<ClassifyRule>,
    /// Equality row filter of the form `COLUMN=VALUE`, applied before windowing
    #[arg(long = "where", value_parser = parse_where)]
    pub filter: Option<RowFilter>,
    /// Emit the full response (rows, window, diagnostics) as JSON
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input file (.csv, .tsv, .xlsx)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Explicit header row offset; auto-detected when omitted
    #[arg(long = "skip-rows")]
    pub skip_rows: Option<usize>,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Input file (.csv, .tsv, .xlsx)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Store directory to enumerate
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
}

/// One parsed `COLUMN:FROM=TO` remap directive.
#[derive(Debug, Clone)]
pub struct RemapSpec {
    pub column: String,
    pub from: String,
    pub to: String,
}

pub fn parse_iso_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{value}' is not a YYYY-MM-DD date"))
}

pub fn parse_where(value: &str) -> Result<RowFilter, String> {
    let (column, expected) = value
        .split_once('=')
        .ok_or_else(|| format!("filter '{value}' must look like COLUMN=VALUE"))?;
    if column.trim().is_empty() {
        return Err("filter column cannot be empty".to_string());
    }
    Ok(RowFilter {
        column: column.trim().to_string(),
        value: expected.trim().to_string(),
    })
}

pub fn parse_remap(value: &str) -> Result<RemapSpec, String> {
    let (column, mapping) = value
        .split_once(':')
        .ok_or_else(|| format!("remap '{value}' must look like COLUMN:FROM=TO"))?;
    let (from, to) = mapping
        .split_once('=')
        .ok_or_else(|| format!("remap '{value}' must look like COLUMN:FROM=TO"))?;
    if column.trim().is_empty() || from.is_empty() {
        return Err(format!("remap '{value}' has an empty column or source value"));
    }
    Ok(RemapSpec {
        column: column.trim().to_string(),
        from: from.to_string(),
        to: to.to_string(),
    })
}

pub fn parse_classify(value: &str) -> Result<ClassifyRule, String> {
    let (target, rest) = value
        .split_once('=')
        .ok_or_else(|| classify_usage(value))?;
    let parts: Vec<&str> = rest.splitn(4, '/').collect();
    if parts.len() != 4 {
        return Err(classify_usage(value));
    }
    if target.trim().is_empty() || parts[0].trim().is_empty() || parts[1].is_empty() {
        return Err(classify_usage(value));
    }
    Ok(ClassifyRule {
        target_column: target.trim().to_string(),
        source_column: parts[0].trim().to_string(),
        needle: parts[1].to_string(),
        match_label: parts[2].to_string(),
        else_label: parts[3].to_string(),
    })
}

fn classify_usage(value: &str) -> String {
    format!("classify '{value}' must look like TARGET=SOURCE/NEEDLE/MATCH/ELSE")
}
