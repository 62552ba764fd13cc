//! Per-request query orchestration.
//!
//! A query is a pure function from (raw bytes, parameters) to (result rows,
//! diagnostics). Nothing is cached between requests and nothing is retried
//! here; retries belong to the fetch collaborator or the caller.

use chrono::{Local, NaiveDate};
use log::info;
use serde::Serialize;

use crate::{
    aggregate::{self, AggregateRow},
    category::DEFAULT_PRIORITY_LABELS,
    columns::ColumnResolver,
    data::Cell,
    dates,
    error::QueryError,
    fiscal::{self, QuarterWindow},
    header,
    table::{FileKind, Table},
};

/// Derives a label column by substring match on a source column: rows whose
/// source value contains `needle` get `match_label`, everything else
/// (including absent values) gets `else_label`.
#[derive(Debug, Clone)]
pub struct ClassifyRule {
    pub target_column: String,
    pub source_column: String,
    pub needle: String,
    pub match_label: String,
    pub else_label: String,
}

/// Rewrites text values of one column through business-mapping pairs;
/// unmapped values pass through unchanged.
#[derive(Debug, Clone)]
pub struct RemapRule {
    pub column: String,
    pub pairs: Vec<(String, String)>,
}

/// Equality restriction applied before date resolution.
#[derive(Debug, Clone)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct QueryParams {
    pub date_column: String,
    pub group_by: Vec<String>,
    pub category_column: String,
    pub metric_column: String,
    /// Explicit header offset; overrides auto-detection when set.
    pub skip_rows: Option<usize>,
    pub auto_detect_header: bool,
    pub top_n: Option<usize>,
    /// Priority labels pinned to the front of the category order.
    pub category_prefix: Vec<String>,
    /// Injectable "today" for the fiscal window; defaults to the local date.
    pub reference_date: Option<NaiveDate>,
    pub remap: Option<RemapRule>,
    pub classify: Option<ClassifyRule>,
    pub filter: Option<RowFilter>,
}

impl QueryParams {
    pub fn new(
        date_column: impl Into<String>,
        group_by: Vec<String>,
        category_column: impl Into<String>,
        metric_column: impl Into<String>,
    ) -> Self {
        Self {
            date_column: date_column.into(),
            group_by,
            category_column: category_column.into(),
            metric_column: metric_column.into(),
            skip_rows: None,
            auto_detect_header: true,
            top_n: None,
            category_prefix: DEFAULT_PRIORITY_LABELS
                .iter()
                .map(|label| label.to_string())
                .collect(),
            reference_date: None,
            remap: None,
            classify: None,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub total_rows: usize,
    pub valid_date_rows: usize,
    pub invalid_date_rows: usize,
    pub skipped_metric_cells: usize,
    pub header_row_used: usize,
    pub auto_detected: bool,
    pub date_strategy: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub rows: Vec<AggregateRow>,
    pub window: QuarterWindow,
    pub diagnostics: Diagnostics,
}

/// Runs the full pipeline over freshly fetched bytes.
pub fn run_query(
    bytes: &[u8],
    kind: FileKind,
    params: &QueryParams,
) -> Result<QueryResponse, QueryError> {
    let (skip_rows, auto_detected) = match params.skip_rows {
        Some(explicit) => (explicit, false),
        None if params.auto_detect_header => {
            let scan = header::locate_header(bytes, kind)?;
            (scan.skip_rows, scan.columns.is_some())
        }
        None => (0, false),
    };

    let mut table = Table::parse(bytes, kind, skip_rows)?;
    if table.row_count() == 0 {
        return Err(QueryError::EmptyTable);
    }
    info!(
        "parsed table: {} row(s), {} column(s), header at row {}",
        table.row_count(),
        table.column_names().len(),
        skip_rows
    );

    if let Some(remap) = &params.remap {
        let index = ColumnResolver::new(table.column_names()).resolve(&remap.column)?;
        table.remap_column(index, &remap.pairs);
    }
    if let Some(classify) = &params.classify {
        apply_classification(&mut table, classify)?;
    }
    if let Some(filter) = &params.filter {
        let index = ColumnResolver::new(table.column_names()).resolve(&filter.column)?;
        table.retain_matching(index, &filter.value);
    }

    let resolver = ColumnResolver::new(table.column_names());
    let date_index = resolver.resolve(&params.date_column)?;
    let date_cells = table.column(date_index);
    let outcome = dates::resolve_dates(&date_cells);
    info!(
        "date column '{}' resolved via '{}': {} valid / {} invalid",
        params.date_column, outcome.strategy, outcome.valid, outcome.invalid
    );
    if outcome.invalid * 2 > table.row_count() {
        return Err(QueryError::DateParseFailure {
            valid: outcome.valid,
            invalid: outcome.invalid,
            samples: dates::invalid_samples(&date_cells, &outcome.dates, 5),
        });
    }

    let reference = params
        .reference_date
        .unwrap_or_else(|| Local::now().date_naive());
    let window = fiscal::last_completed_quarter(reference);

    let aggregated = aggregate::aggregate(
        &table,
        &outcome.dates,
        &window,
        &params.group_by,
        &params.category_column,
        &params.metric_column,
        &params.category_prefix,
        params.top_n,
    )?;
    info!(
        "aggregated {} group(s) in window {} .. {}",
        aggregated.rows.len(),
        window.start,
        window.end
    );

    Ok(QueryResponse {
        rows: aggregated.rows,
        window,
        diagnostics: Diagnostics {
            total_rows: table.row_count(),
            valid_date_rows: outcome.valid,
            invalid_date_rows: outcome.invalid,
            skipped_metric_cells: aggregated.skipped_metric_cells,
            header_row_used: skip_rows,
            auto_detected,
            date_strategy: outcome.strategy.to_string(),
        },
    })
}

fn apply_classification(table: &mut Table, rule: &ClassifyRule) -> Result<(), QueryError> {
    let source = ColumnResolver::new(table.column_names()).resolve(&rule.source_column)?;
    let labels: Vec<Option<Cell>> = (0..table.row_count())
        .map(|row| {
            let label = match table.cell(row, source) {
                Some(Cell::Text(value)) if value.contains(&rule.needle) => &rule.match_label,
                _ => &rule.else_label,
            };
            Some(Cell::Text(label.clone()))
        })
        .collect();
    table.push_column(&rule.target_column, labels);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
SO Description,Factory,PPC Delivery Period,Due Date,Total Bag Bal
LGD solitaire ring,North,Due,15/01/2025,4
Classic mined band,North,Overdue,20/02/2025,6
LGD eternity band,South,Due,25/03/2025,8
LGD halo pendant,South,2 Weeks,28/01/2025,2
";

    fn params() -> QueryParams {
        let mut params = QueryParams::new(
            "Due Date",
            vec!["Factory".to_string()],
            "PPC Delivery Period",
            "Total Bag Bal",
        );
        params.reference_date = NaiveDate::from_ymd_opt(2025, 5, 15);
        params
    }

    #[test]
    fn classification_and_filter_restrict_rows() {
        let mut params = params();
        params.classify = Some(ClassifyRule {
            target_column: "Order Type".to_string(),
            source_column: "SO Description".to_string(),
            needle: "LGD".to_string(),
            match_label: "LGD".to_string(),
            else_label: "Mined".to_string(),
        });
        params.filter = Some(RowFilter {
            column: "Order Type".to_string(),
            value: "LGD".to_string(),
        });

        let response = run_query(CSV.as_bytes(), FileKind::Csv, &params).expect("query");
        assert_eq!(response.diagnostics.total_rows, 3);
        assert!(
            response
                .rows
                .iter()
                .all(|row| row.category != "Overdue")
        );
    }

    #[test]
    fn remap_rewrites_group_values_before_aggregation() {
        let mut params = params();
        params.remap = Some(RemapRule {
            column: "Factory".to_string(),
            pairs: vec![("South".to_string(), "South-East".to_string())],
        });
        let response = run_query(CSV.as_bytes(), FileKind::Csv, &params).expect("query");
        assert!(response.rows.iter().any(|row| row.keys[0] == "South-East"));
        assert!(response.rows.iter().all(|row| row.keys[0] != "South"));
    }

    #[test]
    fn explicit_skip_rows_disables_auto_detection() {
        let mut params = params();
        params.skip_rows = Some(0);
        let response = run_query(CSV.as_bytes(), FileKind::Csv, &params).expect("query");
        assert!(!response.diagnostics.auto_detected);
        assert_eq!(response.diagnostics.header_row_used, 0);
    }
}
