//! Grouped, ranked aggregation over a windowed table.
//!
//! Every step is a pure transform over the materialized table: window filter,
//! group-by, metric sum, category-ordered sort, optional per-bucket top-N.
//! Running the same inputs twice yields identical ordered output.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    category,
    columns::ColumnResolver,
    error::QueryError,
    fiscal::QuarterWindow,
    table::Table,
};

/// One output row: the group-key tuple, its category bucket, and the summed
/// metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub keys: Vec<String>,
    pub category: String,
    pub total: f64,
}

/// Aggregation result plus the count of metric cells that contributed zero
/// because they were missing or non-numeric.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub rows: Vec<AggregateRow>,
    pub skipped_metric_cells: usize,
}

/// Filters `table` to rows whose resolved date falls inside `window`, groups
/// by `(group_columns.., category_column)`, sums `metric_column`, and orders
/// the result by category position then total descending. Ties keep
/// first-encounter order. `top_n` truncates within each category bucket,
/// never globally.
///
/// `dates` must be the resolved date column for this table, one entry per
/// row; rows with no resolved date never match the window.
pub fn aggregate(
    table: &Table,
    dates: &[Option<NaiveDate>],
    window: &QuarterWindow,
    group_columns: &[String],
    category_column: &str,
    metric_column: &str,
    priority_labels: &[String],
    top_n: Option<usize>,
) -> Result<AggregateOutcome, QueryError> {
    let resolver = ColumnResolver::new(table.column_names());

    let group_indices = group_columns
        .iter()
        .map(|column| {
            resolver
                .resolve(column)
                .map_err(|_| QueryError::UnknownGroupColumn {
                    column: column.clone(),
                    available: resolver.names().to_vec(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let category_index = resolver.resolve(category_column)?;
    let metric_index =
        resolver
            .resolve(metric_column)
            .map_err(|_| QueryError::MetricColumnMissing {
                column: metric_column.to_string(),
                available: resolver.names().to_vec(),
            })?;

    // Group accumulation preserves first-encounter order so that sort ties
    // stay deterministic.
    let mut groups: Vec<AggregateRow> = Vec::new();
    let mut positions: HashMap<(Vec<String>, String), usize> = HashMap::new();
    let mut observed_categories: Vec<String> = Vec::new();
    let mut skipped_metric_cells = 0usize;

    for row in 0..table.row_count() {
        let Some(date) = dates.get(row).copied().flatten() else {
            continue;
        };
        if !window.contains(date) {
            continue;
        }
        // Rows with an absent group or category value cannot form a key.
        let Some(category) = table.cell(row, category_index).map(|c| c.as_display()) else {
            continue;
        };
        let mut keys = Vec::with_capacity(group_indices.len());
        let mut complete = true;
        for &index in &group_indices {
            match table.cell(row, index) {
                Some(cell) => keys.push(cell.as_display()),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if !complete {
            continue;
        }

        let metric = match table.cell(row, metric_index).and_then(|c| c.as_number()) {
            Some(value) => value,
            None => {
                skipped_metric_cells += 1;
                0.0
            }
        };

        if !observed_categories.contains(&category) {
            observed_categories.push(category.clone());
        }
        let key = (keys, category);
        match positions.get(&key) {
            Some(&at) => groups[at].total += metric,
            None => {
                positions.insert(key.clone(), groups.len());
                let (keys, category) = key;
                groups.push(AggregateRow {
                    keys,
                    category,
                    total: metric,
                });
            }
        }
    }

    let order = category::build_order(&observed_categories, priority_labels);
    let rank: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(position, label)| (label.as_str(), position))
        .collect();

    groups.sort_by(|a, b| {
        let left = rank.get(a.category.as_str()).copied().unwrap_or(usize::MAX);
        let right = rank.get(b.category.as_str()).copied().unwrap_or(usize::MAX);
        left.cmp(&right)
            .then_with(|| b.total.total_cmp(&a.total))
        // Equal keys fall through to the stable sort's original order.
    });

    if let Some(limit) = top_n {
        let mut per_bucket: HashMap<String, usize> = HashMap::new();
        groups.retain(|row| {
            let count = per_bucket.entry(row.category.clone()).or_insert(0);
            *count += 1;
            *count <= limit
        });
    }

    Ok(AggregateOutcome {
        rows: groups,
        skipped_metric_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::FileKind;

    const CSV: &str = "\
Factory,Dsg Ctg,PPC Delivery Period,Due Date,Total Bag Bal
North,Solitaire,Due,2025-01-10,5
North,Eternity,Overdue,2025-02-01,9
South,Solitaire,Due,2025-03-05,12
South,Band,2 Weeks,2025-01-20,3
North,Band,5 Weeks,2025-02-14,7
East,Halo,Due,2025-06-01,99
West,Halo,Due,2025-02-02,not-a-number
";

    fn fixture() -> (Table, Vec<Option<NaiveDate>>, QuarterWindow) {
        let table = Table::parse(CSV.as_bytes(), FileKind::Csv, 0).expect("parse fixture");
        let resolver = ColumnResolver::new(table.column_names());
        let date_index = resolver.resolve("Due Date").expect("date column");
        let outcome = crate::dates::resolve_dates(&table.column(date_index));
        let window = crate::fiscal::last_completed_quarter(
            NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
        );
        (table, outcome.dates, window)
    }

    fn run(top_n: Option<usize>) -> AggregateOutcome {
        let (table, dates, window) = fixture();
        aggregate(
            &table,
            &dates,
            &window,
            &["Factory".to_string()],
            "PPC Delivery Period",
            "Total Bag Bal",
            &["Overdue".to_string(), "Due".to_string()],
            top_n,
        )
        .expect("aggregate")
    }

    #[test]
    fn orders_by_category_then_total_descending() {
        let outcome = run(None);
        let flat: Vec<(String, String, f64)> = outcome
            .rows
            .iter()
            .map(|r| (r.keys[0].clone(), r.category.clone(), r.total))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("North".to_string(), "Overdue".to_string(), 9.0),
                ("South".to_string(), "Due".to_string(), 12.0),
                ("North".to_string(), "Due".to_string(), 5.0),
                ("West".to_string(), "Due".to_string(), 0.0),
                ("North".to_string(), "5 Weeks".to_string(), 7.0),
                ("South".to_string(), "2 Weeks".to_string(), 3.0),
            ]
        );
    }

    #[test]
    fn rows_outside_window_are_excluded() {
        let outcome = run(None);
        assert!(outcome.rows.iter().all(|r| r.keys[0] != "East"));
    }

    #[test]
    fn non_numeric_metric_contributes_zero_and_is_counted() {
        let outcome = run(None);
        assert_eq!(outcome.skipped_metric_cells, 1);
        let west = outcome
            .rows
            .iter()
            .find(|r| r.keys[0] == "West")
            .expect("west row present");
        assert_eq!(west.total, 0.0);
    }

    #[test]
    fn top_n_truncates_per_bucket_not_globally() {
        let outcome = run(Some(2));
        let due: Vec<&AggregateRow> = outcome
            .rows
            .iter()
            .filter(|r| r.category == "Due")
            .collect();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].keys[0], "South");
        assert_eq!(due[1].keys[0], "North");
        // Other buckets keep their single rows.
        assert!(outcome.rows.iter().any(|r| r.category == "Overdue"));
        assert!(outcome.rows.iter().any(|r| r.category == "5 Weeks"));
    }

    #[test]
    fn aggregate_is_deterministic() {
        let first = run(None);
        let second = run(None);
        assert_eq!(first.rows, second.rows);
    }

    #[test]
    fn unknown_group_column_is_reported() {
        let (table, dates, window) = fixture();
        let err = aggregate(
            &table,
            &dates,
            &window,
            &["Planet".to_string()],
            "PPC Delivery Period",
            "Total Bag Bal",
            &[],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::UnknownGroupColumn { .. }));
    }

    #[test]
    fn missing_metric_column_is_reported() {
        let (table, dates, window) = fixture();
        let err = aggregate(
            &table,
            &dates,
            &window,
            &["Factory".to_string()],
            "PPC Delivery Period",
            "CastBal",
            &[],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::MetricColumnMissing { .. }));
    }
}
