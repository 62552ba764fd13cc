//! Delivery-period style category ordering.
//!
//! The order is built from observed labels only: fixed priority labels come
//! first (in their canonical order, and only when present in the data),
//! followed by the remaining labels sorted descending by their leading
//! numeric token ("5 Weeks" before "2 Weeks"). Labels without a leading
//! number sort last, stably, in encounter order.

use std::sync::OnceLock;

use itertools::Itertools;
use regex::Regex;

/// Canonical priority labels for delivery-period buckets.
pub const DEFAULT_PRIORITY_LABELS: &[&str] = &["Overdue", "Due"];

/// Builds a total order over `observed` labels. Duplicate observations are
/// collapsed to their first occurrence; no label absent from `observed` is
/// ever fabricated.
pub fn build_order(observed: &[String], priority: &[String]) -> Vec<String> {
    let seen: Vec<&String> = observed.iter().unique().collect();

    let mut order: Vec<String> = priority
        .iter()
        .filter(|p| seen.iter().any(|s| *s == *p))
        .cloned()
        .collect();

    let mut remainder: Vec<&String> = seen
        .into_iter()
        .filter(|label| !priority.contains(label))
        .collect();
    remainder.sort_by(|a, b| match (leading_number(a), leading_number(b)) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal, // stable: encounter order
    });

    order.extend(remainder.into_iter().cloned());
    order
}

fn leading_number(label: &str) -> Option<u64> {
    let pattern = leading_number_pattern();
    pattern
        .captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn leading_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*(\d+)").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn priority() -> Vec<String> {
        DEFAULT_PRIORITY_LABELS
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    #[test]
    fn priority_first_then_weeks_descending() {
        let observed = labels(&["Due", "5 Weeks", "Overdue", "2 Weeks"]);
        let order = build_order(&observed, &priority());
        assert_eq!(order, labels(&["Overdue", "Due", "5 Weeks", "2 Weeks"]));
    }

    #[test]
    fn absent_priority_labels_are_not_fabricated() {
        let observed = labels(&["3 Weeks", "Due", "10 Weeks"]);
        let order = build_order(&observed, &priority());
        assert_eq!(order, labels(&["Due", "10 Weeks", "3 Weeks"]));
    }

    #[test]
    fn non_numeric_labels_sort_last_in_encounter_order() {
        let observed = labels(&["Pending", "4 Weeks", "Unknown", "1 Week"]);
        let order = build_order(&observed, &priority());
        assert_eq!(order, labels(&["4 Weeks", "1 Week", "Pending", "Unknown"]));
    }

    #[test]
    fn duplicates_collapse_to_one_entry() {
        let observed = labels(&["Due", "2 Weeks", "Due", "2 Weeks", "Overdue"]);
        let order = build_order(&observed, &priority());
        assert_eq!(order, labels(&["Overdue", "Due", "2 Weeks"]));
    }

    #[test]
    fn numeric_sort_is_by_value_not_lexicographic() {
        let observed = labels(&["9 Weeks", "12 Weeks", "2 Weeks"]);
        let order = build_order(&observed, &priority());
        assert_eq!(order, labels(&["12 Weeks", "9 Weeks", "2 Weeks"]));
    }
}
