use std::collections::HashMap;

use crate::error::QueryError;

/// Case-folded, whitespace-trimmed column lookup built once per table.
///
/// Downstream code resolves every requested column through this map exactly
/// once and then works with validated indices, never repeated string
/// comparisons. Matching is exact after folding — no fuzzy or partial
/// matching.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    lookup: HashMap<String, usize>,
    names: Vec<String>,
}

impl ColumnResolver {
    pub fn new(names: &[String]) -> Self {
        let mut lookup = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            // First occurrence wins; table construction already deduplicates.
            lookup.entry(fold(name)).or_insert(index);
        }
        Self {
            lookup,
            names: names.to_vec(),
        }
    }

    pub fn resolve(&self, requested: &str) -> Result<usize, QueryError> {
        self.lookup
            .get(&fold(requested))
            .copied()
            .ok_or_else(|| QueryError::ColumnNotFound {
                requested: requested.to_string(),
                available: self.names.clone(),
            })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}
