//! Column header metadata for table rendering.

use serde::{Deserialize, Serialize};

use crate::utils::{add_spaces_to_word, capitalize};

/// Initial sort direction when a column is first selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One renderable table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderDescriptor {
    pub label: String,
    /// Row field key the column reads from
    pub data: String,
    pub default_sort: SortDirection,
}

impl HeaderDescriptor {
    /// Build the descriptor for a row field key.
    pub fn for_field(key: &str) -> Self {
        let default_sort = match key {
            "state" | "date" => SortDirection::Asc,
            _ => SortDirection::Desc,
        };

        let label = match key {
            "death" => "Deaths".to_string(),
            "totalTestResults" => "Total Tested".to_string(),
            "posPercentage" => "Pos/Total (%)".to_string(),
            "deathPercentage" => "Death/Pos (%)".to_string(),
            _ => add_spaces_to_word(&capitalize(key)),
        };

        Self {
            label,
            data: key.to_string(),
            default_sort,
        }
    }
}

/// Descriptors for every field not in `excluded`, preserving field order.
pub fn build_headers(fields: &[&str], excluded: &[&str]) -> Vec<HeaderDescriptor> {
    fields
        .iter()
        .filter(|field| !excluded.contains(field))
        .map(|field| HeaderDescriptor::for_field(field))
        .collect()
}
