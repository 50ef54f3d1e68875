// src/aggregate.rs

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};

/// One canonical line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub code: String,
    pub description: String,
    pub quantity: f64,
}

/// Merges items by code, keeping first-seen order.
///
/// Feeding the same item twice sums it twice: a repeated line is a physical
/// re-count, not a duplicate to be ignored.
#[derive(Debug, Default)]
pub struct ItemAggregator {
    items: IndexMap<String, ExtractedItem>,
}

impl ItemAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ExtractedItem) {
        match self.items.entry(item.code.clone()) {
            Entry::Occupied(mut slot) => {
                // first description wins
                slot.get_mut().quantity += item.quantity;
            }
            Entry::Vacant(slot) => {
                slot.insert(ExtractedItem {
                    description: collapse_whitespace(&item.description),
                    ..item
                });
            }
        }
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = ExtractedItem>) {
        for item in items {
            self.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<ExtractedItem> {
        self.items.into_values().collect()
    }
}

/// Collapse every whitespace run to one space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep only the digits of a code candidate; `None` when fewer than
/// `min_len` digits remain.
pub fn normalize_code(raw: &str, min_len: usize) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() >= min_len).then_some(digits)
}

/// Parse a decimal written with a comma separator (`12,50`). A dot used as
/// thousands grouping next to a decimal comma is dropped.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains(',') && trimmed.contains('.') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.replace(',', ".")
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
