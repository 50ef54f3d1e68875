//! Line-by-line item recognition for delivery-note text.
//!
//! Items come in two shapes. Most sit on one line: code, description,
//! quantity and unit. Some are split: a line carrying one or more codes
//! followed by a `/ /` placeholder, then later a line holding the matching
//! quantities, one per print column. The split shape needs state across
//! lines, which [`ExtractorState`] carries explicitly.

use crate::aggregate::{ExtractedItem, collapse_whitespace, normalize_code, parse_decimal};
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// A code seen on a marker line whose quantity has not shown up yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem {
    pub code: String,
    pub description_parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExtractorState {
    #[default]
    Scanning,
    /// Never empty.
    AwaitingQuantity(Vec<PendingItem>),
}

pub struct LineItemExtractor {
    single_line: Regex,
    code_marker: Regex,
    quantity_token: Regex,
    placeholder: Regex,
    long_digits: Regex,
    numeric_only: Regex,
    units: HashSet<String>,
    min_code_len: usize,
}

const DATE_ARTIFACT: &str = "/202";

impl LineItemExtractor {
    pub fn new(cfg: &IngestConfig) -> Result<Self> {
        let units: Vec<String> = cfg
            .units
            .iter()
            .map(|u| u.trim().to_uppercase())
            .filter(|u| !u.is_empty())
            .collect();
        if units.is_empty() {
            return Err(IngestError::Config("units must not be empty".into()));
        }
        let alternation = units
            .iter()
            .map(|u| regex::escape(u))
            .collect::<Vec<_>>()
            .join("|");
        let min = cfg.min_code_len;

        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| IngestError::Config(format!("bad pattern: {e}")))
        };

        Ok(Self {
            single_line: compile(&format!(
                r"\b(\d{{{min},}})\s+(.+?)\s+(\d+,\d+)\s+(?i:{alternation})\b"
            ))?,
            code_marker: compile(&format!(r"(.*?)\b(\d{{{min},}})\s*/\s*/"))?,
            quantity_token: compile(r"^(\d+,\d+)(.*)$")?,
            placeholder: compile(r"/\s*/")?,
            long_digits: compile(r"\d{6,}")?,
            numeric_only: compile(r"^[\d\s.,]+$")?,
            units: units.into_iter().collect(),
            min_code_len: min,
        })
    }

    /// Run one page worth of lines from a fresh state. Codes still waiting
    /// for a quantity when the page ends are dropped.
    pub fn extract_page<'l>(
        &self,
        lines: impl IntoIterator<Item = &'l str>,
    ) -> Vec<ExtractedItem> {
        let mut items = Vec::new();
        let mut state = ExtractorState::Scanning;
        for line in lines {
            state = self.step(state, line, &mut items);
        }
        if let ExtractorState::AwaitingQuantity(pending) = state {
            let codes: Vec<&str> = pending.iter().map(|p| p.code.as_str()).collect();
            debug!(codes = ?codes, "Dropping unresolved items at page end");
        }
        items
    }

    /// Feed one line. Recognized items are pushed onto `emit`.
    pub fn step(
        &self,
        state: ExtractorState,
        line: &str,
        emit: &mut Vec<ExtractedItem>,
    ) -> ExtractorState {
        let singles = self.single_line_items(line);
        if !singles.is_empty() {
            debug!(count = singles.len(), line = %line.trim(), "Single-line items");
            emit.extend(singles);
            return ExtractorState::Scanning;
        }

        let markers = self.code_markers(line);
        if !markers.is_empty() {
            debug!(count = markers.len(), line = %line.trim(), "Code marker line");
            return ExtractorState::AwaitingQuantity(markers);
        }

        let ExtractorState::AwaitingQuantity(mut pending) = state else {
            return ExtractorState::Scanning;
        };

        let quantities = self.quantities(line);
        if !quantities.is_empty() {
            let resolved = pending.len().min(quantities.len());
            for (item, quantity) in pending.drain(..resolved).zip(quantities) {
                emit.push(self.finish(item, quantity));
            }
            return if pending.is_empty() {
                ExtractorState::Scanning
            } else {
                ExtractorState::AwaitingQuantity(pending)
            };
        }

        if line.contains(DATE_ARTIFACT) {
            return ExtractorState::AwaitingQuantity(pending);
        }

        if self.is_continuation(line) {
            // wrapped text always belongs to the first open item
            if let Some(first) = pending.first_mut() {
                first.description_parts.push(line.trim().to_string());
            }
        }
        ExtractorState::AwaitingQuantity(pending)
    }

    fn single_line_items(&self, line: &str) -> Vec<ExtractedItem> {
        self.single_line
            .captures_iter(line)
            .filter_map(|cap| {
                let code = normalize_code(&cap[1], self.min_code_len)?;
                let quantity = parse_decimal(&cap[3])?;
                Some(ExtractedItem {
                    code,
                    description: self.clean_description(&cap[2]),
                    quantity,
                })
            })
            .collect()
    }

    fn code_markers(&self, line: &str) -> Vec<PendingItem> {
        self.code_marker
            .captures_iter(line)
            .filter_map(|cap| {
                let code = normalize_code(&cap[2], self.min_code_len)?;
                let leading = self.clean_description(&cap[1]);
                Some(PendingItem {
                    code,
                    description_parts: if leading.is_empty() {
                        Vec::new()
                    } else {
                        vec![leading]
                    },
                })
            })
            .collect()
    }

    /// Quantities on a line, left to right. A token counts when it starts
    /// with `digits,digits` and carries a unit itself or is followed by one.
    fn quantities(&self, line: &str) -> Vec<f64> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        tokens
            .iter()
            .enumerate()
            .filter_map(|(i, token)| {
                let cap = self.quantity_token.captures(token)?;
                let has_unit = self.is_unit(&cap[2])
                    || tokens.get(i + 1).is_some_and(|next| self.is_unit(next));
                if has_unit { parse_decimal(&cap[1]) } else { None }
            })
            .collect()
    }

    fn is_unit(&self, token: &str) -> bool {
        self.units.contains(&token.trim().to_uppercase())
    }

    fn is_continuation(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.chars().count() > 5
            && !self.numeric_only.is_match(trimmed)
            && !self.placeholder.is_match(trimmed)
    }

    fn finish(&self, item: PendingItem, quantity: f64) -> ExtractedItem {
        ExtractedItem {
            code: item.code,
            description: self.clean_description(&item.description_parts.join(" ")),
            quantity,
        }
    }

    /// Drop placeholder residue and leaked secondary codes, then tidy spacing.
    fn clean_description(&self, raw: &str) -> String {
        let without_placeholder = self.placeholder.replace_all(raw, " ");
        let without_codes = self.long_digits.replace_all(&without_placeholder, " ");
        collapse_whitespace(&without_codes)
    }
}
