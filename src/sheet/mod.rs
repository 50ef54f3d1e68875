// src/sheet/mod.rs

mod header;
mod legacy;
mod native;

pub use header::{ColumnMap, HeaderLocation};
pub use legacy::LegacyMarkupSource;
pub use native::NativeTableSource;

use crate::aggregate::{ExtractedItem, ItemAggregator, parse_decimal};
use crate::config::IngestConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Something that can turn a spreadsheet buffer into rows of cell text.
pub trait RowSource {
    fn name(&self) -> &'static str;
    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<Vec<String>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// xlsx (zip package) or binary xls (OLE compound file).
    NativeTable,
    /// XML Spreadsheet 2003 markup.
    LegacyMarkup,
}

const ZIP_MAGIC: &[u8] = b"PK";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Decide the container from the leading bytes.
pub fn sniff(bytes: &[u8]) -> ContainerKind {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        ContainerKind::NativeTable
    } else {
        ContainerKind::LegacyMarkup
    }
}

pub fn source_for(kind: ContainerKind, cfg: &IngestConfig) -> Box<dyn RowSource> {
    match kind {
        ContainerKind::NativeTable => Box::new(NativeTableSource::new(&cfg.sheet_name_hint)),
        ContainerKind::LegacyMarkup => Box::new(LegacyMarkupSource::new(&cfg.sheet_name_hint)),
    }
}

/// A spreadsheet item as handed downstream. `barcode` is filled later by
/// catalog lookup and is always `None` here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetItem {
    pub code: String,
    pub description: String,
    pub quantity: f64,
    pub barcode: Option<String>,
}

impl From<ExtractedItem> for SheetItem {
    fn from(item: ExtractedItem) -> Self {
        Self {
            code: item.code,
            description: item.description,
            quantity: item.quantity,
            barcode: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetIngest {
    pub items: Vec<SheetItem>,
    pub inventory_id: Option<String>,
}

/// Main entry point for inventory spreadsheets.
pub fn extract_items(bytes: &[u8], cfg: &IngestConfig) -> Result<SpreadsheetIngest> {
    let kind = sniff(bytes);
    let source = source_for(kind, cfg);
    info!(container = source.name(), bytes = bytes.len(), "Reading spreadsheet");
    let rows = source.read_rows(bytes)?;
    Ok(extract_from_rows(&rows, cfg))
}

/// Locate the header and turn the rows below it into items.
pub fn extract_from_rows(rows: &[Vec<String>], cfg: &IngestConfig) -> SpreadsheetIngest {
    let header = header::locate(rows, cfg.header_scan_rows);
    if !header.found {
        warn!("No header row found, assuming positional columns");
    }
    debug!(row = header.row, columns = ?header.columns, "Header located");

    let columns = header.columns;
    let mut aggregator = ItemAggregator::new();
    let mut inventory_id: Option<String> = None;
    let mut skipped = 0usize;

    for row in rows.iter().skip(header.row + 1) {
        let cell = |idx: usize| row.get(idx).map(|c| c.trim()).unwrap_or("");
        let code = cell(columns.code);
        let description = cell(columns.description);
        if code.is_empty() || description.is_empty() {
            skipped += 1;
            continue;
        }

        if inventory_id.is_none() {
            let id = cell(columns.id);
            if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
                inventory_id = Some(id.to_string());
            }
        }

        aggregator.push(ExtractedItem {
            code: code.to_string(),
            description: description.to_string(),
            quantity: parse_decimal(cell(columns.quantity)).unwrap_or(0.0),
        });
    }

    info!(
        items = aggregator.len(),
        skipped,
        inventory_id = ?inventory_id,
        "Spreadsheet extraction complete"
    );
    SpreadsheetIngest {
        items: aggregator.into_items().into_iter().map(SheetItem::from).collect(),
        inventory_id,
    }
}
