//! Ingestion of warehouse receiving documents.
//!
//! Two document families are turned into canonical line items:
//! vendor delivery notes ("remitos") printed to PDF, and inventory
//! spreadsheet exports in either a native workbook container or the legacy
//! XML Spreadsheet markup. Every call is a pure function of its input buffer.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod remito;
pub mod sheet;

pub use aggregate::{ExtractedItem, ItemAggregator};
pub use config::{IngestConfig, LayoutProfile};
pub use error::{IngestError, Result};
pub use remito::PageText;
pub use sheet::{SheetItem, SpreadsheetIngest};

/// Items of a delivery-note PDF, duplicates summed, in first-seen order.
pub fn ingest_remito(pdf_bytes: &[u8], cfg: &IngestConfig) -> Result<Vec<ExtractedItem>> {
    remito::extract_items(pdf_bytes, cfg)
}

/// Items and inventory id of a spreadsheet export, container auto-detected.
pub fn ingest_spreadsheet(bytes: &[u8], cfg: &IngestConfig) -> Result<SpreadsheetIngest> {
    sheet::extract_items(bytes, cfg)
}

/// Reconstructed text lines of a delivery-note PDF, page by page.
pub fn reconstruct_remito_lines(pdf_bytes: &[u8], cfg: &IngestConfig) -> Result<Vec<PageText>> {
    remito::layout_pages(pdf_bytes, cfg)
}
