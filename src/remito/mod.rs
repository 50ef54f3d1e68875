// src/remito/mod.rs

pub mod glyphs;
pub mod items;
pub mod lines;

use crate::aggregate::{ExtractedItem, ItemAggregator};
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use glyphs::PageGlyphs;
use items::LineItemExtractor;
use lines::{LineReconstructor, PageLayout, ReconstructedLine};
use pdf_extract::Document;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, info, warn};

/// Reconstructed lines of one page, for diagnostics.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub lines: Vec<ReconstructedLine>,
    pub stop_marker: Option<String>,
}

/// Main entry point: raw delivery-note PDF bytes to aggregated items.
///
/// Content at or after a duplicate-copy marker is never read, so a
/// duplicate copy yields an empty (or truncated) list rather than an error.
pub fn extract_items(pdf_bytes: &[u8], cfg: &IngestConfig) -> Result<Vec<ExtractedItem>> {
    let extractor = LineItemExtractor::new(cfg)?;
    let pages = layout_pages(pdf_bytes, cfg)?;

    let mut aggregator = ItemAggregator::new();
    for page in &pages {
        let page_items = extractor.extract_page(page.lines.iter().map(|l| l.text.as_str()));
        debug!(page = page.number, items = page_items.len(), "Page extracted");
        aggregator.extend(page_items);
        if let Some(marker) = &page.stop_marker {
            info!(page = page.number, marker = %marker, "Duplicate copy marker, stopping");
            break;
        }
    }

    if aggregator.is_empty() {
        info!(pages = pages.len(), "No line items recognised");
    } else {
        info!(pages = pages.len(), items = aggregator.len(), "Remito extraction complete");
    }
    Ok(aggregator.into_items())
}

/// Reconstructed text lines per page, ending at the first stop marker.
pub fn layout_pages(pdf_bytes: &[u8], cfg: &IngestConfig) -> Result<Vec<PageText>> {
    let doc = Document::load_mem(pdf_bytes).map_err(|e| IngestError::Pdf(e.to_string()))?;

    if looks_like_scanned(&doc) {
        warn!("PDF looks scanned / image-only, expect few or no items");
    }

    let reconstructor = LineReconstructor::new(cfg.layout, &cfg.stop_markers);
    let mut pages = Vec::new();
    for PageGlyphs { number, runs } in glyphs::read_pages(&doc) {
        let PageLayout { lines, stop_marker } = reconstructor.reconstruct(&runs);
        let stop = stop_marker.is_some();
        pages.push(PageText {
            number,
            lines,
            stop_marker,
        });
        if stop {
            return Ok(pages);
        }
    }

    let has_text = pages
        .iter()
        .any(|p| p.lines.iter().any(|l| !l.text.trim().is_empty()));
    if !has_text {
        info!("No positioned text found, falling back to plain-text extraction");
        return Ok(plain_text_pages(pdf_bytes, &reconstructor));
    }

    Ok(pages)
}

/// Whole-document text from lopdf's own extractor, treated as one page.
/// Any failure here only costs the fallback.
fn plain_text_pages(pdf_bytes: &[u8], reconstructor: &LineReconstructor<'_>) -> Vec<PageText> {
    let outcome = catch_unwind(AssertUnwindSafe(|| -> lopdf::Result<String> {
        let doc = lopdf::Document::load_mem(pdf_bytes)?;
        let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        doc.extract_text(&numbers)
    }));
    match outcome {
        Ok(Ok(text)) => vec![text_page(&text, reconstructor)],
        Ok(Err(e)) => {
            warn!(error = %e, "Plain-text extraction failed, no text recovered");
            Vec::new()
        }
        Err(_) => {
            warn!("Plain-text extraction panicked, no text recovered");
            Vec::new()
        }
    }
}

/// Split free text into lines, ending at the first stop marker.
fn text_page(text: &str, reconstructor: &LineReconstructor<'_>) -> PageText {
    let mut page = PageText {
        number: 1,
        lines: Vec::new(),
        stop_marker: None,
    };
    for raw in text.lines() {
        if let Some(marker) = reconstructor.find_marker(raw) {
            page.stop_marker = Some(marker);
            break;
        }
        if !raw.trim().is_empty() {
            page.lines.push(ReconstructedLine {
                text: raw.to_string(),
                y: 0.0,
            });
        }
    }
    page
}

/// True when most pages draw images but declare no fonts, which is what a
/// scanner or a fax-to-PDF gateway produces.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let image_only = pages
        .values()
        .filter(|id| {
            let Some(page) = doc.get_object(**id).ok().and_then(|o| o.as_dict().ok()) else {
                return false;
            };
            let resources = page
                .get(b"Resources")
                .ok()
                .and_then(|r| doc.dereference(r).ok())
                .and_then(|(_, resolved)| resolved.as_dict().ok());
            let declares = |key: &[u8]| {
                resources
                    .and_then(|res| res.get(key).ok())
                    .and_then(|entry| doc.dereference(entry).ok())
                    .and_then(|(_, resolved)| resolved.as_dict().ok())
                    .is_some_and(|dict| !dict.is_empty())
            };
            declares(b"XObject") && !declares(b"Font")
        })
        .count();

    debug!(pages = pages.len(), image_only, "Scanned-page check");
    image_only * 5 >= pages.len() * 4
}

#[cfg(test)]
mod tests {
    use super::glyphs::tests::{build_pdf, courier, glyph_codes, identity_h, placed};
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{Object, Stream, dictionary};

    /// Courier text, one `(x, y, text)` per run and one page per inner vec.
    fn text_pdf(pages: &[Vec<(i64, i64, &str)>]) -> Vec<u8> {
        let pages = pages
            .iter()
            .map(|runs| {
                let runs: Vec<(i64, i64, Object)> = runs
                    .iter()
                    .map(|(x, y, text)| (*x, *y, Object::string_literal(*text)))
                    .collect();
                placed(&runs)
            })
            .collect();
        build_pdf(courier, pages)
    }

    /// One page that only paints a 1x1 grey image.
    fn image_only_pdf() -> Vec<u8> {
        build_pdf(
            |doc| {
                let image = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => 1,
                        "Height" => 1,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    vec![0x80],
                ));
                dictionary! { "XObject" => dictionary! { "Im1" => image } }
            },
            vec![vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![100.into(), 0.into(), 0.into(), 100.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec!["Im1".into()]),
                Operation::new("Q", vec![]),
            ]],
        )
    }

    fn no_text(pages: &[PageText]) -> bool {
        pages
            .iter()
            .all(|p| p.lines.iter().all(|l| l.text.trim().is_empty()))
    }

    #[test]
    fn test_garbage_bytes() {
        let result = extract_items(b"this is not a pdf", &IngestConfig::default());
        assert!(matches!(result, Err(IngestError::Pdf(_))));
    }

    #[test]
    fn test_single_line_item_from_pdf() {
        let pdf = text_pdf(&[vec![(50, 700, "0123 PRODUCTO X 5,00 UN")]]);
        let items = extract_items(&pdf, &IngestConfig::default()).unwrap();
        assert_eq!(
            items,
            vec![ExtractedItem {
                code: "0123".into(),
                description: "PRODUCTO X".into(),
                quantity: 5.0,
            }]
        );
    }

    #[test]
    fn test_identity_h_font_yields_items() {
        let pdf = build_pdf(
            identity_h,
            vec![placed(&[
                (50, 700, glyph_codes("0123 PRODUCTO X 5,00 UN")),
                (50, 680, glyph_codes("0456 PRODUCTO Y 2,00 KG")),
            ])],
        );
        let items = extract_items(&pdf, &IngestConfig::default()).unwrap();
        let codes: Vec<&str> = items.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["0123", "0456"]);
        assert_eq!(items[1].quantity, 2.0);
    }

    #[test]
    fn test_columns_rebuilt_from_separate_runs() {
        let pdf = text_pdf(&[vec![
            (300, 700, "5,00"),
            (50, 701, "0123"),
            (100, 700, "PRODUCTO X"),
            (350, 699, "UN"),
        ]]);
        let pages = layout_pages(&pdf, &IngestConfig::default()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].lines.len(), 1);
        assert!(pages[0].lines[0].text.starts_with("0123"));

        let items = extract_items(&pdf, &IngestConfig::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5.0);
        assert_eq!(items[0].description, "PRODUCTO X");
    }

    #[test]
    fn test_split_item_resolved_and_aggregated_across_pages() {
        let pdf = text_pdf(&[
            vec![(50, 700, "TORNILLO 1000 / /"), (50, 680, "3,00 UN")],
            vec![(50, 700, "1000 TORNILLO 2,00 UN")],
        ]);
        let items = extract_items(&pdf, &IngestConfig::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].code, "1000");
        assert_eq!(items[0].description, "TORNILLO");
        assert_eq!(items[0].quantity, 5.0);
    }

    #[test]
    fn test_pending_items_do_not_cross_pages() {
        let pdf = text_pdf(&[
            vec![(50, 700, "PRODUCTO Y 0456 / /")],
            vec![(50, 700, "4,00 UN")],
        ]);
        let items = extract_items(&pdf, &IngestConfig::default()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_duplicate_marker_stops_whole_document() {
        let pdf = text_pdf(&[
            vec![(50, 700, "0123 PRODUCTO X 5,00 UN"), (50, 600, "DUPLICADO")],
            vec![(50, 700, "0456 PRODUCTO Y 1,00 UN")],
        ]);
        let items = extract_items(&pdf, &IngestConfig::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].code, "0123");

        let pages = layout_pages(&pdf, &IngestConfig::default()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].stop_marker.as_deref(), Some("DUPLICADO"));
    }

    #[test]
    fn test_marker_at_top_yields_nothing() {
        let pdf = text_pdf(&[vec![
            (50, 800, "REMITO TRIPLICADO"),
            (50, 700, "0123 PRODUCTO X 5,00 UN"),
        ]]);
        let items = extract_items(&pdf, &IngestConfig::default()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_repeated_runs_are_deterministic() {
        let pdf = text_pdf(&[vec![
            (50, 700, "0123 PRODUCTO X 5,00 UN"),
            (50, 680, "0456 PRODUCTO Y 2,50 KG"),
            (50, 660, "0123 PRODUCTO X 1,00 UN"),
        ]]);
        let cfg = IngestConfig::default();
        let first = extract_items(&pdf, &cfg).unwrap();
        let second = extract_items(&pdf, &cfg).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].quantity, 6.0);
    }

    #[test]
    fn test_image_only_page_looks_scanned() {
        let scanned = Document::load_mem(&image_only_pdf()).unwrap();
        assert!(looks_like_scanned(&scanned));

        let typed = Document::load_mem(&text_pdf(&[vec![(50, 700, "HOLA")]])).unwrap();
        assert!(!looks_like_scanned(&typed));
    }

    #[test]
    fn test_scanned_pdf_is_empty_not_an_error() {
        let pdf = image_only_pdf();
        let pages = layout_pages(&pdf, &IngestConfig::default()).unwrap();
        assert!(no_text(&pages));
        assert!(extract_items(&pdf, &IngestConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_textless_pdf_goes_through_fallback() {
        let pdf = build_pdf(courier, vec![vec![]]);
        let pages = layout_pages(&pdf, &IngestConfig::default()).unwrap();
        assert!(no_text(&pages));
        assert!(pages.iter().all(|p| p.stop_marker.is_none()));
    }

    #[test]
    fn test_fallback_text_stops_at_marker() {
        let cfg = IngestConfig::default();
        let reconstructor = LineReconstructor::new(cfg.layout, &cfg.stop_markers);
        let page = text_page(
            "0123 PRODUCTO X 5,00 UN\n\n   \nREMITO DUPLICADO\n0456 PRODUCTO Y 1,00 UN\n",
            &reconstructor,
        );
        let texts: Vec<&str> = page.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["0123 PRODUCTO X 5,00 UN"]);
        assert_eq!(page.stop_marker.as_deref(), Some("DUPLICADO"));
    }

    #[test]
    fn test_font_that_breaks_renderer_is_not_fatal() {
        // composite font whose descendant lacks the required FontDescriptor
        let pdf = build_pdf(
            |doc| {
                let descendant = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "CIDFontType2",
                    "BaseFont" => "Broken",
                    "CIDSystemInfo" => dictionary! {
                        "Registry" => Object::string_literal("Adobe"),
                        "Ordering" => Object::string_literal("Identity"),
                        "Supplement" => 0,
                    },
                });
                let font = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type0",
                    "BaseFont" => "Broken",
                    "Encoding" => "Identity-H",
                    "DescendantFonts" => vec![descendant.into()],
                });
                dictionary! { "Font" => dictionary! { "F1" => font } }
            },
            vec![placed(&[(50, 700, glyph_codes("0123 PRODUCTO X 5,00 UN"))])],
        );
        assert!(layout_pages(&pdf, &IngestConfig::default()).is_ok());
        assert!(extract_items(&pdf, &IngestConfig::default()).is_ok());
    }
}
