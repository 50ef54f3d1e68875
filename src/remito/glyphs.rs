//! Positioned text runs, rendered through pdf-extract.
//!
//! pdf-extract walks each page's content streams and resolves every glyph
//! through its font (simple encodings, Identity-H composite fonts, ToUnicode
//! maps and width tables). Each shown string arrives as one
//! `begin_word`/`end_word` group and becomes one [`PositionedRun`] at the
//! device-space origin of its first glyph.

use pdf_extract::{Document, MediaBox, OutputDev, OutputError, Transform};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// A run of text at a position on one page. Y grows upward.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedRun {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub width: f64,
}

/// The runs of one page, in content-stream order.
#[derive(Debug, Clone)]
pub struct PageGlyphs {
    pub number: u32,
    pub runs: Vec<PositionedRun>,
}

/// Read positioned runs for every page of a loaded document.
///
/// Rendering that fails or panics part-way (broken font programs are the
/// usual cause) is logged; pages completed before that point are kept.
pub fn read_pages(doc: &Document) -> Vec<PageGlyphs> {
    let mut collector = RunCollector::default();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::output_doc(doc, &mut collector)
    }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(error = %e, pages = collector.pages.len(), "Text rendering stopped early");
        }
        Err(_) => {
            warn!(pages = collector.pages.len(), "Text rendering panicked, keeping pages read so far");
        }
    }
    collector.finish()
}

#[derive(Default)]
struct RunCollector {
    pages: Vec<PageGlyphs>,
    page: Option<PageGlyphs>,
    run: Option<PositionedRun>,
}

impl RunCollector {
    fn flush_run(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        if run.text.trim().is_empty() {
            return;
        }
        if let Some(page) = self.page.as_mut() {
            page.runs.push(run);
        }
    }

    fn flush_page(&mut self) {
        self.flush_run();
        if let Some(page) = self.page.take() {
            debug!(page = page.number, runs = page.runs.len(), "Read page runs");
            self.pages.push(page);
        }
    }

    fn finish(mut self) -> Vec<PageGlyphs> {
        self.flush_page();
        self.pages
    }
}

impl OutputDev for RunCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.flush_page();
        self.page = Some(PageGlyphs {
            number: page_num,
            runs: Vec::new(),
        });
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        self.flush_page();
        Ok(())
    }

    /// `trm` is the text rendering matrix without the font size; `width` is
    /// the glyph advance in text space (thousandths already divided out).
    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> Result<(), OutputError> {
        if char.is_empty() {
            return Ok(());
        }
        let (x, y) = (trm.m31, trm.m32);
        let advance = width * font_size * trm.m11.hypot(trm.m12);

        match self.run.as_mut() {
            Some(run) => {
                run.text.push_str(char);
                run.width = run.width.max(x + advance - run.x);
            }
            None => {
                self.run = Some(PositionedRun {
                    x,
                    y,
                    text: char.to_string(),
                    width: advance.max(0.0),
                });
            }
        }
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        self.flush_run();
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        self.flush_run();
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}
