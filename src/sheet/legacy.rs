//! Legacy "XML Spreadsheet 2003" exports (SpreadsheetML markup saved with an
//! .xls extension), read with quick-xml.

use super::RowSource;
use crate::error::{IngestError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use tracing::debug;

pub struct LegacyMarkupSource {
    sheet_hint: String,
}

impl LegacyMarkupSource {
    pub fn new(sheet_hint: impl Into<String>) -> Self {
        Self {
            sheet_hint: sheet_hint.into().to_lowercase(),
        }
    }
}

/// Position of the cell being read and its accumulated text.
struct OpenCell {
    column: usize,
    span: usize,
    text: String,
}

impl RowSource for LegacyMarkupSource {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<Vec<String>>> {
        let text = decode_input(bytes);
        let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));

        let mut found = false;
        let mut in_sheet = false;
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut row: Option<Vec<String>> = None;
        let mut next_column = 0usize;
        let mut cell: Option<OpenCell> = None;
        let mut in_data = false;

        loop {
            let event = reader.read_event().map_err(|e| {
                IngestError::MalformedContainer(format!(
                    "invalid markup at byte {}: {e}",
                    reader.buffer_position()
                ))
            })?;
            match event {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"Worksheet" if !found => {
                        let name = attribute(&e, b"Name").unwrap_or_default();
                        if name.to_lowercase().contains(&self.sheet_hint) {
                            debug!(sheet = %name, "Matched worksheet");
                            found = true;
                            in_sheet = true;
                        }
                    }
                    b"Row" if in_sheet => {
                        if let Some(index) = index_attribute(&e) {
                            while rows.len() + 1 < index {
                                rows.push(Vec::new());
                            }
                        }
                        row = Some(Vec::new());
                        next_column = 0;
                    }
                    b"Cell" if row.is_some() => {
                        cell = Some(open_cell(&e, next_column));
                    }
                    b"Data" if cell.is_some() => in_data = true,
                    _ => {}
                },
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"Cell" && row.is_some() {
                        let open = open_cell(&e, next_column);
                        next_column = open.column + open.span;
                    } else if e.local_name().as_ref() == b"Row" && in_sheet {
                        rows.push(Vec::new());
                    }
                }
                Event::Text(t) if in_data => {
                    if let Some(open) = cell.as_mut() {
                        let chunk = t
                            .unescape()
                            .map(Cow::into_owned)
                            .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                        open.text.push_str(&chunk);
                    }
                }
                Event::CData(c) if in_data => {
                    if let Some(open) = cell.as_mut() {
                        open.text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"Data" => in_data = false,
                    b"Cell" => {
                        if let (Some(open), Some(cells)) = (cell.take(), row.as_mut()) {
                            if cells.len() <= open.column {
                                cells.resize(open.column + 1, String::new());
                            }
                            cells[open.column] = open.text.trim().to_string();
                            next_column = open.column + open.span;
                        }
                    }
                    b"Row" => {
                        if let Some(cells) = row.take() {
                            rows.push(cells);
                        }
                    }
                    b"Worksheet" if in_sheet => break,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !found {
            return Err(IngestError::MalformedContainer(format!(
                "no worksheet named like '{}'",
                self.sheet_hint
            )));
        }
        debug!(rows = rows.len(), "Legacy worksheet rows read");
        Ok(rows)
    }
}

/// Exports are usually UTF-8; older ones are Latin-1.
fn decode_input(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| {
            std::str::from_utf8(&a.value)
                .ok()
                .and_then(|v| quick_xml::escape::unescape(v).ok().map(Cow::into_owned))
        })
}

/// `ss:Index` is 1-based.
fn index_attribute(e: &BytesStart<'_>) -> Option<usize> {
    attribute(e, b"Index")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&i| i >= 1)
}

fn open_cell(e: &BytesStart<'_>, next_column: usize) -> OpenCell {
    let column = index_attribute(e).map_or(next_column, |i| i - 1);
    let merge_across = attribute(e, b"MergeAcross")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    OpenCell {
        column,
        span: merge_across + 1,
        text: String::new(),
    }
}
