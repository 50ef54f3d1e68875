//! Workbooks in a real spreadsheet container (xlsx zip package or binary
//! xls), read with calamine.

use super::RowSource;
use crate::error::{IngestError, Result};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use tracing::{debug, info};

pub struct NativeTableSource {
    sheet_hint: String,
}

impl NativeTableSource {
    pub fn new(sheet_hint: impl Into<String>) -> Self {
        Self {
            sheet_hint: sheet_hint.into().to_lowercase(),
        }
    }
}

impl RowSource for NativeTableSource {
    fn name(&self) -> &'static str {
        "native"
    }

    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<Vec<String>>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| IngestError::MalformedContainer(format!("failed to open workbook: {e}")))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let sheet = sheet_names
            .iter()
            .find(|name| name.to_lowercase().contains(&self.sheet_hint))
            .or_else(|| sheet_names.first())
            .cloned()
            .ok_or_else(|| IngestError::MalformedContainer("workbook has no sheets".into()))?;
        info!(sheet = %sheet, available = sheet_names.len(), "Reading worksheet");

        let range = workbook.worksheet_range(&sheet).map_err(|e| {
            IngestError::MalformedContainer(format!("failed to read sheet {sheet}: {e}"))
        })?;

        // calamine ranges start at the first used cell; pad back to A1 so
        // positional column defaults still line up
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_offset];
        rows.extend(range.rows().map(|row| {
            std::iter::repeat_n(String::new(), col_offset)
                .chain(row.iter().map(cell_to_string))
                .collect()
        }));
        debug!(rows = rows.len(), "Worksheet rows read");
        Ok(rows)
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{f:.0}")
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{e:?}"),
    }
}
