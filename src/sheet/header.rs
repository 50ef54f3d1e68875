//! Header row detection and column role mapping.

/// Which column carries each semantic role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub id: usize,
    pub code: usize,
    pub description: usize,
    pub quantity: usize,
}

impl Default for ColumnMap {
    /// Positions used by exports without recognizable headers.
    fn default() -> Self {
        Self {
            id: 0,
            code: 1,
            description: 2,
            quantity: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLocation {
    pub row: usize,
    pub columns: ColumnMap,
    /// False when no header row was found and row 0 was assumed.
    pub found: bool,
}

/// Find the header within the first `scan_rows` rows: the first row with a
/// cell mentioning "codigo". Falls back to row 0.
pub fn locate(rows: &[Vec<String>], scan_rows: usize) -> HeaderLocation {
    let found_at = rows
        .iter()
        .take(scan_rows)
        .position(|row| row.iter().any(|cell| fold(cell).contains("codigo")));

    let row = found_at.unwrap_or(0);
    let columns = rows.get(row).map(|r| map_columns(r)).unwrap_or_default();
    HeaderLocation {
        row,
        columns,
        found: found_at.is_some(),
    }
}

/// Map header text to roles; roles without a matching header keep their
/// positional default.
pub fn map_columns(header: &[String]) -> ColumnMap {
    let mut id = None;
    let mut code = None;
    let mut description = None;
    let mut quantity = None;

    for (idx, cell) in header.iter().enumerate() {
        let text = fold(cell);
        if text.contains("codigo") {
            code.get_or_insert(idx);
        } else if text.contains("descripcion") {
            description.get_or_insert(idx);
        } else if text.contains("saldo") || text.contains("stock") {
            quantity.get_or_insert(idx);
        } else if text.contains("id") && text.contains("inventario") {
            id.get_or_insert(idx);
        }
    }

    let defaults = ColumnMap::default();
    ColumnMap {
        id: id.unwrap_or(defaults.id),
        code: code.unwrap_or(defaults.code),
        description: description.unwrap_or(defaults.description),
        quantity: quantity.unwrap_or(defaults.quantity),
    }
}

/// Lower-case and strip Spanish accents.
fn fold(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' => 'a',
            'é' | 'è' => 'e',
            'í' | 'ì' => 'i',
            'ó' | 'ò' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            other => other,
        })
        .collect()
}
