use crate::snapshot::{CellValue, Region, Row, TabularSnapshot};

/// Read-only reference into a snapshot. Invalidated by any sheet mutation;
/// the engine re-resolves positions instead of reusing a stale candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub row_position: u32,
    pub cells: Vec<CellValue>,
}

impl MatchCandidate {
    pub fn from_row(row: &Row) -> Self {
        Self {
            row_position: row.position,
            cells: row.cells.clone(),
        }
    }

    /// 1-based column lookup.
    pub fn cell(&self, column: u32) -> Option<&CellValue> {
        if column == 0 {
            return None;
        }
        self.cells.get(column as usize - 1)
    }

    /// One-line description for selection prompts: the identity cell plus the
    /// first other non-empty cell as context.
    pub fn summary(&self, identity_column: u32) -> String {
        let identity = self
            .cell(identity_column)
            .map(CellValue::display_text)
            .unwrap_or_default();
        let context = self.cells.iter().enumerate().find_map(|(idx, cell)| {
            let column = idx as u32 + 1;
            if column != identity_column && !cell.is_empty() {
                Some(cell.display_text())
            } else {
                None
            }
        });
        match context {
            Some(context) => format!("row {}: {identity} ({context})", self.row_position),
            None => format!("row {}: {identity}", self.row_position),
        }
    }
}

/// Case-insensitive substring search for the keyword within the identity
/// column, scoped to the region. Candidates come back in ascending row order
/// with the snapshot data carried verbatim, so selection needs no re-read.
pub fn find(
    snapshot: &TabularSnapshot,
    region: Region,
    identity_column: u32,
    keyword: &str,
) -> Vec<MatchCandidate> {
    debug_assert!(!keyword.trim().is_empty(), "callers validate the keyword");
    let folded = keyword.to_lowercase();
    snapshot
        .rows_in(region)
        .filter(|row| {
            row.cell(identity_column)
                .is_some_and(|cell| cell.display_text().to_lowercase().contains(&folded))
        })
        .map(MatchCandidate::from_row)
        .collect()
}
