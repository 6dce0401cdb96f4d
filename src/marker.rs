use crate::errors::RelocateError;
use crate::snapshot::{CellValue, Region, TabularSnapshot};

/// Which cells of a row are checked against the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerScan {
    /// Only the given 1-based column.
    Column(u32),
    /// Any cell of the row.
    AnyCell,
}

/// The sentinel row that separates the pending region from the done region.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub sentinel: String,
    pub scan: MarkerScan,
}

impl MarkerSpec {
    pub fn new(sentinel: impl Into<String>, scan: MarkerScan) -> Self {
        Self {
            sentinel: sentinel.into(),
            scan,
        }
    }

    pub fn validate(&self) -> Result<(), RelocateError> {
        if self.sentinel.trim().is_empty() {
            return Err(RelocateError::Validation(
                "marker sentinel must not be empty".to_string(),
            ));
        }
        if matches!(self.scan, MarkerScan::Column(0)) {
            return Err(RelocateError::Validation(
                "marker column is 1-based".to_string(),
            ));
        }
        Ok(())
    }
}

/// First row whose scanned cells contain the sentinel, scanning top to bottom.
pub fn locate(snapshot: &TabularSnapshot, spec: &MarkerSpec) -> Option<u32> {
    snapshot
        .rows()
        .iter()
        .find(|row| match spec.scan {
            MarkerScan::Column(col) => row
                .cell(col)
                .is_some_and(|cell| cell_contains(cell, &spec.sentinel)),
            MarkerScan::AnyCell => row
                .cells
                .iter()
                .any(|cell| cell_contains(cell, &spec.sentinel)),
        })
        .map(|row| row.position)
}

/// Pending region implied by a marker scan. An absent marker is the documented
/// degraded mode, not an error: the whole sheet from the first data row counts
/// as pending.
pub fn pending_region(
    snapshot: &TabularSnapshot,
    marker_row: Option<u32>,
    first_data_row: u32,
) -> Region {
    let end = match marker_row {
        Some(row) => row,
        None => snapshot
            .last_position()
            .map(|last| last + 1)
            .unwrap_or(first_data_row),
    };
    Region::pending(first_data_row, end.max(first_data_row))
}

fn cell_contains(cell: &CellValue, sentinel: &str) -> bool {
    cell.display_text().contains(sentinel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Row;

    fn sheet(rows: Vec<(u32, Vec<&str>)>) -> TabularSnapshot {
        TabularSnapshot::new(
            rows.into_iter()
                .map(|(pos, cells)| Row::new(pos, cells.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    #[test]
    fn column_scan_ignores_other_columns() {
        let snapshot = sheet(vec![
            (2, vec!["Acme", "== DONE =="]),
            (3, vec!["== DONE ==", "x"]),
        ]);
        let spec = MarkerSpec::new("== DONE ==", MarkerScan::Column(1));
        assert_eq!(locate(&snapshot, &spec), Some(3));
    }

    #[test]
    fn any_cell_scan_takes_first_match() {
        let snapshot = sheet(vec![
            (2, vec!["Acme", "100"]),
            (3, vec!["x", "totals below"]),
            (4, vec!["totals below", "y"]),
        ]);
        let spec = MarkerSpec::new("totals", MarkerScan::AnyCell);
        assert_eq!(locate(&snapshot, &spec), Some(3));
    }

    #[test]
    fn containment_not_equality() {
        let snapshot = sheet(vec![(2, vec!["-- COMPLETED SECTION --"])]);
        let spec = MarkerSpec::new("COMPLETED", MarkerScan::Column(1));
        assert_eq!(locate(&snapshot, &spec), Some(2));
    }

    #[test]
    fn absent_sentinel_is_not_an_error() {
        let snapshot = sheet(vec![(2, vec!["Acme"]), (3, vec!["Globex"])]);
        let spec = MarkerSpec::new("== DONE ==", MarkerScan::AnyCell);
        assert_eq!(locate(&snapshot, &spec), None);

        let region = pending_region(&snapshot, None, 2);
        assert_eq!(region, Region::pending(2, 4));
    }

    #[test]
    fn marker_bounds_the_pending_region() {
        let snapshot = sheet(vec![
            (2, vec!["Acme"]),
            (3, vec!["== DONE =="]),
            (4, vec!["Globex"]),
        ]);
        let region = pending_region(&snapshot, Some(3), 2);
        assert_eq!(region, Region::pending(2, 3));
        assert!(region.contains(2));
        assert!(!region.contains(3));
    }

    #[test]
    fn empty_sheet_degrades_to_empty_region() {
        let snapshot = TabularSnapshot::default();
        let region = pending_region(&snapshot, None, 2);
        assert!(region.is_empty());
    }
}
