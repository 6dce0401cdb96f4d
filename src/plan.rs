use crate::address::{CellAddress, column_letters};
use crate::errors::RelocateError;
use crate::search::MatchCandidate;
use crate::snapshot::CellValue;

/// One aggregate column and the cell its running total currently occupies.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateColumn {
    pub column: u32,
    pub current_address: CellAddress,
}

/// Where the running-total formulas live in the destination sheet. All
/// formulas sit on one row; after a relocation exactly one new formula row
/// replaces it, one row below the newly inserted record.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateFormulaSpec {
    columns: Vec<AggregateColumn>,
    data_start_row: u32,
}

impl AggregateFormulaSpec {
    pub fn new(addresses: &[CellAddress], data_start_row: u32) -> Result<Self, RelocateError> {
        let Some(first) = addresses.first() else {
            return Err(RelocateError::Validation(
                "at least one aggregate formula cell is required".to_string(),
            ));
        };
        if addresses.iter().any(|a| a.row != first.row) {
            return Err(RelocateError::Validation(
                "aggregate formula cells must share one row".to_string(),
            ));
        }
        if data_start_row == 0 {
            return Err(RelocateError::Validation(
                "done-region data start row is 1-based".to_string(),
            ));
        }
        if data_start_row >= first.row {
            return Err(RelocateError::Validation(format!(
                "done-region data must start above the formula row {}",
                first.row
            )));
        }
        Ok(Self {
            columns: addresses
                .iter()
                .map(|a| AggregateColumn {
                    column: a.col,
                    current_address: *a,
                })
                .collect(),
            data_start_row,
        })
    }

    pub fn parse(cells: &[String], data_start_row: u32) -> Result<Self, RelocateError> {
        let addresses = cells
            .iter()
            .map(|cell| {
                CellAddress::parse(cell).ok_or_else(|| {
                    RelocateError::Validation(format!("invalid formula cell address '{cell}'"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(&addresses, data_start_row)
    }

    pub fn formula_row(&self) -> u32 {
        // new() guarantees at least one column
        self.columns[0].current_address.row
    }

    pub fn columns(&self) -> &[AggregateColumn] {
        &self.columns
    }

    pub fn data_start_row(&self) -> u32 {
        self.data_start_row
    }
}

/// Literal formula text (no leading `=`) destined for one cell. Each backend
/// supplies the form its substrate needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaUpdate {
    pub address: CellAddress,
    pub formula: String,
}

/// Computed once, executed once; never partially retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RelocationPlan {
    pub source_row: u32,
    /// Destination insert position, immediately above the current formula row.
    pub insert_at: u32,
    pub cells: Vec<CellValue>,
    pub formula_updates: Vec<FormulaUpdate>,
}

impl RelocationPlan {
    pub fn new_formula_row(&self) -> u32 {
        self.insert_at + 1
    }

    pub fn formula_cells(&self) -> Vec<CellAddress> {
        self.formula_updates.iter().map(|u| u.address).collect()
    }
}

pub fn sum_formula(column: u32, start_row: u32, end_row: u32) -> String {
    let col = column_letters(column);
    format!("SUM({col}{start_row}:{col}{end_row})")
}

/// The insert lands on the current formula row, pushing the formula row down
/// by exactly one; the new formula range covers every data row from the start
/// of the done region through the row directly above the new formula row.
pub fn build(
    candidate: &MatchCandidate,
    spec: &AggregateFormulaSpec,
) -> Result<RelocationPlan, RelocateError> {
    if candidate.cells.is_empty() {
        return Err(RelocateError::Validation(format!(
            "matched row {} has no cells to relocate",
            candidate.row_position
        )));
    }

    let insert_at = spec.formula_row();
    let new_formula_row = insert_at + 1;
    let formula_updates = spec
        .columns()
        .iter()
        .map(|agg| FormulaUpdate {
            address: CellAddress::new(agg.column, new_formula_row),
            formula: sum_formula(agg.column, spec.data_start_row(), new_formula_row - 1),
        })
        .collect();

    Ok(RelocationPlan {
        source_row: candidate.row_position,
        insert_at,
        cells: candidate.cells.clone(),
        formula_updates,
    })
}
