use super::{RowSpan, SheetBackend, SheetSide, TransactionalBackend};
use crate::address::CellAddress;
use crate::errors::BackendError;
use crate::plan::FormulaUpdate;
use crate::snapshot::{CellValue, Row, TabularSnapshot};
use std::path::PathBuf;
use umya_spreadsheet::Spreadsheet;

/// Direct xlsx rewrite through umya-spreadsheet.
///
/// Single process, no concurrent-writer protection: the caller must treat the
/// file as exclusively owned for the duration of one relocation. The workbook
/// stays loaded across calls and every mutation is persisted before the call
/// returns, so reads always see prior writes.
pub struct LocalFileBackend {
    path: PathBuf,
    source_sheet: String,
    dest_sheet: String,
    book: Option<Spreadsheet>,
}

impl LocalFileBackend {
    pub fn new(
        path: impl Into<PathBuf>,
        source_sheet: impl Into<String>,
        dest_sheet: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            source_sheet: source_sheet.into(),
            dest_sheet: dest_sheet.into(),
            book: None,
        }
    }

    fn sheet_name(&self, side: SheetSide) -> String {
        match side {
            SheetSide::Source => self.source_sheet.clone(),
            SheetSide::Destination => self.dest_sheet.clone(),
        }
    }

    fn load(&mut self) -> Result<&mut Spreadsheet, BackendError> {
        let book = match self.book.take() {
            Some(book) => book,
            None => umya_spreadsheet::reader::xlsx::read(&self.path).map_err(|e| {
                BackendError::read(format!(
                    "failed to open workbook '{}': {e}",
                    self.path.display()
                ))
            })?,
        };
        Ok(self.book.insert(book))
    }

    fn save(&self) -> Result<(), BackendError> {
        let Some(book) = &self.book else {
            return Ok(());
        };
        umya_spreadsheet::writer::xlsx::write(book, &self.path).map_err(|e| {
            BackendError::write(format!(
                "failed to save workbook '{}': {e}",
                self.path.display()
            ))
        })
    }
}

impl SheetBackend for LocalFileBackend {
    fn name(&self) -> &'static str {
        "local-file"
    }

    fn read_region(
        &mut self,
        side: SheetSide,
        span: RowSpan,
    ) -> Result<TabularSnapshot, BackendError> {
        let name = self.sheet_name(side);
        let book = self.load()?;
        let sheet = book
            .get_sheet_by_name(&name)
            .ok_or_else(|| BackendError::read(format!("sheet '{name}' not found")))?;

        let highest_row = sheet.get_highest_row();
        let highest_col = sheet.get_highest_column();
        let end = span.end.unwrap_or(highest_row).min(highest_row);
        if span.start > end || highest_col == 0 {
            return Ok(TabularSnapshot::default());
        }

        let mut rows = Vec::with_capacity((end - span.start + 1) as usize);
        for position in span.start..=end {
            let mut cells = Vec::with_capacity(highest_col as usize);
            for col in 1..=highest_col {
                let text = sheet
                    .get_cell((col, position))
                    .map(|cell| cell.get_value().to_string())
                    .unwrap_or_default();
                cells.push(CellValue::from_sheet_text(&text));
            }
            rows.push(Row::new(position, cells));
        }
        Ok(TabularSnapshot::new(rows))
    }
}

impl TransactionalBackend for LocalFileBackend {
    fn write_cell(
        &mut self,
        side: SheetSide,
        address: CellAddress,
        value: &CellValue,
    ) -> Result<(), BackendError> {
        let name = self.sheet_name(side);
        let book = self.load()?;
        let sheet = book
            .get_sheet_by_name_mut(&name)
            .ok_or_else(|| BackendError::write(format!("sheet '{name}' not found")))?;

        let cell = sheet.get_cell_mut((address.col, address.row));
        match value {
            CellValue::Text(s) => {
                cell.set_value(s.clone());
            }
            CellValue::Number(n) => {
                cell.set_value_number(*n);
            }
            CellValue::Empty => {
                cell.set_value(String::new());
            }
        }
        self.save()
    }

    fn insert_row(&mut self, side: SheetSide, row: u32) -> Result<(), BackendError> {
        if row == 0 {
            return Err(BackendError::write("row positions are 1-based"));
        }
        let name = self.sheet_name(side);
        let book = self.load()?;
        let sheet = book
            .get_sheet_by_name_mut(&name)
            .ok_or_else(|| BackendError::write(format!("sheet '{name}' not found")))?;
        sheet.insert_new_row(&row, &1);
        self.save()
    }

    fn delete_row(&mut self, side: SheetSide, row: u32) -> Result<(), BackendError> {
        if row == 0 {
            return Err(BackendError::write("row positions are 1-based"));
        }
        let name = self.sheet_name(side);
        let book = self.load()?;
        let sheet = book
            .get_sheet_by_name_mut(&name)
            .ok_or_else(|| BackendError::write(format!("sheet '{name}' not found")))?;
        sheet.remove_row(&row, &1);
        self.save()
    }

    fn batch_update_formulas(
        &mut self,
        side: SheetSide,
        updates: &[FormulaUpdate],
    ) -> Result<(), BackendError> {
        let name = self.sheet_name(side);
        let book = self.load()?;
        let sheet = book
            .get_sheet_by_name_mut(&name)
            .ok_or_else(|| BackendError::write(format!("sheet '{name}' not found")))?;

        for update in updates {
            let cell = sheet.get_cell_mut((update.address.col, update.address.row));
            cell.set_formula(update.formula.clone());
            cell.get_cell_value_mut()
                .set_formula_result_default(String::new());
        }
        self.save()
    }
}
