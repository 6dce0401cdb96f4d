#![allow(dead_code)]

use ledger_relocate::address::CellAddress;
use ledger_relocate::backend::ui_replay::{Expectation, KeyAction, ReplayPacing, ReplaySurface};
use ledger_relocate::backend::{RowSpan, SheetBackend, SheetSide, TransactionalBackend};
use ledger_relocate::errors::BackendError;
use ledger_relocate::notify::{NotificationSink, TerminalReport};
use ledger_relocate::plan::FormulaUpdate;
use ledger_relocate::search::MatchCandidate;
use ledger_relocate::snapshot::{CellValue, Row, TabularSnapshot};
use ledger_relocate::ui::{ChoicePresenter, ConfirmationPrompt};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Workbook fixtures

pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub fn create_workbook(
        &self,
        name: &str,
        build: impl FnOnce(&mut umya_spreadsheet::Spreadsheet),
    ) -> PathBuf {
        let mut book = umya_spreadsheet::new_file();
        build(&mut book);
        let path = self.dir.path().join(name);
        umya_spreadsheet::writer::xlsx::write(&book, &path).expect("write workbook");
        path
    }
}

/// Pending/Done ledger matching the canonical scenario: pending records from
/// row 2, done data rows 2..=13 in column B, and the running total at B14.
pub fn ledger_workbook(workspace: &TestWorkspace) -> PathBuf {
    workspace.create_workbook("ledger.xlsx", |book| {
        let pending = book.get_sheet_mut(&0).unwrap();
        pending.set_name("Pending");
        for (col, header) in ["Company", "Amount", "Contract", "Start"].iter().enumerate() {
            pending
                .get_cell_mut((col as u32 + 1, 1))
                .set_value(header.to_string());
        }
        let rows = [
            ("Acme", 100.0, "2026-01-10", "2026-02-01"),
            ("Globex", 250.0, "2026-01-12", "2026-02-15"),
            ("Initech", 75.0, "2026-01-20", "2026-03-01"),
        ];
        for (idx, (name, amount, contract, start)) in rows.iter().enumerate() {
            let row = idx as u32 + 2;
            pending.get_cell_mut((1, row)).set_value(name.to_string());
            pending.get_cell_mut((2, row)).set_value_number(*amount);
            pending
                .get_cell_mut((3, row))
                .set_value(contract.to_string());
            pending.get_cell_mut((4, row)).set_value(start.to_string());
        }

        book.new_sheet("Done").unwrap();
        let done = book.get_sheet_by_name_mut("Done").unwrap();
        done.get_cell_mut((1, 1)).set_value("Company");
        done.get_cell_mut((2, 1)).set_value("Amount");
        for row in 2..=13u32 {
            done.get_cell_mut((1, row)).set_value(format!("Old {row}"));
            done.get_cell_mut((2, row)).set_value_number(10.0 * row as f64);
        }
        done.get_cell_mut((2, 14))
            .set_formula("SUM(B2:B13)".to_string());
    })
}

// ---------------------------------------------------------------------------
// Spy backend

#[derive(Debug, Default, Clone)]
pub struct CallLog {
    pub reads: usize,
    pub deletes: usize,
    pub inserts: usize,
    pub cell_writes: usize,
    pub formula_batches: usize,
    pub operations: Vec<String>,
}

impl CallLog {
    pub fn mutations(&self) -> usize {
        self.deletes + self.inserts + self.cell_writes + self.formula_batches
    }
}

/// Transactional backend double that records every call and can be told to
/// fail a specific operation.
pub struct SpyBackend {
    source_rows: Vec<Row>,
    log: Arc<Mutex<CallLog>>,
    fail_on: Option<&'static str>,
}

impl SpyBackend {
    pub fn new(source_rows: Vec<Row>) -> (Self, Arc<Mutex<CallLog>>) {
        let log = Arc::new(Mutex::new(CallLog::default()));
        (
            Self {
                source_rows,
                log: log.clone(),
                fail_on: None,
            },
            log,
        )
    }

    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    fn record(&self, operation: &str) -> Result<(), BackendError> {
        self.log.lock().unwrap().operations.push(operation.to_string());
        if self.fail_on == Some(operation) {
            return Err(BackendError::write(format!("{operation} forced to fail")));
        }
        Ok(())
    }
}

pub fn spy_rows() -> Vec<Row> {
    vec![
        Row::new(1, vec!["Company".into(), "Amount".into()]),
        Row::new(2, vec!["Acme".into(), 100.0.into()]),
        Row::new(3, vec!["Globex".into(), 250.0.into()]),
        Row::new(4, vec!["Acme Ltd".into(), 75.0.into()]),
    ]
}

impl SheetBackend for SpyBackend {
    fn name(&self) -> &'static str {
        "spy"
    }

    fn read_region(
        &mut self,
        side: SheetSide,
        span: RowSpan,
    ) -> Result<TabularSnapshot, BackendError> {
        {
            let mut log = self.log.lock().unwrap();
            log.reads += 1;
            log.operations.push("read_region".to_string());
        }
        if self.fail_on == Some("read_region") {
            return Err(BackendError::read("read_region forced to fail"));
        }
        match side {
            SheetSide::Source => {
                let rows = self
                    .source_rows
                    .iter()
                    .filter(|r| {
                        r.position >= span.start
                            && span.end.map(|end| r.position <= end).unwrap_or(true)
                    })
                    .cloned()
                    .collect();
                Ok(TabularSnapshot::new(rows))
            }
            SheetSide::Destination => Ok(TabularSnapshot::default()),
        }
    }
}

impl TransactionalBackend for SpyBackend {
    fn write_cell(
        &mut self,
        _side: SheetSide,
        _address: CellAddress,
        _value: &CellValue,
    ) -> Result<(), BackendError> {
        self.record("write_cell")?;
        self.log.lock().unwrap().cell_writes += 1;
        Ok(())
    }

    fn insert_row(&mut self, _side: SheetSide, _row: u32) -> Result<(), BackendError> {
        self.record("insert_row")?;
        self.log.lock().unwrap().inserts += 1;
        Ok(())
    }

    fn delete_row(&mut self, _side: SheetSide, _row: u32) -> Result<(), BackendError> {
        self.record("delete_row")?;
        self.log.lock().unwrap().deletes += 1;
        Ok(())
    }

    fn batch_update_formulas(
        &mut self,
        _side: SheetSide,
        _updates: &[FormulaUpdate],
    ) -> Result<(), BackendError> {
        self.record("batch_update_formulas")?;
        self.log.lock().unwrap().formula_batches += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Replay surface doubles

/// Records every sent action; settles instantly for observable expectations.
pub struct RecordingSurface {
    pub sent: Arc<Mutex<Vec<KeyAction>>>,
    fail_on: Option<KeyAction>,
}

impl RecordingSurface {
    pub fn new() -> (Self, Arc<Mutex<Vec<KeyAction>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                sent: sent.clone(),
                fail_on: None,
            },
            sent,
        )
    }

    pub fn failing_on(mut self, action: KeyAction) -> Self {
        self.fail_on = Some(action);
        self
    }
}

impl ReplaySurface for RecordingSurface {
    fn read_region(
        &mut self,
        _side: SheetSide,
        _span: RowSpan,
    ) -> Result<TabularSnapshot, BackendError> {
        Ok(TabularSnapshot::default())
    }

    fn send(&mut self, action: &KeyAction) -> Result<(), BackendError> {
        if self.fail_on.as_ref() == Some(action) {
            return Err(BackendError::write(format!("{action:?} forced to fail")));
        }
        self.sent.lock().unwrap().push(action.clone());
        Ok(())
    }

    fn observe(&mut self, _expect: &Expectation) -> Option<Result<bool, BackendError>> {
        Some(Ok(true))
    }
}

/// Pacing that keeps replay tests fast.
pub fn fast_pacing() -> ReplayPacing {
    ReplayPacing {
        settle_ceiling: Duration::from_millis(1),
        probe_attempts: 3,
        probe_initial_delay: Duration::from_millis(1),
    }
}

// ---------------------------------------------------------------------------
// UI and sink doubles

/// Preset confirmation answers and selection choices.
pub struct ScriptedUi {
    answers: VecDeque<bool>,
    choices: VecDeque<Option<usize>>,
    pub prompts: Vec<String>,
}

impl ScriptedUi {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            choices: VecDeque::new(),
            prompts: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: &[Option<usize>]) -> Self {
        self.choices = choices.iter().copied().collect();
        self
    }
}

impl ConfirmationPrompt for ScriptedUi {
    fn ask_yes_no(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().unwrap_or(false)
    }
}

impl ChoicePresenter for ScriptedUi {
    fn present_choices(&mut self, _candidates: &[MatchCandidate]) -> Option<usize> {
        self.choices.pop_front().unwrap_or(None)
    }
}

/// Collects terminal reports for assertions.
#[derive(Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<TerminalReport>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<TerminalReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, report: &TerminalReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}
