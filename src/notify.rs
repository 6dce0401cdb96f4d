use crate::address::CellAddress;
use crate::gate::Terminal;
use chrono::{DateTime, Local};

/// Terminal outcome plus human-readable detail, handed to the caller's sink
/// at the end of every relocation attempt.
#[derive(Debug, Clone)]
pub struct TerminalReport {
    pub outcome: Terminal,
    pub detail: String,
    /// Where the aggregate formulas live after the relocation, so the caller
    /// can persist the new addresses for the next run.
    pub formula_cells: Vec<CellAddress>,
    pub at: DateTime<Local>,
}

impl TerminalReport {
    pub fn new(outcome: Terminal, detail: impl Into<String>) -> Self {
        Self {
            outcome,
            detail: detail.into(),
            formula_cells: Vec::new(),
            at: Local::now(),
        }
    }

    pub fn with_formulas(
        outcome: Terminal,
        detail: impl Into<String>,
        formula_cells: Vec<CellAddress>,
    ) -> Self {
        Self {
            formula_cells,
            ..Self::new(outcome, detail)
        }
    }
}

pub trait NotificationSink {
    fn notify(&self, report: &TerminalReport);
}

/// Routes terminal reports to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, report: &TerminalReport) {
        match report.outcome {
            Terminal::Success { .. } | Terminal::NoMatch | Terminal::Cancelled => {
                tracing::info!(outcome = %report.outcome, detail = %report.detail, "relocation report");
            }
            Terminal::PartialFailure | Terminal::Failed => {
                tracing::warn!(outcome = %report.outcome, detail = %report.detail, "relocation report");
            }
        }
    }
}
