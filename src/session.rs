use crate::errors::RelocateError;
use crate::export::RecordExporter;
use crate::gate::{ConfirmationGate, GateError, SearchStep, Terminal};
use crate::notify::{NotificationSink, TerminalReport};
use crate::relocate::{RelocationOutcome, Relocator};
use crate::search::MatchCandidate;
use crate::ui::SessionUi;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Serializes relocations per sheet identity. The gate is a singleton per
/// sheet session: two concurrent relocations against the same sheet are
/// refused, relocations on different sheets share nothing.
#[derive(Debug, Default, Clone)]
pub struct SessionRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a relocation is already running for this sheet identity.
    pub fn acquire(&self, sheet_key: &str) -> Option<SessionGuard> {
        let mut active = self.active.lock();
        if !active.insert(sheet_key.to_string()) {
            return None;
        }
        Some(SessionGuard {
            key: sheet_key.to_string(),
            active: self.active.clone(),
        })
    }
}

pub struct SessionGuard {
    key: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}

/// Drives one relocation end to end: gate, search, selection, execution, and
/// the terminal report.
pub struct RelocationSession {
    gate: ConfirmationGate,
    relocator: Relocator,
    exporter: Option<RecordExporter>,
}

impl RelocationSession {
    pub fn new(relocator: Relocator) -> Self {
        Self {
            gate: ConfirmationGate::new(),
            relocator,
            exporter: None,
        }
    }

    pub fn with_exporter(mut self, exporter: RecordExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    /// Runs the whole flow. `NoMatch` and `Cancelled` come back as `Ok`
    /// terminals; only validation and execution failures are errors. Every
    /// terminal outcome is also pushed through the sink.
    pub fn run(
        &mut self,
        keyword: &str,
        ui: &mut dyn SessionUi,
        sink: &dyn NotificationSink,
    ) -> Result<Terminal, RelocateError> {
        self.gate.submit(keyword)?;

        let confirmed = ui.ask_yes_no(&format!(
            "Search the pending list for '{}'?",
            keyword.trim()
        ));
        let Some(keyword) = self.gate.confirm_search(confirmed)? else {
            let report = TerminalReport::new(
                Terminal::Cancelled,
                "search was not confirmed; no backend call was made",
            );
            sink.notify(&report);
            return Ok(Terminal::Cancelled);
        };

        let candidates = match self.relocator.search(&keyword) {
            Ok(candidates) => candidates,
            Err(err) => {
                self.gate.search_failed()?;
                sink.notify(&TerminalReport::new(Terminal::Failed, err.to_string()));
                return Err(err);
            }
        };

        let candidate = match self.gate.search_finished(candidates)? {
            SearchStep::NoMatch => {
                let detail = RelocateError::NoMatch {
                    keyword: keyword.clone(),
                }
                .to_string();
                sink.notify(&TerminalReport::new(Terminal::NoMatch, detail));
                return Ok(Terminal::NoMatch);
            }
            SearchStep::ConfirmExecution(candidate) => candidate,
            SearchStep::ChooseAmong(choices) => {
                match self.resolve_selection(&choices.candidates().to_vec(), ui)? {
                    Some(candidate) => candidate,
                    None => {
                        let report = TerminalReport::new(
                            Terminal::Cancelled,
                            "selection cancelled; nothing was changed",
                        );
                        sink.notify(&report);
                        return Ok(Terminal::Cancelled);
                    }
                }
            }
        };

        let summary = candidate.summary(self.relocator.rules().identity_column);
        let affirmed = ui.ask_yes_no(&format!(
            "Move '{summary}' to the done list and rewrite the totals?"
        ));
        let Some(candidate) = self.gate.confirm_execution(affirmed)? else {
            let report = TerminalReport::new(
                Terminal::Cancelled,
                "execution was not confirmed; nothing was changed",
            );
            sink.notify(&report);
            return Ok(Terminal::Cancelled);
        };

        self.execute(&candidate, sink)
    }

    fn resolve_selection(
        &mut self,
        candidates: &[MatchCandidate],
        ui: &mut dyn SessionUi,
    ) -> Result<Option<MatchCandidate>, RelocateError> {
        loop {
            let picked = ui.present_choices(candidates);
            match self.gate.select(picked) {
                Ok(resolved) => return Ok(resolved),
                Err(GateError::InvalidChoice { index, count }) => {
                    tracing::warn!(index, count, "selection out of range, presenting again");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn execute(
        &mut self,
        candidate: &MatchCandidate,
        sink: &dyn NotificationSink,
    ) -> Result<Terminal, RelocateError> {
        let plan = match self.relocator.plan(candidate) {
            Ok(plan) => plan,
            Err(err) => {
                self.gate.finish(Terminal::Failed)?;
                sink.notify(&TerminalReport::new(Terminal::Failed, err.to_string()));
                return Err(err);
            }
        };

        match self.relocator.execute(&plan) {
            Ok(outcome) => {
                let terminal = Terminal::Success {
                    verified: outcome.verified(),
                };
                let mut detail = describe(&outcome);
                if let Some(exporter) = &self.exporter {
                    match exporter.export(plan.insert_at, &plan.cells) {
                        Ok(()) => detail.push_str("; record exported"),
                        Err(err) => {
                            tracing::warn!(error = %err, "sheet updated but export failed");
                            detail.push_str(&format!("; sheet updated but export failed: {err}"));
                        }
                    }
                }
                self.gate.finish(terminal)?;
                let report = TerminalReport::with_formulas(
                    terminal,
                    detail,
                    outcome.formula_cells().to_vec(),
                );
                sink.notify(&report);
                Ok(terminal)
            }
            Err(err) => {
                let terminal = match &err {
                    RelocateError::Partial { .. } => Terminal::PartialFailure,
                    _ => Terminal::Failed,
                };
                self.gate.finish(terminal)?;
                sink.notify(&TerminalReport::new(terminal, err.to_string()));
                Err(err)
            }
        }
    }
}

fn describe(outcome: &RelocationOutcome) -> String {
    match outcome {
        RelocationOutcome::Completed {
            moved_to,
            formula_cells,
        } => {
            let cells: Vec<String> = formula_cells.iter().map(|c| c.to_string()).collect();
            format!(
                "record moved to row {moved_to}; totals now at {}",
                cells.join(", ")
            )
        }
        RelocationOutcome::ReplayedUnverified { actions, .. } => format!(
            "{actions} scripted actions replayed to completion; verify the sheet manually"
        ),
    }
}
