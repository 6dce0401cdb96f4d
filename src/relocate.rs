use crate::address::CellAddress;
use crate::backend::{
    Backend, ReplayBackend, RowSpan, SheetSide, TransactionalBackend, ui_replay::ActionScript,
};
use crate::errors::RelocateError;
use crate::marker::{self, MarkerSpec};
use crate::plan::{self, AggregateFormulaSpec, RelocationPlan};
use crate::search::{self, MatchCandidate};

/// Substrate-independent relocation rules: how the marker is found, which
/// column identifies a record, where pending data starts, and where the
/// running totals live.
#[derive(Debug, Clone)]
pub struct RelocationRules {
    pub marker: Option<MarkerSpec>,
    pub identity_column: u32,
    pub first_data_row: u32,
    pub formula: AggregateFormulaSpec,
}

impl RelocationRules {
    pub fn validate(&self) -> Result<(), RelocateError> {
        if self.identity_column == 0 {
            return Err(RelocateError::Validation(
                "identity column is 1-based".to_string(),
            ));
        }
        if self.first_data_row == 0 {
            return Err(RelocateError::Validation(
                "first data row is 1-based".to_string(),
            ));
        }
        if let Some(marker) = &self.marker {
            marker.validate()?;
        }
        Ok(())
    }
}

/// What a finished execution reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum RelocationOutcome {
    /// Transactional substrate: every write was acknowledged.
    Completed {
        moved_to: u32,
        formula_cells: Vec<CellAddress>,
    },
    /// Replay substrate: the script ran to completion, but semantic success
    /// cannot be confirmed and the caller must verify the sheet manually.
    ReplayedUnverified {
        actions: usize,
        formula_cells: Vec<CellAddress>,
    },
}

impl RelocationOutcome {
    pub fn verified(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn formula_cells(&self) -> &[CellAddress] {
        match self {
            Self::Completed { formula_cells, .. } => formula_cells,
            Self::ReplayedUnverified { formula_cells, .. } => formula_cells,
        }
    }
}

/// Orchestrates locate, match, resolve, move, and formula recompute against
/// whichever backend is supplied.
pub struct Relocator {
    backend: Backend,
    rules: RelocationRules,
}

impl Relocator {
    pub fn new(backend: Backend, rules: RelocationRules) -> Result<Self, RelocateError> {
        rules.validate()?;
        Ok(Self { backend, rules })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn rules(&self) -> &RelocationRules {
        &self.rules
    }

    /// Search the pending region. Read-only; the returned candidates are
    /// valid only until the next mutation of the sheet.
    pub fn search(&mut self, keyword: &str) -> Result<Vec<MatchCandidate>, RelocateError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(RelocateError::Validation(
                "search keyword must not be empty".to_string(),
            ));
        }

        let snapshot = self
            .backend
            .read_region(SheetSide::Source, RowSpan::from_row(1))
            .map_err(RelocateError::Failed)?;

        let marker_row = self
            .rules
            .marker
            .as_ref()
            .and_then(|spec| marker::locate(&snapshot, spec));
        match (&self.rules.marker, marker_row) {
            (Some(_), Some(row)) => tracing::debug!(row, "marker row located"),
            (Some(spec), None) => tracing::info!(
                sentinel = %spec.sentinel,
                "marker not found, treating the whole sheet as pending"
            ),
            (None, _) => {}
        }

        let region = marker::pending_region(&snapshot, marker_row, self.rules.first_data_row);
        let matches = search::find(&snapshot, region, self.rules.identity_column, keyword);
        tracing::info!(keyword, count = matches.len(), "pending region searched");
        Ok(matches)
    }

    /// Build the one-shot plan for a resolved candidate.
    pub fn plan(&self, candidate: &MatchCandidate) -> Result<RelocationPlan, RelocateError> {
        plan::build(candidate, &self.rules.formula)
    }

    /// Execute a plan. Failures are classified as `Failed` (nothing moved) or
    /// `Partial` (data moved, totals stale); neither is retried here because
    /// relocation is not idempotent.
    pub fn execute(&mut self, plan: &RelocationPlan) -> Result<RelocationOutcome, RelocateError> {
        match &mut self.backend {
            Backend::Transactional(backend) => execute_transactional(backend.as_mut(), plan),
            Backend::Replay(backend) => execute_replay(backend.as_mut(), plan),
        }
    }
}

fn execute_transactional(
    backend: &mut dyn TransactionalBackend,
    plan: &RelocationPlan,
) -> Result<RelocationOutcome, RelocateError> {
    backend
        .delete_row(SheetSide::Source, plan.source_row)
        .map_err(RelocateError::Failed)?;

    // The source row is gone; from here on any failure leaves a partial state.
    backend
        .insert_row(SheetSide::Destination, plan.insert_at)
        .map_err(|source| RelocateError::Partial {
            detail: format!(
                "source row {} deleted but destination row {} was not inserted",
                plan.source_row, plan.insert_at
            ),
            source,
        })?;

    for (offset, value) in plan.cells.iter().enumerate() {
        let address = CellAddress::new(offset as u32 + 1, plan.insert_at);
        backend
            .write_cell(SheetSide::Destination, address, value)
            .map_err(|source| RelocateError::Partial {
                detail: format!(
                    "destination row {} inserted but cell {} was not written",
                    plan.insert_at, address
                ),
                source,
            })?;
    }

    backend
        .batch_update_formulas(SheetSide::Destination, &plan.formula_updates)
        .map_err(|source| RelocateError::Partial {
            detail: "record moved but the aggregate formulas were not rewritten".to_string(),
            source,
        })?;

    tracing::info!(
        from = plan.source_row,
        to = plan.insert_at,
        "record relocated and totals rewritten"
    );
    Ok(RelocationOutcome::Completed {
        moved_to: plan.insert_at,
        formula_cells: plan.formula_cells(),
    })
}

fn execute_replay(
    backend: &mut dyn ReplayBackend,
    plan: &RelocationPlan,
) -> Result<RelocationOutcome, RelocateError> {
    let script = ActionScript::compile(plan);
    tracing::info!(actions = script.len(), "replaying relocation script");

    match backend.replay(&script) {
        Ok(()) => Ok(RelocationOutcome::ReplayedUnverified {
            actions: script.len(),
            formula_cells: plan.formula_cells(),
        }),
        Err(err) if err.step < script.first_mutating_step() => {
            Err(RelocateError::Failed(err.source))
        }
        Err(err) => Err(RelocateError::Partial {
            detail: format!(
                "script stopped at step {} of {} after mutations began",
                err.step + 1,
                script.len()
            ),
            source: err.source,
        }),
    }
}
