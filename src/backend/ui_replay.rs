use super::{ReplayBackend, RowSpan, ScriptError, SheetBackend, SheetSide};
use crate::address::CellAddress;
use crate::errors::BackendError;
use crate::plan::RelocationPlan;
use crate::snapshot::TabularSnapshot;
use std::time::Duration;

/// Primitive input action the host application understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    FocusSheet(SheetSide),
    NavigateTo(CellAddress),
    ExtendSelectionRight(u32),
    Copy,
    InsertRowAbove,
    Paste,
    TypeLiteral(String),
    Commit,
    DeleteRowShiftUp,
}

/// Post-condition an observable host can be polled for after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    CursorAt(CellAddress),
    SelectionSpans(u32),
    EditAccepted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedAction {
    pub action: KeyAction,
    pub expect: Option<Expectation>,
}

impl ScriptedAction {
    fn new(action: KeyAction, expect: Option<Expectation>) -> Self {
        Self { action, expect }
    }
}

/// Fixed, strictly ordered action sequence compiled from one relocation plan.
///
/// The sequence is cooperative with no preemption: once the first mutating
/// action has been issued, the host's undo state is unobservable and the
/// script must run to its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionScript {
    steps: Vec<ScriptedAction>,
    first_mutating_step: usize,
}

impl ActionScript {
    /// Deterministic: equivalent plans compile to the same action list in the
    /// same order.
    pub fn compile(plan: &RelocationPlan) -> Self {
        let columns = plan.cells.len() as u32;
        let source_anchor = CellAddress::new(1, plan.source_row);
        let insert_anchor = CellAddress::new(1, plan.insert_at);
        let mut steps = Vec::new();

        // Capture the source record first so the paste never depends on a
        // position invalidated by the delete.
        steps.push(ScriptedAction::new(
            KeyAction::FocusSheet(SheetSide::Source),
            None,
        ));
        steps.push(ScriptedAction::new(
            KeyAction::NavigateTo(source_anchor),
            Some(Expectation::CursorAt(source_anchor)),
        ));
        if columns > 1 {
            steps.push(ScriptedAction::new(
                KeyAction::ExtendSelectionRight(columns - 1),
                Some(Expectation::SelectionSpans(columns)),
            ));
        }
        steps.push(ScriptedAction::new(KeyAction::Copy, None));

        steps.push(ScriptedAction::new(
            KeyAction::FocusSheet(SheetSide::Destination),
            None,
        ));
        steps.push(ScriptedAction::new(
            KeyAction::NavigateTo(insert_anchor),
            Some(Expectation::CursorAt(insert_anchor)),
        ));

        let first_mutating_step = steps.len();
        steps.push(ScriptedAction::new(KeyAction::InsertRowAbove, None));
        // Re-anchor: the insert may leave the cursor on the shifted row.
        steps.push(ScriptedAction::new(
            KeyAction::NavigateTo(insert_anchor),
            Some(Expectation::CursorAt(insert_anchor)),
        ));
        steps.push(ScriptedAction::new(KeyAction::Paste, None));

        for update in &plan.formula_updates {
            steps.push(ScriptedAction::new(
                KeyAction::NavigateTo(update.address),
                Some(Expectation::CursorAt(update.address)),
            ));
            steps.push(ScriptedAction::new(
                KeyAction::TypeLiteral(format!("={}", update.formula)),
                None,
            ));
            steps.push(ScriptedAction::new(
                KeyAction::Commit,
                Some(Expectation::EditAccepted),
            ));
        }

        // Source row goes last, after the copied cells have landed.
        steps.push(ScriptedAction::new(
            KeyAction::FocusSheet(SheetSide::Source),
            None,
        ));
        steps.push(ScriptedAction::new(
            KeyAction::NavigateTo(source_anchor),
            Some(Expectation::CursorAt(source_anchor)),
        ));
        steps.push(ScriptedAction::new(KeyAction::DeleteRowShiftUp, None));

        Self {
            steps,
            first_mutating_step,
        }
    }

    pub fn steps(&self) -> &[ScriptedAction] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps before this index only navigate, select, and copy; a failure
    /// there leaves the sheets untouched.
    pub fn first_mutating_step(&self) -> usize {
        self.first_mutating_step
    }
}

/// Bounded settle behavior between actions.
#[derive(Debug, Clone)]
pub struct ReplayPacing {
    /// Ceiling wait for steps the surface cannot observe at all.
    pub settle_ceiling: Duration,
    pub probe_attempts: u32,
    pub probe_initial_delay: Duration,
}

impl Default for ReplayPacing {
    fn default() -> Self {
        Self {
            settle_ceiling: Duration::from_millis(400),
            probe_attempts: 5,
            probe_initial_delay: Duration::from_millis(40),
        }
    }
}

/// Integration point to the host application: sends input, reads the grid
/// where the host allows it, and optionally observes settle post-conditions.
pub trait ReplaySurface: Send {
    fn read_region(&mut self, side: SheetSide, span: RowSpan)
    -> Result<TabularSnapshot, BackendError>;

    fn send(&mut self, action: &KeyAction) -> Result<(), BackendError>;

    /// `None` when the surface has no observability for this expectation.
    fn observe(&mut self, expect: &Expectation) -> Option<Result<bool, BackendError>>;
}

/// Replays scripted input against an application that offers no read-back of
/// individual keystrokes. Completion of the script is the strongest guarantee
/// this backend can give.
pub struct UiReplayBackend {
    surface: Box<dyn ReplaySurface>,
    pacing: ReplayPacing,
}

impl UiReplayBackend {
    pub fn new(surface: Box<dyn ReplaySurface>) -> Self {
        Self::with_pacing(surface, ReplayPacing::default())
    }

    pub fn with_pacing(surface: Box<dyn ReplaySurface>, pacing: ReplayPacing) -> Self {
        Self { surface, pacing }
    }

    /// Waits for the host to settle after an action. Observable expectations
    /// are polled a bounded number of times with doubling backoff; a step
    /// with no expectation, or a surface without observability, falls back to
    /// the fixed ceiling wait.
    fn settle(&mut self, expect: Option<&Expectation>) -> Result<(), BackendError> {
        let Some(expect) = expect else {
            std::thread::sleep(self.pacing.settle_ceiling);
            return Ok(());
        };

        let mut delay = self.pacing.probe_initial_delay;
        let mut waited = Duration::ZERO;
        for _ in 0..self.pacing.probe_attempts {
            match self.surface.observe(expect) {
                None => {
                    std::thread::sleep(self.pacing.settle_ceiling);
                    return Ok(());
                }
                Some(Ok(true)) => return Ok(()),
                Some(Ok(false)) => {
                    std::thread::sleep(delay);
                    waited += delay;
                    delay = delay.saturating_mul(2);
                }
                Some(Err(err)) => return Err(err),
            }
        }
        Err(BackendError::Timeout {
            operation: "settle",
            timeout_ms: waited.as_millis() as u64,
        })
    }
}

impl SheetBackend for UiReplayBackend {
    fn name(&self) -> &'static str {
        "ui-replay"
    }

    fn read_region(
        &mut self,
        side: SheetSide,
        span: RowSpan,
    ) -> Result<TabularSnapshot, BackendError> {
        self.surface.read_region(side, span)
    }
}

impl ReplayBackend for UiReplayBackend {
    fn replay(&mut self, script: &ActionScript) -> Result<(), ScriptError> {
        for (step, scripted) in script.steps().iter().enumerate() {
            self.surface.send(&scripted.action).map_err(|source| ScriptError {
                step,
                action: scripted.action.clone(),
                source,
            })?;
            self.settle(scripted.expect.as_ref())
                .map_err(|source| ScriptError {
                    step,
                    action: scripted.action.clone(),
                    source,
                })?;
            tracing::trace!(step, action = ?scripted.action, "action replayed");
        }
        Ok(())
    }
}
