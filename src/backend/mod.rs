use crate::address::CellAddress;
use crate::errors::BackendError;
use crate::plan::FormulaUpdate;
use crate::snapshot::{CellValue, TabularSnapshot};

pub mod local_file;
pub mod remote_api;
pub mod ui_replay;

pub use local_file::LocalFileBackend;
pub use remote_api::{RemoteApiBackend, RemoteApiConfig, RemoteSheet};
pub use ui_replay::{
    ActionScript, Expectation, KeyAction, ReplayPacing, ReplaySurface, ScriptedAction,
    UiReplayBackend,
};

/// Which of the two sheets a call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetSide {
    /// The pending list a record is searched in.
    Source,
    /// The done list that receives the record and carries the running totals.
    Destination,
}

/// Rows to read, 1-based and inclusive. `end` of `None` reads to the last
/// used row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub start: u32,
    pub end: Option<u32>,
}

impl RowSpan {
    pub fn from_row(start: u32) -> Self {
        Self { start, end: None }
    }

    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }
}

/// Capability every substrate shares: a point-in-time read.
pub trait SheetBackend: Send {
    fn name(&self) -> &'static str;

    fn read_region(&mut self, side: SheetSide, span: RowSpan)
    -> Result<TabularSnapshot, BackendError>;
}

/// Random-access substrates with per-call write visibility.
pub trait TransactionalBackend: SheetBackend {
    fn write_cell(
        &mut self,
        side: SheetSide,
        address: CellAddress,
        value: &CellValue,
    ) -> Result<(), BackendError>;

    fn insert_row(&mut self, side: SheetSide, row: u32) -> Result<(), BackendError>;

    fn delete_row(&mut self, side: SheetSide, row: u32) -> Result<(), BackendError>;

    /// Every formula rewrite lands in one atomic request.
    fn batch_update_formulas(
        &mut self,
        side: SheetSide,
        updates: &[FormulaUpdate],
    ) -> Result<(), BackendError>;
}

/// Substrates that can only replay scripted input against a host application,
/// with no acknowledgment channel for individual actions.
pub trait ReplayBackend: SheetBackend {
    fn replay(&mut self, script: &ActionScript) -> Result<(), ScriptError>;
}

/// Failure at one step of a replayed script.
#[derive(Debug, thiserror::Error)]
#[error("replay stopped at step {step} ({action:?}): {source}")]
pub struct ScriptError {
    pub step: usize,
    pub action: KeyAction,
    #[source]
    pub source: BackendError,
}

/// The two capability sets the engine orchestrates over. The relocation logic
/// is written once against the transactional contract and degrades explicitly
/// for replay substrates.
pub enum Backend {
    Transactional(Box<dyn TransactionalBackend>),
    Replay(Box<dyn ReplayBackend>),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Transactional(b) => b.name(),
            Backend::Replay(b) => b.name(),
        }
    }

    pub fn read_region(
        &mut self,
        side: SheetSide,
        span: RowSpan,
    ) -> Result<TabularSnapshot, BackendError> {
        match self {
            Backend::Transactional(b) => b.read_region(side, span),
            Backend::Replay(b) => b.read_region(side, span),
        }
    }

    /// Replay substrates cannot confirm the semantic effect of their writes.
    pub fn verifies_writes(&self) -> bool {
        matches!(self, Backend::Transactional(_))
    }
}
