//! Moves a matching ledger row from a pending list to a done list while
//! keeping the running-total formulas correct, portable across substrates
//! with very different capability levels: a local workbook file, a remote
//! spreadsheet API, and one-shot keystroke replay against an application the
//! engine cannot query.

pub mod address;
pub mod backend;
pub mod config;
pub mod errors;
pub mod export;
pub mod gate;
pub mod marker;
pub mod notify;
pub mod plan;
pub mod relocate;
pub mod search;
pub mod select;
pub mod session;
pub mod snapshot;
pub mod ui;

pub use backend::{Backend, LocalFileBackend, RemoteApiBackend, UiReplayBackend};
pub use errors::{BackendError, RelocateError};
pub use gate::{ConfirmationGate, Terminal};
pub use relocate::{RelocationOutcome, RelocationRules, Relocator};
pub use session::{RelocationSession, SessionRegistry};
