use crate::errors::RelocateError;
use crate::search::MatchCandidate;
use crate::select::{self, ChoiceSet, Resolution};
use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Two-stage confirmation state machine wrapping one relocation.
///
/// The engine yields control at exactly two points (the search confirmation
/// and the execution confirmation) plus the optional selection step, and
/// resumes only on an explicit decision. No path reaches `Executing` without
/// two independent affirmative confirmations; a negative answer at either
/// gate returns to `Idle` before a single backend call has been made.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum GateState {
    Idle,
    AwaitingSearchConfirm {
        keyword: String,
    },
    Searching {
        keyword: String,
    },
    AwaitingSelection {
        keyword: String,
        choices: ChoiceSet,
    },
    AwaitingFinalConfirm {
        keyword: String,
        candidate: MatchCandidate,
    },
    Executing {
        keyword: String,
        candidate: MatchCandidate,
    },
}

impl GateState {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Terminal states. Every one of them returns the gate to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Display)]
pub enum Terminal {
    /// `verified` is false for replay substrates, which can only report that
    /// the script ran to completion.
    Success { verified: bool },
    NoMatch,
    Cancelled,
    PartialFailure,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("a non-empty search keyword is required")]
    EmptyKeyword,
    #[error("choice {index} is out of range ({count} candidates)")]
    InvalidChoice { index: usize, count: usize },
    #[error("{event} is not valid while {state}")]
    InvalidTransition {
        event: &'static str,
        state: &'static str,
    },
}

impl From<GateError> for RelocateError {
    fn from(err: GateError) -> Self {
        RelocateError::Validation(err.to_string())
    }
}

/// Where a finished search leads.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchStep {
    /// Terminal; the gate is back to `Idle`.
    NoMatch,
    /// Several candidates; present them and call `select`.
    ChooseAmong(ChoiceSet),
    /// Exactly one candidate; ask for the second confirmation.
    ConfirmExecution(MatchCandidate),
}

#[derive(Debug)]
pub struct ConfirmationGate {
    state: GateState,
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GateState::Idle)
    }

    fn refuse(&self, event: &'static str) -> GateError {
        GateError::InvalidTransition {
            event,
            state: self.state.name(),
        }
    }

    /// Submit a keyword. An empty keyword refuses the transition and the gate
    /// stays `Idle`.
    pub fn submit(&mut self, keyword: &str) -> Result<(), GateError> {
        if !matches!(self.state, GateState::Idle) {
            return Err(self.refuse("submit"));
        }
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(GateError::EmptyKeyword);
        }
        self.state = GateState::AwaitingSearchConfirm {
            keyword: keyword.to_string(),
        };
        Ok(())
    }

    /// First confirmation. Returns the keyword to search for, or `None` when
    /// declined; declining performs no search, not even speculatively.
    pub fn confirm_search(&mut self, affirmed: bool) -> Result<Option<String>, GateError> {
        let GateState::AwaitingSearchConfirm { keyword } = &self.state else {
            return Err(self.refuse("confirm_search"));
        };
        let keyword = keyword.clone();
        if affirmed {
            self.state = GateState::Searching {
                keyword: keyword.clone(),
            };
            Ok(Some(keyword))
        } else {
            tracing::info!("search declined, returning to idle");
            self.state = GateState::Idle;
            Ok(None)
        }
    }

    /// Search results arrive. Routes to the no-match terminal, the selection
    /// step, or directly to the final confirmation.
    pub fn search_finished(
        &mut self,
        candidates: Vec<MatchCandidate>,
    ) -> Result<SearchStep, GateError> {
        let GateState::Searching { keyword } = &self.state else {
            return Err(self.refuse("search_finished"));
        };
        let keyword = keyword.clone();

        if candidates.is_empty() {
            self.state = GateState::Idle;
            return Ok(SearchStep::NoMatch);
        }

        match select::resolve(candidates) {
            Resolution::Auto(candidate) => {
                self.state = GateState::AwaitingFinalConfirm {
                    keyword,
                    candidate: candidate.clone(),
                };
                Ok(SearchStep::ConfirmExecution(candidate))
            }
            Resolution::NeedsChoice(choices) => {
                self.state = GateState::AwaitingSelection {
                    keyword,
                    choices: choices.clone(),
                };
                Ok(SearchStep::ChooseAmong(choices))
            }
        }
    }

    /// A read failure while searching; terminal, back to `Idle`.
    pub fn search_failed(&mut self) -> Result<(), GateError> {
        if !matches!(self.state, GateState::Searching { .. }) {
            return Err(self.refuse("search_failed"));
        }
        self.state = GateState::Idle;
        Ok(())
    }

    /// Resolve the selection step. `None` cancels back to `Idle`; an
    /// out-of-range index leaves the gate awaiting selection so the choices
    /// can be presented again.
    pub fn select(&mut self, choice: Option<usize>) -> Result<Option<MatchCandidate>, GateError> {
        let GateState::AwaitingSelection { keyword, choices } = &self.state else {
            return Err(self.refuse("select"));
        };

        let Some(index) = choice else {
            self.state = GateState::Idle;
            return Ok(None);
        };

        match choices.choose(index) {
            Some(candidate) => {
                let keyword = keyword.clone();
                self.state = GateState::AwaitingFinalConfirm {
                    keyword,
                    candidate: candidate.clone(),
                };
                Ok(Some(candidate))
            }
            None => Err(GateError::InvalidChoice {
                index,
                count: choices.len(),
            }),
        }
    }

    /// Second confirmation, the last stop before any mutating call. Returns
    /// the candidate to execute, or `None` when declined.
    pub fn confirm_execution(&mut self, affirmed: bool) -> Result<Option<MatchCandidate>, GateError> {
        let GateState::AwaitingFinalConfirm { keyword, candidate } = &self.state else {
            return Err(self.refuse("confirm_execution"));
        };
        if affirmed {
            let keyword = keyword.clone();
            let candidate = candidate.clone();
            self.state = GateState::Executing {
                keyword,
                candidate: candidate.clone(),
            };
            Ok(Some(candidate))
        } else {
            tracing::info!("execution declined, returning to idle");
            self.state = GateState::Idle;
            Ok(None)
        }
    }

    /// Record the terminal outcome of the execution; the gate returns to
    /// `Idle` and is ready for the next relocation.
    pub fn finish(&mut self, terminal: Terminal) -> Result<(), GateError> {
        if !matches!(self.state, GateState::Executing { .. }) {
            return Err(self.refuse("finish"));
        }
        tracing::debug!(%terminal, "relocation finished");
        self.state = GateState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn candidate(row: u32) -> MatchCandidate {
        MatchCandidate {
            row_position: row,
            cells: vec!["Acme".into()],
        }
    }

    #[test]
    fn empty_keyword_refuses_the_submit_transition() {
        let mut gate = ConfirmationGate::new();
        assert_eq!(gate.submit("   "), Err(GateError::EmptyKeyword));
        assert!(gate.is_idle());
    }

    #[test]
    fn declining_the_first_gate_returns_to_idle() {
        let mut gate = ConfirmationGate::new();
        gate.submit("acme").unwrap();
        assert_eq!(gate.confirm_search(false).unwrap(), None);
        assert!(gate.is_idle());
    }

    #[test]
    fn declining_the_second_gate_returns_to_idle() {
        let mut gate = ConfirmationGate::new();
        gate.submit("acme").unwrap();
        gate.confirm_search(true).unwrap();
        gate.search_finished(vec![candidate(2)]).unwrap();
        assert_eq!(gate.confirm_execution(false).unwrap(), None);
        assert!(gate.is_idle());
    }

    #[test]
    fn zero_candidates_terminate_as_no_match() {
        let mut gate = ConfirmationGate::new();
        gate.submit("acme").unwrap();
        gate.confirm_search(true).unwrap();
        assert_matches!(gate.search_finished(vec![]), Ok(SearchStep::NoMatch));
        assert!(gate.is_idle());
    }

    #[test]
    fn single_candidate_skips_the_selection_step() {
        let mut gate = ConfirmationGate::new();
        gate.submit("acme").unwrap();
        gate.confirm_search(true).unwrap();
        assert_matches!(
            gate.search_finished(vec![candidate(2)]),
            Ok(SearchStep::ConfirmExecution(_))
        );
        assert_matches!(gate.state(), GateState::AwaitingFinalConfirm { .. });
    }

    #[test]
    fn selection_cancel_and_out_of_range() {
        let mut gate = ConfirmationGate::new();
        gate.submit("acme").unwrap();
        gate.confirm_search(true).unwrap();
        assert_matches!(
            gate.search_finished(vec![candidate(2), candidate(4)]),
            Ok(SearchStep::ChooseAmong(_))
        );

        assert_eq!(
            gate.select(Some(5)),
            Err(GateError::InvalidChoice { index: 5, count: 2 })
        );
        assert_matches!(gate.state(), GateState::AwaitingSelection { .. });

        assert_eq!(gate.select(None).unwrap(), None);
        assert!(gate.is_idle());
    }

    #[test]
    fn full_path_requires_both_confirmations() {
        let mut gate = ConfirmationGate::new();
        gate.submit("acme").unwrap();
        gate.confirm_search(true).unwrap();
        gate.search_finished(vec![candidate(2), candidate(4)]).unwrap();
        let chosen = gate.select(Some(1)).unwrap().unwrap();
        assert_eq!(chosen.row_position, 4);
        let executing = gate.confirm_execution(true).unwrap().unwrap();
        assert_eq!(executing.row_position, 4);
        assert_matches!(gate.state(), GateState::Executing { .. });
        gate.finish(Terminal::Success { verified: true }).unwrap();
        assert!(gate.is_idle());
    }

    #[test]
    fn no_transition_skips_a_gate() {
        let mut gate = ConfirmationGate::new();
        assert_matches!(
            gate.confirm_execution(true),
            Err(GateError::InvalidTransition { .. })
        );
        gate.submit("acme").unwrap();
        assert_matches!(
            gate.confirm_execution(true),
            Err(GateError::InvalidTransition { .. })
        );
        assert_matches!(
            gate.search_finished(vec![candidate(2)]),
            Err(GateError::InvalidTransition { .. })
        );
        assert_matches!(gate.finish(Terminal::Failed), Err(GateError::InvalidTransition { .. }));
    }
}
