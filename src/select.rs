use crate::search::MatchCandidate;

/// Outcome of the deterministic disambiguation step. Pure data; blocking and
/// presentation belong to external collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Exactly one candidate; selected without human input.
    Auto(MatchCandidate),
    /// More than one candidate; an external presenter must pick exactly one
    /// or cancel.
    NeedsChoice(ChoiceSet),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceSet {
    candidates: Vec<MatchCandidate>,
}

impl ChoiceSet {
    pub fn candidates(&self) -> &[MatchCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// `None` when the index is out of range; the set stays usable so the
    /// caller can re-present it.
    pub fn choose(&self, index: usize) -> Option<MatchCandidate> {
        self.candidates.get(index).cloned()
    }
}

/// Zero candidates is not an input here; it is handled upstream as the
/// no-match terminal outcome.
pub fn resolve(mut candidates: Vec<MatchCandidate>) -> Resolution {
    debug_assert!(!candidates.is_empty(), "no-match is resolved upstream");
    if candidates.len() == 1 {
        Resolution::Auto(candidates.remove(0))
    } else {
        Resolution::NeedsChoice(ChoiceSet { candidates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(row: u32) -> MatchCandidate {
        MatchCandidate {
            row_position: row,
            cells: vec!["Acme".into()],
        }
    }

    #[test]
    fn single_candidate_auto_selects() {
        match resolve(vec![candidate(2)]) {
            Resolution::Auto(c) => assert_eq!(c.row_position, 2),
            other => panic!("expected auto selection, got {other:?}"),
        }
    }

    #[test]
    fn multiple_candidates_need_a_choice() {
        let Resolution::NeedsChoice(choices) = resolve(vec![candidate(2), candidate(4)]) else {
            panic!("expected a choice set");
        };
        assert_eq!(choices.len(), 2);
        assert_eq!(choices.choose(1).unwrap().row_position, 4);
        assert_eq!(choices.choose(2), None);
    }
}
