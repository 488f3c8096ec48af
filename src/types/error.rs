use std::fmt;

use thiserror::Error;

use super::filter::{FilterId, SelectorId};

/// Why a clause failed the alternation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseDefect {
    Empty,
    ExpectedFilter { position: usize },
    ExpectedOperator { position: usize },
    EndsWithOperator,
}

impl fmt::Display for ClauseDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClauseDefect::Empty => write!(f, "clause is empty"),
            ClauseDefect::ExpectedFilter { position } => {
                write!(f, "expected a filter at position {position}")
            }
            ClauseDefect::ExpectedOperator { position } => {
                write!(f, "expected an operator at position {position}")
            }
            ClauseDefect::EndsWithOperator => write!(f, "clause ends with an operator"),
        }
    }
}

/// Local validation failures, raised before any store call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cannot save a selector with no operations unless exactly one filter is buffered (found {buffered})")]
    EmptySelection { buffered: usize },

    #[error("clause {index} is malformed: {defect}")]
    MalformedClause { index: usize, defect: ClauseDefect },

    #[error("clause references buffered filter slot {slot}, but the buffer holds {len} filters")]
    MissingDraft { slot: usize, len: usize },

    #[error("unknown filter {id}")]
    UnknownFilter { id: FilterId },

    #[error("please select at least one selector")]
    NoSelector,

    #[error("selector {id} is already attached to the rule")]
    DuplicateSelector { id: SelectorId },

    #[error("selector has not been saved yet")]
    UnsavedSelector,

    #[error("please select a constraint type")]
    NoConstraintKind,

    #[error("constraint {kind} is incomplete: {}", issues.join("; "))]
    InvalidConstraint { kind: String, issues: Vec<String> },

    #[error("rule name must not be empty")]
    EmptyRuleName,
}
