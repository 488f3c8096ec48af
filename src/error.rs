use thiserror::Error;

use crate::buffer::ReconcileOutcome;
use crate::builder::EditError;
use crate::config::ConfigError;
use crate::constraint::ConstraintError;
use crate::parse::ParseError;
use crate::store::StoreError;
use crate::types::{Filter, ValidationError};

/// Unified error type for session operations.
///
/// Local failures ([`ValidationError`], [`ConstraintError`], [`EditError`])
/// are raised before any store call. [`Error::PartialReconciliation`] means
/// the selector was saved but some of its filters could not be updated.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("selector {} saved but {} filters failed to update", .outcome.selector_id(), .failures.len())]
    PartialReconciliation {
        outcome: Box<ReconcileOutcome>,
        failures: Vec<(Filter, StoreError)>,
    },
}

impl Error {
    /// `true` for failures detected before anything was sent to the store.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Constraint(_) | Error::Edit(_) | Error::Parse(_)
        )
    }
}
