use serde_json::{Map, Value};
use thiserror::Error;

use super::ConstraintKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("unknown constraint type {0}")]
    UnknownKind(String),

    #[error("no editor registered for {0}")]
    Unregistered(ConstraintKind),

    #[error("invalid parameters for {kind}: {message}")]
    InvalidParams {
        kind: ConstraintKind,
        message: String,
    },

    #[error("no constraint type selected")]
    NoActiveEditor,
}

impl ConstraintError {
    pub(crate) fn invalid(kind: ConstraintKind, message: impl ToString) -> Self {
        ConstraintError::InvalidParams {
            kind,
            message: message.to_string(),
        }
    }
}

/// Parameter editor for one constraint kind.
///
/// An editor owns the draft parameters of the active constraint. It is
/// initialized once with stored parameters (possibly empty), edited through
/// [`ConstraintEditor::set`], and torn down before another editor replaces it.
pub trait ConstraintEditor: Send + Sync {
    fn kind(&self) -> ConstraintKind;

    /// Load stored parameters. Missing fields keep their empty defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::InvalidParams`] when a present field has
    /// the wrong shape.
    fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError>;

    /// Merge `params` into the current draft.
    ///
    /// # Errors
    ///
    /// Same as [`ConstraintEditor::initialize`]; on error the draft is unchanged.
    fn set(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError> {
        let mut merged = self.value();
        merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.initialize(&merged)
    }

    /// Current parameters in wire form.
    fn value(&self) -> Map<String, Value>;

    /// Human-readable reasons the current parameters cannot be saved.
    fn issues(&self) -> Vec<String>;

    fn validate(&self) -> bool {
        self.issues().is_empty()
    }

    fn teardown(&mut self);

    fn is_active(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert_eq!(
            ConstraintError::UnknownKind("FOO".into()).to_string(),
            "unknown constraint type FOO"
        );
        assert_eq!(
            ConstraintError::invalid(ConstraintKind::Compactness, "sigma must be a number")
                .to_string(),
            "invalid parameters for COMPACTNESS: sigma must be a number"
        );
        assert_eq!(
            ConstraintError::NoActiveEditor.to_string(),
            "no constraint type selected"
        );
        assert_eq!(
            ConstraintError::Unregistered(ConstraintKind::SameWeek).to_string(),
            "no editor registered for SAME_WEEK"
        );
    }
}
