//! Rule authoring for a course scheduler.
//!
//! A [`Selector`] is a persisted set-algebra expression over [`Filter`]s; a
//! [`Rule`] pairs selectors with one typed [`Constraint`]. A [`Session`]
//! builds both and saves them through a [`Store`].

mod buffer;
mod builder;
mod composer;
pub mod config;
pub mod constraint;
mod error;
mod evaluate;
pub mod events;
pub mod parse;
mod selector_manager;
pub mod store;
mod types;

pub use buffer::{FilterBuffer, ReconcileOutcome};
pub use builder::{
    format_to_string, DraftClause, EditError, Element, ExpressionBuilder, NO_OPERATIONS,
};
pub use composer::{RuleSummary, Session, SessionState};
pub use config::EditorConfig;
pub use constraint::{ConstraintEditor, ConstraintError, ConstraintKind, ConstraintRegistry};
pub use error::Error;
pub use events::{EventBus, SessionEvent};
pub use selector_manager::SelectorManager;
pub use store::{MemoryStore, Store, StoreError};
pub use types::{
    validate_clauses, Clause, ClauseCombination, ClauseDefect, Constraint, Filter, FilterId, Rank,
    Resource, ResourceKey, Rule, RuleId, RuleMetadata, Selector, SelectorId, SelectorWithFilters,
    SetOp, Token, ValidationError,
};

#[cfg(feature = "http")]
pub use store::HttpStore;
