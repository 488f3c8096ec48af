mod clause;
mod error;
mod filter;
mod operator;
mod resource;
mod rule;
mod selector;

pub use clause::{validate_clauses, Clause, Token};
pub use error::{ClauseDefect, ValidationError};
pub use filter::{Filter, FilterId, Rank, RuleId, SelectorId};
pub use operator::SetOp;
pub use resource::{Resource, ResourceKey};
pub use rule::{Constraint, Rule, RuleMetadata};
pub use selector::{ClauseCombination, Selector, SelectorWithFilters};
