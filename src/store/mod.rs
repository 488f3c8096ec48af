//! Persistence boundary.
//!
//! Everything the engine persists goes through [`Store`]. [`HttpStore`] speaks
//! the REST API; [`MemoryStore`] keeps everything in process and records the
//! calls it receives.

#[cfg(feature = "http")]
mod http;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Filter, FilterId, Rule, RuleId, Selector, SelectorId, SelectorWithFilters};

#[cfg(feature = "http")]
pub use http::HttpStore;
pub use memory::{MemoryStore, StoreCall};

/// A failed store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: u64 },

    #[error("{url} returned {status}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("rejected by store: {0}")]
    Invalid(String),

    #[error("injected failure on {0}")]
    Injected(String),
}

/// Asynchronous CRUD over filters, selectors and rules.
///
/// Single fetches return `Ok(None)` when the record does not exist; updates
/// and deletes of missing records fail with [`StoreError::NotFound`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_filters(&self) -> Result<Vec<Filter>, StoreError>;
    async fn get_filter(&self, id: FilterId) -> Result<Option<Filter>, StoreError>;
    async fn create_filter(&self, filter: &Filter) -> Result<Filter, StoreError>;
    async fn update_filter(&self, id: FilterId, filter: &Filter) -> Result<Filter, StoreError>;
    async fn delete_filter(&self, id: FilterId) -> Result<(), StoreError>;
    /// Text form of a persisted filter, as rendered by the store.
    async fn filter_representation(&self, id: FilterId) -> Result<String, StoreError>;

    async fn list_selectors(&self) -> Result<Vec<Selector>, StoreError>;
    async fn get_selector(&self, id: SelectorId) -> Result<Option<Selector>, StoreError>;
    async fn create_selector(&self, selector: &Selector) -> Result<Selector, StoreError>;
    async fn update_selector(
        &self,
        id: SelectorId,
        selector: &Selector,
    ) -> Result<Selector, StoreError>;
    async fn delete_selector(&self, id: SelectorId) -> Result<(), StoreError>;
    async fn selector_with_filters(
        &self,
        id: SelectorId,
    ) -> Result<Option<SelectorWithFilters>, StoreError>;
    async fn selector_representation(&self, id: SelectorId) -> Result<String, StoreError>;

    async fn list_rules(&self) -> Result<Vec<Rule>, StoreError>;
    async fn get_rule(&self, id: RuleId) -> Result<Option<Rule>, StoreError>;
    /// The rule including its resolved constraint.
    async fn complete_rule(&self, id: RuleId) -> Result<Option<Rule>, StoreError>;
    async fn rule_selectors(&self, id: RuleId) -> Result<Vec<SelectorWithFilters>, StoreError>;
    /// Create a rule and attach `selector_ids` in one call.
    async fn create_rule_with_selectors(
        &self,
        rule: &Rule,
        selector_ids: &[SelectorId],
    ) -> Result<Rule, StoreError>;
    async fn update_rule(&self, id: RuleId, rule: &Rule) -> Result<Rule, StoreError>;
    /// Replace the rule's selector list wholesale.
    async fn replace_rule_selectors(
        &self,
        id: RuleId,
        selector_ids: &[SelectorId],
    ) -> Result<(), StoreError>;
    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError>;
}
