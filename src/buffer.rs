//! Working set of filters for one selector and the save-time reconciliation
//! that turns it into persisted records.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info, warn};

use crate::builder::format_to_string;
use crate::store::{Store, StoreError};
use crate::types::{
    validate_clauses, Clause, Filter, FilterId, Selector, SelectorId, SelectorWithFilters,
    ValidationError,
};
use crate::Error;

/// What a successful (or partially successful) save did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    /// The selector as stored.
    pub selector: Selector,
    /// Filters now attached to the selector, as returned by the store.
    pub filters: Vec<Filter>,
    /// Ids of buffered filters that were created during the save.
    pub created: Vec<FilterId>,
    /// Ids of persisted filters deleted because no clause referenced them.
    pub deleted: Vec<FilterId>,
    /// Unsaved buffered filters dropped without a store call.
    pub discarded: usize,
}

impl ReconcileOutcome {
    #[must_use]
    pub fn selector_id(&self) -> SelectorId {
        self.selector.id.unwrap_or_default()
    }

    #[must_use]
    pub fn into_selector_with_filters(self) -> SelectorWithFilters {
        SelectorWithFilters {
            selector: self.selector,
            filters: self.filters,
        }
    }
}

/// Filters collected for the selector being edited, addressed by slot.
///
/// Slots are the indices clauses use in [`Token::Draft`](crate::Token::Draft)
/// placeholders; removing a filter shifts every later slot down by one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterBuffer {
    filters: Vec<Filter>,
}

impl FilterBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter and return its slot.
    pub fn add(&mut self, filter: Filter) -> usize {
        debug!(%filter, persisted = filter.is_persisted(), "filter buffered");
        self.filters.push(filter);
        self.filters.len() - 1
    }

    /// Remove the filter at `slot`; `None` if there is none.
    pub fn remove(&mut self, slot: usize) -> Option<Filter> {
        if slot < self.filters.len() {
            Some(self.filters.remove(slot))
        } else {
            None
        }
    }

    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Filter> {
        self.filters.get(slot)
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    // Degenerate selections have no clauses and exactly one buffered filter.
    fn check_selection(&self, clauses: &[Clause]) -> Result<(), ValidationError> {
        if clauses.is_empty() {
            if self.filters.len() != 1 {
                return Err(ValidationError::EmptySelection {
                    buffered: self.filters.len(),
                });
            }
            return Ok(());
        }
        validate_clauses(clauses)?;
        if let Some(slot) = clauses
            .iter()
            .flat_map(Clause::draft_slots)
            .find(|slot| *slot >= self.filters.len())
        {
            return Err(ValidationError::MissingDraft {
                slot,
                len: self.filters.len(),
            });
        }
        Ok(())
    }

    /// Persist the buffered filters as a selector named `name` with the given
    /// clauses.
    ///
    /// Every filter the clauses reference ends up attached to the new
    /// selector; buffered filters nobody references are deleted (if persisted)
    /// or dropped. On success the buffer is empty.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] before any store call if the selection is empty
    ///   or a clause is malformed.
    /// - [`Error::Store`] if creating a filter or the selector fails; the
    ///   buffer is kept (filters created so far keep their new ids).
    /// - [`Error::PartialReconciliation`] if the selector was saved but some
    ///   filter updates or deletes failed; the buffer is cleared.
    pub async fn reconcile_and_save(
        &mut self,
        store: &dyn Store,
        name: &str,
        clauses: &[Clause],
    ) -> Result<ReconcileOutcome, Error> {
        self.check_selection(clauses)?;

        let mut outcome = ReconcileOutcome::default();

        let referenced: BTreeSet<usize> = if clauses.is_empty() {
            BTreeSet::from([0])
        } else {
            clauses.iter().flat_map(Clause::draft_slots).collect()
        };
        for slot in referenced {
            if self.filters[slot].is_persisted() {
                continue;
            }
            let saved = store.create_filter(&self.filters[slot]).await?;
            let id = saved
                .id
                .ok_or_else(|| StoreError::Invalid("created filter has no id".into()))?;
            debug!(slot, filter_id = id, "buffered filter created");
            self.filters[slot].id = Some(id);
            outcome.created.push(id);
        }

        let operation: Vec<Clause> = if clauses.is_empty() {
            self.filters[0].id.map(Clause::single).into_iter().collect()
        } else {
            clauses
                .iter()
                .map(|c| c.resolve_drafts(|slot| self.filters.get(slot).and_then(|f| f.id)))
                .collect()
        };

        let used: HashSet<FilterId> = operation.iter().flat_map(Clause::filter_ids).collect();
        let buffered: HashSet<FilterId> = self.filters.iter().filter_map(|f| f.id).collect();
        let mut external = Vec::new();
        for id in operation.iter().flat_map(Clause::filter_ids) {
            if buffered.contains(&id) || external.iter().any(|f: &Filter| f.id == Some(id)) {
                continue;
            }
            let filter = store.get_filter(id).await?.ok_or(StoreError::NotFound {
                resource: "filter",
                id,
            })?;
            external.push(filter);
        }

        let name = if name.trim().is_empty() {
            format_to_string(store, &operation, &[]).await
        } else {
            name.to_owned()
        };
        let mut selector = store
            .create_selector(&Selector::new(name, operation))
            .await?;
        let selector_id = selector
            .id
            .ok_or_else(|| StoreError::Invalid("created selector has no id".into()))?;
        if selector.name.trim().is_empty() {
            selector = name_from_representation(store, selector, selector_id).await;
        }
        info!(selector_id, name = %selector.name, "selector saved");
        outcome.selector = selector;

        let mut failures = Vec::new();
        let mut handled = HashSet::new();
        for filter in self.filters.drain(..).chain(external) {
            // A filter buffered twice gets one store call.
            if filter.id.is_some_and(|id| !handled.insert(id)) {
                continue;
            }
            match filter.id {
                Some(id) if used.contains(&id) => {
                    let attached = Filter {
                        selector_id: Some(selector_id),
                        ..filter
                    };
                    match store.update_filter(id, &attached).await {
                        Ok(saved) => outcome.filters.push(saved),
                        Err(e) => {
                            warn!(
                                filter_id = id,
                                selector_id,
                                error = %e,
                                "failed to attach filter"
                            );
                            failures.push((attached, e));
                        }
                    }
                }
                Some(id) => match store.delete_filter(id).await {
                    Ok(()) => outcome.deleted.push(id),
                    Err(e) => {
                        warn!(filter_id = id, error = %e, "failed to delete unused filter");
                        failures.push((filter, e));
                    }
                },
                None => outcome.discarded += 1,
            }
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            warn!(
                selector_id,
                failed = failures.len(),
                "selector saved with unreconciled filters"
            );
            Err(Error::PartialReconciliation {
                outcome: Box::new(outcome),
                failures,
            })
        }
    }
}

// A selector stored without a name takes the store's text rendering of its
// operation. Failure here leaves the selector unnamed.
async fn name_from_representation(
    store: &dyn Store,
    selector: Selector,
    id: SelectorId,
) -> Selector {
    let renamed = match store.selector_representation(id).await {
        Ok(text) => Selector {
            name: text,
            ..selector.clone()
        },
        Err(e) => {
            warn!(selector_id = id, error = %e, "could not fetch selector representation");
            return selector;
        }
    };
    match store.update_selector(id, &renamed).await {
        Ok(saved) => saved,
        Err(e) => {
            warn!(selector_id = id, error = %e, "could not name selector");
            selector
        }
    }
}
