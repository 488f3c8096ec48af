use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::buffer::FilterBuffer;
use crate::builder::{Element, ExpressionBuilder};
use crate::evaluate::{evaluate_clauses, FilterLookup};
use crate::events::{EventBus, SessionEvent};
use crate::parse::{parse_expression, ParsedElement};
use crate::store::Store;
use crate::types::{
    ClauseCombination, Filter, Resource, ResourceKey, SelectorWithFilters, ValidationError,
};
use crate::Error;

/// Drives one selector from buffered filters and draft clauses to a saved
/// [`SelectorWithFilters`].
#[derive(Debug, Clone, Default)]
pub struct SelectorManager {
    buffer: FilterBuffer,
    builder: ExpressionBuilder,
    events: EventBus,
}

impl SelectorManager {
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            buffer: FilterBuffer::new(),
            builder: ExpressionBuilder::new(),
            events,
        }
    }

    #[must_use]
    pub fn buffer(&self) -> &FilterBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn builder(&self) -> &ExpressionBuilder {
        &self.builder
    }

    /// Structural access to the draft clauses.
    pub fn builder_mut(&mut self) -> &mut ExpressionBuilder {
        &mut self.builder
    }

    /// Buffer a filter and return its slot.
    pub fn add_filter(&mut self, filter: Filter) -> usize {
        let index = self.buffer.add(filter);
        self.events.publish(SessionEvent::FilterAdded { index });
        index
    }

    /// Drop a buffered filter along with every clause reference to it.
    pub fn remove_filter(&mut self, slot: usize) -> Option<Filter> {
        let removed = self.buffer.remove(slot)?;
        self.builder.forget_draft(slot);
        Some(removed)
    }

    /// Replace the draft clauses with parsed expression text.
    ///
    /// Inline filters are appended to the buffer and referenced by slot;
    /// `@id` references a persisted filter, reusing the buffered record when
    /// there is one.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] if the text is not a valid expression; nothing changes.
    pub fn load_text(&mut self, text: &str) -> Result<(), Error> {
        let parsed = parse_expression(text)?;
        self.builder.reset();
        for (index, elements) in parsed.clauses.into_iter().enumerate() {
            self.builder.add_clause();
            for element in elements {
                let element = match element {
                    ParsedElement::Filter(filter) => Element::Draft(self.add_filter(filter)),
                    ParsedElement::Ref(id) => self
                        .buffer
                        .filters()
                        .iter()
                        .find(|f| f.id == Some(id))
                        .map_or_else(|| Element::persisted(id), |f| Element::Filter(f.clone())),
                    ParsedElement::Op(op) => Element::Operator(op),
                };
                let position = self.builder.clauses()[index].len();
                self.builder.insert(index, position, element)?;
            }
        }
        debug!(clauses = self.builder.clauses().len(), "expression text loaded");
        Ok(())
    }

    /// Text preview of the draft expression.
    pub async fn preview_text(&self, store: &dyn Store) -> String {
        self.builder.preview_text(store, self.buffer.filters()).await
    }

    /// Resources the draft expression would select.
    ///
    /// Buffered filters are resolved locally; `known` supplies persisted
    /// filters that clauses reference by id but that are not buffered.
    ///
    /// # Errors
    ///
    /// Fails if a clause is malformed or references an unknown filter.
    pub fn preview_matches(
        &self,
        known: &[Filter],
        resources: &[Resource],
        combination: ClauseCombination,
    ) -> Result<BTreeSet<ResourceKey>, ValidationError> {
        let persisted: Vec<Filter> = known
            .iter()
            .chain(self.buffer.filters().iter().filter(|f| f.is_persisted()))
            .cloned()
            .collect();
        let lookup = FilterLookup::with_drafts(&persisted, self.buffer.filters());
        evaluate_clauses(
            &self.builder.operations_for_backend(),
            &lookup,
            resources,
            combination,
        )
    }

    /// Reconcile the buffer and save the selector under `name` (blank names
    /// fall back to the expression text).
    ///
    /// The draft clauses are reset whenever the selector itself was stored,
    /// including a partial reconciliation.
    ///
    /// # Errors
    ///
    /// See [`FilterBuffer::reconcile_and_save`].
    pub async fn save(
        &mut self,
        store: &dyn Store,
        name: &str,
    ) -> Result<SelectorWithFilters, Error> {
        let clauses = self.builder.operations_for_backend();
        match self.buffer.reconcile_and_save(store, name, &clauses).await {
            Ok(outcome) => {
                self.builder.reset();
                self.events
                    .publish(SessionEvent::SelectorCreated(outcome.selector.clone()));
                info!(
                    selector_id = outcome.selector_id(),
                    filters = outcome.filters.len(),
                    "selector created"
                );
                Ok(outcome.into_selector_with_filters())
            }
            Err(Error::PartialReconciliation { outcome, failures }) => {
                self.builder.reset();
                self.events
                    .publish(SessionEvent::SelectorCreated(outcome.selector.clone()));
                Err(Error::PartialReconciliation { outcome, failures })
            }
            Err(e) => Err(e),
        }
    }

    /// Drop buffered filters and draft clauses without touching the store.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.builder.reset();
    }
}
