//! Rule composition: attached selectors, one constraint and metadata, saved
//! together as a [`Rule`].

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::EditorConfig;
use crate::constraint::{ConstraintKind, ConstraintRegistry};
use crate::events::{EventBus, SessionEvent};
use crate::selector_manager::SelectorManager;
use crate::store::{Store, StoreError};
use crate::types::{
    ClauseCombination, Filter, Rule, RuleId, RuleMetadata, SelectorId, SelectorWithFilters,
    ValidationError,
};
use crate::Error;

/// Where a session is in the edit/save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Empty,
    Building,
    ReadyToSave,
    Saved,
    /// An existing rule was loaded for editing.
    Loaded,
}

/// Human-readable overview of the rule being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSummary {
    pub name: String,
    pub constraint: Option<ConstraintKind>,
    pub selectors: Vec<(Option<SelectorId>, String)>,
}

impl fmt::Display for RuleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "(unnamed)" } else { &self.name };
        writeln!(f, "Rule: {name}")?;
        match self.constraint {
            Some(kind) => writeln!(f, "Constraint: {} ({kind})", kind.display_name())?,
            None => writeln!(f, "Constraint: none")?,
        }
        write!(f, "Selectors: {}", self.selectors.len())?;
        for (id, name) in &self.selectors {
            match id {
                Some(id) => write!(f, "\n  - {name} (#{id})")?,
                None => write!(f, "\n  - {name}")?,
            }
        }
        Ok(())
    }
}

/// One rule editing session.
///
/// Owns the selector being built, the constraint registry and the selectors
/// attached so far. Store calls are awaited one at a time.
pub struct Session {
    store: Arc<dyn Store>,
    selectors: SelectorManager,
    registry: ConstraintRegistry,
    metadata: RuleMetadata,
    attached: Vec<SelectorWithFilters>,
    rule: Option<Rule>,
    state: SessionState,
    events: EventBus,
    combination: ClauseCombination,
}

impl Session {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: &EditorConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            store,
            selectors: SelectorManager::new(events.clone()),
            registry: ConstraintRegistry::new(config.max_sigma).with_events(events.clone()),
            metadata: RuleMetadata::default(),
            attached: Vec::new(),
            rule: None,
            state: SessionState::Empty,
            events,
            combination: config.clause_combination,
        }
    }

    /// Replace the constraint registry, e.g. with one holding custom editors.
    #[must_use]
    pub fn with_registry(mut self, registry: ConstraintRegistry) -> Self {
        self.registry = registry.with_events(self.events.clone());
        self
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn selectors(&self) -> &SelectorManager {
        &self.selectors
    }

    pub fn selectors_mut(&mut self) -> &mut SelectorManager {
        self.touch();
        &mut self.selectors
    }

    #[must_use]
    pub fn registry(&self) -> &ConstraintRegistry {
        &self.registry
    }

    #[must_use]
    pub fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn attached(&self) -> &[SelectorWithFilters] {
        &self.attached
    }

    /// The rule loaded for editing, if any.
    #[must_use]
    pub fn rule(&self) -> Option<&Rule> {
        self.rule.as_ref()
    }

    #[must_use]
    pub fn combination(&self) -> ClauseCombination {
        self.combination
    }

    // Any edit invalidates an earlier validation. A loaded rule stays Loaded
    // until it is validated again.
    fn touch(&mut self) {
        if matches!(
            self.state,
            SessionState::Empty | SessionState::ReadyToSave | SessionState::Saved
        ) {
            self.state = SessionState::Building;
        }
    }

    pub fn add_filter(&mut self, filter: Filter) -> usize {
        self.touch();
        self.selectors.add_filter(filter)
    }

    /// Load expression text into the selector being built.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] for invalid text.
    pub fn load_selector_text(&mut self, text: &str) -> Result<(), Error> {
        self.touch();
        self.selectors.load_text(text)
    }

    /// Save the selector being built and attach it to the rule.
    ///
    /// A partially reconciled selector is attached as well, since it exists
    /// in the store.
    ///
    /// # Errors
    ///
    /// See [`SelectorManager::save`].
    pub async fn save_selector(&mut self, name: &str) -> Result<SelectorWithFilters, Error> {
        self.touch();
        match self.selectors.save(self.store.as_ref(), name).await {
            Ok(saved) => {
                self.attach_selector(saved.clone())?;
                Ok(saved)
            }
            Err(Error::PartialReconciliation { outcome, failures }) => {
                self.attach_selector((*outcome).clone().into_selector_with_filters())?;
                Err(Error::PartialReconciliation { outcome, failures })
            }
            Err(e) => {
                error!(error = %e, "failed to save selector");
                Err(e)
            }
        }
    }

    /// # Errors
    ///
    /// [`ValidationError::UnsavedSelector`] for a selector without id,
    /// [`ValidationError::DuplicateSelector`] if it is already attached.
    pub fn attach_selector(
        &mut self,
        selector: SelectorWithFilters,
    ) -> Result<(), ValidationError> {
        let id = selector.id().ok_or(ValidationError::UnsavedSelector)?;
        if self.attached.iter().any(|s| s.id() == Some(id)) {
            return Err(ValidationError::DuplicateSelector { id });
        }
        self.touch();
        self.attached.push(selector);
        self.events.publish(SessionEvent::SelectorAttached(id));
        Ok(())
    }

    /// Fetch a stored selector with its filters and attach it.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the selector does not exist, or any error
    /// of [`Session::attach_selector`].
    pub async fn attach_selector_by_id(&mut self, id: SelectorId) -> Result<(), Error> {
        if self.attached.iter().any(|s| s.id() == Some(id)) {
            return Err(ValidationError::DuplicateSelector { id }.into());
        }
        let selector = self
            .store
            .selector_with_filters(id)
            .await?
            .ok_or(StoreError::NotFound {
                resource: "selector",
                id,
            })?;
        self.attach_selector(selector)?;
        Ok(())
    }

    /// Detach a selector from the rule; the stored selector is untouched.
    pub fn detach_selector(&mut self, id: SelectorId) -> Option<SelectorWithFilters> {
        let position = self.attached.iter().position(|s| s.id() == Some(id))?;
        self.touch();
        let removed = self.attached.remove(position);
        self.events.publish(SessionEvent::SelectorDetached(id));
        Some(removed)
    }

    /// Load a fresh editor for `kind`, replacing the current one.
    ///
    /// # Errors
    ///
    /// See [`ConstraintRegistry::load`].
    pub fn select_constraint(
        &mut self,
        kind: ConstraintKind,
        params: &Map<String, Value>,
    ) -> Result<(), Error> {
        self.touch();
        self.registry.load(kind, params)?;
        Ok(())
    }

    /// # Errors
    ///
    /// See [`ConstraintRegistry::set_params`].
    pub fn set_constraint_params(&mut self, params: &Map<String, Value>) -> Result<(), Error> {
        self.touch();
        self.registry.set_params(params)?;
        Ok(())
    }

    pub fn set_metadata(&mut self, metadata: RuleMetadata) {
        self.touch();
        self.metadata = metadata;
    }

    /// Check that at least one selector is attached and the chosen constraint
    /// is complete. Moves the session to [`SessionState::ReadyToSave`].
    ///
    /// # Errors
    ///
    /// The first [`ValidationError`] found; the state is left unchanged.
    pub fn validate_rule_components(&mut self) -> Result<(), ValidationError> {
        if self.attached.is_empty() {
            return Err(ValidationError::NoSelector);
        }
        let kind = self
            .registry
            .active_kind()
            .ok_or(ValidationError::NoConstraintKind)?;
        if !self.registry.validate() {
            return Err(ValidationError::InvalidConstraint {
                kind: kind.to_string(),
                issues: self.registry.issues(),
            });
        }
        self.state = SessionState::ReadyToSave;
        Ok(())
    }

    fn selector_ids(&self) -> Vec<SelectorId> {
        self.attached.iter().filter_map(SelectorWithFilters::id).collect()
    }

    /// The rule as it would be saved now.
    #[must_use]
    pub fn draft_rule(&self) -> Rule {
        Rule {
            id: self.rule.as_ref().and_then(|r| r.id),
            constraint: self.registry.constraint(),
            selectors: self.selector_ids(),
            ..Rule::default()
        }
        .with_metadata(self.metadata.clone())
    }

    /// Validate and persist the rule.
    ///
    /// A loaded rule is updated in place and its selector list replaced; a
    /// new rule is created together with its selectors, after which the form
    /// is cleared.
    ///
    /// # Errors
    ///
    /// Validation errors leave the state unchanged. A store error moves the
    /// session back to [`SessionState::ReadyToSave`].
    pub async fn save_rule(&mut self) -> Result<Rule, Error> {
        let previous = self.state;
        self.validate_rule_components()?;
        if let Err(e) = self.metadata.validate() {
            self.state = previous;
            return Err(e.into());
        }

        let rule = self.draft_rule();
        let selector_ids = rule.selectors.clone();
        let result = match rule.id {
            Some(id) => self.update_existing(id, &rule, &selector_ids).await,
            None => self.store.create_rule_with_selectors(&rule, &selector_ids).await,
        };

        match result {
            Ok(saved) => {
                info!(
                    rule_id = ?saved.id,
                    name = %saved.name,
                    selectors = selector_ids.len(),
                    "rule saved"
                );
                if rule.id.is_some() {
                    self.rule = Some(saved.clone());
                } else {
                    self.clear_form();
                }
                self.state = SessionState::Saved;
                self.events.publish(SessionEvent::RuleSaved(saved.clone()));
                Ok(saved)
            }
            Err(e) => {
                error!(%rule, error = %e, "failed to save rule");
                self.state = SessionState::ReadyToSave;
                Err(e.into())
            }
        }
    }

    async fn update_existing(
        &self,
        id: RuleId,
        rule: &Rule,
        selector_ids: &[SelectorId],
    ) -> Result<Rule, StoreError> {
        let updated = self.store.update_rule(id, rule).await?;
        self.store.replace_rule_selectors(id, selector_ids).await?;
        Ok(Rule {
            selectors: selector_ids.to_vec(),
            ..updated
        })
    }

    /// Load a stored rule, its constraint and its selectors for editing.
    ///
    /// A stored constraint the registry cannot load is logged and left
    /// unselected.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for an unknown rule, or any store error; the
    /// session is untouched on failure.
    pub async fn load_rule(&mut self, id: RuleId) -> Result<Rule, Error> {
        let rule = self
            .store
            .complete_rule(id)
            .await?
            .ok_or(StoreError::NotFound { resource: "rule", id })?;
        let selectors = self.store.rule_selectors(id).await?;

        self.reset_local();
        if let Some(constraint) = &rule.constraint {
            if let Err(e) = self.registry.load(constraint.kind, &constraint.params) {
                warn!(
                    rule_id = id,
                    kind = %constraint.kind,
                    error = %e,
                    "stored constraint not loaded"
                );
            }
        }
        self.metadata = rule.metadata();
        self.attached = selectors;
        self.rule = Some(rule.clone());
        self.state = SessionState::Loaded;
        info!(rule_id = id, selectors = self.attached.len(), "rule loaded");
        Ok(rule)
    }

    fn reset_local(&mut self) {
        self.selectors.reset();
        self.registry.unload();
        self.metadata = RuleMetadata::default();
        self.attached.clear();
        self.rule = None;
        self.state = SessionState::Empty;
    }

    /// Reset the whole form. Nothing is deleted from the store.
    pub fn clear_form(&mut self) {
        self.reset_local();
        self.events.publish(SessionEvent::FormCleared);
        info!("rule form cleared");
    }

    /// # Errors
    ///
    /// Any store error.
    pub async fn list_rules(&self) -> Result<Vec<Rule>, Error> {
        Ok(self.store.list_rules().await?)
    }

    /// Delete a stored rule, clearing the form if it was the one loaded.
    ///
    /// # Errors
    ///
    /// Any store error; the form is untouched on failure.
    pub async fn delete_rule(&mut self, id: RuleId) -> Result<(), Error> {
        if let Err(e) = self.store.delete_rule(id).await {
            error!(rule_id = id, error = %e, "failed to delete rule");
            return Err(e.into());
        }
        info!(rule_id = id, "rule deleted");
        if self.rule.as_ref().and_then(|r| r.id) == Some(id) {
            self.clear_form();
        }
        Ok(())
    }

    #[must_use]
    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            name: self.metadata.name.clone(),
            constraint: self.registry.active_kind(),
            selectors: self
                .attached
                .iter()
                .map(|s| (s.id(), s.selector.name.clone()))
                .collect(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("selectors", &self.selectors)
            .field("registry", &self.registry)
            .field("metadata", &self.metadata)
            .field("attached", &self.selector_ids())
            .field("rule", &self.rule.as_ref().and_then(|r| r.id))
            .finish_non_exhaustive()
    }
}
