use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::editors::{
    CompactnessEditor, ListEditor, MinMaxGapEditor, SameDayEditor, SameWeekEditor,
    SequencedEditor, WorkloadEditor,
};
use super::flag::FlagEditor;
use super::{ConstraintEditor, ConstraintError, ConstraintKind};
use crate::events::{EventBus, SessionEvent};
use crate::types::Constraint;

/// Builds a fresh, uninitialized editor.
pub type EditorFactory = Box<dyn Fn() -> Box<dyn ConstraintEditor> + Send + Sync>;

/// Maps constraint kinds to editor factories and owns the single active editor.
///
/// Loading a kind always tears the current editor down before the next one is
/// constructed, so at most one editor is ever active.
pub struct ConstraintRegistry {
    factories: HashMap<ConstraintKind, EditorFactory>,
    active: Option<Box<dyn ConstraintEditor>>,
    events: Option<EventBus>,
}

impl ConstraintRegistry {
    /// A registry with an editor for every [`ConstraintKind`].
    #[must_use]
    pub fn new(max_sigma: u32) -> Self {
        let mut registry = Self::empty();
        for kind in ConstraintKind::ALL {
            if kind.is_flag() {
                registry.register(kind, move || Box::new(FlagEditor::new(kind)));
            } else if let Some(editor) = ListEditor::for_kind(kind) {
                registry.register(kind, move || Box::new(editor.clone()));
            }
        }
        registry.register(ConstraintKind::Sequenced, || Box::new(SequencedEditor::new()));
        registry.register(ConstraintKind::MinMaxGap, || Box::new(MinMaxGapEditor::new()));
        registry.register(ConstraintKind::Compactness, move || {
            Box::new(CompactnessEditor::new(max_sigma))
        });
        registry.register(ConstraintKind::SameDay, || Box::new(SameDayEditor::new()));
        registry.register(ConstraintKind::SameWeek, || Box::new(SameWeekEditor::new()));
        registry.register(ConstraintKind::SessionWorkload, || {
            Box::new(WorkloadEditor::new())
        });
        registry
    }

    /// A registry with no factories.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            active: None,
            events: None,
        }
    }

    /// Register or replace the factory for `kind`.
    pub fn register<F>(&mut self, kind: ConstraintKind, factory: F)
    where
        F: Fn() -> Box<dyn ConstraintEditor> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Registered kinds in catalog order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ConstraintKind> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Replace the active editor with a fresh editor for `kind`, initialized
    /// from `params`.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::Unregistered`] leaves the current editor in place.
    /// [`ConstraintError::InvalidParams`] leaves no editor active.
    pub fn load(
        &mut self,
        kind: ConstraintKind,
        params: &Map<String, Value>,
    ) -> Result<(), ConstraintError> {
        let factory = self
            .factories
            .get(&kind)
            .ok_or(ConstraintError::Unregistered(kind))?;

        if let Some(mut previous) = self.active.take() {
            debug!(kind = %previous.kind(), "tearing down constraint editor");
            previous.teardown();
        }

        let mut editor = factory();
        if let Err(e) = editor.initialize(params) {
            warn!(%kind, error = %e, "constraint parameters rejected");
            self.notify();
            return Err(e);
        }
        debug!(%kind, "constraint editor loaded");
        self.active = Some(editor);
        self.notify();
        Ok(())
    }

    /// Tear down the active editor without loading another.
    pub fn unload(&mut self) {
        if let Some(mut editor) = self.active.take() {
            editor.teardown();
            self.notify();
        }
    }

    /// Merge `params` into the active editor's draft.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::NoActiveEditor`] when nothing is loaded, or the
    /// editor's own error for badly shaped parameters.
    pub fn set_params(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError> {
        let editor = self
            .active
            .as_mut()
            .ok_or(ConstraintError::NoActiveEditor)?;
        editor.set(params)?;
        self.notify();
        Ok(())
    }

    #[must_use]
    pub fn active_kind(&self) -> Option<ConstraintKind> {
        self.active.as_ref().map(|e| e.kind())
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    /// Parameters of the active editor, `None` if nothing is loaded.
    #[must_use]
    pub fn current_data(&self) -> Option<Map<String, Value>> {
        self.active.as_ref().map(|e| e.value())
    }

    /// `false` when nothing is loaded.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.active.as_ref().is_some_and(|e| e.validate())
    }

    #[must_use]
    pub fn issues(&self) -> Vec<String> {
        match &self.active {
            Some(editor) => editor.issues(),
            None => vec![ConstraintError::NoActiveEditor.to_string()],
        }
    }

    /// The active configuration as a storable [`Constraint`].
    #[must_use]
    pub fn constraint(&self) -> Option<Constraint> {
        self.active
            .as_ref()
            .map(|e| Constraint::new(e.kind(), e.value()))
    }

    fn notify(&self) {
        if let Some(events) = &self.events {
            events.publish(SessionEvent::ConstraintChanged {
                kind: self.active_kind(),
                data: self.current_data(),
            });
        }
    }
}

impl Default for ConstraintRegistry {
    fn default() -> Self {
        Self::new(CompactnessEditor::DEFAULT_MAX_SIGMA)
    }
}

impl fmt::Debug for ConstraintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintRegistry")
            .field("kinds", &self.kinds())
            .field("active", &self.active_kind())
            .finish_non_exhaustive()
    }
}
