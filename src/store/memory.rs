use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use super::{Store, StoreError};
use crate::types::{
    Filter, FilterId, Rule, RuleId, Selector, SelectorId, SelectorWithFilters, Token,
};

/// One request received by a [`MemoryStore`], named like its REST counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreCall {
    pub method: &'static str,
    pub path: String,
}

impl StoreCall {
    #[must_use]
    pub fn new(method: &'static str, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for StoreCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[derive(Debug, Default)]
struct Tables {
    filters: BTreeMap<FilterId, Filter>,
    selectors: BTreeMap<SelectorId, Selector>,
    rules: BTreeMap<RuleId, Rule>,
    last_filter: FilterId,
    last_selector: SelectorId,
    last_rule: RuleId,
    calls: Vec<StoreCall>,
    failures: Vec<StoreCall>,
}

impl Tables {
    fn next_filter_id(&mut self) -> FilterId {
        self.last_filter += 1;
        self.last_filter
    }

    fn next_selector_id(&mut self) -> SelectorId {
        self.last_selector += 1;
        self.last_selector
    }

    fn next_rule_id(&mut self) -> RuleId {
        self.last_rule += 1;
        self.last_rule
    }

    fn with_filters(&self, selector: &Selector) -> SelectorWithFilters {
        SelectorWithFilters {
            selector: selector.clone(),
            filters: self
                .filters
                .values()
                .filter(|f| f.selector_id.is_some() && f.selector_id == selector.id)
                .cloned()
                .collect(),
        }
    }

    fn render(&self, selector: &Selector) -> String {
        selector
            .operation
            .iter()
            .map(|clause| {
                clause
                    .tokens()
                    .iter()
                    .map(|token| match token {
                        Token::Filter(id) => self
                            .filters
                            .get(id)
                            .map_or_else(|| format!("[Filter {id}]"), Filter::to_string),
                        Token::Op(op) => op.code().to_owned(),
                        Token::Draft(slot) => format!("${slot}"),
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    // Mirrors the server's operation check: every clause starts and ends with
    // a filter id, with operators only at odd positions.
    fn check_operation(&self, selector: &Selector) -> Result<(), StoreError> {
        for (index, clause) in selector.operation.iter().enumerate() {
            if let Err(defect) = clause.validate() {
                return Err(StoreError::Invalid(format!(
                    "Invalid operation in clause {index}: {defect}"
                )));
            }
            if let Some(slot) = clause.draft_slots().next() {
                return Err(StoreError::Invalid(format!(
                    "Invalid operation in clause {index}: unsaved filter ${slot}"
                )));
            }
        }
        Ok(())
    }
}

/// In-process [`Store`] with a call journal and failure injection.
///
/// Ids are assigned sequentially per record kind starting at 1.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call matching `method` and `path` fail.
    pub fn fail_on(&self, method: &'static str, path: impl Into<String>) {
        self.tables.lock().failures.push(StoreCall::new(method, path));
    }

    pub fn clear_failures(&self) {
        self.tables.lock().failures.clear();
    }

    /// Every call received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.tables.lock().calls.clone()
    }

    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        self.tables
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.tables.lock().calls.clear();
    }

    /// Insert a filter without recording a call. A missing id is assigned.
    pub fn seed_filter(&self, mut filter: Filter) -> Filter {
        let mut tables = self.tables.lock();
        let id = match filter.id {
            Some(id) => {
                tables.last_filter = tables.last_filter.max(id);
                id
            }
            None => tables.next_filter_id(),
        };
        filter.id = Some(id);
        tables.filters.insert(id, filter.clone());
        filter
    }

    /// Insert a selector without recording a call. A missing id is assigned.
    pub fn seed_selector(&self, mut selector: Selector) -> Selector {
        let mut tables = self.tables.lock();
        let id = match selector.id {
            Some(id) => {
                tables.last_selector = tables.last_selector.max(id);
                id
            }
            None => tables.next_selector_id(),
        };
        selector.id = Some(id);
        tables.selectors.insert(id, selector.clone());
        selector
    }

    #[must_use]
    pub fn filters(&self) -> Vec<Filter> {
        self.tables.lock().filters.values().cloned().collect()
    }

    #[must_use]
    pub fn selectors(&self) -> Vec<Selector> {
        self.tables.lock().selectors.values().cloned().collect()
    }

    #[must_use]
    pub fn rules(&self) -> Vec<Rule> {
        self.tables.lock().rules.values().cloned().collect()
    }

    fn begin(
        &self,
        method: &'static str,
        path: String,
    ) -> Result<MutexGuard<'_, Tables>, StoreError> {
        let mut tables = self.tables.lock();
        let call = StoreCall::new(method, path);
        debug!(call = %call, "memory store call");
        let injected = tables.failures.contains(&call);
        tables.calls.push(call.clone());
        if injected {
            return Err(StoreError::Injected(call.to_string()));
        }
        Ok(tables)
    }
}

fn not_found(resource: &'static str, id: u64) -> StoreError {
    StoreError::NotFound { resource, id }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_filters(&self) -> Result<Vec<Filter>, StoreError> {
        let tables = self.begin("GET", "/api/filters".into())?;
        Ok(tables.filters.values().cloned().collect())
    }

    async fn get_filter(&self, id: FilterId) -> Result<Option<Filter>, StoreError> {
        let tables = self.begin("GET", format!("/api/filters/{id}"))?;
        Ok(tables.filters.get(&id).cloned())
    }

    async fn create_filter(&self, filter: &Filter) -> Result<Filter, StoreError> {
        let mut tables = self.begin("POST", "/api/filters".into())?;
        let id = tables.next_filter_id();
        let mut stored = filter.clone();
        stored.id = Some(id);
        tables.filters.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_filter(&self, id: FilterId, filter: &Filter) -> Result<Filter, StoreError> {
        let mut tables = self.begin("PUT", format!("/api/filters/{id}"))?;
        let slot = tables
            .filters
            .get_mut(&id)
            .ok_or_else(|| not_found("filter", id))?;
        *slot = Filter {
            id: Some(id),
            ..filter.clone()
        };
        Ok(slot.clone())
    }

    async fn delete_filter(&self, id: FilterId) -> Result<(), StoreError> {
        let mut tables = self.begin("DELETE", format!("/api/filters/{id}"))?;
        tables
            .filters
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("filter", id))
    }

    async fn filter_representation(&self, id: FilterId) -> Result<String, StoreError> {
        let tables = self.begin("GET", format!("/api/filters/{id}/representation"))?;
        tables
            .filters
            .get(&id)
            .map(Filter::to_string)
            .ok_or_else(|| not_found("filter", id))
    }

    async fn list_selectors(&self) -> Result<Vec<Selector>, StoreError> {
        let tables = self.begin("GET", "/api/selectors".into())?;
        Ok(tables.selectors.values().cloned().collect())
    }

    async fn get_selector(&self, id: SelectorId) -> Result<Option<Selector>, StoreError> {
        let tables = self.begin("GET", format!("/api/selectors/{id}"))?;
        Ok(tables.selectors.get(&id).cloned())
    }

    async fn create_selector(&self, selector: &Selector) -> Result<Selector, StoreError> {
        let mut tables = self.begin("POST", "/api/selectors".into())?;
        tables.check_operation(selector)?;
        let id = tables.next_selector_id();
        let stored = Selector {
            id: Some(id),
            ..selector.clone()
        };
        tables.selectors.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_selector(
        &self,
        id: SelectorId,
        selector: &Selector,
    ) -> Result<Selector, StoreError> {
        let mut tables = self.begin("PUT", format!("/api/selectors/{id}"))?;
        tables.check_operation(selector)?;
        let slot = tables
            .selectors
            .get_mut(&id)
            .ok_or_else(|| not_found("selector", id))?;
        *slot = Selector {
            id: Some(id),
            ..selector.clone()
        };
        Ok(slot.clone())
    }

    async fn delete_selector(&self, id: SelectorId) -> Result<(), StoreError> {
        let mut tables = self.begin("DELETE", format!("/api/selectors/{id}"))?;
        tables
            .selectors
            .remove(&id)
            .ok_or_else(|| not_found("selector", id))?;
        for filter in tables.filters.values_mut() {
            if filter.selector_id == Some(id) {
                filter.selector_id = None;
            }
        }
        for rule in tables.rules.values_mut() {
            rule.selectors.retain(|s| *s != id);
        }
        Ok(())
    }

    async fn selector_with_filters(
        &self,
        id: SelectorId,
    ) -> Result<Option<SelectorWithFilters>, StoreError> {
        let tables = self.begin("GET", format!("/api/selectors/{id}/filters"))?;
        Ok(tables.selectors.get(&id).map(|s| tables.with_filters(s)))
    }

    async fn selector_representation(&self, id: SelectorId) -> Result<String, StoreError> {
        let tables = self.begin("GET", format!("/api/selectors/{id}/representation"))?;
        tables
            .selectors
            .get(&id)
            .map(|s| tables.render(s))
            .ok_or_else(|| not_found("selector", id))
    }

    async fn list_rules(&self) -> Result<Vec<Rule>, StoreError> {
        let tables = self.begin("GET", "/api/rules".into())?;
        Ok(tables.rules.values().cloned().collect())
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<Rule>, StoreError> {
        let tables = self.begin("GET", format!("/api/rules/{id}"))?;
        Ok(tables.rules.get(&id).cloned())
    }

    async fn complete_rule(&self, id: RuleId) -> Result<Option<Rule>, StoreError> {
        let tables = self.begin("GET", format!("/api/rules/{id}/complete"))?;
        Ok(tables.rules.get(&id).cloned())
    }

    async fn rule_selectors(&self, id: RuleId) -> Result<Vec<SelectorWithFilters>, StoreError> {
        let tables = self.begin("GET", format!("/api/rules/{id}/selectors"))?;
        let rule = tables.rules.get(&id).ok_or_else(|| not_found("rule", id))?;
        Ok(rule
            .selectors
            .iter()
            .filter_map(|sid| tables.selectors.get(sid))
            .map(|s| tables.with_filters(s))
            .collect())
    }

    async fn create_rule_with_selectors(
        &self,
        rule: &Rule,
        selector_ids: &[SelectorId],
    ) -> Result<Rule, StoreError> {
        let mut tables = self.begin("POST", "/api/rules/with-selectors".into())?;
        if let Some(missing) = selector_ids
            .iter()
            .find(|id| !tables.selectors.contains_key(*id))
        {
            return Err(StoreError::Invalid(format!(
                "Selector {missing} does not exist"
            )));
        }
        let id = tables.next_rule_id();
        let stored = Rule {
            id: Some(id),
            selectors: selector_ids.to_vec(),
            ..rule.clone()
        };
        tables.rules.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_rule(&self, id: RuleId, rule: &Rule) -> Result<Rule, StoreError> {
        let mut tables = self.begin("PUT", format!("/api/rules/{id}"))?;
        let slot = tables.rules.get_mut(&id).ok_or_else(|| not_found("rule", id))?;
        let selectors = std::mem::take(&mut slot.selectors);
        *slot = Rule {
            id: Some(id),
            selectors,
            ..rule.clone()
        };
        Ok(slot.clone())
    }

    async fn replace_rule_selectors(
        &self,
        id: RuleId,
        selector_ids: &[SelectorId],
    ) -> Result<(), StoreError> {
        let mut tables = self.begin("PUT", format!("/api/rules/{id}/selectors"))?;
        if let Some(missing) = selector_ids
            .iter()
            .find(|sid| !tables.selectors.contains_key(*sid))
        {
            return Err(StoreError::Invalid(format!(
                "Selector {missing} does not exist"
            )));
        }
        let rule = tables.rules.get_mut(&id).ok_or_else(|| not_found("rule", id))?;
        rule.selectors = selector_ids.to_vec();
        Ok(())
    }

    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError> {
        let mut tables = self.begin("DELETE", format!("/api/rules/{id}"))?;
        tables
            .rules
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("rule", id))
    }
}
