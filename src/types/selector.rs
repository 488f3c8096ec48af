use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::clause::Clause;
use super::error::ValidationError;
use super::filter::{Filter, FilterId, SelectorId};
use super::resource::{Resource, ResourceKey};
use crate::evaluate::{self, FilterLookup};

/// How the clauses of a multi-clause selector are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClauseCombination {
    #[default]
    Union,
    Intersection,
}

/// A named, persisted set-algebra expression over filters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SelectorId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub operation: Vec<Clause>,
}

impl Selector {
    #[must_use]
    pub fn new(name: impl Into<String>, operation: Vec<Clause>) -> Self {
        Self {
            id: None,
            name: name.into(),
            operation,
        }
    }

    /// Every filter id referenced by any clause, in first-seen order.
    #[must_use]
    pub fn filter_ids(&self) -> Vec<FilterId> {
        let mut seen = BTreeSet::new();
        self.operation
            .iter()
            .flat_map(Clause::filter_ids)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Evaluate against a resource universe, combining clauses with `combination`.
    ///
    /// # Errors
    ///
    /// Fails if a clause is malformed or references a filter missing from `filters`.
    pub fn evaluate(
        &self,
        filters: &[Filter],
        resources: &[Resource],
        combination: ClauseCombination,
    ) -> Result<BTreeSet<ResourceKey>, ValidationError> {
        let lookup = FilterLookup::new(filters);
        evaluate::evaluate_clauses(&self.operation, &lookup, resources, combination)
    }

    /// Evaluate each clause independently.
    ///
    /// # Errors
    ///
    /// Same as [`Selector::evaluate`].
    pub fn evaluate_each(
        &self,
        filters: &[Filter],
        resources: &[Resource],
    ) -> Result<Vec<BTreeSet<ResourceKey>>, ValidationError> {
        let lookup = FilterLookup::new(filters);
        self.operation
            .iter()
            .enumerate()
            .map(|(index, clause)| evaluate::evaluate_clause(index, clause, &lookup, resources))
            .collect()
    }
}

/// A selector together with the filters that belong to it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectorWithFilters {
    #[serde(flatten)]
    pub selector: Selector,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl SelectorWithFilters {
    #[must_use]
    pub fn id(&self) -> Option<SelectorId> {
        self.selector.id
    }

    /// Evaluate using the filters carried alongside the selector.
    ///
    /// # Errors
    ///
    /// Same as [`Selector::evaluate`].
    pub fn evaluate(
        &self,
        resources: &[Resource],
        combination: ClauseCombination,
    ) -> Result<BTreeSet<ResourceKey>, ValidationError> {
        self.selector.evaluate(&self.filters, resources, combination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SetOp, Token};

    fn universe() -> Vec<Resource> {
        vec![
            Resource::new("session", 1).label("campus", "north"),
            Resource::new("session", 2).label("campus", "south"),
            Resource::new("room", 1).label("campus", "north"),
        ]
    }

    fn filters() -> Vec<Filter> {
        vec![
            Filter::new().resource_type("session").with_id(1),
            Filter::new().label("campus", "north").with_id(2),
        ]
    }

    #[test]
    fn union_of_clauses_by_default() {
        let selector = Selector::new("s", vec![Clause::single(1), Clause::single(2)]);
        let keys = selector
            .evaluate(&filters(), &universe(), ClauseCombination::default())
            .unwrap();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn intersection_of_clauses() {
        let selector = Selector::new("s", vec![Clause::single(1), Clause::single(2)]);
        let keys = selector
            .evaluate(&filters(), &universe(), ClauseCombination::Intersection)
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&Resource::new("session", 1).key()));
    }

    #[test]
    fn evaluate_each_keeps_clauses_apart() {
        let selector = Selector::new(
            "s",
            vec![
                Clause::new(vec![
                    Token::Filter(1),
                    Token::Op(SetOp::Difference),
                    Token::Filter(2),
                ]),
                Clause::single(2),
            ],
        );
        let each = selector.evaluate_each(&filters(), &universe()).unwrap();
        assert_eq!(each.len(), 2);
        assert_eq!(each[0].len(), 1);
        assert_eq!(each[1].len(), 2);
    }

    #[test]
    fn filter_ids_are_deduplicated() {
        let selector = Selector::new(
            "s",
            vec![
                Clause::new(vec![Token::Filter(4), Token::Op(SetOp::Union), Token::Filter(2)]),
                Clause::single(4),
            ],
        );
        assert_eq!(selector.filter_ids(), vec![4, 2]);
    }

    #[test]
    fn selector_with_filters_is_flat_on_the_wire() {
        let json = r#"{"id":3,"name":"north sessions","operation":[[1,"&",2]],"filters":[{"id":1,"resource_type":"session"}]}"#;
        let swf: SelectorWithFilters = serde_json::from_str(json).unwrap();
        assert_eq!(swf.id(), Some(3));
        assert_eq!(swf.selector.operation.len(), 1);
        assert_eq!(swf.filters.len(), 1);
    }

    #[test]
    fn combination_serde() {
        let c: ClauseCombination = serde_json::from_str("\"intersection\"").unwrap();
        assert_eq!(c, ClauseCombination::Intersection);
    }
}
