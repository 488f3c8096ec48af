use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::Store;
use crate::types::{Clause, Filter, FilterId, SetOp, Token};

/// Placeholder shown when no clause has been defined.
pub const NO_OPERATIONS: &str = "No operations defined";

/// One entry of a clause under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A persisted filter. The filter is carried so the builder can render it
    /// without a store round trip.
    Filter(Filter),
    /// A buffered filter that has not been saved, by buffer slot.
    Draft(usize),
    Operator(SetOp),
}

impl Element {
    #[must_use]
    pub fn persisted(id: FilterId) -> Self {
        Element::Filter(Filter::new().with_id(id))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Filter(filter) => match filter.id {
                Some(id) => write!(f, "@{id}"),
                None => write!(f, "{filter}"),
            },
            Element::Draft(slot) => write!(f, "${slot}"),
            Element::Operator(op) => write!(f, "{op}"),
        }
    }
}

pub type DraftClause = Vec<Element>;

/// Out-of-range structural edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("no clause {clause} (the expression has {len})")]
    NoSuchClause { clause: usize, len: usize },

    #[error("clause {clause} has no element {index} (it has {len})")]
    NoSuchElement {
        clause: usize,
        index: usize,
        len: usize,
    },
}

/// Editable list of clauses.
///
/// Edits are purely structural. Alternation of filters and operators is not
/// enforced here; it is checked when the expression is saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionBuilder {
    clauses: Vec<DraftClause>,
}

impl ExpressionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn clauses(&self) -> &[DraftClause] {
        &self.clauses
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.iter().all(Vec::is_empty)
    }

    /// Append an empty clause and return its index.
    pub fn add_clause(&mut self) -> usize {
        self.clauses.push(Vec::new());
        debug!(clauses = self.clauses.len(), "clause added");
        self.clauses.len() - 1
    }

    /// Drop every clause.
    pub fn clear(&mut self) {
        self.clauses.clear();
        info!("operations cleared");
    }

    /// Drop every clause without logging; used after a save.
    pub fn reset(&mut self) {
        self.clauses.clear();
    }

    // Pushing to the index one past the end opens a new clause.
    fn clause_mut(&mut self, clause: usize) -> Result<&mut DraftClause, EditError> {
        let len = self.clauses.len();
        if clause == len {
            self.clauses.push(Vec::new());
        }
        self.clauses
            .get_mut(clause)
            .ok_or(EditError::NoSuchClause { clause, len })
    }

    /// # Errors
    ///
    /// [`EditError::NoSuchClause`] if `clause` is more than one past the end.
    pub fn push_operator(&mut self, clause: usize, op: SetOp) -> Result<(), EditError> {
        self.clause_mut(clause)?.push(Element::Operator(op));
        debug!(clause, op = op.name(), "operator added");
        Ok(())
    }

    /// Append a persisted filter.
    ///
    /// A filter without an id cannot be referenced from a clause; it is
    /// skipped with a warning and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// [`EditError::NoSuchClause`] if `clause` is more than one past the end.
    pub fn push_filter(&mut self, clause: usize, filter: Filter) -> Result<bool, EditError> {
        let Some(id) = filter.id else {
            warn!(clause, %filter, "cannot add filter without id to operation");
            return Ok(false);
        };
        self.clause_mut(clause)?.push(Element::Filter(filter));
        debug!(clause, filter_id = id, "filter added");
        Ok(true)
    }

    /// Append a reference to buffered filter `slot`.
    ///
    /// # Errors
    ///
    /// [`EditError::NoSuchClause`] if `clause` is more than one past the end.
    pub fn push_draft(&mut self, clause: usize, slot: usize) -> Result<(), EditError> {
        self.clause_mut(clause)?.push(Element::Draft(slot));
        debug!(clause, slot, "buffered filter added");
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if `clause` does not exist or `position` is past its end.
    pub fn insert(
        &mut self,
        clause: usize,
        position: usize,
        element: Element,
    ) -> Result<(), EditError> {
        let len = self.clauses.len();
        let elements = self
            .clauses
            .get_mut(clause)
            .ok_or(EditError::NoSuchClause { clause, len })?;
        if position > elements.len() {
            return Err(EditError::NoSuchElement {
                clause,
                index: position,
                len: elements.len(),
            });
        }
        elements.insert(position, element);
        Ok(())
    }

    /// Move one element to the end of `to_clause`. The source clause is kept
    /// even if it becomes empty.
    ///
    /// # Errors
    ///
    /// Fails if either clause or the element does not exist; nothing moves.
    pub fn move_element(
        &mut self,
        from_clause: usize,
        from_index: usize,
        to_clause: usize,
    ) -> Result<(), EditError> {
        let len = self.clauses.len();
        if to_clause >= len {
            return Err(EditError::NoSuchClause {
                clause: to_clause,
                len,
            });
        }
        let element = self.take(from_clause, from_index)?;
        self.clauses[to_clause].push(element);
        debug!(from_clause, from_index, to_clause, "element moved");
        Ok(())
    }

    /// Remove and return one element. A clause left empty is dropped unless it
    /// is the only one.
    ///
    /// # Errors
    ///
    /// Fails if the clause or the element does not exist.
    pub fn remove_element(&mut self, clause: usize, index: usize) -> Result<Element, EditError> {
        let element = self.take(clause, index)?;
        if self.clauses[clause].is_empty() && self.clauses.len() > 1 {
            self.clauses.remove(clause);
        }
        Ok(element)
    }

    fn take(&mut self, clause: usize, index: usize) -> Result<Element, EditError> {
        let len = self.clauses.len();
        let elements = self
            .clauses
            .get_mut(clause)
            .ok_or(EditError::NoSuchClause { clause, len })?;
        if index >= elements.len() {
            return Err(EditError::NoSuchElement {
                clause,
                index,
                len: elements.len(),
            });
        }
        Ok(elements.remove(index))
    }

    /// Replace the expression with stored clauses. Filter ids found in
    /// `known` carry their full filter; others are kept by id only.
    pub fn set_operations(&mut self, operations: &[Clause], known: &[Filter]) {
        let by_id: HashMap<FilterId, &Filter> = known
            .iter()
            .filter_map(|f| f.id.map(|id| (id, f)))
            .collect();
        self.clauses = operations
            .iter()
            .map(|clause| {
                clause
                    .tokens()
                    .iter()
                    .map(|token| match *token {
                        Token::Filter(id) => by_id.get(&id).map_or_else(
                            || Element::persisted(id),
                            |f| Element::Filter((*f).clone()),
                        ),
                        Token::Draft(slot) => Element::Draft(slot),
                        Token::Op(op) => Element::Operator(op),
                    })
                    .collect()
            })
            .collect();
    }

    /// Remove references to buffered filter `slot` and renumber higher slots,
    /// matching a removal from the filter buffer.
    pub fn forget_draft(&mut self, slot: usize) {
        for clause in &mut self.clauses {
            clause.retain(|e| *e != Element::Draft(slot));
            for element in clause.iter_mut() {
                if let Element::Draft(s) = element {
                    if *s > slot {
                        *s -= 1;
                    }
                }
            }
        }
    }

    /// Clauses in wire form.
    ///
    /// Empty clauses are skipped and a clause holding a single operator is
    /// emitted as is. Buffered filters become [`Token::Draft`] placeholders.
    #[must_use]
    pub fn operations_for_backend(&self) -> Vec<Clause> {
        let mut result = Vec::new();
        for (index, elements) in self.clauses.iter().enumerate() {
            if elements.is_empty() {
                continue;
            }
            let clause: Clause = elements
                .iter()
                .filter_map(|element| match element {
                    Element::Filter(filter) => match filter.id {
                        Some(id) => Some(Token::Filter(id)),
                        None => {
                            warn!(clause = index, "missing filter id, skipping element");
                            None
                        }
                    },
                    Element::Draft(slot) => Some(Token::Draft(*slot)),
                    Element::Operator(op) => Some(Token::Op(*op)),
                })
                .collect();
            if !clause.is_empty() {
                result.push(clause);
            }
        }
        result
    }

    /// Text preview of the expression as currently edited.
    pub async fn preview_text(&self, store: &dyn Store, drafts: &[Filter]) -> String {
        if self.clauses.is_empty() {
            return NO_OPERATIONS.to_owned();
        }
        let mut lines = Vec::new();
        for elements in self.clauses.iter().filter(|c| !c.is_empty()) {
            let mut line = String::new();
            for element in elements {
                match element {
                    Element::Filter(filter) => match filter.id {
                        Some(id) => match store.filter_representation(id).await {
                            Ok(text) => line.push_str(&text),
                            Err(e) => {
                                debug!(filter_id = id, error = %e, "representation lookup failed");
                                line.push_str(&filter.to_string());
                            }
                        },
                        None => line.push_str(&filter.to_string()),
                    },
                    Element::Draft(slot) => line.push_str(&draft_text(drafts, *slot)),
                    Element::Operator(op) => push_operator(&mut line, *op),
                }
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

fn push_operator(line: &mut String, op: SetOp) {
    line.push(' ');
    line.push_str(op.code());
    line.push(' ');
}

fn draft_text(drafts: &[Filter], slot: usize) -> String {
    drafts
        .get(slot)
        .map_or_else(|| format!("[Draft {slot}]"), Filter::to_string)
}

/// Render wire clauses as text, one line per clause.
///
/// Filter ids are resolved through the store's representation endpoint,
/// falling back to `[Filter <id>]`; draft placeholders are rendered from
/// `drafts`.
pub async fn format_to_string(store: &dyn Store, clauses: &[Clause], drafts: &[Filter]) -> String {
    if clauses.is_empty() {
        return NO_OPERATIONS.to_owned();
    }
    let mut lines = Vec::new();
    for clause in clauses.iter().filter(|c| !c.is_empty()) {
        let mut line = String::new();
        for token in clause.tokens() {
            match *token {
                Token::Filter(id) => match store.filter_representation(id).await {
                    Ok(text) => line.push_str(&text),
                    Err(e) => {
                        debug!(filter_id = id, error = %e, "representation lookup failed");
                        line.push_str(&format!("[Filter {id}]"));
                    }
                },
                Token::Draft(slot) => line.push_str(&draft_text(drafts, slot)),
                Token::Op(op) => push_operator(&mut line, op),
            }
        }
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn persisted(id: FilterId, ty: &str) -> Filter {
        Filter::new().resource_type(ty).with_id(id)
    }

    fn builder_with(clauses: Vec<DraftClause>) -> ExpressionBuilder {
        ExpressionBuilder { clauses }
    }

    #[test]
    fn push_opens_next_clause_only() {
        let mut b = ExpressionBuilder::new();
        b.push_operator(0, SetOp::Union).unwrap();
        assert_eq!(b.clauses().len(), 1);
        assert_eq!(
            b.push_draft(3, 0),
            Err(EditError::NoSuchClause { clause: 3, len: 1 })
        );
    }

    #[test]
    fn filters_without_id_are_skipped() {
        let mut b = ExpressionBuilder::new();
        assert!(!b.push_filter(0, Filter::new()).unwrap());
        assert!(b.is_empty());
        assert!(b.push_filter(0, persisted(4, "room")).unwrap());
        assert_eq!(b.operations_for_backend(), vec![Clause::single(4)]);
    }

    #[test]
    fn remove_drops_emptied_clause_unless_last() {
        let mut b = builder_with(vec![
            vec![Element::persisted(1)],
            vec![Element::persisted(2)],
        ]);
        assert_eq!(b.remove_element(0, 0).unwrap(), Element::persisted(1));
        assert_eq!(b.clauses().len(), 1);
        b.remove_element(0, 0).unwrap();
        assert_eq!(b.clauses().len(), 1);
        assert!(b.clauses()[0].is_empty());
    }

    #[test]
    fn move_appends_to_target() {
        let mut b = builder_with(vec![
            vec![Element::persisted(1), Element::Operator(SetOp::Union)],
            vec![Element::persisted(2)],
        ]);
        b.move_element(0, 1, 1).unwrap();
        assert_eq!(b.clauses()[0], vec![Element::persisted(1)]);
        assert_eq!(
            b.clauses()[1],
            vec![Element::persisted(2), Element::Operator(SetOp::Union)]
        );
        assert!(b.move_element(0, 5, 1).is_err());
        assert!(b.move_element(0, 0, 9).is_err());
        assert_eq!(b.clauses()[0].len(), 1);
    }

    #[test]
    fn insert_within_bounds() {
        let mut b = builder_with(vec![vec![Element::persisted(1), Element::persisted(2)]]);
        b.insert(0, 1, Element::Operator(SetOp::Difference)).unwrap();
        assert_eq!(
            b.operations_for_backend()[0].tokens(),
            &[Token::Filter(1), Token::Op(SetOp::Difference), Token::Filter(2)]
        );
        assert_eq!(
            b.insert(0, 9, Element::Draft(0)),
            Err(EditError::NoSuchElement {
                clause: 0,
                index: 9,
                len: 3
            })
        );
    }

    #[test]
    fn backend_form_skips_empty_and_keeps_bare_operator() {
        let b = builder_with(vec![
            vec![],
            vec![Element::Operator(SetOp::Intersection)],
            vec![Element::Filter(Filter::new()), Element::Draft(0)],
        ]);
        let ops = b.operations_for_backend();
        assert_eq!(ops.len(), 2);
        assert!(ops[0].is_bare_operator());
        assert_eq!(ops[1].tokens(), &[Token::Draft(0)]);
    }

    #[test]
    fn set_operations_uses_known_filters() {
        let mut b = ExpressionBuilder::new();
        let known = vec![persisted(1, "session")];
        b.set_operations(
            &[Clause::new(vec![Token::Filter(1), Token::Op(SetOp::Union), Token::Filter(2)])],
            &known,
        );
        assert_eq!(b.clauses()[0][0], Element::Filter(known[0].clone()));
        assert_eq!(b.clauses()[0][2], Element::persisted(2));
    }

    #[test]
    fn forget_draft_renumbers() {
        let mut b = builder_with(vec![vec![
            Element::Draft(0),
            Element::Operator(SetOp::Union),
            Element::Draft(1),
            Element::Operator(SetOp::Union),
            Element::Draft(2),
        ]]);
        b.forget_draft(1);
        assert_eq!(
            b.clauses()[0],
            vec![
                Element::Draft(0),
                Element::Operator(SetOp::Union),
                Element::Operator(SetOp::Union),
                Element::Draft(1),
            ]
        );
    }

    #[tokio::test]
    async fn format_resolves_and_falls_back() {
        let store = MemoryStore::new();
        store.seed_filter(
            Filter::new()
                .resource_type("session")
                .label("campus", "north")
                .with_id(1),
        );
        let clauses = vec![
            Clause::new(vec![Token::Filter(1), Token::Op(SetOp::Intersection), Token::Filter(9)]),
            Clause::new(vec![Token::Draft(0)]),
        ];
        let drafts = vec![Filter::new().resource_type("room").ranks([1, 2])];
        let text = format_to_string(&store, &clauses, &drafts).await;
        assert_eq!(text, "session[campus:north]{*} & [Filter 9]\nroom[*:*]{1,2}");
    }

    #[tokio::test]
    async fn format_empty() {
        let store = MemoryStore::new();
        assert_eq!(format_to_string(&store, &[], &[]).await, NO_OPERATIONS);
        assert_eq!(
            ExpressionBuilder::new().preview_text(&store, &[]).await,
            NO_OPERATIONS
        );
    }

    #[tokio::test]
    async fn preview_falls_back_to_local_text() {
        let store = MemoryStore::new();
        let b = builder_with(vec![vec![
            Element::Filter(persisted(5, "lecturer")),
            Element::Operator(SetOp::Difference),
            Element::Draft(0),
        ]]);
        let drafts = vec![Filter::new().label("campus", "south")];
        let text = b.preview_text(&store, &drafts).await;
        assert_eq!(text, "lecturer[*:*]{*} - *[campus:south]{*}");
    }
}
