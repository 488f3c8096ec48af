use std::collections::{BTreeSet, HashMap};

use crate::types::{
    Clause, ClauseCombination, Filter, FilterId, Resource, ResourceKey, Token, ValidationError,
};

/// Resolves clause operands to filters: persisted ones by id, buffered ones by slot.
pub(crate) struct FilterLookup<'a> {
    persisted: HashMap<FilterId, &'a Filter>,
    drafts: &'a [Filter],
}

impl<'a> FilterLookup<'a> {
    pub(crate) fn new(filters: &'a [Filter]) -> Self {
        Self::with_drafts(filters, &[])
    }

    pub(crate) fn with_drafts(filters: &'a [Filter], drafts: &'a [Filter]) -> Self {
        let persisted = filters
            .iter()
            .filter_map(|f| f.id.map(|id| (id, f)))
            .collect();
        Self { persisted, drafts }
    }

    fn resolve(&self, token: Token) -> Result<&'a Filter, ValidationError> {
        match token {
            Token::Filter(id) => self
                .persisted
                .get(&id)
                .copied()
                .ok_or(ValidationError::UnknownFilter { id }),
            Token::Draft(slot) => self.drafts.get(slot).ok_or(ValidationError::MissingDraft {
                slot,
                len: self.drafts.len(),
            }),
            Token::Op(_) => unreachable!("operators are filtered out by Clause::validate"),
        }
    }
}

/// Left fold over one clause: `acc = eval(f0); acc = op(acc, eval(fi))`.
pub(crate) fn evaluate_clause(
    index: usize,
    clause: &Clause,
    lookup: &FilterLookup<'_>,
    resources: &[Resource],
) -> Result<BTreeSet<ResourceKey>, ValidationError> {
    clause
        .validate()
        .map_err(|defect| ValidationError::MalformedClause { index, defect })?;

    let tokens = clause.tokens();
    let mut acc = lookup.resolve(tokens[0])?.select(resources);
    for pair in tokens[1..].chunks_exact(2) {
        let (Token::Op(op), operand) = (pair[0], pair[1]) else {
            unreachable!("alternation checked above");
        };
        let rhs = lookup.resolve(operand)?.select(resources);
        acc = op.apply(&acc, &rhs);
    }
    Ok(acc)
}

pub(crate) fn evaluate_clauses(
    clauses: &[Clause],
    lookup: &FilterLookup<'_>,
    resources: &[Resource],
    combination: ClauseCombination,
) -> Result<BTreeSet<ResourceKey>, ValidationError> {
    let mut combined: Option<BTreeSet<ResourceKey>> = None;
    for (index, clause) in clauses.iter().enumerate() {
        let keys = evaluate_clause(index, clause, lookup, resources)?;
        combined = Some(match combined {
            None => keys,
            Some(acc) => match combination {
                ClauseCombination::Union => acc.union(&keys).cloned().collect(),
                ClauseCombination::Intersection => acc.intersection(&keys).cloned().collect(),
            },
        });
    }
    Ok(combined.unwrap_or_default())
}
