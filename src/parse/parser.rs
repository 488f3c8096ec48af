use crate::{Filter, FilterId, SetOp};

/// One entry of a parsed clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedElement {
    /// An inline `type[key:value]{ranks}` filter, not yet persisted.
    Filter(Filter),
    /// `@id`, a reference to a persisted filter.
    Ref(FilterId),
    Op(SetOp),
}

/// The result of parsing expression text: one element list per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedExpression {
    pub clauses: Vec<Vec<ParsedElement>>,
}

impl ParsedExpression {
    /// Inline filters in order of appearance.
    pub fn inline_filters(&self) -> impl Iterator<Item = &Filter> {
        self.clauses.iter().flatten().filter_map(|e| match e {
            ParsedElement::Filter(f) => Some(f),
            _ => None,
        })
    }
}
