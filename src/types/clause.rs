use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use super::error::{ClauseDefect, ValidationError};
use super::filter::FilterId;
use super::operator::SetOp;

/// One entry of a clause.
///
/// `Draft` points at a slot of the filter buffer whose filter has not been
/// persisted yet. It only exists between editing and reconciliation and
/// cannot be serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Filter(FilterId),
    Draft(usize),
    Op(SetOp),
}

impl Token {
    #[must_use]
    pub fn is_operand(&self) -> bool {
        matches!(self, Token::Filter(_) | Token::Draft(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Filter(id) => write!(f, "{id}"),
            Token::Draft(slot) => write!(f, "${slot}"),
            Token::Op(op) => write!(f, "{op}"),
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Token::Filter(id) => serializer.serialize_u64(*id),
            Token::Op(op) => serializer.serialize_str(op.code()),
            Token::Draft(slot) => Err(serde::ser::Error::custom(format!(
                "buffered filter slot {slot} has no id yet"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TokenVisitor;

        impl Visitor<'_> for TokenVisitor {
            type Value = Token;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a filter id or one of \"|\", \"&\", \"-\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Token, E> {
                Ok(Token::Filter(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Token, E> {
                u64::try_from(v)
                    .map(Token::Filter)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Token, E> {
                if let Some(op) = SetOp::parse(v) {
                    return Ok(Token::Op(op));
                }
                v.parse::<u64>()
                    .map(Token::Filter)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(TokenVisitor)
    }
}

/// An alternating `filter, op, filter, ...` sequence, folded left to right.
///
/// Intermediate editing states may violate alternation; [`Clause::validate`]
/// is the gate applied before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clause(Vec<Token>);

impl Clause {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    /// A clause holding a single filter.
    #[must_use]
    pub fn single(id: FilterId) -> Self {
        Self(vec![Token::Filter(id)])
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A clause made of one operator and nothing else.
    #[must_use]
    pub fn is_bare_operator(&self) -> bool {
        matches!(self.0.as_slice(), [Token::Op(_)])
    }

    pub fn filter_ids(&self) -> impl Iterator<Item = FilterId> + '_ {
        self.0.iter().filter_map(|t| match t {
            Token::Filter(id) => Some(*id),
            _ => None,
        })
    }

    pub fn draft_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().filter_map(|t| match t {
            Token::Draft(slot) => Some(*slot),
            _ => None,
        })
    }

    /// Check strict alternation: operands at even positions, operators at odd
    /// positions, first and last entries operands.
    ///
    /// # Errors
    ///
    /// Returns the first [`ClauseDefect`] found.
    pub fn validate(&self) -> Result<(), ClauseDefect> {
        if self.0.is_empty() {
            return Err(ClauseDefect::Empty);
        }
        for (position, token) in self.0.iter().enumerate() {
            let want_operand = position % 2 == 0;
            if want_operand && !token.is_operand() {
                return Err(ClauseDefect::ExpectedFilter { position });
            }
            if !want_operand && token.is_operand() {
                return Err(ClauseDefect::ExpectedOperator { position });
            }
        }
        if self.0.len() % 2 == 0 {
            return Err(ClauseDefect::EndsWithOperator);
        }
        Ok(())
    }

    /// Replace draft slots with persisted ids. Slots missing from `resolve`
    /// are left untouched.
    #[must_use]
    pub fn resolve_drafts(&self, resolve: impl Fn(usize) -> Option<FilterId>) -> Clause {
        Clause(
            self.0
                .iter()
                .map(|t| match t {
                    Token::Draft(slot) => resolve(*slot).map_or(*t, Token::Filter),
                    other => *other,
                })
                .collect(),
        )
    }
}

impl FromIterator<Token> for Clause {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Clause(iter.into_iter().collect())
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(Token::to_string).collect();
        write!(f, "[{}]", parts.join(" "))
    }
}

/// Validate every clause of an operation list, reporting the first bad one.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedClause`] naming the clause index.
pub fn validate_clauses(clauses: &[Clause]) -> Result<(), ValidationError> {
    for (index, clause) in clauses.iter().enumerate() {
        clause
            .validate()
            .map_err(|defect| ValidationError::MalformedClause { index, defect })?;
    }
    Ok(())
}
