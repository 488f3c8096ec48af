mod error;
mod grammar;
mod parser;

use std::str::FromStr;

pub use error::ParseError;
pub use parser::{ParsedElement, ParsedExpression};

use crate::Filter;

/// Parse expression text, one clause per line, into a [`ParsedExpression`].
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid expression.
pub fn parse_expression(input: &str) -> Result<ParsedExpression, ParseError> {
    use winnow::Parser;
    grammar::parse_expression
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}

/// Parse the text form of a single filter, e.g. `room[building:A]{1,2}`.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a single filter.
pub fn parse_filter(input: &str) -> Result<Filter, ParseError> {
    use winnow::Parser;
    grammar::filter
        .parse(input.trim())
        .map_err(|e| ParseError::new(e.to_string()))
}

impl FromStr for Filter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_filter(s)
    }
}
