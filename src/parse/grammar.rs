use winnow::ascii::{dec_uint, line_ending, space0, till_line_ending};
use winnow::combinator::{alt, cut_err, delimited, eof, opt, preceded, repeat, separated};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::{Filter, Rank, SetOp};

use super::parser::{ParsedElement, ParsedExpression};

// -- Whitespace & comments --------------------------------------------------

fn blank(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

fn line_end(input: &mut &str) -> ModalResult<()> {
    (space0, opt(('#', till_line_ending)), alt((line_ending.void(), eof.void())))
        .void()
        .parse_next(input)
}

// -- Filters ----------------------------------------------------------------

fn wildcard(text: &str) -> Option<String> {
    let text = text.trim();
    (text != "*").then(|| text.to_owned())
}

fn resource_type(input: &mut &str) -> ModalResult<Option<String>> {
    alt((
        '*'.value(None),
        (
            take_while(1.., |c: char| c.is_alphabetic() || c == '_'),
            take_while(0.., |c: char| {
                c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
            }),
        )
            .take()
            .map(|s: &str| Some(s.to_owned())),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "resource type",
    )))
    .parse_next(input)
}

fn label_text(input: &mut &str) -> ModalResult<Option<String>> {
    take_while(1.., |c: char| {
        !matches!(c, ':' | '[' | ']' | '{' | '}' | '\n' | '\r')
    })
    .map(wildcard)
    .parse_next(input)
}

fn label(input: &mut &str) -> ModalResult<(Option<String>, Option<String>)> {
    delimited(
        '[',
        (label_text, preceded(cut_err(':'), cut_err(label_text))),
        cut_err(']'),
    )
    .parse_next(input)
}

fn rank_number(input: &mut &str) -> ModalResult<u32> {
    dec_uint::<_, u32, _>
        .verify(|rank: &u32| *rank > 0)
        .context(StrContext::Expected(StrContextValue::Description(
            "positive rank",
        )))
        .parse_next(input)
}

fn ranks(input: &mut &str) -> ModalResult<Rank> {
    delimited(
        ('{', space0),
        alt((
            '*'.value(Rank::All),
            separated(1.., rank_number, (space0, ',', space0)).map(Rank::Only),
            "".value(Rank::All),
        )),
        (space0, cut_err('}')),
    )
    .parse_next(input)
}

/// `type[key:value]{ranks}`; the rank block may be omitted.
pub fn filter(input: &mut &str) -> ModalResult<Filter> {
    let resource_type = resource_type.parse_next(input)?;
    let (label_key, label_value) = cut_err(label)
        .context(StrContext::Expected(StrContextValue::Description(
            "label block",
        )))
        .parse_next(input)?;
    let rank = opt(ranks).parse_next(input)?.unwrap_or_default();
    Ok(Filter {
        id: None,
        resource_type,
        label_key,
        label_value,
        rank,
        selector_id: None,
    })
}

// -- Clauses ----------------------------------------------------------------

fn set_op(input: &mut &str) -> ModalResult<SetOp> {
    alt((
        '|'.value(SetOp::Union),
        '&'.value(SetOp::Intersection),
        '-'.value(SetOp::Difference),
    ))
    .parse_next(input)
}

fn operand(input: &mut &str) -> ModalResult<ParsedElement> {
    alt((
        preceded('@', cut_err(dec_uint::<_, u64, _>)).map(ParsedElement::Ref),
        filter.map(ParsedElement::Filter),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "filter or @id",
    )))
    .parse_next(input)
}

fn clause(input: &mut &str) -> ModalResult<Vec<ParsedElement>> {
    let first = operand.parse_next(input)?;
    let rest: Vec<(SetOp, ParsedElement)> = repeat(
        0..,
        (
            preceded(space0, set_op),
            preceded(space0, cut_err(operand)),
        ),
    )
    .parse_next(input)?;

    let mut elements = Vec::with_capacity(1 + rest.len() * 2);
    elements.push(first);
    for (op, element) in rest {
        elements.push(ParsedElement::Op(op));
        elements.push(element);
    }
    Ok(elements)
}

// -- Top-level parser -------------------------------------------------------

/// One clause per line; blank lines and `#` comments are ignored.
pub fn parse_expression(input: &mut &str) -> ModalResult<ParsedExpression> {
    let mut clauses = Vec::new();
    loop {
        blank.parse_next(input)?;
        if input.is_empty() {
            break;
        }
        let elements = clause.parse_next(input)?;
        cut_err(line_end)
            .context(StrContext::Expected(StrContextValue::Description(
                "operator or end of line",
            )))
            .parse_next(input)?;
        clauses.push(elements);
    }
    Ok(ParsedExpression { clauses })
}

#[cfg(test)]
mod tests {
    use crate::parse::{parse_expression as parse, parse_filter};

    use super::*;

    #[test]
    fn parse_single_filter() {
        let f = parse_filter("session[campus:north]{*}").unwrap();
        assert_eq!(f.resource_type.as_deref(), Some("session"));
        assert_eq!(f.label_key.as_deref(), Some("campus"));
        assert_eq!(f.label_value.as_deref(), Some("north"));
        assert_eq!(f.rank, Rank::All);
        assert!(f.id.is_none());
    }

    #[test]
    fn parse_wildcards_and_ranks() {
        let f = parse_filter("*[*:*]{1, 2}").unwrap();
        assert_eq!(f.resource_type, None);
        assert_eq!(f.label_key, None);
        assert_eq!(f.label_value, None);
        assert_eq!(f.rank, Rank::Only(vec![1, 2]));
    }

    #[test]
    fn rank_block_is_optional() {
        let f = parse_filter("room[building:A]").unwrap();
        assert_eq!(f.rank, Rank::All);
        let f = parse_filter("room[building:A]{}").unwrap();
        assert_eq!(f.rank, Rank::All);
    }

    #[test]
    fn labels_may_contain_spaces() {
        let f = parse_filter("lecturer[full name:Ada Lovelace]").unwrap();
        assert_eq!(f.label_key.as_deref(), Some("full name"));
        assert_eq!(f.label_value.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn zero_rank_is_rejected() {
        assert!(parse_filter("room[*:*]{0}").is_err());
    }

    #[test]
    fn parse_clause_with_operators() {
        let parsed = parse("session[*:*] & room[campus:north]{1} - @7").unwrap();
        assert_eq!(parsed.clauses.len(), 1);
        let c = &parsed.clauses[0];
        assert_eq!(c.len(), 5);
        assert!(matches!(c[1], ParsedElement::Op(SetOp::Intersection)));
        assert!(matches!(c[3], ParsedElement::Op(SetOp::Difference)));
        assert!(matches!(c[4], ParsedElement::Ref(7)));
    }

    #[test]
    fn one_clause_per_line() {
        let input = "# lab sessions\nsession[kind:lab]\n\n  room[*:*] | @3  # legacy\n";
        let parsed = parse(input).unwrap();
        assert_eq!(parsed.clauses.len(), 2);
        assert_eq!(parsed.clauses[1].len(), 3);
    }

    #[test]
    fn empty_input_has_no_clauses() {
        assert!(parse("").unwrap().clauses.is_empty());
        assert!(parse("  # nothing\n").unwrap().clauses.is_empty());
    }

    #[test]
    fn dangling_operator_is_an_error() {
        assert!(parse("session[*:*] &").is_err());
        assert!(parse("session[*:*] session[*:*]").is_err());
    }

    #[test]
    fn hyphenated_types_are_not_operators() {
        let parsed = parse("lab-room[*:*] - room[*:*]").unwrap();
        let ParsedElement::Filter(first) = &parsed.clauses[0][0] else {
            panic!("expected a filter");
        };
        assert_eq!(first.resource_type.as_deref(), Some("lab-room"));
        assert!(matches!(
            parsed.clauses[0][1],
            ParsedElement::Op(SetOp::Difference)
        ));
    }
}
