//! Grammar:
//!
//! ```text
//! program := rule*
//! rule    := atom ':-' atom (',' atom)* '.'
//!          | atom '.'
//! atom    := word '(' (term (',' term)*)? ')'
//! term    := '?' word | word
//! word    := [A-Za-z0-9_]+
//! ```
//!
//! Whitespace is allowed between any two tokens.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char as pchar, multispace0};
use nom::combinator::{all_consuming, map, opt, recognize};
use nom::error::ParseError;
use nom::multi::{many0, separated_list0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::{Finish, IResult};

use crate::error::{Error, Result};
use crate::model::{Atom, Program, Rule, Term};

/// Parses a whole program. Rules without a body become facts.
///
/// # Errors
///
/// Returns [`Error::Parse`] pointing at the first rule that does not parse.
pub fn parse_program(input: &str) -> Result<Program> {
    let rules = run(input, delimited(multispace0, many0(rule), multispace0))?;

    let mut program = Program::new();
    for rule in rules {
        program.add_rule(rule);
    }
    Ok(program)
}

/// Parses a single rule or fact, including its final `.`.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `input` is not exactly one rule.
pub fn parse_rule(input: &str) -> Result<Rule> {
    run(input, ws(rule))
}

/// Parses a single atom.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `input` is not exactly one atom.
pub fn parse_atom(input: &str) -> Result<Atom> {
    run(input, ws(atom))
}

/// Parses a single term.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `input` is not exactly one term.
pub fn parse_term(input: &str) -> Result<Term> {
    run(input, ws(term))
}

/// Parses a query: one atom, optionally followed by `.`.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `input` is not a single atom.
pub fn parse_query(input: &str) -> Result<Atom> {
    run(input, terminated(ws(atom), opt(ws(pchar('.')))))
}

fn run<'a, O, F>(input: &'a str, parser: F) -> Result<O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    all_consuming(parser)(input)
        .finish()
        .map(|(_, output)| output)
        .map_err(|err| Error::parse_at(input, err.input))
}

fn ws<'a, F, O, E: ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
{
    delimited(multispace0, inner, multispace0)
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn term(input: &str) -> IResult<&str, Term> {
    alt((
        map(recognize(pair(pchar('?'), word)), |name: &str| Term::variable(name)),
        map(word, |value: &str| Term::symbol(value)),
    ))(input)
}

fn atom(input: &str) -> IResult<&str, Atom> {
    map(
        pair(
            ws(word),
            delimited(
                ws(pchar('(')),
                separated_list0(ws(pchar(',')), ws(term)),
                ws(pchar(')')),
            ),
        ),
        |(predicate, terms)| Atom::new(predicate, terms),
    )(input)
}

fn rule(input: &str) -> IResult<&str, Rule> {
    map(
        tuple((
            atom,
            opt(preceded(ws(tag(":-")), separated_list1(ws(pchar(',')), atom))),
            ws(pchar('.')),
        )),
        |(head, body, _)| Rule::new(head, body.unwrap_or_default()),
    )(input)
}
