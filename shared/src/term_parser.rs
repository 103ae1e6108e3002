/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Parser for the N-Triples-like term syntax used by fixtures and PCJ metadata:
//! `<iri>`, `"label"`, `"label"^^<datatype>`, `_:id`, `?var`, bare integers,
//! `true`/`false` and the `a` shorthand for `rdf:type`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use crate::query::StatementPattern;
use crate::terms::{xsd, Term, TypedValue, RDF_TYPE};

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)
}

pub fn variable(input: &str) -> IResult<&str, Term> {
    map(preceded(char('?'), identifier), Term::var)(input)
}

pub fn iri(input: &str) -> IResult<&str, &str> {
    delimited(char('<'), take_while1(|c| c != '>'), char('>'))(input)
}

fn blank_node(input: &str) -> IResult<&str, TypedValue> {
    map(preceded(tag("_:"), identifier), TypedValue::blank)(input)
}

fn quoted_literal(input: &str) -> IResult<&str, TypedValue> {
    let (input, label) = delimited(char('"'), take_while(|c| c != '"'), char('"'))(input)?;
    let (input, datatype) = opt(preceded(tag("^^"), iri))(input)?;
    Ok((
        input,
        TypedValue::literal(label, datatype.unwrap_or(xsd::STRING)),
    ))
}

/// Leading zeros are dropped, so `007` reads as `7`.
fn bare_integer(input: &str) -> IResult<&str, TypedValue> {
    map_res(recognize(pair(opt(char('-')), digit1)), |digits: &str| {
        digits.parse::<i64>().map(TypedValue::integer)
    })(input)
}

fn bare_boolean(input: &str) -> IResult<&str, TypedValue> {
    alt((
        value(TypedValue::boolean(true), tag("true")),
        value(TypedValue::boolean(false), tag("false")),
    ))(input)
}

/// A constant in any of the supported forms.
pub fn typed_value(input: &str) -> IResult<&str, TypedValue> {
    alt((
        map(iri, TypedValue::uri),
        blank_node,
        quoted_literal,
        bare_integer,
        bare_boolean,
    ))(input)
}

fn rdf_type_shorthand(input: &str) -> IResult<&str, Term> {
    value(Term::Constant(TypedValue::uri(RDF_TYPE)), terminated(char('a'), multispace1))(input)
}

pub fn term(input: &str) -> IResult<&str, Term> {
    alt((variable, map(typed_value, Term::Constant)))(input)
}

fn predicate_term(input: &str) -> IResult<&str, Term> {
    alt((rdf_type_shorthand, terminated(term, multispace1)))(input)
}

/// `s p o [c] [.]`
pub fn statement_pattern(input: &str) -> IResult<&str, StatementPattern> {
    let (input, (subject, _, predicate, object)) =
        tuple((term, multispace1, predicate_term, term))(input)?;
    let (input, context) = opt(preceded(multispace1, term))(input)?;
    let (input, _) = opt(preceded(multispace0, char('.')))(input)?;
    let mut pattern = StatementPattern::new(subject, predicate, object);
    pattern.context = context;
    Ok((input, pattern))
}

/// Parses one complete statement pattern, e.g. `?e <uri:talksTo> ?o .`
pub fn parse_statement_pattern(input: &str) -> Result<StatementPattern, String> {
    all_consuming(delimited(multispace0, statement_pattern, multispace0))(input)
        .map(|(_, pattern)| pattern)
        .map_err(|e| format!("Invalid statement pattern '{}': {}", input, e))
}

/// Parses a `.`-separated group of statement patterns.
pub fn parse_pattern_group(input: &str) -> Result<Vec<StatementPattern>, String> {
    all_consuming(delimited(
        multispace0,
        separated_list0(multispace1, statement_pattern),
        multispace0,
    ))(input)
    .map(|(_, patterns)| patterns)
    .map_err(|e| format!("Invalid pattern group '{}': {}", input, e))
}

/// Parses a single constant.
pub fn parse_typed_value(input: &str) -> Result<TypedValue, String> {
    all_consuming(delimited(multispace0, typed_value, multispace0))(input)
        .map(|(_, v)| v)
        .map_err(|e| format!("Invalid term '{}': {}", input, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_values() {
        assert_eq!(parse_typed_value("<uri:obj>").unwrap(), TypedValue::uri("uri:obj"));
        assert_eq!(parse_typed_value("\"label\"").unwrap(), TypedValue::string("label"));
        assert_eq!(parse_typed_value("-42").unwrap(), TypedValue::integer(-42));
        assert_eq!(parse_typed_value("007").unwrap(), TypedValue::integer(7));
        assert!(parse_typed_value("99999999999999999999").is_err());
        assert_eq!(parse_typed_value("true").unwrap(), TypedValue::boolean(true));
        assert_eq!(parse_typed_value("_:b1").unwrap(), TypedValue::blank("b1"));
        assert_eq!(
            parse_typed_value("\"2.5\"^^<http://www.w3.org/2001/XMLSchema#double>").unwrap(),
            TypedValue::literal("2.5", xsd::DOUBLE)
        );
        assert!(parse_typed_value("<unterminated").is_err());
    }

    #[test]
    fn test_parse_statement_with_shorthand() {
        let p = parse_statement_pattern("?e a ?c .").unwrap();
        assert_eq!(p.subject, Term::var("e"));
        assert_eq!(p.predicate, Term::Constant(TypedValue::uri(RDF_TYPE)));
        assert_eq!(p.object, Term::var("c"));
        assert!(p.context.is_none());
    }

    #[test]
    fn test_parse_quad_and_group() {
        let p = parse_statement_pattern("?s <uri:p> \"x\" <uri:graph>").unwrap();
        assert_eq!(p.context, Some(Term::Constant(TypedValue::uri("uri:graph"))));

        let group = parse_pattern_group(
            "?e <uri:talksTo> ?o . ?o <http://www.w3.org/2000/01/rdf-schema#label> ?l .",
        )
        .unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group[1].object, Term::var("l"));
        assert!(parse_pattern_group("  ").unwrap().is_empty());
    }

    #[test]
    fn test_group_with_dot_inside_literal() {
        let group = parse_pattern_group("?s <uri:note> \"end . start\" . ?s <uri:age> ?a .").unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].object, Term::Constant(TypedValue::string("end . start")));
        assert_eq!(group[1].object, Term::var("a"));
        assert!(parse_pattern_group("?s <uri:p> ?o . garbage").is_err());
    }
}
