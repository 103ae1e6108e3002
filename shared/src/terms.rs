/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Datatype IRIs understood by the built-in resolvers.
pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const ANY_URI: &str = "http://www.w3.org/2001/XMLSchema#anyURI";
}

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// A value as stored in a triple position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypedValue {
    Uri(String),
    Literal { label: String, datatype: String },
    BlankNode(String),
}

impl TypedValue {
    pub fn uri(value: impl Into<String>) -> Self {
        TypedValue::Uri(value.into())
    }

    pub fn literal(label: impl Into<String>, datatype: impl Into<String>) -> Self {
        TypedValue::Literal {
            label: label.into(),
            datatype: datatype.into(),
        }
    }

    /// Plain literal, typed as `xsd:string`.
    pub fn string(label: impl Into<String>) -> Self {
        Self::literal(label, xsd::STRING)
    }

    pub fn integer(value: i64) -> Self {
        Self::literal(value.to_string(), xsd::INTEGER)
    }

    /// Negative zero is written as `0`.
    pub fn double(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        Self::literal(value.to_string(), xsd::DOUBLE)
    }

    pub fn boolean(value: bool) -> Self {
        Self::literal(value.to_string(), xsd::BOOLEAN)
    }

    pub fn blank(id: impl Into<String>) -> Self {
        TypedValue::BlankNode(id.into())
    }

    /// The lexical form: the IRI, the literal label or the blank node id.
    pub fn lexical(&self) -> &str {
        match self {
            TypedValue::Uri(v) => v,
            TypedValue::Literal { label, .. } => label,
            TypedValue::BlankNode(id) => id,
        }
    }

    /// Datatype IRI of a literal, `xsd:anyURI` for IRIs, `None` for blank nodes.
    pub fn datatype(&self) -> Option<&str> {
        match self {
            TypedValue::Uri(_) => Some(xsd::ANY_URI),
            TypedValue::Literal { datatype, .. } => Some(datatype),
            TypedValue::BlankNode(_) => None,
        }
    }

    pub fn is_uri(&self) -> bool {
        matches!(self, TypedValue::Uri(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, TypedValue::Literal { .. })
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Uri(v) => write!(f, "<{}>", v),
            TypedValue::Literal { label, datatype } if datatype == xsd::STRING => {
                write!(f, "\"{}\"", label)
            }
            TypedValue::Literal { label, datatype } => write!(f, "\"{}\"^^<{}>", label, datatype),
            TypedValue::BlankNode(id) => write!(f, "_:{}", id),
        }
    }
}

/// One position of a triple pattern handed to the range layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Component {
    #[default]
    Unbound,
    Bound(TypedValue),
    /// Inclusive bounds coming from an inequality filter on this position.
    Range { start: TypedValue, stop: TypedValue },
}

impl Component {
    pub fn range(start: TypedValue, stop: TypedValue) -> Self {
        Component::Range { start, stop }
    }

    /// Bound exactly or by a range.
    pub fn is_set(&self) -> bool {
        !matches!(self, Component::Unbound)
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Component::Range { .. })
    }

    pub fn as_bound(&self) -> Option<&TypedValue> {
        match self {
            Component::Bound(v) => Some(v),
            _ => None,
        }
    }
}

impl From<TypedValue> for Component {
    fn from(value: TypedValue) -> Self {
        Component::Bound(value)
    }
}

impl From<Option<TypedValue>> for Component {
    fn from(value: Option<TypedValue>) -> Self {
        value.map_or(Component::Unbound, Component::Bound)
    }
}

/// A position of a statement pattern in the algebra tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    Variable(String),
    Constant(TypedValue),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn var_name(&self) -> Option<&str> {
        match self {
            Term::Variable(v) => Some(v),
            Term::Constant(_) => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(v) => write!(f, "?{}", v),
            Term::Constant(c) => write!(f, "{}", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(TypedValue::uri("ex:alice").to_string(), "<ex:alice>");
        assert_eq!(TypedValue::string("label").to_string(), "\"label\"");
        assert_eq!(
            TypedValue::integer(7).to_string(),
            format!("\"7\"^^<{}>", xsd::INTEGER)
        );
        assert_eq!(TypedValue::blank("b0").to_string(), "_:b0");
        assert_eq!(Term::var("e").to_string(), "?e");
    }

    #[test]
    fn test_double_labels() {
        assert_eq!(TypedValue::double(-0.0).lexical(), "0");
        assert_eq!(TypedValue::double(1.0).lexical(), "1");
        assert_eq!(TypedValue::double(-2.5).lexical(), "-2.5");
    }

    #[test]
    fn test_component_shape() {
        assert!(!Component::Unbound.is_set());
        assert!(Component::from(TypedValue::uri("a")).is_set());
        let range = Component::range(TypedValue::integer(1), TypedValue::integer(5));
        assert!(range.is_set() && range.is_range());
        assert!(range.as_bound().is_none());
        assert_eq!(Component::from(None), Component::Unbound);
    }
}
