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
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use crate::terms::Term;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementPattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub context: Option<Term>,
}

impl StatementPattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            context: None,
        }
    }

    pub fn with_context(mut self, context: Term) -> Self {
        self.context = Some(context);
        self
    }

    /// Terms in subject, predicate, object, context order.
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .chain(self.context.as_ref())
    }

    pub fn variables(&self) -> BTreeSet<String> {
        self.terms()
            .filter_map(|t| t.var_name().map(str::to_string))
            .collect()
    }

    /// Applies `mapping` to every variable; unmapped variables keep their name.
    pub fn renamed(&self, mapping: &BTreeMap<String, String>) -> Self {
        let rename = |t: &Term| match t {
            Term::Variable(v) => Term::Variable(mapping.get(v).cloned().unwrap_or_else(|| v.clone())),
            c => c.clone(),
        };
        Self {
            subject: rename(&self.subject),
            predicate: rename(&self.predicate),
            object: rename(&self.object),
            context: self.context.as_ref().map(rename),
        }
    }
}

impl fmt::Display for StatementPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(c) = &self.context {
            write!(f, " {}", c)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterExpression {
    Comparison { left: Term, op: CompareOp, right: Term },
    And(Box<FilterExpression>, Box<FilterExpression>),
    Or(Box<FilterExpression>, Box<FilterExpression>),
    Not(Box<FilterExpression>),
    Bound(String),
}

impl FilterExpression {
    pub fn compare(left: Term, op: CompareOp, right: Term) -> Self {
        FilterExpression::Comparison { left, op, right }
    }

    /// Variables the expression reads.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        match self {
            FilterExpression::Comparison { left, right, .. } => {
                vars.extend(left.var_name().map(str::to_string));
                vars.extend(right.var_name().map(str::to_string));
            }
            FilterExpression::And(l, r) | FilterExpression::Or(l, r) => {
                l.collect_variables(vars);
                r.collect_variables(vars);
            }
            FilterExpression::Not(inner) => inner.collect_variables(vars),
            FilterExpression::Bound(v) => {
                vars.insert(v.clone());
            }
        }
    }

    pub fn renamed(&self, mapping: &BTreeMap<String, String>) -> Self {
        let rename_term = |t: &Term| match t {
            Term::Variable(v) => Term::Variable(mapping.get(v).cloned().unwrap_or_else(|| v.clone())),
            c => c.clone(),
        };
        match self {
            FilterExpression::Comparison { left, op, right } => FilterExpression::Comparison {
                left: rename_term(left),
                op: *op,
                right: rename_term(right),
            },
            FilterExpression::And(l, r) => {
                FilterExpression::And(Box::new(l.renamed(mapping)), Box::new(r.renamed(mapping)))
            }
            FilterExpression::Or(l, r) => {
                FilterExpression::Or(Box::new(l.renamed(mapping)), Box::new(r.renamed(mapping)))
            }
            FilterExpression::Not(inner) => FilterExpression::Not(Box::new(inner.renamed(mapping))),
            FilterExpression::Bound(v) => {
                FilterExpression::Bound(mapping.get(v).cloned().unwrap_or_else(|| v.clone()))
            }
        }
    }
}

/// Scan over a materialized precomputed join, produced by the PCJ optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcjScan {
    pub pcj_id: String,
    /// Descriptor variable -> query variable.
    pub renaming: BTreeMap<String, String>,
    /// Query variable names in the descriptor's fixed variable order.
    pub variables: Vec<String>,
}

/// Algebra tree handed over by the query front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgebraNode {
    Pattern(StatementPattern),
    Join {
        left: Box<AlgebraNode>,
        right: Box<AlgebraNode>,
    },
    Union {
        left: Box<AlgebraNode>,
        right: Box<AlgebraNode>,
    },
    Filter {
        input: Box<AlgebraNode>,
        condition: FilterExpression,
    },
    Projection {
        input: Box<AlgebraNode>,
        variables: Vec<String>,
    },
    PcjScan(PcjScan),
}

impl AlgebraNode {
    pub fn pattern(pattern: StatementPattern) -> Self {
        Self::Pattern(pattern)
    }

    pub fn join(left: AlgebraNode, right: AlgebraNode) -> Self {
        Self::Join {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn union(left: AlgebraNode, right: AlgebraNode) -> Self {
        Self::Union {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn filter(input: AlgebraNode, condition: FilterExpression) -> Self {
        Self::Filter {
            input: Box::new(input),
            condition,
        }
    }

    pub fn projection(input: AlgebraNode, variables: Vec<String>) -> Self {
        Self::Projection {
            input: Box::new(input),
            variables,
        }
    }

    /// Left-deep join of `nodes`; `None` when `nodes` is empty.
    pub fn join_all(nodes: impl IntoIterator<Item = AlgebraNode>) -> Option<Self> {
        nodes.into_iter().reduce(AlgebraNode::join)
    }

    pub fn children(&self) -> Vec<&AlgebraNode> {
        match self {
            AlgebraNode::Pattern(_) | AlgebraNode::PcjScan(_) => Vec::new(),
            AlgebraNode::Join { left, right } | AlgebraNode::Union { left, right } => {
                vec![left, right]
            }
            AlgebraNode::Filter { input, .. } | AlgebraNode::Projection { input, .. } => {
                vec![input]
            }
        }
    }

    /// Variables a solution of this node may carry.
    pub fn produced_variables(&self) -> BTreeSet<String> {
        match self {
            AlgebraNode::Pattern(p) => p.variables(),
            AlgebraNode::Join { left, right } | AlgebraNode::Union { left, right } => {
                let mut vars = left.produced_variables();
                vars.extend(right.produced_variables());
                vars
            }
            AlgebraNode::Filter { input, .. } => input.produced_variables(),
            AlgebraNode::Projection { variables, .. } => variables.iter().cloned().collect(),
            AlgebraNode::PcjScan(scan) => scan.variables.iter().cloned().collect(),
        }
    }

    /// Variables that must already be bound when this node itself is evaluated.
    pub fn consumed_variables(&self) -> BTreeSet<String> {
        match self {
            AlgebraNode::Join { left, right } => {
                let right_vars = right.produced_variables();
                left.produced_variables()
                    .into_iter()
                    .filter(|v| right_vars.contains(v))
                    .collect()
            }
            AlgebraNode::Filter { condition, .. } => condition.variables(),
            AlgebraNode::Projection { variables, .. } => variables.iter().cloned().collect(),
            AlgebraNode::Pattern(_) | AlgebraNode::Union { .. } | AlgebraNode::PcjScan(_) => {
                BTreeSet::new()
            }
        }
    }

    /// Statement pattern leaves, left to right.
    pub fn patterns(&self) -> Vec<&StatementPattern> {
        let mut out = Vec::new();
        self.collect_patterns(&mut out);
        out
    }

    fn collect_patterns<'a>(&'a self, out: &mut Vec<&'a StatementPattern>) {
        match self {
            AlgebraNode::Pattern(p) => out.push(p),
            other => {
                for child in other.children() {
                    child.collect_patterns(out);
                }
            }
        }
    }

    /// Ids of every PCJ scan in the tree, left to right.
    pub fn pcj_scans(&self) -> Vec<&PcjScan> {
        match self {
            AlgebraNode::PcjScan(scan) => vec![scan],
            other => other
                .children()
                .into_iter()
                .flat_map(|c| c.pcj_scans())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::TypedValue;

    fn sp(s: &str, p: &str, o: &str) -> StatementPattern {
        let term = |x: &str| match x.strip_prefix('?') {
            Some(v) => Term::var(v),
            None => Term::Constant(TypedValue::uri(x)),
        };
        StatementPattern::new(term(s), term(p), term(o))
    }

    #[test]
    fn test_join_consumes_shared_variables() {
        let join = AlgebraNode::join(
            AlgebraNode::pattern(sp("?e", "uri:talksTo", "?o")),
            AlgebraNode::pattern(sp("?o", "uri:label", "?l")),
        );
        let consumed: Vec<_> = join.consumed_variables().into_iter().collect();
        assert_eq!(consumed, vec!["o".to_string()]);
        assert_eq!(join.produced_variables().len(), 3);
        assert_eq!(join.patterns().len(), 2);
    }

    #[test]
    fn test_renamed_pattern_keeps_constants() {
        let mapping: BTreeMap<String, String> =
            [("e".to_string(), "x".to_string())].into_iter().collect();
        let renamed = sp("?e", "uri:talksTo", "?o").renamed(&mapping);
        assert_eq!(renamed, sp("?x", "uri:talksTo", "?o"));
    }

    #[test]
    fn test_filter_variables() {
        let f = FilterExpression::And(
            Box::new(FilterExpression::compare(
                Term::var("a"),
                CompareOp::Lt,
                Term::Constant(TypedValue::integer(3)),
            )),
            Box::new(FilterExpression::Bound("b".to_string())),
        );
        let vars: Vec<_> = f.variables().into_iter().collect();
        assert_eq!(vars, vec!["a".to_string(), "b".to_string()]);
    }
}
