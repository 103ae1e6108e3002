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
use shared::query::{AlgebraNode, FilterExpression, StatementPattern};
use std::collections::BTreeSet;
use crate::error::DescriptorError;
use super::binding_order::{BindingOrderIndex, VarOrderPolicy};

/// Where a PCJ's rows live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcjLocation {
    pub table: String,
}

impl PcjLocation {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    /// `<prefix>INDEX_<id>`
    pub fn for_id(table_prefix: &str, id: &str) -> Self {
        Self::new(format!("{}INDEX_{}", table_prefix, id))
    }
}

/// A precomputed join: a conjunctive pattern whose solutions are kept in
/// one table, sorted by a fixed variable order.
#[derive(Debug, Clone)]
pub struct PcjDescriptor {
    id: String,
    defining_pattern: AlgebraNode,
    variable_order: Vec<String>,
    location: PcjLocation,
    policy: VarOrderPolicy,
    patterns: Vec<StatementPattern>,
    filters: Vec<FilterExpression>,
    binding_index: BindingOrderIndex,
}

impl PcjDescriptor {
    /// The defining pattern may only join statement patterns, filter them and
    /// project at the root; `variable_order` must name each of its variables
    /// exactly once.
    pub fn new(
        id: impl Into<String>,
        defining_pattern: AlgebraNode,
        variable_order: Vec<String>,
        location: PcjLocation,
        policy: VarOrderPolicy,
    ) -> Result<Self, DescriptorError> {
        if variable_order.is_empty() {
            return Err(DescriptorError::EmptyVariableOrder);
        }
        let mut declared = BTreeSet::new();
        for var in &variable_order {
            if !declared.insert(var.clone()) {
                return Err(DescriptorError::DuplicateVariable(var.clone()));
            }
        }

        let mut patterns = Vec::new();
        let mut filters = Vec::new();
        let body = match &defining_pattern {
            AlgebraNode::Projection { input, variables } => {
                let projected: BTreeSet<String> = variables.iter().cloned().collect();
                if projected != declared {
                    return Err(DescriptorError::VariableOrderMismatch {
                        declared: variable_order,
                        pattern: variables.clone(),
                    });
                }
                input.as_ref()
            }
            other => other,
        };
        flatten(body, &mut patterns, &mut filters)?;
        if patterns.is_empty() {
            return Err(DescriptorError::NoPatterns);
        }

        let pattern_vars: BTreeSet<String> = patterns.iter().flat_map(|p| p.variables()).collect();
        if pattern_vars != declared {
            return Err(DescriptorError::VariableOrderMismatch {
                declared: variable_order,
                pattern: pattern_vars.into_iter().collect(),
            });
        }

        let binding_index = BindingOrderIndex::new(&variable_order, policy);
        Ok(Self {
            id: id.into(),
            defining_pattern,
            variable_order,
            location,
            policy,
            patterns,
            filters,
            binding_index,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn defining_pattern(&self) -> &AlgebraNode {
        &self.defining_pattern
    }

    pub fn variable_order(&self) -> &[String] {
        &self.variable_order
    }

    pub fn location(&self) -> &PcjLocation {
        &self.location
    }

    pub fn policy(&self) -> VarOrderPolicy {
        self.policy
    }

    /// Statement patterns of the defining pattern, left to right.
    pub fn patterns(&self) -> &[StatementPattern] {
        &self.patterns
    }

    pub fn filters(&self) -> &[FilterExpression] {
        &self.filters
    }

    pub fn binding_index(&self) -> &BindingOrderIndex {
        &self.binding_index
    }

    pub fn supports(&self, bound: &BTreeSet<String>) -> bool {
        self.binding_index.supports(bound)
    }
}

fn flatten(
    node: &AlgebraNode,
    patterns: &mut Vec<StatementPattern>,
    filters: &mut Vec<FilterExpression>,
) -> Result<(), DescriptorError> {
    match node {
        AlgebraNode::Pattern(p) => patterns.push(p.clone()),
        AlgebraNode::Join { left, right } => {
            flatten(left, patterns, filters)?;
            flatten(right, patterns, filters)?;
        }
        AlgebraNode::Filter { input, condition } => {
            flatten(input, patterns, filters)?;
            filters.push(condition.clone());
        }
        AlgebraNode::Union { .. } => return Err(DescriptorError::UnsupportedNode("union")),
        AlgebraNode::Projection { .. } => {
            return Err(DescriptorError::UnsupportedNode("nested projection"))
        }
        AlgebraNode::PcjScan(_) => return Err(DescriptorError::UnsupportedNode("PCJ scan")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::query::CompareOp;
    use shared::term_parser::parse_pattern_group;
    use shared::terms::{Term, TypedValue};

    fn body(text: &str) -> AlgebraNode {
        let patterns = parse_pattern_group(text).unwrap();
        AlgebraNode::join_all(patterns.into_iter().map(AlgebraNode::Pattern)).unwrap()
    }

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_descriptor() {
        let pattern = body("?e a ?c . ?e <uri:talksTo> ?o .");
        let d = PcjDescriptor::new(
            "pcj1",
            AlgebraNode::projection(pattern, vars(&["e", "c", "o"])),
            vars(&["e", "c", "o"]),
            PcjLocation::for_id("rya_", "pcj1"),
            VarOrderPolicy::Strict,
        )
        .unwrap();
        assert_eq!(d.patterns().len(), 2);
        assert_eq!(d.location().table, "rya_INDEX_pcj1");
        assert!(d.supports(&["e".to_string()].into_iter().collect()));
        assert!(!d.supports(&["c".to_string()].into_iter().collect()));
    }

    #[test]
    fn test_filters_are_collected() {
        let pattern = AlgebraNode::filter(
            body("?e <uri:age> ?a ."),
            FilterExpression::compare(Term::var("a"), CompareOp::Gt, Term::Constant(TypedValue::integer(18))),
        );
        let d = PcjDescriptor::new(
            "adults",
            pattern,
            vars(&["e", "a"]),
            PcjLocation::new("t"),
            VarOrderPolicy::Strict,
        )
        .unwrap();
        assert_eq!(d.filters().len(), 1);
    }

    #[test]
    fn test_rejected_definitions() {
        let location = PcjLocation::new("t");
        let pattern = body("?e a ?c . ?e <uri:talksTo> ?o .");
        let new = |order: &[&str], node: AlgebraNode| {
            PcjDescriptor::new("x", node, vars(order), location.clone(), VarOrderPolicy::Strict)
        };

        assert_eq!(new(&[], pattern.clone()).unwrap_err(), DescriptorError::EmptyVariableOrder);
        assert_eq!(
            new(&["e", "c", "e"], pattern.clone()).unwrap_err(),
            DescriptorError::DuplicateVariable("e".to_string())
        );
        assert!(matches!(
            new(&["e", "c"], pattern.clone()).unwrap_err(),
            DescriptorError::VariableOrderMismatch { .. }
        ));
        assert!(matches!(
            new(&["e", "c"], AlgebraNode::projection(pattern.clone(), vars(&["e", "c"]))).unwrap_err(),
            DescriptorError::VariableOrderMismatch { .. }
        ));
        assert_eq!(
            new(&["e", "c", "o"], AlgebraNode::union(pattern.clone(), pattern)).unwrap_err(),
            DescriptorError::UnsupportedNode("union")
        );
    }
}
