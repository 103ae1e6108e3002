/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use log::debug;
use rustc_hash::FxHashMap;
use shared::query::{AlgebraNode, PcjScan};
use std::collections::BTreeSet;
use std::sync::Arc;
use crate::config::ValidatorConfig;
use crate::error::ValidationFailure;
use crate::pcj::PcjDescriptor;

/// Checks that a plan evaluated left to right never reads a variable
/// before some earlier node has bound it, and that every PCJ scan can be
/// driven by the variables bound at its position.
pub struct PlanValidator {
    descriptors: FxHashMap<String, Arc<PcjDescriptor>>,
    reject_cross_products: bool,
}

impl PlanValidator {
    pub fn new(descriptors: &[Arc<PcjDescriptor>]) -> Self {
        Self::with_config(descriptors, &ValidatorConfig::default())
    }

    pub fn with_config(descriptors: &[Arc<PcjDescriptor>], config: &ValidatorConfig) -> Self {
        Self {
            descriptors: descriptors
                .iter()
                .map(|d| (d.id().to_string(), Arc::clone(d)))
                .collect(),
            reject_cross_products: config.reject_cross_products,
        }
    }

    /// First violation in evaluation order.
    pub fn validate(&self, plan: &AlgebraNode) -> Result<(), ValidationFailure> {
        let mut bound = BTreeSet::new();
        let outcome = self.walk(plan, &mut bound);
        if let Err(failure) = &outcome {
            debug!("Plan rejected: {}", failure);
        }
        outcome
    }

    pub fn is_valid(&self, plan: &AlgebraNode) -> bool {
        self.validate(plan).is_ok()
    }

    fn walk(&self, node: &AlgebraNode, bound: &mut BTreeSet<String>) -> Result<(), ValidationFailure> {
        match node {
            AlgebraNode::Pattern(pattern) => bound.extend(pattern.variables()),
            AlgebraNode::Join { left, right } => {
                if self.reject_cross_products {
                    let l = left.produced_variables();
                    let r = right.produced_variables();
                    if l.is_disjoint(&r) {
                        return Err(ValidationFailure::CrossProduct {
                            left: l.into_iter().collect(),
                            right: r.into_iter().collect(),
                        });
                    }
                }
                self.walk(left, bound)?;
                self.walk(right, bound)?;
            }
            AlgebraNode::Union { left, right } => {
                // Only variables bound on both branches are bound afterwards.
                let mut l = bound.clone();
                let mut r = bound.clone();
                self.walk(left, &mut l)?;
                self.walk(right, &mut r)?;
                *bound = l.intersection(&r).cloned().collect();
            }
            AlgebraNode::Filter { input, .. } => self.walk(input, bound)?,
            AlgebraNode::Projection { input, variables } => {
                let before = bound.clone();
                self.walk(input, bound)?;
                check_consumed(node, bound)?;
                *bound = before;
                bound.extend(variables.iter().cloned());
                return Ok(());
            }
            AlgebraNode::PcjScan(scan) => {
                self.check_scan(scan, bound)?;
                bound.extend(scan.variables.iter().cloned());
            }
        }
        check_consumed(node, bound)
    }

    fn check_scan(&self, scan: &PcjScan, bound: &BTreeSet<String>) -> Result<(), ValidationFailure> {
        let descriptor = self
            .descriptors
            .get(&scan.pcj_id)
            .ok_or_else(|| ValidationFailure::UnknownPcj(scan.pcj_id.clone()))?;

        let expected: Option<Vec<&String>> = descriptor
            .variable_order()
            .iter()
            .map(|v| scan.renaming.get(v))
            .collect();
        let well_formed = scan.renaming.len() == descriptor.variable_order().len()
            && expected.is_some_and(|vars| vars.into_iter().eq(scan.variables.iter()));
        if !well_formed {
            return Err(ValidationFailure::MalformedScan(scan.pcj_id.clone()));
        }

        let pcj_bound: BTreeSet<String> = scan
            .renaming
            .iter()
            .filter(|(_, query_var)| bound.contains(*query_var))
            .map(|(pcj_var, _)| pcj_var.clone())
            .collect();
        if !descriptor.supports(&pcj_bound) {
            return Err(ValidationFailure::UnsupportedBindings {
                pcj_id: scan.pcj_id.clone(),
                bound: scan
                    .variables
                    .iter()
                    .filter(|v| bound.contains(*v))
                    .cloned()
                    .collect(),
            });
        }
        Ok(())
    }
}

fn check_consumed(node: &AlgebraNode, bound: &BTreeSet<String>) -> Result<(), ValidationFailure> {
    match node.consumed_variables().into_iter().find(|v| !bound.contains(v)) {
        Some(variable) => Err(ValidationFailure::UnboundVariable {
            node: label(node).to_string(),
            variable,
        }),
        None => Ok(()),
    }
}

fn label(node: &AlgebraNode) -> &'static str {
    match node {
        AlgebraNode::Pattern(_) => "pattern",
        AlgebraNode::Join { .. } => "join",
        AlgebraNode::Union { .. } => "union",
        AlgebraNode::Filter { .. } => "filter",
        AlgebraNode::Projection { .. } => "projection",
        AlgebraNode::PcjScan(_) => "PCJ scan",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::query::{CompareOp, FilterExpression};
    use shared::term_parser::parse_pattern_group;
    use shared::terms::{Term, TypedValue};
    use std::collections::BTreeMap;
    use crate::pcj::{PcjLocation, VarOrderPolicy};

    fn join_of(text: &str) -> AlgebraNode {
        let patterns = parse_pattern_group(text).unwrap();
        AlgebraNode::join_all(patterns.into_iter().map(AlgebraNode::Pattern)).unwrap()
    }

    fn pcj() -> Arc<PcjDescriptor> {
        Arc::new(
            PcjDescriptor::new(
                "pcj1",
                join_of("?e a ?c . ?e <uri:talksTo> ?o ."),
                vec!["e".into(), "c".into(), "o".into()],
                PcjLocation::for_id("rya_", "pcj1"),
                VarOrderPolicy::Strict,
            )
            .unwrap(),
        )
    }

    fn scan(pairs: &[(&str, &str)]) -> AlgebraNode {
        let renaming: BTreeMap<String, String> = pairs
            .iter()
            .map(|(d, q)| (d.to_string(), q.to_string()))
            .collect();
        let variables = ["e", "c", "o"]
            .iter()
            .filter_map(|v| renaming.get(*v).cloned())
            .collect();
        AlgebraNode::PcjScan(PcjScan {
            pcj_id: "pcj1".to_string(),
            renaming,
            variables,
        })
    }

    fn renamed_scan() -> AlgebraNode {
        scan(&[("e", "x"), ("c", "t"), ("o", "y")])
    }

    #[test]
    fn test_original_plan_is_valid() {
        let validator = PlanValidator::new(&[]);
        assert!(validator.is_valid(&join_of("?x <uri:talksTo> ?y . ?x a ?t . ?y <uri:label> ?l .")));
    }

    #[test]
    fn test_scan_first_is_valid() {
        let validator = PlanValidator::new(&[pcj()]);
        let plan = AlgebraNode::join(renamed_scan(), join_of("?y <uri:label> ?l ."));
        assert_eq!(validator.validate(&plan), Ok(()));
    }

    #[test]
    fn test_scan_after_unsupported_prefix() {
        let validator = PlanValidator::new(&[pcj()]);
        let plan = AlgebraNode::join(join_of("?y <uri:label> ?l ."), renamed_scan());
        assert_eq!(
            validator.validate(&plan),
            Err(ValidationFailure::UnsupportedBindings {
                pcj_id: "pcj1".to_string(),
                bound: vec!["y".to_string()],
            })
        );
    }

    #[test]
    fn test_scan_after_supported_prefix() {
        let validator = PlanValidator::new(&[pcj()]);
        let plan = AlgebraNode::join(join_of("?x <uri:label> ?l ."), renamed_scan());
        assert!(validator.is_valid(&plan));
    }

    #[test]
    fn test_unknown_and_malformed_scans() {
        let validator = PlanValidator::new(&[pcj()]);
        let unknown = AlgebraNode::PcjScan(PcjScan {
            pcj_id: "missing".to_string(),
            renaming: BTreeMap::new(),
            variables: Vec::new(),
        });
        assert_eq!(validator.validate(&unknown), Err(ValidationFailure::UnknownPcj("missing".into())));

        let partial = scan(&[("e", "x"), ("o", "y")]);
        assert_eq!(validator.validate(&partial), Err(ValidationFailure::MalformedScan("pcj1".into())));
    }

    #[test]
    fn test_filter_reads_unbound_variable() {
        let validator = PlanValidator::new(&[]);
        let plan = AlgebraNode::filter(
            join_of("?x <uri:age> ?a ."),
            FilterExpression::compare(Term::var("b"), CompareOp::Gt, Term::Constant(TypedValue::integer(1))),
        );
        assert_eq!(
            validator.validate(&plan),
            Err(ValidationFailure::UnboundVariable {
                node: "filter".to_string(),
                variable: "b".to_string(),
            })
        );
    }

    #[test]
    fn test_projection_of_missing_variable() {
        let validator = PlanValidator::new(&[]);
        let plan = AlgebraNode::projection(join_of("?x <uri:age> ?a ."), vec!["z".to_string()]);
        assert!(!validator.is_valid(&plan));
    }

    #[test]
    fn test_union_binds_only_common_variables() {
        let validator = PlanValidator::new(&[]);
        let union = AlgebraNode::union(join_of("?x <uri:p> ?a ."), join_of("?x <uri:q> ?b ."));
        let reads_x = AlgebraNode::filter(union.clone(), FilterExpression::Bound("x".into()));
        let reads_a = AlgebraNode::filter(union, FilterExpression::Bound("a".into()));
        assert!(validator.is_valid(&reads_x));
        assert!(!validator.is_valid(&reads_a));
    }

    #[test]
    fn test_cross_product_rule() {
        let plan = join_of("?x <uri:p> ?a . ?y <uri:q> ?b .");
        assert!(PlanValidator::new(&[]).is_valid(&plan));

        let strict = PlanValidator::with_config(&[], &ValidatorConfig { reject_cross_products: true });
        assert!(matches!(
            strict.validate(&plan),
            Err(ValidationFailure::CrossProduct { .. })
        ));
    }
}
