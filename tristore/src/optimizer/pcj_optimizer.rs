/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Rewrites query trees to read from precomputed joins.
//!
//! Inner joins and the filters above them are flattened into a segment of
//! members. Descriptors are matched against the segment's statement
//! patterns; the largest match whose bound variables a PCJ table can serve
//! replaces its patterns with a [`PcjScan`] placed where the first of them
//! stood. Segments are rebuilt as left-deep joins with the remaining filters
//! on top, and the input tree is never modified.

use log::{debug, info, warn};
use rayon::prelude::*;
use shared::query::{AlgebraNode, FilterExpression, PcjScan, StatementPattern};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use crate::config::PcjConfig;
use crate::pcj::PcjDescriptor;
use super::matcher::{find_embeddings, Embedding};
use super::validator::PlanValidator;

pub struct PcjOptimizer {
    max_embeddings: usize,
}

impl Default for PcjOptimizer {
    fn default() -> Self {
        Self::from_config(&PcjConfig::default())
    }
}

impl PcjOptimizer {
    pub fn new(max_embeddings: usize) -> Self {
        Self {
            max_embeddings: max_embeddings.max(1),
        }
    }

    pub fn from_config(config: &PcjConfig) -> Self {
        Self::new(config.max_embeddings)
    }

    /// The tree with PCJ scans substituted, or a clone of it when nothing
    /// applies. Descriptors earlier in `descriptors` win ties.
    pub fn optimize(&self, tree: &AlgebraNode, descriptors: &[Arc<PcjDescriptor>]) -> AlgebraNode {
        if descriptors.is_empty() {
            return tree.clone();
        }
        let mut rewrite = Rewrite {
            descriptors,
            used: vec![false; descriptors.len()],
            max_embeddings: self.max_embeddings,
        };
        match rewrite.node(tree, &BTreeSet::new()) {
            Some(rewritten) => {
                let ids: Vec<&str> = rewritten.pcj_scans().iter().map(|s| s.pcj_id.as_str()).collect();
                info!("Substituted PCJs {:?}", ids);
                rewritten
            }
            None => tree.clone(),
        }
    }

    /// Like [`optimize`](Self::optimize), but falls back to the input tree
    /// when the rewrite does not pass `validator`.
    pub fn optimize_validated(
        &self,
        tree: &AlgebraNode,
        descriptors: &[Arc<PcjDescriptor>],
        validator: &PlanValidator,
    ) -> AlgebraNode {
        let rewritten = self.optimize(tree, descriptors);
        if rewritten == *tree {
            return rewritten;
        }
        match validator.validate(&rewritten) {
            Ok(()) => rewritten,
            Err(failure) => {
                warn!("Discarding PCJ rewrite: {}", failure);
                tree.clone()
            }
        }
    }

    /// Optimizes independent trees in parallel against one descriptor snapshot.
    pub fn optimize_batch(&self, trees: &[AlgebraNode], descriptors: &[Arc<PcjDescriptor>]) -> Vec<AlgebraNode> {
        trees
            .par_iter()
            .map(|tree| self.optimize(tree, descriptors))
            .collect()
    }
}

struct Rewrite<'d> {
    descriptors: &'d [Arc<PcjDescriptor>],
    /// A descriptor is substituted at most once per query.
    used: Vec<bool>,
    max_embeddings: usize,
}

struct Candidate {
    descriptor: usize,
    coverage: usize,
    members: Vec<AlgebraNode>,
    filters: Vec<FilterExpression>,
}

fn is_segment(node: &AlgebraNode) -> bool {
    match node {
        AlgebraNode::Pattern(_) | AlgebraNode::Join { .. } => true,
        AlgebraNode::Filter { input, .. } => is_segment(input),
        _ => false,
    }
}

fn flatten(node: &AlgebraNode, members: &mut Vec<AlgebraNode>, filters: &mut Vec<FilterExpression>) {
    match node {
        AlgebraNode::Join { left, right } => {
            flatten(left, members, filters);
            flatten(right, members, filters);
        }
        AlgebraNode::Filter { input, condition } if is_segment(input) => {
            flatten(input, members, filters);
            filters.push(condition.clone());
        }
        other => members.push(other.clone()),
    }
}

/// Descriptor variables whose query counterparts are in `available`.
fn pcj_bound(renaming: &BTreeMap<String, String>, available: &BTreeSet<String>) -> BTreeSet<String> {
    renaming
        .iter()
        .filter(|(_, query_var)| available.contains(*query_var))
        .map(|(pcj_var, _)| pcj_var.clone())
        .collect()
}

impl<'d> Rewrite<'d> {
    /// `None` when nothing below `node` changed.
    fn node(&mut self, node: &AlgebraNode, bound: &BTreeSet<String>) -> Option<AlgebraNode> {
        match node {
            n if is_segment(n) => self.segment(n, bound),
            AlgebraNode::Filter { input, condition } => self
                .node(input, bound)
                .map(|input| AlgebraNode::filter(input, condition.clone())),
            AlgebraNode::Projection { input, variables } => self
                .node(input, bound)
                .map(|input| AlgebraNode::projection(input, variables.clone())),
            AlgebraNode::Union { left, right } => {
                let l = self.node(left, bound);
                let r = self.node(right, bound);
                if l.is_none() && r.is_none() {
                    return None;
                }
                Some(AlgebraNode::union(
                    l.unwrap_or_else(|| left.as_ref().clone()),
                    r.unwrap_or_else(|| right.as_ref().clone()),
                ))
            }
            _ => None,
        }
    }

    fn segment(&mut self, node: &AlgebraNode, bound: &BTreeSet<String>) -> Option<AlgebraNode> {
        let mut members = Vec::new();
        let mut filters = Vec::new();
        flatten(node, &mut members, &mut filters);

        let mut changed = false;
        while let Some(candidate) = self.best_candidate(&members, &filters, bound) {
            debug!(
                "PCJ '{}' covers {} patterns",
                self.descriptors[candidate.descriptor].id(),
                candidate.coverage
            );
            self.used[candidate.descriptor] = true;
            members = candidate.members;
            filters = candidate.filters;
            changed = true;
        }

        let mut available = bound.clone();
        for member in members.iter_mut() {
            if !matches!(member, AlgebraNode::Pattern(_) | AlgebraNode::PcjScan(_)) {
                if let Some(rewritten) = self.node(member, &available) {
                    *member = rewritten;
                    changed = true;
                }
            }
            available.extend(member.produced_variables());
        }

        if !changed {
            return None;
        }
        let joined = AlgebraNode::join_all(members)?;
        Some(filters.into_iter().fold(joined, AlgebraNode::filter))
    }

    fn best_candidate(
        &self,
        members: &[AlgebraNode],
        filters: &[FilterExpression],
        bound: &BTreeSet<String>,
    ) -> Option<Candidate> {
        let query: Vec<(usize, &StatementPattern)> = members
            .iter()
            .enumerate()
            .filter_map(|(i, m)| match m {
                AlgebraNode::Pattern(p) => Some((i, p)),
                _ => None,
            })
            .collect();

        let mut best: Option<Candidate> = None;
        for (index, descriptor) in self.descriptors.iter().enumerate() {
            let coverage = descriptor.patterns().len();
            if self.used[index]
                || coverage > query.len()
                || best.as_ref().is_some_and(|b| b.coverage >= coverage)
            {
                continue;
            }
            for embedding in find_embeddings(descriptor.patterns(), &query, self.max_embeddings) {
                let Some(absorbed) = absorbed_filters(descriptor, &embedding, filters) else {
                    continue;
                };
                let trial = substitute(descriptor, &embedding, members);
                if self.supported(&trial, bound) {
                    let remaining = filters
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !absorbed.contains(i))
                        .map(|(_, f)| f.clone())
                        .collect();
                    best = Some(Candidate {
                        descriptor: index,
                        coverage,
                        members: trial,
                        filters: remaining,
                    });
                    break;
                }
                debug!(
                    "PCJ '{}' matches {:?} but cannot be driven by the bindings there",
                    descriptor.id(),
                    embedding.matched
                );
            }
        }
        best
    }

    /// Every PCJ scan in `members` must be scannable with the variables
    /// bound by the members before it.
    fn supported(&self, members: &[AlgebraNode], bound: &BTreeSet<String>) -> bool {
        let mut available = bound.clone();
        for member in members {
            if let AlgebraNode::PcjScan(scan) = member {
                let Some(descriptor) = self.descriptors.iter().find(|d| d.id() == scan.pcj_id) else {
                    return false;
                };
                if !descriptor.supports(&pcj_bound(&scan.renaming, &available)) {
                    return false;
                }
            }
            available.extend(member.produced_variables());
        }
        true
    }
}

/// Indices of the segment filters that are the descriptor's own filters
/// under the embedding's renaming; `None` when one of them is missing.
fn absorbed_filters(
    descriptor: &PcjDescriptor,
    embedding: &Embedding,
    filters: &[FilterExpression],
) -> Option<Vec<usize>> {
    let mut absorbed = Vec::new();
    for filter in descriptor.filters() {
        let renamed = filter.renamed(&embedding.mapping);
        let index = (0..filters.len()).find(|i| !absorbed.contains(i) && filters[*i] == renamed)?;
        absorbed.push(index);
    }
    Some(absorbed)
}

fn substitute(descriptor: &PcjDescriptor, embedding: &Embedding, members: &[AlgebraNode]) -> Vec<AlgebraNode> {
    let position = embedding.matched.iter().copied().min().unwrap_or(0);
    let scan = PcjScan {
        pcj_id: descriptor.id().to_string(),
        renaming: embedding.mapping.clone(),
        variables: descriptor
            .variable_order()
            .iter()
            .map(|v| embedding.mapping.get(v).cloned().unwrap_or_else(|| v.clone()))
            .collect(),
    };
    let mut scan = Some(AlgebraNode::PcjScan(scan));
    members
        .iter()
        .enumerate()
        .filter_map(|(i, member)| {
            if i == position {
                scan.take()
            } else if embedding.matched.contains(&i) {
                None
            } else {
                Some(member.clone())
            }
        })
        .collect()
}
