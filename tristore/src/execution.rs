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
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use shared::query::{AlgebraNode, CompareOp, FilterExpression, PcjScan, StatementPattern};
use shared::terms::{xsd, Component, Term, TypedValue};
use shared::triple::TriplePattern;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::error::{CodecError, RangeError, StorageError, StorageResult};
use crate::layout::{ByteRange, KeyLayout, LayoutRange, RangeDispatcher};
use crate::pcj::{PcjDescriptor, PcjStorage};
use crate::store::{pattern_matches, scan_range, ScanSource};

/// Variable bindings of one solution.
pub type Solution = BTreeMap<String, TypedValue>;

/// Evaluates algebra trees, original or rewritten, against a store.
/// Joins are bind joins: the right side runs once per left solution with
/// that solution's bindings pushed into its scans.
pub struct Evaluator<'a, S: ScanSource + Sync> {
    store: &'a S,
    dispatcher: &'a RangeDispatcher,
    table_prefix: &'a str,
    pcj_storage: PcjStorage,
    descriptors: FxHashMap<&'a str, &'a PcjDescriptor>,
}

impl<'a, S: ScanSource + Sync> Evaluator<'a, S> {
    pub fn new(store: &'a S, dispatcher: &'a RangeDispatcher, table_prefix: &'a str) -> Self {
        Self {
            store,
            dispatcher,
            table_prefix,
            pcj_storage: PcjStorage::new(dispatcher.shared_codec()),
            descriptors: FxHashMap::default(),
        }
    }

    /// Descriptors that `PcjScan` nodes may refer to.
    pub fn with_descriptors(mut self, descriptors: &'a [Arc<PcjDescriptor>]) -> Self {
        self.descriptors = descriptors.iter().map(|d| (d.id(), d.as_ref())).collect();
        self
    }

    pub fn evaluate(&self, node: &AlgebraNode) -> StorageResult<Vec<Solution>> {
        self.evaluate_with(node, &Solution::new())
    }

    fn evaluate_with(&self, node: &AlgebraNode, input: &Solution) -> StorageResult<Vec<Solution>> {
        match node {
            AlgebraNode::Pattern(pattern) => self.scan_pattern(pattern, input),
            AlgebraNode::Join { left, right } => {
                let left_results = self.evaluate_with(left, input)?;
                let nested = left_results
                    .par_iter()
                    .map(|l| self.evaluate_with(right, l))
                    .collect::<StorageResult<Vec<Vec<Solution>>>>()?;
                Ok(nested.into_iter().flatten().collect())
            }
            AlgebraNode::Union { left, right } => {
                let mut results = self.evaluate_with(left, input)?;
                results.extend(self.evaluate_with(right, input)?);
                Ok(results)
            }
            AlgebraNode::Filter { input: inner, condition } => {
                let results = self.evaluate_with(inner, input)?;
                Ok(results
                    .into_par_iter()
                    .filter(|solution| evaluate_filter(condition, solution))
                    .collect())
            }
            AlgebraNode::Projection { input: inner, variables } => {
                let results = self.evaluate_with(inner, input)?;
                Ok(results
                    .into_iter()
                    .map(|mut solution| {
                        solution.retain(|k, _| variables.contains(k) || input.contains_key(k));
                        solution
                    })
                    .collect())
            }
            AlgebraNode::PcjScan(scan) => self.scan_pcj(scan, input),
        }
    }

    fn scan_pattern(&self, pattern: &StatementPattern, input: &Solution) -> StorageResult<Vec<Solution>> {
        let triple_pattern = substitute(pattern, input);
        let codec = self.dispatcher.codec();
        let triples = match self.dispatcher.define_range(&triple_pattern) {
            Ok(layout_range) => scan_range(self.store, codec, self.table_prefix, &layout_range)?,
            Err(RangeError::NoApplicableLayout(_)) => {
                debug!("Full table scan for {}", pattern);
                let full = LayoutRange {
                    layout: KeyLayout::Spo,
                    range: ByteRange::full(),
                    context: None,
                };
                scan_range(self.store, codec, self.table_prefix, &full)?
            }
            // A binding pushed into a position that cannot hold it.
            Err(RangeError::Codec(CodecError::UnsupportedPosition { .. })) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut results = Vec::new();
        for triple in triples {
            if !pattern_matches(codec, &triple_pattern, &triple) {
                continue;
            }
            let mut solution = input.clone();
            let mut consistent = bind(&mut solution, &pattern.subject, &triple.subject)
                && bind(&mut solution, &pattern.predicate, &triple.predicate)
                && bind(&mut solution, &pattern.object, &triple.object);
            if let Some(context_term) = &pattern.context {
                consistent = consistent
                    && match &triple.context {
                        Some(context) => bind(&mut solution, context_term, context),
                        None => false,
                    };
            }
            if consistent {
                results.push(solution);
            }
        }
        Ok(results)
    }

    fn scan_pcj(&self, scan: &PcjScan, input: &Solution) -> StorageResult<Vec<Solution>> {
        let descriptor = self
            .descriptors
            .get(scan.pcj_id.as_str())
            .ok_or_else(|| StorageError::UnknownPcj(scan.pcj_id.clone()))?;

        let bound: Solution = scan
            .renaming
            .iter()
            .filter_map(|(pcj_var, query_var)| {
                input.get(query_var).map(|v| (pcj_var.clone(), v.clone()))
            })
            .collect();

        let rows = self.pcj_storage.scan(self.store, descriptor, &bound)?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let mut solution = input.clone();
            let consistent = row.into_iter().all(|(pcj_var, value)| {
                let query_var = scan.renaming.get(&pcj_var).cloned().unwrap_or(pcj_var);
                bind(&mut solution, &Term::Variable(query_var), &value)
            });
            if consistent {
                results.push(solution);
            }
        }
        Ok(results)
    }
}

fn substitute(pattern: &StatementPattern, input: &Solution) -> TriplePattern {
    let component = |term: &Term| match term {
        Term::Constant(value) => Component::Bound(value.clone()),
        Term::Variable(v) => input.get(v).cloned().into(),
    };
    let mut triple_pattern = TriplePattern::new(
        component(&pattern.subject),
        component(&pattern.predicate),
        component(&pattern.object),
    );
    triple_pattern.context = pattern.context.as_ref().map(component);
    triple_pattern
}

fn bind(solution: &mut Solution, term: &Term, value: &TypedValue) -> bool {
    match term {
        Term::Constant(c) => c == value,
        Term::Variable(v) => match solution.get(v) {
            Some(existing) => existing == value,
            None => {
                solution.insert(v.clone(), value.clone());
                true
            }
        },
    }
}

fn resolve<'s>(term: &'s Term, solution: &'s Solution) -> Option<&'s TypedValue> {
    match term {
        Term::Constant(c) => Some(c),
        Term::Variable(v) => solution.get(v),
    }
}

fn is_numeric(datatype: &str) -> bool {
    matches!(datatype, xsd::INTEGER | xsd::INT | xsd::LONG | xsd::DOUBLE)
}

/// Numeric literals compare by value, other values of one kind by their
/// lexical form; anything else is incomparable.
pub fn compare_values(left: &TypedValue, right: &TypedValue) -> Option<Ordering> {
    match (left, right) {
        (
            TypedValue::Literal { label: l, datatype: ldt },
            TypedValue::Literal { label: r, datatype: rdt },
        ) => {
            if is_numeric(ldt) && is_numeric(rdt) {
                let l: f64 = l.trim().parse().ok()?;
                let r: f64 = r.trim().parse().ok()?;
                l.partial_cmp(&r)
            } else if ldt == rdt {
                Some(l.cmp(r))
            } else {
                None
            }
        }
        (TypedValue::Uri(l), TypedValue::Uri(r)) => Some(l.cmp(r)),
        (TypedValue::BlankNode(l), TypedValue::BlankNode(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// Unbound variables and incomparable values make a comparison false.
pub fn evaluate_filter(expression: &FilterExpression, solution: &Solution) -> bool {
    match expression {
        FilterExpression::Comparison { left, op, right } => {
            let (Some(l), Some(r)) = (resolve(left, solution), resolve(right, solution)) else {
                return false;
            };
            let ordering = compare_values(l, r);
            match op {
                CompareOp::Eq => l == r || ordering == Some(Ordering::Equal),
                CompareOp::Ne => !(l == r || ordering == Some(Ordering::Equal)),
                CompareOp::Lt => ordering == Some(Ordering::Less),
                CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                CompareOp::Gt => ordering == Some(Ordering::Greater),
                CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            }
        }
        FilterExpression::And(l, r) => evaluate_filter(l, solution) && evaluate_filter(r, solution),
        FilterExpression::Or(l, r) => evaluate_filter(l, solution) || evaluate_filter(r, solution),
        FilterExpression::Not(inner) => !evaluate_filter(inner, solution),
        FilterExpression::Bound(v) => solution.contains_key(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::term_parser::{parse_pattern_group, parse_statement_pattern};
    use shared::triple::Triple;
    use crate::codec::CodecRegistry;
    use crate::store::{MemoryStore, TripleWriter};

    fn uri(v: &str) -> TypedValue {
        TypedValue::uri(v)
    }

    fn fixture() -> (MemoryStore, Arc<CodecRegistry>) {
        let codec = Arc::new(CodecRegistry::default());
        let writer = TripleWriter::new(Arc::clone(&codec), "rya_");
        let mut store = MemoryStore::new();
        writer.create_tables(&mut store);
        let triples = [
            Triple::new(uri("uri:Bob"), uri("uri:talksTo"), uri("uri:Alice")),
            Triple::new(uri("uri:Bob"), uri("uri:talksTo"), uri("uri:Charlie")),
            Triple::new(uri("uri:Eve"), uri("uri:talksTo"), uri("uri:Bob")),
            Triple::new(uri("uri:Alice"), uri("uri:age"), TypedValue::integer(31)),
            Triple::new(uri("uri:Charlie"), uri("uri:age"), TypedValue::integer(12)),
            Triple::new(uri("uri:Bob"), uri("uri:age"), TypedValue::integer(40))
                .with_context(uri("uri:census")),
        ];
        writer.write_all(&mut store, &triples).unwrap();
        (store, codec)
    }

    fn join_of(text: &str) -> AlgebraNode {
        let patterns = parse_pattern_group(text).unwrap();
        AlgebraNode::join_all(patterns.into_iter().map(AlgebraNode::Pattern)).unwrap()
    }

    #[test]
    fn test_bind_join() {
        let (store, codec) = fixture();
        let dispatcher = RangeDispatcher::new(codec);
        let evaluator = Evaluator::new(&store, &dispatcher, "rya_");
        let results = evaluator
            .evaluate(&join_of("?x <uri:talksTo> ?y . ?y <uri:age> ?a ."))
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .any(|s| s["x"] == uri("uri:Eve") && s["a"] == TypedValue::integer(40)));
    }

    #[test]
    fn test_filter_and_projection() {
        let (store, codec) = fixture();
        let dispatcher = RangeDispatcher::new(codec);
        let evaluator = Evaluator::new(&store, &dispatcher, "rya_");
        let filtered = AlgebraNode::projection(
            AlgebraNode::filter(
                join_of("?x <uri:age> ?a ."),
                FilterExpression::compare(Term::var("a"), CompareOp::Ge, Term::Constant(TypedValue::integer(18))),
            ),
            vec!["x".to_string()],
        );
        let mut names: Vec<String> = evaluator
            .evaluate(&filtered)
            .unwrap()
            .into_iter()
            .map(|s| {
                assert_eq!(s.len(), 1);
                s["x"].lexical().to_string()
            })
            .collect();
        names.sort();
        assert_eq!(names, vec!["uri:Alice", "uri:Bob"]);
    }

    #[test]
    fn test_unbound_pattern_falls_back_to_full_scan() {
        let (store, codec) = fixture();
        let dispatcher = RangeDispatcher::new(codec);
        let evaluator = Evaluator::new(&store, &dispatcher, "rya_");
        let all = AlgebraNode::Pattern(parse_statement_pattern("?s ?p ?o").unwrap());
        assert_eq!(evaluator.evaluate(&all).unwrap().len(), 6);
    }

    #[test]
    fn test_context_variable_requires_named_graph() {
        let (store, codec) = fixture();
        let dispatcher = RangeDispatcher::new(codec);
        let evaluator = Evaluator::new(&store, &dispatcher, "rya_");
        let quad = AlgebraNode::Pattern(parse_statement_pattern("?s <uri:age> ?a ?g").unwrap());
        let results = evaluator.evaluate(&quad).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["g"], uri("uri:census"));
    }

    #[test]
    fn test_union() {
        let (store, codec) = fixture();
        let dispatcher = RangeDispatcher::new(codec);
        let evaluator = Evaluator::new(&store, &dispatcher, "rya_");
        let union = AlgebraNode::union(
            join_of("<uri:Bob> <uri:talksTo> ?y ."),
            join_of("<uri:Eve> <uri:talksTo> ?y ."),
        );
        assert_eq!(evaluator.evaluate(&union).unwrap().len(), 3);
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(
            compare_values(&TypedValue::integer(2), &TypedValue::double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(compare_values(&TypedValue::integer(2), &TypedValue::string("2")), None);
        assert_eq!(compare_values(&uri("a"), &uri("b")), Some(Ordering::Less));
    }
}
