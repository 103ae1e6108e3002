/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Backtracking search for the ways a PCJ's patterns occur in a query
//! segment, up to a one-to-one renaming of variables.

use shared::query::StatementPattern;
use shared::terms::Term;
use std::collections::BTreeMap;

/// One occurrence of a descriptor's patterns among the query patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    /// Descriptor variable -> query variable.
    pub mapping: BTreeMap<String, String>,
    /// Query member index matched by each descriptor pattern, in descriptor order.
    pub matched: Vec<usize>,
}

struct Search<'q> {
    descriptor: &'q [StatementPattern],
    query: &'q [(usize, &'q StatementPattern)],
    limit: usize,
    used: Vec<bool>,
    forward: BTreeMap<String, String>,
    backward: BTreeMap<String, String>,
    matched: Vec<usize>,
    found: Vec<Embedding>,
}

/// At most `limit` embeddings of `descriptor` into `query`, where `query`
/// pairs each candidate pattern with its member index.
pub fn find_embeddings(
    descriptor: &[StatementPattern],
    query: &[(usize, &StatementPattern)],
    limit: usize,
) -> Vec<Embedding> {
    if descriptor.is_empty() || descriptor.len() > query.len() || limit == 0 {
        return Vec::new();
    }
    let mut search = Search {
        descriptor,
        query,
        limit,
        used: vec![false; query.len()],
        forward: BTreeMap::new(),
        backward: BTreeMap::new(),
        matched: Vec::with_capacity(descriptor.len()),
        found: Vec::new(),
    };
    search.extend(0);
    search.found
}

impl<'q> Search<'q> {
    fn extend(&mut self, depth: usize) {
        if self.found.len() >= self.limit {
            return;
        }
        if depth == self.descriptor.len() {
            self.found.push(Embedding {
                mapping: self.forward.clone(),
                matched: self.matched.clone(),
            });
            return;
        }
        let descriptor = self.descriptor;
        let pattern = &descriptor[depth];
        for candidate in 0..self.query.len() {
            if self.used[candidate] {
                continue;
            }
            let (member, query_pattern) = self.query[candidate];
            let Some(added) = self.unify(pattern, query_pattern) else {
                continue;
            };
            self.used[candidate] = true;
            self.matched.push(member);
            self.extend(depth + 1);
            self.matched.pop();
            self.used[candidate] = false;
            self.undo(added);
        }
    }

    /// Extends the renaming so that `descriptor` maps onto `query`. Returns
    /// the descriptor variables it added, or `None` with nothing changed.
    fn unify(&mut self, descriptor: &StatementPattern, query: &StatementPattern) -> Option<Vec<String>> {
        if descriptor.context.is_some() != query.context.is_some() {
            return None;
        }
        let mut added = Vec::new();
        for (d, q) in descriptor.terms().zip(query.terms()) {
            let consistent = match (d, q) {
                (Term::Variable(dv), Term::Variable(qv)) => match self.forward.get(dv) {
                    Some(mapped) => mapped == qv,
                    None if self.backward.contains_key(qv) => false,
                    None => {
                        self.forward.insert(dv.clone(), qv.clone());
                        self.backward.insert(qv.clone(), dv.clone());
                        added.push(dv.clone());
                        true
                    }
                },
                (Term::Constant(a), Term::Constant(b)) => a == b,
                _ => false,
            };
            if !consistent {
                self.undo(added);
                return None;
            }
        }
        Some(added)
    }

    fn undo(&mut self, added: Vec<String>) {
        for dv in added {
            if let Some(qv) = self.forward.remove(&dv) {
                self.backward.remove(&qv);
            }
        }
    }
}
