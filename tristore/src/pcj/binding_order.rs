/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use crate::error::ConfigError;

/// Which variable orders a PCJ table is materialized in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VarOrderPolicy {
    /// Only the declared order.
    #[default]
    Strict,
    /// Every rotation of the declared order.
    Rotations,
}

impl VarOrderPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarOrderPolicy::Strict => "strict",
            VarOrderPolicy::Rotations => "rotations",
        }
    }
}

impl FromStr for VarOrderPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(VarOrderPolicy::Strict),
            "rotations" | "rotation" => Ok(VarOrderPolicy::Rotations),
            _ => Err(ConfigError::Invalid(format!("unknown variable order policy '{}'", s))),
        }
    }
}

/// Answers which sets of pre-bound variables a PCJ can be driven by.
///
/// A table sorted by `v1, v2, .., vn` can be prefix-scanned exactly when
/// the bound variables it knows about are `{v1..vk}` for some `k`. With
/// several supported orders, any of them will do.
#[derive(Debug, Clone)]
pub struct BindingOrderIndex {
    orders: Vec<Vec<String>>,
    variables: FxHashSet<String>,
    /// Prefix set to the first order that has it.
    prefixes: FxHashMap<BTreeSet<String>, usize>,
}

impl BindingOrderIndex {
    pub fn new(declared: &[String], policy: VarOrderPolicy) -> Self {
        let orders: Vec<Vec<String>> = match policy {
            VarOrderPolicy::Strict => vec![declared.to_vec()],
            VarOrderPolicy::Rotations => (0..declared.len().max(1))
                .map(|i| {
                    let mut rotated = declared.to_vec();
                    rotated.rotate_left(i.min(declared.len()));
                    rotated
                })
                .collect(),
        };

        let mut prefixes = FxHashMap::default();
        for (index, order) in orders.iter().enumerate() {
            let mut prefix = BTreeSet::new();
            for var in order {
                prefix.insert(var.clone());
                prefixes.entry(prefix.clone()).or_insert(index);
            }
        }

        Self {
            variables: declared.iter().cloned().collect(),
            orders,
            prefixes,
        }
    }

    /// Orders the table is materialized in; the first is the declared one.
    pub fn orders(&self) -> &[Vec<String>] {
        &self.orders
    }

    /// Bound variables the descriptor does not mention are ignored.
    pub fn supports(&self, bound: &BTreeSet<String>) -> bool {
        self.order_for(bound).is_some()
    }

    /// Index and variables of an order whose prefix equals the relevant
    /// bound variables. With nothing relevant bound, the declared order.
    pub fn order_for(&self, bound: &BTreeSet<String>) -> Option<(usize, &[String])> {
        let relevant: BTreeSet<String> = bound
            .iter()
            .filter(|v| self.variables.contains(*v))
            .cloned()
            .collect();
        let index = if relevant.is_empty() {
            0
        } else {
            *self.prefixes.get(&relevant)?
        };
        self.orders.get(index).map(|o| (index, o.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strict_prefixes() {
        let index = BindingOrderIndex::new(&vars(&["o", "f", "e", "c", "l"]), VarOrderPolicy::Strict);
        assert!(index.supports(&set(&[])));
        assert!(index.supports(&set(&["o"])));
        assert!(index.supports(&set(&["o", "f"])));
        assert!(index.supports(&set(&["f", "o", "e"])));
        assert!(index.supports(&set(&["o", "f", "e", "c", "l"])));
        assert!(!index.supports(&set(&["f", "c"])));
        assert!(!index.supports(&set(&["f"])));
        assert!(!index.supports(&set(&["o", "f", "e", "l"])));
        assert!(!index.supports(&set(&["o", "f", "c"])));
        assert_eq!(index.orders().len(), 1);
    }

    #[test]
    fn test_rotations_accept_wrapped_prefixes() {
        let index = BindingOrderIndex::new(&vars(&["o", "f", "e", "c", "l"]), VarOrderPolicy::Rotations);
        assert_eq!(index.orders().len(), 5);
        // l, o, f, e, c
        assert!(index.supports(&set(&["o", "f", "e", "l"])));
        assert!(index.supports(&set(&["c", "l"])));
        assert!(!index.supports(&set(&["o", "f", "c"])));
        assert!(!index.supports(&set(&["f", "c"])));
        let (i, order) = index.order_for(&set(&["l", "o"])).unwrap();
        assert_eq!(i, 4);
        assert_eq!(order, vars(&["l", "o", "f", "e", "c"]).as_slice());
    }

    #[test]
    fn test_unknown_variables_are_ignored() {
        let index = BindingOrderIndex::new(&vars(&["e", "c", "l", "o"]), VarOrderPolicy::Strict);
        assert!(index.supports(&set(&["chicken"])));
        assert!(index.supports(&set(&["chicken", "e"])));
        assert!(!index.supports(&set(&["chicken", "c"])));
    }

    #[test]
    fn test_policy_names() {
        assert_eq!("Rotations".parse::<VarOrderPolicy>().unwrap(), VarOrderPolicy::Rotations);
        assert!(matches!("loose".parse::<VarOrderPolicy>(), Err(ConfigError::Invalid(_))));
        assert_eq!(VarOrderPolicy::Strict.as_str(), "strict");
    }
}
