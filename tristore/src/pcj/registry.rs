/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use log::info;
use std::sync::{Arc, PoisonError, RwLock};
use crate::error::DescriptorError;
use super::descriptor::PcjDescriptor;

pub type DescriptorSnapshot = Arc<Vec<Arc<PcjDescriptor>>>;

/// Registered PCJ descriptors, in registration order.
///
/// Updates swap in a new list, so a snapshot taken for one optimization
/// stays unchanged while descriptors are added or removed.
#[derive(Debug, Default)]
pub struct PcjRegistry {
    current: RwLock<DescriptorSnapshot>,
}

impl PcjRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DescriptorSnapshot {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn register(&self, descriptor: PcjDescriptor) -> Result<Arc<PcjDescriptor>, DescriptorError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.iter().any(|d| d.id() == descriptor.id()) {
            return Err(DescriptorError::DuplicateId(descriptor.id().to_string()));
        }
        let descriptor = Arc::new(descriptor);
        let mut next: Vec<Arc<PcjDescriptor>> = current.as_ref().clone();
        next.push(Arc::clone(&descriptor));
        *current = Arc::new(next);
        info!("Registered PCJ '{}' over {}", descriptor.id(), descriptor.location().table);
        Ok(descriptor)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<PcjDescriptor>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let position = current.iter().position(|d| d.id() == id)?;
        let mut next: Vec<Arc<PcjDescriptor>> = current.as_ref().clone();
        let removed = next.remove(position);
        *current = Arc::new(next);
        info!("Removed PCJ '{}'", id);
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<Arc<PcjDescriptor>> {
        self.snapshot().iter().find(|d| d.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::query::AlgebraNode;
    use shared::term_parser::parse_statement_pattern;
    use crate::pcj::{PcjLocation, VarOrderPolicy};

    fn descriptor(id: &str) -> PcjDescriptor {
        let pattern = AlgebraNode::Pattern(parse_statement_pattern("?e <uri:talksTo> ?o").unwrap());
        PcjDescriptor::new(
            id,
            pattern,
            vec!["e".to_string(), "o".to_string()],
            PcjLocation::for_id("rya_", id),
            VarOrderPolicy::Strict,
        )
        .unwrap()
    }

    #[test]
    fn test_snapshot_is_stable() {
        let registry = PcjRegistry::new();
        registry.register(descriptor("a")).unwrap();
        let before = registry.snapshot();
        registry.register(descriptor("b")).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(registry.len(), 2);

        let ids: Vec<String> = registry.snapshot().iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(before.len(), 1);
        assert!(registry.get("b").is_some());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = PcjRegistry::new();
        registry.register(descriptor("a")).unwrap();
        assert_eq!(
            registry.register(descriptor("a")).unwrap_err(),
            DescriptorError::DuplicateId("a".to_string())
        );
    }

    #[test]
    fn test_concurrent_readers() {
        let registry = Arc::new(PcjRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register(descriptor(&format!("pcj{}", i))).unwrap();
                    registry.snapshot().len()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap() >= 1);
        }
        assert_eq!(registry.len(), 4);
    }
}
