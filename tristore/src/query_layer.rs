/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Entry point wiring codec, dispatcher, PCJ registry and optimizer
//! together from one [`StoreConfig`].

use shared::query::AlgebraNode;
use shared::triple::TriplePattern;
use std::io;
use std::sync::Arc;
use crate::codec::CodecRegistry;
use crate::config::StoreConfig;
use crate::error::{ConfigError, DescriptorError};
use crate::layout::{LayoutRange, RangeDispatcher};
use crate::optimizer::{PcjOptimizer, PlanValidator};
use crate::pcj::{PcjDescriptor, PcjLocation, PcjRegistry};

pub struct QueryLayer {
    config: StoreConfig,
    dispatcher: RangeDispatcher,
    registry: PcjRegistry,
    optimizer: PcjOptimizer,
}

impl QueryLayer {
    pub fn new(config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let codec = Arc::new(CodecRegistry::from_config(&config.codec));
        Ok(Self {
            dispatcher: RangeDispatcher::from_config(codec, &config.layouts),
            registry: PcjRegistry::new(),
            optimizer: PcjOptimizer::from_config(&config.pcj),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn codec(&self) -> Arc<CodecRegistry> {
        self.dispatcher.shared_codec()
    }

    pub fn dispatcher(&self) -> &RangeDispatcher {
        &self.dispatcher
    }

    pub fn registry(&self) -> &PcjRegistry {
        &self.registry
    }

    /// Registers a PCJ stored under `<table_prefix>INDEX_<id>` with the
    /// configured variable order policy.
    pub fn define_pcj(
        &self,
        id: &str,
        defining_pattern: AlgebraNode,
        variable_order: Vec<String>,
    ) -> Result<Arc<PcjDescriptor>, DescriptorError> {
        let descriptor = PcjDescriptor::new(
            id,
            defining_pattern,
            variable_order,
            PcjLocation::for_id(&self.config.table_prefix, id),
            self.config.pcj.var_order_policy,
        )?;
        self.registry.register(descriptor)
    }

    /// Layout and byte range for one pattern; codec and layout failures
    /// surface as `InvalidInput`.
    pub fn prepare_scan(&self, pattern: &TriplePattern) -> io::Result<LayoutRange> {
        Ok(self.dispatcher.define_range(pattern)?)
    }

    /// Substitutes registered PCJs into `tree`, keeping the original when
    /// the rewrite fails validation.
    pub fn rewrite(&self, tree: &AlgebraNode) -> AlgebraNode {
        let snapshot = self.registry.snapshot();
        let validator = PlanValidator::with_config(&snapshot, &self.config.validator);
        self.optimizer.optimize_validated(tree, &snapshot, &validator)
    }

    pub fn rewrite_batch(&self, trees: &[AlgebraNode]) -> Vec<AlgebraNode> {
        let snapshot = self.registry.snapshot();
        let validator = PlanValidator::with_config(&snapshot, &self.config.validator);
        self.optimizer
            .optimize_batch(trees, &snapshot)
            .into_iter()
            .zip(trees)
            .map(|(rewritten, original)| {
                if validator.is_valid(&rewritten) {
                    rewritten
                } else {
                    original.clone()
                }
            })
            .collect()
    }
}
