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
use shared::triple::TriplePattern;
use std::sync::Arc;
use crate::codec::CodecRegistry;
use crate::config::LayoutConfig;
use crate::error::{NoApplicableLayoutError, RangeResult};
use super::{KeyLayout, LayoutRange, LayoutRangeStrategy};

/// Picks the first layout, in priority order, that can answer a pattern
/// with one contiguous scan.
pub struct RangeDispatcher {
    codec: Arc<CodecRegistry>,
    strategies: Vec<&'static LayoutRangeStrategy>,
}

impl RangeDispatcher {
    pub fn new(codec: Arc<CodecRegistry>) -> Self {
        Self::with_priority(codec, &KeyLayout::ALL)
    }

    pub fn with_priority(codec: Arc<CodecRegistry>, priority: &[KeyLayout]) -> Self {
        Self {
            codec,
            strategies: priority
                .iter()
                .map(|layout| LayoutRangeStrategy::for_layout(*layout))
                .collect(),
        }
    }

    pub fn from_config(codec: Arc<CodecRegistry>, config: &LayoutConfig) -> Self {
        Self::with_priority(codec, &config.priority)
    }

    pub fn codec(&self) -> &CodecRegistry {
        &self.codec
    }

    pub fn shared_codec(&self) -> Arc<CodecRegistry> {
        Arc::clone(&self.codec)
    }

    /// Layouts that would accept `pattern`, in priority order.
    pub fn handling_layouts(&self, pattern: &TriplePattern) -> Vec<KeyLayout> {
        self.strategies
            .iter()
            .filter(|st| (st.handles)(pattern))
            .map(|st| st.layout)
            .collect()
    }

    pub fn select_layout(&self, pattern: &TriplePattern) -> Option<KeyLayout> {
        self.strategies
            .iter()
            .find(|st| (st.handles)(pattern))
            .map(|st| st.layout)
    }

    pub fn define_range(&self, pattern: &TriplePattern) -> RangeResult<LayoutRange> {
        for strategy in &self.strategies {
            if let Some(range) = (strategy.define_range)(&self.codec, pattern)? {
                debug!("Pattern {:?} served by {} layout", pattern, strategy.layout);
                return Ok(range);
            }
        }
        Err(NoApplicableLayoutError {
            pattern: format!("{:?}", pattern),
        }
        .into())
    }
}
