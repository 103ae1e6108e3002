/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Store configuration, read from JSON with every field optional:
//!
//! ```json
//! {
//!   "table_prefix": "rya_",
//!   "layouts": { "priority": ["spo", "pos", "osp"] },
//!   "codec": { "allow_custom_datatypes": true },
//!   "pcj": { "var_order_policy": "strict", "max_embeddings": 64 },
//!   "validator": { "reject_cross_products": false }
//! }
//! ```
//!
//! `TRISTORE_TABLE_PREFIX`, `TRISTORE_VAR_ORDER_POLICY` and
//! `TRISTORE_MAX_EMBEDDINGS` override the file.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use crate::error::ConfigError;
use crate::layout::KeyLayout;
use crate::pcj::VarOrderPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prepended to every layout and PCJ table name.
    pub table_prefix: String,
    pub layouts: LayoutConfig,
    pub codec: CodecConfig,
    pub pcj: PcjConfig,
    pub validator: ValidatorConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_prefix: "rya_".to_string(),
            layouts: LayoutConfig::default(),
            codec: CodecConfig::default(),
            pcj: PcjConfig::default(),
            validator: ValidatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Dispatch order; the first layout that handles a pattern wins.
    pub priority: Vec<KeyLayout>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            priority: KeyLayout::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub allow_custom_datatypes: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            allow_custom_datatypes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcjConfig {
    pub var_order_policy: VarOrderPolicy,
    /// Upper bound on candidate embeddings examined per descriptor and segment.
    pub max_embeddings: usize,
}

impl Default for PcjConfig {
    fn default() -> Self {
        Self {
            var_order_policy: VarOrderPolicy::Strict,
            max_embeddings: 64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub reject_cross_products: bool,
}

impl StoreConfig {
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// Applies `TRISTORE_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup("TRISTORE_TABLE_PREFIX") {
            self.table_prefix = prefix;
        }
        if let Some(policy) = lookup("TRISTORE_VAR_ORDER_POLICY") {
            self.pcj.var_order_policy = policy.parse()?;
        }
        if let Some(limit) = lookup("TRISTORE_MAX_EMBEDDINGS") {
            self.pcj.max_embeddings = limit.parse().map_err(|_| {
                ConfigError::Invalid(format!("max_embeddings '{}' is not a number", limit))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let priority = &self.layouts.priority;
        if priority.is_empty() {
            return Err(ConfigError::Invalid("layout priority is empty".to_string()));
        }
        for (i, layout) in priority.iter().enumerate() {
            if priority[..i].contains(layout) {
                return Err(ConfigError::Invalid(format!(
                    "layout {} listed twice in the priority",
                    layout
                )));
            }
        }
        if self.pcj.max_embeddings == 0 {
            return Err(ConfigError::Invalid("max_embeddings must be at least 1".to_string()));
        }
        if self.table_prefix.bytes().any(|b| b.is_ascii_control()) {
            return Err(ConfigError::Invalid("table prefix contains control characters".to_string()));
        }
        Ok(())
    }
}
