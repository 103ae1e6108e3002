/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! PCJ tables.
//!
//! Each solution is written once per supported variable order under the row
//! key `NNNN DELIM v1 DELIM v2 .. DELIM vn`, where `NNNN` is the order's
//! index in four digits and each `vi` is a fully serialized value. A
//! metadata row under [`METADATA_ROW`] holds the JSON-encoded
//! [`PcjMetadata`].

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use shared::query::AlgebraNode;
use shared::terms::TypedValue;
use std::collections::BTreeSet;
use std::sync::Arc;
use crate::codec::{CodecRegistry, DELIM_BYTE};
use crate::error::{CodecError, StorageError, StorageResult};
use crate::execution::Solution;
use crate::layout::ByteRange;
use crate::store::{RowSink, ScanSource};
use super::descriptor::PcjDescriptor;

pub const METADATA_ROW: &[u8] = b"~metadata";

const ORDER_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcjMetadata {
    pub id: String,
    pub variable_orders: Vec<Vec<String>>,
    pub cardinality: u64,
    pub defining_pattern: AlgebraNode,
}

pub struct PcjStorage {
    codec: Arc<CodecRegistry>,
}

fn order_prefix(index: usize) -> Vec<u8> {
    let mut prefix = format!("{:0width$}", index, width = ORDER_PREFIX_LEN).into_bytes();
    prefix.push(DELIM_BYTE);
    prefix
}

impl PcjStorage {
    pub fn new(codec: Arc<CodecRegistry>) -> Self {
        Self { codec }
    }

    /// Writes `solutions` in every supported order and records the metadata.
    /// Returns the number of distinct solutions stored. Solutions that leave
    /// a PCJ variable unbound are skipped; any value that fails to serialize
    /// aborts the whole write.
    pub fn materialize<S: RowSink>(
        &self,
        store: &mut S,
        descriptor: &PcjDescriptor,
        solutions: &[Solution],
    ) -> StorageResult<u64> {
        let table = &descriptor.location().table;
        let orders = descriptor.binding_index().orders();

        let mut rows: Vec<BTreeSet<Vec<u8>>> = vec![BTreeSet::new(); orders.len()];
        let variables = orders.first().map_or(&[][..], Vec::as_slice);
        for solution in solutions {
            if let Some(var) = variables.iter().find(|var| !solution.contains_key(*var)) {
                warn!("Skipping PCJ '{}' solution: ?{} is unbound", descriptor.id(), var);
                continue;
            }
            for (index, order) in orders.iter().enumerate() {
                rows[index].insert(self.row_key(index, order, solution)?);
            }
        }

        let cardinality = rows.first().map_or(0, |r| r.len() as u64);
        for row in rows.into_iter().flatten() {
            store.put(table, row, Vec::new(), Vec::new());
        }

        let metadata = PcjMetadata {
            id: descriptor.id().to_string(),
            variable_orders: orders.to_vec(),
            cardinality,
            defining_pattern: descriptor.defining_pattern().clone(),
        };
        store.put(table, METADATA_ROW.to_vec(), Vec::new(), serde_json::to_vec(&metadata)?);
        debug!("Materialized {} solutions into {}", cardinality, table);
        Ok(cardinality)
    }

    fn row_key(&self, index: usize, order: &[String], solution: &Solution) -> StorageResult<Vec<u8>> {
        let mut row = order_prefix(index);
        for (i, var) in order.iter().enumerate() {
            let value = solution
                .get(var)
                .ok_or_else(|| CodecError::Malformed(format!("?{} is unbound", var)))?;
            if i > 0 {
                row.push(DELIM_BYTE);
            }
            row.extend(self.codec.serialize_bytes(value)?);
        }
        Ok(row)
    }

    pub fn load_metadata<S: ScanSource>(&self, store: &S, table: &str) -> StorageResult<PcjMetadata> {
        let range = ByteRange::new(METADATA_ROW.to_vec(), {
            let mut stop = METADATA_ROW.to_vec();
            stop.push(0);
            stop
        });
        let entry = store
            .scan(table, &range)?
            .next()
            .ok_or_else(|| StorageError::MissingMetadata(table.to_string()))?;
        Ok(serde_json::from_slice(entry.value)?)
    }

    /// Solutions, keyed by descriptor variables, that agree with `bound`.
    /// The relevant bound variables must form a prefix of a supported order.
    pub fn scan<S: ScanSource>(
        &self,
        store: &S,
        descriptor: &PcjDescriptor,
        bound: &Solution,
    ) -> StorageResult<Vec<Solution>> {
        let bound_vars: BTreeSet<String> = bound.keys().cloned().collect();
        let (index, order) = descriptor
            .binding_index()
            .order_for(&bound_vars)
            .ok_or_else(|| StorageError::UnsupportedBindings {
                pcj_id: descriptor.id().to_string(),
                bound: bound_vars.iter().cloned().collect(),
            })?;

        let mut start = order_prefix(index);
        let prefix: Vec<&TypedValue> = order.iter().map_while(|v| bound.get(v)).collect();
        for (i, value) in prefix.iter().enumerate() {
            if i > 0 {
                start.push(DELIM_BYTE);
            }
            start.extend(self.codec.serialize_bytes(value)?);
        }
        if !prefix.is_empty() && prefix.len() < order.len() {
            start.push(DELIM_BYTE);
        }

        let table = &descriptor.location().table;
        let mut solutions = Vec::new();
        for entry in store.scan(table, &ByteRange::prefix(start))? {
            let values = entry.row[ORDER_PREFIX_LEN + 1..].split(|b| *b == DELIM_BYTE);
            let mut solution = Solution::new();
            for (var, bytes) in order.iter().zip(values) {
                solution.insert(var.clone(), self.codec.deserialize(bytes)?);
            }
            if solution.len() != order.len() {
                return Err(CodecError::Malformed(format!("short PCJ row in {}", table)).into());
            }
            if bound.iter().all(|(var, value)| solution.get(var) == Some(value)) {
                solutions.push(solution);
            }
        }
        Ok(solutions)
    }

    pub fn drop_table<S: RowSink>(&self, store: &mut S, descriptor: &PcjDescriptor) -> bool {
        store.drop_table(&descriptor.location().table)
    }
}
