/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Sorted key-value tables and the triple rows written into them.

use log::debug;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use shared::terms::{Component, TypedValue};
use shared::triple::{Position, Triple, TriplePattern};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use crate::codec::CodecRegistry;
use crate::error::{CodecResult, StorageError, StorageResult};
use crate::layout::{ByteRange, KeyLayout, LayoutRange};

/// One cell of a table: row key, column qualifier and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub row: &'a [u8],
    pub column: &'a [u8],
    pub value: &'a [u8],
}

/// Ordered range reads over named tables.
pub trait ScanSource {
    /// Entries with `range.start <= row < range.stop`, in row then column order.
    fn scan<'a>(
        &'a self,
        table: &str,
        range: &ByteRange,
    ) -> StorageResult<Box<dyn Iterator<Item = Entry<'a>> + 'a>>;
}

/// Writes into named tables; a missing table is created on first write.
pub trait RowSink {
    fn put(&mut self, table: &str, row: Vec<u8>, column: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, table: &str, row: &[u8], column: &[u8]) -> bool;

    fn drop_table(&mut self, table: &str) -> bool;
}

type Table = BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>;

/// In-memory sorted table store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: FxHashMap<String, Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&mut self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Number of cells in `table`, 0 when it does not exist.
    pub fn cell_count(&self, table: &str) -> usize {
        self.tables
            .get(table)
            .map_or(0, |t| t.values().map(BTreeMap::len).sum())
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ScanSource for MemoryStore {
    fn scan<'a>(
        &'a self,
        table: &str,
        range: &ByteRange,
    ) -> StorageResult<Box<dyn Iterator<Item = Entry<'a>> + 'a>> {
        let rows = self
            .tables
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        if range.start >= range.stop {
            return Ok(Box::new(std::iter::empty()));
        }
        let bounds = (
            Bound::Included(range.start.as_slice()),
            Bound::Excluded(range.stop.as_slice()),
        );
        Ok(Box::new(rows.range::<[u8], _>(bounds).flat_map(|(row, columns)| {
            columns.iter().map(move |(column, value)| Entry {
                row,
                column,
                value,
            })
        })))
    }
}

impl RowSink for MemoryStore {
    fn put(&mut self, table: &str, row: Vec<u8>, column: Vec<u8>, value: Vec<u8>) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .entry(row)
            .or_default()
            .insert(column, value);
    }

    fn delete(&mut self, table: &str, row: &[u8], column: &[u8]) -> bool {
        let Some(rows) = self.tables.get_mut(table) else {
            return false;
        };
        let Some(columns) = rows.get_mut(row) else {
            return false;
        };
        let removed = columns.remove(column).is_some();
        if columns.is_empty() {
            rows.remove(row);
        }
        removed
    }

    fn drop_table(&mut self, table: &str) -> bool {
        self.tables.remove(table).is_some()
    }
}

/// Writes each statement into all three layout tables.
pub struct TripleWriter {
    codec: Arc<CodecRegistry>,
    table_prefix: String,
}

impl TripleWriter {
    pub fn new(codec: Arc<CodecRegistry>, table_prefix: impl Into<String>) -> Self {
        Self {
            codec,
            table_prefix: table_prefix.into(),
        }
    }

    pub fn create_tables(&self, store: &mut MemoryStore) {
        for layout in KeyLayout::ALL {
            store.create_table(&layout.table_name(&self.table_prefix));
        }
    }

    fn cells(&self, triple: &Triple) -> CodecResult<Vec<(String, Vec<u8>, Vec<u8>)>> {
        let column = match &triple.context {
            Some(context) => self.codec.serialize_bytes(context)?,
            None => Vec::new(),
        };
        KeyLayout::ALL
            .into_iter()
            .map(|layout| {
                Ok((
                    layout.table_name(&self.table_prefix),
                    layout.serialize_row(&self.codec, triple)?,
                    column.clone(),
                ))
            })
            .collect()
    }

    /// Nothing is written when any of the three rows fails to serialize.
    pub fn write<S: RowSink>(&self, store: &mut S, triple: &Triple) -> CodecResult<()> {
        for (table, row, column) in self.cells(triple)? {
            store.put(&table, row, column, Vec::new());
        }
        Ok(())
    }

    pub fn write_all<'t, S, I>(&self, store: &mut S, triples: I) -> CodecResult<usize>
    where
        S: RowSink,
        I: IntoIterator<Item = &'t Triple>,
    {
        let mut written = 0;
        for triple in triples {
            self.write(store, triple)?;
            written += 1;
        }
        debug!("Wrote {} statements under prefix '{}'", written, self.table_prefix);
        Ok(written)
    }

    pub fn delete<S: RowSink>(&self, store: &mut S, triple: &Triple) -> CodecResult<bool> {
        let mut removed = false;
        for (table, row, column) in self.cells(triple)? {
            removed |= store.delete(&table, &row, &column);
        }
        Ok(removed)
    }
}

/// Decodes the statements inside a prepared range, keeping only rows whose
/// context column matches when the range carries one.
pub fn scan_range<S: ScanSource>(
    store: &S,
    codec: &CodecRegistry,
    table_prefix: &str,
    layout_range: &LayoutRange,
) -> StorageResult<Vec<Triple>> {
    let table = layout_range.layout.table_name(table_prefix);
    let entries: Vec<Entry<'_>> = store
        .scan(&table, &layout_range.range)?
        .filter(|e| match &layout_range.context {
            Some(context) => e.column == context.as_slice(),
            None => true,
        })
        .collect();
    debug!("Scanned {} rows from {}", entries.len(), table);

    let triples = entries
        .par_iter()
        .map(|e| decode_entry(codec, layout_range.layout, e))
        .collect::<CodecResult<Vec<Triple>>>()?;
    Ok(triples)
}

pub fn decode_entry(codec: &CodecRegistry, layout: KeyLayout, entry: &Entry<'_>) -> CodecResult<Triple> {
    let mut triple = layout.deserialize_row(codec, entry.row)?;
    if !entry.column.is_empty() {
        triple.context = Some(codec.deserialize(entry.column)?);
    }
    Ok(triple)
}

/// Whether `triple` satisfies every set component of `pattern`. Ranges
/// compare by codec order within a single datatype.
pub fn pattern_matches(codec: &CodecRegistry, pattern: &TriplePattern, triple: &Triple) -> bool {
    let positions = [Position::Subject, Position::Predicate, Position::Object];
    let spo = positions
        .iter()
        .all(|p| component_matches(codec, pattern.get(*p), Some(triple.get(*p))));
    spo && match &pattern.context {
        Some(component) => component_matches(codec, component, triple.context.as_ref()),
        None => true,
    }
}

fn component_matches(codec: &CodecRegistry, component: &Component, value: Option<&TypedValue>) -> bool {
    match (component, value) {
        (Component::Unbound, _) => true,
        (Component::Bound(expected), Some(v)) => expected == v,
        (Component::Range { start, stop }, Some(v)) => {
            let (Ok(lo), Ok(hi), Ok(actual)) =
                (codec.serialize(start), codec.serialize(stop), codec.serialize(v))
            else {
                return false;
            };
            actual.type_info == lo.type_info && lo.payload <= actual.payload && actual.payload <= hi.payload
        }
        (_, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(v: &str) -> TypedValue {
        TypedValue::uri(v)
    }

    #[test]
    fn test_scan_is_half_open_and_sorted() {
        let mut store = MemoryStore::new();
        for key in ["b", "a", "c", "bb"] {
            store.put("t", key.as_bytes().to_vec(), Vec::new(), Vec::new());
        }
        let rows: Vec<&[u8]> = store
            .scan("t", &ByteRange::new(b"a".to_vec(), b"c".to_vec()))
            .unwrap()
            .map(|e| e.row)
            .collect();
        assert_eq!(rows, vec![b"a".as_slice(), b"b".as_slice(), b"bb".as_slice()]);
        assert!(store
            .scan("t", &ByteRange::new(b"c".to_vec(), b"a".to_vec()))
            .unwrap()
            .next()
            .is_none());
        assert!(matches!(
            store.scan("missing", &ByteRange::full()),
            Err(StorageError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_writer_fills_all_layouts() {
        let codec = Arc::new(CodecRegistry::default());
        let writer = TripleWriter::new(Arc::clone(&codec), "rya_");
        let mut store = MemoryStore::new();
        let t = Triple::new(uri("ex:alice"), uri("ex:knows"), uri("ex:bob"));
        writer.write(&mut store, &t).unwrap();
        assert_eq!(store.table_names(), vec!["rya_osp", "rya_po", "rya_spo"]);
        for layout in KeyLayout::ALL {
            assert_eq!(store.cell_count(&layout.table_name("rya_")), 1);
        }
        assert!(writer.delete(&mut store, &t).unwrap());
        assert_eq!(store.cell_count("rya_spo"), 0);
    }

    #[test]
    fn test_failed_write_leaves_store_untouched() {
        let writer = TripleWriter::new(Arc::new(CodecRegistry::default()), "rya_");
        let mut store = MemoryStore::new();
        let bad = Triple::new(TypedValue::string("lit"), uri("ex:p"), uri("ex:o"));
        assert!(writer.write(&mut store, &bad).is_err());
        assert!(store.table_names().is_empty());
    }

    #[test]
    fn test_context_column_filters_scan() {
        let codec = Arc::new(CodecRegistry::default());
        let writer = TripleWriter::new(Arc::clone(&codec), "rya_");
        let mut store = MemoryStore::new();
        let base = Triple::new(uri("ex:s"), uri("ex:p"), uri("ex:o"));
        writer.write(&mut store, &base).unwrap();
        writer.write(&mut store, &base.clone().with_context(uri("ex:g1"))).unwrap();

        let range = LayoutRange {
            layout: KeyLayout::Spo,
            range: ByteRange::prefix(b"ex:s\x01".to_vec()),
            context: Some(codec.serialize_bytes(&uri("ex:g1")).unwrap()),
        };
        let found = scan_range(&store, &codec, "rya_", &range).unwrap();
        assert_eq!(found, vec![base.clone().with_context(uri("ex:g1"))]);

        let unfiltered = LayoutRange { context: None, ..range };
        assert_eq!(scan_range(&store, &codec, "rya_", &unfiltered).unwrap().len(), 2);
    }

    #[test]
    fn test_pattern_matches_ranges_by_type() {
        let codec = CodecRegistry::default();
        let pattern = TriplePattern::new(
            Component::Unbound,
            Component::Bound(uri("ex:age")),
            Component::range(TypedValue::integer(1), TypedValue::integer(10)),
        );
        let t = |o: TypedValue| Triple::new(uri("ex:x"), uri("ex:age"), o);
        assert!(pattern_matches(&codec, &pattern, &t(TypedValue::integer(5))));
        assert!(!pattern_matches(&codec, &pattern, &t(TypedValue::integer(11))));
        assert!(!pattern_matches(&codec, &pattern, &t(TypedValue::string("5"))));
    }
}
