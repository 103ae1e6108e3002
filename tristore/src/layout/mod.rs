/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Key layouts of the three triple tables.
//!
//! Every statement is written once per layout. A row key is the three
//! positions in layout order joined with [`DELIM_BYTE`], followed by the
//! object's type suffix:
//!
//! | layout | row key                                   |
//! |--------|-------------------------------------------|
//! | SPO    | `s DELIM p DELIM o TYPE_DELIM marker`     |
//! | POS    | `p DELIM o DELIM s TYPE_DELIM marker`     |
//! | OSP    | `o DELIM s DELIM p TYPE_DELIM marker`     |
//!
//! Subjects and predicates are stored as bare payloads; only the object
//! carries type information. The statement context is not part of the key.

pub mod dispatcher;
pub mod strategy;

pub use dispatcher::RangeDispatcher;
pub use strategy::{LayoutRange, LayoutRangeStrategy, STRATEGIES};

use serde::{Deserialize, Serialize};
use shared::terms::TypedValue;
use shared::triple::{Position, Triple};
use std::fmt;
use crate::codec::resolvers::BLANK_NODE_PREFIX;
use crate::codec::{CodecRegistry, DELIM_BYTE, LAST_BYTE, TYPE_DELIM_BYTE};
use crate::error::{CodecError, CodecResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyLayout {
    Spo,
    Pos,
    Osp,
}

impl KeyLayout {
    pub const ALL: [KeyLayout; 3] = [KeyLayout::Spo, KeyLayout::Pos, KeyLayout::Osp];

    pub fn key_order(self) -> [Position; 3] {
        match self {
            KeyLayout::Spo => [Position::Subject, Position::Predicate, Position::Object],
            KeyLayout::Pos => [Position::Predicate, Position::Object, Position::Subject],
            KeyLayout::Osp => [Position::Object, Position::Subject, Position::Predicate],
        }
    }

    pub fn table_suffix(self) -> &'static str {
        match self {
            KeyLayout::Spo => "spo",
            KeyLayout::Pos => "po",
            KeyLayout::Osp => "osp",
        }
    }

    pub fn table_name(self, prefix: &str) -> String {
        format!("{}{}", prefix, self.table_suffix())
    }

    pub fn serialize_row(self, codec: &CodecRegistry, triple: &Triple) -> CodecResult<Vec<u8>> {
        let object = codec.serialize(&triple.object)?;
        let mut row = Vec::new();
        for (i, position) in self.key_order().into_iter().enumerate() {
            if i > 0 {
                row.push(DELIM_BYTE);
            }
            match position {
                Position::Object => row.extend_from_slice(&object.payload),
                other => row.extend(key_part(codec, triple.get(other), other)?),
            }
        }
        row.push(TYPE_DELIM_BYTE);
        row.extend_from_slice(&object.type_info);
        Ok(row)
    }

    /// Inverse of [`serialize_row`](Self::serialize_row); the context is not
    /// part of the row and stays `None`.
    pub fn deserialize_row(self, codec: &CodecRegistry, row: &[u8]) -> CodecResult<Triple> {
        let parts: Vec<&[u8]> = row.split(|b| *b == DELIM_BYTE).collect();
        let [first, second, last] = parts.as_slice() else {
            return Err(CodecError::Malformed(format!(
                "{} row has {} parts",
                self,
                parts.len()
            )));
        };
        let split = last
            .iter()
            .position(|b| *b == TYPE_DELIM_BYTE)
            .ok_or_else(|| CodecError::Malformed(format!("{} row without type suffix", self)))?;
        let (third, type_info) = (&last[..split], &last[split + 1..]);

        let mut subject = None;
        let mut predicate = None;
        let mut object = None;
        for (position, bytes) in self.key_order().into_iter().zip([*first, *second, third]) {
            match position {
                Position::Subject => subject = Some(decode_key_part(bytes)?),
                Position::Predicate => predicate = Some(decode_key_part(bytes)?),
                Position::Object => object = Some(codec.deserialize_parts(bytes, type_info)?),
            }
        }
        match (subject, predicate, object) {
            (Some(s), Some(p), Some(o)) => Ok(Triple::new(s, p, o)),
            _ => Err(CodecError::Malformed(format!("incomplete {} row", self))),
        }
    }
}

impl fmt::Display for KeyLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyLayout::Spo => "SPO",
            KeyLayout::Pos => "POS",
            KeyLayout::Osp => "OSP",
        };
        f.write_str(name)
    }
}

/// Untyped payload of a subject or predicate. Objects go through the
/// full codec because their type suffix trails the row.
pub(crate) fn key_part(codec: &CodecRegistry, value: &TypedValue, position: Position) -> CodecResult<Vec<u8>> {
    let allowed = match position {
        Position::Subject => !value.is_literal(),
        Position::Predicate => value.is_uri(),
        Position::Object => true,
    };
    if !allowed {
        return Err(CodecError::UnsupportedPosition {
            value: value.to_string(),
            position,
        });
    }
    codec.payload(value)
}

fn decode_key_part(bytes: &[u8]) -> CodecResult<TypedValue> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| CodecError::Malformed(format!("key part is not UTF-8: {}", e)))?;
    Ok(match text.strip_prefix(BLANK_NODE_PREFIX) {
        Some(id) => TypedValue::blank(id),
        None => TypedValue::uri(text),
    })
}

/// Half-open key interval `[start, stop)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: Vec<u8>,
    pub stop: Vec<u8>,
}

impl ByteRange {
    pub fn new(start: Vec<u8>, stop: Vec<u8>) -> Self {
        Self { start, stop }
    }

    /// Every key that starts with `prefix`.
    pub fn prefix(prefix: Vec<u8>) -> Self {
        let mut stop = prefix.clone();
        stop.push(LAST_BYTE);
        Self { start: prefix, stop }
    }

    /// Every key of a table.
    pub fn full() -> Self {
        Self {
            start: Vec::new(),
            stop: vec![LAST_BYTE],
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.start.as_slice() <= key && key < self.stop.as_slice()
    }
}
