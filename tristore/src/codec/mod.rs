/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Typed value codec.
//!
//! A value serializes to `payload TYPE_DELIM marker [datatype-iri]`. The
//! payload is an order-preserving rendering of the value and never contains
//! [`DELIM_BYTE`] or [`TYPE_DELIM_BYTE`]; the marker says which resolver
//! wrote it. Values of one datatype therefore sort by payload, and values
//! sharing a payload sort by marker.

pub mod resolvers;

use log::{debug, warn};
use rustc_hash::FxHashMap;
use shared::terms::TypedValue;
use std::sync::Arc;
use crate::config::CodecConfig;
use crate::error::{CodecError, CodecResult};
use resolvers::*;

/// Separates the positions of a row key and the values of a PCJ row.
pub const DELIM_BYTE: u8 = 0x01;
/// Separates a value's payload from its type information.
pub const TYPE_DELIM_BYTE: u8 = 0x00;
/// Appended to a start key to form the exclusive stop of a prefix scan.
pub const LAST_BYTE: u8 = 0xFF;

/// A value split into its order-preserving payload and its type suffix
/// (marker byte, then the datatype IRI for custom literals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedValue {
    pub payload: Vec<u8>,
    pub type_info: Vec<u8>,
}

impl SerializedValue {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + 1 + self.type_info.len());
        bytes.extend_from_slice(&self.payload);
        bytes.push(TYPE_DELIM_BYTE);
        bytes.extend_from_slice(&self.type_info);
        bytes
    }
}

fn check_reserved(bytes: &[u8], value: &TypedValue) -> CodecResult<()> {
    if bytes.iter().any(|b| *b == DELIM_BYTE || *b == TYPE_DELIM_BYTE) {
        return Err(CodecError::ReservedByte {
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Resolver lookup by datatype (for serialization) and by marker byte
/// (for deserialization). Built once at startup and read-only afterwards.
pub struct CodecRegistry {
    uri: Arc<dyn TypeResolver>,
    blank: Arc<dyn TypeResolver>,
    literals: FxHashMap<String, Arc<dyn TypeResolver>>,
    by_marker: FxHashMap<u8, Arc<dyn TypeResolver>>,
    custom: Option<Arc<dyn TypeResolver>>,
}

impl CodecRegistry {
    /// Registry with the built-in resolvers; unregistered literal datatypes
    /// fall back to verbatim labels when `allow_custom_datatypes` is set.
    pub fn new(allow_custom_datatypes: bool) -> Self {
        let uri: Arc<dyn TypeResolver> = Arc::new(UriResolver);
        let blank: Arc<dyn TypeResolver> = Arc::new(BlankNodeResolver);
        let mut registry = Self {
            by_marker: FxHashMap::default(),
            literals: FxHashMap::default(),
            uri: Arc::clone(&uri),
            blank: Arc::clone(&blank),
            custom: None,
        };
        registry.by_marker.insert(uri.marker(), uri);
        registry.by_marker.insert(blank.marker(), blank);

        registry.register(Arc::new(StringResolver));
        registry.register(Arc::new(IntegerResolver::integer()));
        registry.register(Arc::new(IntegerResolver::long()));
        registry.register(Arc::new(IntegerResolver::int()));
        registry.register(Arc::new(DoubleResolver));
        registry.register(Arc::new(BooleanResolver));
        registry.register(Arc::new(DateTimeResolver));

        if allow_custom_datatypes {
            let custom: Arc<dyn TypeResolver> = Arc::new(CustomDatatypeResolver);
            registry.by_marker.insert(custom.marker(), Arc::clone(&custom));
            registry.custom = Some(custom);
        }
        registry
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        Self::new(config.allow_custom_datatypes)
    }

    /// Adds a literal resolver, replacing any earlier one for its datatype.
    pub fn register(&mut self, resolver: Arc<dyn TypeResolver>) {
        let datatype = resolver.datatype().to_string();
        if let Some(previous) = self.by_marker.get(&resolver.marker()) {
            if previous.datatype() != datatype {
                warn!(
                    "Marker {:#04x} moves from <{}> to <{}>",
                    resolver.marker(),
                    previous.datatype(),
                    datatype
                );
            }
        }
        debug!("Registering serializer for <{}>", datatype);
        self.by_marker.insert(resolver.marker(), Arc::clone(&resolver));
        self.literals.insert(datatype, resolver);
    }

    fn resolver_for(&self, value: &TypedValue) -> CodecResult<(&Arc<dyn TypeResolver>, bool)> {
        match value {
            TypedValue::Uri(_) => Ok((&self.uri, false)),
            TypedValue::BlankNode(_) => Ok((&self.blank, false)),
            TypedValue::Literal { datatype, .. } => match self.literals.get(datatype) {
                Some(resolver) => Ok((resolver, false)),
                None => self
                    .custom
                    .as_ref()
                    .map(|c| (c, true))
                    .ok_or_else(|| CodecError::UnregisteredType(datatype.clone())),
            },
        }
    }

    pub fn serialize(&self, value: &TypedValue) -> CodecResult<SerializedValue> {
        let (resolver, custom) = self.resolver_for(value)?;
        let payload = resolver.encode(value)?.into_bytes();
        check_reserved(&payload, value)?;

        let mut type_info = vec![resolver.marker()];
        if custom {
            if let Some(datatype) = value.datatype() {
                check_reserved(datatype.as_bytes(), value)?;
                type_info.extend_from_slice(datatype.as_bytes());
            }
        }
        Ok(SerializedValue { payload, type_info })
    }

    pub fn serialize_bytes(&self, value: &TypedValue) -> CodecResult<Vec<u8>> {
        self.serialize(value).map(|s| s.to_bytes())
    }

    /// Order-preserving payload only, as used in untyped key positions.
    pub fn payload(&self, value: &TypedValue) -> CodecResult<Vec<u8>> {
        self.serialize(value).map(|s| s.payload)
    }

    pub fn deserialize(&self, bytes: &[u8]) -> CodecResult<TypedValue> {
        let split = bytes
            .iter()
            .position(|b| *b == TYPE_DELIM_BYTE)
            .ok_or_else(|| CodecError::Malformed("missing type delimiter".to_string()))?;
        self.deserialize_parts(&bytes[..split], &bytes[split + 1..])
    }

    pub fn deserialize_parts(&self, payload: &[u8], type_info: &[u8]) -> CodecResult<TypedValue> {
        let (&marker, datatype) = type_info
            .split_first()
            .ok_or_else(|| CodecError::Malformed("missing type marker".to_string()))?;
        let resolver = self
            .by_marker
            .get(&marker)
            .ok_or(CodecError::UnknownMarker(marker))?;

        let payload = std::str::from_utf8(payload)
            .map_err(|e| CodecError::Malformed(format!("payload is not UTF-8: {}", e)))?;
        let datatype = if datatype.is_empty() {
            None
        } else if marker != CUSTOM_MARKER {
            return Err(CodecError::Malformed(format!(
                "trailing bytes after marker {:#04x}",
                marker
            )));
        } else {
            Some(
                std::str::from_utf8(datatype)
                    .map_err(|e| CodecError::Malformed(format!("datatype is not UTF-8: {}", e)))?,
            )
        };
        resolver.decode(payload, datatype)
    }

    /// Payload bounds for an inclusive range. Both ends must serialize to the
    /// same kind and `start` may not sort after `stop`.
    pub fn transform_range(
        &self,
        start: &TypedValue,
        stop: &TypedValue,
    ) -> CodecResult<(Vec<u8>, Vec<u8>)> {
        let lo = self.serialize(start)?;
        let hi = self.serialize(stop)?;
        if lo.type_info != hi.type_info {
            return Err(CodecError::MismatchedRange {
                start: start.to_string(),
                stop: stop.to_string(),
            });
        }
        if lo.payload > hi.payload {
            return Err(CodecError::InvertedRange {
                start: start.to_string(),
                stop: stop.to_string(),
            });
        }
        Ok((lo.payload, hi.payload))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}
