/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use chrono::{DateTime, Datelike, Utc};
use shared::terms::{xsd, TypedValue};
use crate::error::{CodecError, CodecResult};

pub const URI_MARKER: u8 = 0x02;
pub const STRING_MARKER: u8 = 0x03;
pub const INTEGER_MARKER: u8 = 0x04;
pub const LONG_MARKER: u8 = 0x05;
pub const INT_MARKER: u8 = 0x06;
pub const DOUBLE_MARKER: u8 = 0x07;
pub const BOOLEAN_MARKER: u8 = 0x08;
pub const DATE_TIME_MARKER: u8 = 0x09;
pub const BLANK_NODE_MARKER: u8 = 0x0A;
pub const CUSTOM_MARKER: u8 = 0x0B;

/// Prefix that tells blank node payloads apart from IRIs in key positions
/// that carry no type marker.
pub const BLANK_NODE_PREFIX: &str = "_:";

const SIGN_FLIP: u64 = 1 << 63;
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Turns one kind of value into an order-preserving textual payload and back.
pub trait TypeResolver: Send + Sync {
    /// Discriminator written after the type delimiter.
    fn marker(&self) -> u8;

    /// Datatype IRI served by this resolver.
    fn datatype(&self) -> &str;

    fn encode(&self, value: &TypedValue) -> CodecResult<String>;

    /// `datatype` is the IRI stored after the marker, present only for custom types.
    fn decode(&self, payload: &str, datatype: Option<&str>) -> CodecResult<TypedValue>;
}

fn invalid(label: &str, datatype: &str) -> CodecError {
    CodecError::InvalidLexical {
        label: label.to_string(),
        datatype: datatype.to_string(),
    }
}

/// Only the canonical label of a value is stored, so decoding gives back
/// exactly what was encoded.
fn canonical(label: &str, expected: &str, datatype: &str) -> CodecResult<()> {
    if label == expected {
        Ok(())
    } else {
        Err(invalid(label, datatype))
    }
}

fn literal_label<'a>(value: &'a TypedValue, datatype: &str) -> CodecResult<&'a str> {
    match value {
        TypedValue::Literal { label, datatype: dt } if dt == datatype => Ok(label),
        other => Err(CodecError::Malformed(format!(
            "{} handed to the <{}> serializer",
            other, datatype
        ))),
    }
}

pub struct UriResolver;

impl TypeResolver for UriResolver {
    fn marker(&self) -> u8 {
        URI_MARKER
    }

    fn datatype(&self) -> &str {
        xsd::ANY_URI
    }

    fn encode(&self, value: &TypedValue) -> CodecResult<String> {
        match value {
            TypedValue::Uri(uri) if uri.starts_with(BLANK_NODE_PREFIX) => Err(invalid(uri, xsd::ANY_URI)),
            TypedValue::Uri(uri) => Ok(uri.clone()),
            other => Err(CodecError::Malformed(format!("{} is not an IRI", other))),
        }
    }

    fn decode(&self, payload: &str, _datatype: Option<&str>) -> CodecResult<TypedValue> {
        Ok(TypedValue::uri(payload))
    }
}

pub struct BlankNodeResolver;

impl TypeResolver for BlankNodeResolver {
    fn marker(&self) -> u8 {
        BLANK_NODE_MARKER
    }

    fn datatype(&self) -> &str {
        BLANK_NODE_PREFIX
    }

    fn encode(&self, value: &TypedValue) -> CodecResult<String> {
        match value {
            TypedValue::BlankNode(id) => Ok(format!("{}{}", BLANK_NODE_PREFIX, id)),
            other => Err(CodecError::Malformed(format!("{} is not a blank node", other))),
        }
    }

    fn decode(&self, payload: &str, _datatype: Option<&str>) -> CodecResult<TypedValue> {
        payload
            .strip_prefix(BLANK_NODE_PREFIX)
            .map(TypedValue::blank)
            .ok_or_else(|| CodecError::Malformed(format!("blank node payload '{}'", payload)))
    }
}

pub struct StringResolver;

impl TypeResolver for StringResolver {
    fn marker(&self) -> u8 {
        STRING_MARKER
    }

    fn datatype(&self) -> &str {
        xsd::STRING
    }

    fn encode(&self, value: &TypedValue) -> CodecResult<String> {
        literal_label(value, xsd::STRING).map(str::to_string)
    }

    fn decode(&self, payload: &str, _datatype: Option<&str>) -> CodecResult<TypedValue> {
        Ok(TypedValue::string(payload))
    }
}

/// Signed integers, stored as the sign-flipped two's complement value in
/// 20 zero-padded decimal digits so that byte order equals numeric order.
pub struct IntegerResolver {
    datatype: &'static str,
    marker: u8,
    min: i64,
    max: i64,
}

impl IntegerResolver {
    pub fn integer() -> Self {
        Self { datatype: xsd::INTEGER, marker: INTEGER_MARKER, min: i64::MIN, max: i64::MAX }
    }

    pub fn long() -> Self {
        Self { datatype: xsd::LONG, marker: LONG_MARKER, min: i64::MIN, max: i64::MAX }
    }

    pub fn int() -> Self {
        Self {
            datatype: xsd::INT,
            marker: INT_MARKER,
            min: i32::MIN as i64,
            max: i32::MAX as i64,
        }
    }
}

impl TypeResolver for IntegerResolver {
    fn marker(&self) -> u8 {
        self.marker
    }

    fn datatype(&self) -> &str {
        self.datatype
    }

    fn encode(&self, value: &TypedValue) -> CodecResult<String> {
        let label = literal_label(value, self.datatype)?;
        let n: i64 = label.parse().map_err(|_| invalid(label, self.datatype))?;
        if n < self.min || n > self.max {
            return Err(invalid(label, self.datatype));
        }
        canonical(label, &n.to_string(), self.datatype)?;
        Ok(format!("{:020}", (n as u64) ^ SIGN_FLIP))
    }

    fn decode(&self, payload: &str, _datatype: Option<&str>) -> CodecResult<TypedValue> {
        let key: u64 = payload
            .parse()
            .map_err(|_| CodecError::Malformed(format!("integer payload '{}'", payload)))?;
        let n = (key ^ SIGN_FLIP) as i64;
        Ok(TypedValue::literal(n.to_string(), self.datatype))
    }
}

/// Finite doubles as 16 hex digits of their total-order bit pattern.
pub struct DoubleResolver;

impl TypeResolver for DoubleResolver {
    fn marker(&self) -> u8 {
        DOUBLE_MARKER
    }

    fn datatype(&self) -> &str {
        xsd::DOUBLE
    }

    fn encode(&self, value: &TypedValue) -> CodecResult<String> {
        let label = literal_label(value, xsd::DOUBLE)?;
        let v: f64 = label.parse().map_err(|_| invalid(label, xsd::DOUBLE))?;
        if !v.is_finite() {
            return Err(invalid(label, xsd::DOUBLE));
        }
        canonical(label, TypedValue::double(v).lexical(), xsd::DOUBLE)?;
        let bits = v.to_bits();
        let key = if bits & SIGN_FLIP != 0 { !bits } else { bits ^ SIGN_FLIP };
        Ok(format!("{:016x}", key))
    }

    fn decode(&self, payload: &str, _datatype: Option<&str>) -> CodecResult<TypedValue> {
        let key = u64::from_str_radix(payload, 16)
            .map_err(|_| CodecError::Malformed(format!("double payload '{}'", payload)))?;
        let bits = if key & SIGN_FLIP != 0 { key ^ SIGN_FLIP } else { !key };
        Ok(TypedValue::double(f64::from_bits(bits)))
    }
}

pub struct BooleanResolver;

impl TypeResolver for BooleanResolver {
    fn marker(&self) -> u8 {
        BOOLEAN_MARKER
    }

    fn datatype(&self) -> &str {
        xsd::BOOLEAN
    }

    fn encode(&self, value: &TypedValue) -> CodecResult<String> {
        match literal_label(value, xsd::BOOLEAN)? {
            "true" => Ok("true".to_string()),
            "false" => Ok("false".to_string()),
            other => Err(invalid(other, xsd::BOOLEAN)),
        }
    }

    fn decode(&self, payload: &str, _datatype: Option<&str>) -> CodecResult<TypedValue> {
        match payload {
            "true" => Ok(TypedValue::boolean(true)),
            "false" => Ok(TypedValue::boolean(false)),
            other => Err(CodecError::Malformed(format!("boolean payload '{}'", other))),
        }
    }
}

/// RFC 3339 timestamps in UTC with millisecond precision,
/// e.g. `2024-03-01T08:00:00.000Z`.
pub struct DateTimeResolver;

impl TypeResolver for DateTimeResolver {
    fn marker(&self) -> u8 {
        DATE_TIME_MARKER
    }

    fn datatype(&self) -> &str {
        xsd::DATE_TIME
    }

    fn encode(&self, value: &TypedValue) -> CodecResult<String> {
        let label = literal_label(value, xsd::DATE_TIME)?;
        let parsed = DateTime::parse_from_rfc3339(label)
            .map_err(|_| invalid(label, xsd::DATE_TIME))?
            .with_timezone(&Utc);
        // Four-digit years keep lexical order equal to temporal order.
        if !(0..=9999).contains(&parsed.year()) {
            return Err(invalid(label, xsd::DATE_TIME));
        }
        let payload = parsed.format(DATE_TIME_FORMAT).to_string();
        canonical(label, &payload, xsd::DATE_TIME)?;
        Ok(payload)
    }

    fn decode(&self, payload: &str, _datatype: Option<&str>) -> CodecResult<TypedValue> {
        Ok(TypedValue::literal(payload, xsd::DATE_TIME))
    }
}

/// Fallback for literals of unregistered datatypes: the label verbatim,
/// with the datatype IRI kept after the marker.
pub struct CustomDatatypeResolver;

impl TypeResolver for CustomDatatypeResolver {
    fn marker(&self) -> u8 {
        CUSTOM_MARKER
    }

    fn datatype(&self) -> &str {
        ""
    }

    fn encode(&self, value: &TypedValue) -> CodecResult<String> {
        match value {
            TypedValue::Literal { label, .. } => Ok(label.clone()),
            other => Err(CodecError::Malformed(format!("{} is not a literal", other))),
        }
    }

    fn decode(&self, payload: &str, datatype: Option<&str>) -> CodecResult<TypedValue> {
        match datatype {
            Some(dt) if !dt.is_empty() => Ok(TypedValue::literal(payload, dt)),
            _ => Err(CodecError::Malformed(format!(
                "custom literal '{}' without a datatype",
                payload
            ))),
        }
    }
}
