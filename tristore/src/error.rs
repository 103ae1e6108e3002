/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Error types for the query layer.
//!
//! Codec and layout failures meet at the scan-preparation boundary as a
//! single [`RangeError`], which converts into an `InvalidInput` I/O error.
//! Optimizer and validator outcomes are plain values: [`ValidationFailure`]
//! is returned, never raised.

use shared::triple::Position;
use std::io;
use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;
pub type RangeResult<T> = Result<T, RangeError>;
pub type StorageResult<T> = Result<T, StorageError>;

/// Malformed or unregistered value encodings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("no serializer registered for datatype <{0}>")]
    UnregisteredType(String),

    #[error("no serializer registered for marker byte {0:#04x}")]
    UnknownMarker(u8),

    #[error("malformed value bytes: {0}")]
    Malformed(String),

    #[error("{value} contains a reserved delimiter byte")]
    ReservedByte { value: String },

    #[error("invalid lexical form '{label}' for <{datatype}>")]
    InvalidLexical { label: String, datatype: String },

    #[error("{value} cannot be stored in the {position:?} position")]
    UnsupportedPosition { value: String, position: Position },

    #[error("range bounds {start} and {stop} have different kinds")]
    MismatchedRange { start: String, stop: String },

    #[error("range start {start} sorts after its stop {stop}")]
    InvertedRange { start: String, stop: String },
}

/// No registered layout can express the pattern as one contiguous scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no key layout can scan pattern {pattern}")]
pub struct NoApplicableLayoutError {
    pub pattern: String,
}

/// Failure while preparing a scan range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    NoApplicableLayout(#[from] NoApplicableLayoutError),
}

impl From<RangeError> for io::Error {
    fn from(err: RangeError) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

/// Rejected PCJ descriptor definitions and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("variable order is empty")]
    EmptyVariableOrder,

    #[error("variable ?{0} appears more than once in the variable order")]
    DuplicateVariable(String),

    #[error("variable order {declared:?} does not cover the pattern variables {pattern:?}")]
    VariableOrderMismatch {
        declared: Vec<String>,
        pattern: Vec<String>,
    },

    #[error("defining pattern contains no statement pattern")]
    NoPatterns,

    #[error("defining pattern may not contain a {0} node")]
    UnsupportedNode(&'static str),

    #[error("a descriptor with id '{0}' is already registered")]
    DuplicateId(String),
}

/// Failures of the in-memory store and of PCJ table maintenance.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("metadata encoding failed: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    #[error("table '{0}' has no PCJ metadata row")]
    MissingMetadata(String),

    #[error("no registered PCJ with id '{0}'")]
    UnknownPcj(String),

    #[error("PCJ '{pcj_id}' cannot be scanned with bound variables {bound:?}")]
    UnsupportedBindings { pcj_id: String, bound: Vec<String> },
}

/// Configuration that could not be read or does not make sense.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] io::Error),

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Why a rewritten plan was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("{node} reads ?{variable} before it is bound")]
    UnboundVariable { node: String, variable: String },

    #[error("PCJ '{pcj_id}' cannot be driven by bound variables {bound:?}")]
    UnsupportedBindings { pcj_id: String, bound: Vec<String> },

    #[error("plan references unknown PCJ '{0}'")]
    UnknownPcj(String),

    #[error("PCJ scan '{0}' does not carry the descriptor's variable order")]
    MalformedScan(String),

    #[error("join without shared variables between {left:?} and {right:?}")]
    CrossProduct { left: Vec<String>, right: Vec<String> },
}
