/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use shared::terms::Component;
use shared::triple::{Position, TriplePattern};
use crate::codec::{CodecRegistry, DELIM_BYTE, LAST_BYTE, TYPE_DELIM_BYTE};
use crate::error::CodecResult;
use super::{key_part, ByteRange, KeyLayout};

/// A scan prepared for one layout table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRange {
    pub layout: KeyLayout,
    pub range: ByteRange,
    /// Serialized context the scanned rows must carry, when the pattern binds one.
    pub context: Option<Vec<u8>>,
}

/// One entry of the static dispatch table.
pub struct LayoutRangeStrategy {
    pub layout: KeyLayout,
    pub handles: fn(&TriplePattern) -> bool,
    pub define_range: fn(&CodecRegistry, &TriplePattern) -> CodecResult<Option<LayoutRange>>,
}

pub static STRATEGIES: [LayoutRangeStrategy; 3] = [
    LayoutRangeStrategy {
        layout: KeyLayout::Spo,
        handles: spo_handles,
        define_range: spo_define_range,
    },
    LayoutRangeStrategy {
        layout: KeyLayout::Pos,
        handles: pos_handles,
        define_range: pos_define_range,
    },
    LayoutRangeStrategy {
        layout: KeyLayout::Osp,
        handles: osp_handles,
        define_range: osp_define_range,
    },
];

impl LayoutRangeStrategy {
    pub fn for_layout(layout: KeyLayout) -> &'static LayoutRangeStrategy {
        match layout {
            KeyLayout::Spo => &STRATEGIES[0],
            KeyLayout::Pos => &STRATEGIES[1],
            KeyLayout::Osp => &STRATEGIES[2],
        }
    }
}

fn spo_handles(pattern: &TriplePattern) -> bool {
    handles_in_order(KeyLayout::Spo, pattern)
}

fn pos_handles(pattern: &TriplePattern) -> bool {
    handles_in_order(KeyLayout::Pos, pattern)
}

fn osp_handles(pattern: &TriplePattern) -> bool {
    handles_in_order(KeyLayout::Osp, pattern)
}

fn spo_define_range(codec: &CodecRegistry, pattern: &TriplePattern) -> CodecResult<Option<LayoutRange>> {
    define_range_in_order(KeyLayout::Spo, codec, pattern)
}

fn pos_define_range(codec: &CodecRegistry, pattern: &TriplePattern) -> CodecResult<Option<LayoutRange>> {
    define_range_in_order(KeyLayout::Pos, codec, pattern)
}

fn osp_define_range(codec: &CodecRegistry, pattern: &TriplePattern) -> CodecResult<Option<LayoutRange>> {
    define_range_in_order(KeyLayout::Osp, codec, pattern)
}

/// A layout can serve a pattern when the set positions form a prefix of its
/// key order that starts at the first position, and only the last set
/// position is a range. A ranged context can never be served.
fn handles_in_order(layout: KeyLayout, pattern: &TriplePattern) -> bool {
    if matches!(pattern.context, Some(Component::Range { .. })) {
        return false;
    }
    let components = layout.key_order().map(|p| pattern.get(p));
    let set = components.iter().take_while(|c| c.is_set()).count();
    if set == 0 || components[set..].iter().any(|c| c.is_set()) {
        return false;
    }
    components[..set - 1].iter().all(|c| !c.is_range())
}

fn define_range_in_order(
    layout: KeyLayout,
    codec: &CodecRegistry,
    pattern: &TriplePattern,
) -> CodecResult<Option<LayoutRange>> {
    if !handles_in_order(layout, pattern) {
        return Ok(None);
    }

    let order = layout.key_order();
    let set: Vec<(Position, &Component)> = order
        .iter()
        .map(|p| (*p, pattern.get(*p)))
        .take_while(|(_, c)| c.is_set())
        .collect();

    let mut prefix = Vec::new();
    let mut ranged = None;
    for (i, (position, component)) in set.iter().enumerate() {
        match component {
            Component::Bound(value) => {
                if i > 0 {
                    prefix.push(DELIM_BYTE);
                }
                prefix.extend(key_part(codec, value, *position)?);
            }
            Component::Range { start, stop } => {
                for bound in [start, stop] {
                    key_part(codec, bound, *position)?;
                }
                if i > 0 {
                    prefix.push(DELIM_BYTE);
                }
                ranged = Some(codec.transform_range(start, stop)?);
            }
            Component::Unbound => break,
        }
    }

    let range = match ranged {
        Some((lo, hi)) => {
            let mut start = prefix.clone();
            start.extend(lo);
            let mut stop = prefix;
            stop.extend(hi);
            stop.push(DELIM_BYTE);
            stop.push(LAST_BYTE);
            ByteRange::new(start, stop)
        }
        None if set.len() == order.len() => {
            prefix.push(TYPE_DELIM_BYTE);
            ByteRange::prefix(prefix)
        }
        None => {
            prefix.push(DELIM_BYTE);
            ByteRange::prefix(prefix)
        }
    };

    let context = match &pattern.context {
        Some(Component::Bound(value)) => Some(codec.serialize_bytes(value)?),
        _ => None,
    };

    Ok(Some(LayoutRange {
        layout,
        range,
        context,
    }))
}
