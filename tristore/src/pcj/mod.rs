/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Precomputed joins (PCJs): descriptors, their supported binding orders,
//! the registry the optimizer reads from and the tables they live in.

pub mod binding_order;
pub mod descriptor;
pub mod registry;
pub mod storage;

pub use binding_order::{BindingOrderIndex, VarOrderPolicy};
pub use descriptor::{PcjDescriptor, PcjLocation};
pub use registry::{DescriptorSnapshot, PcjRegistry};
pub use storage::{PcjMetadata, PcjStorage};
