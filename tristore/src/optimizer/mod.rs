/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod matcher;
pub mod pcj_optimizer;
pub mod validator;

pub use matcher::{find_embeddings, Embedding};
pub use pcj_optimizer::PcjOptimizer;
pub use validator::PlanValidator;
