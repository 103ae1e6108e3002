/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */
use serde::{Deserialize, Serialize};
use crate::terms::{Component, TypedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Subject,
    Predicate,
    Object,
}

#[derive(PartialEq, Debug, Clone, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: TypedValue,
    pub predicate: TypedValue,
    pub object: TypedValue,
    pub context: Option<TypedValue>,
}

impl Triple {
    pub fn new(subject: TypedValue, predicate: TypedValue, object: TypedValue) -> Self {
        Self {
            subject,
            predicate,
            object,
            context: None,
        }
    }

    pub fn with_context(mut self, context: TypedValue) -> Self {
        self.context = Some(context);
        self
    }

    pub fn get(&self, position: Position) -> &TypedValue {
        match position {
            Position::Subject => &self.subject,
            Position::Predicate => &self.predicate,
            Position::Object => &self.object,
        }
    }
}

/// Triple or quad access pattern: every position is bound, ranged or free.
#[derive(PartialEq, Debug, Clone, Eq, Default, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Component,
    pub predicate: Component,
    pub object: Component,
    pub context: Option<Component>,
}

impl TriplePattern {
    pub fn new(subject: Component, predicate: Component, object: Component) -> Self {
        Self {
            subject,
            predicate,
            object,
            context: None,
        }
    }

    pub fn with_context(mut self, context: Component) -> Self {
        self.context = Some(context);
        self
    }

    pub fn get(&self, position: Position) -> &Component {
        match position {
            Position::Subject => &self.subject,
            Position::Predicate => &self.predicate,
            Position::Object => &self.object,
        }
    }
}
