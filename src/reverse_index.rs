// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tracks, for every entity used as a relation target, which other
//! entities point at it and through which component. Consulted by the
//! mutation engine's destroy path to synthesize the cascade described in
//! the data model's reverse-index invariant.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use crate::entity::EntityId;
use crate::identity::Id;

/// `references[target]` is the set of `(source_entity, relation_id)`
/// pairs pointing at `target`. A `BTreeSet` keeps cascade processing
/// order deterministic, which matters for test reproducibility even
/// though cross-entity drain order is otherwise unspecified.
#[derive(Default)]
pub struct ReverseIndex {
    references: FxHashMap<EntityId, BTreeSet<(EntityId, Id)>>,
}

impl ReverseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` holds relation `component` (whose target is
    /// `target`).
    pub fn record(&mut self, target: EntityId, source: EntityId, component: Id) {
        self.references.entry(target).or_default().insert((source, component));
    }

    /// Undo a previous [`Self::record`].
    pub fn forget(&mut self, target: EntityId, source: EntityId, component: Id) {
        if let Some(set) = self.references.get_mut(&target) {
            set.remove(&(source, component));
            if set.is_empty() {
                self.references.remove(&target);
            }
        }
    }

    /// Every `(source, component)` pair currently pointing at `target`,
    /// in deterministic order. Used by the destroy path to synthesize
    /// `delete(source, component)` for each before `target` is freed.
    pub fn references_to(&self, target: EntityId) -> Vec<(EntityId, Id)> {
        self.references
            .get(&target)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drop every entry for `target` outright (called once its cascade
    /// has been fully processed and it is being freed).
    pub fn clear(&mut self, target: EntityId) {
        self.references.remove(&target);
    }
}
