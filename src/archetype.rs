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

//! Archetype storage: a Structure-of-Arrays table for one exact component
//! signature.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::identity::{self, Id, RelationTarget};
use crate::value::Value;

/// Canonical sorted, deduplicated component signature.
pub type Signature = SmallVec<[Id; 8]>;

/// Build a canonical signature from an arbitrary id slice.
pub fn canonicalize(ids: &[Id]) -> Signature {
    let mut sig: Signature = SmallVec::from_slice(ids);
    sig.sort_unstable();
    sig.dedup();
    sig
}

/// Dense column of component values, one per row.
#[derive(Default)]
pub struct Column {
    values: Vec<Value>,
}

impl Column {
    fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    fn swap_remove(&mut self, row: usize) {
        self.values.swap_remove(row);
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row)
    }

    pub fn get_mut(&mut self, row: usize) -> Option<&mut Value> {
        self.values.get_mut(row)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

/// One archetype table: the set of entities sharing an exact component
/// signature, plus their columnar component storage.
pub struct Archetype {
    signature: Signature,
    entities: Vec<EntityId>,
    columns: AHashMap<Id, Column>,
    /// base component -> targets of every concrete relation `(base, t)`
    /// present in this signature. Populated once at construction since
    /// the signature never changes for a live archetype.
    wildcard_targets: AHashMap<Id, Vec<Id>>,
}

impl Archetype {
    pub fn new(signature: Signature) -> Self {
        let mut columns = AHashMap::with_capacity(signature.len());
        let mut wildcard_targets: AHashMap<Id, Vec<Id>> = AHashMap::new();
        for &id in &signature {
            columns.insert(id, Column::default());
            if identity::is_concrete_relation(id) {
                if let Some(decoded) = identity::decode_relation(id) {
                    let target_id = match decoded.target {
                        RelationTarget::Entity(e) => e,
                        RelationTarget::Component(c) => c,
                        RelationTarget::Wildcard => continue,
                    };
                    wildcard_targets
                        .entry(decoded.component)
                        .or_default()
                        .push(target_id);
                }
            }
        }
        Self {
            signature,
            entities: Vec::new(),
            columns,
            wildcard_targets,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn has_component(&self, component_id: Id) -> bool {
        if identity::is_wildcard(component_id) {
            let base = identity::decode_relation(component_id)
                .map(|d| d.component)
                .unwrap_or(component_id);
            return self.wildcard_targets.contains_key(&base);
        }
        self.columns.contains_key(&component_id)
    }

    /// Targets of every concrete `(base, t)` relation present in this
    /// signature, for wildcard reads/iteration.
    pub fn wildcard_targets(&self, base_component: Id) -> &[Id] {
        self.wildcard_targets
            .get(&base_component)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Append a new row. `component_map` must contain exactly this
    /// archetype's signature; a missing key is an `InvalidComponentType`
    /// error rather than a partially-populated row.
    pub fn add_entity(&mut self, entity: EntityId, mut component_map: AHashMap<Id, Value>) -> Result<usize> {
        let row = self.entities.len();
        self.entities.push(entity);
        for &id in &self.signature {
            let value = component_map
                .remove(&id)
                .ok_or(EcsError::InvalidComponentType)?;
            self.columns
                .get_mut(&id)
                .expect("every signature id has a column from construction")
                .push(value);
        }
        Ok(row)
    }

    /// Swap-remove `row`. Returns the entity that was swapped into the
    /// vacated slot, if any — the caller must update that entity's
    /// recorded row.
    pub fn remove_entity(&mut self, row: usize) -> Option<EntityId> {
        if row >= self.entities.len() {
            return None;
        }
        self.entities.swap_remove(row);
        for column in self.columns.values_mut() {
            column.swap_remove(row);
        }
        self.entities.get(row).copied()
    }

    pub fn set(&mut self, row: usize, component_id: Id, value: Value) -> Result<()> {
        let column = self
            .columns
            .get_mut(&component_id)
            .ok_or(EcsError::InvalidComponentType)?;
        let slot = column.get_mut(row).ok_or(EcsError::EntityNotFound)?;
        *slot = value;
        Ok(())
    }

    pub fn get(&self, row: usize, component_id: Id) -> Result<&Value> {
        let column = self
            .columns
            .get(&component_id)
            .ok_or(EcsError::MissingComponent)?;
        column.get(row).ok_or(EcsError::EntityNotFound)
    }

    pub fn get_mut(&mut self, row: usize, component_id: Id) -> Result<&mut Value> {
        let column = self
            .columns
            .get_mut(&component_id)
            .ok_or(EcsError::MissingComponent)?;
        column.get_mut(row).ok_or(EcsError::EntityNotFound)
    }

    /// Wildcard read: every `(target, value)` pair for relations with
    /// this base present in the signature, at `row`.
    pub fn get_wildcard(&self, row: usize, base_component: Id) -> Vec<(Id, Value)> {
        let mut out = Vec::new();
        for &id in &self.signature {
            if !identity::is_concrete_relation(id) {
                continue;
            }
            let Some(decoded) = identity::decode_relation(id) else {
                continue;
            };
            if decoded.component != base_component {
                continue;
            }
            let target = match decoded.target {
                RelationTarget::Entity(e) => e,
                RelationTarget::Component(c) => c,
                RelationTarget::Wildcard => continue,
            };
            if let Some(value) = self.columns.get(&id).and_then(|c| c.get(row)) {
                out.push((target, value.clone_value()));
            }
        }
        out
    }

    pub fn column(&self, component_id: Id) -> Option<&Column> {
        self.columns.get(&component_id)
    }

    /// Snapshot every component value for `row`, keyed by component id.
    /// Used when moving an entity to a different archetype.
    pub fn snapshot_row(&self, row: usize) -> AHashMap<Id, Value> {
        let mut out = AHashMap::with_capacity(self.signature.len());
        for &id in &self.signature {
            if let Some(value) = self.columns.get(&id).and_then(|c| c.get(row)) {
                out.insert(id, value.clone_value());
            }
        }
        out
    }
}
