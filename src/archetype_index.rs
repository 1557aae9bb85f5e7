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

//! The archetype graph: signature-keyed lookup plus a per-component
//! reverse listing, so the query engine can ask "which archetypes touch
//! component `c`" without scanning every table.
//!
//! Archetype ids are stable for the lifetime of the world: removing an
//! empty table tombstones its slot rather than shifting later ids, so a
//! query's cached id list never goes stale out from under it.

use ahash::AHashMap;

use crate::archetype::{Archetype, Signature};
use crate::identity::Id;

/// Stable handle into [`ArchetypeIndex`]. Never reused while a query
/// might still reference it; freed slots are only recycled after the
/// index removes every trace of the old id (see [`ArchetypeIndex::remove_empty`]).
pub type ArchetypeId = usize;

/// Signature → table map, plus the reverse per-component listing the
/// query engine and cascade logic both rely on.
pub struct ArchetypeIndex {
    tables: Vec<Option<Archetype>>,
    by_signature: AHashMap<Signature, ArchetypeId>,
    by_component: AHashMap<Id, Vec<ArchetypeId>>,
    free_slots: Vec<ArchetypeId>,
    empty_archetype: ArchetypeId,
}

impl ArchetypeIndex {
    pub fn new() -> Self {
        let mut index = Self {
            tables: Vec::new(),
            by_signature: AHashMap::new(),
            by_component: AHashMap::new(),
            free_slots: Vec::new(),
            empty_archetype: 0,
        };
        let empty_sig = crate::archetype::canonicalize(&[]);
        index.empty_archetype = index.insert(Archetype::new(empty_sig));
        index
    }


    /// The always-present archetype with an empty signature; freshly
    /// spawned entities start here.
    pub fn empty_archetype(&self) -> ArchetypeId {
        self.empty_archetype
    }

    pub fn get(&self, id: ArchetypeId) -> &Archetype {
        self.tables[id]
            .as_ref()
            .expect("archetype id referenced after removal")
    }

    pub fn get_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        self.tables[id]
            .as_mut()
            .expect("archetype id referenced after removal")
    }

    /// Exact archetype lookup by canonical signature. Pure; does not
    /// construct anything.
    pub fn get_matching(&self, signature: &Signature) -> Option<ArchetypeId> {
        self.by_signature.get(signature).copied()
    }

    /// Hash lookup; on miss, construct the table, register it in both
    /// indices, and report to the caller that a new archetype was born
    /// (so [`crate::world::World`] can notify live queries).
    pub fn get_or_create(&mut self, signature: Signature) -> (ArchetypeId, bool) {
        if let Some(&id) = self.by_signature.get(&signature) {
            return (id, false);
        }
        let id = self.insert(Archetype::new(signature));
        (id, true)
    }

    fn insert(&mut self, archetype: Archetype) -> ArchetypeId {
        let id = self.free_slots.pop().unwrap_or(self.tables.len());
        for &component in archetype.signature() {
            self.by_component.entry(component).or_default().push(id);
        }
        self.by_signature.insert(archetype.signature().clone(), id);
        if id == self.tables.len() {
            self.tables.push(Some(archetype));
        } else {
            self.tables[id] = Some(archetype);
        }
        id
    }

    /// Remove a table whose entity set has become empty. Never removes
    /// the bootstrap empty archetype. Returns `true` if a table was
    /// actually torn down (so the caller knows whether to notify queries).
    pub fn remove_empty(&mut self, id: ArchetypeId) -> bool {
        if id == self.empty_archetype {
            return false;
        }
        let Some(archetype) = self.tables[id].take() else {
            return false;
        };
        debug_assert!(archetype.is_empty(), "remove_empty called on a live table");
        self.by_signature.remove(archetype.signature());
        for &component in archetype.signature() {
            if let Some(list) = self.by_component.get_mut(&component) {
                list.retain(|&candidate| candidate != id);
            }
        }
        self.free_slots.push(id);
        true
    }

    /// Every archetype id whose signature contains `component` (including
    /// wildcard relation columns keyed by their own id).
    pub fn archetypes_with(&self, component: Id) -> &[ArchetypeId] {
        self.by_component
            .get(&component)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = ArchetypeId> + '_ {
        self.tables
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|_| id))
    }

    pub fn len(&self) -> usize {
        self.tables.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_empty_archetype_exists() {
        let index = ArchetypeIndex::new();
        assert_eq!(index.len(), 1);
        assert!(index.get(index.empty_archetype()).is_empty());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut index = ArchetypeIndex::new();
        let sig = crate::archetype::canonicalize(&[1, 2]);
        let (a, created_a) = index.get_or_create(sig.clone());
        let (b, created_b) = index.get_or_create(sig);
        assert_eq!(a, b);
        assert!(created_a);
        assert!(!created_b);
    }

    #[test]
    fn remove_empty_frees_slot_for_reuse() {
        let mut index = ArchetypeIndex::new();
        let sig_a = crate::archetype::canonicalize(&[1]);
        let (a, _) = index.get_or_create(sig_a.clone());
        assert!(index.remove_empty(a));
        assert!(index.get_matching(&sig_a).is_none());

        let sig_b = crate::archetype::canonicalize(&[2]);
        let (b, _) = index.get_or_create(sig_b);
        assert_eq!(a, b, "freed slot should be recycled");
    }

    #[test]
    fn bootstrap_archetype_is_never_removed() {
        let mut index = ArchetypeIndex::new();
        assert!(!index.remove_empty(index.empty_archetype()));
    }

    #[test]
    fn reverse_listing_tracks_component_membership() {
        let mut index = ArchetypeIndex::new();
        let (a, _) = index.get_or_create(crate::archetype::canonicalize(&[1, 2]));
        let (b, _) = index.get_or_create(crate::archetype::canonicalize(&[2, 3]));
        let mut with_2 = index.archetypes_with(2).to_vec();
        with_2.sort();
        assert_eq!(with_2, vec![a, b]);
        assert_eq!(index.archetypes_with(1), &[a]);
    }
}
