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

//! Cached queries: a live, world-maintained list of archetypes matching a
//! `(required components, excluded components)` signature.
//!
//! A [`Query`] is a thin, `Clone`-free handle into a shared cache stored
//! on the [`crate::world::World`]; it never scans archetypes itself.
//! `World` pushes updates into the cache as archetypes are born or
//! emptied, so repeated iteration never re-walks the whole archetype
//! list.

use std::cell::RefCell;
use std::rc::Rc;

use crate::archetype::Archetype;
use crate::archetype_index::ArchetypeId;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::identity::Id;
use crate::value::Value;
use crate::world::World;

/// Canonical cache key: sorted, deduplicated required and excluded ids.
pub type QueryKey = (Vec<Id>, Vec<Id>);

pub(crate) fn canonical_key(required: &[Id], without: &[Id]) -> QueryKey {
    let mut required = required.to_vec();
    required.sort_unstable();
    required.dedup();
    let mut without = without.to_vec();
    without.sort_unstable();
    without.dedup();
    (required, without)
}

/// An archetype matches a query iff every required id is present
/// (wildcard requirements resolved by [`Archetype::has_component`]) and
/// none of the excluded ids are. Every entity in a matching archetype
/// satisfies this by the archetype invariant that every signature column
/// holds a value for every row, so no further per-entity wildcard check
/// is needed once the archetype itself matches.
pub(crate) fn query_matches(archetype: &Archetype, required: &[Id], without: &[Id]) -> bool {
    required.iter().all(|&c| archetype.has_component(c))
        && without.iter().all(|&c| !archetype.has_component(c))
}

/// Shared, world-maintained state backing every [`Query`] handle with the
/// same canonical key.
pub(crate) struct QueryCache {
    pub required: Vec<Id>,
    pub without: Vec<Id>,
    pub archetypes: Vec<ArchetypeId>,
    pub disposed: bool,
    pub refcount: usize,
}

/// A live, cached view over archetypes matching `(components, filter)`.
///
/// Disposing releases this handle's share of the cache; once the last
/// handle is disposed the cache is dropped from the world's registry.
pub struct Query {
    pub(crate) key: QueryKey,
    pub(crate) cache: Rc<RefCell<QueryCache>>,
}

/// Filter accompanying a query's required component list.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub without: Vec<Id>,
}

impl QueryFilter {
    pub fn without(ids: impl Into<Vec<Id>>) -> Self {
        Self { without: ids.into() }
    }
}

impl Query {
    /// Every entity across every cached archetype.
    pub fn entities(&self, world: &World) -> Result<Vec<EntityId>> {
        let cache = self.cache.borrow();
        if cache.disposed {
            return Err(EcsError::QueryDisposed);
        }
        let mut out = Vec::new();
        for &id in &cache.archetypes {
            out.extend_from_slice(world.archetype_ref(id).entities());
        }
        Ok(out)
    }

    /// Zip the requested (concrete, non-wildcard) columns from each
    /// cached archetype and invoke `f` once per matching entity.
    pub fn for_each(
        &self,
        world: &World,
        components: &[Id],
        mut f: impl FnMut(EntityId, &[&Value]),
    ) -> Result<()> {
        let cache = self.cache.borrow();
        if cache.disposed {
            return Err(EcsError::QueryDisposed);
        }
        let mut row_values: Vec<&Value> = Vec::with_capacity(components.len());
        for &id in &cache.archetypes {
            let archetype = world.archetype_ref(id);
            for row in 0..archetype.len() {
                row_values.clear();
                for &component in components {
                    row_values.push(archetype.get(row, component)?);
                }
                f(archetype.entities()[row], &row_values);
            }
        }
        Ok(())
    }

    /// Eagerly materialize `(entity, cloned values)` for every matching
    /// row. Restartable (each call recomputes from the live cache) at the
    /// cost of cloning every requested value up front, trading the
    /// source's lazy-iterator shape for a borrow-checker-friendly handle
    /// that doesn't tie a `Query` to a `&World` across calls.
    pub fn iterate(&self, world: &World, components: &[Id]) -> Result<Vec<(EntityId, Vec<Value>)>> {
        let mut out = Vec::new();
        self.for_each(world, components, |entity, values| {
            out.push((entity, values.iter().map(|v| v.clone_value()).collect()));
        })?;
        Ok(out)
    }

    /// Sum of matching archetype sizes.
    pub fn count(&self, world: &World) -> Result<usize> {
        let cache = self.cache.borrow();
        if cache.disposed {
            return Err(EcsError::QueryDisposed);
        }
        Ok(cache.archetypes.iter().map(|&id| world.archetype_ref(id).len()).sum())
    }

    /// Release this handle's share of the cache. When the last handle
    /// sharing this canonical key is disposed, the cache is dropped from
    /// the world's query registry and future archetype notifications
    /// skip it.
    pub fn dispose(self, world: &mut World) {
        world.dispose_query(self.key.clone(), &self.cache);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_sorts_and_dedups() {
        let key = canonical_key(&[3, 1, 1], &[5, 2]);
        assert_eq!(key, (vec![1, 3], vec![2, 5]));
    }
}
