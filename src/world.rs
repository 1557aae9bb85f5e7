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

//! The world: owns every entity, archetype, query cache, and hook in a
//! single logical thread. `set`/`delete`/`destroy` validate their
//! preconditions and enqueue a deferred command; [`World::sync`] drains
//! the queue into coherent archetype transitions.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{self, Archetype, Signature};
use crate::archetype_index::{ArchetypeId, ArchetypeIndex};
use crate::command::{Command, CommandBuffer};
use crate::component::{ComponentDescriptor, ComponentRegistry, ComponentSpec};
use crate::entity::{EntityId, EntityLocation};
use crate::error::{EcsError, Result};
use crate::hooks::{Hook, HookCommands, HookId, HookRegistry};
use crate::identity::{self, EntityAllocator, Id, RelationTarget};
use crate::query::{self, Query, QueryCache, QueryFilter, QueryKey};
use crate::reverse_index::ReverseIndex;
use crate::value::{ComponentValue, Value};

/// Safety valve on the drain loop in [`World::sync`]: a hook that
/// unconditionally re-enqueues commands would otherwise spin forever.
/// Counts passes (batches), not individual commands.
const DRAIN_PASS_CEILING: usize = 10_000;

/// The central ECS store: entities, their archetype membership, the
/// archetype graph, pending commands, hooks, and cached queries.
pub struct World {
    entity_alloc: EntityAllocator,
    components: ComponentRegistry,
    archetypes: ArchetypeIndex,
    locations: AHashMap<EntityId, EntityLocation>,
    commands: CommandBuffer,
    hooks: HookRegistry,
    references: ReverseIndex,
    queries: AHashMap<QueryKey, Rc<RefCell<QueryCache>>>,
    draining: bool,
}

impl World {
    pub fn new() -> Self {
        Self {
            entity_alloc: EntityAllocator::new(),
            components: ComponentRegistry::new(),
            archetypes: ArchetypeIndex::new(),
            locations: AHashMap::new(),
            commands: CommandBuffer::new(),
            hooks: HookRegistry::new(),
            references: ReverseIndex::new(),
            queries: AHashMap::new(),
            draining: false,
        }
    }

    // ---------------------------------------------------------------
    // Identity / component registration
    // ---------------------------------------------------------------

    /// Register a new plain component and return its id.
    pub fn allocate_component(&mut self, spec: ComponentSpec) -> Result<Id> {
        self.components.allocate(spec)
    }

    pub fn component_descriptor(&self, component: Id) -> Option<&ComponentDescriptor> {
        self.components.descriptor(component)
    }

    /// Mark `component` exclusive: at most one relation with this base
    /// may be attached to any single entity at a time.
    pub fn set_exclusive(&mut self, component: Id) {
        self.components.set_exclusive(component, true);
    }

    /// Encode `(component, target)` into a relation id.
    pub fn relation(&self, component: Id, target: RelationTarget) -> Result<Id> {
        identity::encode_relation(component, target)
    }

    // ---------------------------------------------------------------
    // Entities
    // ---------------------------------------------------------------

    /// Allocate a new entity, immediately placed in the empty archetype.
    pub fn spawn(&mut self) -> EntityId {
        let entity = self.entity_alloc.allocate();
        let empty = self.archetypes.empty_archetype();
        let row = self
            .archetypes
            .get_mut(empty)
            .add_entity(entity, AHashMap::new())
            .expect("empty archetype accepts any entity with no components");
        self.locations.insert(entity, EntityLocation { archetype_id: empty, row });
        entity
    }

    pub fn exists(&self, entity: EntityId) -> bool {
        self.locations.contains_key(&entity)
    }

    // ---------------------------------------------------------------
    // Deferred mutation surface
    // ---------------------------------------------------------------

    /// Enqueue attaching (or overwriting) `component` on `entity`.
    pub fn set<T: ComponentValue>(&mut self, entity: EntityId, component: Id, value: T) -> Result<()> {
        self.enqueue_set(entity, component, Box::new(value))
    }

    /// Enqueue attaching a tag component (no payload beyond presence).
    pub fn tag(&mut self, entity: EntityId, component: Id) -> Result<()> {
        self.enqueue_set(entity, component, Box::new(()))
    }

    fn enqueue_set(&mut self, entity: EntityId, component: Id, value: Value) -> Result<()> {
        if !self.exists(entity) {
            return Err(EcsError::EntityNotFound);
        }
        if identity::classify(component) == identity::IdKind::Invalid || identity::is_wildcard(component) {
            return Err(EcsError::InvalidComponentType);
        }
        self.commands.push(entity, Command::Set(component, value));
        Ok(())
    }

    /// Enqueue dropping `component` from `entity`. A wildcard relation
    /// `(base, *)` drops every concrete relation sharing that base.
    pub fn delete(&mut self, entity: EntityId, component: Id) -> Result<()> {
        if !self.exists(entity) {
            return Err(EcsError::EntityNotFound);
        }
        if identity::classify(component) == identity::IdKind::Invalid {
            return Err(EcsError::InvalidComponentType);
        }
        self.commands.push(entity, Command::Delete(component));
        Ok(())
    }

    /// Enqueue destroying `entity` outright.
    pub fn destroy(&mut self, entity: EntityId) -> Result<()> {
        if !self.exists(entity) {
            return Err(EcsError::EntityNotFound);
        }
        self.commands.push(entity, Command::Destroy);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Synchronous reads
    // ---------------------------------------------------------------

    pub fn has(&self, entity: EntityId, component: Id) -> bool {
        self.locations
            .get(&entity)
            .map(|loc| self.archetypes.get(loc.archetype_id).has_component(component))
            .unwrap_or(false)
    }

    /// Type-erased read; prefer [`World::get`] for a typed result.
    pub fn get_raw(&self, entity: EntityId, component: Id) -> Result<&Value> {
        let loc = self.locations.get(&entity).ok_or(EcsError::EntityNotFound)?;
        self.archetypes.get(loc.archetype_id).get(loc.row, component)
    }

    /// Read `component` off `entity`, downcast to `T`. Fails
    /// `MissingComponent` both when the component is absent and when a
    /// present value downcasts to a different concrete type than `T` —
    /// the dynamic namespace has no compile-time guarantee the caller's
    /// `T` matches what was stored under this id.
    pub fn get<T: Clone + 'static>(&self, entity: EntityId, component: Id) -> Result<T> {
        let value = self.get_raw(entity, component)?;
        crate::value::downcast_ref::<T>(value)
            .cloned()
            .ok_or(EcsError::MissingComponent)
    }

    /// Like [`World::get`] but distinguishes "absent" (`Ok(None)`) from a
    /// type mismatch or genuine error.
    pub fn get_optional<T: Clone + 'static>(&self, entity: EntityId, component: Id) -> Result<Option<T>> {
        let loc = self.locations.get(&entity).ok_or(EcsError::EntityNotFound)?;
        let archetype = self.archetypes.get(loc.archetype_id);
        if !archetype.has_component(component) {
            return Ok(None);
        }
        let value = archetype.get(loc.row, component)?;
        Ok(crate::value::downcast_ref::<T>(value).cloned())
    }

    /// Wildcard read: every `(target, value)` pair for relations sharing
    /// `base_component` currently attached to `entity`.
    pub fn get_wildcard<T: Clone + 'static>(
        &self,
        entity: EntityId,
        base_component: Id,
    ) -> Result<Vec<(EntityId, T)>> {
        let loc = self.locations.get(&entity).ok_or(EcsError::EntityNotFound)?;
        let archetype = self.archetypes.get(loc.archetype_id);
        let raw = archetype.get_wildcard(loc.row, base_component);
        Ok(raw
            .into_iter()
            .filter_map(|(target, value)| crate::value::downcast_ref::<T>(&value).cloned().map(|v| (target, v)))
            .collect())
    }

    // ---------------------------------------------------------------
    // Hooks
    // ---------------------------------------------------------------

    /// Register a hook under a concrete component id or a wildcard
    /// relation `(base, *)`.
    pub fn hook(&mut self, key: Id, hook: Hook) -> HookId {
        self.hooks.register(key, hook)
    }

    pub fn unhook(&mut self, key: Id, id: HookId) -> bool {
        self.hooks.unregister(key, id)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Create (or share) a cached query over `required` components,
    /// filtered by `filter.without`.
    pub fn create_query(&mut self, required: &[Id], filter: QueryFilter) -> Query {
        let key = query::canonical_key(required, &filter.without);
        if let Some(cache) = self.queries.get(&key) {
            cache.borrow_mut().refcount += 1;
            return Query {
                key,
                cache: Rc::clone(cache),
            };
        }
        let archetypes: Vec<ArchetypeId> = self
            .archetypes
            .iter_ids()
            .filter(|&id| query::query_matches(self.archetypes.get(id), &key.0, &key.1))
            .collect();
        let cache = Rc::new(RefCell::new(QueryCache {
            required: key.0.clone(),
            without: key.1.clone(),
            archetypes,
            disposed: false,
            refcount: 1,
        }));
        self.queries.insert(key.clone(), Rc::clone(&cache));
        Query { key, cache }
    }

    pub(crate) fn archetype_ref(&self, id: ArchetypeId) -> &Archetype {
        self.archetypes.get(id)
    }

    pub(crate) fn dispose_query(&mut self, key: QueryKey, cache: &Rc<RefCell<QueryCache>>) {
        let should_remove = {
            let mut c = cache.borrow_mut();
            if c.disposed {
                false
            } else {
                c.refcount -= 1;
                if c.refcount == 0 {
                    c.disposed = true;
                    true
                } else {
                    false
                }
            }
        };
        if should_remove {
            self.queries.remove(&key);
        }
    }

    fn notify_new_archetype(&self, id: ArchetypeId) {
        let archetype = self.archetypes.get(id);
        for cache in self.queries.values() {
            let mut c = cache.borrow_mut();
            if !c.disposed
                && query::query_matches(archetype, &c.required, &c.without)
                && !c.archetypes.contains(&id)
            {
                c.archetypes.push(id);
            }
        }
    }

    fn notify_archetype_removed(&self, id: ArchetypeId) {
        for cache in self.queries.values() {
            cache.borrow_mut().archetypes.retain(|&a| a != id);
        }
    }

    // ---------------------------------------------------------------
    // Diagnostics used by serialization and tests
    // ---------------------------------------------------------------

    pub(crate) fn entity_alloc(&self) -> &EntityAllocator {
        &self.entity_alloc
    }

    pub(crate) fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub(crate) fn archetype_ids(&self) -> impl Iterator<Item = ArchetypeId> + '_ {
        self.archetypes.iter_ids()
    }

    pub(crate) fn empty_archetype_id(&self) -> ArchetypeId {
        self.archetypes.empty_archetype()
    }

    pub(crate) fn archetype_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        self.archetypes.get_mut(id)
    }

    pub(crate) fn insert_location(&mut self, entity: EntityId, loc: EntityLocation) {
        self.locations.insert(entity, loc);
    }

    pub(crate) fn set_entity_alloc(&mut self, alloc: EntityAllocator) {
        self.entity_alloc = alloc;
    }

    pub(crate) fn set_components(&mut self, components: ComponentRegistry) {
        self.components = components;
    }

    /// Enqueue a raw, type-erased `set`. Used by snapshot restoration,
    /// where the concrete Rust type isn't known at the call site.
    pub(crate) fn set_raw(&mut self, entity: EntityId, component: Id, value: Value) -> Result<()> {
        self.enqueue_set(entity, component, value)
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn entity_count(&self) -> usize {
        self.locations.len()
    }

    // ---------------------------------------------------------------
    // Drain / structural mutation engine
    // ---------------------------------------------------------------

    /// Drain every queued command into coherent archetype transitions,
    /// firing hooks along the way. Idempotent when the buffer is empty;
    /// a no-op if called re-entrantly from inside a hook's own command.
    pub fn sync(&mut self) -> Result<()> {
        if self.draining {
            return Ok(());
        }
        if self.commands.is_empty() {
            return Ok(());
        }

        #[cfg(feature = "profiling")]
        let _span = info_span!("world_sync").entered();

        self.draining = true;
        let result = self.drain_loop();
        self.draining = false;
        result
    }

    fn drain_loop(&mut self) -> Result<()> {
        let mut passes = 0usize;
        while !self.commands.is_empty() {
            passes += 1;
            if passes > DRAIN_PASS_CEILING {
                return Err(EcsError::CommandBufferOverflow);
            }
            let batch = self.commands.take_batch();
            for (entity, commands) in batch {
                self.apply_entity_commands(entity, commands)?;
            }
        }
        Ok(())
    }

    /// Fold one entity's queued commands into a changeset and apply it
    /// (§ structural mutation engine). If the entity was already removed
    /// earlier in this same drain pass (by a cascade triggered by another
    /// entity's destroy), its remaining commands are simply dropped.
    fn apply_entity_commands(&mut self, entity: EntityId, commands: Vec<Command>) -> Result<()> {
        if !self.locations.contains_key(&entity) {
            return Ok(());
        }
        let current_signature = self.archetypes.get(self.locations[&entity].archetype_id).signature().clone();

        let mut adds: AHashMap<Id, Value> = AHashMap::new();
        let mut removes: AHashSet<Id> = AHashSet::new();
        let mut destroyed = false;

        for command in commands {
            match command {
                Command::Destroy => {
                    destroyed = true;
                    break;
                }
                Command::Set(component, value) => {
                    removes.remove(&component);
                    if let Some(decoded) = identity::decode_relation(component) {
                        if !matches!(decoded.target, RelationTarget::Wildcard)
                            && self.components.is_exclusive(decoded.component)
                        {
                            for other in present_relations_with_base(&current_signature, &adds, &removes, decoded.component) {
                                if other != component {
                                    adds.remove(&other);
                                    removes.insert(other);
                                }
                            }
                        }
                    }
                    adds.insert(component, value);
                }
                Command::Delete(component) => {
                    adds.remove(&component);
                    if identity::is_wildcard(component) {
                        let base = identity::decode_relation(component)
                            .expect("classified wildcard always decodes")
                            .component;
                        for concrete in present_relations_with_base(&current_signature, &adds, &removes, base) {
                            adds.remove(&concrete);
                            removes.insert(concrete);
                        }
                    } else {
                        removes.insert(component);
                    }
                }
            }
        }

        if destroyed {
            return self.destroy_entity_now(entity);
        }

        self.apply_changeset(entity, adds, removes)
    }

    /// Move (or update in place) `entity` to reflect `adds`/`removes`,
    /// then fire hooks — removals before additions, per entity.
    fn apply_changeset(&mut self, entity: EntityId, adds: AHashMap<Id, Value>, removes: AHashSet<Id>) -> Result<()> {
        let loc = self.locations[&entity];
        let current_signature = self.archetypes.get(loc.archetype_id).signature().clone();

        let mut new_ids: Vec<Id> = current_signature.iter().copied().filter(|id| !removes.contains(id)).collect();
        for &id in adds.keys() {
            if !new_ids.contains(&id) {
                new_ids.push(id);
            }
        }
        let new_signature = archetype::canonicalize(&new_ids);

        if new_signature == current_signature {
            let table = self.archetypes.get_mut(loc.archetype_id);
            for (&component, value) in adds.iter() {
                table.set(loc.row, component, value.clone_value())?;
            }
        } else {
            let mut component_map = self.archetypes.get(loc.archetype_id).snapshot_row(loc.row);
            for (&component, value) in adds.iter() {
                component_map.insert(component, value.clone_value());
            }
            component_map.retain(|id, _| !removes.contains(id));

            let (new_archetype_id, created) = self.archetypes.get_or_create(new_signature);
            if created {
                #[cfg(feature = "profiling")]
                let span = info_span!("world.new_archetype", archetype_count = self.archetypes.len());
                #[cfg(feature = "profiling")]
                let _span_guard = span.enter();
                self.notify_new_archetype(new_archetype_id);
            }
            let new_row = self.archetypes.get_mut(new_archetype_id).add_entity(entity, component_map)?;

            let old_archetype_id = loc.archetype_id;
            let swapped = self.archetypes.get_mut(old_archetype_id).remove_entity(loc.row);
            if let Some(swapped_entity) = swapped {
                if let Some(swapped_loc) = self.locations.get_mut(&swapped_entity) {
                    swapped_loc.row = loc.row;
                }
            }
            self.locations.insert(
                entity,
                EntityLocation {
                    archetype_id: new_archetype_id,
                    row: new_row,
                },
            );

            if self.archetypes.get(old_archetype_id).is_empty() && self.archetypes.remove_empty(old_archetype_id) {
                self.notify_archetype_removed(old_archetype_id);
            }
        }

        for &removed in &removes {
            if let Some(target) = identity::decode_relation(removed).and_then(|d| d.target.as_entity()) {
                self.references.forget(target, entity, removed);
            }
        }
        for &added in adds.keys() {
            if let Some(target) = identity::decode_relation(added).and_then(|d| d.target.as_entity()) {
                self.references.record(target, entity, added);
            }
        }

        // Hooks run against a local command buffer so they can enqueue
        // further mutations without re-borrowing `self.commands` while
        // we're already mid-drain over it.
        let mut pending = std::mem::take(&mut self.commands);
        {
            let mut ctx = HookCommands {
                commands: &mut pending,
                locations: &self.locations,
            };
            for &removed in &removes {
                self.hooks.fire_removed(&mut ctx, entity, removed);
            }
            for (&added, value) in adds.iter() {
                self.hooks.fire_added(&mut ctx, entity, added, value);
            }
        }
        self.commands = pending;

        debug_assert!(
            self.locations.contains_key(&entity),
            "apply_changeset must leave a live entity in exactly one archetype"
        );
        Ok(())
    }

    /// Destroy path (§ reverse reference index & cascade): synthesize an
    /// immediate `delete` for every reference into `entity`, remove it
    /// from its archetype, free its id, then enqueue `destroy` for any
    /// cascade-delete source so the next drain pass tears it down too.
    fn destroy_entity_now(&mut self, entity: EntityId) -> Result<()> {
        if !self.locations.contains_key(&entity) {
            return Ok(());
        }

        let refs = self.references.references_to(entity);
        #[cfg(feature = "profiling")]
        let span = info_span!("world.destroy_cascade", entity, referenced_by = refs.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();
        let mut cascade_sources = Vec::new();
        for &(source, component) in &refs {
            if let Some(decoded) = identity::decode_relation(component) {
                if self.components.is_cascade_delete(decoded.component) {
                    cascade_sources.push(source);
                }
            }
            if self.locations.contains_key(&source) {
                let mut removes = AHashSet::new();
                removes.insert(component);
                self.apply_changeset(source, AHashMap::new(), removes)?;
            }
        }

        let loc = self.locations.remove(&entity).expect("existence checked above");
        let own_signature = self.archetypes.get(loc.archetype_id).signature().clone();
        let swapped = self.archetypes.get_mut(loc.archetype_id).remove_entity(loc.row);
        if let Some(swapped_entity) = swapped {
            if let Some(swapped_loc) = self.locations.get_mut(&swapped_entity) {
                swapped_loc.row = loc.row;
            }
        }
        if self.archetypes.get(loc.archetype_id).is_empty() && self.archetypes.remove_empty(loc.archetype_id) {
            self.notify_archetype_removed(loc.archetype_id);
        }
        self.entity_alloc.free(entity);
        self.references.clear(entity);
        // The entity's own outgoing relations (e.g. it pointed at some
        // other entity via a concrete relation) must also be forgotten
        // from the target's reverse listing, or a stale `(entity, _)`
        // entry survives under a freed id that a later `spawn` can reuse.
        for &component in &own_signature {
            if let Some(target) = identity::decode_relation(component).and_then(|d| d.target.as_entity()) {
                self.references.forget(target, entity, component);
            }
        }

        for source in cascade_sources {
            if self.locations.contains_key(&source) {
                self.commands.push(source, Command::Destroy);
            }
        }

        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Concrete relations with base `base` currently in effect for an
/// in-progress changeset fold: the entity's pre-sync signature, minus
/// whatever this changeset has already queued for removal, plus whatever
/// it has already queued to add.
fn present_relations_with_base(
    current_signature: &Signature,
    adds: &AHashMap<Id, Value>,
    removes: &AHashSet<Id>,
    base: Id,
) -> Vec<Id> {
    let mut out = Vec::new();
    for &id in current_signature.iter() {
        if removes.contains(&id) {
            continue;
        }
        if identity::is_concrete_relation(id) {
            if let Some(decoded) = identity::decode_relation(id) {
                if decoded.component == base {
                    out.push(id);
                }
            }
        }
    }
    for &id in adds.keys() {
        if identity::is_concrete_relation(id) {
            if let Some(decoded) = identity::decode_relation(id) {
                if decoded.component == base && !out.contains(&id) {
                    out.push(id);
                }
            }
        }
    }
    out
}
