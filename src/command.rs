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

//! Deferred command queue. `World::set`/`delete`/`destroy` validate their
//! preconditions immediately and push one of these variants; the actual
//! archetype move happens later, on [`crate::world::World::sync`].

use ahash::AHashMap;

use crate::entity::EntityId;
use crate::identity::Id;
use crate::value::Value;

/// One deferred mutation against a single entity.
pub enum Command {
    /// Overwrite (or newly attach) a component value.
    Set(Id, Value),
    /// Drop a component. If `Id` classifies as a wildcard relation, every
    /// concrete relation sharing its base component is dropped.
    Delete(Id),
    /// Destroy the entity outright; short-circuits any later command for
    /// the same entity in the same drain pass.
    Destroy,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Set(id, _) => f.debug_tuple("Set").field(id).finish(),
            Command::Delete(id) => f.debug_tuple("Delete").field(id).finish(),
            Command::Destroy => write!(f, "Destroy"),
        }
    }
}

/// Queues commands per entity, preserving FIFO order within an entity's
/// own queue and exposing entities in order of first touch since the
/// last drain, for deterministic cross-entity drain order.
#[derive(Default)]
pub struct CommandBuffer {
    order: Vec<EntityId>,
    queues: AHashMap<EntityId, Vec<Command>>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command for `entity`. First touch since the last drain
    /// appends `entity` to the visitation order; subsequent touches only
    /// extend its own queue.
    pub fn push(&mut self, entity: EntityId, command: Command) {
        if !self.queues.contains_key(&entity) {
            self.order.push(entity);
        }
        self.queues.entry(entity).or_default().push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Take every queued command, grouped by entity in first-touch order,
    /// leaving the buffer empty. Commands pushed by a hook while the
    /// caller is processing this batch land in a fresh queue, not this one.
    pub fn take_batch(&mut self) -> Vec<(EntityId, Vec<Command>)> {
        let order = std::mem::take(&mut self.order);
        let mut batch = Vec::with_capacity(order.len());
        for entity in order {
            if let Some(commands) = self.queues.remove(&entity) {
                batch.push((entity, commands));
            }
        }
        batch
    }
}
