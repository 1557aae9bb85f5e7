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

//! Lifecycle hooks: synchronous listeners fired when a component is
//! added to or removed from an entity during [`crate::world::World::sync`].
//!
//! Hooks never see `&mut World` directly — per the design notes, a
//! closure capturing the world would make re-entrant `sync` too easy to
//! reach for by accident. Instead a hook gets a [`HookCommands`] handle
//! that can only enqueue further `set`/`delete`/`destroy` calls.

use ahash::AHashMap;

use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::identity::{self, Id};
use crate::value::Value;

/// Opaque token returned by [`crate::world::World::hook`], passed back to
/// [`crate::world::World::unhook`].
pub type HookId = u64;

/// The limited surface a hook body is allowed to touch. Backed by the
/// same command buffer `sync` is draining, so anything enqueued here is
/// folded into the current drain pass rather than requiring a second
/// `sync` call.
pub struct HookCommands<'a> {
    pub(crate) commands: &'a mut crate::command::CommandBuffer,
    pub(crate) locations: &'a AHashMap<EntityId, crate::entity::EntityLocation>,
}

impl<'a> HookCommands<'a> {
    fn require_exists(&self, entity: EntityId) -> Result<()> {
        if self.locations.contains_key(&entity) {
            Ok(())
        } else {
            Err(EcsError::EntityNotFound)
        }
    }

    pub fn set(&mut self, entity: EntityId, component: Id, value: Value) -> Result<()> {
        self.require_exists(entity)?;
        if identity::is_wildcard(component) {
            return Err(EcsError::InvalidComponentType);
        }
        self.commands
            .push(entity, crate::command::Command::Set(component, value));
        Ok(())
    }

    pub fn delete(&mut self, entity: EntityId, component: Id) -> Result<()> {
        self.require_exists(entity)?;
        self.commands
            .push(entity, crate::command::Command::Delete(component));
        Ok(())
    }

    pub fn destroy(&mut self, entity: EntityId) -> Result<()> {
        self.require_exists(entity)?;
        self.commands.push(entity, crate::command::Command::Destroy);
        Ok(())
    }
}

/// A pair of optional callbacks registered against either a concrete
/// component id or a wildcard relation `(base, *)`.
#[allow(clippy::type_complexity)]
pub struct Hook {
    pub on_added: Option<Box<dyn FnMut(&mut HookCommands, EntityId, Id, &Value) + 'static>>,
    pub on_removed: Option<Box<dyn FnMut(&mut HookCommands, EntityId, Id) + 'static>>,
}

impl Hook {
    pub fn new() -> Self {
        Self {
            on_added: None,
            on_removed: None,
        }
    }

    pub fn on_added(mut self, f: impl FnMut(&mut HookCommands, EntityId, Id, &Value) + 'static) -> Self {
        self.on_added = Some(Box::new(f));
        self
    }

    pub fn on_removed(mut self, f: impl FnMut(&mut HookCommands, EntityId, Id) + 'static) -> Self {
        self.on_removed = Some(Box::new(f));
        self
    }
}

impl Default for Hook {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of hooks keyed by the concrete component id or wildcard
/// relation id they were registered under.
#[derive(Default)]
pub struct HookRegistry {
    by_key: AHashMap<Id, Vec<(HookId, Hook)>>,
    next_id: HookId,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: Id, hook: Hook) -> HookId {
        let id = self.next_id;
        self.next_id += 1;
        self.by_key.entry(key).or_default().push((id, hook));
        id
    }

    /// Remove a previously registered hook. Returns `false` if `id` was
    /// never registered under `key` (already unhooked, or mismatched key).
    pub fn unregister(&mut self, key: Id, id: HookId) -> bool {
        if let Some(list) = self.by_key.get_mut(&key) {
            let before = list.len();
            list.retain(|(hid, _)| *hid != id);
            return list.len() != before;
        }
        false
    }

    /// Fire every `on_added` hook registered for `component`, plus every
    /// wildcard hook registered for its base if `component` is a relation.
    pub fn fire_added(&mut self, ctx: &mut HookCommands, entity: EntityId, component: Id, value: &Value) {
        self.fire(component, |hook, ctx| {
            if let Some(cb) = hook.on_added.as_mut() {
                cb(ctx, entity, component, value);
            }
        }, ctx);
    }

    /// Fire every `on_removed` hook registered for `component`, plus every
    /// wildcard hook registered for its base if `component` is a relation.
    pub fn fire_removed(&mut self, ctx: &mut HookCommands, entity: EntityId, component: Id) {
        self.fire(component, |hook, ctx| {
            if let Some(cb) = hook.on_removed.as_mut() {
                cb(ctx, entity, component);
            }
        }, ctx);
    }

    fn fire(
        &mut self,
        component: Id,
        mut invoke: impl FnMut(&mut Hook, &mut HookCommands),
        ctx: &mut HookCommands,
    ) {
        if let Some(list) = self.by_key.get_mut(&component) {
            for (_, hook) in list.iter_mut() {
                invoke(hook, ctx);
            }
        }
        if let Some(wildcard) = wildcard_form(component) {
            if wildcard != component {
                if let Some(list) = self.by_key.get_mut(&wildcard) {
                    for (_, hook) in list.iter_mut() {
                        invoke(hook, ctx);
                    }
                }
            }
        }
    }
}

/// The wildcard `(base, *)` id a concrete relation would additionally
/// dispatch to, or `None` if `component` is not a relation at all.
fn wildcard_form(component: Id) -> Option<Id> {
    let decoded = identity::decode_relation(component)?;
    identity::encode_relation(decoded.component, identity::RelationTarget::Wildcard).ok()
}
