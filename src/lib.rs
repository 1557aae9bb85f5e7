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

//! Archetype ECS — a single-threaded archetype column store addressed
//! through one signed identifier namespace shared by entities, components,
//! and typed relations.
//!
//! Entities are spawned, mutated through deferred `set`/`delete`/`destroy`
//! calls, and moved between archetypes on [`world::World::sync`]. See the
//! [`prelude`] for the common entry points.

pub mod archetype;
pub mod archetype_index;
pub mod command;
pub mod component;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod prelude;
pub mod query;
pub mod reverse_index;
pub mod serialization;
pub mod value;
pub mod world;

pub use archetype::{Archetype, Signature};
pub use command::{Command, CommandBuffer};
pub use component::{ComponentDescriptor, ComponentRegistry, ComponentSpec};
pub use entity::{EntityId, EntityLocation};
pub use error::{EcsError, Result};
pub use hooks::{Hook, HookCommands, HookId};
pub use identity::{Id, RelationTarget, C_MAX, WILDCARD};
pub use query::{Query, QueryFilter};
pub use serialization::{SerializationRegistry, Snapshot};
pub use value::{ComponentValue, Value};
pub use world::World;
