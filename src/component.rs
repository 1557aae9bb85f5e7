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

//! Component descriptors and the component id registry.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::{ComponentAllocator, Id};

/// Per-component metadata tracked by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub id: Id,
    pub name: Option<String>,
    /// At most one relation per base component per entity.
    pub exclusive: bool,
    /// Destroying the target of a relation using this base destroys the
    /// source entities holding it.
    pub cascade_delete: bool,
    /// Accepted for forward compatibility; has no behavioral effect in
    /// this implementation (see DESIGN.md open question).
    pub dont_fragment: bool,
}

impl ComponentDescriptor {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            name: None,
            exclusive: false,
            cascade_delete: false,
            dont_fragment: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_cascade_delete(mut self, cascade_delete: bool) -> Self {
        self.cascade_delete = cascade_delete;
        self
    }
}

/// Spec for registering a new component, before an id has been assigned.
#[derive(Debug, Clone, Default)]
pub struct ComponentSpec {
    pub name: Option<String>,
    pub exclusive: bool,
    pub cascade_delete: bool,
    pub dont_fragment: bool,
}

/// Tracks every allocated plain component id and its descriptor.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    allocator: ComponentAllocator,
    descriptors: AHashMap<Id, ComponentDescriptor>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            allocator: ComponentAllocator::new(),
            descriptors: AHashMap::new(),
        }
    }

    pub fn from_state(next_id: Id, descriptors: Vec<ComponentDescriptor>) -> Self {
        let mut map = AHashMap::with_capacity(descriptors.len());
        for d in descriptors {
            map.insert(d.id, d);
        }
        Self {
            allocator: ComponentAllocator::from_state(next_id),
            descriptors: map,
        }
    }

    /// Allocate a new plain component id from the given spec.
    pub fn allocate(&mut self, spec: ComponentSpec) -> Result<Id> {
        let id = self.allocator.allocate()?;
        let mut desc = ComponentDescriptor::new(id);
        desc.name = spec.name;
        desc.exclusive = spec.exclusive;
        desc.cascade_delete = spec.cascade_delete;
        desc.dont_fragment = spec.dont_fragment;
        self.descriptors.insert(id, desc);
        Ok(id)
    }

    pub fn descriptor(&self, id: Id) -> Option<&ComponentDescriptor> {
        self.descriptors.get(&id)
    }

    pub fn descriptor_mut(&mut self, id: Id) -> Option<&mut ComponentDescriptor> {
        self.descriptors.get_mut(&id)
    }

    pub fn set_exclusive(&mut self, id: Id, exclusive: bool) {
        if let Some(desc) = self.descriptors.get_mut(&id) {
            desc.exclusive = exclusive;
        }
    }

    pub fn is_exclusive(&self, base_component: Id) -> bool {
        self.descriptors
            .get(&base_component)
            .map(|d| d.exclusive)
            .unwrap_or(false)
    }

    pub fn is_cascade_delete(&self, base_component: Id) -> bool {
        self.descriptors
            .get(&base_component)
            .map(|d| d.cascade_delete)
            .unwrap_or(false)
    }

    pub fn next_id(&self) -> Id {
        self.allocator.next_id()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.descriptors.values()
    }

    pub fn exclusive_components(&self) -> Vec<Id> {
        self.descriptors
            .values()
            .filter(|d| d.exclusive)
            .map(|d| d.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_assigns_sequential_ids() {
        let mut reg = ComponentRegistry::new();
        let a = reg.allocate(ComponentSpec::default()).unwrap();
        let b = reg.allocate(ComponentSpec::default()).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn set_exclusive_round_trips() {
        let mut reg = ComponentRegistry::new();
        let c = reg.allocate(ComponentSpec::default()).unwrap();
        assert!(!reg.is_exclusive(c));
        reg.set_exclusive(c, true);
        assert!(reg.is_exclusive(c));
    }

    #[test]
    fn cascade_delete_flag_tracked() {
        let mut reg = ComponentRegistry::new();
        let spec = ComponentSpec {
            cascade_delete: true,
            ..Default::default()
        };
        let c = reg.allocate(spec).unwrap();
        assert!(reg.is_cascade_delete(c));
    }
}
