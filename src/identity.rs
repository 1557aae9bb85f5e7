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

//! The identity codec: a single `i64` namespace for entities, components,
//! and typed relations.
//!
//! Layout:
//! - `0` is reserved invalid.
//! - `1 ..= C_MAX` are plain component ids.
//! - `C_MAX+1 ..` are entity ids, allocated by [`EntityAllocator`].
//! - negative values are relation ids, bit-packed from `(component, target, kind)`.

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, Result};

/// Raw identifier type shared by entities, components, and relations.
pub type Id = i64;

/// Highest plain component id. Entities begin at `C_MAX + 1`.
pub const C_MAX: Id = 1023;

/// Sentinel "any target" marker used when encoding a wildcard relation.
/// Chosen far above any id this allocator can ever produce.
pub const WILDCARD: Id = (1 << 48) - 1;

const COMPONENT_BITS: u32 = 12;
const KIND_BITS: u32 = 2;
const COMPONENT_MASK: i64 = (1 << COMPONENT_BITS) - 1;
const KIND_MASK: i64 = (1 << KIND_BITS) - 1;

const KIND_ENTITY: i64 = 0;
const KIND_COMPONENT: i64 = 1;
const KIND_WILDCARD: i64 = 2;

/// Pure classification of any raw id in the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Invalid,
    Component,
    Entity,
    EntityRelation,
    ComponentRelation,
    WildcardRelation,
}

/// A decoded relation: the base component plus what it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRelation {
    pub component: Id,
    pub target: RelationTarget,
}

/// What a relation points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationTarget {
    Entity(Id),
    Component(Id),
    Wildcard,
}

impl RelationTarget {
    /// The entity id this relation points at, if it targets an entity at
    /// all (as opposed to a component type or the wildcard sentinel).
    /// Only entity targets participate in the reverse reference index:
    /// components are never destroyed through [`crate::world::World::destroy`],
    /// so no cascade can ever fire for a component-relation target.
    pub fn as_entity(&self) -> Option<Id> {
        match self {
            RelationTarget::Entity(e) => Some(*e),
            _ => None,
        }
    }
}

/// Classify any raw id. Total, pure function of the integer.
pub fn classify(id: Id) -> IdKind {
    if id == 0 {
        IdKind::Invalid
    } else if id > 0 && id <= C_MAX {
        IdKind::Component
    } else if id > C_MAX {
        IdKind::Entity
    } else {
        let packed = (-id) - 1;
        let kind = (packed >> COMPONENT_BITS) & KIND_MASK;
        match kind {
            KIND_ENTITY => IdKind::EntityRelation,
            KIND_COMPONENT => IdKind::ComponentRelation,
            KIND_WILDCARD => IdKind::WildcardRelation,
            _ => IdKind::Invalid,
        }
    }
}

/// Encode `(component, target)` into a relation id.
///
/// Total and reversible: `decode_relation(encode_relation(c, t)) == (c, t)`.
/// Distinct `(c, t)` pairs always yield distinct negative ids.
pub fn encode_relation(component: Id, target: RelationTarget) -> Result<Id> {
    if component <= 0 || component > C_MAX {
        return Err(EcsError::InvalidComponentType);
    }
    let (kind, target_bits) = match target {
        RelationTarget::Entity(e) => (KIND_ENTITY, e),
        RelationTarget::Component(c) => (KIND_COMPONENT, c),
        RelationTarget::Wildcard => (KIND_WILDCARD, 0),
    };
    let packed = (target_bits << (COMPONENT_BITS + KIND_BITS)) | (kind << COMPONENT_BITS) | component;
    Ok(-(packed + 1))
}

/// Decode a relation id produced by [`encode_relation`].
///
/// Returns `None` if `id` does not classify as a relation.
pub fn decode_relation(id: Id) -> Option<DecodedRelation> {
    if id >= 0 {
        return None;
    }
    let packed = (-id) - 1;
    let component = packed & COMPONENT_MASK;
    let kind = (packed >> COMPONENT_BITS) & KIND_MASK;
    let target_bits = packed >> (COMPONENT_BITS + KIND_BITS);
    let target = match kind {
        KIND_ENTITY => RelationTarget::Entity(target_bits),
        KIND_COMPONENT => RelationTarget::Component(target_bits),
        KIND_WILDCARD => RelationTarget::Wildcard,
        _ => return None,
    };
    Some(DecodedRelation { component, target })
}

/// Is `id` a wildcard relation `(b, *)`?
pub fn is_wildcard(id: Id) -> bool {
    matches!(classify(id), IdKind::WildcardRelation)
}

/// Is `id` a concrete (non-wildcard) relation?
pub fn is_concrete_relation(id: Id) -> bool {
    matches!(
        classify(id),
        IdKind::EntityRelation | IdKind::ComponentRelation
    )
}

/// Base component of a relation id, or the id itself if it's already a plain component.
pub fn base_component(id: Id) -> Option<Id> {
    if classify(id) == IdKind::Component {
        return Some(id);
    }
    decode_relation(id).map(|d| d.component)
}

/// Allocates and recycles entity ids above `C_MAX`.
///
/// The bump counter is monotonic and preserved across serialization so
/// that `deserialize(serialize(w))` never reissues an id still considered
/// live by an older snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityAllocator {
    next_id: Id,
    free_list: Vec<Id>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            next_id: C_MAX + 1,
            free_list: Vec::new(),
        }
    }

    /// Restore allocator state verbatim (used by deserialization).
    pub fn from_state(next_id: Id, free_list: Vec<Id>) -> Self {
        Self { next_id, free_list }
    }

    pub fn next_id(&self) -> Id {
        self.next_id
    }

    pub fn free_list(&self) -> &[Id] {
        &self.free_list
    }

    /// Allocate an entity id: reuse from the free-list if available, else bump.
    pub fn allocate(&mut self) -> Id {
        if let Some(id) = self.free_list.pop() {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Return an id to the free-list. Caller guarantees `id` is not
    /// observed as live by any reader after this call.
    pub fn free(&mut self, id: Id) {
        self.free_list.push(id);
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocates plain component ids sequentially from `1 ..= C_MAX`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentAllocator {
    next_id: Id,
}

impl ComponentAllocator {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    pub fn from_state(next_id: Id) -> Self {
        Self { next_id }
    }

    pub fn next_id(&self) -> Id {
        self.next_id
    }

    pub fn allocate(&mut self) -> Result<Id> {
        if self.next_id > C_MAX {
            return Err(EcsError::IdSpaceExhausted);
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }
}

impl Default for ComponentAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_reserved_ranges() {
        assert_eq!(classify(0), IdKind::Invalid);
        assert_eq!(classify(1), IdKind::Component);
        assert_eq!(classify(C_MAX), IdKind::Component);
        assert_eq!(classify(C_MAX + 1), IdKind::Entity);
        assert_eq!(classify(1_000_000), IdKind::Entity);
    }

    #[test]
    fn relation_round_trip_entity_target() {
        let rel = encode_relation(5, RelationTarget::Entity(2000)).unwrap();
        assert!(rel < 0);
        assert_eq!(classify(rel), IdKind::EntityRelation);
        let decoded = decode_relation(rel).unwrap();
        assert_eq!(decoded.component, 5);
        assert_eq!(decoded.target, RelationTarget::Entity(2000));
    }

    #[test]
    fn relation_round_trip_component_target() {
        let rel = encode_relation(7, RelationTarget::Component(42)).unwrap();
        assert_eq!(classify(rel), IdKind::ComponentRelation);
        let decoded = decode_relation(rel).unwrap();
        assert_eq!(decoded.component, 7);
        assert_eq!(decoded.target, RelationTarget::Component(42));
    }

    #[test]
    fn relation_round_trip_wildcard() {
        let rel = encode_relation(9, RelationTarget::Wildcard).unwrap();
        assert!(is_wildcard(rel));
        let decoded = decode_relation(rel).unwrap();
        assert_eq!(decoded.component, 9);
        assert_eq!(decoded.target, RelationTarget::Wildcard);
    }

    #[test]
    fn distinct_pairs_yield_distinct_ids() {
        let a = encode_relation(1, RelationTarget::Entity(10)).unwrap();
        let b = encode_relation(1, RelationTarget::Entity(11)).unwrap();
        let c = encode_relation(2, RelationTarget::Entity(10)).unwrap();
        let d = encode_relation(1, RelationTarget::Wildcard).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(b, c);
    }

    #[test]
    fn relation_requires_plain_component_base() {
        assert!(encode_relation(0, RelationTarget::Wildcard).is_err());
        assert!(encode_relation(-1, RelationTarget::Wildcard).is_err());
        assert!(encode_relation(C_MAX + 1, RelationTarget::Wildcard).is_err());
    }

    #[test]
    fn entity_allocator_reuses_free_list() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);
        alloc.free(a);
        let c = alloc.allocate();
        assert_eq!(c, a);
        let d = alloc.allocate();
        assert!(d > b);
    }

    #[test]
    fn component_allocator_exhaustion() {
        let mut alloc = ComponentAllocator::from_state(C_MAX);
        assert!(alloc.allocate().is_ok());
        assert!(matches!(alloc.allocate(), Err(EcsError::IdSpaceExhausted)));
    }

    #[test]
    fn base_component_of_plain_and_relation() {
        assert_eq!(base_component(5), Some(5));
        let rel = encode_relation(3, RelationTarget::Wildcard).unwrap();
        assert_eq!(base_component(rel), Some(3));
        assert_eq!(base_component(0), None);
    }
}
