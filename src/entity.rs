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

//! Entity identifiers and location metadata.

use crate::identity::Id;

/// An entity is a raw id above [`crate::identity::C_MAX`].
///
/// Unlike a generational slotmap key, `EntityId` shares its arithmetic
/// space with components and relations, so it must remain a plain `Id`
/// rather than an opaque handle.
pub type EntityId = Id;

/// Entity location in the archetype store: which table, and which row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_id: usize,
    pub row: usize,
}
