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

//! Error types

use std::fmt;

/// ECS error type
#[derive(Debug, Clone)]
pub enum EcsError {
    /// Mutation referenced a destroyed or never-allocated entity.
    EntityNotFound,

    /// An id classified as `invalid`, or a wildcard relation was used
    /// where a concrete component/relation was required.
    InvalidComponentType,

    /// `get`/`get_mut` on an entity lacking the requested component.
    MissingComponent,

    /// The component id range (`1 ..= C_MAX`) is exhausted.
    IdSpaceExhausted,

    /// The command buffer's drain loop exceeded its iteration ceiling;
    /// indicates a hook that enqueues commands without bound.
    CommandBufferOverflow,

    /// Operation attempted on a disposed query.
    QueryDisposed,

    /// Snapshot encoding failed.
    SerializationError(String),

    /// Snapshot decoding failed.
    DeserializationError(String),

    /// IO error surfaced while reading or writing a snapshot file.
    IoError(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityNotFound => write!(f, "entity not found"),
            EcsError::InvalidComponentType => write!(f, "invalid component type"),
            EcsError::MissingComponent => write!(f, "missing component"),
            EcsError::IdSpaceExhausted => write!(f, "component id space exhausted"),
            EcsError::CommandBufferOverflow => write!(f, "command buffer drain exceeded iteration ceiling"),
            EcsError::QueryDisposed => write!(f, "query already disposed"),
            EcsError::SerializationError(msg) => write!(f, "serialization error: {msg}"),
            EcsError::DeserializationError(msg) => write!(f, "deserialization error: {msg}"),
            EcsError::IoError(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

impl From<std::io::Error> for EcsError {
    fn from(err: std::io::Error) -> Self {
        EcsError::IoError(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
