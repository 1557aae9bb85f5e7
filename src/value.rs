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

//! Type-erased component values.
//!
//! Components are allocated dynamically at runtime (by id, not by Rust
//! type), so a column can't hold a byte buffer of a single static `T`
//! the way a compile-time-typed ECS would. Instead each slot holds a
//! boxed [`ComponentValue`] trait object, the same `Any`-based pattern
//! the rest of this crate already uses for resources.

use std::any::Any;
use std::fmt;

/// Marker + dynamic-dispatch surface for anything storable in a column.
///
/// Blanket-implemented for every `'static + Send + Sync + Clone + Debug`
/// type, including `()` for tag components.
pub trait ComponentValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_value(&self) -> Value;
}

impl<T> ComponentValue for T
where
    T: 'static + Send + Sync + Clone + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_value(&self) -> Value {
        Box::new(self.clone())
    }
}

/// A boxed, type-erased component value.
pub type Value = Box<dyn ComponentValue>;

/// Downcast a `&Value` to a concrete `&T`.
pub fn downcast_ref<T: 'static>(value: &Value) -> Option<&T> {
    value.as_any().downcast_ref::<T>()
}

/// Downcast a `&mut Value` to a concrete `&mut T`.
pub fn downcast_mut<T: 'static>(value: &mut Value) -> Option<&mut T> {
    value.as_any_mut().downcast_mut::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_value_round_trips() {
        let v: Value = Box::new(());
        assert!(downcast_ref::<()>(&v).is_some());
    }

    #[test]
    fn typed_value_downcasts() {
        #[derive(Clone, Debug, PartialEq)]
        struct Pos {
            x: f32,
            y: f32,
        }
        let v: Value = Box::new(Pos { x: 1.0, y: 2.0 });
        assert_eq!(downcast_ref::<Pos>(&v), Some(&Pos { x: 1.0, y: 2.0 }));
        assert!(downcast_ref::<i32>(&v).is_none());
    }

    #[test]
    fn clone_value_preserves_type() {
        let v: Value = Box::new(42i32);
        let cloned = v.clone_value();
        assert_eq!(downcast_ref::<i32>(&cloned), Some(&42));
    }
}
