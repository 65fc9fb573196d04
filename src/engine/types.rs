//! Core ECS Types, Identifiers, and Bit-Level Layouts
//!
//! This module defines the **fundamental types, identifiers, and bit layouts**
//! shared across all subsystems: entity management, component storage,
//! queries, scheduling, and the world itself.
//!
//! ## Entity Representation
//!
//! Entities are encoded as a packed 64-bit integer with the following layout:
//!
//! ```text
//! | index (32) | generation (32) |
//! ```
//!
//! - **Index** addresses a slot in the world's generation table and keys the
//!   per-component sparse maps.
//! - **Generation** is incremented when the slot is destroyed, so stale
//!   handles can be detected cheaply.
//!
//! Handle `0` is reserved as the invalid entity: index `0` is never issued
//! because the generation table is created with one sentinel slot.
//!
//! ## Priorities
//!
//! Systems are registered at an integer priority and executed in descending
//! priority order. Two priorities are reserved: [`EARLY_MAIN_THREAD`] and
//! [`LATE_MAIN_THREAD`] force their bucket to run sequentially on the calling
//! thread, which is the only serialization mechanism the scheduler offers.

use crate::engine::command::Command;
use crate::engine::query::Queryer;


/// Globally unique entity identifier encoded as a packed 64-bit value.
pub type EntityID = u64;
/// Index into the world's generation table.
pub type IndexID = u32;
/// Generation counter used to detect stale entities.
pub type GenerationID = u32;

/// Stable process-wide identity of a component type.
pub type ComponentID = u64;
/// Stable process-wide identity of a resource type.
pub type ResourceID = u64;

/// Scheduling priority of a system. Higher runs earlier.
pub type Priority = i32;

/// Number of bits occupied by the generation portion of an [`EntityID`].
pub const GENERATION_BITS: u32 = 32;
/// Mask selecting the generation portion of an [`EntityID`].
pub const GENERATION_MASK: EntityID = (1 << GENERATION_BITS) - 1;

const _: [(); 1] = [(); (GENERATION_BITS < EntityID::BITS) as usize];

/// Reserved priority: the bucket runs sequentially on the calling thread
/// before every other update bucket.
pub const EARLY_MAIN_THREAD: Priority = Priority::MAX;

/// Reserved priority: the bucket runs sequentially on the calling thread
/// after every other update bucket (end-of-phase work such as render submit).
pub const LATE_MAIN_THREAD: Priority = Priority::MIN;

/// A system registered for the startup or shutdown phase.
pub type PhaseSystem = for<'w> fn(Command<'w>, Queryer<'w>);

/// A system registered for the update phase; receives the frame delta time.
pub type UpdateSystem = for<'w> fn(Command<'w>, Queryer<'w>, f32);

/// Opaque, generational identifier for an ECS entity.
///
/// ## Invariants
/// - Two entities with the same index but different generations are distinct;
///   at most one of them is alive at any point in time.
/// - An entity is alive iff it is a member of the world's living set, which
///   implies `generations[index] == generation`.
///
/// ## Notes
/// `Entity` values are cheap to copy and compare and are safe to pass across
/// threads. Ordering is by raw id, i.e. by index first, which gives queries a
/// deterministic traversal order.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Entity(pub EntityID);

impl Entity {
    /// The reserved invalid handle. Never issued by [`spawn`].
    ///
    /// [`spawn`]: crate::engine::command::Command::spawn
    pub const INVALID: Entity = Entity(0);

    /// Packs an index and a generation into an entity handle.
    #[inline]
    pub const fn new(index: IndexID, generation: GenerationID) -> Self {
        Self(((index as EntityID) << GENERATION_BITS) | generation as EntityID)
    }

    /// Returns the index portion of this entity.
    #[inline]
    pub const fn index(self) -> IndexID {
        (self.0 >> GENERATION_BITS) as IndexID
    }

    /// Returns the generation portion of this entity.
    #[inline]
    pub const fn generation(self) -> GenerationID {
        (self.0 & GENERATION_MASK) as GenerationID
    }

    /// Returns `true` unless this is the reserved invalid handle.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_roundtrip() {
        let entity = Entity::new(12345, 67890);
        assert_eq!(entity.index(), 12345);
        assert_eq!(entity.generation(), 67890);
    }

    #[test]
    fn invalid_handle_is_zero() {
        assert_eq!(Entity::INVALID.0, 0);
        assert!(!Entity::INVALID.is_valid());
        assert!(Entity::new(1, 0).is_valid());
    }

    #[test]
    fn ordering_is_index_major() {
        assert!(Entity::new(1, 9) < Entity::new(2, 0));
        assert!(Entity::new(3, 0) < Entity::new(3, 1));
    }
}
