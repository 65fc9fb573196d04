//! # sparse_ecs
//!
//! Sparse-map Entity-Component-System runtime with a priority-bucketed,
//! partially parallel system scheduler.
//!
//! ## Design Goals
//! - Sparse per-type storage with stable, generational entity handles
//! - Deferred destruction: kills and detaches drain at phase boundaries
//! - Parallel buckets with reserved main-thread priorities for serialization
//! - Safe, explicit data access through copyable command/queryer facades
//!
//! ## Shape of a program
//! ```no_run
//! use sparse_ecs::prelude::*;
//!
//! #[derive(Default)]
//! struct Position { x: f32, y: f32 }
//! struct Velocity { x: f32, y: f32 }
//!
//! fn integrate(_command: Command, queryer: Queryer, dt: f32) {
//!     for entity in queryer.query_all_of::<(Position, Velocity)>() {
//!         let velocity = queryer.get::<Velocity>(entity).unwrap();
//!         let (vx, vy) = (velocity.x, velocity.y);
//!         let position = queryer.get_mut::<Position>(entity).unwrap();
//!         position.x += vx * dt;
//!         position.y += vy * dt;
//!     }
//! }
//!
//! let mut world = World::new();
//! world.add_update(integrate, 0);
//! world.startup();
//! world.update(1.0 / 60.0);
//! world.shutdown();
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod engine;
pub mod memory;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::world::World;

pub use engine::command::Command;
pub use engine::query::{Queryer, QueryIter};

pub use engine::types::{
    Entity,
    EntityID,
    IndexID,
    GenerationID,
    ComponentID,
    ResourceID,
    Priority,
    PhaseSystem,
    UpdateSystem,
    EARLY_MAIN_THREAD,
    LATE_MAIN_THREAD,
};

pub use engine::component::{
    component_id_of,
    resource_id_of,
    Bundle,
    ComponentSet,
    DefaultBundle,
};

pub use engine::resource::GarbageCollect;

pub use engine::error::{AccessError, EcsResult};

pub use memory::pool::SyncPool;

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used ECS types.
///
/// Import with:
/// ```rust
/// use sparse_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AccessError,
        Command,
        EcsResult,
        Entity,
        GarbageCollect,
        Priority,
        Queryer,
        World,
        EARLY_MAIN_THREAD,
        LATE_MAIN_THREAD,
    };
}
