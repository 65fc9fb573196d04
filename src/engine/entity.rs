//! # Entity Handle Allocation
//!
//! This module issues and recycles the generational entity handles described
//! in [`types`](crate::engine::types).
//!
//! ## Purpose
//! The registry is responsible for:
//!
//! - Issuing stable entity handles from a free list of recycled indices
//! - Tracking liveness through an ordered living set
//! - Invalidating stale handles by bumping the slot generation at destroy
//!
//! ## Design
//! - `generations[i]` holds the generation a live handle for index `i` must
//!   carry. The table starts with one sentinel slot so index 0 is never
//!   issued and handle 0 stays the reserved invalid entity.
//! - The generation is bumped at *destroy*, not at spawn: a recycled index
//!   re-enters circulation already carrying its next generation.
//! - The living set is an ordered set walked by value-range cursor, so query
//!   iteration survives concurrent spawns and kills without snapshotting.
//!
//! ## Invariants
//! - For every living entity `e`, `generations[e.index()] == e.generation()`.
//! - A freed index appears exactly once in the free list and never in the
//!   living set.
//! - `living ⊆ { e : generations[e.index()] == e.generation() }`.
//!
//! ## Concurrency
//! The allocation state is protected by a mutex; the living set by an rwlock
//! so queries proceed concurrently. The live counter is a relaxed atomic used
//! only for diagnostics.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::engine::types::{Entity, GenerationID, IndexID};


#[derive(Default)]
struct AllocState {
    generations: Vec<GenerationID>,
    free_indices: Vec<IndexID>,
}

/// Issues, tracks, and recycles entity handles for one world.
pub struct EntityRegistry {
    alloc: Mutex<AllocState>,
    living: RwLock<BTreeSet<Entity>>,
    live_count: AtomicU32,
}

impl EntityRegistry {
    /// Creates a registry with an empty living set.
    ///
    /// The generation table is seeded with one sentinel slot so the first
    /// issued handle has index 1.
    pub fn new() -> Self {
        Self {
            alloc: Mutex::new(AllocState {
                generations: vec![0],
                free_indices: Vec::new(),
            }),
            living: RwLock::new(BTreeSet::new()),
            live_count: AtomicU32::new(0),
        }
    }

    /// Allocates a handle and adds it to the living set.
    ///
    /// ## Behavior
    /// - Reuses a freed index when one is available, otherwise grows the
    ///   generation table by one slot at generation 0.
    /// - The emitted handle carries the slot's *current* generation; the
    ///   generation is bumped only at destroy.
    pub fn spawn(&self) -> Entity {
        let entity = {
            let mut alloc = self.alloc.lock();
            let index = match alloc.free_indices.pop() {
                Some(index) => index,
                None => {
                    let index = alloc.generations.len() as IndexID;
                    alloc.generations.push(0);
                    index
                }
            };
            Entity::new(index, alloc.generations[index as usize])
        };

        self.living.write().insert(entity);
        self.live_count.fetch_add(1, Ordering::Relaxed);
        entity
    }

    /// Removes an entity from the living set without recycling its index.
    ///
    /// Called by `kill` so queries issued later in the same tick no longer
    /// see the entity; the index itself is reclaimed by the garbage collect
    /// that drains the pending-destroy queue. Returns `false` if the entity
    /// was not living (idempotent).
    pub fn remove_living(&self, entity: Entity) -> bool {
        let removed = self.living.write().remove(&entity);
        if removed {
            self.live_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Returns `true` if the entity is a member of the living set.
    pub fn is_living(&self, entity: Entity) -> bool {
        self.living.read().contains(&entity)
    }

    /// Returns the first living entity strictly greater than `previous`, or
    /// the smallest living entity when `previous` is `None`.
    ///
    /// This is the cursor step used by the lazy query iterators: because the
    /// cursor is a value, not a position, concurrent inserts and removals
    /// never invalidate it.
    pub fn next_living_after(&self, previous: Option<Entity>) -> Option<Entity> {
        let living = self.living.read();
        match previous {
            None => living.iter().next().copied(),
            Some(entity) => living
                .range((Bound::Excluded(entity), Bound::Unbounded))
                .next()
                .copied(),
        }
    }

    /// Returns `true` if the handle carries the slot's current generation.
    ///
    /// Living entities always pass; a killed-but-unreaped entity still passes
    /// until the garbage collect bumps its slot.
    pub fn is_current(&self, entity: Entity) -> bool {
        self.alloc
            .lock()
            .generations
            .get(entity.index() as usize)
            .is_some_and(|&generation| generation == entity.generation())
    }

    /// Reclaims the entity's index and invalidates every handle carrying its
    /// generation. Called only from the garbage-collect pass.
    ///
    /// ## Behavior
    /// - Guards on generation match, which makes duplicate kills within one
    ///   tick and kills of unknown handles silent no-ops.
    /// - Bumps the slot generation and pushes the index onto the free list.
    ///
    /// Returns `false` when the guard rejected the handle.
    pub fn destroy(&self, entity: Entity) -> bool {
        let mut alloc = self.alloc.lock();
        let index = entity.index() as usize;
        match alloc.generations.get_mut(index) {
            Some(generation) if *generation == entity.generation() => {
                *generation = generation.wrapping_add(1);
                alloc.free_indices.push(entity.index());
                true
            }
            _ => false,
        }
    }

    /// Approximate number of living entities.
    pub fn live_count(&self) -> u32 {
        self.live_count.load(Ordering::Relaxed)
    }

    /// Empties the living set. Called by shutdown garbage collection.
    pub fn clear_living(&self) {
        let mut living = self.living.write();
        self.live_count
            .fetch_sub(living.len() as u32, Ordering::Relaxed);
        living.clear();
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_handle_has_index_one() {
        let registry = EntityRegistry::new();
        let entity = registry.spawn();
        assert_eq!(entity.index(), 1);
        assert_eq!(entity.generation(), 0);
        assert!(entity.is_valid());
    }

    #[test]
    fn destroy_bumps_generation_and_recycles_index() {
        let registry = EntityRegistry::new();
        let first = registry.spawn();
        registry.remove_living(first);
        assert!(registry.destroy(first));

        let second = registry.spawn();
        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(!registry.is_current(first));
        assert!(registry.is_current(second));
    }

    #[test]
    fn duplicate_destroy_is_rejected() {
        let registry = EntityRegistry::new();
        let entity = registry.spawn();
        registry.remove_living(entity);
        assert!(registry.destroy(entity));
        assert!(!registry.destroy(entity), "stale generation must be rejected");
    }

    #[test]
    fn cursor_walk_sees_all_living() {
        let registry = EntityRegistry::new();
        let spawned: Vec<_> = (0..5).map(|_| registry.spawn()).collect();

        let mut walked = Vec::new();
        let mut cursor = None;
        while let Some(entity) = registry.next_living_after(cursor) {
            walked.push(entity);
            cursor = Some(entity);
        }
        assert_eq!(walked, spawned);
    }

    #[test]
    fn cursor_walk_survives_removal_of_current() {
        let registry = EntityRegistry::new();
        let spawned: Vec<_> = (0..4).map(|_| registry.spawn()).collect();

        let first = registry.next_living_after(None).unwrap();
        registry.remove_living(first);
        let second = registry.next_living_after(Some(first)).unwrap();
        assert_eq!(second, spawned[1]);
    }
}
