//! # Queryer — the read facade
//!
//! [`Queryer`] is the copyable read handle a system receives each phase. It
//! exposes lazy filtered traversals of the living set, per-entity component
//! predicates, typed component access, and resource lookup.
//!
//! ## Traversal model
//! The `query_*` methods return lazy iterators driven by a value cursor over
//! the ordered living set: each step takes the smallest living entity
//! greater than the last one yielded. No snapshot is taken, so the sequence
//! reflects same-tick kills (a killed entity leaves the living set
//! immediately) and stays valid for the duration of a system's execution.
//! Callers that mutate while iterating in ways that must not affect the
//! traversal — the kill-during-iteration pattern — collect first.
//!
//! ## Safety by discipline
//! References returned by `get`/`get_mut`/`find` point into pool or resource
//! cells whose addresses are stable for the whole tick; destruction is
//! deferred to the post-phase collect. The API enforces *aliasing* correctness
//! by scheduling discipline, not by the borrow checker: systems that touch
//! overlapping component types concurrently must be separated by priority or
//! placed in a main-thread bucket.

use std::any::type_name;
use std::marker::PhantomData;

use crate::engine::component::{component_id_of, ComponentSet};
use crate::engine::error::{AccessError, EcsResult};
use crate::engine::storage::Materialized;
use crate::engine::types::{Entity, GenerationID, IndexID};
use crate::engine::world::World;


#[derive(Clone, Copy)]
enum Filter {
    AllOf,
    AnyOf,
    NonOf,
}

/// Copyable read facade over a world.
#[derive(Clone, Copy)]
pub struct Queryer<'w> {
    world: &'w World,
}

impl<'w> Queryer<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self { world }
    }

    // -- filtered traversals -----------------------------------------------

    /// Living entities carrying **every** component in `S`.
    ///
    /// `query_all_of::<()>()` enumerates the whole living set.
    pub fn query_all_of<S: ComponentSet>(&self) -> QueryIter<'w, S> {
        QueryIter::new(self.world, Filter::AllOf)
    }

    /// Living entities carrying **at least one** component in `S`.
    pub fn query_any_of<S: ComponentSet>(&self) -> QueryIter<'w, S> {
        QueryIter::new(self.world, Filter::AnyOf)
    }

    /// Living entities carrying **none** of the components in `S`.
    pub fn query_non_of<S: ComponentSet>(&self) -> QueryIter<'w, S> {
        QueryIter::new(self.world, Filter::NonOf)
    }

    // -- predicates --------------------------------------------------------

    /// `true` if the entity carries every component in `S`.
    pub fn all_of<S: ComponentSet>(&self, entity: Entity) -> bool {
        S::matches_all(self.world, entity.index())
    }

    /// `true` if the entity carries at least one component in `S`.
    pub fn any_of<S: ComponentSet>(&self, entity: Entity) -> bool {
        S::matches_any(self.world, entity.index())
    }

    /// `true` if the entity carries none of the components in `S`.
    pub fn non_of<S: ComponentSet>(&self, entity: Entity) -> bool {
        !S::matches_any(self.world, entity.index())
    }

    /// `true` if the entity is in the living set. Entities killed earlier in
    /// the same tick already fail this.
    pub fn exist(&self, entity: Entity) -> bool {
        self.world.entities.is_living(entity)
    }

    /// The index portion of the handle.
    pub fn index(&self, entity: Entity) -> IndexID {
        entity.index()
    }

    /// The generation portion of the handle.
    pub fn generation(&self, entity: Entity) -> GenerationID {
        entity.generation()
    }

    // -- typed access ------------------------------------------------------

    /// Returns the entity's `C` instance without materializing.
    ///
    /// ## Errors
    /// - [`AccessError::MissingStorage`] — `C` was never attached to any
    ///   entity in this world.
    /// - [`AccessError::MissingComponent`] — the entity has no entry for `C`.
    /// - [`AccessError::EmptyComponent`] — the entry is still deferred; use
    ///   [`get_mut`](Self::get_mut) to materialize it.
    pub fn get<C: Send + Sync + 'static>(&self, entity: Entity) -> EcsResult<&'w C> {
        debug_assert!(
            self.world.entities.is_current(entity),
            "stale entity handle {entity} passed to get::<{}>",
            type_name::<C>()
        );
        let store = self
            .world
            .components
            .get(component_id_of::<C>())
            .ok_or(AccessError::MissingStorage { component: type_name::<C>() })?;
        let ptr = store
            .peek(entity.index())
            .ok_or(AccessError::MissingComponent { component: type_name::<C>() })?;
        if ptr.is_null() {
            return Err(AccessError::EmptyComponent { component: type_name::<C>() });
        }
        // SAFETY: non-null entries hold a constructed C in a pool block that
        // stays alive at least until the post-phase garbage collect.
        Ok(unsafe { &*ptr.cast::<C>() })
    }

    /// Returns the entity's `C` instance, constructing a deferred entry via
    /// `C::default()` first. The materialized instance keeps its address, so
    /// repeated calls return the same location.
    ///
    /// ## Errors
    /// - [`AccessError::MissingStorage`] / [`AccessError::MissingComponent`]
    ///   as for [`get`](Self::get).
    /// - [`AccessError::NotDefaultConstructible`] — the entry is deferred
    ///   but no default constructor is recorded for `C`.
    pub fn get_mut<C: Send + Sync + 'static>(&self, entity: Entity) -> EcsResult<&'w mut C> {
        debug_assert!(
            self.world.entities.is_current(entity),
            "stale entity handle {entity} passed to get_mut::<{}>",
            type_name::<C>()
        );
        let store = self
            .world
            .components
            .get(component_id_of::<C>())
            .ok_or(AccessError::MissingStorage { component: type_name::<C>() })?;
        match store.materialize(entity.index()) {
            // SAFETY: as in `get`; exclusivity is the scheduler's bucket
            // contract.
            Materialized::Ptr(ptr) => Ok(unsafe { &mut *ptr.cast::<C>() }),
            Materialized::NoEntry => {
                Err(AccessError::MissingComponent { component: type_name::<C>() })
            }
            Materialized::NoDefault => {
                Err(AccessError::NotDefaultConstructible { component: type_name::<C>() })
            }
        }
    }

    // -- resources ---------------------------------------------------------

    /// Returns the resource `R`, or `None` when absent. Absence is not an
    /// error.
    pub fn find<R: Send + Sync + 'static>(&self) -> Option<&'w R> {
        self.world.resources.find::<R>()
    }

    /// Returns the resource `R` mutably, or `None` when absent. The caller
    /// must be the resource's only writer this bucket.
    pub fn find_mut<R: Send + Sync + 'static>(&self) -> Option<&'w mut R> {
        self.world.resources.find_mut::<R>()
    }
}

/// Lazy traversal of the living set under a component filter.
///
/// Yields entities in ascending handle order. See the module docs for the
/// cursor semantics under concurrent mutation.
pub struct QueryIter<'w, S: ComponentSet> {
    world: &'w World,
    cursor: Option<Entity>,
    filter: Filter,
    _set: PhantomData<fn() -> S>,
}

impl<'w, S: ComponentSet> QueryIter<'w, S> {
    fn new(world: &'w World, filter: Filter) -> Self {
        Self {
            world,
            cursor: None,
            filter,
            _set: PhantomData,
        }
    }
}

impl<'w, S: ComponentSet> Iterator for QueryIter<'w, S> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        loop {
            let entity = self.world.entities.next_living_after(self.cursor)?;
            self.cursor = Some(entity);
            let index = entity.index();
            let keep = match self.filter {
                Filter::AllOf => S::matches_all(self.world, index),
                Filter::AnyOf => S::matches_any(self.world, index),
                Filter::NonOf => !S::matches_any(self.world, index),
            };
            if keep {
                return Some(entity);
            }
        }
    }
}
