//! # Singleton Resources
//!
//! World-owned values keyed by their type: at most one instance per type,
//! created and removed synchronously through the command facade and read
//! through the queryer.
//!
//! ## Semantics
//! - `add` installs a resource only when absent; a second add is a silent
//!   no-op and the provided value is dropped.
//! - `set` assigns through an existing instance and never creates one.
//! - `remove` is idempotent.
//! - `find` returns `None` for an absent resource; absence is not an error.
//!
//! ## Concurrency
//! The cell table is guarded by an rwlock; `set` and `find` are mutually
//! exclusive at the table level. References returned by `find`/`find_mut`
//! point into the resource's stable heap cell; concurrent writers of the
//! *same* resource must be serialized by bucket placement, like component
//! access.

use std::any::Any;
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::engine::component::resource_id_of;
use crate::engine::types::ResourceID;


/// Reserved resource gating the per-tick garbage collect.
///
/// Installed by `startup()` with `enabled == false`. Setting `enabled` to
/// `true` during a tick makes the garbage collect at the end of that update
/// drain the deferred queues, after which the flag resets to `false`.
/// Shutdown drains unconditionally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GarbageCollect {
    /// Whether the next end-of-update garbage collect should drain.
    pub enabled: bool,
}

/// Table of singleton resources keyed by resource type identity.
pub struct ResourceRegistry {
    cells: RwLock<HashMap<ResourceID, Box<dyn Any + Send + Sync>>>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
        }
    }

    /// Installs `R::default()` if the resource is absent.
    pub(crate) fn add_default<R: Default + Send + Sync + 'static>(&self) {
        self.cells
            .write()
            .entry(resource_id_of::<R>())
            .or_insert_with(|| Box::new(R::default()));
    }

    /// Installs `value` if the resource is absent; drops it otherwise.
    pub(crate) fn add<R: Send + Sync + 'static>(&self, value: R) {
        self.cells
            .write()
            .entry(resource_id_of::<R>())
            .or_insert_with(move || Box::new(value));
    }

    /// Assigns `value` through the existing instance. Does not create;
    /// a missing resource makes this a no-op and drops the value.
    pub(crate) fn set<R: Send + Sync + 'static>(&self, value: R) {
        let mut cells = self.cells.write();
        if let Some(cell) = cells
            .get_mut(&resource_id_of::<R>())
            .and_then(|cell| cell.downcast_mut::<R>())
        {
            *cell = value;
        }
    }

    /// Destroys and erases the resource. Idempotent.
    pub(crate) fn remove<R: Send + Sync + 'static>(&self) {
        self.cells.write().remove(&resource_id_of::<R>());
    }

    /// Returns a reference to the resource, or `None` when absent.
    pub(crate) fn find<R: Send + Sync + 'static>(&self) -> Option<&R> {
        let cells = self.cells.read();
        let ptr: *const R = cells
            .get(&resource_id_of::<R>())?
            .downcast_ref::<R>()?;
        // SAFETY: the instance lives in a heap cell whose address is stable
        // across `set` (which assigns in place); removal while borrowed is
        // excluded by the scheduler's bucket contract.
        Some(unsafe { &*ptr })
    }

    /// Returns a mutable reference to the resource, or `None` when absent.
    ///
    /// The caller must hold exclusive access to the resource per the
    /// scheduling contract (single writer at a time per resource type).
    pub(crate) fn find_mut<R: Send + Sync + 'static>(&self) -> Option<&mut R> {
        let mut cells = self.cells.write();
        let ptr: *mut R = cells
            .get_mut(&resource_id_of::<R>())?
            .downcast_mut::<R>()?;
        // SAFETY: as in `find`, plus the single-writer contract.
        Some(unsafe { &mut *ptr })
    }

    /// Drops every resource. Called by shutdown garbage collection.
    pub(crate) fn clear(&self) {
        self.cells.write().clear();
    }

    /// Number of installed resources.
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    /// Returns `true` when no resource is installed.
    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Counter {
        value: i32,
    }

    #[test]
    fn add_then_find() {
        let registry = ResourceRegistry::new();
        registry.add(Counter { value: 1 });
        assert_eq!(registry.find::<Counter>(), Some(&Counter { value: 1 }));
    }

    #[test]
    fn second_add_is_a_noop() {
        let registry = ResourceRegistry::new();
        registry.add(Counter { value: 1 });
        registry.add(Counter { value: 2 });
        assert_eq!(registry.find::<Counter>(), Some(&Counter { value: 1 }));
    }

    #[test]
    fn set_overwrites_but_never_creates() {
        let registry = ResourceRegistry::new();
        registry.set(Counter { value: 5 });
        assert!(registry.find::<Counter>().is_none());

        registry.add(Counter { value: 1 });
        registry.set(Counter { value: 5 });
        assert_eq!(registry.find::<Counter>(), Some(&Counter { value: 5 }));
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ResourceRegistry::new();
        registry.add(Counter { value: 1 });
        registry.remove::<Counter>();
        registry.remove::<Counter>();
        assert!(registry.find::<Counter>().is_none());
    }

    #[test]
    fn find_mut_assigns_in_place() {
        let registry = ResourceRegistry::new();
        registry.add(Counter { value: 1 });
        registry.find_mut::<Counter>().unwrap().value = 9;
        assert_eq!(registry.find::<Counter>(), Some(&Counter { value: 9 }));
    }
}
