//! # Typed Storage Registry
//!
//! Per-component-type storage blocks and the registry that creates them
//! lazily on first attach.
//!
//! ## Layout
//! Each registered component type owns a [`ComponentStore`]: a sparse map
//! from entity *index* to an instance pointer, the shared world pool the
//! instances are allocated from, and the type's destructor thunk. A null
//! pointer encodes "attached with default construction deferred until the
//! first mutable read".
//!
//! The map is keyed by index rather than full handle on purpose: generations
//! move independently of storage slots, and a reissued index finds its slot
//! already vacated by the garbage collect that freed it, so the index alone
//! is unambiguous. Liveness is checked separately against the living set.
//!
//! ## Invariants
//! - A non-null entry points to a constructed instance of the store's type,
//!   allocated from the world pool with the store's layout.
//! - A null entry exists only for stores whose default-constructor thunk has
//!   been recorded.
//! - An entity index maps to at most one entry per store.
//!
//! ## Concurrency
//! The outer type-id table is append-only during normal operation and
//! guarded by an rwlock; after warm-up every access is a read. The inner
//! maps follow a reader-writer discipline: attach/detach write, queries
//! read. Writing *through* a stored pointer is serialized by the scheduler's
//! bucket contract, not by these locks.

use std::alloc::Layout;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::engine::component::{
    component_id_of, default_construct, ComponentVtable, DefaultFn, DropFn,
};
use crate::engine::types::{ComponentID, IndexID};
use crate::memory::pool::SyncPool;


/// Outcome of a materializing lookup in a [`ComponentStore`].
pub(crate) enum Materialized {
    /// Entry found; pointer is non-null (possibly just constructed).
    Ptr(*mut u8),
    /// The entity has no entry for this component.
    NoEntry,
    /// The entry is deferred and the store has no default-constructor thunk.
    NoDefault,
}

/// Storage block for a single component type.
pub struct ComponentStore {
    entries: RwLock<HashMap<IndexID, *mut u8>>,
    vtable: ComponentVtable,
    default_ctor: OnceLock<DefaultFn>,
    pool: Arc<SyncPool>,
}

// SAFETY: entries point into the world pool; the instances behind them are
// Send + Sync by the attach-site bounds, map mutation is guarded by the
// entries lock, and access through the pointers follows the scheduler's
// bucket discipline.
unsafe impl Send for ComponentStore {}
unsafe impl Sync for ComponentStore {}

impl ComponentStore {
    fn new(vtable: ComponentVtable, pool: Arc<SyncPool>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            vtable,
            default_ctor: OnceLock::new(),
            pool,
        }
    }

    #[inline]
    pub(crate) fn layout(&self) -> Layout {
        self.vtable.layout
    }

    #[inline]
    pub(crate) fn drop_fn(&self) -> DropFn {
        self.vtable.drop_fn
    }

    /// Records the default-constructor thunk for `T`.
    ///
    /// Called on every deferred attach; only the first call stores anything.
    /// Null entries can therefore only exist once a thunk is recorded.
    pub(crate) fn ensure_default_ctor<T: Default>(&self) {
        self.default_ctor.get_or_init(|| default_construct::<T>);
    }

    /// Inserts a deferred (null) entry. First-writer-wins: an existing entry
    /// of either kind is left untouched.
    pub(crate) fn insert_deferred(&self, index: IndexID) {
        self.entries
            .write()
            .entry(index)
            .or_insert(std::ptr::null_mut());
    }

    /// Allocates, constructs, and inserts an instance for `index`.
    ///
    /// First-writer-wins: if an entry already exists the value is dropped
    /// and the entry is not overwritten.
    pub(crate) fn insert_value<T>(&self, index: IndexID, value: T) {
        let mut entries = self.entries.write();
        if entries.contains_key(&index) {
            return;
        }
        let ptr = self.pool.allocate(self.vtable.layout);
        // SAFETY: `ptr` is a fresh block of T's layout.
        unsafe { ptr.cast::<T>().write(value) };
        entries.insert(index, ptr);
    }

    /// Assigns `value` through an existing, constructed entry.
    ///
    /// Missing entries are a no-op: `modify` never allocates. A deferred
    /// entry is also a no-op for the same reason.
    pub(crate) fn assign<T>(&self, index: IndexID, value: T) {
        let entries = self.entries.read();
        if let Some(&ptr) = entries.get(&index) {
            if !ptr.is_null() {
                // SAFETY: non-null entries hold a constructed T; exclusive
                // access is the scheduler's bucket contract.
                unsafe { *ptr.cast::<T>() = value };
            }
        }
    }

    /// Returns the raw entry for `index` without materializing.
    pub(crate) fn peek(&self, index: IndexID) -> Option<*mut u8> {
        self.entries.read().get(&index).copied()
    }

    /// Returns `true` if the entity index has an entry (deferred counts).
    pub(crate) fn contains(&self, index: IndexID) -> bool {
        self.entries.read().contains_key(&index)
    }

    /// Returns the entry for `index`, constructing a deferred entry through
    /// the recorded default thunk.
    pub(crate) fn materialize(&self, index: IndexID) -> Materialized {
        {
            let entries = self.entries.read();
            match entries.get(&index) {
                None => return Materialized::NoEntry,
                Some(&ptr) if !ptr.is_null() => return Materialized::Ptr(ptr),
                Some(_) => {}
            }
        }

        // Deferred entry: re-check under the write lock, then construct.
        let mut entries = self.entries.write();
        match entries.get_mut(&index) {
            None => Materialized::NoEntry,
            Some(slot) if !slot.is_null() => Materialized::Ptr(*slot),
            Some(slot) => {
                let Some(&ctor) = self.default_ctor.get() else {
                    return Materialized::NoDefault;
                };
                let ptr = self.pool.allocate(self.vtable.layout);
                // SAFETY: `ptr` is a fresh block of the store's layout and the
                // thunk was recorded by a `T: Default` attach of this type.
                unsafe { ctor(ptr) };
                *slot = ptr;
                Materialized::Ptr(ptr)
            }
        }
    }

    /// Removes and returns the entry for `index`, if any. The caller owns
    /// the returned pointer (null for a deferred entry).
    pub(crate) fn take(&self, index: IndexID) -> Option<*mut u8> {
        self.entries.write().remove(&index)
    }

    /// Destroys and deallocates the entry for `index` in place, if present.
    /// Used when the owning entity is reaped.
    pub(crate) fn reap(&self, index: IndexID) {
        if let Some(ptr) = self.take(index) {
            if !ptr.is_null() {
                // SAFETY: non-null entries hold a constructed instance
                // allocated from the pool with the store's layout.
                unsafe { (self.vtable.drop_fn)(ptr) };
                self.pool.deallocate(ptr, self.vtable.layout);
            }
        }
    }

    /// Destroys every remaining instance and clears the map. Used by
    /// shutdown garbage collection.
    pub(crate) fn drain_all(&self) {
        let mut entries = self.entries.write();
        for (_, ptr) in entries.drain() {
            if !ptr.is_null() {
                // SAFETY: as in `reap`.
                unsafe { (self.vtable.drop_fn)(ptr) };
                self.pool.deallocate(ptr, self.vtable.layout);
            }
        }
    }

    /// Number of entries, deferred included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` when no entity has an entry in this store.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Table of per-type storage blocks, created lazily on first attach.
pub struct StorageRegistry {
    stores: RwLock<HashMap<ComponentID, Arc<ComponentStore>>>,
    pool: Arc<SyncPool>,
}

impl StorageRegistry {
    /// Creates an empty registry over the shared world pool.
    pub fn new(pool: Arc<SyncPool>) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            pool,
        }
    }

    /// Returns the store for a component id, if one was ever created.
    pub(crate) fn get(&self, component: ComponentID) -> Option<Arc<ComponentStore>> {
        self.stores.read().get(&component).cloned()
    }

    /// Returns the store for `T`, creating it (allocator over the shared
    /// pool plus destructor thunk) on first touch.
    pub(crate) fn get_or_create<T: Send + Sync + 'static>(&self) -> Arc<ComponentStore> {
        let component = component_id_of::<T>();
        if let Some(store) = self.stores.read().get(&component) {
            return store.clone();
        }
        self.stores
            .write()
            .entry(component)
            .or_insert_with(|| {
                Arc::new(ComponentStore::new(
                    ComponentVtable::new::<T>(),
                    self.pool.clone(),
                ))
            })
            .clone()
    }

    /// Snapshot of every store, for the garbage-collect passes.
    pub(crate) fn all_stores(&self) -> Vec<Arc<ComponentStore>> {
        self.stores.read().values().cloned().collect()
    }

    /// Drops the storage table. Instances must already be drained.
    pub(crate) fn clear(&self) {
        self.stores.write().clear();
    }

    /// Number of component types that currently have storage.
    pub fn store_count(&self) -> usize {
        self.stores.read().len()
    }
}
