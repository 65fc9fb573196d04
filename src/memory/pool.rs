//! # Pooled Allocator
//!
//! Thread-safe recycling allocator for component instances.
//!
//! Components are heterogeneous, so the pool is type-erased: callers allocate
//! and release raw blocks described by a [`Layout`]. Released blocks are kept
//! on a per-layout shelf and handed back on the next allocation of the same
//! layout, so steady-state attach/detach churn performs no system allocation.
//!
//! ## Purpose
//! The world routes every component instance through one shared pool. That
//! gives deferred destruction a uniform `(destructor, pointer, layout)`
//! representation and makes "every allocated instance was destroyed exactly
//! once" observable through [`SyncPool::in_use`].
//!
//! ## Concurrency
//! All methods take `&self`; the shelf map is guarded by a mutex and the
//! outstanding-block counter is atomic. Blocks themselves are raw memory and
//! carry no synchronization.

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;


/// Size/alignment pair identifying a shelf of recyclable blocks.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct BlockClass {
    size: usize,
    align: usize,
}

impl BlockClass {
    #[inline]
    fn of(layout: Layout) -> Self {
        Self { size: layout.size(), align: layout.align() }
    }

    #[inline]
    fn layout(self) -> Layout {
        // The class was built from a valid Layout, so rebuilding cannot fail.
        Layout::from_size_align(self.size, self.align)
            .expect("block class holds a valid layout")
    }
}

/// Thread-safe, layout-keyed recycling allocator.
///
/// ## Invariants
/// - Every address on a shelf was produced by `std::alloc::alloc` with that
///   shelf's layout and is not referenced anywhere else.
/// - `in_use` equals allocations minus deallocations, zero-sized blocks
///   included.
///
/// Blocks still outstanding when the pool drops are the caller's leak; the
/// world returns every component block during shutdown garbage collection.
pub struct SyncPool {
    shelves: Mutex<HashMap<BlockClass, Vec<usize>>>,
    outstanding: AtomicUsize,
}

impl SyncPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            shelves: Mutex::new(HashMap::new()),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Allocates one block of `layout`, reusing a recycled block when one is
    /// shelved.
    ///
    /// Zero-sized layouts yield a well-aligned dangling pointer without
    /// touching the system allocator. Aborts via
    /// [`std::alloc::handle_alloc_error`] if the system allocator fails.
    pub fn allocate(&self, layout: Layout) -> *mut u8 {
        self.outstanding.fetch_add(1, Ordering::Relaxed);

        if layout.size() == 0 {
            return layout.align() as *mut u8;
        }

        if let Some(address) = self
            .shelves
            .lock()
            .get_mut(&BlockClass::of(layout))
            .and_then(Vec::pop)
        {
            return address as *mut u8;
        }

        // SAFETY: `layout` has non-zero size.
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            alloc::handle_alloc_error(layout);
        }
        ptr
    }

    /// Returns a block to the pool for reuse.
    ///
    /// `ptr` must have been obtained from [`allocate`](Self::allocate) on this
    /// pool with the same `layout`, and must not be used afterwards. The block
    /// is shelved, not released; memory returns to the system when the pool
    /// drops.
    pub fn deallocate(&self, ptr: *mut u8, layout: Layout) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);

        if layout.size() == 0 {
            return;
        }

        self.shelves
            .lock()
            .entry(BlockClass::of(layout))
            .or_default()
            .push(ptr as usize);
    }

    /// Number of blocks currently allocated and not yet returned.
    pub fn in_use(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Number of blocks shelved for reuse.
    pub fn recycled(&self) -> usize {
        self.shelves.lock().values().map(Vec::len).sum()
    }
}

impl Default for SyncPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SyncPool {
    fn drop(&mut self) {
        let shelves = self.shelves.get_mut();
        for (class, blocks) in shelves.drain() {
            let layout = class.layout();
            for address in blocks {
                // SAFETY: shelved addresses were produced by alloc::alloc
                // with this layout and are owned exclusively by the shelf.
                unsafe { alloc::dealloc(address as *mut u8, layout) };
            }
        }
    }
}
