//! # World
//!
//! The top-level ECS container. The world owns the entity registry, the
//! typed component storage, the singleton resources, the deferred-work
//! queues, and the three priority-ordered system lists, and it drives the
//! scheduler once per phase.
//!
//! ## Control flow per tick
//! `update(dt)` hands a `(command, queryer)` facade pair to every registered
//! update system through the scheduler, then runs the garbage-collect pass
//! that drains the deferred queues — gated by the [`GarbageCollect`]
//! resource, which `startup()` installs at `false`.
//!
//! ## Deferred destruction
//! Systems never destroy storage in place: `detach` queues a
//! `(destructor, pointer, layout)` triple and `kill` queues the handle, so
//! iterators held by concurrently running systems stay valid for the whole
//! tick. The queues are multi-producer (any system on any worker) and
//! single-consumer (the collect pass after the last bucket).
//!
//! ## Lifetime
//! `shutdown()` runs the shutdown systems and then destroys every remaining
//! component instance and resource. Dropping a world that was never shut
//! down performs the shutdown first.

use std::alloc::Layout;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::command::Command;
use crate::engine::component::{component_id_of, DropFn};
use crate::engine::entity::EntityRegistry;
use crate::engine::query::Queryer;
use crate::engine::resource::{GarbageCollect, ResourceRegistry};
use crate::engine::scheduler::Scheduler;
use crate::engine::storage::StorageRegistry;
use crate::engine::types::{Entity, IndexID, PhaseSystem, Priority, UpdateSystem};
use crate::memory::pool::SyncPool;


/// A component detached during the tick, awaiting destruction at the next
/// garbage collect.
pub(crate) struct PendingComponent {
    pub(crate) drop_fn: DropFn,
    pub(crate) ptr: *mut u8,
    pub(crate) layout: Layout,
}

// SAFETY: the pointer references a pool block that the queue owns
// exclusively once the map entry is removed; the instance behind it is
// Send + Sync by the attach-site bounds.
unsafe impl Send for PendingComponent {}

/// The ECS world: registries, deferred queues, and system lists.
pub struct World {
    pub(crate) entities: EntityRegistry,
    pub(crate) components: StorageRegistry,
    pub(crate) resources: ResourceRegistry,
    pub(crate) pending_destroy: Mutex<Vec<Entity>>,
    pub(crate) pending_components: Mutex<Vec<PendingComponent>>,

    startup_systems: BTreeMap<Priority, Vec<PhaseSystem>>,
    update_systems: BTreeMap<Priority, Vec<UpdateSystem>>,
    shutdown_systems: BTreeMap<Priority, Vec<PhaseSystem>>,

    scheduler: Scheduler,
    shutdown_done: AtomicBool,

    // Shared with the storage registry; every component block returns here.
    pool: Arc<SyncPool>,
}

impl World {
    /// Creates an empty world with its own pool and worker threads.
    pub fn new() -> Self {
        let pool = Arc::new(SyncPool::new());
        Self {
            entities: EntityRegistry::new(),
            components: StorageRegistry::new(pool.clone()),
            resources: ResourceRegistry::new(),
            pending_destroy: Mutex::new(Vec::new()),
            pending_components: Mutex::new(Vec::new()),
            startup_systems: BTreeMap::new(),
            update_systems: BTreeMap::new(),
            shutdown_systems: BTreeMap::new(),
            scheduler: Scheduler::new(),
            shutdown_done: AtomicBool::new(false),
            pool,
        }
    }

    /// Registers a startup system. Higher priority starts earlier.
    pub fn add_startup(&mut self, system: PhaseSystem, priority: Priority) {
        self.startup_systems.entry(priority).or_default().push(system);
    }

    /// Registers an update system. Higher priority runs earlier each tick.
    pub fn add_update(&mut self, system: UpdateSystem, priority: Priority) {
        self.update_systems.entry(priority).or_default().push(system);
    }

    /// Registers a shutdown system. Higher priority shuts down earlier.
    pub fn add_shutdown(&mut self, system: PhaseSystem, priority: Priority) {
        self.shutdown_systems.entry(priority).or_default().push(system);
    }

    /// Runs the startup systems, then installs the [`GarbageCollect`] gate
    /// at `false` unless a startup system already added it.
    pub fn startup(&self) {
        self.scheduler.run_phase(self, &self.startup_systems, "startup");
        self.resources.add_default::<GarbageCollect>();
    }

    /// Runs one tick: every update system in priority order, then the gated
    /// garbage collect.
    pub fn update(&self, delta_time: f32) {
        self.scheduler.run_update(self, &self.update_systems, delta_time);
    }

    /// Runs the shutdown systems and destroys all remaining state. A second
    /// call is a no-op; dropping the world calls this if the host never did.
    pub fn shutdown(&self) {
        if self.shutdown_done.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scheduler.run_shutdown(self, &self.shutdown_systems);
    }

    /// Returns the read facade.
    pub fn query(&self) -> Queryer<'_> {
        Queryer::new(self)
    }

    /// Returns the write facade.
    pub fn command(&self) -> Command<'_> {
        Command::new(self)
    }

    /// Number of living entities.
    pub fn live_entity_count(&self) -> u32 {
        self.entities.live_count()
    }

    /// The shared component pool. Exposed for diagnostics: after
    /// [`shutdown`](Self::shutdown), `pool().in_use()` is zero.
    pub fn pool(&self) -> &SyncPool {
        &self.pool
    }

    /// `true` if the entity at `index` has an entry in `T`'s storage.
    /// Liveness is not checked here; callers filter on the living set.
    pub(crate) fn has_component_at<T: Send + Sync + 'static>(&self, index: IndexID) -> bool {
        self.components
            .get(component_id_of::<T>())
            .is_some_and(|store| store.contains(index))
    }

    /// End-of-update hook: consult the [`GarbageCollect`] gate, drain when
    /// enabled, and reset the gate. Reinstalls the gate if a system removed
    /// it.
    pub(crate) fn collect_if_enabled(&self) {
        match self.resources.find::<GarbageCollect>() {
            None => self.resources.add_default::<GarbageCollect>(),
            Some(gate) if gate.enabled => {
                self.gc_tick();
                self.resources.set(GarbageCollect { enabled: false });
            }
            Some(_) => {}
        }
    }

    /// Drains the deferred queues: detached components first, then pending
    /// entity kills.
    ///
    /// Runs single-threaded after the last update bucket, so every write a
    /// system issued through a command this tick is visible here.
    pub(crate) fn gc_tick(&self) {
        let pending = std::mem::take(&mut *self.pending_components.lock());
        let component_count = pending.len();
        for entry in pending {
            // SAFETY: the queue owns the pointer; it references a constructed
            // instance allocated from the world pool with `entry.layout`.
            unsafe { (entry.drop_fn)(entry.ptr) };
            self.pool.deallocate(entry.ptr, entry.layout);
        }

        let kills = std::mem::take(&mut *self.pending_destroy.lock());
        let stores = self.components.all_stores();
        let mut reaped = 0usize;
        for entity in kills {
            // Generation guard: duplicate kills within a tick and kills of
            // unknown handles drop out here.
            if !self.entities.is_current(entity) {
                continue;
            }
            for store in &stores {
                store.reap(entity.index());
            }
            self.entities.destroy(entity);
            reaped += 1;
        }

        tracing::debug!(components = component_count, entities = reaped, "garbage collect drained");
    }

    /// Final drain: pending component destructors, then every remaining live
    /// instance in every store, then all resources.
    pub(crate) fn gc_shutdown(&self) {
        let pending = std::mem::take(&mut *self.pending_components.lock());
        for entry in pending {
            // SAFETY: as in `gc_tick`.
            unsafe { (entry.drop_fn)(entry.ptr) };
            self.pool.deallocate(entry.ptr, entry.layout);
        }

        let stores = self.components.all_stores();
        for store in &stores {
            store.drain_all();
        }
        self.components.clear();
        self.resources.clear();
        self.pending_destroy.lock().clear();
        self.entities.clear_living();

        tracing::debug!(stores = stores.len(), "shutdown garbage collect complete");
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("live_entities", &self.entities.live_count())
            .field("component_stores", &self.components.store_count())
            .field("resources", &self.resources.len())
            .finish()
    }
}
