//! # System Scheduling and Execution
//!
//! This module drives the registered systems of one phase over the world.
//!
//! ## Scheduling model
//!
//! Systems are grouped into **buckets** by registration priority and executed
//! bucket-by-bucket in descending priority order:
//!
//! * systems within a bucket are dispatched concurrently onto the worker
//!   pool,
//! * the scheduler waits for the whole bucket before advancing, so every
//!   side effect of a higher-priority system happens-before every read of a
//!   lower-priority one,
//! * the two reserved priorities [`EARLY_MAIN_THREAD`] and
//!   [`LATE_MAIN_THREAD`] run their bucket sequentially on the calling
//!   thread in registration order.
//!
//! Within a bucket there is no ordering: systems that touch overlapping
//! component types must be separated by priority or placed in a main-thread
//! bucket.
//!
//! ## Fault isolation
//!
//! Each system invocation is wrapped in `catch_unwind`. A panicking system
//! aborts only its own task: the fault is logged with its phase and
//! priority, the rest of the bucket completes, and later buckets still run.
//! There is no retry.
//!
//! ## Structural synchronization
//!
//! Deferred destruction is drained at phase boundaries, after the last
//! bucket: the update phase consults the [`GarbageCollect`] gate, the
//! shutdown phase always drains.
//!
//! [`GarbageCollect`]: crate::engine::resource::GarbageCollect

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use crate::engine::types::{
    PhaseSystem, Priority, UpdateSystem, EARLY_MAIN_THREAD, LATE_MAIN_THREAD,
};
use crate::engine::world::World;


/// Executes priority buckets of systems over a world, in parallel where the
/// priority allows it.
pub struct Scheduler {
    workers: rayon::ThreadPool,
}

impl Scheduler {
    /// Creates a scheduler with its own worker pool sized to the machine.
    pub fn new() -> Self {
        let workers = rayon::ThreadPoolBuilder::new()
            .thread_name(|index| format!("ecs-worker-{index}"))
            .build()
            .expect("default worker pool configuration is always buildable");
        Self { workers }
    }

    /// Runs a startup or shutdown system list to completion.
    pub(crate) fn run_phase(
        &self,
        world: &World,
        systems: &BTreeMap<Priority, Vec<PhaseSystem>>,
        phase: &'static str,
    ) {
        self.run_buckets(systems, phase, |system| {
            system(world.command(), world.query());
        });
    }

    /// Runs the update system list, then the gated garbage collect.
    pub(crate) fn run_update(
        &self,
        world: &World,
        systems: &BTreeMap<Priority, Vec<UpdateSystem>>,
        delta_time: f32,
    ) {
        self.run_buckets(systems, "update", |system| {
            system(world.command(), world.query(), delta_time);
        });
        world.collect_if_enabled();
    }

    /// Runs the shutdown system list, then the unconditional final drain.
    pub(crate) fn run_shutdown(
        &self,
        world: &World,
        systems: &BTreeMap<Priority, Vec<PhaseSystem>>,
    ) {
        self.run_phase(world, systems, "shutdown");
        world.gc_shutdown();
    }

    fn run_buckets<F, C>(&self, systems: &BTreeMap<Priority, Vec<F>>, phase: &'static str, call: C)
    where
        F: Sync,
        C: Fn(&F) + Sync,
    {
        for (&priority, bucket) in systems.iter().rev() {
            if bucket.is_empty() {
                continue;
            }
            tracing::trace!(phase, priority, systems = bucket.len(), "dispatching bucket");

            if priority == EARLY_MAIN_THREAD || priority == LATE_MAIN_THREAD {
                // Reserved priorities: sequential, on the calling thread, in
                // registration order.
                for system in bucket {
                    run_guarded(phase, priority, || call(system));
                }
            } else {
                // Scope exit is the bucket barrier: no task of a lower
                // priority starts until every task here has finished.
                self.workers.scope(|scope| {
                    let call = &call;
                    for system in bucket {
                        scope.spawn(move |_| run_guarded(phase, priority, || call(system)));
                    }
                });
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn run_guarded(phase: &'static str, priority: Priority, run: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(run)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        tracing::error!(
            phase,
            priority,
            error = %message,
            "system panicked; remaining systems continue"
        );
    }
}
