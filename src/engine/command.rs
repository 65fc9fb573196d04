//! # Command — the write facade
//!
//! All mutation of the world flows through [`Command`], a copyable handle a
//! system receives each phase. Light mutations (spawn, attach, resource ops)
//! apply synchronously; destructive mutations (detach, kill) are deferred to
//! the garbage-collect pass so iterators held by concurrently running
//! systems are never invalidated mid-tick.
//!
//! ## Semantics at a glance
//!
//! | Operation   | Effect                                             | On absent target |
//! |-------------|----------------------------------------------------|------------------|
//! | `attach`    | insert deferred entry, construct on first read     | —                |
//! | `attach_with` | allocate + construct; first-writer-wins          | —                |
//! | `modify`    | assign through existing instance; never allocates  | no-op            |
//! | `detach`    | unlink now, destroy at next collect                | no-op            |
//! | `kill`      | hide from queries now, reap at next collect        | no-op            |
//! | `add`       | install resource if absent                         | —                |
//! | `set`       | assign through existing resource; never creates    | no-op            |
//! | `remove`    | destroy resource                                   | no-op            |

use crate::engine::component::{component_id_of, Bundle, DefaultBundle};
use crate::engine::types::Entity;
use crate::engine::world::{PendingComponent, World};


/// Copyable write facade over a world.
#[derive(Clone, Copy)]
pub struct Command<'w> {
    world: &'w World,
}

impl<'w> Command<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self { world }
    }

    // -- entities ----------------------------------------------------------

    /// Allocates a fresh entity and adds it to the living set.
    pub fn spawn(&self) -> Entity {
        self.world.entities.spawn()
    }

    /// Spawns an entity and default-attaches every component type in `S`.
    ///
    /// Construction is deferred: each component materializes on its first
    /// mutable read.
    pub fn spawn_default<S: DefaultBundle>(&self) -> Entity {
        let entity = self.spawn();
        S::attach_defaults(self, entity);
        entity
    }

    /// Spawns an entity and attaches every value in `bundle`.
    pub fn spawn_with<B: Bundle>(&self, bundle: B) -> Entity {
        let entity = self.spawn();
        bundle.attach_to(self, entity);
        entity
    }

    /// Attaches component `C` without a value.
    ///
    /// The entry stays unconstructed until the first mutable read
    /// materializes it via `C::default()`. A silent no-op when the entity
    /// already has the component.
    pub fn attach<C: Default + Send + Sync + 'static>(&self, entity: Entity) {
        let store = self.world.components.get_or_create::<C>();
        store.ensure_default_ctor::<C>();
        store.insert_deferred(entity.index());
    }

    /// Attaches component `C` with `value`.
    ///
    /// First-writer-wins within a tick: when the entity already has the
    /// component, the existing instance is kept and `value` is dropped.
    pub fn attach_with<C: Send + Sync + 'static>(&self, entity: Entity, value: C) {
        let store = self.world.components.get_or_create::<C>();
        store.insert_value(entity.index(), value);
    }

    /// Attaches every value in `bundle` to an existing entity.
    pub fn attach_bundle<B: Bundle>(&self, entity: Entity, bundle: B) {
        bundle.attach_to(self, entity);
    }

    /// Assigns `value` to the entity's existing `C` instance.
    ///
    /// Never allocates: a missing entry and a still-deferred entry are both
    /// silent no-ops.
    pub fn modify<C: Send + Sync + 'static>(&self, entity: Entity, value: C) {
        if let Some(store) = self.world.components.get(component_id_of::<C>()) {
            store.assign(entity.index(), value);
        }
    }

    /// Unlinks component `C` from the entity and queues its destructor for
    /// the next garbage collect. Idempotent.
    pub fn detach<C: Send + Sync + 'static>(&self, entity: Entity) {
        let Some(store) = self.world.components.get(component_id_of::<C>()) else {
            return;
        };
        if let Some(ptr) = store.take(entity.index()) {
            // A deferred entry was never constructed; there is nothing to
            // destroy.
            if !ptr.is_null() {
                self.world.pending_components.lock().push(PendingComponent {
                    drop_fn: store.drop_fn(),
                    ptr,
                    layout: store.layout(),
                });
            }
        }
    }

    /// Schedules the entity for destruction at the next garbage collect and
    /// removes it from the living set immediately, so queries issued later
    /// this tick no longer see it. Idempotent; unknown handles are tolerated.
    pub fn kill(&self, entity: Entity) {
        self.world.entities.remove_living(entity);
        self.world.pending_destroy.lock().push(entity);
    }

    /// [`kill`](Self::kill) applied to every entity of an iterator.
    pub fn kill_each<I>(&self, entities: I)
    where
        I: IntoIterator<Item = Entity>,
    {
        for entity in entities {
            self.kill(entity);
        }
    }

    // -- resources ---------------------------------------------------------

    /// Installs resource `R::default()` if absent.
    pub fn add<R: Default + Send + Sync + 'static>(&self) {
        self.world.resources.add_default::<R>();
    }

    /// Installs `value` as resource `R` if absent; a silent no-op (dropping
    /// the value) when `R` is already present.
    pub fn add_with<R: Send + Sync + 'static>(&self, value: R) {
        self.world.resources.add(value);
    }

    /// Overwrites the existing resource `R` by assignment. Does not create:
    /// a missing resource makes this a no-op.
    pub fn set<R: Send + Sync + 'static>(&self, value: R) {
        self.world.resources.set(value);
    }

    /// Destroys and erases resource `R`. Idempotent.
    pub fn remove<R: Send + Sync + 'static>(&self) {
        self.world.resources.remove::<R>();
    }
}
