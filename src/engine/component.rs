//! # Component Identity and Bundles
//!
//! This module provides the process-wide registry that assigns stable
//! identities to component and resource types, the type-erased vtable used by
//! storage to destroy instances, and the tuple traits that let callers spawn,
//! attach, and query several component types at once.
//!
//! ## Identity
//! Identities are compact integers handed out by a monotonic counter behind a
//! type-keyed lookup. They are stable for the lifetime of the process and
//! collision-free by construction. Component and resource identities live in
//! separate registries, so the same Rust type may serve as both.
//!
//! ## Vtables
//! Storage holds component instances behind raw pointers, so each store
//! records a destructor thunk and the instance layout at creation. A default
//! constructor thunk is recorded separately, the first time a deferred attach
//! proves the type is default-constructible.
//!
//! ## Concurrency
//! The identity registries are guarded by `RwLock`; the fast path is a read
//! lock over an existing entry.

use std::alloc::Layout;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::engine::command::Command;
use crate::engine::types::{ComponentID, Entity, IndexID, ResourceID};
use crate::engine::world::World;


struct IdentityTable {
    ids: HashMap<TypeId, u64>,
    next: u64,
}

impl IdentityTable {
    fn new() -> Self {
        Self { ids: HashMap::new(), next: 0 }
    }

    fn identity(&mut self, type_id: TypeId) -> u64 {
        match self.ids.get(&type_id) {
            Some(&id) => id,
            None => {
                let id = self.next;
                self.next += 1;
                self.ids.insert(type_id, id);
                id
            }
        }
    }
}

static COMPONENT_IDENTITIES: OnceLock<RwLock<IdentityTable>> = OnceLock::new();
static RESOURCE_IDENTITIES: OnceLock<RwLock<IdentityTable>> = OnceLock::new();

fn identity_in(table: &'static OnceLock<RwLock<IdentityTable>>, type_id: TypeId) -> u64 {
    let table = table.get_or_init(|| RwLock::new(IdentityTable::new()));
    if let Some(&id) = table.read().ids.get(&type_id) {
        return id;
    }
    table.write().identity(type_id)
}

/// Returns the stable process-wide identity of component type `T`.
///
/// The first call for a given type registers it; later calls are read-only.
#[inline]
pub fn component_id_of<T: 'static>() -> ComponentID {
    identity_in(&COMPONENT_IDENTITIES, TypeId::of::<T>())
}

/// Returns the stable process-wide identity of resource type `T`.
#[inline]
pub fn resource_id_of<T: 'static>() -> ResourceID {
    identity_in(&RESOURCE_IDENTITIES, TypeId::of::<T>())
}

/// Type-erased destructor thunk: drops a constructed instance in place.
pub(crate) type DropFn = unsafe fn(*mut u8);

/// Type-erased default-constructor thunk: writes `T::default()` to the block.
pub(crate) type DefaultFn = unsafe fn(*mut u8);

unsafe fn drop_erased<T>(ptr: *mut u8) {
    // SAFETY: caller guarantees `ptr` holds a constructed `T`.
    unsafe { ptr.cast::<T>().drop_in_place() }
}

pub(crate) unsafe fn default_construct<T: Default>(ptr: *mut u8) {
    // SAFETY: caller guarantees `ptr` is an uninitialized block of `T`'s layout.
    unsafe { ptr.cast::<T>().write(T::default()) }
}

/// Layout and destructor of a component type, installed on its storage block
/// at first use.
#[derive(Clone, Copy)]
pub(crate) struct ComponentVtable {
    pub(crate) layout: Layout,
    pub(crate) drop_fn: DropFn,
}

impl ComponentVtable {
    pub(crate) fn new<T: 'static>() -> Self {
        Self {
            layout: Layout::new::<T>(),
            drop_fn: drop_erased::<T>,
        }
    }
}

/// A set of component values attached together, typically at spawn.
///
/// Implemented for tuples of up to eight components. Attachment is
/// first-writer-wins per component, like [`attach_with`].
///
/// [`attach_with`]: crate::engine::command::Command::attach_with
pub trait Bundle {
    /// Attaches every value in the bundle to `entity`.
    fn attach_to(self, command: &Command<'_>, entity: Entity);
}

/// A set of default-constructible component types attached together without
/// values; construction is deferred until the first mutable read.
///
/// Implemented for tuples of up to eight components.
pub trait DefaultBundle {
    /// Default-attaches every type in the set to `entity`.
    fn attach_defaults(command: &Command<'_>, entity: Entity);
}

/// A set of component types used as a query predicate.
///
/// Implemented for tuples of up to eight components. The empty tuple matches
/// every entity under the conjunction and no entity under the disjunction,
/// so `query_all_of::<()>()` enumerates the whole living set.
pub trait ComponentSet {
    /// `true` if the entity at `index` carries every component in the set.
    fn matches_all(world: &World, index: IndexID) -> bool;

    /// `true` if the entity at `index` carries at least one component in the
    /// set.
    fn matches_any(world: &World, index: IndexID) -> bool;
}

macro_rules! impl_component_tuple {
    ($($component:ident),*) => {
        impl<$($component: Send + Sync + 'static),*> ComponentSet for ($($component,)*) {
            #[allow(unused_variables)]
            fn matches_all(world: &World, index: IndexID) -> bool {
                true $(&& world.has_component_at::<$component>(index))*
            }

            #[allow(unused_variables)]
            fn matches_any(world: &World, index: IndexID) -> bool {
                false $(|| world.has_component_at::<$component>(index))*
            }
        }

        impl<$($component: Send + Sync + 'static),*> Bundle for ($($component,)*) {
            #[allow(non_snake_case, unused_variables)]
            fn attach_to(self, command: &Command<'_>, entity: Entity) {
                let ($($component,)*) = self;
                $(command.attach_with(entity, $component);)*
            }
        }

        impl<$($component: Send + Sync + 'static + Default),*> DefaultBundle for ($($component,)*) {
            #[allow(unused_variables)]
            fn attach_defaults(command: &Command<'_>, entity: Entity) {
                $(command.attach::<$component>(entity);)*
            }
        }
    };
}

impl_component_tuple!();
impl_component_tuple!(A);
impl_component_tuple!(A, B);
impl_component_tuple!(A, B, C);
impl_component_tuple!(A, B, C, D);
impl_component_tuple!(A, B, C, D, E);
impl_component_tuple!(A, B, C, D, E, F);
impl_component_tuple!(A, B, C, D, E, F, G);
impl_component_tuple!(A, B, C, D, E, F, G, H);
