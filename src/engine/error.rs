//! Error types for component and resource access.
//!
//! This module declares the focused error types surfaced by the read facade.
//! Each error carries the offending component's type name so failures are
//! actionable in logs without reproducing the issue.
//!
//! ## Goals
//! * **Specificity:** Each variant models a single failure mode (no storage
//!   registered, no entry for the entity, entry still deferred, …).
//! * **Ergonomics:** Errors implement [`std::error::Error`] and
//!   [`std::fmt::Display`] and flow through `?` as [`EcsResult`].
//! * **Silence where mandated:** Attach on an existing entry, detach/kill/
//!   remove/modify on an absent target, and add of an existing resource are
//!   deliberate no-ops, not errors.
//!
//! ## Typical flow
//! ```ignore
//! fn heal(command: Command, queryer: Queryer, _dt: f32) {
//!     for entity in queryer.query_all_of::<(Health,)>() {
//!         match queryer.get_mut::<Health>(entity) {
//!             Ok(health) => health.points += 1,
//!             Err(error) => tracing::warn!(%entity, %error, "heal skipped"),
//!         }
//!     }
//! }
//! ```

use std::fmt;


/// Result alias used by the fallible access APIs.
pub type EcsResult<T> = Result<T, AccessError>;

/// Returned when a typed access through the read facade cannot be satisfied.
///
/// These are logic violations in the caller: the entity does not carry the
/// requested component, or the component cannot be produced on demand.
/// Absent *resources* are not errors; [`find`] returns `None` instead.
///
/// [`find`]: crate::engine::query::Queryer::find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// No storage has ever been created for the component type, i.e. the
    /// type was never attached to any entity in this world.
    MissingStorage {
        /// Type name of the requested component.
        component: &'static str,
    },

    /// The storage exists, but the entity has no entry for the component.
    MissingComponent {
        /// Type name of the requested component.
        component: &'static str,
    },

    /// The entity's entry is still deferred (attached without a value) and
    /// the access path does not materialize.
    EmptyComponent {
        /// Type name of the requested component.
        component: &'static str,
    },

    /// A deferred entry was found but no default constructor is recorded for
    /// the component type, so it cannot be materialized.
    NotDefaultConstructible {
        /// Type name of the requested component.
        component: &'static str,
    },
}

impl AccessError {
    /// Type name of the component the failed access targeted.
    pub fn component(&self) -> &'static str {
        match self {
            AccessError::MissingStorage { component }
            | AccessError::MissingComponent { component }
            | AccessError::EmptyComponent { component }
            | AccessError::NotDefaultConstructible { component } => component,
        }
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::MissingStorage { component } => {
                write!(f, "no storage registered for component {component}")
            }
            AccessError::MissingComponent { component } => {
                write!(f, "entity has no {component} component")
            }
            AccessError::EmptyComponent { component } => {
                write!(f, "{component} component is attached but not yet constructed")
            }
            AccessError::NotDefaultConstructible { component } => {
                write!(f, "{component} is not default-constructible; attach it with a value")
            }
        }
    }
}

impl std::error::Error for AccessError {}
