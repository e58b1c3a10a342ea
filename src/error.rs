//! Errors surfaced by the world, masks and queries.

use crate::comp::TypeExpression;
use crate::entity::Identity;
use crate::mask::MaskSet;

/// Result alias used throughout tabec.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error returned synchronously to the direct caller.
///
/// None of these are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A structural mutation or an exclusive borrow was requested
    /// while the world storage is being read without a [`WorldLock`](crate::world::WorldLock).
    ///
    /// Acquire a lock (or use a query runner, which locks automatically)
    /// so that the change is deferred instead.
    #[error("cannot {0} while the world is being iterated; lock the world to defer the change")]
    Reentrancy(&'static str),

    /// The operation is not allowed while the world is locked.
    #[error("cannot {0} while the world is locked")]
    Locked(&'static str),

    /// A type expression was added to a mask set while it is already present in another set.
    #[error("{expr} cannot be added to the {added} set, it is already in the {existing} set")]
    Conflict {
        /// The rejected type expression.
        expr:     TypeExpression,
        /// The set the expression was being added to.
        added:    MaskSet,
        /// The set that already contains the expression.
        existing: MaskSet,
    },

    /// The identity does not refer to a live entity.
    #[error("{0} is not alive")]
    Dead(Identity),

    /// The entity is alive but does not have the requested component.
    #[error("{identity} does not have {expr}")]
    NotFound {
        /// The queried entity.
        identity: Identity,
        /// The requested type expression.
        expr:     TypeExpression,
    },

    /// The entity already has a component with the same type expression.
    #[error("{identity} already has {expr}")]
    AlreadyPresent {
        /// The entity receiving the component.
        identity: Identity,
        /// The duplicated type expression.
        expr:     TypeExpression,
    },

    /// An argument is not acceptable for the operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
