//! Structural operations deferred while the world is locked.
//!
//! While at least one [`WorldLock`] is alive,
//! spawning, despawning, adding and removing components are queued instead of applied.
//! When the last lock is released, the queue is replayed in submission order.

use std::fmt;

use super::storage::Storage;
use super::World;
use crate::archetype::ErasedValue;
use crate::comp::TypeExpression;
use crate::entity::pool::IdentityPool;
use crate::entity::Identity;
use crate::query::Queries;
use crate::{Error, Result};

/// A structural operation on the world.
pub(crate) trait Operation: fmt::Display + Send {
    /// Checks that the operation is applicable at the time it is requested.
    fn validate(&self, identities: &IdentityPool) -> Result<()>;

    /// Applies the operation.
    fn run(
        self: Box<Self>,
        storage: &mut Storage,
        queries: &mut Queries,
        identities: &mut IdentityPool,
    ) -> Result<()>;
}

fn ensure_alive(identities: &IdentityPool, identity: Identity) -> Result<()> {
    if identities.is_alive(identity) {
        Ok(())
    } else {
        Err(Error::Dead(identity))
    }
}

/// Stores an entity whose identity was allocated while the world was locked.
pub(crate) struct Spawn(pub(crate) Identity);

impl Operation for Spawn {
    fn validate(&self, identities: &IdentityPool) -> Result<()> { ensure_alive(identities, self.0) }

    fn run(
        self: Box<Self>,
        storage: &mut Storage,
        _queries: &mut Queries,
        identities: &mut IdentityPool,
    ) -> Result<()> {
        ensure_alive(identities, self.0)?;
        storage.materialize(self.0);
        Ok(())
    }
}

impl fmt::Display for Spawn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "spawn {}", self.0) }
}

/// Despawns entities.
pub(crate) struct Despawn(pub(crate) Vec<Identity>);

impl Operation for Despawn {
    fn validate(&self, identities: &IdentityPool) -> Result<()> {
        self.0.iter().try_for_each(|&identity| ensure_alive(identities, identity))
    }

    fn run(
        self: Box<Self>,
        storage: &mut Storage,
        queries: &mut Queries,
        identities: &mut IdentityPool,
    ) -> Result<()> {
        let mut result = Ok(());
        for identity in self.0 {
            match ensure_alive(identities, identity) {
                Ok(()) => storage.despawn(identity, queries, identities),
                Err(err) => result = result.and(Err(err)),
            }
        }
        result
    }
}

impl fmt::Display for Despawn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "despawn {:?}", self.0)
    }
}

/// Despawns every entity with a component matching the pattern.
pub(crate) struct DespawnMatching(pub(crate) TypeExpression);

impl Operation for DespawnMatching {
    fn validate(&self, _: &IdentityPool) -> Result<()> { Ok(()) }

    fn run(
        self: Box<Self>,
        storage: &mut Storage,
        queries: &mut Queries,
        identities: &mut IdentityPool,
    ) -> Result<()> {
        let count = storage.despawn_matching(self.0, queries, identities);
        log::debug!("Despawned {count} entities matching {}", self.0);
        Ok(())
    }
}

impl fmt::Display for DespawnMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "despawn all with {}", self.0)
    }
}

/// Adds a component.
pub(crate) struct Add {
    pub(crate) identity: Identity,
    pub(crate) expr:     TypeExpression,
    pub(crate) value:    Box<dyn ErasedValue>,
}

impl Operation for Add {
    fn validate(&self, identities: &IdentityPool) -> Result<()> {
        ensure_alive(identities, self.identity)?;
        if self.expr.target().is_entity() {
            ensure_alive(identities, self.expr.target())?;
        }
        Ok(())
    }

    fn run(
        self: Box<Self>,
        storage: &mut Storage,
        queries: &mut Queries,
        identities: &mut IdentityPool,
    ) -> Result<()> {
        // the target may have been despawned since the request
        self.validate(identities)?;
        let Add { identity, expr, value } = *self;
        storage.add(identity, expr, value, queries)
    }
}

impl fmt::Display for Add {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "add {} to {}", self.expr, self.identity)
    }
}

/// Removes a component.
pub(crate) struct Remove {
    pub(crate) identity: Identity,
    pub(crate) expr:     TypeExpression,
}

impl Operation for Remove {
    fn validate(&self, identities: &IdentityPool) -> Result<()> {
        ensure_alive(identities, self.identity)
    }

    fn run(
        self: Box<Self>,
        storage: &mut Storage,
        queries: &mut Queries,
        identities: &mut IdentityPool,
    ) -> Result<()> {
        self.validate(identities)?;
        storage.remove(self.identity, self.expr, queries)
    }
}

impl fmt::Display for Remove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remove {} from {}", self.expr, self.identity)
    }
}

/// The lock depth and the queue of deferred operations.
#[derive(Default)]
pub(crate) struct Deferred {
    depth: usize,
    queue: Vec<Box<dyn Operation>>,
}

impl Deferred {
    pub(crate) fn is_locked(&self) -> bool { self.depth > 0 }

    pub(crate) fn enter(&mut self) { self.depth += 1; }

    /// Decrements the depth, returning the queued operations if this released the last lock.
    pub(crate) fn leave(&mut self) -> Option<Vec<Box<dyn Operation>>> {
        self.depth =
            self.depth.checked_sub(1).expect("world lock released more times than acquired");
        self.take_ready()
    }

    pub(crate) fn push(&mut self, operation: Box<dyn Operation>) {
        log::trace!("Deferred {operation}");
        self.queue.push(operation);
    }

    /// Puts back operations whose replay was postponed, ahead of anything queued since.
    pub(crate) fn requeue(&mut self, operations: Vec<Box<dyn Operation>>) {
        self.queue.splice(0..0, operations);
    }

    /// Takes the queued operations if the world is not locked.
    pub(crate) fn take_ready(&mut self) -> Option<Vec<Box<dyn Operation>>> {
        (self.depth == 0 && !self.queue.is_empty()).then(|| std::mem::take(&mut self.queue))
    }
}

/// A scoped lock that defers structural changes to the world.
///
/// Locks are reentrant and counted.
/// Dropping the last lock replays the deferred operations in submission order.
/// Operations that have become invalid in the meantime
/// (e.g. adding a component to an entity that has been despawned by an earlier operation)
/// are skipped with a warning.
///
/// If the world storage is still borrowed when the last lock drops,
/// e.g. by an [`Entities`](crate::query::Entities) iterator outliving the lock,
/// the operations are applied when that borrow is released.
#[must_use = "the world is unlocked as soon as the lock is dropped"]
pub struct WorldLock<'w> {
    world: &'w World,
}

impl<'w> WorldLock<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        world.deferred.lock().enter();
        Self { world }
    }

    /// The locked world.
    pub fn world(&self) -> &'w World { self.world }
}

impl<'w> Drop for WorldLock<'w> {
    fn drop(&mut self) {
        let operations = self.world.deferred.lock().leave();
        if let Some(operations) = operations {
            self.world.replay(operations);
        }
    }
}
