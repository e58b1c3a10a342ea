//! The world owns all entities, archetypes and queries.
//!
//! All operations take `&self`.
//! Structural operations (spawning, despawning, adding and removing components)
//! need exclusive access to the archetype storage and fail with [`Error::Reentrancy`]
//! if the storage is being read, e.g. by an [`Entities`](crate::query::Entities) iterator.
//! While the world is locked with [`World::lock`] (which every query runner does),
//! structural operations are deferred instead and replayed when the last lock is released.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};

use crate::comp::{Component, TypeExpression, TypeKey};
use crate::entity::pool::IdentityPool;
use crate::entity::{Entity, Identity, Kind, Match};
use crate::job::JobPool;
use crate::mask::Mask;
use crate::query::{Queries, QueryBuilder, QueryState, Stream};
use crate::{Error, Result};

mod access;
pub(crate) use access::StorageRead;
pub use access::{Ref, RefMut};

mod builder;
pub use builder::Builder;

pub(crate) mod offline;
use offline::{Deferred, Operation};
pub use offline::WorldLock;

pub(crate) mod storage;
use storage::Storage;


/// The data structure that stores all entities and their components.
pub struct World {
    id:                  u64,
    /// Archetypes and entity locations.
    pub(crate) storage:  RwLock<Storage>,
    /// Read by [`Ref`], written by [`RefMut`] and query runners.
    pub(crate) columns:  RwLock<()>,
    /// Live queries and the query cache.
    pub(crate) queries:  Mutex<Queries>,
    /// Recycled job work units.
    pub(crate) jobs:     Mutex<JobPool>,
    /// The lock depth and deferred operations.
    pub(crate) deferred: Mutex<Deferred>,
    identities:          Mutex<IdentityPool>,
    pool:                Option<rayon::ThreadPool>,
    concurrency:         usize,
}

static_assertions::assert_impl_all!(World: Send, Sync);

impl Default for World {
    fn default() -> Self { Self::new() }
}

impl World {
    /// Creates a world with one worker thread per CPU.
    pub fn new() -> Self { Builder::default().build() }

    /// Creates a world without worker threads.
    pub fn unthreaded() -> Self { Builder::new(0).build() }

    /// Creates a world with `concurrency` worker threads.
    pub fn with_concurrency(concurrency: usize) -> Self { Builder::new(concurrency).build() }

    pub(crate) fn from_builder(builder: Builder, pool: Option<rayon::ThreadPool>) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("Creating world #{id} with {} worker threads", builder.concurrency);

        Self {
            id,
            storage: RwLock::new(Storage::new(builder.capacity)),
            columns: RwLock::new(()),
            queries: Mutex::new(Queries::default()),
            jobs: Mutex::new(JobPool::default()),
            identities: Mutex::new(IdentityPool::with_capacity(builder.capacity)),
            deferred: Mutex::new(Deferred::default()),
            pool,
            concurrency: builder.concurrency,
        }
    }

    /// A process-unique number identifying this world.
    pub fn id(&self) -> u64 { self.id }

    /// The number of worker threads.
    pub fn concurrency(&self) -> usize { self.concurrency }

    pub(crate) fn pool(&self) -> Option<&rayon::ThreadPool> { self.pool.as_ref() }

    /// The number of entities stored in the world.
    ///
    /// Entities spawned while the world is locked are not counted until the lock is released.
    pub fn count(&self) -> usize { StorageRead::new(self).entity_count() }

    /// The number of archetypes, including empty ones not yet garbage-collected.
    pub fn archetype_count(&self) -> usize { StorageRead::new(self).archetype_count() }

    /// Whether `identity` refers to a live entity of this world.
    pub fn is_alive(&self, identity: Identity) -> bool { self.identities.lock().is_alive(identity) }

    /// Wraps `identity` into an entity handle of this world without checking liveness.
    pub fn entity(&self, identity: Identity) -> Entity<'_> { Entity::new(self, identity) }

    /// Locks the world, deferring structural changes until the last lock is released.
    pub fn lock(&self) -> WorldLock<'_> { WorldLock::new(self) }

    /// Whether the world is currently locked.
    pub fn is_locked(&self) -> bool { self.deferred.lock().is_locked() }

    /// Spawns an entity without components.
    ///
    /// If the world is locked, the entity is alive immediately
    /// but only stored when the lock is released.
    pub fn spawn(&self) -> Result<Entity<'_>> {
        {
            let mut deferred = self.deferred.lock();
            if deferred.is_locked() {
                let identity = self.identities.lock().allocate();
                deferred.push(Box::new(offline::Spawn(identity)));
                return Ok(Entity::new(self, identity));
            }
        }

        let mut storage = self.storage.try_write().ok_or(Error::Reentrancy("spawn an entity"))?;
        let identity = self.identities.lock().allocate();
        storage.materialize(identity);
        Ok(Entity::new(self, identity))
    }

    /// Despawns an entity.
    ///
    /// Every relation targeting the entity is removed from the entities holding it.
    pub fn despawn(&self, identity: Identity) -> Result<()> {
        self.submit(Box::new(offline::Despawn(vec![identity])), "despawn an entity")
    }

    /// Despawns multiple entities.
    ///
    /// Fails without effect if any of them is not alive.
    /// An entity listed more than once is despawned once.
    pub fn despawn_many(&self, identities: &[Identity]) -> Result<()> {
        let unique: IndexSet<Identity> = identities.iter().copied().collect();
        self.submit(Box::new(offline::Despawn(unique.into_iter().collect())), "despawn entities")
    }

    /// Despawns every entity with a `T` matching `target`, which may be a [`Match`] wildcard.
    pub fn despawn_all_with<T: Component>(&self, target: Identity) -> Result<()> {
        self.submit(
            Box::new(offline::DespawnMatching(TypeExpression::of::<T>(target))),
            "despawn entities",
        )
    }

    /// Adds a plain component to an entity.
    pub fn add<T: Component>(&self, identity: Identity, value: T) -> Result<()> {
        self.add_component(identity, Match::PLAIN, value)
    }

    /// Adds a relation to `target`, which must be a live entity or a type reference.
    pub fn add_relation<T: Component>(
        &self,
        identity: Identity,
        target: Identity,
        value: T,
    ) -> Result<()> {
        Self::check_relation_target(target)?;
        self.add_component(identity, target, value)
    }

    /// Adds an object link to `link`, storing `link` as the component value.
    pub fn add_link<L: Component + Hash>(&self, identity: Identity, link: L) -> Result<()> {
        self.add_component(identity, Identity::of_object(&link), link)
    }

    /// Adds a component with an arbitrary non-wildcard target.
    pub fn add_component<T: Component>(
        &self,
        identity: Identity,
        target: Identity,
        value: T,
    ) -> Result<()> {
        match target.kind() {
            Kind::Wildcard => {
                return Err(Error::InvalidArgument(format!(
                    "wildcard {target} cannot be the target of a component"
                )))
            }
            Kind::Entity if !self.is_alive(target) => return Err(Error::Dead(target)),
            _ => {}
        }

        let expr = TypeExpression::of::<T>(target);
        let operation = offline::Add { identity, expr, value: Box::new(value) };
        self.submit(Box::new(operation), "add a component")
    }

    /// Removes a plain component from an entity.
    pub fn remove<T: Component>(&self, identity: Identity) -> Result<()> {
        self.remove_component::<T>(identity, Match::PLAIN)
    }

    /// Removes the relation to `target`.
    pub fn remove_relation<T: Component>(
        &self,
        identity: Identity,
        target: Identity,
    ) -> Result<()> {
        Self::check_relation_target(target)?;
        self.remove_component::<T>(identity, target)
    }

    /// Removes the object link to `link`.
    pub fn remove_link<L: Component + Hash>(&self, identity: Identity, link: &L) -> Result<()> {
        self.remove_component::<L>(identity, Identity::of_object(link))
    }

    /// Removes a component with an arbitrary non-wildcard target.
    pub fn remove_component<T: Component>(
        &self,
        identity: Identity,
        target: Identity,
    ) -> Result<()> {
        if target.is_wildcard() {
            return Err(Error::InvalidArgument(format!(
                "wildcard {target} cannot be the target of a component"
            )));
        }

        let expr = TypeExpression::of::<T>(target);
        self.submit(Box::new(offline::Remove { identity, expr }), "remove a component")
    }

    fn check_relation_target(target: Identity) -> Result<()> {
        match target.kind() {
            Kind::Entity | Kind::Type => Ok(()),
            _ => Err(Error::InvalidArgument(format!(
                "{target} is not an entity or a type reference"
            ))),
        }
    }

    /// Whether the entity has a `T` matching `target`, which may be a [`Match`] wildcard.
    ///
    /// Changes deferred by a lock are not visible yet.
    pub fn has_component<T: Component>(&self, identity: Identity, target: Identity) -> bool {
        StorageRead::new(self).has_component(identity, TypeExpression::of::<T>(target))
    }

    /// Borrows the first `T` of an entity matching `target`.
    ///
    /// Fails with [`Error::Dead`] if the entity is not alive
    /// and with [`Error::NotFound`] if it has no matching component.
    pub fn get<T: Component>(&self, identity: Identity, target: Identity) -> Result<Ref<'_, T>> {
        Ref::new(self, identity, target)
    }

    /// Borrows the first `T` of an entity matching `target` mutably.
    pub fn get_mut<T: Component>(
        &self,
        identity: Identity,
        target: Identity,
    ) -> Result<RefMut<'_, T>> {
        RefMut::new(self, identity, target)
    }

    /// Releases all archetypes without entities.
    ///
    /// Returns the number of released archetypes.
    /// Fails with [`Error::Locked`] while the world is locked.
    pub fn gc(&self) -> Result<usize> {
        if self.is_locked() {
            return Err(Error::Locked("collect garbage"));
        }

        let mut storage = self.storage.try_write().ok_or(Error::Reentrancy("collect garbage"))?;
        let mut queries = self.queries.lock();
        Ok(storage.gc(&mut queries))
    }

    /// Inserts every distinct relation or link target of stored `T` components into `targets`.
    pub fn collect_targets<T: Component>(&self, targets: &mut IndexSet<Identity>) {
        StorageRead::new(self).collect_targets(TypeKey::of::<T>(), targets);
    }

    /// Starts building a query over the stream types `S`, matching any target.
    pub fn query<S: Stream>(&self) -> QueryBuilder<'_, S> {
        let targets = vec![Match::ANY; S::type_keys().len()];
        QueryBuilder::new(self, &targets).expect("targets have the stream arity")
    }

    /// Starts building a query over the stream types `S` with explicit stream targets.
    pub fn query_with<S: Stream>(&self, targets: &[Identity]) -> Result<QueryBuilder<'_, S>> {
        QueryBuilder::new(self, targets)
    }

    pub(crate) fn compile(
        &self,
        mask: Mask,
        streams: Box<[TypeExpression]>,
        cached: bool,
    ) -> Arc<QueryState> {
        let storage = StorageRead::new(self);
        let mut queries = self.queries.lock();
        queries.compile(&storage, mask, streams, cached)
    }

    /// Replays postponed operations if the world is not locked.
    pub(crate) fn flush(&self) {
        let operations = self.deferred.lock().take_ready();
        if let Some(operations) = operations {
            self.replay(operations);
        }
    }

    /// Applies `operation` now, or queues it if the world is locked.
    ///
    /// Operations still waiting for a postponed replay are applied first.
    fn submit(&self, operation: Box<dyn Operation>, action: &'static str) -> Result<()> {
        let postponed = {
            let mut deferred = self.deferred.lock();
            if deferred.is_locked() {
                operation.validate(&self.identities.lock())?;
                deferred.push(operation);
                return Ok(());
            }
            deferred.take_ready()
        };

        let Some(mut storage) = self.storage.try_write() else {
            if let Some(postponed) = postponed {
                self.deferred.lock().requeue(postponed);
            }
            return Err(Error::Reentrancy(action));
        };
        let mut queries = self.queries.lock();
        let mut identities = self.identities.lock();
        if let Some(postponed) = postponed {
            self.apply_deferred(postponed, &mut storage, &mut queries, &mut identities);
        }
        operation.validate(&identities)?;
        operation.run(&mut storage, &mut queries, &mut identities)
    }

    /// Applies the operations deferred while the world was locked.
    ///
    /// If the storage is still borrowed, e.g. by an [`Entities`](crate::query::Entities)
    /// iterator that outlived the lock, the operations are queued again
    /// and applied when the borrow is released.
    pub(crate) fn replay(&self, operations: Vec<Box<dyn Operation>>) {
        let mut storage = match self.storage.try_write() {
            Some(storage) => storage,
            None => {
                log::debug!(
                    "Postponed {} deferred operations because world #{} is still borrowed",
                    operations.len(),
                    self.id
                );
                self.deferred.lock().requeue(operations);
                return;
            }
        };
        let mut queries = self.queries.lock();
        let mut identities = self.identities.lock();
        self.apply_deferred(operations, &mut storage, &mut queries, &mut identities);
    }

    fn apply_deferred(
        &self,
        operations: Vec<Box<dyn Operation>>,
        storage: &mut Storage,
        queries: &mut Queries,
        identities: &mut IdentityPool,
    ) {
        log::debug!("Replaying {} deferred operations on world #{}", operations.len(), self.id);
        for operation in operations {
            if let Err(err) = operation.run(storage, queries, identities) {
                log::warn!("Skipped a deferred operation: {err}");
            }
        }
    }
}
