//! Compiled queries over the archetypes of a world.
//!
//! A query is compiled from a [`Mask`] and a tuple of stream types.
//! It tracks the archetypes matching its mask,
//! including archetypes created after compilation,
//! and hands the stream columns of each tracked archetype to its runners.
//!
//! Runners come in three flavours:
//! - `for_each*` visit every row on the calling thread,
//! - `raw*` hand out one slice per stream column per archetype,
//! - `job*` split the rows into chunks executed on the world's worker threads.
//!
//! Every runner locks the world, so structural changes requested from inside a runner
//! are deferred until it returns.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::{fmt, ptr, vec};

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::archetype::Archetype;
use crate::comp::{Component, TypeExpression};
use crate::entity::{Entity, Identity};
use crate::job::{self, Countdown};
use crate::mask::Mask;
use crate::world::storage::{ArchetypeId, Storage};
use crate::world::{StorageRead, World, WorldLock};
use crate::{Error, Result};

mod builder;
pub use builder::QueryBuilder;

mod join;

mod runner;

mod stream;
pub use stream::Stream;


/// Cached queries are shared between compilations with equal masks and stream expressions.
pub(crate) type CacheKey = (Mask, Box<[TypeExpression]>);

pub(crate) struct QueryState {
    mask:     Mask,
    streams:  Box<[TypeExpression]>,
    /// Archetypes matching `mask`, in creation order.
    tracked:  RwLock<Vec<ArchetypeId>>,
    /// Additional constraints applied at iteration time.
    filters:  RwLock<Mask>,
    cached:   bool,
    disposed: AtomicBool,
}

impl QueryState {
    fn key(&self) -> CacheKey { (self.mask.clone(), self.streams.clone()) }
}

/// The live queries of a world and the query cache.
#[derive(Default)]
pub(crate) struct Queries {
    live:  Vec<Weak<QueryState>>,
    cache: HashMap<CacheKey, Arc<QueryState>>,
}

impl Queries {
    /// Offers a newly created archetype to every live query.
    pub(crate) fn track_created(&mut self, id: ArchetypeId, archetype: &Archetype) {
        self.live.retain(|weak| weak.strong_count() > 0);

        for state in self.live.iter().filter_map(Weak::upgrade) {
            if !state.disposed.load(Ordering::Acquire) && state.mask.matches(archetype) {
                state.tracked.write().push(id);
            }
        }
    }

    /// Removes a garbage-collected archetype from every live query.
    pub(crate) fn forget_archetype(&mut self, id: ArchetypeId) {
        for state in self.live.iter().filter_map(Weak::upgrade) {
            state.tracked.write().retain(|&other| other != id);
        }
    }

    pub(crate) fn compile(
        &mut self,
        storage: &Storage,
        mask: Mask,
        streams: Box<[TypeExpression]>,
        cached: bool,
    ) -> Arc<QueryState> {
        let key = (mask, streams);
        if cached {
            if let Some(state) = self.cache.get(&key) {
                return Arc::clone(state);
            }
        }

        let (mask, streams) = key;
        let tracked = storage.matching(&mask);
        log::debug!(
            "Compiled {} query over {streams:?} matching {} archetypes",
            if cached { "cached" } else { "unique" },
            tracked.len()
        );

        let state = Arc::new(QueryState {
            mask,
            streams,
            tracked: RwLock::new(tracked),
            filters: RwLock::new(Mask::new()),
            cached,
            disposed: AtomicBool::new(false),
        });
        self.live.push(Arc::downgrade(&state));
        if cached {
            self.cache.insert(state.key(), Arc::clone(&state));
        }
        state
    }

    pub(crate) fn dispose(&mut self, state: &Arc<QueryState>) {
        if state.cached {
            let key = state.key();
            if self.cache.get(&key).map_or(false, |cached| Arc::ptr_eq(cached, state)) {
                self.cache.remove(&key);
            }
        }

        state.disposed.store(true, Ordering::Release);
        state.tracked.write().clear();
        self.live.retain(|weak| !ptr::eq(weak.as_ptr(), Arc::as_ptr(state)));
    }

    #[cfg(test)]
    pub(crate) fn cache_len(&self) -> usize { self.cache.len() }
}

/// A compiled query yielding the stream types `S`.
///
/// Cloning a query yields another handle to the same compiled state.
pub struct Query<'w, S: Stream> {
    world: &'w World,
    state: Arc<QueryState>,
    _ph:   PhantomData<fn() -> S>,
}

impl<'w, S: Stream> Clone for Query<'w, S> {
    fn clone(&self) -> Self {
        Self { world: self.world, state: Arc::clone(&self.state), _ph: PhantomData }
    }
}

impl<'w, S: Stream> fmt::Debug for Query<'w, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("mask", &self.state.mask)
            .field("streams", &self.state.streams)
            .field("cached", &self.state.cached)
            .finish()
    }
}

/// Guards held while a runner accesses component data.
struct Borrow<'w> {
    // dropped in declaration order: columns, then storage, then the world lock
    _columns: RwLockWriteGuard<'w, ()>,
    storage:  StorageRead<'w>,
    _lock:    WorldLock<'w>,
}

impl<'w, S: Stream> Query<'w, S> {
    pub(crate) fn new(world: &'w World, state: Arc<QueryState>) -> Self {
        Self { world, state, _ph: PhantomData }
    }

    /// The world this query runs on.
    pub fn world(&self) -> &'w World { self.world }

    /// The mask the query was compiled from.
    pub fn mask(&self) -> &Mask { &self.state.mask }

    /// The stream expressions, one per stream type.
    pub fn streams(&self) -> &[TypeExpression] { &self.state.streams }

    /// Whether the query is shared through the world's query cache.
    pub fn is_cached(&self) -> bool { self.state.cached }

    /// Whether both handles refer to the same compiled query.
    pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.state, &other.state) }

    /// The number of tracked archetypes, including empty ones not yet garbage-collected.
    pub fn archetype_count(&self) -> usize { self.state.tracked.read().len() }

    /// The tracked archetypes that also satisfy the filters.
    fn matched(&self, storage: &Storage) -> Vec<ArchetypeId> {
        let filters = self.state.filters.read();
        self.state
            .tracked
            .read()
            .iter()
            .copied()
            .filter(|&id| filters.matches(storage.archetype(id)))
            .collect()
    }

    /// The number of entities matched by the query.
    ///
    /// Entities holding several columns matching a wildcard stream are counted once.
    pub fn count(&self) -> usize {
        let storage = StorageRead::new(self.world);
        self.matched(&storage).into_iter().map(|id| storage.archetype(id).len()).sum()
    }

    /// Whether the query matches no entities.
    pub fn is_empty(&self) -> bool { self.count() == 0 }

    /// Whether `identity` is stored in a matched archetype.
    pub fn contains(&self, identity: Identity) -> bool {
        let storage = StorageRead::new(self.world);
        match storage.location(identity) {
            Some(location) => self.matched(&storage).contains(&location.archetype),
            None => false,
        }
    }

    /// Iterates over the matched entities.
    ///
    /// The iterator holds a read borrow of the world storage,
    /// so structural changes fail with [`Error::Reentrancy`] until it is dropped.
    /// Changes requested under a [`WorldLock`] are queued as usual;
    /// if the last lock is released before the iterator, they are applied when it is dropped.
    pub fn iter(&self) -> Entities<'w> {
        let storage = StorageRead::new(self.world);
        let archetypes = self.matched(&storage).into_iter();
        Entities { world: self.world, storage, archetypes, current: None, row: 0 }
    }

    /// Restricts iteration to entities with a `T` matching `target`.
    pub fn subset<T: Component>(&self, target: Identity) -> Result<()> {
        self.state.filters.write().has(TypeExpression::of::<T>(target))?;
        Ok(())
    }

    /// Excludes entities with a `T` matching `target` from iteration.
    pub fn exclude<T: Component>(&self, target: Identity) -> Result<()> {
        self.state.filters.write().not(TypeExpression::of::<T>(target))?;
        Ok(())
    }

    /// Removes all filters added with [`subset`](Self::subset) and [`exclude`](Self::exclude).
    pub fn clear_filters(&self) { self.state.filters.write().clear(); }

    /// Evicts the query from the world cache and stops tracking new archetypes.
    ///
    /// Other handles to the same query match nothing afterwards.
    pub fn dispose(self) { self.world.queries.lock().dispose(&self.state); }

    /// Overwrites every `T` matching `target` in the matched entities with clones of `value`.
    pub fn blit<T: Component + Clone>(&self, value: T, target: Identity) -> Result<()> {
        let pattern = TypeExpression::of::<T>(target);
        let borrow = self.borrow()?;

        for id in self.matched(&borrow.storage) {
            let archetype = borrow.storage.archetype(id);
            for position in archetype.signature().positions_matching(pattern) {
                // Safety: the column borrow is held.
                unsafe { archetype.fill_shared(position, &value) };
            }
        }
        Ok(())
    }

    /// Reserves pooled job resources for the currently tracked archetypes.
    pub fn warmup(&self) {
        let chunks = self.archetype_count() * self.world.concurrency().max(1);
        self.world.jobs.lock().warm::<S::Ptrs>(chunks);
    }

    fn borrow(&self) -> Result<Borrow<'w>> {
        let lock = self.world.lock();
        let storage = StorageRead::new(self.world);
        let columns = self.world.columns.try_write().ok_or(Error::Reentrancy("run a query"))?;
        Ok(Borrow { _columns: columns, storage, _lock: lock })
    }

    /// Resolves the column pointers of every non-empty matched archetype,
    /// one entry per stream column combination.
    fn plan<'s>(&self, storage: &'s Storage) -> Vec<(&'s Archetype, Vec<S::Ptrs>)> {
        self.matched(storage)
            .into_iter()
            .map(|id| storage.archetype(id))
            .filter(|archetype| !archetype.is_empty())
            .map(|archetype| {
                let combinations = join::combinations(archetype.signature(), &self.state.streams);
                let ptrs = combinations.iter().map(|positions| S::ptrs(archetype, positions));
                (archetype, ptrs.collect())
            })
            .collect()
    }

    /// Calls `visitor` with each matched archetype and its stream column pointers.
    fn visit(&self, mut visitor: impl FnMut(&Archetype, S::Ptrs)) -> Result<()> {
        let borrow = self.borrow()?;
        for (archetype, combinations) in self.plan(&borrow.storage) {
            for ptrs in combinations {
                visitor(archetype, ptrs);
            }
        }
        Ok(())
    }

    /// Splits the matched rows into chunks of about `len / concurrency` rows
    /// and calls `run` for each chunk on the worker threads.
    ///
    /// Chunks from different column combinations of one archetype may alias,
    /// so each combination index is dispatched as a separate wave.
    fn dispatch(
        &self,
        concurrency: usize,
        run: impl Fn(S::Ptrs, Range<usize>) + Sync,
    ) -> Result<()> {
        let borrow = self.borrow()?;
        let plan = self.plan(&borrow.storage);
        let waves = plan.iter().map(|(_, combinations)| combinations.len()).max().unwrap_or(0);

        let mut works = self.world.jobs.lock().take::<S::Ptrs>();
        for wave in 0..waves {
            works.clear();
            for (archetype, combinations) in &plan {
                if let Some(&ptrs) = combinations.get(wave) {
                    job::partition(archetype.len(), concurrency, ptrs, &mut works);
                }
            }

            match self.world.pool() {
                Some(pool) if works.len() > 1 => {
                    log::trace!("Dispatching {} chunks to worker threads", works.len());
                    let countdown = Countdown::new(works.len());
                    let (run, countdown) = (&run, &countdown);
                    pool.in_place_scope(|scope| {
                        for work in &works {
                            scope.spawn(move |_| {
                                let _signal = countdown.signal();
                                run(work.ptrs, work.rows.clone());
                            });
                        }
                        countdown.wait();
                    });
                }
                _ => {
                    for work in &works {
                        run(work.ptrs, work.rows.clone());
                    }
                }
            }
        }

        self.world.jobs.lock().give(works);
        Ok(())
    }
}

/// An iterator over the entities matched by a query.
pub struct Entities<'w> {
    world:      &'w World,
    storage:    StorageRead<'w>,
    archetypes: vec::IntoIter<ArchetypeId>,
    current:    Option<ArchetypeId>,
    row:        usize,
}

impl<'w> Iterator for Entities<'w> {
    type Item = Entity<'w>;

    fn next(&mut self) -> Option<Entity<'w>> {
        loop {
            if let Some(id) = self.current {
                if let Some(&identity) = self.storage.archetype(id).identities().get(self.row) {
                    self.row += 1;
                    return Some(Entity::new(self.world, identity));
                }
            }

            self.current = Some(self.archetypes.next()?);
            self.row = 0;
        }
    }
}

impl<'w, 'q, S: Stream> IntoIterator for &'q Query<'w, S> {
    type Item = Entity<'w>;
    type IntoIter = Entities<'w>;

    fn into_iter(self) -> Entities<'w> { self.iter() }
}
