//! Support types for chunked parallel jobs.
//!
//! A job splits the rows of every matched archetype into chunks,
//! dispatches each chunk to the world's worker pool,
//! and blocks the calling thread on a [`Countdown`] until all chunks have completed.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::Range;

use parking_lot::{Condvar, Mutex};


/// A completion counter that threads can block on until it reaches zero.
#[derive(Debug)]
pub struct Countdown {
    remaining: Mutex<usize>,
    zero:      Condvar,
}

impl Countdown {
    /// Creates a countdown expecting `count` signals.
    pub fn new(count: usize) -> Self { Self { remaining: Mutex::new(count), zero: Condvar::new() } }

    /// The number of signals still expected.
    pub fn remaining(&self) -> usize { *self.remaining.lock() }

    /// Decrements the counter, waking waiters when it reaches zero.
    ///
    /// # Panics
    /// Panics if the counter is already zero.
    pub fn decrement(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = remaining.checked_sub(1).expect("Countdown decremented below zero");
        if *remaining == 0 {
            self.zero.notify_all();
        }
    }

    /// Returns a guard that decrements the counter when dropped,
    /// so that a panicking chunk still completes the countdown.
    pub fn signal(&self) -> Signal<'_> { Signal(self) }

    /// Blocks until the counter reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.zero.wait(&mut remaining);
        }
    }
}

/// Decrements a [`Countdown`] on drop.
#[must_use = "the countdown is decremented as soon as the signal is dropped"]
pub struct Signal<'a>(&'a Countdown);

impl<'a> Drop for Signal<'a> {
    fn drop(&mut self) { self.0.decrement() }
}

/// One chunk of a job: a contiguous row range of one archetype.
pub(crate) struct Work<P> {
    pub(crate) ptrs: P,
    pub(crate) rows: Range<usize>,
}

/// The number of rows per chunk so that `len` rows are split into about `concurrency` chunks.
pub(crate) fn chunk_size(len: usize, concurrency: usize) -> usize {
    (len / concurrency.max(1)).max(1)
}

/// Splits `len` rows into chunks and appends them to `works`.
pub(crate) fn partition<P: Copy>(
    len: usize,
    concurrency: usize,
    ptrs: P,
    works: &mut Vec<Work<P>>,
) {
    let size = chunk_size(len, concurrency);
    works.extend(
        (0..len).step_by(size).map(|start| Work { ptrs, rows: start..(start + size).min(len) }),
    );
}

/// Recycles work vectors across job invocations.
///
/// Vectors are keyed by the pointer tuple type of the job,
/// so queries with the same stream types share a vector.
#[derive(Default)]
pub(crate) struct JobPool {
    shelves: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl JobPool {
    /// Takes the recycled vector for `P`, or a new one.
    pub(crate) fn take<P: Send + 'static>(&mut self) -> Vec<Work<P>> {
        match self.shelves.remove(&TypeId::of::<P>()) {
            Some(shelf) => match shelf.downcast::<Vec<Work<P>>>() {
                Ok(works) => *works,
                Err(_) => panic!("JobPool shelf has mismatched type"),
            },
            None => Vec::new(),
        }
    }

    /// Returns a vector for reuse.
    pub(crate) fn give<P: Send + 'static>(&mut self, mut works: Vec<Work<P>>) {
        works.clear();
        self.shelves.insert(TypeId::of::<P>(), Box::new(works));
    }

    /// Ensures that the vector for `P` can hold at least `capacity` chunks without reallocating.
    pub(crate) fn warm<P: Send + 'static>(&mut self, capacity: usize) {
        let mut works = self.take::<P>();
        works.reserve(capacity);
        self.give(works);
    }

    pub(crate) fn capacity<P: Send + 'static>(&self) -> usize {
        self.shelves
            .get(&TypeId::of::<P>())
            .and_then(|shelf| shelf.downcast_ref::<Vec<Work<P>>>())
            .map_or(0, Vec::capacity)
    }
}
