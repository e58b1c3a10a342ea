#![allow(missing_docs)]

use std::time::Duration;

use parking_lot::{Condvar, Mutex, Once};

use crate::World;

pub fn init() {
    static SET_LOGGER_ONCE: Once = Once::new();
    SET_LOGGER_ONCE.call_once(env_logger::init);
}

/// Creates a world with a small worker pool for tests.
pub fn world() -> World {
    init();
    World::with_concurrency(4)
}

/// A synchronization util that blocks until sufficiently many threads are waiting concurrently.
///
/// This is used for testing that multiple job chunks can run concurrently
/// (in contrast to one blocking the other).
#[derive(Debug)]
pub struct AntiSemaphore {
    saturation: usize,
    lock:       Mutex<AntiSemaphoreInner>,
    condvar:    Condvar,
}

#[derive(Debug)]
struct AntiSemaphoreInner {
    current: usize,
}

impl AntiSemaphore {
    /// Creates a new semaphore.
    /// `saturation` is the number of threads that can wait on the lock.
    pub fn new(saturation: usize) -> Self {
        Self {
            saturation,
            lock: Mutex::new(AntiSemaphoreInner { current: 0 }),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until the semaphore is saturated.
    pub fn wait(&self) {
        let mut lock = self.lock.lock();
        log::trace!(
            "AntiSemaphore(current: {}, saturation: {}).wait()",
            lock.current,
            self.saturation
        );
        lock.current += 1;
        if lock.current > self.saturation {
            panic!("AntiSemaphore exceeded saturation");
        }

        if lock.current == self.saturation {
            lock.current = 0;
            self.condvar.notify_all();
        } else {
            let result = self.condvar.wait_for(&mut lock, Duration::from_secs(5));
            if result.timed_out() {
                panic!("Deadlock: AntiSemaphore not saturated for more than 5 seconds");
            }
        }
    }
}

/// A plain component.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub f64, pub f64);

/// Another plain component.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity(pub f64, pub f64);

/// A component with an owned heap value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(pub String);

/// A component used as a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Likes(pub i32);

/// Another component used as a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owes(pub i32);

/// A zero-sized marker component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Marker;

/// A hashable value used for object links.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// A generic component.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompN<const N: usize>(pub i32);
