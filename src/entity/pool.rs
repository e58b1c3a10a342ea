//! Allocates and recycles entity identities.

use std::collections::VecDeque;

use bitvec::vec::BitVec;
use xias::Xias;

use super::Identity;

/// The identity allocator of a world.
///
/// Indices are recycled in FIFO order,
/// so a despawned slot stays vacant for as long as possible
/// before its generation is bumped again.
#[derive(Debug, Default)]
pub(crate) struct IdentityPool {
    /// The last issued identity of each index.
    issued:   Vec<Identity>,
    /// Whether the identity at each index is currently alive.
    alive:    BitVec,
    /// Released indices waiting to be reused.
    recycled: VecDeque<u32>,
}

impl IdentityPool {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            issued:   Vec::with_capacity(capacity),
            alive:    BitVec::with_capacity(capacity),
            recycled: VecDeque::new(),
        }
    }

    /// Allocates a new identity, reusing a released index if there is one.
    pub(crate) fn allocate(&mut self) -> Identity {
        if let Some(index) = self.recycled.pop_front() {
            let index = index.small_int::<usize>();
            let slot = self.issued.get_mut(index).expect("recycled index was issued before");
            *slot = slot.successor();
            self.alive.set(index, true);
            log::trace!("Reallocated {}", *slot);
            *slot
        } else {
            let index = self.issued.len();
            let identity = Identity::entity(index.small_int(), 1);
            self.issued.push(identity);
            self.alive.push(true);
            log::trace!("Allocated {identity}");
            identity
        }
    }

    /// Releases a live identity so that its index can be reused with a newer generation.
    ///
    /// Returns `false` if the identity is not alive.
    pub(crate) fn release(&mut self, identity: Identity) -> bool {
        if !self.is_alive(identity) {
            return false;
        }

        let index = identity.index().small_int::<usize>();
        self.alive.set(index, false);
        self.recycled.push_back(identity.index());
        log::trace!("Released {identity}");
        true
    }

    /// Whether `identity` refers to an entity allocated from this pool that is still alive.
    pub(crate) fn is_alive(&self, identity: Identity) -> bool {
        if !identity.is_entity() {
            return false;
        }

        let index = identity.index().small_int::<usize>();
        match (self.issued.get(index), self.alive.get(index)) {
            (Some(&issued), Some(alive)) => *alive && issued == identity,
            _ => false,
        }
    }

    /// The number of live identities.
    pub(crate) fn live_count(&self) -> usize { self.alive.count_ones() }
}
