//! Typed runners for each stream arity.
//!
//! The stream columns of one invocation are always distinct columns,
//! so the mutable references handed to an action never alias.

use super::Query;
use crate::comp::Component;
use crate::entity::Entity;
use crate::Result;

macro_rules! impl_runners {
    ($($c:ident $i:tt),*) => {
        #[allow(unused_variables, unused_unsafe)]
        impl<'w, $($c: Component),*> Query<'w, ($($c,)*)> {
            /// Calls `action` with the stream components of every matched row.
            pub fn for_each(&self, mut action: impl FnMut($(&mut $c),*)) -> Result<()> {
                self.visit(|archetype, ptrs| {
                    for row in 0..archetype.len() {
                        // Safety: the column borrow is held and `row` is within every column.
                        unsafe { action($(ptrs.$i.row(row)),*) }
                    }
                })
            }

            /// Like [`for_each`](Self::for_each), passing `uniform` to every call.
            pub fn for_each_with<U>(
                &self,
                uniform: U,
                mut action: impl FnMut(&U $(, &mut $c)*),
            ) -> Result<()> {
                self.visit(|archetype, ptrs| {
                    for row in 0..archetype.len() {
                        unsafe { action(&uniform $(, ptrs.$i.row(row))*) }
                    }
                })
            }

            /// Like [`for_each`](Self::for_each), also passing the entity of each row.
            pub fn for_each_entity(
                &self,
                mut action: impl FnMut(Entity<'w> $(, &mut $c)*),
            ) -> Result<()> {
                let world = self.world;
                self.visit(|archetype, ptrs| {
                    for (row, &identity) in archetype.identities().iter().enumerate() {
                        unsafe { action(Entity::new(world, identity) $(, ptrs.$i.row(row))*) }
                    }
                })
            }

            /// Calls `action` once per matched archetype with the whole stream columns.
            pub fn raw(&self, mut action: impl FnMut($(&mut [$c]),*)) -> Result<()> {
                self.visit(|archetype, ptrs| {
                    let len = archetype.len();
                    // Safety: the column borrow is held and `len` is the length of every column.
                    unsafe { action($(ptrs.$i.slice(len)),*) }
                })
            }

            /// Like [`raw`](Self::raw), passing `uniform` to every call.
            pub fn raw_with<U>(
                &self,
                uniform: U,
                mut action: impl FnMut(&U $(, &mut [$c])*),
            ) -> Result<()> {
                self.visit(|archetype, ptrs| {
                    let len = archetype.len();
                    unsafe { action(&uniform $(, ptrs.$i.slice(len))*) }
                })
            }

            /// Runs `action` on every matched row in chunks on the worker threads,
            /// targeting one chunk per worker thread and archetype.
            ///
            /// Blocks until all chunks have completed.
            /// If a chunk panics, the panic is propagated after the other chunks complete.
            pub fn job(&self, action: impl Fn($(&mut $c),*) + Sync) -> Result<()> {
                self.job_chunked(self.world.concurrency(), action)
            }

            /// Like [`job`](Self::job), passing `uniform` to every call.
            pub fn job_with<U: Sync>(
                &self,
                uniform: U,
                action: impl Fn(&U $(, &mut $c)*) + Sync,
            ) -> Result<()> {
                let uniform = &uniform;
                self.dispatch(self.world.concurrency(), |ptrs, rows| {
                    for row in rows {
                        unsafe { action(uniform $(, ptrs.$i.row(row))*) }
                    }
                })
            }

            /// Like [`job`](Self::job), splitting each archetype into about `concurrency` chunks.
            pub fn job_chunked(
                &self,
                concurrency: usize,
                action: impl Fn($(&mut $c),*) + Sync,
            ) -> Result<()> {
                self.dispatch(concurrency, |ptrs, rows| {
                    for row in rows {
                        // Safety: chunks of one wave cover disjoint rows.
                        unsafe { action($(ptrs.$i.row(row)),*) }
                    }
                })
            }
        }
    };
}

impl_runners!();
impl_runners!(C0 0);
impl_runners!(C0 0, C1 1);
impl_runners!(C0 0, C1 1, C2 2);
impl_runners!(C0 0, C1 1, C2 2, C3 3);
impl_runners!(C0 0, C1 1, C2 2, C3 3, C4 4);
impl_runners!(C0 0, C1 1, C2 2, C3 3, C4 4, C5 5);
impl_runners!(C0 0, C1 1, C2 2, C3 3, C4 4, C5 5, C6 6);
impl_runners!(C0 0, C1 1, C2 2, C3 3, C4 4, C5 5, C6 6, C7 7);
