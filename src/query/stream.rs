//! Tuples of component types exposed by a query.

use std::ptr::NonNull;

use crate::archetype::Archetype;
use crate::comp::{Component, TypeKey};

mod sealed {
    pub trait Sealed {}
}

/// A tuple of component types that a query hands to its runners.
///
/// Implemented for `()` and tuples of up to 8 [`Component`] types.
pub trait Stream: sealed::Sealed + 'static {
    /// Pointers to the columns of one archetype, one per stream type.
    #[doc(hidden)]
    type Ptrs: Copy + Send + Sync + 'static;

    /// The type keys of the stream types, in order.
    fn type_keys() -> Vec<TypeKey>;

    /// Collects column pointers for the columns at `positions` of `archetype`.
    ///
    /// # Panics
    /// Panics if a column does not store the corresponding stream type.
    #[doc(hidden)]
    fn ptrs(archetype: &Archetype, positions: &[usize]) -> Self::Ptrs;
}

/// A pointer to the first element of a column.
#[doc(hidden)]
pub struct Ptr<T>(NonNull<T>);

impl<T> Clone for Ptr<T> {
    fn clone(&self) -> Self { *self }
}

impl<T> Copy for Ptr<T> {}

// Safety: components are Send + Sync, and the world guarantees exclusive access to column data
// for the duration in which these pointers are dereferenced.
unsafe impl<T: Component> Send for Ptr<T> {}
unsafe impl<T: Component> Sync for Ptr<T> {}

impl<T: Component> Ptr<T> {
    pub(crate) fn of(archetype: &Archetype, position: usize) -> Self {
        let ptr = archetype.column::<T>(position).as_mut_ptr();
        Self(NonNull::new(ptr).expect("Vec::as_mut_ptr is never null"))
    }

    /// # Safety
    /// `row` must be within the column length,
    /// and no other reference to the element may be alive for `'a`.
    pub(crate) unsafe fn row<'a>(self, row: usize) -> &'a mut T { &mut *self.0.as_ptr().add(row) }

    /// # Safety
    /// `len` must be the column length,
    /// and no other reference to any element may be alive for `'a`.
    pub(crate) unsafe fn slice<'a>(self, len: usize) -> &'a mut [T] {
        std::slice::from_raw_parts_mut(self.0.as_ptr(), len)
    }
}

impl sealed::Sealed for () {}

impl Stream for () {
    type Ptrs = ();

    fn type_keys() -> Vec<TypeKey> { Vec::new() }

    fn ptrs(_: &Archetype, _: &[usize]) -> Self::Ptrs {}
}

macro_rules! impl_stream {
    ($($c:ident $i:tt),+) => {
        impl<$($c: Component),+> sealed::Sealed for ($($c,)+) {}

        impl<$($c: Component),+> Stream for ($($c,)+) {
            type Ptrs = ($(Ptr<$c>,)+);

            fn type_keys() -> Vec<TypeKey> { vec![$(TypeKey::of::<$c>()),+] }

            fn ptrs(archetype: &Archetype, positions: &[usize]) -> Self::Ptrs {
                ($(Ptr::<$c>::of(archetype, positions[$i]),)+)
            }
        }
    };
}

impl_stream!(C0 0);
impl_stream!(C0 0, C1 1);
impl_stream!(C0 0, C1 1, C2 2);
impl_stream!(C0 0, C1 1, C2 2, C3 3);
impl_stream!(C0 0, C1 1, C2 2, C3 3, C4 4);
impl_stream!(C0 0, C1 1, C2 2, C3 3, C4 4, C5 5);
impl_stream!(C0 0, C1 1, C2 2, C3 3, C4 4, C5 5, C6 6);
impl_stream!(C0 0, C1 1, C2 2, C3 3, C4 4, C5 5, C6 6, C7 7);
