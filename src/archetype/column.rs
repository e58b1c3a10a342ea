//! Type-erased component columns.

use std::any::{type_name, Any};
use std::cell::UnsafeCell;
use std::slice;

use crate::comp::Component;

/// A densely packed column of one component type.
///
/// Component data is mutated through shared references by query runners,
/// so the vector is wrapped in an [`UnsafeCell`].
/// The world guarantees that such access is exclusive
/// and that the vector is never reallocated while pointers into it are held.
pub(crate) struct Column<T> {
    data: UnsafeCell<Vec<T>>,
}

// Safety: the world only hands out access to column data under its column borrow,
// so no two threads access the same element concurrently.
unsafe impl<T: Component> Sync for Column<T> {}

impl<T: Component> Column<T> {
    pub(crate) fn new() -> Self { Self { data: UnsafeCell::new(Vec::new()) } }

    pub(crate) fn vec_mut(&mut self) -> &mut Vec<T> { self.data.get_mut() }

    /// A pointer to the first element.
    ///
    /// The pointer is valid for [`len`](AnyColumn::len) elements
    /// until the next structural change of the owning archetype.
    pub(crate) fn as_mut_ptr(&self) -> *mut T {
        // Safety: only the vector header is accessed; the elements are not borrowed.
        unsafe { (*self.data.get()).as_mut_ptr() }
    }

    /// Returns the column as a mutable slice through a shared reference.
    ///
    /// # Safety
    /// The caller must ensure that no other reference to any element of this column
    /// is alive for the returned lifetime.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self) -> &mut [T] {
        slice::from_raw_parts_mut(self.as_mut_ptr(), self.len())
    }
}

/// Object-safe operations on a [`Column`] of unknown type.
pub(crate) trait AnyColumn: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Creates an empty column of the same type.
    fn new_empty(&self) -> Box<dyn AnyColumn>;

    /// The number of values in the column.
    fn len(&self) -> usize;

    /// Drops the value at `row`, moving the last value into its place.
    fn swap_remove(&mut self, row: usize);

    /// Moves the value at `row` to the end of `dest`, moving the last value into its place.
    ///
    /// # Panics
    /// Panics if `dest` is not a column of the same type.
    fn move_to(&mut self, row: usize, dest: &mut dyn AnyColumn);

    fn type_name(&self) -> &'static str;
}

impl<T: Component> AnyColumn for Column<T> {
    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn new_empty(&self) -> Box<dyn AnyColumn> { Box::new(Column::<T>::new()) }

    fn len(&self) -> usize {
        // Safety: only the vector header is accessed.
        unsafe { (*self.data.get()).len() }
    }

    fn swap_remove(&mut self, row: usize) { self.vec_mut().swap_remove(row); }

    fn move_to(&mut self, row: usize, dest: &mut dyn AnyColumn) {
        let dest_name = dest.type_name();
        let dest = match dest.as_any_mut().downcast_mut::<Column<T>>() {
            Some(dest) => dest,
            None => panic!("Cannot move {} into a column of {}", type_name::<T>(), dest_name),
        };
        let value = self.vec_mut().swap_remove(row);
        dest.vec_mut().push(value);
    }

    fn type_name(&self) -> &'static str { type_name::<T>() }
}

/// A boxed component value whose type is only known at runtime.
///
/// Used to carry values through deferred operations and into new archetypes.
pub(crate) trait ErasedValue: Send {
    /// Creates an empty column able to store this value.
    fn new_column(&self) -> Box<dyn AnyColumn>;

    /// Appends the value to `column`.
    ///
    /// # Panics
    /// Panics if `column` is not a column of the value type.
    fn push_into(self: Box<Self>, column: &mut dyn AnyColumn);
}

impl<T: Component> ErasedValue for T {
    fn new_column(&self) -> Box<dyn AnyColumn> { Box::new(Column::<T>::new()) }

    fn push_into(self: Box<Self>, column: &mut dyn AnyColumn) {
        let column_name = column.type_name();
        match column.as_any_mut().downcast_mut::<Column<T>>() {
            Some(column) => column.vec_mut().push(*self),
            None => panic!("Cannot push {} into a column of {}", type_name::<T>(), column_name),
        }
    }
}
