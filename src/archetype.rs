//! Archetypes are columnar tables of entities sharing the same signature.
//!
//! Every distinct set of type expressions held by some entity has exactly one archetype.
//! Row `i` of every column belongs to the entity at `identities()[i]`.
//! Adding or removing a component moves the entity's row to another archetype.

use std::any::type_name;

use bitvec::vec::BitVec;

use crate::comp::{Component, TypeExpression};
use crate::entity::Identity;

mod column;
pub(crate) use column::{AnyColumn, Column, ErasedValue};

mod signature;
pub use signature::Signature;


/// A table storing all entities with the same [`Signature`].
pub struct Archetype {
    signature:  Signature,
    /// The set of type keys in the signature, for quick rejection in mask tests.
    types:      BitVec,
    identities: Vec<Identity>,
    /// One column per expression in `signature`, in the same order.
    columns:    Vec<Box<dyn AnyColumn>>,
}

impl Archetype {
    /// Creates the archetype with no components.
    pub(crate) fn root() -> Self { Self::from_columns(Signature::default(), Vec::new()) }

    fn from_columns(signature: Signature, columns: Vec<Box<dyn AnyColumn>>) -> Self {
        let mut types = BitVec::new();
        for expr in signature.iter() {
            let index = expr.type_key().index();
            if types.len() <= index {
                types.resize(index + 1, false);
            }
            types.set(index, true);
        }

        Self { signature, types, identities: Vec::new(), columns }
    }

    /// Creates an empty archetype for `signature`,
    /// taking column types from `source` or, for the expression missing in `source`, from `extra`.
    ///
    /// # Panics
    /// Panics if an expression of `signature` is neither in `source` nor provided by `extra`.
    pub(crate) fn derive(
        source: &Archetype,
        signature: Signature,
        extra: Option<&dyn ErasedValue>,
    ) -> Self {
        let columns = signature
            .iter()
            .map(|expr| match (source.signature.position(expr), extra) {
                (Some(position), _) => source.columns[position].new_empty(),
                (None, Some(extra)) => extra.new_column(),
                (None, None) => panic!("No column type known for {expr} in {signature}"),
            })
            .collect();
        Self::from_columns(signature, columns)
    }

    /// The signature of the archetype.
    pub fn signature(&self) -> &Signature { &self.signature }

    /// The identities of the entities in row order.
    pub fn identities(&self) -> &[Identity] { &self.identities }

    /// The number of entities.
    pub fn len(&self) -> usize { self.identities.len() }

    /// Whether the archetype has no entities.
    pub fn is_empty(&self) -> bool { self.identities.is_empty() }

    /// Whether the signature contains a component of the type of `pattern`.
    fn has_type(&self, pattern: TypeExpression) -> bool {
        self.types.get(pattern.type_key().index()).map_or(false, |bit| *bit)
    }

    /// Whether any expression in the signature matches `pattern`.
    pub fn matches(&self, pattern: TypeExpression) -> bool {
        self.has_type(pattern) && self.signature.matches(pattern)
    }

    /// Appends a row with one value per column, in signature order.
    ///
    /// Returns the new row index.
    ///
    /// # Panics
    /// Panics if the values do not correspond to the columns.
    pub(crate) fn append(
        &mut self,
        identity: Identity,
        values: Vec<Box<dyn ErasedValue>>,
    ) -> usize {
        assert_eq!(
            values.len(),
            self.columns.len(),
            "Appending {} values to an archetype with signature {}",
            values.len(),
            self.signature,
        );

        for (value, column) in values.into_iter().zip(&mut self.columns) {
            value.push_into(&mut **column);
        }
        self.identities.push(identity);
        self.identities.len() - 1
    }

    /// Removes the row at `row` by moving the last row into its place.
    ///
    /// Returns the identity of the entity now at `row`, if any entity was moved.
    /// The caller must update the location of that entity.
    pub(crate) fn remove(&mut self, row: usize) -> Option<Identity> {
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.identities.swap_remove(row);
        self.identities.get(row).copied()
    }

    /// Moves the row at `row` to the end of `dest`.
    ///
    /// Values of expressions shared by both signatures are moved,
    /// values only in this archetype are dropped,
    /// and the single expression only in `dest` (if any) receives `insert`.
    ///
    /// Returns the identity of the entity moved into `row` of this archetype, if any.
    ///
    /// # Panics
    /// Panics if a column of `dest` would be left without a value.
    pub(crate) fn move_row(
        &mut self,
        row: usize,
        dest: &mut Archetype,
        insert: Option<Box<dyn ErasedValue>>,
    ) -> Option<Identity> {
        for (expr, column) in self.signature.iter().zip(&mut self.columns) {
            match dest.signature.position(expr) {
                Some(position) => column.move_to(row, &mut *dest.columns[position]),
                None => column.swap_remove(row),
            }
        }

        let mut insert = insert;
        for (expr, column) in dest.signature.iter().zip(&mut dest.columns) {
            if !self.signature.contains(expr) {
                let value = match insert.take() {
                    Some(value) => value,
                    None => {
                        panic!("Moving a row into {} without a value for {expr}", dest.signature)
                    }
                };
                value.push_into(&mut **column);
            }
        }

        let identity = self.identities.swap_remove(row);
        dest.identities.push(identity);
        self.identities.get(row).copied()
    }

    /// The column at `position`, downcast to `T`.
    ///
    /// # Panics
    /// Panics if the column does not store `T`.
    pub(crate) fn column<T: Component>(&self, position: usize) -> &Column<T> {
        let column = &self.columns[position];
        match column.as_any().downcast_ref::<Column<T>>() {
            Some(column) => column,
            None => panic!(
                "Column {} of {} stores {}, not {}",
                position,
                self.signature,
                column.type_name(),
                type_name::<T>()
            ),
        }
    }

    /// Overwrites every value in the column at `position` with clones of `value`.
    pub(crate) fn fill<T: Component + Clone>(&mut self, position: usize, value: &T) {
        // Safety: `&mut self` guarantees exclusive access to the column.
        unsafe { self.fill_shared(position, value) }
    }

    /// Like [`fill`](Self::fill), through a shared reference.
    ///
    /// # Safety
    /// The caller must hold exclusive access to the column data,
    /// e.g. through the world's column borrow.
    pub(crate) unsafe fn fill_shared<T: Component + Clone>(&self, position: usize, value: &T) {
        self.column::<T>(position).slice_mut().fill(value.clone());
    }
}

/// Borrows two distinct elements of a slice mutably.
///
/// # Panics
/// Panics if `a == b` or either index is out of bounds.
pub(crate) fn pair_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut requires distinct indices");
    if a < b {
        let (left, right) = slice.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = slice.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
