use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::storage::Storage;
use super::World;
use crate::comp::{Component, TypeExpression};
use crate::entity::Identity;
use crate::{Error, Result};

/// A read borrow of the world storage.
///
/// Releasing it applies the operations whose replay was postponed
/// because the storage was still borrowed when the last [`WorldLock`](super::WorldLock) dropped.
pub(crate) struct StorageRead<'w> {
    world: &'w World,
    guard: Option<RwLockReadGuard<'w, Storage>>,
}

impl<'w> StorageRead<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self { world, guard: Some(world.storage.read_recursive()) }
    }
}

impl<'w> Deref for StorageRead<'w> {
    type Target = Storage;

    fn deref(&self) -> &Storage { self.guard.as_ref().expect("guard is only taken on drop") }
}

impl<'w> Drop for StorageRead<'w> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.world.flush();
    }
}

/// The column borrow of a component guard, shared for [`Ref`] and exclusive for [`RefMut`].
struct Columns<'w> {
    _shared:    Option<RwLockReadGuard<'w, ()>>,
    _exclusive: Option<RwLockWriteGuard<'w, ()>>,
}

/// Guards held while a single component is borrowed.
struct Borrow<'w> {
    // dropped in declaration order: columns before storage
    _columns: Columns<'w>,
    _storage: StorageRead<'w>,
}

fn borrow<'w, T: Component>(
    world: &'w World,
    identity: Identity,
    target: Identity,
    exclusive: bool,
) -> Result<(NonNull<T>, Borrow<'w>)> {
    let storage = StorageRead::new(world);
    let columns = if exclusive {
        world.columns.try_write().map(|guard| Columns { _shared: None, _exclusive: Some(guard) })
    } else {
        world.columns.try_read().map(|guard| Columns { _shared: Some(guard), _exclusive: None })
    };
    let columns = columns.ok_or(Error::Reentrancy("borrow a component"))?;
    if !world.is_alive(identity) {
        return Err(Error::Dead(identity));
    }

    let ptr = storage.locate::<T>(identity, TypeExpression::of::<T>(target))?;
    Ok((ptr, Borrow { _columns: columns, _storage: storage }))
}

/// A shared borrow of one component value.
///
/// Several shared borrows may coexist.
/// While one is alive, structural changes, mutable borrows and query runners on the world
/// fail with [`Error::Reentrancy`].
pub struct Ref<'w, T: Component> {
    ptr:     NonNull<T>,
    _borrow: Borrow<'w>,
    _ph:     PhantomData<&'w T>,
}

impl<'w, T: Component> Ref<'w, T> {
    pub(crate) fn new(world: &'w World, identity: Identity, target: Identity) -> Result<Self> {
        let (ptr, borrow) = borrow(world, identity, target, false)?;
        Ok(Self { ptr, _borrow: borrow, _ph: PhantomData })
    }
}

impl<'w, T: Component> Deref for Ref<'w, T> {
    type Target = T;

    // Safety: no exclusive column borrow coexists and the storage cannot change while the guard is
    // alive.
    fn deref(&self) -> &T { unsafe { self.ptr.as_ref() } }
}

impl<'w, T: Component + fmt::Debug> fmt::Debug for Ref<'w, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(&**self, f) }
}

/// An exclusive borrow of one component value.
pub struct RefMut<'w, T: Component> {
    ptr:     NonNull<T>,
    _borrow: Borrow<'w>,
    _ph:     PhantomData<&'w mut T>,
}

impl<'w, T: Component> RefMut<'w, T> {
    pub(crate) fn new(world: &'w World, identity: Identity, target: Identity) -> Result<Self> {
        let (ptr, borrow) = borrow(world, identity, target, true)?;
        Ok(Self { ptr, _borrow: borrow, _ph: PhantomData })
    }
}

impl<'w, T: Component> Deref for RefMut<'w, T> {
    type Target = T;

    fn deref(&self) -> &T { unsafe { self.ptr.as_ref() } }
}

impl<'w, T: Component> DerefMut for RefMut<'w, T> {
    // Safety: the column borrow is exclusive to this guard.
    fn deref_mut(&mut self) -> &mut T { unsafe { self.ptr.as_mut() } }
}

impl<'w, T: Component + fmt::Debug> fmt::Debug for RefMut<'w, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(&**self, f) }
}
