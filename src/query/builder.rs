use std::hash::Hash;
use std::marker::PhantomData;
use std::mem;

use super::{Query, Stream};
use crate::comp::{Component, TypeExpression};
use crate::entity::Identity;
use crate::mask::{Mask, MaskSet};
use crate::world::World;
use crate::{Error, Result};

/// Assembles the mask of a query.
///
/// Every stream expression is implicitly part of the `has` set.
///
/// ```
/// use tabec::entity::Match;
///
/// struct Position(f32);
/// struct Frozen;
///
/// let world = tabec::World::unthreaded();
/// let query = world.query::<(Position,)>().not::<Frozen>(Match::ANY)?.compile();
/// assert_eq!(query.count(), 0);
/// # Ok::<(), tabec::Error>(())
/// ```
pub struct QueryBuilder<'w, S: Stream> {
    world:   &'w World,
    streams: Box<[TypeExpression]>,
    mask:    Mask,
    _ph:     PhantomData<fn() -> S>,
}

impl<'w, S: Stream> QueryBuilder<'w, S> {
    pub(crate) fn new(world: &'w World, targets: &[Identity]) -> Result<Self> {
        let type_keys = S::type_keys();
        if type_keys.len() != targets.len() {
            return Err(Error::InvalidArgument(format!(
                "{} stream targets given for {} stream types",
                targets.len(),
                type_keys.len()
            )));
        }

        let streams: Box<[TypeExpression]> = type_keys
            .into_iter()
            .zip(targets)
            .map(|(type_key, &target)| TypeExpression::new(type_key, target))
            .collect();

        let mut mask = Mask::new();
        for &stream in streams.iter() {
            mask.has(stream)?;
        }

        Ok(Self { world, streams, mask, _ph: PhantomData })
    }

    fn with(mut self, set: MaskSet, expr: TypeExpression) -> Result<Self> {
        self.mask.insert(set, expr)?;
        Ok(self)
    }

    /// Requires a `T` matching `target`.
    pub fn has<T: Component>(self, target: Identity) -> Result<Self> {
        self.with(MaskSet::Has, TypeExpression::of::<T>(target))
    }

    /// Excludes entities with a `T` matching `target`.
    pub fn not<T: Component>(self, target: Identity) -> Result<Self> {
        self.with(MaskSet::Not, TypeExpression::of::<T>(target))
    }

    /// Requires at least one of the `any` expressions to be matched.
    pub fn any<T: Component>(self, target: Identity) -> Result<Self> {
        self.with(MaskSet::Any, TypeExpression::of::<T>(target))
    }

    /// Requires a link to `link`.
    pub fn has_link<L: Component + Hash>(self, link: &L) -> Result<Self> {
        self.has::<L>(Identity::of_object(link))
    }

    /// Excludes entities linking to `link`.
    pub fn not_link<L: Component + Hash>(self, link: &L) -> Result<Self> {
        self.not::<L>(Identity::of_object(link))
    }

    /// Adds a link to `link` to the `any` set.
    pub fn any_link<L: Component + Hash>(self, link: &L) -> Result<Self> {
        self.any::<L>(Identity::of_object(link))
    }

    /// Disables conflict checking for subsequently added expressions.
    pub fn unchecked(mut self) -> Self {
        self.mask = mem::take(&mut self.mask).unchecked();
        self
    }

    /// The mask assembled so far.
    pub fn mask(&self) -> &Mask { &self.mask }

    /// Compiles the query, reusing the cached query with the same mask and streams if there is one.
    pub fn compile(self) -> Query<'w, S> {
        Query::new(self.world, self.world.compile(self.mask, self.streams, true))
    }

    /// Compiles a new query that is not shared through the cache.
    pub fn unique(self) -> Query<'w, S> {
        Query::new(self.world, self.world.compile(self.mask, self.streams, false))
    }
}
