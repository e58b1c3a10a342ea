//! Entities are generational identities scoped to a [`World`].
//!
//! An [`Identity`] is a plain 64-bit value that can be copied around freely.
//! It is only meaningful together with the world that allocated it,
//! which is what an [`Entity`] handle pairs it with.
//!
//! Besides live entities, identities are also used as *targets* of type expressions:
//! [`Identity::NONE`] for plain components,
//! [`Identity::of_type`] and [`Identity::of_object`] for type references and object links,
//! and the [`Match`] wildcards inside query masks.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::comp::{Component, TypeKey};
use crate::world::{Ref, RefMut, World};
use crate::Result;

pub(crate) mod pool;

#[cfg(test)]
mod tests;

const TAG_ENTITY: u16 = 0;
const TAG_TYPE: u16 = 0xFFFD;
const TAG_OBJECT: u16 = 0xFFFE;
const TAG_WILDCARD: u16 = 0xFFFF;

/// A generational handle.
///
/// Layout: bits 0..32 hold the index, bits 32..48 the generation, bits 48..64 the kind tag.
/// Identities order and hash by the raw value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Identity(u64);

static_assertions::assert_eq_size!(Identity, u64);

/// The kind of an [`Identity`], derived from its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// The "no target" sentinel.
    None,
    /// An entity allocated by a world.
    Entity,
    /// A hashed reference to a value outside the world.
    Object,
    /// A reference to a component type.
    Type,
    /// A sentinel only used for matching.
    Wildcard,
}

impl Identity {
    /// The "no target" sentinel used by plain components.
    pub const NONE: Self = Self(0);

    pub(crate) const fn from_parts(index: u32, generation: u16, tag: u16) -> Self {
        Self(index as u64 | (generation as u64) << 32 | (tag as u64) << 48)
    }

    pub(crate) const fn entity(index: u32, generation: u16) -> Self {
        Self::from_parts(index, generation, TAG_ENTITY)
    }

    /// Returns the identity that refers to the component type `T`.
    ///
    /// Type references can be used as relation targets.
    pub fn of_type<T: Component>() -> Self {
        Self::from_parts(u32::from(TypeKey::of::<T>().get()), 0, TAG_TYPE)
    }

    /// Returns the identity of an object link to `value`.
    ///
    /// Two values of the same type that hash equally produce the same identity.
    /// Only the low 32 bits of the hash are kept,
    /// so distinct values of one type may collide once tens of thousands of them are linked.
    pub fn of_object<L: Component + Hash>(value: &L) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self::from_parts(hasher.finish() as u32, TypeKey::of::<L>().get(), TAG_OBJECT)
    }

    /// The raw 64-bit representation.
    pub fn to_bits(self) -> u64 { self.0 }

    /// The index of the identity.
    ///
    /// For entities, this is the slot index in the allocator.
    pub fn index(self) -> u32 { self.0 as u32 }

    /// The generation of the identity.
    pub fn generation(self) -> u16 { (self.0 >> 32) as u16 }

    fn tag(self) -> u16 { (self.0 >> 48) as u16 }

    /// The kind of this identity.
    pub fn kind(self) -> Kind {
        match self.tag() {
            _ if self == Self::NONE => Kind::None,
            TAG_ENTITY => Kind::Entity,
            TAG_TYPE => Kind::Type,
            TAG_OBJECT => Kind::Object,
            TAG_WILDCARD => Kind::Wildcard,
            tag => panic!("Identity {:#x} has unknown tag {tag:#x}", self.0),
        }
    }

    /// Whether this is the "no target" sentinel.
    pub fn is_none(self) -> bool { self == Self::NONE }

    /// Whether this identity refers to an entity.
    pub fn is_entity(self) -> bool { self.tag() == TAG_ENTITY && !self.is_none() }

    /// Whether this identity is an object link.
    pub fn is_object(self) -> bool { self.tag() == TAG_OBJECT }

    /// Whether this identity is a type reference.
    pub fn is_type(self) -> bool { self.tag() == TAG_TYPE }

    /// Whether this identity is a [`Match`] wildcard.
    pub fn is_wildcard(self) -> bool { self.tag() == TAG_WILDCARD }

    /// The identity that reuses the same index with the next generation.
    ///
    /// Generation 0 is never issued, so wrapping skips it.
    pub(crate) fn successor(self) -> Self {
        let generation = match self.generation().wrapping_add(1) {
            0 => 1,
            generation => generation,
        };
        Self::entity(self.index(), generation)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Kind::None => write!(f, "None"),
            Kind::Entity => write!(f, "E{}:{}", self.index(), self.generation()),
            Kind::Object => {
                let name = TypeKey::from_raw(self.generation()).map_or("?", TypeKey::name);
                write!(f, "O#{:08x}<{name}>", self.index())
            }
            Kind::Type => {
                let name = u16::try_from(self.index())
                    .ok()
                    .and_then(TypeKey::from_raw)
                    .map_or("?", TypeKey::name);
                write!(f, "T<{name}>")
            }
            Kind::Wildcard => match *self {
                Match::ANY => write!(f, "*"),
                Match::OBJECT => write!(f, "*Object"),
                Match::ENTITY => write!(f, "*Entity"),
                Match::TARGET => write!(f, "*Target"),
                _ => write!(f, "*{:#x}", self.0),
            },
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self, f) }
}

/// Wildcard targets for matching type expressions in masks and query streams.
///
/// | Wildcard | Matches |
/// | --- | --- |
/// | [`Match::PLAIN`] | plain components only |
/// | [`Match::ANY`] | every target, including plain |
/// | [`Match::OBJECT`] | object links |
/// | [`Match::ENTITY`] | entity relations |
/// | [`Match::TARGET`] | every relation or link, excluding plain |
pub enum Match {}

impl Match {
    /// Matches plain components. Identical to [`Identity::NONE`].
    pub const PLAIN: Identity = Identity::NONE;
    /// Matches every target.
    pub const ANY: Identity = Identity::from_parts(1, 0, TAG_WILDCARD);
    /// Matches object links.
    pub const OBJECT: Identity = Identity::from_parts(2, 0, TAG_WILDCARD);
    /// Matches entity relations.
    pub const ENTITY: Identity = Identity::from_parts(3, 0, TAG_WILDCARD);
    /// Matches any non-plain target.
    pub const TARGET: Identity = Identity::from_parts(4, 0, TAG_WILDCARD);
}

/// An identity bound to the world it belongs to.
///
/// Two handles are equal only if they refer to the same identity in the same world.
#[derive(Clone, Copy)]
pub struct Entity<'w> {
    world:    &'w World,
    identity: Identity,
}

impl<'w> Entity<'w> {
    pub(crate) fn new(world: &'w World, identity: Identity) -> Self { Self { world, identity } }

    /// The identity of this entity.
    pub fn id(&self) -> Identity { self.identity }

    /// The world this entity belongs to.
    pub fn world(&self) -> &'w World { self.world }

    /// Whether the entity is still alive.
    pub fn is_alive(&self) -> bool { self.world.is_alive(self.identity) }

    /// Adds a plain component.
    pub fn add<T: Component>(&self, value: T) -> Result<&Self> {
        self.world.add(self.identity, value)?;
        Ok(self)
    }

    /// Adds a relation to `target`.
    pub fn add_relation<T: Component>(&self, target: Identity, value: T) -> Result<&Self> {
        self.world.add_relation(self.identity, target, value)?;
        Ok(self)
    }

    /// Adds an object link to `link`.
    pub fn add_link<L: Component + Hash>(&self, link: L) -> Result<&Self> {
        self.world.add_link(self.identity, link)?;
        Ok(self)
    }

    /// Removes a plain component.
    pub fn remove<T: Component>(&self) -> Result<&Self> {
        self.world.remove::<T>(self.identity)?;
        Ok(self)
    }

    /// Removes the relation to `target`.
    pub fn remove_relation<T: Component>(&self, target: Identity) -> Result<&Self> {
        self.world.remove_relation::<T>(self.identity, target)?;
        Ok(self)
    }

    /// Removes the object link to `link`.
    pub fn remove_link<L: Component + Hash>(&self, link: &L) -> Result<&Self> {
        self.world.remove_link(self.identity, link)?;
        Ok(self)
    }

    /// Whether the entity has a plain `T`.
    pub fn has<T: Component>(&self) -> bool {
        self.world.has_component::<T>(self.identity, Match::PLAIN)
    }

    /// Whether the entity has a `T` matching `target`, which may be a [`Match`] wildcard.
    pub fn has_relation<T: Component>(&self, target: Identity) -> bool {
        self.world.has_component::<T>(self.identity, target)
    }

    /// Whether the entity links to `link`.
    pub fn has_link<L: Component + Hash>(&self, link: &L) -> bool {
        self.world.has_component::<L>(self.identity, Identity::of_object(link))
    }

    /// Borrows a component of the entity.
    pub fn get<T: Component>(&self, target: Identity) -> Result<Ref<'w, T>> {
        self.world.get::<T>(self.identity, target)
    }

    /// Borrows a component of the entity mutably.
    pub fn get_mut<T: Component>(&self, target: Identity) -> Result<RefMut<'w, T>> {
        self.world.get_mut::<T>(self.identity, target)
    }

    /// Despawns the entity.
    pub fn despawn(self) -> Result<()> { self.world.despawn(self.identity) }
}

impl<'w> PartialEq for Entity<'w> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.world, other.world) && self.identity == other.identity
    }
}

impl<'w> Eq for Entity<'w> {}

impl<'w> Hash for Entity<'w> {
    fn hash<H: Hasher>(&self, state: &mut H) { self.identity.hash(state) }
}

impl<'w> fmt::Debug for Entity<'w> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identity, self.world.id())
    }
}

impl<'w> fmt::Display for Entity<'w> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.identity, f)
    }
}

impl<'w> From<Entity<'w>> for Identity {
    fn from(entity: Entity<'w>) -> Self { entity.identity }
}
