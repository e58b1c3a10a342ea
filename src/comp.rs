//! Component types and type expressions.
//!
//! Every `Send + Sync + 'static` type can be used as a component.
//! Component types are identified by a [`TypeKey`],
//! a small integer assigned on first use from a process-wide registry.
//!
//! A [`TypeExpression`] pairs a type key with a target identity,
//! which distinguishes plain components, relations and object links of the same type.

use std::any::{type_name, TypeId};
use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;
use xias::Xias;

use crate::entity::{Identity, Match};


/// A value that can be stored in a world.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// A process-wide numeric identifier for a component type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey(u16);

struct Registry {
    keys:  BTreeMap<TypeId, TypeKey>,
    names: Vec<&'static str>,
}

static REGISTRY: RwLock<Registry> =
    parking_lot::const_rwlock(Registry { keys: BTreeMap::new(), names: Vec::new() });

impl TypeKey {
    /// Returns the key of `T`, registering it if this is the first use.
    ///
    /// # Panics
    /// Panics if more than 65536 distinct component types are registered.
    pub fn of<T: Component>() -> Self {
        let type_id = TypeId::of::<T>();
        if let Some(&key) = REGISTRY.read().keys.get(&type_id) {
            return key;
        }

        let mut registry = REGISTRY.write();
        let Registry { keys, names } = &mut *registry;
        *keys.entry(type_id).or_insert_with(|| {
            let key = match u16::try_from(names.len()) {
                Ok(key) => TypeKey(key),
                Err(_) => panic!(
                    "Too many component types registered, cannot register {}",
                    type_name::<T>()
                ),
            };
            names.push(type_name::<T>());
            log::debug!("Registered component type {} as #{}", type_name::<T>(), key.0);
            key
        })
    }

    /// Returns the key with the raw value `raw` if it has been assigned.
    pub fn from_raw(raw: u16) -> Option<Self> {
        let registry = REGISTRY.read();
        (raw.small_int::<usize>() < registry.names.len()).then_some(Self(raw))
    }

    /// The raw value of this key.
    pub fn get(self) -> u16 { self.0 }

    /// The raw value of this key as an index.
    pub fn index(self) -> usize { self.0.small_int() }

    /// The type name this key was registered for.
    pub fn name(self) -> &'static str {
        REGISTRY.read().names.get(self.index()).copied().expect("TypeKey is always registered")
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({}: {})", self.0, self.name())
    }
}

/// A component type together with its target.
///
/// Expressions are totally ordered by type key, then by target,
/// so that a set of expressions has a deterministic sorted order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeExpression {
    type_key: TypeKey,
    target:   Identity,
}

impl TypeExpression {
    /// Creates an expression from its parts.
    pub fn new(type_key: TypeKey, target: Identity) -> Self { Self { type_key, target } }

    /// Creates an expression for the component type `T` with the given target.
    pub fn of<T: Component>(target: Identity) -> Self { Self::new(TypeKey::of::<T>(), target) }

    /// Creates an expression for a plain `T`.
    pub fn plain<T: Component>() -> Self { Self::of::<T>(Match::PLAIN) }

    /// The component type of the expression.
    pub fn type_key(self) -> TypeKey { self.type_key }

    /// The target of the expression.
    pub fn target(self) -> Identity { self.target }

    /// Whether the target is a [`Match`] wildcard.
    pub fn is_wildcard(self) -> bool { self.target.is_wildcard() }

    /// Whether this expression, used as a pattern, matches the concrete expression `other`.
    ///
    /// The component types must be identical.
    /// Wildcard targets match according to the table in [`Match`];
    /// any other target only matches itself.
    pub fn matches(self, other: Self) -> bool {
        if self.type_key != other.type_key {
            return false;
        }

        match self.target {
            Match::ANY => true,
            Match::OBJECT => other.target.is_object(),
            Match::ENTITY => other.target.is_entity(),
            Match::TARGET => !other.target.is_none() && !other.target.is_wildcard(),
            target => target == other.target,
        }
    }
}

impl fmt::Display for TypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.target.is_none() {
            write!(f, "{}", self.type_key.name())
        } else {
            write!(f, "{}->{}", self.type_key.name(), self.target)
        }
    }
}

impl fmt::Debug for TypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self, f) }
}
