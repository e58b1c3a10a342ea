//! An archetype-table ECS storage engine.
//!
//! # Entities and components
//! A [`World`] stores entities, each identified by a generational [`Identity`].
//! Any `Send + Sync + 'static` type is a [`Component`](comp::Component).
//! A component is attached to an entity together with a *target*:
//! - plain components have no target ([`Match::PLAIN`]),
//! - relations target another entity or a component type,
//! - object links target the hash of a value outside the world.
//!
//! The same component type can be attached multiple times with different targets,
//! e.g. an entity can `Likes` several other entities.
//! When an entity is despawned, every relation targeting it is removed from its holders.
//!
//! # Archetypes
//! Entities with the same set of [type expressions](comp::TypeExpression)
//! are stored together in one [`archetype::Archetype`] table, one column per expression.
//! Adding or removing a component moves the entity to another archetype.
//!
//! # Queries
//! A [`Query`] selects archetypes with a [`Mask`] of `has`, `not` and `any` expressions,
//! which may use [`Match`] wildcards as targets.
//! Compiled queries keep track of archetypes created later on,
//! and run closures over the stream columns either sequentially
//! or in chunks on the world's worker threads.
//!
//! ```
//! use tabec::entity::Match;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position(f32);
//! struct Velocity(f32);
//!
//! let world = tabec::World::new();
//! let entity = world.spawn()?;
//! entity.add(Position(0.0))?.add(Velocity(2.0))?;
//!
//! let query = world.query::<(Position, Velocity)>().compile();
//! query.job(|position, velocity| position.0 += velocity.0)?;
//! assert_eq!(*entity.get::<Position>(Match::PLAIN)?, Position(2.0));
//! # Ok::<(), tabec::Error>(())
//! ```
//!
//! # Structural changes during iteration
//! Query runners lock the world.
//! Spawning, despawning, adding and removing components while the world is locked
//! are deferred and applied in order when the last lock is released.

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(doc, warn(missing_docs))]

pub mod archetype;

pub mod comp;
pub use comp::{Component, TypeExpression};

pub mod entity;
pub use entity::{Entity, Identity, Match};

mod error;
pub use error::{Error, Result};

pub mod job;

pub mod mask;
pub use mask::Mask;

pub mod query;
pub use query::Query;

#[cfg(any(test, feature = "internal-bench"))]
#[doc(hidden)]
pub mod test_util;

pub mod world;
pub use world::World;
