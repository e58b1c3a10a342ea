//! Masks select archetypes by the type expressions they contain.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::archetype::Archetype;
use crate::comp::TypeExpression;
use crate::{Error, Result};


/// One of the three sets of a [`Mask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskSet {
    /// Every expression must be matched.
    Has,
    /// No expression may be matched.
    Not,
    /// At least one expression must be matched, unless the set is empty.
    Any,
}

impl fmt::Display for MaskSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Has => "has",
            Self::Not => "not",
            Self::Any => "any",
        })
    }
}

/// A predicate over archetype signatures.
///
/// Expressions in a mask may use [`Match`](crate::entity::Match) wildcard targets.
/// An archetype satisfies the mask if
/// every `has` expression matches some expression in its signature,
/// no `not` expression does,
/// and the `any` set is either empty or has an expression that does.
///
/// Unless [`unchecked`](Mask::unchecked) is set,
/// adding an expression that is already in another set is rejected,
/// so that self-contradictory masks fail early instead of matching nothing.
///
/// Equality and hashing only consider the three sets.
#[derive(Debug, Clone, Default)]
pub struct Mask {
    has:       BTreeSet<TypeExpression>,
    not:       BTreeSet<TypeExpression>,
    any:       BTreeSet<TypeExpression>,
    unchecked: bool,
}

impl Mask {
    /// Creates an empty mask, which matches every archetype.
    pub fn new() -> Self { Self::default() }

    /// Disables conflict checking.
    pub fn unchecked(mut self) -> Self {
        self.unchecked = true;
        self
    }

    /// Whether conflict checking is disabled.
    pub fn is_unchecked(&self) -> bool { self.unchecked }

    /// Requires `expr` to be matched.
    pub fn has(&mut self, expr: TypeExpression) -> Result<&mut Self> {
        self.insert(MaskSet::Has, expr)
    }

    /// Requires `expr` not to be matched.
    pub fn not(&mut self, expr: TypeExpression) -> Result<&mut Self> {
        self.insert(MaskSet::Not, expr)
    }

    /// Adds `expr` to the set of which at least one must be matched.
    pub fn any(&mut self, expr: TypeExpression) -> Result<&mut Self> {
        self.insert(MaskSet::Any, expr)
    }

    fn set(&self, set: MaskSet) -> &BTreeSet<TypeExpression> {
        match set {
            MaskSet::Has => &self.has,
            MaskSet::Not => &self.not,
            MaskSet::Any => &self.any,
        }
    }

    /// Adds `expr` to `set`, leaving the mask unmodified on conflict.
    pub fn insert(&mut self, set: MaskSet, expr: TypeExpression) -> Result<&mut Self> {
        if !self.unchecked {
            let conflict = [MaskSet::Has, MaskSet::Not, MaskSet::Any]
                .into_iter()
                .find(|&other| other != set && self.set(other).contains(&expr));
            if let Some(existing) = conflict {
                return Err(Error::Conflict { expr, added: set, existing });
            }
        }

        match set {
            MaskSet::Has => self.has.insert(expr),
            MaskSet::Not => self.not.insert(expr),
            MaskSet::Any => self.any.insert(expr),
        };
        Ok(self)
    }

    /// The expressions that must be matched.
    pub fn has_set(&self) -> &BTreeSet<TypeExpression> { &self.has }

    /// The expressions that must not be matched.
    pub fn not_set(&self) -> &BTreeSet<TypeExpression> { &self.not }

    /// The expressions of which at least one must be matched.
    pub fn any_set(&self) -> &BTreeSet<TypeExpression> { &self.any }

    /// Whether all three sets are empty.
    pub fn is_empty(&self) -> bool {
        self.has.is_empty() && self.not.is_empty() && self.any.is_empty()
    }

    /// Removes all expressions.
    pub fn clear(&mut self) {
        self.has.clear();
        self.not.clear();
        self.any.clear();
    }

    /// Whether `archetype` satisfies the mask.
    pub fn matches(&self, archetype: &Archetype) -> bool {
        self.has.iter().all(|&expr| archetype.matches(expr))
            && !self.not.iter().any(|&expr| archetype.matches(expr))
            && (self.any.is_empty() || self.any.iter().any(|&expr| archetype.matches(expr)))
    }
}

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        self.has == other.has && self.not == other.not && self.any == other.any
    }
}

impl Eq for Mask {}

impl Hash for Mask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.has.hash(state);
        self.not.hash(state);
        self.any.hash(state);
    }
}
