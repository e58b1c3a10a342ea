use std::fmt;

use crate::comp::TypeExpression;

/// The sorted set of type expressions stored in an archetype.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature(Box<[TypeExpression]>);

impl Signature {
    /// Creates a signature from expressions in any order, removing duplicates.
    pub fn new(exprs: impl IntoIterator<Item = TypeExpression>) -> Self {
        let mut exprs: Vec<_> = exprs.into_iter().collect();
        exprs.sort_unstable();
        exprs.dedup();
        Self(exprs.into_boxed_slice())
    }

    /// The expressions in sorted order.
    pub fn as_slice(&self) -> &[TypeExpression] { &self.0 }

    /// Iterates over the expressions in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = TypeExpression> + '_ { self.0.iter().copied() }

    /// The number of expressions.
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether this is the empty signature.
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// The position of an exact expression.
    pub fn position(&self, expr: TypeExpression) -> Option<usize> {
        self.0.binary_search(&expr).ok()
    }

    /// Whether the signature contains an exact expression.
    pub fn contains(&self, expr: TypeExpression) -> bool { self.position(expr).is_some() }

    /// Whether any expression matches the pattern, which may contain a wildcard target.
    pub fn matches(&self, pattern: TypeExpression) -> bool {
        self.positions_matching(pattern).next().is_some()
    }

    /// The positions of all expressions matching the pattern.
    pub fn positions_matching(
        &self,
        pattern: TypeExpression,
    ) -> impl Iterator<Item = usize> + Clone + '_ {
        // expressions of the same type are contiguous
        let start = self.0.partition_point(|expr| expr.type_key() < pattern.type_key());
        self.0[start..]
            .iter()
            .take_while(move |expr| expr.type_key() == pattern.type_key())
            .enumerate()
            .filter(move |(_, expr)| pattern.matches(**expr))
            .map(move |(offset, _)| start + offset)
    }

    /// Returns a new signature with `expr` added.
    pub fn with(&self, expr: TypeExpression) -> Self { Self::new(self.iter().chain([expr])) }

    /// Returns a new signature without the expressions selected by `predicate`.
    pub fn without(&self, mut predicate: impl FnMut(TypeExpression) -> bool) -> Self {
        Self(self.iter().filter(|&expr| !predicate(expr)).collect())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, expr) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{expr}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self, f) }
}
