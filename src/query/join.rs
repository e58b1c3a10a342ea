//! Cross-joins stream expressions against the columns of an archetype.
//!
//! A stream expression with a wildcard target may match several columns of one archetype,
//! e.g. `Likes -> *` on an entity liking two others.
//! Runners visit every combination of matching columns,
//! except those that would hand out the same column twice.

use itertools::Itertools;

use crate::archetype::Signature;
use crate::comp::TypeExpression;

/// Returns every combination of column positions in `signature` matching `streams`.
///
/// With no streams, a single empty combination is returned.
pub(crate) fn combinations(signature: &Signature, streams: &[TypeExpression]) -> Vec<Vec<usize>> {
    if streams.is_empty() {
        return vec![Vec::new()];
    }

    streams
        .iter()
        .map(|&stream| signature.positions_matching(stream))
        .multi_cartesian_product()
        .filter(|positions| is_distinct(positions))
        .collect()
}

fn is_distinct(positions: &[usize]) -> bool {
    positions.iter().enumerate().all(|(i, position)| !positions[..i].contains(position))
}

#[cfg(test)]
mod tests {
    use super::combinations;
    use crate::archetype::Signature;
    use crate::comp::TypeExpression;
    use crate::entity::{Identity, Match};
    use crate::test_util::{Likes, Position};

    #[test]
    fn test_plain_streams() {
        let signature =
            Signature::new([TypeExpression::plain::<Position>(), TypeExpression::plain::<Likes>()]);
        let streams = [TypeExpression::of::<Position>(Match::ANY)];
        let position = signature.position(TypeExpression::plain::<Position>()).expect("inserted");
        assert_eq!(combinations(&signature, &streams), vec![vec![position]]);
    }

    #[test]
    fn test_no_streams() {
        let signature = Signature::new([TypeExpression::plain::<Position>()]);
        assert_eq!(combinations(&signature, &[]), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_missing_stream() {
        let signature = Signature::new([TypeExpression::plain::<Position>()]);
        let streams = [TypeExpression::of::<Likes>(Match::ANY)];
        assert!(combinations(&signature, &streams).is_empty());
    }

    #[test]
    fn test_wildcard_cross_join() {
        let a = Identity::entity(1, 1);
        let b = Identity::entity(2, 1);
        let signature = Signature::new([
            TypeExpression::of::<Likes>(a),
            TypeExpression::of::<Likes>(b),
            TypeExpression::plain::<Position>(),
        ]);

        let single = [TypeExpression::of::<Likes>(Match::ENTITY)];
        assert_eq!(combinations(&signature, &single).len(), 2);

        let likes = TypeExpression::of::<Likes>(Match::ANY);
        let pair = [likes, likes];
        let combos = combinations(&signature, &pair);
        assert_eq!(combos.len(), 2, "only the two orderings of distinct columns remain");
        assert!(combos.iter().all(|combo| combo[0] != combo[1]));

        let mixed = [TypeExpression::of::<Likes>(Match::ANY), TypeExpression::plain::<Position>()];
        assert_eq!(combinations(&signature, &mixed).len(), 2);
    }
}
