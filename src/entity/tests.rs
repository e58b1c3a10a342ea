use std::collections::HashSet;

use super::pool::IdentityPool;
use super::{Identity, Kind, Match};
use crate::test_util::{self, Handle, Position};
use crate::World;

static_assertions::assert_impl_all!(Identity: Copy, Send, Sync, Ord, std::hash::Hash);
static_assertions::assert_impl_all!(super::Entity<'static>: Copy, Send, Sync);

#[test]
fn test_identity_layout() {
    let identity = Identity::entity(42, 7);
    assert_eq!(identity.index(), 42);
    assert_eq!(identity.generation(), 7);
    assert_eq!(identity.kind(), Kind::Entity);
    assert_eq!(identity.to_bits(), 42 | 7 << 32);
    assert_eq!(identity.to_string(), "E42:7");
}

#[test]
fn test_identity_kinds() {
    test_util::init();

    assert_eq!(Identity::NONE.kind(), Kind::None);
    assert_eq!(Match::PLAIN, Identity::NONE);
    for wildcard in [Match::ANY, Match::OBJECT, Match::ENTITY, Match::TARGET] {
        assert_eq!(wildcard.kind(), Kind::Wildcard);
        assert!(!wildcard.is_entity());
    }
    assert_eq!(Match::ANY.to_string(), "*");
    assert_eq!(Match::TARGET.to_string(), "*Target");

    let ty = Identity::of_type::<Position>();
    assert_eq!(ty.kind(), Kind::Type);
    assert_eq!(ty, Identity::of_type::<Position>());
    assert!(ty.to_string().contains("Position"));

    let object = Identity::of_object(&Handle(3));
    assert_eq!(object.kind(), Kind::Object);
    assert_eq!(object, Identity::of_object(&Handle(3)));
    assert_ne!(object, Identity::of_object(&Handle(4)));
}

#[test]
fn test_successor_skips_zero() {
    let identity = Identity::entity(3, u16::MAX);
    let next = identity.successor();
    assert_eq!(next.index(), 3);
    assert_eq!(next.generation(), 1);
    assert!(!next.is_none());
}

#[test]
fn test_pool_recycles_fifo() {
    test_util::init();

    let mut pool = IdentityPool::default();
    let ids: Vec<_> = (0..3).map(|_| pool.allocate()).collect();
    assert_eq!(ids.iter().map(|id| id.index()).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(ids.iter().all(|id| id.generation() == 1));

    assert!(pool.release(ids[2]));
    assert!(pool.release(ids[0]));
    assert!(!pool.release(ids[0]), "double release must be rejected");
    assert_eq!(pool.live_count(), 1);

    let reused = pool.allocate();
    assert_eq!(reused.index(), 2, "the earliest released index is reused first");
    assert_eq!(reused.generation(), 2);
    assert!(!pool.is_alive(ids[2]), "the stale handle must not be alive");
    assert!(pool.is_alive(reused));

    let reused = pool.allocate();
    assert_eq!(reused.index(), 0);
    assert_eq!(pool.allocate().index(), 3);
}

#[test]
fn test_pool_rejects_non_entities() {
    let mut pool = IdentityPool::default();
    pool.allocate();
    assert!(!pool.is_alive(Identity::NONE));
    assert!(!pool.is_alive(Match::ANY));
    assert!(!pool.is_alive(Identity::entity(0, 2)));
    assert!(!pool.is_alive(Identity::entity(1, 1)));
}

#[test]
fn test_entity_equality_is_world_scoped() {
    let world_a = test_util::world();
    let world_b = test_util::world();

    let a1 = world_a.spawn().expect("world is not borrowed");
    let a2 = world_a.spawn().expect("world is not borrowed");
    let b1 = world_b.spawn().expect("world is not borrowed");

    assert_eq!(a1.id(), b1.id(), "both worlds allocate index 0 first");
    assert_ne!(a1, b1);
    assert_ne!(a1, a2);
    assert_eq!(a1, world_a.entity(a1.id()));

    let set: HashSet<_> = [a1, a2, world_a.entity(a1.id())].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn test_respawn_bumps_generation() {
    let world = World::unthreaded();

    let first = world.spawn().expect("world is not borrowed").id();
    world.despawn(first).expect("entity is alive");
    assert!(!world.is_alive(first));

    let second = world.spawn().expect("world is not borrowed").id();
    assert_eq!(second.index(), first.index());
    assert_eq!(second.generation(), first.generation() + 1);
    assert!(world.is_alive(second));
    assert!(!world.is_alive(first));
}
