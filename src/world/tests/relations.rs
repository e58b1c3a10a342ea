//! Tests relations, object links and the despawn cascade.

use indexmap::IndexSet;

use crate::entity::{Identity, Match};
use crate::test_util::{self, Handle, Likes, Marker, Owes, Position};
use crate::Error;

#[test]
fn test_relation_matching() {
    let world = test_util::world();
    let origin = world.spawn().expect("idle");
    let target = world.spawn().expect("idle");
    let other = world.spawn().expect("idle");
    origin.add_relation(target.id(), Likes(3)).expect("target is alive");

    assert!(origin.has_relation::<Likes>(target.id()));
    assert!(!origin.has_relation::<Likes>(other.id()));
    assert!(origin.has_relation::<Likes>(Match::ANY));
    assert!(origin.has_relation::<Likes>(Match::ENTITY));
    assert!(origin.has_relation::<Likes>(Match::TARGET));
    assert!(!origin.has_relation::<Likes>(Match::OBJECT));
    assert!(!origin.has::<Likes>());
    assert_eq!(*origin.get::<Likes>(Match::ANY).expect("present"), Likes(3));
}

#[test]
fn test_wildcard_kinds() {
    let world = test_util::world();
    let plain = world.spawn().expect("idle");
    let related = world.spawn().expect("idle");
    let linked = world.spawn().expect("idle");
    let typed = world.spawn().expect("idle");

    plain.add(Handle(0)).expect("new component");
    related.add_relation(plain.id(), Handle(1)).expect("target is alive");
    linked.add_link(Handle(2)).expect("new component");
    typed.add_relation(Identity::of_type::<Position>(), Handle(3)).expect("types are targets");

    let check = |entity: crate::Entity<'_>, any, object, entity_, target| {
        assert_eq!(entity.has_relation::<Handle>(Match::ANY), any, "{entity} ANY");
        assert_eq!(entity.has_relation::<Handle>(Match::OBJECT), object, "{entity} OBJECT");
        assert_eq!(entity.has_relation::<Handle>(Match::ENTITY), entity_, "{entity} ENTITY");
        assert_eq!(entity.has_relation::<Handle>(Match::TARGET), target, "{entity} TARGET");
    };
    check(plain, true, false, false, false);
    check(related, true, false, true, true);
    check(linked, true, true, false, true);
    check(typed, true, false, false, true);

    assert!(linked.has_link(&Handle(2)));
    assert!(!linked.has_link(&Handle(3)));
    assert_eq!(*linked.get::<Handle>(Identity::of_object(&Handle(2))).expect("linked"), Handle(2));

    linked.remove_link(&Handle(2)).expect("linked");
    assert!(!linked.has_relation::<Handle>(Match::ANY));

    typed.remove_relation::<Handle>(Identity::of_type::<Position>()).expect("related");
    assert!(!typed.has_relation::<Handle>(Match::ANY));
}

#[test]
fn test_invalid_relation_targets() {
    let world = test_util::world();
    let origin = world.spawn().expect("idle");
    let target = world.spawn().expect("idle");
    let dead = target.id();
    target.despawn().expect("alive");

    assert_eq!(origin.add_relation(dead, Likes(0)).map(|_| ()), Err(Error::Dead(dead)));
    assert!(matches!(
        origin.add_relation(Identity::of_object(&Handle(1)), Likes(0)),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(origin.add_relation(Match::PLAIN, Likes(0)), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_despawn_cascade() {
    let world = test_util::world();
    let a = world.spawn().expect("idle");
    let b = world.spawn().expect("idle");

    for i in 0..2000 {
        let entity = world.spawn().expect("idle");
        entity.add(Position(i as f64, 0.0)).expect("new component");
        let target = if i % 2 == 0 { a.id() } else { b.id() };
        entity.add_relation(target, Likes(i)).expect("target is alive");
    }

    let with_a = world.query_with::<(Likes,)>(&[a.id()]).expect("arity").compile();
    let with_b = world.query_with::<(Likes,)>(&[b.id()]).expect("arity").compile();
    let with_any = world.query::<(Likes,)>().compile();
    assert_eq!(with_a.count(), 1000);
    assert_eq!(with_b.count(), 1000);

    a.despawn().expect("alive");

    assert_eq!(with_a.count(), 0);
    assert_eq!(with_b.count(), 1000);
    assert_eq!(with_any.count(), 1000);
    assert_eq!(world.count(), 2001, "origins survive their target");
    assert_eq!(world.query::<(Position,)>().compile().count(), 2000);

    let mut sum = 0;
    with_b.for_each(|likes| sum += likes.0).expect("idle");
    assert_eq!(sum, (0..2000).filter(|i| i % 2 == 1).sum::<i32>(), "values are kept intact");
}

#[test]
fn test_despawn_self_relation() {
    let world = test_util::world();
    let narcissist = world.spawn().expect("idle");
    let admirer = world.spawn().expect("idle");
    narcissist.add_relation(narcissist.id(), Likes(1)).expect("self is alive");
    narcissist.add(Marker).expect("new component");
    admirer.add_relation(narcissist.id(), Likes(2)).expect("target is alive");

    narcissist.despawn().expect("alive");
    assert!(!narcissist.is_alive());
    assert!(!admirer.has_relation::<Likes>(Match::ANY));
    assert_eq!(world.count(), 1);
}

#[test]
fn test_despawn_all_with() {
    let world = test_util::world();
    let target = world.spawn().expect("idle");
    let plain = world.spawn().expect("idle");
    plain.add(Owes(0)).expect("new component");
    let related = world.spawn().expect("idle");
    related.add_relation(target.id(), Owes(1)).expect("target is alive");
    let linked = world.spawn().expect("idle");
    linked.add_link(Handle(9)).expect("new component");
    let bystander = world.spawn().expect("idle");
    bystander.add(Position(0.0, 0.0)).expect("new component");

    world.despawn_all_with::<Owes>(Match::ENTITY).expect("idle");
    assert!(!related.is_alive());
    assert!(plain.is_alive());

    world.despawn_all_with::<Handle>(Match::OBJECT).expect("idle");
    assert!(!linked.is_alive());

    world.despawn_all_with::<Owes>(Match::ANY).expect("idle");
    assert!(!plain.is_alive());
    assert!(bystander.is_alive());
    assert!(target.is_alive());
    assert_eq!(world.count(), 2);
}

#[test]
fn test_collect_targets() {
    let world = test_util::world();
    let a = world.spawn().expect("idle");
    let b = world.spawn().expect("idle");
    for target in [a.id(), b.id(), a.id()] {
        let origin = world.spawn().expect("idle");
        origin.add_relation(target, Likes(0)).expect("target is alive");
        origin.add(Owes(0)).expect("new component");
    }
    let linker = world.spawn().expect("idle");
    linker.add_link(Handle(5)).expect("new component");
    linker.add_relation(b.id(), Owes(1)).expect("target is alive");

    let mut targets = IndexSet::new();
    world.collect_targets::<Likes>(&mut targets);
    let mut collected: Vec<_> = targets.iter().copied().collect();
    collected.sort();
    assert_eq!(collected, vec![a.id(), b.id()]);

    targets.clear();
    world.collect_targets::<Owes>(&mut targets);
    let collected: Vec<_> = targets.into_iter().collect();
    assert_eq!(collected, vec![b.id()], "plain components are skipped");

    let mut links = IndexSet::new();
    world.collect_targets::<Handle>(&mut links);
    assert!(links.contains(&Identity::of_object(&Handle(5))));
    assert_eq!(links.len(), 1);

    a.despawn().expect("alive");
    let mut remaining = IndexSet::new();
    world.collect_targets::<Likes>(&mut remaining);
    assert_eq!(remaining.into_iter().collect::<Vec<_>>(), vec![b.id()]);
}

#[test]
fn test_links_are_keyed_by_hash() {
    #[derive(Debug, PartialEq, Eq)]
    struct Keyed {
        key:     u32,
        payload: u32,
    }

    impl std::hash::Hash for Keyed {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.key.hash(state) }
    }

    let world = test_util::world();
    let entity = world.spawn().expect("idle");
    entity.add_link(Keyed { key: 1, payload: 10 }).expect("new link");

    let same_hash = Keyed { key: 1, payload: 20 };
    let original = Identity::of_object(&Keyed { key: 1, payload: 10 });
    assert_eq!(Identity::of_object(&same_hash), original);
    assert!(matches!(entity.add_link(same_hash), Err(Error::AlreadyPresent { .. })));
    assert_eq!(entity.get::<Keyed>(Match::OBJECT).expect("linked").payload, 10);

    entity.add_link(Keyed { key: 2, payload: 20 }).expect("different hash");
    assert!(entity.has_link(&Keyed { key: 2, payload: 0 }));
}
