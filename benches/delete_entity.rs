use criterion::*;
use tabec::test_util::CompN;
use xias::Xias;

fn delete_entity(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete entity");

    macro_rules! delete_entity_batch {
        ($num_comps:literal; $($comps:expr),* $(,)?) => {
            for log_entities in (0..=8).step_by(4) {
                let entities = 1 << log_entities;
                group.throughput(Throughput::Elements(entities));
                group.bench_with_input(BenchmarkId::new(format!("{} components", $num_comps), format!("{entities} entities")), &entities, |b, &entities| {
                    b.iter_batched(
                        || {
                            let world = tabec::World::unthreaded();
                            let mut vec = Vec::with_capacity(entities.small_int());
                            for _ in 0..entities {
                                let entity = world.spawn().unwrap();
                                $(entity.add($comps).unwrap();)*
                                vec.push(entity.id());
                            }
                            (world, vec)
                        },
                        |(world, vec)| {
                            for identity in vec {
                                world.despawn(identity).unwrap();
                            }
                            world
                        },
                        BatchSize::SmallInput,
                    );
                });
            }
        }
    }

    delete_entity_batch!(0; );
    delete_entity_batch!(1; CompN::<1>(1));
    delete_entity_batch!(2; CompN::<1>(1), CompN::<2>(2));
    delete_entity_batch!(4; CompN::<1>(1), CompN::<2>(2), CompN::<3>(3), CompN::<4>(4));
    delete_entity_batch!(8; CompN::<1>(1), CompN::<2>(2), CompN::<3>(3), CompN::<4>(4), CompN::<5>(5), CompN::<6>(6), CompN::<7>(7), CompN::<8>(8));
    delete_entity_batch!(16; CompN::<1>(1), CompN::<2>(2), CompN::<3>(3), CompN::<4>(4), CompN::<5>(5), CompN::<6>(6), CompN::<7>(7), CompN::<8>(8), CompN::<9>(9), CompN::<10>(10), CompN::<11>(11), CompN::<12>(12), CompN::<13>(13), CompN::<14>(14), CompN::<15>(15), CompN::<16>(16));
}

criterion_group!(benches, delete_entity);
criterion_main!(benches);
