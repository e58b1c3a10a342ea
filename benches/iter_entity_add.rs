use std::time::Duration;

use criterion::*;
use rand::Rng;
use tabec::World;

struct PositionX(f64);
struct PositionY(f64);
struct PositionZ(f64);
struct VelocityX(f64);
struct VelocityY(f64);
struct VelocityZ(f64);

fn individual_world(num_entities: u64) -> World {
    let world = World::new();
    let mut rng = rand::thread_rng();
    for _ in 0..num_entities {
        let entity = world.spawn().unwrap();
        entity
            .add(PositionX(rng.gen_range(-65536.0..=65536.0)))
            .and_then(|e| e.add(PositionY(rng.gen_range(-65536.0..=65536.0))))
            .and_then(|e| e.add(PositionZ(rng.gen_range(-65536.0..=65536.0))))
            .and_then(|e| e.add(VelocityX(rng.gen_range(-65536.0..=65536.0))))
            .and_then(|e| e.add(VelocityY(rng.gen_range(-65536.0..=65536.0))))
            .and_then(|e| e.add(VelocityZ(rng.gen_range(-65536.0..=65536.0))))
            .unwrap();
    }
    world
}

fn iter_entity_add_individual(c: &mut Criterion) {
    let mut group = c.benchmark_group("iter entity (a += b)");
    group.measurement_time(Duration::from_secs(10));

    for log_entities in (4..=16).step_by(4) {
        let num_entities = 1 << log_entities;
        group.throughput(Throughput::Elements(num_entities));

        group.bench_with_input(
            BenchmarkId::new("individual/for_each", format!("{num_entities} entities")),
            &num_entities,
            |b, &num_entities| {
                let world = individual_world(num_entities);
                let query = world
                    .query::<(PositionX, PositionY, PositionZ, VelocityX, VelocityY, VelocityZ)>()
                    .compile();
                b.iter(|| {
                    query
                        .for_each(|px, py, pz, vx, vy, vz| {
                            px.0 += vx.0;
                            py.0 += vy.0;
                            pz.0 += vz.0;
                        })
                        .unwrap();
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("individual/job", format!("{num_entities} entities")),
            &num_entities,
            |b, &num_entities| {
                let world = individual_world(num_entities);
                let query = world
                    .query::<(PositionX, PositionY, PositionZ, VelocityX, VelocityY, VelocityZ)>()
                    .compile();
                query.warmup();
                b.iter(|| {
                    query
                        .job(|px, py, pz, vx, vy, vz| {
                            px.0 += vx.0;
                            py.0 += vy.0;
                            pz.0 += vz.0;
                        })
                        .unwrap();
                })
            },
        );
    }
}

struct PositionArray([f64; 3]);
struct VelocityArray([f64; 3]);

fn iter_entity_add_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("iter entity (a += b)");
    group.measurement_time(Duration::from_secs(10));

    for log_entities in (4..=16).step_by(4) {
        let num_entities = 1 << log_entities;
        group.throughput(Throughput::Elements(num_entities));
        group.bench_with_input(
            BenchmarkId::new("array/raw", format!("{num_entities} entities")),
            &num_entities,
            |b, &num_entities| {
                let world = World::unthreaded();
                let mut rng = rand::thread_rng();
                for _ in 0..num_entities {
                    world
                        .spawn()
                        .and_then(|entity| {
                            entity.add(PositionArray([
                                rng.gen_range(-65536.0..=65536.0),
                                rng.gen_range(-65536.0..=65536.0),
                                rng.gen_range(-65536.0..=65536.0),
                            ]))?;
                            entity.add(VelocityArray([
                                rng.gen_range(-65536.0..=65536.0),
                                rng.gen_range(-65536.0..=65536.0),
                                rng.gen_range(-65536.0..=65536.0),
                            ]))?;
                            Ok(())
                        })
                        .unwrap();
                }
                let query = world.query::<(PositionArray, VelocityArray)>().compile();
                b.iter(|| {
                    query
                        .raw(|p, v| {
                            for (p, v) in p.iter_mut().zip(v.iter()) {
                                for i in 0..3 {
                                    p.0[i] += v.0[i];
                                }
                            }
                        })
                        .unwrap();
                })
            },
        );
    }
}

criterion_group!(individual, iter_entity_add_individual);
criterion_group!(array, iter_entity_add_array);
criterion_main!(individual, array);
