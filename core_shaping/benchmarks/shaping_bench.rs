use core_shaping::{
    DetectorConfig, DetectorKind, GameVariable, RewardShaper, ShapingConfig, VariableSnapshot,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_walk(steps: usize, seed: u64) -> Vec<VariableSnapshot> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut snapshot = VariableSnapshot::zeroed()
        .with(GameVariable::Health, 100.0)
        .with(GameVariable::SelectedWeapon, 2.0)
        .with(GameVariable::SelectedWeaponAmmo, 50.0);

    (0..steps)
        .map(|_| {
            let (x, y) = snapshot.position();
            snapshot = snapshot
                .with(GameVariable::PositionX, x + rng.gen_range(-2.0..2.0))
                .with(GameVariable::PositionY, y + rng.gen_range(-2.0..2.0));
            if rng.gen_bool(0.1) {
                let ammo = snapshot.get(GameVariable::SelectedWeaponAmmo);
                snapshot = snapshot.with(GameVariable::SelectedWeaponAmmo, ammo - 1.0);
            }
            if rng.gen_bool(0.02) {
                let kills = snapshot.get(GameVariable::KillCount);
                snapshot = snapshot.with(GameVariable::KillCount, kills + 1.0);
            }
            snapshot
        })
        .collect()
}

fn bench_episode(c: &mut Criterion) {
    let mut group = c.benchmark_group("episode");
    let trace = random_walk(2_100, 7);

    for kind in [DetectorKind::Basic, DetectorKind::KillAttribution] {
        let config = ShapingConfig {
            detector: DetectorConfig {
                kind,
                ..DetectorConfig::default()
            },
            ..ShapingConfig::default()
        };

        group.bench_with_input(
            BenchmarkId::new("steps", format!("{kind:?}")),
            &config,
            |b, config| {
                b.iter_batched(
                    || {
                        let mut shaper = RewardShaper::new(config).expect("valid config");
                        for _ in 0..100 {
                            shaper.new_episode();
                            shaper.first_step(trace[0]).expect("first step");
                            for snapshot in &trace[1..50] {
                                shaper.step(*snapshot).expect("step");
                            }
                            shaper.episode_finished().expect("episode end");
                        }
                        shaper
                    },
                    |mut shaper| {
                        shaper.new_episode();
                        shaper.first_step(trace[0]).expect("first step");
                        for snapshot in &trace[1..] {
                            shaper.step(*snapshot).expect("step");
                            shaper.get_reward(0.0).expect("reward");
                        }
                        shaper.episode_finished().expect("episode end");
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_heat_matrix(c: &mut Criterion) {
    let trace = random_walk(12_800, 11);
    let mut shaper = RewardShaper::new(&ShapingConfig::default()).expect("default config");
    shaper.new_episode();
    shaper.first_step(trace[0]).expect("first step");
    for snapshot in &trace[1..] {
        shaper.step(*snapshot).expect("step");
    }

    c.bench_function("heat_matrix_64", |b| {
        b.iter(|| shaper.get_position_heat_matrix((64, 64)).expect("heat matrix"))
    });
}

criterion_group!(shaping_benches, bench_episode, bench_heat_matrix);
criterion_main!(shaping_benches);
