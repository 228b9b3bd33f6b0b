#![allow(dead_code)]

use core_shaping::{GameVariable, TraceRecord, VariableSnapshot};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub fn spawn_snapshot() -> VariableSnapshot {
    VariableSnapshot::zeroed()
        .with(GameVariable::Health, 100.0)
        .with(GameVariable::SelectedWeapon, 2.0)
        .with(GameVariable::SelectedWeaponAmmo, 50.0)
        .with(GameVariable::Ammo2, 50.0)
        .with(GameVariable::Weapon2, 1.0)
        .with(GameVariable::OnGround, 1.0)
}

/// Deterministic episode of `steps` snapshots with random movement, shots,
/// pickups and kills.
pub fn scripted_episode(seed: u64, steps: usize) -> Vec<VariableSnapshot> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut snapshot = spawn_snapshot();
    let mut episode = Vec::with_capacity(steps);
    episode.push(snapshot);

    for _ in 1..steps {
        let (x, y) = snapshot.position();
        snapshot = snapshot
            .with(GameVariable::PositionX, x + rng.gen_range(-1.5..1.5))
            .with(GameVariable::PositionY, y + rng.gen_range(-1.5..1.5));

        let ammo = snapshot.get(GameVariable::SelectedWeaponAmmo);
        if rng.gen_bool(0.15) && ammo > 0.0 {
            snapshot = snapshot.with(GameVariable::SelectedWeaponAmmo, ammo - 1.0);
            if rng.gen_bool(0.3) {
                let damage = snapshot.get(GameVariable::DamageCount);
                snapshot = snapshot.with(GameVariable::DamageCount, damage + 20.0);
            }
            if rng.gen_bool(0.1) {
                let kills = snapshot.get(GameVariable::KillCount);
                snapshot = snapshot.with(GameVariable::KillCount, kills + 1.0);
            }
        }
        if rng.gen_bool(0.02) {
            let health = snapshot.get(GameVariable::Health);
            snapshot = snapshot.with(GameVariable::Health, health + 10.0);
        }
        episode.push(snapshot);
    }
    episode
}

/// The episode as trace records with a constant living penalty.
pub fn episode_trace(seed: u64, steps: usize) -> Vec<TraceRecord> {
    let mut records = vec![TraceRecord::NewEpisode];
    records.extend(
        scripted_episode(seed, steps)
            .into_iter()
            .map(|variables| TraceRecord::Step {
                reward: -0.01,
                variables,
            }),
    );
    records.push(TraceRecord::EpisodeFinished);
    records
}
