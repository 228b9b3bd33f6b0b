//! Additive shaping terms that sit beside the event-rarity reward.

use shaping_schema::{GameVariable, VariableSnapshot};

use crate::config::AuxiliaryPolicy;

/// Observes the same per-step snapshot as the detector and contributes an
/// extra reward term. Instances live for one episode.
pub trait AuxiliaryShaping: Send + std::fmt::Debug {
    fn reward(&mut self, snapshot: &VariableSnapshot) -> f64;
}

/// Kill/death delta reward for matches against scripted bots.
#[derive(Debug, Default, Clone)]
pub struct BotsAuxiliaryShaping {
    last_kill_total: f64,
    last_death_count: f64,
}

impl AuxiliaryShaping for BotsAuxiliaryShaping {
    fn reward(&mut self, snapshot: &VariableSnapshot) -> f64 {
        let kill_total = snapshot.kill_total();
        let death_count = snapshot.get(GameVariable::DeathCount);

        let mut reward = 0.0;
        if kill_total > self.last_kill_total {
            reward += 1.0;
        }
        if death_count > self.last_death_count {
            reward -= 1.0;
        }

        self.last_kill_total = kill_total;
        self.last_death_count = death_count;
        reward
    }
}

/// Fresh auxiliary instance for a new episode, if the policy asks for one.
pub fn instantiate(policy: AuxiliaryPolicy) -> Option<Box<dyn AuxiliaryShaping>> {
    match policy {
        AuxiliaryPolicy::None => None,
        AuxiliaryPolicy::Bots => Some(Box::new(BotsAuxiliaryShaping::default())),
    }
}
