//! Data contracts shared by the reward-shaping core and its drivers.
//!
//! A [`VariableSnapshot`] is the fixed-schema set of game variables sampled once
//! per simulation step. [`TraceRecord`] is the JSON-lines format used to replay
//! recorded telemetry through a shaper outside of the game process.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of weapon slots exposed by the engine (`WEAPON0..WEAPON9`).
pub const WEAPON_SLOTS: usize = 10;

/// Total number of variables in a snapshot.
pub const VARIABLE_COUNT: usize = 31;

/// Game variables sampled every step, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum GameVariable {
    Health = 0,
    Armor,
    SelectedWeapon,
    SelectedWeaponAmmo,
    Ammo0,
    Ammo1,
    Ammo2,
    Ammo3,
    Ammo4,
    Ammo5,
    Ammo6,
    Ammo7,
    Ammo8,
    Ammo9,
    Weapon0,
    Weapon1,
    Weapon2,
    Weapon3,
    Weapon4,
    Weapon5,
    Weapon6,
    Weapon7,
    Weapon8,
    Weapon9,
    PositionX,
    PositionY,
    KillCount,
    FragCount,
    DeathCount,
    DamageCount,
    OnGround,
}

impl GameVariable {
    pub const ALL: [GameVariable; VARIABLE_COUNT] = [
        GameVariable::Health,
        GameVariable::Armor,
        GameVariable::SelectedWeapon,
        GameVariable::SelectedWeaponAmmo,
        GameVariable::Ammo0,
        GameVariable::Ammo1,
        GameVariable::Ammo2,
        GameVariable::Ammo3,
        GameVariable::Ammo4,
        GameVariable::Ammo5,
        GameVariable::Ammo6,
        GameVariable::Ammo7,
        GameVariable::Ammo8,
        GameVariable::Ammo9,
        GameVariable::Weapon0,
        GameVariable::Weapon1,
        GameVariable::Weapon2,
        GameVariable::Weapon3,
        GameVariable::Weapon4,
        GameVariable::Weapon5,
        GameVariable::Weapon6,
        GameVariable::Weapon7,
        GameVariable::Weapon8,
        GameVariable::Weapon9,
        GameVariable::PositionX,
        GameVariable::PositionY,
        GameVariable::KillCount,
        GameVariable::FragCount,
        GameVariable::DeathCount,
        GameVariable::DamageCount,
        GameVariable::OnGround,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Per-weapon ammo counter for `slot` in `0..WEAPON_SLOTS`.
    pub fn ammo(slot: usize) -> Option<Self> {
        (slot < WEAPON_SLOTS).then(|| Self::ALL[GameVariable::Ammo0.index() + slot])
    }

    /// Per-weapon "owned" flag for `slot` in `0..WEAPON_SLOTS`.
    pub fn weapon(slot: usize) -> Option<Self> {
        (slot < WEAPON_SLOTS).then(|| Self::ALL[GameVariable::Weapon0.index() + slot])
    }

    pub fn name(self) -> &'static str {
        match self {
            GameVariable::Health => "HEALTH",
            GameVariable::Armor => "ARMOR",
            GameVariable::SelectedWeapon => "SELECTED_WEAPON",
            GameVariable::SelectedWeaponAmmo => "SELECTED_WEAPON_AMMO",
            GameVariable::Ammo0 => "AMMO0",
            GameVariable::Ammo1 => "AMMO1",
            GameVariable::Ammo2 => "AMMO2",
            GameVariable::Ammo3 => "AMMO3",
            GameVariable::Ammo4 => "AMMO4",
            GameVariable::Ammo5 => "AMMO5",
            GameVariable::Ammo6 => "AMMO6",
            GameVariable::Ammo7 => "AMMO7",
            GameVariable::Ammo8 => "AMMO8",
            GameVariable::Ammo9 => "AMMO9",
            GameVariable::Weapon0 => "WEAPON0",
            GameVariable::Weapon1 => "WEAPON1",
            GameVariable::Weapon2 => "WEAPON2",
            GameVariable::Weapon3 => "WEAPON3",
            GameVariable::Weapon4 => "WEAPON4",
            GameVariable::Weapon5 => "WEAPON5",
            GameVariable::Weapon6 => "WEAPON6",
            GameVariable::Weapon7 => "WEAPON7",
            GameVariable::Weapon8 => "WEAPON8",
            GameVariable::Weapon9 => "WEAPON9",
            GameVariable::PositionX => "POSITION_X",
            GameVariable::PositionY => "POSITION_Y",
            GameVariable::KillCount => "KILLCOUNT",
            GameVariable::FragCount => "FRAGCOUNT",
            GameVariable::DeathCount => "DEATHCOUNT",
            GameVariable::DamageCount => "DAMAGECOUNT",
            GameVariable::OnGround => "ON_GROUND",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|variable| variable.name() == name)
    }
}

impl fmt::Display for GameVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot is missing game variable {0}")]
    MissingVariable(GameVariable),
    #[error("snapshot contains unknown game variable {0:?}")]
    UnknownVariable(String),
    #[error("snapshot has {actual} values, schema expects {expected}")]
    Length { expected: usize, actual: usize },
}

/// Immutable per-step sample of every schema variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, f64>",
    into = "BTreeMap<String, f64>"
)]
pub struct VariableSnapshot {
    values: [f64; VARIABLE_COUNT],
}

impl VariableSnapshot {
    /// Build from values laid out in [`GameVariable::ALL`] order.
    pub fn from_slice(values: &[f64]) -> Result<Self, SnapshotError> {
        let values: [f64; VARIABLE_COUNT] =
            values.try_into().map_err(|_| SnapshotError::Length {
                expected: VARIABLE_COUNT,
                actual: values.len(),
            })?;
        Ok(Self { values })
    }

    /// Build from a complete name → value mapping. Every schema variable must
    /// be present and no extra names are accepted.
    pub fn from_named<'a, I>(pairs: I) -> Result<Self, SnapshotError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut slots: [Option<f64>; VARIABLE_COUNT] = [None; VARIABLE_COUNT];
        for (name, value) in pairs {
            let variable = GameVariable::from_name(name)
                .ok_or_else(|| SnapshotError::UnknownVariable(name.to_string()))?;
            slots[variable.index()] = Some(value);
        }

        let mut values = [0.0; VARIABLE_COUNT];
        for variable in GameVariable::ALL {
            values[variable.index()] =
                slots[variable.index()].ok_or(SnapshotError::MissingVariable(variable))?;
        }
        Ok(Self { values })
    }

    /// Snapshot with every variable at zero. Mostly useful as a test baseline.
    pub fn zeroed() -> Self {
        Self {
            values: [0.0; VARIABLE_COUNT],
        }
    }

    pub fn get(&self, variable: GameVariable) -> f64 {
        self.values[variable.index()]
    }

    /// Copy of this snapshot with one variable replaced.
    pub fn with(mut self, variable: GameVariable, value: f64) -> Self {
        self.values[variable.index()] = value;
        self
    }

    pub fn position(&self) -> (f64, f64) {
        (
            self.get(GameVariable::PositionX),
            self.get(GameVariable::PositionY),
        )
    }

    /// Monsters killed plus players fragged.
    pub fn kill_total(&self) -> f64 {
        self.get(GameVariable::KillCount) + self.get(GameVariable::FragCount)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

impl TryFrom<BTreeMap<String, f64>> for VariableSnapshot {
    type Error = SnapshotError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        VariableSnapshot::from_named(map.iter().map(|(name, value)| (name.as_str(), *value)))
    }
}

impl From<VariableSnapshot> for BTreeMap<String, f64> {
    fn from(snapshot: VariableSnapshot) -> Self {
        GameVariable::ALL
            .iter()
            .map(|variable| (variable.name().to_string(), snapshot.get(*variable)))
            .collect()
    }
}

/// One line of a recorded telemetry trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    NewEpisode,
    Step {
        reward: f64,
        variables: VariableSnapshot,
    },
    EpisodeFinished,
}

impl TraceRecord {
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_order_matches_discriminants() {
        for (position, variable) in GameVariable::ALL.iter().enumerate() {
            assert_eq!(variable.index(), position);
        }
        assert_eq!(GameVariable::ammo(3), Some(GameVariable::Ammo3));
        assert_eq!(GameVariable::weapon(9), Some(GameVariable::Weapon9));
        assert_eq!(GameVariable::weapon(10), None);
    }

    #[test]
    fn names_resolve_back_to_variables() {
        for variable in GameVariable::ALL {
            assert_eq!(GameVariable::from_name(variable.name()), Some(variable));
        }
        assert_eq!(GameVariable::from_name("health"), None);
    }

    #[test]
    fn named_snapshot_requires_every_variable() {
        let pairs: Vec<(&str, f64)> = GameVariable::ALL
            .iter()
            .filter(|variable| **variable != GameVariable::Armor)
            .map(|variable| (variable.name(), 1.0))
            .collect();

        let err = VariableSnapshot::from_named(pairs).unwrap_err();
        assert_eq!(err, SnapshotError::MissingVariable(GameVariable::Armor));
    }

    #[test]
    fn named_snapshot_rejects_unknown_names() {
        let mut pairs: Vec<(&str, f64)> = GameVariable::ALL
            .iter()
            .map(|variable| (variable.name(), 0.0))
            .collect();
        pairs.push(("JETPACK_FUEL", 3.0));

        let err = VariableSnapshot::from_named(pairs).unwrap_err();
        assert_eq!(err, SnapshotError::UnknownVariable("JETPACK_FUEL".into()));
    }

    #[test]
    fn slice_length_is_checked() {
        let err = VariableSnapshot::from_slice(&[0.0; 8]).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::Length {
                expected: VARIABLE_COUNT,
                actual: 8
            }
        );
    }

    #[test]
    fn kill_total_includes_frags() {
        let snapshot = VariableSnapshot::zeroed()
            .with(GameVariable::KillCount, 2.0)
            .with(GameVariable::FragCount, 3.0);
        assert_eq!(snapshot.kill_total(), 5.0);
    }

    #[test]
    fn trace_records_parse_from_json_lines() {
        let snapshot = VariableSnapshot::zeroed().with(GameVariable::Health, 100.0);
        let line = TraceRecord::Step {
            reward: -1.0,
            variables: snapshot,
        }
        .to_json_line()
        .expect("serialize step");
        assert!(line.contains("\"type\":\"step\""));
        assert!(line.contains("\"HEALTH\":100.0"));

        let parsed = TraceRecord::from_json_line(&line).expect("parse step");
        match parsed {
            TraceRecord::Step { reward, variables } => {
                assert_eq!(reward, -1.0);
                assert_eq!(variables.get(GameVariable::Health), 100.0);
            }
            other => panic!("unexpected record {other:?}"),
        }

        let marker = TraceRecord::from_json_line(r#"{"type":"new_episode"}"#).expect("marker");
        assert_eq!(marker, TraceRecord::NewEpisode);
    }

    #[test]
    fn incomplete_trace_step_is_rejected() {
        let line = r#"{"type":"step","reward":0.0,"variables":{"HEALTH":100.0}}"#;
        assert!(TraceRecord::from_json_line(line).is_err());
    }
}
