//! Per-step event detection.
//!
//! The detector diffs an explicit `(previous, current)` snapshot pair and emits
//! one binary slot per semantic event. Which slots exist depends on the
//! configured [`DetectorKind`].

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use shaping_schema::{GameVariable, VariableSnapshot, WEAPON_SLOTS};

use crate::config::DetectorConfig;
use crate::error::{ShapingError, ShapingResult};

pub const BASIC_EVENT_COUNT: usize = 7;
pub const WEAPON_EVENT_COUNT: usize = 26;

/// Slot indices of the seven-event basic layout.
pub mod basic_slots {
    pub const MOVEMENT: usize = 0;
    pub const SHOOTING: usize = 1;
    pub const PICKUP_AMMO: usize = 2;
    pub const PICKUP_HEALTH: usize = 3;
    pub const KILL_MONSTER: usize = 4;
    pub const DAMAGE_MONSTER: usize = 5;
    pub const PICKUP_ARMOUR: usize = 6;
}

/// Slot indices of the 26-event weapon layouts.
pub mod weapon_slots {
    pub const MOVEMENT: usize = 0;
    pub const PICKUP_HEALTH: usize = 1;
    pub const PICKUP_ARMOUR: usize = 2;
    pub const SHOOTING: usize = 3;
    pub const PICKUP_AMMO: usize = 4;
    pub const WEAPON_PICKUP_START: usize = 5;
    pub const WEAPON_PICKUP_END: usize = 14;
    pub const KILL_MONSTER: usize = 15;
    pub const KILL_MONSTER_WEAPON_START: usize = 16;
    pub const KILL_MONSTER_WEAPON_END: usize = 24;
    pub const DAMAGE_MONSTER: usize = 25;
}

/// Number of weapons that can receive an attributed kill.
const ATTRIBUTED_WEAPONS: usize =
    weapon_slots::KILL_MONSTER_WEAPON_END - weapon_slots::KILL_MONSTER_WEAPON_START + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Seven events, one kill slot, no weapon tracking.
    Basic,
    /// 26 events with weapon pickups; every kill lands on `KILL_MONSTER`.
    WeaponAware,
    /// 26 events with weapon pickups and kills attributed per selected weapon.
    #[default]
    KillAttribution,
}

/// How the selected weapon maps onto the per-weapon kill slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillSlotMapping {
    /// Weapon `i` in `0..9` sets slot `15 + i`. Weapon 0 shares the
    /// unattributed `KILL_MONSTER` slot and weapon 9 is never recorded.
    #[default]
    Legacy,
    /// Weapon `i` in `1..=9` sets slot `15 + i`; anything else falls back to
    /// the unattributed `KILL_MONSTER` slot.
    Aligned,
}

/// Fixed-width event counts. A single step holds 0/1 per slot, an episode
/// accumulator holds non-negative integer totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventVector(Vec<f64>);

impl EventVector {
    pub fn zeros(width: usize) -> Self {
        Self(vec![0.0; width])
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, slot: usize) -> f64 {
        self.0[slot]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|value| *value == 0.0)
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn sum_slots(&self, slots: RangeInclusive<usize>) -> f64 {
        self.0[slots].iter().sum()
    }

    /// Slot-wise addition of `other` into `self`.
    pub fn accumulate(&mut self, other: &EventVector) -> ShapingResult<()> {
        self.ensure_width(other.width())?;
        for (total, value) in self.0.iter_mut().zip(&other.0) {
            *total += value;
        }
        Ok(())
    }

    pub fn ensure_width(&self, actual: usize) -> ShapingResult<()> {
        check_width(self.width(), actual)
    }

    fn fire(&mut self, slot: usize) {
        self.0[slot] = 1.0;
    }
}

/// Deltas shared by every layout, computed once per step.
#[derive(Debug, Default)]
struct Triggers {
    movement: bool,
    pickup_health: bool,
    pickup_armour: bool,
    pickup_ammo: bool,
    shooting: bool,
    weapon_pickups: [bool; WEAPON_SLOTS],
    kill: bool,
    damage: bool,
}

#[derive(Debug, Clone)]
pub struct EventDetector {
    kind: DetectorKind,
    kill_slots: KillSlotMapping,
    movement_threshold_sq: f64,
    suppress_on_death: bool,
    distance_moved_sq: f64,
}

impl EventDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            kind: config.kind,
            kill_slots: config.kill_slots,
            movement_threshold_sq: config.movement_threshold * config.movement_threshold,
            suppress_on_death: config.suppress_on_death,
            distance_moved_sq: 0.0,
        }
    }

    pub fn kind(&self) -> DetectorKind {
        self.kind
    }

    pub fn width(&self) -> usize {
        match self.kind {
            DetectorKind::Basic => BASIC_EVENT_COUNT,
            DetectorKind::WeaponAware | DetectorKind::KillAttribution => WEAPON_EVENT_COUNT,
        }
    }

    pub fn zero_vector(&self) -> EventVector {
        EventVector::zeros(self.width())
    }

    /// Clears the movement accumulator at an episode boundary.
    pub fn reset(&mut self) {
        self.distance_moved_sq = 0.0;
    }

    pub fn detect(
        &mut self,
        previous: &VariableSnapshot,
        current: &VariableSnapshot,
    ) -> EventVector {
        let mut events = self.zero_vector();

        if self.suppress_on_death
            && current.get(GameVariable::DeathCount) > previous.get(GameVariable::DeathCount)
        {
            return events;
        }

        let triggers = self.triggers(previous, current);
        match self.kind {
            DetectorKind::Basic => write_basic(&mut events, &triggers),
            DetectorKind::WeaponAware => {
                write_weapon_layout(&mut events, &triggers);
                if triggers.kill {
                    events.fire(weapon_slots::KILL_MONSTER);
                }
            }
            DetectorKind::KillAttribution => {
                write_weapon_layout(&mut events, &triggers);
                if triggers.kill {
                    let selected = current.get(GameVariable::SelectedWeapon);
                    if let Some(slot) = self.attributed_kill_slot(selected) {
                        events.fire(slot);
                    }
                }
            }
        }
        events
    }

    /// Episode totals keyed by event name, the way loggers report them.
    pub fn named_totals(&self, events: &EventVector) -> Vec<(&'static str, f64)> {
        match self.kind {
            DetectorKind::Basic => vec![
                ("MOVEMENT", events.get(basic_slots::MOVEMENT)),
                ("SHOOTING", events.get(basic_slots::SHOOTING)),
                ("PICKUP_AMMO", events.get(basic_slots::PICKUP_AMMO)),
                ("PICKUP_HEALTH", events.get(basic_slots::PICKUP_HEALTH)),
                ("KILL_MONSTER", events.get(basic_slots::KILL_MONSTER)),
                ("DAMAGE_MONSTER", events.get(basic_slots::DAMAGE_MONSTER)),
                ("PICKUP_ARMOUR", events.get(basic_slots::PICKUP_ARMOUR)),
            ],
            DetectorKind::WeaponAware | DetectorKind::KillAttribution => vec![
                ("MOVEMENT", events.get(weapon_slots::MOVEMENT)),
                ("PICKUP_HEALTH", events.get(weapon_slots::PICKUP_HEALTH)),
                ("PICKUP_ARMOUR", events.get(weapon_slots::PICKUP_ARMOUR)),
                ("PICKUP_AMMO", events.get(weapon_slots::PICKUP_AMMO)),
                ("DAMAGE_MONSTER", events.get(weapon_slots::DAMAGE_MONSTER)),
                ("SHOOTING", events.get(weapon_slots::SHOOTING)),
                (
                    "WEAPON_PICKUP",
                    events.sum_slots(
                        weapon_slots::WEAPON_PICKUP_START..=weapon_slots::WEAPON_PICKUP_END,
                    ),
                ),
                ("KILL_MONSTER", events.sum_slots(self.kill_total_slots())),
            ],
        }
    }

    fn kill_total_slots(&self) -> RangeInclusive<usize> {
        match (self.kind, self.kill_slots) {
            (DetectorKind::WeaponAware, _) => {
                weapon_slots::KILL_MONSTER..=weapon_slots::KILL_MONSTER
            }
            (_, KillSlotMapping::Legacy) => {
                weapon_slots::KILL_MONSTER_WEAPON_START..=weapon_slots::KILL_MONSTER_WEAPON_END
            }
            (_, KillSlotMapping::Aligned) => {
                weapon_slots::KILL_MONSTER..=weapon_slots::KILL_MONSTER_WEAPON_END
            }
        }
    }

    fn attributed_kill_slot(&self, selected: f64) -> Option<usize> {
        let weapon = weapon_index(selected);
        match self.kill_slots {
            KillSlotMapping::Legacy => weapon
                .filter(|weapon| *weapon < ATTRIBUTED_WEAPONS)
                .map(|weapon| weapon_slots::KILL_MONSTER + weapon),
            KillSlotMapping::Aligned => Some(
                weapon
                    .filter(|weapon| (1..=ATTRIBUTED_WEAPONS).contains(weapon))
                    .map_or(weapon_slots::KILL_MONSTER, |weapon| {
                        weapon_slots::KILL_MONSTER + weapon
                    }),
            ),
        }
    }

    fn triggers(&mut self, previous: &VariableSnapshot, current: &VariableSnapshot) -> Triggers {
        let increased = |variable: GameVariable| current.get(variable) > previous.get(variable);

        let mut triggers = Triggers {
            movement: self.advance_movement(previous, current),
            pickup_health: increased(GameVariable::Health),
            pickup_armour: increased(GameVariable::Armor),
            pickup_ammo: increased(GameVariable::SelectedWeaponAmmo),
            shooting: current.get(GameVariable::SelectedWeaponAmmo)
                < previous.get(GameVariable::SelectedWeaponAmmo),
            weapon_pickups: [false; WEAPON_SLOTS],
            kill: current.kill_total() > previous.kill_total(),
            damage: increased(GameVariable::DamageCount),
        };
        for (slot, picked_up) in triggers.weapon_pickups.iter_mut().enumerate() {
            if let Some(variable) = GameVariable::weapon(slot) {
                *picked_up = increased(variable);
            }
        }
        triggers
    }

    fn advance_movement(&mut self, previous: &VariableSnapshot, current: &VariableSnapshot) -> bool {
        let (previous_x, previous_y) = previous.position();
        let (current_x, current_y) = current.position();
        let dx = current_x - previous_x;
        let dy = current_y - previous_y;
        self.distance_moved_sq += dx * dx + dy * dy;

        if self.distance_moved_sq > self.movement_threshold_sq {
            self.distance_moved_sq = 0.0;
            return true;
        }
        false
    }
}

pub(crate) fn check_width(expected: usize, actual: usize) -> ShapingResult<()> {
    if expected != actual {
        return Err(ShapingError::EventWidthMismatch { expected, actual });
    }
    Ok(())
}

fn weapon_index(selected: f64) -> Option<usize> {
    (selected >= 0.0 && selected.fract() == 0.0).then(|| selected as usize)
}

fn write_basic(events: &mut EventVector, triggers: &Triggers) {
    let slots = [
        (triggers.movement, basic_slots::MOVEMENT),
        (triggers.shooting, basic_slots::SHOOTING),
        (triggers.pickup_ammo, basic_slots::PICKUP_AMMO),
        (triggers.pickup_health, basic_slots::PICKUP_HEALTH),
        (triggers.kill, basic_slots::KILL_MONSTER),
        (triggers.damage, basic_slots::DAMAGE_MONSTER),
        (triggers.pickup_armour, basic_slots::PICKUP_ARMOUR),
    ];
    for (fired, slot) in slots {
        if fired {
            events.fire(slot);
        }
    }
}

fn write_weapon_layout(events: &mut EventVector, triggers: &Triggers) {
    let slots = [
        (triggers.movement, weapon_slots::MOVEMENT),
        (triggers.pickup_health, weapon_slots::PICKUP_HEALTH),
        (triggers.pickup_armour, weapon_slots::PICKUP_ARMOUR),
        (triggers.shooting, weapon_slots::SHOOTING),
        (triggers.pickup_ammo, weapon_slots::PICKUP_AMMO),
        (triggers.damage, weapon_slots::DAMAGE_MONSTER),
    ];
    for (fired, slot) in slots {
        if fired {
            events.fire(slot);
        }
    }
    for (weapon, picked_up) in triggers.weapon_pickups.iter().enumerate() {
        if *picked_up {
            events.fire(weapon_slots::WEAPON_PICKUP_START + weapon);
        }
    }
}
