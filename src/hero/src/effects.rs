// src/hero/src/effects.rs
use dungeon::Character;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Character stat a passive upgrade can adjust
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stat {
    Health,
    MaxHealth,
    Speed,
    ViewRange,
    HealRate,
}

impl Stat {
    /// Mutable handle on the stat inside a character
    pub fn of(self, character: &mut Character) -> &mut f32 {
        let s = &mut character.stats;
        match self {
            Stat::Health => &mut s.health,
            Stat::MaxHealth => &mut s.max_health,
            Stat::Speed => &mut s.speed,
            Stat::ViewRange => &mut s.view_range,
            Stat::HealRate => &mut s.heal_rate,
        }
    }

    pub fn value(self, character: &Character) -> f32 {
        let s = &character.stats;
        match self {
            Stat::Health => s.health,
            Stat::MaxHealth => s.max_health,
            Stat::Speed => s.speed,
            Stat::ViewRange => s.view_range,
            Stat::HealRate => s.heal_rate,
        }
    }
}

/// How much one application of a passive upgrade changes its stat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "amount")]
pub enum Scaling {
    /// `amount * version` per application
    PerVersion(f32),
    /// `amount` per application regardless of version
    Flat(f32),
}

impl Scaling {
    pub fn delta(self, version: u32) -> f32 {
        match self {
            Scaling::PerVersion(amount) => amount * version as f32,
            Scaling::Flat(amount) => amount,
        }
    }
}

/// Stat change granted by a passive upgrade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassiveEffect {
    pub stat: Stat,
    pub scaling: Scaling,
}

impl PassiveEffect {
    /// Add `amount` to the stat, returning the amount applied
    pub fn adjust(&self, character: &mut Character, amount: f32) -> f32 {
        *self.stat.of(character) += amount;
        amount
    }
}
