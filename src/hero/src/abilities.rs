use dungeon::Character;
use dungeon::content::read_json;
use error::GameError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::effects::{PassiveEffect, Scaling, Stat};

/// Trait for upgrade abilities (active skills and passive perks)
pub trait Ability {
    /// Get the ability name
    fn name(&self) -> &str;

    /// Get the ability description
    fn description(&self) -> &str;

    /// Get the mana cost to activate (0 for passive abilities)
    fn cost(&self) -> f32;

    /// Get the cooldown in turns (0 for no cooldown)
    fn cooldown(&self) -> u32;

    /// Check if this is a passive ability
    fn is_passive(&self) -> bool;
}

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_targets() -> u32 {
    1
}

/// Static upgrade definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    /// `None` marks the "no upgrade" placeholder
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Level numbers where the upgrade is offered
    #[serde(default)]
    pub levels: BTreeSet<u32>,
    #[serde(default)]
    pub passive: bool,
    #[serde(default)]
    pub reach: u32,
    #[serde(default = "default_targets")]
    pub max_targets: u32,
    #[serde(default)]
    pub needs_target: bool,
    #[serde(default)]
    pub cost: f32,
    /// Active turns per version
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub cooldown: u32,
    #[serde(default)]
    pub effect: Option<PassiveEffect>,
}

impl UpgradeDef {
    /// The disabled placeholder
    pub fn none() -> Self {
        Self {
            name: None,
            description: String::new(),
            version: 1,
            enabled: false,
            levels: BTreeSet::new(),
            passive: false,
            reach: 0,
            max_targets: 1,
            needs_target: false,
            cost: 0.0,
            duration: 0,
            cooldown: 0,
            effect: None,
        }
    }

    fn passive(name: &str, description: &str, levels: &[u32], stat: Stat, scaling: Scaling) -> Self {
        Self {
            name: Some(name.to_string()),
            description: description.to_string(),
            enabled: true,
            levels: levels.iter().copied().collect(),
            passive: true,
            effect: Some(PassiveEffect { stat, scaling }),
            ..Self::none()
        }
    }

    fn active(name: &str, description: &str, levels: &[u32], cost: f32, duration: u32, cooldown: u32) -> Self {
        Self {
            name: Some(name.to_string()),
            description: description.to_string(),
            enabled: true,
            levels: levels.iter().copied().collect(),
            cost,
            duration,
            cooldown,
            ..Self::none()
        }
    }
}

impl Ability for UpgradeDef {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("none")
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn cost(&self) -> f32 {
        if self.passive { 0.0 } else { self.cost }
    }

    fn cooldown(&self) -> u32 {
        self.cooldown
    }

    fn is_passive(&self) -> bool {
        self.passive
    }
}

/// Where an upgrade instance is in its activation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    Ready,
    Active,
    Cooling,
    /// Disabled or passive and idle; cannot be activated
    Unavailable,
}

/// An upgrade owned by a character, with its runtime counters
#[derive(Debug, Clone, PartialEq)]
pub struct Upgrade {
    def: UpgradeDef,
    version: u32,
    busy: u32,
    cooling: u32,
    applied: f32,
    /// Owner's stat before the first application
    baseline: Option<f32>,
    /// Stat value after the latest application
    written: f32,
}

impl Upgrade {
    pub fn new(def: UpgradeDef) -> Self {
        let version = def.version.max(1);
        Self {
            def,
            version,
            busy: 0,
            cooling: 0,
            applied: 0.0,
            baseline: None,
            written: 0.0,
        }
    }

    pub fn definition(&self) -> &UpgradeDef {
        &self.def
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn busy_remaining(&self) -> u32 {
        self.busy
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.cooling
    }

    /// Total stat adjustment currently applied to the owner
    pub fn applied(&self) -> f32 {
        self.applied
    }

    pub fn ready(&self) -> bool {
        self.def.enabled && !self.def.passive && self.busy == 0 && self.cooling == 0
    }

    pub fn is_active(&self) -> bool {
        self.busy > 0
    }

    pub fn is_cooling(&self) -> bool {
        self.busy == 0 && self.cooling > 0
    }

    pub fn state(&self) -> UpgradeState {
        if self.is_active() {
            UpgradeState::Active
        } else if self.is_cooling() {
            UpgradeState::Cooling
        } else if self.ready() {
            UpgradeState::Ready
        } else {
            UpgradeState::Unavailable
        }
    }

    /// Start the upgrade. Ignored unless ready, and unless a required target
    /// is present and within reach. Returns whether it activated.
    pub fn activate(&mut self, owner: &Character, target: Option<&Character>) -> bool {
        if !self.ready() {
            return false;
        }
        if self.def.needs_target {
            let Some(target) = target else {
                return false;
            };
            let distance = (owner.x - target.x).abs().max((owner.y - target.y).abs());
            if distance as u32 > self.def.reach {
                return false;
            }
        }
        self.busy = self.def.duration * self.version;
        self.cooling = self.def.cooldown;
        true
    }

    /// Advance one turn: the active countdown runs first, then the cooldown
    pub fn step(&mut self) {
        if self.busy > 0 {
            self.busy -= 1;
        } else if self.cooling > 0 {
            self.cooling -= 1;
        }
    }

    pub fn level_up(&mut self) {
        self.version += 1;
    }

    /// Apply the passive effect once for the current version
    pub fn apply_upgrade(&mut self, character: &mut Character) -> Option<String> {
        if !self.def.passive {
            return None;
        }
        let effect = self.def.effect?;
        let delta = effect.scaling.delta(self.version);
        self.baseline.get_or_insert(effect.stat.value(character));
        self.applied += effect.adjust(character, delta);
        self.written = effect.stat.value(character);
        Some(format!(
            "{} v{}: {} {:+.1}",
            self.def.name(),
            self.version,
            effect.stat,
            delta
        ))
    }

    /// Undo everything `apply_upgrade` added, in one step.
    ///
    /// The stat is rebuilt from the value it had before the first
    /// application, so rounding in the applied deltas never leaks into it.
    /// Changes made by others since the last application are kept.
    pub fn purge_upgrade(&mut self, character: &mut Character) -> Option<String> {
        let effect = self.def.effect?;
        let baseline = self.baseline.take()?;
        let drift = effect.stat.value(character) - self.written;
        *effect.stat.of(character) = baseline + drift;

        let total = std::mem::take(&mut self.applied);
        self.written = 0.0;
        Some(format!("{}: {} {:+.1}", self.def.name(), effect.stat, -total))
    }
}

impl Ability for Upgrade {
    fn name(&self) -> &str {
        self.def.name()
    }

    fn description(&self) -> &str {
        self.def.description()
    }

    fn cost(&self) -> f32 {
        self.def.cost()
    }

    fn cooldown(&self) -> u32 {
        self.def.cooldown()
    }

    fn is_passive(&self) -> bool {
        self.def.is_passive()
    }
}

/// Ordered table of upgrade definitions
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeTable {
    defs: Vec<UpgradeDef>,
}

impl UpgradeTable {
    /// Build a table; at most one record may be the unnamed placeholder
    pub fn from_defs(defs: Vec<UpgradeDef>) -> Result<Self, GameError> {
        let unnamed = defs.iter().filter(|d| d.name.is_none()).count();
        if unnamed > 1 {
            return Err(GameError::InvalidContent(format!(
                "upgrade table has {} unnamed records, at most one is allowed",
                unnamed
            )));
        }
        Ok(Self { defs })
    }

    pub fn load(path: &Path) -> Result<Self, GameError> {
        Self::from_defs(read_json(path)?)
    }

    pub fn builtin() -> Self {
        Self {
            defs: vec![
                UpgradeDef::none(),
                UpgradeDef::passive(
                    "regeneration",
                    "Repair subroutines restore health every turn",
                    &[1, 2, 3, 4, 5],
                    Stat::HealRate,
                    Scaling::PerVersion(0.3),
                ),
                UpgradeDef::passive(
                    "hardening",
                    "Reinforced casing raises maximum health",
                    &[2, 3, 5],
                    Stat::MaxHealth,
                    Scaling::Flat(0.5),
                ),
                UpgradeDef::passive(
                    "optimize",
                    "Tighter loops make you faster",
                    &[3, 4],
                    Stat::Speed,
                    Scaling::Flat(0.5),
                ),
                UpgradeDef::passive(
                    "map_peek",
                    "See further into the level",
                    &[2, 4],
                    Stat::ViewRange,
                    Scaling::Flat(0.5),
                ),
                UpgradeDef::active(
                    "cloak",
                    "Hide from sentries for a few turns",
                    &[1, 3],
                    5.0,
                    3,
                    8,
                ),
                UpgradeDef {
                    reach: 3,
                    needs_target: true,
                    ..UpgradeDef::active(
                        "zap",
                        "Overload a nearby sentry",
                        &[2, 4],
                        10.0,
                        1,
                        5,
                    )
                },
            ],
        }
    }

    /// Enabled definitions offered on `level`, in table order
    pub fn available_for_level(&self, level: u32) -> impl Iterator<Item = &UpgradeDef> {
        self.defs
            .iter()
            .filter(move |d| d.enabled && d.levels.contains(&level))
    }

    /// A fresh instance of the first definition named `name`
    pub fn by_name(&self, name: &str) -> Option<Upgrade> {
        self.defs
            .iter()
            .find(|d| d.name.as_deref() == Some(name))
            .map(|d| Upgrade::new(d.clone()))
    }

    /// A fresh instance of the placeholder record
    pub fn none(&self) -> Upgrade {
        self.defs
            .iter()
            .find(|d| d.name.is_none())
            .cloned()
            .map(Upgrade::new)
            .unwrap_or_else(|| Upgrade::new(UpgradeDef::none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dungeon::EntityKind;
    use proptest::prelude::*;

    fn owner() -> Character {
        let mut c = Character::new("player", EntityKind::Player, 0, 0);
        c.stats.health = 10.0;
        c.stats.max_health = 10.0;
        c
    }

    fn active(duration: u32, cooldown: u32) -> Upgrade {
        Upgrade::new(UpgradeDef::active("burst", "", &[1], 1.0, duration, cooldown))
    }

    #[test]
    fn test_activation_cycle() {
        let mut up = active(2, 3);
        let me = owner();
        assert_eq!(up.state(), UpgradeState::Ready);

        assert!(up.activate(&me, None));
        assert_eq!(up.state(), UpgradeState::Active);
        assert_eq!((up.busy_remaining(), up.cooldown_remaining()), (2, 3));

        up.step();
        up.step();
        assert_eq!(up.state(), UpgradeState::Cooling);
        assert_eq!((up.busy_remaining(), up.cooldown_remaining()), (0, 3));

        up.step();
        up.step();
        up.step();
        assert_eq!(up.state(), UpgradeState::Ready);
    }

    #[test]
    fn test_duration_scales_with_version() {
        let mut up = active(2, 1);
        up.level_up();
        up.level_up();
        assert!(up.activate(&owner(), None));
        assert_eq!(up.busy_remaining(), 6);
    }

    #[test]
    fn test_activate_when_not_ready_is_ignored() {
        let mut up = active(2, 3);
        let me = owner();
        up.activate(&me, None);
        up.step();
        let before = (up.busy_remaining(), up.cooldown_remaining());

        assert!(!up.activate(&me, None));
        assert_eq!((up.busy_remaining(), up.cooldown_remaining()), before);
    }

    #[test]
    fn test_passive_and_disabled_never_ready() {
        let table = UpgradeTable::builtin();
        let mut regen = table.by_name("regeneration").unwrap();
        assert!(!regen.ready());
        assert!(!regen.activate(&owner(), None));
        assert_eq!(regen.state(), UpgradeState::Unavailable);

        let mut none = table.none();
        assert!(!none.ready());
        assert!(!none.activate(&owner(), None));
    }

    #[test]
    fn test_targeted_upgrade_needs_target_in_reach() {
        let table = UpgradeTable::builtin();
        let mut zap = table.by_name("zap").unwrap();
        let me = owner();
        let far = Character::new("sentry", EntityKind::Ai, 5, 0);
        let near = Character::new("sentry", EntityKind::Ai, 2, 3);

        assert!(!zap.activate(&me, None));
        assert!(!zap.activate(&me, Some(&far)));
        assert!(zap.ready());
        assert!(zap.activate(&me, Some(&near)));
    }

    #[test]
    fn test_regeneration_scales_with_version() {
        let table = UpgradeTable::builtin();
        let mut regen = table.by_name("regeneration").unwrap();
        let mut me = owner();

        let msg = regen.apply_upgrade(&mut me).unwrap();
        assert!(msg.contains("heal_rate +0.3"));
        regen.level_up();
        regen.apply_upgrade(&mut me);

        assert!((me.stats.heal_rate - 0.9).abs() < 1e-6);
        assert!((regen.applied() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_flat_upgrades_ignore_version() {
        let table = UpgradeTable::builtin();
        let mut hardening = table.by_name("hardening").unwrap();
        let mut me = owner();

        hardening.level_up();
        hardening.level_up();
        hardening.apply_upgrade(&mut me);
        assert_eq!(me.stats.max_health, 10.5);

        hardening.level_up();
        assert_eq!(me.stats.max_health, 10.5);
    }

    #[test]
    fn test_purge_restores_stat() {
        let table = UpgradeTable::builtin();
        let mut peek = table.by_name("map_peek").unwrap();
        let mut me = owner();
        let before = me.stats.view_range;

        for _ in 0..4 {
            peek.level_up();
            peek.apply_upgrade(&mut me);
        }
        assert_eq!(me.stats.view_range, before + 2.0);

        let msg = peek.purge_upgrade(&mut me).unwrap();
        assert!(msg.contains("-2.0"));
        assert_eq!(me.stats.view_range, before);
        assert!(peek.purge_upgrade(&mut me).is_none());
    }

    #[test]
    fn test_regeneration_purge_restores_tenths_exactly() {
        let table = UpgradeTable::builtin();
        for tenth in 1..200 {
            let base = tenth as f32 * 0.1;
            let mut regen = table.by_name("regeneration").unwrap();
            let mut me = owner();
            me.stats.heal_rate = base;
            for _ in 0..3 {
                regen.apply_upgrade(&mut me);
                regen.level_up();
            }
            regen.purge_upgrade(&mut me);
            assert_eq!(me.stats.heal_rate, base, "base {}", base);
        }
    }

    #[test]
    fn test_purge_keeps_outside_changes() {
        let table = UpgradeTable::builtin();
        let mut hardening = table.by_name("hardening").unwrap();
        let mut me = owner();
        me.stats.max_health = 10.0;
        hardening.apply_upgrade(&mut me);
        me.stats.max_health += 2.0;

        hardening.purge_upgrade(&mut me);
        assert_eq!(me.stats.max_health, 12.0);
    }

    #[test]
    fn test_active_upgrade_has_no_passive_effect() {
        let mut up = active(1, 1);
        let mut me = owner();
        assert!(up.apply_upgrade(&mut me).is_none());
        assert!(up.purge_upgrade(&mut me).is_none());
    }

    #[test]
    fn test_available_for_level() {
        let table = UpgradeTable::builtin();
        let names: Vec<&str> = table.available_for_level(2).map(|d| d.name()).collect();
        assert_eq!(names, vec!["regeneration", "hardening", "map_peek", "zap"]);
        assert_eq!(table.available_for_level(99).count(), 0);
    }

    #[test]
    fn test_by_name_first_match_wins() {
        let mut first = UpgradeDef::active("twin", "first", &[1], 0.0, 1, 1);
        first.cooldown = 4;
        let second = UpgradeDef::active("twin", "second", &[1], 0.0, 1, 9);
        let table = UpgradeTable::from_defs(vec![first, second]).unwrap();

        let up = table.by_name("twin").unwrap();
        assert_eq!(up.description(), "first");
        assert_eq!(up.cooldown(), 4);
        assert!(table.by_name("missing").is_none());
    }

    #[test]
    fn test_two_placeholders_rejected() {
        let result = UpgradeTable::from_defs(vec![UpgradeDef::none(), UpgradeDef::none()]);
        assert!(matches!(result, Err(GameError::InvalidContent(_))));
    }

    #[test]
    fn test_definition_json_defaults() {
        let def: UpgradeDef = serde_json::from_str(r#"{"name": "cloak", "cooldown": 4}"#).unwrap();
        assert!(def.enabled);
        assert_eq!(def.version, 1);
        assert_eq!(def.max_targets, 1);
        assert!(!def.passive);
    }

    proptest! {
        #[test]
        fn prop_active_and_cooling_exclusive(
            duration in 0u32..5,
            cooldown in 0u32..6,
            ops in proptest::collection::vec(any::<bool>(), 0..40),
        ) {
            let mut up = active(duration, cooldown);
            let me = owner();
            for activate in ops {
                if activate {
                    up.activate(&me, None);
                } else {
                    let before = (up.busy_remaining(), up.cooldown_remaining());
                    up.step();
                    let after = (up.busy_remaining(), up.cooldown_remaining());
                    let moved = (before.0 - after.0) + (before.1 - after.1);
                    prop_assert!(moved <= 1);
                    if before != (0, 0) {
                        prop_assert_eq!(moved, 1);
                    }
                }
                prop_assert!(!(up.is_active() && up.is_cooling()));
            }
        }

        #[test]
        fn prop_apply_then_purge_is_identity(
            name in prop::sample::select(vec!["regeneration", "hardening", "optimize", "map_peek"]),
            steps in 1usize..8,
            base in 0.05f32..50.0,
        ) {
            let table = UpgradeTable::builtin();
            let mut up = table.by_name(name).unwrap();
            let stat = up.definition().effect.unwrap().stat;
            let mut me = owner();
            *stat.of(&mut me) = base;
            for _ in 0..steps {
                up.apply_upgrade(&mut me);
                up.level_up();
            }
            up.purge_upgrade(&mut me);
            prop_assert_eq!(stat.value(&me), base);
        }
    }
}
