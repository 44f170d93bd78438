// src/hero/src/lib.rs
//! 玩家升级系统
//!
//! Upgrade definitions, per-instance cooldown state and the set of upgrades
//! the player carries from level to level.

pub mod abilities;
pub mod effects;

use dungeon::Character;
use thiserror::Error;

pub use self::{
    abilities::{Ability, Upgrade, UpgradeDef, UpgradeState, UpgradeTable},
    effects::{PassiveEffect, Scaling, Stat},
};

/// Why a slot could not be activated
#[derive(Debug, Error, PartialEq)]
pub enum ActivationError {
    #[error("no upgrade in slot {0}")]
    NoSuchSlot(usize),
    #[error("{0} is not ready")]
    NotReady(String),
    #[error("{name} needs {needed:.0} mana, you have {have:.0}")]
    NotEnoughMana { name: String, needed: f32, have: f32 },
    #[error("{0} needs a target in reach")]
    NoTarget(String),
}

/// Upgrades owned by the player, in acquisition order
#[derive(Debug, Clone, Default)]
pub struct UpgradeSet {
    slots: Vec<Upgrade>,
}

impl UpgradeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `def`, or level up the owned upgrade of the same name, then
    /// apply it once to `owner`.
    pub fn acquire(&mut self, def: &UpgradeDef, owner: &mut Character) -> Option<String> {
        let existing = self
            .slots
            .iter()
            .position(|u| def.name.is_some() && u.definition().name == def.name);
        let upgrade = match existing {
            Some(index) => {
                let upgrade = &mut self.slots[index];
                upgrade.level_up();
                upgrade
            }
            None => {
                self.slots.push(Upgrade::new(def.clone()));
                let last = self.slots.len() - 1;
                &mut self.slots[last]
            }
        };
        upgrade.apply_upgrade(owner)
    }

    /// Activate the upgrade in `slot`, paying its mana cost from `owner`
    pub fn activate(
        &mut self,
        slot: usize,
        owner: &mut Character,
        target: Option<&Character>,
    ) -> Result<&Upgrade, ActivationError> {
        let upgrade = self
            .slots
            .get_mut(slot)
            .ok_or(ActivationError::NoSuchSlot(slot))?;
        let name = upgrade.name().to_string();
        if !upgrade.ready() {
            return Err(ActivationError::NotReady(name));
        }
        let cost = upgrade.cost();
        if owner.stats.mana < cost {
            return Err(ActivationError::NotEnoughMana {
                name,
                needed: cost,
                have: owner.stats.mana,
            });
        }
        if !upgrade.activate(owner, target) {
            return Err(ActivationError::NoTarget(name));
        }
        owner.stats.mana -= cost;
        Ok(upgrade)
    }

    /// Advance every owned upgrade by one turn
    pub fn step_all(&mut self) {
        for upgrade in &mut self.slots {
            upgrade.step();
        }
    }

    /// Reverse every passive adjustment on `owner`
    pub fn purge_all(&mut self, owner: &mut Character) -> Vec<String> {
        self.slots
            .iter_mut()
            .filter_map(|u| u.purge_upgrade(owner))
            .collect()
    }

    pub fn get(&self, slot: usize) -> Option<&Upgrade> {
        self.slots.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Upgrade> {
        self.slots.get_mut(slot)
    }

    pub fn by_name(&self, name: &str) -> Option<&Upgrade> {
        self.slots.iter().find(|u| u.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Upgrade> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
