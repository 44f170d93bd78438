// src/combat/src/lib.rs

pub mod combatant;

pub use crate::combatant::Combatant;

use serde::{Deserialize, Serialize};

/// Handles combat interactions between entities
pub struct Combat;

impl Combat {
    /// Resolve one simultaneous exchange of blows.
    ///
    /// Both attack values are read before either side takes damage, and both
    /// blows always land. The returned lines are ordered defender first.
    pub fn resolve<T: Combatant + ?Sized, U: Combatant + ?Sized>(
        attacker: &mut T,
        defender: &mut U,
    ) -> CombatResult {
        let attacker_attack = attacker.attack();
        let defender_attack = defender.attack();

        defender.take_damage(attacker_attack);
        attacker.take_damage(defender_attack);

        CombatResult {
            lines: vec![
                format!(
                    "{} hits {} for {} damage",
                    attacker.name(),
                    defender.name(),
                    attacker_attack
                ),
                format!(
                    "{} hits {} for {} damage",
                    defender.name(),
                    attacker.name(),
                    defender_attack
                ),
            ],
            attacker_dead: attacker.is_dead(),
            defender_dead: defender.is_dead(),
        }
    }
}

/// Combat result with detailed logs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatResult {
    pub lines: Vec<String>, // Combat messages for UI
    pub attacker_dead: bool,
    pub defender_dead: bool,
}
