//! Characters and map objects living on a level.

use combat::Combatant;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::level::tiles::Placement;
use crate::properties::PropertyBag;

/// What an entity is, parsed from the placement or definition `type`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Player,
    Ai,
    Door,
    Switch,
    Terminal,
    Exit,
    /// Any other scenery type exported by the editor
    Scenery(String),
}

impl EntityKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "player" => EntityKind::Player,
            "ai" => EntityKind::Ai,
            "door" => EntityKind::Door,
            "switch" => EntityKind::Switch,
            "terminal" => EntityKind::Terminal,
            "exit" => EntityKind::Exit,
            other => EntityKind::Scenery(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Ai => "ai",
            EntityKind::Door => "door",
            EntityKind::Switch => "switch",
            EntityKind::Terminal => "terminal",
            EntityKind::Exit => "exit",
            EntityKind::Scenery(s) => s,
        }
    }
}

impl From<String> for EntityKind {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combat and progression stats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub health: f32,
    pub max_health: f32,
    pub attack: f32,
    pub speed: f32,
    pub stealth: f32,
    pub mana: f32,
    pub max_mana: f32,
    pub mana_rate: f32,
    pub heal_rate: f32,
    pub view_range: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            health: 1.0,
            max_health: 1.0,
            attack: 0.0,
            speed: 1.0,
            stealth: 0.0,
            mana: 0.0,
            max_mana: 0.0,
            mana_rate: 0.0,
            heal_rate: 0.0,
            view_range: 4.0,
        }
    }
}

/// Static stat block keyed by placement gid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub stats: Stats,
    #[serde(default)]
    pub modes: Vec<String>,
    #[serde(default)]
    pub properties: PropertyBag,
}

/// Definition table, placement gid to stat block
pub type CharacterDefs = BTreeMap<u32, CharacterDef>;

/// How a field is resolved when a placement meets its definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// The definition value is used; placement data cannot set the field
    DefinitionWins,
    /// The definition value is used when present, the placement fills it otherwise
    LevelFillsUnset,
    /// Only the placement carries the field
    PlacementOnly,
}

impl MergeRule {
    pub fn pick<T>(self, definition: Option<T>, level: Option<T>) -> Option<T> {
        match self {
            MergeRule::DefinitionWins => definition,
            MergeRule::LevelFillsUnset => definition.or(level),
            MergeRule::PlacementOnly => level,
        }
    }
}

/// Field-by-field merge rules for building a character from a placement
#[derive(Debug, Clone, Copy)]
pub struct MergeRules {
    pub name: MergeRule,
    pub kind: MergeRule,
    pub stats: MergeRule,
    pub modes: MergeRule,
    /// Applied per key
    pub properties: MergeRule,
    pub position: MergeRule,
    pub tile_id: MergeRule,
}

pub const MERGE_RULES: MergeRules = MergeRules {
    name: MergeRule::LevelFillsUnset,
    kind: MergeRule::LevelFillsUnset,
    stats: MergeRule::DefinitionWins,
    modes: MergeRule::DefinitionWins,
    properties: MergeRule::LevelFillsUnset,
    position: MergeRule::PlacementOnly,
    tile_id: MergeRule::PlacementOnly,
};

/// A character or interactive object on the current level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub kind: EntityKind,
    pub x: i32,
    pub y: i32,
    pub visible: bool,
    pub stats: Stats,
    pub dead: bool,
    pub modes: Vec<String>,
    pub properties: PropertyBag,
    pub tile_id: u32,
}

impl Character {
    pub fn new(name: impl Into<String>, kind: EntityKind, x: i32, y: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            x,
            y,
            visible: true,
            stats: Stats::default(),
            dead: false,
            modes: Vec::new(),
            properties: PropertyBag::new(),
            tile_id: 0,
        }
    }

    /// Build an entity from level placement data merged with its definition
    pub fn from_placement(placement: &Placement, definition: Option<&CharacterDef>) -> Self {
        let rules = MERGE_RULES;
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());

        let name = rules
            .name
            .pick(
                definition.and_then(|d| d.name.clone()),
                non_empty(&placement.name),
            )
            .unwrap_or_else(|| format!("object{}", placement.gid));
        let kind = rules
            .kind
            .pick(
                definition.and_then(|d| d.kind.clone()),
                non_empty(&placement.kind),
            )
            .map(|k| EntityKind::parse(&k))
            .unwrap_or_else(|| EntityKind::Scenery(String::new()));
        let stats = rules
            .stats
            .pick(definition.map(|d| d.stats), None)
            .unwrap_or_default();
        let modes = rules
            .modes
            .pick(definition.map(|d| d.modes.clone()), None)
            .unwrap_or_default();

        let mut properties = definition
            .map(|d| d.properties.clone())
            .unwrap_or_default();
        if rules.properties == MergeRule::LevelFillsUnset {
            properties.fill_from(&placement.properties);
        }

        let (x, y) = rules
            .position
            .pick(None, Some((placement.x, placement.y)))
            .unwrap_or_default();
        let tile_id = rules
            .tile_id
            .pick(None, Some(placement.gid))
            .unwrap_or_default();

        Self {
            name,
            kind,
            x,
            y,
            visible: true,
            stats,
            dead: false,
            modes,
            properties,
            tile_id,
        }
    }

    pub fn is_ai(&self) -> bool {
        self.kind == EntityKind::Ai
    }

    pub fn is_player(&self) -> bool {
        self.kind == EntityKind::Player
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Per-turn regeneration of health and mana, capped at their maximums
    pub fn regenerate(&mut self) {
        let s = &mut self.stats;
        if s.health < s.max_health {
            s.health = (s.health + s.heal_rate).min(s.max_health);
        }
        if s.mana < s.max_mana {
            s.mana = (s.mana + s.mana_rate).min(s.max_mana);
        }
    }
}

impl Combatant for Character {
    fn name(&self) -> &str {
        &self.name
    }

    fn health(&self) -> f32 {
        self.stats.health
    }

    fn attack(&self) -> f32 {
        self.stats.attack
    }

    fn set_health(&mut self, health: f32) {
        self.stats.health = health;
    }

    fn set_dead(&mut self, dead: bool) {
        self.dead = dead;
    }

    fn is_dead(&self) -> bool {
        self.dead
    }
}
