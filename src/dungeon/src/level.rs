// src/dungeon/src/level.rs

pub mod tiles;

use std::fmt;

use crate::character::{Character, CharacterDefs};
use crate::diagnostics::Diagnostics;
use crate::level::tiles::TileMap;

/// A loaded level: its map and every entity placed on it.
///
/// The level owns its entities exclusively. Nothing here survives a level
/// transition; cross-level player state is carried by the caller.
pub struct GameLevel {
    number: u32,
    entities: Vec<Character>,
    map: Box<dyn TileMap>,
    player: Option<usize>,
}

impl fmt::Debug for GameLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameLevel")
            .field("number", &self.number)
            .field("size", &(self.map.width(), self.map.height()))
            .field("entities", &self.entities)
            .field("player", &self.player)
            .finish()
    }
}

impl GameLevel {
    /// Build a level from a map's object layers and the definition table
    pub fn build(
        number: u32,
        map: Box<dyn TileMap>,
        defs: &CharacterDefs,
        diagnostics: &dyn Diagnostics,
    ) -> Self {
        let entities: Vec<Character> = map
            .object_layers()
            .iter()
            .map(|placement| Character::from_placement(placement, defs.get(&placement.gid)))
            .collect();
        Self::with_entities(number, map, entities, diagnostics)
    }

    /// Build a level from entities constructed elsewhere
    pub fn with_entities(
        number: u32,
        map: Box<dyn TileMap>,
        entities: Vec<Character>,
        diagnostics: &dyn Diagnostics,
    ) -> Self {
        let player = entities.iter().position(Character::is_player);
        if player.is_none() {
            tracing::error!(level = number, "level has no player placement");
            diagnostics.error(&format!("level {} has no player placement", number));
        }
        Self {
            number,
            entities,
            map,
            player,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn map(&self) -> &dyn TileMap {
        self.map.as_ref()
    }

    pub fn entities(&self) -> &[Character] {
        &self.entities
    }

    pub fn entity(&self, index: usize) -> Option<&Character> {
        self.entities.get(index)
    }

    pub fn entity_mut(&mut self, index: usize) -> Option<&mut Character> {
        self.entities.get_mut(index)
    }

    pub fn player_index(&self) -> Option<usize> {
        self.player
    }

    pub fn player(&self) -> Option<&Character> {
        self.player.and_then(|i| self.entities.get(i))
    }

    pub fn player_mut(&mut self) -> Option<&mut Character> {
        self.player.and_then(|i| self.entities.get_mut(i))
    }

    /// Indices of visible entities standing on a tile, in placement order
    pub fn visible_at(&self, x: i32, y: i32) -> impl Iterator<Item = usize> + '_ {
        self.entities
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.visible && e.x == x && e.y == y)
            .map(|(i, _)| i)
    }

    /// Indices of every entity with the given name, in placement order
    pub fn find_by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.entities
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.name == name)
            .map(|(i, _)| i)
    }

    /// Two distinct entities borrowed mutably at once
    pub fn pair_mut(&mut self, a: usize, b: usize) -> Option<(&mut Character, &mut Character)> {
        if a == b || a >= self.entities.len() || b >= self.entities.len() {
            return None;
        }
        if a < b {
            let (left, right) = self.entities.split_at_mut(b);
            Some((&mut left[a], &mut right[0]))
        } else {
            let (left, right) = self.entities.split_at_mut(a);
            Some((&mut right[0], &mut left[b]))
        }
    }
}
