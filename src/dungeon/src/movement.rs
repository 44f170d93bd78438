//! Tile movement, bump resolution and the finger/transmute cascade.
//!
//! A move is checked in order: map bounds, visible entities on the target
//! tile (each one is bumped), then the map tile one row above the target.
//! Sprites anchor at their feet, so the blocking tile for `(x, y)` is the one
//! at `(x, y - 1)`.

use std::collections::HashSet;

use crate::diagnostics::Diagnostics;
use crate::level::GameLevel;

/// Property prefix naming remote objects a bumped object triggers
pub const FINGERS_PREFIX: &str = "fingers";
/// Property prefix holding the action run on a triggered object
pub const ON_FINGER_PREFIX: &str = "on_finger";

/// Result of bumping into another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpOutcome {
    /// The mover may continue onto the tile
    Pass,
    /// The move stops here
    Block,
    /// The other entity is hostile; the caller should resolve combat
    Combat,
}

impl BumpOutcome {
    pub fn is_blocking(self) -> bool {
        !matches!(self, BumpOutcome::Pass)
    }
}

/// Result of a move attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Moved { x: i32, y: i32 },
    OutOfBounds,
    /// An entity on the target tile stopped the move
    Blocked { other: usize },
    /// An entity on the target tile wants to fight
    Combat { other: usize },
    /// The map tile stopped the move
    BlockedByTile,
    /// The mover index does not exist
    NoSuchEntity,
}

impl MoveResult {
    pub fn moved(&self) -> bool {
        matches!(self, MoveResult::Moved { .. })
    }
}

/// Action parsed from an `on_finger` property value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerAction {
    /// Set the tile id unconditionally
    Transmute(u32),
    /// Rotate the tile id through a ring of ids
    TransmuteRing(Vec<u32>),
}

impl FingerAction {
    /// Parse `action=arg1[,arg2,...]`
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (action, args) = raw
            .split_once('=')
            .ok_or_else(|| format!("missing '=' in {:?}", raw))?;
        match action.trim() {
            "transmute" => {
                let ids = args
                    .split(',')
                    .map(|a| {
                        a.trim()
                            .parse::<u32>()
                            .map_err(|_| format!("bad tile id {:?} in {:?}", a.trim(), raw))
                    })
                    .collect::<Result<Vec<u32>, String>>()?;
                match ids.as_slice() {
                    [single] => Ok(FingerAction::Transmute(*single)),
                    _ => Ok(FingerAction::TransmuteRing(ids)),
                }
            }
            other => Err(format!("unknown action {:?}", other)),
        }
    }

    /// The tile id after applying this action to `current`
    pub fn next_tile(&self, current: u32) -> Result<u32, String> {
        match self {
            FingerAction::Transmute(id) => Ok(*id),
            FingerAction::TransmuteRing(ring) => {
                let pos = ring
                    .iter()
                    .position(|&id| id == current)
                    .ok_or_else(|| format!("tile {} is not in ring {:?}", current, ring))?;
                // Steps to the previous ring entry, wrapping at the start
                Ok(ring[(pos + ring.len() - 1) % ring.len()])
            }
        }
    }
}

/// Resolves moves and bumps against a level
pub struct MoveResolver<'a> {
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> MoveResolver<'a> {
    pub fn new(diagnostics: &'a dyn Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// Try to move entity `mover` by `(dx, dy)`.
    ///
    /// `on_bump` runs for every visible entity standing on the target tile and
    /// may mutate the level; the first blocking outcome aborts the move.
    pub fn try_move<F>(
        &self,
        level: &mut GameLevel,
        mover: usize,
        dx: i32,
        dy: i32,
        mut on_bump: F,
    ) -> MoveResult
    where
        F: FnMut(&mut GameLevel, usize, usize) -> BumpOutcome,
    {
        let Some(entity) = level.entity(mover) else {
            return MoveResult::NoSuchEntity;
        };
        let (nx, ny) = (entity.x + dx, entity.y + dy);
        let name = entity.name.clone();

        if !level.map().contains(nx, ny) {
            self.trace(format!("move {} to ({}, {}): out of bounds", name, nx, ny));
            return MoveResult::OutOfBounds;
        }

        let occupants: Vec<usize> = level.visible_at(nx, ny).filter(|&i| i != mover).collect();
        for other in occupants {
            match on_bump(level, mover, other) {
                BumpOutcome::Pass => {}
                BumpOutcome::Block => {
                    self.trace(format!("move {} to ({}, {}): blocked by entity {}", name, nx, ny, other));
                    return MoveResult::Blocked { other };
                }
                BumpOutcome::Combat => {
                    self.trace(format!("move {} to ({}, {}): combat with entity {}", name, nx, ny, other));
                    return MoveResult::Combat { other };
                }
            }
        }

        if level.map().tile(nx, ny - 1).is_some_and(|t| t.blocks()) {
            self.trace(format!("move {} to ({}, {}): blocked by tile", name, nx, ny));
            return MoveResult::BlockedByTile;
        }

        if let Some(entity) = level.entity_mut(mover) {
            entity.x = nx;
            entity.y = ny;
        }
        self.trace(format!("move {} to ({}, {})", name, nx, ny));
        MoveResult::Moved { x: nx, y: ny }
    }

    /// Default interaction when `actor` walks into `other`.
    ///
    /// AI entities start combat. Anything else fires its finger cascade and
    /// then blocks according to its own (possibly transmuted) tile.
    pub fn bump(&self, level: &mut GameLevel, actor: usize, other: usize) -> BumpOutcome {
        let Some(target) = level.entity(other) else {
            return BumpOutcome::Pass;
        };
        if target.is_ai() {
            self.trace(format!("bump {}: start combat", target.name));
            return BumpOutcome::Combat;
        }

        let mut visited = HashSet::new();
        self.trigger(level, actor, other, false, &mut visited);

        match level.entity(other) {
            Some(target) if level.map().blocks(target.tile_id) => BumpOutcome::Block,
            _ => BumpOutcome::Pass,
        }
    }

    /// Fire `target`'s fingers, then run its `on_finger` actions.
    ///
    /// Every object is triggered at most once per cascade.
    fn trigger(
        &self,
        level: &mut GameLevel,
        actor: usize,
        target: usize,
        is_finger: bool,
        visited: &mut HashSet<usize>,
    ) {
        if !visited.insert(target) {
            return;
        }
        let Some(entity) = level.entity(target) else {
            return;
        };
        if is_finger && entity.is_ai() {
            return;
        }

        let remote_names: Vec<String> = entity
            .properties
            .with_prefix(FINGERS_PREFIX)
            .map(|(_, v)| v.trim().to_string())
            .collect();
        for remote in remote_names {
            let targets: Vec<usize> = level.find_by_name(&remote).collect();
            if targets.is_empty() {
                self.trace(format!("finger {} -> {}: no such object", level_name(level, target), remote));
            }
            for idx in targets {
                self.trace(format!("finger {} -> {}", level_name(level, target), remote));
                self.trigger(level, actor, idx, true, visited);
            }
        }

        self.run_on_finger(level, actor, target);
    }

    /// Apply the target's `on_finger` actions unless the actor stands on it
    fn run_on_finger(&self, level: &mut GameLevel, actor: usize, target: usize) {
        let actor_pos = level.entity(actor).map(|a| a.position());
        let Some(entity) = level.entity(target) else {
            return;
        };
        if actor_pos == Some(entity.position()) {
            self.trace(format!("on_finger {}: actor is standing on it, skipped", entity.name));
            return;
        }

        let actions: Vec<(String, String)> = entity
            .properties
            .with_prefix(ON_FINGER_PREFIX)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (key, raw) in actions {
            let Some(entity) = level.entity_mut(target) else {
                return;
            };
            let result = FingerAction::parse(&raw).and_then(|a| a.next_tile(entity.tile_id));
            match result {
                Ok(tile_id) => {
                    let before = entity.tile_id;
                    entity.tile_id = tile_id;
                    let line = format!("transmute {}: {} -> {}", entity.name, before, tile_id);
                    self.trace(line);
                }
                Err(reason) => {
                    let line = format!("bad {} on {}: {}", key, entity.name, reason);
                    tracing::warn!("{}", line);
                    self.diagnostics.error(&line);
                }
            }
        }
    }

    fn trace(&self, line: String) {
        if self.diagnostics.enabled() {
            self.diagnostics.write(&line);
        }
    }
}

fn level_name(level: &GameLevel, index: usize) -> String {
    level
        .entity(index)
        .map(|e| e.name.clone())
        .unwrap_or_default()
}
