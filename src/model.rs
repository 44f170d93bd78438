//! Shared game world and the controller that plays turns on it.

use combat::Combat;
use dungeon::{Diagnostics, EntityKind, GameLevel, MoveResolver, MoveResult};
use hero::{Ability, UpgradeSet, UpgradeTable};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::event_bus::{EventHandler, GameEvent, Outbox};
use crate::input::InputKey;
use crate::states::{Mode, ModeStack};

/// Message log length kept for the HUD
pub const MAX_MESSAGES: usize = 64;

/// Everything the view reads and the play controller writes
#[derive(Debug, Default)]
pub struct World {
    pub level: Option<GameLevel>,
    pub upgrades: UpgradeSet,
    pub messages: VecDeque<String>,
    pub level_number: u32,
    pub turns: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly loaded level. The player's stats are the only
    /// state carried over; position comes from the new level.
    pub fn replace_level(&mut self, mut level: GameLevel) {
        let carried = self
            .level
            .as_ref()
            .and_then(|old| old.player())
            .map(|p| p.stats);
        if let (Some(stats), Some(player)) = (carried, level.player_mut()) {
            player.stats = stats;
        }
        self.level_number = level.number();
        self.level = Some(level);
    }

    pub fn push_message(&mut self, text: impl Into<String>) {
        if self.messages.len() == MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(text.into());
    }

    pub fn player_dead(&self) -> bool {
        self.level
            .as_ref()
            .and_then(|l| l.player())
            .is_some_and(|p| p.dead)
    }
}

/// Turns Play-mode input into moves, fights and upgrade use
pub struct PlayController {
    world: Rc<RefCell<World>>,
    modes: Rc<RefCell<ModeStack>>,
    table: UpgradeTable,
    diagnostics: Rc<dyn Diagnostics>,
}

impl PlayController {
    pub fn new(
        world: Rc<RefCell<World>>,
        modes: Rc<RefCell<ModeStack>>,
        table: UpgradeTable,
        diagnostics: Rc<dyn Diagnostics>,
    ) -> Self {
        Self {
            world,
            modes,
            table,
            diagnostics,
        }
    }

    fn on_key(&mut self, key: InputKey, outbox: &mut Outbox) {
        if self.modes.borrow().peek() != Some(Mode::Play) || self.world.borrow().player_dead() {
            return;
        }
        match key {
            InputKey::Up | InputKey::Char('k') => outbox.post(GameEvent::PlayerMoveRequest { dx: 0, dy: -1 }),
            InputKey::Down | InputKey::Char('j') => outbox.post(GameEvent::PlayerMoveRequest { dx: 0, dy: 1 }),
            InputKey::Left | InputKey::Char('h') => outbox.post(GameEvent::PlayerMoveRequest { dx: -1, dy: 0 }),
            InputKey::Right | InputKey::Char('l') => outbox.post(GameEvent::PlayerMoveRequest { dx: 1, dy: 0 }),
            InputKey::Char('W') => outbox.post(GameEvent::ShiftViewport { dx: 0, dy: -1 }),
            InputKey::Char('S') => outbox.post(GameEvent::ShiftViewport { dx: 0, dy: 1 }),
            InputKey::Char('A') => outbox.post(GameEvent::ShiftViewport { dx: -1, dy: 0 }),
            InputKey::Char('D') => outbox.post(GameEvent::ShiftViewport { dx: 1, dy: 0 }),
            InputKey::Char(c @ '1'..='9') => {
                let slot = c as usize - '1' as usize;
                if self.activate_slot(slot, outbox) {
                    self.end_turn();
                }
            }
            InputKey::Char('.') => self.end_turn(),
            _ => {}
        }
    }

    /// Try the upgrade in `slot`; only a successful activation costs a turn
    fn activate_slot(&mut self, slot: usize, outbox: &mut Outbox) -> bool {
        let mut world = self.world.borrow_mut();
        let World { level, upgrades, .. } = &mut *world;
        let Some(level) = level.as_mut() else {
            return false;
        };
        let Some(player_index) = level.player_index() else {
            return false;
        };
        let target = nearest_enemy(level, player_index).cloned();
        let Some(player) = level.entity_mut(player_index) else {
            return false;
        };

        let (activated, text) = match upgrades.activate(slot, player, target.as_ref()) {
            Ok(upgrade) => (true, format!("{} activated", upgrade.name())),
            Err(err) => (false, err.to_string()),
        };
        if self.diagnostics.enabled() {
            self.diagnostics.write(&format!("activate slot {}: {}", slot + 1, text));
        }
        outbox.post(GameEvent::message(text));
        activated
    }

    fn move_player(&mut self, dx: i32, dy: i32, outbox: &mut Outbox) {
        {
            let mut world = self.world.borrow_mut();
            let Some(level) = world.level.as_mut() else {
                return;
            };
            let Some(player_index) = level.player_index() else {
                self.diagnostics.write("move ignored: level has no player");
                return;
            };
            if level.entity(player_index).is_none_or(|p| p.dead) {
                return;
            }

            let resolver = MoveResolver::new(self.diagnostics.as_ref());
            let result = resolver.try_move(level, player_index, dx, dy, |level, actor, other| {
                resolver.bump(level, actor, other)
            });

            match result {
                MoveResult::Moved { x, y } => {
                    outbox.post(GameEvent::PlayerMoved { x, y });
                    let on_exit = level
                        .visible_at(x, y)
                        .filter_map(|i| level.entity(i))
                        .any(|e| e.kind == EntityKind::Exit);
                    if on_exit {
                        outbox.post(GameEvent::LevelComplete);
                    }
                }
                MoveResult::Combat { other } => {
                    if let Some((player, enemy)) = level.pair_mut(player_index, other) {
                        let result = Combat::resolve(player, enemy);
                        if result.defender_dead {
                            enemy.visible = false;
                        }
                        outbox.post(GameEvent::Combat { lines: result.lines });
                        if result.attacker_dead {
                            outbox.post(GameEvent::message("You have been destroyed."));
                            outbox.post(GameEvent::push_mode(Mode::Dialog));
                        }
                    }
                }
                _ => {}
            }
        }
        self.end_turn();
    }

    /// Upgrades tick, then the player regenerates
    fn end_turn(&mut self) {
        let mut world = self.world.borrow_mut();
        let world = &mut *world;
        world.upgrades.step_all();
        if let Some(player) = world.level.as_mut().and_then(|l| l.player_mut()) {
            if !player.dead {
                player.regenerate();
            }
        }
        world.turns += 1;
    }

    fn acquire_upgrades(&mut self, number: u32, outbox: &mut Outbox) {
        let mut world = self.world.borrow_mut();
        let World { level, upgrades, .. } = &mut *world;
        let Some(player) = level.as_mut().and_then(|l| l.player_mut()) else {
            self.diagnostics.write(&format!("level {}: no player to upgrade", number));
            return;
        };

        for def in self.table.available_for_level(number) {
            let owned = upgrades.by_name(def.name()).map(|u| u.version());
            let text = match (upgrades.acquire(def, player), owned) {
                (Some(delta), _) => delta,
                (None, Some(version)) => format!("{} upgraded to v{}", def.name(), version + 1),
                (None, None) => format!("{} installed", def.name()),
            };
            outbox.post(GameEvent::message(text));
        }
    }
}

/// Closest living visible AI to the player, by tile distance
fn nearest_enemy(level: &GameLevel, player_index: usize) -> Option<&dungeon::Character> {
    let player = level.entity(player_index)?;
    level
        .entities()
        .iter()
        .filter(|e| e.is_ai() && e.visible && !e.dead)
        .min_by_key(|e| (e.x - player.x).abs().max((e.y - player.y).abs()))
}

impl EventHandler for PlayController {
    fn handle(&mut self, event: &GameEvent, outbox: &mut Outbox) -> anyhow::Result<()> {
        match event {
            GameEvent::Input { key } => self.on_key(*key, outbox),
            GameEvent::PlayerMoveRequest { dx, dy } => self.move_player(*dx, *dy, outbox),
            GameEvent::NextLevel { level } => self.acquire_upgrades(*level, outbox),
            GameEvent::Combat { lines } => {
                let mut world = self.world.borrow_mut();
                for line in lines {
                    world.push_message(line.as_str());
                }
            }
            GameEvent::Message { text } => self.world.borrow_mut().push_message(text.as_str()),
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "play"
    }
}
