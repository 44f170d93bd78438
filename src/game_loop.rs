//! 游戏循环
//!
//! The driver owns the bus and posts Tick until something posts Quit. All
//! per-frame work happens in listeners; the loop itself only enters the start
//! mode, advances levels and counts ticks.

use dungeon::LevelSource;
use error::GameError;
use std::cell::RefCell;
use std::rc::Rc;

use crate::config::GameConfig;
use crate::event_bus::{EventBus, EventHandler, GameEvent, ListenerId, Outbox, SharedHandler};
use crate::model::World;
use crate::states::{Mode, ModeStack};

/// Reacts to Quit, StateChange and LevelComplete on behalf of the driver
pub struct LoopControl {
    running: bool,
    pending_levelup: bool,
    modes: Rc<RefCell<ModeStack>>,
}

impl LoopControl {
    pub fn new(modes: Rc<RefCell<ModeStack>>) -> Self {
        Self {
            running: true,
            pending_levelup: false,
            modes,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn take_levelup(&mut self) -> bool {
        std::mem::take(&mut self.pending_levelup)
    }
}

impl EventHandler for LoopControl {
    fn handle(&mut self, event: &GameEvent, outbox: &mut Outbox) -> anyhow::Result<()> {
        match event {
            GameEvent::Quit => self.running = false,
            GameEvent::StateChange { mode } => {
                let mut modes = self.modes.borrow_mut();
                match mode {
                    Some(mode) => modes.push(*mode),
                    None => {
                        modes.pop();
                    }
                }
                if modes.is_empty() {
                    outbox.post(GameEvent::Quit);
                }
            }
            GameEvent::LevelComplete => self.pending_levelup = true,
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "loop"
    }
}

/// 主游戏循环
pub struct GameLoop {
    bus: EventBus,
    control: Rc<RefCell<LoopControl>>,
    modes: Rc<RefCell<ModeStack>>,
    world: Rc<RefCell<World>>,
    levels: Box<dyn LevelSource>,
    start_mode: Mode,
    show_intro: bool,
    max_ticks: Option<u64>,
    level_number: u32,
    ticks: u64,
    registrations: Vec<ListenerId>,
    /// Listeners whose lifetime is tied to this loop
    owned: Vec<SharedHandler>,
}

impl GameLoop {
    pub fn new(
        bus: EventBus,
        levels: Box<dyn LevelSource>,
        world: Rc<RefCell<World>>,
        modes: Rc<RefCell<ModeStack>>,
        config: &GameConfig,
    ) -> Self {
        let control = Rc::new(RefCell::new(LoopControl::new(Rc::clone(&modes))));
        let mut game = Self {
            bus,
            control,
            modes,
            world,
            levels,
            start_mode: config.start_mode,
            show_intro: config.show_intro,
            max_ticks: config.max_ticks,
            level_number: 0,
            ticks: 0,
            registrations: Vec::new(),
            owned: Vec::new(),
        };
        let control = Rc::clone(&game.control);
        game.register(&control);
        game
    }

    /// Register a listener for the lifetime of this loop
    pub fn register<H: EventHandler + 'static>(&mut self, handler: &Rc<RefCell<H>>) -> ListenerId {
        let id = self.bus.register(handler);
        if !self.registrations.contains(&id) {
            self.registrations.push(id);
        }
        id
    }

    /// Register a listener and keep it alive until the loop shuts down
    pub fn attach<H: EventHandler + 'static>(&mut self, handler: Rc<RefCell<H>>) -> ListenerId {
        let id = self.register(&handler);
        self.owned.push(handler);
        id
    }

    pub fn post(&mut self, event: GameEvent) {
        self.bus.post(event);
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn is_running(&self) -> bool {
        self.control.borrow().is_running()
    }

    pub fn level_number(&self) -> u32 {
        self.level_number
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn run(&mut self) -> Result<(), GameError> {
        tracing::info!(start_mode = %self.start_mode, "game loop starting");
        self.post(GameEvent::push_mode(self.start_mode));
        if self.show_intro {
            self.post(GameEvent::push_mode(Mode::Intro));
        }
        self.post(GameEvent::Initialize);
        self.levelup()?;

        while self.is_running() {
            if self.max_ticks.is_some_and(|max| self.ticks >= max) {
                tracing::info!(ticks = self.ticks, "tick limit reached");
                break;
            }
            self.post(GameEvent::Tick);
            self.ticks += 1;

            let levelup = self.control.borrow_mut().take_levelup();
            if levelup {
                self.levelup()?;
            }
            self.check_game_over();
        }

        tracing::info!(ticks = self.ticks, level = self.level_number, "game loop stopped");
        self.shutdown();
        Ok(())
    }

    /// Load the next level and announce it. Past the last level the run ends.
    pub fn levelup(&mut self) -> Result<bool, GameError> {
        let next = self.level_number + 1;
        if !self.levels.has_level(next) {
            if next == 1 {
                return Err(GameError::MissingLevel(next));
            }
            tracing::info!(level = self.level_number, "no further levels");
            self.post(GameEvent::message("You found the way out. Thanks for playing!"));
            self.post(GameEvent::Quit);
            return Ok(false);
        }

        let level = self.levels.load(next)?;
        tracing::info!(level = next, entities = level.entities().len(), "entering level");
        self.level_number = next;
        self.world.borrow_mut().replace_level(level);
        self.post(GameEvent::NextLevel { level: next });
        Ok(true)
    }

    /// A dead player ends the run once the death dialog is dismissed
    fn check_game_over(&mut self) {
        let dead = self.world.borrow().player_dead();
        if dead && self.modes.borrow().peek() != Some(Mode::Dialog) && self.is_running() {
            self.post(GameEvent::message("Game over."));
            self.post(GameEvent::Quit);
        }
    }

    fn shutdown(&mut self) {
        for id in self.registrations.drain(..) {
            self.bus.unregister(id);
        }
        self.owned.clear();
    }
}
