//! Coordination layer: event bus, mode stack, input, play controller, view
//! and the game-loop driver tying them together.

pub mod config;
pub mod event_bus;
pub mod game_loop;
pub mod input;
pub mod model;
pub mod states;
pub mod view;

use dungeon::{Diagnostics, LevelSource};
use hero::UpgradeTable;
use std::cell::RefCell;
use std::rc::Rc;

pub use crate::config::GameConfig;
pub use crate::event_bus::{EventBus, EventHandler, GameEvent, ListenerId, Outbox};
pub use crate::game_loop::{GameLoop, LoopControl};
pub use crate::input::{ConsoleInput, InputController, InputKey, InputSource, ScriptedInput};
pub use crate::model::{PlayController, World};
pub use crate::states::{Mode, ModeStack};
pub use crate::view::TerminalView;

/// Shared state handed to every listener
pub struct Shared {
    pub world: Rc<RefCell<World>>,
    pub modes: Rc<RefCell<ModeStack>>,
}

/// Build the driver with the input and play controllers attached.
/// The caller attaches a view if it wants one.
pub fn assemble(
    config: &GameConfig,
    levels: Box<dyn LevelSource>,
    upgrades: UpgradeTable,
    input: Box<dyn InputSource>,
    diagnostics: Rc<dyn Diagnostics>,
) -> (GameLoop, Shared) {
    let world = Rc::new(RefCell::new(World::new()));
    let modes = Rc::new(RefCell::new(ModeStack::new()));
    let bus = EventBus::new(Rc::clone(&diagnostics));
    let mut game = GameLoop::new(bus, levels, Rc::clone(&world), Rc::clone(&modes), config);

    game.attach(Rc::new(RefCell::new(InputController::new(
        input,
        Rc::clone(&modes),
        config.tick_rate(),
    ))));
    game.attach(Rc::new(RefCell::new(PlayController::new(
        Rc::clone(&world),
        Rc::clone(&modes),
        upgrades,
        diagnostics,
    ))));

    (game, Shared { world, modes })
}
