//! Input handling: raw keys to semantic events.
//!
//! The translation only looks at the current mode. Game rules for keys in
//! Play mode live in the play controller.

use crossterm::event::{self, Event as CEvent, KeyCode as CrosstermKeyCode, KeyEventKind};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::event_bus::{EventHandler, GameEvent, Outbox};
use crate::states::{Mode, ModeStack};

/// Keys the game understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Space,
    Escape,
    Backspace,
    Char(char),
}

impl InputKey {
    pub fn from_crossterm(code: CrosstermKeyCode) -> Option<Self> {
        match code {
            CrosstermKeyCode::Up => Some(InputKey::Up),
            CrosstermKeyCode::Down => Some(InputKey::Down),
            CrosstermKeyCode::Left => Some(InputKey::Left),
            CrosstermKeyCode::Right => Some(InputKey::Right),
            CrosstermKeyCode::Enter => Some(InputKey::Enter),
            CrosstermKeyCode::Esc => Some(InputKey::Escape),
            CrosstermKeyCode::Backspace => Some(InputKey::Backspace),
            CrosstermKeyCode::Char(' ') => Some(InputKey::Space),
            CrosstermKeyCode::Char(c) => Some(InputKey::Char(c)),
            _ => None,
        }
    }
}

/// Map a key to the event it means in `mode`
pub fn translate(key: InputKey, mode: Option<Mode>) -> Option<GameEvent> {
    match mode? {
        Mode::Intro | Mode::Help | Mode::About | Mode::Dialog => Some(GameEvent::pop_mode()),
        Mode::Menu => match key {
            InputKey::Space | InputKey::Enter => Some(GameEvent::push_mode(Mode::Play)),
            InputKey::Char('h') => Some(GameEvent::push_mode(Mode::Help)),
            InputKey::Char('a') => Some(GameEvent::push_mode(Mode::About)),
            InputKey::Escape | InputKey::Char('q') => Some(GameEvent::pop_mode()),
            _ => None,
        },
        Mode::Play => match key {
            InputKey::Escape => Some(GameEvent::pop_mode()),
            key => Some(GameEvent::Input { key }),
        },
    }
}

/// Trait for input sources
pub trait InputSource {
    /// Poll for a key with a timeout
    fn poll(&mut self, timeout: Duration) -> anyhow::Result<Option<InputKey>>;
}

/// Terminal keyboard via crossterm
#[derive(Debug, Default)]
pub struct ConsoleInput;

impl ConsoleInput {
    pub fn new() -> Self {
        Self
    }
}

impl InputSource for ConsoleInput {
    fn poll(&mut self, timeout: Duration) -> anyhow::Result<Option<InputKey>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            CEvent::Key(key) if key.kind == KeyEventKind::Press => Ok(InputKey::from_crossterm(key.code)),
            _ => Ok(None),
        }
    }
}

/// Replays a fixed key sequence, one key per poll
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    keys: VecDeque<InputKey>,
}

impl ScriptedInput {
    pub fn new(keys: impl IntoIterator<Item = InputKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Plain characters become `Char` keys, except space
    pub fn from_chars(text: &str) -> Self {
        Self::new(text.chars().map(|c| match c {
            ' ' => InputKey::Space,
            c => InputKey::Char(c),
        }))
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self, _timeout: Duration) -> anyhow::Result<Option<InputKey>> {
        Ok(self.keys.pop_front())
    }
}

/// Polls one key per Tick and posts what it means in the current mode
pub struct InputController {
    source: Box<dyn InputSource>,
    modes: Rc<RefCell<ModeStack>>,
    timeout: Duration,
}

impl InputController {
    pub fn new(source: Box<dyn InputSource>, modes: Rc<RefCell<ModeStack>>, timeout: Duration) -> Self {
        Self {
            source,
            modes,
            timeout,
        }
    }
}

impl EventHandler for InputController {
    fn handle(&mut self, event: &GameEvent, outbox: &mut Outbox) -> anyhow::Result<()> {
        if !event.is_tick() {
            return Ok(());
        }
        let Some(key) = self.source.poll(self.timeout)? else {
            return Ok(());
        };
        let mode = self.modes.borrow().peek();
        if let Some(translated) = translate(key, mode) {
            outbox.post(translated);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "input"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_menu_keys() {
        let menu = Some(Mode::Menu);
        assert_eq!(translate(InputKey::Space, menu), Some(GameEvent::push_mode(Mode::Play)));
        assert_eq!(translate(InputKey::Enter, menu), Some(GameEvent::push_mode(Mode::Play)));
        assert_eq!(translate(InputKey::Char('h'), menu), Some(GameEvent::push_mode(Mode::Help)));
        assert_eq!(translate(InputKey::Char('a'), menu), Some(GameEvent::push_mode(Mode::About)));
        assert_eq!(translate(InputKey::Escape, menu), Some(GameEvent::pop_mode()));
        assert_eq!(translate(InputKey::Char('z'), menu), None);
    }

    #[test]
    fn test_play_keys() {
        let play = Some(Mode::Play);
        assert_eq!(translate(InputKey::Escape, play), Some(GameEvent::pop_mode()));
        assert_eq!(
            translate(InputKey::Left, play),
            Some(GameEvent::Input { key: InputKey::Left })
        );
        assert_eq!(
            translate(InputKey::Space, play),
            Some(GameEvent::Input { key: InputKey::Space })
        );
    }

    #[test]
    fn test_any_key_dismisses_screens() {
        for mode in [Mode::Intro, Mode::Help, Mode::About, Mode::Dialog] {
            assert_eq!(translate(InputKey::Char('x'), Some(mode)), Some(GameEvent::pop_mode()));
        }
        assert_eq!(translate(InputKey::Enter, None), None);
    }

    #[test]
    fn test_controller_polls_on_tick_only() {
        let modes = Rc::new(RefCell::new(ModeStack::new()));
        modes.borrow_mut().push(Mode::Menu);
        let mut controller = InputController::new(
            Box::new(ScriptedInput::from_chars(" q")),
            Rc::clone(&modes),
            Duration::ZERO,
        );

        let mut outbox = Outbox::new();
        controller.handle(&GameEvent::Initialize, &mut outbox).unwrap();
        assert!(outbox.is_empty());

        controller.handle(&GameEvent::Tick, &mut outbox).unwrap();
        assert_eq!(outbox.events(), &[GameEvent::push_mode(Mode::Play)]);
    }
}
