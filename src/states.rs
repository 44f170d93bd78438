//! 游戏模式栈
//!
//! The top of the stack decides which screen is drawn and how keys are read.
//! Only the driver mutates it, and only in response to `StateChange`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A stack-managed phase of the game
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum Mode {
    Intro,
    Menu,
    Help,
    About,
    Play,
    Dialog,
}

impl TryFrom<String> for Mode {
    type Error = strum::ParseError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeStack {
    modes: Vec<Mode>,
}

impl ModeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mode: Mode) {
        self.modes.push(mode);
    }

    /// Remove the top mode; `None` when already empty
    pub fn pop(&mut self) -> Option<Mode> {
        self.modes.pop()
    }

    pub fn peek(&self) -> Option<Mode> {
        self.modes.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Bottom to top
    pub fn iter(&self) -> impl Iterator<Item = Mode> + '_ {
        self.modes.iter().copied()
    }
}
