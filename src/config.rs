//! Runtime configuration loaded from `tile_rogue.json`.

use error::GameError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::states::Mode;

pub const CONFIG_ENV: &str = "TILE_ROGUE_CONFIG";
pub const CONFIG_FILE: &str = "tile_rogue.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Directory holding characters.json, upgrades.json and levels/
    pub content_dir: PathBuf,
    pub start_mode: Mode,
    /// Push the intro screen above the start mode
    pub show_intro: bool,
    pub tick_rate_ms: u64,
    /// Record every non-Tick event and resolver decision
    pub trace: bool,
    /// Stop after this many ticks (headless runs)
    pub max_ticks: Option<u64>,
    /// Write logs here instead of stderr
    pub log_file: Option<PathBuf>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("data"),
            start_mode: Mode::Menu,
            show_intro: true,
            tick_rate_ms: 50,
            trace: true,
            max_ticks: None,
            log_file: None,
        }
    }
}

impl GameConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    /// Read a config file; a present but malformed file is an error
    pub fn from_file(path: &Path) -> Result<Self, GameError> {
        dungeon::content::read_json(path)
    }

    /// `$TILE_ROGUE_CONFIG`, then `./tile_rogue.json`, then defaults
    pub fn discover() -> Result<Self, GameError> {
        Self::discover_from(std::env::var_os(CONFIG_ENV).map(PathBuf::from), Path::new("."))
    }

    pub fn discover_from(explicit: Option<PathBuf>, cwd: &Path) -> Result<Self, GameError> {
        if let Some(path) = explicit {
            return Self::from_file(&path);
        }
        let local = cwd.join(CONFIG_FILE);
        if local.exists() {
            return Self::from_file(&local);
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempdir().unwrap();
        let config = GameConfig::discover_from(None, dir.path()).unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.tick_rate(), Duration::from_millis(50));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"start_mode": "Play", "show_intro": false, "max_ticks": 20}"#,
        )
        .unwrap();

        let config = GameConfig::discover_from(None, dir.path()).unwrap();
        assert_eq!(config.start_mode, Mode::Play);
        assert!(!config.show_intro);
        assert_eq!(config.max_ticks, Some(20));
        assert_eq!(config.content_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"tick_rate_ms": 10}"#).unwrap();
        let other = dir.path().join("other.json");
        fs::write(&other, r#"{"tick_rate_ms": 99}"#).unwrap();

        let config = GameConfig::discover_from(Some(other), dir.path()).unwrap();
        assert_eq!(config.tick_rate_ms, 99);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ nope").unwrap();
        let result = GameConfig::discover_from(None, dir.path());
        assert!(matches!(result, Err(GameError::Parse { .. })));
    }
}
