//! Level content sources.
//!
//! Parsing is limited to deserializing already-exported JSON; everything the
//! game needs is resolved here into a [`GameLevel`].

use error::GameError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::character::CharacterDefs;
use crate::diagnostics::Diagnostics;
use crate::level::GameLevel;
use crate::level::tiles::MapData;

/// Supplies levels by number
pub trait LevelSource {
    /// Build a fresh level. Missing or unreadable content is fatal.
    fn load(&self, number: u32) -> Result<GameLevel, GameError>;

    fn has_level(&self, number: u32) -> bool;
}

/// Read and deserialize a JSON content file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, GameError> {
    let text = fs::read_to_string(path).map_err(|e| GameError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| GameError::parse(path, e))
}

/// Loads `characters.json` and `levels/level<N>.json` from a content directory
pub struct ContentLoader {
    dir: PathBuf,
    defs: CharacterDefs,
    diagnostics: Rc<dyn Diagnostics>,
}

impl ContentLoader {
    pub const CHARACTERS_FILE: &'static str = "characters.json";

    /// Open a content directory, reading the definition table up front.
    /// A missing definition table is tolerated; a malformed one is not.
    pub fn open(dir: impl Into<PathBuf>, diagnostics: Rc<dyn Diagnostics>) -> Result<Self, GameError> {
        let dir = dir.into();
        let defs_path = dir.join(Self::CHARACTERS_FILE);
        let defs = if defs_path.exists() {
            read_json(&defs_path)?
        } else {
            tracing::warn!(path = %defs_path.display(), "no character definitions, using placement data only");
            CharacterDefs::new()
        };
        Ok(Self {
            dir,
            defs,
            diagnostics,
        })
    }

    pub fn level_path(&self, number: u32) -> PathBuf {
        self.dir.join("levels").join(format!("level{}.json", number))
    }
}

impl LevelSource for ContentLoader {
    fn load(&self, number: u32) -> Result<GameLevel, GameError> {
        let path = self.level_path(number);
        let map: MapData = read_json(&path)?;
        map.validate()?;
        tracing::info!(level = number, path = %path.display(), "level loaded");
        Ok(GameLevel::build(
            number,
            Box::new(map),
            &self.defs,
            self.diagnostics.as_ref(),
        ))
    }

    fn has_level(&self, number: u32) -> bool {
        self.level_path(number).exists()
    }
}

/// In-memory levels, level `n` is `maps[n - 1]`
pub struct StaticLevels {
    maps: Vec<MapData>,
    defs: CharacterDefs,
    diagnostics: Rc<dyn Diagnostics>,
}

impl StaticLevels {
    pub fn new(maps: Vec<MapData>, defs: CharacterDefs, diagnostics: Rc<dyn Diagnostics>) -> Self {
        Self {
            maps,
            defs,
            diagnostics,
        }
    }
}

impl LevelSource for StaticLevels {
    fn load(&self, number: u32) -> Result<GameLevel, GameError> {
        let map = number
            .checked_sub(1)
            .and_then(|i| self.maps.get(i as usize))
            .ok_or(GameError::MissingLevel(number))?
            .clone();
        map.validate()?;
        Ok(GameLevel::build(
            number,
            Box::new(map),
            &self.defs,
            self.diagnostics.as_ref(),
        ))
    }

    fn has_level(&self, number: u32) -> bool {
        number >= 1 && (number as usize) <= self.maps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullDiagnostics;
    use std::fs;

    fn write(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    const LEVEL: &str = r#"{
        "width": 3, "height": 2, "tiles": [1, 1, 1, 1, 2, 1],
        "tile_properties": { "2": { "blocks": "true" } },
        "objects": [
            { "gid": 10, "x": 0, "y": 1, "name": "hero", "type": "player" },
            { "gid": 20, "x": 2, "y": 1 }
        ]
    }"#;

    #[test]
    fn test_loads_level_with_definitions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "levels/level1.json", LEVEL);
        write(
            dir.path(),
            "characters.json",
            r#"{ "20": { "name": "Sentry", "type": "ai", "attack": 2, "health": 4 } }"#,
        );

        let loader = ContentLoader::open(dir.path(), Rc::new(NullDiagnostics)).unwrap();
        assert!(loader.has_level(1));
        assert!(!loader.has_level(2));

        let level = loader.load(1).unwrap();
        assert_eq!(level.number(), 1);
        assert_eq!(level.player().unwrap().name, "hero");
        assert_eq!(level.entity(1).unwrap().name, "Sentry");
        assert!(level.map().blocks(2));
    }

    #[test]
    fn test_missing_level_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ContentLoader::open(dir.path(), Rc::new(NullDiagnostics)).unwrap();
        assert!(matches!(loader.load(4), Err(GameError::Io { .. })));
    }

    #[test]
    fn test_malformed_definitions_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "characters.json", "{ not json");
        let result = ContentLoader::open(dir.path(), Rc::new(NullDiagnostics));
        assert!(matches!(result, Err(GameError::Parse { .. })));
    }

    #[test]
    fn test_static_levels_bounds() {
        let source = StaticLevels::new(
            vec![MapData::filled(2, 2, 1)],
            CharacterDefs::new(),
            Rc::new(NullDiagnostics),
        );
        assert!(source.has_level(1));
        assert!(!source.has_level(0));
        assert!(!source.has_level(2));
        assert!(source.load(1).is_ok());
        assert!(matches!(source.load(2), Err(GameError::MissingLevel(2))));
    }
}
