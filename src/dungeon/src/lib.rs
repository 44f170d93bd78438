//src/dungeon/src/lib.rs
//! Levels, the entities on them and how they move and interact.

pub mod character;
pub mod content;
pub mod diagnostics;
pub mod level;
pub mod movement;
pub mod properties;

pub use crate::character::{Character, CharacterDef, CharacterDefs, EntityKind, Stats};
pub use crate::content::{ContentLoader, LevelSource, StaticLevels};
pub use crate::diagnostics::{Diagnostics, MemoryDiagnostics, NullDiagnostics, TracingDiagnostics};
pub use crate::level::GameLevel;
pub use crate::level::tiles::{MapData, Placement, Tile, TileMap};
pub use crate::movement::{BumpOutcome, FingerAction, MoveResolver, MoveResult};
pub use crate::properties::PropertyBag;
