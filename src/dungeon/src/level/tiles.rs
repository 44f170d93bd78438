// src/dungeon/src/level/tiles.rs
use error::GameError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::properties::PropertyBag;

/// Read-only view of the tile map a level was built from.
///
/// Coordinates are tile coordinates; `(0, 0)` is the top-left corner.
pub trait TileMap {
    fn width(&self) -> i32;

    fn height(&self) -> i32;

    /// Tile id at a coordinate, `None` for empty cells and out-of-range lookups
    fn tile_at(&self, x: i32, y: i32) -> Option<u32>;

    /// Properties registered for a tile id
    fn tile_properties(&self, tile_id: u32) -> Option<&PropertyBag>;

    /// Object placements exported alongside the tile layers
    fn object_layers(&self) -> &[Placement];

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width() && y < self.height()
    }

    /// Whether a tile id carries a truthy `blocks` property
    fn blocks(&self, tile_id: u32) -> bool {
        self.tile_properties(tile_id)
            .is_some_and(|props| props.is_truthy("blocks"))
    }

    /// The cell at a coordinate, with its properties attached
    fn tile(&self, x: i32, y: i32) -> Option<Tile<'_>> {
        let id = self.tile_at(x, y)?;
        Some(Tile {
            id,
            x,
            y,
            properties: self.tile_properties(id),
        })
    }
}

/// 表示游戏中的一个地图格子
#[derive(Clone, Copy, Debug)]
pub struct Tile<'a> {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub properties: Option<&'a PropertyBag>,
}

impl Tile<'_> {
    /// 检查格子是否阻挡移动
    pub fn blocks(&self) -> bool {
        self.properties.is_some_and(|p| p.is_truthy("blocks"))
    }
}

/// An object placed on the map by the level designer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub gid: u32,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub properties: PropertyBag,
}

/// Exported map data, already parsed
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapData {
    pub width: i32,
    pub height: i32,
    /// Row-major tile ids, `0` marks an empty cell
    pub tiles: Vec<u32>,
    #[serde(default)]
    pub tile_properties: BTreeMap<u32, PropertyBag>,
    #[serde(default)]
    pub objects: Vec<Placement>,
}

impl MapData {
    /// A map with every cell set to `fill`
    pub fn filled(width: i32, height: i32, fill: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![fill; (width.max(0) * height.max(0)) as usize],
            tile_properties: BTreeMap::new(),
            objects: Vec::new(),
        }
    }

    /// Check that the tile layer matches the declared size
    pub fn validate(&self) -> Result<(), GameError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(GameError::InvalidContent(format!(
                "map size {}x{} is not positive",
                self.width, self.height
            )));
        }
        let expected = (self.width * self.height) as usize;
        if self.tiles.len() != expected {
            return Err(GameError::InvalidContent(format!(
                "map declares {}x{} but has {} tiles",
                self.width,
                self.height,
                self.tiles.len()
            )));
        }
        Ok(())
    }

    pub fn set_tile(&mut self, x: i32, y: i32, id: u32) {
        if self.contains(x, y) {
            let idx = (y * self.width + x) as usize;
            self.tiles[idx] = id;
        }
    }

    pub fn set_tile_property(&mut self, id: u32, key: &str, value: &str) {
        self.tile_properties.entry(id).or_default().set(key, value);
    }
}

impl TileMap for MapData {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn tile_at(&self, x: i32, y: i32) -> Option<u32> {
        if !self.contains(x, y) {
            return None;
        }
        match self.tiles.get((y * self.width + x) as usize) {
            Some(0) | None => None,
            Some(&id) => Some(id),
        }
    }

    fn tile_properties(&self, tile_id: u32) -> Option<&PropertyBag> {
        self.tile_properties.get(&tile_id)
    }

    fn object_layers(&self) -> &[Placement] {
        &self.objects
    }
}
