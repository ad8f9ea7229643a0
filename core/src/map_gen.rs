//! Deterministic terrain generation.
//!
//! One roll per tile, row-major. The thresholds below are part of the save
//! format contract: changing them changes every generated map.

use serde::{Deserialize, Serialize};

use crate::{components::Position, rng::SimRng};

pub const WATER_THRESHOLD: f64 = 0.1;
pub const HILL_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerrainKind {
    Grass,
    Hill,
    Water,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainTile {
    pub terrain:  TerrainKind,
    pub passable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSize {
    #[serde(rename = "w")]
    pub width:  i32,
    #[serde(rename = "h")]
    pub height: i32,
}

impl MapSize {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// width x height, or None for a negative or overflowing size.
    pub fn tile_count(&self) -> Option<usize> {
        let width = usize::try_from(self.width).ok()?;
        let height = usize::try_from(self.height).ok()?;
        width.checked_mul(height)
    }
}

impl Default for MapSize {
    fn default() -> Self {
        Self { width: 24, height: 24 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub width:  i32,
    pub height: i32,
    pub tiles:  Vec<TerrainTile>,
}

impl MapData {
    /// True when the tile array covers exactly width x height.
    pub fn is_well_formed(&self) -> bool {
        self.size().tile_count() == Some(self.tiles.len())
    }

    pub fn size(&self) -> MapSize {
        MapSize::new(self.width, self.height)
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn center(&self) -> Position {
        Position::new(self.width / 2, self.height / 2)
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(pos.y as usize * self.width as usize + pos.x as usize)
    }

    pub fn tile(&self, pos: Position) -> Option<&TerrainTile> {
        self.index(pos).and_then(|i| self.tiles.get(i))
    }

    pub fn tile_mut(&mut self, pos: Position) -> Option<&mut TerrainTile> {
        self.index(pos).and_then(move |i| self.tiles.get_mut(i))
    }

    /// In bounds and not water.
    pub fn is_passable(&self, pos: Position) -> bool {
        self.tile(pos).map(|t| t.passable).unwrap_or(false)
    }

    /// Turn a water tile into grass so something can be built on it.
    pub fn make_passable(&mut self, pos: Position) {
        if let Some(tile) = self.tile_mut(pos) {
            if !tile.passable {
                tile.terrain = TerrainKind::Grass;
                tile.passable = true;
            }
        }
    }
}

fn classify(roll: f64) -> TerrainKind {
    if roll < WATER_THRESHOLD {
        TerrainKind::Water
    } else if roll < HILL_THRESHOLD {
        TerrainKind::Hill
    } else {
        TerrainKind::Grass
    }
}

pub fn generate(seed: u64, size: MapSize) -> MapData {
    let mut rng = SimRng::new(seed).with_name("terrain");
    let tile_count = size.tile_count().unwrap_or(0);
    let mut tiles = Vec::with_capacity(tile_count);

    for _ in 0..tile_count {
        let terrain = classify(rng.next_f64());
        tiles.push(TerrainTile {
            terrain,
            passable: terrain != TerrainKind::Water,
        });
    }

    MapData {
        width: size.width,
        height: size.height,
        tiles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_and_size_produce_identical_maps() {
        let a = generate(12345, MapSize::new(16, 12));
        let b = generate(12345, MapSize::new(16, 12));
        assert_eq!(a, b);
    }

    #[test]
    fn tile_count_matches_dimensions() {
        let map = generate(7, MapSize::new(9, 7));
        assert_eq!(map.tiles.len(), 63);
        assert_eq!(map.width * map.height, 63);
    }

    #[test]
    fn water_is_the_only_impassable_terrain() {
        let map = generate(99, MapSize::new(20, 20));
        for tile in &map.tiles {
            assert_eq!(tile.passable, tile.terrain != TerrainKind::Water);
        }
    }

    #[test]
    fn make_passable_converts_water_to_grass() {
        let mut map = generate(3, MapSize::new(4, 4));
        let pos = Position::new(2, 2);
        if let Some(tile) = map.tile_mut(pos) {
            tile.terrain = TerrainKind::Water;
            tile.passable = false;
        }
        assert!(!map.is_passable(pos));

        map.make_passable(pos);
        assert!(map.is_passable(pos));
        assert_eq!(map.tile(pos).map(|t| t.terrain), Some(TerrainKind::Grass));
    }

    #[test]
    fn out_of_bounds_is_not_passable() {
        let map = generate(3, MapSize::new(4, 4));
        assert!(!map.is_passable(Position::new(-1, 0)));
        assert!(!map.is_passable(Position::new(4, 0)));
    }

    #[test]
    fn oversized_dimensions_do_not_overflow() {
        let huge = MapSize::new(70_000, 70_000);
        assert_eq!(huge.tile_count(), Some(4_900_000_000));
        assert_eq!(MapSize::new(-1, 5).tile_count(), None);
        assert_eq!(MapSize::new(i32::MAX, i32::MAX).tile_count(), Some(i32::MAX as usize * i32::MAX as usize));

        let map = MapData { width: 70_000, height: 70_000, tiles: Vec::new() };
        assert!(!map.is_well_formed());
        assert!(generate(1, MapSize::new(-3, 4)).tiles.is_empty());
    }
}
