//! Board representation - tiles, units and the per-player unit index

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, Result};
use crate::hex::{AxialCoord, Bounds};
use crate::rules::{TerrainTypeId, UnitStats, UnitTypeId};

/// Player identifier, 1-based
pub type PlayerId = u32;

/// A board tile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub coord: AxialCoord,
    pub terrain: TerrainTypeId,
    /// Owning player; `None` for neutral tiles
    #[serde(default)]
    pub owner: Option<PlayerId>,
    /// Turn in which this tile last produced a unit
    #[serde(default)]
    pub last_built_turn: Option<u32>,
}

impl Tile {
    pub fn new(coord: AxialCoord, terrain: TerrainTypeId) -> Self {
        Self {
            coord,
            terrain,
            owner: None,
            last_built_turn: None,
        }
    }

    pub fn owned_by(mut self, player: PlayerId) -> Self {
        self.owner = Some(player);
        self
    }
}

/// A unit on the board
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub coord: AxialCoord,
    pub owner: PlayerId,
    pub unit_type: UnitTypeId,
    pub health: i32,
    pub movement_remaining: f64,
    /// Turn counter value at the last top-up
    pub last_refreshed_turn: u32,
    /// Turn in which the unit last moved, attacked or started a capture
    #[serde(default)]
    pub last_acted_turn: Option<u32>,
    #[serde(default)]
    pub attack_spent: bool,
    /// Turn in which a capture of the tile under this unit began
    #[serde(default)]
    pub capture_started_turn: Option<u32>,
}

impl Unit {
    /// Unit at full strength, ready to act in `turn`
    pub fn new(
        coord: AxialCoord,
        owner: PlayerId,
        unit_type: UnitTypeId,
        stats: &UnitStats,
        turn: u32,
    ) -> Self {
        Self {
            coord,
            owner,
            unit_type,
            health: stats.health,
            movement_remaining: stats.movement,
            last_refreshed_turn: turn,
            last_acted_turn: None,
            attack_spent: false,
            capture_started_turn: None,
        }
    }

    /// Freshly built unit: full health, cannot act until its owner's next turn
    pub fn built(
        coord: AxialCoord,
        owner: PlayerId,
        unit_type: UnitTypeId,
        stats: &UnitStats,
        turn: u32,
    ) -> Self {
        Self {
            movement_remaining: 0.0,
            attack_spent: true,
            ..Self::new(coord, owner, unit_type, stats, turn)
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capture_started_turn.is_some()
    }
}

// ============================================================================
// WORLD
// ============================================================================

/// Board state.
///
/// Every unit is keyed by its own coordinate, and at most one unit occupies
/// a coordinate. The per-player index mirrors the unit map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WorldData", into = "WorldData")]
pub struct World {
    tiles: FxHashMap<AxialCoord, Tile>,
    units: FxHashMap<AxialCoord, Unit>,
    player_units: BTreeMap<PlayerId, BTreeSet<AxialCoord>>,
    bounds: Option<Bounds>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from tiles, growing the bounding box to fit
    pub fn from_tiles(tiles: impl IntoIterator<Item = Tile>) -> Self {
        let mut world = Self::new();
        for tile in tiles {
            world.set_tile(tile);
        }
        world
    }

    // ========================================================================
    // TILES
    // ========================================================================

    /// Insert or replace a tile
    pub fn set_tile(&mut self, tile: Tile) {
        match &mut self.bounds {
            Some(bounds) => bounds.include(tile.coord),
            None => self.bounds = Some(Bounds::around(tile.coord)),
        }
        self.tiles.insert(tile.coord, tile);
    }

    pub fn tile(&self, coord: AxialCoord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    pub fn tile_mut(&mut self, coord: AxialCoord) -> Option<&mut Tile> {
        self.tiles.get_mut(&coord)
    }

    /// Tile at `coord`, or `InvalidPosition`
    pub fn require_tile(&self, coord: AxialCoord) -> Result<&Tile> {
        self.tile(coord).ok_or(EngineError::InvalidPosition(coord))
    }

    /// Tiles sorted by coordinate
    pub fn tiles(&self) -> Vec<&Tile> {
        let mut tiles: Vec<&Tile> = self.tiles.values().collect();
        tiles.sort_by_key(|t| t.coord);
        tiles
    }

    /// Tiles owned by `player`, sorted by coordinate
    pub fn owned_tiles(&self, player: PlayerId) -> Vec<&Tile> {
        let mut tiles: Vec<&Tile> = self
            .tiles
            .values()
            .filter(|t| t.owner == Some(player))
            .collect();
        tiles.sort_by_key(|t| t.coord);
        tiles
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Whether `coord` lies inside the bounding box
    pub fn in_bounds(&self, coord: AxialCoord) -> bool {
        self.bounds.map_or(false, |b| b.contains(coord))
    }

    // ========================================================================
    // UNITS
    // ========================================================================

    pub fn unit(&self, coord: AxialCoord) -> Option<&Unit> {
        self.units.get(&coord)
    }

    pub fn unit_mut(&mut self, coord: AxialCoord) -> Option<&mut Unit> {
        self.units.get_mut(&coord)
    }

    /// Unit at `coord`, or `UnitNotFound`
    pub fn require_unit(&self, coord: AxialCoord) -> Result<&Unit> {
        self.unit(coord).ok_or(EngineError::UnitNotFound(coord))
    }

    pub fn is_occupied(&self, coord: AxialCoord) -> bool {
        self.units.contains_key(&coord)
    }

    /// Place a unit on an existing, empty tile
    pub fn add_unit(&mut self, unit: Unit) -> Result<()> {
        self.require_tile(unit.coord)?;
        if self.is_occupied(unit.coord) {
            return Err(EngineError::TileOccupied(unit.coord));
        }
        self.player_units
            .entry(unit.owner)
            .or_default()
            .insert(unit.coord);
        self.units.insert(unit.coord, unit);
        Ok(())
    }

    /// Remove a unit from both the board and the player index
    pub fn remove_unit(&mut self, coord: AxialCoord) -> Option<Unit> {
        let unit = self.units.remove(&coord)?;
        if let Some(set) = self.player_units.get_mut(&unit.owner) {
            set.remove(&coord);
            if set.is_empty() {
                self.player_units.remove(&unit.owner);
            }
        }
        Some(unit)
    }

    /// Replace the unit at its own coordinate, keeping the index in step
    pub fn put_unit(&mut self, unit: Unit) -> Result<()> {
        self.remove_unit(unit.coord);
        self.add_unit(unit)
    }

    /// Relocate a unit. The destination must exist and be empty.
    pub fn move_unit(&mut self, from: AxialCoord, to: AxialCoord) -> Result<()> {
        self.require_tile(to)?;
        if self.is_occupied(to) {
            return Err(EngineError::TileOccupied(to));
        }
        let mut unit = self.remove_unit(from).ok_or(EngineError::UnitNotFound(from))?;
        unit.coord = to;
        self.add_unit(unit)
    }

    /// Units of `player` in coordinate order
    pub fn units_of(&self, player: PlayerId) -> impl Iterator<Item = &Unit> + '_ {
        self.player_units
            .get(&player)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(move |c| self.units.get(c))
    }

    pub fn unit_count(&self, player: PlayerId) -> usize {
        self.player_units.get(&player).map_or(0, |s| s.len())
    }

    /// All units sorted by coordinate
    pub fn units(&self) -> Vec<&Unit> {
        let mut units: Vec<&Unit> = self.units.values().collect();
        units.sort_by_key(|u| u.coord);
        units
    }

    pub fn total_units(&self) -> usize {
        self.units.len()
    }

    /// Check the map/index invariants
    pub fn is_consistent(&self) -> bool {
        let keys_match = self.units.iter().all(|(c, u)| *c == u.coord);
        let indexed: usize = self.player_units.values().map(|s| s.len()).sum();
        let index_matches = self.player_units.iter().all(|(p, set)| {
            set.iter()
                .all(|c| self.units.get(c).map_or(false, |u| u.owner == *p))
        });
        let on_tiles = self.units.keys().all(|c| self.tiles.contains_key(c));
        keys_match && index_matches && on_tiles && indexed == self.units.len()
    }
}

// ============================================================================
// SERIALIZATION
// ============================================================================

/// Sorted list form of a board
#[derive(Clone, Debug, Serialize, Deserialize)]
struct WorldData {
    tiles: Vec<Tile>,
    #[serde(default)]
    units: Vec<Unit>,
}

impl From<World> for WorldData {
    fn from(world: World) -> Self {
        let mut tiles: Vec<Tile> = world.tiles.into_values().collect();
        tiles.sort_by_key(|t| t.coord);
        let mut units: Vec<Unit> = world.units.into_values().collect();
        units.sort_by_key(|u| u.coord);
        Self { tiles, units }
    }
}

impl TryFrom<WorldData> for World {
    type Error = EngineError;

    fn try_from(data: WorldData) -> Result<Self> {
        let mut world = World::from_tiles(data.tiles);
        for unit in data.units {
            world.add_unit(unit)?;
        }
        Ok(world)
    }
}
