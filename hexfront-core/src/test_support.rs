//! Shared fixtures for unit tests

use std::sync::Arc;

use crate::hex::AxialCoord;
use crate::rules::{RulesEngine, TerrainTypeId, UnitTypeId};
use crate::world::{PlayerId, Tile, Unit, World};

pub const FIXTURE_RULES: &str = include_str!("../tests/data/rules.json");

pub const SOLDIER: UnitTypeId = 1;
pub const TANK: UnitTypeId = 2;
pub const ARTILLERY: UnitTypeId = 3;
pub const SCOUT: UnitTypeId = 4;

pub const LAND_BASE: TerrainTypeId = 1;
pub const GRASS: TerrainTypeId = 5;
pub const FOREST: TerrainTypeId = 6;
pub const MOUNTAIN: TerrainTypeId = 7;
pub const WATER: TerrainTypeId = 8;

pub fn fixture_rules() -> RulesEngine {
    RulesEngine::from_json(FIXTURE_RULES).expect("fixture rules parse")
}

pub fn shared_rules() -> Arc<RulesEngine> {
    Arc::new(fixture_rules())
}

/// Hexagonal grass board of the given radius around the origin
pub fn grass_world(radius: u32) -> World {
    World::from_tiles(
        AxialCoord::new(0, 0)
            .range(radius)
            .into_iter()
            .map(|c| Tile::new(c, GRASS)),
    )
}

/// Full-strength unit, refreshed on turn 1
pub fn unit_of(rules: &RulesEngine, unit_type: UnitTypeId, coord: AxialCoord, owner: PlayerId) -> Unit {
    let stats = &rules
        .unit_definition(unit_type)
        .expect("fixture unit type")
        .stats;
    Unit::new(coord, owner, unit_type, stats, 1)
}
