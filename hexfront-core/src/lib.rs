//! HEXFRONT Core - rules and turn-resolution engine
//!
//! This crate provides the game logic for HEXFRONT:
//! - Hex geometry (axial coordinates, row/col display form)
//! - Data-driven rules catalog (movement costs, damage distributions)
//! - Board state and movement search
//! - Option generation, combat and the turn state machine
//! - Atomic move-batch processing

pub mod hex;
pub mod error;
pub mod rules;
pub mod world;
pub mod config;
pub mod pathfind;
pub mod options;
pub mod combat;
pub mod turn;
pub mod moves;
pub mod game;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient access
pub use hex::{AxialCoord, Bounds, Direction, RowCol, DIRECTIONS};
pub use error::{EngineError, Result, RulesKey, RulesLoadError};
pub use rules::{
    DamageBucket, DamageDistribution, MovementCost, RulesEngine, TerrainDefinition,
    TerrainTypeId, UnitDefinition, UnitStats, UnitTypeId,
};
pub use world::{PlayerId, Tile, Unit, World};
pub use config::{EngineConfig, GameConfig, PassThroughPolicy};
pub use pathfind::{find_path, reachable, validate_path, Path, PathStep, Reach, ReachMap};
pub use options::{options_at, GameOption, OptionsAt};
pub use combat::{resolve_attack, RngState};
pub use turn::{refresh_if_stale, refreshed, GameStatus, PlayerState, TurnState};
pub use moves::{GameMove, MoveGroup, MoveResult, WorldChange};
pub use game::{Game, GameState};
