//! Engine error types

use crate::hex::AxialCoord;
use crate::rules::{TerrainTypeId, UnitTypeId};
use crate::world::PlayerId;

/// Which rules table a failed lookup went to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RulesKey {
    Unit(UnitTypeId),
    Terrain(TerrainTypeId),
    Movement { unit: UnitTypeId, terrain: TerrainTypeId },
    Attack { attacker: UnitTypeId, defender: UnitTypeId },
}

/// Errors raised by engine operations.
///
/// Every validation error is raised before any board mutation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid position: {0}")]
    InvalidPosition(AxialCoord),

    #[error("No unit at {0}")]
    UnitNotFound(AxialCoord),

    #[error("Not player {actual}'s turn (current player is {expected})")]
    NotCurrentPlayersTurn { expected: PlayerId, actual: PlayerId },

    #[error("Insufficient movement to reach {to}: have {available}")]
    InsufficientMovement { to: AxialCoord, available: f64 },

    #[error("Target at distance {distance} is outside attack range {range}")]
    OutOfAttackRange { distance: u32, range: u32 },

    #[error("Insufficient funds: need {cost}, have {available}")]
    InsufficientFunds { cost: i64, available: i64 },

    #[error("Rules entry not found: {0:?}")]
    RulesNotFound(RulesKey),

    #[error("Tile {0} is occupied")]
    TileOccupied(AxialCoord),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unit at {0} has already used its action this turn")]
    ActionAlreadyUsed(AxialCoord),

    #[error("Cannot build at {at}: {reason}")]
    CannotBuild { at: AxialCoord, reason: String },

    #[error("Cannot capture at {at}: {reason}")]
    CannotCapture { at: AxialCoord, reason: String },

    #[error("Game has ended")]
    GameEnded,

    #[error("Search expanded more than {0} nodes")]
    SearchLimitExceeded(usize),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while ingesting a rules data file
#[derive(Debug, thiserror::Error)]
pub enum RulesLoadError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown unit name '{0}'")]
    UnknownUnit(String),

    #[error("Unknown terrain name '{0}'")]
    UnknownTerrain(String),

    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },

    #[error("Distribution {attacker} -> {defender}: {reason}")]
    BadDistribution {
        attacker: String,
        defender: String,
        reason: String,
    },

    #[error("Invalid movement cost {cost} for {unit} on {terrain}")]
    BadMovementCost {
        unit: String,
        terrain: String,
        cost: f64,
    },

    #[error("Rules data is empty: {0}")]
    Empty(&'static str),
}
