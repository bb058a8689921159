//! Moves submitted by players and the board changes they produce

use serde::{Deserialize, Serialize};

use crate::hex::AxialCoord;
use crate::rules::UnitTypeId;
use crate::world::{PlayerId, Unit};

/// A player action
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameMove {
    /// Move a unit. Without an explicit path the cheapest one is used.
    MoveUnit {
        from: AxialCoord,
        to: AxialCoord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<Vec<AxialCoord>>,
    },
    AttackUnit {
        attacker: AxialCoord,
        target: AxialCoord,
    },
    BuildUnit {
        at: AxialCoord,
        unit_type: UnitTypeId,
    },
    /// Start capturing the tile under the unit at `at`
    CaptureTile { at: AxialCoord },
    EndTurn,
}

impl GameMove {
    /// Moves whose outcome cannot be taken back
    pub fn is_irreversible(&self) -> bool {
        match self {
            GameMove::AttackUnit { .. } | GameMove::BuildUnit { .. } | GameMove::EndTurn => true,
            GameMove::MoveUnit { .. } | GameMove::CaptureTile { .. } => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GameMove::MoveUnit { .. } => "MoveUnit",
            GameMove::AttackUnit { .. } => "AttackUnit",
            GameMove::BuildUnit { .. } => "BuildUnit",
            GameMove::CaptureTile { .. } => "CaptureTile",
            GameMove::EndTurn => "EndTurn",
        }
    }
}

/// A single board change produced by a move
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorldChange {
    UnitMoved {
        from: AxialCoord,
        to: AxialCoord,
        path: Vec<AxialCoord>,
        cost: f64,
    },
    UnitDamaged {
        at: AxialCoord,
        previous_health: i32,
        new_health: i32,
    },
    UnitKilled {
        at: AxialCoord,
        unit: Unit,
    },
    PlayerChanged {
        previous: PlayerId,
        current: PlayerId,
        turn: u32,
    },
    UnitBuilt {
        unit: Unit,
        cost: i64,
    },
    CaptureStarted {
        at: AxialCoord,
        player: PlayerId,
    },
    TileCaptured {
        at: AxialCoord,
        player: PlayerId,
        previous_owner: Option<PlayerId>,
    },
    CoinsChanged {
        player: PlayerId,
        previous: i64,
        current: i64,
    },
    PlayerEliminated {
        player: PlayerId,
    },
    GameEnded {
        winner: Option<PlayerId>,
    },
}

/// Outcome of one applied move
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveResult {
    #[serde(rename = "move")]
    pub game_move: GameMove,
    pub changes: Vec<WorldChange>,
    pub irreversible: bool,
}

impl MoveResult {
    pub fn new(game_move: GameMove, changes: Vec<WorldChange>) -> Self {
        let irreversible = game_move.is_irreversible();
        Self {
            game_move,
            changes,
            irreversible,
        }
    }
}

/// The atomic unit of committed history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveGroup {
    pub group_number: u64,
    pub moves: Vec<MoveResult>,
}

impl MoveGroup {
    pub fn game_moves(&self) -> impl Iterator<Item = &GameMove> + '_ {
        self.moves.iter().map(|m| &m.game_move)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irreversible_set() {
        let at = AxialCoord::new(0, 0);
        assert!(GameMove::EndTurn.is_irreversible());
        assert!(GameMove::AttackUnit { attacker: at, target: at }.is_irreversible());
        assert!(GameMove::BuildUnit { at, unit_type: 1 }.is_irreversible());
        assert!(!GameMove::MoveUnit { from: at, to: at, path: None }.is_irreversible());
        assert!(!GameMove::CaptureTile { at }.is_irreversible());
    }

    #[test]
    fn test_tagged_json() {
        let mv: GameMove = serde_json::from_str(
            r#"{"type": "MoveUnit", "from": {"q": 0, "r": 0}, "to": {"q": 1, "r": 0}}"#,
        )
        .unwrap();
        assert_eq!(
            mv,
            GameMove::MoveUnit {
                from: AxialCoord::new(0, 0),
                to: AxialCoord::new(1, 0),
                path: None
            }
        );
        let end = serde_json::to_value(GameMove::EndTurn).unwrap();
        assert_eq!(end["type"], "EndTurn");
    }
}
