//! Game state and move processing

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::combat::{resolve_attack, RngState};
use crate::config::GameConfig;
use crate::error::{EngineError, Result};
use crate::hex::AxialCoord;
use crate::moves::{GameMove, MoveResult, WorldChange};
use crate::options::{build_site, capture_check, options_at, GameOption, OptionsAt};
use crate::pathfind::{find_path, validate_path};
use crate::rules::{RulesEngine, UnitTypeId};
use crate::turn::{refreshed, GameStatus, TurnState};
use crate::world::{PlayerId, Unit, World};

// ============================================================================
// GAME STATE
// ============================================================================

/// Everything needed to resume a game, minus the rules catalog.
///
/// The storage version is not part of the state; it lives with the stored
/// record and only the persistence layer advances it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub config: GameConfig,
    pub turn: TurnState,
    pub world: World,
    /// Number the next committed move group will carry, starting at 1
    pub current_group_number: u64,
    pub rng: RngState,
}

impl GameState {
    /// New game on `world`. Every unit must belong to a configured player.
    pub fn new(config: GameConfig, world: World) -> Result<Self> {
        if config.player_count < 2 {
            return Err(EngineError::InvalidTarget(format!(
                "a game needs at least two players, got {}",
                config.player_count
            )));
        }
        let owners = world
            .units()
            .into_iter()
            .map(|u| u.owner)
            .chain(world.tiles().into_iter().filter_map(|t| t.owner));
        for owner in owners {
            if owner == 0 || owner > config.player_count {
                return Err(EngineError::InvalidTarget(format!("unknown player {owner}")));
            }
        }

        Ok(Self {
            turn: TurnState::new(&config),
            rng: RngState::new(config.seed),
            current_group_number: 1,
            world,
            config,
        })
    }

    pub fn current_player(&self) -> PlayerId {
        self.turn.current_player()
    }

    pub fn status(&self) -> GameStatus {
        self.turn.status()
    }

    /// Apply one move. Validation runs before any mutation.
    pub fn apply_move(&mut self, rules: &RulesEngine, game_move: &GameMove) -> Result<MoveResult> {
        self.turn.ensure_playing()?;

        let mut changes = match game_move {
            GameMove::MoveUnit { from, to, path } => {
                self.move_unit(rules, *from, *to, path.as_deref())?
            }
            GameMove::AttackUnit { attacker, target } => {
                resolve_attack(self, rules, *attacker, *target)?
            }
            GameMove::BuildUnit { at, unit_type } => self.build_unit(rules, *at, *unit_type)?,
            GameMove::CaptureTile { at } => self.start_capture(rules, *at)?,
            GameMove::EndTurn => {
                self.turn
                    .end_turn(&mut self.world, rules, self.config.base_income)?
            }
        };
        changes.extend(self.turn.evaluate_victory(&self.world, rules)?);

        tracing::debug!(
            kind = game_move.kind(),
            player = self.turn.current_player(),
            changes = changes.len(),
            "Move applied"
        );
        Ok(MoveResult::new(game_move.clone(), changes))
    }

    /// Apply a batch atomically: either every move lands or none does.
    ///
    /// A successful batch is one move group and advances
    /// `current_group_number`.
    pub fn apply_moves(&mut self, rules: &RulesEngine, moves: &[GameMove]) -> Result<Vec<MoveResult>> {
        if moves.is_empty() {
            return Err(EngineError::InvalidTarget("no moves submitted".to_string()));
        }

        let mut scratch = self.clone();
        let mut results = Vec::with_capacity(moves.len());
        for game_move in moves {
            results.push(scratch.apply_move(rules, game_move)?);
        }
        scratch.current_group_number += 1;
        *self = scratch;
        Ok(results)
    }

    /// Active-player unit at `at`, topped up for the current turn
    fn active_unit(&self, rules: &RulesEngine, at: AxialCoord) -> Result<Unit> {
        self.world.require_tile(at)?;
        let unit = self.world.require_unit(at)?;
        self.turn.ensure_current(unit.owner)?;
        refreshed(unit, self.turn.turn_counter(), &self.world, rules)
    }

    fn move_unit(
        &mut self,
        rules: &RulesEngine,
        from: AxialCoord,
        to: AxialCoord,
        path: Option<&[AxialCoord]>,
    ) -> Result<Vec<WorldChange>> {
        let mut unit = self.active_unit(rules, from)?;
        let engine = &self.config.engine;
        let path = match path {
            Some(coords) => {
                if coords.last() != Some(&to) {
                    return Err(EngineError::InvalidTarget(format!("path does not end at {to}")));
                }
                validate_path(&self.world, rules, &unit, coords, engine)?
            }
            None => find_path(&self.world, rules, &unit, to, engine)?,
        };

        unit.movement_remaining = (unit.movement_remaining - path.total_cost).max(0.0);
        unit.last_acted_turn = Some(self.turn.turn_counter());
        unit.capture_started_turn = None;
        unit.coord = to;
        self.world.remove_unit(from);
        self.world.add_unit(unit)?;

        Ok(vec![WorldChange::UnitMoved {
            from,
            to,
            path: path.coords(),
            cost: path.total_cost,
        }])
    }

    fn build_unit(
        &mut self,
        rules: &RulesEngine,
        at: AxialCoord,
        unit_type: UnitTypeId,
    ) -> Result<Vec<WorldChange>> {
        let terrain = build_site(self, rules, at)?;
        if !terrain.buildable_units.contains(&unit_type) {
            return Err(EngineError::CannotBuild {
                at,
                reason: format!("{} cannot produce unit type {unit_type}", terrain.name),
            });
        }
        if !self.config.is_unit_allowed(unit_type) {
            return Err(EngineError::CannotBuild {
                at,
                reason: format!("unit type {unit_type} is not allowed in this game"),
            });
        }
        let stats = &rules.unit_definition(unit_type)?.stats;
        let player = self.turn.current_player();
        let available = self.turn.coins(player);
        if stats.cost > available {
            return Err(EngineError::InsufficientFunds {
                cost: stats.cost,
                available,
            });
        }

        let turn = self.turn.turn_counter();
        let unit = Unit::built(at, player, unit_type, stats, turn);
        self.world.add_unit(unit.clone())?;
        if let Some(tile) = self.world.tile_mut(at) {
            tile.last_built_turn = Some(turn);
        }

        let mut changes = Vec::new();
        changes.extend(self.turn.adjust_coins(player, -stats.cost));
        changes.push(WorldChange::UnitBuilt {
            unit,
            cost: stats.cost,
        });
        Ok(changes)
    }

    fn start_capture(&mut self, rules: &RulesEngine, at: AxialCoord) -> Result<Vec<WorldChange>> {
        let mut unit = self.active_unit(rules, at)?;
        capture_check(self, rules, &unit)?;

        let turn = self.turn.turn_counter();
        unit.capture_started_turn = Some(turn);
        unit.attack_spent = true;
        unit.movement_remaining = 0.0;
        unit.last_acted_turn = Some(turn);
        let player = unit.owner;
        self.world.put_unit(unit)?;

        Ok(vec![WorldChange::CaptureStarted { at, player }])
    }
}

// ============================================================================
// GAME
// ============================================================================

/// A game bound to its rules catalog
#[derive(Clone, Debug)]
pub struct Game {
    state: GameState,
    rules: Arc<RulesEngine>,
}

impl Game {
    pub fn new(config: GameConfig, world: World, rules: Arc<RulesEngine>) -> Result<Self> {
        Ok(Self {
            state: GameState::new(config, world)?,
            rules,
        })
    }

    pub fn from_state(state: GameState, rules: Arc<RulesEngine>) -> Self {
        Self { state, rules }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    pub fn world(&self) -> &World {
        &self.state.world
    }

    pub fn current_player(&self) -> PlayerId {
        self.state.current_player()
    }

    pub fn turn_counter(&self) -> u32 {
        self.state.turn.turn_counter()
    }

    pub fn status(&self) -> GameStatus {
        self.state.status()
    }

    /// Legal actions at `coord`
    pub fn options_at(&self, coord: AxialCoord) -> Result<Vec<GameOption>> {
        Ok(self.options_with_reach(coord)?.options)
    }

    /// Legal actions at `coord` with the reach map for path overlays
    pub fn options_with_reach(&self, coord: AxialCoord) -> Result<OptionsAt> {
        options_at(&self.state, &self.rules, coord)
    }

    /// Apply a batch of moves atomically
    pub fn process_moves(&mut self, moves: &[GameMove]) -> Result<Vec<MoveResult>> {
        self.state.apply_moves(&self.rules, moves)
    }
}
