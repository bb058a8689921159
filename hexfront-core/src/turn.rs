//! Turn state machine - player rotation, lazy unit top-up, victory
//!
//! Unit resources are not reset at turn boundaries. A unit is topped up
//! when it is next read for its owner's benefit and its last refresh
//! predates the current turn counter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::GameConfig;
use crate::error::{EngineError, Result};
use crate::hex::AxialCoord;
use crate::moves::WorldChange;
use crate::rules::RulesEngine;
use crate::world::{PlayerId, Unit, World};

/// Overall game status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum GameStatus {
    Playing,
    /// `winner` is `None` only if every player was eliminated at once
    Ended { winner: Option<PlayerId> },
}

/// Per-player bookkeeping
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub coins: i64,
    #[serde(default)]
    pub eliminated: bool,
}

/// Whose turn it is and how far the game has progressed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    current_player: PlayerId,
    /// Starts at 1, increments once per full rotation
    turn_counter: u32,
    players: BTreeMap<PlayerId, PlayerState>,
    status: GameStatus,
}

impl TurnState {
    pub fn new(config: &GameConfig) -> Self {
        let players = config
            .players()
            .map(|p| {
                (
                    p,
                    PlayerState {
                        coins: config.starting_coins,
                        eliminated: false,
                    },
                )
            })
            .collect();
        Self {
            current_player: 1,
            turn_counter: 1,
            players,
            status: GameStatus::Playing,
        }
    }

    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    pub fn turn_counter(&self) -> u32 {
        self.turn_counter
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == GameStatus::Playing
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, player: PlayerId) -> Option<&PlayerState> {
        self.players.get(&player)
    }

    pub fn coins(&self, player: PlayerId) -> i64 {
        self.players.get(&player).map_or(0, |p| p.coins)
    }

    /// Add `delta` to a player's balance, returning the change record
    pub fn adjust_coins(&mut self, player: PlayerId, delta: i64) -> Option<WorldChange> {
        let state = self.players.get_mut(&player)?;
        let previous = state.coins;
        state.coins = previous.saturating_add(delta);
        Some(WorldChange::CoinsChanged {
            player,
            previous,
            current: state.coins,
        })
    }

    /// Players not yet eliminated, in rotation order
    pub fn active_players(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, s)| !s.eliminated)
            .map(|(&p, _)| p)
            .collect()
    }

    pub fn ensure_playing(&self) -> Result<()> {
        if self.is_playing() {
            Ok(())
        } else {
            Err(EngineError::GameEnded)
        }
    }

    /// Most recent turn in which `player` has already started playing.
    ///
    /// Players later in the rotation than the current one have not started
    /// the current turn yet.
    pub fn last_started_turn(&self, player: PlayerId) -> u32 {
        if player <= self.current_player {
            self.turn_counter
        } else {
            self.turn_counter.saturating_sub(1)
        }
    }

    /// Fail unless `owner` is the player to move
    pub fn ensure_current(&self, owner: PlayerId) -> Result<()> {
        if owner == self.current_player {
            Ok(())
        } else {
            Err(EngineError::NotCurrentPlayersTurn {
                expected: self.current_player,
                actual: owner,
            })
        }
    }

    /// Next non-eliminated player after the current one, and whether the
    /// rotation wrapped past the last player
    pub fn next_player(&self) -> Option<(PlayerId, bool)> {
        let after = self
            .players
            .range(self.current_player + 1..)
            .find(|(_, s)| !s.eliminated)
            .map(|(&p, _)| (p, false));
        after.or_else(|| {
            self.players
                .range(..=self.current_player)
                .find(|(_, s)| !s.eliminated)
                .map(|(&p, _)| (p, true))
        })
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    /// End the current player's turn.
    ///
    /// Pays the ending player's income, rotates to the next active player
    /// and completes captures that player's units began on their last turn.
    pub fn end_turn(
        &mut self,
        world: &mut World,
        rules: &RulesEngine,
        base_income: i64,
    ) -> Result<Vec<WorldChange>> {
        self.ensure_playing()?;
        let ending = self.current_player;
        let income = income_for(world, rules, ending, base_income)?;
        let (next, wrapped) = self.next_player().ok_or(EngineError::GameEnded)?;

        let mut changes = Vec::new();
        if income != 0 {
            changes.extend(self.adjust_coins(ending, income));
        }

        if wrapped {
            self.turn_counter += 1;
        }
        self.current_player = next;
        changes.push(WorldChange::PlayerChanged {
            previous: ending,
            current: next,
            turn: self.turn_counter,
        });

        changes.extend(complete_captures(world, next));

        tracing::debug!(
            from = ending,
            to = next,
            turn = self.turn_counter,
            income,
            "Turn ended"
        );
        Ok(changes)
    }

    /// Eliminate players with nothing left and end the game when at most
    /// one remains
    pub fn evaluate_victory(&mut self, world: &World, rules: &RulesEngine) -> Result<Vec<WorldChange>> {
        let mut changes = Vec::new();
        if !self.is_playing() {
            return Ok(changes);
        }

        for player in self.active_players() {
            if is_defeated(world, rules, player)? {
                if let Some(state) = self.players.get_mut(&player) {
                    state.eliminated = true;
                }
                tracing::info!(player, "Player eliminated");
                changes.push(WorldChange::PlayerEliminated { player });
            }
        }

        let remaining = self.active_players();
        if remaining.len() <= 1 {
            let winner = remaining.first().copied();
            self.status = GameStatus::Ended { winner };
            tracing::info!(?winner, turn = self.turn_counter, "Game ended");
            changes.push(WorldChange::GameEnded { winner });
        }
        Ok(changes)
    }
}

/// Coins `player` earns at the end of their turn
pub fn income_for(world: &World, rules: &RulesEngine, player: PlayerId, base_income: i64) -> Result<i64> {
    world
        .owned_tiles(player)
        .into_iter()
        .try_fold(base_income, |acc, tile| {
            Ok(acc + rules.terrain_definition(tile.terrain)?.income)
        })
}

/// No units and no capturable tiles left
fn is_defeated(world: &World, rules: &RulesEngine, player: PlayerId) -> Result<bool> {
    if world.unit_count(player) > 0 {
        return Ok(false);
    }
    for tile in world.owned_tiles(player) {
        if rules.terrain_definition(tile.terrain)?.capturable {
            return Ok(false);
        }
    }
    Ok(true)
}

fn complete_captures(world: &mut World, player: PlayerId) -> Vec<WorldChange> {
    let capturing: Vec<AxialCoord> = world
        .units_of(player)
        .filter(|u| u.is_capturing())
        .map(|u| u.coord)
        .collect();

    let mut changes = Vec::new();
    for at in capturing {
        if let Some(unit) = world.unit_mut(at) {
            unit.capture_started_turn = None;
        }
        if let Some(tile) = world.tile_mut(at) {
            let previous_owner = tile.owner.replace(player);
            tile.last_built_turn = None;
            tracing::debug!(at = %at, player, ?previous_owner, "Tile captured");
            changes.push(WorldChange::TileCaptured {
                at,
                player,
                previous_owner,
            });
        }
    }
    changes
}

// ============================================================================
// TOP-UP
// ============================================================================

/// Copy of `unit` with per-turn resources restored for `turn`.
///
/// Movement and attack come back in full. Health regenerates by the
/// terrain's healing value for every elapsed turn that did not follow a
/// turn in which the unit acted, provided the unit stands on a neutral or
/// friendly tile. Health never exceeds the type maximum.
pub fn refreshed(unit: &Unit, turn: u32, world: &World, rules: &RulesEngine) -> Result<Unit> {
    let mut unit = unit.clone();
    if unit.last_refreshed_turn >= turn {
        return Ok(unit);
    }
    let stats = &rules.unit_definition(unit.unit_type)?.stats;

    let elapsed = turn - unit.last_refreshed_turn;
    let busy = u32::from(unit.last_acted_turn == Some(unit.last_refreshed_turn));
    let idle_turns = elapsed.saturating_sub(busy);

    if idle_turns > 0 && unit.health < stats.health {
        if let Some(tile) = world.tile(unit.coord) {
            if tile.owner.map_or(true, |o| o == unit.owner) {
                let healing = rules.terrain_definition(tile.terrain)?.healing.max(0);
                let gained = healing.saturating_mul(i32::try_from(idle_turns).unwrap_or(i32::MAX));
                unit.health = unit.health.saturating_add(gained).min(stats.health);
            }
        }
    }

    unit.movement_remaining = stats.movement;
    unit.attack_spent = false;
    unit.last_refreshed_turn = turn;
    Ok(unit)
}

/// Top up the unit at `coord` in place if it is stale.
///
/// Returns whether a refresh happened.
pub fn refresh_if_stale(world: &mut World, coord: AxialCoord, turn: u32, rules: &RulesEngine) -> Result<bool> {
    let unit = world.require_unit(coord)?;
    if unit.last_refreshed_turn >= turn {
        return Ok(false);
    }
    let fresh = refreshed(unit, turn, world, rules)?;
    if let Some(slot) = world.unit_mut(coord) {
        *slot = fresh;
    }
    Ok(true)
}
