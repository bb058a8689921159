//! Combat resolver - damage draws and their application to the board

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::game::GameState;
use crate::hex::AxialCoord;
use crate::moves::WorldChange;
use crate::rules::{DamageDistribution, RulesEngine};
use crate::turn::refreshed;
use crate::world::World;

/// Persisted position of the game's combat random stream.
///
/// Draws are reproducible from the seed and the stream position, so a
/// reloaded game continues exactly where it stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub word_pos: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, word_pos: 0 }
    }

    /// Draw one damage value and advance the stream
    pub fn draw(&mut self, dist: &DamageDistribution) -> i32 {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_word_pos(u128::from(self.word_pos));
        let damage = dist.sample(&mut rng);
        self.word_pos = u64::try_from(rng.get_word_pos()).unwrap_or(u64::MAX);
        damage
    }
}

/// Subtract `damage` from the unit at `at`, removing it at zero health
pub fn apply_damage(world: &mut World, at: AxialCoord, damage: i32) -> Option<WorldChange> {
    let unit = world.unit_mut(at)?;
    let previous_health = unit.health;
    let new_health = previous_health.saturating_sub(damage);

    if new_health <= 0 {
        let mut unit = world.remove_unit(at)?;
        unit.health = 0;
        tracing::debug!(at = %at, damage, "Unit killed");
        Some(WorldChange::UnitKilled { at, unit })
    } else {
        unit.health = new_health;
        Some(WorldChange::UnitDamaged {
            at,
            previous_health,
            new_health,
        })
    }
}

/// Resolve an attack from `attacker_at` on `target_at`.
///
/// All validation happens before the board is touched. The attack spends
/// the attacker's action and its remaining movement.
pub fn resolve_attack(
    state: &mut GameState,
    rules: &RulesEngine,
    attacker_at: AxialCoord,
    target_at: AxialCoord,
) -> Result<Vec<WorldChange>> {
    state.turn.ensure_playing()?;
    let turn = state.turn.turn_counter();

    state.world.require_tile(attacker_at)?;
    let attacker = state.world.require_unit(attacker_at)?;
    state.turn.ensure_current(attacker.owner)?;
    let mut attacker = refreshed(attacker, turn, &state.world, rules)?;
    if attacker.attack_spent {
        return Err(EngineError::ActionAlreadyUsed(attacker_at));
    }

    state.world.require_tile(target_at)?;
    let defender = state.world.require_unit(target_at)?;
    let defender_turn = state.turn.last_started_turn(defender.owner);
    let defender = refreshed(defender, defender_turn, &state.world, rules)?;
    if defender.owner == attacker.owner {
        return Err(EngineError::InvalidTarget(format!(
            "unit at {target_at} belongs to the attacking player"
        )));
    }

    let range = rules.unit_definition(attacker.unit_type)?.stats.attack_range;
    let distance = attacker_at.distance_to(target_at);
    if distance > range {
        return Err(EngineError::OutOfAttackRange { distance, range });
    }
    let dist = rules.attack_distribution(attacker.unit_type, defender.unit_type)?;

    // Validated; mutate from here on
    let damage = state.rng.draw(dist);
    attacker.attack_spent = true;
    attacker.movement_remaining = 0.0;
    attacker.last_acted_turn = Some(turn);
    state.world.put_unit(attacker.clone())?;
    state.world.put_unit(defender.clone())?;

    let mut changes = Vec::new();
    changes.extend(apply_damage(&mut state.world, target_at, damage));
    tracing::debug!(from = %attacker_at, to = %target_at, damage, "Attack resolved");

    if state.config.engine.retaliation && state.world.is_occupied(target_at) {
        let counter_range = rules.unit_definition(defender.unit_type)?.stats.attack_range;
        if distance <= counter_range && rules.can_attack(defender.unit_type, attacker.unit_type) {
            let counter = rules.attack_distribution(defender.unit_type, attacker.unit_type)?;
            let damage = state.rng.draw(counter);
            changes.extend(apply_damage(&mut state.world, attacker_at, damage));
            tracing::debug!(from = %target_at, to = %attacker_at, damage, "Retaliation");
        }
    }

    Ok(changes)
}
