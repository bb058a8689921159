//! Option generator - legal actions available at a board coordinate
//!
//! Read-only: units are inspected through a topped-up copy, so asking twice
//! against the same board returns the same options.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::game::GameState;
use crate::hex::AxialCoord;
use crate::pathfind::{reachable, Path, ReachMap};
use crate::rules::{RulesEngine, TerrainDefinition, UnitTypeId};
use crate::turn::refreshed;
use crate::world::Unit;

/// A candidate action
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameOption {
    Move {
        to: AxialCoord,
        cost: f64,
        path: Path,
    },
    Attack {
        target: AxialCoord,
        damage_estimate: f64,
    },
    Capture {
        target: AxialCoord,
    },
    Build {
        unit_type: UnitTypeId,
        cost: i64,
    },
    EndTurn,
}

/// Options at one coordinate, plus the reach map used for moves
#[derive(Clone, Debug, PartialEq)]
pub struct OptionsAt {
    pub coord: AxialCoord,
    pub options: Vec<GameOption>,
    pub reach: Option<ReachMap>,
}

impl OptionsAt {
    pub fn moves(&self) -> impl Iterator<Item = &GameOption> + '_ {
        self.options
            .iter()
            .filter(|o| matches!(o, GameOption::Move { .. }))
    }

    pub fn attacks(&self) -> impl Iterator<Item = &GameOption> + '_ {
        self.options
            .iter()
            .filter(|o| matches!(o, GameOption::Attack { .. }))
    }

    pub fn builds(&self) -> impl Iterator<Item = &GameOption> + '_ {
        self.options
            .iter()
            .filter(|o| matches!(o, GameOption::Build { .. }))
    }
}

/// Enumerate every legal action at `coord`.
///
/// Order: moves by cost then coordinate, attacks by coordinate, capture,
/// builds by unit type id, end turn. A finished game has no options.
pub fn options_at(state: &GameState, rules: &RulesEngine, coord: AxialCoord) -> Result<OptionsAt> {
    let mut out = OptionsAt {
        coord,
        options: Vec::new(),
        reach: None,
    };
    if !state.turn.is_playing() {
        return Ok(out);
    }
    if !state.world.in_bounds(coord) {
        return Err(EngineError::InvalidPosition(coord));
    }

    let current = state.turn.current_player();
    let turn = state.turn.turn_counter();

    match state.world.unit(coord) {
        Some(unit) if unit.owner == current => {
            let unit = refreshed(unit, turn, &state.world, rules)?;

            if unit.movement_remaining > 0.0 {
                let reach = reachable(&state.world, rules, &unit, &state.config.engine)?;
                for (to, cost) in reach.destinations() {
                    if let Some(path) = reach.path_to(to) {
                        out.options.push(GameOption::Move { to, cost, path });
                    }
                }
                out.reach = Some(reach);
            }

            if !unit.attack_spent {
                out.options.extend(attack_options(state, rules, &unit)?);
                match capture_check(state, rules, &unit) {
                    Ok(()) => out.options.push(GameOption::Capture { target: coord }),
                    Err(e @ EngineError::RulesNotFound(_)) => return Err(e),
                    Err(_) => {}
                }
            }
        }
        Some(_) => {}
        None => out.options.extend(build_options(state, rules, coord)?),
    }

    out.options.push(GameOption::EndTurn);
    Ok(out)
}

fn attack_options(state: &GameState, rules: &RulesEngine, unit: &Unit) -> Result<Vec<GameOption>> {
    let range = rules.unit_definition(unit.unit_type)?.stats.attack_range;
    let mut targets: Vec<AxialCoord> = state
        .world
        .units()
        .into_iter()
        .filter(|other| other.owner != unit.owner && unit.coord.distance_to(other.coord) <= range)
        .map(|other| other.coord)
        .collect();
    targets.sort();

    let mut options = Vec::new();
    for target in targets {
        let Some(defender) = state.world.unit(target) else {
            continue;
        };
        // No damage table means this pairing cannot fight
        if let Ok(dist) = rules.attack_distribution(unit.unit_type, defender.unit_type) {
            options.push(GameOption::Attack {
                target,
                damage_estimate: dist.expected_damage,
            });
        }
    }
    Ok(options)
}

fn build_options(state: &GameState, rules: &RulesEngine, coord: AxialCoord) -> Result<Vec<GameOption>> {
    let terrain = match build_site(state, rules, coord) {
        Ok(terrain) => terrain,
        Err(e @ EngineError::RulesNotFound(_)) => return Err(e),
        Err(_) => return Ok(Vec::new()),
    };

    let coins = state.turn.coins(state.turn.current_player());
    let mut unit_types = terrain.buildable_units.clone();
    unit_types.sort_unstable();
    unit_types.dedup();

    let mut options = Vec::new();
    for unit_type in unit_types {
        if !state.config.is_unit_allowed(unit_type) {
            continue;
        }
        let cost = rules.unit_definition(unit_type)?.stats.cost;
        if cost <= coins {
            options.push(GameOption::Build { unit_type, cost });
        }
    }
    Ok(options)
}

/// Terrain of a tile able to produce a unit right now.
///
/// The tile must belong to the current player and have buildable units. It
/// must also be empty and not have built this turn.
pub(crate) fn build_site<'r>(
    state: &GameState,
    rules: &'r RulesEngine,
    at: AxialCoord,
) -> Result<&'r TerrainDefinition> {
    let tile = state.world.require_tile(at)?;
    let current = state.turn.current_player();
    if tile.owner != Some(current) {
        return Err(EngineError::CannotBuild {
            at,
            reason: "tile is not owned by the current player".to_string(),
        });
    }
    let terrain = rules.terrain_definition(tile.terrain)?;
    if !terrain.can_build() {
        return Err(EngineError::CannotBuild {
            at,
            reason: format!("{} cannot produce units", terrain.name),
        });
    }
    if state.world.is_occupied(at) {
        return Err(EngineError::TileOccupied(at));
    }
    if tile.last_built_turn == Some(state.turn.turn_counter()) {
        return Err(EngineError::CannotBuild {
            at,
            reason: "tile already built this turn".to_string(),
        });
    }
    Ok(terrain)
}

/// Whether `unit` (already topped up) may start capturing its tile
pub(crate) fn capture_check(state: &GameState, rules: &RulesEngine, unit: &Unit) -> Result<()> {
    let at = unit.coord;
    let cannot = |reason: &str| EngineError::CannotCapture {
        at,
        reason: reason.to_string(),
    };

    if !rules.unit_definition(unit.unit_type)?.stats.can_capture {
        return Err(cannot("unit type cannot capture"));
    }
    let tile = state.world.require_tile(at)?;
    if !rules.terrain_definition(tile.terrain)?.capturable {
        return Err(cannot("terrain is not capturable"));
    }
    if tile.owner == Some(unit.owner) {
        return Err(cannot("tile already owned"));
    }
    if unit.is_capturing() {
        return Err(cannot("capture already in progress"));
    }
    if unit.attack_spent {
        return Err(EngineError::ActionAlreadyUsed(at));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::test_support::{fixture_rules, grass_world, unit_of, ARTILLERY, LAND_BASE, SCOUT, SOLDIER, TANK};
    use crate::world::{Tile, World};

    const BASE: AxialCoord = AxialCoord::new(-2, 0);

    fn base_state(coins: i64) -> GameState {
        let mut world = grass_world(4);
        world.set_tile(Tile::new(BASE, LAND_BASE).owned_by(1));
        GameState::new(GameConfig::default().with_starting_coins(coins), world).unwrap()
    }

    fn kinds(options: &[GameOption]) -> Vec<&'static str> {
        options
            .iter()
            .map(|o| match o {
                GameOption::Move { .. } => "move",
                GameOption::Attack { .. } => "attack",
                GameOption::Capture { .. } => "capture",
                GameOption::Build { .. } => "build",
                GameOption::EndTurn => "end",
            })
            .collect()
    }

    #[test]
    fn test_empty_base_offers_affordable_builds() {
        let rules = fixture_rules();
        let state = base_state(200);
        let opts = options_at(&state, &rules, BASE).unwrap();
        assert_eq!(
            opts.options,
            vec![
                GameOption::Build { unit_type: SOLDIER, cost: 75 },
                GameOption::Build { unit_type: TANK, cost: 150 },
                GameOption::Build { unit_type: ARTILLERY, cost: 200 },
                GameOption::EndTurn,
            ]
        );
    }

    #[test]
    fn test_any_unit_on_base_suppresses_builds() {
        let rules = fixture_rules();
        for owner in [1, 2] {
            let mut state = base_state(1000);
            state.world.add_unit(unit_of(&rules, SOLDIER, BASE, owner)).unwrap();
            let opts = options_at(&state, &rules, BASE).unwrap();
            assert_eq!(opts.builds().count(), 0, "owner {owner}");
        }
    }

    #[test]
    fn test_allowed_units_filter() {
        let rules = fixture_rules();
        let mut state = base_state(1000);
        state.config = state.config.clone().with_allowed_units(vec![TANK, SCOUT]);
        let opts = options_at(&state, &rules, BASE).unwrap();
        assert_eq!(opts.builds().count(), 2);
    }

    #[test]
    fn test_empty_or_enemy_coordinate_yields_end_turn_only() {
        let rules = fixture_rules();
        let mut state = base_state(1000);
        let enemy = AxialCoord::new(2, 0);
        state.world.add_unit(unit_of(&rules, SOLDIER, enemy, 2)).unwrap();

        for coord in [AxialCoord::new(1, 1), enemy] {
            let opts = options_at(&state, &rules, coord).unwrap();
            assert_eq!(opts.options, vec![GameOption::EndTurn]);
        }
    }

    #[test]
    fn test_unit_options_ordering() {
        let rules = fixture_rules();
        let mut state = base_state(0);
        let at = AxialCoord::new(0, 0);
        state.world.add_unit(unit_of(&rules, SOLDIER, at, 1)).unwrap();
        state.world.add_unit(unit_of(&rules, TANK, AxialCoord::new(1, 0), 2)).unwrap();
        state.world.add_unit(unit_of(&rules, SOLDIER, AxialCoord::new(0, -1), 2)).unwrap();

        let opts = options_at(&state, &rules, at).unwrap();
        let k = kinds(&opts.options);
        let first_attack = k.iter().position(|&s| s == "attack").unwrap();
        assert!(k[..first_attack].iter().all(|&s| s == "move"));
        assert_eq!(k.last(), Some(&"end"));

        let attacks: Vec<(AxialCoord, f64)> = opts
            .attacks()
            .map(|o| match o {
                GameOption::Attack { target, damage_estimate } => (*target, *damage_estimate),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(attacks.len(), 2);
        assert_eq!(attacks[0].0, AxialCoord::new(0, -1));
        assert!((attacks[0].1 - 1.9).abs() < 1e-9);
        assert_eq!(attacks[1].0, AxialCoord::new(1, 0));
        assert!((attacks[1].1 - 0.5).abs() < 1e-9);

        let costs: Vec<f64> = opts
            .moves()
            .map(|o| match o {
                GameOption::Move { cost, .. } => *cost,
                _ => unreachable!(),
            })
            .collect();
        assert!(costs.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_options_are_idempotent() {
        let rules = fixture_rules();
        let mut state = base_state(500);
        let at = AxialCoord::new(0, 0);
        let mut unit = unit_of(&rules, SOLDIER, at, 1);
        unit.last_refreshed_turn = 0;
        unit.movement_remaining = 0.0;
        state.world.add_unit(unit).unwrap();
        let before = state.clone();

        let first = options_at(&state, &rules, at).unwrap();
        let second = options_at(&state, &rules, at).unwrap();
        assert_eq!(first, second);
        // Stale unit is read through a refreshed copy, never written
        assert!(first.moves().count() > 0);
        assert_eq!(state, before);
    }

    #[test]
    fn test_capture_option() {
        let rules = fixture_rules();
        let mut world = grass_world(3);
        let enemy_base = AxialCoord::new(1, 0);
        world.set_tile(Tile::new(enemy_base, LAND_BASE).owned_by(2));
        world.add_unit(unit_of(&rules, SOLDIER, enemy_base, 1)).unwrap();
        world.add_unit(unit_of(&rules, TANK, AxialCoord::new(-3, 0), 2)).unwrap();
        let mut state = GameState::new(GameConfig::default(), world).unwrap();

        let opts = options_at(&state, &rules, enemy_base).unwrap();
        assert!(opts.options.contains(&GameOption::Capture { target: enemy_base }));

        // Tanks cannot capture
        state.world.remove_unit(enemy_base);
        state.world.add_unit(unit_of(&rules, TANK, enemy_base, 1)).unwrap();
        let opts = options_at(&state, &rules, enemy_base).unwrap();
        assert!(!kinds(&opts.options).contains(&"capture"));
    }

    #[test]
    fn test_out_of_bounds_and_ended() {
        let rules = fixture_rules();
        let mut state = base_state(0);
        assert_eq!(
            options_at(&state, &rules, AxialCoord::new(50, 50)),
            Err(EngineError::InvalidPosition(AxialCoord::new(50, 50)))
        );

        // Player 2 owns nothing, so player 1 wins
        state.turn.evaluate_victory(&state.world, &rules).unwrap();
        assert!(!state.turn.is_playing());
        assert!(options_at(&state, &rules, BASE).unwrap().options.is_empty());
    }

    #[test]
    fn test_huge_attack_range_reaches_every_enemy() {
        let json = r#"{
            "units": [{"id": 1, "name": "Long",
                       "baseStats": {"health": 10, "movement": 0, "attackRange": 4294967295},
                       "movementCosts": {"Plain": 1},
                       "attacks": {"Long": {"minDamage": 1, "maxDamage": 1,
                                            "probabilities": {"1": 1.0}}}}],
            "terrains": [{"id": 1, "name": "Plain"}]
        }"#;
        let rules = RulesEngine::from_json(json).unwrap();
        let stats = &rules.unit_definition(1).unwrap().stats;
        assert_eq!(stats.attack_range, u32::MAX);

        let mut world = World::from_tiles(AxialCoord::new(0, 0).range(2).into_iter().map(|c| Tile::new(c, 1)));
        let origin = AxialCoord::new(0, 0);
        world.add_unit(Unit::new(origin, 1, 1, stats, 1)).unwrap();
        world.add_unit(Unit::new(AxialCoord::new(-1, 1), 2, 1, stats, 1)).unwrap();
        world.add_unit(Unit::new(AxialCoord::new(2, 0), 2, 1, stats, 1)).unwrap();
        let state = GameState::new(GameConfig::default(), world).unwrap();

        let opts = options_at(&state, &rules, origin).unwrap();
        let targets: Vec<AxialCoord> = opts
            .attacks()
            .filter_map(|o| match o {
                GameOption::Attack { target, .. } => Some(*target),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec![AxialCoord::new(2, 0), AxialCoord::new(-1, 1)]);
    }
}
