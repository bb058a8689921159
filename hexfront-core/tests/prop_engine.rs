//! Property-based tests for geometry, movement search and options.

use proptest::prelude::*;
use std::collections::BTreeMap;

use hexfront_core::{
    options_at, reachable, AxialCoord, EngineConfig, GameConfig, GameMove, GameState,
    MovementCost, RulesEngine, Tile, Unit, World,
};

const RULES_JSON: &str = include_str!("data/rules.json");
const SOLDIER: u32 = 1;
const GRASS: u32 = 5;
const TERRAINS: [u32; 4] = [5, 6, 7, 8];
const RADIUS: u32 = 4;

fn rules() -> RulesEngine {
    RulesEngine::from_json(RULES_JSON).unwrap()
}

/// Board from a terrain pick per coordinate; the origin is always grass
fn board(picks: &[usize]) -> World {
    let coords = AxialCoord::new(0, 0).range(RADIUS);
    World::from_tiles(coords.into_iter().zip(picks.iter().cycle()).map(|(c, &p)| {
        let terrain = if c == AxialCoord::new(0, 0) { GRASS } else { TERRAINS[p % TERRAINS.len()] };
        Tile::new(c, terrain)
    }))
}

fn soldier(rules: &RulesEngine, coord: AxialCoord, budget: f64) -> Unit {
    let stats = &rules.unit_definition(SOLDIER).unwrap().stats;
    let mut unit = Unit::new(coord, 1, SOLDIER, stats, 1);
    unit.movement_remaining = budget;
    unit
}

/// Minimum entry costs by repeated relaxation, independent of the heap search
fn brute_force_costs(world: &World, rules: &RulesEngine, origin: AxialCoord) -> BTreeMap<AxialCoord, f64> {
    let mut best = BTreeMap::new();
    best.insert(origin, 0.0);
    loop {
        let mut changed = false;
        for tile in world.tiles() {
            let MovementCost::Cost(step) = rules.movement_cost(SOLDIER, tile.terrain).unwrap() else {
                continue;
            };
            if tile.coord == origin {
                continue;
            }
            let via = tile
                .coord
                .neighbors()
                .iter()
                .filter_map(|n| best.get(n))
                .fold(f64::INFINITY, |acc: f64, &c| acc.min(c + step));
            if via < best.get(&tile.coord).copied().unwrap_or(f64::INFINITY) {
                best.insert(tile.coord, via);
                changed = true;
            }
        }
        if !changed {
            return best;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Row/col display form converts back exactly.
    #[test]
    fn prop_row_col_round_trip(q in -200i32..200, r in -200i32..200) {
        let c = AxialCoord::new(q, r);
        prop_assert_eq!(AxialCoord::from_row_col(c.to_row_col()), c);
    }

    /// Every neighbor is at distance one, and distance is symmetric.
    #[test]
    fn prop_distance(q in -50i32..50, r in -50i32..50, q2 in -50i32..50, r2 in -50i32..50) {
        let a = AxialCoord::new(q, r);
        let b = AxialCoord::new(q2, r2);
        prop_assert_eq!(a.distance_to(b), b.distance_to(a));
        for n in a.neighbors() {
            prop_assert_eq!(a.distance_to(n), 1);
        }
    }

    /// The reachable set is exactly the set of tiles whose minimum cost fits
    /// the budget, and reconstructed paths price correctly.
    #[test]
    fn prop_reach_matches_brute_force(
        picks in prop::collection::vec(0usize..4, 61),
        budget in 0u32..7
    ) {
        let rules = rules();
        let world = board(&picks);
        let origin = AxialCoord::new(0, 0);
        let unit = soldier(&rules, origin, budget as f64);

        let reach = reachable(&world, &rules, &unit, &EngineConfig::default()).unwrap();
        let expected: BTreeMap<AxialCoord, f64> = brute_force_costs(&world, &rules, origin)
            .into_iter()
            .filter(|&(c, cost)| c != origin && cost <= budget as f64)
            .collect();
        let actual: BTreeMap<AxialCoord, f64> = reach.destinations().into_iter().collect();
        prop_assert_eq!(&actual, &expected);

        for (dest, cost) in actual {
            let path = reach.path_to(dest).unwrap();
            prop_assert_eq!(path.origin(), Some(origin));
            prop_assert_eq!(path.destination(), Some(dest));
            let mut total = 0.0;
            for pair in path.steps.windows(2) {
                prop_assert_eq!(pair[0].coord.distance_to(pair[1].coord), 1);
                let terrain = world.tile(pair[1].coord).unwrap().terrain;
                let step = rules.movement_cost(SOLDIER, terrain).unwrap().cost();
                prop_assert_eq!(step, Some(pair[1].step_cost));
                total += pair[1].step_cost;
            }
            prop_assert!((total - cost).abs() < 1e-9);
        }
    }

    /// Asking for options twice against an unchanged board gives the same answer.
    #[test]
    fn prop_options_idempotent(
        picks in prop::collection::vec(0usize..4, 61),
        enemy in 0usize..61
    ) {
        let rules = rules();
        let mut world = board(&picks);
        let origin = AxialCoord::new(0, 0);
        world.add_unit(soldier(&rules, origin, 3.0)).unwrap();
        let enemy_at = AxialCoord::new(0, 0).range(RADIUS)[enemy];
        if enemy_at != origin {
            let mut other = soldier(&rules, enemy_at, 3.0);
            other.owner = 2;
            world.add_unit(other).unwrap();
        }
        let state = GameState::new(GameConfig::default(), world).unwrap();

        let first = options_at(&state, &rules, origin).unwrap();
        let second = options_at(&state, &rules, origin).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Ending the turn once per player returns to the first player and
    /// advances the turn counter by exactly one.
    #[test]
    fn prop_rotation(players in 2u32..6, rounds in 1u32..4) {
        let rules = rules();
        let mut world = board(&[0]);
        let coords = AxialCoord::new(0, 0).range(RADIUS);
        for p in 1..=players {
            let mut unit = soldier(&rules, coords[p as usize], 3.0);
            unit.owner = p;
            world.add_unit(unit).unwrap();
        }
        let mut state = GameState::new(GameConfig::default().with_players(players), world).unwrap();

        for _ in 0..rounds * players {
            state.apply_moves(&rules, &[GameMove::EndTurn]).unwrap();
        }
        prop_assert_eq!(state.current_player(), 1);
        prop_assert_eq!(state.turn.turn_counter(), 1 + rounds);
    }
}
