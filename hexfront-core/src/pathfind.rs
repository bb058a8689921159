//! Movement resolver - uniform-cost search over the hex board
//!
//! Edge weight is the cost for the moving unit to enter the destination
//! tile. Impassable tiles and enemy-occupied tiles are never entered.
//! Ties between equal-cost routes resolve by neighbor enumeration order,
//! so reconstructed paths are identical across runs.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::config::{EngineConfig, PassThroughPolicy};
use crate::error::{EngineError, Result};
use crate::hex::{AxialCoord, Direction};
use crate::rules::{MovementCost, RulesEngine};
use crate::world::{Unit, World};

/// Slack allowed when comparing accumulated costs against a budget
pub const COST_EPSILON: f64 = 1e-9;

// ============================================================================
// PATHS
// ============================================================================

/// One step of a path
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub coord: AxialCoord,
    /// Cost of entering this tile
    pub step_cost: f64,
    /// Accumulated cost including this step
    pub total_cost: f64,
}

/// Minimum-cost route from a unit's position to a destination.
///
/// The first step is the origin with zero cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub steps: Vec<PathStep>,
    pub total_cost: f64,
}

impl Path {
    pub fn origin(&self) -> Option<AxialCoord> {
        self.steps.first().map(|s| s.coord)
    }

    pub fn destination(&self) -> Option<AxialCoord> {
        self.steps.last().map(|s| s.coord)
    }

    pub fn coords(&self) -> Vec<AxialCoord> {
        self.steps.iter().map(|s| s.coord).collect()
    }

    /// Number of tiles entered
    pub fn len(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// REACH MAP
// ============================================================================

/// Search result for one coordinate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reach {
    pub cost: f64,
    pub previous: Option<AxialCoord>,
    /// Whether the unit may end its move here
    pub stoppable: bool,
}

/// Every coordinate a unit can reach within its budget
#[derive(Clone, Debug, PartialEq)]
pub struct ReachMap {
    origin: AxialCoord,
    budget: f64,
    entries: BTreeMap<AxialCoord, Reach>,
    expansions: usize,
}

impl ReachMap {
    pub fn origin(&self) -> AxialCoord {
        self.origin
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    /// Nodes expanded by the search
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    pub fn get(&self, coord: AxialCoord) -> Option<&Reach> {
        self.entries.get(&coord)
    }

    /// Cost to stop at `coord`, if it is a legal destination
    pub fn cost_to(&self, coord: AxialCoord) -> Option<f64> {
        self.entries
            .get(&coord)
            .filter(|r| r.stoppable)
            .map(|r| r.cost)
    }

    pub fn can_reach(&self, coord: AxialCoord) -> bool {
        self.cost_to(coord).is_some()
    }

    /// Legal destinations sorted by ascending cost, then coordinate
    pub fn destinations(&self) -> Vec<(AxialCoord, f64)> {
        let mut out: Vec<(AxialCoord, f64)> = self
            .entries
            .iter()
            .filter(|(_, r)| r.stoppable)
            .map(|(&c, r)| (c, r.cost))
            .collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// All searched coordinates including pass-through-only tiles
    pub fn entries(&self) -> impl Iterator<Item = (AxialCoord, &Reach)> + '_ {
        self.entries.iter().map(|(&c, r)| (c, r))
    }

    /// Walk predecessor pointers back to the origin
    pub fn path_to(&self, dest: AxialCoord) -> Option<Path> {
        if !self.can_reach(dest) {
            return None;
        }

        let mut coords = vec![dest];
        let mut current = dest;
        while let Some(prev) = self.entries.get(&current)?.previous {
            coords.push(prev);
            current = prev;
        }
        coords.reverse();

        let mut steps = Vec::with_capacity(coords.len());
        let mut last_total = 0.0;
        for c in coords {
            let total = self.entries.get(&c)?.cost;
            steps.push(PathStep {
                coord: c,
                step_cost: total - last_total,
                total_cost: total,
            });
            last_total = total;
        }
        Some(Path {
            steps,
            total_cost: last_total,
        })
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// Frontier entry; min-heap on cost, then insertion order
#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    seq: u64,
    coord: AxialCoord,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How a unit may interact with an occupied coordinate
enum Occupancy {
    Free,
    PassOnly,
    Blocked,
}

fn occupancy(world: &World, unit: &Unit, coord: AxialCoord, policy: PassThroughPolicy) -> Occupancy {
    match world.unit(coord) {
        None => Occupancy::Free,
        Some(other) if other.owner != unit.owner => Occupancy::Blocked,
        Some(_) => match policy {
            PassThroughPolicy::Blocked => Occupancy::Blocked,
            PassThroughPolicy::PassThroughFriendly => Occupancy::PassOnly,
        },
    }
}

/// Cost for `unit` to enter `coord`; `None` when off-board or impassable
fn entry_cost(world: &World, rules: &RulesEngine, unit: &Unit, coord: AxialCoord) -> Result<Option<f64>> {
    let Some(tile) = world.tile(coord) else {
        return Ok(None);
    };
    Ok(match rules.movement_cost(unit.unit_type, tile.terrain)? {
        MovementCost::Cost(c) => Some(c),
        MovementCost::Impassable => None,
    })
}

/// Compute every coordinate `unit` can reach with its remaining movement.
///
/// A missing movement-cost rule for a tile the search touches is an error,
/// not an implicit block.
pub fn reachable(
    world: &World,
    rules: &RulesEngine,
    unit: &Unit,
    config: &EngineConfig,
) -> Result<ReachMap> {
    let origin = unit.coord;
    let budget = unit.movement_remaining.max(0.0);

    let mut entries: BTreeMap<AxialCoord, Reach> = BTreeMap::new();
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;
    let mut expansions = 0usize;

    entries.insert(
        origin,
        Reach {
            cost: 0.0,
            previous: None,
            stoppable: false,
        },
    );
    heap.push(Frontier {
        cost: 0.0,
        seq,
        coord: origin,
    });

    while let Some(node) = heap.pop() {
        let best = entries.get(&node.coord).map_or(f64::INFINITY, |r| r.cost);
        if node.cost > best {
            continue; // stale
        }

        expansions += 1;
        if expansions > config.max_search_expansions {
            tracing::warn!(
                origin = %origin,
                limit = config.max_search_expansions,
                "Pathfinder expansion limit exceeded"
            );
            return Err(EngineError::SearchLimitExceeded(config.max_search_expansions));
        }

        for dir in Direction::ALL {
            let next = node.coord.neighbor(dir);
            if next == origin {
                continue;
            }
            let stoppable = match occupancy(world, unit, next, config.pass_through) {
                Occupancy::Free => true,
                Occupancy::PassOnly => false,
                Occupancy::Blocked => continue,
            };
            let Some(step) = entry_cost(world, rules, unit, next)? else {
                continue;
            };

            let cost = node.cost + step;
            if cost > budget + COST_EPSILON {
                continue;
            }
            let improves = entries.get(&next).map_or(true, |r| cost < r.cost);
            if improves {
                entries.insert(
                    next,
                    Reach {
                        cost,
                        previous: Some(node.coord),
                        stoppable,
                    },
                );
                seq += 1;
                heap.push(Frontier {
                    cost,
                    seq,
                    coord: next,
                });
            }
        }
    }

    tracing::trace!(origin = %origin, reached = entries.len(), expansions, "Reach computed");

    Ok(ReachMap {
        origin,
        budget,
        entries,
        expansions,
    })
}

/// Minimum-cost path for `unit` to `dest`
pub fn find_path(
    world: &World,
    rules: &RulesEngine,
    unit: &Unit,
    dest: AxialCoord,
    config: &EngineConfig,
) -> Result<Path> {
    world.require_tile(dest)?;
    if dest == unit.coord {
        return Err(EngineError::InvalidTarget(format!("unit is already at {dest}")));
    }
    if world.is_occupied(dest) {
        return Err(EngineError::TileOccupied(dest));
    }

    let reach = reachable(world, rules, unit, config)?;
    reach.path_to(dest).ok_or(EngineError::InsufficientMovement {
        to: dest,
        available: unit.movement_remaining,
    })
}

/// Check an externally supplied path and price it.
///
/// `coords` may start with the unit's own coordinate or with the first
/// tile entered.
pub fn validate_path(
    world: &World,
    rules: &RulesEngine,
    unit: &Unit,
    coords: &[AxialCoord],
    config: &EngineConfig,
) -> Result<Path> {
    let walk = match coords.first() {
        Some(&c) if c == unit.coord => &coords[1..],
        _ => coords,
    };
    let Some(&dest) = walk.last() else {
        return Err(EngineError::InvalidTarget("empty path".to_string()));
    };

    let mut steps = vec![PathStep {
        coord: unit.coord,
        step_cost: 0.0,
        total_cost: 0.0,
    }];
    let mut current = unit.coord;
    let mut total = 0.0;

    for &next in walk {
        world.require_tile(next)?;
        if current.distance_to(next) != 1 {
            return Err(EngineError::InvalidTarget(format!(
                "{next} is not adjacent to {current}"
            )));
        }
        if next == unit.coord {
            return Err(EngineError::InvalidTarget("path revisits its origin".to_string()));
        }
        match occupancy(world, unit, next, config.pass_through) {
            Occupancy::Free => {}
            Occupancy::PassOnly if next != dest => {}
            _ => return Err(EngineError::TileOccupied(next)),
        }
        let step = entry_cost(world, rules, unit, next)?
            .ok_or_else(|| EngineError::InvalidTarget(format!("{next} is impassable")))?;

        total += step;
        steps.push(PathStep {
            coord: next,
            step_cost: step,
            total_cost: total,
        });
        current = next;
    }

    if total > unit.movement_remaining + COST_EPSILON {
        return Err(EngineError::InsufficientMovement {
            to: dest,
            available: unit.movement_remaining,
        });
    }

    Ok(Path {
        steps,
        total_cost: total,
    })
}
