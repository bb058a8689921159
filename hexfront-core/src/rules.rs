//! Rules engine - immutable catalog of unit stats, movement costs and
//! damage distributions, loaded once from a JSON data file.

use anyhow::Context;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{EngineError, Result, RulesKey, RulesLoadError};

/// Unit type identifier
pub type UnitTypeId = u32;

/// Terrain type identifier
pub type TerrainTypeId = u32;

/// Movement points a unit type gets when the data file declares none
pub const DEFAULT_MOVEMENT: f64 = 3.0;

/// Attack range a unit type gets when the data file declares none
pub const DEFAULT_ATTACK_RANGE: u32 = 1;

/// Tolerance when checking that distribution weights sum to one
pub const WEIGHT_EPSILON: f64 = 1e-6;

// ============================================================================
// CATALOG TYPES
// ============================================================================

/// Cost for a unit to enter a terrain
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MovementCost {
    Cost(f64),
    Impassable,
}

impl MovementCost {
    /// The cost, or `None` when impassable
    pub fn cost(self) -> Option<f64> {
        match self {
            MovementCost::Cost(c) => Some(c),
            MovementCost::Impassable => None,
        }
    }

    pub fn is_impassable(self) -> bool {
        matches!(self, MovementCost::Impassable)
    }
}

/// Per-type unit statistics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub cost: i64,
    pub health: i32,
    pub movement: f64,
    pub attack: i32,
    pub defense: i32,
    pub sight_range: u32,
    pub can_capture: bool,
    pub attack_range: u32,
}

/// Unit type definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub id: UnitTypeId,
    pub name: String,
    pub stats: UnitStats,
}

/// Terrain type definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainDefinition {
    pub id: TerrainTypeId,
    pub name: String,
    pub defense_bonus: i32,
    /// Owned tiles of this terrain count as bases and can be captured
    pub capturable: bool,
    /// Unit types an owned tile of this terrain can produce
    pub buildable_units: Vec<UnitTypeId>,
    /// Coins per turn for the owner
    pub income: i64,
    /// Health regenerated per turn by idle units standing here
    pub healing: i32,
}

impl TerrainDefinition {
    pub fn can_build(&self) -> bool {
        !self.buildable_units.is_empty()
    }
}

/// One possible damage value and its probability
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageBucket {
    pub damage: i32,
    pub weight: f64,
}

/// Discrete damage distribution for an attacker/defender pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageDistribution {
    pub min_damage: i32,
    pub max_damage: i32,
    /// Sorted by ascending damage, one bucket per damage value
    pub buckets: Vec<DamageBucket>,
    pub expected_damage: f64,
}

impl DamageDistribution {
    /// Build and validate a distribution.
    ///
    /// Weights must be non-negative and sum to 1.0, every damage value must
    /// lie in `[min_damage, max_damage]`.
    pub fn new(
        min_damage: i32,
        max_damage: i32,
        buckets: impl IntoIterator<Item = (i32, f64)>,
    ) -> std::result::Result<Self, String> {
        if min_damage > max_damage {
            return Err(format!("minDamage {min_damage} > maxDamage {max_damage}"));
        }

        let mut merged: BTreeMap<i32, f64> = BTreeMap::new();
        for (damage, weight) in buckets {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(format!("weight {weight} for damage {damage} is not a probability"));
            }
            if damage < min_damage || damage > max_damage {
                return Err(format!(
                    "damage {damage} outside [{min_damage}, {max_damage}]"
                ));
            }
            *merged.entry(damage).or_insert(0.0) += weight;
        }
        if merged.is_empty() {
            return Err("no damage buckets".to_string());
        }

        let total: f64 = merged.values().sum();
        if (total - 1.0).abs() > WEIGHT_EPSILON {
            return Err(format!("weights sum to {total}, expected 1.0"));
        }

        let buckets: Vec<DamageBucket> = merged
            .into_iter()
            .map(|(damage, weight)| DamageBucket { damage, weight })
            .collect();
        let expected_damage = buckets.iter().map(|b| b.damage as f64 * b.weight).sum();

        Ok(Self {
            min_damage,
            max_damage,
            buckets,
            expected_damage,
        })
    }

    pub fn total_weight(&self) -> f64 {
        self.buckets.iter().map(|b| b.weight).sum()
    }

    /// Cumulative weight table, one `(upper_bound, damage)` per bucket
    pub fn cumulative(&self) -> Vec<(f64, i32)> {
        let mut acc = 0.0;
        self.buckets
            .iter()
            .map(|b| {
                acc += b.weight;
                (acc, b.damage)
            })
            .collect()
    }

    /// Draw one damage value
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        let table = self.cumulative();
        let total = table.last().map_or(0.0, |&(w, _)| w);
        let roll = rng.gen::<f64>() * total;
        table
            .iter()
            .find(|&&(upper, _)| roll < upper)
            .or(table.last())
            .map_or(self.min_damage, |&(_, damage)| damage)
    }
}

// ============================================================================
// RULES ENGINE
// ============================================================================

/// Immutable, data-driven rules catalog.
///
/// Constructed once and shared by reference; nothing mutates it after load.
#[derive(Clone, Debug, Default)]
pub struct RulesEngine {
    units: BTreeMap<UnitTypeId, UnitDefinition>,
    terrains: BTreeMap<TerrainTypeId, TerrainDefinition>,
    unit_names: FxHashMap<String, UnitTypeId>,
    terrain_names: FxHashMap<String, TerrainTypeId>,
    movement: FxHashMap<(UnitTypeId, TerrainTypeId), MovementCost>,
    attacks: FxHashMap<(UnitTypeId, UnitTypeId), DamageDistribution>,
}

impl RulesEngine {
    /// Load from a JSON data file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading rules file {}", path.display()))?;
        let rules = Self::from_json(&content)
            .with_context(|| format!("parsing rules file {}", path.display()))?;
        Ok(rules)
    }

    /// Parse rules data from a JSON string
    pub fn from_json(content: &str) -> std::result::Result<Self, RulesLoadError> {
        let file: RulesFile = serde_json::from_str(content)?;
        let rules = file.into_rules()?;
        tracing::info!(
            units = rules.units.len(),
            terrains = rules.terrains.len(),
            movement_entries = rules.movement.len(),
            attack_entries = rules.attacks.len(),
            "Rules loaded"
        );
        Ok(rules)
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    pub fn unit_definition(&self, unit: UnitTypeId) -> Result<&UnitDefinition> {
        self.units
            .get(&unit)
            .ok_or(EngineError::RulesNotFound(RulesKey::Unit(unit)))
    }

    pub fn terrain_definition(&self, terrain: TerrainTypeId) -> Result<&TerrainDefinition> {
        self.terrains
            .get(&terrain)
            .ok_or(EngineError::RulesNotFound(RulesKey::Terrain(terrain)))
    }

    /// Cost for `unit` to enter `terrain`.
    ///
    /// A missing pair is `RulesNotFound`, never a default cost.
    pub fn movement_cost(&self, unit: UnitTypeId, terrain: TerrainTypeId) -> Result<MovementCost> {
        self.movement
            .get(&(unit, terrain))
            .copied()
            .ok_or(EngineError::RulesNotFound(RulesKey::Movement { unit, terrain }))
    }

    pub fn attack_distribution(
        &self,
        attacker: UnitTypeId,
        defender: UnitTypeId,
    ) -> Result<&DamageDistribution> {
        self.attacks
            .get(&(attacker, defender))
            .ok_or(EngineError::RulesNotFound(RulesKey::Attack { attacker, defender }))
    }

    /// Whether a damage table exists for the pair
    pub fn can_attack(&self, attacker: UnitTypeId, defender: UnitTypeId) -> bool {
        self.attacks.contains_key(&(attacker, defender))
    }

    pub fn unit_type_by_name(&self, name: &str) -> Option<UnitTypeId> {
        self.unit_names.get(name).copied()
    }

    pub fn terrain_type_by_name(&self, name: &str) -> Option<TerrainTypeId> {
        self.terrain_names.get(name).copied()
    }

    /// Unit definitions in ascending id order
    pub fn units(&self) -> impl Iterator<Item = &UnitDefinition> + '_ {
        self.units.values()
    }

    /// Terrain definitions in ascending id order
    pub fn terrains(&self) -> impl Iterator<Item = &TerrainDefinition> + '_ {
        self.terrains.values()
    }

    /// Every declared attacker/defender distribution
    pub fn distributions(
        &self,
    ) -> impl Iterator<Item = ((UnitTypeId, UnitTypeId), &DamageDistribution)> + '_ {
        self.attacks.iter().map(|(&k, v)| (k, v))
    }
}

// ============================================================================
// DATA FILE FORMAT
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulesFile {
    units: Vec<UnitRecord>,
    #[serde(default)]
    terrains: Vec<TerrainRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitRecord {
    id: UnitTypeId,
    name: String,
    base_stats: BaseStats,
    #[serde(default)]
    movement_costs: BTreeMap<String, RawCost>,
    #[serde(default)]
    attacks: BTreeMap<String, AttackRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BaseStats {
    #[serde(default)]
    cost: i64,
    health: i32,
    movement: Option<f64>,
    #[serde(default)]
    attack: i32,
    #[serde(default)]
    defense: i32,
    #[serde(default)]
    sight_range: u32,
    #[serde(default)]
    can_capture: bool,
    attack_range: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCost {
    Cost(f64),
    Marker(CostMarker),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum CostMarker {
    Impassable,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttackRecord {
    min_damage: i32,
    max_damage: i32,
    probabilities: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TerrainRecord {
    id: TerrainTypeId,
    name: String,
    #[serde(default)]
    movement_costs: BTreeMap<String, RawCost>,
    #[serde(default)]
    defense_bonus: i32,
    #[serde(default)]
    capturable: bool,
    #[serde(default)]
    buildable_units: Vec<String>,
    #[serde(default)]
    income: i64,
    #[serde(default)]
    healing: i32,
}

fn convert_cost(
    raw: &RawCost,
    unit: &str,
    terrain: &str,
) -> std::result::Result<MovementCost, RulesLoadError> {
    match *raw {
        RawCost::Marker(CostMarker::Impassable) => Ok(MovementCost::Impassable),
        RawCost::Cost(cost) if cost.is_finite() && cost >= 0.0 => Ok(MovementCost::Cost(cost)),
        RawCost::Cost(cost) => Err(RulesLoadError::BadMovementCost {
            unit: unit.to_string(),
            terrain: terrain.to_string(),
            cost,
        }),
    }
}

impl RulesFile {
    fn into_rules(self) -> std::result::Result<RulesEngine, RulesLoadError> {
        if self.units.is_empty() {
            return Err(RulesLoadError::Empty("units"));
        }
        if self.terrains.is_empty() {
            return Err(RulesLoadError::Empty("terrains"));
        }

        let mut rules = RulesEngine::default();

        // Names first, so cross references resolve in any order
        for unit in &self.units {
            if rules.unit_names.insert(unit.name.clone(), unit.id).is_some()
                || rules.units.contains_key(&unit.id)
            {
                return Err(RulesLoadError::DuplicateId { kind: "unit", id: unit.id });
            }
            let stats = &unit.base_stats;
            rules.units.insert(
                unit.id,
                UnitDefinition {
                    id: unit.id,
                    name: unit.name.clone(),
                    stats: UnitStats {
                        cost: stats.cost,
                        health: stats.health,
                        movement: stats.movement.unwrap_or(DEFAULT_MOVEMENT),
                        attack: stats.attack,
                        defense: stats.defense,
                        sight_range: stats.sight_range,
                        can_capture: stats.can_capture,
                        attack_range: stats.attack_range.unwrap_or(DEFAULT_ATTACK_RANGE),
                    },
                },
            );
        }
        for terrain in &self.terrains {
            if rules.terrain_names.insert(terrain.name.clone(), terrain.id).is_some()
                || rules.terrains.contains_key(&terrain.id)
            {
                return Err(RulesLoadError::DuplicateId { kind: "terrain", id: terrain.id });
            }
            // Placeholder; buildable units resolved below
            rules.terrains.insert(
                terrain.id,
                TerrainDefinition {
                    id: terrain.id,
                    name: terrain.name.clone(),
                    defense_bonus: terrain.defense_bonus,
                    capturable: terrain.capturable,
                    buildable_units: Vec::new(),
                    income: terrain.income,
                    healing: terrain.healing,
                },
            );
        }

        let unit_id = |names: &FxHashMap<String, UnitTypeId>, name: &str| {
            names
                .get(name)
                .copied()
                .ok_or_else(|| RulesLoadError::UnknownUnit(name.to_string()))
        };
        let terrain_id = |names: &FxHashMap<String, TerrainTypeId>, name: &str| {
            names
                .get(name)
                .copied()
                .ok_or_else(|| RulesLoadError::UnknownTerrain(name.to_string()))
        };

        // Movement costs: unit records are authoritative
        for unit in &self.units {
            for (terrain_name, raw) in &unit.movement_costs {
                let terrain = terrain_id(&rules.terrain_names, terrain_name)?;
                let cost = convert_cost(raw, &unit.name, terrain_name)?;
                rules.movement.insert((unit.id, terrain), cost);
            }
        }
        for terrain in &self.terrains {
            for (unit_name, raw) in &terrain.movement_costs {
                let unit = unit_id(&rules.unit_names, unit_name)?;
                let cost = convert_cost(raw, unit_name, &terrain.name)?;
                match rules.movement.get(&(unit, terrain.id)) {
                    Some(existing) if *existing != cost => {
                        tracing::warn!(
                            unit = %unit_name,
                            terrain = %terrain.name,
                            "Terrain record disagrees with unit record on movement cost; keeping unit record"
                        );
                    }
                    Some(_) => {}
                    None => {
                        rules.movement.insert((unit, terrain.id), cost);
                    }
                }
            }

            let buildable = terrain
                .buildable_units
                .iter()
                .map(|name| unit_id(&rules.unit_names, name))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if let Some(def) = rules.terrains.get_mut(&terrain.id) {
                def.buildable_units = buildable;
            }
        }

        // Damage distributions
        for unit in &self.units {
            for (defender_name, record) in &unit.attacks {
                let defender = unit_id(&rules.unit_names, defender_name)?;
                let bad = |reason: String| RulesLoadError::BadDistribution {
                    attacker: unit.name.clone(),
                    defender: defender_name.clone(),
                    reason,
                };
                let buckets = record
                    .probabilities
                    .iter()
                    .map(|(damage, &weight)| {
                        damage
                            .trim()
                            .parse::<i32>()
                            .map(|d| (d, weight))
                            .map_err(|e| bad(format!("damage key '{damage}': {e}")))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let dist = DamageDistribution::new(record.min_damage, record.max_damage, buckets)
                    .map_err(bad)?;
                rules.attacks.insert((unit.id, defender), dist);
            }
        }

        Ok(rules)
    }
}
