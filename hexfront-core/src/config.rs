//! Engine and game configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::rules::UnitTypeId;
use crate::world::PlayerId;

/// How movement treats tiles occupied by friendly units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassThroughPolicy {
    /// Friendly units block movement like enemy units
    #[default]
    Blocked,
    /// Friendly tiles may be crossed but never ended on
    PassThroughFriendly,
}

/// Rules-resolution knobs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Friendly-occupied tile policy for the pathfinder
    pub pass_through: PassThroughPolicy,
    /// Upper bound on pathfinder node expansions per search
    pub max_search_expansions: usize,
    /// Whether a surviving defender strikes back
    pub retaliation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pass_through: PassThroughPolicy::Blocked,
            max_search_expansions: 10_000,
            retaliation: false,
        }
    }
}

impl EngineConfig {
    pub fn with_pass_through(mut self, policy: PassThroughPolicy) -> Self {
        self.pass_through = policy;
        self
    }

    pub fn with_max_search_expansions(mut self, limit: usize) -> Self {
        self.max_search_expansions = limit;
        self
    }

    pub fn with_retaliation(mut self, enabled: bool) -> Self {
        self.retaliation = enabled;
        self
    }
}

/// Per-game setup
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of players, numbered 1..=player_count
    pub player_count: u32,
    pub starting_coins: i64,
    /// Flat income added to terrain income at the end of each turn
    pub base_income: i64,
    /// Unit types that may be built; `None` allows every type
    pub allowed_units: Option<Vec<UnitTypeId>>,
    /// Seed for combat draws
    pub seed: u64,
    pub engine: EngineConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            player_count: 2,
            starting_coins: 300,
            base_income: 0,
            allowed_units: None,
            seed: 0,
            engine: EngineConfig::default(),
        }
    }
}

impl GameConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading game config {}", path.display()))?;
        let config: GameConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing game config {}", path.display()))?;
        anyhow::ensure!(config.player_count >= 2, "player_count must be at least 2");
        Ok(config)
    }

    pub fn with_players(mut self, player_count: u32) -> Self {
        self.player_count = player_count;
        self
    }

    pub fn with_starting_coins(mut self, coins: i64) -> Self {
        self.starting_coins = coins;
        self
    }

    pub fn with_base_income(mut self, income: i64) -> Self {
        self.base_income = income;
        self
    }

    pub fn with_allowed_units(mut self, units: Vec<UnitTypeId>) -> Self {
        self.allowed_units = Some(units);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Player ids in rotation order
    pub fn players(&self) -> impl Iterator<Item = PlayerId> {
        1..=self.player_count
    }

    pub fn is_unit_allowed(&self, unit: UnitTypeId) -> bool {
        self.allowed_units
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.player_count, 2);
        assert_eq!(config.engine.pass_through, PassThroughPolicy::Blocked);
        assert_eq!(config.engine.max_search_expansions, 10_000);
        assert!(!config.engine.retaliation);
        assert!(config.is_unit_allowed(42));
    }

    #[test]
    fn test_partial_json() {
        let config: GameConfig = serde_json::from_str(
            r#"{"player_count": 3, "engine": {"pass_through": "pass_through_friendly"}}"#,
        )
        .unwrap();
        assert_eq!(config.player_count, 3);
        assert_eq!(config.starting_coins, 300);
        assert_eq!(config.engine.pass_through, PassThroughPolicy::PassThroughFriendly);
        assert_eq!(config.engine.max_search_expansions, 10_000);
    }

    #[test]
    fn test_builders() {
        let config = GameConfig::default()
            .with_players(4)
            .with_allowed_units(vec![1, 2])
            .with_engine(EngineConfig::default().with_retaliation(true));
        assert_eq!(config.players().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(config.is_unit_allowed(2));
        assert!(!config.is_unit_allowed(3));
        assert!(config.engine.retaliation);
    }
}
