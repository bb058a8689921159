//! Game service
//!
//! Ties the engine to storage: load the latest state, apply a batch, commit
//! the resulting move group. Mutating calls for one game run one at a time
//! inside this process; the version check in the coordinator covers writers
//! elsewhere.

use anyhow::Context;
use hexfront_core::{
    AxialCoord, Game, GameConfig, GameMove, GameState, MoveGroup, MoveResult, OptionsAt,
    RulesEngine, World,
};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::coordinator::MoveLogCoordinator;
use crate::error::Result;
use crate::fs::FsStorage;
use crate::storage::{GameRecord, GameStorage};

/// A loaded game and the version it was read at
#[derive(Clone, Debug)]
pub struct LoadedGame {
    pub game: Game,
    pub version: u64,
}

pub struct GameService {
    rules: Arc<RulesEngine>,
    coordinator: MoveLogCoordinator,
    locks: Mutex<FxHashMap<String, Arc<Mutex<()>>>>,
}

impl GameService {
    pub fn new(storage: Arc<dyn GameStorage>, rules: Arc<RulesEngine>) -> Self {
        Self {
            rules,
            coordinator: MoveLogCoordinator::new(storage),
            locks: Mutex::new(FxHashMap::default()),
        }
    }

    /// File-backed service: rules from `rules_path`, games under `root`
    pub fn open(root: &Path, rules_path: &Path) -> anyhow::Result<Self> {
        let rules = RulesEngine::load(rules_path)?;
        let storage = FsStorage::open(root)
            .with_context(|| format!("opening game storage {}", root.display()))?;
        Ok(Self::new(Arc::new(storage), Arc::new(rules)))
    }

    pub fn rules(&self) -> &Arc<RulesEngine> {
        &self.rules
    }

    fn storage(&self) -> &dyn GameStorage {
        self.coordinator.storage().as_ref()
    }

    fn game_lock(&self, game_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(game_id.to_string()).or_default().clone()
    }

    /// Hand back a lock from `game_lock`; the entry goes once nobody holds it
    fn release_lock(&self, game_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(game_id).is_some_and(|held| Arc::strong_count(held) == 1) {
            locks.remove(game_id);
        }
    }

    /// Create a game and write its initial state at version 1.
    ///
    /// If the state cannot be written the record is removed again, so a
    /// failed create leaves nothing behind.
    pub fn create_game(&self, name: &str, config: GameConfig, world: World) -> Result<String> {
        let state = GameState::new(config.clone(), world)?;
        let id = Uuid::new_v4().to_string();
        self.storage().save_game(&GameRecord {
            id: id.clone(),
            name: name.to_string(),
            config,
        })?;
        let version = match self.storage().save_game_state(&id, &state, 0, None) {
            Ok(version) => version,
            Err(e) => {
                if let Err(cleanup) = self.storage().delete_game(&id) {
                    tracing::warn!(game_id = %id, error = %cleanup, "Failed to remove partly created game");
                }
                return Err(e);
            }
        };
        tracing::info!(game_id = %id, name, version, "Created game");
        Ok(id)
    }

    pub fn game_record(&self, game_id: &str) -> Result<GameRecord> {
        self.storage().load_game(game_id)
    }

    /// Latest committed state
    pub fn load(&self, game_id: &str) -> Result<LoadedGame> {
        let stored = self.storage().load_game_state(game_id)?;
        Ok(LoadedGame {
            game: Game::from_state(stored.value, self.rules.clone()),
            version: stored.version,
        })
    }

    /// Legal actions at `coord` against the latest committed state
    pub fn get_options_at(&self, game_id: &str, coord: AxialCoord) -> Result<OptionsAt> {
        let loaded = self.load(game_id)?;
        Ok(loaded.game.options_with_reach(coord)?)
    }

    /// Apply a batch and commit it as one move group.
    ///
    /// Engine errors leave storage untouched. A conflict means another
    /// writer committed first; reload and resubmit.
    pub fn process_moves(&self, game_id: &str, moves: &[GameMove]) -> Result<Vec<MoveResult>> {
        self.storage().load_game(game_id)?;

        let lock = self.game_lock(game_id);
        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.commit_batch(game_id, moves)
        };
        self.release_lock(game_id, lock);
        outcome
    }

    fn commit_batch(&self, game_id: &str, moves: &[GameMove]) -> Result<Vec<MoveResult>> {
        let LoadedGame { mut game, version } = self.load(game_id)?;
        let group_number = game.state().current_group_number;
        let results = game.process_moves(moves)?;

        let group = MoveGroup {
            group_number,
            moves: results.clone(),
        };
        self.coordinator
            .save_move_group(game_id, &group, game.state(), version)?;
        Ok(results)
    }

    /// Committed move groups in order
    pub fn load_history(&self, game_id: &str) -> Result<Vec<MoveGroup>> {
        self.storage().load_game_history(game_id)
    }
}

impl std::fmt::Debug for GameService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameService")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
