//! In-memory storage backend
//!
//! One mutex guards every table, so each primitive is atomic with respect to
//! the others. Suitable for tests and single-process deployments.

use hexfront_core::{GameState, MoveGroup};
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Result, StoreError};
use crate::storage::{
    check_rows, check_version, CommitLog, GameRecord, GameStorage, GroupCommit, MoveRow,
    StateRecord, Versioned,
};

#[derive(Debug, Default)]
struct Tables {
    games: FxHashMap<String, GameRecord>,
    states: FxHashMap<String, StateRecord>,
    moves: FxHashMap<String, Vec<MoveRow>>,
}

impl Tables {
    fn require_game(&self, id: &str) -> Result<()> {
        if self.games.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::GameNotFound(id.to_string()))
        }
    }

    fn commits(&self, id: &str) -> Option<&CommitLog> {
        self.states.get(id).map(|s| &s.commits)
    }
}

/// Mutex-guarded maps
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw row count for a game, including uncommitted rows
    pub fn row_count(&self, id: &str) -> usize {
        self.lock().moves.get(id).map_or(0, Vec::len)
    }
}

impl GameStorage for MemoryStorage {
    fn load_game(&self, id: &str) -> Result<GameRecord> {
        self.lock()
            .games
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::GameNotFound(id.to_string()))
    }

    fn save_game(&self, game: &GameRecord) -> Result<()> {
        let mut tables = self.lock();
        if tables.games.contains_key(&game.id) {
            return Err(StoreError::GameExists(game.id.clone()));
        }
        tables.games.insert(game.id.clone(), game.clone());
        Ok(())
    }

    fn delete_game(&self, id: &str) -> Result<()> {
        let mut tables = self.lock();
        tables.require_game(id)?;
        tables.games.remove(id);
        tables.states.remove(id);
        tables.moves.remove(id);
        Ok(())
    }

    fn load_game_state(&self, id: &str) -> Result<Versioned<GameState>> {
        self.lock()
            .states
            .get(id)
            .map(|record| Versioned {
                version: record.version,
                value: record.state.clone(),
            })
            .ok_or_else(|| StoreError::GameNotFound(id.to_string()))
    }

    fn save_game_state(
        &self,
        id: &str,
        state: &GameState,
        expected_version: u64,
        commit: Option<&GroupCommit>,
    ) -> Result<u64> {
        let mut tables = self.lock();
        tables.require_game(id)?;

        let found = tables.states.get(id).map_or(0, |s| s.version);
        check_version(id, found, expected_version)?;
        if let Some(commit) = commit {
            let rows = tables.moves.get(id).map(Vec::as_slice).unwrap_or(&[]);
            check_rows(id, commit, rows)?;
        }

        let mut commits = tables
            .states
            .remove(id)
            .map(|s| s.commits)
            .unwrap_or_default();
        if let Some(commit) = commit {
            commits.record(*commit);
        }
        let version = expected_version + 1;
        tables.states.insert(
            id.to_string(),
            StateRecord {
                version,
                state: state.clone(),
                commits,
            },
        );
        Ok(version)
    }

    fn load_game_history(&self, id: &str) -> Result<Vec<MoveGroup>> {
        let tables = self.lock();
        tables.require_game(id)?;
        let rows = tables.moves.get(id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(tables
            .commits(id)
            .map(|log| log.history(rows))
            .unwrap_or_default())
    }

    fn delete_moves_after(&self, id: &str, last_kept_group: u64) -> Result<usize> {
        let mut tables = self.lock();
        tables.require_game(id)?;

        let commits = tables.commits(id).cloned().unwrap_or_default();
        commits.check_delete(id, last_kept_group)?;

        let Some(rows) = tables.moves.get_mut(id) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !commits.is_orphan(row, last_kept_group));
        Ok(before - rows.len())
    }

    fn write_move(&self, row: &MoveRow) -> Result<()> {
        let mut tables = self.lock();
        tables.require_game(&row.game_id)?;
        if let Some(commits) = tables.commits(&row.game_id) {
            commits.check_write(row)?;
        }
        tables
            .moves
            .entry(row.game_id.clone())
            .or_default()
            .push(row.clone());
        Ok(())
    }

    fn get_version(&self, id: &str) -> Result<u64> {
        let tables = self.lock();
        tables.require_game(id)?;
        Ok(tables.states.get(id).map_or(0, |s| s.version))
    }
}
