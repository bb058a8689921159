//! File-system storage backend
//!
//! Layout, one directory per game:
//!
//! ```text
//! <root>/<game id>/game.json
//! <root>/<game id>/state.json
//! <root>/<game id>/moves/<group>-<index>-<attempt>.json
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! crash never leaves a half-written record. An internal mutex serializes
//! the primitives within one process; the directory must not be shared by
//! several processes.

use hexfront_core::{GameState, MoveGroup};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Result, StoreError};
use crate::storage::{
    check_rows, check_version, CommitLog, GameRecord, GameStorage, GroupCommit, MoveRow,
    StateRecord, Versioned,
};

const GAME_FILE: &str = "game.json";
const STATE_FILE: &str = "state.json";
const MOVES_DIR: &str = "moves";

/// JSON files under a root directory
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FsStorage {
    /// Open (and create if needed) a storage root
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "Opened file storage");
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Game ids become directory names, so only a safe alphabet is allowed
    fn game_dir(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::GameNotFound(id.to_string()));
        }
        Ok(self.root.join(id))
    }

    fn existing_game_dir(&self, id: &str) -> Result<PathBuf> {
        let dir = self.game_dir(id)?;
        if !dir.join(GAME_FILE).is_file() {
            return Err(StoreError::GameNotFound(id.to_string()));
        }
        Ok(dir)
    }

    fn read_state(&self, dir: &Path) -> Result<Option<StateRecord>> {
        read_json_opt(&dir.join(STATE_FILE))
    }

    /// All move rows of a game with their file paths
    fn read_rows(&self, dir: &Path) -> Result<Vec<(PathBuf, MoveRow)>> {
        let moves_dir = dir.join(MOVES_DIR);
        let entries = match fs::read_dir(&moves_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let row: MoveRow = read_json(&path)?;
            rows.push((path, row));
        }
        Ok(rows)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write via a temporary sibling and rename into place
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl GameStorage for FsStorage {
    fn load_game(&self, id: &str) -> Result<GameRecord> {
        let _guard = self.guard();
        let dir = self.existing_game_dir(id)?;
        read_json(&dir.join(GAME_FILE))
    }

    fn save_game(&self, game: &GameRecord) -> Result<()> {
        let _guard = self.guard();
        let dir = self.game_dir(&game.id)?;
        if dir.join(GAME_FILE).exists() {
            return Err(StoreError::GameExists(game.id.clone()));
        }
        fs::create_dir_all(dir.join(MOVES_DIR))?;
        write_json(&dir.join(GAME_FILE), game)?;
        tracing::debug!(game_id = %game.id, "Saved game record");
        Ok(())
    }

    fn delete_game(&self, id: &str) -> Result<()> {
        let _guard = self.guard();
        let dir = self.existing_game_dir(id)?;
        fs::remove_dir_all(&dir)?;
        tracing::debug!(game_id = id, "Deleted game");
        Ok(())
    }

    fn load_game_state(&self, id: &str) -> Result<Versioned<GameState>> {
        let _guard = self.guard();
        let dir = self.existing_game_dir(id)?;
        let record = self
            .read_state(&dir)?
            .ok_or_else(|| StoreError::GameNotFound(id.to_string()))?;
        Ok(Versioned {
            version: record.version,
            value: record.state,
        })
    }

    fn save_game_state(
        &self,
        id: &str,
        state: &GameState,
        expected_version: u64,
        commit: Option<&GroupCommit>,
    ) -> Result<u64> {
        let _guard = self.guard();
        let dir = self.existing_game_dir(id)?;
        let current = self.read_state(&dir)?;

        check_version(id, current.as_ref().map_or(0, |s| s.version), expected_version)?;
        if let Some(commit) = commit {
            let rows = self.read_rows(&dir)?;
            check_rows(id, commit, rows.iter().map(|(_, row)| row))?;
        }

        let mut commits = current.map(|s| s.commits).unwrap_or_default();
        if let Some(commit) = commit {
            commits.record(*commit);
        }
        let version = expected_version + 1;
        write_json(
            &dir.join(STATE_FILE),
            &StateRecord {
                version,
                state: state.clone(),
                commits,
            },
        )?;
        Ok(version)
    }

    fn load_game_history(&self, id: &str) -> Result<Vec<MoveGroup>> {
        let _guard = self.guard();
        let dir = self.existing_game_dir(id)?;
        let Some(record) = self.read_state(&dir)? else {
            return Ok(Vec::new());
        };
        let rows = self.read_rows(&dir)?;
        Ok(record.commits.history(rows.iter().map(|(_, row)| row)))
    }

    fn delete_moves_after(&self, id: &str, last_kept_group: u64) -> Result<usize> {
        let _guard = self.guard();
        let dir = self.existing_game_dir(id)?;
        let commits: CommitLog = self
            .read_state(&dir)?
            .map(|s| s.commits)
            .unwrap_or_default();
        commits.check_delete(id, last_kept_group)?;

        let mut removed = 0;
        for (path, row) in self.read_rows(&dir)? {
            if commits.is_orphan(&row, last_kept_group) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn write_move(&self, row: &MoveRow) -> Result<()> {
        let _guard = self.guard();
        let dir = self.existing_game_dir(&row.game_id)?;
        if let Some(record) = self.read_state(&dir)? {
            record.commits.check_write(row)?;
        }
        let moves_dir = dir.join(MOVES_DIR);
        fs::create_dir_all(&moves_dir)?;
        let name = format!("{}-{}-{}.json", row.group_number, row.move_index, row.attempt);
        write_json(&moves_dir.join(name), row)
    }

    fn get_version(&self, id: &str) -> Result<u64> {
        let _guard = self.guard();
        let dir = self.existing_game_dir(id)?;
        Ok(self.read_state(&dir)?.map_or(0, |s| s.version))
    }
}
