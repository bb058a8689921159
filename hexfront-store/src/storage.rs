//! Storage collaborator contract and the records it stores
//!
//! Backends supply the primitives; the checkpoint protocol for a move group
//! is written once here on top of them:
//!
//! 1. delete orphaned rows left by attempts that never committed
//! 2. write each move of the new group as its own row
//! 3. conditionally write the new state (the commit point)
//!
//! Step 3 is performed by the caller through `save_game_state`. Reordering
//! the steps breaks recovery from a crash between them.

use hexfront_core::{GameConfig, GameState, MoveGroup, MoveResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Game metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub name: String,
    pub config: GameConfig,
}

/// A value paired with its storage version
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// The attempt whose rows became authoritative for a group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCommit {
    pub group_number: u64,
    pub attempt: Uuid,
    pub move_count: usize,
}

/// One persisted move
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveRow {
    pub game_id: String,
    pub group_number: u64,
    pub move_index: u32,
    /// Write attempt that produced this row
    pub attempt: Uuid,
    pub result: MoveResult,
}

/// Committed groups and the attempt that won each of them
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitLog(BTreeMap<u64, GroupCommit>);

impl CommitLog {
    pub fn get(&self, group_number: u64) -> Option<&GroupCommit> {
        self.0.get(&group_number)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn record(&mut self, commit: GroupCommit) {
        self.0.insert(commit.group_number, commit);
    }

    fn is_winning(&self, row: &MoveRow) -> bool {
        self.get(row.group_number)
            .map_or(false, |c| c.attempt == row.attempt)
    }

    /// Rows above `last_kept_group`, and rows of committed groups written
    /// by an attempt that lost
    pub fn is_orphan(&self, row: &MoveRow, last_kept_group: u64) -> bool {
        if row.group_number > last_kept_group {
            return true;
        }
        self.get(row.group_number)
            .map_or(false, |c| c.attempt != row.attempt)
    }

    /// Fail if a committed group lies above `last_kept_group`, which means
    /// the caller's snapshot is stale
    pub fn check_delete(&self, game_id: &str, last_kept_group: u64) -> Result<()> {
        match self.0.range(last_kept_group.saturating_add(1)..).next() {
            Some((&group_number, _)) => Err(StoreError::GroupCommitted {
                game_id: game_id.to_string(),
                group_number,
            }),
            None => Ok(()),
        }
    }

    /// Fail if `row` targets a group that is already committed
    pub fn check_write(&self, row: &MoveRow) -> Result<()> {
        if self.0.contains_key(&row.group_number) {
            return Err(StoreError::GroupCommitted {
                game_id: row.game_id.clone(),
                group_number: row.group_number,
            });
        }
        Ok(())
    }

    /// Committed history from rows, keeping only winning attempts
    pub fn history<'a>(&self, rows: impl IntoIterator<Item = &'a MoveRow>) -> Vec<MoveGroup> {
        let mut groups: BTreeMap<u64, BTreeMap<u32, MoveResult>> = BTreeMap::new();
        for row in rows.into_iter().filter(|r| self.is_winning(r)) {
            groups
                .entry(row.group_number)
                .or_default()
                .insert(row.move_index, row.result.clone());
        }
        groups
            .into_iter()
            .map(|(group_number, moves)| MoveGroup {
                group_number,
                moves: moves.into_values().collect(),
            })
            .collect()
    }
}

/// Stored state plus its version and commit log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub version: u64,
    pub state: GameState,
    #[serde(default)]
    pub commits: CommitLog,
}

/// Check a conditional write against the stored version (0 when absent)
pub fn check_version(game_id: &str, found: u64, expected: u64) -> Result<()> {
    if found != expected {
        return Err(StoreError::OptimisticLockConflict {
            game_id: game_id.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Check that every row of a commit is present
pub fn check_rows<'a>(
    game_id: &str,
    commit: &GroupCommit,
    rows: impl IntoIterator<Item = &'a MoveRow>,
) -> Result<()> {
    let found = rows
        .into_iter()
        .filter(|r| r.group_number == commit.group_number && r.attempt == commit.attempt)
        .count();
    if found != commit.move_count {
        return Err(StoreError::IncompleteGroup {
            game_id: game_id.to_string(),
            group_number: commit.group_number,
            expected: commit.move_count,
            found,
        });
    }
    Ok(())
}

/// Storage collaborator consumed by the persistence coordinator.
///
/// Implementations must make each primitive atomic with respect to the
/// others for the same game.
pub trait GameStorage: Send + Sync {
    fn load_game(&self, id: &str) -> Result<GameRecord>;

    /// Create a game record; fails if the id exists
    fn save_game(&self, game: &GameRecord) -> Result<()>;

    /// Remove a game with its state and move rows
    fn delete_game(&self, id: &str) -> Result<()>;

    fn load_game_state(&self, id: &str) -> Result<Versioned<GameState>>;

    /// Conditional state write.
    ///
    /// Succeeds only if the stored version equals `expected_version` (0 for
    /// a game with no state yet) and, when `commit` is given, every row of
    /// that attempt is present. Returns the new version.
    fn save_game_state(
        &self,
        id: &str,
        state: &GameState,
        expected_version: u64,
        commit: Option<&GroupCommit>,
    ) -> Result<u64>;

    /// Committed move groups in ascending order
    fn load_game_history(&self, id: &str) -> Result<Vec<MoveGroup>>;

    /// Delete orphaned rows: everything above `last_kept_group` and losing
    /// attempts of committed groups. Returns the number of rows removed.
    fn delete_moves_after(&self, id: &str, last_kept_group: u64) -> Result<usize>;

    fn write_move(&self, row: &MoveRow) -> Result<()>;

    fn get_version(&self, id: &str) -> Result<u64>;

    /// Steps 1 and 2 of the checkpoint protocol.
    ///
    /// Rows written here are not history until the returned commit is
    /// recorded by a successful `save_game_state`.
    fn save_moves(&self, id: &str, group: &MoveGroup, current_group_number: u64) -> Result<GroupCommit> {
        if group.group_number != current_group_number {
            return Err(StoreError::InvalidGroup {
                expected: current_group_number,
                found: group.group_number,
            });
        }

        let removed = self.delete_moves_after(id, current_group_number.saturating_sub(1))?;
        if removed > 0 {
            tracing::debug!(game_id = id, removed, "Removed orphaned move rows");
        }

        let attempt = Uuid::new_v4();
        for (index, result) in group.moves.iter().enumerate() {
            self.write_move(&MoveRow {
                game_id: id.to_string(),
                group_number: group.group_number,
                move_index: u32::try_from(index).unwrap_or(u32::MAX),
                attempt,
                result: result.clone(),
            })?;
        }

        Ok(GroupCommit {
            group_number: group.group_number,
            attempt,
            move_count: group.moves.len(),
        })
    }
}
