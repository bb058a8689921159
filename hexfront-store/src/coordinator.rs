//! Move-log persistence coordinator
//!
//! Commits a move group and the state it produced under optimistic
//! concurrency control. Two writers racing from the same snapshot both reach
//! the conditional state write; exactly one succeeds and the other gets a
//! conflict it must answer by reloading.

use hexfront_core::{GameState, MoveGroup};
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::storage::GameStorage;

#[derive(Clone)]
pub struct MoveLogCoordinator {
    storage: Arc<dyn GameStorage>,
}

impl MoveLogCoordinator {
    pub fn new(storage: Arc<dyn GameStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn GameStorage> {
        &self.storage
    }

    /// Persist `group` and the resulting `state`, conditioned on the stored
    /// version still being `old_version`. Returns the new version.
    ///
    /// `state` must be the state right after the group was applied, so its
    /// group counter is one past the group's number.
    pub fn save_move_group(
        &self,
        game_id: &str,
        group: &MoveGroup,
        state: &GameState,
        old_version: u64,
    ) -> Result<u64> {
        if state.current_group_number != group.group_number + 1 {
            return Err(StoreError::InvalidGroup {
                expected: state.current_group_number.saturating_sub(1),
                found: group.group_number,
            });
        }

        let outcome = self
            .storage
            .save_moves(game_id, group, group.group_number)
            .and_then(|commit| {
                self.storage
                    .save_game_state(game_id, state, old_version, Some(&commit))
            });

        match outcome {
            Ok(version) => {
                tracing::info!(
                    game_id,
                    group = group.group_number,
                    moves = group.moves.len(),
                    version,
                    "Committed move group"
                );
                Ok(version)
            }
            Err(e) if e.is_conflict() => {
                tracing::warn!(
                    game_id,
                    group = group.group_number,
                    old_version,
                    error = %e,
                    "Move group rejected by concurrent modification"
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for MoveLogCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveLogCoordinator").finish_non_exhaustive()
    }
}
