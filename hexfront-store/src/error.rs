//! Storage error types

use hexfront_core::EngineError;

/// Errors raised by storage backends and the game service
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The conditional state write found a different version
    #[error("Optimistic lock conflict on game {game_id}: expected version {expected}, found {found}")]
    OptimisticLockConflict {
        game_id: String,
        expected: u64,
        found: u64,
    },

    /// A stale writer tried to touch rows of a group that is already committed
    #[error("Move group {group_number} of game {game_id} is already committed")]
    GroupCommitted { game_id: String, group_number: u64 },

    /// The rows for a commit were removed by a concurrent attempt
    #[error("Move rows for group {group_number} of game {game_id} are incomplete: expected {expected}, found {found}")]
    IncompleteGroup {
        game_id: String,
        group_number: u64,
        expected: usize,
        found: usize,
    },

    #[error("Move group {found} does not follow the current group {expected}")]
    InvalidGroup { expected: u64, found: u64 },

    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Game already exists: {0}")]
    GameExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl StoreError {
    /// Concurrent-modification errors. The caller should reload state,
    /// recompute and resubmit.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::OptimisticLockConflict { .. }
                | StoreError::GroupCommitted { .. }
                | StoreError::IncompleteGroup { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
