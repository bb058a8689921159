//! HEXFRONT Store - durable move log and game service
//!
//! This crate provides persistence for HEXFRONT games:
//! - The storage collaborator contract and its records
//! - The move-log persistence coordinator (checkpoint protocol with
//!   optimistic concurrency control)
//! - In-memory and file-system backends
//! - A game service that loads, applies and commits move batches

pub mod error;
pub mod storage;
pub mod memory;
pub mod fs;
pub mod coordinator;
pub mod service;

// Re-exports for convenient access
pub use error::{Result, StoreError};
pub use storage::{CommitLog, GameRecord, GameStorage, GroupCommit, MoveRow, StateRecord, Versioned};
pub use memory::MemoryStorage;
pub use fs::FsStorage;
pub use coordinator::MoveLogCoordinator;
pub use service::{GameService, LoadedGame};
