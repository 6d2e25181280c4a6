//! Task record storage.
//!
//! This crate provides:
//! - The [`TaskStore`] trait: lookups plus one atomic compare-and-swap write
//! - [`MemoryTaskStore`] for tests and single-process runs
//! - [`FirestoreTaskStore`] backed by the Firestore REST API
//! - [`TaskBoard`], the claim/advance/fail state machine every stage uses

pub mod board;
pub mod error;
pub mod firestore;
pub mod memory;
pub mod store;

pub use board::{ClaimedTask, TaskBoard, DEFAULT_CLAIM_TIMEOUT};
pub use error::{StoreError, StoreResult};
pub use firestore::{FirestoreClient, FirestoreConfig, FirestoreError, FirestoreTaskStore};
pub use memory::MemoryTaskStore;
pub use store::TaskStore;
