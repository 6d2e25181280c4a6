//! Firestore REST backend.
//!
//! - Service account auth via `gcp_auth`, or a fixed token against the
//!   emulator when `FIRESTORE_EMULATOR_HOST` is set
//! - Token caching with refresh margin
//! - Exponential backoff with jitter
//! - Request metrics and tracing spans

mod client;
mod error;
mod metrics;
mod retry;
mod task_repo;
mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use task_repo::{FirestoreTaskStore, TASKS_COLLECTION};
pub use token_cache::TokenSource;
