//! learnsync-core - Core library for learnsync
//!
//! Reconciles records queued while the learner was offline (quiz attempts,
//! progress entries, chat messages, achievements) against the remote API once
//! connectivity returns. Conflicts are persisted and auto-resolved where that
//! is safe, failures are retried with backoff, and observers follow along
//! through a typed event bus.

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod models;
pub mod remote;
pub mod store;
pub mod util;

pub use engine::{SyncDependencies, SyncManager};
pub use error::{Error, Result};
pub use models::{
    Achievement, ChatMessage, ConflictResolution, ErrorCategory, ProgressEntry, QuizAttempt,
    RecordKind, SyncConflict, SyncError, SyncRecord, SyncStatus,
};
