//! Data models for learnsync

mod conflict;
mod record;
mod status;
mod sync_error;

pub use conflict::{progress_winner, ConflictResolution, ProgressSnapshot, SyncConflict};
pub use record::{
    Achievement, ChatMessage, ChatRole, ProgressEntry, QuestionResponse, QuizAttempt, RecordKind,
    SyncRecord,
};
pub use status::SyncStatus;
pub use sync_error::{ErrorCategory, SyncError, MAX_RETRIES};
