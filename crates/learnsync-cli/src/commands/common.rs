use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use learnsync_core::config::SyncSettings;
use learnsync_core::db::{shared, Database, LibSqlConflictStore, LibSqlLocalQueue};
use learnsync_core::engine::SyncDependencies;
use learnsync_core::events::{EventPayload, SyncEvent};
use learnsync_core::{SyncConflict, SyncError, SyncManager, SyncStatus};

use crate::error::CliError;

pub fn default_db_path() -> Result<PathBuf, CliError> {
    Ok(dirs::data_dir()
        .ok_or(CliError::NoDataDir)?
        .join("learnsync")
        .join("learnsync.db"))
}

pub fn resolve_db_path(db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match db_path {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

/// Queue and conflict store sharing one database.
pub struct Stores {
    pub queue: Arc<LibSqlLocalQueue>,
    pub conflicts: Arc<LibSqlConflictStore>,
}

pub async fn open_stores(db_path: &Path) -> Result<Stores, CliError> {
    tracing::debug!("Opening database at {}", db_path.display());
    let db = shared(Database::open(db_path).await?);
    Ok(Stores {
        queue: Arc::new(LibSqlLocalQueue::new(Arc::clone(&db))),
        conflicts: Arc::new(LibSqlConflictStore::new(db)),
    })
}

/// Read engine settings, reporting a missing API URL as unconfigured sync.
pub fn settings_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SyncSettings, CliError> {
    let configured = lookup("LEARNSYNC_API_BASE_URL").is_some_and(|value| !value.trim().is_empty());
    if !configured {
        return Err(CliError::SyncNotConfigured);
    }
    Ok(SyncSettings::from_lookup(lookup)?)
}

pub fn load_settings() -> Result<SyncSettings, CliError> {
    settings_from_lookup(|name| std::env::var(name).ok())
}

pub async fn open_manager(db_path: &Path) -> Result<SyncManager, CliError> {
    let settings = load_settings()?;
    let stores = open_stores(db_path).await?;
    let deps = SyncDependencies::http(&settings, stores.queue, stores.conflicts)?;
    Ok(SyncManager::new(settings, deps).await?)
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_status_lines(status: &SyncStatus) -> Vec<String> {
    vec![
        format!(
            "Connection: {}",
            if status.is_online { "online" } else { "offline" }
        ),
        format!(
            "Last sync:  {}",
            status
                .last_sync_time
                .map_or_else(|| "never".to_string(), format_timestamp)
        ),
        format!("Pending:    {}", status.pending_items),
        format!("Failed:     {}", status.failed_items),
    ]
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            let state = match (conflict.resolved, conflict.resolution) {
                (true, Some(resolution)) => format!("resolved ({resolution})"),
                (true, None) => "resolved".to_string(),
                (false, _) => "open".to_string(),
            };
            format!(
                "{}  {} {}  {state}  detected {}",
                conflict.id,
                conflict.kind,
                conflict.record_id,
                format_timestamp(conflict.detected_at)
            )
        })
        .collect()
}

pub fn format_error_lines(errors: &[SyncError]) -> Vec<String> {
    errors
        .iter()
        .map(|error| {
            format!(
                "[{}] {}: {} (retries {}/{})",
                error.category, error.task, error.message, error.retry_count, error.max_retries
            )
        })
        .collect()
}

pub fn format_event_line(event: &SyncEvent) -> String {
    let detail = match &event.data {
        EventPayload::StatusChange(change) => {
            if change.is_online {
                "online".to_string()
            } else {
                "offline".to_string()
            }
        }
        EventPayload::ProgressUpdate(update) => format!(
            "{}% {} ({}/{})",
            update.progress, update.current_task, update.completed_tasks, update.total_tasks
        ),
        EventPayload::ConflictDetected(conflict) => format!(
            "{} {} ({})",
            conflict.kind, conflict.record_id, conflict.id
        ),
        EventPayload::SyncComplete(summary) => format!(
            "{} conflicts, {} errors",
            summary.conflict_count, summary.error_count
        ),
        EventPayload::SyncError(error) => {
            format!("[{}] {}: {}", error.category, error.task, error.message)
        }
    };
    format!(
        "{} {:<17} {detail}",
        event.timestamp.format("%H:%M:%S"),
        event.kind.as_str()
    )
}
