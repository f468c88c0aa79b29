use std::path::Path;

use learnsync_core::store::ConflictStore;
use learnsync_core::{ConflictResolution, SyncConflict};

use crate::commands::common::{format_conflict_lines, open_manager, open_stores};
use crate::error::CliError;

pub async fn load_conflicts(db_path: &Path) -> Result<Vec<SyncConflict>, CliError> {
    let stores = open_stores(db_path).await?;
    Ok(stores.conflicts.load().await?)
}

/// Drop resolved conflicts from storage. Works without API settings.
pub async fn clear_resolved(db_path: &Path) -> Result<usize, CliError> {
    let stores = open_stores(db_path).await?;
    let conflicts = stores.conflicts.load().await?;
    let remaining: Vec<SyncConflict> = conflicts
        .iter()
        .filter(|conflict| !conflict.resolved)
        .cloned()
        .collect();
    stores.conflicts.replace_all(&remaining).await?;
    Ok(conflicts.len() - remaining.len())
}

pub async fn run_conflicts_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let conflicts = load_conflicts(db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_conflicts_resolve(
    id: &str,
    resolution: ConflictResolution,
    db_path: &Path,
) -> Result<(), CliError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CliError::EmptyConflictId);
    }

    let manager = open_manager(db_path).await?;
    if manager.resolve_conflict(id, resolution).await? {
        println!("Resolved {id} ({resolution})");
    } else {
        println!("Conflict {id} left unresolved: {resolution} is not supported");
    }
    Ok(())
}

pub async fn run_conflicts_clear(db_path: &Path) -> Result<(), CliError> {
    let removed = clear_resolved(db_path).await?;
    println!("Removed {removed} resolved conflicts");
    Ok(())
}
