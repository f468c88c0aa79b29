use std::path::Path;

use learnsync_core::{SyncConflict, SyncError, SyncStatus};
use serde::Serialize;

use crate::commands::common::{
    format_conflict_lines, format_error_lines, format_status_lines, open_manager,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub errors: Vec<SyncError>,
    pub open_conflicts: Vec<SyncConflict>,
}

pub async fn run_sync(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let manager = open_manager(db_path).await?;
    if !manager.connectivity().check_now().await {
        tracing::warn!("Health check failed; attempting sync anyway");
    }

    manager.force_sync().await;

    let report = SyncReport {
        status: manager.get_sync_status(),
        errors: manager.get_errors(),
        open_conflicts: manager
            .get_conflicts()
            .into_iter()
            .filter(|conflict| !conflict.resolved)
            .collect(),
    };
    // Scheduled retries would outlive the process; leave them to the next run.
    manager.destroy();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Sync completed");
    for line in format_status_lines(&report.status) {
        println!("{line}");
    }
    if !report.errors.is_empty() {
        println!("Errors:");
        for line in format_error_lines(&report.errors) {
            println!("  {line}");
        }
    }
    if !report.open_conflicts.is_empty() {
        println!("Conflicts needing a decision:");
        for line in format_conflict_lines(&report.open_conflicts) {
            println!("  {line}");
        }
    }
    Ok(())
}
