use std::path::Path;

use learnsync_core::store::{ConflictStore, LocalQueue};
use serde::Serialize;

use crate::commands::common::open_stores;
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct KindCount {
    pub kind: String,
    pub pending: usize,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub pending: Vec<KindCount>,
    pub total_pending: usize,
    pub open_conflicts: usize,
    pub resolved_conflicts: usize,
}

pub async fn status_report(db_path: &Path) -> Result<StatusReport, CliError> {
    let stores = open_stores(db_path).await?;
    let pending: Vec<KindCount> = stores
        .queue
        .pending_by_kind()
        .await?
        .into_iter()
        .map(|(kind, pending)| KindCount {
            kind: kind.task_name().to_string(),
            pending,
        })
        .collect();
    let conflicts = stores.conflicts.load().await?;
    let resolved_conflicts = conflicts.iter().filter(|conflict| conflict.resolved).count();

    Ok(StatusReport {
        total_pending: pending.iter().map(|count| count.pending).sum(),
        pending,
        open_conflicts: conflicts.len() - resolved_conflicts,
        resolved_conflicts,
    })
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let report = status_report(db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for count in &report.pending {
        println!("{:<14} {}", count.kind, count.pending);
    }
    println!("{:<14} {}", "total", report.total_pending);
    println!(
        "Conflicts: {} open, {} resolved",
        report.open_conflicts, report.resolved_conflicts
    );
    Ok(())
}
