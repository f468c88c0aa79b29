use std::io::{self, IsTerminal, Read};
use std::path::Path;

use learnsync_core::store::LocalQueue;
use learnsync_core::{RecordKind, SyncRecord};

use crate::commands::common::open_stores;
use crate::error::CliError;

/// Parse a record of `kind` from JSON text.
pub fn parse_record(kind: &str, json: &str) -> Result<SyncRecord, CliError> {
    let kind: RecordKind = kind.parse()?;
    let json = json.trim();
    if json.is_empty() {
        return Err(CliError::EmptyRecord);
    }
    let value = serde_json::from_str(json)?;
    Ok(SyncRecord::from_payload(kind, value)?)
}

pub async fn enqueue_record(
    kind: &str,
    json: &str,
    db_path: &Path,
) -> Result<SyncRecord, CliError> {
    let record = parse_record(kind, json)?;
    let stores = open_stores(db_path).await?;
    stores.queue.enqueue(record.clone()).await?;
    Ok(record)
}

fn read_input(file: Option<&Path>) -> Result<String, CliError> {
    if let Some(path) = file {
        return Ok(std::fs::read_to_string(path)?);
    }
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(CliError::EmptyRecord);
    }
    let mut input = String::new();
    stdin.lock().read_to_string(&mut input)?;
    Ok(input)
}

pub async fn run_enqueue(kind: &str, file: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let input = read_input(file)?;
    let record = enqueue_record(kind, &input, db_path).await?;
    println!("Queued {} {}", record.kind(), record.id());
    Ok(())
}
