use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use clap::Parser;
use learnsync_core::events::{EventPayload, ProgressUpdate, SyncEvent};
use learnsync_core::store::ConflictStore;
use learnsync_core::{ConflictResolution, RecordKind, SyncConflict, SyncRecord, SyncStatus};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

use crate::cli::{Cli, Commands, ConflictCommands, ResolutionArg};
use crate::commands::common::{
    format_conflict_lines, format_event_line, format_status_lines, open_stores, resolve_db_path,
    settings_from_lookup,
};
use crate::commands::conflicts::{clear_resolved, load_conflicts};
use crate::commands::enqueue::{enqueue_record, parse_record};
use crate::commands::status::{status_report, KindCount};
use crate::error::CliError;

const QUIZ_JSON: &str = r#"{
    "id": "quiz-1",
    "subject": "chemistry",
    "topic": "bonds",
    "score": 8,
    "max_score": 10,
    "time_spent_secs": 240,
    "difficulty": "medium",
    "completed_at": "2026-07-01T10:00:00Z"
}"#;

const ACHIEVEMENT_JSON: &str = r#"{
    "id": "ach-1",
    "achievement_id": "night-owl",
    "unlocked_at": "2026-07-01T23:00:00Z"
}"#;

fn quiz_conflict(id: &str, resolved: bool) -> SyncConflict {
    let record = parse_record("quiz-attempt", &QUIZ_JSON.replace("quiz-1", id)).unwrap();
    let mut conflict = SyncConflict::new(
        record,
        json!({"score": 2}),
        Utc.with_ymd_and_hms(2026, 7, 1, 11, 0, 0).unwrap(),
    );
    conflict.resolved = resolved;
    conflict
}

#[test]
fn cli_parses_conflict_resolution() {
    let cli = Cli::try_parse_from([
        "learnsync",
        "--db-path",
        "/tmp/learnsync.db",
        "conflicts",
        "resolve",
        "progress-p-1-1",
        "--use",
        "server",
    ])
    .unwrap();

    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/learnsync.db")));
    let Commands::Conflicts {
        command: ConflictCommands::Resolve { id, resolution },
    } = cli.command
    else {
        panic!("unexpected command");
    };
    assert_eq!(id, "progress-p-1-1");
    assert_eq!(resolution, ResolutionArg::Server);
    assert_eq!(
        ConflictResolution::from(resolution),
        ConflictResolution::Server
    );
}

#[test]
fn cli_rejects_unknown_resolution() {
    let parsed = Cli::try_parse_from(["learnsync", "conflicts", "resolve", "x", "--use", "both"]);
    assert!(parsed.is_err());
}

#[test]
fn cli_accepts_db_path_after_subcommand() {
    let cli =
        Cli::try_parse_from(["learnsync", "status", "--json", "--db-path", "local.db"]).unwrap();
    assert!(matches!(cli.command, Commands::Status { json: true }));
    assert_eq!(
        resolve_db_path(cli.db_path).unwrap(),
        PathBuf::from("local.db")
    );
}

#[test]
fn settings_require_api_url() {
    let error = settings_from_lookup(|_| None).unwrap_err();
    assert!(matches!(error, CliError::SyncNotConfigured));

    let values: HashMap<&str, &str> = [
        ("LEARNSYNC_API_BASE_URL", "https://learn.example.com"),
        ("LEARNSYNC_AUTH_TOKEN", "token-123"),
    ]
    .into_iter()
    .collect();
    let settings =
        settings_from_lookup(|name| values.get(name).map(|value| (*value).to_string())).unwrap();
    assert_eq!(settings.api_base_url, "https://learn.example.com");
    assert_eq!(settings.auth_token.as_deref(), Some("token-123"));
}

#[test]
fn parse_record_validates_kind_and_body() {
    assert!(matches!(
        parse_record("homework", QUIZ_JSON),
        Err(CliError::Core(_))
    ));
    assert!(matches!(
        parse_record("quiz", "  \n"),
        Err(CliError::EmptyRecord)
    ));
    assert!(parse_record("achievement", QUIZ_JSON).is_err());

    let record = parse_record("quiz", QUIZ_JSON).unwrap();
    assert_eq!(record.kind(), RecordKind::QuizAttempt);
    assert_eq!(record.id(), "quiz-1");
    assert!(!record.is_synced());
}

#[tokio::test(flavor = "multi_thread")]
async fn enqueue_updates_status_report() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("learnsync.db");

    enqueue_record("quiz-attempt", QUIZ_JSON, &db_path)
        .await
        .unwrap();
    enqueue_record("achievement", ACHIEVEMENT_JSON, &db_path)
        .await
        .unwrap();

    let duplicate = enqueue_record("achievement", ACHIEVEMENT_JSON, &db_path).await;
    assert!(matches!(duplicate, Err(CliError::Core(_))));

    let report = status_report(&db_path).await.unwrap();
    assert_eq!(report.total_pending, 2);
    assert_eq!(
        report.pending,
        vec![
            KindCount {
                kind: "quiz-attempts".to_string(),
                pending: 1
            },
            KindCount {
                kind: "progress".to_string(),
                pending: 0
            },
            KindCount {
                kind: "chat-messages".to_string(),
                pending: 0
            },
            KindCount {
                kind: "achievements".to_string(),
                pending: 1
            },
        ]
    );
    assert_eq!(report.open_conflicts, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_resolved_keeps_open_conflicts() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("learnsync.db");
    {
        let stores = open_stores(&db_path).await.unwrap();
        stores
            .conflicts
            .save(&quiz_conflict("quiz-1", true))
            .await
            .unwrap();
        stores
            .conflicts
            .save(&quiz_conflict("quiz-2", false))
            .await
            .unwrap();
    }

    let report = status_report(&db_path).await.unwrap();
    assert_eq!(report.open_conflicts, 1);
    assert_eq!(report.resolved_conflicts, 1);

    assert_eq!(clear_resolved(&db_path).await.unwrap(), 1);
    let remaining = load_conflicts(&db_path).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].record_id, "quiz-2");
}

#[test]
fn conflict_lines_show_state() {
    let mut resolved = quiz_conflict("quiz-1", true);
    resolved.resolution = Some(ConflictResolution::Local);
    let lines = format_conflict_lines(&[resolved.clone(), quiz_conflict("quiz-2", false)]);

    assert_eq!(
        lines[0],
        format!(
            "{}  quiz-attempt quiz-1  resolved (local)  detected 2026-07-01 11:00:00 UTC",
            resolved.id
        )
    );
    assert!(lines[1].contains("quiz-2  open"));
}

#[test]
fn status_lines_describe_snapshot() {
    let status = SyncStatus {
        is_online: false,
        is_syncing: false,
        last_sync_time: None,
        pending_items: 3,
        failed_items: 1,
        sync_progress: 100,
    };
    assert_eq!(
        format_status_lines(&status),
        vec![
            "Connection: offline".to_string(),
            "Last sync:  never".to_string(),
            "Pending:    3".to_string(),
            "Failed:     1".to_string(),
        ]
    );
}

#[test]
fn event_line_includes_kind_and_detail() {
    let event = SyncEvent::new(
        EventPayload::ProgressUpdate(ProgressUpdate {
            progress: 50,
            current_task: "progress".to_string(),
            completed_tasks: 2,
            total_tasks: 4,
        }),
        Utc.with_ymd_and_hms(2026, 7, 1, 9, 30, 5).unwrap(),
    );
    assert_eq!(
        format_event_line(&event),
        "09:30:05 progress-update   50% progress (2/4)"
    );
}

#[test]
fn parsed_records_keep_their_fields() {
    let record = parse_record("achievements", ACHIEVEMENT_JSON).unwrap();
    let SyncRecord::Achievement(achievement) = record else {
        panic!("unexpected kind");
    };
    assert_eq!(achievement.achievement_id, "night-owl");
}
