//! Offline record models
//!
//! The local queue owns these records; the sync engine only reads them and
//! asks the queue to flip their sync flag once the server accepts them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// The four kinds of records queued while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    QuizAttempt,
    Progress,
    ChatMessage,
    Achievement,
}

impl RecordKind {
    /// Every kind, in the order a sync pass processes them.
    pub const ALL: [Self; 4] = [
        Self::QuizAttempt,
        Self::Progress,
        Self::ChatMessage,
        Self::Achievement,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuizAttempt => "quiz-attempt",
            Self::Progress => "progress",
            Self::ChatMessage => "chat-message",
            Self::Achievement => "achievement",
        }
    }

    /// Task label used in progress events and error entries.
    pub const fn task_name(self) -> &'static str {
        match self {
            Self::QuizAttempt => "quiz-attempts",
            Self::Progress => "progress",
            Self::ChatMessage => "chat-messages",
            Self::Achievement => "achievements",
        }
    }

    /// Path segment of the remote upsert endpoint.
    pub const fn endpoint(self) -> &'static str {
        self.task_name()
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiz-attempt" | "quiz-attempts" | "quiz" => Ok(Self::QuizAttempt),
            "progress" => Ok(Self::Progress),
            "chat-message" | "chat-messages" | "chat" => Ok(Self::ChatMessage),
            "achievement" | "achievements" => Ok(Self::Achievement),
            other => Err(Error::InvalidInput(format!("unknown record kind: {other}"))),
        }
    }
}

/// One answered question inside a quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
}

/// A completed quiz attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: String,
    pub subject: String,
    pub topic: String,
    pub score: u32,
    pub max_score: u32,
    /// Elapsed time in seconds
    pub time_spent_secs: u64,
    pub difficulty: String,
    #[serde(default)]
    pub questions: Vec<QuestionResponse>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub synced: bool,
}

/// Learning progress for a subject/topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: String,
    pub subject: String,
    pub topic: String,
    pub cognitive_level: String,
    /// Completion in percent (0-100)
    pub completion_percentage: f64,
    /// Time spent in seconds
    pub time_spent_secs: u64,
    pub mastery_level: f64,
    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub synced: bool,
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// A tutor chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    /// Source citations attached to the answer
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub voice_input: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub synced: bool,
}

/// An unlocked achievement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub achievement_id: String,
    pub unlocked_at: DateTime<Utc>,
    #[serde(default)]
    pub synced: bool,
}

/// A queued record tagged with its kind.
///
/// Retries and conflict handling dispatch on this tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "kebab-case")]
pub enum SyncRecord {
    QuizAttempt(QuizAttempt),
    Progress(ProgressEntry),
    ChatMessage(ChatMessage),
    Achievement(Achievement),
}

impl SyncRecord {
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::QuizAttempt(_) => RecordKind::QuizAttempt,
            Self::Progress(_) => RecordKind::Progress,
            Self::ChatMessage(_) => RecordKind::ChatMessage,
            Self::Achievement(_) => RecordKind::Achievement,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::QuizAttempt(record) => &record.id,
            Self::Progress(record) => &record.id,
            Self::ChatMessage(record) => &record.id,
            Self::Achievement(record) => &record.id,
        }
    }

    pub const fn is_synced(&self) -> bool {
        match self {
            Self::QuizAttempt(record) => record.synced,
            Self::Progress(record) => record.synced,
            Self::ChatMessage(record) => record.synced,
            Self::Achievement(record) => record.synced,
        }
    }

    /// Set the sync flag. Only local queue implementations call this.
    pub fn set_synced(&mut self, synced: bool) {
        match self {
            Self::QuizAttempt(record) => record.synced = synced,
            Self::Progress(record) => record.synced = synced,
            Self::ChatMessage(record) => record.synced = synced,
            Self::Achievement(record) => record.synced = synced,
        }
    }

    /// The bare record as JSON, without the kind tag.
    pub fn payload(&self) -> Result<Value> {
        let value = match self {
            Self::QuizAttempt(record) => serde_json::to_value(record)?,
            Self::Progress(record) => serde_json::to_value(record)?,
            Self::ChatMessage(record) => serde_json::to_value(record)?,
            Self::Achievement(record) => serde_json::to_value(record)?,
        };
        Ok(value)
    }

    /// Parse a bare record payload of the given kind.
    pub fn from_payload(kind: RecordKind, payload: Value) -> Result<Self> {
        let record = match kind {
            RecordKind::QuizAttempt => Self::QuizAttempt(serde_json::from_value(payload)?),
            RecordKind::Progress => Self::Progress(serde_json::from_value(payload)?),
            RecordKind::ChatMessage => Self::ChatMessage(serde_json::from_value(payload)?),
            RecordKind::Achievement => Self::Achievement(serde_json::from_value(payload)?),
        };
        Ok(record)
    }

    /// Build the local copy that results from accepting the server's version.
    ///
    /// Fields present in `server` replace the local ones; the local id and
    /// sync flag are kept.
    pub fn with_server_version(&self, server: &Value) -> Result<Self> {
        let Value::Object(server_fields) = server else {
            return Err(Error::InvalidServerData(format!(
                "expected a JSON object for {} {}",
                self.kind(),
                self.id()
            )));
        };

        let mut merged = self.payload()?;
        if let Value::Object(local_fields) = &mut merged {
            for (key, value) in server_fields {
                if key != "id" && key != "synced" {
                    local_fields.insert(key.clone(), value.clone());
                }
            }
        }

        Self::from_payload(self.kind(), merged).map_err(|error| {
            Error::InvalidServerData(format!(
                "server version of {} {} does not fit the local record: {error}",
                self.kind(),
                self.id()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn progress() -> SyncRecord {
        SyncRecord::Progress(ProgressEntry {
            id: "p-1".to_string(),
            subject: "math".to_string(),
            topic: "fractions".to_string(),
            cognitive_level: "apply".to_string(),
            completion_percentage: 40.0,
            time_spent_secs: 600,
            mastery_level: 0.4,
            last_accessed: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            synced: false,
        })
    }

    #[test]
    fn record_kind_parses_aliases() {
        assert_eq!("quiz".parse::<RecordKind>().unwrap(), RecordKind::QuizAttempt);
        assert_eq!(
            "chat-messages".parse::<RecordKind>().unwrap(),
            RecordKind::ChatMessage
        );
        assert!("homework".parse::<RecordKind>().is_err());
    }

    #[test]
    fn record_kind_order_is_fixed() {
        let names: Vec<_> = RecordKind::ALL.iter().map(|kind| kind.task_name()).collect();
        assert_eq!(
            names,
            vec!["quiz-attempts", "progress", "chat-messages", "achievements"]
        );
    }

    #[test]
    fn tagged_record_serializes_kind() {
        let value = serde_json::to_value(progress()).unwrap();
        assert_eq!(value["kind"], "progress");
        assert_eq!(value["record"]["id"], "p-1");
    }

    #[test]
    fn server_version_overrides_fields_but_keeps_identity() {
        let server = json!({
            "id": "server-side-id",
            "completion_percentage": 80.0,
            "last_accessed": "2026-03-02T10:00:00Z",
            "synced": true
        });

        let updated = progress().with_server_version(&server).unwrap();
        let SyncRecord::Progress(entry) = updated else {
            panic!("kind changed");
        };
        assert_eq!(entry.id, "p-1");
        assert!(!entry.synced);
        assert!((entry.completion_percentage - 80.0).abs() < f64::EPSILON);
        assert_eq!(entry.topic, "fractions");
    }

    #[test]
    fn server_version_rejects_non_objects() {
        let error = progress().with_server_version(&json!("nope")).unwrap_err();
        assert!(matches!(error, Error::InvalidServerData(_)));
    }
}
