use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationRow {
    pub id: Uuid,
    pub title: String,
    /// Serialized `WorkflowState`.
    pub state: Value,
    /// Optimistic concurrency token; bumped on every save.
    pub version: i64,
    /// Serialized `Vec<TranscriptEntry>` written back by the voice session.
    pub transcript: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One utterance of the voice interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
