//! State store: persists the workflow blob per conversation.
//!
//! Saves are optimistic: the caller passes the version it loaded and the save
//! fails with `VersionConflict` if anyone else wrote in between. This is the
//! only serialization point for concurrent turns on one conversation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::conversation::{ConversationRow, TranscriptEntry};
use crate::workflow::state::{StateBlobError, WorkflowState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    NotFound(Uuid),

    #[error("conversation {id} was modified concurrently (expected version {expected})")]
    VersionConflict { id: Uuid, expected: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored conversation is corrupt: {0}")]
    Corrupt(String),
}

impl From<StateBlobError> for StoreError {
    fn from(e: StateBlobError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// A conversation as loaded from the store, with its decoded state.
#[derive(Debug, Clone)]
pub struct StoredConversation {
    pub id: Uuid,
    pub title: String,
    pub state: WorkflowState,
    pub version: i64,
    pub transcript: Vec<TranscriptEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ConversationRow> for StoredConversation {
    type Error = StoreError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        Ok(StoredConversation {
            id: row.id,
            title: row.title,
            state: WorkflowState::from_blob(row.state)?,
            version: row.version,
            transcript: serde_json::from_value(row.transcript)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Carried in `AppState` as `Arc<dyn StateStore>`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn create(
        &self,
        title: &str,
        state: &WorkflowState,
    ) -> Result<StoredConversation, StoreError>;

    async fn load(&self, id: Uuid) -> Result<Option<StoredConversation>, StoreError>;

    /// Writes `state` if the stored version still equals `expected_version`.
    /// Returns the new version.
    async fn save(
        &self,
        id: Uuid,
        state: &WorkflowState,
        expected_version: i64,
    ) -> Result<i64, StoreError>;

    async fn save_transcript(
        &self,
        id: Uuid,
        transcript: &[TranscriptEntry],
    ) -> Result<(), StoreError>;
}

/// PostgreSQL-backed store. Schema lives in `migrations/0001_conversations.sql`.
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn create(
        &self,
        title: &str,
        state: &WorkflowState,
    ) -> Result<StoredConversation, StoreError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            INSERT INTO prep_conversations (id, title, state, version, transcript)
            VALUES ($1, $2, $3, 1, '[]'::jsonb)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(state.to_blob()?)
        .fetch_one(&self.pool)
        .await?;

        info!("Created conversation {} ({title})", row.id);
        row.try_into()
    }

    async fn load(&self, id: Uuid) -> Result<Option<StoredConversation>, StoreError> {
        sqlx::query_as::<_, ConversationRow>("SELECT * FROM prep_conversations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(StoredConversation::try_from)
            .transpose()
    }

    async fn save(
        &self,
        id: Uuid,
        state: &WorkflowState,
        expected_version: i64,
    ) -> Result<i64, StoreError> {
        let new_version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE prep_conversations
            SET state = $1, version = version + 1, updated_at = now()
            WHERE id = $2 AND version = $3
            RETURNING version
            "#,
        )
        .bind(state.to_blob()?)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match new_version {
            Some(version) => Ok(version),
            None => {
                let exists: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM prep_conversations WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?;
                match exists {
                    Some(current) => {
                        warn!(
                            "Rejected stale save for conversation {id}: expected v{expected_version}, found v{current}"
                        );
                        Err(StoreError::VersionConflict {
                            id,
                            expected: expected_version,
                        })
                    }
                    None => Err(StoreError::NotFound(id)),
                }
            }
        }
    }

    async fn save_transcript(
        &self,
        id: Uuid,
        transcript: &[TranscriptEntry],
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE prep_conversations SET transcript = $1, updated_at = now() WHERE id = $2",
        )
        .bind(serde_json::to_value(transcript)?)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
