//! Workflow state: the blob persisted between turns.
//!
//! Nothing survives in memory between turns: every field the router or a node
//! reads must live here. Fields added after version 1 must carry
//! `#[serde(default)]` so stored history keeps deserializing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bump when the stored shape changes; `from_blob` upgrades older blobs.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Initialized,
    Generated,
    Refining,
    Accepted,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Initialized => "initialized",
            PlanStatus::Generated => "generated",
            PlanStatus::Refining => "refining",
            PlanStatus::Accepted => "accepted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: MessageRole,
    pub content: String,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Structured candidate profile extracted by the CV validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvDetails {
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub experience_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default)]
    pub schema_version: u32,
    pub cv_text: String,
    pub position: String,
    pub instruction: String,
    #[serde(default)]
    pub position_valid: bool,
    #[serde(default)]
    pub cv_valid: bool,
    /// Present only while `cv_valid` is true.
    #[serde(default)]
    pub cv_details: Option<CvDetails>,
    #[serde(default)]
    pub interview_details: String,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub messages: Vec<TurnMessage>,
}

#[derive(Debug, Error)]
pub enum StateBlobError {
    #[error("state blob is not a valid workflow state: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("state blob schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

impl WorkflowState {
    pub fn new(
        cv_text: impl Into<String>,
        position: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            cv_text: cv_text.into(),
            position: position.into(),
            instruction: instruction.into(),
            position_valid: false,
            cv_valid: false,
            cv_details: None,
            interview_details: String::new(),
            status: PlanStatus::Initialized,
            messages: Vec::new(),
        }
    }

    /// Decodes a persisted blob, upgrading unversioned (pre-1) blobs in place.
    pub fn from_blob(blob: serde_json::Value) -> Result<Self, StateBlobError> {
        let mut state: WorkflowState = serde_json::from_value(blob)?;
        if state.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(StateBlobError::UnsupportedVersion {
                found: state.schema_version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        if state.schema_version == 0 && state.cv_details.is_some() && !state.cv_valid {
            // Pre-versioned blobs could keep stale profiles around after a failed re-check.
            state.cv_details = None;
        }
        state.schema_version = CURRENT_SCHEMA_VERSION;
        Ok(state)
    }

    pub fn to_blob(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn has_plan(&self) -> bool {
        !self.interview_details.is_empty()
    }

    pub fn is_accepted(&self) -> bool {
        self.status == PlanStatus::Accepted
    }

    /// The most recent assistant message, i.e. what the candidate was last shown.
    pub fn last_assistant_message(&self) -> Option<&TurnMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
    }

    pub(crate) fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(TurnMessage::assistant(content));
    }
}
