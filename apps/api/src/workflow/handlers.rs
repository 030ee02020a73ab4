//! Axum route handlers for the Preparation API.
//!
//! Every turn follows the same shape: load → engine → save with the loaded
//! version. A failed turn saves nothing.

use axum::{
    extract::{self, Form, FromRequest, Multipart, Path, State},
    http::{header, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::documents::extract_cv_text;
use crate::errors::AppError;
use crate::models::conversation::TranscriptEntry;
use crate::state::AppState;
use crate::workflow::engine::TurnOutcome;
use crate::workflow::state::{CvDetails, PlanStatus, TurnMessage};
use crate::workflow::store::StoredConversation;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub entries: Vec<TranscriptEntry>,
}

/// Returned by `start` and `refine`. `interview_details` carries the plan or,
/// while inputs are still being validated, the clarifying question.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub conversation_id: Uuid,
    pub status: PlanStatus,
    pub interview_details: String,
    pub messages: Vec<String>,
}

impl TurnResponse {
    fn new(conversation_id: Uuid, outcome: &TurnOutcome) -> Self {
        Self {
            conversation_id,
            status: outcome.state.status,
            interview_details: outcome.reply().to_string(),
            messages: outcome.messages.iter().map(|m| m.content.clone()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub conversation_id: Uuid,
    pub status: PlanStatus,
}

#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub conversation_id: Uuid,
    pub title: String,
    pub status: PlanStatus,
    pub position: String,
    pub position_valid: bool,
    pub cv_valid: bool,
    pub cv_details: Option<CvDetails>,
    pub interview_details: String,
    /// The last thing the candidate was shown.
    pub last_reply: Option<String>,
    pub messages: Vec<TurnMessage>,
    pub transcript: Vec<TranscriptEntry>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredConversation> for ConversationView {
    fn from(c: StoredConversation) -> Self {
        let last_reply = c
            .state
            .last_assistant_message()
            .map(|m| m.content.clone());
        Self {
            conversation_id: c.id,
            title: c.title,
            status: c.state.status,
            position: c.state.position,
            position_valid: c.state.position_valid,
            cv_valid: c.state.cv_valid,
            cv_details: c.state.cv_details,
            interview_details: c.state.interview_details,
            last_reply,
            messages: c.state.messages,
            transcript: c.transcript,
            version: c.version,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// What the voice session needs to run the interview.
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub conversation_id: Uuid,
    pub position: String,
    pub interview_details: String,
}

/// Parsed `start` form: either an uploaded PDF or pasted text.
#[derive(Debug, Default)]
struct StartForm {
    file: Option<(String, Vec<u8>)>,
    cv_text: Option<String>,
    position: Option<String>,
    instruction: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/prepare/start
///
/// Multipart form: `file` (PDF) or `cv_text`, plus `position` and `instruction`.
/// Runs the first turn and creates the conversation.
pub async fn handle_start(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TurnResponse>, AppError> {
    let form = read_start_form(multipart).await?;

    let position = form
        .position
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("position cannot be empty".to_string()))?;
    let instruction = form.instruction.unwrap_or_default();

    let cv_text = match (form.file, form.cv_text) {
        (Some((content_type, bytes)), _) => extract_cv_text(&content_type, bytes).await?,
        (None, Some(text)) => text,
        (None, None) => {
            return Err(AppError::Validation(
                "either a PDF `file` or `cv_text` is required".to_string(),
            ))
        }
    };

    let outcome = state
        .engine
        .initiate(&cv_text, &position, &instruction)
        .await?;

    let conversation = state
        .store
        .create(&format!("Interview Prep: {position}"), &outcome.state)
        .await?;

    info!(
        "Started preparation {} (status={})",
        conversation.id,
        outcome.state.status.as_str()
    );
    Ok(Json(TurnResponse::new(conversation.id, &outcome)))
}

/// POST /api/v1/prepare/:id/refine
///
/// One follow-up turn: a corrected title, more résumé detail, or plan feedback.
/// `message` may arrive as JSON, a urlencoded form, or a multipart form.
pub async fn handle_refine(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    body: extract::Request,
) -> Result<Json<TurnResponse>, AppError> {
    let request = read_refine_request(body).await?;
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }

    let conversation = load(&state, conversation_id).await?;
    let outcome = state
        .engine
        .resume(&conversation.state, &request.message)
        .await?;

    state
        .store
        .save(conversation_id, &outcome.state, conversation.version)
        .await?;

    Ok(Json(TurnResponse::new(conversation_id, &outcome)))
}

/// POST /api/v1/prepare/:id/accept
///
/// Sanitizes and freezes the plan. Idempotent.
pub async fn handle_accept(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<AcceptResponse>, AppError> {
    let conversation = load(&state, conversation_id).await?;

    if !conversation.state.is_accepted() {
        let accepted = state.engine.accept(&conversation.state).await?;
        state
            .store
            .save(conversation_id, &accepted, conversation.version)
            .await?;
        info!("Accepted interview plan for {conversation_id}");
    }

    Ok(Json(AcceptResponse {
        conversation_id,
        status: PlanStatus::Accepted,
    }))
}

/// GET /api/v1/prepare/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ConversationView>, AppError> {
    let conversation = load(&state, conversation_id).await?;
    Ok(Json(conversation.into()))
}

/// GET /api/v1/prepare/:id/plan
///
/// Read by the voice session. Only accepted plans are handed out.
pub async fn handle_get_plan(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<PlanResponse>, AppError> {
    let conversation = load(&state, conversation_id).await?;
    if !conversation.state.is_accepted() {
        return Err(AppError::UnprocessableEntity(
            "The interview plan has not been accepted yet".to_string(),
        ));
    }

    Ok(Json(PlanResponse {
        conversation_id,
        position: conversation.state.position,
        interview_details: conversation.state.interview_details,
    }))
}

/// PUT /api/v1/prepare/:id/transcript
///
/// Written back by the voice session once the interview ends.
pub async fn handle_put_transcript(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<TranscriptRequest>,
) -> Result<StatusCode, AppError> {
    let conversation = load(&state, conversation_id).await?;
    if !conversation.state.is_accepted() {
        return Err(AppError::UnprocessableEntity(
            "A transcript can only be attached to an accepted interview plan".to_string(),
        ));
    }

    state
        .store
        .save_transcript(conversation_id, &request.entries)
        .await?;

    info!(
        "Stored {} transcript entries for {conversation_id}",
        request.entries.len()
    );
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn load(state: &AppState, conversation_id: Uuid) -> Result<StoredConversation, AppError> {
    state
        .store
        .load(conversation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))
}

async fn read_refine_request(body: extract::Request) -> Result<RefineRequest, AppError> {
    let content_type = body
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(request) = Form::<RefineRequest>::from_request(body, &())
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        return Ok(request);
    }

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(body, &())
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
        {
            if field.name() == Some("message") {
                let message = field
                    .text()
                    .await
                    .map_err(|e| {
                        AppError::Validation(format!("Could not read field message: {e}"))
                    })?;
                return Ok(RefineRequest { message });
            }
        }
        return Err(AppError::Validation("message is required".to_string()));
    }

    let Json(request) = Json::<RefineRequest>::from_request(body, &())
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?;
    Ok(request)
}

async fn read_start_form(mut multipart: Multipart) -> Result<StartForm, AppError> {
    let mut form = StartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
                form.file = Some((content_type, bytes.to_vec()));
            }
            "cv_text" | "position" | "instruction" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| {
                        AppError::Validation(format!("Could not read field {name}: {e}"))
                    })?;
                match name.as_str() {
                    "cv_text" => form.cv_text = Some(value),
                    "position" => form.position = Some(value),
                    _ => form.instruction = Some(value),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
