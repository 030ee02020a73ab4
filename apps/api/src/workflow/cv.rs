//! CV validator: decides whether the résumé text describes a professional
//! background and extracts a short structured profile from it.
//!
//! Two cost controls: text under `MIN_CV_CHARS` is rejected without a model
//! call, and only the first `MAX_CV_PROMPT_CHARS` characters are sent.

use serde::Deserialize;
use tracing::{info, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{strip_json_fences, ChatMessage, LlmGateway};
use crate::workflow::engine::TurnInput;
use crate::workflow::prompts::CV_EXTRACT_PROMPT;
use crate::workflow::state::{CvDetails, WorkflowState};

pub const MIN_CV_CHARS: usize = 50;
pub const MAX_CV_PROMPT_CHARS: usize = 4000;

/// Separator used when the candidate adds detail in a correction loop.
const USER_DETAILS_SEPARATOR: &str = "\n\nUser provided details: ";

const SPARSE_CV_MESSAGE: &str = "Your CV content seems too sparse or invalid. Please provide a \
    summary of your experience or upload a valid PDF.";
const INVALID_CV_MESSAGE: &str = "I couldn't detect a valid professional background in your CV. \
    Could you briefly describe your experience?";
const UNAVAILABLE_CV_MESSAGE: &str = "I couldn't review your CV right now. Could you briefly \
    describe your experience so I can try again?";

/// Raw shape the model is asked to return. Every field is optional so that a
/// partially-filled answer still parses.
#[derive(Debug, Deserialize)]
struct CvAssessment {
    #[serde(default)]
    is_valid: bool,
    name: Option<String>,
    #[serde(default)]
    skills: Vec<String>,
    experience_summary: Option<String>,
    reason: Option<String>,
}

/// Outcome of reading the model's answer.
#[derive(Debug, Clone, PartialEq)]
pub enum CvVerdict {
    Valid(CvDetails),
    Invalid { reason: Option<String> },
}

pub async fn validate_cv(llm: &dyn LlmGateway, state: &mut WorkflowState, input: &mut TurnInput) {
    if !state.cv_valid {
        if let Some(details) = input.take_latest() {
            state.cv_text.push_str(USER_DETAILS_SEPARATOR);
            state.cv_text.push_str(&details);
        }
    }

    if state.cv_text.chars().count() < MIN_CV_CHARS {
        info!(
            "CV rejected without model call: {} chars",
            state.cv_text.chars().count()
        );
        reject(state, SPARSE_CV_MESSAGE);
        return;
    }

    let excerpt: String = state.cv_text.chars().take(MAX_CV_PROMPT_CHARS).collect();
    let prompt = CV_EXTRACT_PROMPT.replace("{cv_text}", &excerpt);
    let messages = [ChatMessage::system(JSON_ONLY_SYSTEM), ChatMessage::user(prompt)];

    let answer = match llm.complete(&messages).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!("CV check failed: {e}");
            reject(state, UNAVAILABLE_CV_MESSAGE);
            return;
        }
    };

    match parse_cv_response(&answer) {
        CvVerdict::Valid(details) => {
            info!(
                "CV accepted for {:?} ({} skills)",
                details.name,
                details.skills.len()
            );
            state.cv_valid = true;
            state.cv_details = Some(details);
        }
        CvVerdict::Invalid { reason } => {
            info!("CV rejected: {}", reason.as_deref().unwrap_or("no reason given"));
            reject(state, INVALID_CV_MESSAGE);
        }
    }
}

fn reject(state: &mut WorkflowState, message: &str) {
    state.cv_valid = false;
    state.cv_details = None;
    state.push_assistant(message);
}

/// Reads the model's JSON verdict. When the answer is not parseable JSON the
/// raw text is searched for an `"is_valid": true` marker; a hit yields a
/// placeholder profile, anything else is a rejection.
pub fn parse_cv_response(raw: &str) -> CvVerdict {
    let cleaned = strip_json_fences(raw);

    match serde_json::from_str::<CvAssessment>(cleaned) {
        Ok(assessment) if assessment.is_valid => CvVerdict::Valid(CvDetails {
            name: assessment
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            skills: assessment.skills,
            experience_summary: assessment
                .experience_summary
                .unwrap_or_else(|| "No summary available".to_string()),
        }),
        Ok(assessment) => CvVerdict::Invalid {
            reason: assessment.reason,
        },
        Err(e) => {
            warn!("CV verdict is not valid JSON ({e}); falling back to marker search");
            if cleaned.contains("\"is_valid\": true") || cleaned.contains("\"is_valid\":true") {
                CvVerdict::Valid(CvDetails {
                    name: "Unknown".to_string(),
                    skills: Vec::new(),
                    experience_summary: "Parsed from text".to_string(),
                })
            } else {
                CvVerdict::Invalid { reason: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedGateway;
    use crate::llm_client::LlmError;

    const RESUME: &str = "Jane Doe. Senior backend engineer with eight years of Rust, Go and \
        PostgreSQL experience building payment systems at scale.";

    #[test]
    fn test_parse_valid_json() {
        let raw = r#"{"is_valid": true, "name": "Jane Doe", "skills": ["Rust", "Go"],
            "experience_summary": "Eight years of backend work."}"#;
        assert_eq!(
            parse_cv_response(raw),
            CvVerdict::Valid(CvDetails {
                name: "Jane Doe".to_string(),
                skills: vec!["Rust".to_string(), "Go".to_string()],
                experience_summary: "Eight years of backend work.".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"is_valid\": true, \"name\": \"Jane\", \"skills\": [], \"experience_summary\": \"x\"}\n```";
        assert!(matches!(parse_cv_response(raw), CvVerdict::Valid(_)));
    }

    #[test]
    fn test_parse_json_with_only_closing_fence_keeps_profile() {
        let raw = "{\"is_valid\": true, \"name\": \"Jane Doe\", \"skills\": [\"Rust\"], \"experience_summary\": \"x\"}\n```";
        assert_eq!(
            parse_cv_response(raw),
            CvVerdict::Valid(CvDetails {
                name: "Jane Doe".to_string(),
                skills: vec!["Rust".to_string()],
                experience_summary: "x".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_json_with_only_opening_fence() {
        let raw = "```json\n{\"is_valid\" : false, \"reason\": \"Shopping list\"}";
        assert_eq!(
            parse_cv_response(raw),
            CvVerdict::Invalid {
                reason: Some("Shopping list".to_string())
            }
        );
    }

    #[test]
    fn test_parse_invalid_json_keeps_reason() {
        let raw = r#"{"is_valid": false, "reason": "This is a recipe"}"#;
        assert_eq!(
            parse_cv_response(raw),
            CvVerdict::Invalid {
                reason: Some("This is a recipe".to_string())
            }
        );
    }

    #[test]
    fn test_parse_missing_is_valid_is_rejection() {
        let raw = r#"{"name": "Jane"}"#;
        assert!(matches!(parse_cv_response(raw), CvVerdict::Invalid { .. }));
    }

    #[test]
    fn test_parse_blank_name_becomes_unknown() {
        let raw = r#"{"is_valid": true, "name": "  ", "skills": ["SQL"], "experience_summary": "x"}"#;
        match parse_cv_response(raw) {
            CvVerdict::Valid(details) => assert_eq!(details.name, "Unknown"),
            other => panic!("expected valid verdict, got {other:?}"),
        }
    }

    /// Malformed JSON that still carries the marker is accepted with a
    /// placeholder profile. This is current behavior and is lossy: the real
    /// name and skills in the answer are discarded.
    #[test]
    fn test_malformed_json_with_marker_falls_back_to_placeholder_profile() {
        let raw = r#"Sure! {"is_valid": true, "name": "Jane Doe", "skills": ["Rust",]"#;
        assert_eq!(
            parse_cv_response(raw),
            CvVerdict::Valid(CvDetails {
                name: "Unknown".to_string(),
                skills: vec![],
                experience_summary: "Parsed from text".to_string(),
            })
        );
    }

    #[test]
    fn test_malformed_json_with_compact_marker_falls_back() {
        let raw = r#"{"is_valid":true, name: Jane"#;
        assert!(matches!(parse_cv_response(raw), CvVerdict::Valid(_)));
    }

    #[test]
    fn test_malformed_json_without_marker_is_rejection() {
        assert_eq!(
            parse_cv_response("I think this is a resume"),
            CvVerdict::Invalid { reason: None }
        );
    }

    #[tokio::test]
    async fn test_short_cv_is_rejected_without_model_call() {
        let llm = ScriptedGateway::replies(&[]);
        let mut state = WorkflowState::new("too short", "Software Engineer", "");
        let mut input = TurnInput::none();

        validate_cv(&llm, &mut state, &mut input).await;

        assert!(!state.cv_valid);
        assert_eq!(llm.call_count(), 0);
        assert!(state.last_assistant_message().unwrap().content.contains("too sparse"));
    }

    #[tokio::test]
    async fn test_valid_cv_stores_profile() {
        let llm = ScriptedGateway::replies(&[
            r#"{"is_valid": true, "name": "Jane Doe", "skills": ["Rust"], "experience_summary": "Backend."}"#,
        ]);
        let mut state = WorkflowState::new(RESUME, "Software Engineer", "");
        let mut input = TurnInput::none();

        validate_cv(&llm, &mut state, &mut input).await;

        assert!(state.cv_valid);
        assert_eq!(state.cv_details.as_ref().unwrap().name, "Jane Doe");
        assert!(state.messages.is_empty());
    }

    #[tokio::test]
    async fn test_correction_appends_user_details() {
        let llm = ScriptedGateway::replies(&[
            r#"{"is_valid": true, "name": "Unknown", "skills": [], "experience_summary": "Ops."}"#,
        ]);
        let mut state = WorkflowState::new("short cv", "SRE", "");
        let mut input = TurnInput::from_user(
            "I ran Kubernetes clusters for five years at two fintech companies.",
        );

        validate_cv(&llm, &mut state, &mut input).await;

        assert!(state.cv_text.starts_with("short cv\n\nUser provided details: I ran Kubernetes"));
        assert!(input.is_consumed());
        assert!(state.cv_valid);
    }

    #[tokio::test]
    async fn test_prompt_is_truncated() {
        let long_cv = "x".repeat(MAX_CV_PROMPT_CHARS + 500);
        let llm = ScriptedGateway::replies(&[r#"{"is_valid": false, "reason": "noise"}"#]);
        let mut state = WorkflowState::new(long_cv, "SRE", "");
        let mut input = TurnInput::none();

        validate_cv(&llm, &mut state, &mut input).await;

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains(&"x".repeat(MAX_CV_PROMPT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_CV_PROMPT_CHARS + 1)));
        assert!(!state.cv_valid);
        assert!(state.cv_details.is_none());
    }

    #[tokio::test]
    async fn test_gateway_failure_is_soft_rejection() {
        let llm = ScriptedGateway::new(vec![Err(LlmError::EmptyContent)]);
        let mut state = WorkflowState::new(RESUME, "SRE", "");
        let mut input = TurnInput::none();

        validate_cv(&llm, &mut state, &mut input).await;

        assert!(!state.cv_valid);
        assert!(state
            .last_assistant_message()
            .unwrap()
            .content
            .contains("describe your experience"));
    }
}
