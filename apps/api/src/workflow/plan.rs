//! Plan generation and refinement.
//!
//! Both steps store the model's markdown verbatim. Neither mutates the state
//! until the completion has arrived, so a gateway failure leaves the existing
//! plan untouched and the turn can simply be retried.

use tracing::{info, warn};

use crate::llm_client::prompts::{
    DURATION_CONSTRAINT, INTERVIEWER_SYSTEM, INTERVIEW_DURATION_MINUTES, INTERVIEW_DURATION_TEXT,
};
use crate::llm_client::{ChatMessage, LlmError, LlmGateway};
use crate::workflow::engine::TurnInput;
use crate::workflow::prompts::{PLAN_GENERATION_PROMPT, PLAN_REFINEMENT_PROMPT};
use crate::workflow::state::{PlanStatus, WorkflowState};

/// Characters of raw résumé text quoted in the generation prompt.
pub const CV_EXCERPT_CHARS: usize = 1000;

pub async fn generate_plan(
    llm: &dyn LlmGateway,
    state: &mut WorkflowState,
) -> Result<(), LlmError> {
    let prompt = build_generation_prompt(state);
    let messages = [
        ChatMessage::system(INTERVIEWER_SYSTEM),
        ChatMessage::user(prompt),
    ];

    let plan = llm.complete(&messages).await?;
    warn_if_duration_missing(&plan);

    info!(
        "Generated interview plan for {:?} ({} chars)",
        state.position,
        plan.len()
    );
    state.interview_details = plan.clone();
    state.status = PlanStatus::Generated;
    state.push_assistant(plan);
    Ok(())
}

/// Applies the candidate's feedback to the current plan. Without feedback in
/// this turn there is nothing to apply and the state is left as is.
pub async fn refine_plan(
    llm: &dyn LlmGateway,
    state: &mut WorkflowState,
    input: &mut TurnInput,
) -> Result<(), LlmError> {
    let Some(feedback) = input.take() else {
        info!("Refinement requested without user feedback; nothing to do");
        return Ok(());
    };

    let prompt = PLAN_REFINEMENT_PROMPT
        .replace("{current_plan}", &state.interview_details)
        .replace("{feedback}", &feedback)
        .replace("{duration_constraint}", DURATION_CONSTRAINT);
    let messages = [
        ChatMessage::system(INTERVIEWER_SYSTEM),
        ChatMessage::user(prompt),
    ];

    let plan = llm.complete(&messages).await?;
    warn_if_duration_missing(&plan);

    info!("Refined interview plan ({} chars)", plan.len());
    state.interview_details = plan.clone();
    state.status = PlanStatus::Refining;
    state.push_assistant(plan);
    Ok(())
}

fn build_generation_prompt(state: &WorkflowState) -> String {
    let (name, skills, experience_summary) = match &state.cv_details {
        Some(details) => (
            details.name.as_str(),
            details.skills.join(", "),
            details.experience_summary.as_str(),
        ),
        None => ("Candidate", String::new(), "No summary available"),
    };
    let cv_excerpt: String = state.cv_text.chars().take(CV_EXCERPT_CHARS).collect();

    PLAN_GENERATION_PROMPT
        .replace("{duration_minutes}", &INTERVIEW_DURATION_MINUTES.to_string())
        .replace("{name}", name)
        .replace("{position}", &state.position)
        .replace("{instruction}", &state.instruction)
        .replace("{skills}", &skills)
        .replace("{experience_summary}", experience_summary)
        .replace("{cv_excerpt}", &cv_excerpt)
}

/// The duration rule is enforced by the prompt alone; this only makes drift visible.
fn warn_if_duration_missing(plan: &str) {
    let lower = plan.to_lowercase();
    let minutes = INTERVIEW_DURATION_MINUTES.to_string();
    if !lower.contains(INTERVIEW_DURATION_TEXT)
        && !lower.contains(&format!("{minutes}-minute"))
        && !lower.contains(&format!("{minutes} min"))
    {
        warn!("Interview plan does not mention the {INTERVIEW_DURATION_TEXT} duration");
    }
}
