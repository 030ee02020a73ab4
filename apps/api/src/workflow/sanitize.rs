//! Acceptance sanitizer: strips chatty preambles ("Here is your plan!") from
//! the plan before it is handed to the voice session.

use tracing::{info, warn};

use crate::llm_client::{ChatMessage, LlmGateway};
use crate::workflow::prompts::PLAN_SANITIZE_PROMPT;

/// Returns the cleaned plan, or the input unchanged if the model call fails
/// or comes back blank. Acceptance never blocks on this step.
pub async fn sanitize_plan(llm: &dyn LlmGateway, plan: &str) -> String {
    let prompt = PLAN_SANITIZE_PROMPT.replace("{plan}", plan);

    match llm.complete(&[ChatMessage::user(prompt)]).await {
        Ok(cleaned) if !cleaned.trim().is_empty() => {
            info!(
                "Sanitized interview plan: {} -> {} chars",
                plan.len(),
                cleaned.len()
            );
            cleaned
        }
        Ok(_) => {
            warn!("Plan sanitizer returned blank output; keeping original plan");
            plan.to_string()
        }
        Err(e) => {
            warn!("Failed to sanitize interview plan: {e}");
            plan.to_string()
        }
    }
}
