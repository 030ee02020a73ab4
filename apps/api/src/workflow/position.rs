//! Position validator: is the candidate's target a real job title?

use tracing::{info, warn};

use crate::llm_client::{ChatMessage, LlmGateway};
use crate::workflow::engine::TurnInput;
use crate::workflow::prompts::{POSITION_CHECK_PROMPT, POSITION_CHECK_SYSTEM};
use crate::workflow::state::WorkflowState;

/// Runs the position check. Never fails: gateway errors become a soft
/// rejection so the candidate can simply resend the title.
pub async fn validate_position(
    llm: &dyn LlmGateway,
    state: &mut WorkflowState,
    input: &mut TurnInput,
) {
    if !state.position_valid {
        // In a correction loop the user's reply is the corrected title.
        if let Some(corrected) = input.take() {
            state.position = corrected.trim().to_string();
        }
    }

    let prompt = POSITION_CHECK_PROMPT.replace("{position}", &state.position);
    let messages = [
        ChatMessage::system(POSITION_CHECK_SYSTEM),
        ChatMessage::user(prompt),
    ];

    match llm.complete(&messages).await {
        Ok(answer) if is_affirmative(&answer) => {
            info!("Position accepted: {:?}", state.position);
            state.position_valid = true;
        }
        Ok(answer) => {
            info!(
                "Position rejected: {:?} (model said {:?})",
                state.position,
                answer.chars().take(40).collect::<String>()
            );
            state.position_valid = false;
            state.push_assistant(invalid_position_message(&state.position));
        }
        Err(e) => {
            warn!("Position check failed for {:?}: {e}", state.position);
            state.position_valid = false;
            state.push_assistant(format!(
                "I couldn't verify '{}' as a job position right now. Please send the job position \
                 you are applying for again (e.g., 'Senior Python Developer').",
                state.position
            ));
        }
    }
}

/// Substring check on the trimmed, upper-cased answer. Deliberately loose:
/// "Yes." and "YES, it is" both pass.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().to_uppercase().contains("YES")
}

fn invalid_position_message(position: &str) -> String {
    format!(
        "'{position}' doesn't look like a valid job position. Please enter the job position \
         you are applying for (e.g., 'Senior Python Developer')."
    )
}
