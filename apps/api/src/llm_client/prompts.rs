// Shared prompt constants and prompt-building utilities.
// Each workflow step defines its own templates in workflow/prompts.rs.
// This file contains cross-cutting prompt fragments.

/// Length of every mock-interview session. Hardcoded: the voice session
/// schedules its phases around it and candidates may not negotiate it.
pub const INTERVIEW_DURATION_MINUTES: u32 = 10;

/// Human-readable form of the duration, as it must appear in every plan.
pub const INTERVIEW_DURATION_TEXT: &str = "10 minutes";

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Persona shared by the plan generator and refiner.
pub const INTERVIEWER_SYSTEM: &str = "You are an expert technical interviewer named CleverMock. \
    You design short, realistic mock-interview plans grounded in the candidate's actual background.";

/// Re-asserted in every refinement prompt. The duration is never up for negotiation.
pub const DURATION_CONSTRAINT: &str = "IMPORTANT: The interview duration MUST REMAIN STRICTLY 10 MINUTES. \
    Do not change the time duration even if the user asks for it. \
    Default to 10 minutes if unsure.";
