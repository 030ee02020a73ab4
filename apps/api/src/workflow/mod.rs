// Interview preparation workflow
// Implements: position and CV validation, plan generation and refinement,
// acceptance sanitizing, routing, and the per-turn engine over a persisted state blob.
// All LLM calls go through the LlmGateway trait; nodes never touch reqwest directly.

pub mod cv;
pub mod engine;
pub mod handlers;
pub mod plan;
pub mod position;
pub mod prompts;
pub mod router;
pub mod sanitize;
pub mod state;
pub mod store;
