// All LLM prompt templates for the preparation workflow.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for the position check; one word, nothing else.
pub const POSITION_CHECK_SYSTEM: &str = "You classify job titles. \
    Answer strictly with \"YES\" or \"NO\". Do not explain.";

/// Position check prompt. Replace `{position}` before sending.
pub const POSITION_CHECK_PROMPT: &str = r#"Is '{position}' a valid job position title?
It should be a specific role like "Software Engineer", "Product Manager", "Marketing Specialist", etc.
It should not be gibberish or a full sentence unrelated to a job title.

Answer strictly with "YES" or "NO"."#;

/// CV extraction prompt. Replace `{cv_text}` (already truncated) before sending.
pub const CV_EXTRACT_PROMPT: &str = r#"Analyze the following text to see if it contains professional experience or a resume.

Text:
{cv_text}...

If it is a valid resume or professional summary, extract the following details in JSON format:
{
    "is_valid": true,
    "name": "Candidate Name (or 'Unknown')",
    "skills": ["Skill1", "Skill2"],
    "experience_summary": "Brief summary of experience (max 2 sentences)"
}

If it is NOT a valid resume, return JSON:
{
    "is_valid": false,
    "reason": "Why it is invalid"
}

Return ONLY the JSON. Do not add markdown formatting."#;

/// Plan generation prompt.
/// Replace: {duration_minutes}, {name}, {position}, {instruction}, {skills},
///          {experience_summary}, {cv_excerpt}
pub const PLAN_GENERATION_PROMPT: &str = r#"Based on the following inputs, generate a structured interview plan for a {duration_minutes}-minute interview.
The plan must be realistic for a short {duration_minutes}-minute session.

Candidate Name: {name}
Position: {position}
Instructions: {instruction}
Candidate Skills: {skills}
Candidate Experience: {experience_summary}

CV Excerpt: {cv_excerpt}...

Generate a concise but comprehensive interview plan including:
1. Key topics to cover (tailored to their actual skills)
2. 2-3 initial questions (referencing their specific experience if possible)
3. Evaluation criteria

Format it nicely in Markdown."#;

/// Plan refinement prompt.
/// Replace: {current_plan}, {feedback}, {duration_constraint}
pub const PLAN_REFINEMENT_PROMPT: &str = r#"Current Interview Plan:
{current_plan}

User Feedback:
{feedback}

Update the interview plan based on the feedback. Keep the format structured in Markdown.
{duration_constraint}
Return the FULL updated plan."#;

/// Acceptance clean-up prompt. Replace `{plan}` before sending.
pub const PLAN_SANITIZE_PROMPT: &str = r#"The following text is an interview plan generated by an AI. It might contain conversational filler at the beginning or end (e.g., "Here is the plan", "Okay, I've updated it").

Input Text:
{plan}

Task:
Extract ONLY the markdown content of the interview plan.
Remove any introductory or concluding conversational remarks.
Ensure it starts directly with the markdown headers/content.
Return ONLY the cleaned markdown."#;
