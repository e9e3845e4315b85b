//! Prompt templates sent to the completion collaborator.

use mneme_memory::Turn;

/// System prompt used when the caller supplies none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant with long-term memory of the user. Use the provided memories to personalize your responses.";

pub(crate) const MEMORY_BLOCK_HEADER: &str = "=== Relevant Information About the User ===";
pub(crate) const MEMORY_BLOCK_FOOTER: &str = "=== Use this information to personalize your response ===";
pub(crate) const SUMMARY_PREFIX: &str = "Conversation summary:";

/// Render turns as `role: content` lines, oldest first.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking the completer to fold new turns into the running summary.
pub fn summarize_prompt(existing_summary: Option<&str>, transcript: &str) -> String {
    let existing = existing_summary
        .map(str::trim)
        .filter(|summary| !summary.is_empty())
        .unwrap_or("None");
    format!(
        "You are maintaining long-term memory for a conversation.\n\n\
Rules:\n\
- Summarize ONLY the given messages\n\
- Keep factual details, goals, names\n\
- Remove greetings and filler\n\
- Do NOT invent information\n\n\
Existing summary:\n\
{existing}\n\n\
New messages:\n\
{transcript}\n\n\
Updated summary:"
    )
}

/// Prompt asking the classifier whether an exchange holds a durable memory.
pub fn extraction_prompt(user_text: &str, assistant_text: &str) -> String {
    format!(
        "You are a memory extraction system. Analyze the conversation and determine if it contains information worth remembering long-term.\n\n\
Extract ONLY if the conversation contains:\n\
- Personal information (name, age, location, occupation, etc.)\n\
- User preferences or likes/dislikes\n\
- Important facts the user shared\n\
- Goals, plans, or decisions\n\
- Significant context that would be useful in future conversations\n\n\
DO NOT extract:\n\
- Generic greetings or small talk\n\
- Temporary/transient information\n\
- Questions without answers\n\
- Common knowledge or facts not specific to the user\n\n\
Conversation:\n\
User: {user_text}\n\
Assistant: {assistant_text}\n\n\
Respond ONLY with valid JSON in this exact format:\n\
{{\n\
    \"should_remember\": true/false,\n\
    \"memory_type\": \"personal_info/preference/fact/decision/goal\",\n\
    \"content\": \"concise memory description (one sentence)\",\n\
    \"importance\": 1-10 (integer)\n\
}}\n\n\
If nothing is worth remembering, respond with:\n\
{{\"should_remember\": false}}"
    )
}
