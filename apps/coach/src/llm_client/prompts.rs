// Shared system prompts.
// Stage-specific prompt templates live in workflow/prompts.rs.

/// System prompt for single-shot completions issued by the workflow stages.
pub const COMPLETION_SYSTEM: &str = "You are an AI interview coach. \
    Answer with the requested content only. \
    Do NOT add greetings, apologies or commentary.";

/// System prompt for the conversational chat mode.
pub const CHAT_SYSTEM: &str = "You are a helpful AI interview coach.";
