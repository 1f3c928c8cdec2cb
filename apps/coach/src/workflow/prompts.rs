// All prompt templates for the interview workflow stages.

/// Role extraction prompt. Replace `{resume_text}` before sending.
pub const EXTRACT_ROLE_PROMPT: &str = "\
You are an expert at reading resumes. Extract the job title from this resume:

{resume_text}

Just return the job title.";

/// Question generation prompt. Replace `{role}` before sending.
pub const GENERATE_QUESTIONS_PROMPT: &str = "\
You are an AI interview coach. Generate 3 technical interview questions \
for a candidate applying for the role: {role}";

/// Follow-up prompt. Replace `{role}` before sending.
pub const FOLLOW_UP_PROMPT: &str = "\
Based on the role of {role}, generate one tough follow-up interview question.";
