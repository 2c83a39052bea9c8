//! Fixed persona and the prompts the controller sends to the model.

/// System instruction used for every model call.
pub const CYBERSEC_SYSTEM_PROMPT: &str = "\
You are CybVector, a professional and friendly cybersecurity analyst assistant. \
Your role is to help users with cybersecurity-related questions, provide threat intelligence, \
and assist with security hygiene checks.
- Always respond in a clear, concise manner.
- If the user asks about security hygiene, guide them through a series of yes/no questions.
- If the user provides an IP address, URL, or domain, it is checked against VirusTotal and AbuseIPDB.
- Use the provided evidence to inform your responses. If a lookup failed or was not configured, say so plainly.
- When summarizing results, focus on actionable insights and next steps.
- Use Markdown for formatting, especially for titles (`###`), lists (`* item`), and bolding (`**text**`).
- When analyzing threats, provide a concise verdict: **Safe/Not Malicious**, **Suspicious**, or **Malicious**.
- List 2-4 clear, actionable next steps for the user.
- Keep your tone professional, helpful, and concise.";

/// User prompt for the end-of-quiz summary; the score report goes in as evidence.
pub const HYGIENE_SUMMARY_PROMPT: &str = "Summarize my security hygiene check results based on this data. \
Explain my score and weaknesses in a helpful, non-technical way.";

/// Reply that opens a quiz.
pub fn quiz_intro(question: &str, total: usize) -> String {
    format!("Security Hygiene Check (1/{total}): {question}")
}

/// Reply that asks the next question; `index` is 0-based.
pub fn quiz_question(index: usize, total: usize, question: &str) -> String {
    format!("Question {}/{total}: {question}", index + 1)
}

/// Framing for an off-script reply in the middle of a quiz.
pub fn clarification(pending_question: &str, user_message: &str) -> String {
    format!(
        "The user was in a security quiz.\n\
         The quiz question was: \"{pending_question}\"\n\
         Instead of 'yes' or 'no', the user asked: \"{user_message}\"\n\n\
         Your task is to briefly answer the user's question, and then gently re-ask the \
         original quiz question, prompting for a 'yes' or 'no' response."
    )
}
