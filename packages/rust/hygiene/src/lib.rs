//! Security hygiene quiz: the fixed question set, yes/no normalization,
//! and scoring.
//!
//! The quiz is a fixed ordered list of yes/no questions about everyday
//! security practice. A "yes" is always the healthy answer, so the score is
//! simply the share of affirmative answers scaled to 0–10.

mod state;

use serde::Serialize;

pub use state::{HygieneState, QuizProgress};

/// The quiz, in the order it is asked.
pub const HYGIENE_QUESTIONS: [&str; 6] = [
    "Do you have Multi-Factor Authentication (MFA) enabled on critical accounts? (yes/no)",
    "Do you use unique passwords of 12 or more characters per account? (yes/no)",
    "Do you regularly install OS and software updates? (yes/no)",
    "Do you have up-to-date antivirus/endpoint protection? (yes/no)",
    "Do you maintain regular backups of important data (offline or cloud)? (yes/no)",
    "Have you had phishing-awareness training in the last 12 months? (yes/no)",
];

/// Phrases that start a quiz when no quiz is running.
const TRIGGER_PHRASES: [&str; 3] = ["security hygiene", "check my security", "hygiene check"];

const YES_TOKENS: [&str; 6] = ["y", "yes", "true", "1", "yeah", "yep"];
const NO_TOKENS: [&str; 6] = ["n", "no", "false", "0", "nope", "nay"];

/// Number of questions in the quiz.
pub fn question_count() -> usize {
    HYGIENE_QUESTIONS.len()
}

/// True if the text asks for a hygiene check.
pub fn is_trigger(text: &str) -> bool {
    let lower = text.to_lowercase();
    TRIGGER_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// True for an affirmative reply (`yes`, `y`, `yep`, ...), ignoring case and
/// surrounding whitespace.
pub fn normalize_yes(answer: &str) -> bool {
    matches_token(answer, &YES_TOKENS)
}

/// True for a negative reply (`no`, `n`, `nope`, ...), ignoring case and
/// surrounding whitespace.
pub fn normalize_no(answer: &str) -> bool {
    matches_token(answer, &NO_TOKENS)
}

fn matches_token(answer: &str, tokens: &[&str]) -> bool {
    let normalized = answer.trim().to_lowercase();
    tokens.contains(&normalized.as_str())
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// One question paired with the answer given to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub question: String,
    /// Raw answer text; `None` when the quiz ended before this question.
    pub answer: Option<String>,
    pub ok: bool,
}

/// Final quiz outcome, also used verbatim as model evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HygieneReport {
    /// 0.0–10.0, one decimal.
    pub score: f64,
    /// Text of every question not answered affirmatively.
    pub weaknesses: Vec<String>,
    pub details: Vec<QuestionResult>,
}

/// Score a list of raw answers against the question set.
///
/// Answers pair with questions by position. A missing answer counts as
/// "not ok"; answers past the last question are ignored.
pub fn score(answers: &[String]) -> HygieneReport {
    let details: Vec<QuestionResult> = HYGIENE_QUESTIONS
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let answer = answers.get(i).cloned();
            let ok = answer.as_deref().is_some_and(normalize_yes);
            QuestionResult {
                question: (*question).to_string(),
                answer,
                ok,
            }
        })
        .collect();

    let yes_count = details.iter().filter(|d| d.ok).count();
    let raw = yes_count as f64 / HYGIENE_QUESTIONS.len() as f64 * 10.0;
    let score = (raw * 10.0).round() / 10.0;

    let weaknesses = details
        .iter()
        .filter(|d| !d.ok)
        .map(|d| d.question.clone())
        .collect();

    HygieneReport {
        score,
        weaknesses,
        details,
    }
}
