//! Per-session quiz progress.

use serde::Serialize;
use tracing::debug;

use crate::{HYGIENE_QUESTIONS, HygieneReport, score};

/// Quiz progress for one session.
///
/// While `active`, `step == answers.len()` and `step` indexes the question
/// awaiting an answer. Fields are private so the only way to move the quiz
/// forward is through [`start`](Self::start),
/// [`record_answer`](Self::record_answer) and [`finish`](Self::finish).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HygieneState {
    active: bool,
    step: usize,
    answers: Vec<String>,
}

/// What happened after an answer was recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizProgress {
    /// More questions remain; `index` is 0-based.
    Next {
        index: usize,
        question: &'static str,
    },
    /// The last question was answered and the quiz is no longer active.
    Complete(HygieneReport),
}

impl HygieneState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Begin (or restart) the quiz and return the first question.
    pub fn start(&mut self) -> &'static str {
        self.active = true;
        self.step = 0;
        self.answers.clear();
        HYGIENE_QUESTIONS[0]
    }

    /// The question currently awaiting an answer, if a quiz is running.
    pub fn pending_question(&self) -> Option<&'static str> {
        if self.active {
            HYGIENE_QUESTIONS.get(self.step).copied()
        } else {
            None
        }
    }

    /// Record a yes/no answer to the pending question.
    ///
    /// Returns `None` when no quiz is running. Finishing the last question
    /// deactivates the quiz in the same call.
    pub fn record_answer(&mut self, answer: &str) -> Option<QuizProgress> {
        if !self.active {
            return None;
        }

        self.answers.push(answer.to_string());
        self.step += 1;
        debug!(step = self.step, total = HYGIENE_QUESTIONS.len(), "quiz answer recorded");

        match HYGIENE_QUESTIONS.get(self.step).copied() {
            Some(question) => Some(QuizProgress::Next {
                index: self.step,
                question,
            }),
            None => Some(QuizProgress::Complete(self.finish())),
        }
    }

    /// End the quiz and score whatever answers were collected. Unanswered
    /// questions count as not ok.
    pub fn finish(&mut self) -> HygieneReport {
        self.active = false;
        score(&self.answers)
    }
}
