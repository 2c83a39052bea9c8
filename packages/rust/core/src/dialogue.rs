//! Per-turn dialogue controller.
//!
//! Every inbound message is classified into exactly one [`Turn`] in a fixed
//! priority order, then handled by the matching handler:
//!
//! 1. [`Turn::QuizStart`]: a trigger phrase while no quiz is running
//! 2. [`Turn::QuizAnswer`] / [`Turn::QuizClarify`]: a quiz is running
//! 3. [`Turn::ThreatIntel`]: the message mentions an IP, URL, or domain
//! 4. [`Turn::GeneralChat`]: anything else

use std::sync::Arc;

use tracing::{error, info, instrument};

use cybvector_completion::{Completer, OpenRouterClient};
use cybvector_hygiene::{
    HygieneState, QuizProgress, is_trigger, normalize_no, normalize_yes, question_count,
};
use cybvector_intel::{DetectedEntities, ReputationGateway, detect_entities};
use cybvector_shared::{
    AppConfig, ChatRequest, ChatResponse, Credentials, Evidence, Result, SessionId,
    validate_api_key,
};

use crate::prompts;
use crate::session::{InMemorySessionStore, SessionStore};

/// Evidence label for the final quiz report.
const HYGIENE_LABEL: &str = "hygiene_results";

/// The flow a message drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    QuizStart,
    /// A yes/no reply to the pending quiz question.
    QuizAnswer,
    /// Anything else while a quiz is running; the quiz does not advance.
    QuizClarify { pending_question: &'static str },
    ThreatIntel(DetectedEntities),
    GeneralChat,
}

impl Turn {
    pub fn name(&self) -> &'static str {
        match self {
            Self::QuizStart => "quiz_start",
            Self::QuizAnswer => "quiz_answer",
            Self::QuizClarify { .. } => "quiz_clarify",
            Self::ThreatIntel(_) => "threat_intel",
            Self::GeneralChat => "general_chat",
        }
    }
}

/// Decide which flow `message` drives, given the session's quiz state.
pub fn classify(message: &str, hygiene: &HygieneState) -> Turn {
    if !hygiene.is_active() && is_trigger(message) {
        return Turn::QuizStart;
    }

    if let Some(pending_question) = hygiene.pending_question() {
        if normalize_yes(message) || normalize_no(message) {
            return Turn::QuizAnswer;
        }
        return Turn::QuizClarify { pending_question };
    }

    let entities = detect_entities(message);
    if !entities.is_empty() {
        return Turn::ThreatIntel(entities);
    }

    Turn::GeneralChat
}

/// Routes chat turns to the quiz, threat-intel, or general-chat flow.
#[derive(Clone)]
pub struct DialogueController {
    sessions: Arc<dyn SessionStore>,
    gateway: ReputationGateway,
    completer: Completer,
}

impl DialogueController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        gateway: ReputationGateway,
        completer: Completer,
    ) -> Self {
        Self {
            sessions,
            gateway,
            completer,
        }
    }

    /// Wire the production stack: in-memory sessions, live reputation
    /// clients, and the OpenRouter model. Fails if the model key is missing.
    pub fn from_config(config: &AppConfig, credentials: &Credentials) -> Result<Self> {
        let api_key = validate_api_key(credentials, config)?;
        let model = OpenRouterClient::new(&config.completion, api_key)?;
        let gateway = ReputationGateway::from_config(&config.reputation, credentials)?;
        let sessions = InMemorySessionStore::from_config(&config.sessions);

        info!(
            model = %config.completion.model,
            max_sessions = config.sessions.max_sessions,
            "dialogue controller ready"
        );
        Ok(Self::new(
            Arc::new(sessions),
            gateway,
            Completer::new(Arc::new(model)),
        ))
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Handle one chat turn. Never fails; every failure path degrades to a
    /// polite reply.
    #[instrument(skip_all, fields(session = tracing::field::Empty, turn = tracing::field::Empty))]
    pub async fn handle(&self, request: ChatRequest) -> ChatResponse {
        let message = request.message.trim();
        let session_id = SessionId::from_client(request.session_id.as_deref());
        let span = tracing::Span::current();
        span.record("session", tracing::field::display(&session_id));

        let handle = self.sessions.checkout(&session_id).await;
        // Held for the whole turn so same-session requests serialize.
        let mut session = handle.lock().await;

        let turn = classify(message, &session.hygiene);
        span.record("turn", turn.name());
        info!(chars = message.len(), "handling chat turn");

        let response = match turn {
            Turn::QuizStart => Self::start_quiz(&mut session.hygiene),
            Turn::QuizAnswer => self.answer_quiz(&mut session.hygiene, message).await,
            Turn::QuizClarify { pending_question } => {
                self.clarify(pending_question, message).await
            }
            Turn::ThreatIntel(entities) => self.threat_intel(message, &entities).await,
            Turn::GeneralChat => self.general_chat(message).await,
        };

        ChatResponse {
            response,
            session_id,
        }
    }

    fn start_quiz(hygiene: &mut HygieneState) -> String {
        let first = hygiene.start();
        prompts::quiz_intro(first, question_count())
    }

    async fn answer_quiz(&self, hygiene: &mut HygieneState, message: &str) -> String {
        match hygiene.record_answer(message) {
            Some(QuizProgress::Next { index, question }) => {
                prompts::quiz_question(index, question_count(), question)
            }
            Some(QuizProgress::Complete(report)) => {
                info!(score = report.score, weaknesses = report.weaknesses.len(), "quiz complete");
                let mut evidence = Evidence::new();
                evidence.push(HYGIENE_LABEL, &report);
                self.completer
                    .complete(
                        prompts::HYGIENE_SUMMARY_PROMPT,
                        prompts::CYBERSEC_SYSTEM_PROMPT,
                        Some(&evidence),
                    )
                    .await
            }
            None => {
                error!("yes/no answer routed to an inactive quiz");
                self.general_chat(message).await
            }
        }
    }

    async fn clarify(&self, pending_question: &str, message: &str) -> String {
        let framing = prompts::clarification(pending_question, message);
        self.completer
            .complete(&framing, prompts::CYBERSEC_SYSTEM_PROMPT, None)
            .await
    }

    async fn threat_intel(&self, message: &str, entities: &DetectedEntities) -> String {
        let evidence = self.gateway.investigate(entities).await;
        self.completer
            .complete(message, prompts::CYBERSEC_SYSTEM_PROMPT, Some(&evidence))
            .await
    }

    async fn general_chat(&self, message: &str) -> String {
        self.completer
            .complete(message, prompts::CYBERSEC_SYSTEM_PROMPT, None)
            .await
    }
}
