//! Language-model completion for chat replies.
//!
//! [`CompletionService`] is the raw, fallible model call. [`Completer`]
//! wraps it with the prompt contract used by the dialogue controller:
//! persona as the system message, user text plus optional evidence as the
//! user message, and a fixed apology instead of an error on any failure.

mod openrouter;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, instrument};

use cybvector_shared::{Evidence, Result};

pub use openrouter::OpenRouterClient;

/// Reply sent to the user whenever the model call fails.
pub const APOLOGY: &str = "Sorry, I encountered an error while communicating with the AI model. \
                           Please try again later.";

/// Separator placed between the user text and the rendered evidence.
const EVIDENCE_HEADER: &str = "Here is the evidence from my tools:";

/// A text-generation backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate a reply for `user` under the `system` instruction.
    async fn generate(&self, system: &str, user: &str) -> Result<String>;

    /// Model identifier for logs.
    fn model(&self) -> &str;
}

/// Build the user message: the text, then the evidence block if any.
pub fn build_user_prompt(user_text: &str, evidence: Option<&Evidence>) -> String {
    match evidence {
        Some(evidence) if !evidence.is_empty() => {
            format!("{user_text}\n\n{EVIDENCE_HEADER}\n{}", evidence.render())
        }
        _ => user_text.to_string(),
    }
}

/// Never-failing front for a [`CompletionService`].
#[derive(Clone)]
pub struct Completer {
    service: Arc<dyn CompletionService>,
}

impl Completer {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Produce a reply. Any failure is logged and replaced by [`APOLOGY`].
    /// Single attempt, no retries.
    #[instrument(skip_all, fields(model = %self.service.model(), evidence = evidence.map_or(0, Evidence::len)))]
    pub async fn complete(
        &self,
        user_text: &str,
        system_prompt: &str,
        evidence: Option<&Evidence>,
    ) -> String {
        let prompt = build_user_prompt(user_text, evidence);
        match self.service.generate(system_prompt, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "model call failed");
                APOLOGY.to_string()
            }
        }
    }
}
