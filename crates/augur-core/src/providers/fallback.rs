use crate::providers::llm::ChatClient;
use async_trait::async_trait;
use std::sync::Arc;

/// Reply used when even the fallback model cannot be reached.
pub const APOLOGY: &str =
    "I wasn't able to answer that question right now. Please try rephrasing it or ask something else.";

/// Produces the conversational reply when query generation gave up. The
/// signature is infallible on purpose: implementations absorb their own
/// failures.
#[async_trait]
pub trait FallbackResponder: Send + Sync {
    async fn respond(&self, question: &str, failure: &str, context: &str) -> String;
}

pub struct LlmFallback {
    chat: Arc<dyn ChatClient>,
}

impl LlmFallback {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl FallbackResponder for LlmFallback {
    async fn respond(&self, question: &str, failure: &str, context: &str) -> String {
        let system = "You are a data assistant. The query engine could not produce a result \
                      for the user's question. Apologize briefly, say what you can about why, \
                      and suggest a sharper way to ask. Plain text, two sentences at most.";
        let user = format!(
            "Question: {}\nWhat went wrong: {}\nConversation so far:\n{}",
            question, failure, context
        );

        match self.chat.complete(system, &user).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => APOLOGY.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "fallback model unreachable, using canned reply");
                APOLOGY.to_string()
            }
        }
    }
}
