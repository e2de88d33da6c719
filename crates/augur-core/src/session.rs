use crate::model::CurrentUser;
use async_trait::async_trait;

/// Assembles the conversation context string for a session. Owned by the
/// (external) session layer; a failure here means that layer is down.
/// Session and user ids are opaque strings minted by that layer.
#[async_trait]
pub trait ContextAssembler: Send + Sync {
    async fn session_context(&self, user_id: &str, session_id: &str) -> anyhow::Result<String>;
}

/// Resolves the persona a session is scoped to. `Ok(None)` covers both a
/// missing session and a session the caller does not own.
#[async_trait]
pub trait PersonaResolver: Send + Sync {
    async fn persona(&self, session_id: &str, user: &CurrentUser)
        -> anyhow::Result<Option<String>>;
}
