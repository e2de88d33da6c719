use thiserror::Error;

#[derive(Debug, Error)]
#[error("config error: {0}")]
pub struct ConfigError(pub String);

/// Errors the answer pipeline surfaces to its caller. Generation and
/// summarization failures are recovered inside the pipeline and never
/// appear here.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no persona configured for session {session_id}")]
    PersonaNotFound { session_id: String },

    #[error("upstream unavailable: {0:#}")]
    Unavailable(anyhow::Error),
}

impl ServiceError {
    /// HTTP status the (external) routing layer should map this to.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::PersonaNotFound { .. } => 404,
            ServiceError::Unavailable(_) => 500,
        }
    }
}
