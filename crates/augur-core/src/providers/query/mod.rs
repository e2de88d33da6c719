use crate::model::Table;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Transient or defective output; another attempt may succeed.
    #[error("query backend error: {0:#}")]
    Backend(anyhow::Error),
    /// The engine declined the question; retrying will not help.
    #[error("question not answerable as a query: {0}")]
    Unsupported(String),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Backend(_))
    }
}

#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub query: String,
    pub table: Table,
}

/// Turns a natural-language question into a query and runs it. May be slow,
/// may fail, may legitimately return an empty table.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn run(&self, question: &str, context: &str) -> Result<EngineOutput, EngineError>;
    fn engine_name(&self) -> &'static str;
}

pub mod sql_llm;
