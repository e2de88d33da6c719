use crate::model::Table;
use crate::providers::fallback::FallbackResponder;
use crate::providers::query::{EngineError, EngineOutput, QueryEngine};
use std::sync::Arc;
use tokio::time::{timeout, Duration};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct GeneratePolicy {
    /// Total engine invocations per question, not retries after the first.
    pub max_attempts: u32,
    pub timeout_seconds: Option<u64>,
}

impl Default for GeneratePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout_seconds: None,
        }
    }
}

/// Outcome of query generation. `table` is present only for a non-empty
/// result; otherwise `message` carries the fallback reply.
#[derive(Debug, Clone)]
pub struct Generated {
    pub query: String,
    pub table: Option<Table>,
    pub message: String,
}

/// Retry wrapper around a `QueryEngine`. Never returns an error: when the
/// engine is out of attempts, declines the question, or finds nothing, the
/// fallback responder supplies the reply.
#[derive(Clone)]
pub struct QueryGenerator {
    engine: Arc<dyn QueryEngine>,
    fallback: Arc<dyn FallbackResponder>,
    policy: GeneratePolicy,
}

impl QueryGenerator {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        fallback: Arc<dyn FallbackResponder>,
        policy: GeneratePolicy,
    ) -> Self {
        Self {
            engine,
            fallback,
            policy,
        }
    }

    pub async fn generate(&self, question: &str, context: &str) -> Generated {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut failures: Vec<String> = Vec::new();

        for attempt in 1..=max_attempts {
            match self.attempt(question, context).await {
                Ok(out) if !out.table.is_empty() => {
                    return Generated {
                        query: out.query,
                        table: Some(out.table),
                        message: String::new(),
                    };
                }
                // an empty result is an answer, just not a useful one;
                // retrying the same question would find the same nothing
                Ok(out) => {
                    tracing::info!(attempt, query = %out.query, "query returned no rows, falling back");
                    failures.push(format!("the query `{}` returned no rows", out.query));
                    break;
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(attempt, error = %e, "query generation failed, retrying");
                    failures.push(e.to_string());
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "query generation gave up");
                    failures.push(e.to_string());
                    break;
                }
            }
        }

        let message = self
            .fallback
            .respond(question, &failures.join("; "), context)
            .await;
        Generated {
            query: String::new(),
            table: None,
            message,
        }
    }

    async fn attempt(&self, question: &str, context: &str) -> Result<EngineOutput, EngineError> {
        match self.policy.timeout_seconds {
            Some(t) => {
                let fut = self.engine.run(question, context);
                match timeout(Duration::from_secs(t), fut).await {
                    Ok(res) => res,
                    Err(_) => Err(EngineError::Backend(anyhow::anyhow!(
                        "query engine timed out after {}s",
                        t
                    ))),
                }
            }
            None => self.engine.run(question, context).await,
        }
    }
}
