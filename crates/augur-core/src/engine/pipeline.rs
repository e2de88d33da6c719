use crate::config::ServiceSettings;
use crate::engine::generator::QueryGenerator;
use crate::errors::ServiceError;
use crate::model::{AnswerResult, CurrentUser};
use crate::recommend::NextQuestionRecommender;
use crate::serialize;
use crate::session::{ContextAssembler, PersonaResolver};
use crate::storage::Store;
use crate::summary::Summarizer;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const DEFAULT_WORKERS: usize = 10;

/// Answer pipeline: cache check, follow-up recommendation, query
/// generation, post-processing, cache write. One explicitly constructed
/// service object; all collaborators are injected.
#[derive(Clone)]
pub struct Pipeline {
    store: Store,
    generator: QueryGenerator,
    recommender: NextQuestionRecommender,
    summarizer: Summarizer,
    context: Arc<dyn ContextAssembler>,
    personas: Arc<dyn PersonaResolver>,
    cache_enabled: bool,
    workers: Arc<Semaphore>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        generator: QueryGenerator,
        recommender: NextQuestionRecommender,
        summarizer: Summarizer,
        context: Arc<dyn ContextAssembler>,
        personas: Arc<dyn PersonaResolver>,
        settings: &ServiceSettings,
    ) -> Self {
        let workers = settings.workers.unwrap_or(DEFAULT_WORKERS).max(1);
        Self {
            store,
            generator,
            recommender,
            summarizer,
            context,
            personas,
            cache_enabled: settings.cache.unwrap_or(true),
            workers: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Runs the question through a bounded worker. The work is spawned with
    /// an owned permit, so dropping the returned future does not cancel an
    /// in-flight answer.
    pub async fn answer(
        &self,
        question: &str,
        session_id: &str,
        user: &CurrentUser,
    ) -> Result<AnswerResult, ServiceError> {
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| unavailable("worker pool", anyhow::Error::new(e)))?;

        let this = self.clone();
        let question = question.to_string();
        let session_id = session_id.to_string();
        let user = user.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            this.process(&question, &session_id, &user).await
        });

        match handle.await {
            Ok(res) => res,
            Err(e) => Err(unavailable("worker task", anyhow::Error::new(e))),
        }
    }

    async fn process(
        &self,
        question: &str,
        session_id: &str,
        user: &CurrentUser,
    ) -> Result<AnswerResult, ServiceError> {
        let persona = self
            .personas
            .persona(session_id, user)
            .await
            .map_err(|e| unavailable("session layer", e))?
            .ok_or_else(|| ServiceError::PersonaNotFound {
                session_id: session_id.to_string(),
            })?;

        let context = self
            .context
            .session_context(&user.id, session_id)
            .await
            .map_err(|e| unavailable("session layer", e))?;

        if self.cache_enabled {
            if let Some(hit) = self
                .store
                .cache_get(question)
                .map_err(|e| unavailable("answer cache", e))?
            {
                tracing::info!(session_id, "answer cache hit");
                return Ok(hit);
            }
            tracing::debug!(session_id, persona = %persona, "answer cache miss");
        }

        let next_question = self
            .recommender
            .recommend(question, &persona)
            .await
            .map_err(|e| unavailable("recommender", e))?;

        let generated = self.generator.generate(question, &context).await;

        let result = match generated.table {
            Some(table) => {
                let summary = self.summarizer.summarize(question, &table).await;
                let records = serialize::table_records(&table);
                AnswerResult::SqlResponse {
                    query: generated.query,
                    records,
                    columns: table.columns,
                    summary,
                    next_question,
                }
            }
            None => AnswerResult::Text {
                content: generated.message,
                next_question,
            },
        };

        if self.cache_enabled {
            self.store
                .cache_put(question, &result)
                .map_err(|e| unavailable("answer cache", e))?;
        }
        Ok(result)
    }
}

/// Every 500-equivalent leaves a trace before it surfaces.
fn unavailable(stage: &'static str, e: anyhow::Error) -> ServiceError {
    tracing::error!(stage, error = ?e, "upstream dependency unavailable");
    ServiceError::Unavailable(e)
}
