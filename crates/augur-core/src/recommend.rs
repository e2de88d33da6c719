use crate::embeddings;
use crate::providers::embedder::Embedder;
use crate::storage::Store;
use std::sync::Arc;

/// Suggests the follow-up question: embed the asked question, find the
/// closest stored question within the persona, then take its id successor,
/// wrapping around to the persona's first question at the end of the list.
#[derive(Clone)]
pub struct NextQuestionRecommender {
    store: Store,
    embedder: Arc<dyn Embedder>,
}

impl NextQuestionRecommender {
    pub fn new(store: Store, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// `Ok(None)` means "no suggestion", covering both an empty persona and
    /// a degraded read (corrupt blob, dimension mismatch). Errors are real
    /// outages: store or embedder unreachable.
    pub async fn recommend(&self, question: &str, persona: &str) -> anyhow::Result<Option<String>> {
        let rows = self.store.questions_with_embeddings(persona)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let query_vec = self.embedder.embed_one(question).await?;

        // ascending id scan with strict-greater comparison: ties keep the
        // lowest id
        let mut best: Option<(i64, f64)> = None;
        for row in &rows {
            let stored = match embeddings::decode_f32(&row.embedding) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        persona,
                        question_id = row.id,
                        error = %e,
                        "corrupt stored embedding, skipping suggestions"
                    );
                    return Ok(None);
                }
            };
            if stored.len() as i64 != row.dims {
                tracing::warn!(
                    persona,
                    question_id = row.id,
                    stored = stored.len(),
                    declared = row.dims,
                    "embedding dims disagree with stored value, skipping suggestions"
                );
                return Ok(None);
            }
            let score = match embeddings::cosine_similarity(&query_vec, &stored) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(
                        persona,
                        question_id = row.id,
                        error = %e,
                        "embedding comparison failed, skipping suggestions"
                    );
                    return Ok(None);
                }
            };
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((row.id, score));
            }
        }

        let Some((match_id, _)) = best else {
            return Ok(None);
        };

        let next = match self.store.question_after(persona, match_id)? {
            Some(q) => Some(q.question),
            None => self.store.first_question(persona)?.map(|q| q.question),
        };
        Ok(next)
    }
}
