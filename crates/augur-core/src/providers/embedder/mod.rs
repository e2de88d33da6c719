use async_trait::async_trait;

/// Batch text embedder. A fixed model and version must embed the same text
/// to the same vector, the nearest-neighbor search depends on it.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
    fn model_id(&self) -> String;
    fn dims(&self) -> usize;

    async fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let batch = [text.to_string()];
        let mut vecs = self.embed(&batch).await?;
        vecs.pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for input"))
    }
}

pub mod http;
