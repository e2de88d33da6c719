use super::Embedder;
use crate::config::EmbeddingSettings;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/v1";
pub const DEFAULT_DIMS: usize = 384;

/// Client for an OpenAI-compatible `/embeddings` endpoint (a local
/// sentence-transformers server in the usual deployment).
pub struct HttpEmbedder {
    pub model: String,
    pub base_url: String,
    pub dims: usize,
    pub api_key: Option<String>,
    pub client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(model: String, base_url: String, dims: usize) -> Self {
        Self {
            model,
            base_url,
            dims,
            api_key: std::env::var("EMBEDDINGS_API_KEY").ok(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self::new(
            settings.model.clone(),
            settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            settings.dims.unwrap_or(DEFAULT_DIMS),
        )
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("embeddings API error ({}): {}", status, error_text);
        }

        let json: serde_json::Value = resp.json().await?;
        parse_embeddings_response(&json, texts.len(), self.dims)
    }

    fn model_id(&self) -> String {
        self.model.clone()
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Strict decode of an OpenAI-style embeddings payload. A malformed
/// component is an error, never a silent zero.
fn parse_embeddings_response(
    body: &serde_json::Value,
    expected: usize,
    dims: usize,
) -> anyhow::Result<Vec<Vec<f32>>> {
    let data = body
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("embeddings API response missing data array"))?;

    let mut out = Vec::with_capacity(data.len());
    for item in data {
        let arr = item
            .get("embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("embeddings API item missing embedding"))?;
        let mut vec = Vec::with_capacity(arr.len());
        for x in arr {
            let f = x.as_f64().ok_or_else(|| {
                anyhow::anyhow!("embeddings API returned a non-numeric component: {}", x)
            })?;
            vec.push(f as f32);
        }
        if vec.len() != dims {
            anyhow::bail!("embeddings API returned {} dims (expected {})", vec.len(), dims);
        }
        out.push(vec);
    }
    if out.len() != expected {
        anyhow::bail!(
            "embeddings API returned {} vectors for {} inputs",
            out.len(),
            expected
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_well_formed_payload() -> anyhow::Result<()> {
        let body = json!({
            "data": [
                { "embedding": [0.1, 0.2, 0.3] },
                { "embedding": [0.4, 0.5, 0.6] },
            ]
        });
        let vecs = parse_embeddings_response(&body, 2, 3)?;
        assert_eq!(vecs.len(), 2);
        assert!((vecs[1][0] - 0.4).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn rejects_non_numeric_component() {
        let body = json!({
            "data": [ { "embedding": [0.1, "oops", 0.3] } ]
        });
        let err = parse_embeddings_response(&body, 1, 3).unwrap_err();
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn rejects_null_component() {
        let body = json!({
            "data": [ { "embedding": [0.1, null, 0.3] } ]
        });
        assert!(parse_embeddings_response(&body, 1, 3).is_err());
    }

    #[test]
    fn rejects_wrong_dims_and_count() {
        let short = json!({ "data": [ { "embedding": [0.1, 0.2] } ] });
        assert!(parse_embeddings_response(&short, 1, 3).is_err());

        let missing = json!({ "data": [ { "embedding": [0.1, 0.2, 0.3] } ] });
        assert!(parse_embeddings_response(&missing, 2, 3).is_err());
    }

    #[test]
    fn rejects_missing_data_array() {
        assert!(parse_embeddings_response(&json!({ "error": "rate limited" }), 1, 3).is_err());
    }
}
