use super::ChatClient;
use crate::config::EngineSettings;
use crate::errors::ConfigError;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_API_VERSION: &str = "2024-02-01";

pub struct AzureChatClient {
    pub deployment: String,
    pub endpoint: String,
    pub api_version: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub client: reqwest::Client,
}

impl AzureChatClient {
    pub fn new(
        deployment: String,
        endpoint: String,
        api_version: String,
        api_key: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            deployment,
            endpoint,
            api_version,
            api_key,
            temperature,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    /// Key and endpoint come from the environment, never from YAML.
    pub fn from_env(settings: &EngineSettings) -> Result<Self, ConfigError> {
        let api_key = std::env::var("AZURE_OPENAI_API_KEY")
            .map_err(|_| ConfigError("AZURE_OPENAI_API_KEY is not set".into()))?;
        let endpoint = std::env::var("AZURE_OPENAI_ENDPOINT")
            .map_err(|_| ConfigError("AZURE_OPENAI_ENDPOINT is not set".into()))?;
        let api_version = std::env::var("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        Ok(Self::new(
            settings.deployment.clone(),
            endpoint,
            api_version,
            api_key,
            settings.temperature.unwrap_or(0.2),
            settings.max_tokens.unwrap_or(800),
        ))
    }
}

#[async_trait]
impl ChatClient for AzureChatClient {
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        );

        let body = json!({
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let resp = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Azure chat API error ({}): {}", status, error_text);
        }

        let json: serde_json::Value = resp.json().await?;
        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Azure chat API response missing content"))?
            .to_string();

        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "azure"
    }
}
