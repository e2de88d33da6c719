use async_trait::async_trait;

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String>;
    fn provider_name(&self) -> &'static str;
}

pub mod azure;
