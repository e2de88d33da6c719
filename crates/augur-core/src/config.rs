use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: u32,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub workers: Option<usize>,
    pub max_attempts: Option<u32>,
    pub timeout_seconds: Option<u64>,
    pub cache: Option<bool>,
    pub db: Option<PathBuf>,
}

impl ServiceSettings {
    pub fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| PathBuf::from(".augur/augur.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub deployment: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub data_db: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            deployment: "gpt-4".to_string(),
            temperature: None,
            max_tokens: None,
            data_db: None,
        }
    }
}

impl EngineSettings {
    pub fn data_db_path(&self) -> PathBuf {
        self.data_db
            .clone()
            .unwrap_or_else(|| PathBuf::from("data/warehouse.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dims: Option<usize>,
    pub base_url: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            dims: None,
            base_url: None,
        }
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    let cfg: AppConfig = serde_yaml::from_str(&raw)
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, include_str!("../../../augur.yaml"))
        .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
