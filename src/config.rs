use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration loaded from settings.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub router: RouterConfig,
}

/// Which HTTP API a provider speaks
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Openai,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_openai_url")]
    pub url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dims() -> usize {
    1536 // text-embedding-3-small
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Openai,
            url: default_openai_url(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_openai_url")]
    pub url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Openai,
            url: default_openai_url(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default = "default_drive_url")]
    pub drive_url: String,
    #[serde(default = "default_docs_url")]
    pub docs_url: String,
    /// Pre-issued OAuth bearer token
    #[serde(default)]
    pub access_token: Option<String>,
    /// Files requested per listing page; listings follow every page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_drive_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_docs_url() -> String {
    "https://docs.googleapis.com/v1".to_string()
}

fn default_page_size() -> usize {
    50
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            drive_url: default_drive_url(),
            docs_url: default_docs_url(),
            access_token: None,
            page_size: default_page_size(),
        }
    }
}

/// Chunking policy, measured in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Embedding requests in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_concurrency() -> usize {
    4
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound on every external call made while resolving or indexing
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_context_chars() -> usize {
    6000
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            timeout_secs: default_timeout_secs(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration from default location or return defaults
    pub fn load() -> Result<Self> {
        let default_paths = [
            PathBuf::from("config/settings.toml"),
            PathBuf::from(shellexpand::tilde("~/.config/docrouter/settings.toml").as_ref()),
        ];

        for path in &default_paths {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Get the embeddings API key from config or environment variable
    pub fn embeddings_api_key(&self) -> Option<String> {
        self.embeddings
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    /// Get the completion API key from config or environment variable
    pub fn llm_api_key(&self) -> Option<String> {
        self.llm
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    /// Get the Drive bearer token from config or environment variable
    pub fn drive_access_token(&self) -> Option<String> {
        self.drive
            .access_token
            .clone()
            .or_else(|| std::env::var("GOOGLE_ACCESS_TOKEN").ok())
    }
}
