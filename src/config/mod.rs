#[cfg(test)]
mod tests;

use std::env;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

/// Directory the persisted vector index lives in, unless `INDEX_DIR` is set.
pub const DEFAULT_INDEX_DIR: &str = "faiss_index";

const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text:latest";
const DEFAULT_GROQ_MODEL: &str = "llama3-8b-8192";
const DEFAULT_GROQ_TEMPERATURE: f32 = 0.2;
const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub confluence: ConfluenceConfig,
    pub ollama: OllamaConfig,
    pub groq: GroqConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub index_dir: PathBuf,
}

/// Credentials and endpoint for the Confluence REST API.
///
/// Required for ingestion only; the query paths never touch the source.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfluenceConfig {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("Invalid value for {var}: {value}")]
    InvalidEnvValue { var: &'static str, value: String },
    #[error("Invalid Confluence base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid top-k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid chunk size: {0} (must be between 100 and 4096)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// Credential presence is checked per path (`validate_for_ingest`,
    /// `validate_for_query`) so that `status` and `chat` do not demand
    /// crawler credentials they never use.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        let confluence = ConfluenceConfig {
            base_url: env_or_default("CONFLUENCE_BASE_URL", ""),
            username: env_or_default("CONFLUENCE_USERNAME", ""),
            api_token: env_or_default("CONFLUENCE_API_TOKEN", ""),
        };

        let mut ollama = OllamaConfig::default();
        if let Ok(host) = env::var("OLLAMA_HOST") {
            ollama.host = host;
        }
        if let Ok(port) = env::var("OLLAMA_PORT") {
            ollama.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnvValue { var: "OLLAMA_PORT", value: port })?;
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            ollama.model = model;
        }

        let groq = GroqConfig {
            api_key: env_or_default("GROQ_API_KEY", ""),
            model: env_or_default("GROQ_MODEL", DEFAULT_GROQ_MODEL),
            temperature: DEFAULT_GROQ_TEMPERATURE,
        };

        let index_dir = PathBuf::from(env_or_default("INDEX_DIR", DEFAULT_INDEX_DIR));

        let config = Self {
            confluence,
            ollama,
            groq,
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            index_dir,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the settings every path relies on.
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;

        if !(100..=4096).contains(&self.chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.overlap,
                self.chunking.chunk_size,
            ));
        }

        if self.groq.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.groq.model.clone()));
        }
        if !(0.0..=2.0).contains(&self.groq.temperature) {
            return Err(ConfigError::InvalidTemperature(self.groq.temperature));
        }

        if self.retrieval.top_k == 0 || self.retrieval.top_k > 100 {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        Ok(())
    }

    /// Ingestion additionally requires the Confluence credentials.
    #[inline]
    pub fn validate_for_ingest(&self) -> Result<(), ConfigError> {
        if self.confluence.base_url.trim().is_empty() {
            return Err(ConfigError::MissingEnv("CONFLUENCE_BASE_URL"));
        }
        Url::parse(&self.confluence.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.confluence.base_url.clone()))?;
        if self.confluence.username.trim().is_empty() {
            return Err(ConfigError::MissingEnv("CONFLUENCE_USERNAME"));
        }
        if self.confluence.api_token.trim().is_empty() {
            return Err(ConfigError::MissingEnv("CONFLUENCE_API_TOKEN"));
        }
        Ok(())
    }

    /// The query paths additionally require the language-model key.
    #[inline]
    pub fn validate_for_query(&self) -> Result<(), ConfigError> {
        if self.groq.api_key.trim().is_empty() {
            return Err(ConfigError::MissingEnv("GROQ_API_KEY"));
        }
        Ok(())
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

fn env_or_default(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}
