use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_REGION: &str = "us-central1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
const DEFAULT_GENERATION_MODEL: &str = "gemini-pro-vision";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_COLLECTION: &str = "summaries";
const DEFAULT_SUMMARY_CONCURRENCY: usize = 5;
const DEFAULT_TOP_K: usize = 1;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for a docrag service instance.
///
/// Built once at startup and handed to every component constructor; nothing reads the
/// process environment after this point.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Google Cloud settings used by the Vertex AI adapters.
    pub google: GoogleCloudConfig,
    /// Embedding provider used to vectorize summaries and questions.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Text-generation provider used for summaries and answers.
    pub generation_provider: GenerationProvider,
    /// Generation model identifier passed to the provider.
    pub generation_model: String,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: String,
    /// Backend holding the summary vectors.
    pub vector_index: VectorIndexBackend,
    /// Base URL of the Qdrant instance (required for the `qdrant` backend).
    pub qdrant_url: Option<String>,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Qdrant collection holding summary vectors.
    pub qdrant_collection_name: String,
    /// Maximum number of in-flight summarization calls.
    pub summary_max_concurrency: usize,
    /// Number of summaries resolved per question.
    pub retrieval_top_k: usize,
    /// Upper bound on multipart request bodies.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Project, region and credentials for Vertex AI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleCloudConfig {
    /// Google Cloud project identifier.
    pub project_id: Option<String>,
    /// Vertex AI region, e.g. `us-central1`.
    pub region: String,
    /// API key sent as `x-goog-api-key`.
    pub api_key: Option<String>,
    /// OAuth access token sent as a bearer token; preferred over the API key.
    pub access_token: Option<String>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Vertex AI text embeddings.
    Vertex,
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic local hashing, for offline use.
    Hash,
}

/// Supported text-generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Vertex AI Gemini models.
    Vertex,
    /// Local Ollama runtime.
    Ollama,
}

/// Supported summary vector index backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorIndexBackend {
    /// Process-local index; contents are lost on restart.
    Memory,
    /// Remote Qdrant collection.
    Qdrant,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google: GoogleCloudConfig {
                region: DEFAULT_REGION.to_string(),
                ..GoogleCloudConfig::default()
            },
            embedding_provider: EmbeddingProvider::Vertex,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            generation_provider: GenerationProvider::Vertex,
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            vector_index: VectorIndexBackend::Memory,
            qdrant_url: None,
            qdrant_api_key: None,
            qdrant_collection_name: DEFAULT_COLLECTION.to_string(),
            summary_max_concurrency: DEFAULT_SUMMARY_CONCURRENCY,
            retrieval_top_k: DEFAULT_TOP_K,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            server_port: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment (and an optional `.env` file), validating
    /// provider-specific requirements along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self {
            google: GoogleCloudConfig {
                project_id: load_env_optional("GOOGLE_CLOUD_PROJECT"),
                region: load_env_optional("GOOGLE_CLOUD_REGION")
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
                api_key: load_env_optional("GOOGLE_API_KEY"),
                access_token: load_env_optional("GOOGLE_ACCESS_TOKEN"),
            },
            embedding_provider: parse_env_or("EMBEDDING_PROVIDER", EmbeddingProvider::Vertex)?,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?,
            generation_provider: parse_env_or("GENERATION_PROVIDER", GenerationProvider::Vertex)?,
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            vector_index: parse_env_or("VECTOR_INDEX", VectorIndexBackend::Memory)?,
            qdrant_url: load_env_optional("QDRANT_URL"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            summary_max_concurrency: parse_env_or(
                "SUMMARY_MAX_CONCURRENCY",
                DEFAULT_SUMMARY_CONCURRENCY,
            )?,
            retrieval_top_k: parse_env_or("RETRIEVAL_TOP_K", DEFAULT_TOP_K)?,
            max_upload_bytes: parse_env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };
        config.validate()?;
        tracing::debug!(
            project = ?config.google.project_id,
            region = %config.google.region,
            embedding_provider = ?config.embedding_provider,
            generation_provider = ?config.generation_provider,
            vector_index = ?config.vector_index,
            server_port = ?config.server_port,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Check cross-field requirements that a single variable cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let uses_vertex = self.embedding_provider == EmbeddingProvider::Vertex
            || self.generation_provider == GenerationProvider::Vertex;
        if uses_vertex && self.google.project_id.is_none() {
            return Err(ConfigError::MissingVariable("GOOGLE_CLOUD_PROJECT".into()));
        }
        if self.vector_index == VectorIndexBackend::Qdrant && self.qdrant_url.is_none() {
            return Err(ConfigError::MissingVariable("QDRANT_URL".into()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.summary_max_concurrency == 0 {
            return Err(ConfigError::InvalidValue("SUMMARY_MAX_CONCURRENCY".into()));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".into()));
        }
        Ok(())
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vertex" | "vertexai" => Ok(Self::Vertex),
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vertex" | "vertexai" => Ok(Self::Vertex),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for VectorIndexBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(()),
        }
    }
}
