use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

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

/// Runtime configuration for the PDF knowledge base.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores page vectors.
    pub qdrant_url: String,
    /// Name of the Qdrant collection holding the knowledge base.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// URL of the OpenAI-compatible embeddings endpoint.
    pub embedding_url: String,
    /// Optional bearer token for the embedding service.
    pub embedding_api_key: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors; both named vector spaces
    /// in the collection share this size.
    pub embedding_dimension: usize,
    /// Base URL of the OpenAI-compatible chat-completion endpoint used
    /// for page summaries and image descriptions.
    pub llm_base_url: String,
    /// Optional bearer token for the chat-completion endpoint.
    pub llm_api_key: Option<String>,
    /// Model used for page summarization.
    pub llm_model: String,
    /// Optional vision-capable model for image descriptions. When unset,
    /// image analysis is disabled regardless of `analyze_images`.
    pub vision_model: Option<String>,
    /// Whether ingestion should describe embedded images via the vision
    /// model. Defaults to false.
    pub analyze_images: bool,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_url: load_env("EMBEDDING_URL")?,
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            llm_base_url: load_env("LLM_BASE_URL")?,
            llm_api_key: load_env_optional("LLM_API_KEY"),
            llm_model: load_env("LLM_MODEL")?,
            vision_model: load_env_optional("VISION_MODEL"),
            analyze_images: load_env_optional("ANALYZE_IMAGES")
                .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_model = %config.embedding_model,
        embedding_dimension = config.embedding_dimension,
        llm_model = %config.llm_model,
        analyze_images = config.analyze_images,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
