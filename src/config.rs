use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required environment variables were not provided.
    #[error("Missing environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Chunk overlap must leave room for the window to advance.
    #[error("CHUNK_OVERLAP ({chunk_overlap}) must be smaller than CHUNK_SIZE ({chunk_size})")]
    OverlapExceedsChunkSize {
        /// Configured chunk size in characters.
        chunk_size: usize,
        /// Configured overlap in characters.
        chunk_overlap: usize,
    },
}

/// Runtime configuration for the ragserve process.
#[derive(Debug)]
pub struct Config {
    /// API key for the hosted embedding and chat provider.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Base URL of the Supabase project hosting the vector store.
    pub supabase_url: String,
    /// Service-role key used for PostgREST requests.
    pub supabase_service_key: String,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Chat model used for answer generation.
    pub chat_model: String,
    /// Exclusive similarity lower bound applied during retrieval.
    pub match_threshold: f32,
    /// Maximum number of chunks retrieved per query.
    pub match_count: usize,
    /// HTTP server port.
    pub server_port: u16,
    /// Request timeout applied to embedding and store calls, in seconds.
    pub provider_timeout_secs: u64,
}

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    ///
    /// All missing required variables are reported together so a fresh
    /// deployment can be fixed in one pass.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let openai_api_key = require_env("OPENAI_API_KEY", &mut missing);
        let supabase_url = require_env("SUPABASE_URL", &mut missing);
        let supabase_service_key = require_env("SUPABASE_SERVICE_KEY", &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }

        let config = Self {
            openai_api_key: openai_api_key.unwrap_or_default(),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            supabase_url: supabase_url.unwrap_or_default(),
            supabase_service_key: supabase_service_key.unwrap_or_default(),
            chunk_size: parse_env_or("CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_env_or("CHUNK_OVERLAP", 200)?,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", 1536)?,
            chat_model: load_env_optional("CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            match_threshold: parse_env_or("MATCH_THRESHOLD", 0.0)?,
            match_count: parse_env_or("MATCH_COUNT", 3)?,
            server_port: parse_env_or("SERVER_PORT", 8000)?,
            provider_timeout_secs: parse_env_or("PROVIDER_TIMEOUT_SECS", 30)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that cannot be expressed by parsing alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapExceedsChunkSize {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            });
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(ConfigError::InvalidValue("MATCH_THRESHOLD".to_string()));
        }
        if self.match_count == 0 {
            return Err(ConfigError::InvalidValue("MATCH_COUNT".to_string()));
        }
        Ok(())
    }
}

fn require_env(key: &str, missing: &mut Vec<String>) -> Option<String> {
    match load_env_optional(key) {
        Some(value) => Some(value),
        None => {
            missing.push(key.to_string());
            None
        }
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Exits the process when required variables are absent or invalid so
/// misconfiguration surfaces at startup rather than at first request.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Configuration error: {error}");
            std::process::exit(1);
        }
    };
    tracing::debug!(
        supabase_url = %config.supabase_url,
        embedding_model = %config.embedding_model,
        chat_model = %config.chat_model,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        server_port = config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
