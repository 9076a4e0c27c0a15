//! Error types for the Pearl core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering generation, search, storage, configuration, research and the
//! auto-runner.

use std::path::PathBuf;

/// Top-level error type for the Pearl core library.
#[derive(Debug, thiserror::Error)]
pub enum PearlError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Research error: {0}")]
    Research(#[from] ResearchError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PearlError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Errors from generative text provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from the web search provider.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Missing search API key (env var '{var}' not set)")]
    MissingApiKey { var: String },

    #[error("Search request failed: {message}")]
    Request { message: String },

    #[error("Search API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Search response parse error: {message}")]
    ResponseParse { message: String },
}

/// Errors from the row and blob stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown table '{table}'")]
    UnknownTable { table: String },

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Row {row} out of range in table '{table}'")]
    RowOutOfRange { table: String, row: usize },

    #[error("Version conflict on '{key}': expected {expected:?}, found {found:?}")]
    VersionConflict {
        key: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("Invalid blob key '{key}'")]
    InvalidKey { key: String },

    #[error("Corrupt record in '{location}': {message}")]
    Corrupt { location: String, message: String },

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the research pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("Unknown country code: {code}")]
    UnknownCountry { code: String },

    #[error("Invalid verification transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Model failed to generate a JSON pack")]
    PackGeneration,
}

/// Errors from the auto-runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Runner is {status}, not RUNNING")]
    NotRunning { status: String },

    #[error("Cursor moved: expected {expected}, found {found}")]
    CursorMismatch { expected: usize, found: usize },
}

/// A type alias for results using the top-level `PearlError`.
pub type Result<T> = std::result::Result<T, PearlError>;
