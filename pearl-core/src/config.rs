//! Configuration system for Pearl.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/pearl/config.toml` and/or `.pearl/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Top-level configuration for Pearl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PearlConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub research: ResearchConfig,
    pub verification: VerificationConfig,
    pub store: StoreConfig,
    pub gateway: GatewayConfig,
    pub retry: RetryConfig,
}

/// Generative text provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name. Only "gemini" is built in.
    pub provider: String,
    /// Model identifier (e.g., "gemini-2.0-flash-exp").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key. Takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Whether an API key is available from config or environment.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || std::env::var(&self.api_key_env).is_ok()
    }
}

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Provider name. Only "serper" is built in.
    pub provider: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key. Takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the search endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "serper".to_string(),
            api_key_env: "SERPER_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 15,
        }
    }
}

impl SearchConfig {
    /// Whether an API key is available from config or environment.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || std::env::var(&self.api_key_env).is_ok()
    }
}

/// Fan-out, synthesis and shortlist settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Result cap per fan-out query.
    pub results_per_query: usize,
    /// Maximum number of search results embedded in the synthesis prompt.
    pub context_budget: usize,
    /// Lower bound of the randomized pause between fan-out queries.
    pub query_delay_min_ms: u64,
    /// Upper bound of the randomized pause between fan-out queries.
    pub query_delay_max_ms: u64,
    /// Market used by topic-mode templates and the saturation check.
    pub focus_market: String,
    /// Search region for the focus market.
    pub focus_region: String,
    /// Number of ideas persisted per run.
    pub shortlist_size: usize,
    /// Whether to run the saturation check on the shortlist.
    pub saturation_check: bool,
    /// Label written to the `run_type` column.
    pub run_type: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            results_per_query: 20,
            context_budget: 75,
            query_delay_min_ms: 1000,
            query_delay_max_ms: 2200,
            focus_market: "Miami".to_string(),
            focus_region: "US".to_string(),
            shortlist_size: 5,
            saturation_check: true,
            run_type: "miami-mvp".to_string(),
        }
    }
}

impl ResearchConfig {
    pub fn query_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.query_delay_min_ms),
            Duration::from_millis(self.query_delay_max_ms),
        )
    }
}

/// Verification sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Maximum number of query strategies tried per idea.
    pub max_attempts: usize,
    /// Result cap per verification query.
    pub results_per_attempt: usize,
    /// Fixed pause between verification search calls.
    pub delay_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            results_per_attempt: 10,
            delay_ms: 1500,
        }
    }
}

/// Where rows and blobs are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the local store. Defaults to the project data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolve the store root, falling back to the platform data directory.
    pub fn resolve_root(&self, workspace: &Path) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        directories::ProjectDirs::from("dev", "pearl", "pearl")
            .map(|d| d.data_dir().join("store"))
            .unwrap_or_else(|| workspace.join(".pearl").join("store"))
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Retry policy for transient generation failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl PearlConfig {
    /// Check for settings that will load but are likely mistakes.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.research.query_delay_min_ms > self.research.query_delay_max_ms {
            warnings.push(format!(
                "research.query_delay_min_ms ({}) exceeds query_delay_max_ms ({}); the minimum is used",
                self.research.query_delay_min_ms, self.research.query_delay_max_ms
            ));
        }

        if self.research.context_budget == 0 {
            warnings.push("research.context_budget is 0; no idea can ever be synthesized".into());
        }

        if self.research.shortlist_size == 0 {
            warnings.push("research.shortlist_size is 0; runs will persist nothing".into());
        }

        if self.verification.max_attempts == 0 {
            warnings.push(
                "verification.max_attempts is 0; single-source ideas always fail verification"
                    .into(),
            );
        }

        if !self.llm.has_api_key() {
            warnings.push(format!(
                "LLM API key not found (set {} or llm.api_key)",
                self.llm.api_key_env
            ));
        }

        if !self.search.has_api_key() {
            warnings.push(format!(
                "Search API key not found (set {} or search.api_key)",
                self.search.api_key_env
            ));
        }

        warnings
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `PEARL_`)
/// 3. Workspace-local config (`.pearl/config.toml`)
/// 4. User config (`~/.config/pearl/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&PearlConfig>,
) -> Result<PearlConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(PearlConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "pearl", "pearl") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".pearl").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // PEARL_RESEARCH__FOCUS_MARKET, PEARL_VERIFICATION__DELAY_MS, etc.
    figment = figment.merge(Env::prefixed("PEARL_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration from an explicit file on top of the defaults and environment.
pub fn load_config_file(path: &Path) -> Result<PearlConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Figment::from(Serialized::defaults(PearlConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PEARL_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Resolve an API key from an explicit value or an environment variable.
pub fn resolve_key(explicit: Option<&str>, env_var: &str) -> Result<String, ConfigError> {
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    match std::env::var(env_var) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(ConfigError::EnvVarMissing {
            var: env_var.to_string(),
        }),
    }
}
