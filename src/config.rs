//! TOML configuration and credentials.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below. The provider credential is read from the environment
//! (after `.env` loading) and is mandatory.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` (any OpenAI-compatible endpoint) or `"hash"` (offline).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Dimensionality used by the hash provider when `dims` is not set.
pub const DEFAULT_HASH_DIMS: usize = 256;

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            temperature: 0.0,
            max_retries: 0,
            timeout_secs: default_completion_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_completion_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    docchat_core::index::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Approximate token budget per embedded segment; 0 disables splitting.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    /// Environment variable holding the provider API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Config {
    /// Validate cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            bail!("completion.temperature must be in [0.0, 2.0]");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        match self.embedding.provider.as_str() {
            "openai" => {}
            "hash" => {
                if self.embedding.dims == Some(0) {
                    bail!("embedding.dims must be > 0 when provider is 'hash'");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be openai or hash.",
                other
            ),
        }
        if self.credentials.api_key_env.trim().is_empty() {
            bail!("credentials.api_key_env must not be empty");
        }
        Ok(())
    }
}

/// Load configuration from `path`, or defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

/// The provider API key. Debug output never shows the secret.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(***)")
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Read the key from `var`. Missing or blank values are an error.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(Self::new(value.trim())),
            _ => bail!(
                "{} is not set. Export it or add it to a .env file before starting docchat.",
                var
            ),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let cfg = Config::default();
        assert_eq!(cfg.embedding.provider, "openai");
        assert_eq!(cfg.completion.model, "gpt-3.5-turbo");
        assert_eq!(cfg.completion.temperature, 0.0);
        assert_eq!(cfg.retrieval.top_k, 4);
        assert_eq!(cfg.credentials.api_key_env, "OPENAI_API_KEY");
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[retrieval]
top_k = 6

[embedding]
provider = "hash"
dims = 128
"#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.retrieval.top_k, 6);
        assert_eq!(cfg.embedding.dims, Some(128));
        assert_eq!(cfg.chunking.max_tokens, 1000);
        assert_eq!(cfg.server.bind, "127.0.0.1:8501");
    }

    #[test]
    fn rejects_zero_top_k() {
        let cfg: Config = toml::from_str("[retrieval]\ntop_k = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_provider() {
        let cfg: Config = toml::from_str("[embedding]\nprovider = \"faiss\"\n").unwrap();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("Unknown embedding provider"));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let cfg: Config = toml::from_str("[completion]\ntemperature = 3.5\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_credential_is_an_error() {
        let err = Credentials::from_env("DOCCHAT_TEST_SURELY_UNSET_KEY").unwrap_err();
        assert!(err.to_string().contains("DOCCHAT_TEST_SURELY_UNSET_KEY"));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("sk-very-secret");
        assert!(!format!("{:?}", creds).contains("sk-very-secret"));
    }
}
