//! Application configuration for CybVector.
//!
//! User config lives at `~/.cybvector/cybvector.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file: each backend names the
//! environment variable that holds its key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CybVectorError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "cybvector.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".cybvector";

// ---------------------------------------------------------------------------
// Config structs (matching cybvector.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Language-model settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Reputation lookup backends.
    #[serde(default)]
    pub reputation: ReputationConfig,

    /// In-memory session table bounds.
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow any origin, method and header (browser front-ends on other hosts).
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: true,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_true() -> bool {
    true
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_completion_key_env(),
            model: default_model(),
            base_url: default_completion_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_completion_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_completion_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_timeout_secs() -> u64 {
    15
}

/// `[reputation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Per-request timeout shared by all lookup backends.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Report window passed to AbuseIPDB (`maxAgeInDays`).
    #[serde(default = "default_abuse_max_age")]
    pub abuse_max_age_days: u32,

    #[serde(default = "default_virustotal")]
    pub virustotal: BackendConfig,

    #[serde(default = "default_abuseipdb")]
    pub abuseipdb: BackendConfig,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            abuse_max_age_days: default_abuse_max_age(),
            virustotal: default_virustotal(),
            abuseipdb: default_abuseipdb(),
        }
    }
}

fn default_abuse_max_age() -> u32 {
    90
}
fn default_virustotal() -> BackendConfig {
    BackendConfig {
        api_key_env: "VIRUSTOTAL_API_KEY".into(),
        base_url: "https://www.virustotal.com/api/v3".into(),
    }
}
fn default_abuseipdb() -> BackendConfig {
    BackendConfig {
        api_key_env: "ABUSEIPDB_API_KEY".into(),
        base_url: "https://api.abuseipdb.com/api/v2".into(),
    }
}

/// `[reputation.virustotal]` / `[reputation.abuseipdb]` entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    /// API root, without trailing slash.
    pub base_url: String,
}

/// `[sessions]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Idle time after which a session is forgotten.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Upper bound on live sessions; least recently used are evicted first.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_session_ttl() -> u64 {
    3600
}
fn default_max_sessions() -> usize {
    10_000
}

// ---------------------------------------------------------------------------
// Credentials (resolved once at startup)
// ---------------------------------------------------------------------------

/// Whether a backend has a usable credential.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Available { api_key: String },
    Unconfigured,
}

impl BackendStatus {
    fn from_value(value: Option<String>) -> Self {
        match value {
            Some(key) if !key.trim().is_empty() => Self::Available {
                api_key: key.trim().to_string(),
            },
            _ => Self::Unconfigured,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    pub fn api_key(&self) -> Option<&str> {
        match self {
            Self::Available { api_key } => Some(api_key),
            Self::Unconfigured => None,
        }
    }
}

// Keys must never end up in logs.
impl std::fmt::Debug for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available { .. } => f.write_str("Available(<redacted>)"),
            Self::Unconfigured => f.write_str("Unconfigured"),
        }
    }
}

/// Credentials for every external backend, read from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub completion: BackendStatus,
    pub virustotal: BackendStatus,
    pub abuseipdb: BackendStatus,
}

impl Credentials {
    /// Resolve all credentials from process environment variables.
    pub fn from_env(config: &AppConfig) -> Self {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve credentials through an arbitrary variable lookup.
    pub fn resolve_with(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let credentials = Self {
            completion: BackendStatus::from_value(lookup(&config.completion.api_key_env)),
            virustotal: BackendStatus::from_value(lookup(&config.reputation.virustotal.api_key_env)),
            abuseipdb: BackendStatus::from_value(lookup(&config.reputation.abuseipdb.api_key_env)),
        };

        for (name, status, var) in [
            ("VirusTotal", &credentials.virustotal, &config.reputation.virustotal.api_key_env),
            ("AbuseIPDB", &credentials.abuseipdb, &config.reputation.abuseipdb.api_key_env),
        ] {
            if !status.is_available() {
                tracing::warn!(backend = name, env_var = %var, "no API key set, lookups disabled");
            }
        }

        credentials
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.cybvector/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CybVectorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.cybvector/cybvector.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CybVectorError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        CybVectorError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate(&config)?;
    Ok(config)
}

/// Reject values that would make the service unusable.
fn validate(config: &AppConfig) -> Result<()> {
    if config.sessions.max_sessions == 0 {
        return Err(CybVectorError::config("sessions.max_sessions must be at least 1"));
    }
    for (name, base) in [
        ("completion.base_url", &config.completion.base_url),
        ("reputation.virustotal.base_url", &config.reputation.virustotal.base_url),
        ("reputation.abuseipdb.base_url", &config.reputation.abuseipdb.base_url),
    ] {
        url::Url::parse(base)
            .map_err(|e| CybVectorError::config(format!("{name} '{base}' is not a URL: {e}")))?;
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CybVectorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CybVectorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CybVectorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the completion API key is available and return it.
pub fn validate_api_key(credentials: &Credentials, config: &AppConfig) -> Result<String> {
    match credentials.completion.api_key() {
        Some(key) => Ok(key.to_string()),
        None => Err(CybVectorError::config(format!(
            "model API key not found. Set the {} environment variable.",
            config.completion.api_key_env
        ))),
    }
}
