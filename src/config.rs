use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable holding the voice provider API key.
pub const PROVIDER_API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

/// Environment variable holding the bootstrap administrator password.
pub const ADMIN_PASSWORD_ENV: &str = "VOXGATE_ADMIN_PASSWORD";

/// Used when neither the config file nor the environment provide one.
pub const FALLBACK_ADMIN_PASSWORD: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub provider: ProviderConfig,

    pub credentials: CredentialsConfig,

    pub security: SecurityConfig,

    pub history: HistoryConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Idle minutes before a session expires.
    pub session_idle_minutes: i64,

    /// Largest accepted upload for voice conversion, in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8501,
            cors_allowed_origins: vec![
                "http://localhost:8501".to_string(),
                "http://127.0.0.1:8501".to_string(),
            ],
            secure_cookies: true,
            session_idle_minutes: 60,
            max_upload_mb: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,

    /// Prefer supplying this through `ELEVENLABS_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub request_timeout_seconds: u64,

    /// How long the voice list is reused before asking the provider again.
    pub voices_cache_ttl_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: None,
            request_timeout_seconds: 60,
            voices_cache_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// JSON file holding user records. `None` keeps users in memory only.
    pub path: Option<String>,

    pub default_admin_username: String,

    /// Prefer supplying this through `VOXGATE_ADMIN_PASSWORD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_admin_password: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: Some("data/users.json".to_string()),
            default_admin_username: "admin".to_string(),
            default_admin_password: None,
        }
    }
}

impl CredentialsConfig {
    /// Password for the bootstrap administrator, falling back to the well-known default.
    /// A blank configured value counts as unset.
    #[must_use]
    pub fn admin_password(&self) -> &str {
        self.default_admin_password
            .as_deref()
            .filter(|password| !password.trim().is_empty())
            .unwrap_or(FALLBACK_ADMIN_PASSWORD)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Records returned by the history endpoint when no limit is given.
    pub recent_limit: usize,

    /// Upper bound accepted for the `limit` query parameter.
    pub max_limit: usize,

    /// Records kept per user, audio included. Older ones are dropped on append.
    pub retain_per_user: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recent_limit: crate::constants::history::DEFAULT_RECENT_LIMIT,
            max_limit: 50,
            retain_per_user: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets from the environment take precedence over the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env(PROVIDER_API_KEY_ENV) {
            self.provider.api_key = Some(key);
        }

        if let Some(password) = non_empty_env(ADMIN_PASSWORD_ENV) {
            self.credentials.default_admin_password = Some(password);
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("voxgate").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".voxgate").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.base_url.trim().is_empty() {
            anyhow::bail!("Provider base URL cannot be empty");
        }

        if self.credentials.default_admin_username.trim().is_empty() {
            anyhow::bail!("Default admin username cannot be empty");
        }

        if self.history.recent_limit == 0 || self.history.recent_limit > self.history.max_limit {
            anyhow::bail!(
                "history.recent_limit must be between 1 and history.max_limit ({})",
                self.history.max_limit
            );
        }

        if self.history.retain_per_user < self.history.max_limit {
            anyhow::bail!(
                "history.retain_per_user must be at least history.max_limit ({})",
                self.history.max_limit
            );
        }

        if self.server.session_idle_minutes <= 0 {
            anyhow::bail!("Session idle timeout must be > 0 minutes");
        }

        if self.provider.api_key.is_none() {
            warn!(
                "No voice provider API key configured; set {} to enable generation",
                PROVIDER_API_KEY_ENV
            );
        }

        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
