use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per page fetch (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.25,
            max_delay_secs: 10,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/lvd/config.toml`.
///
/// Credentials are deliberately absent: the secret is never written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LvdConfig {
    /// Origin of the learning platform (course pages, viewer pages, login entry).
    pub platform_origin: String,
    /// Origin of the SSO identity provider.
    pub sso_origin: String,
    /// Application id sent with every SSO form.
    pub app_id: String,
    /// User-Agent header for all platform requests.
    pub user_agent: String,
    /// Timeout for login and listing requests, in seconds.
    pub request_timeout_secs: u64,
    /// Timeout for the authenticated fallback fetch of a media payload, in seconds.
    pub payload_timeout_secs: u64,
    /// Maximum number of course detail pages fetched concurrently during discovery.
    pub discovery_concurrency: usize,
    /// Lifetime of a discovery cache entry, in seconds.
    pub cache_ttl_secs: u64,
    /// Downloads smaller than this are treated as broken payloads.
    pub min_payload_bytes: u64,
    /// Root directory for downloads (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for LvdConfig {
    fn default() -> Self {
        Self {
            platform_origin: "https://ys.learnus.org".to_string(),
            sso_origin: "https://infra.yonsei.ac.kr".to_string(),
            app_id: "ednetYonsei".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            request_timeout_secs: 10,
            payload_timeout_secs: 600,
            discovery_concurrency: 5,
            cache_ttl_secs: 3600,
            min_payload_bytes: 100 * 1024,
            download_dir: None,
            retry: None,
        }
    }
}

impl LvdConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Platform origin without a trailing slash, for building endpoint URLs.
    pub fn platform_base(&self) -> &str {
        self.platform_origin.trim_end_matches('/')
    }

    pub fn sso_base(&self) -> &str {
        self.sso_origin.trim_end_matches('/')
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("lvd")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Unix socket through which `lvd pause|resume|stop` reach a running download.
pub fn control_socket_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("lvd")?;
    let state_home = xdg_dirs.get_state_home();
    fs::create_dir_all(&state_home)?;
    Ok(state_home.join("control.sock"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<LvdConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = LvdConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: LvdConfig = toml::from_str(&data)?;
    Ok(cfg)
}
