//! Gateway configuration.
//!
//! Loaded from YAML (the file named by `WAYPOINT_CONFIG`, else
//! `waypoint.yaml` when present, else built-in defaults) and then
//! overridden from the environment.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::proxy::registry::ServiceRegistry;

pub const CONFIG_PATH_ENV: &str = "WAYPOINT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "waypoint.yaml";
pub const LISTEN_ENV: &str = "LISTEN";
pub const AUTH_SCHEME_ENV: &str = "WAYPOINT_AUTH_SCHEME";
pub const SERVICES_ENV: &str = "WAYPOINT_SERVICES";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub upstream: UpstreamConfig,
    pub cors: CorsConfig,
    pub https_redirect: HttpsRedirectConfig,
    /// Service name -> base URL.
    pub services: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Expected `Authorization` scheme, compared byte for byte.
    pub scheme: String,
    /// Request paths that skip the auth gate.
    pub exempt_paths: Vec<String>,
    /// Status returned when the gate rejects a request.
    pub reject_status: u16,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            scheme: "Bearer".to_string(),
            exempt_paths: vec![crate::gateway::HEALTH_CHECK_PATH.to_string()],
            reject_status: 401,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Treat 4xx/5xx downstream statuses as errors instead of relaying them.
    pub raise_for_status: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 5_000,
            raise_for_status: false,
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origins: vec!["*".to_string()],
            allow_methods: vec!["*".to_string()],
            allow_headers: vec!["*".to_string()],
            allow_credentials: true,
            max_age_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpsRedirectConfig {
    pub enabled: bool,
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Loads the configuration using `env` for every variable lookup.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let default_file = Path::new(DEFAULT_CONFIG_FILE);

        let mut cfg = match env(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if default_file.exists() => Self::from_file(default_file)?,
            None => Self::default(),
        };

        cfg.apply_env(&env)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(listen_addr) = env(LISTEN_ENV) {
            self.server.listen_addr = listen_addr;
        }

        if let Some(scheme) = env(AUTH_SCHEME_ENV) {
            self.auth.scheme = scheme;
        }

        if let Some(services) = env(SERVICES_ENV) {
            for entry in services.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                let (name, url) = entry
                    .split_once('=')
                    .with_context(|| format!("{SERVICES_ENV} entry '{entry}' is not name=url"))?;
                self.services
                    .insert(name.trim().to_string(), url.trim().to_string());
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.listen_addr.trim().is_empty() {
            anyhow::bail!("server.listen_addr must not be empty");
        }

        let scheme = &self.auth.scheme;
        if scheme.is_empty() || scheme.chars().any(char::is_whitespace) {
            anyhow::bail!("auth.scheme must be a single non-empty token, got '{scheme}'");
        }

        if !(400..500).contains(&self.auth.reject_status) {
            anyhow::bail!(
                "auth.reject_status must be a 4xx code, got {}",
                self.auth.reject_status
            );
        }

        if self.upstream.connect_timeout_ms == 0 || self.upstream.request_timeout_ms == 0 {
            anyhow::bail!("upstream timeouts must be greater than zero");
        }

        ServiceRegistry::from_config(&self.services)?;
        Ok(())
    }
}
