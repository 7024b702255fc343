//! Configuration loading and management

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use turnstile_auth::{PasswordConfig, TokenUsePolicy};

/// Secret used when none is configured. Fine for local runs only.
pub const DEFAULT_SECRET: &str = "secret";

/// Longest accepted session token lifetime (ten years)
pub const MAX_TOKEN_EXPIRY_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Where used single-use tokens are remembered
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistBackend {
    #[default]
    Memory,
    Database,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens
    #[serde(default = "default_secret")]
    pub secret: String,
    /// Lifetime of issued session tokens; unset means they never expire
    #[serde(default)]
    pub token_expiry_secs: Option<u64>,
    #[serde(default)]
    pub token_uses: TokenUsePolicy,
    #[serde(default)]
    pub blacklist: BlacklistBackend,
    /// Password for the `admin` identity created on first start
    #[serde(default, skip_serializing)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub password: PasswordConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            token_expiry_secs: None,
            token_uses: TokenUsePolicy::default(),
            blacklist: BlacklistBackend::default(),
            admin_password: None,
            password: PasswordConfig::default(),
        }
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SECRET
    }

    pub fn token_ttl(&self) -> Option<chrono::Duration> {
        self.token_expiry_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "./data/turnstile.db".to_string()
}

fn default_secret() -> String {
    DEFAULT_SECRET.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a file, falling back to defaults if it is missing
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.secret.is_empty() {
            bail!("auth.secret cannot be empty");
        }
        if self.auth.token_expiry_secs == Some(0) {
            bail!("auth.token_expiry_secs must be greater than zero");
        }
        if let Some(secs) = self.auth.token_expiry_secs
            && secs > MAX_TOKEN_EXPIRY_SECS
        {
            bail!(
                "auth.token_expiry_secs must be at most {} (ten years)",
                MAX_TOKEN_EXPIRY_SECS
            );
        }
        if self.auth.admin_password.as_deref() == Some("") {
            bail!("auth.admin_password cannot be empty");
        }

        let password = &self.auth.password;
        if password.iterations == 0 {
            bail!("auth.password.iterations must be greater than zero");
        }
        if password.parallelism == 0 {
            bail!("auth.password.parallelism must be greater than zero");
        }
        if password.memory_kib < 8 * password.parallelism {
            bail!("auth.password.memory_kib must be at least 8 times auth.password.parallelism");
        }
        Ok(())
    }
}

/// Interpret the `JWT_USES` setting: only `single` turns on single-use tokens
///
/// Anything other than `single` or `multi` keeps multi-use tokens and is
/// reported, since the TOML path would have rejected it.
pub fn parse_token_uses(value: &str) -> TokenUsePolicy {
    let value = value.trim();
    if value.eq_ignore_ascii_case("single") {
        TokenUsePolicy::Single
    } else if value.eq_ignore_ascii_case("multi") {
        TokenUsePolicy::Multi
    } else {
        warn!(
            "Unknown token use policy {:?}, expected \"single\" or \"multi\"; using multi",
            value
        );
        TokenUsePolicy::Multi
    }
}
