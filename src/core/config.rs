use crate::models::session::DeviceInfo;
use crate::models::user::AccountStatus;
use crate::rbac::role::Role;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_role")]
    pub default_role: String,
    #[serde(default = "default_session_cap")]
    pub session_cap: usize,
    #[serde(default = "default_pointer_ttl_secs")]
    pub pointer_ttl_secs: i64,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
    #[serde(default)]
    pub hashing: HashingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Append-only record log; in-memory store when absent
    pub path: Option<PathBuf>,
    #[serde(default = "default_compact_after")]
    pub compact_after: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

/// Account created at startup unless its email is already registered
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    #[serde(default)]
    pub status: AccountStatus,
    pub phone: Option<String>,
    pub department: Option<String>,
}

// Default value functions
fn default_role() -> String {
    Role::Viewer.name().to_string()
}

fn default_session_cap() -> usize {
    10
}

fn default_pointer_ttl_secs() -> i64 {
    24 * 60 * 60 // 24 hours
}

fn default_min_password_len() -> usize {
    6
}

fn default_memory_kib() -> u32 {
    19_456 // 19 MiB
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

fn default_compact_after() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_role: default_role(),
            session_cap: default_session_cap(),
            pointer_ttl_secs: default_pointer_ttl_secs(),
            min_password_len: default_min_password_len(),
            hashing: HashingConfig::default(),
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            compact_after: default_compact_after(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            console: default_console(),
        }
    }
}

impl ClientConfig {
    /// Device description of the running client, explicit fields winning
    /// over whatever the user agent (or the host) suggests
    pub fn device_info(&self) -> DeviceInfo {
        let mut info = match &self.user_agent {
            Some(ua) => DeviceInfo::from_user_agent(ua),
            None => DeviceInfo::detect(),
        };

        if let Some(device) = &self.device {
            info.device = device.clone();
        }
        if let Some(browser) = &self.browser {
            info.browser = browser.clone();
        }
        if let Some(location) = &self.location {
            info.location = location.clone();
        }

        info
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate auth config
        if Role::from_name(&self.auth.default_role).is_none() {
            bail!("Unknown default_role '{}'", self.auth.default_role);
        }

        if self.auth.session_cap == 0 {
            bail!("session_cap must be greater than 0");
        }

        if self.auth.pointer_ttl_secs <= 0 {
            bail!("pointer_ttl_secs must be greater than 0");
        }

        if self.auth.min_password_len == 0 {
            bail!("min_password_len must be greater than 0");
        }

        let hashing = &self.auth.hashing;
        argon2::Params::new(hashing.memory_kib, hashing.iterations, hashing.parallelism, None)
            .map_err(|e| anyhow::anyhow!("Invalid hashing parameters: {}", e))?;

        // Validate storage config
        if self.storage.compact_after == 0 {
            bail!("compact_after must be greater than 0");
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        // Validate seed accounts
        for seed in &self.seed_users {
            if seed.name.trim().is_empty() {
                bail!("seed user '{}' has an empty name", seed.email);
            }

            if !seed.email.contains('@') {
                bail!("seed user email '{}' is not valid", seed.email);
            }

            if seed.password.chars().count() < self.auth.min_password_len {
                bail!(
                    "seed user '{}' password is shorter than {} characters",
                    seed.email,
                    self.auth.min_password_len
                );
            }

            if let Some(role) = &seed.role {
                if Role::from_name(role).is_none() {
                    bail!("seed user '{}' has unknown role '{}'", seed.email, role);
                }
            }
        }

        Ok(())
    }
}
