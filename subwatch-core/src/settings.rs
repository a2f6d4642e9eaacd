use crate::error::{ConfigError, CoreError};
use crate::types::VerdictKind;
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::path::Path;

pub const CONFIG_PATH_ENV: &str = "SUBWATCH_CONFIG";
const DATABASE_URL_ENV: &str = "SUBWATCH_DATABASE_URL";
const BIND_ENV: &str = "SUBWATCH_BIND";

/// Process-level settings. Monitor behaviour the operator edits at runtime
/// (threshold, prompt, cadence) lives in the database instead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub reddit: RedditSettings,
    pub llm: LlmSettings,
    pub fetch: FetchSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://subwatch.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub user_agent: String,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!("subwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    pub verdict_kind: VerdictKind,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            verdict_kind: VerdictKind::Reply,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Number of subreddits processed concurrently.
    pub batch_size: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self { batch_size: 3 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppSettings {
    /// Reads the TOML file at `path` (or `$SUBWATCH_CONFIG`) if any, then
    /// applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let env_path = env::var(CONFIG_PATH_ENV).ok();
        let path = path.or_else(|| env_path.as_deref().map(Path::new));

        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, CoreError> {
        let settings: AppSettings = toml::from_str(raw).map_err(ConfigError::from)?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<(), CoreError> {
        if let Ok(url) = env::var(DATABASE_URL_ENV) {
            self.database.url = url;
        }
        if let Ok(bind) = env::var(BIND_ENV) {
            self.server.bind = bind.parse().map_err(|_| ConfigError::InvalidValue {
                field: BIND_ENV.to_string(),
                value: bind.clone(),
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.fetch.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.batch_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.max_connections".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Reads a required environment variable.
pub fn required_env(var_name: &str) -> Result<String, ConfigError> {
    match env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvironmentVariable {
            var_name: var_name.to_string(),
        }),
    }
}
