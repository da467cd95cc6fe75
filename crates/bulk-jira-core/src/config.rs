use std::path::{Path, PathBuf};

use ::config::{Config as Layers, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::auth::BasicCredentials;

pub const APP_NAME: &str = "bulk-jira-from-yaml";
/// Prefix for environment variables overriding file settings (`BJY_HOST`, ...).
pub const ENV_PREFIX: &str = "BJY";
pub const DEFAULT_LABEL: &str = "off-boarding";

/// Locates the default configuration file in the user configuration directory.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    root: PathBuf,
}

impl ConfigLocator {
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("", "", APP_NAME).ok_or(ConfigError::MissingProjectDirs)?;
        Ok(Self {
            root: dirs.config_dir().to_path_buf(),
        })
    }

    /// `<config dir>/bulk-jira-from-yaml/bulk-jira-from-yaml.yaml`
    pub fn config_file(&self) -> PathBuf {
        self.root.join(format!("{APP_NAME}.yaml"))
    }

    #[cfg(test)]
    pub(crate) fn from_root_for_tests(root: PathBuf) -> Self {
        Self { root }
    }
}

/// `BJY_*` variables; empty values are treated as unset.
pub fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX).ignore_empty(true)
}

/// Settings merged from the YAML file and the environment, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub host: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
    pub label: Option<String>,
}

impl RawConfig {
    /// Layer `env` over the YAML file at `path`.
    ///
    /// A missing file is an error only when `required` is set.
    pub fn layered(path: &Path, required: bool, env: Environment) -> Result<Self, ConfigError> {
        let layers = Layers::builder()
            .add_source(File::from(path).format(FileFormat::Yaml).required(required))
            .add_source(env)
            .build()?;
        Ok(layers.try_deserialize()?)
    }

    pub fn validate(self) -> Result<Config, ConfigError> {
        let host = required(self.host, "host")?;
        let host = Url::parse(host.trim()).map_err(|source| ConfigError::InvalidHost {
            host: host.clone(),
            source,
        })?;
        if !matches!(host.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(host.scheme().to_owned()));
        }

        let username = required(self.username, "username")?;
        let token = required(self.token, "token")?;
        let label = self
            .label
            .filter(|label| !label.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LABEL.to_owned());

        Ok(Config {
            host,
            credentials: BasicCredentials::new(username, token),
            label,
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

/// Validated runtime configuration handed to the REST client.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: Url,
    pub credentials: BasicCredentials,
    /// Label attached to every created issue.
    pub label: String,
}

impl Config {
    /// Load configuration from `path` (or the default location) and the process environment.
    ///
    /// An explicit path must exist; a missing default file is tolerated so that
    /// everything can come from `BJY_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let raw = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                debug!("using config file {}", path.display());
                RawConfig::layered(path, true, env_source())?
            }
            None => {
                let default_path = ConfigLocator::new()?.config_file();
                debug!("using config file {} if present", default_path.display());
                RawConfig::layered(&default_path, false, env_source())?
            }
        };

        raw.validate()
    }
}

/// Errors raised while locating, reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to determine configuration directory for bulk-jira-from-yaml")]
    MissingProjectDirs,
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to load configuration: {0}")]
    Source(#[from] ::config::ConfigError),
    #[error("missing required setting '{0}' (set it in the config file or BJY_* env)")]
    Missing(&'static str),
    #[error("invalid host URL '{host}': {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported host URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
}
