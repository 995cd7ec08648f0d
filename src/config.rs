//! Configuration snapshot handed to the checker and orchestrator.
//!
//! The snapshot is resolved once per run from three layers, highest first:
//! - command-line flags
//! - `code-check.toml` in the working directory (or `--config <path>`)
//! - built-in defaults (`http://localhost:3000`, 900s, `json`, mock off)
//!
//! Nothing here is written back; the values are read-only after `resolve`.

use crate::types::OutputFormat;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 900;
pub const CONFIG_FILE_NAME: &str = "code-check.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct CheckerConfig {
    pub base_url: String,
    pub call_timeout_secs: u64,
    pub output_format: OutputFormat,
    pub mock_mode: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            output_format: OutputFormat::Json,
            mock_mode: false,
        }
    }
}

impl CheckerConfig {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: trim_base_url(base_url),
            ..Self::default()
        }
    }

    /// `{base_url}{path}`; `path` must start with `/`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// On-disk layer. Every key is optional.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub server_url: Option<String>,
    pub call_timeout_seconds: Option<u64>,
    pub output_format: Option<OutputFormat>,
    pub mock_mode: Option<bool>,
}

/// Command-line layer.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub call_timeout_seconds: Option<u64>,
    pub output_format: Option<OutputFormat>,
    pub mock_mode: bool,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("server URL must not be empty")]
    EmptyUrl,

    #[error("call timeout must be at least one second")]
    ZeroTimeout,
}

pub fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the snapshot. An explicit `config_path` must exist; the default
/// file is only used when present.
pub fn resolve(config_path: Option<&Path>, overrides: &Overrides) -> Result<CheckerConfig, ConfigError> {
    let file = match config_path {
        Some(path) => load_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE_NAME);
            if default_path.is_file() {
                load_file(default_path)?
            } else {
                ConfigFile::default()
            }
        }
    };
    merge(&file, overrides)
}

pub fn merge(file: &ConfigFile, overrides: &Overrides) -> Result<CheckerConfig, ConfigError> {
    let defaults = CheckerConfig::default();

    let base_url = overrides
        .server_url
        .as_deref()
        .or(file.server_url.as_deref())
        .map(trim_base_url)
        .unwrap_or(defaults.base_url);
    if base_url.is_empty() {
        return Err(ConfigError::EmptyUrl);
    }

    let call_timeout_secs = overrides
        .call_timeout_seconds
        .or(file.call_timeout_seconds)
        .unwrap_or(defaults.call_timeout_secs);
    if call_timeout_secs == 0 {
        return Err(ConfigError::ZeroTimeout);
    }

    let config = CheckerConfig {
        base_url,
        call_timeout_secs,
        output_format: overrides
            .output_format
            .or(file.output_format)
            .unwrap_or(defaults.output_format),
        mock_mode: overrides.mock_mode || file.mock_mode.unwrap_or(defaults.mock_mode),
    };
    tracing::debug!(?config, "resolved configuration");
    Ok(config)
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
