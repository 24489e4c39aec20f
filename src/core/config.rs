// src/core/config.rs

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_ENV_VAR, DEFAULT_TEMP_PREFIX, PROJECT_CONFIG_FILENAME,
    USER_CONFIG_FILENAME,
};
use crate::system::fs::TempDirOptions;
use crate::system::shell::{Encoding, UnknownEncoding};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid log level '{0}'. Expected one of: off, error, warn, info, debug, trace.")]
    InvalidLogLevel(String),
    #[error(transparent)]
    InvalidEncoding(#[from] UnknownEncoding),
    #[error("Failed to expand temp dir template '{template}': {message}")]
    Expand { template: String, message: String },
}

/// Settings read from `mollusc.toml` or the user configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Whether transcripts are echoed.
    pub echo: bool,
    /// Logger threshold (`off`, `error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: Option<String>,
    /// Encoding declared for the process stdio sinks.
    pub encoding: Option<String>,
    /// Root under which temporary directories are created. `~` and `$VAR` are expanded.
    pub temp_dir: Option<String>,
    /// Prefix of temporary directory names.
    pub temp_prefix: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            echo: true,
            log_level: None,
            encoding: None,
            temp_dir: None,
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
        }
    }
}

impl ShellConfig {
    /// The parsed `log_level`, if one is set.
    pub fn level_filter(&self) -> Result<Option<LevelFilter>, ConfigError> {
        self.log_level
            .as_deref()
            .map(|level| {
                level
                    .parse::<LevelFilter>()
                    .map_err(|_| ConfigError::InvalidLogLevel(level.to_string()))
            })
            .transpose()
    }

    /// The parsed `encoding`, if one is set.
    pub fn encoding(&self) -> Result<Option<Encoding>, ConfigError> {
        Ok(self.encoding.as_deref().map(str::parse).transpose()?)
    }

    /// Temporary directory options with `temp_dir` expanded.
    pub fn temp_options(&self) -> Result<TempDirOptions, ConfigError> {
        let dir = match &self.temp_dir {
            Some(template) => {
                let expanded =
                    shellexpand::full(template).map_err(|e| ConfigError::Expand {
                        template: template.clone(),
                        message: e.to_string(),
                    })?;
                Some(PathBuf::from(expanded.into_owned()))
            }
            None => None,
        };
        Ok(TempDirOptions {
            prefix: Some(self.temp_prefix.clone()),
            suffix: None,
            dir,
        })
    }
}

/// The user configuration directory (`~/.config/mollusc` on Linux).
pub fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME))
}

/// Picks the configuration file to load, first match wins:
/// the explicit path, the environment override, the project file in `cwd`,
/// the user file. Only the last two are checked for existence.
pub fn find_config_file(
    explicit: Option<&Path>,
    env_override: Option<OsString>,
    cwd: &Path,
    user_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_override.filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    let project = cwd.join(PROJECT_CONFIG_FILENAME);
    if project.is_file() {
        return Some(project);
    }
    user_dir
        .map(|dir| dir.join(USER_CONFIG_FILENAME))
        .filter(|path| path.is_file())
}

/// Parses configuration text. `origin` only appears in error messages.
pub fn parse_config(text: &str, origin: &str) -> Result<ShellConfig, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::TomlParse {
        path: origin.to_string(),
        source,
    })
}

/// Reads and parses one configuration file.
pub fn load_config_file(path: &Path) -> Result<ShellConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&text, &path.display().to_string())
}

/// Loads the configuration in effect, falling back to the defaults when no file exists.
pub fn load_config(explicit: Option<&Path>) -> Result<ShellConfig, ConfigError> {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let user_dir = user_config_dir();
    match find_config_file(
        explicit,
        env::var_os(CONFIG_ENV_VAR),
        &cwd,
        user_dir.as_deref(),
    ) {
        Some(path) => {
            log::debug!("Loading configuration from '{}'", path.display());
            load_config_file(&path)
        }
        None => {
            log::debug!("No configuration file found, using defaults");
            Ok(ShellConfig::default())
        }
    }
}
