//! Project configuration (rxweave.toml)

use rxweave_syntax::ReactiveConventions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "rxweave.toml";

/// Errors that can occur while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which back-end materializes generated members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Source,
    Patch,
}

/// Whole configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub reactive: ReactiveConfig,

    #[serde(default)]
    pub emit: EmitConfig,
}

/// `[project]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    /// Glob patterns selecting declaration files
    #[serde(default = "default_inputs")]
    pub inputs: Vec<String>,

    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
}

/// `[reactive]` naming conventions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactiveConfig {
    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default = "default_extensible_base")]
    pub extensible_base: String,

    #[serde(default = "default_init_method")]
    pub init_method: String,
}

/// `[emit]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmitConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Leave outputs whose content hash matches the file on disk untouched
    #[serde(default = "default_true")]
    pub skip_unchanged: bool,
}

fn default_inputs() -> Vec<String> {
    vec!["**/*.rxd".to_string()]
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("generated")
}

fn default_interface() -> String {
    ReactiveConventions::default().interface
}

fn default_extensible_base() -> String {
    ReactiveConventions::default().extensible_base
}

fn default_init_method() -> String {
    ReactiveConventions::default().init_method
}

fn default_true() -> bool {
    true
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            inputs: default_inputs(),
            out_dir: default_out_dir(),
        }
    }
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            extensible_base: default_extensible_base(),
            init_method: default_init_method(),
        }
    }
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            skip_unchanged: default_true(),
        }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// An explicit path must exist. Without one, `rxweave.toml` in the
    /// working directory is used when present, otherwise all defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let reactive = &self.reactive;
        for (key, value) in [
            ("reactive.interface", &reactive.interface),
            ("reactive.extensible_base", &reactive.extensible_base),
            ("reactive.init_method", &reactive.init_method),
        ] {
            if !is_identifier(value) {
                return Err(ConfigError::Invalid(format!("{} must be an identifier, got '{}'", key, value)));
            }
        }
        Ok(())
    }

    pub fn conventions(&self) -> ReactiveConventions {
        ReactiveConventions {
            interface: self.reactive.interface.clone(),
            extensible_base: self.reactive.extensible_base.clone(),
            init_method: self.reactive.init_method.clone(),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
}
