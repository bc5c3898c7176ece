//! Configuration file loading shared by rules, ontology and fix policy

use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Parse a YAML (or JSON) document into `T`
pub fn parse_yaml<T: DeserializeOwned>(text: &str) -> ConfigResult<T> {
    Ok(serde_yaml::from_str(text)?)
}

/// Read and parse a YAML (or JSON) file into `T`
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> ConfigResult<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_yaml(&text)
}
