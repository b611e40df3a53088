pub mod helpers;

use figment::providers::{Env, Format, Yaml};
use recordindex_error::{ErrorCodes, RecordIndexError};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Types that can be built from a piece of static configuration.
pub trait Configurable<T>: Sized {
    fn try_from_config(config: &T) -> Result<Self, Box<dyn RecordIndexError>>;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file cannot be found at: {0}")]
    MissingFile(PathBuf),
    #[error("Error in processing configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl RecordIndexError for ConfigError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// Loads `T` from a YAML file, with environment variables carrying
/// `env_prefix` layered on top. A `__` in a variable name separates nested
/// keys, e.g. `RECORDINDEX_SCHEMA_CACHE__UNBOUNDED`.
pub fn load_from_path<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    env_prefix: &str,
) -> Result<T, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }
    // figment splits nested keys on '.', but variable names cannot contain one.
    let env = Env::prefixed(env_prefix).map(|k| k.as_str().replace("__", ".").into());
    figment::Figment::from(Yaml::file(path))
        .merge(env)
        .extract()
        .map_err(|err| ConfigError::Extract(Box::new(err)))
}
