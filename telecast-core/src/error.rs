use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read channel definitions {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse channel definitions {path}: {source}")]
    Parse {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("invalid channel definition `{slug}`: {reason}")]
    InvalidDefinition { slug: String, reason: String },
    #[error("invalid value for {var}: `{value}`")]
    Env { var: &'static str, value: String },
    #[error("failed to create cache root {path}: {source}")]
    CacheRoot { source: io::Error, path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
