//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid resource document (subdocument {index} in {source_name}): {message}")]
    InvalidDocument {
        source_name: String,
        index: usize,
        message: String,
    },

    #[error("Invalid path {path}: {message}")]
    InvalidPath { path: String, message: String },

    #[error("Cannot access secret '{secret}': {message}")]
    SecretAccess { secret: String, message: String },

    #[error("Invalid project configuration: {message}")]
    InvalidProject { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn invalid_path(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn secret_access(secret: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SecretAccess {
            secret: secret.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
