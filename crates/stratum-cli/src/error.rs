//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use miette::Diagnostic;
use stratum_core::CoreError;
use stratum_engine::EngineError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug)]
pub enum CliError {
    /// Composition failed
    #[error(transparent)]
    Compose(#[from] EngineError),

    /// Project configuration or release metadata error
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    Io { message: String },
}

// Written by hand rather than derived: `#[diagnostic(transparent)]` would call
// `EngineError::code`, the inherent method, instead of `Diagnostic::code`.
impl Diagnostic for CliError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        match self {
            CliError::Compose(err) => Diagnostic::code(err),
            CliError::Config { .. } => Some(Box::new("stratum::cli::config")),
            CliError::Io { .. } => Some(Box::new("stratum::cli::io")),
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        match self {
            CliError::Compose(err) => Diagnostic::severity(err),
            _ => None,
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        match self {
            CliError::Compose(err) => Diagnostic::help(err),
            CliError::Config { help, .. } => help
                .as_ref()
                .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>),
            CliError::Io { .. } => None,
        }
    }

    fn url<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        match self {
            CliError::Compose(err) => Diagnostic::url(err),
            _ => None,
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            CliError::Compose(err) => Diagnostic::source_code(err),
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        match self {
            CliError::Compose(err) => Diagnostic::labels(err),
            _ => None,
        }
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        match self {
            CliError::Compose(err) => Diagnostic::related(err),
            _ => None,
        }
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        match self {
            CliError::Compose(err) => Diagnostic::diagnostic_source(err),
            _ => None,
        }
    }
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Compose(err) => match err.code() {
                "io" | "path_not_found" => exit_codes::IO_ERROR,
                "invalid_project" | "secret_access" => exit_codes::CONFIG_ERROR,
                "core" | "yaml" => exit_codes::ERROR,
                _ => exit_codes::COMPOSE_ERROR,
            },
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(err) => err.into(),
            other => CliError::config(other.to_string()),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
