//! Engine error types

use miette::Diagnostic;
use stratum_core::CoreError;
use thiserror::Error;

/// Errors raised while composing a resource stream
///
/// Every variant is terminal for the current composition.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum EngineError {
    /// Document, lens or secret-store failure
    #[error(transparent)]
    #[diagnostic(code(stratum::core))]
    Core(#[from] CoreError),

    #[error("Path not found: {path} (referenced from {referenced_from})")]
    #[diagnostic(
        code(stratum::compose::path_not_found),
        help("bases, resources, generators and transformers resolve relative to the kustomization's own directory")
    )]
    PathNotFound {
        path: String,
        referenced_from: String,
    },

    #[error("Composition cycle detected: {chain}")]
    #[diagnostic(
        code(stratum::compose::cycle),
        help("a kustomization cannot include itself, directly or through its bases")
    )]
    CompositionCycle { chain: String },

    #[error("Conflicting image override for '{name}': {message}")]
    #[diagnostic(code(stratum::transform::conflicting_spec))]
    ConflictingSpec { name: String, message: String },

    #[error("Patch '{op}' at {path} cannot apply to {resource}: {message}")]
    #[diagnostic(code(stratum::transform::patch_precondition))]
    PatchPrecondition {
        op: String,
        path: String,
        resource: String,
        message: String,
    },

    #[error("No plugin of kind '{kind}' is registered for apiVersion '{api_version}'")]
    #[diagnostic(
        code(stratum::plugin::unknown),
        help("run `stratum plugins` to list the registered plugins")
    )]
    UnknownPluginApiVersion { api_version: String, kind: String },

    #[error("Invalid kustomization {path}: {message}")]
    #[diagnostic(code(stratum::compose::invalid_kustomization))]
    InvalidKustomization { path: String, message: String },

    #[error("Invalid plugin configuration in {resource}: {message}")]
    #[diagnostic(code(stratum::plugin::invalid_config))]
    InvalidPluginConfig { resource: String, message: String },

    #[error("IO error reading {path}: {source}")]
    #[diagnostic(code(stratum::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    #[diagnostic(code(stratum::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
    /// Short machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core(CoreError::InvalidDocument { .. }) => "invalid_document",
            Self::Core(CoreError::InvalidPath { .. }) => "invalid_path",
            Self::Core(CoreError::SecretAccess { .. }) => "secret_access",
            Self::Core(CoreError::InvalidProject { .. }) => "invalid_project",
            Self::Core(_) => "core",
            Self::PathNotFound { .. } => "path_not_found",
            Self::CompositionCycle { .. } => "composition_cycle",
            Self::ConflictingSpec { .. } => "conflicting_spec",
            Self::PatchPrecondition { .. } => "patch_precondition",
            Self::UnknownPluginApiVersion { .. } => "unknown_plugin",
            Self::InvalidKustomization { .. } => "invalid_kustomization",
            Self::InvalidPluginConfig { .. } => "invalid_plugin_config",
            Self::Io { .. } => "io",
            Self::Yaml(_) => "yaml",
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
