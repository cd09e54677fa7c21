//! Stratum Core - Core types for declarative manifest composition
//!
//! This crate provides the foundational types used throughout Stratum:
//! - `Document`: An immutable Kubernetes resource document
//! - `Lens`: Path addressing into nested documents (get, put, update, remove)
//! - `Project`/`Release`: Build and release metadata consumed by plugins
//! - `ManagedSecret`/`SecretStore`: Read interface to the managed-secrets store
//! - `digest`: Content digests used for content-addressed names

pub mod digest;
pub mod document;
pub mod error;
pub mod lens;
pub mod project;
pub mod secrets;

pub use digest::{canonical_json, content_suffix, zbase32_sha256};
pub use document::{Document, DocumentSource, parse_stream, to_yaml_stream};
pub use error::{CoreError, Result};
pub use lens::{Focus, Lens, Removal, Step, Update};
pub use project::{BuildStep, Project, Release, SecretsConfig};
pub use secrets::{
    FileSecretStore, ManagedSecret, Part, Sealer, SealingState, SecretStore,
};
