//! Stratum Engine - declarative overlay composition for Kubernetes manifests
//!
//! This crate resolves layered kustomization documents into a final stream of
//! resource documents:
//! - `emitter`: the File/Directory/Document/Kustomization emitter graph with
//!   per-invocation memoization and cycle detection
//! - `transform`: Namespace, Image, SecretName and JSON6902 transformers
//! - `plugin`: registry of generator/transformer plugins matched by apiVersion
//! - `plugins`: the builtin release and managed-secret plugins
//! - `session`: per-invocation context shared with plugins
//!
//! # Example
//!
//! ```no_run
//! use stratum_engine::{compose, to_yaml_stream, Session};
//!
//! let session = Session::builder().build();
//! let docs = compose("deploy/overlays/staging", &session)?;
//! print!("{}", to_yaml_stream(&docs)?);
//! # Ok::<(), stratum_engine::EngineError>(())
//! ```

pub mod compose;
pub mod emitter;
pub mod error;
pub mod kustomization;
pub mod plugin;
pub mod plugins;
pub mod session;
pub mod transform;

pub use compose::{compose, to_yaml_stream};
pub use emitter::{Composer, DecoderRegistry, DocumentDecoderFn, Emitter};
pub use error::{EngineError, Result};
pub use kustomization::{ImageSpec, Kustomization, PatchOp, PatchOpKind, PatchSpec};
pub use plugin::{
    GeneratorPlugin, Plugin, PluginEntry, PluginFactory, PluginId, PluginRegistry, PluginRole,
    PluginSource, TransformerPlugin,
};
pub use session::{Session, SessionBuilder};
pub use transform::{
    ImagePatchOp, ImageRef, Json6902PatchOp, NamespacePatchOp, SecretNamePatchOp, TargetSpec,
    Transformer,
};
