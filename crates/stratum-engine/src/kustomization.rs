//! Kustomization documents
//!
//! ```yaml
//! apiVersion: kustomize.config.k8s.io/v1beta1
//! kind: Kustomization
//! bases: [../base]
//! resources: [configmap.yaml]
//! generators: [release.yaml]
//! namespace: staging
//! images:
//!   - name: gcr.io/acme/app
//!     newTag: v2
//! patchesJson6902:
//!   - target: {group: apps, version: v1, kind: Deployment}
//!     path: replicas.yaml
//! ```
//!
//! Unknown top-level keys are ignored.

use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use stratum_core::Document;

use crate::error::{EngineError, Result};
use crate::transform::{
    self, ImagePatchOp, Json6902PatchOp, NamespacePatchOp, SecretNamePatchOp, TargetSpec,
};

/// Treat an explicit `null` like a missing field
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept numeric and boolean scalars where a string is expected (`newTag: 2`)
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(s),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        Some(JsonValue::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar, found {}",
                other
            )));
        }
    })
}

/// Which list of a kustomization an input path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    Base,
    Resource,
    Generator,
    Transformer,
}

impl std::fmt::Display for InputRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Resource => write!(f, "resource"),
            Self::Generator => write!(f, "generator"),
            Self::Transformer => write!(f, "transformer"),
        }
    }
}

/// A parsed `kind: Kustomization` document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    #[serde(default, deserialize_with = "nullable")]
    pub bases: Vec<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub resources: Vec<String>,

    /// Files of generator plugin placeholders
    #[serde(default, deserialize_with = "nullable")]
    pub generators: Vec<String>,

    /// Files of transformer plugin placeholders
    #[serde(default, deserialize_with = "nullable")]
    pub transformers: Vec<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<ImageSpec>,

    #[serde(default, deserialize_with = "nullable")]
    pub patches: Vec<PatchSpec>,

    #[serde(default, deserialize_with = "nullable")]
    pub patches_json6902: Vec<PatchSpec>,
}

/// An `images:` entry
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub name: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub new_name: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub new_tag: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub digest: Option<String>,
}

/// A `patches:`/`patchesJson6902:` entry
///
/// Operations come from exactly one of `path` (a file relative to the
/// kustomization), `patch` (an inline YAML or JSON string) or `ops`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PatchSpec {
    #[serde(default)]
    pub target: TargetSpec,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub ops: Option<Vec<PatchOp>>,
}

/// One JSON6902 operation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatchOp {
    pub op: PatchOpKind,
    pub path: String,
    #[serde(default)]
    pub value: JsonValue,
}

/// Supported JSON6902 operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpKind {
    Add,
    Replace,
    Remove,
}

impl std::fmt::Display for PatchOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Replace => write!(f, "replace"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

impl Kustomization {
    /// Interpret a `kind: Kustomization` document read from `path`
    pub fn from_document(doc: &Document, path: &Path) -> Result<Self> {
        serde_json::from_value(doc.as_value().clone()).map_err(|e| {
            EngineError::InvalidKustomization {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Input paths in resolution order: bases, resources, generators, transformers
    pub fn inputs(&self) -> impl Iterator<Item = (InputRole, &str)> {
        [
            (InputRole::Base, &self.bases),
            (InputRole::Resource, &self.resources),
            (InputRole::Generator, &self.generators),
            (InputRole::Transformer, &self.transformers),
        ]
        .into_iter()
        .flat_map(|(role, paths)| paths.iter().map(move |path| (role, path.as_str())))
    }

    /// `patches` followed by `patchesJson6902`
    pub fn all_patches(&self) -> impl Iterator<Item = &PatchSpec> {
        self.patches.iter().chain(self.patches_json6902.iter())
    }

    /// Run the builtin chain: Namespace, Image, SecretName, JSON6902 patches
    ///
    /// `dir` is the kustomization's directory, used to resolve patch files.
    pub fn transform(&self, dir: &Path, mut docs: Vec<Document>) -> Result<Vec<Document>> {
        if let Some(namespace) = &self.namespace {
            docs = transform::apply_all(&NamespacePatchOp::new(namespace), docs)?;
        }

        for image in &self.images {
            docs = transform::apply_all(&ImagePatchOp::from_spec(image)?, docs)?;
        }

        let secret_names = SecretNamePatchOp::from_resources(&docs)?;
        docs = transform::apply_all(&secret_names, docs)?;

        for patch in self.all_patches() {
            docs = transform::apply_all(&Json6902PatchOp::from_spec(patch, dir)?, docs)?;
        }

        Ok(docs)
    }
}
