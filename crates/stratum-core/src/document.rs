//! Kubernetes resource documents
//!
//! A [`Document`] is an untyped tree of mappings, sequences and scalars that
//! always carries a non-empty `kind` at the top level. Documents are values:
//! transformers produce new documents instead of mutating existing ones.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Where a document came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentSource {
    /// File the document was parsed from (None for synthesized documents)
    pub path: Option<PathBuf>,
    /// Index of the subdocument within its YAML stream
    pub subdocument: usize,
}

impl DocumentSource {
    /// Source for the `index`th subdocument of `path`
    pub fn file(path: impl Into<PathBuf>, subdocument: usize) -> Self {
        Self {
            path: Some(path.into()),
            subdocument,
        }
    }

    /// Source for a document synthesized in memory (e.g. by a generator plugin)
    pub fn generated() -> Self {
        Self {
            path: None,
            subdocument: 0,
        }
    }

    /// Directory containing the source file
    pub fn directory(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}#{}", path.display(), self.subdocument),
            None => write!(f, "<generated>"),
        }
    }
}

/// An immutable resource document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document(JsonValue);

impl Document {
    /// Wrap a value, rejecting anything that is not a mapping with a `kind`
    pub fn from_value(value: JsonValue) -> Result<Self> {
        Self::validated(value, "<generated>", 0)
    }

    fn validated(value: JsonValue, source_name: &str, index: usize) -> Result<Self> {
        let invalid = |message: &str| CoreError::InvalidDocument {
            source_name: source_name.to_string(),
            index,
            message: message.to_string(),
        };

        let map = value
            .as_object()
            .ok_or_else(|| invalid("document is not a mapping"))?;

        match map.get("kind") {
            Some(JsonValue::String(kind)) if !kind.is_empty() => Ok(Self(value)),
            Some(_) => Err(invalid("attribute 'kind' must be a non-empty string")),
            None => Err(invalid("missing attribute 'kind'")),
        }
    }

    /// The resource kind
    pub fn kind(&self) -> &str {
        self.0["kind"].as_str().unwrap_or_default()
    }

    /// The `apiVersion` attribute, if present
    pub fn api_version(&self) -> Option<&str> {
        self.0.get("apiVersion").and_then(JsonValue::as_str)
    }

    /// `metadata.name`, if present
    pub fn name(&self) -> Option<&str> {
        self.0.pointer("/metadata/name").and_then(JsonValue::as_str)
    }

    /// `metadata.namespace`, if present
    pub fn namespace(&self) -> Option<&str> {
        self.0.pointer("/metadata/namespace").and_then(JsonValue::as_str)
    }

    /// Top-level attribute lookup
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Borrow the underlying tree
    pub fn as_value(&self) -> &JsonValue {
        &self.0
    }

    /// Take the underlying tree
    pub fn into_value(self) -> JsonValue {
        self.0
    }

    /// Short human-readable identity, e.g. `Deployment/web`
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.kind(), self.name().unwrap_or("unnamed"))
    }
}

/// Parse a multi-document YAML stream
///
/// Empty subdocuments (a bare `---`) are skipped; every other subdocument
/// must be a mapping declaring `kind`.
pub fn parse_stream(content: &str, source_name: &str) -> Result<Vec<Document>> {
    let mut docs = Vec::new();

    for (index, subdocument) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = JsonValue::deserialize(subdocument)?;
        if value.is_null() {
            continue;
        }
        docs.push(Document::validated(value, source_name, index)?);
    }

    Ok(docs)
}

/// Render documents as a multi-document YAML stream, in order
pub fn to_yaml_stream(docs: &[Document]) -> Result<String> {
    let mut out = String::new();
    for doc in docs {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(doc)?);
    }
    Ok(out)
}
