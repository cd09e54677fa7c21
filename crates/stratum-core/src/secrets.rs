//! Managed secrets: read interface to the secret store
//!
//! A managed secret is a named set of parts. Each part is either plain
//! (value stored as-is) or sealed (stored only as per-namespace ciphertext).
//! Sealing itself is delegated to a [`Sealer`]; this module never decrypts.
//!
//! Store documents look like:
//!
//! ```yaml
//! apiVersion: orbital.covalenthq.com/v1
//! kind: ManagedSecret
//! metadata:
//!   name: db
//! type: Opaque
//! parts:
//!   - key: password
//!     sealed: true
//!     sealedValueParts:
//!       staging: <base64 ciphertext>
//!     sealedValueDigest: <base64>
//! ```

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

pub const MANAGED_SECRET_API_VERSION: &str = "orbital.covalenthq.com/v1";
pub const MANAGED_SECRET_KIND: &str = "ManagedSecret";

fn default_type() -> String {
    "Opaque".to_string()
}

// =============================================================================
// SEALER
// =============================================================================

/// External sealing mechanism (e.g. a cluster's public sealing key)
pub trait Sealer: Send + Sync {
    /// Encrypt `plain` for the given scope label (a namespace)
    fn seal(&self, plain: &[u8], scope_label: &str) -> Result<Vec<u8>>;
}

// =============================================================================
// PART
// =============================================================================

/// One key of a managed secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub key: String,

    #[serde(rename = "type", default = "default_type")]
    pub part_type: String,

    #[serde(default)]
    pub sealed: bool,

    /// Plain value (unsealed parts only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Namespace -> base64 ciphertext (sealed parts only)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub sealed_value_parts: IndexMap<String, String>,

    /// Base64 of the first four bytes of SHA-256 over the plain value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_value_digest: Option<String>,
}

impl Part {
    pub fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            part_type: default_type(),
            sealed: false,
            value: Some(value.into()),
            sealed_value_parts: IndexMap::new(),
            sealed_value_digest: None,
        }
    }

    /// The plain value; fails for sealed parts
    pub fn plain_value(&self) -> Result<&str> {
        if self.sealed {
            return Err(CoreError::secret_access(&self.key, "part is sealed"));
        }
        Ok(self.value.as_deref().unwrap_or_default())
    }

    /// Ciphertext sealed for `namespace`
    pub fn sealed_value(&self, namespace: &str) -> Result<Vec<u8>> {
        if !self.sealed {
            return Err(CoreError::secret_access(&self.key, "part is not sealed"));
        }
        let armored = self.sealed_value_parts.get(namespace).ok_or_else(|| {
            CoreError::secret_access(
                &self.key,
                format!("part was not sealed for namespace '{}'", namespace),
            )
        })?;
        BASE64
            .decode(armored.trim())
            .map_err(|e| CoreError::secret_access(&self.key, format!("corrupt ciphertext: {}", e)))
    }

    /// Raw digest bytes of the sealed value; fails for unsealed parts
    pub fn value_digest(&self) -> Result<Vec<u8>> {
        if !self.sealed {
            return Err(CoreError::secret_access(
                &self.key,
                "only sealed parts carry a value digest",
            ));
        }
        let armored = self.sealed_value_digest.as_deref().unwrap_or_default();
        BASE64
            .decode(armored.trim())
            .map_err(|e| CoreError::secret_access(&self.key, format!("corrupt value digest: {}", e)))
    }

    /// Seal the plain value for every namespace; no-op if already sealed
    pub fn seal(&mut self, sealer: &dyn Sealer, namespaces: &[String]) -> Result<bool> {
        if self.sealed {
            return Ok(false);
        }

        let plain = self.value.take().unwrap_or_default();
        let mut parts = IndexMap::new();
        for namespace in namespaces {
            let ciphertext = sealer.seal(plain.as_bytes(), namespace)?;
            parts.insert(namespace.clone(), BASE64.encode(ciphertext));
        }

        let digest = Sha256::digest(plain.as_bytes());
        self.sealed_value_digest = Some(BASE64.encode(&digest[..4]));
        self.sealed_value_parts = parts;
        self.sealed = true;
        Ok(true)
    }
}

// =============================================================================
// MANAGED SECRET
// =============================================================================

/// How many parts of a secret are sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealingState {
    FullySealed,
    PartiallySealed,
    Unsealed,
}

/// A named secret held by the store
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedSecret {
    pub name: String,
    pub secret_type: String,
    pub parts: IndexMap<String, Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedSecretDoc {
    api_version: Option<String>,
    kind: Option<String>,
    #[serde(default)]
    metadata: SecretMetadata,
    #[serde(rename = "type")]
    secret_type: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Default, Deserialize)]
struct SecretMetadata {
    name: Option<String>,
}

impl ManagedSecret {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret_type: default_type(),
            parts: IndexMap::new(),
        }
    }

    /// Builder-style part insertion
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.insert(part.key.clone(), part);
        self
    }

    /// Parse a store document
    pub fn from_yaml(content: &str, source_name: &str) -> Result<Self> {
        let invalid = |message: &str| CoreError::InvalidDocument {
            source_name: source_name.to_string(),
            index: 0,
            message: message.to_string(),
        };

        let doc: ManagedSecretDoc = serde_yaml::from_str(content)?;
        if doc.api_version.as_deref() != Some(MANAGED_SECRET_API_VERSION) {
            return Err(invalid("unexpected apiVersion"));
        }
        if doc.kind.as_deref() != Some(MANAGED_SECRET_KIND) {
            return Err(invalid("unexpected kind"));
        }
        let name = doc
            .metadata
            .name
            .ok_or_else(|| invalid("missing required field metadata.name"))?;

        Ok(Self {
            name,
            secret_type: doc.secret_type.unwrap_or_else(default_type),
            parts: doc
                .parts
                .into_iter()
                .map(|part| (part.key.clone(), part))
                .collect(),
        })
    }

    pub fn sealing_state(&self) -> SealingState {
        if self.parts.values().all(|p| p.sealed) {
            SealingState::FullySealed
        } else if self.parts.values().any(|p| p.sealed) {
            SealingState::PartiallySealed
        } else {
            SealingState::Unsealed
        }
    }

    /// A copy with every unsealed part sealed for `namespaces`
    pub fn seal_remaining(&self, sealer: &dyn Sealer, namespaces: &[String]) -> Result<Self> {
        let mut sealed = self.clone();
        for part in sealed.parts.values_mut() {
            part.seal(sealer, namespaces)
                .map_err(|e| self.qualify(e))?;
        }
        Ok(sealed)
    }

    /// `key -> plain value` for every part
    pub fn plain_data(&self) -> Result<IndexMap<&str, &str>> {
        self.parts
            .values()
            .map(|part| {
                part.plain_value()
                    .map(|v| (part.key.as_str(), v))
                    .map_err(|e| self.qualify(e))
            })
            .collect()
    }

    /// `key -> ciphertext` for every part, sealed for `namespace`
    pub fn sealed_data(&self, namespace: &str) -> Result<IndexMap<&str, Vec<u8>>> {
        self.parts
            .values()
            .map(|part| {
                part.sealed_value(namespace)
                    .map(|v| (part.key.as_str(), v))
                    .map_err(|e| self.qualify(e))
            })
            .collect()
    }

    /// Prefix part-level access errors with the secret's name
    fn qualify(&self, err: CoreError) -> CoreError {
        match err {
            CoreError::SecretAccess { secret, message } => CoreError::SecretAccess {
                secret: format!("{}/{}", self.name, secret),
                message,
            },
            other => other,
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Read interface to a managed-secrets store
pub trait SecretStore: Send + Sync {
    /// Every secret, keyed by name, in store order
    fn secrets(&self) -> &IndexMap<String, ManagedSecret>;

    /// A copy of `secret` with its unsealed parts sealed
    fn seal_remaining(&self, secret: &ManagedSecret) -> Result<ManagedSecret>;
}

/// Store backed by a directory of `ManagedSecret` YAML files
pub struct FileSecretStore {
    dir: PathBuf,
    secrets: IndexMap<String, ManagedSecret>,
    seal_for_namespaces: Vec<String>,
    sealer: Option<Box<dyn Sealer>>,
}

impl FileSecretStore {
    /// Load every `*.yaml`/`*.yml` file directly under `dir`
    ///
    /// A missing directory yields an empty store.
    pub fn open<P: AsRef<Path>>(dir: P, seal_for_namespaces: Vec<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut secrets = IndexMap::new();

        if dir.is_dir() {
            let mut files = Vec::new();
            for entry in walkdir::WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .follow_links(true)
            {
                let entry = entry.map_err(std::io::Error::from)?;
                let path = entry.path();
                let is_yaml = path
                    .extension()
                    .map(|ext| {
                        let ext = ext.to_string_lossy().to_lowercase();
                        ext == "yaml" || ext == "yml"
                    })
                    .unwrap_or(false);
                if path.is_file() && is_yaml {
                    files.push(path.to_path_buf());
                }
            }
            files.sort();

            for path in files {
                let content = std::fs::read_to_string(&path)?;
                let secret = ManagedSecret::from_yaml(&content, &path.display().to_string())?;
                secrets.insert(secret.name.clone(), secret);
            }
        }

        Ok(Self {
            dir,
            secrets,
            seal_for_namespaces,
            sealer: None,
        })
    }

    pub fn with_sealer(mut self, sealer: impl Sealer + 'static) -> Self {
        self.sealer = Some(Box::new(sealer));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn seal_for_namespaces(&self) -> &[String] {
        &self.seal_for_namespaces
    }
}

impl SecretStore for FileSecretStore {
    fn secrets(&self) -> &IndexMap<String, ManagedSecret> {
        &self.secrets
    }

    fn seal_remaining(&self, secret: &ManagedSecret) -> Result<ManagedSecret> {
        let sealer = self.sealer.as_deref().ok_or_else(|| {
            CoreError::secret_access(&secret.name, "no sealer is configured for this store")
        })?;
        secret.seal_remaining(sealer, &self.seal_for_namespaces)
    }
}
