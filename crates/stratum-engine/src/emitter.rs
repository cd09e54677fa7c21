//! Emitter graph
//!
//! An [`Emitter`] names one composition input. A [`Composer`] resolves
//! emitters into resource documents, memoizing every node it resolves for the
//! lifetime of the composer and refusing to enter a node that is already
//! being resolved.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stratum_core::{Document, DocumentSource, parse_stream};

use crate::error::{EngineError, Result};
use crate::kustomization::Kustomization;
use crate::plugin::Plugin;
use crate::session::Session;

/// File that turns a directory into a kustomization
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// A composition input
#[derive(Debug, Clone)]
pub enum Emitter {
    /// A YAML stream; each subdocument is decoded by kind
    File(PathBuf),
    /// Its `kustomization.yaml`, or else every YAML file below it
    Directory(PathBuf),
    /// A plain resource, emitted as-is
    Document(Document, DocumentSource),
    /// A `kind: Kustomization` document
    Kustomization(Document, DocumentSource),
}

/// Turns a parsed subdocument into the emitter handling its kind
pub type DocumentDecoderFn = fn(Document, DocumentSource) -> Emitter;

/// Decoders by document kind; unregistered kinds pass through unchanged
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, DocumentDecoderFn>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::empty().with("Kustomization", Emitter::Kustomization)
    }
}

impl DecoderRegistry {
    /// A registry that decodes every kind as a plain document
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register `decoder` for `kind`, replacing any earlier one
    pub fn with(mut self, kind: impl Into<String>, decoder: DocumentDecoderFn) -> Self {
        self.decoders.insert(kind.into(), decoder);
        self
    }

    pub fn decode(&self, doc: Document, source: DocumentSource) -> Emitter {
        match self.decoders.get(doc.kind()) {
            Some(decoder) => decoder(doc, source),
            None => Emitter::Document(doc, source),
        }
    }
}

/// Identity of a memoized node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    File(PathBuf),
    Directory(PathBuf),
    Subdocument(PathBuf, usize),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Directory(path) => write!(f, "{}/", path.display()),
            Self::Subdocument(path, index) => write!(f, "{}#{}", path.display(), index),
        }
    }
}

/// Resolves emitters against one [`Session`]
pub struct Composer<'s> {
    session: &'s Session,
    decoders: DecoderRegistry,
    cache: HashMap<NodeKey, Arc<Vec<Document>>>,
    /// Nodes currently being resolved, outermost first
    resolving: Vec<NodeKey>,
}

impl<'s> Composer<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self::with_decoders(session, DecoderRegistry::default())
    }

    pub fn with_decoders(session: &'s Session, decoders: DecoderRegistry) -> Self {
        Self {
            session,
            decoders,
            cache: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    /// Emit a directory or a single file
    pub fn emit_path(&mut self, path: &Path) -> Result<Arc<Vec<Document>>> {
        let emitter = if path.is_dir() {
            Emitter::Directory(path.to_path_buf())
        } else if path.is_file() {
            Emitter::File(path.to_path_buf())
        } else {
            return Err(EngineError::PathNotFound {
                path: path.display().to_string(),
                referenced_from: "<root>".to_string(),
            });
        };
        self.emit(&emitter)
    }

    /// Resolve an emitter into its resource documents
    ///
    /// Emitting the same node again returns the memoized documents without
    /// touching the filesystem.
    pub fn emit(&mut self, emitter: &Emitter) -> Result<Arc<Vec<Document>>> {
        match emitter {
            Emitter::File(path) => {
                let path = canonical(path)?;
                self.memoized(NodeKey::File(path.clone()), |c| c.resolve_file(&path))
            }
            Emitter::Directory(path) => {
                let path = canonical(path)?;
                self.memoized(NodeKey::Directory(path.clone()), |c| c.resolve_directory(&path))
            }
            Emitter::Document(doc, _) => Ok(Arc::new(vec![doc.clone()])),
            Emitter::Kustomization(doc, source) => match &source.path {
                Some(path) => self.memoized(
                    NodeKey::Subdocument(path.clone(), source.subdocument),
                    |c| c.resolve_kustomization(doc, source),
                ),
                None => self.resolve_kustomization(doc, source).map(Arc::new),
            },
        }
    }

    /// Number of memoized nodes
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn memoized<F>(&mut self, key: NodeKey, resolve: F) -> Result<Arc<Vec<Document>>>
    where
        F: FnOnce(&mut Self) -> Result<Vec<Document>>,
    {
        if let Some(docs) = self.cache.get(&key) {
            tracing::debug!("cache hit for {}", key);
            return Ok(Arc::clone(docs));
        }

        if let Some(start) = self.resolving.iter().position(|k| *k == key) {
            let chain = self.resolving[start..]
                .iter()
                .chain(std::iter::once(&key))
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(EngineError::CompositionCycle { chain });
        }

        self.resolving.push(key.clone());
        let resolved = resolve(self);
        self.resolving.pop();

        let docs = Arc::new(resolved?);
        tracing::debug!("resolved {} ({} documents)", key, docs.len());
        self.cache.insert(key, Arc::clone(&docs));
        Ok(docs)
    }

    // =========================================================================
    // NODE RESOLUTION
    // =========================================================================

    fn resolve_file(&mut self, path: &Path) -> Result<Vec<Document>> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let parsed = parse_stream(&content, &path.display().to_string())?;

        let mut docs = Vec::new();
        for (index, doc) in parsed.into_iter().enumerate() {
            let emitter = self.decoders.decode(doc, DocumentSource::file(path, index));
            docs.extend(self.emit(&emitter)?.iter().cloned());
        }
        Ok(docs)
    }

    fn resolve_directory(&mut self, path: &Path) -> Result<Vec<Document>> {
        let kustomization = path.join(KUSTOMIZATION_FILE);
        if kustomization.is_file() {
            return Ok(self.emit(&Emitter::File(kustomization))?.to_vec());
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(path).min_depth(1) {
            let entry = entry.map_err(|e| EngineError::io(path, e.into()))?;
            if entry.file_type().is_file() && is_yaml(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        let mut docs = Vec::new();
        for file in files {
            docs.extend(self.emit(&Emitter::File(file))?.iter().cloned());
        }
        Ok(docs)
    }

    fn resolve_kustomization(
        &mut self,
        doc: &Document,
        source: &DocumentSource,
    ) -> Result<Vec<Document>> {
        let session = self.session;
        let dir = source.directory().unwrap_or(Path::new(".")).to_path_buf();
        let kustomization = Kustomization::from_document(doc, source.path.as_deref().unwrap_or(dir.as_path()))?;

        let mut inputs = Vec::new();
        for (role, rel_path) in kustomization.inputs() {
            let path = dir.join(rel_path);
            let emitter = if path.is_file() {
                Emitter::File(path)
            } else if path.is_dir() {
                Emitter::Directory(path)
            } else {
                return Err(EngineError::PathNotFound {
                    path: path.display().to_string(),
                    referenced_from: format!("{} ({})", source, role),
                });
            };
            inputs.extend(self.emit(&emitter)?.iter().cloned());
        }

        let (placeholders, mut resources): (Vec<_>, Vec<_>) = inputs
            .into_iter()
            .partition(|doc| session.plugins().claims(doc));

        let mut transformers = Vec::new();
        for placeholder in &placeholders {
            match session.plugins().instantiate(placeholder, session)? {
                Plugin::Generator(generator) => resources.extend(generator.generate(session)?),
                Plugin::Transformer(transformer) => transformers.push(transformer),
            }
        }

        let mut docs = kustomization.transform(&dir, resources)?;
        for transformer in &transformers {
            docs = docs
                .into_iter()
                .map(|doc| transformer.transform(doc))
                .collect::<Result<_>>()?;
        }

        tracing::debug!(
            "kustomization {} emitted {} documents ({} plugins)",
            source,
            docs.len(),
            placeholders.len()
        );
        Ok(docs)
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| EngineError::io(path, e))
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            ext == "yaml" || ext == "yml"
        })
        .unwrap_or(false)
}
