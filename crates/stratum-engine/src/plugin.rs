//! Plugin registry
//!
//! A resource document whose `apiVersion` is registered by any plugin is a
//! placeholder: instead of being emitted, it instantiates the plugin of the
//! same `kind`. Generators contribute new resources; transformers rewrite the
//! resources of the kustomization that declared them.
//!
//! Plugins come from ordered sources (builtin first, then project-local). The
//! first source to register a plugin identity wins.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use stratum_core::Document;

use crate::error::{EngineError, Result};
use crate::session::Session;

/// Produces new resources
pub trait GeneratorPlugin {
    fn generate(&self, session: &Session) -> Result<Vec<Document>>;
}

/// Rewrites existing resources
pub trait TransformerPlugin {
    fn transform(&self, doc: Document) -> Result<Document>;
}

/// An instantiated plugin
pub enum Plugin {
    Generator(Box<dyn GeneratorPlugin>),
    Transformer(Box<dyn TransformerPlugin>),
}

impl Plugin {
    pub fn role(&self) -> PluginRole {
        match self {
            Self::Generator(_) => PluginRole::Generator,
            Self::Transformer(_) => PluginRole::Transformer,
        }
    }
}

/// Builds a plugin from its placeholder document
pub type PluginFactory = fn(&Document, &Session) -> Result<Plugin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginRole {
    Generator,
    Transformer,
}

impl fmt::Display for PluginRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generator => write!(f, "generator"),
            Self::Transformer => write!(f, "transformer"),
        }
    }
}

/// Plugin identity: `(apiVersion, kind)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginId {
    pub api_version: String,
    pub kind: String,
}

impl PluginId {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// A registered plugin
#[derive(Clone)]
pub struct PluginEntry {
    pub id: PluginId,
    pub role: PluginRole,
    /// Name of the source that registered it
    pub source: String,
    factory: PluginFactory,
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// A named group of plugin registrations
#[derive(Debug, Clone)]
pub struct PluginSource {
    name: String,
    entries: Vec<PluginEntry>,
}

impl PluginSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generator(self, api_version: &str, kind: &str, factory: PluginFactory) -> Self {
        self.register(api_version, kind, PluginRole::Generator, factory)
    }

    pub fn transformer(self, api_version: &str, kind: &str, factory: PluginFactory) -> Self {
        self.register(api_version, kind, PluginRole::Transformer, factory)
    }

    fn register(
        mut self,
        api_version: &str,
        kind: &str,
        role: PluginRole,
        factory: PluginFactory,
    ) -> Self {
        self.entries.push(PluginEntry {
            id: PluginId::new(api_version, kind),
            role,
            source: self.name.clone(),
            factory,
        });
        self
    }
}

/// Registry of plugins, passed explicitly through the [`Session`]
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    entries: IndexMap<PluginId, PluginEntry>,
    api_versions: HashSet<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register sources in priority order
    pub fn from_sources(sources: impl IntoIterator<Item = PluginSource>) -> Self {
        let mut registry = Self::new();
        for source in sources {
            registry.add_source(source);
        }
        registry
    }

    /// Add a lower-priority source; identities already registered are kept
    pub fn add_source(&mut self, source: PluginSource) {
        for entry in source.entries {
            if let Some(existing) = self.entries.get(&entry.id) {
                tracing::warn!(
                    "plugin {} from '{}' is shadowed by '{}'",
                    entry.id,
                    entry.source,
                    existing.source
                );
                continue;
            }
            self.api_versions.insert(entry.id.api_version.clone());
            self.entries.insert(entry.id.clone(), entry);
        }
    }

    /// Whether `doc` is a plugin placeholder
    pub fn claims(&self, doc: &Document) -> bool {
        doc.api_version()
            .is_some_and(|api_version| self.api_versions.contains(api_version))
    }

    pub fn lookup(&self, api_version: &str, kind: &str) -> Option<&PluginEntry> {
        self.entries.get(&PluginId::new(api_version, kind))
    }

    /// Construct the plugin a placeholder document asks for
    pub fn instantiate(&self, doc: &Document, session: &Session) -> Result<Plugin> {
        let api_version = doc.api_version().unwrap_or_default();
        let entry = self.lookup(api_version, doc.kind()).ok_or_else(|| {
            EngineError::UnknownPluginApiVersion {
                api_version: api_version.to_string(),
                kind: doc.kind().to_string(),
            }
        })?;

        tracing::debug!("constructing {} plugin {} ({})", entry.role, entry.id, entry.source);
        (entry.factory)(doc, session)
    }

    /// Registered plugins, in registration order
    pub fn entries(&self) -> impl Iterator<Item = &PluginEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
