//! Per-invocation composition context

use std::sync::Arc;

use stratum_core::{CoreError, Project, Release, SecretStore};

use crate::plugin::{PluginRegistry, PluginSource};
use crate::plugins;

/// Context shared by every emitter and plugin of one composition
///
/// Read-only once built.
pub struct Session {
    plugins: PluginRegistry,
    project: Project,
    secret_store: Option<Arc<dyn SecretStore>>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn proposed_release(&self) -> Option<&Release> {
        self.project.proposed_release.as_ref()
    }

    /// The managed-secrets store; fails when none was configured
    pub fn secret_store(&self) -> Result<&dyn SecretStore, CoreError> {
        self.secret_store.as_deref().ok_or_else(|| CoreError::SecretAccess {
            secret: "*".to_string(),
            message: "no managed-secrets store is configured for this project".to_string(),
        })
    }
}

/// Session builder
pub struct SessionBuilder {
    builtin_plugins: bool,
    sources: Vec<PluginSource>,
    project: Project,
    secret_store: Option<Arc<dyn SecretStore>>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            builtin_plugins: true,
            sources: Vec::new(),
            project: Project::default(),
            secret_store: None,
        }
    }

    /// Add a plugin source, searched after the builtin plugins and any
    /// source added earlier
    pub fn plugin_source(mut self, source: PluginSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Do not register the builtin plugins
    pub fn without_builtin_plugins(mut self) -> Self {
        self.builtin_plugins = false;
        self
    }

    pub fn project(mut self, project: Project) -> Self {
        self.project = project;
        self
    }

    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secret_store = Some(store);
        self
    }

    pub fn build(self) -> Session {
        let builtin = self.builtin_plugins.then(plugins::builtin_source);
        let plugins = PluginRegistry::from_sources(builtin.into_iter().chain(self.sources));

        Session {
            plugins,
            project: self.project,
            secret_store: self.secret_store,
        }
    }
}
