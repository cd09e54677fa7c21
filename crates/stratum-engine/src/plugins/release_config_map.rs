use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};
use stratum_core::{Document, Release, lens};

use super::FINGERPRINT_ANNOTATION;
use crate::error::{EngineError, Result};
use crate::plugin::{GeneratorPlugin, Plugin};
use crate::session::Session;

const PROPERTY_PREFIX: &str = "com.covalenthq.orbital.release.";

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    spec: SpecConfig,
}

#[derive(Debug, Default, Deserialize)]
struct SpecConfig {
    #[serde(default)]
    template: TemplateConfig,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateConfig {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Publishes the proposed release's metadata as a `ConfigMap`
///
/// Each release attribute becomes a data key, and `release.properties`
/// repeats them as a Java properties file. Without a release the map only
/// holds `version: latest`.
pub struct ReleaseConfigMapGenerator {
    name: String,
    namespace: Option<String>,
}

pub(super) fn factory(doc: &Document, _session: &Session) -> Result<Plugin> {
    let config: Config = super::config(doc)?;
    let name = config.spec.template.name.ok_or_else(|| EngineError::InvalidPluginConfig {
        resource: doc.display_name(),
        message: "missing spec.template.name".to_string(),
    })?;

    Ok(Plugin::Generator(Box::new(ReleaseConfigMapGenerator::new(
        name,
        config.spec.template.namespace,
    ))))
}

impl ReleaseConfigMapGenerator {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
        }
    }

    /// Release attributes, with unknown values dropped
    fn release_data(release: Option<&Release>) -> IndexMap<&'static str, String> {
        let Some(release) = release else {
            return IndexMap::from([("version", "latest".to_string())]);
        };

        [
            ("version", Some(release.tag_name.clone())),
            ("build.time", Some(release.created_at.timestamp().to_string())),
            ("git.ref", release.from_git_ref.clone()),
            ("git.branch", release.from_git_branch.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

impl GeneratorPlugin for ReleaseConfigMapGenerator {
    fn generate(&self, session: &Session) -> Result<Vec<Document>> {
        let release_data = Self::release_data(session.proposed_release());

        let properties: String = release_data
            .iter()
            .map(|(key, value)| format!("{}{}={}\n", PROPERTY_PREFIX, key, value))
            .collect();

        let mut data: Map<String, JsonValue> = release_data
            .into_iter()
            .map(|(key, value)| (key.to_string(), JsonValue::from(value)))
            .collect();
        data.insert("release.properties".to_string(), JsonValue::from(properties));

        let mut value = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": self.name,
                "annotations": {FINGERPRINT_ANNOTATION: ""},
            },
            "data": data,
        });
        if let Some(namespace) = &self.namespace {
            value = lens!["metadata", "namespace"].put(&value, JsonValue::from(namespace.as_str()))?;
        }

        Ok(vec![Document::from_value(value)?])
    }
}
