use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexSet;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};
use stratum_core::{
    CoreError, Document, ManagedSecret, SealingState, SecretStore, lens, zbase32_sha256,
};

use super::FINGERPRINT_ANNOTATION;
use crate::error::Result;
use crate::plugin::{GeneratorPlugin, Plugin};
use crate::session::Session;

const SEALED_SECRET_API_VERSION: &str = "bitnami.com/v1alpha1";
const FINGERPRINT_LEN: usize = 6;

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    import: Vec<String>,
    #[serde(default)]
    template: TemplateConfig,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateConfig {
    #[serde(default)]
    namespace: Option<String>,
}

/// Materializes managed secrets as `Secret` or `SealedSecret` resources
///
/// Secrets with no sealed part become plain `Secret`s. Any sealed part makes
/// the whole secret a `SealedSecret`, sealing the remaining parts through the
/// store first. Sealed values are namespace-scoped, so a sealed secret needs
/// `template.namespace`.
pub struct ManagedSecretGenerator {
    import: IndexSet<String>,
    namespace: Option<String>,
}

pub(super) fn factory(doc: &Document, _session: &Session) -> Result<Plugin> {
    let config: Config = super::config(doc)?;
    Ok(Plugin::Generator(Box::new(ManagedSecretGenerator::new(
        config.import,
        config.template.namespace,
    ))))
}

impl ManagedSecretGenerator {
    pub fn new(import: impl IntoIterator<Item = String>, namespace: Option<String>) -> Self {
        Self {
            import: import.into_iter().collect(),
            namespace,
        }
    }

    fn build(&self, secret: &ManagedSecret, store: &dyn SecretStore) -> Result<Document> {
        match secret.sealing_state() {
            SealingState::Unsealed => self.plain_secret(secret),
            SealingState::FullySealed => self.sealed_secret(secret),
            SealingState::PartiallySealed => self.sealed_secret(&store.seal_remaining(secret)?),
        }
    }

    fn plain_secret(&self, secret: &ManagedSecret) -> Result<Document> {
        let data: Map<String, JsonValue> = secret
            .plain_data()?
            .into_iter()
            .map(|(key, value)| (key.to_string(), JsonValue::from(BASE64.encode(value))))
            .collect();

        self.finish(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": secret.name},
            "type": secret.secret_type,
            "data": data,
        }))
    }

    fn sealed_secret(&self, secret: &ManagedSecret) -> Result<Document> {
        let namespace = self.namespace.as_deref().ok_or_else(|| CoreError::SecretAccess {
            secret: secret.name.clone(),
            message: "sealed values are namespace-scoped; set template.namespace".to_string(),
        })?;

        let mut manifest = Vec::new();
        for part in secret.parts.values() {
            manifest.extend_from_slice(part.key.as_bytes());
            manifest.push(b'=');
            manifest.extend(part.value_digest()?);
            manifest.push(b'\n');
        }
        let mut fingerprint = zbase32_sha256(&manifest);
        fingerprint.truncate(FINGERPRINT_LEN);

        let encrypted: Map<String, JsonValue> = secret
            .sealed_data(namespace)?
            .into_iter()
            .map(|(key, ciphertext)| (key.to_string(), JsonValue::from(BASE64.encode(ciphertext))))
            .collect();

        self.finish(json!({
            "apiVersion": SEALED_SECRET_API_VERSION,
            "kind": "SealedSecret",
            "metadata": {
                "name": secret.name,
                "annotations": {FINGERPRINT_ANNOTATION: fingerprint},
            },
            "spec": {
                "template": {"type": secret.secret_type},
                "encryptedData": encrypted,
            },
        }))
    }

    fn finish(&self, value: JsonValue) -> Result<Document> {
        let value = match &self.namespace {
            Some(namespace) => {
                lens!["metadata", "namespace"].put(&value, JsonValue::from(namespace.as_str()))?
            }
            None => value,
        };
        Ok(Document::from_value(value)?)
    }
}

impl GeneratorPlugin for ManagedSecretGenerator {
    fn generate(&self, session: &Session) -> Result<Vec<Document>> {
        let store = session.secret_store()?;

        for name in &self.import {
            if !store.secrets().contains_key(name) {
                tracing::warn!("managed secret '{}' is imported but not in the store", name);
            }
        }

        store
            .secrets()
            .values()
            .filter(|secret| self.import.contains(&secret.name))
            .map(|secret| self.build(secret, store))
            .collect()
    }
}
