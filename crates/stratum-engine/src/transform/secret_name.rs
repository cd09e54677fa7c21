use std::collections::HashMap;

use serde_json::Value as JsonValue;
use stratum_core::{Document, Lens, Step, Update, content_suffix, lens};

use super::{Transformer, container_lenses, pod_spec_path};
use crate::error::Result;

/// Length of the content digest appended to secret names
pub const SUFFIX_LEN: usize = 8;

/// Content-addressed secret names
///
/// Built in two passes: [`SecretNamePatchOp::from_resources`] digests the
/// payload of every `Secret` (`data`) and `SealedSecret`
/// (`spec.encryptedData`) in the full resource set, then [`Transformer::apply`]
/// renames those secrets and every workload reference to them to
/// `<name>-<suffix>`.
///
/// A secret whose name already ends in its own suffix (renamed by a lower
/// overlay) keeps its name; references to the unsuffixed name still follow it.
#[derive(Debug, Clone, Default)]
pub struct SecretNamePatchOp {
    renames: HashMap<String, String>,
}

impl SecretNamePatchOp {
    pub fn from_resources(docs: &[Document]) -> Result<Self> {
        let mut renames = HashMap::new();

        for doc in docs {
            let payload = match doc.kind() {
                "Secret" => doc.get("data"),
                "SealedSecret" => lens!["spec", "encryptedData"].get(doc.as_value()).first(),
                _ => continue,
            };
            let Some(name) = doc.name() else {
                continue;
            };

            let suffix = content_suffix(payload.unwrap_or(&JsonValue::Null), SUFFIX_LEN)?;
            if let Some(original) = name.strip_suffix(&format!("-{}", suffix)) {
                renames.insert(original.to_string(), name.to_string());
                continue;
            }

            tracing::debug!("secret {} gets suffix {}", name, suffix);
            renames.insert(name.to_string(), format!("{}-{}", name, suffix));
        }

        Ok(Self { renames })
    }

    /// The new name for `name`, if it is a renamed secret
    pub fn renamed(&self, name: &str) -> Option<&str> {
        self.renames.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    fn rename_at(&self, lens: &Lens, value: &JsonValue) -> Result<JsonValue> {
        Ok(lens.update(value, |current| {
            match current.and_then(JsonValue::as_str).and_then(|n| self.renamed(n)) {
                Some(new_name) => Update::Set(JsonValue::from(new_name)),
                None => Update::Keep,
            }
        })?)
    }

    /// Every location in a document of `kind` that names a secret
    fn reference_lenses(kind: &str) -> Vec<Lens> {
        let mut lenses = Vec::new();

        match kind {
            "Secret" => lenses.push(lens!["metadata", "name"]),
            "SealedSecret" => {
                lenses.push(lens!["metadata", "name"]);
                lenses.push(lens!["spec", "template", "metadata", "name"]);
            }
            _ => {}
        }

        lenses.extend(container_lenses(
            kind,
            &[
                Step::from("env"),
                Step::All,
                Step::from("valueFrom"),
                Step::from("secretKeyRef"),
                Step::from("name"),
            ],
        ));
        lenses.extend(container_lenses(
            kind,
            &[
                Step::from("envFrom"),
                Step::All,
                Step::from("secretRef"),
                Step::from("name"),
            ],
        ));

        if let Some(mut volumes) = pod_spec_path(kind) {
            volumes.extend([
                Step::from("volumes"),
                Step::All,
                Step::from("secret"),
                Step::from("secretName"),
            ]);
            lenses.push(Lens::new(volumes));
        }

        lenses
    }
}

impl Transformer for SecretNamePatchOp {
    fn name(&self) -> &'static str {
        "secret-name"
    }

    fn apply(&self, doc: Document) -> Result<Document> {
        if self.renames.is_empty() {
            return Ok(doc);
        }

        let lenses = Self::reference_lenses(doc.kind());
        if lenses.is_empty() {
            return Ok(doc);
        }

        let mut value = doc.into_value();
        for lens in &lenses {
            value = self.rename_at(lens, &value)?;
        }
        Ok(Document::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        Document::from_value(value).unwrap()
    }

    fn secret(name: &str, password: &str) -> Document {
        doc(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": name},
            "data": {"password": password}
        }))
    }

    fn deployment() -> Document {
        doc(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "spec": {"template": {"spec": {
                "containers": [{
                    "name": "app",
                    "image": "app:1",
                    "env": [
                        {"name": "PLAIN", "value": "x"},
                        {"name": "DB_PASSWORD", "valueFrom": {"secretKeyRef": {"name": "db", "key": "password"}}},
                        {"name": "OTHER", "valueFrom": {"secretKeyRef": {"name": "unmanaged", "key": "k"}}}
                    ],
                    "envFrom": [{"secretRef": {"name": "db"}}]
                }],
                "volumes": [
                    {"name": "creds", "secret": {"secretName": "db"}},
                    {"name": "scratch", "emptyDir": {}}
                ]
            }}}
        }))
    }

    #[test]
    fn test_identical_payloads_share_suffix() {
        let op = SecretNamePatchOp::from_resources(&[
            secret("db", "cGFzcw=="),
            secret("replica", "cGFzcw=="),
            secret("other", "cGFzcx=="),
        ])
        .unwrap();

        assert_eq!(op.renamed("db"), Some("db-nh1zordu"));
        assert_eq!(op.renamed("replica"), Some("replica-nh1zordu"));
        assert_eq!(op.renamed("other"), Some("other-dxhka15t"));
    }

    #[test]
    fn test_renames_secret_and_references() {
        let docs = vec![secret("db", "cGFzcw=="), deployment()];
        let op = SecretNamePatchOp::from_resources(&docs).unwrap();

        let out: Vec<_> = docs.into_iter().map(|d| op.apply(d).unwrap()).collect();
        assert_eq!(out[0].name(), Some("db-nh1zordu"));

        let pod = &out[1].as_value()["spec"]["template"]["spec"];
        let env = &pod["containers"][0]["env"];
        assert_eq!(env[0], json!({"name": "PLAIN", "value": "x"}));
        assert_eq!(env[1]["valueFrom"]["secretKeyRef"]["name"], "db-nh1zordu");
        assert_eq!(env[2]["valueFrom"]["secretKeyRef"]["name"], "unmanaged");
        assert_eq!(pod["containers"][0]["envFrom"][0]["secretRef"]["name"], "db-nh1zordu");
        assert_eq!(pod["volumes"][0]["secret"]["secretName"], "db-nh1zordu");
        assert_eq!(pod["volumes"][1], json!({"name": "scratch", "emptyDir": {}}));
    }

    #[test]
    fn test_sealed_secret_names() {
        let sealed = doc(json!({
            "apiVersion": "bitnami.com/v1alpha1",
            "kind": "SealedSecret",
            "metadata": {"name": "token"},
            "spec": {
                "encryptedData": {"token": "c2VjcmV0"},
                "template": {"metadata": {"name": "token"}}
            }
        }));
        let op = SecretNamePatchOp::from_resources(std::slice::from_ref(&sealed)).unwrap();
        let out = op.apply(sealed).unwrap();
        assert_eq!(out.name(), Some("token-yrqnc16p"));
        assert_eq!(out.as_value()["spec"]["template"]["metadata"]["name"], "token-yrqnc16p");
    }

    #[test]
    fn test_already_suffixed_secret_is_not_renamed_again() {
        let docs = vec![secret("db-nh1zordu", "cGFzcw=="), deployment()];
        let op = SecretNamePatchOp::from_resources(&docs).unwrap();
        assert_eq!(op.renamed("db-nh1zordu"), None);
        assert_eq!(op.renamed("db"), Some("db-nh1zordu"));

        let out: Vec<_> = docs.into_iter().map(|d| op.apply(d).unwrap()).collect();
        assert_eq!(out[0].name(), Some("db-nh1zordu"));

        let pod = &out[1].as_value()["spec"]["template"]["spec"];
        assert_eq!(pod["containers"][0]["env"][1]["valueFrom"]["secretKeyRef"]["name"], "db-nh1zordu");
        assert_eq!(pod["volumes"][0]["secret"]["secretName"], "db-nh1zordu");
    }
}
