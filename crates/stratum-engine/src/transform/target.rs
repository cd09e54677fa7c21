use serde::Deserialize;
use stratum_core::{Document, lens};

/// Selects the resources a patch applies to
///
/// Unset fields match anything. `group` and `version` are compared with the
/// two halves of the resource's `apiVersion` (`v1` is the core group `""`).
/// `name` and `namespace` are compared with the resource's `spec.name` and
/// `spec.namespace`, falling back to `metadata`; an undeclared namespace is
/// `default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TargetSpec {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Split `apiVersion` into (group, version)
fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.rsplit_once('/').unwrap_or(("", api_version))
}

impl TargetSpec {
    pub fn matches(&self, doc: &Document) -> bool {
        let (group, version) = split_api_version(doc.api_version().unwrap_or_default());

        let declared = |field: &str| {
            lens!["spec", field]
                .get(doc.as_value())
                .first()
                .and_then(|v| v.as_str())
                .or_else(|| {
                    lens!["metadata", field]
                        .get(doc.as_value())
                        .first()
                        .and_then(|v| v.as_str())
                })
        };

        let checks = [
            (self.group.as_deref(), Some(group)),
            (self.version.as_deref(), Some(version)),
            (self.kind.as_deref(), Some(doc.kind())),
            (self.name.as_deref(), declared("name")),
            (
                self.namespace.as_deref(),
                Some(declared("namespace").unwrap_or("default")),
            ),
        ];

        checks
            .iter()
            .all(|(wanted, actual)| wanted.is_none() || wanted == actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(value: serde_json::Value) -> TargetSpec {
        serde_json::from_value(value).unwrap()
    }

    fn deployment() -> Document {
        Document::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web"}
        }))
        .unwrap()
    }

    #[test]
    fn test_group_version_kind() {
        assert!(target(json!({})).matches(&deployment()));
        assert!(target(json!({"group": "apps", "version": "v1", "kind": "Deployment"})).matches(&deployment()));
        assert!(!target(json!({"group": "", "kind": "Deployment"})).matches(&deployment()));
        assert!(!target(json!({"kind": "StatefulSet"})).matches(&deployment()));
    }

    #[test]
    fn test_core_group() {
        let svc = Document::from_value(json!({"apiVersion": "v1", "kind": "Service"})).unwrap();
        assert!(target(json!({"group": "", "version": "v1"})).matches(&svc));
        assert!(!target(json!({"group": "apps"})).matches(&svc));
    }

    #[test]
    fn test_name_and_default_namespace() {
        assert!(target(json!({"name": "web", "namespace": "default"})).matches(&deployment()));
        assert!(!target(json!({"name": "api"})).matches(&deployment()));
        assert!(!target(json!({"namespace": "prod"})).matches(&deployment()));
    }

    #[test]
    fn test_spec_declared_name_wins() {
        let doc = Document::from_value(json!({
            "apiVersion": "example.com/v1",
            "kind": "Widget",
            "metadata": {"name": "widget-1", "namespace": "prod"},
            "spec": {"name": "primary"}
        }))
        .unwrap();
        assert!(target(json!({"name": "primary", "namespace": "prod"})).matches(&doc));
        assert!(!target(json!({"name": "widget-1"})).matches(&doc));
    }
}
