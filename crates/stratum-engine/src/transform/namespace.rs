use serde_json::Value as JsonValue;
use stratum_core::{Document, Step, Update, lens};

use super::Transformer;
use crate::error::Result;

/// Moves every namespaced resource into one namespace
///
/// Kinds starting with `Cluster` keep their (absent) `metadata.namespace`.
/// Role bindings also get every `subjects[].namespace` rewritten, and sealed
/// secrets their `spec.template.metadata.namespace`.
#[derive(Debug, Clone)]
pub struct NamespacePatchOp {
    namespace: String,
}

impl NamespacePatchOp {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Transformer for NamespacePatchOp {
    fn name(&self) -> &'static str {
        "namespace"
    }

    fn apply(&self, doc: Document) -> Result<Document> {
        let kind = doc.kind().to_string();
        let mut value = doc.into_value();
        let set = |_: Option<&JsonValue>| Update::Set(JsonValue::from(self.namespace.as_str()));

        if !kind.starts_with("Cluster") {
            value = lens!["metadata", "namespace"].update(&value, set)?;
        }

        match kind.as_str() {
            "ClusterRoleBinding" | "RoleBinding" => {
                value = lens!["subjects", Step::All, "namespace"].update(&value, set)?;
            }
            "SealedSecret" => {
                value = lens!["spec", "template", "metadata", "namespace"].update(&value, set)?;
            }
            _ => {}
        }

        Ok(Document::from_value(value)?)
    }
}
