use std::fmt;

use serde_json::Value as JsonValue;
use stratum_core::{Document, Step, Update};

use super::{Transformer, container_lenses};
use crate::error::{EngineError, Result};
use crate::kustomization::ImageSpec;

/// A container image reference: `name:tag` or `name@digest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub name: String,
    pub reference: Reference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Tag(String),
    Digest(String),
}

impl ImageRef {
    /// Parse an image string; a reference without tag or digest means `latest`
    ///
    /// A `:` inside the registry host (`localhost:5000/app`) is not a tag.
    pub fn parse(image: &str) -> Self {
        if let Some((name, digest)) = image.split_once('@') {
            return Self {
                name: name.to_string(),
                reference: Reference::Digest(digest.to_string()),
            };
        }

        let name_start = image.rfind('/').map_or(0, |i| i + 1);
        match image[name_start..].rfind(':') {
            Some(i) => Self {
                name: image[..name_start + i].to_string(),
                reference: Reference::Tag(image[name_start + i + 1..].to_string()),
            },
            None => Self {
                name: image.to_string(),
                reference: Reference::Tag("latest".to_string()),
            },
        }
    }

    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        Self {
            reference: Reference::Tag(tag.into()),
            ..self
        }
    }

    pub fn with_digest(self, digest: impl Into<String>) -> Self {
        Self {
            reference: Reference::Digest(digest.into()),
            ..self
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Reference::Tag(tag) => write!(f, "{}:{}", self.name, tag),
            Reference::Digest(digest) => write!(f, "{}@{}", self.name, digest),
        }
    }
}

/// Rewrite every container image whose `name` matches `rewrite`'s choice
///
/// Shared by the `images:` transformer and the release plugins. The callback
/// returns the replacement reference, or `None` to leave the container alone.
pub(crate) fn rewrite_images<F>(doc: Document, mut rewrite: F) -> Result<Document>
where
    F: FnMut(ImageRef) -> Option<ImageRef>,
{
    let lenses = container_lenses(doc.kind(), &[Step::from("image")]);
    if lenses.is_empty() {
        return Ok(doc);
    }

    let mut value = doc.into_value();
    for lens in lenses {
        value = lens.update(&value, |current| {
            let Some(image) = current.and_then(JsonValue::as_str) else {
                return Update::Keep;
            };
            match rewrite(ImageRef::parse(image)).map(|r| r.to_string()) {
                Some(new_image) if new_image != image => Update::Set(JsonValue::from(new_image)),
                _ => Update::Keep,
            }
        })?;
    }

    Ok(Document::from_value(value)?)
}

/// An `images:` override
///
/// Only containers whose parsed image name equals `name` are rewritten;
/// every other container is left untouched.
#[derive(Debug, Clone)]
pub struct ImagePatchOp {
    name: String,
    new_name: Option<String>,
    reference: Option<Reference>,
}

impl ImagePatchOp {
    pub fn from_spec(spec: &ImageSpec) -> Result<Self> {
        let reference = match (&spec.new_tag, &spec.digest) {
            (Some(_), Some(_)) => {
                return Err(EngineError::ConflictingSpec {
                    name: spec.name.clone(),
                    message: "newTag and digest are mutually exclusive".to_string(),
                });
            }
            (Some(tag), None) => Some(Reference::Tag(tag.clone())),
            (None, Some(digest)) => Some(Reference::Digest(digest.clone())),
            (None, None) => None,
        };

        Ok(Self {
            name: spec.name.clone(),
            new_name: spec.new_name.clone(),
            reference,
        })
    }
}

impl Transformer for ImagePatchOp {
    fn name(&self) -> &'static str {
        "image"
    }

    fn apply(&self, doc: Document) -> Result<Document> {
        rewrite_images(doc, |image| {
            if image.name != self.name {
                return None;
            }
            Some(ImageRef {
                name: self.new_name.clone().unwrap_or(image.name),
                reference: self.reference.clone().unwrap_or(image.reference),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment() -> Document {
        Document::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "spec": {"template": {"spec": {
                "initContainers": [{"name": "migrate", "image": "a:1"}],
                "containers": [
                    {"name": "a", "image": "a"},
                    {"name": "b", "image": "b:1", "ports": [{"containerPort": 80}]}
                ]
            }}}
        }))
        .unwrap()
    }

    fn op(spec: ImageSpec) -> ImagePatchOp {
        ImagePatchOp::from_spec(&spec).unwrap()
    }

    #[test]
    fn test_parse_image_refs() {
        assert_eq!(ImageRef::parse("nginx").to_string(), "nginx:latest");
        assert_eq!(ImageRef::parse("nginx:1.25").reference, Reference::Tag("1.25".into()));
        assert_eq!(ImageRef::parse("localhost:5000/app").name, "localhost:5000/app");
        assert_eq!(ImageRef::parse("localhost:5000/app:v1").name, "localhost:5000/app");
        let digest = ImageRef::parse("gcr.io/acme/app@sha256:abc");
        assert_eq!(digest.name, "gcr.io/acme/app");
        assert_eq!(digest.reference, Reference::Digest("sha256:abc".into()));
    }

    #[test]
    fn test_only_matching_container_changes() {
        let input = deployment();
        let out = op(ImageSpec {
            name: "a".into(),
            new_tag: Some("v2".into()),
            ..Default::default()
        })
        .apply(input.clone())
        .unwrap();

        let containers = &out.as_value()["spec"]["template"]["spec"]["containers"];
        assert_eq!(containers[0]["image"], "a:v2");
        assert_eq!(
            containers[1],
            input.as_value()["spec"]["template"]["spec"]["containers"][1]
        );
        assert_eq!(
            out.as_value()["spec"]["template"]["spec"]["initContainers"][0]["image"],
            "a:v2"
        );
    }

    #[test]
    fn test_digest_replaces_tag_and_new_name() {
        let out = op(ImageSpec {
            name: "b".into(),
            new_name: Some("registry.local/b".into()),
            digest: Some("sha256:ff".into()),
            ..Default::default()
        })
        .apply(deployment())
        .unwrap();
        assert_eq!(
            out.as_value()["spec"]["template"]["spec"]["containers"][1]["image"],
            "registry.local/b@sha256:ff"
        );
    }

    #[test]
    fn test_conflicting_spec() {
        let err = ImagePatchOp::from_spec(&ImageSpec {
            name: "a".into(),
            new_tag: Some("v2".into()),
            digest: Some("sha256:ff".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::ConflictingSpec { .. }));
    }

    #[test]
    fn test_non_workload_untouched() {
        let cm = Document::from_value(json!({"kind": "ConfigMap", "data": {"image": "a:1"}})).unwrap();
        let out = op(ImageSpec {
            name: "a".into(),
            new_tag: Some("v2".into()),
            ..Default::default()
        })
        .apply(cm.clone())
        .unwrap();
        assert_eq!(out, cm);
    }
}
