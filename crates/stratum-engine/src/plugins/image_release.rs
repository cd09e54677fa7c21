use indexmap::{IndexMap, IndexSet};
use stratum_core::{Document, Release};

use crate::error::Result;
use crate::plugin::{Plugin, TransformerPlugin};
use crate::session::Session;
use crate::transform::{ImageRef, rewrite_images};

/// Retags images built by the project's own build steps with the release tag
pub struct ImageTagsFromReleaseTransformer {
    images: IndexSet<String>,
    tag: Option<String>,
}

pub(super) fn tags_factory(_doc: &Document, session: &Session) -> Result<Plugin> {
    Ok(Plugin::Transformer(Box::new(ImageTagsFromReleaseTransformer::new(
        session.project().build_step_image_names(),
        session.proposed_release(),
    ))))
}

impl ImageTagsFromReleaseTransformer {
    pub fn new(images: IndexSet<String>, release: Option<&Release>) -> Self {
        Self {
            images,
            tag: release.map(|r| r.tag_name.clone()),
        }
    }
}

impl TransformerPlugin for ImageTagsFromReleaseTransformer {
    fn transform(&self, doc: Document) -> Result<Document> {
        let Some(tag) = &self.tag else {
            return Ok(doc);
        };
        rewrite_images(doc, |image| {
            self.images
                .contains(&image.name)
                .then(|| image.with_tag(tag.as_str()))
        })
    }
}

/// Pins images of the project's artifact blueprints to the released build
///
/// An image pushed with this release is pinned by digest; any other
/// release-controlled image gets the release tag.
pub struct ImageRefsFromReleaseTransformer {
    images: IndexSet<String>,
    release: Option<ReleaseRefs>,
}

struct ReleaseRefs {
    tag: String,
    digests: IndexMap<String, String>,
}

pub(super) fn refs_factory(_doc: &Document, session: &Session) -> Result<Plugin> {
    Ok(Plugin::Transformer(Box::new(ImageRefsFromReleaseTransformer::new(
        session.project().blueprint_image_names(),
        session.proposed_release(),
    ))))
}

impl ImageRefsFromReleaseTransformer {
    pub fn new(images: IndexSet<String>, release: Option<&Release>) -> Self {
        let release = release.map(|r| ReleaseRefs {
            tag: r.tag_name.clone(),
            digests: r
                .image_digests()
                .into_iter()
                .map(|(name, digest)| (name.to_string(), digest.to_string()))
                .collect(),
        });
        Self { images, release }
    }

    fn pin(&self, release: &ReleaseRefs, image: ImageRef) -> Option<ImageRef> {
        if !self.images.contains(&image.name) {
            return None;
        }
        let pinned = match release.digests.get(&image.name) {
            Some(digest) => image.with_digest(digest.as_str()),
            None => image.with_tag(release.tag.as_str()),
        };
        Some(pinned)
    }
}

impl TransformerPlugin for ImageRefsFromReleaseTransformer {
    fn transform(&self, doc: Document) -> Result<Document> {
        let Some(release) = &self.release else {
            return Ok(doc);
        };
        rewrite_images(doc, |image| self.pin(release, image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginFactory;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use stratum_core::Project;

    const PROJECT: &str = r#"
buildSteps:
  - name: app
    builder: docker_image
    params:
      image_name: gcr.io/acme/app
artifactBlueprints:
  worker:
    - name: worker
      builder: docker_image
      params:
        image_name: gcr.io/acme/worker
  cron:
    - name: cron
      builder: docker_image
      params:
        image_name: gcr.io/acme/cron
"#;

    fn release() -> Release {
        let mut release = Release::new("v2.0.0", Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        release.artifacts.insert(
            "worker".to_string(),
            IndexMap::from([
                ("type".to_string(), "DockerImage".to_string()),
                ("image.name".to_string(), "gcr.io/acme/worker".to_string()),
                ("image.digest".to_string(), "sha256:abc123".to_string()),
            ]),
        );
        release
    }

    fn session(release: Option<Release>) -> Session {
        let project: Project = serde_yaml::from_str(PROJECT).unwrap();
        Session::builder().project(project.with_release(release)).build()
    }

    fn deployment() -> Document {
        Document::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "spec": {"template": {"spec": {"containers": [
                {"name": "app", "image": "gcr.io/acme/app:dev"},
                {"name": "worker", "image": "gcr.io/acme/worker:dev"},
                {"name": "cron", "image": "gcr.io/acme/cron"},
                {"name": "proxy", "image": "envoyproxy/envoy:v1.29"}
            ]}}}
        }))
        .unwrap()
    }

    fn images(doc: &Document) -> Vec<&str> {
        doc.as_value()["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["image"].as_str())
            .collect()
    }

    fn transformer(factory: PluginFactory, session: &Session) -> Box<dyn TransformerPlugin> {
        let placeholder = Document::from_value(json!({
            "apiVersion": "orbital.covalenthq.com/v1",
            "kind": "Placeholder"
        }))
        .unwrap();
        match factory(&placeholder, session).unwrap() {
            Plugin::Transformer(plugin) => plugin,
            Plugin::Generator(_) => panic!("expected a transformer"),
        }
    }

    #[test]
    fn test_tags_from_release() {
        let session = session(Some(release()));
        let doc = transformer(tags_factory, &session).transform(deployment()).unwrap();
        assert_eq!(
            images(&doc),
            vec![
                "gcr.io/acme/app:v2.0.0",
                "gcr.io/acme/worker:dev",
                "gcr.io/acme/cron",
                "envoyproxy/envoy:v1.29"
            ]
        );
    }

    #[test]
    fn test_refs_from_release() {
        let session = session(Some(release()));
        let doc = transformer(refs_factory, &session).transform(deployment()).unwrap();
        assert_eq!(
            images(&doc),
            vec![
                "gcr.io/acme/app:dev",
                "gcr.io/acme/worker@sha256:abc123",
                "gcr.io/acme/cron:v2.0.0",
                "envoyproxy/envoy:v1.29"
            ]
        );
    }

    #[test]
    fn test_no_release_is_a_no_op() {
        let session = session(None);
        for factory in [tags_factory, refs_factory] {
            let doc = transformer(factory, &session).transform(deployment()).unwrap();
            assert_eq!(doc, deployment());
        }
    }
}
