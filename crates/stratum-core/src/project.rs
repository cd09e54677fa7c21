//! Project and release metadata
//!
//! A project is configured by `.stratum.yaml` at its root. The proposed
//! release is not persisted; it is attached per invocation by the caller.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Project configuration file name
pub const CONFIG_FILE: &str = ".stratum.yaml";

/// Builder kind whose steps produce container images
pub const DOCKER_IMAGE_BUILDER: &str = "docker_image";

/// Artifact type recorded for pushed container images
pub const DOCKER_IMAGE_ARTIFACT: &str = "DockerImage";

// =============================================================================
// PROJECT
// =============================================================================

/// Build and deploy configuration for one project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project root (directory holding `.stratum.yaml`)
    #[serde(skip)]
    pub root: PathBuf,

    /// Ordered build steps
    #[serde(default)]
    pub build_steps: Vec<BuildStep>,

    /// Build steps per artifact name
    #[serde(default)]
    pub artifact_blueprints: IndexMap<String, Vec<BuildStep>>,

    /// Managed-secrets store location
    #[serde(default)]
    pub secrets: Option<SecretsConfig>,

    /// Directory holding the deploy overlays, relative to `root`
    #[serde(default = "default_kustomization_dir")]
    pub kustomization_dir: PathBuf,

    /// Release being composed, if any
    #[serde(skip)]
    pub proposed_release: Option<Release>,
}

fn default_kustomization_dir() -> PathBuf {
    PathBuf::from("deploy")
}

impl Default for Project {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            build_steps: Vec::new(),
            artifact_blueprints: IndexMap::new(),
            secrets: None,
            kustomization_dir: default_kustomization_dir(),
            proposed_release: None,
        }
    }
}

impl Project {
    /// Load `.stratum.yaml` from `root`; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let config_path = root.join(CONFIG_FILE);

        let mut project = if config_path.is_file() {
            let content = std::fs::read_to_string(&config_path)?;
            if content.trim().is_empty() {
                Self::default()
            } else {
                serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidProject {
                    message: format!("{}: {}", config_path.display(), e),
                })?
            }
        } else {
            Self::default()
        };

        project.root = root;
        Ok(project)
    }

    /// Attach (or clear) the proposed release
    pub fn with_release(mut self, release: Option<Release>) -> Self {
        self.proposed_release = release;
        self
    }

    /// Absolute directory holding the deploy overlays
    pub fn kustomization_root(&self) -> PathBuf {
        self.root.join(&self.kustomization_dir)
    }

    /// Absolute directory of the managed-secrets store, if configured
    pub fn secrets_dir(&self) -> Option<PathBuf> {
        self.secrets.as_ref().map(|s| self.root.join(&s.dir))
    }

    /// Image names produced by `docker_image` build steps
    pub fn build_step_image_names(&self) -> IndexSet<String> {
        self.build_steps
            .iter()
            .filter_map(BuildStep::image_name)
            .map(str::to_string)
            .collect()
    }

    /// Image names produced by `docker_image` steps of any artifact blueprint
    pub fn blueprint_image_names(&self) -> IndexSet<String> {
        self.artifact_blueprints
            .values()
            .flatten()
            .filter_map(BuildStep::image_name)
            .map(str::to_string)
            .collect()
    }
}

/// One step of a build pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStep {
    pub name: String,
    pub builder: String,
    #[serde(default)]
    pub params: IndexMap<String, JsonValue>,
}

impl BuildStep {
    /// `params.image_name` of a `docker_image` step
    pub fn image_name(&self) -> Option<&str> {
        if self.builder != DOCKER_IMAGE_BUILDER {
            return None;
        }
        self.params.get("image_name").and_then(JsonValue::as_str)
    }
}

/// Managed-secrets store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsConfig {
    /// Store directory, relative to the project root
    pub dir: PathBuf,
    /// Namespaces every newly sealed part is sealed for
    #[serde(default)]
    pub seal_for_namespaces: Vec<String>,
}

// =============================================================================
// RELEASE
// =============================================================================

/// Metadata of the release being composed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub tag_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub from_git_ref: Option<String>,
    #[serde(default)]
    pub from_git_branch: Option<String>,
    /// Per-artifact attributes, e.g. `type`, `image.name`, `image.digest`
    #[serde(default)]
    pub artifacts: IndexMap<String, IndexMap<String, String>>,
}

impl Release {
    pub fn new(tag_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            tag_name: tag_name.into(),
            created_at,
            from_git_ref: None,
            from_git_branch: None,
            artifacts: IndexMap::new(),
        }
    }

    /// Read an artifacts map (`name -> {key: value}`) from a YAML file
    pub fn load_artifacts<P: AsRef<Path>>(
        path: P,
    ) -> Result<IndexMap<String, IndexMap<String, String>>> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(IndexMap::new());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// `image.name -> image.digest` for every pushed container image
    pub fn image_digests(&self) -> IndexMap<&str, &str> {
        self.artifacts
            .values()
            .filter(|af| af.get("type").map(String::as_str) == Some(DOCKER_IMAGE_ARTIFACT))
            .filter_map(|af| {
                let name = af.get("image.name")?;
                let digest = af.get("image.digest")?;
                Some((name.as_str(), digest.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
buildSteps:
  - name: app
    builder: docker_image
    params:
      image_name: gcr.io/acme/app
  - name: assets
    builder: bucket_upload
    params:
      bucket: static
artifactBlueprints:
  worker:
    - name: worker
      builder: docker_image
      params:
        image_name: gcr.io/acme/worker
secrets:
  dir: secrets
  sealForNamespaces: [staging, production]
"#;

    #[test]
    fn test_load_project_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), CONFIG).unwrap();

        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.build_steps.len(), 2);
        assert_eq!(project.kustomization_root(), dir.path().join("deploy"));
        assert_eq!(project.secrets_dir(), Some(dir.path().join("secrets")));
        assert_eq!(
            project.secrets.as_ref().unwrap().seal_for_namespaces,
            vec!["staging", "production"]
        );
        assert!(project.proposed_release.is_none());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let project = Project::load(dir.path()).unwrap();
        assert!(project.build_steps.is_empty());
        assert!(project.secrets.is_none());
        assert_eq!(project.kustomization_dir, PathBuf::from("deploy"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "buildSteps: 3\n").unwrap();
        let err = Project::load(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidProject { .. }));
    }

    #[test]
    fn test_image_names_only_from_docker_steps() {
        let project: Project = serde_yaml::from_str(CONFIG).unwrap();
        let names: Vec<_> = project.build_step_image_names().into_iter().collect();
        assert_eq!(names, vec!["gcr.io/acme/app"]);
        let names: Vec<_> = project.blueprint_image_names().into_iter().collect();
        assert_eq!(names, vec!["gcr.io/acme/worker"]);
    }

    #[test]
    fn test_release_image_digests() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut release = Release::new("v1.2.0", created);
        release.artifacts.insert(
            "worker".into(),
            IndexMap::from([
                ("type".to_string(), "DockerImage".to_string()),
                ("image.name".to_string(), "gcr.io/acme/worker".to_string()),
                ("image.digest".to_string(), "sha256:abc".to_string()),
            ]),
        );
        release.artifacts.insert(
            "app".into(),
            IndexMap::from([
                ("type".to_string(), "DockerImage".to_string()),
                ("image.name".to_string(), "gcr.io/acme/app".to_string()),
            ]),
        );

        let digests = release.image_digests();
        assert_eq!(digests.len(), 1);
        assert_eq!(digests.get("gcr.io/acme/worker"), Some(&"sha256:abc"));
    }
}
