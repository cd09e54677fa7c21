//! Build command - compose a kustomization tree into one resource stream

use chrono::Utc;
use clap::Args;
use console::style;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use stratum_core::{FileSecretStore, Project, Release, SecretStore};
use stratum_engine::{Session, compose, to_yaml_stream};

use crate::error::{CliError, Result};

/// Release metadata attached to the composition
#[derive(Args, Debug, Default, Clone)]
pub struct ReleaseArgs {
    /// Release tag (default: v<UTC timestamp>)
    #[arg(long, env = "STRATUM_RELEASE_TAG")]
    pub tag: Option<String>,

    /// Git ref the release is built from
    #[arg(long, env = "STRATUM_GIT_REF")]
    pub git_ref: Option<String>,

    /// Git branch the release is built from
    #[arg(long, env = "STRATUM_GIT_BRANCH")]
    pub git_branch: Option<String>,

    /// YAML file mapping artifact names to their attributes
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Compose without a proposed release
    #[arg(long)]
    pub no_release: bool,
}

impl ReleaseArgs {
    /// The proposed release; None with `--no-release`
    pub fn to_release(&self) -> Result<Option<Release>> {
        if self.no_release {
            return Ok(None);
        }

        let created_at = Utc::now();
        let tag = self
            .tag
            .clone()
            .unwrap_or_else(|| created_at.format("v%Y%m%d%H%M%S").to_string());

        let mut release = Release::new(tag, created_at);
        release.from_git_ref = self.git_ref.clone();
        release.from_git_branch = self.git_branch.clone();

        if let Some(path) = &self.artifacts {
            release.artifacts = Release::load_artifacts(path).map_err(|e| {
                CliError::config_with_help(
                    format!("Failed to load artifacts from {}: {}", path.display(), e),
                    "the artifacts file maps each artifact name to string attributes",
                )
            })?;
        }

        Ok(Some(release))
    }
}

pub struct BuildArgs {
    pub path: Option<PathBuf>,
    pub project: PathBuf,
    pub env: Option<String>,
    pub output: Option<PathBuf>,
    pub release: ReleaseArgs,
}

pub fn run(args: &BuildArgs) -> Result<()> {
    let project = Project::load(&args.project)?.with_release(args.release.to_release()?);
    let root = resolve_root(args, &project)?;

    if let Some(release) = &project.proposed_release {
        tracing::debug!("proposed release {}", release.tag_name);
    }

    let session = build_session(project)?;
    let docs = compose(&root, &session)?;
    let stream = to_yaml_stream(&docs)?;

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(path, &stream)?;
            eprintln!(
                "{} {} ({} resources)",
                style("wrote").green(),
                path.display(),
                docs.len()
            );
        }
        None => print!("{}", stream),
    }

    Ok(())
}

/// Explicit path, else the env overlay or the project's kustomization directory
fn resolve_root(args: &BuildArgs, project: &Project) -> Result<PathBuf> {
    if let Some(path) = &args.path {
        return Ok(path.clone());
    }

    let root = match &args.env {
        Some(env) => project.kustomization_root().join(env),
        None => project.kustomization_root(),
    };
    if !root.is_dir() {
        return Err(CliError::config_with_help(
            format!("Kustomization directory {} does not exist", root.display()),
            "set kustomizationDir in .stratum.yaml, or pass the directory to build",
        ));
    }
    Ok(root)
}

fn build_session(project: Project) -> Result<Session> {
    let mut builder = Session::builder();

    if let (Some(dir), Some(config)) = (project.secrets_dir(), project.secrets.as_ref()) {
        let store = FileSecretStore::open(&dir, config.seal_for_namespaces.clone())?;
        tracing::debug!("loaded {} managed secrets from {}", store.secrets().len(), dir.display());
        builder = builder.secret_store(Arc::new(store));
    }

    Ok(builder.project(project).build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_release_tag() {
        let release = ReleaseArgs::default().to_release().unwrap().unwrap();
        assert!(release.tag_name.starts_with('v'));
        assert_eq!(release.tag_name.len(), "v20240501120000".len());
        assert!(release.from_git_ref.is_none());
    }

    #[test]
    fn test_no_release() {
        let args = ReleaseArgs {
            tag: Some("v1".into()),
            no_release: true,
            ..Default::default()
        };
        assert!(args.to_release().unwrap().is_none());
    }

    #[test]
    fn test_release_artifacts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artifacts.yaml");
        fs::write(
            &path,
            "worker:\n  type: DockerImage\n  image.name: gcr.io/acme/worker\n  image.digest: sha256:abc\n",
        )
        .unwrap();

        let args = ReleaseArgs {
            tag: Some("v1.0.0".into()),
            artifacts: Some(path),
            ..Default::default()
        };
        let release = args.to_release().unwrap().unwrap();
        assert_eq!(release.tag_name, "v1.0.0");
        assert_eq!(release.image_digests().get("gcr.io/acme/worker"), Some(&"sha256:abc"));
    }

    #[test]
    fn test_missing_env_overlay() {
        let dir = TempDir::new().unwrap();
        let project = Project::load(dir.path()).unwrap();
        let args = BuildArgs {
            path: None,
            project: dir.path().to_path_buf(),
            env: Some("staging".into()),
            output: None,
            release: ReleaseArgs::default(),
        };
        let err = resolve_root(&args, &project).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }
}
