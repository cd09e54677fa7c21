//! Top-level composition entry points

use std::path::Path;

use stratum_core::Document;

use crate::emitter::Composer;
use crate::error::Result;
use crate::session::Session;

/// Compose the resource stream rooted at `root` (a directory or a file)
///
/// Each call builds a fresh emitter graph, so changes on disk between calls
/// are picked up.
pub fn compose<P: AsRef<Path>>(root: P, session: &Session) -> Result<Vec<Document>> {
    let root = root.as_ref();
    tracing::debug!("composing {}", root.display());

    let docs = Composer::new(session).emit_path(root)?;
    Ok(docs.to_vec())
}

/// Render documents as a `---`-separated YAML stream
pub fn to_yaml_stream(docs: &[Document]) -> Result<String> {
    Ok(stratum_core::to_yaml_stream(docs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use stratum_core::content_suffix;
    use tempfile::TempDir;

    const OVERLAY: &str = r#"apiVersion: kustomize.config.k8s.io/v1beta1
kind: Kustomization
namespace: staging
bases:
  - ../../base
"#;

    const BASE: &str = r#"kind: Kustomization
resources:
  - secret.yaml
  - deployment.yaml
"#;

    const SECRET: &str = r#"apiVersion: v1
kind: Secret
metadata:
  name: db
data:
  password: cGFzcw==
"#;

    const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
        - name: web
          image: nginx
          env:
            - name: DB_PASSWORD
              valueFrom:
                secretKeyRef:
                  name: db
                  key: password
"#;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("base")).unwrap();
        std::fs::create_dir_all(root.join("overlays/staging")).unwrap();
        std::fs::write(root.join("base/kustomization.yaml"), BASE).unwrap();
        std::fs::write(root.join("base/secret.yaml"), SECRET).unwrap();
        std::fs::write(root.join("base/deployment.yaml"), DEPLOYMENT).unwrap();
        std::fs::write(root.join("overlays/staging/kustomization.yaml"), OVERLAY).unwrap();
        dir
    }

    #[test]
    fn test_overlay_renames_secret_and_references() {
        let dir = tree();
        let session = Session::builder().build();
        let docs = compose(dir.path().join("overlays/staging"), &session).unwrap();

        let suffix = content_suffix(&serde_json::json!({"password": "cGFzcw=="}), 8).unwrap();
        assert_eq!(suffix, "nh1zordu");

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].kind(), "Secret");
        assert_eq!(docs[0].name(), Some("db-nh1zordu"));
        assert_eq!(docs[0].namespace(), Some("staging"));
        assert_eq!(
            docs[1].as_value()["spec"]["template"]["spec"]["containers"][0]["env"][0]["valueFrom"]
                ["secretKeyRef"]["name"],
            "db-nh1zordu"
        );

        insta::assert_snapshot!(to_yaml_stream(&docs).unwrap(), @r"
        ---
        apiVersion: v1
        kind: Secret
        metadata:
          name: db-nh1zordu
          namespace: staging
        data:
          password: cGFzcw==
        ---
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: web
          namespace: staging
        spec:
          template:
            spec:
              containers:
              - name: web
                image: nginx
                env:
                - name: DB_PASSWORD
                  valueFrom:
                    secretKeyRef:
                      name: db-nh1zordu
                      key: password
        ");
    }

    #[test]
    fn test_repeated_composition_is_identical() {
        let dir = tree();
        let session = Session::builder().build();
        let root = dir.path().join("overlays/staging");

        let first = to_yaml_stream(&compose(&root, &session).unwrap()).unwrap();
        let second = to_yaml_stream(&compose(&root, &session).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sibling_bases_follow_renamed_secret() {
        let dir = tree();
        let root = dir.path();
        std::fs::create_dir_all(root.join("secrets")).unwrap();
        std::fs::create_dir_all(root.join("app")).unwrap();
        std::fs::create_dir_all(root.join("overlays/split")).unwrap();
        std::fs::copy(root.join("base/secret.yaml"), root.join("secrets/secret.yaml")).unwrap();
        std::fs::copy(root.join("base/deployment.yaml"), root.join("app/deployment.yaml")).unwrap();
        std::fs::write(
            root.join("secrets/kustomization.yaml"),
            "kind: Kustomization\nresources:\n  - secret.yaml\n",
        )
        .unwrap();
        std::fs::write(
            root.join("app/kustomization.yaml"),
            "kind: Kustomization\nresources:\n  - deployment.yaml\n",
        )
        .unwrap();
        std::fs::write(
            root.join("overlays/split/kustomization.yaml"),
            "kind: Kustomization\nbases:\n  - ../../secrets\n  - ../../app\n",
        )
        .unwrap();

        let session = Session::builder().build();
        let docs = compose(root.join("overlays/split"), &session).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name(), Some("db-nh1zordu"));
        assert_eq!(
            docs[1].as_value()["spec"]["template"]["spec"]["containers"][0]["env"][0]["valueFrom"]
                ["secretKeyRef"]["name"],
            "db-nh1zordu"
        );
    }

    #[test]
    fn test_compose_single_file() {
        let dir = tree();
        let session = Session::builder().build();
        let docs = compose(dir.path().join("base/secret.yaml"), &session).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name(), Some("db"));
    }

    #[test]
    fn test_missing_root() {
        let session = Session::builder().build();
        match compose("/nonexistent/stratum/root", &session).unwrap_err() {
            EngineError::PathNotFound { referenced_from, .. } => {
                assert_eq!(referenced_from, "<root>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
