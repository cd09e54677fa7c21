//! Document transformers
//!
//! Each transformer is a pure `Document -> Document` rewrite configured at
//! construction. A transformer that does not apply to a document returns it
//! unchanged.

mod image;
mod json6902;
mod namespace;
mod secret_name;
mod target;

pub use image::{ImagePatchOp, ImageRef, Reference};
pub(crate) use image::rewrite_images;
pub use json6902::Json6902PatchOp;
pub use namespace::NamespacePatchOp;
pub use secret_name::SecretNamePatchOp;
pub use target::TargetSpec;

use stratum_core::{Document, Lens, Step};

use crate::error::Result;

/// A document rewrite
pub trait Transformer {
    /// Short name used in trace output
    fn name(&self) -> &'static str;

    fn apply(&self, doc: Document) -> Result<Document>;
}

/// Fold `op` over every document, in order
pub fn apply_all(op: &dyn Transformer, docs: Vec<Document>) -> Result<Vec<Document>> {
    tracing::trace!("applying {} to {} documents", op.name(), docs.len());
    docs.into_iter().map(|doc| op.apply(doc)).collect()
}

/// Workload kinds whose pod spec lives at `spec.template.spec`
pub(crate) const POD_TEMPLATE_KINDS: &[&str] =
    &["Deployment", "StatefulSet", "DaemonSet", "ReplicaSet", "Job"];

/// Path to the pod spec of a workload kind
pub(crate) fn pod_spec_path(kind: &str) -> Option<Vec<Step>> {
    let path: &[&str] = match kind {
        "Pod" => &["spec"],
        "CronJob" => &["spec", "jobTemplate", "spec", "template", "spec"],
        k if POD_TEMPLATE_KINDS.contains(&k) => &["spec", "template", "spec"],
        _ => return None,
    };
    Some(path.iter().map(|&s| Step::from(s)).collect())
}

/// Lenses over `pod spec / <containers|initContainers>[*] / rest...`
pub(crate) fn container_lenses(kind: &str, rest: &[Step]) -> Vec<Lens> {
    let Some(pod_spec) = pod_spec_path(kind) else {
        return Vec::new();
    };

    ["containers", "initContainers"]
        .into_iter()
        .map(|list| {
            let mut steps = pod_spec.clone();
            steps.push(Step::from(list));
            steps.push(Step::All);
            steps.extend_from_slice(rest);
            Lens::new(steps)
        })
        .collect()
}
