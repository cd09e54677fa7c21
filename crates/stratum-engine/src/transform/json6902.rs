use std::path::Path;

use serde_json::Value as JsonValue;
use stratum_core::{Document, Lens, Update};

use super::{TargetSpec, Transformer};
use crate::error::{EngineError, Result};
use crate::kustomization::{PatchOp, PatchOpKind, PatchSpec};

/// A targeted list of add/replace/remove operations
///
/// Paths use `/` separators, `~1` for a literal `/`, numeric segments for
/// sequence indices and `:all` for every element of a sequence. Resources not
/// selected by the target pass through unchanged. A wildcard `remove` skips
/// elements that lack the value.
#[derive(Debug, Clone)]
pub struct Json6902PatchOp {
    target: TargetSpec,
    ops: Vec<(PatchOp, Lens)>,
}

impl Json6902PatchOp {
    pub fn new(target: TargetSpec, ops: Vec<PatchOp>) -> Result<Self> {
        let ops = ops
            .into_iter()
            .map(|op| -> Result<(PatchOp, Lens)> {
                let lens = Lens::from_pointer(&op.path)?;
                Ok((op, lens))
            })
            .collect::<Result<_>>()?;
        Ok(Self { target, ops })
    }

    /// Build from a kustomization entry, reading `path` relative to `dir`
    pub fn from_spec(spec: &PatchSpec, dir: &Path) -> Result<Self> {
        let invalid = |message: String| EngineError::InvalidKustomization {
            path: dir.display().to_string(),
            message,
        };

        let ops = match (&spec.ops, &spec.patch, &spec.path) {
            (Some(ops), None, None) => ops.clone(),
            (None, Some(inline), None) => {
                serde_yaml::from_str(inline).map_err(|e| invalid(format!("inline patch: {}", e)))?
            }
            (None, None, Some(file)) => {
                let path = dir.join(file);
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| EngineError::io(&path, e))?;
                serde_yaml::from_str(&content)
                    .map_err(|e| invalid(format!("patch file {}: {}", path.display(), e)))?
            }
            (None, None, None) => {
                return Err(invalid("patch declares none of path, patch or ops".to_string()));
            }
            _ => {
                return Err(invalid(
                    "patch must declare exactly one of path, patch or ops".to_string(),
                ));
            }
        };

        Self::new(spec.target.clone(), ops)
    }

    fn apply_op(
        &self,
        op: &PatchOp,
        lens: &Lens,
        value: JsonValue,
        resource: &str,
    ) -> Result<JsonValue> {
        let precondition = |message: &str| EngineError::PatchPrecondition {
            op: op.op.to_string(),
            path: op.path.clone(),
            resource: resource.to_string(),
            message: message.to_string(),
        };
        let occupied = !lens.get(&value).into_vec().is_empty();

        match op.op {
            PatchOpKind::Add => {
                if occupied {
                    return Err(precondition("a value already exists at this location"));
                }
                if lens.has_wildcard() {
                    Ok(lens.update(&value, |_| Update::Set(op.value.clone()))?)
                } else {
                    Ok(lens.put(&value, op.value.clone())?)
                }
            }
            PatchOpKind::Replace => {
                if !occupied {
                    return Err(precondition("no value exists at this location"));
                }
                Ok(lens.update(&value, |current| match current {
                    Some(_) => Update::Set(op.value.clone()),
                    None => Update::Keep,
                })?)
            }
            PatchOpKind::Remove => {
                let removal = lens.remove(&value)?;
                if !lens.has_wildcard() && (removal.missing > 0 || removal.removed.is_empty()) {
                    return Err(precondition("no value exists at this location"));
                }
                Ok(removal.document)
            }
        }
    }
}

impl Transformer for Json6902PatchOp {
    fn name(&self) -> &'static str {
        "json6902"
    }

    fn apply(&self, doc: Document) -> Result<Document> {
        if !self.target.matches(&doc) {
            return Ok(doc);
        }

        let resource = doc.display_name();
        let mut value = doc.into_value();
        for (op, lens) in &self.ops {
            value = self.apply_op(op, lens, value, &resource)?;
        }
        Ok(Document::from_value(value)?)
    }
}
