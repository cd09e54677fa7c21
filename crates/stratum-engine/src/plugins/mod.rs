//! Builtin plugins
//!
//! All builtin plugins share one apiVersion and are told apart by `kind`:
//!
//! | kind                              | role        |
//! |-----------------------------------|-------------|
//! | `ManagedSecretGenerator`          | generator   |
//! | `ReleaseConfigMapGenerator`       | generator   |
//! | `ImageTagsFromReleaseTransformer` | transformer |
//! | `ImageRefsFromReleaseTransformer` | transformer |

mod image_release;
mod managed_secret;
mod release_config_map;

pub use image_release::{ImageRefsFromReleaseTransformer, ImageTagsFromReleaseTransformer};
pub use managed_secret::ManagedSecretGenerator;
pub use release_config_map::ReleaseConfigMapGenerator;

use serde::de::DeserializeOwned;
use stratum_core::Document;

use crate::error::{EngineError, Result};
use crate::plugin::PluginSource;

/// apiVersion of every builtin plugin placeholder
pub const API_VERSION: &str = "orbital.covalenthq.com/v1";

/// Annotation carrying a generated resource's content fingerprint
pub const FINGERPRINT_ANNOTATION: &str = "kustomizer.covalenthq.com/effective-fingerprint";

/// Name of the builtin plugin source
pub const BUILTIN_SOURCE: &str = "builtin";

pub fn builtin_source() -> PluginSource {
    PluginSource::new(BUILTIN_SOURCE)
        .generator(API_VERSION, "ManagedSecretGenerator", managed_secret::factory)
        .generator(API_VERSION, "ReleaseConfigMapGenerator", release_config_map::factory)
        .transformer(API_VERSION, "ImageTagsFromReleaseTransformer", image_release::tags_factory)
        .transformer(API_VERSION, "ImageRefsFromReleaseTransformer", image_release::refs_factory)
}

/// Deserialize a placeholder document into a plugin's configuration
fn config<T: DeserializeOwned>(doc: &Document) -> Result<T> {
    serde_json::from_value(doc.as_value().clone()).map_err(|e| EngineError::InvalidPluginConfig {
        resource: doc.display_name(),
        message: e.to_string(),
    })
}
