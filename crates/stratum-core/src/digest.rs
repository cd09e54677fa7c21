//! Content digests for content-addressed resource names
//!
//! Secret payloads are hashed over a canonical JSON serialization: object keys
//! sorted lexicographically at every depth, compact separators, no trailing
//! newline. The SHA-256 digest is rendered in the z-base-32 alphabet
//! (most-significant bit first, no padding) and truncated by the caller.

use data_encoding::{Encoding, Specification};
use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// z-base-32 alphabet (human-oriented base-32)
pub const ZBASE32_ALPHABET: &str = "ybndrfg8ejkmcpqxot1uwisza345h769";

static ZBASE32: Lazy<Encoding> = Lazy::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str(ZBASE32_ALPHABET);
    spec.encoding()
        .expect("z-base-32 alphabet is a valid 32-symbol specification")
});

/// Encode arbitrary bytes as z-base-32
pub fn zbase32(bytes: &[u8]) -> String {
    ZBASE32.encode(bytes)
}

/// SHA-256 of `input`, z-base-32 encoded (52 characters)
pub fn zbase32_sha256(input: &[u8]) -> String {
    zbase32(&Sha256::digest(input))
}

/// Serialize a value with sorted object keys and compact separators
pub fn canonical_json(value: &JsonValue) -> Result<String> {
    Ok(serde_json::to_string(&sorted(value))?)
}

/// Digest suffix of `len` characters over the canonical form of `value`
pub fn content_suffix(value: &JsonValue, len: usize) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut digest = zbase32_sha256(canonical.as_bytes());
    digest.truncate(len);
    Ok(digest)
}

fn sorted(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            JsonValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
