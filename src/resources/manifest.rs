//! Decoding YAML or JSON manifests into typed objects.
//!
//! Only the first document of a multi-document file is used.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::{ResourceKind, kind_name};
use crate::error::{Error, Result};

/// Decode the first document in `content` as a `K`.
///
/// `kind` and `apiVersion`, when present, must match `K`. `path` is only
/// used in error messages.
pub fn decode_manifest<K: ResourceKind>(content: &str, path: &Path) -> Result<K> {
    let fail = |reason: String| Error::DecodeFailed {
        kind: kind_name::<K>(),
        path: path.to_path_buf(),
        reason,
    };

    let document = serde_yaml::Deserializer::from_str(content)
        .next()
        .ok_or_else(|| fail("manifest is empty".to_string()))?;
    let value = Value::deserialize(document).map_err(|e| fail(e.to_string()))?;

    let Value::Object(fields) = &value else {
        return Err(fail("top level of the document is not a mapping".to_string()));
    };

    if let Some(kind) = fields.get("kind").and_then(Value::as_str)
        && kind != K::kind(&())
    {
        return Err(fail(format!("document declares kind {kind}")));
    }

    let expected_version = K::api_version(&());
    if let Some(version) = fields.get("apiVersion").and_then(Value::as_str)
        && version != expected_version
    {
        return Err(fail(format!(
            "document declares apiVersion {version}, expected {expected_version}"
        )));
    }

    serde_json::from_value(value).map_err(|e| fail(e.to_string()))
}
