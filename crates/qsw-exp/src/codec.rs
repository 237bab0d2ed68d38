//! JSON/YAML encoding helpers and content hashing for plans and reports.

use std::path::Path;

use qsw_core::errors::{ErrorInfo, QswError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

fn serde_error(code: &str, err: impl ToString) -> QswError {
    QswError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Rebuilds every object with its keys in ascending order, whatever map
/// type `serde_json` was compiled with.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .map(|(key, value)| (key, sort_keys(value)))
                .collect();
            entries.sort_by(|left, right| left.0.cmp(&right.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

fn canonical_value<T: Serialize>(value: &T) -> Result<Value, QswError> {
    serde_json::to_value(value)
        .map(sort_keys)
        .map_err(|err| serde_error("json_serialize", err))
}

/// Encodes `value` as compact JSON with object keys in sorted order, so struct
/// field order and map insertion order never leak into hashes or artefacts.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, QswError> {
    serde_json::to_vec(&canonical_value(value)?).map_err(|err| serde_error("json_write", err))
}

/// Pretty-printed variant of [`to_canonical_json_bytes`].
pub fn to_canonical_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>, QswError> {
    serde_json::to_vec_pretty(&canonical_value(value)?)
        .map_err(|err| serde_error("json_write", err))
}

/// Decodes JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, QswError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json_deserialize", err))
}

/// Encodes `value` as YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, QswError> {
    serde_yaml::to_string(value).map_err(|err| serde_error("yaml_serialize", err))
}

/// Decodes a YAML payload, naming `origin` in the error context.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8], origin: &Path) -> Result<T, QswError> {
    serde_yaml::from_slice(data).map_err(|err| {
        QswError::Serde(
            ErrorInfo::new("yaml_deserialize", err.to_string())
                .with_context("path", origin.display().to_string()),
        )
    })
}

/// Hex SHA-256 of the canonical JSON encoding of `value`.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, QswError> {
    let digest = Sha256::digest(to_canonical_json_bytes(value)?);
    Ok(format!("{digest:x}"))
}
