//! Canonical JSON normalization and digests for audit entries.
//!
//! Committed field snapshots are digested with sorted object keys (UTF-16
//! code unit order), integer-valued floats collapsed to integers and
//! non-finite numbers rejected, so the same inputs always produce the same
//! `inputs_digest` regardless of map ordering.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::error::{CurationError, Result};

fn sort_keys_utf16(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.to_string(), sort_keys_utf16(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys_utf16).collect()),
        other => other.clone(),
    }
}

fn normalize_value(value: &Value) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (k, v) in map {
                normalized.insert(k.clone(), normalize_value(v)?);
            }
            Ok(Value::Object(normalized))
        }
        Value::Array(arr) => Ok(Value::Array(
            arr.iter().map(normalize_value).collect::<Result<Vec<_>>>()?,
        )),
        Value::Number(n) if !(n.is_i64() || n.is_u64()) => {
            let Some(f) = n.as_f64() else {
                return Ok(Value::Number(n.clone()));
            };
            if !f.is_finite() {
                return Err(CurationError::Canonical(
                    "NaN/Infinity not permitted in canonical JSON".to_string(),
                ));
            }
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(Value::Number(serde_json::Number::from(f as i64)))
            } else {
                Ok(Value::Number(n.clone()))
            }
        }
        other => Ok(other.clone()),
    }
}

/// Canonical compact JSON: normalized numbers, sorted keys.
pub fn canonical_json(value: &Value) -> Result<String> {
    let normalized = normalize_value(value)?;
    Ok(serde_json::to_string(&sort_keys_utf16(&normalized))?)
}

/// SHA-256 hex digest of the canonical JSON form.
pub fn compute_digest(value: &Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Digest of a field-name to value map, as recorded in audit entries.
pub fn digest_fields(fields: &BTreeMap<String, Value>) -> String {
    let object: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    match compute_digest(&Value::Object(object)) {
        Ok(digest) => digest,
        Err(e) => {
            tracing::warn!(error = %e, "failed to digest field snapshot");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_integer_float() {
        let canonical = canonical_json(&json!({ "start_position": 1.0 })).unwrap();
        assert_eq!(canonical, r#"{"start_position":1}"#);
    }

    #[test]
    fn test_canonical_json_fractional_float_kept() {
        let canonical = canonical_json(&json!({ "confidence": 0.85 })).unwrap();
        assert_eq!(canonical, r#"{"confidence":0.85}"#);
    }

    #[test]
    fn test_canonical_json_field_order_invariant() {
        let a = json!({ "disease_name": "Melanoma", "evidence_type": "Predictive" });
        let b = json!({ "evidence_type": "Predictive", "disease_name": "Melanoma" });
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn test_canonical_json_array_order_preserved() {
        let a = json!({ "therapy_names": ["Dabrafenib", "Trametinib"] });
        let b = json!({ "therapy_names": ["Trametinib", "Dabrafenib"] });
        assert_ne!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn test_digest_fields_is_stable_hex() {
        let mut fields = BTreeMap::new();
        fields.insert("evidence_type".to_string(), json!("Predictive"));
        fields.insert("study_design".to_string(), json!("Phase III Trial"));

        let digest = digest_fields(&fields);
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, digest_fields(&fields));
    }

    #[test]
    fn test_digest_fields_detects_value_change() {
        let mut a = BTreeMap::new();
        a.insert("start_position".to_string(), json!(100));
        let mut b = a.clone();
        b.insert("start_position".to_string(), json!(200));
        assert_ne!(digest_fields(&a), digest_fields(&b));
    }
}
