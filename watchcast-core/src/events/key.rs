//! Composite `namespace/name` keys of watched objects.

use serde_json::Value;
use thiserror::Error;

use crate::source::DeletedObject;

/// A key could not be derived from an object or split back into its parts.
///
/// Never retried: the object itself is malformed, so another attempt would
/// fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("object has no metadata.name")]
    MissingName,

    #[error("unexpected key format: {0:?}")]
    UnexpectedFormat(String),
}

/// Build the canonical key of an object from its `metadata`.
///
/// Namespaced objects yield `"<namespace>/<name>"`, cluster-scoped objects
/// (no or empty `metadata.namespace`) yield `"<name>"`.
pub fn meta_namespace_key(obj: &Value) -> Result<String, KeyError> {
    let metadata = obj.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or(KeyError::MissingName)?;
    let namespace = metadata
        .and_then(|m| m.get("namespace"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    if namespace.is_empty() {
        Ok(name.to_string())
    } else {
        Ok(format!("{namespace}/{name}"))
    }
}

/// Like [`meta_namespace_key`], but takes the precomputed key of a tombstone
/// as-is.
pub fn deletion_handling_key(obj: &DeletedObject) -> Result<String, KeyError> {
    match obj {
        DeletedObject::Object(value) => meta_namespace_key(value),
        DeletedObject::FinalStateUnknown { key, .. } => Ok(key.clone()),
    }
}

/// Split a key into `(namespace, name)`.
///
/// A single segment is a cluster-scoped name with an empty namespace. More
/// than two segments, or an empty segment, is an error.
pub fn split_meta_namespace_key(key: &str) -> Result<(&str, &str), KeyError> {
    let mut parts = key.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) if !name.is_empty() => Ok(("", name)),
        (Some(namespace), Some(name), None) if !namespace.is_empty() && !name.is_empty() => {
            Ok((namespace, name))
        }
        _ => Err(KeyError::UnexpectedFormat(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespaced_key() {
        let obj = json!({"metadata": {"namespace": "default", "name": "pod-a"}});
        assert_eq!(meta_namespace_key(&obj).unwrap(), "default/pod-a");
    }

    #[test]
    fn test_cluster_scoped_key() {
        let obj = json!({"metadata": {"name": "node-1"}});
        assert_eq!(meta_namespace_key(&obj).unwrap(), "node-1");

        let obj = json!({"metadata": {"namespace": "", "name": "node-1"}});
        assert_eq!(meta_namespace_key(&obj).unwrap(), "node-1");
    }

    #[test]
    fn test_missing_name() {
        assert_eq!(
            meta_namespace_key(&json!({"metadata": {"namespace": "default"}})),
            Err(KeyError::MissingName)
        );
        assert_eq!(
            meta_namespace_key(&json!({"metadata": {"name": ""}})),
            Err(KeyError::MissingName)
        );
        assert_eq!(meta_namespace_key(&json!("pod-a")), Err(KeyError::MissingName));
    }

    #[test]
    fn test_tombstone_key_is_used_verbatim() {
        let tombstone = DeletedObject::FinalStateUnknown {
            key: "kube-system/dns".to_string(),
            last_known: json!({}),
        };
        assert_eq!(deletion_handling_key(&tombstone).unwrap(), "kube-system/dns");
    }

    #[test]
    fn test_split() {
        assert_eq!(split_meta_namespace_key("default/pod-a"), Ok(("default", "pod-a")));
        assert_eq!(split_meta_namespace_key("node-1"), Ok(("", "node-1")));
    }

    #[test]
    fn test_split_malformed() {
        for key in ["a/b/c", "", "/pod-a", "default/", "/"] {
            assert_eq!(
                split_meta_namespace_key(key),
                Err(KeyError::UnexpectedFormat(key.to_string())),
                "key {key:?}"
            );
        }
    }
}
