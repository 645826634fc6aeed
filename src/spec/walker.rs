//! Recursive scanner/rewriter for XC spec documents.
//!
//! Specs are schema-less JSON trees. Object references inside them are
//! mappings with exactly the keys `{name, namespace}` or
//! `{name, namespace, tenant}`; the walker finds those records or produces
//! rewritten deep copies of the whole tree.

use serde_json::{Map, Value};

use crate::defaults::is_reserved_namespace;

/// A reference record found inside a spec, with the dotted/indexed JSON
/// path it was found at. The path is the classifier input for guessing the
/// referenced resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSite {
    pub json_path: String,
    pub name: String,
    pub namespace: String,
}

/// A mapping is a reference record iff its key set is exactly
/// `{name, namespace}` or `{name, namespace, tenant}`.
fn as_ref_record(map: &Map<String, Value>) -> bool {
    map.contains_key("name")
        && map.contains_key("namespace")
        && map
            .keys()
            .all(|k| k == "name" || k == "namespace" || k == "tenant")
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Recursively find all reference records pointing at `src_namespace`.
///
/// References into reserved namespaces are never reported; those objects
/// are platform-shared and are not part of any move.
pub fn find_ns_refs(value: &Value, src_namespace: &str) -> Vec<RefSite> {
    let mut refs = Vec::new();
    walk(value, src_namespace, "", &mut refs);
    refs
}

fn walk(value: &Value, src_namespace: &str, path: &str, refs: &mut Vec<RefSite>) {
    match value {
        Value::Object(map) => {
            if as_ref_record(map) {
                let ns = str_field(map, "namespace");
                if ns == src_namespace && !is_reserved_namespace(ns) {
                    refs.push(RefSite {
                        json_path: path.to_string(),
                        name: str_field(map, "name").to_string(),
                        namespace: ns.to_string(),
                    });
                }
            } else {
                for (k, v) in map {
                    walk(v, src_namespace, &format!("{path}.{k}"), refs);
                }
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                walk(v, src_namespace, &format!("{path}[{i}]"), refs);
            }
        }
        _ => {}
    }
}

/// Deep-copy `value`, pointing every reference record whose namespace is
/// `src_namespace` at `dst_namespace` instead.
pub fn rewrite_namespace_refs(value: &Value, src_namespace: &str, dst_namespace: &str) -> Value {
    rewrite(value, &|map| {
        if str_field(map, "namespace") == src_namespace {
            let mut out = map.clone();
            out.insert(
                "namespace".to_string(),
                Value::String(dst_namespace.to_string()),
            );
            Some(out)
        } else {
            None
        }
    })
}

/// Deep-copy `value`, renaming reference records with
/// `(name, namespace) == (old_name, namespace)` to `new_name`.
pub fn rewrite_name_refs(value: &Value, old_name: &str, new_name: &str, namespace: &str) -> Value {
    rewrite(value, &|map| {
        if str_field(map, "name") == old_name && str_field(map, "namespace") == namespace {
            let mut out = map.clone();
            out.insert("name".to_string(), Value::String(new_name.to_string()));
            Some(out)
        } else {
            None
        }
    })
}

/// Deep-copy `value`, rewriting reference records with `name == old_name`
/// to `(new_name, new_namespace)` regardless of their current namespace.
///
/// Used when a non-portable certificate is substituted by a matching
/// certificate living in a different namespace.
pub fn rewrite_cert_refs(
    value: &Value,
    old_name: &str,
    new_name: &str,
    new_namespace: &str,
) -> Value {
    rewrite(value, &|map| {
        if str_field(map, "name") == old_name {
            let mut out = map.clone();
            out.insert("name".to_string(), Value::String(new_name.to_string()));
            out.insert(
                "namespace".to_string(),
                Value::String(new_namespace.to_string()),
            );
            Some(out)
        } else {
            None
        }
    })
}

/// Generic rewrite: `transform` returns the replacement mapping for a
/// reference record, or `None` to keep it untouched.
fn rewrite(
    value: &Value,
    transform: &dyn Fn(&Map<String, Value>) -> Option<Map<String, Value>>,
) -> Value {
    match value {
        Value::Object(map) => {
            if as_ref_record(map) {
                match transform(map) {
                    Some(replaced) => Value::Object(replaced),
                    None => Value::Object(map.clone()),
                }
            } else {
                Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), rewrite(v, transform)))
                        .collect(),
                )
            }
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| rewrite(v, transform)).collect())
        }
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_spec() -> Value {
        json!({
            "domains": ["app.example.com"],
            "default_route_pools": [
                {"pool": {"name": "op-a", "namespace": "ns1"}, "weight": 1},
                {"pool": {"name": "op-sys", "namespace": "system"}, "weight": 1}
            ],
            "https": {
                "tls_cert_params": {
                    "certificates": [
                        {"name": "c1", "namespace": "ns1", "tenant": "acme"}
                    ]
                }
            },
            "other_ns_ref": {"name": "x", "namespace": "ns2"}
        })
    }

    #[test]
    fn find_refs_filters_by_namespace() {
        let refs = find_ns_refs(&sample_spec(), "ns1");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].json_path, ".default_route_pools[0].pool");
        assert_eq!(refs[0].name, "op-a");
        assert_eq!(refs[1].json_path, ".https.tls_cert_params.certificates[0]");
        assert_eq!(refs[1].name, "c1");
    }

    #[test]
    fn reserved_namespaces_are_never_reported() {
        let refs = find_ns_refs(&sample_spec(), "system");
        assert!(refs.is_empty());
    }

    #[test]
    fn mapping_with_extra_keys_is_not_a_ref() {
        let doc = json!({"thing": {"name": "a", "namespace": "ns1", "port": 80}});
        assert!(find_ns_refs(&doc, "ns1").is_empty());
    }

    #[test]
    fn namespace_rewrite_targets_matching_refs_only() {
        let spec = sample_spec();
        let rewritten = rewrite_namespace_refs(&spec, "ns1", "ns2");
        assert_eq!(
            rewritten["default_route_pools"][0]["pool"]["namespace"],
            "ns2"
        );
        // system ref and non-matching ref untouched
        assert_eq!(
            rewritten["default_route_pools"][1]["pool"]["namespace"],
            "system"
        );
        assert_eq!(rewritten["other_ns_ref"]["namespace"], "ns2");
    }

    #[test]
    fn identity_namespace_rewrite_is_a_noop() {
        let spec = sample_spec();
        assert_eq!(rewrite_namespace_refs(&spec, "ns1", "ns1"), spec);
    }

    #[test]
    fn rewrite_preserves_findable_refs() {
        let spec = sample_spec();
        let refs_before = find_ns_refs(&spec, "ns1");
        let rewritten = rewrite_namespace_refs(&spec, "zzz", "yyy");
        assert_eq!(find_ns_refs(&rewritten, "ns1"), refs_before);
    }

    #[test]
    fn name_rewrite_requires_namespace_match() {
        let spec = sample_spec();
        let rewritten = rewrite_name_refs(&spec, "op-a", "mv-op-a", "ns1");
        assert_eq!(rewritten["default_route_pools"][0]["pool"]["name"], "mv-op-a");

        let untouched = rewrite_name_refs(&spec, "op-a", "mv-op-a", "ns9");
        assert_eq!(untouched["default_route_pools"][0]["pool"]["name"], "op-a");
    }

    #[test]
    fn cert_rewrite_changes_name_and_namespace() {
        let spec = sample_spec();
        let rewritten = rewrite_cert_refs(&spec, "c1", "c1-shared", "shared");
        let cert = &rewritten["https"]["tls_cert_params"]["certificates"][0];
        assert_eq!(cert["name"], "c1-shared");
        assert_eq!(cert["namespace"], "shared");
        // tenant key preserved
        assert_eq!(cert["tenant"], "acme");
    }
}
