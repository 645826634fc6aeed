//! Typed accessors over raw XC configuration documents.
//!
//! A [`ConfigObject`] wraps the full JSON returned by a config GET. The
//! accessors read the handful of fields the mover inspects (`metadata`,
//! `spec.domains`, TLS settings, certificate details) while the rest of
//! the tree stays opaque.

use serde_json::{json, Map, Value};
use std::fmt::Display;

use crate::api::referrers::{extract_referring_objects, Referrer};
use crate::spec::walker::rewrite_namespace_refs;

/// Fields returned by GET that must be stripped before POSTing a new
/// object. These are server-managed and would be rejected on create.
const SPEC_READONLY_FIELDS: &[&str] = &[
    // HTTP LB specific
    "auto_cert_info",
    "cert_state",
    "dns_info",
    "host_name",
    "internet_vip_info",
    "downstream_tls_certificate_expiration_timestamps",
    "state",
    "status",
    // Certificate specific (back-references)
    "http_loadbalancers",
    "tcp_loadbalancers",
    "infos",
];

/// TLS operation mode of an HTTP load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    LetsEncrypt,
    ManualTls,
    NoTls,
    Unknown,
}

impl TlsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsMode::LetsEncrypt => "Let's Encrypt",
            TlsMode::ManualTls => "Manual TLS",
            TlsMode::NoTls => "No TLS",
            TlsMode::Unknown => "Unknown",
        }
    }

    /// Let's Encrypt LBs need ACME CNAME polling and DNS follow-up.
    pub fn is_lets_encrypt(&self) -> bool {
        matches!(self, TlsMode::LetsEncrypt)
    }
}

impl Display for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A full configuration document as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigObject {
    raw: Value,
}

impl From<Value> for ConfigObject {
    fn from(raw: Value) -> Self {
        Self { raw }
    }
}

impl ConfigObject {
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.raw.get("metadata").and_then(Value::as_object)
    }

    /// Object name from metadata, falling back to a top-level `name`.
    pub fn name(&self) -> &str {
        self.metadata()
            .and_then(|m| m.get("name"))
            .or_else(|| self.raw.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn spec(&self) -> &Value {
        self.raw.get("spec").unwrap_or(&Value::Null)
    }

    /// Pretty JSON of the whole document, for backups in the report.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.raw).unwrap_or_default()
    }

    /// Metadata for a create call: the portable fields only, namespace set
    /// to `target_namespace`.
    pub fn clean_metadata(&self, target_namespace: &str) -> Value {
        let meta = self.metadata().cloned().unwrap_or_default();
        let field = |key: &str| meta.get(key).cloned();
        json!({
            "name": field("name").unwrap_or_else(|| Value::String(String::new())),
            "namespace": target_namespace,
            "labels": field("labels").filter(|v| v.is_object()).unwrap_or_else(|| json!({})),
            "annotations": field("annotations").filter(|v| v.is_object()).unwrap_or_else(|| json!({})),
            "description": field("description").unwrap_or_else(|| Value::String(String::new())),
            "disable": field("disable").unwrap_or(Value::Bool(false)),
        })
    }

    /// Spec for a create call with server-managed fields stripped.
    pub fn clean_spec(&self) -> Value {
        match self.spec() {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| !SPEC_READONLY_FIELDS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// `(metadata, spec)` ready for re-creation in the target namespace:
    /// cleaned metadata, stripped spec, and every reference record pointing
    /// at `src_namespace` rewritten to `target_namespace`.
    pub fn prepare_for_move(&self, src_namespace: &str, target_namespace: &str) -> (Value, Value) {
        let metadata = self.clean_metadata(target_namespace);
        let spec = rewrite_namespace_refs(&self.clean_spec(), src_namespace, target_namespace);
        (metadata, spec)
    }

    pub fn referring_objects(&self) -> Vec<Referrer> {
        extract_referring_objects(&self.raw)
    }

    pub fn tls_mode(&self) -> TlsMode {
        let spec = self.spec();
        if spec.get("https_auto_cert").is_some() {
            TlsMode::LetsEncrypt
        } else if spec.get("https").is_some() {
            TlsMode::ManualTls
        } else if spec.get("http").is_some() {
            TlsMode::NoTls
        } else {
            TlsMode::Unknown
        }
    }

    /// Host CNAME from `spec.dns_info[0].dns_name`, falling back to
    /// `spec.host_name`.
    pub fn cname(&self) -> String {
        let spec = self.spec();
        let from_dns_info = spec
            .get("dns_info")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .and_then(|first| first.get("dns_name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());
        match from_dns_info {
            Some(cname) => cname.to_string(),
            None => spec
                .get("host_name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        }
    }

    /// ACME challenge CNAME from `spec.auto_cert_info.dns_records`
    /// (the record with `type: CNAME`). Empty until provisioned.
    pub fn acme_cname(&self) -> String {
        self.spec()
            .get("auto_cert_info")
            .and_then(|info| info.get("dns_records"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find_map(|rec| {
                let is_cname = rec
                    .get("type")
                    .and_then(Value::as_str)
                    .map(|t| t.eq_ignore_ascii_case("CNAME"))
                    .unwrap_or(false);
                if !is_cname {
                    return None;
                }
                rec.get("value")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_default()
    }

    /// The LB's domain list (`spec.domains`), lowercased.
    pub fn lb_domains(&self) -> Vec<String> {
        self.spec()
            .get("domains")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(|d| d.to_lowercase().trim_matches('.').to_string())
            .collect()
    }

    /// Whether the certificate's private key can be extracted via the API.
    /// Returns the human-readable reason when it cannot.
    ///
    /// Opaque storage modes (blindfold, clear, vault, wingman) keep the key
    /// server-side; such a certificate cannot be re-created elsewhere.
    pub fn nonportable_key_reason(&self) -> Option<&'static str> {
        let pk = self.spec().get("private_key").and_then(Value::as_object)?;
        let secret_types = [
            ("blindfold_secret_info", "private key (blindfolded)"),
            ("clear_secret_info", "private key (clear secret)"),
            ("vault_secret_info", "private key (vault reference)"),
            ("wingman_secret_info", "private key (wingman)"),
        ];
        for (field, description) in secret_types {
            if pk.get(field).map(is_nonempty).unwrap_or(false) {
                return Some(description);
            }
        }
        // Any other non-empty private_key structure is equally opaque.
        if !pk.is_empty() {
            return Some("private key (unknown type)");
        }
        None
    }

    /// All domains (CN + SANs) covered by a certificate, read from
    /// `spec.infos`. Deduplicated, lowercased, sorted; may contain
    /// wildcards. The field names vary between tenant versions, so both
    /// the documented and the observed spellings are read.
    pub fn cert_domains(&self) -> Vec<String> {
        let mut domains = std::collections::BTreeSet::new();
        let infos = self
            .spec()
            .get("infos")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for info in infos {
            for field in ["dns_names", "subject_alternative_names"] {
                for dns in info.get(field).and_then(Value::as_array).into_iter().flatten() {
                    if let Some(d) = dns.as_str().filter(|d| !d.is_empty()) {
                        domains.insert(d.to_lowercase().trim_matches('.').to_string());
                    }
                }
            }
            let cn = info
                .get("subject")
                .and_then(|s| s.get("common_name"))
                .and_then(Value::as_str)
                .filter(|cn| !cn.is_empty())
                .or_else(|| info.get("common_name").and_then(Value::as_str))
                .filter(|cn| !cn.is_empty());
            if let Some(cn) = cn {
                domains.insert(cn.to_lowercase().trim_matches('.').to_string());
            }
        }
        domains.into_iter().collect()
    }
}

fn is_nonempty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}
