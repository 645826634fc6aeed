//! Pre-flight phases, run once up-front across the whole move list.
//!
//! Phase 0b: active external-reference scan across non-moved LBs.
//! Phase 0c: name-conflict detection in the target namespace.
//! Phase 0d: non-portable certificate detection and domain matching.
//! Phase 0e: DNS zone ownership check for automatic record management.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::kind::ResourceKind;
use crate::api::{ApiError, XcClient};
use crate::defaults::SHARED_NAMESPACE;
use crate::mover::conflict::{resolve_conflict, ConflictAction, ConflictResolution};
use crate::mover::console::Prompter;
use crate::mover::input::MoveEntry;
use crate::mover::model::{DepKey, Dependency, ManualReworkItem};
use crate::spec::domains::{domain_is_under_zone, domain_matches_cert};
use crate::spec::walker::find_ns_refs;
use crate::spec::ConfigObject;

// ------------------------------------------------------------------
// Phase 0b: External reference scan
// ------------------------------------------------------------------

/// Scan for dependencies used by LBs NOT in the move list.
///
/// The `referring_objects` field from GETs is known to be stale, so every
/// other LB in the source namespaces is fetched and its spec scanned.
/// Returns `dep_key -> [(external_lb_name, lb_namespace)]`.
pub fn scan_external_references(
    client: &XcClient,
    to_move: &[MoveEntry],
    lb_deps: &HashMap<String, Vec<Dependency>>,
) -> HashMap<DepKey, Vec<(String, String)>> {
    let all_dep_keys: HashSet<DepKey> = lb_deps
        .values()
        .flatten()
        .map(Dependency::key)
        .collect();
    let mut external_dep_refs: HashMap<DepKey, Vec<(String, String)>> = HashMap::new();
    if all_dep_keys.is_empty() {
        return external_dep_refs;
    }

    let move_lb_names: HashSet<&str> = to_move.iter().map(|e| e.lb_name.as_str()).collect();
    let mut src_namespaces: Vec<&str> = to_move.iter().map(|e| e.namespace.as_str()).collect();
    src_namespaces.sort_unstable();
    src_namespaces.dedup();

    info!("Scanning for external references to dependencies...");
    for ns in src_namespaces {
        let all_lbs_in_ns = match client.list_all_loadbalancers(ns) {
            Ok(lbs) => lbs,
            Err(err) => {
                warn!("Could not list LBs in namespace '{ns}': {err}");
                continue;
            }
        };

        for (other_lb_name, lb_kind) in all_lbs_in_ns {
            if move_lb_names.contains(other_lb_name.as_str()) {
                continue;
            }
            let other_config = match client.get_loadbalancer(ns, lb_kind, &other_lb_name) {
                Ok(config) => config,
                Err(err) => {
                    debug!(
                        "Cannot fetch {lb_kind} '{other_lb_name}' in '{ns}' for external ref \
                         scan: {err}"
                    );
                    continue;
                }
            };
            for site in find_ns_refs(other_config.spec(), ns) {
                let Some(kind) = ResourceKind::from_ref_path(&site.json_path) else {
                    continue;
                };
                let dep_key = (kind, site.name);
                if all_dep_keys.contains(&dep_key) {
                    external_dep_refs
                        .entry(dep_key)
                        .or_default()
                        .push((other_lb_name.clone(), ns.to_string()));
                }
            }
        }
    }

    if external_dep_refs.is_empty() {
        info!("No external references found.");
    } else {
        info!(
            "Found {} dep(s) with external references",
            external_dep_refs.len()
        );
        for ((kind, name), refs) in &external_dep_refs {
            let ref_names: Vec<String> =
                refs.iter().map(|(n, ns)| format!("'{n}' ({ns})")).collect();
            info!(
                "  {} '{name}' — used by: {}",
                kind.friendly_name(),
                ref_names.join(", ")
            );
        }
    }

    external_dep_refs
}

// ------------------------------------------------------------------
// Phase 0c: Conflict detection
// ------------------------------------------------------------------

/// Outcome of the target-namespace name-conflict check.
#[derive(Debug, Default)]
pub struct ConflictCheck {
    pub lb_renames: HashMap<String, String>,
    pub dep_renames: HashMap<DepKey, String>,
    pub skipped_lbs: HashSet<String>,
    pub skipped_deps: HashSet<DepKey>,
    pub conflict_count: usize,
}

impl ConflictCheck {
    pub fn renamed_count(&self) -> usize {
        self.lb_renames.len() + self.dep_renames.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_lbs.len() + self.skipped_deps.len()
    }
}

/// Check every LB name and dependency name to be created in the target
/// namespace against objects that already exist there.
///
/// Non-portable certificates are exempt: a same-name object in the target
/// is the expected substitution candidate, handled by the matcher.
#[allow(clippy::too_many_arguments)]
pub fn check_name_conflicts(
    client: &XcClient,
    target_namespace: &str,
    lb_order: &[String],
    lb_deps: &HashMap<String, Vec<Dependency>>,
    secret_cert_keys: &HashSet<DepKey>,
    conflict_prefix: &str,
    action: ConflictAction,
    prompter: &mut dyn Prompter,
) -> Result<ConflictCheck, ApiError> {
    info!("Checking for name conflicts in target namespace...");
    let mut check = ConflictCheck::default();

    let existing_lb_names = client.list_http_loadbalancer_names(target_namespace)?;

    let dep_resource_kinds: HashSet<ResourceKind> = lb_deps
        .values()
        .flatten()
        .map(|dep| dep.kind)
        .collect();
    let mut existing_dep_names: HashMap<ResourceKind, HashSet<String>> = HashMap::new();
    for kind in dep_resource_kinds {
        existing_dep_names.insert(kind, client.list_config_object_names(target_namespace, kind)?);
    }

    for lb_name in lb_order {
        if !existing_lb_names.contains(lb_name) {
            continue;
        }
        check.conflict_count += 1;
        if conflict_prefix.is_empty() && action == ConflictAction::Ask {
            println!(
                "    CONFLICT: HTTP LB '{lb_name}' already exists in '{target_namespace}' — \
                 skipping (no conflict_prefix configured)"
            );
            check.skipped_lbs.insert(lb_name.clone());
            continue;
        }
        match resolve_conflict("HTTP LB", lb_name, conflict_prefix, action, prompter) {
            ConflictResolution::Skip => {
                check.skipped_lbs.insert(lb_name.clone());
            }
            ConflictResolution::Rename(new_name) => {
                check.lb_renames.insert(lb_name.clone(), new_name);
            }
        }
    }

    for lb_name in lb_order {
        if check.skipped_lbs.contains(lb_name) {
            continue;
        }
        for dep in lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            let dep_key = dep.key();
            if check.dep_renames.contains_key(&dep_key)
                || check.skipped_deps.contains(&dep_key)
                || secret_cert_keys.contains(&dep_key)
            {
                continue;
            }
            let exists = existing_dep_names
                .get(&dep.kind)
                .map(|names| names.contains(&dep.name))
                .unwrap_or(false);
            if !exists {
                continue;
            }
            check.conflict_count += 1;
            let friendly = dep.kind.friendly_name();
            if conflict_prefix.is_empty() && action == ConflictAction::Ask {
                println!(
                    "    CONFLICT: {friendly} '{}' already exists in '{target_namespace}' — \
                     skipping (no conflict_prefix configured)",
                    dep.name
                );
                check.skipped_deps.insert(dep_key);
                continue;
            }
            match resolve_conflict(friendly, &dep.name, conflict_prefix, action, prompter) {
                ConflictResolution::Skip => {
                    check.skipped_deps.insert(dep_key);
                }
                ConflictResolution::Rename(new_name) => {
                    check.dep_renames.insert(dep_key, new_name);
                }
            }
        }
    }

    if check.conflict_count == 0 {
        info!("No name conflicts found.");
    } else {
        info!(
            "Conflicts found: {}  Renamed: {}  Skipped: {}",
            check.conflict_count,
            check.renamed_count(),
            check.skipped_count(),
        );
    }

    Ok(check)
}

// ------------------------------------------------------------------
// Phase 0d-detect: Identify non-portable certificates
// ------------------------------------------------------------------

/// Certificates whose private keys cannot be extracted via the API.
#[derive(Debug, Default)]
pub struct SecretCerts {
    pub keys: HashSet<DepKey>,
    pub configs: HashMap<DepKey, ConfigObject>,
    /// LBs referencing each non-portable cert.
    pub lb_map: HashMap<DepKey, Vec<String>>,
    pub reasons: HashMap<DepKey, String>,
}

/// Scan all certificate dependencies for non-portable private keys.
pub fn detect_nonportable_certs(
    client: &XcClient,
    lb_order: &[String],
    lb_deps: &HashMap<String, Vec<Dependency>>,
) -> SecretCerts {
    let mut secret = SecretCerts::default();

    for lb_name in lb_order {
        for dep in lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            if dep.kind != ResourceKind::Certificates {
                continue;
            }
            let key = dep.key();
            if secret.keys.contains(&key) {
                let lbs = secret.lb_map.entry(key).or_default();
                if !lbs.contains(lb_name) {
                    lbs.push(lb_name.clone());
                }
                continue;
            }
            let cert_config = match client.get_config_object(&dep.namespace, dep.kind, &dep.name) {
                Ok(config) => config,
                Err(err) => {
                    debug!("Cannot fetch cert '{}/{}': {err}", dep.namespace, dep.name);
                    continue;
                }
            };
            if let Some(reason) = cert_config.nonportable_key_reason() {
                secret.keys.insert(key.clone());
                secret.configs.insert(key.clone(), cert_config);
                secret.reasons.insert(key.clone(), reason.to_string());
                secret.lb_map.entry(key).or_default().push(lb_name.clone());
            }
        }
    }

    if !secret.keys.is_empty() {
        info!(
            "Detected {} certificate(s) with non-portable private keys",
            secret.keys.len()
        );
    }
    secret
}

// ------------------------------------------------------------------
// Phase 0d: Certificate domain matching
// ------------------------------------------------------------------

/// Search the target and `shared` namespaces for certificates that can
/// substitute each non-portable one.
///
/// Strategies, in order: (1) the union of domains of the referencing LBs
/// must be covered by the candidate, (2) the original cert's own domains
/// when the LBs have none, (3) same name as a last resort. Unmatched
/// certs block every affected LB, cascaded through batches.
#[allow(clippy::too_many_arguments)]
pub fn match_certificates(
    client: &XcClient,
    secret: &SecretCerts,
    lb_configs: &HashMap<String, ConfigObject>,
    lb_src_ns: &HashMap<String, String>,
    target_namespace: &str,
    batches: &[Vec<String>],
) -> Result<(BTreeMap<DepKey, ManualReworkItem>, HashSet<String>), ApiError> {
    let mut rework_items: BTreeMap<DepKey, ManualReworkItem> = BTreeMap::new();
    let mut cert_blocked_lbs: HashSet<String> = HashSet::new();

    if secret.keys.is_empty() {
        info!("No certificates with non-portable private keys found.");
        return Ok((rework_items, cert_blocked_lbs));
    }
    info!(
        "Found {} certificate(s) with non-portable private keys — running pre-flight check...",
        secret.keys.len()
    );

    // Candidate pool: every certificate in the target and in `shared`.
    let mut available_certs: Vec<(String, String, Vec<String>)> = Vec::new();
    let target_certs = client.list_certificates_full(target_namespace)?;
    let shared_certs = client.list_certificates_full(SHARED_NAMESPACE)?;
    info!(
        "Pre-flight: {} cert(s) in target '{target_namespace}', {} cert(s) in 'shared'",
        target_certs.len(),
        shared_certs.len()
    );
    for (configs, ns) in [(&target_certs, target_namespace), (&shared_certs, SHARED_NAMESPACE)] {
        for config in configs {
            let name = config.name();
            if !name.is_empty() {
                available_certs.push((name.to_string(), ns.to_string(), config.cert_domains()));
            }
        }
    }

    let mut sorted_keys: Vec<&DepKey> = secret.keys.iter().collect();
    sorted_keys.sort();
    for key in sorted_keys {
        let cert_config = &secret.configs[key];
        let reason = &secret.reasons[key];
        let cert_domains = cert_config.cert_domains();
        let affected_lbs = &secret.lb_map[key];

        let mut lb_domains: HashSet<String> = HashSet::new();
        for lb_name in affected_lbs {
            if let Some(config) = lb_configs.get(lb_name) {
                lb_domains.extend(config.lb_domains());
            }
        }

        fn covers_all<'a>(
            candidate: &[String],
            mut required: impl Iterator<Item = &'a String>,
        ) -> bool {
            !candidate.is_empty() && required.all(|d| domain_matches_cert(d, candidate))
        }

        let mut best_match: Option<&(String, String, Vec<String>)> = None;
        if !lb_domains.is_empty() {
            best_match = available_certs
                .iter()
                .find(|(_, _, domains)| covers_all(domains, lb_domains.iter()));
        }
        if best_match.is_none() && lb_domains.is_empty() && !cert_domains.is_empty() {
            best_match = available_certs
                .iter()
                .find(|(_, _, domains)| covers_all(domains, cert_domains.iter()));
        }
        if best_match.is_none() {
            best_match = available_certs.iter().find(|(name, _, _)| *name == key.1);
            if let Some((name, ns, _)) = best_match {
                info!("  Cert '{}' -> name-matched to '{name}' in '{ns}'", key.1);
            }
        }

        let mut item = ManualReworkItem {
            cert_name: key.1.clone(),
            cert_key: key.clone(),
            lb_names: affected_lbs.clone(),
            src_namespace: affected_lbs
                .first()
                .and_then(|lb| lb_src_ns.get(lb))
                .cloned()
                .unwrap_or_else(|| "?".to_string()),
            dst_namespace: target_namespace.to_string(),
            secret_type: reason.clone(),
            cert_domains,
            matched_cert_name: String::new(),
            matched_cert_ns: String::new(),
            matched_cert_domains: Vec::new(),
            original_config_json: cert_config.to_pretty_json(),
        };

        match best_match {
            Some((name, ns, domains)) => {
                item.matched_cert_name = name.clone();
                item.matched_cert_ns = ns.clone();
                item.matched_cert_domains = domains.clone();
                info!("  Cert '{}' -> matched to '{name}' in '{ns}'", key.1);
            }
            None => {
                let shown: Vec<&str> = lb_domains.iter().map(String::as_str).collect();
                info!(
                    "  Cert '{}' -> NO MATCH (domains: {})",
                    key.1,
                    if shown.is_empty() { "(none)".to_string() } else { shown.join(", ") }
                );
                cert_blocked_lbs.extend(affected_lbs.iter().cloned());
            }
        }
        rework_items.insert(key.clone(), item);
    }

    // A blocked LB blocks its whole batch: the batch moves atomically.
    if !cert_blocked_lbs.is_empty() {
        for batch in batches {
            if batch.iter().any(|lb| cert_blocked_lbs.contains(lb)) {
                cert_blocked_lbs.extend(batch.iter().cloned());
            }
        }
        info!(
            "Blocking {} LB(s) due to unmatched certificates",
            cert_blocked_lbs.len()
        );
    }

    Ok((rework_items, cert_blocked_lbs))
}

// ------------------------------------------------------------------
// Phase 0e: DNS zone pre-flight
// ------------------------------------------------------------------

/// Outcome of the managed-DNS detection.
#[derive(Debug, Default)]
pub struct DnsPreflight {
    pub zone_count: usize,
    /// Zone domains with LB-managed records enabled.
    pub managed_zones: HashSet<String>,
    /// LBs whose every domain lives under a managed zone.
    pub dns_managed_lbs: HashSet<String>,
}

/// Zone domains that have "allow LB managed records" enabled.
///
/// The exact field name is tenant-version-dependent, so several candidate
/// paths are probed and the discovered shapes are logged.
pub fn managed_zone_domains(zones: &[ConfigObject]) -> HashSet<String> {
    let mut managed_domains = HashSet::new();

    for zone in zones {
        let spec = zone.raw().get("spec").cloned().unwrap_or(Value::Null);
        let primary = spec.get("primary").cloned().unwrap_or(Value::Null);
        let zone_name = if zone.name().is_empty() { "(unknown)" } else { zone.name() };
        let zone_domain = primary
            .get("soa_parameters")
            .and_then(|soa| soa.get("domain"))
            .and_then(Value::as_str)
            .or_else(|| primary.get("domain").and_then(Value::as_str))
            .unwrap_or(zone.name())
            .to_lowercase()
            .trim_matches('.')
            .to_string();

        let candidate_paths = [
            primary.get("allow_http_lb_managed_dns_records"),
            primary.get("allow_lb_managed_records"),
        ];
        let managed = candidate_paths.iter().any(|candidate| {
            candidate
                .map(|v| v.is_object() || v == &Value::Bool(true))
                .unwrap_or(false)
        });

        if managed && !zone_domain.is_empty() {
            info!("DNS zone '{zone_name}' (domain: {zone_domain}) has LB managed records ENABLED");
            managed_domains.insert(zone_domain);
        } else if !zone_domain.is_empty() {
            info!("DNS zone '{zone_name}' (domain: {zone_domain}) — managed records NOT detected");
        }
    }

    managed_domains
}

/// Check for XC-managed DNS zones and identify Let's Encrypt LBs whose
/// records the platform will manage automatically.
pub fn scan_dns_zones(
    client: &XcClient,
    lb_configs: &HashMap<String, ConfigObject>,
) -> Result<DnsPreflight, ApiError> {
    let zones = client.list_dns_zones()?;
    let managed_zones = managed_zone_domains(&zones);

    if zones.is_empty() && managed_zones.is_empty() {
        warn!(
            "Could not read DNS zones — assuming no XC-managed DNS. Grant read access to \
             /api/config/dns/namespaces/system/dns_zones to enable managed DNS detection."
        );
    }

    let mut dns_managed_lbs = HashSet::new();
    let mut le_lb_count = 0;
    for (lb_name, config) in lb_configs {
        if !config.tls_mode().is_lets_encrypt() {
            continue;
        }
        le_lb_count += 1;
        let lb_domains = config.lb_domains();
        if lb_domains.is_empty() {
            continue;
        }
        let all_managed = lb_domains
            .iter()
            .all(|d| managed_zones.iter().any(|z| domain_is_under_zone(d, z)));
        if all_managed {
            dns_managed_lbs.insert(lb_name.clone());
            info!("LB '{lb_name}' — all domains under managed DNS zone(s)");
        }
    }

    info!(
        "Phase 0e: {} of {le_lb_count} Let's Encrypt LB(s) have XC-managed DNS",
        dns_managed_lbs.len()
    );

    Ok(DnsPreflight {
        zone_count: zones.len(),
        managed_zones,
        dns_managed_lbs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::XcName;
    use crate::http::{HttpClient, HttpConfig};
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;
    use std::time::Duration;

    fn client_for(server: &MockServer) -> XcClient {
        let config = HttpConfig::new(
            Duration::from_secs(3),
            Duration::from_secs(3),
            Duration::from_millis(1),
        );
        XcClient::new(HttpClient::new(config, "tok").unwrap(), &server.base_url())
    }

    fn entry(ns: &str, name: &str) -> MoveEntry {
        MoveEntry {
            namespace: XcName::new(ns).unwrap(),
            lb_name: XcName::new(name).unwrap(),
        }
    }

    fn dep(kind: ResourceKind, name: &str) -> Dependency {
        Dependency::new(kind, name, "ns1")
    }

    #[test]
    fn external_scan_finds_outside_referrer() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/http_loadbalancers");
            then.status(200)
                .json_body(json!({"items": [{"name": "lb-a"}, {"name": "lb-c"}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/https_loadbalancers");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-c");
            then.status(200).json_body(json!({
                "spec": {"default_route_pools": [
                    {"pool": {"name": "op-shared", "namespace": "ns1"}}
                ]}
            }));
        });

        let to_move = vec![entry("ns1", "lb-a")];
        let lb_deps = HashMap::from([(
            "lb-a".to_string(),
            vec![dep(ResourceKind::OriginPools, "op-shared")],
        )]);

        let external = scan_external_references(&client_for(&server), &to_move, &lb_deps);
        let key = (ResourceKind::OriginPools, "op-shared".to_string());
        assert_eq!(external[&key], vec![("lb-c".to_string(), "ns1".to_string())]);
    }

    #[test]
    fn external_scan_ignores_moved_lbs_and_unrelated_deps() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/http_loadbalancers");
            then.status(200).json_body(json!({"items": [{"name": "lb-a"}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/https_loadbalancers");
            then.status(404);
        });

        let to_move = vec![entry("ns1", "lb-a")];
        let lb_deps = HashMap::from([(
            "lb-a".to_string(),
            vec![dep(ResourceKind::OriginPools, "op-a")],
        )]);
        let external = scan_external_references(&client_for(&server), &to_move, &lb_deps);
        assert!(external.is_empty());
    }

    #[test]
    fn nonportable_cert_detection_collects_referencing_lbs() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/certificates/c1");
            then.status(200).json_body(json!({
                "metadata": {"name": "c1"},
                "spec": {"private_key": {"blindfold_secret_info": {"location": "x"}}}
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/certificates/c2");
            then.status(200)
                .json_body(json!({"metadata": {"name": "c2"}, "spec": {}}));
        });

        let lb_order = vec!["lb-a".to_string(), "lb-b".to_string()];
        let lb_deps = HashMap::from([
            (
                "lb-a".to_string(),
                vec![dep(ResourceKind::Certificates, "c1"), dep(ResourceKind::Certificates, "c2")],
            ),
            ("lb-b".to_string(), vec![dep(ResourceKind::Certificates, "c1")]),
        ]);

        let secret = detect_nonportable_certs(&client_for(&server), &lb_order, &lb_deps);
        let key = (ResourceKind::Certificates, "c1".to_string());
        assert_eq!(secret.keys, HashSet::from([key.clone()]));
        assert_eq!(secret.lb_map[&key], vec!["lb-a", "lb-b"]);
        assert_eq!(secret.reasons[&key], "private key (blindfolded)");
    }

    fn secret_with_cert(cert_domains: Value) -> SecretCerts {
        let key = (ResourceKind::Certificates, "c1".to_string());
        let config = ConfigObject::from(json!({
            "metadata": {"name": "c1"},
            "spec": {
                "private_key": {"blindfold_secret_info": {"location": "x"}},
                "infos": [{"dns_names": cert_domains}]
            }
        }));
        let mut secret = SecretCerts::default();
        secret.keys.insert(key.clone());
        secret.configs.insert(key.clone(), config);
        secret.reasons.insert(key.clone(), "private key (blindfolded)".to_string());
        secret.lb_map.insert(key, vec!["lb-a".to_string()]);
        secret
    }

    fn mock_cert_list(server: &MockServer, ns: &str, certs: &[(&str, &[&str])]) {
        let items: Vec<Value> = certs.iter().map(|(name, _)| json!({"name": name})).collect();
        server.mock(|when, then| {
            when.method(GET)
                .path(format!("/api/config/namespaces/{ns}/certificates"));
            then.status(200).json_body(json!({"items": items}));
        });
        for (name, domains) in certs {
            server.mock(|when, then| {
                when.method(GET)
                    .path(format!("/api/config/namespaces/{ns}/certificates/{name}"));
                then.status(200).json_body(json!({
                    "metadata": {"name": name},
                    "spec": {"infos": [{"dns_names": domains}]}
                }));
            });
        }
    }

    #[test]
    fn cert_matching_by_lb_domains_prefers_covering_candidate() {
        let server = MockServer::start();
        mock_cert_list(&server, "ns2", &[("narrow", &["other.example.net"])]);
        mock_cert_list(&server, "shared", &[("c1-shared", &["*.example.com"])]);

        let secret = secret_with_cert(json!([]));
        let lb_configs = HashMap::from([(
            "lb-a".to_string(),
            ConfigObject::from(json!({"spec": {"domains": ["app.example.com"]}})),
        )]);
        let lb_src_ns = HashMap::from([("lb-a".to_string(), "ns1".to_string())]);
        let batches = vec![vec!["lb-a".to_string()]];

        let (items, blocked) = match_certificates(
            &client_for(&server),
            &secret,
            &lb_configs,
            &lb_src_ns,
            "ns2",
            &batches,
        )
        .unwrap();
        assert!(blocked.is_empty());
        let item = &items[&(ResourceKind::Certificates, "c1".to_string())];
        assert_eq!(item.matched_cert_name, "c1-shared");
        assert_eq!(item.matched_cert_ns, "shared");
    }

    #[test]
    fn unmatched_cert_blocks_whole_batch() {
        let server = MockServer::start();
        mock_cert_list(&server, "ns2", &[]);
        mock_cert_list(&server, "shared", &[]);

        let secret = secret_with_cert(json!(["app.example.com"]));
        let lb_configs = HashMap::from([(
            "lb-a".to_string(),
            ConfigObject::from(json!({"spec": {"domains": ["app.example.com"]}})),
        )]);
        let lb_src_ns = HashMap::from([("lb-a".to_string(), "ns1".to_string())]);
        let batches = vec![vec!["lb-a".to_string(), "lb-mate".to_string()]];

        let (items, blocked) = match_certificates(
            &client_for(&server),
            &secret,
            &lb_configs,
            &lb_src_ns,
            "ns2",
            &batches,
        )
        .unwrap();
        assert!(!items[&(ResourceKind::Certificates, "c1".to_string())].is_matched());
        assert_eq!(
            blocked,
            HashSet::from(["lb-a".to_string(), "lb-mate".to_string()])
        );
    }

    #[test]
    fn cert_matching_falls_back_to_same_name() {
        let server = MockServer::start();
        mock_cert_list(&server, "ns2", &[("c1", &[])]);
        mock_cert_list(&server, "shared", &[]);

        // No LB domains and no cert domains: only the name can match.
        let secret = secret_with_cert(json!([]));
        let lb_configs = HashMap::from([(
            "lb-a".to_string(),
            ConfigObject::from(json!({"spec": {}})),
        )]);
        let lb_src_ns = HashMap::from([("lb-a".to_string(), "ns1".to_string())]);

        let (items, blocked) = match_certificates(
            &client_for(&server),
            &secret,
            &lb_configs,
            &lb_src_ns,
            "ns2",
            &[vec!["lb-a".to_string()]],
        )
        .unwrap();
        assert!(blocked.is_empty());
        let item = &items[&(ResourceKind::Certificates, "c1".to_string())];
        assert_eq!(item.matched_cert_name, "c1");
        assert_eq!(item.matched_cert_ns, "ns2");
    }

    #[test]
    fn conflict_check_renames_with_prefix_policy() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns2/http_loadbalancers");
            then.status(200).json_body(json!({"items": [{"name": "lb-a"}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns2/origin_pools");
            then.status(200).json_body(json!({"items": [{"name": "op-a"}]}));
        });

        let lb_order = vec!["lb-a".to_string()];
        let lb_deps = HashMap::from([(
            "lb-a".to_string(),
            vec![dep(ResourceKind::OriginPools, "op-a")],
        )]);
        let mut prompter = crate::mover::console::ScriptedPrompter::default();

        let check = check_name_conflicts(
            &client_for(&server),
            "ns2",
            &lb_order,
            &lb_deps,
            &HashSet::new(),
            "mv",
            ConflictAction::Prefix,
            &mut prompter,
        )
        .unwrap();
        assert_eq!(check.conflict_count, 2);
        assert_eq!(check.lb_renames["lb-a"], "mv-lb-a");
        assert_eq!(
            check.dep_renames[&(ResourceKind::OriginPools, "op-a".to_string())],
            "mv-op-a"
        );
    }

    #[test]
    fn conflict_check_exempts_nonportable_certs() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns2/http_loadbalancers");
            then.status(200).json_body(json!({"items": []}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns2/certificates");
            then.status(200).json_body(json!({"items": [{"name": "c1"}]}));
        });

        let lb_order = vec!["lb-a".to_string()];
        let lb_deps = HashMap::from([(
            "lb-a".to_string(),
            vec![dep(ResourceKind::Certificates, "c1")],
        )]);
        let secret_keys = HashSet::from([(ResourceKind::Certificates, "c1".to_string())]);
        let mut prompter = crate::mover::console::ScriptedPrompter::default();

        let check = check_name_conflicts(
            &client_for(&server),
            "ns2",
            &lb_order,
            &lb_deps,
            &secret_keys,
            "mv",
            ConflictAction::Prefix,
            &mut prompter,
        )
        .unwrap();
        assert_eq!(check.conflict_count, 0);
        assert!(check.dep_renames.is_empty());
    }

    #[test]
    fn managed_zone_detection_probes_candidate_fields() {
        let zones = vec![
            ConfigObject::from(json!({
                "metadata": {"name": "zone-a"},
                "spec": {"primary": {
                    "soa_parameters": {"domain": "Example.com."},
                    "allow_http_lb_managed_dns_records": {}
                }}
            })),
            ConfigObject::from(json!({
                "metadata": {"name": "zone-b"},
                "spec": {"primary": {
                    "domain": "other.net",
                    "allow_lb_managed_records": true
                }}
            })),
            ConfigObject::from(json!({
                "metadata": {"name": "plain.org"},
                "spec": {"primary": {}}
            })),
        ];
        let managed = managed_zone_domains(&zones);
        assert_eq!(
            managed,
            HashSet::from(["example.com".to_string(), "other.net".to_string()])
        );
    }

    #[test]
    fn dns_scan_marks_lets_encrypt_lbs_with_managed_domains() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/config/dns/namespaces/system/dns_zones");
            then.status(200).json_body(json!({"items": [{"name": "example.com"}]}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/dns/namespaces/system/dns_zones/example.com");
            then.status(200).json_body(json!({
                "metadata": {"name": "example.com"},
                "spec": {"primary": {"allow_http_lb_managed_dns_records": {}}}
            }));
        });

        let lb_configs = HashMap::from([
            (
                "lb-le".to_string(),
                ConfigObject::from(json!({
                    "spec": {"https_auto_cert": {}, "domains": ["app.example.com"]}
                })),
            ),
            (
                "lb-other-zone".to_string(),
                ConfigObject::from(json!({
                    "spec": {"https_auto_cert": {}, "domains": ["app.elsewhere.net"]}
                })),
            ),
            (
                "lb-manual".to_string(),
                ConfigObject::from(json!({"spec": {"https": {}, "domains": ["x.example.com"]}})),
            ),
        ]);

        let preflight = scan_dns_zones(&client_for(&server), &lb_configs).unwrap();
        assert_eq!(preflight.zone_count, 1);
        assert_eq!(preflight.dns_managed_lbs, HashSet::from(["lb-le".to_string()]));
    }
}
