//! Dependency discovery.
//!
//! Walks an LB's spec for reference records, then re-fetches each
//! discovered object to find its own references, breadth-first. The BFS
//! visitation order becomes the delete topology (and, reversed, the
//! create topology).

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::api::kind::ResourceKind;
use crate::api::XcClient;
use crate::mover::input::MoveEntry;
use crate::mover::model::{DepKey, Dependency};
use crate::spec::walker::find_ns_refs;
use crate::spec::ConfigObject;

/// Discover all objects in `src_namespace` an LB transitively depends on.
///
/// Deduplicated by `(kind, name)`, which also guards against reference
/// cycles. A fetch failure does not halt discovery: the entry is still
/// recorded (so it appears in the batch plan) but without sub-dependencies.
pub fn discover_dependencies(
    client: &XcClient,
    src_namespace: &str,
    lb_config: &ConfigObject,
) -> Vec<Dependency> {
    let mut seen: HashSet<DepKey> = HashSet::new();
    let mut ordered: Vec<Dependency> = Vec::new();
    let mut queue: VecDeque<_> = find_ns_refs(lb_config.spec(), src_namespace).into();

    while let Some(site) = queue.pop_front() {
        let Some(kind) = ResourceKind::from_ref_path(&site.json_path) else {
            debug!(
                "Cannot determine resource type for ref at {} ({}/{}) — skipping",
                site.json_path, site.namespace, site.name
            );
            continue;
        };

        if !seen.insert((kind, site.name.clone())) {
            continue;
        }

        match client.get_config_object(&site.namespace, kind, &site.name) {
            Ok(config) => {
                queue.extend(find_ns_refs(config.spec(), src_namespace));
            }
            Err(err) => {
                warn!(
                    "Cannot fetch {}/{}/{} for dependency scan: {err}",
                    site.namespace, kind, site.name
                );
            }
        }
        ordered.push(Dependency::new(kind, &site.name, &site.namespace));
    }

    ordered
}

/// Result of the discovery phase over the whole move list.
#[derive(Debug, Default)]
pub struct Discovery {
    pub lb_configs: HashMap<String, ConfigObject>,
    pub lb_deps: HashMap<String, Vec<Dependency>>,
    /// LBs whose GET failed; reported as `failed`, excluded from batching.
    pub failed: Vec<String>,
}

/// GET all LB configs and discover their dependency lists.
pub fn discover_lbs_and_deps(client: &XcClient, to_move: &[MoveEntry]) -> Discovery {
    let mut discovery = Discovery::default();
    for entry in to_move {
        let lb_name = entry.lb_name.as_str();
        let lb_config = match client.get_http_loadbalancer(&entry.namespace, lb_name) {
            Ok(config) => config,
            Err(err) => {
                info!("FAILED to get '{lb_name}': {err}");
                discovery.failed.push(lb_name.to_string());
                continue;
            }
        };
        let deps = discover_dependencies(client, &entry.namespace, &lb_config);
        discovery.lb_configs.insert(lb_name.to_string(), lb_config);
        discovery.lb_deps.insert(lb_name.to_string(), deps);
    }
    discovery
}
