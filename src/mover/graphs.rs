//! Builds the per-batch dependency graph data rendered in the report.
//!
//! Direct LB references (tier 1) are separated from sub-dependencies
//! (tier 2) so the SVG renderer can draw a hierarchy; shared and
//! externally-referenced dependencies are tagged for colour coding.

use std::collections::{HashMap, HashSet};

use crate::api::kind::ResourceKind;
use crate::mover::model::{BatchGraphData, DepKey, Dependency};
use crate::spec::walker::find_ns_refs;
use crate::spec::ConfigObject;

pub fn build_batch_graphs(
    batches: &[Vec<String>],
    lb_deps: &HashMap<String, Vec<Dependency>>,
    lb_configs: &HashMap<String, ConfigObject>,
    lb_src_ns: &HashMap<String, String>,
    external_dep_refs: &HashMap<DepKey, Vec<(String, String)>>,
) -> Vec<BatchGraphData> {
    // Direct (tier-1) refs per LB, straight from each LB's own spec.
    let mut lb_direct_deps: HashMap<String, HashSet<DepKey>> = HashMap::new();
    for lb_name in lb_deps.keys() {
        let Some(config) = lb_configs.get(lb_name) else {
            continue;
        };
        let src_ns = lb_src_ns.get(lb_name).map(String::as_str).unwrap_or("");
        let direct: HashSet<DepKey> = find_ns_refs(config.spec(), src_ns)
            .into_iter()
            .filter_map(|site| {
                ResourceKind::from_ref_path(&site.json_path).map(|kind| (kind, site.name))
            })
            .collect();
        lb_direct_deps.insert(lb_name.clone(), direct);
    }

    let mut graphs = Vec::new();
    for (batch_idx, batch_lb_names) in batches.iter().enumerate() {
        let mut graph = BatchGraphData {
            batch_index: batch_idx + 1,
            lb_names: batch_lb_names.clone(),
            ..Default::default()
        };

        // Tier 1 per LB, plus the full dep set of the batch.
        let mut all_deps_in_batch: HashSet<DepKey> = HashSet::new();
        for lb_name in batch_lb_names {
            let direct_set = lb_direct_deps.get(lb_name).cloned().unwrap_or_default();
            let mut direct = Vec::new();
            for dep in lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
                let key = dep.key();
                if direct_set.contains(&key) {
                    direct.push(key.clone());
                }
                all_deps_in_batch.insert(key);
            }
            graph.lb_to_deps.insert(lb_name.clone(), direct);
        }

        // Shared = direct deps referenced by more than one LB in the batch.
        let mut dep_count: HashMap<&DepKey, usize> = HashMap::new();
        for deps in graph.lb_to_deps.values() {
            for key in deps {
                *dep_count.entry(key).or_default() += 1;
            }
        }
        let shared: HashSet<DepKey> = dep_count
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| key.clone())
            .collect();
        graph.shared_deps = shared;

        // Sub-deps: BFS entries that are not direct refs hang off the most
        // recent direct ref preceding them in the BFS list.
        let all_direct: HashSet<DepKey> = graph.lb_to_deps.values().flatten().cloned().collect();
        for lb_name in batch_lb_names {
            let mut current_parent: Option<DepKey> = None;
            for dep in lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
                let key = dep.key();
                if all_direct.contains(&key) {
                    current_parent = Some(key);
                } else if let Some(parent) = &current_parent {
                    let children = graph.dep_children.entry(parent.clone()).or_default();
                    if !children.contains(&key) {
                        children.push(key);
                    }
                }
            }
        }

        // A sub-dep appearing in multiple LBs' BFS lists is shared too.
        let mut shared_children = Vec::new();
        for children in graph.dep_children.values() {
            for child in children {
                let count = batch_lb_names
                    .iter()
                    .flat_map(|lb| lb_deps.get(lb).map(Vec::as_slice).unwrap_or(&[]))
                    .filter(|dep| &dep.key() == child)
                    .count();
                if count > 1 {
                    shared_children.push(child.clone());
                }
            }
        }
        graph.shared_deps.extend(shared_children);

        graph.external_deps = all_deps_in_batch
            .into_iter()
            .filter(|key| external_dep_refs.contains_key(key))
            .collect();

        graphs.push(graph);
    }

    graphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pool(name: &str) -> Dependency {
        Dependency::new(ResourceKind::OriginPools, name, "ns1")
    }

    fn hc(name: &str) -> Dependency {
        Dependency::new(ResourceKind::Healthchecks, name, "ns1")
    }

    fn lb_config(pools: &[&str]) -> ConfigObject {
        let refs: Vec<_> = pools
            .iter()
            .map(|p| json!({"pool": {"name": p, "namespace": "ns1"}}))
            .collect();
        ConfigObject::from(json!({"spec": {"default_route_pools": refs}}))
    }

    #[test]
    fn tiers_shared_and_external_are_derived() {
        let batches = vec![vec!["lb-a".to_string(), "lb-b".to_string()]];
        let lb_deps = HashMap::from([
            ("lb-a".to_string(), vec![pool("op-shared"), hc("hc-1")]),
            ("lb-b".to_string(), vec![pool("op-shared"), hc("hc-1")]),
        ]);
        let lb_configs = HashMap::from([
            ("lb-a".to_string(), lb_config(&["op-shared"])),
            ("lb-b".to_string(), lb_config(&["op-shared"])),
        ]);
        let lb_src_ns = HashMap::from([
            ("lb-a".to_string(), "ns1".to_string()),
            ("lb-b".to_string(), "ns1".to_string()),
        ]);
        let pool_key = (ResourceKind::OriginPools, "op-shared".to_string());
        let hc_key = (ResourceKind::Healthchecks, "hc-1".to_string());
        let external = HashMap::from([(pool_key.clone(), vec![("lb-c".to_string(), "ns1".to_string())])]);

        let graphs = build_batch_graphs(&batches, &lb_deps, &lb_configs, &lb_src_ns, &external);
        assert_eq!(graphs.len(), 1);
        let graph = &graphs[0];
        assert_eq!(graph.batch_index, 1);
        // op-shared is a direct ref; hc-1 is a sub-dep hanging off it.
        assert_eq!(graph.lb_to_deps["lb-a"], vec![pool_key.clone()]);
        assert_eq!(graph.dep_children[&pool_key], vec![hc_key.clone()]);
        // Both keys shared across the two LBs; only the pool is external.
        assert!(graph.shared_deps.contains(&pool_key));
        assert!(graph.shared_deps.contains(&hc_key));
        assert_eq!(graph.external_deps, HashSet::from([pool_key]));
    }

    #[test]
    fn single_lb_batch_has_no_shared_deps() {
        let batches = vec![vec!["lb-a".to_string()]];
        let lb_deps = HashMap::from([("lb-a".to_string(), vec![pool("op-a")])]);
        let lb_configs = HashMap::from([("lb-a".to_string(), lb_config(&["op-a"]))]);
        let lb_src_ns = HashMap::from([("lb-a".to_string(), "ns1".to_string())]);

        let graphs =
            build_batch_graphs(&batches, &lb_deps, &lb_configs, &lb_src_ns, &HashMap::new());
        assert!(graphs[0].shared_deps.is_empty());
        assert!(graphs[0].external_deps.is_empty());
    }
}
