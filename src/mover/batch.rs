//! Batch planning: union-find over shared dependencies.
//!
//! LBs sharing any transitive dependency must move together because the
//! remote side enforces referential integrity; an origin pool cannot be
//! deleted while another LB still references it.

use std::collections::HashMap;

use tracing::info;

use crate::mover::model::{DepKey, Dependency};

/// Disjoint-set over LB names with path halving.
#[derive(Debug, Default)]
pub struct UnionFind {
    parent: HashMap<String, String>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&mut self, x: &str) -> String {
        if !self.parent.contains_key(x) {
            self.parent.insert(x.to_string(), x.to_string());
        }
        let mut current = x.to_string();
        loop {
            let parent = self.parent[&current].clone();
            if parent == current {
                return current;
            }
            let grandparent = self.parent[&parent].clone();
            self.parent.insert(current.clone(), grandparent);
            current = parent;
        }
    }

    pub fn union(&mut self, a: &str, b: &str) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}

/// Cluster LBs into batches by shared dependencies.
///
/// Returns the batches (groups of LB names) and the derived map
/// `dep_key -> [lb_names]` used for shared-dependency queries later.
/// Batch membership order and the batch order both follow first-seen
/// order of `lb_order`.
pub fn cluster_batches(
    lb_order: &[String],
    lb_deps: &HashMap<String, Vec<Dependency>>,
) -> (Vec<Vec<String>>, HashMap<DepKey, Vec<String>>) {
    let mut uf = UnionFind::new();
    let mut dep_to_lbs: HashMap<DepKey, Vec<String>> = HashMap::new();

    for lb_name in lb_order {
        // Ensure every LB is in the union-find even with no deps.
        uf.find(lb_name);
        for dep in lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            dep_to_lbs.entry(dep.key()).or_default().push(lb_name.clone());
        }
    }

    for lb_names in dep_to_lbs.values() {
        for other in &lb_names[1..] {
            uf.union(&lb_names[0], other);
        }
    }

    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut root_to_batch: HashMap<String, usize> = HashMap::new();
    for lb_name in lb_order {
        let root = uf.find(lb_name);
        match root_to_batch.get(&root) {
            Some(&idx) => batches[idx].push(lb_name.clone()),
            None => {
                root_to_batch.insert(root, batches.len());
                batches.push(vec![lb_name.clone()]);
            }
        }
    }

    if batches.len() == lb_order.len() {
        info!("No shared dependencies — {} independent LB(s)", batches.len());
    } else {
        let multi = batches.iter().filter(|b| b.len() > 1).count();
        info!(
            "{} batch(es): {} shared-dep group(s), {} independent LB(s)",
            batches.len(),
            multi,
            batches.len() - multi,
        );
    }

    (batches, dep_to_lbs)
}
