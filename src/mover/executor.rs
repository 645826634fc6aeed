//! Per-batch execution: the phased move state machine.
//!
//! Phases, in order: backup, external-referrer recheck, plan creation,
//! delete LBs top-down, probe-delete dependencies, delete remaining
//! dependencies, create dependencies bottom-up, create LBs, verify.
//! Any error triggers [`rollback_batch`] for the whole batch.
//!
//! LBs hold the strongest references, so they are deleted first;
//! creation mirrors that, leaves first, so every reference already has
//! its target when an object is created.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::kind::ResourceKind;
use crate::api::referrers::Referrer;
use crate::api::XcClient;
use crate::defaults::is_reserved_namespace;
use crate::mover::model::{
    DepKey, DepMoveResult, Dependency, ManualReworkItem, MoveResult, MoveStatus,
};
use crate::mover::preflight::SecretCerts;
use crate::mover::rollback::rollback_batch;
use crate::spec::walker::{rewrite_cert_refs, rewrite_name_refs};
use crate::spec::ConfigObject;

const ACME_POLL_ATTEMPTS: u32 = 6;
const ACME_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Injected clock so the verify phase's polling is testable.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the thread clock.
#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Everything the executor needs beyond the batch itself: preflight
/// outputs and the shared client. Read-only for the whole run.
pub struct MoveContext<'a> {
    pub client: &'a XcClient,
    pub target_ns: &'a str,
    /// `(namespace, lb_name)` pairs being moved in this run.
    pub move_set: &'a HashSet<(String, String)>,
    pub lb_src_ns: &'a HashMap<String, String>,
    pub lb_configs: &'a HashMap<String, ConfigObject>,
    pub lb_deps: &'a HashMap<String, Vec<Dependency>>,
    pub lb_renames: &'a HashMap<String, String>,
    pub dep_renames: &'a HashMap<DepKey, String>,
    pub skipped_deps: &'a HashSet<DepKey>,
    pub secret: &'a SecretCerts,
    pub rework_items: &'a BTreeMap<DepKey, ManualReworkItem>,
    pub external_dep_refs: &'a HashMap<DepKey, Vec<(String, String)>>,
    pub dns_managed_lbs: &'a HashSet<String>,
}

impl MoveContext<'_> {
    pub fn src_ns_of(&self, lb_name: &str) -> &str {
        self.lb_src_ns.get(lb_name).map(String::as_str).unwrap_or("?")
    }

    fn actual_lb_name<'b>(&'b self, lb_name: &'b str) -> &'b str {
        self.lb_renames.get(lb_name).map(String::as_str).unwrap_or(lb_name)
    }

    /// Synthesise the creation payload for an LB: cleaned metadata,
    /// stripped spec, namespace references rewritten, renames applied,
    /// matched non-portable certificate references substituted.
    pub fn plan_lb_payload(&self, lb_name: &str) -> (Value, Value) {
        let src_ns = self.src_ns_of(lb_name);
        let (mut metadata, mut spec) =
            self.lb_configs[lb_name].prepare_for_move(src_ns, self.target_ns);

        if let Some(new_name) = self.lb_renames.get(lb_name) {
            metadata["name"] = json!(new_name);
        }
        for ((_, old_name), new_name) in self.dep_renames {
            spec = rewrite_name_refs(&spec, old_name, new_name, self.target_ns);
        }
        for item in self.rework_items.values() {
            if item.is_matched() && item.lb_names.iter().any(|n| n == lb_name) {
                spec = rewrite_cert_refs(
                    &spec,
                    &item.cert_name,
                    &item.matched_cert_name,
                    &item.matched_cert_ns,
                );
            }
        }
        (metadata, spec)
    }

    /// Synthesise the creation payload for a dependency, applying its own
    /// rename and the renames of any sub-dependencies it references.
    pub fn plan_dep_payload(
        &self,
        key: &DepKey,
        config: &ConfigObject,
        src_ns: &str,
    ) -> (Value, Value) {
        let (mut metadata, mut spec) = config.prepare_for_move(src_ns, self.target_ns);
        if let Some(new_name) = self.dep_renames.get(key) {
            metadata["name"] = json!(new_name);
        }
        for (sub_key, new_sub_name) in self.dep_renames {
            if sub_key != key {
                spec = rewrite_name_refs(&spec, &sub_key.1, new_sub_name, self.target_ns);
            }
        }
        (metadata, spec)
    }
}

/// Mutable state of one batch run.
#[derive(Default)]
struct BatchState {
    lb_results: HashMap<String, MoveResult>,
    dep_results: HashMap<DepKey, DepMoveResult>,
    dep_configs: HashMap<DepKey, ConfigObject>,
    /// Merged dependency list of the batch, BFS order preserved.
    deps_ordered: Vec<Dependency>,
    /// First LB (in batch order) referencing each dependency; owns the
    /// backup JSON in the report.
    dep_owner: HashMap<DepKey, String>,
    deleted_lbs: Vec<(String, ConfigObject)>,
    deleted_deps: Vec<(ResourceKind, String, ConfigObject)>,
    created_deps: Vec<(ResourceKind, String)>,
    created_lbs: Vec<String>,
}

/// Phase 1 (backup) and phase 2 (external-referrer recheck) over one
/// batch. Returns the populated state, whether any backup GET failed, and
/// a non-empty blocked reason when external referrers were found.
fn backup_phase(
    ctx: &MoveContext<'_>,
    batch_lb_names: &[String],
    dry_run: bool,
) -> (BatchState, bool, String) {
    let mut state = BatchState::default();
    let mut backup_failed = false;
    let mut blocked_reason = String::new();

    for lb_name in batch_lb_names {
        let src_ns = ctx.src_ns_of(lb_name);
        let result = MoveResult::new(lb_name, src_ns, ctx.target_ns).with_lb_details(
            &ctx.lb_configs[lb_name],
            ctx.dns_managed_lbs.contains(lb_name),
        );
        state.lb_results.insert(lb_name.clone(), result);

        for dep in ctx.lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            let key = dep.key();
            if state.dep_results.contains_key(&key) {
                continue;
            }
            state.dep_owner.insert(key.clone(), lb_name.clone());
            let mut dep_result = DepMoveResult::new(dep.kind, &dep.name);

            let dep_config = match ctx.client.get_config_object(&dep.namespace, dep.kind, &dep.name)
            {
                Ok(config) => config,
                Err(err) => {
                    dep_result.status = if dry_run { MoveStatus::DryRun } else { MoveStatus::Failed };
                    dep_result.error =
                        format!("Failed to retrieve dependency configuration from the API: {err}");
                    info!("{} — FAILED to get config: {err}", dep.friendly());
                    state.dep_results.insert(key, dep_result);
                    if !dry_run {
                        backup_failed = true;
                    }
                    continue;
                }
            };
            dep_result.backup_json = dep_config.to_pretty_json();

            // Non-portable certs are not moved, so external referrers on
            // them are irrelevant.
            if ctx.secret.keys.contains(&key) {
                state.dep_configs.insert(key.clone(), dep_config);
                state.deps_ordered.push(dep.clone());
                state.dep_results.insert(key, dep_result);
                continue;
            }

            // Source 1: referring_objects from the GET (may be stale).
            let mut external: Vec<Referrer> = dep_config
                .referring_objects()
                .into_iter()
                .filter(|r| {
                    !is_reserved_namespace(&r.namespace)
                        && !ctx.move_set.contains(&(r.namespace.clone(), r.name.clone()))
                })
                .collect();
            // Source 2: the active scan, the source of truth.
            if external.is_empty() {
                if let Some(refs) = ctx.external_dep_refs.get(&key) {
                    external = refs
                        .iter()
                        .map(|(name, ns)| Referrer::new("http_loadbalancer", ns, name))
                        .collect();
                }
            }
            if !external.is_empty() {
                let summary = referrer_summary(&external);
                dep_result.status = MoveStatus::Blocked;
                dep_result.error = format!(
                    "Cannot move this dependency — it is referenced by {} external object(s) \
                     not included in the move list: {summary}. Moving it would break those \
                     objects. Either add the referencing objects to the move CSV or remove \
                     them first.",
                    external.len()
                );
                info!(
                    "{} — BLOCKED: referenced by {} external object(s): {summary}",
                    dep.friendly(),
                    external.len()
                );
                blocked_reason = format!(
                    "{} is referenced by objects outside the move list ({summary}). Moving it \
                     would break those objects. Remove them first or add them to the move list.",
                    dep.friendly()
                );
            }

            state.dep_configs.insert(key.clone(), dep_config);
            state.deps_ordered.push(dep.clone());
            state.dep_results.insert(key, dep_result);
        }
    }

    (state, backup_failed, blocked_reason)
}

/// Execute one batch against the live tenant.
///
/// Returns the per-LB results in batch order; dependency results are
/// already projected into each LB's `dependencies` list.
pub fn execute_batch(
    ctx: &MoveContext<'_>,
    batch_lb_names: &[String],
    sleeper: &dyn Sleeper,
) -> Vec<MoveResult> {
    let (mut state, backup_failed, blocked_reason) = backup_phase(ctx, batch_lb_names, false);

    if backup_failed {
        info!("    FAILED: Could not backup all dependencies — aborting batch.");
        finish_deps(&mut state, MoveStatus::Failed, "Batch aborted before any changes were made because one or more dependency configurations could not be retrieved from the source namespace.");
        finish_lbs(
            ctx,
            &mut state,
            batch_lb_names,
            MoveStatus::Failed,
            "Batch aborted — one or more dependency configurations could not be backed up from \
             the source namespace. No changes were made. Check API connectivity and \
             permissions, then retry.",
        );
        return project_results(ctx, state, batch_lb_names);
    }

    if !blocked_reason.is_empty() {
        info!("BLOCKED: {blocked_reason}");
        finish_deps(
            &mut state,
            MoveStatus::Blocked,
            &format!("Batch blocked — cannot proceed because a dependency in this batch is still referenced by external objects: {blocked_reason}"),
        );
        finish_lbs(
            ctx,
            &mut state,
            batch_lb_names,
            MoveStatus::Blocked,
            &format!("Batch blocked — {blocked_reason}"),
        );
        return project_results(ctx, state, batch_lb_names);
    }

    // ==============================================================
    // Plan creation payloads for all LBs up-front
    // ==============================================================
    let mut lb_planned: HashMap<String, (Value, Value)> = HashMap::new();
    for lb_name in batch_lb_names {
        if let Some(new_name) = ctx.lb_renames.get(lb_name) {
            if let Some(result) = state.lb_results.get_mut(lb_name) {
                result.new_lb_name = new_name.clone();
            }
        }
        lb_planned.insert(lb_name.clone(), ctx.plan_lb_payload(lb_name));
    }

    // ==============================================================
    // Phase 3a: Delete LBs top-down
    // ==============================================================
    info!("    Phase 3: Deleting from source (top-down)...");
    for lb_name in batch_lb_names {
        let src_ns = ctx.src_ns_of(lb_name);
        match ctx.client.delete_http_loadbalancer(src_ns, lb_name) {
            Ok(()) => {
                info!("      Deleted LB '{lb_name}' from '{src_ns}'");
                state
                    .deleted_lbs
                    .push((lb_name.clone(), ctx.lb_configs[lb_name].clone()));
            }
            Err(err) => {
                info!("FAILED to delete LB '{lb_name}': {err}");
                if let Some(result) = state.lb_results.get_mut(lb_name) {
                    result.error =
                        format!("Failed to delete load balancer from source namespace: {err}");
                }
                return abort_with_rollback(
                    ctx,
                    state,
                    batch_lb_names,
                    MoveStatus::Failed,
                    "Batch aborted — the load balancer could not be deleted from the source \
                     namespace. No changes were made to dependencies. A rollback was attempted \
                     for any already-deleted LBs.",
                    "Batch aborted — failed to delete one or more load balancers from the \
                     source namespace. A rollback was attempted to restore any already-deleted \
                     objects.",
                );
            }
        }
    }

    // ==============================================================
    // Phase 3b: Probe-delete each dependency
    // ==============================================================
    // With the batch's LBs gone, any remaining referrer is a genuine
    // external blocker. referring_objects may have been stale before, so
    // a fresh GET plus a probing delete is the final authority.
    let deps_ordered = state.deps_ordered.clone();
    let mut blocked_reason = String::new();
    'probe: for dep in &deps_ordered {
        let key = dep.key();
        if ctx.skipped_deps.contains(&key) {
            continue;
        }
        if ctx.secret.keys.contains(&key) {
            mark_manual_rework(ctx, &mut state, &key);
            info!("      Keeping {} in source (non-portable private key)", dep.friendly());
            continue;
        }

        let fresh_referrers = match ctx.client.get_config_object(&dep.namespace, dep.kind, &dep.name)
        {
            Ok(fresh) => fresh.referring_objects(),
            Err(_) => Vec::new(),
        };
        let mut external: Vec<Referrer> = fresh_referrers
            .into_iter()
            .filter(|r| {
                !is_reserved_namespace(&r.namespace)
                    && !ctx.move_set.contains(&(r.namespace.clone(), r.name.clone()))
            })
            .collect();

        if external.is_empty() {
            match ctx
                .client
                .probe_delete_config_object(&dep.namespace, dep.kind, &dep.name)
            {
                Ok(referrers) if referrers.is_empty() => {
                    // Probe success = the object was deleted by the probe.
                    state.deleted_deps.push((
                        dep.kind,
                        dep.name.clone(),
                        state.dep_configs[&key].clone(),
                    ));
                    if let Some(result) = state.dep_results.get_mut(&key) {
                        result.status = MoveStatus::Moved;
                    }
                    info!(
                        "      Deleted {} from '{}' (pre-flight)",
                        dep.friendly(),
                        dep.namespace
                    );
                    continue;
                }
                Ok(referrers) => external = referrers,
                Err(err) => {
                    info!("FAILED to probe-delete {}: {err}", dep.friendly());
                    if let Some(result) = state.dep_results.get_mut(&key) {
                        result.status = MoveStatus::Failed;
                        result.error =
                            format!("Failed to probe-delete dependency at source: {err}");
                    }
                    return abort_with_rollback(
                        ctx,
                        state,
                        batch_lb_names,
                        MoveStatus::Failed,
                        "Batch aborted — a dependency could not be probe-deleted from the \
                         source namespace. A rollback was attempted to restore all objects to \
                         their original state.",
                        "Batch aborted — a dependency could not be probe-deleted from the \
                         source namespace. A rollback was attempted to restore all objects \
                         (LBs and dependencies) to their original state.",
                    );
                }
            }
        }

        // External referrers survived the LB deletes: block the batch.
        let summary = referrer_summary(&external);
        info!(
            "      {} — BLOCKED: still referenced by external object(s): {summary}",
            dep.friendly()
        );
        if let Some(result) = state.dep_results.get_mut(&key) {
            result.status = MoveStatus::Blocked;
            result.error = format!(
                "Cannot move this dependency — it is still referenced by {} external \
                 object(s) not included in the move list: {summary}. These external objects \
                 would break if the dependency were removed. Either add the referencing \
                 objects to the move CSV or remove them first.",
                external.len()
            );
        }
        blocked_reason = format!(
            "{} is still referenced by objects outside the move list ({summary}). These \
             objects must be removed first or added to the move CSV.",
            dep.friendly()
        );
        break 'probe;
    }

    if !blocked_reason.is_empty() {
        info!("BLOCKED (after LB delete): {blocked_reason}");
        info!("Rolling back...");
        return abort_with_rollback(
            ctx,
            state,
            batch_lb_names,
            MoveStatus::Blocked,
            &format!("Batch blocked after LB deletion — a dependency is still referenced by external objects. All changes were rolled back. Details: {blocked_reason}"),
            &format!("Batch blocked after LB deletion — a dependency could not be moved because it is still referenced by external objects. All changes were rolled back. Details: {blocked_reason}"),
        );
    }

    // ==============================================================
    // Phase 3c: Delete remaining dependencies
    // ==============================================================
    let already_deleted: HashSet<DepKey> = state
        .deleted_deps
        .iter()
        .map(|(kind, name, _)| (*kind, name.clone()))
        .collect();
    for dep in &deps_ordered {
        let key = dep.key();
        if already_deleted.contains(&key)
            || ctx.skipped_deps.contains(&key)
            || ctx.secret.keys.contains(&key)
        {
            continue;
        }
        match ctx
            .client
            .delete_config_object(&dep.namespace, dep.kind, &dep.name)
        {
            Ok(()) => {
                info!("      Deleted {} from '{}'", dep.friendly(), dep.namespace);
                state.deleted_deps.push((
                    dep.kind,
                    dep.name.clone(),
                    state.dep_configs[&key].clone(),
                ));
            }
            Err(err) => {
                info!("FAILED to delete {}: {err}", dep.friendly());
                if let Some(result) = state.dep_results.get_mut(&key) {
                    result.status = MoveStatus::Failed;
                    result.error =
                        format!("Failed to delete dependency from source namespace: {err}");
                }
                return abort_with_rollback(
                    ctx,
                    state,
                    batch_lb_names,
                    MoveStatus::Failed,
                    "Batch aborted — a dependency could not be deleted from the source \
                     namespace. A rollback was attempted to restore all objects to their \
                     original state.",
                    "Batch aborted — a dependency could not be deleted from the source \
                     namespace. A rollback was attempted to restore all objects (LBs and \
                     dependencies) to their original state.",
                );
            }
        }
    }

    // ==============================================================
    // Phase 4a: Create dependencies bottom-up
    // ==============================================================
    info!("    Phase 4: Creating in '{}' (bottom-up)...", ctx.target_ns);
    for dep in deps_ordered.iter().rev() {
        let key = dep.key();
        if ctx.skipped_deps.contains(&key) {
            if let Some(result) = state.dep_results.get_mut(&key) {
                result.status = MoveStatus::Skipped;
                result.error = format!(
                    "Skipped due to name conflict — an object with the name '{}' already \
                     exists in the target namespace. The existing object in the target \
                     namespace will be referenced by the moved load balancer(s) instead.",
                    dep.name
                );
            }
            info!("      Skipped {} (exists in target, using existing)", dep.friendly());
            continue;
        }
        if ctx.secret.keys.contains(&key) {
            info!(
                "      Skipped {} (non-portable private key, stays in source)",
                dep.friendly()
            );
            continue;
        }

        let src_ns = ctx.src_ns_of(&state.dep_owner[&key]);
        let (dep_metadata, dep_spec) =
            ctx.plan_dep_payload(&key, &state.dep_configs[&key], src_ns);
        let actual_name = ctx
            .dep_renames
            .get(&key)
            .map(String::as_str)
            .unwrap_or(&dep.name);
        if let (Some(new_name), Some(result)) =
            (ctx.dep_renames.get(&key), state.dep_results.get_mut(&key))
        {
            result.new_name = new_name.clone();
        }

        match ctx
            .client
            .create_config_object(ctx.target_ns, dep.kind, &dep_metadata, &dep_spec)
        {
            Ok(_) => {
                state.created_deps.push((dep.kind, actual_name.to_string()));
                if let Some(result) = state.dep_results.get_mut(&key) {
                    result.status = MoveStatus::Moved;
                }
                if actual_name != dep.name {
                    info!(
                        "Created {} as '{actual_name}' in '{}'",
                        dep.friendly(),
                        ctx.target_ns
                    );
                } else {
                    info!("Created {} in '{}'", dep.friendly(), ctx.target_ns);
                }
            }
            Err(err) => {
                info!("FAILED to create {} '{actual_name}': {err}", dep.kind.friendly_name());
                if let Some(result) = state.dep_results.get_mut(&key) {
                    result.status = MoveStatus::Failed;
                    result.error =
                        format!("Failed to create dependency in the target namespace: {err}");
                }
                return abort_with_rollback(
                    ctx,
                    state,
                    batch_lb_names,
                    MoveStatus::Failed,
                    "Batch aborted — a dependency could not be created in the target \
                     namespace. A rollback was attempted to restore all objects to their \
                     original state in the source namespace.",
                    "Batch aborted — a dependency could not be created in the target \
                     namespace. A rollback was attempted to delete any already-created \
                     objects from the target and restore all objects in the source namespace.",
                );
            }
        }
    }

    // ==============================================================
    // Phase 4b: Create LBs
    // ==============================================================
    for lb_name in batch_lb_names {
        let (metadata, spec) = &lb_planned[lb_name];
        let actual_lb_name = ctx.actual_lb_name(lb_name).to_string();
        match ctx.client.create_http_loadbalancer(ctx.target_ns, metadata, spec) {
            Ok(_) => {
                if actual_lb_name != *lb_name {
                    info!("Created LB '{lb_name}' as '{actual_lb_name}' in '{}'", ctx.target_ns);
                } else {
                    info!("Created LB '{lb_name}' in '{}'", ctx.target_ns);
                }
                state.created_lbs.push(actual_lb_name);
            }
            Err(err) => {
                info!("FAILED to create LB '{actual_lb_name}': {err}");
                if let Some(result) = state.lb_results.get_mut(lb_name) {
                    result.error =
                        format!("Failed to create load balancer in the target namespace: {err}");
                }
                return abort_with_rollback(
                    ctx,
                    state,
                    batch_lb_names,
                    MoveStatus::Failed,
                    "Batch aborted — the load balancer could not be created in the target \
                     namespace. A rollback was attempted to restore all objects to their \
                     original state in the source namespace.",
                    "Batch aborted — the load balancer could not be created in the target \
                     namespace. A rollback was attempted to delete any already-created \
                     objects from the target and restore all objects in the source namespace.",
                );
            }
        }
    }

    // ==============================================================
    // Phase 5: Verify
    // ==============================================================
    for lb_name in batch_lb_names {
        verify_lb(ctx, &mut state, lb_name, sleeper);
    }
    for result in state.dep_results.values_mut() {
        if result.status == MoveStatus::Pending {
            result.status = MoveStatus::Moved;
        }
    }

    project_results(ctx, state, batch_lb_names)
}

/// Dry-run planning for one batch: backups, referrer checks, and planned
/// creation payloads, with no mutation of the remote side.
pub fn plan_batch(ctx: &MoveContext<'_>, batch_lb_names: &[String]) -> Vec<MoveResult> {
    let (mut state, _, blocked_reason) = backup_phase(ctx, batch_lb_names, true);

    if !blocked_reason.is_empty() {
        info!("BLOCKED (dry run): {blocked_reason}");
        finish_deps(
            &mut state,
            MoveStatus::Blocked,
            &format!("Batch blocked — cannot proceed because a dependency in this batch is still referenced by external objects: {blocked_reason}"),
        );
        finish_lbs(
            ctx,
            &mut state,
            batch_lb_names,
            MoveStatus::Blocked,
            &format!("Batch blocked — {blocked_reason}"),
        );
        return project_results(ctx, state, batch_lb_names);
    }

    for lb_name in batch_lb_names {
        let (metadata, spec) = ctx.plan_lb_payload(lb_name);
        let Some(result) = state.lb_results.get_mut(lb_name) else {
            continue;
        };
        if let Some(new_name) = ctx.lb_renames.get(lb_name) {
            result.new_lb_name = new_name.clone();
        }
        let planned = json!({"metadata": metadata, "spec": spec});
        result.planned_config_json = serde_json::to_string_pretty(&planned).unwrap_or_default();
        result.status = MoveStatus::DryRun;
    }

    let deps_ordered = state.deps_ordered.clone();
    for dep in deps_ordered.iter().rev() {
        let key = dep.key();
        if ctx.skipped_deps.contains(&key) {
            if let Some(result) = state.dep_results.get_mut(&key) {
                result.status = MoveStatus::Skipped;
                result.error = format!(
                    "Skipped due to name conflict — an object with the name '{}' already \
                     exists in the target namespace. The existing object in the target \
                     namespace will be used instead.",
                    dep.name
                );
            }
            continue;
        }
        if ctx.secret.keys.contains(&key) {
            mark_manual_rework(ctx, &mut state, &key);
            continue;
        }
        let Some(config) = state.dep_configs.get(&key) else {
            continue;
        };
        let src_ns = ctx.src_ns_of(&state.dep_owner[&key]);
        let (metadata, spec) = ctx.plan_dep_payload(&key, config, src_ns);
        let planned = json!({"metadata": metadata, "spec": spec});
        if let Some(result) = state.dep_results.get_mut(&key) {
            result.planned_config_json =
                serde_json::to_string_pretty(&planned).unwrap_or_default();
            if let Some(new_name) = ctx.dep_renames.get(&key) {
                result.new_name = new_name.clone();
            }
            if result.status == MoveStatus::Pending {
                result.status = MoveStatus::DryRun;
            }
        }
    }
    for result in state.dep_results.values_mut() {
        if result.status == MoveStatus::Pending {
            result.status = MoveStatus::DryRun;
        }
    }

    project_results(ctx, state, batch_lb_names)
}

/// GET the created LB to extract the new CNAMEs. The ACME challenge CNAME
/// of a Let's Encrypt LB is provisioned asynchronously, so it is polled a
/// few times before giving up.
fn verify_lb(ctx: &MoveContext<'_>, state: &mut BatchState, lb_name: &str, sleeper: &dyn Sleeper) {
    let actual_lb_name = ctx.actual_lb_name(lb_name).to_string();
    let Some(result) = state.lb_results.get_mut(lb_name) else {
        return;
    };
    let is_le = result.is_lets_encrypt();

    match ctx.client.get_http_loadbalancer(ctx.target_ns, &actual_lb_name) {
        Ok(new_config) => {
            result.cname_new = new_config.cname();
            result.acme_cname_new = new_config.acme_cname();

            if is_le && result.acme_cname_new.is_empty() {
                for poll in 0..ACME_POLL_ATTEMPTS {
                    sleeper.sleep(ACME_POLL_INTERVAL);
                    match ctx.client.get_http_loadbalancer(ctx.target_ns, &actual_lb_name) {
                        Ok(polled) => {
                            result.acme_cname_new = polled.acme_cname();
                            if !result.acme_cname_new.is_empty() {
                                info!(
                                    "ACME challenge CNAME for '{lb_name}' available after {}s",
                                    (poll + 1) * ACME_POLL_INTERVAL.as_secs() as u32
                                );
                                break;
                            }
                        }
                        Err(err) => {
                            info!("ACME CNAME poll attempt {} for '{lb_name}' failed: {err}", poll + 1);
                        }
                    }
                }
                if result.acme_cname_new.is_empty() {
                    warn!(
                        "ACME challenge CNAME for '{lb_name}' not yet available after {}s — \
                         check the XC Console.",
                        ACME_POLL_ATTEMPTS * ACME_POLL_INTERVAL.as_secs() as u32
                    );
                }
            }
        }
        Err(err) => {
            warn!("Could not fetch new CNAME for '{actual_lb_name}': {err}");
            result.cname_new = "(fetch failed)".to_string();
            result.acme_cname_new = "(fetch failed)".to_string();
        }
    }
    result.status = MoveStatus::Moved;
}

/// Set the non-portable cert dep result to manual-rework with the matched
/// or unmatched explanation.
fn mark_manual_rework(ctx: &MoveContext<'_>, state: &mut BatchState, key: &DepKey) {
    let Some(result) = state.dep_results.get_mut(key) else {
        return;
    };
    result.status = MoveStatus::ManualRework;
    result.error = match ctx.rework_items.get(key) {
        Some(item) if item.is_matched() => format!(
            "Non-portable {}. Matched to '{}' in '{}'.",
            item.secret_type, item.matched_cert_name, item.matched_cert_ns
        ),
        _ => format!(
            "Non-portable {}. Certificate stays in source namespace.",
            ctx.secret
                .reasons
                .get(key)
                .map(String::as_str)
                .unwrap_or("private key")
        ),
    };
}

fn referrer_summary(referrers: &[Referrer]) -> String {
    let names: Vec<String> = referrers.iter().map(Referrer::to_string).collect();
    let mut summary = names.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
    if names.len() > 5 {
        summary.push_str(&format!(" (+{} more)", names.len() - 5));
    }
    summary
}

/// Give every still-pending dependency result a terminal status.
fn finish_deps(state: &mut BatchState, status: MoveStatus, error: &str) {
    for result in state.dep_results.values_mut() {
        if result.status == MoveStatus::Pending {
            result.status = status;
            result.error = error.to_string();
        }
    }
}

/// Give every LB that was not reverted a terminal status.
fn finish_lbs(
    _ctx: &MoveContext<'_>,
    state: &mut BatchState,
    batch_lb_names: &[String],
    status: MoveStatus,
    error: &str,
) {
    for lb_name in batch_lb_names {
        let Some(result) = state.lb_results.get_mut(lb_name) else {
            continue;
        };
        if result.status != MoveStatus::Reverted {
            result.status = status;
            if result.error.is_empty() {
                result.error = error.to_string();
            }
        }
    }
}

/// Roll back everything done so far, then finalise statuses.
fn abort_with_rollback(
    ctx: &MoveContext<'_>,
    mut state: BatchState,
    batch_lb_names: &[String],
    status: MoveStatus,
    dep_error: &str,
    lb_error: &str,
) -> Vec<MoveResult> {
    let src_ns = ctx.src_ns_of(&batch_lb_names[0]).to_string();
    rollback_batch(
        ctx.client,
        &src_ns,
        ctx.target_ns,
        &state.deleted_lbs,
        &state.deleted_deps,
        &state.created_deps,
        &state.created_lbs,
        &mut state.lb_results,
        &mut state.dep_results,
    );
    finish_deps(&mut state, status, dep_error);
    finish_lbs(ctx, &mut state, batch_lb_names, status, lb_error);
    project_results(ctx, state, batch_lb_names)
}

/// Project the canonical dependency results into each LB's result, in the
/// LB's own discovery order. The backup JSON stays on the first LB that
/// referenced the dependency; other LBs carry a cross-reference copy.
fn project_results(
    ctx: &MoveContext<'_>,
    mut state: BatchState,
    batch_lb_names: &[String],
) -> Vec<MoveResult> {
    let mut results = Vec::new();
    for lb_name in batch_lb_names {
        let Some(mut result) = state.lb_results.remove(lb_name) else {
            continue;
        };
        for dep in ctx.lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            let key = dep.key();
            let Some(canonical) = state.dep_results.get(&key) else {
                continue;
            };
            let mut projected = canonical.clone();
            if state.dep_owner.get(&key).map(String::as_str) != Some(lb_name.as_str()) {
                projected.backup_json = String::new();
            }
            result.dependencies.push(projected);
        }
        results.push(result);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpClient, HttpConfig};
    use httpmock::Method::{DELETE, GET, POST};
    use httpmock::MockServer;
    use std::sync::Mutex;

    /// Sleeper that records requested sleeps instead of blocking.
    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn client_for(server: &MockServer) -> XcClient {
        let config = HttpConfig::new(
            Duration::from_secs(3),
            Duration::from_secs(3),
            Duration::from_millis(1),
        );
        XcClient::new(HttpClient::new(config, "tok").unwrap(), &server.base_url())
    }

    struct Fixture {
        move_set: HashSet<(String, String)>,
        lb_src_ns: HashMap<String, String>,
        lb_configs: HashMap<String, ConfigObject>,
        lb_deps: HashMap<String, Vec<Dependency>>,
        lb_renames: HashMap<String, String>,
        dep_renames: HashMap<DepKey, String>,
        skipped_deps: HashSet<DepKey>,
        secret: SecretCerts,
        rework_items: BTreeMap<DepKey, ManualReworkItem>,
        external_dep_refs: HashMap<DepKey, Vec<(String, String)>>,
        dns_managed_lbs: HashSet<String>,
    }

    impl Fixture {
        fn new(lbs: &[(&str, Vec<Dependency>)]) -> Self {
            let mut move_set = HashSet::new();
            let mut lb_src_ns = HashMap::new();
            let mut lb_configs = HashMap::new();
            let mut lb_deps = HashMap::new();
            for (lb_name, deps) in lbs {
                move_set.insert(("ns1".to_string(), lb_name.to_string()));
                lb_src_ns.insert(lb_name.to_string(), "ns1".to_string());
                let pools: Vec<Value> = deps
                    .iter()
                    .filter(|d| d.kind == ResourceKind::OriginPools)
                    .map(|d| json!({"pool": {"name": d.name, "namespace": "ns1"}}))
                    .collect();
                lb_configs.insert(
                    lb_name.to_string(),
                    ConfigObject::from(json!({
                        "metadata": {"name": lb_name, "namespace": "ns1"},
                        "spec": {"http": {}, "default_route_pools": pools}
                    })),
                );
                lb_deps.insert(lb_name.to_string(), deps.clone());
            }
            Self {
                move_set,
                lb_src_ns,
                lb_configs,
                lb_deps,
                lb_renames: HashMap::new(),
                dep_renames: HashMap::new(),
                skipped_deps: HashSet::new(),
                secret: SecretCerts::default(),
                rework_items: BTreeMap::new(),
                external_dep_refs: HashMap::new(),
                dns_managed_lbs: HashSet::new(),
            }
        }

        fn ctx<'a>(&'a self, client: &'a XcClient) -> MoveContext<'a> {
            MoveContext {
                client,
                target_ns: "ns2",
                move_set: &self.move_set,
                lb_src_ns: &self.lb_src_ns,
                lb_configs: &self.lb_configs,
                lb_deps: &self.lb_deps,
                lb_renames: &self.lb_renames,
                dep_renames: &self.dep_renames,
                skipped_deps: &self.skipped_deps,
                secret: &self.secret,
                rework_items: &self.rework_items,
                external_dep_refs: &self.external_dep_refs,
                dns_managed_lbs: &self.dns_managed_lbs,
            }
        }
    }

    fn pool_dep(name: &str) -> Dependency {
        Dependency::new(ResourceKind::OriginPools, name, "ns1")
    }

    fn mock_dep_get(server: &MockServer, name: &str) {
        server.mock(|when, then| {
            when.method(GET)
                .path(format!("/api/config/namespaces/ns1/origin_pools/{name}"));
            then.status(200).json_body(json!({
                "metadata": {"name": name, "namespace": "ns1"},
                "spec": {"origin_servers": []},
                "referring_objects": []
            }));
        });
    }

    #[test]
    fn single_lb_without_deps_moves_cleanly() {
        let server = MockServer::start();
        let delete_lb = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({}));
        });
        let create_lb = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns2/http_loadbalancers");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns2/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({
                "spec": {"dns_info": [{"dns_name": "new.cname.example"}]}
            }));
        });

        let fixture = Fixture::new(&[("lb-a", vec![])]);
        let client = client_for(&server);
        let results = execute_batch(&fixture.ctx(&client), &["lb-a".to_string()], &RecordingSleeper::default());

        delete_lb.assert();
        create_lb.assert();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, MoveStatus::Moved);
        assert_eq!(results[0].cname_new, "new.cname.example");
    }

    #[test]
    fn shared_dep_batch_orders_deletes_and_creates_correctly() {
        let server = MockServer::start();
        mock_dep_get(&server, "op-shared");
        for lb in ["lb-a", "lb-b"] {
            server.mock(|when, then| {
                when.method(DELETE)
                    .path(format!("/api/config/namespaces/ns1/http_loadbalancers/{lb}"));
                then.status(200).json_body(json!({}));
            });
            server.mock(|when, then| {
                when.method(GET)
                    .path(format!("/api/config/namespaces/ns2/http_loadbalancers/{lb}"));
                then.status(200).json_body(json!({"spec": {}}));
            });
        }
        // Probe delete removes the shared pool.
        let probe = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/origin_pools/op-shared")
                .json_body_partial(r#"{"fail_if_referred": true}"#);
            then.status(200).json_body(json!({}));
        });
        let create_dep = server.mock(|when, then| {
            when.method(POST).path("/api/config/namespaces/ns2/origin_pools");
            then.status(200).json_body(json!({}));
        });
        let create_lbs = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns2/http_loadbalancers");
            then.status(200).json_body(json!({}));
        });

        let fixture = Fixture::new(&[
            ("lb-a", vec![pool_dep("op-shared")]),
            ("lb-b", vec![pool_dep("op-shared")]),
        ]);
        let client = client_for(&server);
        let results = execute_batch(
            &fixture.ctx(&client),
            &["lb-a".to_string(), "lb-b".to_string()],
            &RecordingSleeper::default(),
        );

        probe.assert();
        create_dep.assert();
        assert_eq!(create_lbs.hits(), 2);
        assert!(results.iter().all(|r| r.status == MoveStatus::Moved));
        // Both LBs report the shared dep; only the first carries the backup.
        assert_eq!(results[0].dependencies.len(), 1);
        assert_eq!(results[1].dependencies.len(), 1);
        assert!(!results[0].dependencies[0].backup_json.is_empty());
        assert!(results[1].dependencies[0].backup_json.is_empty());
        assert_eq!(results[0].dependencies[0].status, MoveStatus::Moved);
    }

    #[test]
    fn probe_conflict_blocks_batch_and_rolls_back() {
        let server = MockServer::start();
        mock_dep_get(&server, "op-shared");
        let delete_lb = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/origin_pools/op-shared")
                .json_body_partial(r#"{"fail_if_referred": true}"#);
            then.status(409)
                .json_body(json!({"message": "referenced by http_loadbalancer ns1/lb-c"}));
        });
        // Rollback re-creates the deleted LB.
        let recreate_lb = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns1/http_loadbalancers");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({"spec": {}}));
        });

        let fixture = Fixture::new(&[("lb-a", vec![pool_dep("op-shared")])]);
        let client = client_for(&server);
        let results = execute_batch(&fixture.ctx(&client), &["lb-a".to_string()], &RecordingSleeper::default());

        delete_lb.assert();
        recreate_lb.assert();
        assert_eq!(results[0].status, MoveStatus::Reverted);
        let dep = &results[0].dependencies[0];
        assert_eq!(dep.status, MoveStatus::Blocked);
        assert!(dep.error.contains("lb-c"));
    }

    #[test]
    fn dep_create_failure_triggers_full_rollback() {
        let server = MockServer::start();
        mock_dep_get(&server, "op-a");
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/origin_pools/op-a");
            then.status(200).json_body(json!({}));
        });
        // Create in target fails.
        server.mock(|when, then| {
            when.method(POST).path("/api/config/namespaces/ns2/origin_pools");
            then.status(500).body("boom");
        });
        // Rollback: re-create dep and LB in source.
        let recreate_dep = server.mock(|when, then| {
            when.method(POST).path("/api/config/namespaces/ns1/origin_pools");
            then.status(200).json_body(json!({}));
        });
        let recreate_lb = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns1/http_loadbalancers");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({"spec": {}}));
        });

        let fixture = Fixture::new(&[("lb-a", vec![pool_dep("op-a")])]);
        let client = client_for(&server);
        let results = execute_batch(&fixture.ctx(&client), &["lb-a".to_string()], &RecordingSleeper::default());

        recreate_dep.assert();
        recreate_lb.assert();
        assert_eq!(results[0].status, MoveStatus::Reverted);
        assert_eq!(results[0].dependencies[0].status, MoveStatus::Reverted);
    }

    #[test]
    fn backup_failure_aborts_before_any_mutation() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns1/origin_pools/op-a");
            then.status(500);
        });
        let delete_lb = server.mock(|when, then| {
            when.method(DELETE).path_contains("http_loadbalancers");
            then.status(200).json_body(json!({}));
        });

        let fixture = Fixture::new(&[("lb-a", vec![pool_dep("op-a")])]);
        let client = client_for(&server);
        let results = execute_batch(&fixture.ctx(&client), &["lb-a".to_string()], &RecordingSleeper::default());

        assert_eq!(delete_lb.hits(), 0);
        assert_eq!(results[0].status, MoveStatus::Failed);
        assert_eq!(results[0].dependencies[0].status, MoveStatus::Failed);
    }

    #[test]
    fn lets_encrypt_acme_cname_is_polled() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-le");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns2/http_loadbalancers");
            then.status(200).json_body(json!({}));
        });
        // ACME CNAME never shows up; the poll gives up after six attempts.
        let verify_gets = server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns2/http_loadbalancers/lb-le");
            then.status(200).json_body(json!({"spec": {}}));
        });

        let mut fixture = Fixture::new(&[("lb-le", vec![])]);
        fixture.lb_configs.insert(
            "lb-le".to_string(),
            ConfigObject::from(json!({
                "metadata": {"name": "lb-le", "namespace": "ns1"},
                "spec": {"https_auto_cert": {}}
            })),
        );

        let client = client_for(&server);
        let sleeper = RecordingSleeper::default();
        let results = execute_batch(&fixture.ctx(&client), &["lb-le".to_string()], &sleeper);

        assert_eq!(results[0].status, MoveStatus::Moved);
        // 1 initial verify GET + 6 polls
        assert_eq!(verify_gets.hits(), 7);
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_secs(5); 6]
        );
    }

    #[test]
    fn nonportable_cert_stays_in_source_and_reference_is_substituted() {
        let server = MockServer::start();
        let cert_key: DepKey = (ResourceKind::Certificates, "c1".to_string());
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns1/certificates/c1");
            then.status(200).json_body(json!({
                "metadata": {"name": "c1", "namespace": "ns1"},
                "spec": {"private_key": {"blindfold_secret_info": {"location": "x"}}}
            }));
        });
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({}));
        });
        // Creation must carry the substituted cert reference.
        let create_lb = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns2/http_loadbalancers")
                .json_body_partial(
                    r#"{"spec": {"https": {"tls_cert_params": {"certificates": [{"name": "c1-shared", "namespace": "shared"}]}}}}"#,
                );
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns2/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({"spec": {}}));
        });
        // No delete of the certificate may ever happen.
        let cert_delete = server.mock(|when, then| {
            when.method(DELETE).path_contains("certificates");
            then.status(200).json_body(json!({}));
        });

        let mut fixture = Fixture::new(&[(
            "lb-a",
            vec![Dependency::new(ResourceKind::Certificates, "c1", "ns1")],
        )]);
        fixture.lb_configs.insert(
            "lb-a".to_string(),
            ConfigObject::from(json!({
                "metadata": {"name": "lb-a", "namespace": "ns1"},
                "spec": {"https": {"tls_cert_params": {
                    "certificates": [{"name": "c1", "namespace": "ns1"}]
                }}}
            })),
        );
        fixture.secret.keys.insert(cert_key.clone());
        fixture
            .secret
            .reasons
            .insert(cert_key.clone(), "private key (blindfolded)".to_string());
        fixture.rework_items.insert(
            cert_key.clone(),
            ManualReworkItem {
                cert_name: "c1".to_string(),
                cert_key: cert_key.clone(),
                lb_names: vec!["lb-a".to_string()],
                src_namespace: "ns1".to_string(),
                dst_namespace: "ns2".to_string(),
                secret_type: "private key (blindfolded)".to_string(),
                cert_domains: vec![],
                matched_cert_name: "c1-shared".to_string(),
                matched_cert_ns: "shared".to_string(),
                matched_cert_domains: vec![],
                original_config_json: String::new(),
            },
        );

        let client = client_for(&server);
        let results = execute_batch(&fixture.ctx(&client), &["lb-a".to_string()], &RecordingSleeper::default());

        create_lb.assert();
        assert_eq!(cert_delete.hits(), 0);
        assert_eq!(results[0].status, MoveStatus::Moved);
        assert_eq!(results[0].dependencies[0].status, MoveStatus::ManualRework);
        assert!(results[0].dependencies[0].error.contains("c1-shared"));
    }

    #[test]
    fn plan_batch_produces_planned_payloads_without_mutations() {
        let server = MockServer::start();
        mock_dep_get(&server, "op-a");
        // Any DELETE or POST would be a dry-run violation.
        let mutations = server.mock(|when, then| {
            when.method(DELETE).path_contains("/api/config/");
            then.status(200).json_body(json!({}));
        });
        let creations = server.mock(|when, then| {
            when.method(POST).path_contains("/api/config/");
            then.status(200).json_body(json!({}));
        });

        let fixture = Fixture::new(&[("lb-a", vec![pool_dep("op-a")])]);
        let client = client_for(&server);
        let results = plan_batch(&fixture.ctx(&client), &["lb-a".to_string()]);

        assert_eq!(mutations.hits(), 0);
        assert_eq!(creations.hits(), 0);
        assert_eq!(results[0].status, MoveStatus::DryRun);
        assert!(results[0].planned_config_json.contains("\"namespace\": \"ns2\""));
        let dep = &results[0].dependencies[0];
        assert_eq!(dep.status, MoveStatus::DryRun);
        assert!(dep.planned_config_json.contains("op-a"));
        assert!(!dep.backup_json.is_empty());
    }

    #[test]
    fn renames_are_applied_to_names_and_references() {
        let server = MockServer::start();
        mock_dep_get(&server, "op-a");
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/origin_pools/op-a");
            then.status(200).json_body(json!({}));
        });
        let create_dep = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns2/origin_pools")
                .json_body_partial(r#"{"metadata": {"name": "mv-op-a"}}"#);
            then.status(200).json_body(json!({}));
        });
        let create_lb = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns2/http_loadbalancers")
                .json_body_partial(
                    r#"{"metadata": {"name": "mv-lb-a"}, "spec": {"default_route_pools": [{"pool": {"name": "mv-op-a", "namespace": "ns2"}}]}}"#,
                );
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns2/http_loadbalancers/mv-lb-a");
            then.status(200).json_body(json!({"spec": {}}));
        });

        let mut fixture = Fixture::new(&[("lb-a", vec![pool_dep("op-a")])]);
        fixture
            .lb_renames
            .insert("lb-a".to_string(), "mv-lb-a".to_string());
        fixture.dep_renames.insert(
            (ResourceKind::OriginPools, "op-a".to_string()),
            "mv-op-a".to_string(),
        );

        let client = client_for(&server);
        let results = execute_batch(&fixture.ctx(&client), &["lb-a".to_string()], &RecordingSleeper::default());

        create_dep.assert();
        create_lb.assert();
        assert_eq!(results[0].status, MoveStatus::Moved);
        assert_eq!(results[0].new_lb_name, "mv-lb-a");
        assert_eq!(results[0].dependencies[0].new_name, "mv-op-a");
    }
}
