//! End-to-end run orchestration: fingerprint gate, discovery, batching,
//! pre-flight, per-batch execution, summary, and report generation.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::info;

use crate::api::{ApiError, XcClient};
use crate::config::{Config, ConfigError, XcName};
use crate::mover::batch::cluster_batches;
use crate::mover::conflict::ConflictAction;
use crate::mover::console::{confirm, print_progress, print_step, Prompter};
use crate::mover::discovery::discover_lbs_and_deps;
use crate::mover::executor::{execute_batch, plan_batch, MoveContext, Sleeper};
use crate::mover::fingerprint::{compute_fingerprint, FingerprintStore};
use crate::mover::graphs::build_batch_graphs;
use crate::mover::input::read_move_csv;
use crate::mover::model::{DepMoveResult, MoveResult, MoveStatus};
use crate::mover::preflight::{
    check_name_conflicts, detect_nonportable_certs, match_certificates, scan_dns_zones,
    scan_external_references,
};
use crate::report::{write_mover_report, ReportError};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub force_all: bool,
    pub dry_run: bool,
    pub conflict_action: ConflictAction,
    pub skip_dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct RunPaths {
    pub csv_path: PathBuf,
    pub fingerprint_path: PathBuf,
    pub report_dir: PathBuf,
    pub log_path: PathBuf,
}

/// Aggregate outcome of a run, driving the exit code.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub results: Vec<MoveResult>,
    pub report_path: Option<PathBuf>,
    pub interrupted: bool,
    /// Operator declined to proceed (fingerprint gate); nothing was done.
    pub aborted: bool,
}

impl RunOutcome {
    /// Non-zero exit iff any LB ended `failed` or `blocked`.
    pub fn any_failure(&self) -> bool {
        self.results.iter().any(|r| r.status.is_failure())
    }

    fn count(&self, status: MoveStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    client: &XcClient,
    config: &Config,
    options: &RunOptions,
    paths: &RunPaths,
    prompter: &mut dyn Prompter,
    sleeper: &dyn Sleeper,
    interrupt: &AtomicBool,
) -> Result<RunOutcome, RunError> {
    let tenant_name = &config.tenant.name;
    let target_namespace: XcName = config.target_namespace()?;
    let target_ns = target_namespace.as_str();
    let conflict_prefix = config.mover.conflict_prefix.trim().to_string();
    let conflict_action = options.conflict_action;

    if conflict_action == ConflictAction::Prefix && conflict_prefix.is_empty() {
        return Err(ConfigError::MissingConflictPrefix.into());
    }
    if conflict_action == ConflictAction::Ask && conflict_prefix.is_empty() {
        info!("mover.conflict_prefix is not set — conflicts can only be resolved by skipping.");
    }

    let entries = read_move_csv(&paths.csv_path)?;
    let mut outcome = RunOutcome::default();
    if entries.is_empty() {
        println!("No HTTP load balancers found in CSV — nothing to do.");
        return Ok(outcome);
    }

    println!("Tenant:           {tenant_name}");
    println!("Input CSV:        {}", paths.csv_path.display());
    println!("Target namespace: {target_ns}");
    println!("LBs to move:      {}", entries.len());
    if !conflict_prefix.is_empty() {
        println!("Conflict prefix:  {conflict_prefix}");
    }
    println!("Conflict action:  {conflict_action}");
    if options.dry_run {
        println!("Mode:             DRY RUN (no changes will be made)");
    }
    println!("Log file:         {}", paths.log_path.display());
    println!();

    // ------------------------------------------------------------------
    // Fingerprint gate: a real run requires a matching prior dry-run.
    // ------------------------------------------------------------------
    let store = FingerprintStore::new(&paths.fingerprint_path);
    let current_fingerprint = compute_fingerprint(tenant_name, target_ns, &paths.csv_path);
    if !options.dry_run {
        if options.skip_dry_run {
            println!("Dry-run check:    SKIPPED (--skip-dry-run)");
            info!("Dry-run verification skipped by user (--skip-dry-run).");
        } else {
            let (stored_fp, stored_ts) = store.read();
            if stored_fp == current_fingerprint {
                println!("Dry-run check:    VERIFIED (fingerprint match, dry-run from {stored_ts})");
            } else {
                println!();
                println!("{}", "=".repeat(70));
                if stored_fp.is_empty() {
                    println!("WARNING: No dry-run has been performed for this configuration!");
                    println!();
                    println!("A dry-run (--dry-run) generates a detailed report showing");
                    println!("exactly what will be moved, which dependencies are affected,");
                    println!("and whether any certificates require manual rework.");
                } else {
                    println!("WARNING: Configuration has changed since the last dry-run!");
                    println!("  Last dry-run: {stored_ts}");
                    println!("  Stored fingerprint:  {stored_fp}");
                    println!("  Current fingerprint: {current_fingerprint}");
                    println!();
                    println!("The CSV, target namespace, or tenant has been modified.");
                }
                println!();
                println!("It is strongly recommended to review a dry-run report first.");
                println!();
                println!("To continue without a matching dry-run, type SKIP-DRYRUN");
                println!("{}", "=".repeat(70));
                if prompter.ask("  > ") != "SKIP-DRYRUN" {
                    println!("Aborted. Run with --dry-run first.");
                    outcome.aborted = true;
                    return Ok(outcome);
                }
                println!();
                info!("Dry-run verification overridden by user.");
            }
        }
    }

    // Rows already in the target namespace have nothing to move.
    let to_move: Vec<_> = entries
        .iter()
        .filter(|e| e.namespace.as_str() != target_ns)
        .cloned()
        .collect();
    let skipped_same_ns = entries.len() - to_move.len();
    if skipped_same_ns > 0 {
        println!("Skipping {skipped_same_ns} LB(s) already in target namespace '{target_ns}'");
    }
    if to_move.is_empty() {
        println!("All LBs are already in the target namespace — nothing to do.");
        return Ok(outcome);
    }

    let entry_src_ns: HashMap<String, String> = entries
        .iter()
        .map(|e| (e.lb_name.to_string(), e.namespace.to_string()))
        .collect();

    // ==================================================================
    // Phase 0: Discovery & clustering
    // ==================================================================
    println!("Pre-flight checks:");
    print_step("Discovering load balancers & dependencies", "");
    let discovery = discover_lbs_and_deps(client, &to_move);
    let mut lb_order: Vec<String> = to_move
        .iter()
        .map(|e| e.lb_name.to_string())
        .filter(|name| discovery.lb_configs.contains_key(name))
        .collect();
    let mut lb_deps = discovery.lb_deps;
    let lb_configs = discovery.lb_configs;
    let (mut batches, _dep_to_lbs) = cluster_batches(&lb_order, &lb_deps);
    let mut lb_src_ns: HashMap<String, String> = to_move
        .iter()
        .map(|e| (e.lb_name.to_string(), e.namespace.to_string()))
        .collect();
    let total_deps: usize = lb_deps.values().map(Vec::len).sum();
    print_step(
        "Discovering load balancers & dependencies",
        &format!(
            "{} LB(s), {total_deps} dep(s), {} batch(es)",
            lb_configs.len(),
            batches.len()
        ),
    );

    // ==================================================================
    // Phase 0b: Cross-reference scan
    // ==================================================================
    print_step("Scanning external references", "");
    let mut external_dep_refs = scan_external_references(client, &to_move, &lb_deps);
    print_step(
        "Scanning external references",
        &if external_dep_refs.is_empty() {
            "none found".to_string()
        } else {
            format!("{} external ref(s)", external_dep_refs.len())
        },
    );

    // ==================================================================
    // Phase 0d-detect: Identify non-portable certificates
    // ==================================================================
    print_step("Scanning certificates", "");
    let secret = detect_nonportable_certs(client, &lb_order, &lb_deps);
    let total_cert_deps = lb_deps
        .values()
        .flatten()
        .filter(|d| d.kind == crate::api::kind::ResourceKind::Certificates)
        .count();
    print_step(
        "Scanning certificates",
        &if total_cert_deps == 0 {
            "none found".to_string()
        } else {
            format!("{total_cert_deps} scanned, {} non-portable", secret.keys.len())
        },
    );

    // ==================================================================
    // Phase 0c: Conflict detection in the target namespace
    // ==================================================================
    print_step("Checking conflicts in target namespace", "");
    let conflicts = check_name_conflicts(
        client,
        target_ns,
        &lb_order,
        &lb_deps,
        &secret.keys,
        &conflict_prefix,
        conflict_action,
        prompter,
    )?;
    if conflicts.conflict_count == 0 {
        print_step("Checking conflicts in target namespace", "none found");
    } else {
        let mut parts = Vec::new();
        if conflicts.renamed_count() > 0 {
            parts.push(format!("{} renamed", conflicts.renamed_count()));
        }
        if conflicts.skipped_count() > 0 {
            parts.push(format!("{} skipped", conflicts.skipped_count()));
        }
        print_step(
            "Checking conflicts in target namespace",
            &format!("{} conflict(s): {}", conflicts.conflict_count, parts.join(", ")),
        );
    }

    // Conflict-skipped LBs leave the move set; re-cluster what remains.
    if !conflicts.skipped_lbs.is_empty() {
        lb_order.retain(|name| !conflicts.skipped_lbs.contains(name));
        lb_deps.retain(|name, _| !conflicts.skipped_lbs.contains(name));
        lb_src_ns.retain(|name, _| !conflicts.skipped_lbs.contains(name));
        let reclustered = cluster_batches(&lb_order, &lb_deps);
        batches = reclustered.0;
    }

    let move_set: HashSet<(String, String)> = to_move
        .iter()
        .filter(|e| !conflicts.skipped_lbs.contains(e.lb_name.as_str()))
        .map(|e| (e.namespace.to_string(), e.lb_name.to_string()))
        .collect();

    if lb_order.is_empty() && discovery.failed.is_empty() && conflicts.skipped_lbs.is_empty() {
        println!("All LBs skipped due to conflicts — nothing to do.");
        return Ok(outcome);
    }

    // ==================================================================
    // Phase 0d: Certificate matching in target/shared
    // ==================================================================
    if !secret.keys.is_empty() {
        print_step("Matching certificates in target/shared", "");
    }
    let (rework_items, cert_blocked_lbs) = match_certificates(
        client,
        &secret,
        &lb_configs,
        &lb_src_ns,
        target_ns,
        &batches,
    )?;
    if !secret.keys.is_empty() {
        // Non-portable certs are not moved, so references to them by
        // outside LBs are expected and no longer block anything.
        for key in &secret.keys {
            external_dep_refs.remove(key);
        }
        let matched = rework_items.values().filter(|i| i.is_matched()).count();
        let unmatched = rework_items.len() - matched;
        print_step(
            "Matching certificates in target/shared",
            &if unmatched > 0 {
                format!("{matched} of {} matched, {unmatched} blocked", secret.keys.len())
            } else {
                format!("{matched} of {} matched", secret.keys.len())
            },
        );
    }

    // ==================================================================
    // Phase 0e: DNS zone pre-flight
    // ==================================================================
    print_step("Scanning DNS zones", "");
    let dns = scan_dns_zones(client, &lb_configs)?;
    print_step(
        "Scanning DNS zones",
        &if dns.zone_count == 0 && dns.managed_zones.is_empty() {
            "unavailable (no permission)".to_string()
        } else if dns.managed_zones.is_empty() {
            format!("{} zone(s), none managed", dns.zone_count)
        } else {
            format!("{} zone(s), {} managed", dns.zone_count, dns.managed_zones.len())
        },
    );
    println!();

    let mut batch_graphs =
        build_batch_graphs(&batches, &lb_deps, &lb_configs, &lb_src_ns, &external_dep_refs);

    // ==================================================================
    // Results for LBs that never reach a batch
    // ==================================================================
    for lb_name in &discovery.failed {
        let src_ns = entry_src_ns.get(lb_name).map(String::as_str).unwrap_or("?");
        let mut result = MoveResult::new(lb_name, src_ns, target_ns);
        result.status = MoveStatus::Failed;
        result.error = "Failed to retrieve load balancer configuration from the API during \
                        initial discovery. Check that the LB name and namespace in the CSV are \
                        correct and that the API token has read access."
            .to_string();
        outcome.results.push(result);
    }
    for lb_name in &conflicts.skipped_lbs {
        let src_ns = entry_src_ns.get(lb_name).map(String::as_str).unwrap_or("?");
        let mut result = MoveResult::new(lb_name, src_ns, target_ns);
        if let Some(config) = lb_configs.get(lb_name) {
            result = result.with_lb_details(config, dns.dns_managed_lbs.contains(lb_name));
        }
        result.status = MoveStatus::Skipped;
        result.error = format!(
            "Skipped due to name conflict — an HTTP load balancer with the name '{lb_name}' \
             already exists in the target namespace '{target_ns}'. Use \
             --conflict-action=prefix to auto-rename, or remove the existing object first."
        );
        outcome.results.push(result);
    }

    let ctx = MoveContext {
        client,
        target_ns,
        move_set: &move_set,
        lb_src_ns: &lb_src_ns,
        lb_configs: &lb_configs,
        lb_deps: &lb_deps,
        lb_renames: &conflicts.lb_renames,
        dep_renames: &conflicts.dep_renames,
        skipped_deps: &conflicts.skipped_deps,
        secret: &secret,
        rework_items: &rework_items,
        external_dep_refs: &external_dep_refs,
        dns_managed_lbs: &dns.dns_managed_lbs,
    };

    // ==================================================================
    // Process each batch
    // ==================================================================
    let total_lbs: usize = batches.iter().map(Vec::len).sum();
    let mut lbs_done = 0usize;
    println!("\nProcessing {total_lbs} load balancer(s) in {} batch(es)...", batches.len());
    if options.dry_run {
        print_progress(lbs_done, total_lbs);
    }

    for (batch_idx, batch_lb_names) in batches.iter().enumerate() {
        if interrupt.load(Ordering::SeqCst) {
            println!("\nInterrupted — remaining batches will not be processed.");
            outcome.interrupted = true;
            break;
        }

        let batch_label = batch_lb_names.join(", ");
        if !options.dry_run {
            if batch_lb_names.len() > 1 {
                info!(
                    "Batch {}/{}: [{batch_label}] (shared dependencies — atomic move)",
                    batch_idx + 1,
                    batches.len()
                );
            } else {
                info!("Batch {}/{}: {batch_label}", batch_idx + 1, batches.len());
            }
        }

        // Blocked by unmatched certificates (known from Phase 0d).
        if batch_lb_names.iter().any(|lb| cert_blocked_lbs.contains(lb)) {
            let results =
                cert_blocked_results(&ctx, batch_lb_names, &dns.dns_managed_lbs);
            for result in results {
                lbs_done += 1;
                if !options.dry_run {
                    println!(
                        "  [{lbs_done}/{total_lbs}] BLOCKED: '{}' — unmatched TLS certificate",
                        result.lb_name
                    );
                }
                outcome.results.push(result);
            }
            if options.dry_run {
                print_progress(lbs_done, total_lbs);
            }
            continue;
        }

        // Blocked by external references (known from Phase 0b).
        let ext_blocked: Vec<_> = batch_lb_names
            .iter()
            .flat_map(|lb| ctx.lb_deps.get(lb).map(Vec::as_slice).unwrap_or(&[]))
            .filter(|dep| external_dep_refs.contains_key(&dep.key()))
            .collect();
        if !ext_blocked.is_empty() {
            for dep in &ext_blocked {
                batch_graphs[batch_idx].external_deps.insert(dep.key());
            }
            let results = externally_blocked_results(&ctx, batch_lb_names, &dns.dns_managed_lbs);
            for result in results {
                lbs_done += 1;
                if !options.dry_run {
                    println!(
                        "  [{lbs_done}/{total_lbs}] BLOCKED: '{}' — external dependency references",
                        result.lb_name
                    );
                }
                outcome.results.push(result);
            }
            if options.dry_run {
                print_progress(lbs_done, total_lbs);
            }
            continue;
        }

        // Per-batch confirmation.
        if !options.dry_run && !options.force_all {
            let src_ns = batch_lb_names
                .first()
                .and_then(|lb| lb_src_ns.get(lb))
                .map(String::as_str)
                .unwrap_or("?");
            let prompt = if batch_lb_names.len() > 1 {
                format!("  Move [{batch_label}] ({src_ns} -> {target_ns})?")
            } else {
                format!("  Move '{}' ({src_ns} -> {target_ns})?", batch_lb_names[0])
            };
            if !confirm(prompter, &prompt) {
                for lb_name in batch_lb_names {
                    let src_ns = lb_src_ns.get(lb_name).map(String::as_str).unwrap_or("?");
                    let mut result = MoveResult::new(lb_name, src_ns, target_ns);
                    if let Some(config) = lb_configs.get(lb_name) {
                        result =
                            result.with_lb_details(config, dns.dns_managed_lbs.contains(lb_name));
                    }
                    result.status = MoveStatus::Skipped;
                    outcome.results.push(result);
                    lbs_done += 1;
                    println!("  [{lbs_done}/{total_lbs}] SKIPPED: '{lb_name}' — skipped by user");
                }
                continue;
            }
        }

        // Execute (or plan) the batch.
        let results = if options.dry_run {
            plan_batch(&ctx, batch_lb_names)
        } else {
            execute_batch(&ctx, batch_lb_names, sleeper)
        };
        for result in results {
            lbs_done += 1;
            if options.dry_run {
                print_progress(lbs_done, total_lbs);
            } else {
                let label = match result.status {
                    MoveStatus::Moved => "MOVED",
                    MoveStatus::Reverted => "REVERTED",
                    MoveStatus::Blocked => "BLOCKED",
                    MoveStatus::Skipped => "SKIPPED",
                    _ => "FAILED",
                };
                println!(
                    "  [{lbs_done}/{total_lbs}] {label}: '{}' ({} -> {target_ns})",
                    result.lb_name, result.src_namespace
                );
            }
            outcome.results.push(result);
        }
    }

    // ==================================================================
    // Summary, report, and fingerprint bookkeeping
    // ==================================================================
    println!();
    let blocked = outcome.count(MoveStatus::Blocked);
    let skipped = outcome.count(MoveStatus::Skipped);
    if options.dry_run {
        println!(
            "Dry run complete. Planned: {}  Blocked: {blocked}  Skipped: {skipped}",
            outcome.count(MoveStatus::DryRun)
        );
    } else {
        println!(
            "Done. Moved: {}  Failed: {}  Blocked: {blocked}  Reverted: {}  Skipped: {skipped}",
            outcome.count(MoveStatus::Moved),
            outcome.count(MoveStatus::Failed),
            outcome.count(MoveStatus::Reverted),
        );
    }

    if !outcome.results.is_empty() {
        let rework: Vec<_> = rework_items.values().cloned().collect();
        let report_path = write_mover_report(
            &paths.report_dir,
            &outcome.results,
            tenant_name,
            target_ns,
            options.dry_run,
            &batch_graphs,
            &rework,
        )?;
        let label = if options.dry_run { "Pre-migration report" } else { "HTML report" };
        println!("{label} saved to: file://{}", report_path.display());
        outcome.report_path = Some(report_path);
    }

    if options.dry_run {
        store.write(&current_fingerprint);
        println!("Dry-run fingerprint saved. Run without --dry-run to execute.");
    } else if !outcome.any_failure() {
        store.delete();
    }

    Ok(outcome)
}

/// Results for a batch blocked by an unmatched non-portable certificate,
/// with differentiated operator-facing explanations.
fn cert_blocked_results(
    ctx: &MoveContext<'_>,
    batch_lb_names: &[String],
    dns_managed_lbs: &HashSet<String>,
) -> Vec<MoveResult> {
    // LBs in this batch that themselves reference an unmatched cert.
    let problem_lbs: HashSet<&str> = ctx
        .rework_items
        .values()
        .filter(|item| !item.is_matched())
        .flat_map(|item| item.lb_names.iter().map(String::as_str))
        .filter(|lb| batch_lb_names.iter().any(|b| b == lb))
        .collect();
    let mut problem_list: Vec<&str> = problem_lbs.iter().copied().collect();
    problem_list.sort_unstable();
    let problem_ref = problem_list
        .iter()
        .take(3)
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ");

    let reasons: Vec<String> = ctx
        .rework_items
        .values()
        .filter(|item| {
            !item.is_matched() && item.lb_names.iter().any(|lb| batch_lb_names.contains(lb))
        })
        .map(|item| {
            format!(
                "TLS Certificate '{}' has a non-portable private key ({}) and no matching \
                 certificate was found in the target or shared namespace. Required domains: {}",
                item.cert_name,
                item.secret_type,
                if item.cert_domains.is_empty() {
                    "(unknown)".to_string()
                } else {
                    item.cert_domains.join(", ")
                }
            )
        })
        .collect();

    let mut results = Vec::new();
    for lb_name in batch_lb_names {
        let src_ns = ctx.src_ns_of(lb_name);
        let mut result = MoveResult::new(lb_name, src_ns, ctx.target_ns);
        if let Some(config) = ctx.lb_configs.get(lb_name) {
            result = result.with_lb_details(config, dns_managed_lbs.contains(lb_name));
        }
        result.status = MoveStatus::Blocked;
        result.error = if problem_lbs.contains(lb_name.as_str()) {
            format!(
                "Cannot move — this load balancer uses a TLS certificate with a non-portable \
                 private key and no matching certificate was found in the target or shared \
                 namespace: {}. Create the certificate in the target or shared namespace \
                 first, then re-run the mover.",
                reasons.join("; ")
            )
        } else if result.is_lets_encrypt() {
            format!(
                "Batch blocked — this Let's Encrypt load balancer shares dependencies with \
                 {problem_ref} which has a non-portable TLS certificate that could not be \
                 matched. This LB's auto-certificate is not affected. Resolve the certificate \
                 issue on {problem_ref} first, then re-run the mover to move the entire batch."
            )
        } else {
            format!(
                "Batch blocked — this load balancer shares dependencies with {problem_ref} \
                 which has a non-portable TLS certificate that could not be matched. The \
                 entire batch must be resolved together. Resolve the certificate issue on \
                 {problem_ref} first, then re-run the mover."
            )
        };

        for dep in ctx.lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            let key = dep.key();
            let mut dep_result = DepMoveResult::new(dep.kind, &dep.name);
            if ctx.secret.keys.contains(&key) {
                dep_result.status = MoveStatus::ManualRework;
                dep_result.error = format!(
                    "Non-portable private key ({}). No matching cert found in target/shared \
                     namespace.",
                    ctx.secret.reasons.get(&key).map(String::as_str).unwrap_or("?")
                );
            } else {
                dep_result.status = MoveStatus::Blocked;
                dep_result.error = format!(
                    "Blocked — the batch containing '{lb_name}' cannot be moved (unresolved \
                     TLS certificate issue on {problem_ref}). This {} will be moved \
                     automatically once the batch is unblocked.",
                    dep.kind.friendly_name().to_lowercase()
                );
            }
            result.dependencies.push(dep_result);
        }
        results.push(result);
    }
    results
}

/// Results for a batch blocked up-front by external dependency references.
fn externally_blocked_results(
    ctx: &MoveContext<'_>,
    batch_lb_names: &[String],
    dns_managed_lbs: &HashSet<String>,
) -> Vec<MoveResult> {
    let mut reasons: Vec<String> = Vec::new();
    for lb_name in batch_lb_names {
        for dep in ctx.lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(refs) = ctx.external_dep_refs.get(&dep.key()) {
                let mut ref_names: Vec<String> =
                    refs.iter().map(|(n, ns)| format!("'{n}' ({ns})")).collect();
                if ref_names.len() > 5 {
                    let extra = ref_names.len() - 5;
                    ref_names.truncate(5);
                    ref_names.push(format!("(+{extra} more)"));
                }
                let reason = format!(
                    "{} is referenced by external object(s) not in the move list: {}",
                    dep.friendly(),
                    ref_names.join(", ")
                );
                if !reasons.contains(&reason) {
                    reasons.push(reason);
                }
            }
        }
    }

    let mut results = Vec::new();
    for lb_name in batch_lb_names {
        let src_ns = ctx.src_ns_of(lb_name);
        let mut result = MoveResult::new(lb_name, src_ns, ctx.target_ns);
        if let Some(config) = ctx.lb_configs.get(lb_name) {
            result = result.with_lb_details(config, dns_managed_lbs.contains(lb_name));
        }
        result.status = MoveStatus::Blocked;
        result.error = format!(
            "Cannot move — dependencies are referenced by external objects not in the move \
             list: {}. Add the referencing objects to the move CSV or remove them first.",
            reasons.join("; ")
        );

        for dep in ctx.lb_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            let key = dep.key();
            let mut dep_result = DepMoveResult::new(dep.kind, &dep.name);
            if ctx.secret.keys.contains(&key) {
                dep_result.status = MoveStatus::ManualRework;
                dep_result.error = match ctx.rework_items.get(&key) {
                    Some(item) if item.is_matched() => format!(
                        "Non-portable {}. Certificate stays in source namespace — LB \
                         reference will be rewritten to '{}' in '{}' once the batch is \
                         unblocked.",
                        item.secret_type, item.matched_cert_name, item.matched_cert_ns
                    ),
                    _ => format!(
                        "Non-portable {}. Certificate stays in source namespace.",
                        ctx.secret
                            .reasons
                            .get(&key)
                            .map(String::as_str)
                            .unwrap_or("private key")
                    ),
                };
            } else if let Some(refs) = ctx.external_dep_refs.get(&key) {
                let ref_names: Vec<String> =
                    refs.iter().map(|(n, ns)| format!("'{n}' ({ns})")).collect();
                dep_result.status = MoveStatus::Blocked;
                dep_result.error = format!(
                    "Cannot move {} — it is referenced by external object(s) not in the move \
                     list: {}. Moving it would break those objects. Either add the \
                     referencing objects to the move CSV or remove them first.",
                    dep.friendly(),
                    ref_names.join(", ")
                );
            } else {
                dep_result.status = MoveStatus::Blocked;
                dep_result.error = format!(
                    "Blocked — parent LB '{lb_name}' cannot be moved (another dependency in \
                     this batch has external references). This {} will be moved automatically \
                     once the batch is unblocked.",
                    dep.kind.friendly_name().to_lowercase()
                );
            }
            result.dependencies.push(dep_result);
        }
        results.push(result);
    }
    results
}
