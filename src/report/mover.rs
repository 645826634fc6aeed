//! The mover HTML report.
//!
//! One self-contained page: traffic-light health banner, LB summary table
//! with issue chips, DNS changes, certificate pre-flight, dependency check
//! with per-batch SVG graphs, planned configurations (dry-run), and
//! backups.

use chrono::Local;
use maud::{html, Markup};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::mover::model::{BatchGraphData, ManualReworkItem, MoveResult, MoveStatus};
use crate::report::page::{json_block, render_page};
use crate::report::svg::render_batch_svg;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("could not create report directory {path}: {err}")]
    CreateDir { path: PathBuf, err: String },
    #[error("could not write report file {path}: {err}")]
    WriteFile { path: PathBuf, err: String },
}

const MOVER_CSS: &str = r#"
  .warning-banner { background: #fff3cd; border: 1px solid #ffc107; border-left: 5px solid #ffc107;
                     border-radius: 6px; padding: 1rem 1.25rem; margin-bottom: 1.5rem; font-size: 0.9rem; }
  .warning-banner strong { color: #856404; }
  .warning-banner p { margin: 0.5rem 0; }
  .warning-banner ul { margin: 0.25rem 0 0 1.25rem; padding: 0; }
  .card-moved .num { color: #198754; }
  .card-dryrun .num { color: #0d6efd; }
  .card-failed .num { color: #dc3545; }
  .card-reverted .num { color: #e67e22; }
  .card-blocked .num { color: #9b59b6; }
  .card-skipped .num { color: #6c757d; }
  .card-rework .num { color: #e67e22; }
  .status-moved { color: #198754; font-weight: 600; }
  .status-dry-run { color: #0d6efd; font-weight: 600; }
  .status-failed { color: #dc3545; font-weight: 600; }
  .status-reverted { color: #e67e22; font-weight: 600; }
  .status-blocked { color: #9b59b6; font-weight: 600; }
  .status-skipped { color: #6c757d; font-weight: 600; }
  .status-manual-rework { color: #e67e22; font-weight: 600; }
  .error { color: #dc3545; font-size: 0.8rem; word-break: break-word; }

  .health-banner { display: flex; align-items: flex-start; gap: 1.25rem;
                    padding: 1.25rem 1.5rem; border-radius: 10px; margin-bottom: 1.5rem;
                    border: 1px solid; box-shadow: 0 2px 8px rgba(0,0,0,0.06); }
  .health-light { flex-shrink: 0; width: 52px; height: 52px; border-radius: 50%;
                   display: flex; align-items: center; justify-content: center;
                   font-size: 1.5rem; color: #fff;
                   box-shadow: 0 0 0 4px rgba(255,255,255,0.6), 0 0 10px rgba(0,0,0,0.1); }
  .health-body { flex: 1; min-width: 0; }
  .health-headline { font-size: 1.15rem; font-weight: 700; margin-bottom: 0.3rem; }
  .health-green { background: #d4edda; color: #155724; border-color: #b7dfb9; }
  .health-green .health-light { background: #28a745; }
  .health-yellow { background: #fff3cd; color: #856404; border-color: #f5dd90; }
  .health-yellow .health-light { background: #ffc107; }
  .health-red { background: #f8d7da; color: #721c24; border-color: #f1b5bb; }
  .health-red .health-light { background: #dc3545; }
  .health-stats { display: flex; flex-wrap: wrap; gap: 0.4rem; margin-top: 0.5rem; }
  .health-pill { background: rgba(255,255,255,0.65); border-radius: 12px;
                  padding: 0.15rem 0.65rem; font-size: 0.8rem; font-weight: 600; }
  .health-findings { margin: 0.6rem 0 0 0; padding: 0; list-style: none; font-size: 0.85rem; }
  .health-findings li { margin-bottom: 0.2rem; }
  .hf-icon { margin-right: 0.35rem; }

  .lb-issues { display: flex; flex-wrap: wrap; gap: 0.3rem; }
  .lb-chip { display: inline-block; border-radius: 10px; padding: 0.1rem 0.5rem;
              font-size: 0.72rem; font-weight: 600; white-space: nowrap; }
  .lb-chip-ok { background: #d4edda; color: #155724; }
  .lb-chip-note { background: #cfe2ff; color: #084298; }
  .lb-chip-rework { background: #fff3cd; color: #856404; }
  .lb-chip-blocked { background: #e7d6f5; color: #5b2e91; }
  .lb-chip-failed { background: #f8d7da; color: #721c24; }
  .lb-chip-reverted { background: #fce4cc; color: #7c4a03; }
  .lb-chip-link { text-decoration: none; }
  .rename-badge { font-size: 0.75rem; color: #856404; background: #fff3cd;
                   border-radius: 4px; padding: 0.05rem 0.35rem; }
  .backup-link { font-size: 0.75rem; color: #6c757d !important; }

  .dns-table th { background: #e67e22; }
  .dns-lb-cell { font-weight: 600; vertical-align: top; border-right: 3px solid #e67e22;
                  background: #fff8f0 !important; }
  .dns-table tr.dns-group-first td { border-top: 2px solid #ccc; }
  .dns-status-banner { display: flex; align-items: flex-start; gap: 1.25rem;
                        padding: 1.25rem 1.5rem; border-radius: 10px; margin-bottom: 1.5rem;
                        border: 1px solid; box-shadow: 0 2px 8px rgba(0,0,0,0.06); }
  .dns-status-icon { flex-shrink: 0; width: 52px; height: 52px; border-radius: 50%;
                      display: flex; align-items: center; justify-content: center;
                      font-size: 1.5rem; color: #fff; }
  .dns-status-headline { font-size: 1.1rem; font-weight: 700; margin-bottom: 0.3rem; }
  .dns-status-detail { font-size: 0.88rem; line-height: 1.5; opacity: 0.9; }
  .dns-action-needed { background: #fce4cc; color: #7c4a03; border-color: #f5c89a; }
  .dns-action-needed .dns-status-icon { background: #e67e22; }
  .dns-no-action, .dns-auto-managed { background: #d4edda; color: #155724; border-color: #b7dfb9; }
  .dns-no-action .dns-status-icon, .dns-auto-managed .dns-status-icon { background: #28a745; }
  .dns-advice { background: #fff8f0; border: 1px solid #f5c78e; border-left: 5px solid #e67e22;
                 border-radius: 6px; padding: 1rem 1.25rem; margin-bottom: 1.25rem;
                 font-size: 0.88rem; line-height: 1.5; }
  .dns-advice ol { margin: 0.25rem 0 0.5rem 1.25rem; padding: 0; }

  .rework-card { background: #fff; border: 1px solid #dee2e6; border-left: 5px solid #e67e22;
                  border-radius: 6px; padding: 1rem 1.25rem; margin-bottom: 1rem; font-size: 0.88rem; }
  .rework-card.rework-matched { border-left-color: #198754; }
  .rework-card h3 { margin: 0 0 0.5rem 0; font-size: 1rem; }
  .rework-card dl { margin: 0; display: grid; grid-template-columns: 11rem 1fr; gap: 0.2rem 0.75rem; }
  .rework-card dt { color: #666; font-size: 0.8rem; }
  .rework-card dd { margin: 0; }

  .dep-subsection { background: #fff; border: 1px solid #dee2e6; border-radius: 8px;
                     margin-bottom: 1rem; }
  .dep-subsection summary { cursor: pointer; padding: 0.6rem 1rem; font-weight: 600; }
  .dep-subsection-body { padding: 0.5rem 1rem 1rem 1rem; }
"#;

fn count(results: &[MoveResult], status: MoveStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

fn status_class(status: MoveStatus) -> String {
    format!("status-{}", status.as_str())
}

fn lb_display_name(result: &MoveResult) -> &str {
    if result.new_lb_name.is_empty() {
        &result.lb_name
    } else {
        &result.new_lb_name
    }
}

// ------------------------------------------------------------------
// Health banner
// ------------------------------------------------------------------

fn build_health_banner(
    results: &[MoveResult],
    dry_run: bool,
    rework_items: &[ManualReworkItem],
    dns_managed_count: usize,
    dns_manual_count: usize,
    deps_failed: usize,
    deps_blocked: usize,
) -> Markup {
    let has_hard_failure = results.iter().any(|r| {
        r.status == MoveStatus::Failed
            || (r.status == MoveStatus::Reverted && r.error.contains("ROLLBACK FAILED"))
    });
    let has_reverted = results.iter().any(|r| r.status == MoveStatus::Reverted);
    let has_unmatched_certs = rework_items.iter().any(|i| !i.is_matched());
    let has_matched_certs_only = !rework_items.is_empty() && !has_unmatched_certs;
    let has_skipped_or_blocked = results
        .iter()
        .any(|r| matches!(r.status, MoveStatus::Skipped | MoveStatus::Blocked));
    let has_dep_problems = deps_failed > 0 || deps_blocked > 0;

    let level = if has_hard_failure || has_unmatched_certs || has_dep_problems {
        "red"
    } else if dns_manual_count > 0 || has_matched_certs_only || has_reverted || has_skipped_or_blocked
    {
        "yellow"
    } else {
        "green"
    };

    let headline = match (level, dry_run) {
        ("green", true) => "Ready to Migrate",
        ("green", false) => "Migration Successful",
        ("yellow", true) => "Ready — External Action Required",
        ("yellow", false) => "Completed — Action Required",
        _ => "Migration Blocked",
    };
    let symbol = match level {
        "green" => "\u{2714}",
        "yellow" => "\u{26a0}",
        _ => "\u{2718}",
    };

    let mut subtext: Vec<String> = Vec::new();
    if has_hard_failure {
        subtext.push(if dry_run {
            "Critical issues were found during the dry run.".to_string()
        } else {
            "One or more migrations failed. Check rollback status and error details below."
                .to_string()
        });
    }
    if has_unmatched_certs {
        subtext.push(
            "TLS certificates with non-portable private keys could not be matched — affected \
             LBs are blocked."
                .to_string(),
        );
    }
    if has_dep_problems {
        subtext.push(format!(
            "Dependency issues: {deps_failed} failed, {deps_blocked} blocked."
        ));
    }
    if dns_manual_count > 0 {
        subtext.push(format!(
            "{dns_manual_count} LB(s) require DNS record updates (CNAME / ACME challenge)."
        ));
    }
    if dns_managed_count > 0 {
        subtext.push(if dns_manual_count > 0 {
            format!("{dns_managed_count} LB(s) use XC-managed DNS (no action needed).")
        } else {
            format!(
                "{dns_managed_count} LB(s) use XC-managed DNS — records will be updated \
                 automatically."
            )
        });
    }
    if has_matched_certs_only {
        subtext.push(format!(
            "{} certificate(s) auto-rewritten — verify after migration.",
            rework_items.len()
        ));
    }
    if has_reverted {
        subtext.push("Some load balancers were reverted to the source namespace.".to_string());
    }
    if has_skipped_or_blocked && !has_unmatched_certs {
        subtext.push("Some load balancers were skipped or blocked.".to_string());
    }
    if subtext.is_empty() {
        subtext.push(if dry_run {
            "All pre-flight checks passed. No issues detected.".to_string()
        } else {
            "All load balancers were moved successfully. No issues detected.".to_string()
        });
    }

    let pills: Vec<(usize, &str)> = vec![
        (
            if dry_run { count(results, MoveStatus::DryRun) } else { 0 },
            "Planned",
        ),
        (
            if dry_run { 0 } else { count(results, MoveStatus::Moved) },
            "Moved",
        ),
        (count(results, MoveStatus::Failed), "Failed"),
        (count(results, MoveStatus::Blocked), "Blocked"),
        (count(results, MoveStatus::Reverted), "Reverted"),
        (count(results, MoveStatus::Skipped), "Skipped"),
        (rework_items.len(), "Cert Rework"),
    ];

    let problem_results: Vec<&MoveResult> = results
        .iter()
        .filter(|r| {
            matches!(
                r.status,
                MoveStatus::Failed | MoveStatus::Reverted | MoveStatus::Blocked
            )
        })
        .collect();
    const MAX_FINDINGS: usize = 10;

    html! {
        div class={ "health-banner health-" (level) } {
            div class="health-light" { (symbol) }
            div class="health-body" {
                div class="health-headline" { (headline) }
                div style="font-size:0.88rem;margin-bottom:0.4rem;opacity:0.85;" {
                    (subtext.join(" "))
                }
                div class="health-stats" {
                    @for (n, label) in &pills {
                        @if *n > 0 {
                            span class="health-pill" { (n) " " (label) }
                        }
                    }
                }
                @if level != "green" && !problem_results.is_empty() {
                    ul class="health-findings" {
                        @for r in problem_results.iter().take(MAX_FINDINGS) {
                            li {
                                span class="hf-icon" { "\u{2022}" }
                                strong { (r.lb_name) } " "
                                span style="opacity:0.7" {
                                    "(" (r.status.as_str().to_uppercase()) ")"
                                }
                            }
                        }
                        @if problem_results.len() > MAX_FINDINGS {
                            li style="opacity:0.6" {
                                "+" (problem_results.len() - MAX_FINDINGS) " more"
                            }
                        }
                    }
                }
            }
        }
    }
}

// ------------------------------------------------------------------
// LB table
// ------------------------------------------------------------------

fn lb_issue_chips(result: &MoveResult) -> Markup {
    let mut chips: Vec<Markup> = Vec::new();

    if !result.error.is_empty() {
        let (class, label) = if result.error.contains("non-portable private key") {
            ("lb-chip-blocked", "Unmatched TLS cert".to_string())
        } else if result.error.contains("name conflict") {
            ("lb-chip-reverted", "Name conflict".to_string())
        } else if result.error.to_lowercase().contains("external")
            && result.error.to_lowercase().contains("reference")
        {
            ("lb-chip-blocked", "External refs".to_string())
        } else {
            let brief: String = result.error.chars().take(50).collect();
            let label = if brief.len() < result.error.len() {
                format!("{brief}\u{2026}")
            } else {
                brief
            };
            (
                match result.status {
                    MoveStatus::Failed => "lb-chip-failed",
                    MoveStatus::Reverted => "lb-chip-reverted",
                    _ => "lb-chip-blocked",
                },
                label,
            )
        };
        chips.push(html! {
            span class={ "lb-chip " (class) } title=(result.error) { (label) }
        });
    }

    for dep in &result.dependencies {
        let class = match dep.status {
            MoveStatus::Failed => "lb-chip-failed",
            MoveStatus::Blocked => "lb-chip-blocked",
            MoveStatus::Reverted => "lb-chip-reverted",
            MoveStatus::ManualRework => {
                // A matched cert rewrite is informational, not a problem.
                if dep.error.contains("Matched") || dep.error.contains("rewritten") {
                    "lb-chip-note"
                } else {
                    "lb-chip-rework"
                }
            }
            _ => continue,
        };
        let display = if dep.new_name.is_empty() { &dep.name } else { &dep.new_name };
        chips.push(html! {
            span class={ "lb-chip " (class) } title=(dep.error) {
                (dep.friendly_kind()) ": " (display)
            }
        });
    }

    if chips.is_empty()
        && matches!(result.status, MoveStatus::Moved | MoveStatus::DryRun)
        && result.is_lets_encrypt()
    {
        chips.push(if result.dns_managed {
            html! {
                a href="#dns-changes" class="lb-chip-link" {
                    span class="lb-chip lb-chip-note"
                        title="DNS is managed by XC — records will be updated automatically." {
                        "DNS (auto-managed)"
                    }
                }
            }
        } else {
            html! {
                a href="#dns-changes" class="lb-chip-link" {
                    span class="lb-chip lb-chip-rework"
                        title="CNAME and ACME challenge records will change after the move — manual DNS update required." {
                        "DNS update required"
                    }
                }
            }
        });
    }

    if chips.is_empty() {
        if matches!(result.status, MoveStatus::Moved | MoveStatus::DryRun) {
            return html! { span class="lb-chip lb-chip-ok" { "\u{2714} OK" } };
        }
        return html! {};
    }
    html! {
        div class="lb-issues" {
            @for chip in &chips { (chip) }
        }
    }
}

fn build_lb_table(results: &[MoveResult]) -> Markup {
    html! {
        table {
            thead {
                tr {
                    th { "HTTP LB Name" }
                    th { "Namespace (old)" }
                    th { "Namespace (new)" }
                    th { "TLS" }
                    th { "Status" }
                    th { "Details" }
                }
            }
            tbody {
                @for (idx, r) in results.iter().enumerate() {
                    tr {
                        td {
                            @if r.planned_config_json.is_empty() {
                                (r.lb_name)
                            } @else {
                                a href={ "#config-" (idx) } { (r.lb_name) }
                            }
                            @if !r.new_lb_name.is_empty() {
                                " " span class="rename-badge" title="Renamed due to name conflict" {
                                    "\u{2192} " (r.new_lb_name)
                                }
                            }
                            @if !r.backup_json.is_empty() {
                                " " a href={ "#backup-" (idx) } class="backup-link"
                                    title="View original config" { "[backup]" }
                            }
                        }
                        td { (r.src_namespace) }
                        td { (r.dst_namespace) }
                        td { (r.tls_mode_str()) }
                        td class=(status_class(r.status)) { (r.status.as_str().to_uppercase()) }
                        td { (lb_issue_chips(r)) }
                    }
                }
            }
        }
    }
}

// ------------------------------------------------------------------
// DNS section
// ------------------------------------------------------------------

struct DnsSection {
    markup: Markup,
    managed_count: usize,
    manual_count: usize,
}

fn build_dns_section(results: &[MoveResult]) -> DnsSection {
    let mut managed_count = 0;
    let mut manual_count = 0;
    let mut affected: Vec<&MoveResult> = Vec::new();
    let mut cname_only: Vec<&MoveResult> = Vec::new();

    for r in results {
        let has_cname_change = matches!(r.status, MoveStatus::Moved | MoveStatus::Reverted)
            && !r.cname_new.is_empty()
            && r.cname_new != r.cname_old
            && r.cname_new != "(fetch failed)";
        let is_le_dryrun = r.status == MoveStatus::DryRun && r.is_lets_encrypt();

        if has_cname_change && !r.is_lets_encrypt() {
            cname_only.push(r);
            continue;
        }
        if !has_cname_change && !is_le_dryrun {
            continue;
        }
        affected.push(r);
        if r.dns_managed {
            managed_count += 1;
        } else {
            manual_count += 1;
        }
    }

    let dns_table = |rows: &[&MoveResult]| -> Markup {
        html! {
            table class="dns-table" {
                thead {
                    tr {
                        th { "HTTP LB" }
                        th { "DNS Record" }
                        th { "Type" }
                        th { "Old Value" }
                        th { "New Value" }
                        th { "Action" }
                    }
                }
                tbody {
                    @for r in rows {
                        @let domains = if r.domains.is_empty() {
                            vec!["(unknown)".to_string()]
                        } else {
                            r.domains.clone()
                        };
                        @let pending = r.status == MoveStatus::DryRun;
                        @let action = if r.dns_managed { "AUTO-MANAGED" }
                            else if pending { "WILL CHANGE" } else { "UPDATE" };
                        @for (i, domain) in domains.iter().enumerate() {
                            tr class=[ (i == 0).then_some("dns-group-first") ] {
                                @if i == 0 {
                                    td rowspan=(domains.len() * 2) class="dns-lb-cell" {
                                        (lb_display_name(r))
                                    }
                                }
                                td { code { (domain) } }
                                td { "A / CNAME" }
                                td { (if r.cname_old.is_empty() { "-" } else { &r.cname_old }) }
                                td {
                                    @if r.dns_managed && pending { em { "auto-managed by XC" } }
                                    @else if pending { em { "assigned after move" } }
                                    @else { strong { (r.cname_new) } }
                                }
                                td { (action) }
                            }
                            tr {
                                td { code { "_acme-challenge." (domain) } }
                                td { "CNAME" }
                                td {
                                    @if r.acme_cname_old.is_empty() { em { "n/a" } }
                                    @else { (r.acme_cname_old) }
                                }
                                td {
                                    @if r.dns_managed { em { "auto-managed by XC" } }
                                    @else if !r.acme_cname_new.is_empty()
                                        && r.acme_cname_new != "(fetch failed)" {
                                        strong { (r.acme_cname_new) }
                                    }
                                    @else if pending { em { "assigned after move" } }
                                    @else { em { "check XC Console after move" } }
                                }
                                td { (action) }
                            }
                        }
                    }
                }
            }
        }
    };

    let advice = html! {
        div class="dns-advice" {
            strong { "\u{26a0} Let's Encrypt & DNS challenge" }
            p {
                "When the HTTP LB is re-created, a new ACME challenge with a "
                strong { "new CNAME" }
                " is issued. If the old challenge record still resolves, the validation may \
                 stall and time out."
            }
            p { strong { "Before migration:" } }
            ol {
                li {
                    strong { "Lower the TTL" }
                    " of all affected DNS records (A/CNAME for the domain and the "
                    code { "_acme-challenge" }
                    " CNAME) to the minimum your provider allows, well in advance."
                }
                li {
                    "Alternatively, " strong { "delete the " code { "_acme-challenge" } " CNAME" }
                    " before running the migration."
                }
            }
            p { strong { "After migration:" } }
            ol {
                li { "Update the A / CNAME record for each domain to point to the new CNAME shown below." }
                li {
                    "Create or update the " code { "_acme-challenge" }
                    " CNAME with the new value."
                }
                li { "Once the certificate is issued, restore the original TTL." }
            }
        }
    };

    let cname_only_markup = if cname_only.is_empty() {
        html! {}
    } else {
        html! {
            details class="dep-subsection" {
                summary {
                    "CNAME Changes — non-Let's Encrypt (" (cname_only.len()) " LB(s))"
                }
                div class="dep-subsection-body" {
                    p class="meta" {
                        "These load balancers do not use Let's Encrypt, so no ACME \
                         challenge records need updating. The host CNAME changed as part \
                         of the move — update external DNS records if they point to the \
                         old value."
                    }
                    table {
                        thead {
                            tr { th { "HTTP LB" } th { "TLS" } th { "Old CNAME" } th { "New CNAME" } }
                        }
                        tbody {
                            @for r in &cname_only {
                                tr {
                                    td { (lb_display_name(r)) }
                                    td { (r.tls_mode_str()) }
                                    td { (if r.cname_old.is_empty() { "-" } else { &r.cname_old }) }
                                    td { strong { (r.cname_new) } }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    let markup = if !affected.is_empty() {
        let total = affected.len();
        html! {
            h2 id="dns-changes" { "DNS Update Check" }
            @if manual_count == 0 {
                div class="dns-status-banner dns-auto-managed" {
                    div class="dns-status-icon" { "\u{1f310}" }
                    div class="dns-status-body" {
                        div class="dns-status-headline" { "DNS Auto-Managed" }
                        div class="dns-status-detail" {
                            "All " (total) " LB(s) use XC-managed DNS zones. Records will be \
                             created automatically — verify in the Console after migration."
                        }
                    }
                }
                details class="dep-subsection" {
                    summary { "Managed Records (informational)" }
                    div class="dep-subsection-body" { (dns_table(&affected)) }
                }
            } @else {
                div class="dns-status-banner dns-action-needed" {
                    div class="dns-status-icon" { "\u{1f310}" }
                    div class="dns-status-body" {
                        @if managed_count > 0 {
                            div class="dns-status-headline" { "DNS Updates Partially Required" }
                            div class="dns-status-detail" {
                                (managed_count) " of " (total) " LB(s) use XC-managed DNS (no \
                                 action needed). " (manual_count) " require(s) manual DNS updates."
                            }
                        } @else {
                            div class="dns-status-headline" { "DNS Updates Required" }
                            div class="dns-status-detail" {
                                (total) " load balancer(s) use Let's Encrypt auto-cert. CNAME \
                                 and ACME challenge records "
                                strong { "must" }
                                " be updated before or after migration."
                            }
                        }
                    }
                }
                details class="dep-subsection" open {
                    summary { "Affected Records & Instructions" }
                    div class="dep-subsection-body" { (advice) (dns_table(&affected)) }
                }
            }
            (cname_only_markup)
        }
    } else if !results.is_empty() {
        html! {
            h2 id="dns-changes" { "DNS Update Check" }
            @if cname_only.is_empty() {
                div class="dns-status-banner dns-no-action" {
                    div class="dns-status-icon" { "\u{1f310}" }
                    div class="dns-status-body" {
                        div class="dns-status-headline" { "No DNS Changes" }
                        div class="dns-status-detail" {
                            "None of the load balancers in this run use Let's Encrypt \
                             auto-cert and no host CNAME changed. No DNS records need to be \
                             updated."
                        }
                    }
                }
            }
            (cname_only_markup)
        }
    } else {
        html! {}
    };

    DnsSection {
        markup,
        managed_count,
        manual_count,
    }
}

// ------------------------------------------------------------------
// Certificate pre-flight section
// ------------------------------------------------------------------

fn build_rework_section(rework_items: &[ManualReworkItem]) -> Markup {
    if rework_items.is_empty() {
        return html! {};
    }
    html! {
        h2 id="cert-preflight" { "TLS Certificate Pre-Flight" }
        div class="warning-banner" {
            strong { "\u{26a0} Certificates with non-portable private keys" }
            p {
                "The private keys below are stored as opaque secrets and cannot be retrieved \
                 via the API, so these certificates cannot be re-created in the target \
                 namespace. Matched certificates are substituted automatically; unmatched \
                 ones block their load balancers."
            }
        }
        @for item in rework_items {
            div class=(if item.is_matched() { "rework-card rework-matched" } else { "rework-card" }) {
                h3 { "TLS Certificate '" (item.cert_name) "'" }
                dl {
                    dt { "Secret type" }
                    dd { (item.secret_type) }
                    dt { "Source namespace" }
                    dd { (item.src_namespace) }
                    dt { "Referenced by" }
                    dd { (item.lb_names.join(", ")) }
                    dt { "Certificate domains" }
                    dd {
                        @if item.cert_domains.is_empty() { em { "(unknown)" } }
                        @else { (item.cert_domains.join(", ")) }
                    }
                    @if item.is_matched() {
                        dt { "Matched certificate" }
                        dd {
                            strong { (item.matched_cert_name) }
                            " in '" (item.matched_cert_ns) "'"
                        }
                        dt { "Matched domains" }
                        dd { (item.matched_cert_domains.join(", ")) }
                        dt { "Action" }
                        dd {
                            "References are rewritten automatically; the original certificate \
                             stays in '" (item.src_namespace) "'. Verify TLS after migration."
                        }
                    } @else {
                        dt { "Match result" }
                        dd class="error" { "NO MATCH — affected load balancers are blocked" }
                        dt { "Action" }
                        dd {
                            "Create a certificate covering the required domains in '"
                            (item.dst_namespace) "' or 'shared', then re-run the mover."
                        }
                    }
                }
            }
        }
    }
}

// ------------------------------------------------------------------
// Dependency section
// ------------------------------------------------------------------

struct DepSection {
    markup: Markup,
    deps_failed: usize,
    deps_blocked: usize,
}

fn build_dep_section(results: &[MoveResult], batch_graphs: &[BatchGraphData]) -> DepSection {
    let mut deps_failed = 0;
    let mut deps_blocked = 0;
    for r in results {
        for d in &r.dependencies {
            match d.status {
                MoveStatus::Failed => deps_failed += 1,
                MoveStatus::Blocked => deps_blocked += 1,
                _ => {}
            }
        }
    }

    let has_deps = results.iter().any(|r| !r.dependencies.is_empty());
    if !has_deps && batch_graphs.is_empty() {
        return DepSection {
            markup: html! {},
            deps_failed,
            deps_blocked,
        };
    }

    let markup = html! {
        h2 id="dep-check" { "Dependency Check" }
        @if !batch_graphs.is_empty() {
            @for graph in batch_graphs {
                details class="dep-subsection" open[graph.lb_names.len() > 1] {
                    summary {
                        "Batch " (graph.batch_index) ": " (graph.lb_names.join(", "))
                        @if !graph.shared_deps.is_empty() { " (shared dependencies)" }
                    }
                    div class="dep-subsection-body" { (render_batch_svg(graph)) }
                }
            }
        }
        @for r in results {
            @if !r.dependencies.is_empty() {
                details class="dep-subsection" {
                    summary { "Dependencies of '" (r.lb_name) "' (" (r.dependencies.len()) ")" }
                    div class="dep-subsection-body" {
                        table {
                            thead {
                                tr {
                                    th { "Type" } th { "Name" } th { "New Name" }
                                    th { "Status" } th { "Details" }
                                }
                            }
                            tbody {
                                @for d in &r.dependencies {
                                    tr {
                                        td { (d.friendly_kind()) }
                                        td { (d.name) }
                                        td { (d.new_name) }
                                        td class=(status_class(d.status)) {
                                            (d.status.as_str().to_uppercase())
                                        }
                                        td {
                                            @if !d.error.is_empty() {
                                                span class="error" { (d.error) }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    DepSection {
        markup,
        deps_failed,
        deps_blocked,
    }
}

// ------------------------------------------------------------------
// Planned config and backup sections
// ------------------------------------------------------------------

fn build_config_sections(results: &[MoveResult]) -> Markup {
    let has_planned = results.iter().any(|r| {
        !r.planned_config_json.is_empty()
            || r.dependencies.iter().any(|d| !d.planned_config_json.is_empty())
    });
    if !has_planned {
        return html! {};
    }
    html! {
        h2 { "Planned Configurations" }
        @for (idx, r) in results.iter().enumerate() {
            @if !r.planned_config_json.is_empty() {
                details class="dep-subsection" id={ "config-" (idx) } {
                    summary { "Planned config — HTTP LB '" (r.lb_name) "'" }
                    div class="dep-subsection-body" { (json_block(&r.planned_config_json)) }
                }
            }
            @for d in &r.dependencies {
                @if !d.planned_config_json.is_empty() {
                    details class="dep-subsection" {
                        summary { "Planned config — " (d.friendly_kind()) " '" (d.name) "'" }
                        div class="dep-subsection-body" { (json_block(&d.planned_config_json)) }
                    }
                }
            }
        }
    }
}

fn build_backup_sections(results: &[MoveResult]) -> Markup {
    let has_backups = results.iter().any(|r| {
        !r.backup_json.is_empty() || r.dependencies.iter().any(|d| !d.backup_json.is_empty())
    });
    if !has_backups {
        return html! {};
    }
    html! {
        h2 { "Backups (original configurations)" }
        @for (idx, r) in results.iter().enumerate() {
            @if !r.backup_json.is_empty() {
                details class="dep-subsection" id={ "backup-" (idx) } {
                    summary { "Backup — HTTP LB '" (r.lb_name) "'" }
                    div class="dep-subsection-body" { (json_block(&r.backup_json)) }
                }
            }
            @for d in &r.dependencies {
                @if !d.backup_json.is_empty() {
                    details class="dep-subsection" {
                        summary { "Backup — " (d.friendly_kind()) " '" (d.name) "'" }
                        div class="dep-subsection-body" { (json_block(&d.backup_json)) }
                    }
                }
            }
        }
    }
}

// ------------------------------------------------------------------
// Public API
// ------------------------------------------------------------------

/// Render the full report page.
pub fn render_mover_report(
    results: &[MoveResult],
    tenant: &str,
    target_ns: &str,
    dry_run: bool,
    batch_graphs: &[BatchGraphData],
    rework_items: &[ManualReworkItem],
) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let dns = build_dns_section(results);
    let deps = build_dep_section(results, batch_graphs);
    let health = build_health_banner(
        results,
        dry_run,
        rework_items,
        dns.managed_count,
        dns.manual_count,
        deps.deps_failed,
        deps.deps_blocked,
    );

    let has_moved_or_reverted = results
        .iter()
        .any(|r| matches!(r.status, MoveStatus::Moved | MoveStatus::Reverted));
    let rework_total = rework_items.len();

    let body = html! {
        (health)
        @if has_moved_or_reverted {
            div class="warning-banner" {
                strong { "\u{26a0} Important — CNAME & ACME / Let's Encrypt Warning" }
                p {
                    "When a load balancer is moved to a new namespace (or reverted back), a "
                    strong { "new CNAME (host_name)" }
                    " is assigned. With Let's Encrypt auto-cert, the ACME challenge domain \
                     also changes."
                }
                ul {
                    li {
                        "Update your DNS records to point at the new CNAME — see the "
                        a href="#dns-changes" { "DNS Changes" }
                        " section below."
                    }
                    li {
                        "If the LB was reverted after a failed move, the CNAME in the source \
                         namespace may differ from the original."
                    }
                    li {
                        "Let's Encrypt certificates are re-issued automatically once DNS \
                         propagates, but there may be a brief period without a valid \
                         certificate."
                    }
                }
            }
        }
        h2 { "Load Balancers" }
        div class="summary" {
            @if dry_run {
                div class="card card-dryrun" {
                    div class="num" { (count(results, MoveStatus::DryRun)) }
                    div class="label" { "Planned" }
                }
            } @else {
                div class="card card-moved" {
                    div class="num" { (count(results, MoveStatus::Moved)) }
                    div class="label" { "Moved" }
                }
                div class="card card-failed" {
                    div class="num" { (count(results, MoveStatus::Failed)) }
                    div class="label" { "Failed" }
                }
                div class="card card-reverted" {
                    div class="num" { (count(results, MoveStatus::Reverted)) }
                    div class="label" { "Reverted" }
                }
            }
            div class="card card-blocked" {
                div class="num" { (count(results, MoveStatus::Blocked)) }
                div class="label" { "Blocked" }
            }
            div class="card card-skipped" {
                div class="num" { (count(results, MoveStatus::Skipped)) }
                div class="label" { "Skipped" }
            }
            @if rework_total > 0 {
                div class="card card-rework" {
                    div class="num" { (rework_total) }
                    div class="label" { "Cert Rework" }
                }
            }
            div class="card" {
                div class="num" { (results.len()) }
                div class="label" { "Total" }
            }
        }
        (build_lb_table(results))
        (dns.markup)
        (build_rework_section(rework_items))
        (deps.markup)
        (build_config_sections(results))
        (build_backup_sections(results))
    };

    let title = if dry_run {
        format!("Pre-Migration Report — {tenant}")
    } else {
        format!("LB Mover Report — {tenant}")
    };
    let meta_line = html! {
        "Tenant: " strong { (tenant) }
        " | Target namespace: " strong { (target_ns) }
        " | " (timestamp)
    };

    render_page(&title, meta_line, body, MOVER_CSS)
}

/// Write the report into a timestamped run directory under `report_dir`.
/// Returns the path of the written HTML file.
pub fn write_mover_report(
    report_dir: &Path,
    results: &[MoveResult],
    tenant: &str,
    target_ns: &str,
    dry_run: bool,
    batch_graphs: &[BatchGraphData],
    rework_items: &[ManualReworkItem],
) -> Result<PathBuf, ReportError> {
    let timestamp = Local::now().format("%Y-%m-%d-%H%M");
    let prefix = if dry_run { "pre-migration" } else { "mover" };
    let run_dir = report_dir.join(format!("{prefix}_{timestamp}"));
    fs::create_dir_all(&run_dir).map_err(|err| ReportError::CreateDir {
        path: run_dir.clone(),
        err: err.to_string(),
    })?;
    let report_path = run_dir.join(format!("{prefix}_{timestamp}.html"));
    let page = render_mover_report(results, tenant, target_ns, dry_run, batch_graphs, rework_items);
    fs::write(&report_path, page).map_err(|err| ReportError::WriteFile {
        path: report_path.clone(),
        err: err.to_string(),
    })?;
    Ok(report_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::kind::ResourceKind;
    use crate::mover::model::DepMoveResult;
    use crate::spec::TlsMode;
    use tempfile::tempdir;

    fn moved_result(name: &str) -> MoveResult {
        MoveResult {
            lb_name: name.to_string(),
            src_namespace: "ns1".to_string(),
            dst_namespace: "ns2".to_string(),
            tls_mode: Some(TlsMode::LetsEncrypt),
            cname_old: "old.cname.example".to_string(),
            cname_new: "new.cname.example".to_string(),
            acme_cname_old: "old.acme.example".to_string(),
            acme_cname_new: "new.acme.example".to_string(),
            domains: vec!["app.example.com".to_string()],
            status: MoveStatus::Moved,
            backup_json: "{\"metadata\": {}}".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn green_report_for_clean_move_of_managed_lb() {
        let mut result = moved_result("lb-a");
        result.dns_managed = true;
        let page = render_mover_report(&[result], "acme", "ns2", false, &[], &[]);
        assert!(page.contains("Migration Successful"));
        assert!(page.contains("health-green"));
        assert!(page.contains("DNS Auto-Managed"));
        assert!(page.contains("lb-a"));
    }

    #[test]
    fn manual_dns_changes_turn_the_banner_yellow() {
        let result = moved_result("lb-a");
        let page = render_mover_report(&[result], "acme", "ns2", false, &[], &[]);
        assert!(page.contains("health-yellow"));
        assert!(page.contains("Completed — Action Required"));
        assert!(page.contains("_acme-challenge.app.example.com"));
        assert!(page.contains("new.cname.example"));
    }

    #[test]
    fn failures_turn_the_banner_red() {
        let mut result = moved_result("lb-a");
        result.status = MoveStatus::Failed;
        result.error = "Failed to create load balancer in the target namespace".to_string();
        let page = render_mover_report(&[result], "acme", "ns2", false, &[], &[]);
        assert!(page.contains("health-red"));
        assert!(page.contains("Migration Blocked"));
        assert!(page.contains("FAILED"));
    }

    #[test]
    fn unmatched_cert_renders_rework_card_and_red_banner() {
        let item = ManualReworkItem {
            cert_name: "c1".to_string(),
            cert_key: (ResourceKind::Certificates, "c1".to_string()),
            lb_names: vec!["lb-a".to_string()],
            src_namespace: "ns1".to_string(),
            dst_namespace: "ns2".to_string(),
            secret_type: "private key (blindfolded)".to_string(),
            cert_domains: vec!["app.example.com".to_string()],
            matched_cert_name: String::new(),
            matched_cert_ns: String::new(),
            matched_cert_domains: vec![],
            original_config_json: String::new(),
        };
        let page = render_mover_report(&[], "acme", "ns2", true, &[], &[item]);
        assert!(page.contains("health-red"));
        assert!(page.contains("TLS Certificate Pre-Flight"));
        assert!(page.contains("NO MATCH"));
    }

    #[test]
    fn dry_run_report_lists_planned_configs() {
        let mut result = moved_result("lb-a");
        result.status = MoveStatus::DryRun;
        result.cname_new = String::new();
        result.acme_cname_new = String::new();
        result.planned_config_json = "{\"metadata\": {\"name\": \"lb-a\"}}".to_string();
        result.dependencies.push(DepMoveResult {
            kind: Some(ResourceKind::OriginPools),
            name: "op-a".to_string(),
            status: MoveStatus::DryRun,
            planned_config_json: "{\"metadata\": {\"name\": \"op-a\"}}".to_string(),
            ..Default::default()
        });
        let page = render_mover_report(&[result], "acme", "ns2", true, &[], &[]);
        assert!(page.contains("Pre-Migration Report"));
        assert!(page.contains("Planned Configurations"));
        assert!(page.contains("Origin Pool"));
        assert!(page.contains("copyJson"));
    }

    #[test]
    fn report_file_lands_in_timestamped_run_dir() {
        let dir = tempdir().unwrap();
        let path = write_mover_report(dir.path(), &[moved_result("lb-a")], "acme", "ns2", false, &[], &[])
            .unwrap();
        assert!(path.exists());
        let parent = path.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
        assert!(parent.starts_with("mover_"));
        assert!(path.file_name().unwrap().to_string_lossy().ends_with(".html"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("LB Mover Report"));
    }
}
