//! The scanner HTML report: a visual inventory of every load balancer
//! found across the scanned namespaces, with summary cards, a per-namespace
//! bar chart, the full LB table, and a copy-paste CSV block ready for the
//! mover's input file.

use maud::{html, Markup};
use std::collections::BTreeMap;

use crate::api::kind::LbKind;
use crate::report::page::render_page;

const SCANNER_CSS: &str = r#"
  .card-primary { border-left: 4px solid #0d6efd !important; }
  .card-primary .num { color: #0d6efd; }
  .card-ns .num { color: #6f42c1; }
  .card-ns-active .num { color: #198754; }
  .card-ns-empty .num { color: #6c757d; }
  .card-type .num { color: #0dcaf0; }

  .bar-chart { background: #fff; border: 1px solid #dee2e6; border-radius: 8px;
                padding: 1.25rem; margin-bottom: 2rem;
                box-shadow: 0 1px 3px rgba(0,0,0,0.04); }
  .bar-row { display: flex; align-items: center; gap: 0.75rem; padding: 0.3rem 0; }
  .bar-label { width: 200px; flex-shrink: 0; font-size: 0.85rem; font-weight: 500;
                text-align: right; overflow: hidden; text-overflow: ellipsis;
                white-space: nowrap; color: #333; }
  .bar-track { flex: 1; height: 22px; background: #e9ecef; border-radius: 4px;
                overflow: hidden; }
  .bar-fill { height: 100%; background: linear-gradient(90deg, #0d6efd, #6ea8fe);
               border-radius: 4px; min-width: 4px; }
  .bar-count { width: 36px; flex-shrink: 0; font-size: 0.85rem; font-weight: 700;
                color: #0d6efd; }

  .td-lb-name { font-weight: 500; }
  .ns-group-row td { background: #e9ecef; padding: 0.4rem 0.75rem;
                      font-size: 0.8rem; border-top: 2px solid #dee2e6; }
  .ns-group-count { margin-left: 0.75rem; color: #6c757d; font-weight: 400;
                     font-size: 0.78rem; }
  .type-badge { display: inline-block; padding: 0.15rem 0.5rem; border-radius: 10px;
                 font-size: 0.75rem; font-weight: 600; }
  .badge-http { background: #e0f2f1; color: #00695c; border: 1px solid #80cbc4; }
  .badge-https { background: #e8eaf6; color: #283593; border: 1px solid #9fa8da; }

  .csv-section { margin-bottom: 2rem; }
  .csv-header { display: flex; align-items: center; justify-content: space-between;
                 background: #343a40; color: #fff; padding: 0.5rem 0.75rem;
                 border-radius: 6px 6px 0 0; font-size: 0.85rem; }
  .csv-header .csv-title { font-weight: 600; }
  .csv-header .csv-hint { font-size: 0.78rem; opacity: 0.7; }
  .csv-block { background: #1e1e1e; color: #d4d4d4; padding: 1rem;
                border-radius: 0 0 6px 6px; overflow-x: auto; font-size: 0.8rem;
                line-height: 1.5; margin: 0; white-space: pre;
                font-family: "SFMono-Regular", Consolas, "Liberation Mono", Menlo, monospace;
                border: 1px solid #495057; border-top: none;
                max-height: 400px; overflow-y: auto; }

  .cfg-details { margin-bottom: 1.5rem; }
  .cfg-details > summary { cursor: pointer; padding: 0.6rem 1rem; background: #fff;
                            border: 1px solid #dee2e6; border-radius: 8px;
                            font-weight: 600; font-size: 0.9rem; color: #333;
                            box-shadow: 0 1px 3px rgba(0,0,0,0.04); }
  .cfg-details > summary:hover { background: #f0f4ff; }
  .cfg-body { background: #fff; border: 1px solid #dee2e6; border-top: none;
               border-radius: 0 0 8px 8px; padding: 1rem 1.25rem;
               box-shadow: 0 1px 3px rgba(0,0,0,0.04); }
  .cfg-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
               gap: 0.75rem 1.5rem; margin-bottom: 0.75rem; }
  .cfg-item { display: flex; flex-direction: column; gap: 0.1rem; }
  .cfg-item .cfg-label { font-size: 0.72rem; text-transform: uppercase;
                          letter-spacing: 0.04em; color: #888; font-weight: 600; }
  .cfg-item .cfg-value { font-size: 0.9rem; font-weight: 500; color: #1a1a1a; }
  .cfg-desc { font-size: 0.85rem; color: #555; margin-bottom: 0.5rem; }
  .cfg-row { margin-bottom: 0.4rem; }
  .cfg-row > .cfg-label { font-size: 0.78rem; font-weight: 600; color: #555;
                           margin-right: 0.4rem; }
  .cfg-tag { display: inline-block; padding: 0.12rem 0.5rem; border-radius: 10px;
              font-size: 0.75rem; font-weight: 600; margin: 0.1rem 0.15rem; }
  .cfg-tag-include { background: #d4edda; color: #155724; border: 1px solid #b7dfb9; }
  .cfg-tag-exclude { background: #f8d7da; color: #721c24; border: 1px solid #f1aeb5; }
"#;

/// One discovered load balancer: `(namespace, lb_name, lb_kind)`.
pub type ScanRow = (String, String, LbKind);

/// Inputs for the scanner report page.
pub struct ScannerReport<'a> {
    pub tenant_name: &'a str,
    pub scan_time: &'a str,
    /// Rows sorted by (namespace, lb_name).
    pub rows: &'a [ScanRow],
    pub ns_scanned: usize,
    pub total_ns_on_tenant: usize,
    pub ns_include: &'a [String],
    pub ns_exclude: &'a [String],
}

fn friendly_lb_type(kind: LbKind) -> &'static str {
    match kind {
        LbKind::HttpLoadbalancers => "Http Loadbalancer",
        LbKind::HttpsLoadbalancers => "Https Loadbalancer",
    }
}

fn badge_class(kind: LbKind) -> &'static str {
    match kind {
        LbKind::HttpLoadbalancers => "badge-http",
        LbKind::HttpsLoadbalancers => "badge-https",
    }
}

fn sorted_tags(names: &[String]) -> Vec<&str> {
    let mut tags: Vec<&str> = names.iter().map(String::as_str).collect();
    tags.sort_unstable();
    tags
}

fn config_section(report: &ScannerReport<'_>) -> Markup {
    let has_include = !report.ns_include.is_empty();
    let has_exclude = !report.ns_exclude.is_empty();
    let (filter_mode, filter_desc) = match (has_include, has_exclude) {
        (true, true) => (
            "Include + Exclude",
            format!(
                "Started from {} included namespace(s), then removed {} excluded namespace(s).",
                report.ns_include.len(),
                report.ns_exclude.len()
            ),
        ),
        (true, false) => (
            "Include list",
            format!(
                "Only the {} listed namespace(s) were scanned.",
                report.ns_include.len()
            ),
        ),
        (false, true) => (
            "Exclude list",
            format!(
                "All namespaces were scanned except {} excluded namespace(s).",
                report.ns_exclude.len()
            ),
        ),
        (false, false) => (
            "No filter",
            "All namespaces accessible by the API token were scanned.".to_string(),
        ),
    };

    html! {
        details class="cfg-details" open {
            summary { "Scan Configuration" }
            div class="cfg-body" {
                div class="cfg-grid" {
                    div class="cfg-item" {
                        span class="cfg-label" { "Tenant" }
                        span class="cfg-value" { (report.tenant_name) }
                    }
                    div class="cfg-item" {
                        span class="cfg-label" { "Namespaces on tenant" }
                        span class="cfg-value" { (report.total_ns_on_tenant) }
                    }
                    div class="cfg-item" {
                        span class="cfg-label" { "Namespaces scanned" }
                        span class="cfg-value" { (report.ns_scanned) }
                    }
                    div class="cfg-item" {
                        span class="cfg-label" { "Filter mode" }
                        span class="cfg-value" { (filter_mode) }
                    }
                }
                div class="cfg-desc" { (filter_desc) }
                @if has_include {
                    div class="cfg-row" {
                        span class="cfg-label" { "Include:" }
                        @for tag in sorted_tags(report.ns_include) {
                            span class="cfg-tag cfg-tag-include" { (tag) } " "
                        }
                    }
                }
                @if has_exclude {
                    div class="cfg-row" {
                        span class="cfg-label" { "Exclude:" }
                        @for tag in sorted_tags(report.ns_exclude) {
                            span class="cfg-tag cfg-tag-exclude" { (tag) } " "
                        }
                    }
                }
            }
        }
    }
}

/// Render the full scanner report page.
pub fn render_scanner_report(report: &ScannerReport<'_>) -> String {
    let lb_count = report.rows.len();

    // Copy-paste CSV for the mover's input file.
    let mut csv_lines = vec!["namespace,lb_name".to_string()];
    for (ns, lb_name, _) in report.rows {
        csv_lines.push(format!("{ns},{lb_name}"));
    }
    let csv_text = csv_lines.join("\n");

    // Per-namespace and per-type counts for the cards and the chart.
    let mut ns_with_lbs: BTreeMap<&str, usize> = BTreeMap::new();
    let mut type_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for (ns, _, kind) in report.rows {
        *ns_with_lbs.entry(ns.as_str()).or_default() += 1;
        *type_counts.entry(friendly_lb_type(*kind)).or_default() += 1;
    }
    let ns_empty_count = report.ns_scanned.saturating_sub(ns_with_lbs.len());

    // Bar chart rows: busiest namespaces first, name as tie-break.
    let mut chart: Vec<(&str, usize)> = ns_with_lbs.iter().map(|(ns, n)| (*ns, *n)).collect();
    chart.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let max_lb_in_ns = chart.first().map(|(_, n)| *n).unwrap_or(1);

    // Table rows grouped by namespace, with a separator row per group.
    let mut grouped: Vec<(&str, Vec<&ScanRow>)> = Vec::new();
    for row in report.rows {
        match grouped.last_mut() {
            Some((ns, rows)) if *ns == row.0 => rows.push(row),
            _ => grouped.push((row.0.as_str(), vec![row])),
        }
    }

    let body = html! {
        (config_section(report))

        div class="summary" {
            div class="card card-primary" {
                div class="num" { (lb_count) }
                div class="label" { "Load Balancers" }
            }
            div class="card card-ns" {
                div class="num" { (report.ns_scanned) }
                div class="label" { "Namespaces Scanned" }
            }
            div class="card card-ns-active" {
                div class="num" { (ns_with_lbs.len()) }
                div class="label" { "With LBs" }
            }
            div class="card card-ns-empty" {
                div class="num" { (ns_empty_count) }
                div class="label" { "Empty" }
            }
            @for (friendly, count) in &type_counts {
                div class="card card-type" {
                    div class="num" { (count) }
                    div class="label" { (friendly) }
                }
            }
        }

        @if !chart.is_empty() {
            h2 { "Load Balancers per Namespace" }
            div class="bar-chart" {
                @for (ns, count) in &chart {
                    div class="bar-row" {
                        div class="bar-label" { (ns) }
                        div class="bar-track" {
                            div class="bar-fill"
                                style={ "width:" (100 * count / max_lb_in_ns) "%" } {}
                        }
                        div class="bar-count" { (count) }
                    }
                }
            }
        }

        h2 { "All Load Balancers" }
        table {
            thead {
                tr { th { "LB Name" } th { "Namespace" } th { "Type" } }
            }
            tbody {
                @for (ns, rows) in &grouped {
                    tr class="ns-group-row" {
                        td colspan="3" {
                            strong { (ns) }
                            span class="ns-group-count" { (rows.len()) " LB(s)" }
                        }
                    }
                    @for row in rows {
                        tr {
                            td class="td-lb-name" { (row.1) }
                            td { (row.0) }
                            td {
                                span class={ "type-badge " (badge_class(row.2)) } {
                                    (friendly_lb_type(row.2))
                                }
                            }
                        }
                    }
                }
            }
        }

        h2 { "CSV for Mover" }
        p style="font-size:0.88rem;color:#555;" {
            "Copy this into " code { "config/xc-mover.csv" }
            " and remove the rows you don't need."
        }
        div class="csv-section" {
            div class="csv-header" {
                span {
                    span class="csv-title" { "xc-mover.csv" }
                    span class="csv-hint" { " — " (lb_count) " row(s), ready to paste" }
                }
                button class="copy-btn" onclick="copyCsv(this)" { "Copy CSV" }
            }
            pre class="csv-block" id="csv-content" { (csv_text) }
        }
    };

    let title = format!("Scanner Report — {}", report.tenant_name);
    let meta_line = html! {
        "Tenant: " strong { (report.tenant_name) }
        " | " (report.scan_time)
        " | " (report.ns_scanned) " namespace(s) scanned"
        " | " (lb_count) " load balancer(s) found"
    };
    render_page(&title, meta_line, body, SCANNER_CSS)
}
