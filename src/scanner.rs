//! The scanner: the mover's companion inventory subcommand.
//!
//! Lists every HTTP/HTTPS load balancer across the tenant's namespaces
//! (subject to the `namespaces.include`/`exclude` filter) and writes a CSV
//! plus an HTML report. The CSV rows are in the mover's input format, so an
//! operator copies the rows to move into `config/xc-mover.csv`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::api::{ApiError, XcClient};
use crate::config::{resolve_namespaces, Config};
use crate::report::render_scanner_report;
use crate::report::scanner::{ScanRow, ScannerReport};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to list namespaces: {0}")]
    ListNamespaces(#[source] ApiError),
    #[error("no namespaces to scan after filtering")]
    NoNamespaces,
    #[error("could not write scanner output {path}: {err}")]
    WriteOutput { path: PathBuf, err: String },
}

#[derive(Debug, Clone)]
pub struct ScanPaths {
    pub report_dir: PathBuf,
    pub log_path: PathBuf,
}

/// Outcome of a scan; paths are unset when nothing was found.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub lb_count: usize,
    pub csv_path: Option<PathBuf>,
    pub html_path: Option<PathBuf>,
}

pub fn run(client: &XcClient, config: &Config, paths: &ScanPaths) -> Result<ScanOutcome, ScanError> {
    let tenant_name = &config.tenant.name;
    let ns_include = &config.namespaces.include;
    let ns_exclude = &config.namespaces.exclude;

    println!("Connecting to tenant: {tenant_name}");
    println!("Log file:             {}", paths.log_path.display());
    let all_namespaces = client
        .list_namespaces()
        .map_err(ScanError::ListNamespaces)?;
    println!("Found {} namespaces on tenant", all_namespaces.len());

    let namespaces = resolve_namespaces(&all_namespaces, ns_include, ns_exclude);
    match (ns_include.is_empty(), ns_exclude.is_empty()) {
        (false, false) => println!(
            "Namespace filter: include {} + exclude {} -> {} namespaces to scan",
            ns_include.len(),
            ns_exclude.len(),
            namespaces.len()
        ),
        (false, true) => println!(
            "Namespace filter: include {} -> {} namespaces to scan",
            ns_include.len(),
            namespaces.len()
        ),
        (true, false) => println!(
            "Namespace filter: exclude {} -> {} namespaces to scan",
            ns_exclude.len(),
            namespaces.len()
        ),
        (true, true) => {
            println!("No namespace filter — scanning all {} namespaces", namespaces.len())
        }
    }
    if namespaces.is_empty() {
        return Err(ScanError::NoNamespaces);
    }

    let mut rows: Vec<ScanRow> = Vec::new();
    for (i, ns) in namespaces.iter().enumerate() {
        print!("  [{}/{}] Scanning namespace: {ns} ... ", i + 1, namespaces.len());
        let _ = io::stdout().flush();
        match client.list_all_loadbalancers(ns) {
            Ok(lbs) => {
                println!("{} load balancer(s)", lbs.len());
                for (lb_name, lb_kind) in lbs {
                    rows.push((ns.clone(), lb_name, lb_kind));
                }
            }
            Err(err) => {
                println!("ERROR: {err}");
                warn!("Failed to list LBs in namespace '{ns}': {err}");
            }
        }
    }
    rows.sort_by(|a, b| (&a.0, &a.1, a.2.singular()).cmp(&(&b.0, &b.1, b.2.singular())));

    println!();
    println!(
        "Total: {} load balancer(s) across {} namespace(s)",
        rows.len(),
        namespaces.len()
    );
    let mut outcome = ScanOutcome {
        lb_count: rows.len(),
        ..Default::default()
    };
    if rows.is_empty() {
        println!("No load balancers found — no CSV generated.");
        return Ok(outcome);
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H%M");
    let scan_time = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
    let run_dir = paths.report_dir.join(format!("scanner_{timestamp}"));
    fs::create_dir_all(&run_dir).map_err(|err| ScanError::WriteOutput {
        path: run_dir.clone(),
        err: err.to_string(),
    })?;

    let csv_path = run_dir.join(format!("scanner_{timestamp}.csv"));
    write_scan_csv(&csv_path, tenant_name, &scan_time, namespaces.len(), &rows)?;

    let html_path = run_dir.join(format!("scanner_{timestamp}.html"));
    let page = render_scanner_report(&ScannerReport {
        tenant_name,
        scan_time: &scan_time,
        rows: &rows,
        ns_scanned: namespaces.len(),
        total_ns_on_tenant: all_namespaces.len(),
        ns_include,
        ns_exclude,
    });
    fs::write(&html_path, page).map_err(|err| ScanError::WriteOutput {
        path: html_path.clone(),
        err: err.to_string(),
    })?;

    println!("CSV report saved to:  file://{}", csv_path.display());
    println!("HTML report saved to: file://{}", html_path.display());
    outcome.csv_path = Some(csv_path);
    outcome.html_path = Some(html_path);
    Ok(outcome)
}

/// The inventory CSV: a commented preamble explaining how to feed the
/// mover, then `namespace,lb_name,lb_type` data rows.
fn write_scan_csv(
    csv_path: &Path,
    tenant_name: &str,
    scan_time: &str,
    ns_count: usize,
    rows: &[ScanRow],
) -> Result<(), ScanError> {
    let mut out = String::new();
    out.push_str(&format!("# Scanner report — tenant: {tenant_name}\n"));
    out.push_str(&format!("# Generated: {scan_time}\n"));
    out.push_str(&format!(
        "# Namespaces scanned: {ns_count}  |  Load balancers found: {}\n",
        rows.len()
    ));
    out.push_str("#\n");
    out.push_str("# To use with the mover:\n");
    out.push_str("#   1. Copy the rows you need into config/xc-mover.csv\n");
    out.push_str("#   2. Only the namespace and lb_name columns are required\n");
    out.push_str("#\n");
    out.push_str("# --- DATA STARTS BELOW THIS LINE ---\n");
    out.push_str("namespace,lb_name,lb_type\n");
    for (ns, lb_name, lb_kind) in rows {
        out.push_str(&format!("{ns},{lb_name},{}\n", lb_kind.singular()));
    }
    fs::write(csv_path, out).map_err(|err| ScanError::WriteOutput {
        path: csv_path.to_path_buf(),
        err: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpClient, HttpConfig};
    use assert_matches::assert_matches;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    fn client_for(server: &MockServer) -> XcClient {
        let config = HttpConfig::new(
            Duration::from_secs(3),
            Duration::from_secs(3),
            Duration::from_millis(1),
        );
        XcClient::new(HttpClient::new(config, "tok").unwrap(), &server.base_url())
    }

    fn test_config(include: &[&str], exclude: &[&str]) -> Config {
        let yaml = format!(
            "tenant:\n  name: acme\nauth:\n  api_token: tok\nnamespaces:\n  include: [{}]\n  exclude: [{}]\n",
            include.join(", "),
            exclude.join(", "),
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    fn mock_namespaces(server: &MockServer, names: &[&str]) {
        let items: Vec<_> = names.iter().map(|n| json!({"name": n})).collect();
        server.mock(|when, then| {
            when.method(GET).path("/api/web/namespaces");
            then.status(200).json_body(json!({"items": items}));
        });
    }

    fn mock_lbs(server: &MockServer, ns: &str, http: &[&str], https: &[&str]) {
        let http_items: Vec<_> = http.iter().map(|n| json!({"name": n})).collect();
        server.mock(|when, then| {
            when.method(GET)
                .path(format!("/api/config/namespaces/{ns}/http_loadbalancers"));
            then.status(200).json_body(json!({"items": http_items}));
        });
        let https_items: Vec<_> = https.iter().map(|n| json!({"name": n})).collect();
        server.mock(|when, then| {
            when.method(GET)
                .path(format!("/api/config/namespaces/{ns}/https_loadbalancers"));
            then.status(200).json_body(json!({"items": https_items}));
        });
    }

    #[test]
    fn scan_writes_csv_and_html_inventory() {
        let server = MockServer::start();
        mock_namespaces(&server, &["ns1", "ns2"]);
        mock_lbs(&server, "ns1", &["lb-b", "lb-a"], &["lb-s"]);
        mock_lbs(&server, "ns2", &[], &[]);

        let dir = tempdir().unwrap();
        let paths = ScanPaths {
            report_dir: dir.path().to_path_buf(),
            log_path: dir.path().join("scanner.log"),
        };
        let outcome = run(&client_for(&server), &test_config(&[], &[]), &paths).unwrap();

        assert_eq!(outcome.lb_count, 3);
        let csv_path = outcome.csv_path.unwrap();
        let csv = fs::read_to_string(&csv_path).unwrap();
        // Comment preamble, then sorted data rows in the mover's format.
        assert!(csv.contains("# Scanner report — tenant: acme"));
        assert!(csv.contains("Copy the rows you need into config/xc-mover.csv"));
        assert!(csv.contains(
            "namespace,lb_name,lb_type\nns1,lb-a,http_loadbalancer\nns1,lb-b,http_loadbalancer\nns1,lb-s,https_loadbalancer\n"
        ));

        let html = fs::read_to_string(outcome.html_path.unwrap()).unwrap();
        assert!(html.contains("Scanner Report"));
        assert!(html.contains("namespace,lb_name\nns1,lb-a"));

        // Both files land in the same timestamped run directory.
        let parent = csv_path.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
        assert!(parent.starts_with("scanner_"));
    }

    #[test]
    fn include_filter_limits_the_scan() {
        let server = MockServer::start();
        mock_namespaces(&server, &["ns1", "ns2"]);
        mock_lbs(&server, "ns1", &["lb-a"], &[]);
        let ns2_lists = server.mock(|when, then| {
            when.method(GET).path_contains("/api/config/namespaces/ns2/");
            then.status(200).json_body(json!({"items": []}));
        });

        let dir = tempdir().unwrap();
        let paths = ScanPaths {
            report_dir: dir.path().to_path_buf(),
            log_path: dir.path().join("scanner.log"),
        };
        let outcome = run(&client_for(&server), &test_config(&["ns1"], &[]), &paths).unwrap();

        assert_eq!(outcome.lb_count, 1);
        assert_eq!(ns2_lists.hits(), 0);
    }

    #[test]
    fn filtering_everything_out_is_an_error() {
        let server = MockServer::start();
        mock_namespaces(&server, &["ns1"]);

        let dir = tempdir().unwrap();
        let paths = ScanPaths {
            report_dir: dir.path().to_path_buf(),
            log_path: dir.path().join("scanner.log"),
        };
        let err = run(&client_for(&server), &test_config(&[], &["ns1"]), &paths).unwrap_err();
        assert_matches!(err, ScanError::NoNamespaces);
    }

    #[test]
    fn unreadable_namespace_is_skipped_not_fatal() {
        let server = MockServer::start();
        mock_namespaces(&server, &["ns1", "ns2"]);
        // ns1 errors on the capability probe level (500, not 403/404).
        server.mock(|when, then| {
            when.method(GET).path_contains("/api/config/namespaces/ns1/");
            then.status(500);
        });
        mock_lbs(&server, "ns2", &["lb-a"], &[]);

        let dir = tempdir().unwrap();
        let paths = ScanPaths {
            report_dir: dir.path().to_path_buf(),
            log_path: dir.path().join("scanner.log"),
        };
        let outcome = run(&client_for(&server), &test_config(&[], &[]), &paths).unwrap();
        assert_eq!(outcome.lb_count, 1);
    }
}
