//! Batch rollback: the compensating transaction run after a mid-batch
//! failure.
//!
//! Undoes partial state on both sides: objects created in the target are
//! deleted, objects deleted from the source are re-created from the
//! captured backups. Rollback failures are recorded per object but never
//! cascade further.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::api::kind::ResourceKind;
use crate::api::XcClient;
use crate::mover::model::{DepKey, DepMoveResult, MoveResult, MoveStatus};
use crate::spec::ConfigObject;

/// Rollback a batch: undo creates in target, re-create deletes in source.
///
/// Order:
///   1. Delete any LBs created in target (reverse creation order)
///   2. Delete any deps created in target (reverse creation order)
///   3. Re-create deps in source from backups (reverse delete order = bottom-up)
///   4. Re-create LBs in source from backups
#[allow(clippy::too_many_arguments)]
pub fn rollback_batch(
    client: &XcClient,
    src_ns: &str,
    target_ns: &str,
    deleted_lbs: &[(String, ConfigObject)],
    deleted_deps: &[(ResourceKind, String, ConfigObject)],
    created_deps: &[(ResourceKind, String)],
    created_lbs: &[String],
    lb_results: &mut HashMap<String, MoveResult>,
    dep_results: &mut HashMap<DepKey, DepMoveResult>,
) {
    info!("ROLLBACK: Cleaning up target namespace...");

    for lb_name in created_lbs.iter().rev() {
        match client.delete_http_loadbalancer(target_ns, lb_name) {
            Ok(()) => info!("      ROLLBACK: Deleted LB '{lb_name}' from '{target_ns}'"),
            Err(err) => {
                info!("      ROLLBACK: FAILED to delete LB '{lb_name}' from target: {err}")
            }
        }
    }

    for (kind, dep_name) in created_deps.iter().rev() {
        let friendly = kind.friendly_name();
        match client.delete_config_object(target_ns, *kind, dep_name) {
            Ok(()) => info!("      ROLLBACK: Deleted {friendly} '{dep_name}' from '{target_ns}'"),
            Err(err) => info!(
                "      ROLLBACK: FAILED to delete {friendly} '{dep_name}' from target: {err}"
            ),
        }
    }

    info!("ROLLBACK: Restoring objects in source namespace...");

    for (kind, dep_name, dep_config) in deleted_deps.iter().rev() {
        let friendly = kind.friendly_name();
        let key: DepKey = (*kind, dep_name.clone());
        let metadata = dep_config.clean_metadata(src_ns);
        let spec = dep_config.clean_spec();
        match client.create_config_object(src_ns, *kind, &metadata, &spec) {
            Ok(_) => {
                info!("      ROLLBACK: {friendly} '{dep_name}' — restored in '{src_ns}'");
                if let Some(result) = dep_results.get_mut(&key) {
                    result.status = MoveStatus::Reverted;
                    result.error.clear();
                }
            }
            Err(err) => {
                info!("      ROLLBACK: {friendly} '{dep_name}' — FAILED: {err}");
                if let Some(result) = dep_results.get_mut(&key) {
                    result.error.push_str(&format!(" | ROLLBACK FAILED: {err}"));
                }
            }
        }
    }

    for (lb_name, lb_config) in deleted_lbs.iter().rev() {
        let metadata = lb_config.clean_metadata(src_ns);
        let spec = lb_config.clean_spec();
        match client.create_http_loadbalancer(src_ns, &metadata, &spec) {
            Ok(_) => {
                info!("      ROLLBACK: LB '{lb_name}' — restored in '{src_ns}'");
                let Some(result) = lb_results.get_mut(lb_name) else {
                    continue;
                };
                result.status = MoveStatus::Reverted;
                // Fetch the new CNAMEs; they may differ from the originals.
                match client.get_http_loadbalancer(src_ns, lb_name) {
                    Ok(restored) => {
                        result.cname_new = restored.cname();
                        result.acme_cname_new = restored.acme_cname();
                    }
                    Err(err) => {
                        debug!(
                            "ROLLBACK: Could not fetch CNAME for restored LB '{lb_name}': {err}"
                        );
                        result.cname_new = "(fetch failed after rollback)".to_string();
                        result.acme_cname_new = "(fetch failed after rollback)".to_string();
                    }
                }
            }
            Err(err) => {
                info!("      ROLLBACK: LB '{lb_name}' — FAILED: {err}");
                if let Some(result) = lb_results.get_mut(lb_name) {
                    result.error.push_str(&format!(" | ROLLBACK FAILED: {err}"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpClient, HttpConfig};
    use httpmock::Method::{DELETE, GET, POST};
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

    fn lb_backup(name: &str) -> ConfigObject {
        ConfigObject::from(json!({
            "metadata": {"name": name, "namespace": "ns1"},
            "spec": {"http": {}, "state": "ACTIVE"}
        }))
    }

    fn dep_backup(name: &str) -> ConfigObject {
        ConfigObject::from(json!({
            "metadata": {"name": name, "namespace": "ns1"},
            "spec": {"origin_servers": []}
        }))
    }

    #[test]
    fn rollback_restores_source_and_cleans_target() {
        let server = MockServer::start();
        let delete_created_lb = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns2/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({}));
        });
        let delete_created_dep = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns2/origin_pools/op-a");
            then.status(200).json_body(json!({}));
        });
        let recreate_dep = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns1/origin_pools")
                .json_body_partial(r#"{"metadata": {"name": "op-a", "namespace": "ns1"}}"#);
            then.status(200).json_body(json!({}));
        });
        let recreate_lb = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns1/http_loadbalancers")
                .json_body_partial(r#"{"metadata": {"name": "lb-a", "namespace": "ns1"}}"#);
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-a");
            then.status(200).json_body(json!({
                "spec": {"dns_info": [{"dns_name": "new-cname.example"}]}
            }));
        });

        let mut lb_results =
            HashMap::from([("lb-a".to_string(), MoveResult::new("lb-a", "ns1", "ns2"))]);
        let dep_key = (ResourceKind::OriginPools, "op-a".to_string());
        let mut dep_results = HashMap::from([(
            dep_key.clone(),
            DepMoveResult::new(ResourceKind::OriginPools, "op-a"),
        )]);

        rollback_batch(
            &client_for(&server),
            "ns1",
            "ns2",
            &[("lb-a".to_string(), lb_backup("lb-a"))],
            &[(ResourceKind::OriginPools, "op-a".to_string(), dep_backup("op-a"))],
            &[(ResourceKind::OriginPools, "op-a".to_string())],
            &["lb-a".to_string()],
            &mut lb_results,
            &mut dep_results,
        );

        delete_created_lb.assert();
        delete_created_dep.assert();
        recreate_dep.assert();
        recreate_lb.assert();
        assert_eq!(lb_results["lb-a"].status, MoveStatus::Reverted);
        assert_eq!(lb_results["lb-a"].cname_new, "new-cname.example");
        assert_eq!(dep_results[&dep_key].status, MoveStatus::Reverted);
    }

    #[test]
    fn rollback_failure_is_recorded_without_cascading() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/config/namespaces/ns1/http_loadbalancers");
            then.status(500).body("cannot create");
        });

        let mut result = MoveResult::new("lb-a", "ns1", "ns2");
        result.error = "create failed in target".to_string();
        let mut lb_results = HashMap::from([("lb-a".to_string(), result)]);
        let mut dep_results = HashMap::new();

        rollback_batch(
            &client_for(&server),
            "ns1",
            "ns2",
            &[("lb-a".to_string(), lb_backup("lb-a"))],
            &[],
            &[],
            &[],
            &mut lb_results,
            &mut dep_results,
        );

        let lb = &lb_results["lb-a"];
        assert_ne!(lb.status, MoveStatus::Reverted);
        // The original error text is preserved and the rollback failure appended.
        assert!(lb.error.starts_with("create failed in target"));
        assert!(lb.error.contains("ROLLBACK FAILED"));
    }
}
