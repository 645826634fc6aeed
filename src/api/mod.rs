//! Typed client for the XC configuration API.

pub mod kind;
pub mod referrers;

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::XcName;
use crate::http::{HttpClient, HttpResponseError};
use crate::spec::ConfigObject;
use kind::{LbKind, ResourceKind, LB_KINDS};
use referrers::{parse_conflict_referrers, Referrer};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Http(#[from] HttpResponseError),
    #[error("invalid identifier in request path: '{0}'")]
    InvalidIdentifier(String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http(err) => err.status(),
            ApiError::InvalidIdentifier(_) => None,
        }
    }
}

/// Client for namespace and config-object operations on one tenant.
///
/// Shared across the whole run; the only mutable state is the set of LB
/// endpoint kinds disabled by a one-shot 404 capability probe.
pub struct XcClient {
    http: HttpClient,
    api_url: String,
    disabled_lb_kinds: Mutex<HashSet<LbKind>>,
}

impl XcClient {
    pub fn new(http: HttpClient, api_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            disabled_lb_kinds: Mutex::new(HashSet::new()),
        }
    }

    /// Reject any path segment that is not a legal XC identifier before it
    /// reaches a URL.
    fn segment<'a>(&self, value: &'a str) -> Result<&'a str, ApiError> {
        if XcName::is_valid(value) {
            Ok(value)
        } else {
            Err(ApiError::InvalidIdentifier(value.to_string()))
        }
    }

    fn config_url(&self, namespace: &str, kind: &str, name: Option<&str>) -> Result<String, ApiError> {
        let ns = self.segment(namespace)?;
        let mut url = format!("{}/api/config/namespaces/{ns}/{kind}", self.api_url);
        if let Some(name) = name {
            url.push('/');
            url.push_str(self.segment(name)?);
        }
        Ok(url)
    }

    // ------------------------------------------------------------------
    // Namespaces
    // ------------------------------------------------------------------

    /// All namespace names on the tenant, sorted.
    pub fn list_namespaces(&self) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/api/web/namespaces", self.api_url);
        let data = self.http.get_json(&url)?;
        let mut names: Vec<String> = items(&data)
            .iter()
            .filter_map(item_name)
            .map(str::to_string)
            .collect();
        names.sort();
        info!("Found {} namespaces", names.len());
        Ok(names)
    }

    // ------------------------------------------------------------------
    // Load balancer listing
    // ------------------------------------------------------------------

    fn list_lb_kind(&self, namespace: &str, lb_kind: LbKind) -> Result<Vec<Value>, ApiError> {
        if self.disabled_lb_kinds.lock().unwrap().contains(&lb_kind) {
            return Ok(Vec::new());
        }
        let url = self.config_url(namespace, lb_kind.as_str(), None)?;
        match self.http.get_json(&url) {
            Ok(data) => Ok(items(&data).to_vec()),
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
                self.disabled_lb_kinds.lock().unwrap().insert(lb_kind);
                info!("Endpoint {lb_kind} returned 404 — disabling for remaining namespaces");
                Ok(Vec::new())
            }
            Err(err) if err.status() == Some(StatusCode::FORBIDDEN) => {
                debug!("No access to {lb_kind} in namespace '{namespace}' (403) — skipping");
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// All load balancers in a namespace, across every enabled LB kind.
    pub fn list_all_loadbalancers(
        &self,
        namespace: &str,
    ) -> Result<Vec<(String, LbKind)>, ApiError> {
        let mut results = Vec::new();
        for &lb_kind in LB_KINDS {
            for lb in self.list_lb_kind(namespace, lb_kind)? {
                let name = item_name(&lb).unwrap_or("<unknown>");
                results.push((name.to_string(), lb_kind));
            }
        }
        Ok(results)
    }

    // ------------------------------------------------------------------
    // Generic config object operations
    // ------------------------------------------------------------------

    pub fn get_config_object(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<ConfigObject, ApiError> {
        let url = self.config_url(namespace, kind.as_str(), Some(name))?;
        Ok(ConfigObject::from(self.http.get_json(&url)?))
    }

    pub fn create_config_object(
        &self,
        namespace: &str,
        kind: ResourceKind,
        metadata: &Value,
        spec: &Value,
    ) -> Result<ConfigObject, ApiError> {
        let url = self.config_url(namespace, kind.as_str(), None)?;
        let body = json!({"metadata": metadata, "spec": spec});
        Ok(ConfigObject::from(self.http.post_json(&url, &body)?))
    }

    pub fn delete_config_object(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(), ApiError> {
        let url = self.config_url(namespace, kind.as_str(), Some(name))?;
        let body = json!({"fail_if_referred": false, "name": name, "namespace": namespace});
        self.http.delete_json(&url, &body)?;
        Ok(())
    }

    /// Probe whether a config object can be deleted safely.
    ///
    /// Sends a DELETE with `fail_if_referred: true`. A 409 Conflict means
    /// active referrers block the delete; the parsed referrers are
    /// returned and the object still exists. A success response means the
    /// object HAS been deleted as a side effect and callers must track that.
    pub fn probe_delete_config_object(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Vec<Referrer>, ApiError> {
        let url = self.config_url(namespace, kind.as_str(), Some(name))?;
        let body = json!({"fail_if_referred": true, "name": name, "namespace": namespace});
        let (status, text) = self.http.delete_raw(&url, &body)?;

        if status == StatusCode::CONFLICT {
            return Ok(parse_conflict_referrers(&text));
        }
        if status.is_success() || status.is_redirection() {
            info!(
                "probe_delete succeeded for {namespace}/{kind}/{name} — object deleted \
                 (no active referrers)"
            );
            return Ok(Vec::new());
        }
        Err(HttpResponseError::UnsuccessfulResponse {
            status_code: status,
            body: text.into_bytes(),
        }
        .into())
    }

    // ------------------------------------------------------------------
    // Name listing (conflict detection)
    // ------------------------------------------------------------------

    fn list_names(&self, namespace: &str, kind: &str) -> Result<HashSet<String>, ApiError> {
        let url = self.config_url(namespace, kind, None)?;
        match self.http.get_json(&url) {
            Ok(data) => Ok(items(&data)
                .iter()
                .filter_map(item_name)
                .map(str::to_string)
                .collect()),
            Err(err)
                if err.status() == Some(StatusCode::FORBIDDEN)
                    || err.status() == Some(StatusCode::NOT_FOUND) =>
            {
                debug!(
                    "Cannot list {kind} in namespace '{namespace}' ({:?}) — assuming empty",
                    err.status()
                );
                Ok(HashSet::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Names of all objects of a kind in a namespace. Empty on 403/404.
    pub fn list_config_object_names(
        &self,
        namespace: &str,
        kind: ResourceKind,
    ) -> Result<HashSet<String>, ApiError> {
        self.list_names(namespace, kind.as_str())
    }

    // ------------------------------------------------------------------
    // HTTP load balancer convenience wrappers
    // ------------------------------------------------------------------

    pub fn get_http_loadbalancer(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ConfigObject, ApiError> {
        self.get_loadbalancer(namespace, LbKind::HttpLoadbalancers, name)
    }

    pub fn get_loadbalancer(
        &self,
        namespace: &str,
        lb_kind: LbKind,
        name: &str,
    ) -> Result<ConfigObject, ApiError> {
        let url = self.config_url(namespace, lb_kind.as_str(), Some(name))?;
        Ok(ConfigObject::from(self.http.get_json(&url)?))
    }

    pub fn create_http_loadbalancer(
        &self,
        namespace: &str,
        metadata: &Value,
        spec: &Value,
    ) -> Result<ConfigObject, ApiError> {
        let url = self.config_url(namespace, LbKind::HttpLoadbalancers.as_str(), None)?;
        let body = json!({"metadata": metadata, "spec": spec});
        Ok(ConfigObject::from(self.http.post_json(&url, &body)?))
    }

    pub fn delete_http_loadbalancer(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        let url = self.config_url(namespace, LbKind::HttpLoadbalancers.as_str(), Some(name))?;
        let body = json!({"fail_if_referred": false, "name": name, "namespace": namespace});
        self.http.delete_json(&url, &body)?;
        Ok(())
    }

    pub fn list_http_loadbalancer_names(
        &self,
        namespace: &str,
    ) -> Result<HashSet<String>, ApiError> {
        self.list_names(namespace, LbKind::HttpLoadbalancers.as_str())
    }

    // ------------------------------------------------------------------
    // Certificates
    // ------------------------------------------------------------------

    /// All certificates in a namespace with full configs.
    ///
    /// The list endpoint may omit the parsed `spec.infos` details, so each
    /// certificate is re-fetched individually. Returns an empty list when
    /// the namespace is inaccessible (403) or the endpoint is absent (404).
    pub fn list_certificates_full(&self, namespace: &str) -> Result<Vec<ConfigObject>, ApiError> {
        let names = self.list_names(namespace, ResourceKind::Certificates.as_str())?;
        let mut sorted: Vec<String> = names.into_iter().collect();
        sorted.sort();
        let mut configs = Vec::new();
        for name in sorted {
            match self.get_config_object(namespace, ResourceKind::Certificates, &name) {
                Ok(config) => configs.push(config),
                Err(err) => {
                    debug!("Cannot fetch cert '{namespace}/{name}': {err}");
                }
            }
        }
        Ok(configs)
    }

    // ------------------------------------------------------------------
    // DNS zones
    // ------------------------------------------------------------------

    /// All DNS zones in the `system` namespace with full configs.
    ///
    /// Each zone is re-fetched individually because the list endpoint may
    /// omit nested spec fields. Returns an empty list on 403/404, which
    /// downgrades managed-DNS detection for the run.
    pub fn list_dns_zones(&self) -> Result<Vec<ConfigObject>, ApiError> {
        let url = format!("{}/api/config/dns/namespaces/system/dns_zones", self.api_url);
        let data = match self.http.get_json(&url) {
            Ok(data) => data,
            Err(err)
                if err.status() == Some(StatusCode::FORBIDDEN)
                    || err.status() == Some(StatusCode::NOT_FOUND) =>
            {
                warn!(
                    "Cannot list DNS zones ({:?}) — managed DNS detection unavailable",
                    err.status()
                );
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut configs = Vec::new();
        for item in items(&data) {
            let Some(name) = item_name(item) else {
                continue;
            };
            let Ok(name) = self.segment(name) else {
                debug!("Skipping DNS zone with unusable name: {name}");
                continue;
            };
            let zone_url =
                format!("{}/api/config/dns/namespaces/system/dns_zones/{name}", self.api_url);
            match self.http.get_json(&zone_url) {
                Ok(zone) => {
                    debug!("DNS zone '{name}' full config: {zone}");
                    configs.push(ConfigObject::from(zone));
                }
                Err(err) => {
                    debug!("Cannot fetch DNS zone '{name}': {err}");
                }
            }
        }
        Ok(configs)
    }
}

/// `items` array of a list response, or empty.
fn items(data: &Value) -> &[Value] {
    data.get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Name of a list item: top-level `name` or `metadata.name`.
fn item_name(item: &Value) -> Option<&str> {
    item.get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .or_else(|| {
            item.get("metadata")
                .and_then(|m| m.get("name"))
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpConfig;
    use assert_matches::assert_matches;
    use httpmock::Method::{DELETE, GET, POST};
    use httpmock::MockServer;
    use std::time::Duration;

    fn client_for(server: &MockServer) -> XcClient {
        let config = HttpConfig::new(
            Duration::from_secs(3),
            Duration::from_secs(3),
            Duration::from_millis(1),
        );
        let http = HttpClient::new(config, "tok").unwrap();
        XcClient::new(http, &server.base_url())
    }

    #[test]
    fn list_namespaces_sorted() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/web/namespaces");
            then.status(200)
                .json_body(json!({"items": [{"name": "zeta"}, {"name": "alpha"}, {"noname": 1}]}));
        });
        let names = client_for(&server).list_namespaces().unwrap();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn lb_kind_disabled_after_first_404() {
        let server = MockServer::start();
        let https_mock = server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/https_loadbalancers");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/http_loadbalancers");
            then.status(200).json_body(json!({"items": [{"name": "lb-a"}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns2/http_loadbalancers");
            then.status(200).json_body(json!({"items": []}));
        });

        let client = client_for(&server);
        let lbs = client.list_all_loadbalancers("ns1").unwrap();
        assert_eq!(lbs, vec![("lb-a".to_string(), LbKind::HttpLoadbalancers)]);

        // The https endpoint must not be queried again for other namespaces.
        let lbs = client.list_all_loadbalancers("ns2").unwrap();
        assert!(lbs.is_empty());
        assert_eq!(https_mock.hits(), 1);
    }

    #[test]
    fn forbidden_namespace_is_skipped_silently() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path_contains("/api/config/namespaces/locked/");
            then.status(403);
        });
        let lbs = client_for(&server).list_all_loadbalancers("locked").unwrap();
        assert!(lbs.is_empty());
    }

    #[test]
    fn probe_delete_conflict_returns_referrers() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/origin_pools/op-shared")
                .json_body_partial(r#"{"fail_if_referred": true}"#);
            then.status(409)
                .json_body(json!({"message": "referenced by http_loadbalancer ns1/lb-c"}));
        });

        let referrers = client_for(&server)
            .probe_delete_config_object("ns1", ResourceKind::OriginPools, "op-shared")
            .unwrap();
        assert_eq!(referrers, vec![Referrer::new("http_loadbalancer", "ns1", "lb-c")]);
    }

    #[test]
    fn probe_delete_success_means_deleted() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/api/config/namespaces/ns1/origin_pools/op-a");
            then.status(200).json_body(json!({}));
        });

        let referrers = client_for(&server)
            .probe_delete_config_object("ns1", ResourceKind::OriginPools, "op-a")
            .unwrap();
        mock.assert();
        assert!(referrers.is_empty());
    }

    #[test]
    fn probe_delete_other_error_is_surfaced() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/api/config/namespaces/ns1/origin_pools/op-a");
            then.status(500).body("boom");
        });

        let err = client_for(&server)
            .probe_delete_config_object("ns1", ResourceKind::OriginPools, "op-a")
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn list_names_tolerates_403_and_404() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/healthchecks");
            then.status(403);
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/ns1/app_firewalls");
            then.status(404);
        });

        let client = client_for(&server);
        assert!(client
            .list_config_object_names("ns1", ResourceKind::Healthchecks)
            .unwrap()
            .is_empty());
        assert!(client
            .list_config_object_names("ns1", ResourceKind::AppFirewalls)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn delete_sends_fail_if_referred_false() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/config/namespaces/ns1/http_loadbalancers/lb-a")
                .json_body(json!({"fail_if_referred": false, "name": "lb-a", "namespace": "ns1"}));
            then.status(200).json_body(json!({}));
        });
        client_for(&server).delete_http_loadbalancer("ns1", "lb-a").unwrap();
        mock.assert();
    }

    #[test]
    fn create_posts_metadata_and_spec() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/config/namespaces/ns2/origin_pools")
                .json_body_partial(r#"{"metadata": {"name": "op-a"}}"#);
            then.status(200).json_body(json!({"metadata": {"name": "op-a"}}));
        });
        let created = client_for(&server)
            .create_config_object(
                "ns2",
                ResourceKind::OriginPools,
                &json!({"name": "op-a"}),
                &json!({}),
            )
            .unwrap();
        mock.assert();
        assert_eq!(created.name(), "op-a");
    }

    #[test]
    fn certificates_are_refetched_individually() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/shared/certificates");
            then.status(200)
                .json_body(json!({"items": [{"name": "c1"}, {"name": "c2"}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/shared/certificates/c1");
            then.status(200)
                .json_body(json!({"metadata": {"name": "c1"}, "spec": {"infos": []}}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/config/namespaces/shared/certificates/c2");
            then.status(500);
        });

        let configs = client_for(&server).list_certificates_full("shared").unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name(), "c1");
    }

    #[test]
    fn dns_zone_listing_downgrades_on_403() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/config/dns/namespaces/system/dns_zones");
            then.status(403);
        });
        assert!(client_for(&server).list_dns_zones().unwrap().is_empty());
    }

    #[test]
    fn invalid_identifier_never_reaches_the_wire() {
        let server = MockServer::start();
        let err = client_for(&server)
            .get_config_object("ns1", ResourceKind::OriginPools, "../../../etc")
            .unwrap_err();
        assert_matches!(err, ApiError::InvalidIdentifier(_));
    }
}
