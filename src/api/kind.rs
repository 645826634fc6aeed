//! Resource kinds of the XC configuration API.

use std::fmt::Display;

/// Dependency object kinds reachable from an HTTP load balancer spec.
///
/// The `as_str` form doubles as the API URL path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    OriginPools,
    Healthchecks,
    Certificates,
    ServicePolicys,
    ApiDefinitions,
    AppFirewalls,
    IpPrefixSets,
    RateLimiterPolicys,
    UserIdentifications,
}

/// Keyword table mapping reference JSON paths to resource kinds. The first
/// keyword contained in the (lowercased) path wins.
const PATH_KEYWORDS: &[(&str, ResourceKind)] = &[
    ("pool", ResourceKind::OriginPools),
    ("healthcheck", ResourceKind::Healthchecks),
    ("health_check", ResourceKind::Healthchecks),
    ("certificate", ResourceKind::Certificates),
    ("service_polic", ResourceKind::ServicePolicys),
    ("api_definition", ResourceKind::ApiDefinitions),
    ("app_firewall", ResourceKind::AppFirewalls),
    ("ip_prefix_set", ResourceKind::IpPrefixSets),
    ("rate_limiter", ResourceKind::RateLimiterPolicys),
    ("user_identification", ResourceKind::UserIdentifications),
];

impl ResourceKind {
    /// API path segment, e.g. `origin_pools`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::OriginPools => "origin_pools",
            ResourceKind::Healthchecks => "healthchecks",
            ResourceKind::Certificates => "certificates",
            ResourceKind::ServicePolicys => "service_policys",
            ResourceKind::ApiDefinitions => "api_definitions",
            ResourceKind::AppFirewalls => "app_firewalls",
            ResourceKind::IpPrefixSets => "ip_prefix_sets",
            ResourceKind::RateLimiterPolicys => "rate_limiter_policys",
            ResourceKind::UserIdentifications => "user_identifications",
        }
    }

    /// Human-readable name used in logs, errors, and the report.
    pub fn friendly_name(&self) -> &'static str {
        match self {
            ResourceKind::OriginPools => "Origin Pool",
            ResourceKind::Healthchecks => "Health Check",
            ResourceKind::Certificates => "TLS Certificate",
            ResourceKind::ServicePolicys => "Service Policy",
            ResourceKind::ApiDefinitions => "API Definition",
            ResourceKind::AppFirewalls => "App Firewall",
            ResourceKind::IpPrefixSets => "IP Prefix Set",
            ResourceKind::RateLimiterPolicys => "Rate Limiter",
            ResourceKind::UserIdentifications => "User Identification",
        }
    }

    /// Guess the resource kind from the JSON path a reference was found at.
    /// Unclassifiable paths yield `None`; callers log and skip those.
    pub fn from_ref_path(json_path: &str) -> Option<ResourceKind> {
        let path = json_path.to_lowercase();
        PATH_KEYWORDS
            .iter()
            .find(|(keyword, _)| path.contains(keyword))
            .map(|(_, kind)| *kind)
    }

    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::OriginPools,
            ResourceKind::Healthchecks,
            ResourceKind::Certificates,
            ResourceKind::ServicePolicys,
            ResourceKind::ApiDefinitions,
            ResourceKind::AppFirewalls,
            ResourceKind::IpPrefixSets,
            ResourceKind::RateLimiterPolicys,
            ResourceKind::UserIdentifications,
        ]
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Load balancer endpoint kinds probed per namespace. A 404 on one of these
/// disables it for the remainder of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LbKind {
    HttpLoadbalancers,
    HttpsLoadbalancers,
}

pub const LB_KINDS: &[LbKind] = &[LbKind::HttpLoadbalancers, LbKind::HttpsLoadbalancers];

impl LbKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LbKind::HttpLoadbalancers => "http_loadbalancers",
            LbKind::HttpsLoadbalancers => "https_loadbalancers",
        }
    }

    /// Singular display form, e.g. `http_loadbalancer`.
    pub fn singular(&self) -> &'static str {
        match self {
            LbKind::HttpLoadbalancers => "http_loadbalancer",
            LbKind::HttpsLoadbalancers => "https_loadbalancer",
        }
    }
}

impl Display for LbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
