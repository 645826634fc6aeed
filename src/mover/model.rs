//! Data model for move planning, execution, and reporting.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use crate::api::kind::ResourceKind;
use crate::spec::{ConfigObject, TlsMode};

/// Identity of a dependency within the move graph.
pub type DepKey = (ResourceKind, String);

/// A discovered dependency of a load balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
}

impl Dependency {
    pub fn new(kind: ResourceKind, name: &str, namespace: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    pub fn key(&self) -> DepKey {
        (self.kind, self.name.clone())
    }

    pub fn friendly(&self) -> String {
        format!("{} '{}'", self.kind.friendly_name(), self.name)
    }
}

/// Outcome of a move for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveStatus {
    /// Not decided yet; resolved to a terminal status before reporting.
    #[default]
    Pending,
    Moved,
    DryRun,
    Failed,
    Skipped,
    Reverted,
    Blocked,
    ManualRework,
}

impl MoveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveStatus::Pending => "",
            MoveStatus::Moved => "moved",
            MoveStatus::DryRun => "dry-run",
            MoveStatus::Failed => "failed",
            MoveStatus::Skipped => "skipped",
            MoveStatus::Reverted => "reverted",
            MoveStatus::Blocked => "blocked",
            MoveStatus::ManualRework => "manual-rework",
        }
    }

    /// Statuses that make the whole run exit non-zero.
    pub fn is_failure(&self) -> bool {
        matches!(self, MoveStatus::Failed | MoveStatus::Blocked)
    }
}

impl Display for MoveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of moving a single dependent object.
#[derive(Debug, Clone, Default)]
pub struct DepMoveResult {
    pub kind: Option<ResourceKind>,
    pub name: String,
    /// Non-empty when renamed due to a conflict.
    pub new_name: String,
    pub status: MoveStatus,
    pub error: String,
    /// Original config JSON, for the report's backup section.
    pub backup_json: String,
    /// Planned creation payload (dry-run only).
    pub planned_config_json: String,
}

/// Result of moving one load balancer.
#[derive(Debug, Clone, Default)]
pub struct MoveResult {
    pub lb_name: String,
    /// Non-empty when renamed due to a conflict.
    pub new_lb_name: String,
    pub src_namespace: String,
    pub dst_namespace: String,
    pub tls_mode: Option<TlsMode>,
    pub cname_old: String,
    pub cname_new: String,
    pub acme_cname_old: String,
    pub acme_cname_new: String,
    pub domains: Vec<String>,
    /// All LB domains live under XC-managed DNS zones.
    pub dns_managed: bool,
    pub status: MoveStatus,
    pub error: String,
    pub dependencies: Vec<DepMoveResult>,
    pub planned_config_json: String,
    pub backup_json: String,
}

/// A certificate that cannot be moved automatically.
///
/// Its private key holds secret material the API will not return, so the
/// move either substitutes a matching certificate from the target or
/// `shared` namespace, or blocks the affected LBs.
#[derive(Debug, Clone)]
pub struct ManualReworkItem {
    pub cert_name: String,
    pub cert_key: DepKey,
    pub lb_names: Vec<String>,
    pub src_namespace: String,
    pub dst_namespace: String,
    pub secret_type: String,
    pub cert_domains: Vec<String>,
    pub matched_cert_name: String,
    pub matched_cert_ns: String,
    pub matched_cert_domains: Vec<String>,
    pub original_config_json: String,
}

impl ManualReworkItem {
    pub fn is_matched(&self) -> bool {
        !self.matched_cert_name.is_empty()
    }
}

/// Data needed to render a dependency graph for one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchGraphData {
    pub batch_index: usize,
    pub lb_names: Vec<String>,
    /// Direct (tier-1) dependencies per LB.
    pub lb_to_deps: HashMap<String, Vec<DepKey>>,
    /// Dependencies shared by more than one LB in this batch.
    pub shared_deps: HashSet<DepKey>,
    /// Sub-dependencies: parent dep -> child deps.
    pub dep_children: HashMap<DepKey, Vec<DepKey>>,
    /// Dependencies referenced by objects outside the move list.
    pub external_deps: HashSet<DepKey>,
}

impl MoveResult {
    pub fn new(lb_name: &str, src_namespace: &str, dst_namespace: &str) -> Self {
        Self {
            lb_name: lb_name.to_string(),
            src_namespace: src_namespace.to_string(),
            dst_namespace: dst_namespace.to_string(),
            ..Default::default()
        }
    }

    /// Fill the display details read from the LB's config document.
    pub fn with_lb_details(mut self, config: &ConfigObject, dns_managed: bool) -> Self {
        self.tls_mode = Some(config.tls_mode());
        self.cname_old = config.cname();
        self.acme_cname_old = config.acme_cname();
        self.domains = config.lb_domains();
        self.dns_managed = dns_managed;
        self.backup_json = config.to_pretty_json();
        self
    }

    pub fn tls_mode_str(&self) -> &'static str {
        self.tls_mode.map(|m| m.as_str()).unwrap_or("")
    }

    pub fn is_lets_encrypt(&self) -> bool {
        self.tls_mode.map(|m| m.is_lets_encrypt()).unwrap_or(false)
    }
}

impl DepMoveResult {
    pub fn new(kind: ResourceKind, name: &str) -> Self {
        Self {
            kind: Some(kind),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn friendly(&self) -> String {
        match self.kind {
            Some(kind) => format!("{} '{}'", kind.friendly_name(), self.name),
            None => format!("'{}'", self.name),
        }
    }

    pub fn friendly_kind(&self) -> &'static str {
        self.kind.map(|k| k.friendly_name()).unwrap_or("?")
    }
}
