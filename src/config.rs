//! Configuration loading and validation.
//!
//! The mover reads a single YAML document with the tenant name, API token,
//! target namespace, optional conflict prefix, and report directory.

use serde::Deserialize;
use std::fmt::Display;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::defaults::DEFAULT_REPORT_DIR;

const XC_NAME_MAX_LENGTH: usize = 64;

/// An F5 XC object or namespace identifier.
///
/// XC names are lowercase alphanumeric with hyphens and dots, 1-64
/// characters, and must start with an alphanumeric character. Validating
/// every name that flows into a URL prevents injection via crafted CSV or
/// config input.
#[derive(Debug, Deserialize, PartialEq, Clone, Hash, Eq)]
#[serde(try_from = "String")]
pub struct XcName(String);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "invalid {label}: '{value}' — must be 1-64 characters, lowercase \
         alphanumeric, hyphens, or dots, starting with an alphanumeric"
    )]
    InvalidName { label: String, value: String },
    #[error(
        "config file not found: {0}\nCopy config/config.yaml.example to \
         config/config.yaml and fill in your values"
    )]
    NotFound(PathBuf),
    #[error("could not read config file {path}: {err}")]
    Unreadable { path: PathBuf, err: String },
    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("missing or placeholder values in config: {0}")]
    MissingValues(String),
    #[error("mover.target_namespace is not set in config")]
    MissingTargetNamespace,
    #[error("--conflict-action=prefix requires mover.conflict_prefix to be set in config")]
    MissingConflictPrefix,
    #[error("input CSV not found: {0}\nCopy config/xc-mover.csv.example to config/xc-mover.csv and add your LBs")]
    CsvNotFound(PathBuf),
    #[error("could not read input CSV {path}: {err}")]
    CsvUnreadable { path: PathBuf, err: String },
    #[error("CSV line {line}: {err}")]
    CsvRow { line: usize, err: String },
    #[error("{label} must not be a reserved namespace ('{value}')")]
    ReservedNamespace { label: String, value: String },
}

impl XcName {
    pub fn new(s: &str) -> Result<Self, ConfigError> {
        Self::try_from(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a string is a legal XC identifier (without constructing one).
    pub fn is_valid(s: &str) -> bool {
        Self::is_valid_format(s)
    }

    fn is_valid_format(s: &str) -> bool {
        !s.is_empty()
            && s.len() <= XC_NAME_MAX_LENGTH
            && s.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
            && s.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    }
}

impl TryFrom<String> for XcName {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if XcName::is_valid_format(&s) {
            Ok(XcName(s))
        } else {
            Err(ConfigError::InvalidName {
                label: "name".to_string(),
                value: s,
            })
        }
    }
}

impl Deref for XcName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for XcName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

/// Validate an identifier coming from free-form input (CSV rows, config
/// strings), attaching a descriptive label to the error.
pub fn validate_xc_name(name: &str, label: &str) -> Result<XcName, ConfigError> {
    XcName::new(name).map_err(|_| ConfigError::InvalidName {
        label: label.to_string(),
        value: name.to_string(),
    })
}

#[derive(Debug, Deserialize, Clone)]
pub struct TenantSection {
    pub name: String,
}

/// Namespace filter for the scanner: `include` narrows the scan to the
/// listed namespaces, `exclude` removes namespaces from it.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct NamespacesSection {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSection {
    pub api_token: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MoverSection {
    #[serde(default)]
    pub target_namespace: String,
    #[serde(default)]
    pub conflict_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSection {
    #[serde(default = "default_report_dir")]
    pub output_dir: String,
}

fn default_report_dir() -> String {
    DEFAULT_REPORT_DIR.to_string()
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            output_dir: default_report_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub tenant: TenantSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub namespaces: NamespacesSection,
    #[serde(default)]
    pub mover: MoverSection,
    #[serde(default)]
    pub report: ReportSection,
}

impl Config {
    /// Load and validate the YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Unreadable {
            path: path.to_path_buf(),
            err: err.to_string(),
        })?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.reject_placeholders()?;
        Ok(config)
    }

    /// Reject empty or template placeholder values before any remote call.
    fn reject_placeholders(&self) -> Result<(), ConfigError> {
        let checks = [
            ("tenant.name", self.tenant.name.as_str()),
            ("auth.api_token", self.auth.api_token.as_str()),
        ];
        let missing: Vec<&str> = checks
            .iter()
            .filter(|(_, v)| {
                v.is_empty() || v.starts_with("your-") || *v == "REPLACE_WITH_YOUR_API_TOKEN"
            })
            .map(|(k, _)| *k)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingValues(missing.join(", ")))
        }
    }

    /// The validated target namespace of the move. Reserved namespaces can
    /// never be a move target.
    pub fn target_namespace(&self) -> Result<XcName, ConfigError> {
        let trimmed = self.mover.target_namespace.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingTargetNamespace);
        }
        if crate::defaults::is_reserved_namespace(trimmed) {
            return Err(ConfigError::ReservedNamespace {
                label: "mover.target_namespace".to_string(),
                value: trimmed.to_string(),
            });
        }
        validate_xc_name(trimmed, "mover.target_namespace")
    }

    /// The API endpoint of the tenant console.
    pub fn api_url(&self) -> String {
        format!("https://{}.console.ves.volterra.io", self.tenant.name)
    }
}

/// Apply the include/exclude filter to the full namespace list.
///
/// Include only: start from the include list (intersected with what
/// exists). Exclude only: start from all, remove excluded entries. Both:
/// include first, then exclude (exclude wins on overlap). Neither: all.
pub fn resolve_namespaces(
    all_namespaces: &[String],
    include: &[String],
    exclude: &[String],
) -> Vec<String> {
    fn in_list(list: &[String], ns: &str) -> bool {
        list.iter().any(|item| item == ns)
    }

    let mut overlap: Vec<&str> = include
        .iter()
        .map(String::as_str)
        .filter(|ns| in_list(exclude, ns))
        .collect();
    if !overlap.is_empty() {
        overlap.sort_unstable();
        warn!(
            "Namespaces appear in BOTH include and exclude lists (exclude wins): {}",
            overlap.join(", ")
        );
    }

    let base: Vec<String> = if include.is_empty() {
        all_namespaces.to_vec()
    } else {
        let mut unknown: Vec<&str> = include
            .iter()
            .map(String::as_str)
            .filter(|ns| !in_list(all_namespaces, ns))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            warn!(
                "Namespaces in include list but not found on tenant: {}",
                unknown.join(", ")
            );
        }
        all_namespaces
            .iter()
            .filter(|ns| in_list(include, ns))
            .cloned()
            .collect()
    };

    base.into_iter().filter(|ns| !in_list(exclude, ns)).collect()
}
