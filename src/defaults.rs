//! Well-known paths and namespace constants.

/// Default YAML configuration path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Fixed path of the mover input CSV.
pub const MOVER_CSV_PATH: &str = "config/xc-mover.csv";

/// Dry-run fingerprint file consumed by the fingerprint gate.
pub const FINGERPRINT_PATH: &str = "config/.mover_dryrun_fingerprint";

/// Directory receiving the per-run debug log files.
pub const LOG_DIR: &str = "logs";

/// Fallback report output directory when `report.output_dir` is unset.
pub const DEFAULT_REPORT_DIR: &str = "reports";

/// Namespaces whose objects are system-managed or tenant-shared and must
/// never be moved, deleted, or re-created.
pub const RESERVED_NAMESPACES: &[&str] = &["system", "shared"];

/// The namespace holding certificates that may substitute non-portable ones.
pub const SHARED_NAMESPACE: &str = "shared";

pub fn is_reserved_namespace(ns: &str) -> bool {
    RESERVED_NAMESPACES.contains(&ns)
}
