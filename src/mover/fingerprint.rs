//! Dry-run fingerprint gate.
//!
//! A real run must be preceded by a dry-run over the same configuration.
//! The dry-run stores a truncated SHA-256 of (tenant, target namespace,
//! canonicalised CSV content); the real run verifies it, and a successful
//! real run consumes the file.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FINGERPRINT_HEX_LEN: usize = 16;

/// Compute the fingerprint for the current mover configuration.
///
/// The CSV content is canonicalised (trimmed, comments and blanks dropped,
/// lines sorted) so row order and commentary do not affect the digest. An
/// unreadable CSV hashes as empty content.
pub fn compute_fingerprint(tenant: &str, target_namespace: &str, csv_path: &Path) -> String {
    let csv_content = fs::read_to_string(csv_path).unwrap_or_default();
    let mut csv_lines: Vec<&str> = csv_content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    csv_lines.sort_unstable();
    let input = format!("{tenant}|{target_namespace}|{}", csv_lines.join("|"));
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..FINGERPRINT_HEX_LEN].to_string()
}

/// On-disk fingerprint file: digest on the first line, local timestamp on
/// the second.
pub struct FingerprintStore {
    path: PathBuf,
}

impl FingerprintStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn write(&self, fingerprint: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        match fs::write(&self.path, format!("{fingerprint}\n{timestamp}\n")) {
            Ok(()) => debug!("Dry-run fingerprint written: {}", self.path.display()),
            Err(err) => warn!("Could not write dry-run fingerprint: {err}"),
        }
    }

    /// `(fingerprint, timestamp)`, empty strings when absent or partial.
    pub fn read(&self) -> (String, String) {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return (String::new(), String::new());
        };
        let mut lines = content.trim().lines();
        let fingerprint = lines.next().unwrap_or("").trim().to_string();
        let timestamp = lines.next().unwrap_or("").trim().to_string();
        (fingerprint, timestamp)
    }

    /// Remove the file after a successful real run (one-shot use).
    pub fn delete(&self) {
        if fs::remove_file(&self.path).is_ok() {
            debug!("Dry-run fingerprint removed: {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn digest_is_16_hex_chars() {
        let csv = csv_file("namespace,lb_name\nns1,lb-a\n");
        let fp = compute_fingerprint("acme", "ns2", csv.path());
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn row_order_and_comments_do_not_change_the_digest() {
        let a = csv_file("namespace,lb_name\nns1,lb-a\nns1,lb-b\n");
        let b = csv_file("# comment\nns1,lb-b\nnamespace,lb_name\n\nns1,lb-a\n");
        assert_eq!(
            compute_fingerprint("acme", "ns2", a.path()),
            compute_fingerprint("acme", "ns2", b.path()),
        );
    }

    #[test]
    fn inputs_change_the_digest() {
        let csv = csv_file("namespace,lb_name\nns1,lb-a\n");
        let base = compute_fingerprint("acme", "ns2", csv.path());
        assert_ne!(base, compute_fingerprint("other", "ns2", csv.path()));
        assert_ne!(base, compute_fingerprint("acme", "ns3", csv.path()));

        let changed = csv_file("namespace,lb_name\nns1,lb-z\n");
        assert_ne!(base, compute_fingerprint("acme", "ns2", changed.path()));
    }

    #[test]
    fn store_round_trip_and_one_shot_delete() {
        let dir = tempdir().unwrap();
        let store = FingerprintStore::new(&dir.path().join(".fingerprint"));

        assert_eq!(store.read(), (String::new(), String::new()));

        store.write("abcdef0123456789");
        let (fp, ts) = store.read();
        assert_eq!(fp, "abcdef0123456789");
        assert!(!ts.is_empty());

        store.delete();
        assert_eq!(store.read(), (String::new(), String::new()));
        // Deleting again is not an error.
        store.delete();
    }
}
