//! Input CSV parsing.
//!
//! The move list is a two-column CSV (`namespace,lb_name`). Lines starting
//! with `#` are comments, blank lines are ignored, and every data value is
//! validated as an XC identifier before it can reach a URL.

use std::fs;
use std::path::Path;

use crate::config::{validate_xc_name, ConfigError, XcName};

/// One requested move: an LB identified by `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MoveEntry {
    pub namespace: XcName,
    pub lb_name: XcName,
}

/// Read and validate the move CSV. Duplicate rows are deduplicated,
/// keeping first-seen order.
pub fn read_move_csv(path: &Path) -> Result<Vec<MoveEntry>, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::CsvNotFound(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|err| ConfigError::CsvUnreadable {
        path: path.to_path_buf(),
        err: err.to_string(),
    })?;
    parse_move_csv(&raw)
}

fn parse_move_csv(raw: &str) -> Result<Vec<MoveEntry>, ConfigError> {
    let mut data_lines = raw
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim_start().starts_with('#') && !line.trim().is_empty());

    let Some((header_line, header)) = data_lines.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let ns_col = columns.iter().position(|c| *c == "namespace");
    let name_col = columns.iter().position(|c| *c == "lb_name");
    let (Some(ns_col), Some(name_col)) = (ns_col, name_col) else {
        return Err(ConfigError::CsvRow {
            line: header_line,
            err: "header must contain 'namespace' and 'lb_name' columns".to_string(),
        });
    };

    let mut entries = Vec::new();
    for (line_no, line) in data_lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let ns = fields.get(ns_col).copied().unwrap_or("");
        let name = fields.get(name_col).copied().unwrap_or("");
        if ns.is_empty() || name.is_empty() {
            continue;
        }
        if crate::defaults::is_reserved_namespace(ns) {
            return Err(ConfigError::ReservedNamespace {
                label: format!("namespace on CSV line {line_no}"),
                value: ns.to_string(),
            });
        }
        let entry = MoveEntry {
            namespace: validate_xc_name(ns, &format!("namespace on CSV line {line_no}"))?,
            lb_name: validate_xc_name(name, &format!("lb_name on CSV line {line_no}"))?,
        };
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    Ok(entries)
}
