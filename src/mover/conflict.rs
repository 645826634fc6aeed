//! Name conflict resolution policy.
//!
//! When an object with the same name already exists in the target
//! namespace, the object is either skipped (the existing target-side
//! object is reused) or renamed with a configured prefix.

use clap::ValueEnum;
use std::fmt::Display;

use crate::mover::console::Prompter;

/// Policy for resolving name conflicts in the target namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConflictAction {
    /// Prompt interactively per conflicting object.
    #[default]
    Ask,
    /// Skip conflicting objects automatically.
    Skip,
    /// Rename conflicting objects with the configured prefix.
    Prefix,
}

impl Display for ConflictAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConflictAction::Ask => "ask",
            ConflictAction::Skip => "skip",
            ConflictAction::Prefix => "prefix",
        };
        write!(f, "{name}")
    }
}

/// How one conflicting object is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResolution {
    Rename(String),
    Skip,
}

pub fn prefixed_name(prefix: &str, name: &str) -> String {
    format!("{prefix}-{name}")
}

/// Resolve a naming conflict per the configured policy.
pub fn resolve_conflict(
    object_desc: &str,
    original_name: &str,
    prefix: &str,
    action: ConflictAction,
    prompter: &mut dyn Prompter,
) -> ConflictResolution {
    let new_name = prefixed_name(prefix, original_name);
    match action {
        ConflictAction::Skip => {
            println!(
                "    CONFLICT: {object_desc} '{original_name}' already exists — skipping \
                 (--conflict-action=skip)"
            );
            ConflictResolution::Skip
        }
        ConflictAction::Prefix => {
            println!(
                "    CONFLICT: {object_desc} '{original_name}' already exists — renaming to \
                 '{new_name}' (--conflict-action=prefix)"
            );
            ConflictResolution::Rename(new_name)
        }
        ConflictAction::Ask => {
            println!(
                "    CONFLICT: {object_desc} '{original_name}' already exists in target namespace."
            );
            println!("      [s] Skip this object");
            println!("      [r] Rename to '{new_name}'");
            loop {
                match prompter.ask("      Choose [s/r]: ").to_lowercase().as_str() {
                    "s" | "skip" => return ConflictResolution::Skip,
                    "r" | "rename" => return ConflictResolution::Rename(new_name.clone()),
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mover::console::ScriptedPrompter;

    #[test]
    fn prefix_policy_renames() {
        let mut prompter = ScriptedPrompter::default();
        let resolution =
            resolve_conflict("HTTP LB", "lb-a", "mv", ConflictAction::Prefix, &mut prompter);
        assert_eq!(resolution, ConflictResolution::Rename("mv-lb-a".to_string()));
    }

    #[test]
    fn skip_policy_skips() {
        let mut prompter = ScriptedPrompter::default();
        let resolution =
            resolve_conflict("HTTP LB", "lb-a", "mv", ConflictAction::Skip, &mut prompter);
        assert_eq!(resolution, ConflictResolution::Skip);
    }

    #[test]
    fn ask_policy_reads_answer() {
        let mut prompter = ScriptedPrompter::with_answers(&["x", "r"]);
        let resolution =
            resolve_conflict("Origin Pool", "op-a", "mv", ConflictAction::Ask, &mut prompter);
        assert_eq!(resolution, ConflictResolution::Rename("mv-op-a".to_string()));

        let mut prompter = ScriptedPrompter::with_answers(&["s"]);
        let resolution =
            resolve_conflict("Origin Pool", "op-a", "mv", ConflictAction::Ask, &mut prompter);
        assert_eq!(resolution, ConflictResolution::Skip);
    }
}
