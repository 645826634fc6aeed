//! Operator console interaction: prompts, step lines, progress counter.

use std::io::{self, Write};

/// Source of interactive operator answers. The production implementation
/// reads stdin; tests substitute scripted answers.
pub trait Prompter {
    /// Print `prompt` (no trailing newline) and return the trimmed answer.
    fn ask(&mut self, prompt: &str) -> String;
}

/// Reads answers from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, prompt: &str) -> String {
        print!("{prompt}");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return String::new();
        }
        answer.trim().to_string()
    }
}

/// Scripted prompter for tests; panics when answers run out.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn with_answers(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn ask(&mut self, _prompt: &str) -> String {
        self.answers.pop_front().expect("no scripted answer left")
    }
}

/// Ask a yes/no question until an unambiguous answer arrives.
pub fn confirm(prompter: &mut dyn Prompter, prompt: &str) -> bool {
    loop {
        match prompter.ask(&format!("{prompt} [y/n]: ")).to_lowercase().as_str() {
            "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => {}
        }
    }
}

/// Print a pre-flight step with a compact result, overwriting the
/// in-progress line.
pub fn print_step(label: &str, result: &str) {
    if result.is_empty() {
        print!("\r  {label:<48} ...");
    } else {
        println!("\r  {label:<48} {result}");
    }
    let _ = io::stdout().flush();
}

/// In-place progress counter during batch processing.
pub fn print_progress(current: usize, total: usize) {
    if total == 0 {
        return;
    }
    const WIDTH: usize = 40;
    let filled = WIDTH * current / total;
    let mut bar = "=".repeat(filled);
    if filled < WIDTH {
        bar.push('>');
    }
    print!("\r  [{bar:<40}] {current} of {total} load balancer(s) done");
    let _ = io::stdout().flush();
    if current >= total {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_loops_until_definite_answer() {
        let mut prompter = ScriptedPrompter::with_answers(&["maybe", "YES"]);
        assert!(confirm(&mut prompter, "Move?"));

        let mut prompter = ScriptedPrompter::with_answers(&["n"]);
        assert!(!confirm(&mut prompter, "Move?"));
    }
}
