//! Command line interfaces for the two binaries, mover and scanner.
//!
//! Each parses its command line arguments, initialises logging, and loads
//! the configuration everything else runs from.

use clap::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::{Config, ConfigError};
use crate::defaults::{DEFAULT_CONFIG_PATH, FINGERPRINT_PATH, LOG_DIR, MOVER_CSV_PATH};
use crate::logging::{self, LoggingError};
use crate::mover::conflict::ConflictAction;
use crate::mover::run::{RunOptions, RunPaths};
use crate::scanner::ScanPaths;

/// All possible errors that can happen while initialising the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("could not initialize logging: `{0}`")]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Command line arguments, as parsed by [`clap`].
#[derive(Parser, Debug)]
#[command(
    author,
    about = "Move HTTP load balancers (and their dependencies) to a new namespace. \
             Reads config/xc-mover.csv and re-creates each LB in the target namespace. \
             LBs that share dependencies are automatically batched together.",
    long_about = None
)]
pub struct Cli {
    /// Path to the YAML config file.
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Skip per-batch confirmation prompts and move everything without asking.
    #[arg(long)]
    pub force_all: bool,

    /// Simulate the move without making any changes. Generates the HTML
    /// report with planned configs and writes the dry-run fingerprint.
    #[arg(long)]
    pub dry_run: bool,

    /// Action when a name conflict is detected in the target namespace.
    /// For batch/CI jobs use 'skip' or 'prefix' to avoid prompts.
    #[arg(long, value_enum, default_value_t = ConflictAction::Ask)]
    pub conflict_action: ConflictAction,

    /// Bypass the dry-run verification check without prompting.
    #[arg(long)]
    pub skip_dry_run: bool,

    /// Enable verbose (debug) logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Everything the runner needs, assembled from the CLI and config file.
pub struct MoverCliConfig {
    pub config: Config,
    pub options: RunOptions,
    pub paths: RunPaths,
    /// Keeps the file logging worker alive for the process lifetime.
    pub file_logger_guard: WorkerGuard,
}

impl Cli {
    /// Parse arguments, set up logging, and load the configuration.
    pub fn init() -> Result<MoverCliConfig, CliError> {
        let cli = Self::parse();
        let (log_path, file_logger_guard) =
            logging::try_init(cli.verbose, Path::new(LOG_DIR), "mover")?;
        let config = Config::load(&cli.config)?;
        // Validate up-front so a bad target namespace fails before any
        // remote call.
        config.target_namespace()?;

        let options = RunOptions {
            force_all: cli.force_all,
            dry_run: cli.dry_run,
            conflict_action: cli.conflict_action,
            skip_dry_run: cli.skip_dry_run,
        };
        let paths = RunPaths {
            csv_path: PathBuf::from(MOVER_CSV_PATH),
            fingerprint_path: PathBuf::from(FINGERPRINT_PATH),
            report_dir: PathBuf::from(&config.report.output_dir),
            log_path,
        };
        Ok(MoverCliConfig {
            config,
            options,
            paths,
            file_logger_guard,
        })
    }
}

/// Command line arguments of the scanner binary.
#[derive(Parser, Debug)]
#[command(
    author,
    about = "List all HTTP/HTTPS load balancers across F5 XC namespaces and export them \
             as CSV (in the mover's input format) plus an HTML inventory report.",
    long_about = None
)]
pub struct ScannerCli {
    /// Path to the YAML config file.
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Output directory for the reports (overrides `report.output_dir`).
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose (debug) logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Everything the scanner needs, assembled from the CLI and config file.
pub struct ScannerCliConfig {
    pub config: Config,
    pub paths: ScanPaths,
    /// Keeps the file logging worker alive for the process lifetime.
    pub file_logger_guard: WorkerGuard,
}

impl ScannerCli {
    /// Parse arguments, set up logging, and load the configuration.
    pub fn init() -> Result<ScannerCliConfig, CliError> {
        let cli = Self::parse();
        let (log_path, file_logger_guard) =
            logging::try_init(cli.verbose, Path::new(LOG_DIR), "scanner")?;
        let config = Config::load(&cli.config)?;

        let report_dir = cli
            .output_dir
            .unwrap_or_else(|| PathBuf::from(&config.report.output_dir));
        let paths = ScanPaths {
            report_dir,
            log_path,
        };
        Ok(ScannerCliConfig {
            config,
            paths,
            file_logger_guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
        ScannerCli::command().debug_assert();
    }

    #[test]
    fn defaults_match_documented_surface() {
        let cli = Cli::parse_from(["xc-ns-mover"]);
        assert_eq!(cli.config, PathBuf::from("config/config.yaml"));
        assert!(!cli.force_all);
        assert!(!cli.dry_run);
        assert_eq!(cli.conflict_action, ConflictAction::Ask);
        assert!(!cli.skip_dry_run);
        assert!(!cli.verbose);
    }

    #[test]
    fn all_flags_parse() {
        let cli = Cli::parse_from([
            "xc-ns-mover",
            "-c",
            "other.yaml",
            "--force-all",
            "--dry-run",
            "--conflict-action",
            "prefix",
            "--skip-dry-run",
            "-v",
        ]);
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert!(cli.force_all);
        assert!(cli.dry_run);
        assert_eq!(cli.conflict_action, ConflictAction::Prefix);
        assert!(cli.skip_dry_run);
        assert!(cli.verbose);
    }

    #[test]
    fn scanner_flags_parse() {
        let cli = ScannerCli::parse_from(["xc-ns-scanner"]);
        assert_eq!(cli.config, PathBuf::from("config/config.yaml"));
        assert!(cli.output_dir.is_none());
        assert!(!cli.verbose);

        let cli = ScannerCli::parse_from(["xc-ns-scanner", "-c", "other.yaml", "-o", "out", "-v"]);
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert!(cli.verbose);
    }
}
