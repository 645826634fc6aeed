use std::error::Error;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use xc_ns_mover::api::XcClient;
use xc_ns_mover::cli::{Cli, MoverCliConfig};
use xc_ns_mover::http::{HttpClient, HttpConfig};
use xc_ns_mover::mover::console::StdinPrompter;
use xc_ns_mover::mover::executor::ThreadSleeper;
use xc_ns_mover::mover::run;

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    let cli_config = Cli::init().unwrap_or_else(|cli_error| {
        eprintln!("{cli_error}");
        exit(EXIT_FAILURE);
    });

    let interrupt = Arc::new(AtomicBool::new(false));
    if let Err(err) = create_interrupt_handler(interrupt.clone()) {
        error!("Could not set signal handler: {err}");
        exit(EXIT_FAILURE);
    }

    match _main(cli_config, &interrupt) {
        Ok(exit_code) => exit(exit_code),
        Err(err) => {
            // Log the error in string form only; the "Rust mode" debug
            // representation would repeat it less readably.
            error!("The mover exited with an error: {err}");
            eprintln!("Error: {err}");
            exit(EXIT_FAILURE);
        }
    }
}

fn _main(cli_config: MoverCliConfig, interrupt: &AtomicBool) -> Result<i32, Box<dyn Error>> {
    // Hold the file logger guard for the whole duration of the program.
    let MoverCliConfig {
        config,
        options,
        paths,
        file_logger_guard: _guard,
    } = cli_config;

    let http = HttpClient::new(HttpConfig::default(), &config.auth.api_token)?;
    let client = XcClient::new(http, &config.api_url());

    let outcome = run::run(
        &client,
        &config,
        &options,
        &paths,
        &mut StdinPrompter,
        &ThreadSleeper,
        interrupt,
    )?;

    if outcome.interrupted {
        return Ok(EXIT_INTERRUPTED);
    }
    if outcome.any_failure() {
        return Ok(EXIT_FAILURE);
    }
    info!("exiting gracefully");
    Ok(0)
}

fn create_interrupt_handler(interrupt: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        if interrupt.swap(true, Ordering::SeqCst) {
            // Second interrupt: give up immediately.
            eprintln!("\nForced exit.");
            exit(EXIT_INTERRUPTED);
        }
        eprintln!(
            "\nInterrupt received — interrupting mid-batch is unsafe; the current batch will \
             finish (with rollback on failure) and remaining batches will be skipped. Press \
             Ctrl-C again to force exit."
        );
        info!("Received SIGINT (Ctrl-C). Stopping after the current batch");
    })
}
