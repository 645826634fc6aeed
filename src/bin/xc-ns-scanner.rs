use std::error::Error;
use std::process::exit;
use tracing::error;

use xc_ns_mover::api::XcClient;
use xc_ns_mover::cli::{ScannerCli, ScannerCliConfig};
use xc_ns_mover::http::{HttpClient, HttpConfig};
use xc_ns_mover::scanner;

fn main() {
    let cli_config = ScannerCli::init().unwrap_or_else(|cli_error| {
        eprintln!("{cli_error}");
        exit(1);
    });

    if let Err(err) = _main(cli_config) {
        error!("The scanner exited with an error: {err}");
        eprintln!("Error: {err}");
        exit(1);
    }
}

fn _main(cli_config: ScannerCliConfig) -> Result<(), Box<dyn Error>> {
    // Hold the file logger guard for the whole duration of the program.
    let ScannerCliConfig {
        config,
        paths,
        file_logger_guard: _guard,
    } = cli_config;

    let http = HttpClient::new(HttpConfig::default(), &config.auth.api_token)?;
    let client = XcClient::new(http, &config.api_url());

    scanner::run(&client, &config, &paths)?;
    Ok(())
}
